//! Validation of individual batch items.
//!
//! A batch item arrives as loosely-typed JSON, a three-element list:
//!
//! ```text
//! upload:   [filename, base64 image,  [o, he, cs, lc, rv]]
//! download: [filename, ".jpg|.tiff|.png", [o, he, cs, lc, rv]]
//! ```
//!
//! The [`Validator`] checks one item at a time and turns it into a typed
//! [`UploadItem`] or [`DownloadItem`]. Rules run in a fixed order and the
//! first failing rule is reported; violations are never aggregated.
//!
//! 1. the item is a list of exactly three elements
//! 2. element 0 is a non-empty string
//! 3. element 1 is a non-empty canonical base64 string (upload) or an
//!    allowed extension (download)
//! 4. element 2 is a list of exactly five flags, at least one set
//!
//! Whether a flag may be written as `0`/`1` instead of `false`/`true` is a
//! [`FlagMode`] setting.

use crate::imaging::ImageExtension;
use crate::imaging::payload::is_canonical_base64;
use crate::signature::{SELECTION_LEN, SelectionVector};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Longest rendering of an offending item quoted in an error message.
const ITEM_PREVIEW_CHARS: usize = 60;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Item {item} must be a list of [filename, image, processing steps].")]
    NotAList { item: String },
    #[error("Item {item} has {len} elements, expected 3.")]
    WrongLength { item: String, len: usize },
    #[error("Field filename cannot be empty.")]
    Filename,
    #[error("Field image must be a string.")]
    PayloadNotString,
    #[error("Field image cannot be empty.")]
    EmptyPayload,
    #[error("Field image is not valid base64.")]
    PayloadNotBase64,
    #[error("Field extension must be one of .jpg, .tiff, .png.")]
    Extension,
    #[error("Field processing steps must be a list of {len} flags, got {0}.", len = SELECTION_LEN)]
    StepsShape(String),
    #[error("Processing step {0} must be true or false.")]
    StepNotBool(usize),
    #[error("Processing step {0} must be true, false, 0 or 1.")]
    StepNotFlag(usize),
    #[error("At least one processing step must be selected.")]
    NoStepSelected,
}

/// How selection flags may be written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlagMode {
    /// Only JSON `true` / `false`.
    #[default]
    Strict,
    /// Also the integers `0` and `1`.
    Coercing,
}

/// A validated upload item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadItem {
    pub filename: String,
    /// Base64 image payload, syntactically valid but not yet decoded.
    pub payload: String,
    pub selection: SelectionVector,
}

/// A validated download item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadItem {
    pub filename: String,
    pub extension: ImageExtension,
    pub selection: SelectionVector,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Validator {
    pub flags: FlagMode,
}

impl Validator {
    pub fn new(flags: FlagMode) -> Self {
        Self { flags }
    }

    pub fn validate_upload(&self, item: &Value) -> Result<UploadItem, ValidationError> {
        let [filename, payload, steps] = triple(item)?;
        let filename = check_filename(filename)?;
        let payload = match payload {
            Value::String(s) => s,
            _ => return Err(ValidationError::PayloadNotString),
        };
        if payload.is_empty() {
            return Err(ValidationError::EmptyPayload);
        }
        if !is_canonical_base64(payload) {
            return Err(ValidationError::PayloadNotBase64);
        }
        let selection = self.check_steps(steps)?;
        Ok(UploadItem {
            filename,
            payload: payload.clone(),
            selection,
        })
    }

    pub fn validate_download(&self, item: &Value) -> Result<DownloadItem, ValidationError> {
        let [filename, extension, steps] = triple(item)?;
        let filename = check_filename(filename)?;
        let extension = extension
            .as_str()
            .and_then(ImageExtension::from_dotted)
            .ok_or(ValidationError::Extension)?;
        let selection = self.check_steps(steps)?;
        Ok(DownloadItem {
            filename,
            extension,
            selection,
        })
    }

    /// Check a selection-flag list under this validator's [`FlagMode`].
    pub fn check_steps(&self, steps: &Value) -> Result<SelectionVector, ValidationError> {
        let list = match steps {
            Value::Array(list) => list,
            other => return Err(ValidationError::StepsShape(kind_of(other).to_string())),
        };
        if list.len() != SELECTION_LEN {
            return Err(ValidationError::StepsShape(format!(
                "{} elements",
                list.len()
            )));
        }
        let mut flags = [false; SELECTION_LEN];
        for (index, (flag, value)) in flags.iter_mut().zip(list).enumerate() {
            *flag = self.flag(index, value)?;
        }
        let selection = SelectionVector::new(flags);
        if !selection.any() {
            return Err(ValidationError::NoStepSelected);
        }
        Ok(selection)
    }

    fn flag(&self, index: usize, value: &Value) -> Result<bool, ValidationError> {
        match (self.flags, value) {
            (_, Value::Bool(b)) => Ok(*b),
            (FlagMode::Coercing, Value::Number(n)) => match n.as_u64() {
                Some(0) => Ok(false),
                Some(1) => Ok(true),
                _ => Err(ValidationError::StepNotFlag(index)),
            },
            (FlagMode::Coercing, _) => Err(ValidationError::StepNotFlag(index)),
            (FlagMode::Strict, _) => Err(ValidationError::StepNotBool(index)),
        }
    }
}

fn triple(item: &Value) -> Result<[&Value; 3], ValidationError> {
    let list = item.as_array().ok_or_else(|| ValidationError::NotAList {
        item: preview(item),
    })?;
    match list.as_slice() {
        [a, b, c] => Ok([a, b, c]),
        _ => Err(ValidationError::WrongLength {
            item: preview(item),
            len: list.len(),
        }),
    }
}

fn check_filename(value: &Value) -> Result<String, ValidationError> {
    match value {
        Value::String(s) if !s.is_empty() => Ok(s.clone()),
        _ => Err(ValidationError::Filename),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

/// Compact JSON rendering of an item, shortened so payloads don't flood messages.
fn preview(item: &Value) -> String {
    let text = item.to_string();
    if text.chars().count() <= ITEM_PREVIEW_CHARS {
        text
    } else {
        let head: String = text.chars().take(ITEM_PREVIEW_CHARS).collect();
        format!("{head}...")
    }
}
