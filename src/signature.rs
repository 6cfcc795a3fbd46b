//! Selection vectors and their canonical signature strings.
//!
//! A request chooses what it wants with five ordered flags:
//!
//! | Position | Meaning |
//! |---|---|
//! | 0 | Original (the raw uploaded image) |
//! | 1 | Histogram Equalization |
//! | 2 | Contrast Stretching |
//! | 3 | Log Compression |
//! | 4 | Reverse Video |
//!
//! The [`Signature`] is the same five flags written as `'1'`/`'0'` characters
//! in that order (`[false, true, true, false, false]` → `"01100"`). It is the
//! identity of a stored processed variant for a given filename and the path
//! segment used by the download route.
//!
//! Older clients name a single step instead (`"Histogram Equalization"`).
//! Those names are not signatures; [`SelectionVector::from_step_name`] is the
//! explicit mapping from a name to its one-hot vector.

use crate::imaging::Transform;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Number of positions in a selection vector / characters in a signature.
pub const SELECTION_LEN: usize = 5;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error("signature must be {len} characters, got {0}", len = SELECTION_LEN)]
    Length(usize),
    #[error("signature may only contain '0' and '1', found {0:?}")]
    Character(char),
    #[error("unknown processing step: {0}")]
    UnknownStep(String),
}

/// Five ordered flags: `[Original, HistEq, ContrastStretch, LogComp, ReverseVideo]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct SelectionVector(pub [bool; SELECTION_LEN]);

impl SelectionVector {
    /// The "raw image only" selection, `[true, false, false, false, false]`.
    pub const ORIGINAL: Self = Self([true, false, false, false, false]);

    pub fn new(flags: [bool; SELECTION_LEN]) -> Self {
        Self(flags)
    }

    pub fn flags(&self) -> [bool; SELECTION_LEN] {
        self.0
    }

    pub fn wants_original(&self) -> bool {
        self.0[0]
    }

    /// True when at least one position is set.
    pub fn any(&self) -> bool {
        self.0.iter().any(|&f| f)
    }

    /// Exactly `[true, false, false, false, false]`.
    pub fn is_original_only(&self) -> bool {
        *self == Self::ORIGINAL
    }

    /// No transform positions (1..=4) are set, whatever position 0 says.
    pub fn has_no_transforms(&self) -> bool {
        !self.0[1..].iter().any(|&f| f)
    }

    pub fn is_enabled(&self, transform: Transform) -> bool {
        self.0[transform.position()]
    }

    /// Enabled transforms, always in pipeline order.
    pub fn transforms(&self) -> Vec<Transform> {
        Transform::ALL
            .into_iter()
            .filter(|t| self.is_enabled(*t))
            .collect()
    }

    pub fn signature(&self) -> Signature {
        encode(*self)
    }

    /// One-hot vector for a descriptive step name such as `"Log Compression"`.
    ///
    /// Matching ignores ASCII case and surrounding whitespace.
    pub fn from_step_name(name: &str) -> Result<Self, FormatError> {
        let trimmed = name.trim();
        if trimmed.eq_ignore_ascii_case("original") {
            return Ok(Self::ORIGINAL);
        }
        let transform = Transform::ALL
            .into_iter()
            .find(|t| t.name().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| FormatError::UnknownStep(name.to_string()))?;
        let mut flags = [false; SELECTION_LEN];
        flags[transform.position()] = true;
        Ok(Self(flags))
    }
}

impl From<[bool; SELECTION_LEN]> for SelectionVector {
    fn from(flags: [bool; SELECTION_LEN]) -> Self {
        Self(flags)
    }
}

/// Canonical 5-character `0`/`1` identifier of a selection vector.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Signature(String);

impl Signature {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn selection(&self) -> SelectionVector {
        // Constructed only through `encode`/`decode`, so the string is always valid.
        let mut flags = [false; SELECTION_LEN];
        for (flag, c) in flags.iter_mut().zip(self.0.chars()) {
            *flag = c == '1';
        }
        SelectionVector(flags)
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Signature {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode(s).map(encode)
    }
}

impl TryFrom<String> for Signature {
    type Error = FormatError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Signature> for String {
    fn from(sig: Signature) -> Self {
        sig.0
    }
}

/// Write each flag as `'1'` or `'0'` in position order.
pub fn encode(vector: SelectionVector) -> Signature {
    Signature(
        vector
            .0
            .iter()
            .map(|&f| if f { '1' } else { '0' })
            .collect(),
    )
}

/// Inverse of [`encode`]. Rejects anything that is not exactly five `0`/`1` characters.
pub fn decode(signature: &str) -> Result<SelectionVector, FormatError> {
    let count = signature.chars().count();
    if count != SELECTION_LEN {
        return Err(FormatError::Length(count));
    }
    let mut flags = [false; SELECTION_LEN];
    for (flag, c) in flags.iter_mut().zip(signature.chars()) {
        *flag = match c {
            '1' => true,
            '0' => false,
            other => return Err(FormatError::Character(other)),
        };
    }
    Ok(SelectionVector(flags))
}
