//! Typed request handlers for the image service routes.
//!
//! | Route | Handler | Success | Failure |
//! |---|---|---|---|
//! | `POST /new_user` | [`Service::new_user`] | 200 | 400 empty username / user exists |
//! | `POST /delete/<username>` | [`Service::delete_user`] | 200 | 404 unknown user |
//! | `POST /delete/<username>/<filename>` | [`Service::delete_file`] | 200 | 404 unknown user / filename |
//! | `POST /image_upload` | [`Service::image_upload`] | 200 | 400 missing field |
//! | `POST /process_image` | [`Service::process_image`] | 200 | 400 missing field |
//! | `GET /image_download/<username>/<filename>/<signature>` | [`Service::image_download`] | 200 + `{image, metadata}` | 404 not found |
//!
//! Request bodies deserialize into the `*Request` types below. Required
//! fields are checked once here, in declaration order, and the first empty
//! one is reported as `"Field <name> cannot be empty."`. Everything past
//! the boundary works on typed values and shares the per-item code paths of
//! the [`batch`](crate::batch) orchestrator.
//!
//! No transport is bundled. A web framework (or the CLI) deserializes a
//! body, calls a handler, and serializes the returned record.

use crate::batch::{self, BatchOptions, ItemError, Orchestrator, SUCCESS_MESSAGE};
use crate::imaging::{Dimensions, ImageBackend};
use crate::imaging::payload::is_canonical_base64;
use crate::signature::{SelectionVector, Signature};
use crate::store::VersionStore;
use crate::validate::{UploadItem, ValidationError, Validator};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NewUserRequest {
    pub username: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ImageUploadRequest {
    pub username: String,
    pub filename: String,
    /// Base64 image payload.
    pub image: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProcessImageRequest {
    pub username: String,
    pub filename: String,
    pub image: String,
    /// Five selection flags, checked under the configured flag mode.
    /// Takes precedence over `proc_step`.
    pub proc_steps: Option<Value>,
    /// A single step by name, e.g. `"Log Compression"`.
    pub proc_step: Option<String>,
}

/// Status reply shared by every route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiResponse {
    pub code: u16,
    pub msg: String,
}

impl ApiResponse {
    pub fn ok() -> Self {
        Self {
            code: 200,
            msg: SUCCESS_MESSAGE.to_string(),
        }
    }

    pub fn error(code: u16, msg: impl Into<String>) -> Self {
        Self {
            code,
            msg: msg.into(),
        }
    }

    fn empty_field(name: &str) -> Self {
        Self::error(400, format!("Field {name} cannot be empty."))
    }

    pub fn is_success(&self) -> bool {
        self.code == 200
    }
}

impl From<ItemError> for ApiResponse {
    fn from(e: ItemError) -> Self {
        Self::error(e.status_code(), e.to_string())
    }
}

impl From<ValidationError> for ApiResponse {
    fn from(e: ValidationError) -> Self {
        Self::error(400, e.to_string())
    }
}

impl From<crate::store::StoreError> for ApiResponse {
    fn from(e: crate::store::StoreError) -> Self {
        Self::error(e.status_code(), e.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageMetadata {
    pub filename: String,
    pub signature: Signature,
    pub size: Dimensions,
    pub timestamp: DateTime<Utc>,
    /// Absent for originals.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_time_ms: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DownloadResponse {
    /// Base64 of the stored image bytes.
    pub image: String,
    pub metadata: ImageMetadata,
}

fn require<'r>(name: &str, value: &'r str) -> Result<&'r str, ApiResponse> {
    if value.is_empty() {
        Err(ApiResponse::empty_field(name))
    } else {
        Ok(value)
    }
}

/// Route handlers over one store and one backend.
pub struct Service<'a, B: ImageBackend> {
    store: &'a mut VersionStore,
    backend: &'a B,
    options: BatchOptions,
}

impl<'a, B: ImageBackend> Service<'a, B> {
    pub fn new(store: &'a mut VersionStore, backend: &'a B, options: BatchOptions) -> Self {
        Self {
            store,
            backend,
            options,
        }
    }

    pub fn new_user(&mut self, req: &NewUserRequest) -> ApiResponse {
        match self.store.create_user(&req.username) {
            Ok(()) => ApiResponse::ok(),
            Err(e) => {
                warn!(error = %e, "new_user rejected");
                e.into()
            }
        }
    }

    pub fn delete_user(&mut self, username: &str) -> ApiResponse {
        match self.store.delete_user(username) {
            Ok(()) => ApiResponse::ok(),
            Err(e) => e.into(),
        }
    }

    pub fn delete_file(&mut self, username: &str, filename: &str) -> ApiResponse {
        match self.store.delete_filename(username, filename) {
            Ok(_) => ApiResponse::ok(),
            Err(e) => e.into(),
        }
    }

    /// Store a raw image as the user's original for `filename`.
    pub fn image_upload(&mut self, req: &ImageUploadRequest) -> ApiResponse {
        let item = match Self::upload_fields(&req.username, &req.filename, &req.image) {
            Ok((filename, image)) => UploadItem {
                filename: filename.to_string(),
                payload: image.to_string(),
                selection: SelectionVector::ORIGINAL,
            },
            Err(response) => return response,
        };
        self.store_item(&req.username, &item)
    }

    /// Run the selected transforms over an image and store the variant.
    pub fn process_image(&mut self, req: &ProcessImageRequest) -> ApiResponse {
        let (filename, image) = match Self::upload_fields(&req.username, &req.filename, &req.image) {
            Ok(fields) => fields,
            Err(response) => return response,
        };
        let selection = match requested_selection(req, &Validator::new(self.options.flags)) {
            Ok(selection) => selection,
            Err(response) => return response,
        };
        let item = UploadItem {
            filename: filename.to_string(),
            payload: image.to_string(),
            selection,
        };
        self.store_item(&req.username, &item)
    }

    /// Stored image for a filename and signature, without re-encoding.
    pub fn image_download(
        &self,
        username: &str,
        filename: &str,
        signature: &str,
    ) -> Result<DownloadResponse, ApiResponse> {
        let signature: Signature = signature
            .parse()
            .map_err(|e: crate::signature::FormatError| ApiResponse::error(400, e.to_string()))?;
        let resolved = batch::resolve(&*self.store, username, filename, &signature.selection())?;
        Ok(DownloadResponse {
            image: resolved.payload.to_string(),
            metadata: ImageMetadata {
                filename: filename.to_string(),
                signature,
                size: resolved.size,
                timestamp: resolved.timestamp,
                processing_time_ms: resolved.processing_time_ms,
            },
        })
    }

    fn upload_fields<'r>(
        username: &'r str,
        filename: &'r str,
        image: &'r str,
    ) -> Result<(&'r str, &'r str), ApiResponse> {
        require("username", username)?;
        let filename = require("filename", filename)?;
        let image = require("image", image)?;
        if !is_canonical_base64(image) {
            return Err(ValidationError::PayloadNotBase64.into());
        }
        Ok((filename, image))
    }

    fn store_item(&mut self, username: &str, item: &UploadItem) -> ApiResponse {
        let mut orchestrator = Orchestrator::new(&mut *self.store, self.backend, self.options);
        match orchestrator.upload_one(username, item) {
            Ok(outcome) => {
                info!(user = username, filename = %item.filename, ?outcome, "stored upload");
                ApiResponse::ok()
            }
            Err(e) => {
                warn!(user = username, filename = %item.filename, error = %e, "upload rejected");
                e.into()
            }
        }
    }
}

/// Selection from `proc_steps` when present, otherwise from the `proc_step` name.
fn requested_selection(
    req: &ProcessImageRequest,
    validator: &Validator,
) -> Result<SelectionVector, ApiResponse> {
    if let Some(steps) = &req.proc_steps {
        return Ok(validator.check_steps(steps)?);
    }
    match req.proc_step.as_deref() {
        None | Some("") => Err(ApiResponse::empty_field("proc_steps")),
        Some(name) => {
            SelectionVector::from_step_name(name).map_err(|e| ApiResponse::error(400, e.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::RustBackend;
    use crate::test_helpers::*;
    use crate::validate::FlagMode;
    use serde_json::json;

    const USER: &str = "bob";

    fn service<'a>(store: &'a mut VersionStore, backend: &'a RustBackend) -> Service<'a, RustBackend> {
        Service::new(store, backend, BatchOptions::default())
    }

    fn upload_req(filename: &str, image: &str) -> ImageUploadRequest {
        ImageUploadRequest {
            username: USER.into(),
            filename: filename.into(),
            image: image.into(),
        }
    }

    // =========================================================================
    // Users
    // =========================================================================

    #[test]
    fn new_user_then_duplicate() {
        let mut store = VersionStore::in_memory();
        let backend = RustBackend::new();
        let mut svc = service(&mut store, &backend);

        let req: NewUserRequest = serde_json::from_str(r#"{"username": "bob"}"#).unwrap();
        assert_eq!(svc.new_user(&req), ApiResponse::ok());
        let again = svc.new_user(&req);
        assert_eq!(again.code, 400);
    }

    #[test]
    fn new_user_empty_username() {
        let mut store = VersionStore::in_memory();
        let backend = RustBackend::new();
        let mut svc = service(&mut store, &backend);
        let req: NewUserRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(
            svc.new_user(&req),
            ApiResponse::error(400, "Field username cannot be empty.")
        );
    }

    #[test]
    fn delete_unknown_user_is_404() {
        let mut store = VersionStore::in_memory();
        let backend = RustBackend::new();
        assert_eq!(service(&mut store, &backend).delete_user("ghost").code, 404);
    }

    #[test]
    fn delete_file_removes_original_and_variants() {
        let mut store = store_with_user(USER);
        let backend = RustBackend::new();
        let mut svc = service(&mut store, &backend);
        let payload = png_payload(4, 4);
        assert!(svc.image_upload(&upload_req("cat.png", &payload)).is_success());
        let process = ProcessImageRequest {
            username: USER.into(),
            filename: "cat.png".into(),
            image: payload,
            proc_steps: Some(json!([false, false, false, false, true])),
            proc_step: None,
        };
        assert!(svc.process_image(&process).is_success());

        assert_eq!(svc.delete_file(USER, "cat.png"), ApiResponse::ok());
        assert_eq!(svc.delete_file(USER, "cat.png").code, 404);
        let user = store.user(USER).unwrap();
        assert!(user.originals.is_empty() && user.variants.is_empty());
    }

    // =========================================================================
    // Uploads
    // =========================================================================

    #[test]
    fn image_upload_reports_first_empty_field() {
        let mut store = store_with_user(USER);
        let backend = RustBackend::new();
        let mut svc = service(&mut store, &backend);

        let body = r#"{"username": "bob", "image": ""}"#;
        let req: ImageUploadRequest = serde_json::from_str(body).unwrap();
        assert_eq!(
            svc.image_upload(&req).msg,
            "Field filename cannot be empty."
        );
        assert_eq!(
            svc.image_upload(&upload_req("cat.png", "")).msg,
            "Field image cannot be empty."
        );
    }

    #[test]
    fn image_upload_rejects_garbage_payload() {
        let mut store = store_with_user(USER);
        let backend = RustBackend::new();
        let resp = service(&mut store, &backend).image_upload(&upload_req("cat.png", "@@@"));
        assert_eq!(resp.code, 400);
    }

    #[test]
    fn uploads_reject_non_canonical_base64() {
        let mut store = store_with_user(USER);
        let backend = RustBackend::new();
        let mut svc = service(&mut store, &backend);
        let stray_char = format!("{}!", png_payload(4, 4));

        let resp = svc.image_upload(&upload_req("cat.png", &stray_char));
        assert_eq!(resp, ApiResponse::error(400, "Field image is not valid base64."));

        let req = ProcessImageRequest {
            username: USER.into(),
            filename: "cat.png".into(),
            image: stray_char,
            proc_steps: Some(json!([false, true, false, false, false])),
            proc_step: None,
        };
        assert_eq!(svc.process_image(&req).msg, "Field image is not valid base64.");
        assert!(store.user(USER).unwrap().originals.is_empty());
    }

    #[test]
    fn process_image_follows_configured_flag_mode() {
        let mut store = store_with_user(USER);
        let backend = RustBackend::new();
        let req = ProcessImageRequest {
            username: USER.into(),
            filename: "cat.png".into(),
            image: png_payload(4, 4),
            proc_steps: Some(json!([0, 0, 0, 0, 1])),
            proc_step: None,
        };

        let strict = service(&mut store, &backend).process_image(&req);
        assert_eq!(strict.code, 400);

        let options = BatchOptions {
            flags: FlagMode::Coercing,
            ..BatchOptions::default()
        };
        let coercing = Service::new(&mut store, &backend, options).process_image(&req);
        assert!(coercing.is_success());
        assert!(store
            .get_variant(USER, "cat.png", &"00001".parse().unwrap())
            .is_ok());
    }

    #[test]
    fn process_image_with_step_name() {
        let mut store = store_with_user(USER);
        let backend = RustBackend::new();
        let mut svc = service(&mut store, &backend);
        let req = ProcessImageRequest {
            username: USER.into(),
            filename: "cat.png".into(),
            image: png_payload(5, 5),
            proc_steps: None,
            proc_step: Some("Log Compression".into()),
        };
        assert!(svc.process_image(&req).is_success());
        assert!(store
            .get_variant(USER, "cat.png", &"00010".parse().unwrap())
            .is_ok());
    }

    #[test]
    fn proc_steps_take_precedence_over_name() {
        let strict = Validator::default();
        let req = ProcessImageRequest {
            proc_steps: Some(json!([false, true, false, false, false])),
            proc_step: Some("Reverse Video".into()),
            ..Default::default()
        };
        assert_eq!(
            requested_selection(&req, &strict).unwrap().signature().as_str(),
            "01000"
        );
    }

    #[test]
    fn process_image_selection_errors() {
        let strict = Validator::default();
        let missing = ProcessImageRequest::default();
        assert_eq!(
            requested_selection(&missing, &strict).unwrap_err().msg,
            "Field proc_steps cannot be empty."
        );

        let short = ProcessImageRequest {
            proc_steps: Some(json!([true, false])),
            ..Default::default()
        };
        assert_eq!(requested_selection(&short, &strict).unwrap_err().code, 400);

        let none_set = ProcessImageRequest {
            proc_steps: Some(json!([false, false, false, false, false])),
            ..Default::default()
        };
        assert_eq!(requested_selection(&none_set, &strict).unwrap_err().code, 400);

        let unknown = ProcessImageRequest {
            proc_step: Some("Blur".into()),
            ..Default::default()
        };
        assert_eq!(requested_selection(&unknown, &strict).unwrap_err().code, 400);
    }

    #[test]
    fn process_image_for_unknown_user_is_404() {
        let mut store = VersionStore::in_memory();
        let backend = RustBackend::new();
        let req = ProcessImageRequest {
            username: "ghost".into(),
            filename: "cat.png".into(),
            image: png_payload(3, 3),
            proc_steps: Some(json!([false, true, false, false, false])),
            proc_step: None,
        };
        assert_eq!(service(&mut store, &backend).process_image(&req).code, 404);
    }

    // =========================================================================
    // Downloads
    // =========================================================================

    #[test]
    fn image_download_returns_payload_and_metadata() {
        let mut store = store_with_user(USER);
        let backend = RustBackend::new();
        let mut svc = service(&mut store, &backend);
        let payload = png_payload(9, 4);
        svc.image_upload(&upload_req("cat.png", &payload));

        let resp = svc.image_download(USER, "cat.png", "10000").unwrap();
        assert_eq!(resp.image, payload);
        assert_eq!(resp.metadata.size, Dimensions { width: 9, height: 4 });
        assert_eq!(resp.metadata.processing_time_ms, None);

        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["metadata"]["signature"], "10000");
        assert!(json["metadata"].get("processing_time_ms").is_none());
    }

    #[test]
    fn image_download_errors() {
        let mut store = store_with_user(USER);
        let backend = RustBackend::new();
        let svc = service(&mut store, &backend);
        assert_eq!(
            svc.image_download(USER, "missing.jpg", "10000").unwrap_err().code,
            404
        );
        assert_eq!(
            svc.image_download("ghost", "cat.png", "01100").unwrap_err().code,
            404
        );
        assert_eq!(
            svc.image_download(USER, "cat.png", "0110").unwrap_err().code,
            400
        );
    }
}
