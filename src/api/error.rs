//! Mapping of pipeline errors to HTTP responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Map, Value};

use crate::error::{ErrorKind, ManagerError, StoreError};

/// A failed request, rendered as `{"error", "message", "detail"}`.
#[derive(Debug)]
pub struct ApiError(pub ManagerError);

impl From<ManagerError> for ApiError {
    fn from(e: ManagerError) -> Self {
        Self(e)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self.0.kind() {
            ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::StorageError | ErrorKind::ExecutionFailed | ErrorKind::ValidationFailed => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn body(&self) -> Value {
        let mut detail = Map::new();
        collect_detail(&self.0, &mut detail);

        json!({
            "error": self.0.kind().as_str(),
            "message": self.0.to_string(),
            "detail": detail,
        })
    }
}

fn collect_detail(error: &ManagerError, detail: &mut Map<String, Value>) {
    match error {
        ManagerError::InvalidInput {
            field, suggestion, ..
        } => {
            detail.insert("field".into(), json!(field));
            if let Some(suggestion) = suggestion {
                detail.insert("suggestion".into(), json!(suggestion));
            }
        }
        ManagerError::Conflict { checksum } => {
            detail.insert("checksum".into(), json!(checksum));
        }
        ManagerError::NotFound { what } => {
            detail.insert("what".into(), json!(what));
        }
        ManagerError::Storage { path, code, .. } => {
            detail.insert("path".into(), json!(path.display().to_string()));
            detail.insert("code".into(), json!(code));
        }
        ManagerError::ExecutionFailed { command, code, .. } => {
            detail.insert("command".into(), json!(command));
            detail.insert("code".into(), json!(code));
        }
        ManagerError::ValidationFailed {
            command,
            return_code,
            diagnostics,
        } => {
            detail.insert("command".into(), json!(command));
            detail.insert("return code".into(), json!(return_code));
            detail.insert("diagnostics".into(), json!(diagnostics));
        }
        ManagerError::Deploy { step, source } => {
            detail.insert("step".into(), json!(step.to_string()));
            collect_detail(source, detail);
        }
        ManagerError::Store(StoreError::Conflict { checksum })
        | ManagerError::Store(StoreError::NotFound { checksum }) => {
            detail.insert("checksum".into(), json!(checksum));
        }
        ManagerError::Store(_) => {}
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.body())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DeployStep;

    #[test]
    fn reload_failure_carries_step_and_diagnostics() {
        let err = ApiError(
            ManagerError::ValidationFailed {
                command: "/bin/sh -c reload".to_string(),
                return_code: 1,
                diagnostics: vec!["[ALERT] cannot bind socket".to_string()],
            }
            .at_step(DeployStep::Reload),
        );

        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = err.body();
        assert_eq!(body["error"], "validation_failed");
        assert_eq!(body["detail"]["step"], "reload");
        assert_eq!(body["detail"]["return code"], 1);
        assert_eq!(body["detail"]["diagnostics"][0], "[ALERT] cannot bind socket");
    }

    #[test]
    fn store_errors_map_by_kind() {
        let conflict = ApiError(StoreError::Conflict { checksum: "ab".into() }.into());
        let missing = ApiError(StoreError::NotFound { checksum: "ab".into() }.into());
        let backend = ApiError(StoreError::Backend("connection refused".into()).into());

        assert_eq!(conflict.status(), StatusCode::CONFLICT);
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
        assert_eq!(backend.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(backend.body()["error"], "storage_error");
    }
}
