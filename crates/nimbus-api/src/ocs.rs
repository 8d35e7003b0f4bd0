//! The OCS response envelope.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OcsMeta {
    /// `"ok"` or `"failure"`.
    pub status: String,
    /// Mirrors the HTTP status.
    pub statuscode: u16,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcsBody<T> {
    pub meta: OcsMeta,
    pub data: T,
}

/// `{"ocs": {"meta": {...}, "data": ...}}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ocs<T> {
    pub ocs: OcsBody<T>,
}

impl<T: Serialize> Ocs<T> {
    pub fn ok(data: T) -> Self {
        Self::with_status(StatusCode::OK, data)
    }

    pub fn with_status(status: StatusCode, data: T) -> Self {
        Self {
            ocs: OcsBody {
                meta: OcsMeta {
                    status: "ok".to_string(),
                    statuscode: status.as_u16(),
                    message: "OK".to_string(),
                },
                data,
            },
        }
    }

    pub fn data(&self) -> &T {
        &self.ocs.data
    }
}

impl Ocs<Value> {
    /// Failure envelope with an empty data array.
    pub fn failure(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            ocs: OcsBody {
                meta: OcsMeta {
                    status: "failure".to_string(),
                    statuscode: status.as_u16(),
                    message: message.into(),
                },
                data: Value::Array(Vec::new()),
            },
        }
    }
}

impl<T: Serialize> IntoResponse for Ocs<T> {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.ocs.meta.statuscode).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_envelope_shape() {
        let body = serde_json::to_value(Ocs::ok(json!({ "id": "1" }))).unwrap();
        assert_eq!(body["ocs"]["meta"]["status"], "ok");
        assert_eq!(body["ocs"]["meta"]["statuscode"], 200);
        assert_eq!(body["ocs"]["data"]["id"], "1");

        let body = serde_json::to_value(Ocs::failure(StatusCode::NOT_FOUND, "Wrong share ID")).unwrap();
        assert_eq!(body["ocs"]["meta"]["status"], "failure");
        assert_eq!(body["ocs"]["meta"]["message"], "Wrong share ID");
        assert_eq!(body["ocs"]["data"], json!([]));
    }
}
