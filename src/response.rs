use axum::{http::StatusCode, Json};
use serde::Serialize;
use serde_json::{json, Value};

use crate::error::ApiError;

#[derive(Debug, Serialize)]
pub struct ErrorItem {
    pub name: String,
    pub message: String,
}

/// Body shared by every response.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    pub data: T,
    pub errors: Vec<ErrorItem>,
    pub message: String,
}

impl<T: Serialize> Envelope<T> {
    pub fn ok(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            data,
            errors: Vec::new(),
            message: message.into(),
        }
    }
}

impl Envelope<Value> {
    pub fn failure(err: &ApiError) -> Self {
        Self {
            success: false,
            data: json!({}),
            errors: vec![ErrorItem {
                name: err.name().to_string(),
                message: err.to_string(),
            }],
            message: "An error occurred!".into(),
        }
    }
}

pub type ApiResult<T> = Result<(StatusCode, Json<Envelope<T>>), ApiError>;

pub fn reply<T: Serialize>(status: StatusCode, data: T, message: &str) -> ApiResult<T> {
    Ok((status, Json(Envelope::ok(data, message))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_envelope_carries_error_name() {
        let env = Envelope::failure(&ApiError::not_found("User not found!"));
        let v = serde_json::to_value(&env).unwrap();
        assert_eq!(v["success"], false);
        assert_eq!(v["errors"][0]["name"], "ResourceNotFoundError");
        assert_eq!(v["errors"][0]["message"], "User not found!");
        assert_eq!(v["data"], json!({}));
    }

    #[test]
    fn ok_envelope_has_no_errors() {
        let v = serde_json::to_value(Envelope::ok(json!({"token": "t"}), "done")).unwrap();
        assert_eq!(v["success"], true);
        assert_eq!(v["errors"], json!([]));
        assert_eq!(v["data"]["token"], "t");
        assert_eq!(v["message"], "done");
    }
}
