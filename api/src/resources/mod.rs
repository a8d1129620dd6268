pub mod activity;
pub mod dataset;
pub mod organization;
pub mod relationship;
pub mod search;
pub mod user;

use crate::error::{Error, Result, ValidationErrors};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// The envelope every catalog action responds with.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Response<SuccessT> {
    success: bool,
    #[serde(default = "Option::default")]
    result: Option<SuccessT>,
    #[serde(default)]
    error: Option<ApiError>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ApiError {
    #[serde(rename = "__type")]
    kind: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(flatten)]
    fields: BTreeMap<String, Value>,
}

impl ApiError {
    fn into_error(self, status_code: StatusCode) -> Error {
        match self.kind.as_str() {
            "Validation Error" => Error::Validation(ValidationErrors {
                message: self.message,
                fields: self
                    .fields
                    .into_iter()
                    .map(|(field, messages)| (field, flatten_messages(messages)))
                    .collect(),
            }),
            "Authorization Error" | "Not Authorized" => Error::NotAuthorized {
                message: self.message.unwrap_or_default(),
            },
            "Not Found Error" | "Not Found" => Error::NotFound {
                message: self.message.unwrap_or_default(),
            },
            _ => Error::Api {
                status_code,
                message: self.message.unwrap_or(self.kind),
            },
        }
    }
}

fn flatten_messages(messages: Value) -> Vec<String> {
    match messages {
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::String(message) => message,
                other => other.to_string(),
            })
            .collect(),
        Value::String(message) => vec![message],
        other => vec![other.to_string()],
    }
}

impl<SuccessT> Response<SuccessT> {
    /// Returns the `result` member, which some actions leave empty.
    pub fn into_result(self, status_code: StatusCode) -> Result<Option<SuccessT>> {
        match (self.success, self.error) {
            (true, _) if status_code.is_success() => Ok(self.result),
            (true, _) => Err(Error::BadProtocol {
                status_code,
                message: String::new(),
            }),
            (false, Some(error)) if !status_code.is_success() => {
                Err(error.into_error(status_code))
            }
            (false, error) => Err(Error::BadProtocol {
                status_code,
                message: error.and_then(|error| error.message).unwrap_or_default(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn parse(value: Value) -> Response<Value> {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_success_envelope() {
        let response = parse(json!({"help": "", "success": true, "result": {"name": "a"}}));
        assert_eq!(
            response.into_result(StatusCode::OK).unwrap(),
            Some(json!({"name": "a"}))
        );

        let response = parse(json!({"success": true, "result": null}));
        assert_eq!(response.into_result(StatusCode::OK).unwrap(), None);
    }

    #[test]
    fn test_validation_envelope() {
        let response = parse(json!({
            "success": false,
            "error": {
                "__type": "Validation Error",
                "name": ["That URL is already in use."],
            }
        }));
        match response.into_result(StatusCode::CONFLICT) {
            Err(Error::Validation(errors)) => assert_eq!(
                errors.messages_for("name").to_vec(),
                vec!["That URL is already in use.".to_owned()]
            ),
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn test_error_kinds() {
        let response = parse(json!({
            "success": false,
            "error": {"__type": "Not Found Error", "message": "Not found"}
        }));
        assert!(response
            .into_result(StatusCode::NOT_FOUND)
            .unwrap_err()
            .is_not_found());

        let response = parse(json!({
            "success": false,
            "error": {"__type": "Authorization Error", "message": "Access denied"}
        }));
        assert!(response
            .into_result(StatusCode::FORBIDDEN)
            .unwrap_err()
            .is_not_authorized());

        let response = parse(json!({
            "success": false,
            "error": {"__type": "Internal Server Error", "message": "boom"}
        }));
        assert!(matches!(
            response.into_result(StatusCode::INTERNAL_SERVER_ERROR),
            Err(Error::Api { .. })
        ));
    }

    #[test]
    fn test_inconsistent_envelope() {
        let response = parse(json!({"success": true, "result": 1}));
        assert!(matches!(
            response.into_result(StatusCode::INTERNAL_SERVER_ERROR),
            Err(Error::BadProtocol { .. })
        ));
    }
}
