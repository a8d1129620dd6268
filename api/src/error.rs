use reqwest::StatusCode;
use serde::Serialize;
use std::{
    collections::BTreeMap,
    fmt::{Display, Formatter, Result as FmtResult},
};
use url::Url;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Validation error: {0}")]
    Validation(ValidationErrors),

    #[error("Not authorized: {}", message)]
    NotAuthorized { message: String },

    #[error("Not found: {}", message)]
    NotFound { message: String },

    #[error("API request failed with {}: {}", status_code, message)]
    Api {
        status_code: StatusCode,
        message: String,
    },

    #[error("Invalid endpoint `{}`", endpoint)]
    BadEndpoint { endpoint: Url },

    #[error("Bad token: {}", token)]
    BadToken { token: String },

    #[error("Bad value for header `{}`: {}", name, value)]
    BadHeader { name: &'static str, value: String },

    #[error("Could not parse JSON response.")]
    BadJsonResponse(#[source] reqwest::Error),

    #[error(
        "Status code {} inconsistent with response payload: {}",
        status_code,
        message
    )]
    BadProtocol {
        status_code: StatusCode,
        message: String,
    },

    #[error("Failed to initialise the HTTP client")]
    BuildHttpClient(#[source] reqwest::Error),

    #[error("HTTP request error: {}", message)]
    ReqwestError {
        message: String,
        source: reqwest::Error,
    },

    #[error("Url parsing error: {}", message)]
    UrlParseError {
        message: String,
        source: url::ParseError,
    },

    #[error("Remote function request failed: {}", message)]
    Functions {
        message: String,
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },

    #[error("An unknown error has occurred: {}", message)]
    Unknown {
        message: String,
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },
}

impl Error {
    /// A validation failure attached to a single field.
    pub fn invalid_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Validation(ValidationErrors::field(field, message))
    }

    /// A validation failure that is not attached to any field.
    pub fn invalid(message: impl Into<String>) -> Self {
        Error::Validation(ValidationErrors::message(message))
    }

    pub fn not_authorized(message: impl Into<String>) -> Self {
        Error::NotAuthorized {
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Error::NotFound {
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }

    pub fn is_not_authorized(&self) -> bool {
        matches!(self, Error::NotAuthorized { .. })
    }
}

/// Field level validation messages, as reported by the catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationErrors {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(flatten)]
    pub fields: BTreeMap<String, Vec<String>>,
}

impl ValidationErrors {
    pub fn field(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut fields = BTreeMap::new();
        fields.insert(field.into(), vec![message.into()]);
        Self {
            message: None,
            fields,
        }
    }

    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            fields: BTreeMap::new(),
        }
    }

    pub fn messages_for(&self, field: &str) -> &[String] {
        self.fields.get(field).map(Vec::as_slice).unwrap_or(&[])
    }
}

impl Display for ValidationErrors {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FmtResult {
        let fields = self
            .fields
            .iter()
            .map(|(field, messages)| format!("{}: {}", field, messages.join(" ")))
            .collect::<Vec<_>>()
            .join(", ");

        match (&self.message, fields.is_empty()) {
            (Some(message), true) => write!(formatter, "{message}"),
            (Some(message), false) => write!(formatter, "{message} - {fields}"),
            (None, _) => write!(formatter, "{fields}"),
        }
    }
}
