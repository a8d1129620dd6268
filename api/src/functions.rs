//! Client for the remote function service: asynchronous function invocation
//! and the log store that functions write to.
//!
//! Both are reached through the provider's SDK, with credentials and region
//! taken from the environment's default chain unless configured here.

use aws_config::BehaviorVersion;
use aws_sdk_cloudwatchlogs::{types::OrderBy, Client as LogsClient};
use aws_sdk_lambda::{
    config::{retry::RetryConfig, Config as LambdaConfig, Credentials, Region},
    error::{DisplayErrorContext, ProvideErrorMetadata, SdkError},
    primitives::Blob,
    types::{InvocationType, LogType},
    Client as LambdaClient,
};
use log::debug;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{error::Error as StdError, fmt::Debug, future::Future};
use tokio::runtime::{Builder as RuntimeBuilder, Runtime};
use url::Url;

use crate::error::{Error, Result};

const NOT_FOUND_CODE: &str = "ResourceNotFoundException";
const ACCESS_DENIED_CODES: [&str; 2] = ["AccessDeniedException", "AccessDenied"];

/// The log group a function writes to.
pub fn log_group_for(function: &str) -> String {
    format!("/aws/lambda/{function}")
}

pub trait FunctionService: Send + Sync {
    /// Queue an invocation of `function` without waiting for its result.
    fn invoke_event(&self, function: &str, payload: &Value) -> Result<Invocation>;

    /// The stream with the most recent event in `log_group`, if any.
    fn latest_log_stream(&self, log_group: &str) -> Result<Option<String>>;

    fn log_events(&self, log_group: &str, log_stream: &str, start_time: i64) -> Result<LogEvents>;
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct Invocation {
    #[serde(rename = "StatusCode")]
    pub status_code: u16,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LogEvents {
    #[serde(default)]
    pub events: Vec<LogEvent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_forward_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_backward_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LogEvent {
    #[serde(default)]
    pub timestamp: i64,
    pub message: String,
    #[serde(default)]
    pub ingestion_time: i64,
}

#[derive(Debug, Clone, Default)]
pub struct FunctionsConfig {
    /// Region of the functions and their logs. Read from the environment
    /// when not set.
    pub region: Option<String>,
    /// Named profile in the shared configuration files.
    pub profile: Option<String>,
    /// Sends both services' requests here instead of the provider's
    /// regional endpoints.
    pub endpoint_url: Option<Url>,
    /// Fixed credentials in place of the default chain.
    pub credentials: Option<Credentials>,
}

#[derive(Debug)]
struct Sdk {
    runtime: Runtime,
    lambda: LambdaClient,
    logs: LogsClient,
}

impl Sdk {
    fn load(config: &FunctionsConfig) -> Result<Self> {
        let runtime = RuntimeBuilder::new_multi_thread()
            .worker_threads(1)
            .thread_name("remote-functions")
            .enable_all()
            .build()
            .map_err(|source| Error::Functions {
                message: "Could not start the remote function client runtime.".to_owned(),
                source: Box::new(source),
            })?;

        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = &config.region {
            loader = loader.region(Region::new(region.clone()));
        }
        if let Some(profile) = &config.profile {
            loader = loader.profile_name(profile);
        }
        if let Some(endpoint_url) = &config.endpoint_url {
            loader = loader.endpoint_url(endpoint_url.as_str());
        }
        if let Some(credentials) = &config.credentials {
            loader = loader.credentials_provider(credentials.clone());
        }
        let sdk_config = runtime.block_on(loader.load());
        debug!(
            "Loaded remote function configuration [region: {}]",
            sdk_config
                .region()
                .map(|region| region.as_ref())
                .unwrap_or("<none>")
        );

        Ok(Self {
            lambda: LambdaClient::new(&sdk_config),
            logs: LogsClient::new(&sdk_config),
            runtime,
        })
    }
}

/// The remote function service behind the provider's SDK.
///
/// Requests run on a private runtime, set up with the SDK configuration on
/// first use. Calls must not be made from inside an asynchronous task.
#[derive(Debug)]
pub struct FunctionsClient {
    config: FunctionsConfig,
    sdk: OnceCell<Sdk>,
}

impl FunctionsClient {
    pub fn new(config: FunctionsConfig) -> Self {
        Self {
            config,
            sdk: OnceCell::new(),
        }
    }

    fn sdk(&self) -> Result<&Sdk> {
        self.sdk.get_or_try_init(|| Sdk::load(&self.config))
    }

    fn block_on<OutputT>(&self, request: impl Future<Output = OutputT>) -> Result<OutputT> {
        Ok(self.sdk()?.runtime.block_on(request))
    }
}

impl FunctionService for FunctionsClient {
    fn invoke_event(&self, function: &str, payload: &Value) -> Result<Invocation> {
        let body = serde_json::to_vec(payload).map_err(|source| Error::Unknown {
            message: "Could not serialise the invocation payload".to_owned(),
            source: Box::new(source),
        })?;
        debug!("Attempting to invoke `{}`", function);

        // Event invocations are not idempotent, so they are never retried.
        let lambda = &self.sdk()?.lambda;
        let output = self
            .block_on(
                lambda
                    .invoke()
                    .function_name(function)
                    .invocation_type(InvocationType::Event)
                    .log_type(LogType::None)
                    .payload(Blob::new(body))
                    .customize()
                    .config_override(LambdaConfig::builder().retry_config(RetryConfig::disabled()))
                    .send(),
            )?
            .map_err(|error| function_error(&format!("Invoke `{function}`"), error))?;

        Ok(Invocation {
            status_code: u16::try_from(output.status_code()).unwrap_or_default(),
        })
    }

    fn latest_log_stream(&self, log_group: &str) -> Result<Option<String>> {
        debug!("Attempting to find the latest log stream in `{}`", log_group);
        let logs = &self.sdk()?.logs;
        let output = self
            .block_on(
                logs.describe_log_streams()
                    .log_group_name(log_group)
                    .order_by(OrderBy::LastEventTime)
                    .descending(true)
                    .limit(1)
                    .send(),
            )?
            .map_err(|error| function_error(&format!("DescribeLogStreams `{log_group}`"), error))?;

        Ok(output
            .log_streams()
            .first()
            .and_then(|stream| stream.log_stream_name())
            .map(str::to_owned))
    }

    fn log_events(&self, log_group: &str, log_stream: &str, start_time: i64) -> Result<LogEvents> {
        debug!(
            "Attempting to read `{}` in `{}` from {}",
            log_stream, log_group, start_time
        );
        let logs = &self.sdk()?.logs;
        let output = self
            .block_on(
                logs.get_log_events()
                    .log_group_name(log_group)
                    .log_stream_name(log_stream)
                    .start_time(start_time)
                    .send(),
            )?
            .map_err(|error| function_error(&format!("GetLogEvents `{log_stream}`"), error))?;

        Ok(LogEvents {
            events: output
                .events()
                .iter()
                .map(|event| LogEvent {
                    timestamp: event.timestamp().unwrap_or_default(),
                    message: event.message().unwrap_or_default().to_owned(),
                    ingestion_time: event.ingestion_time().unwrap_or_default(),
                })
                .collect(),
            next_forward_token: output.next_forward_token().map(str::to_owned),
            next_backward_token: output.next_backward_token().map(str::to_owned),
        })
    }
}

/// Map an SDK failure onto the crate's errors, keeping the service's message.
fn function_error<ErrorT, ResponseT>(operation: &str, error: SdkError<ErrorT, ResponseT>) -> Error
where
    ErrorT: ProvideErrorMetadata + StdError + Send + Sync + 'static,
    ResponseT: Debug + Send + Sync + 'static,
{
    let message = error
        .message()
        .map(str::to_owned)
        .unwrap_or_else(|| format!("{operation} failed: {}", DisplayErrorContext(&error)));

    match error.code() {
        Some(NOT_FOUND_CODE) => Error::not_found(message),
        Some(code) if ACCESS_DENIED_CODES.contains(&code) => Error::not_authorized(message),
        _ => Error::Functions {
            message,
            source: Box::new(error),
        },
    }
}
