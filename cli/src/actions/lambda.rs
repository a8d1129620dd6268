use log::info;
use serde_json::{Map, Value};
use who_romania_client::{functions::log_group_for, Context, Error, LogEvents, Result};

use crate::{
    actions::{required_str, Extension},
    authz,
};

/// Events are read from the start of the stream.
const LOG_START_TIME: i64 = 1;

/// Queue a run of `lambda_function` with the rest of the payload, plus the
/// acting user's name and the catalog URL the function should call back.
pub fn lambda_invoke(
    extension: &Extension,
    context: &Context,
    mut data: Map<String, Value>,
) -> Result<Value> {
    authz::authorize_lambda_invoke(&extension.settings, context)?;
    let function = required_str(&data, "lambda_function")?.to_owned();
    data.remove("lambda_function");
    data.insert(
        "ckan_user".to_owned(),
        Value::String(context.user_name().unwrap_or_default().to_owned()),
    );
    data.insert(
        "ckan_url".to_owned(),
        extension
            .settings
            .lambda_ckan_url
            .clone()
            .map_or(Value::Null, Value::String),
    );

    let payload = Value::Object(data);
    match extension.functions.invoke_event(&function, &payload) {
        Ok(invocation) => {
            info!(
                "Invoked `{}` [status: {}]",
                function, invocation.status_code
            );
            serde_json::to_value(invocation).map_err(|source| Error::Unknown {
                message: "Could not serialise invocation".to_owned(),
                source: Box::new(source),
            })
        }
        Err(error) => Err(Error::not_found(format!(
            "{error} Lambda function could not be found and invoked, are you sure access \
             permissions are correct? {payload}"
        ))),
    }
}

/// Events of the requested log stream, or of the newest one.
pub fn lambda_logs(
    extension: &Extension,
    context: &Context,
    data: Map<String, Value>,
) -> Result<LogEvents> {
    authz::authorize_lambda_invoke(&extension.settings, context)?;
    let function = required_str(&data, "lambda_function")?;
    let log_group = log_group_for(function);

    let fetch = || -> Result<LogEvents> {
        let log_stream = match data.get("log_stream_name").and_then(Value::as_str) {
            Some(stream) if !stream.is_empty() => stream.to_owned(),
            _ => extension
                .functions
                .latest_log_stream(&log_group)?
                .ok_or_else(|| Error::not_found(format!("No log streams in {log_group}")))?,
        };
        extension
            .functions
            .log_events(&log_group, &log_stream, LOG_START_TIME)
    };

    fetch().map_err(|error| {
        Error::not_found(format!(
            "{error} Lambda logs could not be found, are you sure AWS access permissions are \
             correct? {}",
            Value::Object(data.clone())
        ))
    })
}
