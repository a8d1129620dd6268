//! Pages under `/lambda`: a remote function's log viewer and the trigger for
//! the family medicine aggregation.

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
};
use chrono::Local;
use log::{error, info};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use url::form_urlencoded;
use who_romania_client::{Context, Error, LogEvent};

use crate::{
    actions::{lambda, Extension},
    authz,
};

const FLASH_COOKIE: &str = "wr_flash";
const NOT_AUTHORIZED: &str = "Not authorized to perform this action";

enum Trigger {
    Viewed,
    Triggered,
    Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlashKind {
    Success,
    Error,
}

impl FlashKind {
    fn as_str(self) -> &'static str {
        match self {
            FlashKind::Success => "success",
            FlashKind::Error => "error",
        }
    }
}

fn now() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S%.6f").to_string()
}

fn log_line(level: &str, message: &str) -> String {
    format!("[{level}]\t{}\twrc\t{message}", now())
}

fn error_kind(error: &Error) -> &'static str {
    match error {
        Error::Validation(_) => "ValidationError",
        Error::NotAuthorized { .. } => "NotAuthorized",
        Error::NotFound { .. } => "NotFound",
        _ => "Error",
    }
}

/// Messages to show for a log fetch, never empty.
fn log_messages(events: Result<Vec<LogEvent>, Error>) -> Vec<String> {
    match events {
        Ok(events) if events.is_empty() => vec![log_line(
            "INFO",
            "Nothing logged yet, please reload the page",
        )],
        Ok(events) => events.into_iter().map(|event| event.message).collect(),
        Err(error) => vec![
            log_line("ERROR", "ERROR Failed to get logs"),
            log_line("ERROR", &format!("{}: {}", error_kind(&error), error)),
        ],
    }
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn render_logs(function: &str, messages: &[String], flash: Option<(FlashKind, String)>) -> String {
    let flash = flash
        .map(|(kind, message)| {
            format!(
                "<div class=\"alert flash-{}\">{}</div>\n",
                kind.as_str(),
                escape_html(&message)
            )
        })
        .unwrap_or_default();
    let lines = messages
        .iter()
        .map(|message| format!("<pre class=\"log-line\">{}</pre>", escape_html(message)))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>Logs: {function}</title></head>\n\
         <body>\n<h1>Logs: {function}</h1>\n{flash}<div class=\"logs\">\n{lines}\n</div>\n</body>\n</html>\n",
        function = escape_html(function),
    )
}

fn forbidden() -> Response {
    (StatusCode::FORBIDDEN, Html(NOT_AUTHORIZED.to_owned())).into_response()
}

fn read_flash(headers: &HeaderMap) -> Option<(FlashKind, String)> {
    let cookie = headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == FLASH_COOKIE)
        .map(|(_, value)| value.to_owned())?;

    let decoded: String = form_urlencoded::parse(format!("flash={cookie}").as_bytes())
        .next()
        .map(|(_, value)| value.into_owned())?;
    let (kind, message) = decoded.split_once(':')?;
    let kind = match kind {
        "success" => FlashKind::Success,
        "error" => FlashKind::Error,
        _ => return None,
    };
    Some((kind, message.to_owned()))
}

fn flash_cookie(kind: FlashKind, message: &str) -> Option<HeaderValue> {
    let value: String =
        form_urlencoded::byte_serialize(format!("{}:{}", kind.as_str(), message).as_bytes())
            .collect();
    HeaderValue::from_str(&format!(
        "{FLASH_COOKIE}={value}; Path=/lambda; Max-Age=300; HttpOnly; SameSite=Lax"
    ))
    .ok()
}

/// `GET /lambda/logs/:function`
pub async fn view_logs(
    State(extension): State<Arc<Extension>>,
    axum::Extension(context): axum::Extension<Context>,
    Path(function): Path<String>,
    headers: HeaderMap,
) -> Response {
    if authz::authorize_lambda_invoke(&extension.settings, &context).is_err() {
        return forbidden();
    }

    let lambda_function = function.clone();
    let events = tokio::task::spawn_blocking(move || {
        let mut data = Map::new();
        data.insert("lambda_function".to_owned(), Value::String(lambda_function));
        lambda::lambda_logs(&extension, &context, data).map(|logs| logs.events)
    })
    .await
    .unwrap_or_else(|join_error| {
        Err(Error::Unknown {
            message: "Log fetch did not complete".to_owned(),
            source: Box::new(join_error),
        })
    });

    let flash = read_flash(&headers);
    let mut response = Html(render_logs(&function, &log_messages(events), flash)).into_response();
    if let Ok(clear) = HeaderValue::from_str(&format!("{FLASH_COOKIE}=; Path=/lambda; Max-Age=0")) {
        response.headers_mut().append(header::SET_COOKIE, clear);
    }
    response
}

/// `GET|POST /lambda/family-medicine/:dataset_id`
///
/// A POST queues the aggregation function for the dataset. Either way the
/// browser is sent on to that function's logs.
pub async fn family_medicine(
    State(extension): State<Arc<Extension>>,
    axum::Extension(context): axum::Extension<Context>,
    Path(dataset_id): Path<String>,
    method: Method,
) -> Response {
    let lambda_function = extension.settings.lambda_family_medicine_function.clone();
    let location = format!(
        "/lambda/logs/{}",
        form_urlencoded::byte_serialize(lambda_function.as_bytes()).collect::<String>()
    );

    let outcome = tokio::task::spawn_blocking(move || -> Result<Trigger, Error> {
        authz::authorize_dataset_update_by_id(&extension, &context, &dataset_id)?;
        authz::authorize_lambda_invoke(&extension.settings, &context)?;
        if method != Method::POST {
            return Ok(Trigger::Viewed);
        }

        let mut data = Map::new();
        data.insert("dataset_id".to_owned(), json!(dataset_id));
        data.insert(
            "lambda_function".to_owned(),
            json!(extension.settings.lambda_family_medicine_function),
        );
        data.insert(
            "reporting_template".to_owned(),
            json!(extension.settings.lambda_family_medicine_template),
        );
        match lambda::lambda_invoke(&extension, &context, data) {
            Ok(_) => {
                info!("Triggered aggregation for dataset {}", dataset_id);
                Ok(Trigger::Triggered)
            }
            Err(error) => {
                error!("Failed to trigger aggregation for dataset {dataset_id}: {error}");
                Ok(Trigger::Failed(error.to_string()))
            }
        }
    })
    .await;

    let flash = match outcome {
        Ok(Ok(Trigger::Viewed)) => None,
        Ok(Ok(Trigger::Triggered)) => flash_cookie(
            FlashKind::Success,
            "Sucessfully triggered aggregation script. The script will take no more than \
             5 minutes to complete.  Follow the logs below...",
        ),
        Ok(Ok(Trigger::Failed(cause))) => flash_cookie(
            FlashKind::Error,
            &format!(
                "Failed to trigger aggregation script. Please try again and if the problem \
                 persists, contact a system administrator ({cause}). "
            ),
        ),
        Ok(Err(Error::NotAuthorized { .. })) => return forbidden(),
        Ok(Err(Error::NotFound { message })) => {
            return (StatusCode::NOT_FOUND, Html(escape_html(&message))).into_response()
        }
        Ok(Err(other)) => {
            error!("Could not check access to the aggregation trigger: {other}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
        Err(join_error) => {
            error!("Aggregation trigger panicked or was cancelled: {join_error}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let mut response = Redirect::to(&location).into_response();
    if let Some(cookie) = flash {
        response.headers_mut().append(header::SET_COOKIE, cookie);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_log_messages() {
        let messages = log_messages(Ok(vec![]));
        assert_eq!(messages.len(), 1);
        assert!(messages[0].starts_with("[INFO]\t"));
        assert!(messages[0].ends_with("\twrc\tNothing logged yet, please reload the page"));

        let messages = log_messages(Err(Error::not_found("no streams")));
        assert_eq!(messages.len(), 2);
        assert!(messages[0].ends_with("\twrc\tERROR Failed to get logs"));
        assert!(messages[1].ends_with("\twrc\tNotFound: Not found: no streams"));
    }

    #[test]
    fn test_flash_cookie_round_trip() {
        let cookie = flash_cookie(FlashKind::Error, "Failed (boom). ").unwrap();
        let pair = cookie.to_str().unwrap().split(';').next().unwrap().to_owned();

        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_str(&format!("session=abc; {pair}")).unwrap(),
        );
        assert_eq!(
            read_flash(&headers),
            Some((FlashKind::Error, "Failed (boom). ".to_owned()))
        );
    }

    #[test]
    fn test_render_escapes() {
        let page = render_logs("fn<1>", &["<script>".to_owned()], None);
        assert!(page.contains("Logs: fn&lt;1&gt;"));
        assert!(page.contains("&lt;script&gt;"));
        assert!(!page.contains("<script>"));
    }
}
