use reqwest::{blocking::Response, Result, StatusCode};
use std::{
    sync::atomic::{AtomicBool, Ordering::SeqCst},
    thread::sleep,
    time::Duration,
};

/// When to retry a catalog request that failed in transit.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RetryStrategy {
    /// Let the very first request fail fast, so a mistyped endpoint is reported
    /// straight away, then retry everything after it.
    Automatic,
    /// Retry every request.
    Always,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RetryConfig {
    pub strategy: RetryStrategy,
    pub max_retry_count: u8,
    /// Wait before the first retry.
    pub base_wait: Duration,
    /// Wait before retry N is `base_wait * backoff_factor^N`.
    pub backoff_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            strategy: RetryStrategy::Automatic,
            max_retry_count: 3,
            base_wait: Duration::from_secs(1),
            backoff_factor: 2.0,
        }
    }
}

#[derive(Debug)]
pub(crate) struct Retrier {
    config: RetryConfig,
    is_first_request: AtomicBool,
}

impl Retrier {
    pub fn new(config: RetryConfig) -> Self {
        Self {
            config,
            is_first_request: AtomicBool::new(true),
        }
    }

    fn should_retry(status: StatusCode) -> bool {
        status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
    }

    fn wait_before(&self, i_retry: u8) -> Duration {
        let wait_factor = self.config.backoff_factor.powi(i_retry.into());
        self.config.base_wait.mul_f64(wait_factor)
    }

    pub fn with_retries(&self, send_request: impl Fn() -> Result<Response>) -> Result<Response> {
        if self.is_first_request.swap(false, SeqCst)
            && self.config.strategy == RetryStrategy::Automatic
        {
            return send_request();
        }

        for i_retry in 0..self.config.max_retry_count {
            let failure = match send_request() {
                Ok(response) if Self::should_retry(response.status()) => {
                    format!("{} for {}", response.status(), response.url())
                }
                Err(error) if error.is_timeout() || error.is_connect() || error.is_request() => {
                    error.to_string()
                }
                result => return result,
            };
            let duration = self.wait_before(i_retry);
            log::warn!("{} - retrying after {:?}.", failure, duration);
            sleep(duration);
        }

        // The last attempt is returned whatever it is.
        send_request()
    }
}

#[cfg(test)]
mod tests {
    use super::{Retrier, RetryConfig, RetryStrategy};
    use mockito::{mock, server_address};
    use reqwest::blocking::{get, Client};
    use std::{thread::sleep, time::Duration};

    const STATUS_SHOW: &str = "/api/3/action/status_show";

    fn status_show() -> reqwest::Result<reqwest::blocking::Response> {
        get(format!("http://{}{}", server_address(), STATUS_SHOW))
    }

    fn retrier(strategy: RetryStrategy, max_retry_count: u8) -> Retrier {
        Retrier::new(RetryConfig {
            strategy,
            max_retry_count,
            base_wait: Duration::from_secs(0),
            backoff_factor: 0.0,
        })
    }

    #[test]
    fn test_always_retry() {
        let mut handler = retrier(RetryStrategy::Always, 5);

        let ok = mock("GET", STATUS_SHOW).expect(1).create();
        assert_eq!(handler.with_retries(status_show).unwrap().status(), 200);
        ok.assert();

        for i_retry in 0..6 {
            let unavailable = mock("GET", STATUS_SHOW)
                .with_status(503)
                .expect((i_retry + 1).into())
                .create();
            handler.config.max_retry_count = i_retry;
            assert_eq!(handler.with_retries(status_show).unwrap().status(), 503);
            unavailable.assert();
        }
    }

    #[test]
    fn test_automatic_retry_skips_first_request() {
        let handler = retrier(RetryStrategy::Automatic, 2);

        let failed = mock("GET", STATUS_SHOW).with_status(500).expect(1).create();
        assert_eq!(handler.with_retries(status_show).unwrap().status(), 500);
        failed.assert();

        let throttled = mock("GET", STATUS_SHOW).with_status(429).expect(3).create();
        assert_eq!(handler.with_retries(status_show).unwrap().status(), 429);
        throttled.assert();
    }

    #[test]
    fn test_client_errors_are_not_retried() {
        let handler = retrier(RetryStrategy::Always, 5);

        let conflict = mock("GET", STATUS_SHOW).with_status(409).expect(1).create();
        assert_eq!(handler.with_retries(status_show).unwrap().status(), 409);
        conflict.assert();
    }

    #[test]
    fn test_timeout_retry() {
        let handler = retrier(RetryStrategy::Always, 1);

        let slow = mock("GET", STATUS_SHOW)
            .with_body_from_fn(|_| {
                sleep(Duration::from_secs_f64(0.2));
                Ok(())
            })
            .expect(2)
            .create();
        let client = Client::new();
        assert!(handler
            .with_retries(|| client
                .get(format!("http://{}{}", server_address(), STATUS_SHOW))
                .timeout(Duration::from_secs_f64(0.1))
                .send()
                .and_then(|response| {
                    // Reading the body is what trips the timeout.
                    let _ = response.text()?;
                    unreachable!()
                }))
            .unwrap_err()
            .is_timeout());
        slow.assert();
    }
}
