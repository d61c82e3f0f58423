// src/net/client.rs
//! Data source client contract: one async fetch-and-decode per call, with a
//! bounded immediate retry for transient conditions. Longer-horizon retry
//! policy (interval cadence, error budget) belongs to the pull scheduler.

use async_trait::async_trait;
use embassy_time::Duration;
use serde_json::Value;

use crate::common::error::FetchError;

/// Total attempts per fetch, counting the first one. Only transient errors
/// (timeout, unreachable) are retried; a malformed body will not get better
/// by asking again.
pub const MAX_FETCH_ATTEMPTS: u32 = 3;

/// A named external endpoint reachable as JSON over HTTP(S). The production
/// implementation is `net::http::HttpDataSource`; tests and the simulator
/// substitute canned sources.
#[async_trait(?Send)]
pub trait DataSource {
    async fn fetch_json(&self, url: &str, timeout: Duration) -> Result<Value, FetchError>;
}

pub async fn fetch_json_with_retry(
    source: &dyn DataSource,
    url: &str,
    timeout: Duration,
) -> Result<Value, FetchError> {
    let mut attempt = 1u32;
    loop {
        match source.fetch_json(url, timeout).await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt < MAX_FETCH_ATTEMPTS => {
                log::debug!("fetch attempt {attempt} failed ({err}), retrying: {url}");
                attempt += 1;
            }
            Err(err) => {
                log::warn!("fetch failed after {attempt} attempt(s): {url} ({err})");
                return Err(err);
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted data source shared by the scheduler and widget tests.

    use super::*;
    use std::sync::Mutex;
    use std::vec::Vec;

    pub struct ScriptedSource {
        responses: Mutex<Vec<Result<Value, FetchError>>>,
        pub calls: Mutex<Vec<alloc::string::String>>,
    }

    impl ScriptedSource {
        pub fn new(responses: Vec<Result<Value, FetchError>>) -> Self {
            let mut responses = responses;
            // Stored in pop() order.
            responses.reverse();
            Self {
                responses: Mutex::new(responses),
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait(?Send)]
    impl DataSource for ScriptedSource {
        async fn fetch_json(&self, url: &str, _timeout: Duration) -> Result<Value, FetchError> {
            self.calls.lock().unwrap().push(url.into());
            self.responses
                .lock()
                .unwrap()
                .pop()
                .unwrap_or(Err(FetchError::Unreachable))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::ScriptedSource;
    use super::*;
    use embassy_futures::block_on;
    use serde_json::json;

    const TIMEOUT: Duration = Duration::from_secs(5);

    #[test]
    fn test_transient_errors_retried_up_to_three_attempts() {
        let source = ScriptedSource::new(vec![
            Err(FetchError::Timeout),
            Err(FetchError::Unreachable),
            Err(FetchError::Timeout),
            Err(FetchError::Timeout),
        ]);
        let result = block_on(fetch_json_with_retry(&source, "http://x/a", TIMEOUT));
        assert_eq!(result, Err(FetchError::Timeout));
        assert_eq!(source.call_count(), 3);
    }

    #[test]
    fn test_success_on_second_attempt() {
        let source = ScriptedSource::new(vec![Err(FetchError::Unreachable), Ok(json!({"ok": 1}))]);
        let result = block_on(fetch_json_with_retry(&source, "http://x/a", TIMEOUT));
        assert_eq!(result.unwrap()["ok"], json!(1));
        assert_eq!(source.call_count(), 2);
    }

    #[test]
    fn test_malformed_response_not_retried() {
        let source = ScriptedSource::new(vec![Err(FetchError::MalformedResponse)]);
        let result = block_on(fetch_json_with_retry(&source, "http://x/a", TIMEOUT));
        assert_eq!(result, Err(FetchError::MalformedResponse));
        assert_eq!(source.call_count(), 1);
    }

    #[test]
    fn test_http_rejection_not_retried() {
        let source = ScriptedSource::new(vec![Err(FetchError::Rejected)]);
        let result = block_on(fetch_json_with_retry(&source, "http://x/a", TIMEOUT));
        assert_eq!(result, Err(FetchError::Rejected));
        assert_eq!(source.call_count(), 1);
    }
}
