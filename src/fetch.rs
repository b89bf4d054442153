use std::time::Duration;

use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue, USER_AGENT};
use url::Url;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("transport error for {url}: {message}")]
    Transport { url: String, message: String },

    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("rate limited (HTTP 429) for {url}")]
    RateLimited { url: String },
}

/// One raw HTTP response, before any retry policy is applied.
#[derive(Debug, Clone)]
pub struct Response {
    pub status: u16,
    pub final_url: Url,
    pub body: Vec<u8>,
}

impl Response {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

#[derive(Debug, Clone)]
pub struct Fetched {
    pub body: String,
    pub final_url: Url,
}

pub trait Fetch {
    /// Issues a single GET. Non-2xx statuses are returned as responses, not errors.
    fn get(&mut self, url: &Url) -> Result<Response, FetchError>;
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub retry_backoff: Duration,
    pub rate_limit_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 2,
            retry_backoff: Duration::from_secs(2),
            rate_limit_backoff: Duration::from_secs(1),
        }
    }
}

/// GET with the crawler's retry rules: 200 succeeds, 429 backs off and retries,
/// any other status fails immediately, transport errors are retried.
pub fn fetch_with_retry<F: Fetch + ?Sized>(
    fetcher: &mut F,
    url: &Url,
    policy: &RetryPolicy,
) -> Result<Fetched, FetchError> {
    let attempts = policy.attempts.max(1);
    let mut last_error = None;

    for attempt in 1..=attempts {
        let is_last = attempt == attempts;
        match fetcher.get(url) {
            Ok(response) if response.status == 200 => {
                return Ok(Fetched {
                    body: response.text(),
                    final_url: response.final_url,
                });
            }
            Ok(response) if response.status == 429 => {
                tracing::debug!(%url, attempt, "rate limited");
                last_error = Some(FetchError::RateLimited {
                    url: url.to_string(),
                });
                if !is_last {
                    std::thread::sleep(policy.rate_limit_backoff);
                }
            }
            Ok(response) => {
                return Err(FetchError::Status {
                    url: url.to_string(),
                    status: response.status,
                });
            }
            Err(err) => {
                tracing::debug!(%url, attempt, %err, "fetch attempt failed");
                last_error = Some(err);
                if !is_last {
                    std::thread::sleep(policy.retry_backoff);
                }
            }
        }
    }

    Err(last_error.unwrap_or_else(|| FetchError::Transport {
        url: url.to_string(),
        message: "no attempts made".to_owned(),
    }))
}

pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    pub fn new(user_agent: &str, timeout: Duration) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(user_agent)
                .map_err(|err| anyhow::anyhow!("invalid user agent {user_agent:?}: {err}"))?,
        );

        let client = reqwest::blocking::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|err| anyhow::anyhow!("build http client: {err}"))?;

        Ok(Self { client })
    }
}

impl Fetch for HttpFetcher {
    fn get(&mut self, url: &Url) -> Result<Response, FetchError> {
        let transport = |err: reqwest::Error| FetchError::Transport {
            url: url.to_string(),
            message: err.to_string(),
        };

        let response = self.client.get(url.clone()).send().map_err(transport)?;
        let status = response.status().as_u16();
        let final_url = response.url().clone();
        let body = response.bytes().map_err(transport)?.to_vec();

        Ok(Response {
            status,
            final_url,
            body,
        })
    }
}


#[cfg(test)]
mod tests {
    use super::stub::StubFetcher;
    use super::*;

    fn no_wait() -> RetryPolicy {
        RetryPolicy {
            attempts: 2,
            retry_backoff: Duration::ZERO,
            rate_limit_backoff: Duration::ZERO,
        }
    }

    fn url(s: &str) -> Url {
        Url::parse(s).expect("valid test url")
    }

    #[test]
    fn server_error_is_permanent_and_not_retried() {
        let target = "https://example.test/broken";
        let mut fetcher = StubFetcher::default().status(target, 500);
        let err = fetch_with_retry(&mut fetcher, &url(target), &no_wait()).unwrap_err();
        assert!(matches!(err, FetchError::Status { status: 500, .. }));
        assert_eq!(fetcher.count(target), 1);
    }

    #[test]
    fn rate_limit_retries_within_budget() -> anyhow::Result<()> {
        let target = "https://example.test/busy";
        let mut fetcher = StubFetcher::default()
            .status(target, 429)
            .page(target, "<p>ok</p>");
        let fetched = fetch_with_retry(&mut fetcher, &url(target), &no_wait())?;
        assert_eq!(fetched.body, "<p>ok</p>");
        assert_eq!(fetcher.count(target), 2);
        Ok(())
    }

    #[test]
    fn persistent_rate_limit_gives_up_after_budget() {
        let target = "https://example.test/busy";
        let mut fetcher = StubFetcher::default().status(target, 429);
        let err = fetch_with_retry(&mut fetcher, &url(target), &no_wait()).unwrap_err();
        assert!(matches!(err, FetchError::RateLimited { .. }));
        assert_eq!(fetcher.count(target), 2);
    }

    #[test]
    fn transport_error_is_retried_then_reported() {
        let target = "https://example.test/down";
        let mut fetcher = StubFetcher::default().transport_error(target);
        let err = fetch_with_retry(&mut fetcher, &url(target), &no_wait()).unwrap_err();
        assert!(matches!(err, FetchError::Transport { .. }));
        assert_eq!(fetcher.count(target), 2);
    }
}
