//! Outbound HTTP client for untrusted targets.
//!
//! # Responsibilities
//! - Issue one GET per call against a caller-supplied URL
//! - Bound the whole exchange by a deadline
//! - Bound the buffered body by a byte cap
//! - Consult the target policy before connecting and on every redirect hop

use std::error::Error as StdError;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::time::timeout;
use url::Url;

use crate::config::FetchConfig;
use crate::fetch::policy::{AllowAll, TargetPolicy};

/// Redirect hops followed before the fetch is abandoned.
const MAX_REDIRECTS: usize = 10;

/// Why a fetch produced no contents.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("target refused: {0}")]
    Refused(String),

    #[error("fetch timed out after {0} seconds")]
    Timeout(u64),

    #[error("response body exceeds the {limit} byte limit")]
    TooLarge { limit: usize },

    #[error("{}", describe(.0))]
    Transport(#[from] reqwest::Error),
}

/// Render an error with its source chain, which is where reqwest keeps the
/// useful part ("Connection refused", DNS failures).
fn describe(err: &reqwest::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}

fn redirect_policy(policy: Arc<dyn TargetPolicy>) -> reqwest::redirect::Policy {
    reqwest::redirect::Policy::custom(move |attempt| {
        if attempt.previous().len() >= MAX_REDIRECTS {
            return attempt.error(format!("stopped after {} redirects", MAX_REDIRECTS));
        }
        match policy.check(attempt.url()) {
            Ok(()) => attempt.follow(),
            Err(reason) => attempt.error(format!("redirect target refused: {}", reason)),
        }
    })
}

/// Shared, bounded fetcher. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: reqwest::Client,
    deadline: Duration,
    max_body_bytes: usize,
    policy: Arc<dyn TargetPolicy>,
}

impl Fetcher {
    /// Build a fetcher from configuration with the `AllowAll` policy.
    pub fn new(config: &FetchConfig) -> Result<Self, FetchError> {
        Self::with_policy(config, Arc::new(AllowAll))
    }

    /// Build a fetcher whose `policy` vets the target and every redirect.
    pub fn with_policy(
        config: &FetchConfig,
        policy: Arc<dyn TargetPolicy>,
    ) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .user_agent(config.user_agent.clone())
            .redirect(redirect_policy(policy.clone()))
            .no_proxy()
            .build()?;

        Ok(Self {
            client,
            deadline: Duration::from_secs(config.timeout_secs),
            max_body_bytes: config.max_body_bytes,
            policy,
        })
    }

    /// Fetch `raw_url` and return its body as text.
    pub async fn fetch(&self, raw_url: &str) -> Result<String, FetchError> {
        let url = Url::parse(raw_url)?;
        self.policy.check(&url).map_err(FetchError::Refused)?;

        match timeout(self.deadline, self.fetch_body(url)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout(self.deadline.as_secs())),
        }
    }

    async fn fetch_body(&self, url: Url) -> Result<String, FetchError> {
        let mut response = self.client.get(url).send().await?;

        if let Some(length) = response.content_length() {
            if length > self.max_body_bytes as u64 {
                return Err(FetchError::TooLarge {
                    limit: self.max_body_bytes,
                });
            }
        }

        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            if body.len() + chunk.len() > self.max_body_bytes {
                return Err(FetchError::TooLarge {
                    limit: self.max_body_bytes,
                });
            }
            body.extend_from_slice(&chunk);
        }

        Ok(String::from_utf8_lossy(&body).into_owned())
    }
}
