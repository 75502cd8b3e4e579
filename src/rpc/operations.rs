//! The fixed table of operations a call may name.

use serde_json::json;

use crate::fetch::Fetcher;
use crate::observability::metrics;
use crate::rpc::outcome::{ErrorObject, Outcome};
use crate::rpc::params::Params;

/// Operations known to the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Fetch a URL and return its body.
    GetUrlContents,
}

const OPERATIONS: &[(&str, Operation)] = &[("getURLContents", Operation::GetUrlContents)];

impl Operation {
    /// Look up an operation by its wire name. Names are case-sensitive.
    pub fn lookup(name: &str) -> Option<Self> {
        OPERATIONS
            .iter()
            .find(|(wire_name, _)| *wire_name == name)
            .map(|(_, operation)| *operation)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Operation::GetUrlContents => "getURLContents",
        }
    }

    /// Run the operation. The returned outcome is final.
    pub async fn invoke(self, params: &Params, fetcher: &Fetcher) -> Outcome {
        match self {
            Operation::GetUrlContents => get_url_contents(params, fetcher).await,
        }
    }
}

async fn get_url_contents(params: &Params, fetcher: &Fetcher) -> Outcome {
    let url = match params.get("url").filter(|url| !url.is_empty()) {
        Some(url) => url,
        None => return Outcome::ProtocolFailure(ErrorObject::MISSING_PARAMETER),
    };

    match fetcher.fetch(url).await {
        Ok(contents) => {
            metrics::record_fetch_bytes(contents.len());
            Outcome::Success(json!({ "contents": contents }))
        }
        Err(e) => {
            tracing::debug!(url = %url, error = %e, "Fetch failed");
            Outcome::ApplicationFailure(json!({ "contents": "", "error": e.to_string() }))
        }
    }
}
