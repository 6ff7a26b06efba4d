//! HTTP plumbing shared by the adapters.

use std::time::Duration;

use groundwork_shared::{GroundworkError, Result};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

/// Maximum number of redirects to follow.
const MAX_REDIRECTS: usize = 5;

/// User-Agent string for outbound requests.
pub const USER_AGENT: &str = concat!("groundwork/", env!("CARGO_PKG_VERSION"));

/// Build a reqwest client whose every request is bounded by `timeout`.
pub fn build_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
        .timeout(timeout)
        .build()
        .map_err(|e| GroundworkError::Network(format!("failed to build HTTP client: {e}")))
}

/// Map a send result to a success response or a typed error.
pub(crate) fn check_status(
    result: std::result::Result<Response, reqwest::Error>,
    url: &str,
) -> Result<Response> {
    let response = result.map_err(|e| GroundworkError::Network(format!("{url}: {e}")))?;
    let status = response.status();
    if !status.is_success() {
        return Err(GroundworkError::Http {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }
    Ok(response)
}

/// Read a JSON body.
pub(crate) async fn read_json<T: DeserializeOwned>(response: Response, url: &str) -> Result<T> {
    response
        .json::<T>()
        .await
        .map_err(|e| GroundworkError::parse(format!("{url}: invalid JSON body: {e}")))
}

/// Decode each raw record on its own, dropping the ones that do not fit `T`.
pub(crate) fn decode_records<T: DeserializeOwned>(records: Vec<Value>, kind: &str) -> Vec<T> {
    let total = records.len();
    let decoded: Vec<T> = records
        .into_iter()
        .filter_map(|record| match serde_json::from_value(record) {
            Ok(value) => Some(value),
            Err(e) => {
                debug!(kind, error = %e, "skipping malformed record");
                None
            }
        })
        .collect();

    if decoded.len() < total {
        debug!(kind, total, kept = decoded.len(), "dropped malformed records");
    }
    decoded
}
