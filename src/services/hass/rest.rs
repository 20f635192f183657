use reqwest::header::CONTENT_TYPE;
use tracing::{debug, instrument};
use url::Url;

use super::{EntityState, HassError};

/// Fetch the current state of every entity from the REST API.
///
/// Used once at startup to seed properties before events arrive. Not retried.
///
/// # Errors
/// Returns `HassError::Http` if the request fails, `HassError::HttpStatus` on a
/// non-success status and `HassError::Decode` if the body is not a state list.
#[instrument(skip(http, token), fields(base = %base))]
pub async fn fetch_states(
    http: &reqwest::Client,
    base: &Url,
    token: &str,
) -> Result<Vec<EntityState>, HassError> {
    let url = base.join("api/states")?;

    let response = http
        .get(url.clone())
        .bearer_auth(token)
        .header(CONTENT_TYPE, "application/json")
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        return Err(HassError::HttpStatus {
            status: status.as_u16(),
            url: url.to_string(),
        });
    }

    let body = response.bytes().await?;
    let states: Vec<EntityState> = serde_json::from_slice(&body)?;

    debug!(count = states.len(), "Fetched entity states");
    Ok(states)
}
