use crate::{excerpt, parse_response, InvokeError, Result};

/// POST `input` as JSON to `url` and parse the response body as JSON.
///
/// Any non-2xx status is an application failure carrying the status line and
/// an excerpt of the body.
pub(crate) async fn post_json(
    client: &reqwest::Client,
    url: &str,
    input: &serde_json::Value,
) -> Result<serde_json::Value> {
    let transport = |e: reqwest::Error| InvokeError::Transport {
        address: url.to_string(),
        message: e.to_string(),
    };

    let resp = client.post(url).json(input).send().await.map_err(transport)?;
    let status = resp.status();
    let body = resp.text().await.map_err(transport)?;
    tracing::debug!(address = url, %status, body_bytes = body.len(), "collaborator responded");

    if !status.is_success() {
        return Err(InvokeError::Failed {
            address: url.to_string(),
            message: format!("HTTP {status}: {}", excerpt(&body)),
        });
    }

    parse_response(url, &body)
}
