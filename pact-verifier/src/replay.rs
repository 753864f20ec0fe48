//! Request replay against the provider.

use crate::client::{ClientError, HttpClient, ProviderRequest, ProviderResponse};
use crate::contract::Request;
use crate::directive::example_value;
use crate::error::InteractionError;
use reqwest::Method;
use serde_json::Value;
use tracing::{debug, instrument};
use url::Url;

/// Build the outbound request for an interaction.
///
/// The path is appended to any path prefix of `base_url`. Matchers embedded
/// in the body are replaced by their example values, then the body is
/// serialized per the request's `Content-Type`: JSON by default, form
/// encoding for `application/x-www-form-urlencoded`, and raw text for string
/// bodies with a non-JSON content type.
///
/// # Errors
///
/// Returns [`ClientError::InvalidRequest`] for an invalid method or body.
pub fn build_request(request: &Request, base_url: &Url) -> Result<ProviderRequest, ClientError> {
    let method = Method::from_bytes(request.method.to_ascii_uppercase().as_bytes())
        .map_err(|e| ClientError::InvalidRequest(format!("method {:?}: {e}", request.method)))?;

    let mut url = base_url.clone();
    let prefix = base_url.path().trim_end_matches('/');
    let path = if request.path.starts_with('/') {
        format!("{prefix}{}", request.path)
    } else {
        format!("{prefix}/{}", request.path)
    };
    url.set_path(&path);
    url.set_query(None);
    if let Some(query) = &request.query {
        let pairs = query.pairs();
        if !pairs.is_empty() {
            url.query_pairs_mut().extend_pairs(pairs);
        }
    }

    let mut headers: Vec<(String, String)> = request
        .headers
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    headers.sort();

    let body = match &request.body {
        None => None,
        Some(body) => {
            let content_type = request.header("Content-Type").map(str::to_ascii_lowercase);
            let (bytes, default_type) = encode_body(&example_value(body), content_type.as_deref())?;
            if content_type.is_none() {
                headers.push(("Content-Type".to_string(), default_type.to_string()));
            }
            Some(bytes)
        }
    };

    Ok(ProviderRequest {
        method,
        url,
        headers,
        body,
    })
}

fn encode_body(body: &Value, content_type: Option<&str>) -> Result<(Vec<u8>, &'static str), ClientError> {
    let is_json = content_type.is_none_or(|ct| ct.contains("json"));
    match body {
        Value::Object(fields) if content_type.is_some_and(|ct| ct.contains("x-www-form-urlencoded")) => {
            let mut form = url::form_urlencoded::Serializer::new(String::new());
            for (name, value) in fields {
                match value {
                    Value::String(s) => form.append_pair(name, s),
                    other => form.append_pair(name, &other.to_string()),
                };
            }
            Ok((form.finish().into_bytes(), "application/x-www-form-urlencoded"))
        }
        Value::String(text) if !is_json => Ok((text.clone().into_bytes(), "text/plain")),
        json => serde_json::to_vec(json)
            .map(|bytes| (bytes, "application/json"))
            .map_err(|e| ClientError::InvalidRequest(format!("body: {e}"))),
    }
}

/// Send an interaction's request to the provider. Exactly one call, no retry.
///
/// # Errors
///
/// Returns [`InteractionError::Transport`] if the request cannot be built or
/// sent.
#[instrument(skip_all, fields(method = %request.method, path = %request.path))]
pub async fn replay(
    client: &dyn HttpClient,
    base_url: &Url,
    request: &Request,
) -> Result<ProviderResponse, InteractionError> {
    let outbound = build_request(request, base_url).map_err(transport)?;
    debug!(url = %outbound.url, "replaying request");
    let response = client.send(outbound).await.map_err(transport)?;
    debug!(status = response.status, "provider responded");
    Ok(response)
}

fn transport(error: ClientError) -> InteractionError {
    InteractionError::Transport {
        message: error.to_string(),
    }
}
