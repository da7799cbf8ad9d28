use axum::extract::State;
use axum::http::{HeaderMap, Method};
use axum::{debug_handler, Json};
use axum_client_ip::InsecureClientIp;
use bytes::Bytes;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::instrument;

use crate::{
    api::{FlagError, FlagsResponse},
    flag_definitions::{FeatureFlag, FeatureFlagList},
    flag_matching::FeatureFlagMatcher,
    project::Project,
    router,
    v0_request::FlagRequest,
};

#[derive(Debug, Serialize)]
pub struct SdkRulesResponse {
    pub flags: Vec<FeatureFlag>,
}

/// `application/json; charset=utf-8` -> `application/json`
fn media_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Feature flag evaluation endpoint.
/// Only supports a specific shape of data, and rejects any malformed data.
#[instrument(
    skip_all,
    fields(token, distinct_id, user_agent, content_type, method, ip)
)]
#[debug_handler]
pub async fn flags(
    state: State<router::State>,
    InsecureClientIp(ip): InsecureClientIp,
    headers: HeaderMap,
    method: Method,
    body: Bytes,
) -> Result<Json<FlagsResponse>, FlagError> {
    let user_agent = headers
        .get("user-agent")
        .map_or("unknown", |v| v.to_str().unwrap_or("unknown"));

    tracing::Span::current().record("user_agent", user_agent);
    tracing::Span::current().record("method", method.as_str());
    tracing::Span::current().record("ip", ip.to_string());

    let content_type = headers
        .get("content-type")
        .map_or("", |v| v.to_str().unwrap_or(""));
    let request = match media_type(content_type).as_str() {
        "application/json" => {
            tracing::Span::current().record("content_type", content_type);
            FlagRequest::from_bytes(body)
        }
        _ => {
            return Err(FlagError::RequestDecodingError(format!(
                "unsupported content type: {}",
                content_type
            )));
        }
    }?;

    let token = request.extract_token()?;
    tracing::Span::current().record("token", &token);

    let project = Project::from_redis(state.redis.clone(), &token).await?;

    let context = request.extract_context()?;
    tracing::Span::current().record("distinct_id", &context.user_id);

    let flag_list = FeatureFlagList::from_redis(state.redis.clone(), &project.id).await?;

    let response = FeatureFlagMatcher::new(context).evaluate_all(&flag_list.flags);
    tracing::debug!(
        project_id = %project.id,
        flag_count = flag_list.flags.len(),
        error_while_computing_flags = response.error_while_computing_flags,
        "evaluated flags"
    );

    Ok(Json(response))
}

/// Raw flag snapshots for SDKs that evaluate locally.
/// The API key travels as the whole `Authorization` header value.
#[instrument(skip_all)]
pub async fn sdk_rules(
    state: State<router::State>,
    headers: HeaderMap,
) -> Result<Json<SdkRulesResponse>, FlagError> {
    let api_key = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .ok_or(FlagError::NoTokenError)?;

    let project = Project::from_redis(state.redis.clone(), api_key).await?;
    let flag_list = FeatureFlagList::from_redis(state.redis.clone(), &project.id).await?;

    Ok(Json(SdkRulesResponse {
        flags: flag_list.flags,
    }))
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
