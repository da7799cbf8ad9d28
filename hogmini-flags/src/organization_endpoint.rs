use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use bytes::Bytes;
use tracing::instrument;

use crate::{
    api::FlagError,
    organization::{CreateOrganizationRequest, Organization},
    router,
    unique_name::{normalize_slug, RandomHexSuffix},
};

#[instrument(skip_all)]
pub async fn create_organization(
    state: State<router::State>,
    body: Bytes,
) -> Result<(StatusCode, Json<Organization>), FlagError> {
    let request: CreateOrganizationRequest = serde_json::from_slice(&body)?;
    let new_org = request.validate()?;

    let mut suffixes = RandomHexSuffix::from_entropy();
    let organization = Organization::create(
        state.redis.clone(),
        new_org,
        state.config.slug_max_attempts.get(),
        &mut suffixes,
    )
    .await?;

    Ok((StatusCode::CREATED, Json(organization)))
}

/// Resolves an organization from a slug taken from a URL path.
pub(crate) async fn organization_for_path(
    state: &router::State,
    raw_slug: &str,
) -> Result<Organization, FlagError> {
    let slug = normalize_slug(raw_slug);
    tracing::Span::current().record("slug", slug.as_str());

    match Organization::from_redis(state.redis.clone(), &slug).await {
        Err(FlagError::OrganizationNotFound) => {
            tracing::warn!("Organization lookup failed for slug: {}", slug);
            Err(FlagError::OrganizationNotFound)
        }
        result => result,
    }
}

#[instrument(skip_all, fields(slug))]
pub async fn get_organization(
    state: State<router::State>,
    Path(slug): Path<String>,
) -> Result<Json<Organization>, FlagError> {
    Ok(Json(organization_for_path(&state, &slug).await?))
}
