use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use bytes::Bytes;
use tracing::instrument;

use crate::{
    api::FlagError,
    flag_definitions::FeatureFlagList,
    organization_endpoint::organization_for_path,
    project::{generate_api_key, CreateProjectRequest, Project},
    router,
};

#[instrument(skip_all, fields(slug))]
pub async fn create_project(
    state: State<router::State>,
    Path(slug): Path<String>,
    body: Bytes,
) -> Result<(StatusCode, Json<Project>), FlagError> {
    let name = serde_json::from_slice::<CreateProjectRequest>(&body)?.validate()?;
    let organization = organization_for_path(&state, &slug).await?;

    let api_key = generate_api_key(&mut rand::thread_rng());
    let project = Project::create(state.redis.clone(), &organization, name, api_key).await?;

    Ok((StatusCode::CREATED, Json(project)))
}

#[instrument(skip_all, fields(slug))]
pub async fn list_projects(
    state: State<router::State>,
    Path(slug): Path<String>,
) -> Result<Json<Vec<Project>>, FlagError> {
    let organization = organization_for_path(&state, &slug).await?;

    Ok(Json(
        Project::for_organization(state.redis.clone(), &organization.id).await?,
    ))
}

/// Project details, including the API key the dashboard shows for SDK setup.
#[instrument(skip_all, fields(project_id = %project_id))]
pub async fn get_project(
    state: State<router::State>,
    Path(project_id): Path<String>,
) -> Result<Json<Project>, FlagError> {
    Ok(Json(
        Project::from_id(state.redis.clone(), &project_id).await?,
    ))
}

/// Dashboard listing of a project's flags, sorted by key.
#[instrument(skip_all, fields(project_id = %project_id))]
pub async fn list_flags(
    state: State<router::State>,
    Path(project_id): Path<String>,
) -> Result<Json<FeatureFlagList>, FlagError> {
    let mut flag_list = FeatureFlagList::from_redis(state.redis.clone(), &project_id).await?;
    flag_list.flags.sort_by(|a, b| a.key.cmp(&b.key));

    Ok(Json(flag_list))
}
