use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use bytes::Bytes;
use tracing::instrument;

use crate::{
    api::FlagError,
    flag_definitions::{CreateFlagRequest, FeatureFlag, UpdateFlagRequest},
    router,
};

#[instrument(skip_all)]
pub async fn create_flag(
    state: State<router::State>,
    body: Bytes,
) -> Result<(StatusCode, Json<FeatureFlag>), FlagError> {
    let draft = serde_json::from_slice::<CreateFlagRequest>(&body)?.validate()?;

    let flag = match FeatureFlag::create(state.redis.clone(), draft).await {
        Err(FlagError::FlagAlreadyExists) => {
            tracing::warn!("rejected duplicate flag key");
            return Err(FlagError::FlagAlreadyExists);
        }
        result => result?,
    };
    tracing::info!(flag_id = %flag.id, key = %flag.key, "created flag");

    Ok((StatusCode::CREATED, Json(flag)))
}

#[instrument(skip_all, fields(flag_id = %id))]
pub async fn get_flag(
    state: State<router::State>,
    Path(id): Path<String>,
) -> Result<Json<FeatureFlag>, FlagError> {
    Ok(Json(FeatureFlag::from_id(state.redis.clone(), &id).await?))
}

/// Kill switch toggle and rule replacement from the dashboard.
#[instrument(skip_all, fields(flag_id = %id))]
pub async fn update_flag(
    state: State<router::State>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<FeatureFlag>, FlagError> {
    let update: UpdateFlagRequest = serde_json::from_slice(&body)?;

    Ok(Json(
        FeatureFlag::update(state.redis.clone(), &id, update).await?,
    ))
}
