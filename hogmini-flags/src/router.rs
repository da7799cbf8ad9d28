use std::sync::Arc;

use axum::{
    routing::{get, patch, post},
    Router,
};
use tower::limit::ConcurrencyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::{
    config::Config, flag_endpoint, organization_endpoint, project_endpoint, redis::Client,
    v0_endpoint,
};

#[derive(Clone)]
pub struct State {
    pub redis: Arc<dyn Client + Send + Sync>,
    pub config: Config,
}

pub fn router<R>(redis: Arc<R>, config: Config) -> Router
where
    R: Client + Send + Sync + 'static,
{
    let max_concurrent_requests = config.max_concurrent_requests;
    let state = State { redis, config };

    Router::new()
        .route("/health", get(v0_endpoint::health))
        // SDK surface
        .route("/decide", post(v0_endpoint::flags).get(v0_endpoint::flags))
        .route("/sdk/rules", get(v0_endpoint::sdk_rules))
        // Dashboard surface
        .route("/flags", post(flag_endpoint::create_flag))
        .route("/flags/details/:id", get(flag_endpoint::get_flag))
        .route("/flags/:id", patch(flag_endpoint::update_flag))
        .route("/projects/:project_id", get(project_endpoint::get_project))
        .route(
            "/projects/:project_id/flags",
            get(project_endpoint::list_flags),
        )
        .route(
            "/api/organizations",
            post(organization_endpoint::create_organization),
        )
        .route(
            "/api/organizations/:slug",
            get(organization_endpoint::get_organization),
        )
        .route(
            "/api/organizations/:slug/projects",
            get(project_endpoint::list_projects).post(project_endpoint::create_project),
        )
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(ConcurrencyLimitLayer::new(max_concurrent_requests))
}
