use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

use crate::{
    api::FlagError,
    organization::Organization,
    redis::{Client, CustomRedisError},
    utils::random_hex,
};

// TRICKY: This cache data is written by the dashboard API. If it ever goes out of sync, we'll bork.
pub const PROJECT_API_KEY_CACHE_PREFIX: &str = "hogmini:1:project_api_key:";
pub const PROJECT_ID_CACHE_PREFIX: &str = "hogmini:1:project:";
pub const ORGANIZATION_PROJECTS_CACHE_PREFIX: &str = "hogmini:1:organization_projects:";

pub const API_KEY_PREFIX: &str = "hog_live_";

const API_KEY_BYTES: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub name: String,
    pub api_key: String,
    #[serde(default)]
    pub organization_id: Option<String>,
}

/// `hog_live_` followed by 32 random bytes in hex.
pub fn generate_api_key<R: RngCore + ?Sized>(rng: &mut R) -> String {
    format!("{API_KEY_PREFIX}{}", random_hex(rng, API_KEY_BYTES))
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateProjectRequest {
    #[serde(default)]
    pub name: Option<String>,
}

impl CreateProjectRequest {
    pub fn validate(self) -> Result<String, FlagError> {
        self.name
            .filter(|name| !name.trim().is_empty())
            .ok_or(FlagError::MissingProjectName)
    }
}

fn parse_project(serialized: &str) -> Result<Project, FlagError> {
    serde_json::from_str(serialized).map_err(|e| {
        tracing::error!("failed to parse data to project: {}", e);
        FlagError::DataParsingError
    })
}

impl Project {
    /// Validates an API key, and returns the project it belongs to.
    #[instrument(skip_all)]
    pub async fn from_redis(
        client: Arc<dyn Client + Send + Sync>,
        api_key: &str,
    ) -> Result<Project, FlagError> {
        let serialized_project = client
            .get(format!("{PROJECT_API_KEY_CACHE_PREFIX}{}", api_key))
            .await?;

        parse_project(&serialized_project)
    }

    #[instrument(skip_all, fields(project_id = %id))]
    pub async fn from_id(
        client: Arc<dyn Client + Send + Sync>,
        id: &str,
    ) -> Result<Project, FlagError> {
        let serialized_project = client
            .get(format!("{PROJECT_ID_CACHE_PREFIX}{}", id))
            .await
            .map_err(|e| match e {
                CustomRedisError::NotFound => FlagError::ProjectNotFound,
                other => other.into(),
            })?;

        parse_project(&serialized_project)
    }

    /// Stores a new project under `organization`, reachable both by id and by
    /// its API key.
    #[instrument(skip_all, fields(organization_id = %organization.id))]
    pub async fn create(
        client: Arc<dyn Client + Send + Sync>,
        organization: &Organization,
        name: String,
        api_key: String,
    ) -> Result<Project, FlagError> {
        let project = Project {
            id: Uuid::now_v7().to_string(),
            name,
            api_key,
            organization_id: Some(organization.id.clone()),
        };
        let serialized = serde_json::to_string(&project).map_err(|e| {
            tracing::error!("failed to serialize project: {}", e);
            FlagError::DataParsingError
        })?;

        client
            .set(
                format!("{PROJECT_ID_CACHE_PREFIX}{}", project.id),
                serialized.clone(),
            )
            .await?;
        client
            .set(
                format!("{PROJECT_API_KEY_CACHE_PREFIX}{}", project.api_key),
                serialized,
            )
            .await?;

        // Last writer wins on the id list; concurrent creates in one organization can drop an entry
        let mut project_ids = project_ids_for(client.clone(), &organization.id).await?;
        project_ids.push(project.id.clone());
        let payload = serde_json::to_string(&project_ids).map_err(|e| {
            tracing::error!("failed to serialize project ids: {}", e);
            FlagError::DataParsingError
        })?;
        client
            .set(
                format!("{ORGANIZATION_PROJECTS_CACHE_PREFIX}{}", organization.id),
                payload,
            )
            .await?;

        tracing::info!(project_id = %project.id, "created project");
        Ok(project)
    }

    /// Projects of an organization, oldest first.
    #[instrument(skip_all, fields(organization_id = %organization_id))]
    pub async fn for_organization(
        client: Arc<dyn Client + Send + Sync>,
        organization_id: &str,
    ) -> Result<Vec<Project>, FlagError> {
        let mut projects = Vec::new();
        for id in project_ids_for(client.clone(), organization_id).await? {
            projects.push(Project::from_id(client.clone(), &id).await?);
        }
        Ok(projects)
    }
}

async fn project_ids_for(
    client: Arc<dyn Client + Send + Sync>,
    organization_id: &str,
) -> Result<Vec<String>, FlagError> {
    let serialized = match client
        .get(format!("{ORGANIZATION_PROJECTS_CACHE_PREFIX}{}", organization_id))
        .await
    {
        Ok(serialized) => serialized,
        Err(CustomRedisError::NotFound) => return Ok(vec![]),
        Err(e) => return Err(e.into()),
    };

    serde_json::from_str(&serialized).map_err(|e| {
        tracing::error!("failed to parse organization project ids: {}", e);
        FlagError::DataParsingError
    })
}
