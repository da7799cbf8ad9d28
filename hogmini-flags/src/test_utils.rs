use anyhow::Error;
use serde_json::json;
use std::sync::Arc;

use crate::{
    flag_definitions::{self, FeatureFlag},
    project::{self, generate_api_key, Project},
    redis::Client,
};
use rand::{distributions::Alphanumeric, Rng};

pub fn random_string(prefix: &str, length: usize) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(Alphanumeric)
        .take(length)
        .map(char::from)
        .collect();
    format!("{}{}", prefix, suffix)
}

pub async fn insert_new_project_in_redis(
    client: Arc<dyn Client + Send + Sync>,
) -> Result<Project, Error> {
    let project = Project {
        id: random_string("proj_", 12),
        name: "project".to_string(),
        api_key: generate_api_key(&mut rand::thread_rng()),
        organization_id: None,
    };

    let serialized_project = serde_json::to_string(&project)?;
    client
        .set(
            format!(
                "{}{}",
                project::PROJECT_API_KEY_CACHE_PREFIX,
                project.api_key
            ),
            serialized_project.clone(),
        )
        .await?;
    client
        .set(
            format!("{}{}", project::PROJECT_ID_CACHE_PREFIX, project.id),
            serialized_project,
        )
        .await?;

    Ok(project)
}

/// Stores `flags` for a project. Without explicit flags, stores a single
/// `flag1` rolled out to 50%.
pub async fn insert_flags_for_project_in_redis(
    client: Arc<dyn Client + Send + Sync>,
    project_id: &str,
    flags: Option<Vec<FeatureFlag>>,
) -> Result<(), Error> {
    let payload = match flags {
        Some(flags) => serde_json::to_string(&flags)?,
        None => json!([{
            "id": random_string("flag_", 8),
            "key": "flag1",
            "description": "a flag",
            "isActive": true,
            "rules": [{"type": "percentage", "percentage": 50}],
            "projectId": project_id,
        }])
        .to_string(),
    };

    client
        .set(
            format!(
                "{}{}",
                flag_definitions::PROJECT_FLAGS_CACHE_PREFIX,
                project_id
            ),
            payload,
        )
        .await?;

    Ok(())
}
