use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

use crate::{
    api::FlagError,
    redis::{Client, CustomRedisError},
    unique_name::{acquire_unique_name, make_slug, AcquireError, SuffixGenerator},
};

pub const ORGANIZATION_SLUG_CACHE_PREFIX: &str = "hogmini:1:organization_slug:";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Organization {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
}

/// Body of an organization create request. Every field is optional on the
/// wire; `validate` decides what is actually required.
#[derive(Debug, Default, Deserialize)]
pub struct CreateOrganizationRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrganization {
    pub name: String,
    pub description: Option<String>,
    /// Slug to try first. Conflicts get a random suffix.
    pub base_slug: String,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl CreateOrganizationRequest {
    pub fn validate(self) -> Result<NewOrganization, FlagError> {
        let name = non_empty(self.name).ok_or(FlagError::MissingOrganizationName)?;

        let base_slug = match non_empty(self.slug) {
            Some(slug) => slug.trim().to_string(),
            None => make_slug(&name),
        };
        if base_slug.is_empty() {
            return Err(FlagError::InvalidSlug(name));
        }

        Ok(NewOrganization {
            name,
            description: non_empty(self.description),
            base_slug,
        })
    }
}

fn slug_key(slug: &str) -> String {
    format!("{ORGANIZATION_SLUG_CACHE_PREFIX}{slug}")
}

impl Organization {
    /// Stores a new organization under the first free slug derived from
    /// `new_org.base_slug`.
    #[instrument(skip_all, fields(base_slug = %new_org.base_slug))]
    pub async fn create<S>(
        client: Arc<dyn Client + Send + Sync>,
        new_org: NewOrganization,
        max_attempts: usize,
        suffixes: &mut S,
    ) -> Result<Organization, FlagError>
    where
        S: SuffixGenerator + Send,
    {
        let template = Organization {
            id: Uuid::now_v7().to_string(),
            name: new_org.name,
            slug: String::new(),
            description: new_org.description,
        };

        let claimed = acquire_unique_name(&new_org.base_slug, max_attempts, suffixes, |slug| {
            let client = client.clone();
            let candidate = Organization {
                slug,
                ..template.clone()
            };
            async move {
                let serialized = serde_json::to_string(&candidate).map_err(|e| {
                    tracing::error!("failed to serialize organization: {}", e);
                    FlagError::DataParsingError
                })?;
                Ok::<_, FlagError>(client.set_nx(slug_key(&candidate.slug), serialized).await?)
            }
        })
        .await;

        match claimed {
            Ok(slug) => {
                tracing::info!(slug = %slug, "created organization");
                Ok(Organization { slug, ..template })
            }
            Err(AcquireError::Exhausted { base, attempts }) => {
                tracing::warn!(base = %base, attempts, "no free organization slug");
                Err(FlagError::SlugUnavailable { base, attempts })
            }
            Err(AcquireError::Claim(e)) => Err(e),
        }
    }

    #[instrument(skip_all)]
    pub async fn from_redis(
        client: Arc<dyn Client + Send + Sync>,
        slug: &str,
    ) -> Result<Organization, FlagError> {
        let serialized = client.get(slug_key(slug)).await.map_err(|e| match e {
            CustomRedisError::NotFound => FlagError::OrganizationNotFound,
            other => other.into(),
        })?;

        serde_json::from_str(&serialized).map_err(|e| {
            tracing::error!("failed to parse data to organization: {}", e);
            FlagError::DataParsingError
        })
    }
}
