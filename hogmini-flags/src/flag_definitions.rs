use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

use crate::{
    api::FlagError,
    project::Project,
    redis::{Client, CustomRedisError},
};

// TRICKY: This cache data is written by the dashboard API. If it ever goes out of sync, we'll bork.
pub const PROJECT_FLAGS_CACHE_PREFIX: &str = "hogmini:1:project_flags:";
/// flag id -> owning project id
pub const FLAG_PROJECT_CACHE_PREFIX: &str = "hogmini:1:flag_project:";
/// `{projectId}:{key}` -> flag id. Claimed with SET NX, which keeps keys unique per project.
pub const FLAG_KEY_CACHE_PREFIX: &str = "hogmini:1:project_flag_key:";

pub const PERCENTAGE_RULE_TYPE: &str = "percentage";

/// A targeting rule attached to a flag.
///
/// Rules round-trip through JSON without loss: the stored object is kept as-is
/// and serialized back unchanged. Anything that isn't a well-formed percentage
/// rule is `Unrecognized`, so a bad rule written by the dashboard shows up as an
/// evaluation error instead of disappearing at parse time.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(from = "Value", into = "Value")]
pub enum Rule {
    /// `{"type": "percentage", "percentage": 25}`. The dashboard writes the
    /// number under `value`.
    Percentage { percentage: i64, raw: Value },
    Unrecognized(Value),
}

impl Rule {
    pub fn percentage(percentage: i64) -> Self {
        Rule::Percentage {
            percentage,
            raw: json!({"type": PERCENTAGE_RULE_TYPE, "percentage": percentage}),
        }
    }

    pub fn rollout_percentage(&self) -> Option<i64> {
        match self {
            Rule::Percentage { percentage, .. } => Some(*percentage),
            Rule::Unrecognized(_) => None,
        }
    }
}

impl From<Value> for Rule {
    fn from(raw: Value) -> Self {
        if raw.get("type").and_then(Value::as_str) != Some(PERCENTAGE_RULE_TYPE) {
            return Rule::Unrecognized(raw);
        }
        let percentage = raw
            .get("percentage")
            .or_else(|| raw.get("value"))
            .and_then(Value::as_i64);
        match percentage {
            Some(percentage) => Rule::Percentage { percentage, raw },
            None => Rule::Unrecognized(raw),
        }
    }
}

impl From<Rule> for Value {
    fn from(rule: Rule) -> Self {
        match rule {
            Rule::Percentage { raw, .. } | Rule::Unrecognized(raw) => raw,
        }
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<Rule>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<Rule>>::deserialize(deserializer)?.unwrap_or_default())
}

/// A snapshot of one flag, as the dashboard stores it.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureFlag {
    #[serde(default)]
    pub id: String,
    pub key: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub rules: Vec<Rule>,
    #[serde(default)]
    pub project_id: String,
    /// Record fields this service doesn't read, e.g. `createdAt`. Passed through untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FeatureFlag {
    pub fn new(key: impl Into<String>, is_active: bool, rules: Vec<Rule>) -> Self {
        FeatureFlag {
            id: String::new(),
            key: key.into(),
            description: None,
            is_active,
            rules,
            project_id: String::new(),
            extra: Map::new(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateFlagRequest {
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub rules: Vec<Rule>,
    #[serde(default)]
    pub project_id: Option<String>,
}

impl CreateFlagRequest {
    /// New flags start inactive with no rules unless told otherwise.
    pub fn validate(self) -> Result<FeatureFlag, FlagError> {
        let key = self.key.filter(|key| !key.is_empty());
        let project_id = self.project_id.filter(|id| !id.is_empty());
        let (Some(key), Some(project_id)) = (key, project_id) else {
            return Err(FlagError::MissingFlagFields);
        };

        Ok(FeatureFlag {
            description: self.description,
            project_id,
            ..FeatureFlag::new(key, self.is_active.unwrap_or(false), self.rules)
        })
    }
}

/// Partial update: absent (or null) fields are left as they are.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateFlagRequest {
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub rules: Option<Vec<Rule>>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct FeatureFlagList {
    pub flags: Vec<FeatureFlag>,
}

impl FeatureFlagList {
    /// Returns feature flags given a project_id
    #[instrument(skip_all)]
    pub async fn from_redis(
        client: Arc<dyn Client + Send + Sync>,
        project_id: &str,
    ) -> Result<FeatureFlagList, FlagError> {
        let serialized_flags = match client
            .get(format!("{PROJECT_FLAGS_CACHE_PREFIX}{}", project_id))
            .await
        {
            Ok(serialized_flags) => serialized_flags,
            // A project that never had a flag created has no cache entry
            Err(CustomRedisError::NotFound) => return Ok(FeatureFlagList { flags: vec![] }),
            Err(e) => return Err(e.into()),
        };

        let flags: Vec<FeatureFlag> = serde_json::from_str(&serialized_flags).map_err(|e| {
            tracing::error!("failed to parse data to flags list: {}", e);
            FlagError::DataParsingError
        })?;

        Ok(FeatureFlagList { flags })
    }

    pub async fn update_flags_in_redis(
        client: Arc<dyn Client + Send + Sync>,
        project_id: &str,
        flags: &FeatureFlagList,
    ) -> Result<(), FlagError> {
        let payload = serde_json::to_string(&flags.flags).map_err(|e| {
            tracing::error!("failed to serialize flags: {}", e);
            FlagError::DataParsingError
        })?;

        tracing::info!(
            project_id = %project_id,
            flag_count = flags.flags.len(),
            "writing flags to redis"
        );

        client
            .set(format!("{PROJECT_FLAGS_CACHE_PREFIX}{}", project_id), payload)
            .await?;

        Ok(())
    }
}

async fn project_id_for_flag(
    client: Arc<dyn Client + Send + Sync>,
    id: &str,
) -> Result<String, FlagError> {
    client
        .get(format!("{FLAG_PROJECT_CACHE_PREFIX}{}", id))
        .await
        .map_err(|e| match e {
            CustomRedisError::NotFound => FlagError::FlagNotFound,
            other => other.into(),
        })
}

// The project flag list is rewritten whole on every change, so concurrent writes
// to one project's flags are last-writer-wins.
impl FeatureFlag {
    /// Adds `flag` to its project under a fresh id. Keys are unique per project.
    #[instrument(skip_all, fields(project_id = %flag.project_id, key = %flag.key))]
    pub async fn create(
        client: Arc<dyn Client + Send + Sync>,
        mut flag: FeatureFlag,
    ) -> Result<FeatureFlag, FlagError> {
        Project::from_id(client.clone(), &flag.project_id).await?;

        flag.id = Uuid::now_v7().to_string();
        let claimed = client
            .set_nx(
                format!("{FLAG_KEY_CACHE_PREFIX}{}:{}", flag.project_id, flag.key),
                flag.id.clone(),
            )
            .await?;
        if !claimed {
            return Err(FlagError::FlagAlreadyExists);
        }

        client
            .set(
                format!("{FLAG_PROJECT_CACHE_PREFIX}{}", flag.id),
                flag.project_id.clone(),
            )
            .await?;

        let mut list = FeatureFlagList::from_redis(client.clone(), &flag.project_id).await?;
        list.flags.push(flag.clone());
        FeatureFlagList::update_flags_in_redis(client, &flag.project_id, &list).await?;

        Ok(flag)
    }

    #[instrument(skip_all, fields(flag_id = %id))]
    pub async fn from_id(
        client: Arc<dyn Client + Send + Sync>,
        id: &str,
    ) -> Result<FeatureFlag, FlagError> {
        let project_id = project_id_for_flag(client.clone(), id).await?;

        FeatureFlagList::from_redis(client, &project_id)
            .await?
            .flags
            .into_iter()
            .find(|flag| flag.id == id)
            .ok_or(FlagError::FlagNotFound)
    }

    /// Toggles a flag and/or replaces its rules.
    #[instrument(skip_all, fields(flag_id = %id))]
    pub async fn update(
        client: Arc<dyn Client + Send + Sync>,
        id: &str,
        update: UpdateFlagRequest,
    ) -> Result<FeatureFlag, FlagError> {
        let project_id = project_id_for_flag(client.clone(), id).await?;
        let mut list = FeatureFlagList::from_redis(client.clone(), &project_id).await?;

        let flag = list
            .flags
            .iter_mut()
            .find(|flag| flag.id == id)
            .ok_or(FlagError::FlagNotFound)?;
        if let Some(is_active) = update.is_active {
            flag.is_active = is_active;
        }
        if let Some(rules) = update.rules {
            flag.rules = rules;
        }
        let updated = flag.clone();

        FeatureFlagList::update_flags_in_redis(client, &project_id, &list).await?;
        Ok(updated)
    }
}
