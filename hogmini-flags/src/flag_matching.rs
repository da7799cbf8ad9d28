use std::collections::HashMap;

use thiserror::Error;

use crate::api::FlagsResponse;
use crate::flag_definitions::{FeatureFlag, Rule};

const FNV_OFFSET_BASIS: u32 = 0x811c9dc5;
const FNV_PRIME: u32 = 0x01000193;

/// Number of buckets users are spread over. Rollout percentages compare against this.
pub const BUCKET_COUNT: u32 = 100;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvalidInputError {
    #[error("userId is required")]
    MissingUserId,
    #[error("flag {flag_key}: rollout percentage {percentage} is outside [0, 100]")]
    PercentageOutOfRange { flag_key: String, percentage: i64 },
    #[error("flag {flag_key}: rule {index} is not a recognized rule: {rule}")]
    MalformedRule {
        flag_key: String,
        index: usize,
        rule: String,
    },
}

/// Who a flag is being evaluated for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluationContext {
    pub user_id: String,
}

impl EvaluationContext {
    pub fn new(user_id: impl Into<String>) -> Result<Self, InvalidInputError> {
        let user_id = user_id.into();
        if user_id.is_empty() {
            return Err(InvalidInputError::MissingUserId);
        }
        Ok(EvaluationContext { user_id })
    }
}

/// 32-bit FNV-1a over the UTF-8 bytes of `input`.
///
/// The algorithm and its constants are part of the rollout contract: every
/// SDK that buckets users must produce the same value for the same input, or
/// users flip in and out of rollouts between clients.
pub fn fnv1a_32(input: &str) -> u32 {
    input.bytes().fold(FNV_OFFSET_BASIS, |hash, byte| {
        (hash ^ u32::from(byte)).wrapping_mul(FNV_PRIME)
    })
}

/// The bucket in `[0, 100)` a user lands in for a given flag.
///
/// Given the same flag key and user, it'll always return the same bucket, across
/// processes and releases. Buckets are roughly uniform, so if we want to show a
/// feature to 20% of users we check `bucket < 20`. Because the bucket doesn't
/// depend on the percentage, raising a rollout only ever adds users.
pub fn calculate_bucket(flag_key: &str, user_id: &str) -> u32 {
    fnv1a_32(&format!("{flag_key}.{user_id}")) % BUCKET_COUNT
}

fn validate_rules(flag: &FeatureFlag) -> Result<(), InvalidInputError> {
    for (index, rule) in flag.rules.iter().enumerate() {
        match rule {
            Rule::Percentage { percentage, .. } if !(0..=100).contains(percentage) => {
                return Err(InvalidInputError::PercentageOutOfRange {
                    flag_key: flag.key.clone(),
                    percentage: *percentage,
                });
            }
            Rule::Percentage { .. } => {}
            Rule::Unrecognized(raw) => {
                return Err(InvalidInputError::MalformedRule {
                    flag_key: flag.key.clone(),
                    index,
                    rule: raw.to_string(),
                });
            }
        }
    }
    Ok(())
}

/// Decides whether `flag` is on for the user in `context`.
///
/// Pure: no I/O, no clock, no shared state. An inactive flag is off without
/// looking at its rules. Otherwise the first percentage rule decides; a flag with
/// no rules is on for everyone.
pub fn evaluate(flag: &FeatureFlag, context: &EvaluationContext) -> Result<bool, InvalidInputError> {
    if context.user_id.is_empty() {
        return Err(InvalidInputError::MissingUserId);
    }

    if !flag.is_active {
        return Ok(false);
    }

    validate_rules(flag)?;

    let rollout = flag.rules.iter().find_map(Rule::rollout_percentage);

    match rollout {
        None => Ok(true),
        Some(percentage) => {
            let bucket = i64::from(calculate_bucket(&flag.key, &context.user_id));
            Ok(bucket < percentage)
        }
    }
}

/// Evaluates a whole project's flags for one user.
#[derive(Debug)]
pub struct FeatureFlagMatcher {
    pub context: EvaluationContext,
}

impl FeatureFlagMatcher {
    pub fn new(context: EvaluationContext) -> Self {
        FeatureFlagMatcher { context }
    }

    /// A flag that fails to evaluate is reported as off, and the response is
    /// marked so the SDK knows the answer is a fallback.
    pub fn evaluate_all(&self, flags: &[FeatureFlag]) -> FlagsResponse {
        let mut error_while_computing_flags = false;
        let mut feature_flags = HashMap::with_capacity(flags.len());

        for flag in flags {
            let value = match evaluate(flag, &self.context) {
                Ok(value) => value,
                Err(e) => {
                    tracing::warn!(flag_key = %flag.key, "failed to evaluate flag: {}", e);
                    error_while_computing_flags = true;
                    false
                }
            };
            feature_flags.insert(flag.key.clone(), value);
        }

        FlagsResponse {
            error_while_computing_flags,
            feature_flags,
        }
    }
}
