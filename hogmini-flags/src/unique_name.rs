//! Allocation of unique, human-readable names (organization slugs).
//!
//! The first attempt claims the base name as-is. Each conflict after that
//! retries with a random suffix appended, until `max_attempts` claims have been
//! made.

use std::future::Future;

use once_cell::sync::Lazy;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use regex::Regex;
use thiserror::Error;

use crate::utils::random_hex;

pub const DEFAULT_MAX_ATTEMPTS: usize = 6;

const SUFFIX_BYTES: usize = 3;

static NON_SLUG_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9]+").unwrap());

#[derive(Error, Debug)]
pub enum AcquireError<E: std::error::Error + 'static> {
    #[error("no free name for {base} after {attempts} attempts")]
    Exhausted { base: String, attempts: usize },
    #[error(transparent)]
    Claim(E),
}

/// Source of the suffixes appended to a name after a conflict.
pub trait SuffixGenerator {
    fn next_suffix(&mut self) -> String;
}

/// Lowercase hex of a few random bytes, e.g. `3fa09c`.
pub struct RandomHexSuffix<R> {
    rng: R,
}

impl<R: RngCore> RandomHexSuffix<R> {
    pub fn new(rng: R) -> Self {
        RandomHexSuffix { rng }
    }
}

impl RandomHexSuffix<StdRng> {
    pub fn from_entropy() -> Self {
        RandomHexSuffix::new(StdRng::from_entropy())
    }
}

impl<R: RngCore> SuffixGenerator for RandomHexSuffix<R> {
    fn next_suffix(&mut self) -> String {
        random_hex(&mut self.rng, SUFFIX_BYTES)
    }
}

/// URL-friendly slug for a display name: `"Acme, Inc."` becomes `"acme-inc"`.
pub fn make_slug(name: &str) -> String {
    NON_SLUG_CHARS
        .replace_all(&name.to_lowercase(), "-")
        .trim_matches('-')
        .to_string()
}

/// Cleans a slug that arrived in a URL path: surrounding whitespace and
/// accidental trailing dots or slashes are dropped.
pub fn normalize_slug(raw: &str) -> String {
    raw.trim().trim_end_matches(['.', '/']).to_string()
}

/// Claims `base`, or `base-<suffix>` after conflicts, and returns the name that
/// was claimed.
///
/// `claim` returns `Ok(true)` when it took the name and `Ok(false)` when the name
/// was already taken. Claim errors are returned immediately, without retrying.
pub async fn acquire_unique_name<S, F, Fut, E>(
    base: &str,
    max_attempts: usize,
    suffixes: &mut S,
    mut claim: F,
) -> Result<String, AcquireError<E>>
where
    S: SuffixGenerator + ?Sized,
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<bool, E>>,
    E: std::error::Error + 'static,
{
    for attempt in 0..max_attempts {
        let candidate = if attempt == 0 {
            base.to_string()
        } else {
            format!("{base}-{}", suffixes.next_suffix())
        };

        if claim(candidate.clone()).await.map_err(AcquireError::Claim)? {
            return Ok(candidate);
        }
        tracing::debug!(attempt, candidate = %candidate, "name already taken");
    }

    Err(AcquireError::Exhausted {
        base: base.to_string(),
        attempts: max_attempts,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::{Arc, Mutex};

    use rand::rngs::mock::StepRng;

    use super::*;

    struct CountingSuffix {
        next: usize,
    }

    impl SuffixGenerator for CountingSuffix {
        fn next_suffix(&mut self) -> String {
            self.next += 1;
            format!("s{}", self.next)
        }
    }

    fn taken(names: &[&str]) -> Arc<Mutex<HashSet<String>>> {
        Arc::new(Mutex::new(names.iter().map(|n| n.to_string()).collect()))
    }

    async fn claim_in(
        names: Arc<Mutex<HashSet<String>>>,
        candidate: String,
    ) -> Result<bool, std::io::Error> {
        Ok(names.lock().unwrap().insert(candidate))
    }

    #[test]
    fn test_make_slug() {
        assert_eq!(make_slug("Acme"), "acme");
        assert_eq!(make_slug("Acme, Inc."), "acme-inc");
        assert_eq!(make_slug("  Hog  Mini  2  "), "hog-mini-2");
        assert_eq!(make_slug("--already-sluggy--"), "already-sluggy");
        assert_eq!(make_slug("!!!"), "");
    }

    #[test]
    fn test_normalize_slug() {
        assert_eq!(normalize_slug(" acme "), "acme");
        assert_eq!(normalize_slug("acme./"), "acme");
        assert_eq!(normalize_slug("acme-inc"), "acme-inc");
    }

    #[test]
    fn test_random_hex_suffix_shape() {
        let mut suffixes = RandomHexSuffix::new(StepRng::new(0xabcdef, 1));

        let suffix = suffixes.next_suffix();
        assert_eq!(suffix.len(), SUFFIX_BYTES * 2);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[tokio::test]
    async fn test_free_base_name_is_claimed_first() {
        let names = taken(&[]);
        let mut suffixes = CountingSuffix { next: 0 };

        let name = acquire_unique_name("acme", 6, &mut suffixes, |candidate| {
            claim_in(names.clone(), candidate)
        })
        .await
        .unwrap();

        assert_eq!(name, "acme");
        assert_eq!(suffixes.next, 0);
    }

    #[tokio::test]
    async fn test_conflicts_retry_with_fresh_suffixes() {
        let names = taken(&["acme", "acme-s1", "acme-s2"]);
        let mut suffixes = CountingSuffix { next: 0 };

        let name = acquire_unique_name("acme", 6, &mut suffixes, |candidate| {
            claim_in(names.clone(), candidate)
        })
        .await
        .unwrap();

        assert_eq!(name, "acme-s3");
        assert!(names.lock().unwrap().contains("acme-s3"));
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let attempts = Arc::new(Mutex::new(Vec::new()));
        let mut suffixes = CountingSuffix { next: 0 };

        let result = acquire_unique_name("acme", 6, &mut suffixes, |candidate| {
            let attempts = attempts.clone();
            async move {
                attempts.lock().unwrap().push(candidate);
                Ok::<_, std::io::Error>(false)
            }
        })
        .await;

        match result {
            Err(AcquireError::Exhausted { base, attempts }) => {
                assert_eq!(base, "acme");
                assert_eq!(attempts, 6);
            }
            other => panic!("Expected Exhausted, got {:?}", other),
        }
        assert_eq!(
            *attempts.lock().unwrap(),
            vec!["acme", "acme-s1", "acme-s2", "acme-s3", "acme-s4", "acme-s5"]
        );
    }

    #[tokio::test]
    async fn test_claim_errors_are_not_retried() {
        let calls = Arc::new(Mutex::new(0));
        let mut suffixes = CountingSuffix { next: 0 };

        let result = acquire_unique_name("acme", 6, &mut suffixes, |_| {
            let calls = calls.clone();
            async move {
                *calls.lock().unwrap() += 1;
                Err::<bool, _>(std::io::Error::new(std::io::ErrorKind::Other, "storage down"))
            }
        })
        .await;

        assert!(matches!(result, Err(AcquireError::Claim(_))));
        assert_eq!(*calls.lock().unwrap(), 1);
    }
}
