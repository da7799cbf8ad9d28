use std::net::SocketAddr;
use std::num::NonZeroUsize;
use std::ops::Deref;
use std::str::FromStr;

use envconfig::Envconfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlexBool(pub bool);

impl FromStr for FlexBool {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(FlexBool(true)),
            "false" | "0" | "no" | "off" | "" => Ok(FlexBool(false)),
            _ => Err(format!("Invalid boolean value: {}", s)),
        }
    }
}

impl Deref for FlexBool {
    type Target = bool;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[derive(Envconfig, Clone, Debug)]
pub struct Config {
    #[envconfig(default = "127.0.0.1:3001")]
    pub address: SocketAddr,

    #[envconfig(default = "redis://localhost:6379/")]
    pub redis_url: String,

    #[envconfig(default = "100")]
    pub redis_timeout_ms: u64,

    #[envconfig(default = "1024")]
    pub max_concurrent_requests: usize,

    // Attempts include the unsuffixed slug, so 6 means the base plus 5 suffixed retries
    #[envconfig(default = "6")]
    pub slug_max_attempts: NonZeroUsize,

    #[envconfig(from = "DEBUG", default = "false")]
    pub debug: FlexBool,
}

impl Config {
    pub fn default_test_config() -> Self {
        Self {
            address: SocketAddr::from(([127, 0, 0, 1], 0)),
            redis_url: "redis://localhost:6379/".to_string(),
            redis_timeout_ms: 100,
            max_concurrent_requests: 1024,
            slug_max_attempts: NonZeroUsize::MIN.saturating_add(5),
            debug: FlexBool(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn test_flex_bool_parsing() {
        for truthy in ["true", "TRUE", "1", "yes", " on "] {
            assert!(*truthy.parse::<FlexBool>().unwrap(), "{truthy}");
        }
        for falsy in ["false", "0", "no", "off", ""] {
            assert!(!*falsy.parse::<FlexBool>().unwrap(), "{falsy}");
        }
        assert!("maybe".parse::<FlexBool>().is_err());
    }

    #[test]
    fn test_default_config() {
        let config = Config::init_from_hashmap(&Default::default()).unwrap();
        assert_eq!(config.address, "127.0.0.1:3001".parse().unwrap());
        assert_eq!(config.redis_url, "redis://localhost:6379/");
        assert_eq!(config.redis_timeout_ms, 100);
        assert_eq!(config.max_concurrent_requests, 1024);
        assert_eq!(config.slug_max_attempts.get(), 6);
        assert!(!*config.debug);
    }

    #[test]
    fn test_slug_max_attempts_must_allow_one_claim() {
        let zero = HashMap::from([("SLUG_MAX_ATTEMPTS".to_string(), "0".to_string())]);
        assert!(Config::init_from_hashmap(&zero).is_err());

        let one = HashMap::from([("SLUG_MAX_ATTEMPTS".to_string(), "1".to_string())]);
        assert_eq!(
            Config::init_from_hashmap(&one)
                .unwrap()
                .slug_max_attempts
                .get(),
            1
        );
    }
}
