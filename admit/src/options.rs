//! Limiter configuration.
//!
//! Configuration is always an explicit value handed to a constructor. The
//! `from_env` loaders read `ADMIT_*` variables once and produce such a value.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{AdmissionError, Result};
use crate::limiter::DEFAULT_REJECTION_STATUS;

pub const ENV_POLICY: &str = "ADMIT_POLICY";
pub const ENV_MAX_CONCURRENT_REQUESTS: &str = "ADMIT_MAX_CONCURRENT_REQUESTS";
pub const ENV_REQUEST_QUEUE_LIMIT: &str = "ADMIT_REQUEST_QUEUE_LIMIT";
pub const ENV_REJECTION_STATUS: &str = "ADMIT_REJECTION_STATUS";

/// Waiting discipline of a policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyKind {
    /// First come, first served.
    #[default]
    Queue,
    /// Most recent first; the oldest waiter is evicted on overflow.
    Stack,
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyKind::Queue => f.write_str("queue"),
            PolicyKind::Stack => f.write_str("stack"),
        }
    }
}

impl FromStr for PolicyKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "queue" | "fifo" => Ok(PolicyKind::Queue),
            "stack" | "lifo" => Ok(PolicyKind::Stack),
            other => Err(format!(
                "unknown policy '{other}', expected 'queue' or 'stack'"
            )),
        }
    }
}

/// Capacity tunables shared by both policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyOptions {
    /// Callers allowed inside at the same time. Must be at least 1.
    #[serde(alias = "maxConcurrentRequests")]
    pub max_concurrent_requests: usize,
    /// Callers allowed to wait for a turn.
    #[serde(alias = "requestQueueLimit")]
    pub request_queue_limit: usize,
}

impl Default for PolicyOptions {
    fn default() -> Self {
        Self {
            max_concurrent_requests: 1,
            request_queue_limit: 5000,
        }
    }
}

impl PolicyOptions {
    pub fn new(max_concurrent_requests: usize, request_queue_limit: usize) -> Self {
        Self {
            max_concurrent_requests,
            request_queue_limit,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_requests == 0 {
            return Err(AdmissionError::InvalidOptions {
                field: "max_concurrent_requests",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

/// Everything needed to put a limiter in front of a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimiterConfig {
    pub kind: PolicyKind,
    #[serde(flatten)]
    pub policy: PolicyOptions,
    /// HTTP status returned to rejected callers.
    pub rejection_status: u16,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            kind: PolicyKind::default(),
            policy: PolicyOptions::default(),
            rejection_status: DEFAULT_REJECTION_STATUS,
        }
    }
}

impl LimiterConfig {
    /// Load from `ADMIT_*` environment variables, defaulting what is unset.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Same as [`LimiterConfig::from_env`] with an injectable variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup(ENV_POLICY) {
            config.kind = raw.parse().map_err(|reason| AdmissionError::InvalidEnv {
                var: ENV_POLICY,
                reason,
            })?;
        }
        if let Some(raw) = lookup(ENV_MAX_CONCURRENT_REQUESTS) {
            config.policy.max_concurrent_requests = parse_var(ENV_MAX_CONCURRENT_REQUESTS, &raw)?;
        }
        if let Some(raw) = lookup(ENV_REQUEST_QUEUE_LIMIT) {
            config.policy.request_queue_limit = parse_var(ENV_REQUEST_QUEUE_LIMIT, &raw)?;
        }
        if let Some(raw) = lookup(ENV_REJECTION_STATUS) {
            config.rejection_status = parse_var(ENV_REJECTION_STATUS, &raw)?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.policy.validate()?;
        if !(400..=599).contains(&self.rejection_status) {
            return Err(AdmissionError::InvalidOptions {
                field: "rejection_status",
                reason: format!("{} is not an HTTP error status", self.rejection_status),
            });
        }
        Ok(())
    }
}

fn parse_var<T>(var: &'static str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e: T::Err| AdmissionError::InvalidEnv {
            var,
            reason: format!("'{raw}': {e}"),
        })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var| map.get(var).cloned()
    }

    #[test]
    fn zero_concurrency_is_invalid() {
        let err = PolicyOptions::new(0, 10).validate().unwrap_err();
        assert!(matches!(
            err,
            AdmissionError::InvalidOptions {
                field: "max_concurrent_requests",
                ..
            }
        ));
    }

    #[test]
    fn zero_queue_limit_is_valid() {
        assert!(PolicyOptions::new(4, 0).validate().is_ok());
    }

    #[test]
    fn policy_kind_parses_aliases() {
        assert_eq!("queue".parse::<PolicyKind>(), Ok(PolicyKind::Queue));
        assert_eq!("FIFO".parse::<PolicyKind>(), Ok(PolicyKind::Queue));
        assert_eq!(" stack ".parse::<PolicyKind>(), Ok(PolicyKind::Stack));
        assert_eq!("lifo".parse::<PolicyKind>(), Ok(PolicyKind::Stack));
        assert!("random".parse::<PolicyKind>().is_err());
    }

    #[test]
    fn options_accept_camel_case_keys() {
        let options: PolicyOptions =
            serde_json::from_str(r#"{"maxConcurrentRequests": 8, "requestQueueLimit": 2}"#)
                .unwrap();
        assert_eq!(options, PolicyOptions::new(8, 2));
    }

    #[test]
    fn config_deserializes_flattened_options() {
        let config: LimiterConfig = serde_json::from_str(
            r#"{"kind": "stack", "max_concurrent_requests": 3, "rejection_status": 429}"#,
        )
        .unwrap();
        assert_eq!(config.kind, PolicyKind::Stack);
        assert_eq!(config.policy.max_concurrent_requests, 3);
        assert_eq!(config.policy.request_queue_limit, 5000);
        assert_eq!(config.rejection_status, 429);
    }

    #[test]
    fn config_serializes_flat() {
        let config = LimiterConfig {
            kind: PolicyKind::Stack,
            policy: PolicyOptions::new(2, 10),
            rejection_status: 503,
        };
        insta::assert_json_snapshot!(config, @r#"
        {
          "kind": "stack",
          "max_concurrent_requests": 2,
          "request_queue_limit": 10,
          "rejection_status": 503
        }
        "#);
    }

    #[test]
    fn env_defaults_when_unset() {
        let config = LimiterConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, LimiterConfig::default());
    }

    #[test]
    fn default_rejection_status_is_shared_with_limiter() {
        assert_eq!(
            LimiterConfig::default().rejection_status,
            DEFAULT_REJECTION_STATUS
        );
    }

    #[test]
    fn env_overrides_defaults() {
        let config = LimiterConfig::from_lookup(lookup(&[
            (ENV_POLICY, "lifo"),
            (ENV_MAX_CONCURRENT_REQUESTS, "16"),
            (ENV_REQUEST_QUEUE_LIMIT, "64"),
            (ENV_REJECTION_STATUS, "429"),
        ]))
        .unwrap();
        assert_eq!(config.kind, PolicyKind::Stack);
        assert_eq!(config.policy, PolicyOptions::new(16, 64));
        assert_eq!(config.rejection_status, 429);
    }

    #[test]
    fn env_rejects_garbage() {
        let err =
            LimiterConfig::from_lookup(lookup(&[(ENV_REQUEST_QUEUE_LIMIT, "lots")])).unwrap_err();
        assert!(matches!(
            err,
            AdmissionError::InvalidEnv {
                var: ENV_REQUEST_QUEUE_LIMIT,
                ..
            }
        ));
    }

    #[test]
    fn env_rejects_non_error_status() {
        let err = LimiterConfig::from_lookup(lookup(&[(ENV_REJECTION_STATUS, "200")])).unwrap_err();
        assert!(matches!(
            err,
            AdmissionError::InvalidOptions {
                field: "rejection_status",
                ..
            }
        ));
    }
}
