//! Environments compared side by side in the overview

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::debug;
use utoipa::ToSchema;

/// An environment of the workspace as supplied by the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Environment {
    pub slug: String,
    pub name: String,
    /// The current user may not read this environment's secrets
    #[serde(default)]
    pub read_denied: bool,
}

impl Environment {
    pub fn new(slug: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            slug: slug.into(),
            name: name.into(),
            read_denied: false,
        }
    }

    pub fn read_denied(mut self) -> Self {
        self.read_denied = true;
        self
    }
}

/// Environments that take part in aggregation, in the order given.
///
/// Read-denied environments are dropped, as is any repeated slug after its first occurrence.
pub fn participating_environments(environments: Vec<Environment>) -> Vec<Environment> {
    let mut seen = HashSet::new();
    environments
        .into_iter()
        .filter(|env| {
            if env.read_denied {
                debug!(environment = %env.slug, "Skipping read-denied environment");
                return false;
            }
            seen.insert(env.slug.clone())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    mod unit {
        use super::super::*;

        #[test]
        fn test_read_denied_environments_are_excluded() {
            let envs = vec![
                Environment::new("dev", "Development"),
                Environment::new("staging", "Staging").read_denied(),
                Environment::new("prod", "Production"),
            ];

            let slugs: Vec<String> = participating_environments(envs)
                .into_iter()
                .map(|env| env.slug)
                .collect();
            assert_eq!(slugs, vec!["dev", "prod"]);
        }

        #[test]
        fn test_duplicate_slugs_keep_first() {
            let envs = vec![
                Environment::new("dev", "Development"),
                Environment::new("dev", "Dev copy"),
            ];

            let participating = participating_environments(envs);
            assert_eq!(participating.len(), 1);
            assert_eq!(participating[0].name, "Development");
        }

        #[test]
        fn test_read_denied_defaults_to_false_when_deserializing() {
            let env: Environment =
                serde_json::from_str(r#"{"slug":"dev","name":"Development"}"#).unwrap();
            assert!(!env.read_denied);
        }
    }
}
