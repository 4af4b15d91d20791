//! Read-only projection of an [`AggregateState`] for the presentation layer.
//!
//! Nothing here mutates the aggregate; a filter only narrows what is projected.

use std::collections::BTreeMap;

use serde::Serialize;
use utoipa::ToSchema;

use super::aggregate::{AggregateState, FetchStatus};
use super::secret::SecretSlot;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct EnvironmentColumnView {
    pub slug: String,
    pub name: String,
    pub secrets: FetchStatus,
    pub folders: FetchStatus,
    /// Absent while the count is unknown
    pub missing_count: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum MatrixCell {
    /// The environment resolved and does not define the key
    Missing,
    Present { value: String, comment: String },
    DecryptionFailed { reason: String },
    /// The environment has not resolved, or its fetch failed
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct SecretRow {
    pub key: String,
    /// One cell per environment column, in column order
    pub cells: Vec<MatrixCell>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct FolderRow {
    pub name: String,
    /// Slugs of the environments that have this folder
    pub present_in: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct OverviewMatrix {
    pub secret_path: String,
    pub keys: Vec<String>,
    pub folders: Vec<String>,
    pub rows: Vec<SecretRow>,
    pub folder_rows: Vec<FolderRow>,
    pub environments: Vec<EnvironmentColumnView>,
    /// Only environments whose count is known are listed
    pub per_environment_missing_count: BTreeMap<String, usize>,
    pub loading: bool,
    pub key_unavailable: bool,
}

fn matches_filter(name: &str, needle: &str) -> bool {
    needle.is_empty() || name.to_lowercase().contains(needle)
}

fn normalize_filter(filter: &str) -> String {
    filter.to_lowercase()
}

/// Secret keys in key-space order whose name contains `filter`, ignoring case
pub fn filtered_keys(state: &AggregateState, filter: &str) -> Vec<String> {
    let needle = normalize_filter(filter);
    state
        .secret_keys()
        .filter(|key| matches_filter(key, &needle))
        .map(str::to_string)
        .collect()
}

/// Folder names in folder-space order whose name contains `filter`, ignoring case
pub fn filtered_folders(state: &AggregateState, filter: &str) -> Vec<String> {
    let needle = normalize_filter(filter);
    state
        .folder_names()
        .filter(|name| matches_filter(name, &needle))
        .map(str::to_string)
        .collect()
}

fn cell_for(status: &FetchStatus, slot: Option<&SecretSlot>) -> MatrixCell {
    match (status, slot) {
        (_, Some(SecretSlot::Present { record })) => MatrixCell::Present {
            value: record.value.clone(),
            comment: record.comment.clone(),
        },
        (_, Some(SecretSlot::DecryptionFailed { reason, .. })) => MatrixCell::DecryptionFailed {
            reason: reason.clone(),
        },
        (FetchStatus::Resolved, None) => MatrixCell::Missing,
        (_, None) => MatrixCell::Unknown,
    }
}

/// Project the full matrix, narrowed to names matching `filter`.
///
/// Missing counts are always computed against the whole key-space, not the filtered one.
pub fn matrix(state: &AggregateState, filter: &str) -> OverviewMatrix {
    let keys = filtered_keys(state, filter);
    let folders = filtered_folders(state, filter);

    let environments: Vec<EnvironmentColumnView> = state
        .environments()
        .map(|env| EnvironmentColumnView {
            slug: env.slug.clone(),
            name: env.name.clone(),
            secrets: state
                .secrets_status(&env.slug)
                .cloned()
                .unwrap_or(FetchStatus::Pending),
            folders: state
                .folders_status(&env.slug)
                .cloned()
                .unwrap_or(FetchStatus::Pending),
            missing_count: state.missing_count(&env.slug),
        })
        .collect();

    let per_environment_missing_count = environments
        .iter()
        .filter_map(|column| column.missing_count.map(|count| (column.slug.clone(), count)))
        .collect();

    let rows = keys
        .iter()
        .filter_map(|key| {
            let row = state.get_by_key(key)?;
            Some(SecretRow {
                key: key.clone(),
                cells: row
                    .into_iter()
                    .map(|env_slot| cell_for(env_slot.status, env_slot.slot))
                    .collect(),
            })
        })
        .collect();

    let folder_rows = folders
        .iter()
        .map(|name| FolderRow {
            name: name.clone(),
            present_in: state
                .environments()
                .filter(|env| state.is_folder_present(name, &env.slug))
                .map(|env| env.slug.clone())
                .collect(),
        })
        .collect();

    OverviewMatrix {
        secret_path: state.secret_path().to_string(),
        keys,
        folders,
        rows,
        folder_rows,
        environments,
        per_environment_missing_count,
        loading: state.is_loading(),
        key_unavailable: state.is_key_unavailable(),
    }
}

#[cfg(test)]
mod tests {
    mod unit {
        use std::collections::HashMap;

        use super::super::*;
        use crate::logic::aggregate::FetchResult;
        use crate::logic::environment::Environment;
        use crate::logic::folder::{FolderListing, FolderRecord};
        use crate::logic::secret::SecretRecord;

        fn slot(env: &str, key: &str, value: &str) -> SecretSlot {
            SecretSlot::from(SecretRecord {
                environment: env.to_string(),
                path: "/".to_string(),
                key: key.to_string(),
                value: value.to_string(),
                comment: String::new(),
            })
        }

        fn listing(env: &str, names: &[&str]) -> FetchResult<FolderListing> {
            FetchResult::Ok(FolderListing {
                folders: names
                    .iter()
                    .map(|name| FolderRecord {
                        environment: env.to_string(),
                        path: "/".to_string(),
                        name: name.to_string(),
                        id: format!("{env}/{name}"),
                    })
                    .collect(),
                current_dir_id: None,
            })
        }

        fn state() -> AggregateState {
            let envs = vec![
                Environment::new("dev", "Development"),
                Environment::new("staging", "Staging"),
                Environment::new("prod", "Production"),
            ];
            let secrets = HashMap::from([
                (
                    "dev".to_string(),
                    FetchResult::Ok(vec![
                        slot("dev", "DB_URL", "postgres://dev"),
                        slot("dev", "API_KEY", ""),
                    ]),
                ),
                (
                    "staging".to_string(),
                    FetchResult::Ok(vec![
                        slot("staging", "DB_URL", "postgres://staging"),
                        SecretSlot::DecryptionFailed {
                            environment: "staging".to_string(),
                            path: "/".to_string(),
                            key: "SENTRY_DSN".to_string(),
                            reason: "Decryption failed".to_string(),
                        },
                    ]),
                ),
            ]);
            let folders = HashMap::from([
                ("dev".to_string(), listing("dev", &["backend", "Frontend"])),
                ("staging".to_string(), listing("staging", &["backend"])),
                ("prod".to_string(), listing("prod", &[])),
            ]);
            AggregateState::build("ws", "/", envs, secrets, folders)
        }

        #[test]
        fn test_filter_is_case_insensitive_substring() {
            let state = state();
            assert_eq!(filtered_keys(&state, "db"), vec!["DB_URL"]);
            assert_eq!(filtered_keys(&state, "KEY"), vec!["API_KEY"]);
            assert_eq!(filtered_folders(&state, "END"), vec!["backend", "Frontend"]);
            assert!(filtered_keys(&state, "nothing").is_empty());
        }

        #[test]
        fn test_whitespace_filter_is_matched_literally() {
            let state = state();
            assert!(filtered_keys(&state, " ").is_empty());
            assert!(filtered_keys(&state, " KEY").is_empty());
        }

        #[test]
        fn test_clearing_filter_restores_exact_order() {
            let state = state();
            let before = filtered_keys(&state, "");
            let _ = filtered_keys(&state, "url");
            let after = filtered_keys(&state, "");

            assert_eq!(before, vec!["DB_URL", "API_KEY", "SENTRY_DSN"]);
            assert_eq!(before, after);
        }

        #[test]
        fn test_cells_distinguish_missing_unknown_and_failures() {
            let matrix = matrix(&state(), "");

            let api_key = matrix.rows.iter().find(|row| row.key == "API_KEY").unwrap();
            assert_eq!(
                api_key.cells,
                vec![
                    MatrixCell::Present {
                        value: String::new(),
                        comment: String::new()
                    },
                    MatrixCell::Missing,
                    MatrixCell::Unknown,
                ]
            );

            let sentry = matrix
                .rows
                .iter()
                .find(|row| row.key == "SENTRY_DSN")
                .unwrap();
            assert!(matches!(sentry.cells[1], MatrixCell::DecryptionFailed { .. }));
        }

        #[test]
        fn test_pending_environment_keeps_matrix_loading() {
            let matrix = matrix(&state(), "");

            assert!(matrix.loading);
            assert_eq!(matrix.per_environment_missing_count.get("dev"), Some(&1));
            assert_eq!(matrix.per_environment_missing_count.get("staging"), Some(&1));
            assert!(!matrix.per_environment_missing_count.contains_key("prod"));
            assert_eq!(matrix.environments[2].secrets, FetchStatus::Pending);
            assert_eq!(matrix.environments[2].folders, FetchStatus::Resolved);
        }

        #[test]
        fn test_missing_counts_ignore_filter() {
            let matrix = matrix(&state(), "db");
            assert_eq!(matrix.keys, vec!["DB_URL"]);
            assert_eq!(matrix.per_environment_missing_count.get("dev"), Some(&1));
        }

        #[test]
        fn test_folder_rows_list_holding_environments() {
            let matrix = matrix(&state(), "");
            assert_eq!(
                matrix.folder_rows[0],
                FolderRow {
                    name: "backend".to_string(),
                    present_in: vec!["dev".to_string(), "staging".to_string()],
                }
            );
            assert_eq!(matrix.folder_rows[1].present_in, vec!["dev".to_string()]);
        }
    }
}
