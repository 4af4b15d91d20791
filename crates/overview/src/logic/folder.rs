//! Folder listings and secret path handling

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub const ROOT_PATH: &str = "/";

/// A folder directly below the current path in one environment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct FolderRecord {
    pub environment: String,
    pub path: String,
    pub name: String,
    pub id: String,
}

/// Result of listing the folders of one environment below a parent path
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderListing {
    pub folders: Vec<FolderRecord>,
    /// Id of the directory the listing was taken in, absent at the root
    #[serde(default)]
    pub current_dir_id: Option<String>,
}

/// Canonical form of a secret path: leading slash, no trailing or doubled slashes
pub fn normalize_path(path: &str) -> String {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if segments.is_empty() {
        ROOT_PATH.to_string()
    } else {
        format!("/{}", segments.join("/"))
    }
}

/// Path of `folder_name` inside `parent`
pub fn join_path(parent: &str, folder_name: &str) -> String {
    normalize_path(&format!("{parent}/{folder_name}"))
}

#[cfg(test)]
mod tests {
    mod unit {
        use super::super::*;

        #[test]
        fn test_normalize_path() {
            assert_eq!(normalize_path(""), "/");
            assert_eq!(normalize_path("/"), "/");
            assert_eq!(normalize_path("//"), "/");
            assert_eq!(normalize_path("app"), "/app");
            assert_eq!(normalize_path("/app/db/"), "/app/db");
            assert_eq!(normalize_path("/app//db"), "/app/db");
        }

        #[test]
        fn test_join_path_from_root_has_single_slash() {
            assert_eq!(join_path("/", "backend"), "/backend");
            assert_eq!(join_path("", "backend"), "/backend");
        }

        #[test]
        fn test_join_path_nested() {
            assert_eq!(join_path("/backend", "db"), "/backend/db");
        }
    }
}
