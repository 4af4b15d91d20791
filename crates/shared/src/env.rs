use std::path::PathBuf;

use anyhow::Context;
use tracing::{debug, trace};

/// Look for `file_name` in the current directory, then at the workspace root
fn find_env_file(file_name: &str) -> Option<PathBuf> {
    let candidates = [
        PathBuf::from(file_name),
        PathBuf::from("./../../").join(file_name),
    ];

    let found = candidates.into_iter().find(|path| path.exists());
    match &found {
        Some(path) => trace!("Loading environment variables from: {}", path.display()),
        None => trace!(
            "No environment variables file found with name: {:?} in current directory or workspace root",
            file_name
        ),
    }
    found
}

fn load_optional_env_file(path: Option<PathBuf>) -> Result<(), anyhow::Error> {
    if let Some(path) = path {
        dotenv::from_filename(&path)
            .with_context(|| format!("Failed to load environment variables from {}", path.display()))?;
        debug!("Loaded environment variables from: {}", path.display());
    }
    Ok(())
}

/// Load `.env` and then `.env.secrets`; missing files are not an error
pub fn load_optional_env_files() -> Result<(), anyhow::Error> {
    load_optional_env_file(find_env_file(".env"))?;
    load_optional_env_file(find_env_file(".env.secrets"))?;
    Ok(())
}

pub fn configure_env() -> Result<(), anyhow::Error> {
    load_optional_env_files()
}
