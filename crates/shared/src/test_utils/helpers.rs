use std::sync::Once;

pub fn get_workspace_root() -> String {
    let crate_root = std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    crate_root
        .ancestors()
        .nth(2) // up from crates/<name>/
        .unwrap_or(crate_root.as_path())
        .to_string_lossy()
        .to_string()
}

pub struct TestContext {
    pub workspace_root: String,
    pub crate_root: String,
    pub test_name: String,
}

pub static INIT_TEST_ONCE: Once = Once::new();

/// One-time process setup for tests (env files, logging) plus a context naming the running test
#[macro_export]
macro_rules! setup_test {
    () => {{
        $crate::test_utils::helpers::INIT_TEST_ONCE.call_once(|| {
            $crate::env::load_optional_env_files().unwrap();
            $crate::logging::configure_logging().unwrap();
        });

        let cur_thread = std::thread::current();
        let test_name = cur_thread.name().unwrap_or("unknown").to_string();

        $crate::test_utils::helpers::TestContext {
            workspace_root: $crate::test_utils::helpers::get_workspace_root(),
            crate_root: env!("CARGO_MANIFEST_DIR").to_string(),
            test_name,
        }
    }};
}
