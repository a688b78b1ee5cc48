//! System properties defined when an engine session starts

use std::path::Path;

use crate::store::PropertyStore;

/// Well-known property names
pub mod names {
    /// Folder used to resolve relative paths
    pub const WORKING_DIR: &str = "WorkingDir";
    /// Working folder at engine start
    pub const INITIAL_WORKING_DIR: &str = "InitialWorkingDir";
    /// Login name of the user running the engine
    pub const USER_NAME: &str = "UserName";
    /// Host name
    pub const COMPUTER_NAME: &str = "ComputerName";
    /// Home folder of the user
    pub const USER_HOME_DIR: &str = "UserHomeDir";
    /// System temporary folder
    pub const TEMP_DIR: &str = "TempDir";
    /// Local UTC offset, e.g. `+02:00`
    pub const TIME_ZONE: &str = "TimeZone";
    /// Engine version
    pub const PROGRAM_VERSION: &str = "ProgramVersion";
    /// Fault tolerance of the running script (not protected)
    pub const RUN_MODE: &str = "RunMode";
}

impl PropertyStore {
    /// Create a store holding the protected system properties
    ///
    /// `working_dir` seeds both `WorkingDir` and `InitialWorkingDir`.
    pub fn with_system_properties(working_dir: &Path) -> Self {
        let mut store = PropertyStore::new();
        let working_dir = working_dir.display().to_string();

        store.define(names::WORKING_DIR, working_dir.clone(), true);
        store.define(names::INITIAL_WORKING_DIR, working_dir, true);
        store.define(names::USER_NAME, user_name(), true);
        store.define(names::COMPUTER_NAME, computer_name(), true);
        store.define(
            names::USER_HOME_DIR,
            dirs::home_dir()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
            true,
        );
        store.define(
            names::TEMP_DIR,
            std::env::temp_dir().display().to_string(),
            true,
        );
        store.define(
            names::TIME_ZONE,
            chrono::Local::now().offset().to_string(),
            true,
        );
        store.define(names::PROGRAM_VERSION, env!("CARGO_PKG_VERSION"), true);

        log::debug!("Defined {} system properties", store.len());
        store
    }
}

fn user_name() -> String {
    env_first(&["USER", "USERNAME", "LOGNAME"]).unwrap_or_else(|| "unknown".to_string())
}

fn computer_name() -> String {
    env_first(&["HOSTNAME", "COMPUTERNAME"]).unwrap_or_else(|| "localhost".to_string())
}

fn env_first(keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| std::env::var(k).ok())
        .find(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PropertyError;

    #[test]
    fn test_system_properties_are_protected() {
        let store = PropertyStore::with_system_properties(Path::new("/work"));
        assert_eq!(store.get_string(names::WORKING_DIR).as_deref(), Some("/work"));
        assert_eq!(
            store.get_string(names::INITIAL_WORKING_DIR).as_deref(),
            Some("/work")
        );
        for name in [
            names::WORKING_DIR,
            names::INITIAL_WORKING_DIR,
            names::USER_NAME,
            names::COMPUTER_NAME,
            names::TIME_ZONE,
        ] {
            assert!(store.is_protected(name), "{} should be protected", name);
        }
    }

    #[test]
    fn test_set_working_dir_rejected() {
        let mut store = PropertyStore::with_system_properties(Path::new("/work"));
        assert_eq!(
            store.set(names::WORKING_DIR, "/elsewhere"),
            Err(PropertyError::Protected(names::WORKING_DIR.to_string()))
        );
    }
}
