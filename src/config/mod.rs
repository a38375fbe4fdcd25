pub mod params;
pub mod settings;

use settings::Settings;
use std::path::{Path, PathBuf};

/// Environment variable naming an explicit settings file.
pub const CONFIG_ENV: &str = "DOCMERGE_CONFIG";

/// Locate and load the service settings.
///
/// Lookup order: the explicit path, then `$DOCMERGE_CONFIG`, then
/// `settings.yaml` in the working directory. When none of these exist the
/// defaults are returned. An explicitly named file that is missing is an error.
pub fn load_settings(explicit: Option<&Path>) -> crate::error::Result<Settings> {
    if let Some(path) = explicit {
        return Settings::from_file(path);
    }

    if let Some(path) = std::env::var_os(CONFIG_ENV).map(PathBuf::from) {
        return Settings::from_file(&path);
    }

    let local = Path::new("settings.yaml");
    if local.exists() {
        Settings::from_file(local)
    } else {
        Ok(Settings::default())
    }
}
