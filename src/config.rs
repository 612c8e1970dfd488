use crate::settings::Settings;
use eyre::Result;
use std::{fs, path::PathBuf};

#[derive(Debug, Clone)]
pub struct Config {
    pub settings: Settings,
    filepath: PathBuf,
}

impl Config {
    pub fn new() -> Result<Self> {
        let prefix = get_app_data_prefix()?;
        let filepath = prefix.join("configuration.json");

        if filepath.exists() {
            return Self::load_from(filepath);
        }

        // Save initial config if it doesn't exist
        let settings = Settings::default();
        let initial_config = serde_json::json!({ "Setting": settings });
        fs::create_dir_all(&prefix)?;
        fs::write(&filepath, serde_json::to_string_pretty(&initial_config)?)?;

        Ok(Self { settings, filepath })
    }

    /// Load configuration from a custom path. Unknown or malformed fields
    /// fall back to defaults rather than failing.
    pub fn load_from(filepath: PathBuf) -> Result<Self> {
        let mut settings = Settings::default();

        if filepath.exists() {
            let config_str = fs::read_to_string(&filepath)?;
            if let Ok(user_config) = serde_json::from_str::<serde_json::Value>(&config_str) {
                if let Some(user_settings_map) =
                    user_config.get("Setting").and_then(|v| v.as_object())
                {
                    if let Some(val) = user_settings_map.get("night_mode").and_then(|v| v.as_bool())
                    {
                        settings.night_mode = val;
                    }
                    if let Some(val) =
                        user_settings_map.get("amoled_mode").and_then(|v| v.as_bool())
                    {
                        settings.amoled_mode = val;
                    }
                    if let Some(val) = user_settings_map
                        .get("invert_colors")
                        .and_then(|v| v.as_bool())
                    {
                        settings.invert_colors = val;
                    }
                    if let Some(val) = user_settings_map
                        .get("offline_mode")
                        .and_then(|v| v.as_bool())
                    {
                        settings.offline_mode = val;
                    }
                    if let Some(val) = user_settings_map
                        .get("offline_path")
                        .and_then(|v| v.as_str())
                    {
                        settings.offline_path = Some(val.to_string());
                    }
                    if let Some(val) = user_settings_map
                        .get("mouse_support")
                        .and_then(|v| v.as_bool())
                    {
                        settings.mouse_support = val;
                    }
                }
            }
        }

        Ok(Self { settings, filepath })
    }

    /// Create a config with custom settings for testing
    pub fn with_settings(settings: Settings) -> Result<Self> {
        let prefix = get_app_data_prefix()?;
        let filepath = prefix.join("test_configuration.json");
        Ok(Self { settings, filepath })
    }

    /// Get the configuration file path
    pub fn filepath(&self) -> &PathBuf {
        &self.filepath
    }

    /// Root of the offline store.
    pub fn offline_root(&self) -> Result<PathBuf> {
        match &self.settings.offline_path {
            Some(path) => Ok(PathBuf::from(path)),
            None => Ok(get_app_data_prefix()?.join("offline")),
        }
    }

    /// Write-through cache for thumbnails fetched in online mode.
    pub fn cache_dir(&self) -> Result<PathBuf> {
        Ok(get_app_data_prefix()?.join("cache"))
    }

    /// The legacy internal store the grid falls back to when the offline
    /// store has no image for a comic. Files there are named by bare number.
    pub fn legacy_store_dir(&self) -> Result<PathBuf> {
        get_app_data_prefix()
    }

    /// Save current configuration to file
    pub fn save(&self) -> Result<()> {
        let config_json = serde_json::json!({ "Setting": self.settings });
        let config_str = serde_json::to_string_pretty(&config_json)?;

        if let Some(parent) = self.filepath.parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(&self.filepath, config_str)?;
        Ok(())
    }
}

pub fn get_app_data_prefix() -> Result<PathBuf> {
    if let Some(config_home) = std::env::var_os("XDG_CONFIG_HOME") {
        let path = PathBuf::from(config_home).join("rxkcd");
        return Ok(path);
    } else if let Some(home) = std::env::var_os("HOME") {
        let path = PathBuf::from(home.clone()).join(".config").join("rxkcd");
        if path.exists() {
            return Ok(path);
        } else {
            return Ok(PathBuf::from(home).join(".rxkcd"));
        }
    } else if let Some(user_profile) = std::env::var_os("USERPROFILE") {
        return Ok(PathBuf::from(user_profile).join(".rxkcd"));
    }

    Err(eyre::eyre!(
        "Could not determine application data directory"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::{Mutex, MutexGuard, OnceLock};
    use tempfile::tempdir;

    fn lock_env() -> MutexGuard<'static, ()> {
        static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        ENV_LOCK
            .get_or_init(|| Mutex::new(()))
            .lock()
            .expect("lock env mutex")
    }

    fn set_test_environment(dir: &tempfile::TempDir) {
        unsafe {
            env::set_var("XDG_CONFIG_HOME", dir.path());
            env::remove_var("HOME");
            env::remove_var("USERPROFILE");
        }
    }

    fn restore_test_environment(
        original_home: Option<std::ffi::OsString>,
        original_xdg_config_home: Option<std::ffi::OsString>,
        original_userprofile: Option<std::ffi::OsString>,
    ) {
        unsafe {
            if let Some(home) = original_home {
                env::set_var("HOME", home);
            } else {
                env::remove_var("HOME");
            }
            if let Some(xdg) = original_xdg_config_home {
                env::set_var("XDG_CONFIG_HOME", xdg);
            } else {
                env::remove_var("XDG_CONFIG_HOME");
            }
            if let Some(profile) = original_userprofile {
                env::set_var("USERPROFILE", profile);
            } else {
                env::remove_var("USERPROFILE");
            }
        }
    }

    #[test]
    fn test_config_new_no_existing_file() -> Result<()> {
        let _env_lock = lock_env();
        let original_home = env::var_os("HOME");
        let original_xdg_config_home = env::var_os("XDG_CONFIG_HOME");
        let original_userprofile = env::var_os("USERPROFILE");

        let dir = tempdir()?;
        set_test_environment(&dir);

        let config = Config::new()?;
        let expected_filepath = dir.path().join("rxkcd").join("configuration.json");

        assert_eq!(config.filepath, expected_filepath);
        assert!(expected_filepath.exists());

        let config_str = fs::read_to_string(&expected_filepath)?;
        let json_value: serde_json::Value = serde_json::from_str(&config_str)?;
        let loaded_settings: Settings = serde_json::from_value(json_value["Setting"].clone())?;
        assert_eq!(loaded_settings, Settings::default());

        restore_test_environment(
            original_home,
            original_xdg_config_home,
            original_userprofile,
        );
        Ok(())
    }

    #[test]
    fn test_config_new_with_existing_file() -> Result<()> {
        let _env_lock = lock_env();
        let original_home = env::var_os("HOME");
        let original_xdg_config_home = env::var_os("XDG_CONFIG_HOME");
        let original_userprofile = env::var_os("USERPROFILE");

        let dir = tempdir()?;
        set_test_environment(&dir);

        let config_path = dir.path().join("rxkcd").join("configuration.json");
        std::fs::create_dir_all(config_path.parent().unwrap())?;

        let config_json = serde_json::json!({
            "Setting": {
                "night_mode": true,
                "offline_path": "/mnt/data/xkcd"
            }
        });
        std::fs::write(&config_path, serde_json::to_string(&config_json)?)?;

        let config = Config::new()?;
        assert!(config.settings.night_mode);
        assert_eq!(
            config.settings.offline_path,
            Some("/mnt/data/xkcd".to_string())
        );
        assert_eq!(config.offline_root()?, PathBuf::from("/mnt/data/xkcd"));

        restore_test_environment(
            original_home,
            original_xdg_config_home,
            original_userprofile,
        );
        Ok(())
    }

    #[test]
    fn test_config_save_and_load() -> Result<()> {
        let _env_lock = lock_env();
        let original_home = env::var_os("HOME");
        let original_xdg_config_home = env::var_os("XDG_CONFIG_HOME");
        let original_userprofile = env::var_os("USERPROFILE");

        let dir = tempdir()?;
        set_test_environment(&dir);

        let mut custom_settings = Settings::default();
        custom_settings.amoled_mode = true;
        custom_settings.invert_colors = true;

        let config = Config::with_settings(custom_settings.clone())?;
        config.save()?;
        assert!(config.filepath().exists());

        let loaded = Config::load_from(config.filepath().clone())?;
        assert_eq!(loaded.settings, custom_settings);

        restore_test_environment(
            original_home,
            original_xdg_config_home,
            original_userprofile,
        );
        Ok(())
    }

    #[test]
    fn test_config_invalid_json_falls_back_to_defaults() -> Result<()> {
        let _env_lock = lock_env();
        let original_home = env::var_os("HOME");
        let original_xdg_config_home = env::var_os("XDG_CONFIG_HOME");
        let original_userprofile = env::var_os("USERPROFILE");

        let dir = tempdir()?;
        set_test_environment(&dir);

        let config_path = dir.path().join("rxkcd").join("invalid_config.json");
        std::fs::create_dir_all(config_path.parent().unwrap())?;
        std::fs::write(&config_path, "{ invalid json }")?;

        let config = Config::load_from(config_path)?;
        assert_eq!(config.settings, Settings::default());

        restore_test_environment(
            original_home,
            original_xdg_config_home,
            original_userprofile,
        );
        Ok(())
    }

    #[test]
    fn test_default_directory_layout() -> Result<()> {
        let _env_lock = lock_env();
        let original_home = env::var_os("HOME");
        let original_xdg_config_home = env::var_os("XDG_CONFIG_HOME");
        let original_userprofile = env::var_os("USERPROFILE");

        let dir = tempdir()?;
        set_test_environment(&dir);

        let config = Config::with_settings(Settings::default())?;
        let prefix = dir.path().join("rxkcd");
        assert_eq!(config.offline_root()?, prefix.join("offline"));
        assert_eq!(config.cache_dir()?, prefix.join("cache"));
        assert_eq!(config.legacy_store_dir()?, prefix);

        restore_test_environment(
            original_home,
            original_xdg_config_home,
            original_userprofile,
        );
        Ok(())
    }
}
