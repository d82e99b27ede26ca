use std::path::Path;

use config::{Config, ConfigError, Environment, File, FileFormat, FileSourceFile};
use serde::{Deserialize, Serialize};

/// What a plain click on a bar item does.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DefaultAction {
    #[default]
    Open,
    Show,
}

/// Persisted user options. Observer surfaces read them once at startup and
/// act on them locally; the sync core only serves them out.
///
/// Serialized camelCase toward observers, snake_case in configuration
/// sources (e.g. `DOWNBAR_REMOVE_ON_OPEN=true`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all(serialize = "camelCase"))]
pub struct Options {
    /// Drop a download from the bar once the user opened it.
    pub remove_on_open: bool,
    /// Drop a download from the bar once the user revealed it.
    pub remove_on_show: bool,
    pub default_action: DefaultAction,
    pub log_level: String,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            remove_on_open: false,
            remove_on_show: false,
            default_action: DefaultAction::Open,
            log_level: "info".to_string(),
        }
    }
}

impl Options {
    /// Defaults, overridden by an optional `options` file, overridden by
    /// `DOWNBAR_*` environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        Self::build(File::with_name("options").required(false))
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        Self::build(File::from(path))
    }

    fn build(file: File<FileSourceFile, FileFormat>) -> Result<Self, ConfigError> {
        Config::builder()
            .set_default("remove_on_open", false)?
            .set_default("remove_on_show", false)?
            .set_default("default_action", "open")?
            .set_default("log_level", "info")?
            .add_source(file)
            .add_source(Environment::with_prefix("DOWNBAR"))
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults_apply_without_any_source() {
        let options = Options::load().expect("defaults must load");
        assert_eq!(options, Options::default());
    }

    #[test]
    fn file_values_override_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("options.toml");
        std::fs::write(&path, "remove_on_open = true\ndefault_action = \"show\"\n").unwrap();

        let options = Options::load_from(&path).unwrap();
        assert!(options.remove_on_open);
        assert!(!options.remove_on_show);
        assert_eq!(options.default_action, DefaultAction::Show);
        assert_eq!(options.log_level, "info");
    }

    #[test]
    fn serializes_camel_case_for_observers() {
        assert_eq!(
            serde_json::to_value(Options::default()).unwrap(),
            json!({
                "removeOnOpen": false,
                "removeOnShow": false,
                "defaultAction": "open",
                "logLevel": "info",
            })
        );
    }
}
