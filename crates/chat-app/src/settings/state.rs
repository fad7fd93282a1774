use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use figment::{
    Figment,
    providers::{Format, Json, Serialized},
};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serenity_llm::{DEFAULT_PREFERENCE_MODEL, GatewayOptions, ProviderConfig};
use snafu::{ResultExt, Snafu};

pub const SETTINGS_DIRECTORY_NAME: &str = "serenity";
pub const SETTINGS_FILE_NAME: &str = "settings.json";

pub const DEFAULT_TEMPERATURE: f64 = 0.7;
pub const TEMPERATURE_RANGE: (f64, f64) = (0.0, 2.0);
pub const DEFAULT_MAX_TOKENS: u64 = 2000;
pub const MAX_TOKENS_RANGE: (u64, u64) = (100, 8000);

/// Keys accepted by [`Preferences::get`] and [`Preferences::set`], in display order.
pub const PREFERENCE_KEYS: [&str; 8] = [
    "apiKey",
    "model",
    "temperature",
    "maxTokens",
    "streamResponse",
    "theme",
    "systemPrompt",
    "baseUrl",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ThemePreference {
    #[default]
    System,
    Light,
    Dark,
}

impl ThemePreference {
    pub fn name(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::Light => "light",
            Self::Dark => "dark",
        }
    }

    /// Unknown names fall back to `System`.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "light" => Self::Light,
            "dark" => Self::Dark,
            _ => Self::System,
        }
    }
}

impl fmt::Display for ThemePreference {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.name())
    }
}

/// Settings that persist across app restarts. Field names on disk are camelCase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u64,
    #[serde(default = "default_stream_response")]
    pub stream_response: bool,
    #[serde(
        default,
        serialize_with = "serialize_theme",
        deserialize_with = "deserialize_theme"
    )]
    pub theme: ThemePreference,
    #[serde(default)]
    pub system_prompt: String,
    #[serde(default)]
    pub base_url: String,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            stream_response: default_stream_response(),
            theme: ThemePreference::default(),
            system_prompt: String::new(),
            base_url: String::new(),
        }
    }
}

impl Preferences {
    pub fn has_api_key(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    /// Provider config from the stored credential, or `None` when no key is saved.
    pub fn to_provider_config(&self, provider_id: &str) -> Option<ProviderConfig> {
        if !self.has_api_key() {
            return None;
        }

        Some(ProviderConfig::new(provider_id, &self.api_key, &self.base_url))
    }

    pub fn gateway_options(&self, request_timeout: Duration) -> GatewayOptions {
        GatewayOptions {
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
            request_timeout,
        }
    }

    /// Trims text fields and pulls numeric fields back into their ranges.
    pub fn normalized(mut self) -> Self {
        self.api_key = self.api_key.trim().to_string();
        self.model = self.model.trim().to_string();
        if self.model.is_empty() {
            self.model = default_model();
        }
        self.base_url = self.base_url.trim().to_string();

        self.temperature = if self.temperature.is_finite() {
            self.temperature.clamp(TEMPERATURE_RANGE.0, TEMPERATURE_RANGE.1)
        } else {
            default_temperature()
        };
        self.max_tokens = self.max_tokens.clamp(MAX_TOKENS_RANGE.0, MAX_TOKENS_RANGE.1);

        self
    }

    /// String form of one key, as the settings panel displays it.
    pub fn get(&self, key: &str) -> Option<String> {
        let value = match key {
            "apiKey" => self.api_key.clone(),
            "model" => self.model.clone(),
            "temperature" => self.temperature.to_string(),
            "maxTokens" => self.max_tokens.to_string(),
            "streamResponse" => self.stream_response.to_string(),
            "theme" => self.theme.name().to_string(),
            "systemPrompt" => self.system_prompt.clone(),
            "baseUrl" => self.base_url.clone(),
            _ => return None,
        };
        Some(value)
    }

    /// Parses `value` into `key`. Numeric values outside their range are clamped, not rejected.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), SettingsError> {
        match key {
            "apiKey" => self.api_key = value.trim().to_string(),
            "model" => self.model = value.trim().to_string(),
            "temperature" => {
                let parsed = value.trim().parse::<f64>().map_err(|_| invalid(key, value))?;
                self.temperature = parsed;
            }
            "maxTokens" => {
                let parsed = value.trim().parse::<u64>().map_err(|_| invalid(key, value))?;
                self.max_tokens = parsed;
            }
            "streamResponse" => {
                let parsed = value.trim().parse::<bool>().map_err(|_| invalid(key, value))?;
                self.stream_response = parsed;
            }
            "theme" => self.theme = ThemePreference::parse(value),
            "systemPrompt" => self.system_prompt = value.to_string(),
            "baseUrl" => self.base_url = value.trim().to_string(),
            _ => {
                return UnknownKeySnafu {
                    stage: "set-preference",
                    key: key.to_string(),
                }
                .fail();
            }
        }

        *self = std::mem::take(self).normalized();
        Ok(())
    }
}

/// Persistent preferences, readable from any thread without locking.
pub struct SettingsStore {
    settings: Arc<ArcSwap<Preferences>>,
    config_path: PathBuf,
}

impl SettingsStore {
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .map(|path| path.join(SETTINGS_DIRECTORY_NAME))
            .unwrap_or_else(|| PathBuf::from(".serenity"))
    }

    pub fn default_config_path() -> PathBuf {
        Self::default_config_dir().join(SETTINGS_FILE_NAME)
    }

    pub fn new(config_path: PathBuf) -> Self {
        let settings = Self::load_from_disk(&config_path);
        Self {
            settings: Arc::new(ArcSwap::from_pointee(settings)),
            config_path,
        }
    }

    pub fn load() -> Self {
        Self::new(Self::default_config_path())
    }

    pub fn path(&self) -> &Path {
        &self.config_path
    }

    pub fn settings(&self) -> Arc<Preferences> {
        self.settings.load_full()
    }

    /// Makes `preferences` current and writes them out. Saving preferences identical to
    /// the ones already on disk leaves the file alone.
    pub fn update(&self, preferences: Preferences) -> Result<SaveOutcome, SettingsError> {
        let preferences = preferences.normalized();
        if *self.settings() == preferences && self.config_path.exists() {
            tracing::debug!(path = %self.config_path.display(), "preferences unchanged");
            return Ok(SaveOutcome::Unchanged);
        }

        self.write_preferences(&preferences)?;
        self.settings.store(Arc::new(preferences));
        Ok(SaveOutcome::Written)
    }

    fn load_from_disk(path: &Path) -> Preferences {
        if !path.exists() {
            tracing::info!(path = %path.display(), "no preferences file, using defaults");
            return Preferences::default();
        }

        // Keys missing from the file keep their defaults.
        let figment = Figment::from(Serialized::defaults(Preferences::default()))
            .merge(Json::file(path));

        figment
            .extract::<Preferences>()
            .map(Preferences::normalized)
            .unwrap_or_else(|error| {
                tracing::warn!(
                    path = %path.display(),
                    error = %error,
                    "unreadable preferences file, using defaults"
                );
                Preferences::default()
            })
    }

    fn write_preferences(&self, preferences: &Preferences) -> Result<(), SettingsError> {
        let content = serde_json::to_string_pretty(preferences).context(SerializePreferencesSnafu {
            stage: "serialize-preferences",
        })?;

        if let Some(parent) = self.config_path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).context(CreateDirSnafu {
                stage: "create-preferences-directory",
                path: parent.to_path_buf(),
            })?;
        }

        // Staged beside the target, then renamed over it.
        let staged = self.config_path.with_extension("json.tmp");
        std::fs::write(&staged, content).context(WriteFileSnafu {
            stage: "write-staged-preferences",
            path: staged.clone(),
        })?;
        std::fs::rename(&staged, &self.config_path).context(ReplaceFileSnafu {
            stage: "replace-preferences-file",
            from: staged,
            to: self.config_path.clone(),
        })?;

        tracing::info!(path = %self.config_path.display(), "preferences saved");
        Ok(())
    }
}

/// What [`SettingsStore::update`] did with the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Written,
    Unchanged,
}

/// Editable copy of the stored preferences. Changes reach disk only through [`SettingsDraft::save`].
#[derive(Debug, Clone, PartialEq)]
pub struct SettingsDraft {
    draft: Preferences,
}

impl SettingsDraft {
    pub fn from_store(store: &SettingsStore) -> Self {
        Self {
            draft: store.settings().as_ref().clone(),
        }
    }

    pub fn preferences(&self) -> &Preferences {
        &self.draft
    }

    pub fn set(&mut self, key: &str, value: &str) -> Result<(), SettingsError> {
        self.draft.set(key, value)
    }

    pub fn has_unsaved_changes(&self, store: &SettingsStore) -> bool {
        *store.settings() != self.draft
    }

    /// Hands the draft to the store, then continues from what the store kept.
    pub fn save(&mut self, store: &SettingsStore) -> Result<SaveOutcome, SettingsError> {
        let outcome = store.update(self.draft.clone())?;
        self.draft = store.settings().as_ref().clone();
        Ok(outcome)
    }
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SettingsError {
    #[snafu(display("failed to create preferences directory at {path:?} on `{stage}`: {source}"))]
    CreateDir {
        stage: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("failed to serialize preferences on `{stage}`: {source}"))]
    SerializePreferences {
        stage: &'static str,
        source: serde_json::Error,
    },
    #[snafu(display("failed to write preferences file at {path:?} on `{stage}`: {source}"))]
    WriteFile {
        stage: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display(
        "failed to replace preferences file from {from:?} to {to:?} on `{stage}`: {source}"
    ))]
    ReplaceFile {
        stage: &'static str,
        from: PathBuf,
        to: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("unknown setting '{key}'"))]
    UnknownKey { stage: &'static str, key: String },
    #[snafu(display("invalid value '{value}' for setting '{key}'"))]
    InvalidValue {
        stage: &'static str,
        key: String,
        value: String,
    },
}

fn invalid(key: &str, value: &str) -> SettingsError {
    SettingsError::InvalidValue {
        stage: "parse-preference",
        key: key.to_string(),
        value: value.to_string(),
    }
}

fn default_model() -> String {
    DEFAULT_PREFERENCE_MODEL.to_string()
}

fn default_temperature() -> f64 {
    DEFAULT_TEMPERATURE
}

fn default_max_tokens() -> u64 {
    DEFAULT_MAX_TOKENS
}

fn default_stream_response() -> bool {
    true
}

fn serialize_theme<S>(value: &ThemePreference, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(value.name())
}

fn deserialize_theme<'de, D>(deserializer: D) -> Result<ThemePreference, D::Error>
where
    D: Deserializer<'de>,
{
    let value = String::deserialize(deserializer)?;
    Ok(ThemePreference::parse(&value))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_in(dir: &tempfile::TempDir) -> SettingsStore {
        SettingsStore::new(dir.path().join("nested").join(SETTINGS_FILE_NAME))
    }

    #[test]
    fn missing_file_yields_documented_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = store_in(&dir).settings();

        assert_eq!(settings.api_key, "");
        assert_eq!(settings.model, "gpt-4o");
        assert_eq!(settings.temperature, 0.7);
        assert_eq!(settings.max_tokens, 2000);
        assert!(settings.stream_response);
        assert_eq!(settings.theme, ThemePreference::System);
        assert_eq!(settings.system_prompt, "");
        assert_eq!(settings.base_url, "");
    }

    #[test]
    fn saved_preferences_survive_reload_with_camel_case_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        let mut draft = SettingsDraft::from_store(&store);
        draft.set("apiKey", " secret ").unwrap();
        draft.set("maxTokens", "4096").unwrap();
        draft.set("theme", "Dark").unwrap();
        draft.set("streamResponse", "false").unwrap();
        assert!(draft.has_unsaved_changes(&store));
        assert_eq!(draft.save(&store).unwrap(), SaveOutcome::Written);
        assert!(!draft.has_unsaved_changes(&store));

        let raw = std::fs::read_to_string(store.path()).unwrap();
        assert!(raw.contains("\"apiKey\": \"secret\""));
        assert!(raw.contains("\"maxTokens\": 4096"));
        assert!(raw.contains("\"theme\": \"dark\""));

        let reloaded = SettingsStore::new(store.path().to_path_buf()).settings();
        assert_eq!(reloaded.api_key, "secret");
        assert_eq!(reloaded.max_tokens, 4096);
        assert_eq!(reloaded.theme, ThemePreference::Dark);
        assert!(!reloaded.stream_response);
    }

    #[test]
    fn saving_unchanged_preferences_leaves_the_file_alone() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        let mut draft = SettingsDraft::from_store(&store);
        draft.set("temperature", "1.2").unwrap();
        assert_eq!(draft.save(&store).unwrap(), SaveOutcome::Written);

        std::fs::write(store.path(), "{\"temperature\": 1.2}").unwrap();
        assert_eq!(draft.save(&store).unwrap(), SaveOutcome::Unchanged);
        assert_eq!(
            std::fs::read_to_string(store.path()).unwrap(),
            "{\"temperature\": 1.2}"
        );

        draft.set("temperature", "5").unwrap();
        assert_eq!(draft.save(&store).unwrap(), SaveOutcome::Written);
        assert_eq!(store.settings().temperature, 2.0);
        assert_eq!(draft.preferences().temperature, 2.0);
    }

    #[test]
    fn first_save_of_defaults_creates_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        let mut draft = SettingsDraft::from_store(&store);
        assert!(!draft.has_unsaved_changes(&store));
        assert_eq!(draft.save(&store).unwrap(), SaveOutcome::Written);
        assert!(store.path().exists());
    }

    #[test]
    fn draft_edits_do_not_touch_disk_until_saved() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        let mut draft = SettingsDraft::from_store(&store);
        draft.set("model", "gpt-4").unwrap();

        assert!(!store.path().exists());
        assert_eq!(store.settings().model, "gpt-4o");
    }

    #[test]
    fn partial_file_is_merged_over_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE_NAME);
        std::fs::write(&path, r#"{ "model": "gpt-3.5-turbo", "temperature": 1.2 }"#).unwrap();

        let settings = SettingsStore::new(path).settings();
        assert_eq!(settings.model, "gpt-3.5-turbo");
        assert_eq!(settings.temperature, 1.2);
        assert_eq!(settings.max_tokens, DEFAULT_MAX_TOKENS);
    }

    #[test]
    fn unreadable_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE_NAME);
        std::fs::write(&path, "{ not json").unwrap();

        assert_eq!(*SettingsStore::new(path).settings(), Preferences::default());
    }

    #[test]
    fn out_of_range_numbers_are_clamped() {
        let mut preferences = Preferences::default();
        preferences.set("temperature", "3.5").unwrap();
        preferences.set("maxTokens", "12").unwrap();

        assert_eq!(preferences.temperature, 2.0);
        assert_eq!(preferences.max_tokens, 100);

        preferences.set("maxTokens", "90000").unwrap();
        assert_eq!(preferences.max_tokens, 8000);
    }

    #[test]
    fn unparsable_and_unknown_keys_are_reported() {
        let mut preferences = Preferences::default();

        assert!(matches!(
            preferences.set("temperature", "warm"),
            Err(SettingsError::InvalidValue { .. })
        ));
        assert!(matches!(
            preferences.set("fontSize", "12"),
            Err(SettingsError::UnknownKey { .. })
        ));
        assert_eq!(preferences, Preferences::default());
    }

    #[test]
    fn every_listed_key_round_trips_through_get() {
        let preferences = Preferences::default();
        for key in PREFERENCE_KEYS {
            assert!(preferences.get(key).is_some(), "missing getter for {key}");
        }
        assert!(preferences.get("nope").is_none());
    }

    #[test]
    fn provider_config_requires_api_key() {
        let mut preferences = Preferences::default();
        assert!(preferences.to_provider_config("groq").is_none());

        preferences.set("apiKey", "k").unwrap();
        preferences.set("baseUrl", "https://example.test/v1").unwrap();
        let config = preferences.to_provider_config("groq").unwrap();
        assert_eq!(config.api_key, "k");
        assert_eq!(config.endpoint, "https://example.test/v1");
    }
}
