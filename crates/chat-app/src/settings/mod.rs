pub mod state;

pub use state::{
    PREFERENCE_KEYS, Preferences, SaveOutcome, SettingsDraft, SettingsError, SettingsStore,
    ThemePreference,
};
