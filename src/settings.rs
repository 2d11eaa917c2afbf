use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{LabError, LabResult};

const SETTINGS_DIR_NAME: &str = "vision-lab";
const SETTINGS_FILE_NAME: &str = "settings.json";
const SETTINGS_PATH_ENV_VAR: &str = "VISION_LAB_SETTINGS";

pub const IMAGE_MODELS: &[(&str, &str)] = &[(
    "gemini-2.5-flash-image",
    "Gemini 2.5 Flash Image (Fast, General Use)",
)];

pub const TEXT_MODELS: &[(&str, &str)] = &[
    ("gemini-2.5-flash", "Gemini 2.5 Flash (Fast, General Use)"),
    ("gemini-2.5-pro", "Gemini 2.5 Pro (Advanced, Complex Tasks)"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Provider {
    #[default]
    Gemini,
}

impl Provider {
    pub const ALL: &'static [Provider] = &[Provider::Gemini];

    pub fn label(self) -> &'static str {
        match self {
            Provider::Gemini => "Google Gemini",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub provider: Provider,
    pub image_model: String,
    pub text_model: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            provider: Provider::Gemini,
            image_model: IMAGE_MODELS[0].0.to_string(),
            text_model: TEXT_MODELS[0].0.to_string(),
        }
    }
}

/// Display label for a model id, falling back to the id itself.
pub fn model_label<'a>(catalog: &'a [(&'a str, &'a str)], model_id: &'a str) -> &'a str {
    catalog
        .iter()
        .find(|(id, _)| *id == model_id)
        .map(|(_, label)| *label)
        .unwrap_or(model_id)
}

/// Durable single-record settings storage for the current user.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: Option<PathBuf>,
}

impl SettingsStore {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    pub fn from_env() -> Self {
        Self::new(settings_file_path())
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Stored values are merged over the defaults field by field, so fields
    /// that are missing or unreadable keep their default value.
    pub fn load(&self) -> Settings {
        let Some(path) = self.path.as_ref() else {
            return Settings::default();
        };
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Settings::default();
            }
            Err(err) => {
                log::warn!("Could not read settings file {}: {err}", path.display());
                return Settings::default();
            }
        };

        match merge_with_defaults(&text) {
            Some(settings) => {
                log::info!("Loaded settings from {}", path.display());
                settings
            }
            None => {
                log::warn!(
                    "Settings file {} is not a JSON object; using defaults",
                    path.display()
                );
                Settings::default()
            }
        }
    }

    pub fn save(&self, settings: &Settings) -> LabResult<()> {
        let Some(path) = self.path.as_ref() else {
            return Err(LabError::Settings(
                "No settings location is available on this system".to_string(),
            ));
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| {
                LabError::Settings(format!(
                    "Could not create settings directory {}: {err}",
                    parent.display()
                ))
            })?;
        }

        let contents = serde_json::to_string_pretty(settings)
            .map_err(|err| LabError::Settings(format!("Could not encode settings: {err}")))?;
        fs::write(path, contents).map_err(|err| {
            LabError::Settings(format!(
                "Could not write settings file {}: {err}",
                path.display()
            ))
        })?;
        log::info!("Saved settings to {}", path.display());
        Ok(())
    }
}

fn merge_with_defaults(text: &str) -> Option<Settings> {
    let value = serde_json::from_str::<serde_json::Value>(text).ok()?;
    let stored = value.as_object()?;
    let mut settings = Settings::default();

    if let Some(provider) = stored
        .get("provider")
        .and_then(|value| serde_json::from_value::<Provider>(value.clone()).ok())
    {
        settings.provider = provider;
    }
    if let Some(model) = stored
        .get("imageModel")
        .and_then(|value| value.as_str())
        .filter(|model| !model.trim().is_empty())
    {
        settings.image_model = model.to_string();
    }
    if let Some(model) = stored
        .get("textModel")
        .and_then(|value| value.as_str())
        .filter(|model| !model.trim().is_empty())
    {
        settings.text_model = model.to_string();
    }
    Some(settings)
}

fn settings_file_path() -> Option<PathBuf> {
    if let Some(explicit) = env::var_os(SETTINGS_PATH_ENV_VAR) {
        return Some(PathBuf::from(explicit));
    }

    #[cfg(target_os = "windows")]
    {
        return env::var_os("APPDATA")
            .map(PathBuf::from)
            .map(|base| base.join(SETTINGS_DIR_NAME).join(SETTINGS_FILE_NAME));
    }

    #[cfg(target_os = "macos")]
    {
        return env::var_os("HOME").map(PathBuf::from).map(|home| {
            home.join("Library")
                .join("Application Support")
                .join(SETTINGS_DIR_NAME)
                .join(SETTINGS_FILE_NAME)
        });
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        if let Some(xdg) = env::var_os("XDG_CONFIG_HOME") {
            return Some(
                PathBuf::from(xdg)
                    .join(SETTINGS_DIR_NAME)
                    .join(SETTINGS_FILE_NAME),
            );
        }
        env::var_os("HOME").map(PathBuf::from).map(|home| {
            home.join(".config")
                .join(SETTINGS_DIR_NAME)
                .join(SETTINGS_FILE_NAME)
        })
    }
}
