use directories::ProjectDirs;
use pdflyzer_core::Settings;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const SETTINGS_SCHEMA_VERSION: u32 = 1;
const SETTINGS_FILE_NAME: &str = "settings.json";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("unable to resolve local data directory")]
    NoDataDirectory,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("unsupported settings version {found} (expected at most {supported})")]
    UnsupportedVersion { found: u32, supported: u32 },
}

#[derive(Debug, Clone)]
pub struct Storage {
    root: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SettingsEnvelope {
    version: u32,
    settings: Settings,
}

impl Storage {
    pub fn from_default_project() -> Result<Self, StorageError> {
        let dirs =
            ProjectDirs::from("dev", "PDFlyzer", "PDFlyzer").ok_or(StorageError::NoDataDirectory)?;

        Ok(Self { root: dirs.data_local_dir().to_path_buf() })
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn settings_path(&self) -> PathBuf {
        self.root.join(SETTINGS_FILE_NAME)
    }

    /// Load settings, falling back to defaults when none were saved
    pub fn load_settings(&self) -> Result<Settings, StorageError> {
        let path = self.settings_path();
        if !path.exists() {
            return Ok(Settings::default());
        }

        load_settings_file(&path)
    }

    pub fn save_settings(&self, settings: &Settings) -> Result<(), StorageError> {
        fs::create_dir_all(&self.root)?;

        let envelope =
            SettingsEnvelope { version: SETTINGS_SCHEMA_VERSION, settings: settings.clone() };

        let bytes = serde_json::to_vec_pretty(&envelope)?;
        fs::write(self.settings_path(), bytes)?;
        Ok(())
    }
}

/// Read a settings envelope from an explicit path
pub fn load_settings_file(path: &Path) -> Result<Settings, StorageError> {
    let bytes = fs::read(path)?;
    let envelope: SettingsEnvelope = serde_json::from_slice(&bytes)?;

    if envelope.version > SETTINGS_SCHEMA_VERSION {
        return Err(StorageError::UnsupportedVersion {
            found: envelope.version,
            supported: SETTINGS_SCHEMA_VERSION,
        });
    }

    Ok(envelope.settings)
}
