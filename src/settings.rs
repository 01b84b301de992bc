use std::fs;
use std::path::{Path, PathBuf};

use directories::{BaseDirs, ProjectDirs};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::capture::DEFAULT_TEMPLATE;
use crate::export::PageFit;
use crate::model::Issuer;

const DEFAULT_ISSUER_TEMPLATE: &str = include_str!("../issuer.toml");

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("could not access {path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },
    #[error("invalid settings in {path}: {source}")]
    Parse { path: PathBuf, source: toml::de::Error },
    #[error("could not serialize settings: {0}")]
    Serialize(#[from] toml::ser::Error),
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> SettingsError + '_ {
    move |source| SettingsError::Io { path: path.to_path_buf(), source }
}

fn default_output_dir() -> String {
    "~/Documents/Invoices".to_string()
}

fn default_ppi() -> f32 {
    192.0
}

fn default_typst_bin() -> String {
    "typst".to_string()
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AppSettings {
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
    /// Capture resolution; 192 is twice the 96 dpi preview.
    #[serde(default = "default_ppi")]
    pub ppi: f32,
    #[serde(default)]
    pub fit: PageFit,
    #[serde(default = "default_typst_bin")]
    pub typst_bin: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            ppi: default_ppi(),
            fit: PageFit::default(),
            typst_bin: default_typst_bin(),
        }
    }
}

impl AppSettings {
    pub fn output_path(&self) -> PathBuf {
        PathBuf::from(expand_home_dir(&self.output_dir))
    }
}

pub fn config_dir() -> PathBuf {
    if let Some(proj_dirs) = ProjectDirs::from("com", "invoice-builder", "app") {
        let dir = proj_dirs.config_dir();
        if !dir.exists() {
            fs::create_dir_all(dir).ok();
        }
        return dir.to_path_buf();
    }
    PathBuf::from(".")
}

pub fn load_settings_from(path: &Path) -> Result<Option<AppSettings>, SettingsError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path).map_err(io_err(path))?;
    let settings = toml::from_str(&content).map_err(|source| SettingsError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), "settings loaded");
    Ok(Some(settings))
}

pub fn save_settings_to(path: &Path, settings: &AppSettings) -> Result<(), SettingsError> {
    let toml_str = toml::to_string_pretty(settings)?;
    fs::write(path, toml_str).map_err(io_err(path))
}

pub fn load_settings() -> Result<Option<AppSettings>, SettingsError> {
    load_settings_from(&config_dir().join("settings.toml"))
}

pub fn save_settings(settings: &AppSettings) -> Result<(), SettingsError> {
    save_settings_to(&config_dir().join("settings.toml"), settings)
}

/// Loads the saved issuer defaults, writing the blank template on first use.
pub fn load_issuer_defaults(dir: &Path) -> Result<Issuer, SettingsError> {
    let path = dir.join("issuer.toml");
    let content = if path.exists() {
        fs::read_to_string(&path).map_err(io_err(&path))?
    } else {
        info!(path = %path.display(), "initializing default issuer configuration");
        fs::write(&path, DEFAULT_ISSUER_TEMPLATE).map_err(io_err(&path))?;
        DEFAULT_ISSUER_TEMPLATE.to_string()
    };
    toml::from_str(&content).map_err(|source| SettingsError::Parse { path, source })
}

pub fn save_issuer_defaults(dir: &Path, issuer: &Issuer) -> Result<(), SettingsError> {
    let path = dir.join("issuer.toml");
    let toml_str = toml::to_string_pretty(issuer)?;
    fs::write(&path, toml_str).map_err(io_err(&path))
}

/// Returns the user-editable page template, initializing it from the built-in one.
pub fn load_template(dir: &Path) -> Result<String, SettingsError> {
    let template_dir = dir.join("templates");
    let path = template_dir.join("invoice.typ.tera");
    if !path.exists() {
        fs::create_dir_all(&template_dir).map_err(io_err(&template_dir))?;
        info!(path = %path.display(), "initializing default page template");
        fs::write(&path, DEFAULT_TEMPLATE).map_err(io_err(&path))?;
    }
    fs::read_to_string(&path).map_err(io_err(&path))
}

pub fn expand_home_dir(path: &str) -> String {
    if path.starts_with('~') {
        if let Some(base_dirs) = BaseDirs::new() {
            let home = base_dirs.home_dir().to_string_lossy();
            return path.replacen('~', &home, 1);
        }
    }
    path.to_string()
}
