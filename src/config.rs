use serde::Deserialize;
use std::{fs, path::Path};
use tracing::info;

use crate::alerts::DEFAULT_LOW_STOCK_THRESHOLD;
use crate::error::ConfigError;
use crate::extract::TesseractOcr;
use crate::identity::CatalogClassifier;
use crate::identity::catalog::DEFAULT_BRAND_THRESHOLD;

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default = "default_db_path")]
    pub db_path: String,
    /// Empty disables snapshots.
    #[serde(default = "default_snapshot_dir")]
    pub snapshot_dir: String,
    #[serde(default = "default_low_stock_threshold")]
    pub low_stock_threshold: u32,
    #[serde(default)]
    pub ocr: OcrConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
}

fn default_db_path() -> String {
    "stock/ledger.db".to_string()
}

fn default_snapshot_dir() -> String {
    "backups".to_string()
}

fn default_low_stock_threshold() -> u32 {
    DEFAULT_LOW_STOCK_THRESHOLD
}

#[derive(Debug, Deserialize)]
pub struct OcrConfig {
    #[serde(default = "default_ocr_command")]
    pub command: String,
    #[serde(default = "default_ocr_languages")]
    pub languages: String,
}

fn default_ocr_command() -> String {
    "tesseract".to_string()
}

fn default_ocr_languages() -> String {
    "eng".to_string()
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            command: default_ocr_command(),
            languages: default_ocr_languages(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CatalogConfig {
    #[serde(default)]
    pub extra_brands: Vec<String>,
    #[serde(default = "default_brand_threshold")]
    pub brand_threshold: f64,
}

fn default_brand_threshold() -> f64 {
    DEFAULT_BRAND_THRESHOLD
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            extra_brands: Vec::new(),
            brand_threshold: default_brand_threshold(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            snapshot_dir: default_snapshot_dir(),
            low_stock_threshold: default_low_stock_threshold(),
            ocr: OcrConfig::default(),
            catalog: CatalogConfig::default(),
        }
    }
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Like [`Config::load`], but a missing file means defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            info!(path = %path.display(), "No config file; using defaults");
            return Ok(Self::default());
        }
        Self::load(path)
    }

    pub fn snapshot_dir(&self) -> Option<&Path> {
        let dir = self.snapshot_dir.trim();
        (!dir.is_empty()).then(|| Path::new(dir))
    }

    pub fn classifier(&self) -> CatalogClassifier {
        CatalogClassifier::new()
            .with_extra_brands(self.catalog.extra_brands.iter().cloned())
            .with_threshold(self.catalog.brand_threshold)
    }

    pub fn ocr(&self) -> TesseractOcr {
        TesseractOcr::new(&self.ocr.command, &self.ocr.languages)
    }
}
