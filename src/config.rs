//! # Configuration Management Module
//!
//! Questo modulo gestisce tutta la configurazione del servizio.
//!
//! ## Responsabilità:
//! - Definisce la struct `Config` con tutti i parametri del servizio
//! - Fornisce validazione robusta dei parametri di input
//! - Supporta caricamento/salvataggio configurazione da/verso file JSON
//! - Fornisce valori di default sensati per tutti i parametri
//!
//! ## Parametri di configurazione:
//! - `port`: Porta HTTP (default: 5000)
//! - `development`: Modalità sviluppo, aggiunge dettagli diagnostici agli errori
//! - `max_file_size_mb`: Dimensione massima upload (default: 40)
//! - `upload_dir` / `output_dir`: Directory di lavoro per input e output
//! - `cors_origin`: Origin ammessa dal CORS (default: "http://localhost:8080")
//! - `rate_limit_window_secs` / `rate_limit_max_requests`: 5 richieste ogni 10 minuti
//! - `cleanup_interval_secs`: Intervallo dello sweep (default: 120)
//! - `file_max_age_secs`: Età massima dei file prima dello sweep (default: 300)
//! - `default_preset`: Preset usato quando quello richiesto è assente o sconosciuto
//! - `presets`: Tabella nome preset → profilo Ghostscript
//! - `engine_timeout_secs`: Timeout per singola invocazione di Ghostscript (default: 120)
//! - `engine_command`: Path esplicito del binario Ghostscript (default: dipende dalla piattaforma)
//!
//! ## Validazione:
//! - Controlla che timeout, intervallo, dimensione e limiti siano > 0
//! - Limita `max_file_size_mb` a `MAX_FILE_SIZE_MB_LIMIT`
//! - Controlla che il preset di default esista nella tabella
//! - Controlla che `file_max_age_secs` superi `engine_timeout_secs`, altrimenti
//!   lo sweep potrebbe cancellare file di un job ancora in corso
//! - Controlla che upload e output non coincidano
//! - `from_file` non valida: la validazione avviene una sola volta, dopo
//!   l'applicazione degli override da CLI e ambiente
//!
//! ## Esempio:
//! ```rust,ignore
//! let config = Config {
//!     engine_timeout_secs: 60,
//!     file_max_age_secs: 180,
//!     ..Default::default()
//! };
//! config.validate()?;
//! ```

use crate::platform::PlatformCommands;
use crate::preset::Profile;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration for the compression service
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP listen port
    pub port: u16,
    /// Append diagnostic detail to error responses
    pub development: bool,
    /// Upload size limit in megabytes
    pub max_file_size_mb: u64,
    /// Working directory for uploaded files
    pub upload_dir: PathBuf,
    /// Working directory for compressed files
    pub output_dir: PathBuf,
    /// Allowed CORS origin
    pub cors_origin: String,
    /// Rate limit window
    pub rate_limit_window_secs: u64,
    /// Requests admitted per client per window
    pub rate_limit_max_requests: u32,
    /// Interval between two sweeps of the working directories
    pub cleanup_interval_secs: u64,
    /// Files older than this are removed by the sweep
    pub file_max_age_secs: u64,
    /// Preset used when the requested one is missing or unknown
    pub default_preset: String,
    /// Preset name -> Ghostscript profile
    pub presets: BTreeMap<String, Profile>,
    /// Wall-clock budget for one Ghostscript run
    pub engine_timeout_secs: u64,
    /// Ghostscript binary; `None` picks `gs` / `gswin64c` for the platform
    pub engine_command: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 5000,
            development: false,
            max_file_size_mb: 40,
            upload_dir: PathBuf::from("uploads"),
            output_dir: PathBuf::from("outputs"),
            cors_origin: "http://localhost:8080".to_string(),
            rate_limit_window_secs: 10 * 60,
            rate_limit_max_requests: 5,
            cleanup_interval_secs: 2 * 60,
            file_max_age_secs: 5 * 60,
            default_preset: "recommended".to_string(),
            presets: default_presets(),
            engine_timeout_secs: 2 * 60,
            engine_command: None,
        }
    }
}

/// User-facing names plus the legacy Ghostscript aliases
pub fn default_presets() -> BTreeMap<String, Profile> {
    [
        ("recommended", Profile::Ebook),
        ("strong", Profile::Screen),
        ("ebook", Profile::Ebook),
        ("screen", Profile::Screen),
        ("printer", Profile::Printer),
        ("prepress", Profile::Prepress),
    ]
    .into_iter()
    .map(|(name, profile)| (name.to_string(), profile))
    .collect()
}

/// Upper bound for `max_file_size_mb` (1 TiB)
pub const MAX_FILE_SIZE_MB_LIMIT: u64 = 1024 * 1024;

impl Config {
    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        if self.max_file_size_mb == 0 {
            return Err(anyhow::anyhow!("Max file size must be greater than 0 MB"));
        }

        if self.max_file_size_mb > MAX_FILE_SIZE_MB_LIMIT {
            return Err(anyhow::anyhow!(
                "Max file size must be at most {} MB, got {}",
                MAX_FILE_SIZE_MB_LIMIT,
                self.max_file_size_mb
            ));
        }

        if self.engine_timeout_secs == 0 {
            return Err(anyhow::anyhow!("Engine timeout must be greater than 0 seconds"));
        }

        if self.cleanup_interval_secs == 0 {
            return Err(anyhow::anyhow!("Cleanup interval must be greater than 0 seconds"));
        }

        if self.rate_limit_window_secs == 0 || self.rate_limit_max_requests == 0 {
            return Err(anyhow::anyhow!("Rate limit window and request count must be greater than 0"));
        }

        if self.file_max_age_secs <= self.engine_timeout_secs {
            return Err(anyhow::anyhow!(
                "File max age ({}s) must exceed the engine timeout ({}s)",
                self.file_max_age_secs,
                self.engine_timeout_secs
            ));
        }

        if !self.presets.contains_key(&self.default_preset.to_lowercase()) {
            return Err(anyhow::anyhow!("Unknown default preset: {}", self.default_preset));
        }

        if self.upload_dir == self.output_dir {
            return Err(anyhow::anyhow!(
                "Upload and output directories must differ: {}",
                self.upload_dir.display()
            ));
        }

        Ok(())
    }

    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_mb.saturating_mul(1024 * 1024)
    }

    pub fn engine_timeout(&self) -> Duration {
        Duration::from_secs(self.engine_timeout_secs)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }

    pub fn file_max_age(&self) -> Duration {
        Duration::from_secs(self.file_max_age_secs)
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_secs)
    }

    /// Ghostscript binary to invoke
    pub fn engine_command(&self) -> PathBuf {
        self.engine_command
            .clone()
            .unwrap_or_else(|| PathBuf::from(PlatformCommands::instance().ghostscript()))
    }

    /// Load configuration from file. Not validated: callers apply overrides, then `validate()`
    pub async fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path).await?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.engine_timeout_secs = 0;
        assert!(config.validate().is_err());

        config.engine_timeout_secs = 120;
        config.file_max_age_secs = 120;
        assert!(config.validate().is_err());

        config.file_max_age_secs = 300;
        config.default_preset = "ultra".to_string();
        assert!(config.validate().is_err());

        config.default_preset = "STRONG".to_string();
        assert!(config.validate().is_ok());

        config.output_dir = config.upload_dir.clone();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_file_size_bounds() {
        let mut config = Config {
            max_file_size_mb: MAX_FILE_SIZE_MB_LIMIT,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
        assert_eq!(config.max_file_size_bytes(), MAX_FILE_SIZE_MB_LIMIT * 1024 * 1024);

        config.max_file_size_mb = MAX_FILE_SIZE_MB_LIMIT + 1;
        assert!(config.validate().is_err());

        config.max_file_size_mb = u64::MAX;
        assert!(config.validate().is_err());
        assert_eq!(config.max_file_size_bytes(), u64::MAX);
    }

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.port, 5000);
        assert_eq!(config.max_file_size_bytes(), 40 * 1024 * 1024);
        assert_eq!(config.default_preset, "recommended");
        assert_eq!(config.engine_timeout(), Duration::from_secs(120));
        assert_eq!(config.cleanup_interval(), Duration::from_secs(120));
        assert_eq!(config.file_max_age(), Duration::from_secs(300));
        assert_eq!(config.rate_limit_max_requests, 5);
        assert_eq!(config.presets.len(), 6);
        assert_eq!(config.presets["strong"], Profile::Screen);
        assert!(!config.development);
    }

    #[tokio::test]
    async fn test_config_save_load() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");

        let original_config = Config {
            port: 8081,
            engine_timeout_secs: 30,
            file_max_age_secs: 90,
            default_preset: "strong".to_string(),
            ..Default::default()
        };

        original_config.save_to_file(&config_path).await.unwrap();

        let loaded_config = Config::from_file(&config_path).await.unwrap();

        assert_eq!(loaded_config.port, 8081);
        assert_eq!(loaded_config.engine_timeout_secs, 30);
        assert_eq!(loaded_config.file_max_age_secs, 90);
        assert_eq!(loaded_config.default_preset, "strong");
        assert_eq!(loaded_config.presets, default_presets());
    }

    #[tokio::test]
    async fn test_config_missing_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config = Config::from_file(&temp_dir.path().join("absent.json")).await.unwrap();
        assert_eq!(config.port, 5000);
    }

    #[tokio::test]
    async fn test_config_partial_file_fills_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("partial.json");
        tokio::fs::write(&config_path, r#"{ "port": 9000, "presets": { "tiny": "/screen", "recommended": "/ebook" } }"#)
            .await
            .unwrap();

        let config = Config::from_file(&config_path).await.unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.presets.len(), 2);
        assert_eq!(config.presets["tiny"], Profile::Screen);
    }

    #[tokio::test]
    async fn test_config_file_validated_after_overrides() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("needs-override.json");
        // Not valid alone: the sweep age does not exceed the default timeout
        tokio::fs::write(&config_path, r#"{ "file_max_age_secs": 60 }"#)
            .await
            .unwrap();

        let mut config = Config::from_file(&config_path).await.unwrap();
        assert_eq!(config.file_max_age_secs, 60);
        assert!(config.validate().is_err());

        // As GS_TIMEOUT_SECS would
        config.engine_timeout_secs = 30;
        assert!(config.validate().is_ok());
    }
}
