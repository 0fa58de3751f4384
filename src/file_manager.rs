//! # File Management Module
//!
//! Questo modulo gestisce il ciclo di vita di tutti i file scritti su disco dal servizio.
//!
//! ## Responsabilità:
//! - Creazione delle directory di lavoro (uploads/ e outputs/)
//! - Generazione di nomi file unici e sicuri per il filesystem
//! - Cancellazione immediata e idempotente dopo l'uso
//! - Sweep per età delle directory di lavoro
//! - Utilità per calcoli dimensioni e percentuali
//!
//! ## Ownership dei file:
//! - Ogni file appartiene alla directory in cui si trova, non a un job
//! - Due sole vie di rimozione: cancellazione eager a fine job, oppure sweep per età
//! - La cancellazione è idempotente: un file già sparito NON è un errore,
//!   quindi le due vie possono sovrapporsi senza problemi
//!
//! ## Nomi file unici:
//! ```text
//! Input:  "My Report (final).pdf", prefix "compressed_"
//! Output: "compressed_My_Report__final__1718031234567_k3x9qa.pdf"
//! ```
//!
//! ## Sweep:
//! - Visita solo i file regolari al primo livello della directory
//! - Rimuove quelli con mtime più vecchio di `max_age`
//! - Un errore su un file non interrompe lo sweep degli altri
//! - File spariti tra listing e delete contano come già rimossi
//!
//! ## Esempio:
//! ```rust,ignore
//! let path = FileManager::allocate_unique_path(&output_dir, "report.pdf", "compressed_");
//! // ... usa il file ...
//! FileManager::delete_now(&[input_path, path]).await;
//! let removed = FileManager::sweep(&output_dir, Duration::from_secs(300)).await;
//! ```

use anyhow::Result;
use futures::future::join_all;
use rand::distr::Alphanumeric;
use rand::Rng;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::fs;
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

const RANDOM_TOKEN_LEN: usize = 6;

/// Manages working-directory files
pub struct FileManager;

impl FileManager {
    /// Create the working directories if they don't exist
    pub async fn ensure_directories(dirs: &[&Path]) -> Result<()> {
        for dir in dirs {
            fs::create_dir_all(dir)
                .await
                .map_err(|e| anyhow::anyhow!("Failed to create directory {}: {}", dir.display(), e))?;
        }
        info!(
            "Directories created/verified: {}",
            dirs.iter().map(|d| d.display().to_string()).collect::<Vec<_>>().join(", ")
        );
        Ok(())
    }

    /// Collision-resistant, filesystem-safe file name derived from `original_name`
    pub fn unique_filename(original_name: &str, prefix: &str) -> String {
        // Only the last component: client-supplied names may carry directories
        let name = Path::new(original_name)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let name_path = Path::new(&name);

        let extension = name_path
            .extension()
            .map(|ext| format!(".{}", Self::sanitize(&ext.to_string_lossy())))
            .unwrap_or_default();
        let stem = name_path
            .file_stem()
            .map(|stem| Self::sanitize(&stem.to_string_lossy()))
            .unwrap_or_default();

        let timestamp = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        let token: String = rand::rng()
            .sample_iter(&Alphanumeric)
            .take(RANDOM_TOKEN_LEN)
            .map(|c| char::from(c).to_ascii_lowercase())
            .collect();

        format!("{}{}_{}_{}{}", prefix, stem, timestamp, token, extension)
    }

    /// Unique path inside `dir`
    pub fn allocate_unique_path(dir: &Path, original_name: &str, prefix: &str) -> PathBuf {
        dir.join(Self::unique_filename(original_name, prefix))
    }

    fn sanitize(value: &str) -> String {
        value
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect()
    }

    /// Delete one file. `Ok(false)` when it was already gone.
    pub async fn delete_file(path: &Path) -> std::io::Result<bool> {
        match fs::remove_file(path).await {
            Ok(()) => {
                debug!("Deleted: {}", path.display());
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Delete every path independently. Never fails; returns how many files were removed.
    pub async fn delete_now<P: AsRef<Path>>(paths: &[P]) -> usize {
        let results = join_all(paths.iter().map(|path| async move {
            let path = path.as_ref();
            match Self::delete_file(path).await {
                Ok(removed) => removed,
                Err(e) => {
                    error!("Error deleting file {}: {}", path.display(), e);
                    false
                }
            }
        }))
        .await;

        results.into_iter().filter(|removed| *removed).count()
    }

    /// Remove regular files in `dir` whose last modification is older than `max_age`
    pub async fn sweep(dir: &Path, max_age: Duration) -> usize {
        if !dir.is_dir() {
            warn!("Skipping cleanup, not a directory: {}", dir.display());
            return 0;
        }

        // Listing is a snapshot: files created after this are left for the next round
        let entries: Vec<PathBuf> = WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .collect();

        let deleted_count = Self::sweep_entries(&entries, max_age, SystemTime::now()).await;
        if deleted_count > 0 {
            info!("Cleanup: deleted {} old files from {}", deleted_count, dir.display());
        }

        deleted_count
    }

    /// Age check and delete over a listing snapshot. Entries may have changed since listing;
    /// a failure on one never stops the rest.
    async fn sweep_entries(entries: &[PathBuf], max_age: Duration, now: SystemTime) -> usize {
        let mut deleted_count = 0;

        for path in entries {
            let modified = match fs::metadata(path).await.and_then(|m| m.modified()) {
                Ok(modified) => modified,
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    // Vanished since listing, most likely eager deletion
                    debug!("Skipping {}: already gone", path.display());
                    continue;
                }
                Err(e) => {
                    error!("Error reading mtime of {}: {}", path.display(), e);
                    continue;
                }
            };

            let age = now.duration_since(modified).unwrap_or(Duration::ZERO);
            if age <= max_age {
                continue;
            }

            match Self::delete_file(path).await {
                Ok(true) => deleted_count += 1,
                Ok(false) => {}
                Err(e) => error!("Error processing file {}: {}", path.display(), e),
            }
        }

        deleted_count
    }

    /// Get human-readable file size
    pub fn format_size(size: u64) -> String {
        const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
        let mut size = size as f64;
        let mut unit_index = 0;

        while size >= 1024.0 && unit_index < UNITS.len() - 1 {
            size /= 1024.0;
            unit_index += 1;
        }

        if unit_index == 0 {
            format!("{} {}", size as u64, UNITS[unit_index])
        } else {
            format!("{:.2} {}", size, UNITS[unit_index])
        }
    }

    /// Calculate percentage reduction
    pub fn calculate_reduction(original_size: u64, new_size: u64) -> f64 {
        if original_size == 0 {
            0.0
        } else {
            ((original_size as f64 - new_size as f64) / original_size as f64) * 100.0
        }
    }
}
