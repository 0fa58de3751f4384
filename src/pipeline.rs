//! # Compression Pipeline Module
//!
//! Orchestratore di un singolo job di compressione.
//!
//! ## Flusso:
//! 1. Risolve il preset richiesto (`preset`)
//! 2. Alloca un path di output unico in outputs/ (`file_manager`)
//! 3. Esegue Ghostscript con timeout (`engine`)
//! 4. Classifica il risultato (`classifier`)
//! 5. Su successo calcola il report di efficacia (`report`)
//!
//! ## Ciclo di vita dei file:
//! - Su qualsiasi fallimento input e output vengono cancellati PRIMA di ritornare
//! - Su successo i path restano vivi dentro `JobFiles`, che il chiamante rilascia
//!   solo dopo aver consegnato l'output al client
//! - `JobFiles` cancella esattamente una volta: con `release()` esplicito oppure
//!   nel `Drop` se il chiamante lo abbandona (es. client disconnesso)
//! - Il guard esiste già durante l'invocazione del motore: se il future di
//!   `compress` viene droppato a metà, input e output vengono cancellati subito
//!
//! ## Retry:
//! - Nessun retry interno: ogni `Outcome` è terminale
//!
//! ## Esempio:
//! ```rust,ignore
//! let pipeline = CompressionPipeline::new(&config, GhostscriptInvoker::new("gs", timeout));
//! match pipeline.compress(request).await {
//!     JobResult::Completed { report, files, .. } => {
//!         deliver(files.output_path()).await;
//!         files.release().await;
//!     }
//!     JobResult::Failed { outcome } => respond_with(outcome),
//! }
//! ```

use crate::classifier::{classify, Outcome};
use crate::config::Config;
use crate::engine::EngineInvoker;
use crate::file_manager::FileManager;
use crate::preset::{PresetResolver, Recipe, ResolvedPreset};
use crate::report::{report, EffectivenessReport};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{error, info, warn};

/// Prefix of every compressed output file
pub const OUTPUT_PREFIX: &str = "compressed_";

/// One incoming job
#[derive(Debug, Clone)]
pub struct CompressionRequest {
    pub input_path: PathBuf,
    pub requested_preset: Option<String>,
}

/// Files owned by a delivered job. Deleted exactly once.
#[derive(Debug)]
pub struct JobFiles {
    input_path: PathBuf,
    output_path: PathBuf,
    released: bool,
}

impl JobFiles {
    pub fn new(input_path: PathBuf, output_path: PathBuf) -> Self {
        Self {
            input_path,
            output_path,
            released: false,
        }
    }

    pub fn input_path(&self) -> &Path {
        &self.input_path
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    /// Delivery finished (successfully or not): delete both files now
    pub async fn release(mut self) -> usize {
        self.released = true;
        FileManager::delete_now(&[&self.input_path, &self.output_path]).await
    }
}

impl Drop for JobFiles {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        let paths = [
            std::mem::take(&mut self.input_path),
            std::mem::take(&mut self.output_path),
        ];
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    FileManager::delete_now(&paths).await;
                });
            }
            Err(_) => {
                for path in &paths {
                    if let Err(e) = std::fs::remove_file(path) {
                        if e.kind() != std::io::ErrorKind::NotFound {
                            error!("Error deleting file {}: {}", path.display(), e);
                        }
                    }
                }
            }
        }
    }
}

/// Terminal disposition of a job
#[derive(Debug)]
pub enum JobResult {
    Completed {
        preset: ResolvedPreset,
        report: EffectivenessReport,
        files: JobFiles,
    },
    /// Files already deleted
    Failed { preset: ResolvedPreset, outcome: Outcome },
}

/// Runs compression jobs against an engine
pub struct CompressionPipeline<I: EngineInvoker> {
    resolver: PresetResolver,
    invoker: I,
    output_dir: PathBuf,
}

impl<I: EngineInvoker> CompressionPipeline<I> {
    pub fn new(config: &Config, invoker: I) -> Self {
        Self {
            resolver: PresetResolver::new(config),
            invoker,
            output_dir: config.output_dir.clone(),
        }
    }

    pub fn resolver(&self) -> &PresetResolver {
        &self.resolver
    }

    /// Run one job to a terminal outcome
    pub async fn compress(&self, request: CompressionRequest) -> JobResult {
        let preset = self.resolver.resolve(request.requested_preset.as_deref());
        if preset.fell_back {
            info!(
                "Unknown or missing preset {:?}, using default '{}' (known: {})",
                request.requested_preset,
                preset.name,
                self.resolver.known_presets().collect::<Vec<_>>().join(", ")
            );
        }

        let input_name = request
            .input_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document.pdf".to_string());
        let output_path = FileManager::allocate_unique_path(&self.output_dir, &input_name, OUTPUT_PREFIX);
        let recipe = Recipe::build(preset.clone(), &request.input_path, output_path);
        // Held across the engine run: a dropped job still cleans up eagerly
        let files = JobFiles::new(recipe.input_path.clone(), recipe.output_path.clone());

        info!(
            "Compressing PDF with quality: {} ({}, {:?} recipe)",
            preset.name, preset.profile, preset.kind
        );
        let start_time = Instant::now();

        let result = self.invoker.invoke(&recipe).await;
        let outcome = classify(&result, &recipe.input_path, &recipe.output_path).await;

        match outcome {
            Outcome::Success {
                original_size,
                compressed_size,
                ..
            } => {
                let report = report(original_size, compressed_size);
                info!(
                    "Compression complete in {:.1}s: {}% reduction ({} -> {})",
                    start_time.elapsed().as_secs_f64(),
                    report.ratio_percent,
                    FileManager::format_size(original_size),
                    FileManager::format_size(compressed_size)
                );
                JobResult::Completed {
                    preset,
                    report,
                    files,
                }
            }
            failure => {
                warn!(
                    "Compression failed after {:.1}s: {}",
                    start_time.elapsed().as_secs_f64(),
                    failure.kind()
                );
                files.release().await;
                JobResult::Failed {
                    preset,
                    outcome: failure,
                }
            }
        }
    }
}
