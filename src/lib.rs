//! # PDF Compressor Service Library
//!
//! Questo è il modulo principale della libreria che espone tutte le API pubbliche.
//!
//! ## Responsabilità:
//! - Definisce la struttura modulare del servizio
//! - Espone i tipi e le funzioni principali tramite re-exports
//! - Fornisce un'interfaccia pulita per il main.rs e per i test
//!
//! ## Architettura dei moduli:
//! - `config`: Gestione configurazione e validazione parametri
//! - `error`: Tipi di errore di infrastruttura
//! - `preset`: Risoluzione dei preset e costruzione delle ricette Ghostscript
//! - `engine`: Invocazione di Ghostscript con timeout
//! - `classifier`: Classificazione del risultato grezzo in un `Outcome`
//! - `report`: Report di efficacia della compressione
//! - `file_manager`: Nomi unici, cancellazione e sweep per età
//! - `sweeper`: Timer di pulizia periodica
//! - `pipeline`: Orchestratore di un singolo job
//! - `platform`: Risoluzione del binario Ghostscript per piattaforma
//! - `http`: Router axum, upload, rate limiting
//!
//! ## Utilizzo:
//! ```rust,ignore
//! use pdf_compressor_service::{CompressionPipeline, CompressionRequest, Config, GhostscriptInvoker};
//!
//! let config = Config::default();
//! let invoker = GhostscriptInvoker::new(config.engine_command(), config.engine_timeout());
//! let pipeline = CompressionPipeline::new(&config, invoker);
//! let result = pipeline.compress(request).await;
//! ```

pub mod utils;

pub mod classifier;
pub mod config;
pub mod engine;
pub mod error;
pub mod file_manager;
pub mod http;
pub mod pipeline;
pub mod platform;
pub mod preset;
pub mod report;
pub mod sweeper;

pub use classifier::{ContentIssue, Outcome};
pub use config::Config;
pub use engine::{EngineInvoker, EngineResult, GhostscriptInvoker};
pub use error::CompressError;
pub use file_manager::FileManager;
pub use pipeline::{CompressionPipeline, CompressionRequest, JobFiles, JobResult};
pub use preset::{PresetResolver, Profile, Recipe, RecipeKind, ResolvedPreset};
pub use report::{EffectivenessReport, Tier};
pub use sweeper::{start_sweep_timer, SweepHandle};
