//! # Error Types Module
//!
//! Questo modulo definisce i tipi di errore custom del servizio.
//!
//! ## Responsabilità:
//! - Definisce `CompressError` per gli errori "di infrastruttura" (I/O, config, upload)
//! - Gli errori di upload diventano risposte 400, gli altri 500 (vedi `http::errors`)
//! - Integra con `thiserror` per automatic error conversion
//!
//! ## Nota:
//! I fallimenti di un job di compressione NON passano da qui: sono valori
//! terminali di `classifier::Outcome`, gestiti in modo esaustivo dal chiamante.
//!
//! ## Esempio:
//! ```rust,ignore
//! if !PlatformCommands::instance().is_command_available("gs").await {
//!     return Err(CompressError::MissingDependency("gs".to_string()));
//! }
//! ```

/// Infrastructure errors for the compression service
#[derive(thiserror::Error, Debug)]
pub enum CompressError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Dependency missing: {0}")]
    MissingDependency(String),

    #[error("Upload rejected: {0}")]
    Upload(String),
}
