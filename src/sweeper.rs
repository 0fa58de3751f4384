//! # Background Sweep Module
//!
//! Rete di sicurezza per i file orfani: crash, client disconnessi a metà
//! download, o qualsiasi percorso in cui la cancellazione eager è saltata.
//!
//! ## Responsabilità:
//! - Esegue subito uno sweep di tutte le directory di lavoro
//! - Ripete lo sweep a intervallo fisso, indipendentemente dai job attivi
//! - Si ferma con `SweepHandle::cancel()` durante lo shutdown
//!
//! ## Concorrenza:
//! - L'unica sincronizzazione con i job è l'età dei file: `max_age` deve superare
//!   la durata massima di un job (timeout del motore incluso)
//! - Lo shutdown ferma solo il timer, non i job in corso
//!
//! ## Esempio:
//! ```rust,ignore
//! let handle = start_sweep_timer(vec![upload_dir, output_dir], interval, max_age);
//! // ... servizio attivo ...
//! handle.cancel().await;
//! ```

use crate::file_manager::FileManager;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Handle to the running sweep task
pub struct SweepHandle {
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<u64>,
}

impl SweepHandle {
    /// Stop scheduling sweeps. Returns the number of completed sweep rounds.
    pub async fn cancel(mut self) -> u64 {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }

        match (&mut self.task).await {
            Ok(rounds) => {
                info!("Cleanup service stopped after {} rounds", rounds);
                rounds
            }
            Err(e) => {
                warn!("Cleanup task ended abnormally: {}", e);
                0
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Sweep every directory once. Returns the total number of files removed.
pub async fn run_cleanup(dirs: &[PathBuf], max_age: Duration) -> usize {
    debug!("Running scheduled cleanup...");
    let mut removed = 0;
    for dir in dirs {
        removed += FileManager::sweep(dir, max_age).await;
    }
    removed
}

/// Sweep immediately, then every `interval`, until cancelled
pub fn start_sweep_timer(dirs: Vec<PathBuf>, interval: Duration, max_age: Duration) -> SweepHandle {
    let (shutdown_tx, mut shutdown_rx) = oneshot::channel();

    info!(
        "Cleanup service started (runs every {}s, max age {}s)",
        interval.as_secs(),
        max_age.as_secs()
    );

    let task = tokio::spawn(async move {
        // First tick completes immediately
        let mut ticker = time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut rounds = 0u64;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    run_cleanup(&dirs, max_age).await;
                    rounds += 1;
                }
                _ = &mut shutdown_rx => {
                    debug!("Received shutdown signal, stopping cleanup service");
                    break;
                }
            }
        }

        rounds
    });

    SweepHandle {
        shutdown: Some(shutdown_tx),
        task,
    }
}
