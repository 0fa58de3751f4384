//! # Engine Invocation Module
//!
//! Questo modulo esegue Ghostscript come processo esterno e ne cattura il risultato.
//!
//! ## Responsabilità:
//! - Lancia il processo con la lista di argomenti esatta della `Recipe`
//! - Legge stdout e stderr in parallelo mentre il processo gira
//! - Applica un timeout wall-clock e termina il processo allo scadere
//! - Distingue il fallimento di avvio (binario mancante) dagli errori del motore
//!
//! ## Cosa NON fa:
//! - Non decide se il job è riuscito: exit code 0 non basta (PDF protetti da
//!   password producono output bianco con exit 0). La decisione è in `classifier`.
//!
//! ## Timeout:
//! - Allo scadere viene killato l'intero process group (Unix), poi il processo è reaped
//! - La lettura dell'output ha un tempo di grazia: un discendente che tiene
//!   aperte le pipe non può bloccare il chiamante oltre il timeout
//! - Lo stderr letto fino a quel momento viene conservato: alcuni fallimenti
//!   (downsample filter) si manifestano come hang e vanno riconosciuti dallo stderr
//!
//! ## Esempio:
//! ```rust,ignore
//! let invoker = GhostscriptInvoker::new("gs", Duration::from_secs(120));
//! let result = invoker.invoke(&recipe).await;
//! let outcome = classify(&result, &recipe.input_path, &recipe.output_path).await;
//! ```

use crate::preset::Recipe;
use async_trait::async_trait;
use std::ffi::OsString;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Raw capture of one engine run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineResult {
    pub exit_succeeded: bool,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
    pub process_start_failed: bool,
}

impl EngineResult {
    pub fn start_failed(reason: impl Into<String>) -> Self {
        Self {
            stderr: reason.into(),
            process_start_failed: true,
            ..Default::default()
        }
    }
}

/// Executes a recipe against the external engine
#[async_trait]
pub trait EngineInvoker: Send + Sync {
    async fn invoke(&self, recipe: &Recipe) -> EngineResult;
}

#[async_trait]
impl<T: EngineInvoker + ?Sized> EngineInvoker for Box<T> {
    async fn invoke(&self, recipe: &Recipe) -> EngineResult {
        (**self).invoke(recipe).await
    }
}

/// Runs Ghostscript as a child process under a timeout
#[derive(Debug, Clone)]
pub struct GhostscriptInvoker {
    command: OsString,
    timeout: Duration,
}

impl GhostscriptInvoker {
    pub fn new(command: impl Into<OsString>, timeout: Duration) -> Self {
        Self {
            command: command.into(),
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl EngineInvoker for GhostscriptInvoker {
    async fn invoke(&self, recipe: &Recipe) -> EngineResult {
        debug!("Engine arguments: {:?}", recipe.arguments);

        let mut command = Command::new(&self.command);
        command
            .args(&recipe.arguments)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // Own process group, so a timeout also reaches helpers the engine forked
        #[cfg(unix)]
        command.process_group(0);

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!("Failed to start {}: {}", self.command.to_string_lossy(), e);
                return EngineResult::start_failed(e.to_string());
            }
        };
        let pid = child.id();

        let stdout_reader = PipeReader::spawn(child.stdout.take());
        let stderr_reader = PipeReader::spawn(child.stderr.take());

        let start_time = Instant::now();
        let (status, timed_out) = match tokio::time::timeout(self.timeout, child.wait()).await {
            Ok(status) => (status.ok(), false),
            Err(_) => {
                warn!(
                    "Engine timed out after {:.1}s, killing process group",
                    start_time.elapsed().as_secs_f64()
                );
                kill_process_group(pid);
                if let Err(e) = child.kill().await {
                    warn!("Failed to kill timed out engine: {}", e);
                }
                (None, true)
            }
        };

        // A surviving descendant may still hold the pipes open
        let (stdout, stderr) = tokio::join!(
            stdout_reader.finish(READER_GRACE),
            stderr_reader.finish(READER_GRACE)
        );

        debug!(
            "Engine finished in {:.1}s (status: {:?}, timed out: {})",
            start_time.elapsed().as_secs_f64(),
            status,
            timed_out
        );

        EngineResult {
            exit_succeeded: status.map(|s| s.success()).unwrap_or(false),
            exit_code: status.and_then(|s| s.code()),
            stdout,
            stderr,
            timed_out,
            process_start_failed: false,
        }
    }
}

/// How long output collection may outlast the engine process
const READER_GRACE: Duration = Duration::from_secs(2);

#[cfg(unix)]
fn kill_process_group(pid: Option<u32>) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let Some(pid) = pid.and_then(|pid| i32::try_from(pid).ok()) else {
        return;
    };
    if let Err(e) = killpg(Pid::from_raw(pid), Signal::SIGKILL) {
        debug!("Failed to kill process group {}: {}", pid, e);
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pid: Option<u32>) {}

/// Drains one pipe in the background; bytes read so far survive an abort
struct PipeReader {
    buffer: Arc<Mutex<Vec<u8>>>,
    task: Option<JoinHandle<()>>,
}

impl PipeReader {
    fn spawn<R>(pipe: Option<R>) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let task = pipe.map(|mut pipe| {
            let buffer = Arc::clone(&buffer);
            tokio::spawn(async move {
                let mut chunk = [0u8; 8192];
                // A read error keeps whatever arrived before it
                while let Ok(read) = pipe.read(&mut chunk).await {
                    if read == 0 {
                        break;
                    }
                    if let Ok(mut buffer) = buffer.lock() {
                        buffer.extend_from_slice(&chunk[..read]);
                    }
                }
            })
        });
        Self { buffer, task }
    }

    async fn finish(mut self, grace: Duration) -> String {
        if let Some(mut task) = self.task.take() {
            if tokio::time::timeout(grace, &mut task).await.is_err() {
                debug!("Engine output still open after {:?}, abandoning reader", grace);
                task.abort();
            }
        }
        let bytes = match self.buffer.lock() {
            Ok(mut buffer) => std::mem::take(&mut *buffer),
            Err(_) => Vec::new(),
        };
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::preset::PresetResolver;
    use std::path::{Path, PathBuf};

    fn recipe() -> Recipe {
        let preset = PresetResolver::new(&Config::default()).resolve(None);
        Recipe::build(preset, Path::new("in.pdf"), PathBuf::from("out.pdf"))
    }

    #[tokio::test]
    async fn test_missing_binary_reports_start_failure() {
        let invoker = GhostscriptInvoker::new("definitely-not-ghostscript-7c1e", Duration::from_secs(5));
        let result = invoker.invoke(&recipe()).await;
        assert!(result.process_start_failed);
        assert!(!result.exit_succeeded);
        assert!(!result.timed_out);
    }

    #[cfg(unix)]
    fn script(dir: &Path, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("fake-gs.sh");
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        let mut perms = std::fs::metadata(&path).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&path, perms).unwrap();
        path
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_captures_output_and_exit_code() {
        let dir = tempfile::TempDir::new().unwrap();
        let gs = script(dir.path(), "echo out; echo 'warning here' >&2; exit 3");
        let invoker = GhostscriptInvoker::new(gs, Duration::from_secs(10));

        let result = invoker.invoke(&recipe()).await;
        assert!(!result.process_start_failed);
        assert!(!result.exit_succeeded);
        assert_eq!(result.exit_code, Some(3));
        assert_eq!(result.stdout.trim(), "out");
        assert_eq!(result.stderr.trim(), "warning here");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_passes_recipe_arguments() {
        let dir = tempfile::TempDir::new().unwrap();
        let gs = script(dir.path(), "echo \"$@\"");
        let invoker = GhostscriptInvoker::new(gs, Duration::from_secs(10));

        let recipe = recipe();
        let result = invoker.invoke(&recipe).await;
        assert!(result.exit_succeeded);
        assert_eq!(result.stdout.trim(), recipe.arguments.join(" "));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout_kills_and_keeps_partial_stderr() {
        let dir = tempfile::TempDir::new().unwrap();
        let gs = script(dir.path(), "echo 'Failed to initialise downsample filter' >&2; exec sleep 30");
        let invoker = GhostscriptInvoker::new(gs, Duration::from_millis(500));

        let started = Instant::now();
        let result = invoker.invoke(&recipe()).await;
        assert!(started.elapsed() < Duration::from_secs(10));
        assert!(result.timed_out);
        assert!(!result.exit_succeeded);
        assert!(result.stderr.contains("downsample filter"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout_reaches_forked_helpers() {
        let dir = tempfile::TempDir::new().unwrap();
        // No exec: the shell stays alive and its children inherit the pipes
        let gs = script(
            dir.path(),
            "echo 'Failed to initialise downsample filter' >&2\nsleep 6 &\nsleep 30",
        );
        let invoker = GhostscriptInvoker::new(gs, Duration::from_millis(500));

        let started = Instant::now();
        let result = invoker.invoke(&recipe()).await;
        assert!(
            started.elapsed() < Duration::from_millis(500) + READER_GRACE + Duration::from_secs(1),
            "invoke took {:?}",
            started.elapsed()
        );
        assert!(result.timed_out);
        assert!(result.stderr.contains("downsample filter"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_lingering_helper_does_not_block_normal_exit() {
        let dir = tempfile::TempDir::new().unwrap();
        let gs = script(dir.path(), "echo done\n(sleep 30) &\nexit 0");
        let invoker = GhostscriptInvoker::new(gs, Duration::from_secs(10));

        let started = Instant::now();
        let result = invoker.invoke(&recipe()).await;
        assert!(started.elapsed() < READER_GRACE + Duration::from_secs(2));
        assert!(result.exit_succeeded);
        assert!(!result.timed_out);
        assert_eq!(result.stdout.trim(), "done");
    }
}
