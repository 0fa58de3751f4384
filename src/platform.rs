//! # Platform-specific utilities
//!
//! Questo modulo centralizza la logica cross-platform per trovare il binario
//! di Ghostscript (`gs` su Unix, `gswin64c` su Windows) e verificarne la
//! presenza nel `PATH` all'avvio del servizio.

use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Logical name of the compression engine
pub const GHOSTSCRIPT: &str = "ghostscript";

/// Platform-specific command manager
pub struct PlatformCommands {
    commands: HashMap<&'static str, &'static str>,
    which_command: &'static str,
}

impl PlatformCommands {
    /// Get the singleton instance
    pub fn instance() -> &'static Self {
        static INSTANCE: OnceLock<PlatformCommands> = OnceLock::new();
        INSTANCE.get_or_init(Self::new)
    }

    fn new() -> Self {
        let (commands, which_command) = if cfg!(windows) {
            let mut commands = HashMap::new();
            commands.insert(GHOSTSCRIPT, "gswin64c.exe");
            (commands, "where")
        } else {
            let mut commands = HashMap::new();
            commands.insert(GHOSTSCRIPT, "gs");
            (commands, "which")
        };

        Self {
            commands,
            which_command,
        }
    }

    /// Get the platform-specific command name
    pub fn get_command<'a>(&self, base_name: &'a str) -> &'a str {
        self.commands.get(base_name).copied().unwrap_or(base_name)
    }

    /// Get the command used to check if a program exists
    pub fn which_command(&self) -> &str {
        self.which_command
    }

    /// Ghostscript binary name for this platform
    pub fn ghostscript(&self) -> &'static str {
        self.get_command(GHOSTSCRIPT)
    }

    /// Check if a command is available on the system
    pub async fn is_command_available(&self, command: &str) -> bool {
        let candidate = Path::new(command);
        if candidate.components().count() > 1 {
            return candidate.is_file();
        }

        if Self::find_in_system_path(command).is_some() {
            return true;
        }

        // Fallback to traditional which/where command
        match tokio::process::Command::new(self.which_command)
            .arg(command)
            .output()
            .await
        {
            Ok(output) => output.status.success(),
            Err(_) => false,
        }
    }

    /// Find a tool in the system PATH
    pub fn find_in_system_path(tool_name: &str) -> Option<PathBuf> {
        env::split_paths(&env::var_os("PATH")?)
            .map(|dir| dir.join(tool_name))
            .find(|path| path.is_file())
    }

    /// Get system information for debugging
    pub fn system_info() -> SystemInfo {
        SystemInfo {
            os: env::consts::OS,
            arch: env::consts::ARCH,
            family: env::consts::FAMILY,
        }
    }
}

/// System information structure
#[derive(Debug, Clone)]
pub struct SystemInfo {
    pub os: &'static str,
    pub arch: &'static str,
    pub family: &'static str,
}

impl std::fmt::Display for SystemInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} ({})", self.os, self.arch, self.family)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_commands() {
        let platform = PlatformCommands::instance();

        let gs = platform.ghostscript();
        if cfg!(windows) {
            assert_eq!(gs, "gswin64c.exe");
        } else {
            assert_eq!(gs, "gs");
        }

        // Unknown names pass through unchanged
        assert_eq!(platform.get_command("qpdf"), "qpdf");
        assert!(!platform.which_command().is_empty());
    }

    #[tokio::test]
    async fn test_missing_command_is_unavailable() {
        let platform = PlatformCommands::instance();
        assert!(!platform.is_command_available("definitely-not-a-real-tool-91f2").await);
        assert!(!platform.is_command_available("/nonexistent/dir/gs").await);
    }

    #[test]
    fn test_system_info() {
        let info = PlatformCommands::system_info();
        assert!(!info.os.is_empty());
        assert!(!info.arch.is_empty());
        assert!(!info.to_string().is_empty());
    }
}
