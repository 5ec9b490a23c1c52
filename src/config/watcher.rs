//! Configuration file watcher for hot reload.
//!
//! The parent directory is watched rather than the file itself, so editors
//! that save by writing a new file and renaming it over the old one are
//! still seen. One save usually fires several events; a reload is only
//! sent when the file content actually changed.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::parse_config;
use crate::config::schema::GatewayConfig;

/// A watcher that monitors the configuration file for changes.
pub struct ConfigWatcher {
    path: PathBuf,
    update_tx: mpsc::UnboundedSender<GatewayConfig>,
}

impl ConfigWatcher {
    /// Create a new ConfigWatcher.
    ///
    /// Returns the watcher and a receiver for validated configurations.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<GatewayConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        (Self { path: path.to_path_buf(), update_tx }, update_rx)
    }

    /// Start watching. Dropping the returned watcher stops it.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let mut reloader = Reloader {
            path: self.path.clone(),
            last_content: fs::read_to_string(&self.path).ok(),
            tx: self.update_tx,
        };

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    let touches_file = event.paths.iter().any(|p| p.file_name() == reloader.path.file_name());
                    if touches_file && (event.kind.is_modify() || event.kind.is_create()) {
                        reloader.reload();
                    }
                }
                Err(e) => tracing::error!(error = ?e, "Config watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, "Config watcher started");
        Ok(watcher)
    }
}

struct Reloader {
    path: PathBuf,
    last_content: Option<String>,
    tx: mpsc::UnboundedSender<GatewayConfig>,
}

impl Reloader {
    /// Re-read the file and forward it when its content changed.
    ///
    /// Returns whether a new configuration was sent.
    fn reload(&mut self) -> bool {
        let content = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(error = %e, "Config file unreadable, keeping current configuration");
                return false;
            }
        };
        if self.last_content.as_deref() == Some(content.as_str()) {
            return false;
        }

        tracing::info!("Config file change detected, reloading");
        match parse_config(&content) {
            Ok(config) => {
                self.last_content = Some(content);
                self.tx.send(config).is_ok()
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to reload config, keeping current configuration");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reload_only_on_change() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gateway.toml");
        fs::write(&path, "[gateway]\nservice_name = \"a\"\n").unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut reloader = Reloader { path: path.clone(), last_content: fs::read_to_string(&path).ok(), tx };

        assert!(!reloader.reload());

        fs::write(&path, "[gateway]\nservice_name = \"b\"\n").unwrap();
        assert!(reloader.reload());
        assert_eq!(rx.try_recv().unwrap().gateway.service_name, "b");
        assert!(!reloader.reload());
    }

    #[test]
    fn test_invalid_config_is_not_sent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gateway.toml");
        fs::write(&path, "[pool]\nmax_sessions_per_key = 0\n").unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut reloader = Reloader { path, last_content: None, tx };
        assert!(!reloader.reload());
        assert!(rx.try_recv().is_err());
    }
}
