//! Configuration file watcher for hot reload.
//!
//! Watches the parent directory rather than the file itself, since editors
//! commonly save by renaming a temp file over the original, which drops a
//! watch held on the old inode.

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::config::loader::{parse_config, ConfigError};
use crate::config::schema::ProxyConfig;

/// A watcher that monitors the configuration file for changes.
pub struct ConfigWatcher {
    path: PathBuf,
    update_tx: mpsc::UnboundedSender<ProxyConfig>,
}

impl ConfigWatcher {
    /// Create a new ConfigWatcher.
    ///
    /// Returns the watcher and a receiver for validated configuration updates.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<ProxyConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        (
            Self {
                path: path.to_path_buf(),
                update_tx,
            },
            update_rx,
        )
    }

    /// Start watching. The returned watcher must be kept alive.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let tx = self.update_tx;
        let path = self.path.clone();
        // Identical rewrites (touch, save without edits) are not reloads.
        let last_content = Mutex::new(std::fs::read_to_string(&path).ok());

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                let event = match res {
                    Ok(event) => event,
                    Err(e) => {
                        tracing::error!(error = ?e, "Config watch error");
                        return;
                    }
                };
                if !(event.kind.is_modify() || event.kind.is_create()) {
                    return;
                }
                if !event.paths.iter().any(|p| same_file_name(p, &path)) {
                    return;
                }

                let content = match std::fs::read_to_string(&path) {
                    Ok(content) => content,
                    Err(e) => {
                        tracing::warn!(path = ?path, error = %e, "Config file unreadable, keeping current");
                        return;
                    }
                };
                {
                    let mut last = match last_content.lock() {
                        Ok(guard) => guard,
                        Err(poisoned) => poisoned.into_inner(),
                    };
                    if last.as_deref() == Some(content.as_str()) {
                        return;
                    }
                    *last = Some(content.clone());
                }

                match parse_config(&content) {
                    Ok(config) => {
                        tracing::info!(path = ?path, "Config change detected, reloading");
                        let _ = tx.send(config);
                    }
                    Err(ConfigError::Validation(errors)) => {
                        for err in errors {
                            tracing::error!(%err, "Rejected config reload");
                        }
                    }
                    Err(e) => tracing::error!(error = %e, "Failed to reload config, keeping current"),
                }
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, "Config watcher started");
        Ok(watcher)
    }
}

fn same_file_name(changed: &Path, watched: &Path) -> bool {
    changed.file_name().is_some() && changed.file_name() == watched.file_name()
}
