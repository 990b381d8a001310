// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Config file watcher for registry hot reload.
//!
//! Watches the parent directory of the config file (editors often save by
//! renaming a temp file over the original), debounces bursts of events, and
//! broadcasts every reload that passes validation. Rejected reloads are logged
//! and the previous configuration stays in effect.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use notify_debouncer_mini::{new_debouncer, DebounceEventResult, Debouncer};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use crate::diagnostic::ConfigError;
use crate::model::StrataConfig;

/// Default debounce window for file events.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

/// Watches a config file and broadcasts validated reloads.
///
/// Dropping the watcher stops file watching and ends the reload task.
pub struct RegistryWatcher {
    tx: broadcast::Sender<Arc<StrataConfig>>,
    path: PathBuf,
    _debouncer: Debouncer<RecommendedWatcher>,
}

impl RegistryWatcher {
    /// Start watching `path`. Must be called inside a Tokio runtime.
    ///
    /// The initial configuration is not broadcast; load it with
    /// [`crate::load_and_validate_path`] before starting the watcher.
    pub fn spawn(
        path: impl Into<PathBuf>,
        debounce: Duration,
    ) -> Result<(Self, broadcast::Receiver<Arc<StrataConfig>>), ConfigError> {
        let path = path.into();
        let (tx, rx) = broadcast::channel(8);
        let (event_tx, mut event_rx) = mpsc::unbounded_channel::<()>();

        let file_name = path.file_name().map(|n| n.to_os_string());
        let mut debouncer = new_debouncer(debounce, move |res: DebounceEventResult| match res {
            Ok(events) => {
                let ours = events
                    .iter()
                    .any(|event| event.path.file_name().map(|n| n.to_os_string()) == file_name);
                if ours {
                    let _ = event_tx.send(());
                }
            }
            Err(err) => warn!(error = %err, "config watcher error"),
        })
        .map_err(|e| ConfigError::Other(format!("cannot create config watcher: {e}")))?;

        let watch_dir = watch_dir(&path);
        debouncer
            .watcher()
            .watch(&watch_dir, RecursiveMode::NonRecursive)
            .map_err(|e| {
                ConfigError::Other(format!("cannot watch `{}`: {e}", watch_dir.display()))
            })?;

        let reload_tx = tx.clone();
        let reload_path = path.clone();
        tokio::spawn(async move {
            while event_rx.recv().await.is_some() {
                debug!(path = %reload_path.display(), "config file changed");
                if let Some(config) = reload(&reload_path) {
                    // No subscribers is fine; the reload was still validated.
                    let _ = reload_tx.send(Arc::new(config));
                }
            }
            debug!(path = %reload_path.display(), "config watcher stopped");
        });

        info!(path = %path.display(), "watching config for registry changes");

        Ok((
            Self {
                tx,
                path,
                _debouncer: debouncer,
            },
            rx,
        ))
    }

    /// Subscribe to validated reloads.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<StrataConfig>> {
        self.tx.subscribe()
    }

    /// The watched config file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn watch_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Load and validate the file, logging every rejection.
fn reload(path: &Path) -> Option<StrataConfig> {
    match crate::load_and_validate_path(path) {
        Ok(config) => {
            info!(
                path = %path.display(),
                models = config.models.len(),
                "config reloaded"
            );
            Some(config)
        }
        Err(errors) => {
            for error in &errors {
                warn!(path = %path.display(), error = %error, "config reload rejected");
            }
            None
        }
    }
}
