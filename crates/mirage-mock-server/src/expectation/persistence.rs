//! JSON file persistence for expectations.
//!
//! The initialization file is read once at startup. When continuous
//! persistence is enabled a background task rewrites the persisted file
//! after every store mutation; bursts of mutations coalesce into one write.

use super::store::{ExpectationStore, StoredExpectation};
use super::types::{Expectation, ExpectationError};
use crate::metrics;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid expectation in {}: {source}", path.display())]
    Invalid {
        path: PathBuf,
        #[source]
        source: ExpectationError,
    },
}

/// Load expectations from a JSON file holding an array of records or a
/// single record. A missing or blank file yields no expectations.
pub fn load_initial(path: &Path) -> Result<Vec<Expectation>, PersistenceError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "Initialization file not found");
            return Ok(Vec::new());
        }
        Err(source) => {
            return Err(PersistenceError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    if content.trim().is_empty() {
        return Ok(Vec::new());
    }

    let parse_err = |source| PersistenceError::Parse {
        path: path.to_path_buf(),
        source,
    };
    let value: serde_json::Value = serde_json::from_str(&content).map_err(parse_err)?;
    let expectations: Vec<Expectation> = if value.is_array() {
        serde_json::from_value(value).map_err(parse_err)?
    } else {
        vec![serde_json::from_value(value).map_err(parse_err)?]
    };

    for expectation in &expectations {
        StoredExpectation::compile(expectation.clone()).map_err(|source| {
            PersistenceError::Invalid {
                path: path.to_path_buf(),
                source,
            }
        })?;
    }

    Ok(expectations)
}

/// Write expectations as a pretty JSON array. The file is written to a
/// sibling temp file first and renamed over the target.
pub fn save_all(path: &Path, expectations: &[Expectation]) -> Result<(), PersistenceError> {
    let write_err = |source| PersistenceError::Write {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(write_err)?;
    }

    let json = serde_json::to_string_pretty(expectations)
        .map_err(|e| write_err(io::Error::new(io::ErrorKind::InvalidData, e)))?;

    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "expectations.json".to_string());
    let temp_path = path.with_file_name(format!(".{file_name}.tmp"));

    fs::write(&temp_path, json).map_err(write_err)?;
    fs::rename(&temp_path, path).map_err(write_err)?;
    Ok(())
}

/// Mirrors the store to the persisted-expectations file.
pub struct PersistenceGateway {
    path: PathBuf,
    store: Arc<ExpectationStore>,
}

impl PersistenceGateway {
    pub fn new(path: impl Into<PathBuf>, store: Arc<ExpectationStore>) -> Self {
        Self {
            path: path.into(),
            store,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Save the current snapshot immediately.
    pub fn flush(&self) -> Result<(), PersistenceError> {
        let expectations = self.store.list();
        let result = save_all(&self.path, &expectations);
        metrics::record_persistence_save(result.is_ok());
        if result.is_ok() {
            info!(
                path = %self.path.display(),
                count = expectations.len(),
                "Expectations flushed"
            );
        }
        result
    }

    /// Start the background writer. The current state is written once at
    /// start and again after every mutation.
    pub fn spawn(self: Arc<Self>) -> PersistenceWriter {
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
        let mut changes = self.store.subscribe();
        changes.borrow_and_update();

        let gateway = self;
        let handle = tokio::spawn(async move {
            gateway.save_in_background().await;
            loop {
                tokio::select! {
                    changed = changes.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        gateway.save_in_background().await;
                    }
                    _ = &mut shutdown_rx => break,
                }
            }
            debug!("Persistence writer stopped");
        });

        PersistenceWriter {
            shutdown: shutdown_tx,
            handle,
        }
    }

    async fn save_in_background(&self) {
        let expectations = self.store.list();
        let path = self.path.clone();
        let count = expectations.len();

        let result = tokio::task::spawn_blocking(move || save_all(&path, &expectations)).await;
        match result {
            Ok(Ok(())) => {
                metrics::record_persistence_save(true);
                debug!(path = %self.path.display(), count, "Expectations persisted");
            }
            Ok(Err(e)) => {
                metrics::record_persistence_save(false);
                warn!("Failed to persist expectations: {}", e);
            }
            Err(e) => {
                metrics::record_persistence_save(false);
                warn!("Persistence task failed: {}", e);
            }
        }
    }
}

/// Handle to the background writer task.
pub struct PersistenceWriter {
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl PersistenceWriter {
    /// Stop the writer, waiting for an in-progress save to complete.
    pub async fn stop(self) {
        let _ = self.shutdown.send(());
        if let Err(e) = self.handle.await {
            warn!("Persistence writer panicked: {}", e);
        }
    }
}
