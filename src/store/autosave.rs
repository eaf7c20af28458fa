//! Background auto-save thread.

use std::path::Path;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, select, tick, Sender};
use tracing::{debug, warn};

use super::MetadataStore;
use crate::error::{LensResult, StorageError};

const MIN_INTERVAL: Duration = Duration::from_millis(10);

/// Periodically calls [`MetadataStore::save`] with `force = false`.
///
/// Stopping (explicitly or by drop) flushes once more and joins the thread.
#[derive(Debug)]
pub struct AutoSaver {
    shutdown: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl AutoSaver {
    /// Start saving `store` at its configured auto-save interval.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the thread cannot be spawned.
    pub fn start(store: Arc<MetadataStore>) -> LensResult<Self> {
        let interval = store.config().auto_save_interval();
        Self::with_interval(store, interval)
    }

    /// Start saving `store` every `interval`.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the thread cannot be spawned.
    pub fn with_interval(store: Arc<MetadataStore>, interval: Duration) -> LensResult<Self> {
        let interval = interval.max(MIN_INTERVAL);
        let (shutdown_tx, shutdown_rx) = bounded::<()>(1);
        let path = store.path().map(Path::to_path_buf).unwrap_or_default();

        let handle = thread::Builder::new()
            .name("doclens-autosave".to_string())
            .spawn(move || {
                let ticker = tick(interval);
                loop {
                    select! {
                        recv(ticker) -> _ => save_quietly(&store),
                        recv(shutdown_rx) -> _ => break,
                    }
                }
                save_quietly(&store);
                debug!("auto-saver stopped");
            })
            .map_err(|e| StorageError::io(path, e))?;

        Ok(Self {
            shutdown: Some(shutdown_tx),
            handle: Some(handle),
        })
    }

    /// Stop the thread after a final save.
    pub fn stop(mut self) {
        self.shutdown_and_join();
    }

    fn shutdown_and_join(&mut self) {
        // Dropping the sender disconnects the channel, which wakes the loop.
        self.shutdown.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for AutoSaver {
    fn drop(&mut self) {
        self.shutdown_and_join();
    }
}

fn save_quietly(store: &MetadataStore) {
    match store.save(false) {
        Ok(true) => debug!("auto-save wrote snapshot"),
        Ok(false) => {}
        Err(err) => warn!(error = %err, "auto-save failed"),
    }
}
