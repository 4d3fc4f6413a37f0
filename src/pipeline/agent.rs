//! Local index agent: bounded queue, one worker task
//!
//! `close()` sends a shutdown sentinel, stops accepting new events, drains
//! everything queued before the sentinel, and joins the worker. Callers
//! must treat it as blocking until the agent is quiescent.

use crate::config::PipelineConfig;
use crate::error::{AppError, Result};
use crate::models::ChangeEvent;
use crate::pipeline::{apply_event, ObjectResolver};
use crate::search::IndexManager;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

enum Command {
    Event(ChangeEvent),
    Shutdown,
}

pub struct IndexAgent {
    tx: Mutex<Option<mpsc::Sender<Command>>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl IndexAgent {
    /// Spawn the worker and return the running agent
    pub fn start(
        manager: Arc<IndexManager>,
        resolver: Arc<dyn ObjectResolver>,
        config: PipelineConfig,
    ) -> Self {
        let (tx, mut rx) = mpsc::channel(config.queue_capacity);

        let handle = tokio::spawn(async move {
            while let Some(command) = rx.recv().await {
                match command {
                    Command::Shutdown => break,
                    Command::Event(event) => {
                        // Per-event failures are isolated; a storage error on
                        // one event must not kill the worker.
                        if let Err(e) =
                            apply_event(&manager, resolver.as_ref(), &config, &event).await
                        {
                            tracing::error!(
                                event_id = %event.id,
                                entity = %event.entity,
                                error = %e,
                                "Failed to apply change event"
                            );
                        }
                    }
                }
            }
            tracing::debug!("Index agent worker stopped");
        });

        Self {
            tx: Mutex::new(Some(tx)),
            handle: Mutex::new(Some(handle)),
        }
    }

    /// Queue one event; blocks when the queue is full
    pub async fn submit(&self, event: ChangeEvent) -> Result<()> {
        let tx = {
            let guard = self.tx.lock();
            guard.clone()
        };
        let Some(tx) = tx else {
            return Err(AppError::Internal("index agent is closed".to_string()));
        };
        tx.send(Command::Event(event))
            .await
            .map_err(|_| AppError::Internal("index agent worker is gone".to_string()))
    }

    /// Stop accepting events, drain queued work, and join the worker
    pub async fn close(&self) -> Result<()> {
        let tx = self.tx.lock().take();
        if let Some(tx) = tx {
            // Events queued before the sentinel are still applied.
            let _ = tx.send(Command::Shutdown).await;
        }
        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            handle
                .await
                .map_err(|e| AppError::Internal(format!("worker join failed: {}", e)))?;
        }
        Ok(())
    }
}
