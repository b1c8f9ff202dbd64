// ABOUTME: AgentCell: a lazily built, process-wide agent together with the tool source it owns.
// ABOUTME: Construction runs once even under concurrent first use; shutdown closes the source.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use switchboard_core::{Error, ToolSource};
use tokio::sync::OnceCell;

use crate::agent::Agent;

/// Holds one agent built on first use. The tool source it was built from is
/// kept so `shutdown` can close it explicitly.
#[derive(Default)]
pub struct AgentCell {
    agent: OnceCell<Arc<Agent>>,
    source: Mutex<Option<Arc<dyn ToolSource>>>,
    shut_down: AtomicBool,
}

impl AgentCell {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the agent, building it with `init` if this is the first call.
    /// Concurrent callers wait for the same construction. A failed
    /// construction leaves the cell empty so a later call may retry.
    pub async fn get_or_try_init<F, Fut>(&self, init: F) -> Result<Arc<Agent>, Error>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(Agent, Arc<dyn ToolSource>), Error>>,
    {
        if self.is_shut_down() {
            return Err(shut_down_error());
        }

        let agent = self
            .agent
            .get_or_try_init(|| async {
                let (agent, source) = init().await?;
                if self.is_shut_down() {
                    source.close().await;
                    return Err(shut_down_error());
                }
                if let Ok(mut slot) = self.source.lock() {
                    *slot = Some(source);
                }
                tracing::info!(agent = agent.name(), "shared agent initialized");
                Ok::<_, Error>(Arc::new(agent))
            })
            .await?;

        Ok(Arc::clone(agent))
    }

    /// The agent, if it has been built and the cell is still open.
    pub fn get(&self) -> Option<Arc<Agent>> {
        if self.is_shut_down() {
            return None;
        }
        self.agent.get().cloned()
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    /// Close the tool source and refuse further initialization. Safe to call
    /// more than once; only the first call closes anything.
    pub async fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        let source = self.source.lock().ok().and_then(|mut slot| slot.take());
        if let Some(source) = source {
            source.close().await;
            tracing::info!("shared agent tool source closed");
        }
    }
}

fn shut_down_error() -> Error {
    Error::Configuration("agent cell has been shut down".to_string())
}
