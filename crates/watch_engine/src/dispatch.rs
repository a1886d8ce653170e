use std::sync::mpsc;

use thiserror::Error;
use watch_core::CycleChanges;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("notification receiver is gone")]
    Disconnected,
    #[error("delivery failed: {0}")]
    Failed(String),
}

/// Hand-off point to whatever delivers notifications.
///
/// `dispatch` is called once per cycle that produced changes. Only on `Ok`
/// are the changes marked as sent in the notification log; on error they stay
/// pending and are flagged for retry once the pending timeout passes. It must
/// not block for long; real delivery belongs on the receiving side.
pub trait Dispatcher: Send + Sync {
    fn dispatch(&self, changes: &CycleChanges) -> Result<(), DispatchError>;
}

/// Forwards each cycle's changes over a channel.
pub struct ChannelDispatcher {
    tx: mpsc::Sender<CycleChanges>,
}

impl ChannelDispatcher {
    pub fn new(tx: mpsc::Sender<CycleChanges>) -> Self {
        Self { tx }
    }
}

impl Dispatcher for ChannelDispatcher {
    fn dispatch(&self, changes: &CycleChanges) -> Result<(), DispatchError> {
        self.tx
            .send(changes.clone())
            .map_err(|_| DispatchError::Disconnected)
    }
}
