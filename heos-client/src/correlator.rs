//! Single in-flight command tracking for one channel.
//!
//! The protocol has no request identifiers: the next complete message on a
//! channel answers whatever command is outstanding there. At most one
//! [`PendingCommand`] may exist per channel.

use crate::error::ClientError;
use heos_protocol::{Command, Message};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::oneshot;

pub(crate) type CommandResult = Result<Value, ClientError>;

/// The command currently awaiting a response on a channel.
struct PendingCommand {
    command: Command,
    seq: u64,
    tx: oneshot::Sender<CommandResult>,
    /// Fired on the first "still processing" interim response.
    processing_tx: Option<oneshot::Sender<()>>,
}

/// Receiving side of a registered command.
pub(crate) struct PendingReceiver {
    pub seq: u64,
    pub rx: oneshot::Receiver<CommandResult>,
    pub processing_rx: oneshot::Receiver<()>,
}

/// What a complete message did to the pending slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Resolution {
    /// Terminal response delivered to the waiting caller.
    Resolved(Command),
    /// Interim response; the command stays pending.
    Processing(Command),
    /// Nothing was pending.
    Unmatched,
}

#[derive(Default)]
pub(crate) struct Correlator {
    slot: Mutex<Option<PendingCommand>>,
    next_seq: AtomicU64,
}

impl Correlator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Occupies the slot for `command`.
    pub fn begin(&self, command: Command) -> Option<PendingReceiver> {
        let mut slot = self.slot.lock();
        if slot.is_some() {
            return None;
        }

        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        let (processing_tx, processing_rx) = oneshot::channel();
        *slot = Some(PendingCommand {
            command,
            seq,
            tx,
            processing_tx: Some(processing_tx),
        });

        Some(PendingReceiver {
            seq,
            rx,
            processing_rx,
        })
    }

    /// Frees the slot if it still belongs to `seq`.
    pub fn cancel(&self, seq: u64) -> bool {
        let mut slot = self.slot.lock();
        if slot.as_ref().is_some_and(|p| p.seq == seq) {
            *slot = None;
            return true;
        }
        false
    }

    /// Fails the pending command, if any.
    pub fn fail(&self, error: impl FnOnce() -> ClientError) {
        if let Some(pending) = self.slot.lock().take() {
            tracing::debug!("Failing pending {}", pending.command);
            let _ = pending.tx.send(Err(error()));
        }
    }

    pub fn pending(&self) -> Option<Command> {
        self.slot.lock().as_ref().map(|p| p.command)
    }

    /// Applies one complete message to the slot.
    pub fn resolve(&self, message: &Message) -> Resolution {
        let mut slot = self.slot.lock();

        if message.is_processing() {
            return match slot.as_mut() {
                Some(pending) => {
                    if let Some(tx) = pending.processing_tx.take() {
                        let _ = tx.send(());
                    }
                    Resolution::Processing(pending.command)
                }
                None => Resolution::Unmatched,
            };
        }

        let Some(pending) = slot.take() else {
            return Resolution::Unmatched;
        };
        drop(slot);

        if pending.command.as_str() != message.command() {
            tracing::warn!(
                "Response {} does not match pending {}",
                message.command(),
                pending.command
            );
        }

        let result = match message.device_error() {
            Some(err) => Err(ClientError::Command(err)),
            None => Ok(pending.command.extract(message)),
        };
        // The caller may have stopped waiting.
        let _ = pending.tx.send(result);
        Resolution::Resolved(pending.command)
    }
}
