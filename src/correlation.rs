//! Matching replies to the commands that caused them.
//!
//! The switch answers commands strictly in the order it received them and replies
//! carry no correlation id, so a FIFO of waiting slots is the whole mechanism. The
//! session registers a slot and writes the command bytes while holding the writer
//! lock, which keeps slot order identical to wire order.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{oneshot, Mutex};
use tracing::{debug, trace, warn};

use crate::command::CommandId;
use crate::connection::DisconnectReason;
use crate::error::{EslError, EslResult};
use crate::message::EslMessage;

type ReplySender = oneshot::Sender<EslResult<EslMessage>>;

struct Pending {
    slots: VecDeque<(CommandId, ReplySender)>,
    closed: Option<DisconnectReason>,
}

/// FIFO of commands awaiting a reply.
pub(crate) struct ReplyCorrelator {
    pending: Mutex<Pending>,
    desynced: AtomicBool,
}

impl ReplyCorrelator {
    pub(crate) fn new() -> Self {
        Self {
            pending: Mutex::new(Pending {
                slots: VecDeque::new(),
                closed: None,
            }),
            desynced: AtomicBool::new(false),
        }
    }

    /// Append a slot for `id`. Fails once the connection is closed.
    pub(crate) async fn register(
        &self,
        id: CommandId,
    ) -> EslResult<oneshot::Receiver<EslResult<EslMessage>>> {
        let mut pending = self
            .pending
            .lock()
            .await;
        if let Some(reason) = &pending.closed {
            debug!("rejecting command {}: connection closed ({})", id, reason);
            return Err(EslError::ConnectionClosed);
        }
        let (tx, rx) = oneshot::channel();
        pending
            .slots
            .push_back((id, tx));
        Ok(rx)
    }

    /// Withdraw a slot whose command never made it onto the wire.
    pub(crate) async fn cancel(&self, id: CommandId) {
        let mut pending = self
            .pending
            .lock()
            .await;
        pending
            .slots
            .retain(|(slot_id, _)| *slot_id != id);
    }

    /// Hand a reply to the oldest waiting command.
    ///
    /// With nothing waiting the reply is dropped and the connection is flagged as
    /// desynchronised. Returns whether a slot consumed the reply.
    pub(crate) async fn resolve(&self, message: EslMessage) -> bool {
        let slot = self
            .pending
            .lock()
            .await
            .slots
            .pop_front();
        match slot {
            Some((id, tx)) => {
                trace!("[REPLY] {} -> {}", message, id);
                if tx
                    .send(Ok(message))
                    .is_err()
                {
                    debug!("caller of {} stopped waiting, reply discarded", id);
                }
                true
            }
            None => {
                warn!("[REPLY] {} arrived with no command pending, dropped", message);
                self.desynced
                    .store(true, Ordering::Relaxed);
                false
            }
        }
    }

    /// Fail every waiting command and refuse new ones.
    pub(crate) async fn fail_all(&self, reason: &DisconnectReason) {
        let drained: Vec<_> = {
            let mut pending = self
                .pending
                .lock()
                .await;
            pending.closed = Some(reason.clone());
            pending
                .slots
                .drain(..)
                .collect()
        };
        if !drained.is_empty() {
            debug!(
                "failing {} pending command(s): {}",
                drained.len(),
                reason
            );
        }
        for (_, tx) in drained {
            let _ = tx.send(Err(EslError::ConnectionClosed));
        }
    }

    #[cfg(test)]
    pub(crate) async fn pending_count(&self) -> usize {
        self.pending
            .lock()
            .await
            .slots
            .len()
    }

    /// A reply once arrived that no command was waiting for.
    pub(crate) fn is_desynced(&self) -> bool {
        self.desynced
            .load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn reply(text: &str) -> EslMessage {
        EslMessage::new(
            vec![
                ("Content-Type".to_string(), "command/reply".to_string()),
                ("Reply-Text".to_string(), text.to_string()),
            ],
            Vec::new(),
        )
    }

    #[tokio::test]
    async fn replies_resolve_in_registration_order() {
        let correlator = ReplyCorrelator::new();
        let first = correlator
            .register(CommandId::next())
            .await
            .unwrap();
        let second = correlator
            .register(CommandId::next())
            .await
            .unwrap();

        assert!(correlator
            .resolve(reply("+OK one"))
            .await);
        assert!(correlator
            .resolve(reply("+OK two"))
            .await);

        let first = first
            .await
            .unwrap()
            .unwrap();
        let second = second
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first.reply_text(), Some("+OK one"));
        assert_eq!(second.reply_text(), Some("+OK two"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_registrations_stay_fifo() {
        let correlator = Arc::new(ReplyCorrelator::new());
        let wire_order = Arc::new(Mutex::new(Vec::new()));
        let mut waiters = Vec::new();

        // registration and "write" happen under one lock, as the session does
        for n in 0..32 {
            let correlator = correlator.clone();
            let wire_order = wire_order.clone();
            waiters.push(tokio::spawn(async move {
                let rx = {
                    let mut wire = wire_order
                        .lock()
                        .await;
                    let rx = correlator
                        .register(CommandId::next())
                        .await
                        .unwrap();
                    wire.push(n);
                    rx
                };
                (n, rx.await)
            }));
        }
        while correlator
            .pending_count()
            .await
            < 32
        {
            tokio::task::yield_now().await;
        }

        let order = wire_order
            .lock()
            .await
            .clone();
        for n in &order {
            correlator
                .resolve(reply(&format!("+OK {}", n)))
                .await;
        }
        for waiter in waiters {
            let (n, result) = waiter
                .await
                .unwrap();
            let message = result
                .unwrap()
                .unwrap();
            assert_eq!(message.reply_text(), Some(format!("+OK {}", n).as_str()));
        }
    }

    #[tokio::test]
    async fn orphan_reply_dropped_and_flagged() {
        let correlator = ReplyCorrelator::new();
        assert!(!correlator.is_desynced());
        assert!(!correlator
            .resolve(reply("+OK stray"))
            .await);
        assert!(correlator.is_desynced());

        // later commands still work
        let rx = correlator
            .register(CommandId::next())
            .await
            .unwrap();
        correlator
            .resolve(reply("+OK fine"))
            .await;
        assert_eq!(
            rx.await
                .unwrap()
                .unwrap()
                .reply_text(),
            Some("+OK fine")
        );
    }

    #[tokio::test]
    async fn fail_all_unblocks_every_waiter() {
        let correlator = ReplyCorrelator::new();
        let a = correlator
            .register(CommandId::next())
            .await
            .unwrap();
        let b = correlator
            .register(CommandId::next())
            .await
            .unwrap();
        correlator
            .fail_all(&DisconnectReason::ConnectionClosed)
            .await;

        assert!(matches!(a.await.unwrap(), Err(EslError::ConnectionClosed)));
        assert!(matches!(b.await.unwrap(), Err(EslError::ConnectionClosed)));
        assert!(matches!(
            correlator
                .register(CommandId::next())
                .await,
            Err(EslError::ConnectionClosed)
        ));
        assert_eq!(correlator.pending_count().await, 0);
    }

    #[tokio::test]
    async fn cancel_removes_only_that_slot() {
        let correlator = ReplyCorrelator::new();
        let kept_id = CommandId::next();
        let dropped_id = CommandId::next();
        let kept = correlator
            .register(kept_id)
            .await
            .unwrap();
        let _dropped = correlator
            .register(dropped_id)
            .await
            .unwrap();
        correlator
            .cancel(dropped_id)
            .await;
        assert_eq!(correlator.pending_count().await, 1);
        correlator
            .resolve(reply("+OK"))
            .await;
        assert!(kept
            .await
            .unwrap()
            .is_ok());
    }
}
