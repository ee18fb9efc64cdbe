//! # Dead Letters
//!
//! Messages the runtime could not deliver are never silently discarded. Each
//! one is logged at `warn` and published on a bounded channel that a host can
//! drain with [`ActorSystem::dead_letters`](crate::system::ActorSystem::dead_letters).
//! Once the channel is full, further dead letters are only logged.

use std::fmt;

use flume::{Receiver, Sender, TrySendError};
use starling_api::{Handle, Message};
use tracing::debug;

use crate::log_dead_letter;

/// Why a message was dropped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DropReason {
    /// The destination name is not bound.
    UnknownName,
    /// No live actor has the destination handle.
    UnknownHandle,
    /// The destination actor was being destroyed when the message arrived.
    Released,
    /// The message was still queued when its actor was destroyed.
    Retired,
    /// The destination actor never registered a callback.
    NoCallback,
    /// The destination actor failed to initialize.
    InitFailed,
    /// The runtime was shutting down.
    ShuttingDown,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            DropReason::UnknownName => "unknown name",
            DropReason::UnknownHandle => "unknown handle",
            DropReason::Released => "actor released",
            DropReason::Retired => "actor retired",
            DropReason::NoCallback => "no callback",
            DropReason::InitFailed => "init failed",
            DropReason::ShuttingDown => "shutting down",
        };
        f.write_str(reason)
    }
}

/// A message that could not be delivered.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeadLetter {
    /// The destination as the sender spelled it (`:XXXXXXXX` or a name).
    pub destination: String,
    pub source: Option<Handle>,
    pub session: i32,
    pub payload: Vec<u8>,
    pub reason: DropReason,
}

/// Publishing side of the dead-letter channel.
///
/// Cloned into every actor context so that messages drained at destruction
/// time are reported too. The sink keeps one receiver of its own so that
/// `subscribe` can hand out more; letters are only published while some
/// other receiver is alive, so an unobserved sink buffers nothing.
#[derive(Clone)]
pub struct DeadLetterSink {
    sender: Sender<DeadLetter>,
    receiver: Receiver<DeadLetter>,
}

impl DeadLetterSink {
    pub fn bounded(capacity: usize) -> Self {
        let (sender, receiver) = flume::bounded(capacity);
        Self { sender, receiver }
    }

    /// Logs and publishes one undeliverable message.
    pub fn record(&self, destination: impl fmt::Display, message: Message, reason: DropReason) {
        let destination = destination.to_string();
        log_dead_letter!(
            destination,
            reason,
            source = ?message.source,
            session = message.session,
            size = message.size()
        );

        if self.sender.receiver_count() <= 1 {
            return;
        }
        let letter = DeadLetter {
            destination,
            source: message.source,
            session: message.session,
            payload: message.payload,
            reason,
        };
        match self.sender.try_send(letter) {
            Ok(()) => {}
            Err(TrySendError::Full(letter)) => {
                debug!(destination = %letter.destination, "dead-letter channel full");
            }
            Err(TrySendError::Disconnected(_)) => {}
        }
    }

    /// Records every message in `messages` with the same destination and
    /// reason.
    pub fn record_all(&self, destination: Handle, messages: Vec<Message>, reason: DropReason) {
        for message in messages {
            self.record(destination, message, reason);
        }
    }

    /// A new receiver on the channel. All receivers share one stream.
    ///
    /// Letters recorded before the first subscription, or while every
    /// subscriber has been dropped, are only logged.
    pub fn subscribe(&self) -> Receiver<DeadLetter> {
        self.receiver.clone()
    }
}

impl fmt::Debug for DeadLetterSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeadLetterSink")
            .field("queued", &self.sender.len())
            .field("capacity", &self.sender.capacity())
            .field("subscribers", &self.sender.receiver_count().saturating_sub(1))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_publishes_letter() {
        let sink = DeadLetterSink::bounded(4);
        let letters = sink.subscribe();

        sink.record(
            "gate",
            Message::new(Some(Handle::new(2)), 11, b"hi".to_vec()),
            DropReason::UnknownName,
        );

        let letter = letters.try_recv().unwrap();
        assert_eq!(letter.destination, "gate");
        assert_eq!(letter.source, Some(Handle::new(2)));
        assert_eq!(letter.session, 11);
        assert_eq!(letter.payload, b"hi");
        assert_eq!(letter.reason, DropReason::UnknownName);
    }

    #[test]
    fn test_full_channel_drops_silently() {
        let sink = DeadLetterSink::bounded(1);
        let letters = sink.subscribe();
        sink.record_all(
            Handle::new(5),
            vec![Message::timer_expiry(1), Message::timer_expiry(2)],
            DropReason::Retired,
        );

        assert_eq!(letters.len(), 1);
        let letter = letters.try_recv().unwrap();
        assert_eq!(letter.destination, ":00000005");
        assert_eq!(letter.session, 1);
    }

    #[test]
    fn test_unobserved_sink_buffers_nothing() {
        let sink = DeadLetterSink::bounded(4);
        sink.record("gate", Message::timer_expiry(1), DropReason::UnknownName);
        assert_eq!(sink.sender.len(), 0);

        let letters = sink.subscribe();
        sink.record("gate", Message::timer_expiry(2), DropReason::UnknownName);
        assert_eq!(letters.try_recv().unwrap().session, 2);

        drop(letters);
        sink.record("gate", Message::timer_expiry(3), DropReason::UnknownName);
        assert_eq!(sink.sender.len(), 0);
    }
}
