//! Transient status notifications and user-visible fallback texts.
//!
//! Slow lookups surface a "still working" message to the user, but only if
//! the lookup is still running after a short delay. [`with_progress`] owns
//! that timer: the progress message is cancelled as soon as the work finishes
//! and can never be sent after the result is available.

use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::warn;

use crate::models::Lookup;

pub const NO_INFO_RESPONSE: &str = "I don't have information about that. You can try asking another way or contact the university administration for more details.";
pub const ERROR_RESPONSE: &str = "I'm having trouble right now. Could you please try again?";

pub const DOCUMENTS_PROGRESS: &str = "Retrieving information from the knowledge base...";
pub const DOCUMENTS_DONE: &str = "Information retrieval complete.";
pub const RECORDS_PROGRESS: &str = "Searching calendar and faculty information...";
pub const RECORDS_DONE: &str = "Information search complete.";

/// The text to say instead of an answer when a lookup produced nothing
/// usable, or `None` when it found context.
pub fn fallback_response<E>(outcome: &Result<Lookup, E>) -> Option<&'static str> {
    match outcome {
        Ok(Lookup::Found { .. }) => None,
        Ok(Lookup::NotFound) => Some(NO_INFO_RESPONSE),
        Err(_) => Some(ERROR_RESPONSE),
    }
}

/// Receiver of transient status messages, typically the voice/chat transport.
#[async_trait]
pub trait StatusNotifier: Send + Sync {
    async fn notify(&self, message: &str) -> anyhow::Result<()>;
}

/// Forwards status messages into an unbounded channel.
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<String>,
}

impl ChannelNotifier {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl StatusNotifier for ChannelNotifier {
    async fn notify(&self, message: &str) -> anyhow::Result<()> {
        self.tx
            .send(message.to_string())
            .map_err(|_| anyhow::anyhow!("status channel closed"))
    }
}

/// Run `work`, sending `progress` if it is still pending after `delay`.
///
/// `done` is always sent once `work` completes. Notification failures are
/// logged and otherwise ignored; they never affect the returned value.
pub async fn with_progress<F, T>(
    notifier: Option<&dyn StatusNotifier>,
    delay: Duration,
    progress: &str,
    done: &str,
    work: F,
) -> T
where
    F: Future<Output = T>,
{
    let mut work = std::pin::pin!(work);

    let early = tokio::select! {
        biased;
        out = &mut work => Some(out),
        _ = tokio::time::sleep(delay) => None,
    };

    let out = match early {
        Some(out) => out,
        None => {
            send(notifier, progress).await;
            work.await
        }
    };

    send(notifier, done).await;
    out
}

async fn send(notifier: Option<&dyn StatusNotifier>, message: &str) {
    if let Some(n) = notifier {
        if let Err(e) = n.notify(message).await {
            warn!(error = %e, message, "failed to send status notification");
        }
    }
}
