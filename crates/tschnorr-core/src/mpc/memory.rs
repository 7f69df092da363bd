//! In-memory relay implementation for testing

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::{async_trait, Relay};
use crate::types::{IdentityKey, SessionId};
use crate::{Error, Result};

type Mailbox = Vec<(IdentityKey, Vec<u8>)>;

/// In-memory message relay for local testing
pub struct MemoryRelay {
    /// Broadcast messages: (session_id, round) -> [(sender, message_bytes)]
    broadcasts: Arc<DashMap<(SessionId, u32), Mailbox>>,
    /// Notification channel
    notify: broadcast::Sender<()>,
    /// Give up collecting after this long, `None` waits forever
    timeout: Option<Duration>,
}

impl MemoryRelay {
    /// Create a new in-memory relay
    pub fn new() -> Self {
        let (notify, _) = broadcast::channel(100);
        Self {
            broadcasts: Arc::new(DashMap::new()),
            notify,
            timeout: None,
        }
    }

    /// Create a relay whose collections return what arrived once `timeout` elapses
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
            ..Self::new()
        }
    }

    /// Messages received so far from `senders`, `None` until all of them arrived
    fn snapshot(
        &self,
        key: &(SessionId, u32),
        senders: &BTreeSet<IdentityKey>,
        partial: bool,
    ) -> Option<BTreeMap<IdentityKey, Vec<u8>>> {
        let received: BTreeMap<_, _> = match self.broadcasts.get(key) {
            Some(mailbox) => mailbox
                .iter()
                .filter(|(from, _)| senders.contains(from))
                .cloned()
                .collect(),
            None => BTreeMap::new(),
        };
        (partial || received.len() == senders.len()).then_some(received)
    }
}

impl Default for MemoryRelay {
    fn default() -> Self {
        Self::new()
    }
}

fn serialize<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| Error::Serialization(e.to_string()))
}

fn deserialize<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    serde_json::from_slice(bytes).map_err(|e| Error::Deserialization(e.to_string()))
}

/// Decodes every message, blaming the sender of the first one that does not decode
fn decode_all<T: DeserializeOwned>(
    messages: BTreeMap<IdentityKey, Vec<u8>>,
) -> Result<BTreeMap<IdentityKey, T>> {
    messages
        .into_iter()
        .map(|(from, bytes)| match deserialize(&bytes) {
            Ok(message) => Ok((from, message)),
            Err(e) => Err(Error::abort(&from, e.to_string())),
        })
        .collect()
}

#[async_trait]
impl Relay for MemoryRelay {
    async fn broadcast<T: Serialize + Send + Sync>(
        &self,
        session_id: &SessionId,
        round: u32,
        from: &IdentityKey,
        message: &T,
    ) -> Result<()> {
        let bytes = serialize(message)?;

        {
            let mut mailbox = self
                .broadcasts
                .entry((session_id.clone(), round))
                .or_default();
            // first message per sender wins
            if mailbox.iter().any(|(sender, _)| sender == from) {
                return Err(Error::Relay(format!(
                    "{from} already broadcast in round {round}"
                )));
            }
            mailbox.push((from.clone(), bytes));
        }

        let _ = self.notify.send(());
        Ok(())
    }

    async fn collect_broadcasts<T: DeserializeOwned + Send>(
        &self,
        session_id: &SessionId,
        round: u32,
        senders: &BTreeSet<IdentityKey>,
    ) -> Result<BTreeMap<IdentityKey, T>> {
        let key = (session_id.clone(), round);
        let deadline = self.timeout.map(|timeout| Instant::now() + timeout);
        let mut rx = self.notify.subscribe();

        loop {
            if let Some(messages) = self.snapshot(&key, senders, false) {
                return decode_all(messages);
            }

            if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                let messages = self.snapshot(&key, senders, true).unwrap_or_default();
                warn!(
                    round,
                    received = messages.len(),
                    expected = senders.len(),
                    "Timed out collecting broadcasts"
                );
                return decode_all(messages);
            }

            // Wait for notification with timeout
            tokio::select! {
                _ = rx.recv() => continue,
                _ = tokio::time::sleep(Duration::from_millis(100)) => {
                    debug!(round, "Still waiting for broadcasts");
                    continue
                }
            }
        }
    }
}
