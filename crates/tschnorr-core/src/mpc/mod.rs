//! MPC coordination utilities

use std::collections::{BTreeMap, BTreeSet};

use serde::{de::DeserializeOwned, Serialize};

use crate::types::{IdentityKey, SessionId};
use crate::Result;

pub use ::async_trait::async_trait;

/// Message relay trait for MPC communication
///
/// Every round of the signing protocols is a single broadcast, so the relay only moves
/// broadcasts. Collecting returns whatever arrived from the expected senders; a relay that
/// gives up early returns an incomplete map and the protocol reports the silent parties.
#[async_trait]
pub trait Relay: Send + Sync {
    /// Broadcast `message` from `from` to every party of the session
    async fn broadcast<T: Serialize + Send + Sync>(
        &self,
        session_id: &SessionId,
        round: u32,
        from: &IdentityKey,
        message: &T,
    ) -> Result<()>;

    /// Collect the broadcasts of `senders` for a round
    async fn collect_broadcasts<T: DeserializeOwned + Send>(
        &self,
        session_id: &SessionId,
        round: u32,
        senders: &BTreeSet<IdentityKey>,
    ) -> Result<BTreeMap<IdentityKey, T>>;
}

/// In-memory relay for testing
pub mod memory;

pub use memory::MemoryRelay;
