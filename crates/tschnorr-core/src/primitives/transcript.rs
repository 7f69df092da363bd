//! Protocol transcripts for Fiat-Shamir challenges

use std::fmt;

use crate::ciphersuite::Ciphersuite;

/// Fiat-Shamir transcript
///
/// A thin wrapper over [`merlin::Transcript`] that can draw challenges in any
/// ciphersuite's scalar field. Proofs never consume the caller's transcript, they
/// [`fork`](Transcript::fork) it so the same starting state can be reused across parties.
#[derive(Clone)]
pub struct Transcript(merlin::Transcript);

impl Transcript {
    pub fn new(label: &'static [u8]) -> Self {
        Self(merlin::Transcript::new(label))
    }

    /// Independent copy of the current state
    pub fn fork(&self) -> Self {
        self.clone()
    }

    pub fn append_message(&mut self, label: &'static [u8], message: &[u8]) {
        self.0.append_message(label, message);
    }

    pub fn append_u64(&mut self, label: &'static [u8], value: u64) {
        self.0.append_u64(label, value);
    }

    /// Squeezes 64 bytes and reduces them into a scalar
    pub fn challenge_scalar<C: Ciphersuite>(&mut self, label: &'static [u8]) -> C::Scalar {
        let mut wide = [0u8; 64];
        self.0.challenge_bytes(label, &mut wide);
        C::scalar_from_wide_bytes(&wide)
    }
}

impl fmt::Debug for Transcript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Transcript")
    }
}
