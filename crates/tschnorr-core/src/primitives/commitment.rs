//! Hash commitments
//!
//! `C = SHA-256(domain ‖ sid ‖ witness ‖ parts)` where the session id and every part are
//! length prefixed, so distinct part lists never collide. The witness is 32 random bytes and
//! is revealed together with the committed value.

use std::fmt;

use rand_core::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::types::SessionId;
use crate::{Error, Result};

const COMMITMENT_DOMAIN: &[u8] = b"tschnorr-commitment-v1";

/// Hash commitment
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commitment([u8; 32]);

/// Opening randomness of a [`Commitment`]
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Witness([u8; 32]);

impl Commitment {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for Commitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Commitment({})", hex::encode(self.0))
    }
}

impl fmt::Debug for Witness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Witness({})", hex::encode(self.0))
    }
}

/// Commit to `parts` under session `sid`
pub fn commit<R: RngCore + CryptoRng>(
    sid: &SessionId,
    parts: &[&[u8]],
    rng: &mut R,
) -> (Commitment, Witness) {
    let mut witness = [0u8; 32];
    rng.fill_bytes(&mut witness);
    let witness = Witness(witness);
    (Commitment(digest(sid, &witness, parts)), witness)
}

/// Check that `commitment` opens to `parts` under session `sid`
pub fn open(
    sid: &SessionId,
    commitment: &Commitment,
    witness: &Witness,
    parts: &[&[u8]],
) -> Result<()> {
    let recomputed = digest(sid, witness, parts);
    if bool::from(commitment.0[..].ct_eq(&recomputed[..])) {
        Ok(())
    } else {
        Err(Error::VerificationFailed(
            "commitment does not open to the revealed value".into(),
        ))
    }
}

fn digest(sid: &SessionId, witness: &Witness, parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(COMMITMENT_DOMAIN);
    hasher.update((sid.as_bytes().len() as u64).to_le_bytes());
    hasher.update(sid.as_bytes());
    hasher.update(witness.0);
    for part in parts {
        hasher.update((part.len() as u64).to_le_bytes());
        hasher.update(part);
    }
    hasher.finalize().into()
}
