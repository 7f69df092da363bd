//! Signing message types

use serde::{Deserialize, Serialize};

use crate::ciphersuite::Ciphersuite;
use crate::primitives::{Commitment, DlogProof, Witness};
use crate::types::point_serde;

/// Round 1 message: commitment to `R_i`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Round1Broadcast {
    pub commitment: Commitment,
}

/// Round 2 message: opening of the round 1 commitment
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct Round2Broadcast<C: Ciphersuite> {
    /// Nonce commitment `R_i = k_i·G`
    #[serde(with = "point_serde")]
    pub big_r: C::Point,
    /// Commitment opening
    pub witness: Witness,
    /// Proof of knowledge of `k_i`
    pub proof: DlogProof<C>,
}

/// Pre-generation round 1 message: one commitment per slot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreGenRound1Broadcast {
    pub commitments: Vec<Commitment>,
}

/// Pre-generation round 2 message: one opening per slot
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct PreGenRound2Broadcast<C: Ciphersuite> {
    pub slots: Vec<Round2Broadcast<C>>,
}
