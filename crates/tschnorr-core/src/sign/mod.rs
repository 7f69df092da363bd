//! Threshold Schnorr signing
//!
//! Two flavours share the same building blocks:
//! * [`Cosigner`] - three rounds per signature: commit to `R_i`, reveal it with a proof of
//!   knowledge of its discrete log, then produce a partial signature
//! * [`PreGenParticipant`] + [`NonInteractiveCosigner`] - the first two rounds run ahead of
//!   time for `tau` slots at once, each slot later signs one message without interaction
//!
//! Partial signatures from any of them are combined by [`aggregate`] or the verifying
//! [`Aggregator`].

mod aggregate;
mod dsg;
mod interactive;
mod messages;
mod noninteractive;
mod pregen;

pub use aggregate::{aggregate, Aggregator, Signature};
pub use dsg::{run_interactive_signing, run_noninteractive_signing, run_pre_generation};
pub use interactive::Cosigner;
pub use messages::*;
pub use noninteractive::NonInteractiveCosigner;
pub use pregen::PreGenParticipant;

use std::collections::BTreeMap;
use std::fmt;

use elliptic_curve::ff::Field;
use elliptic_curve::group::Group;
use rand_core::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::ciphersuite::{conditional_negate, normalize_point, Ciphersuite};
use crate::primitives::commitment::{self, Commitment, Witness};
use crate::primitives::{to_additive, DlogProof, Transcript};
use crate::types::{point_serde, scalar_serde, IdentityKey, SessionConfig, SessionId, SigningKeyShare};
use crate::{Error, Result};

/// Transcript label of interactive signing sessions
pub const INTERACTIVE_SIGNING_LABEL: &[u8] = b"tschnorr-interactive-signing";

/// Transcript label of pre-generation sessions
pub const PRE_GENERATION_LABEL: &[u8] = b"tschnorr-pre-generation";

/// Partial signature from one cosigner
///
/// `big_r` is the cosigner's own nonce commitment (after normalization), not the aggregate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct PartialSignature<C: Ciphersuite> {
    #[serde(with = "point_serde")]
    pub big_r: C::Point,
    #[serde(with = "scalar_serde")]
    pub s: C::Scalar,
}

/// One pre-generated nonce slot, usable for exactly one signature
#[derive(Clone)]
pub struct PreSignature<C: Ciphersuite> {
    /// Slot index within the batch
    pub index: usize,
    /// Size of the batch the slot belongs to
    pub tau: usize,
    /// This party's nonce
    pub k: C::Scalar,
    /// Nonce commitments of every pre-generation participant, this party included
    pub big_r: BTreeMap<IdentityKey, C::Point>,
}

impl<C: Ciphersuite> Drop for PreSignature<C> {
    fn drop(&mut self) {
        self.k.zeroize();
    }
}

impl<C: Ciphersuite> fmt::Debug for PreSignature<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreSignature")
            .field("index", &self.index)
            .field("tau", &self.tau)
            .field("k", &"<redacted>")
            .field("big_r", &self.big_r)
            .finish()
    }
}

/// Output of a pre-generation run: `tau` pre-signatures in slot order
#[derive(Debug, Clone)]
pub struct PreSignatureBatch<C: Ciphersuite> {
    pre_signatures: Vec<PreSignature<C>>,
}

impl<C: Ciphersuite> PreSignatureBatch<C> {
    pub(crate) fn new(pre_signatures: Vec<PreSignature<C>>) -> Self {
        Self { pre_signatures }
    }

    pub fn get(&self, index: usize) -> Option<&PreSignature<C>> {
        self.pre_signatures.get(index)
    }

    pub fn len(&self) -> usize {
        self.pre_signatures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pre_signatures.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PreSignature<C>> {
        self.pre_signatures.iter()
    }
}

/// Picks the input of every other session participant, aborting on the first one missing
pub(crate) fn peer_inputs<'a, T>(
    config: &'a SessionConfig,
    inputs: &'a BTreeMap<IdentityKey, T>,
) -> Result<Vec<(&'a IdentityKey, &'a T)>> {
    config
        .signers()
        .iter()
        .filter(|identity| *identity != config.me())
        .map(|identity| {
            inputs
                .get(identity)
                .map(|input| (identity, input))
                .ok_or_else(|| Error::abort(identity, "no input received"))
        })
        .collect()
}

/// What a nonce commitment is bound to besides the nonce itself
pub(crate) struct NonceBinding<'a> {
    pub domain: &'static [u8],
    pub owner: &'a IdentityKey,
    /// Encoded participant set
    pub signers: &'a [u8],
    /// Slot index and batch size of pre-generated nonces
    pub slot: Option<(usize, usize)>,
}

impl NonceBinding<'_> {
    fn slot_bytes(&self) -> Vec<u8> {
        match self.slot {
            Some((index, tau)) => [(index as u64).to_le_bytes(), (tau as u64).to_le_bytes()].concat(),
            None => Vec::new(),
        }
    }

    /// Context of the proof of knowledge of the nonce
    fn proof_context(&self) -> Vec<u8> {
        let owner = self.owner.public_key();
        let mut context = Vec::with_capacity(8 + owner.len() + self.signers.len() + 16);
        context.extend_from_slice(&(owner.len() as u64).to_le_bytes());
        context.extend_from_slice(owner);
        context.extend_from_slice(self.signers);
        context.extend_from_slice(&self.slot_bytes());
        context
    }

    fn commit<C: Ciphersuite, R: RngCore + CryptoRng>(
        &self,
        sid: &SessionId,
        big_r: &C::Point,
        rng: &mut R,
    ) -> (Commitment, Witness) {
        let r = C::serialize_point(big_r);
        let slot = self.slot_bytes();
        commitment::commit(
            sid,
            &[self.domain, C::NAME.as_bytes(), &r, self.owner.public_key(), self.signers, &slot],
            rng,
        )
    }

    fn open<C: Ciphersuite>(
        &self,
        sid: &SessionId,
        commitment: &Commitment,
        witness: &Witness,
        big_r: &C::Point,
    ) -> Result<()> {
        let r = C::serialize_point(big_r);
        let slot = self.slot_bytes();
        commitment::open(
            sid,
            commitment,
            witness,
            &[self.domain, C::NAME.as_bytes(), &r, self.owner.public_key(), self.signers, &slot],
        )
    }
}

/// Secret nonce between the commitment and reveal rounds
pub(crate) struct Nonce<C: Ciphersuite> {
    k: C::Scalar,
    big_r: C::Point,
    witness: Witness,
}

impl<C: Ciphersuite> Nonce<C> {
    /// Samples `k`, computes `R = k·G` and commits to it
    pub(crate) fn sample<R: RngCore + CryptoRng>(
        binding: &NonceBinding<'_>,
        sid: &SessionId,
        rng: &mut R,
    ) -> (Self, Commitment) {
        let k = C::Scalar::random(&mut *rng);
        let big_r = C::Point::generator() * k;
        let (commitment, witness) = binding.commit::<C, _>(sid, &big_r, rng);
        (Self { k, big_r, witness }, commitment)
    }

    /// Opens the commitment and proves knowledge of `k`
    pub(crate) fn reveal<R: RngCore + CryptoRng>(
        &self,
        binding: &NonceBinding<'_>,
        sid: &SessionId,
        transcript: &Transcript,
        rng: &mut R,
    ) -> Round2Broadcast<C> {
        let (proof, _) = DlogProof::prove(
            &self.k,
            &C::Point::generator(),
            sid,
            &binding.proof_context(),
            transcript,
            rng,
        );
        Round2Broadcast {
            big_r: self.big_r,
            witness: self.witness,
            proof,
        }
    }

    pub(crate) fn k(&self) -> &C::Scalar {
        &self.k
    }

    pub(crate) fn big_r(&self) -> C::Point {
        self.big_r
    }
}

impl<C: Ciphersuite> Drop for Nonce<C> {
    fn drop(&mut self) {
        self.k.zeroize();
    }
}

/// Checks a revealed nonce commitment against the commitment received earlier
pub(crate) fn verify_reveal<C: Ciphersuite>(
    binding: &NonceBinding<'_>,
    sid: &SessionId,
    transcript: &Transcript,
    commitment: &Commitment,
    reveal: &Round2Broadcast<C>,
) -> Result<()> {
    if bool::from(reveal.big_r.is_identity()) {
        return Err(Error::VerificationFailed("nonce commitment is the identity".into()));
    }
    binding.open::<C>(sid, commitment, &reveal.witness, &reveal.big_r)?;
    reveal.proof.verify(
        &reveal.big_r,
        &C::Point::generator(),
        sid,
        &binding.proof_context(),
        transcript,
    )
}

/// Computes `s_i = k_i + e·d_i` for the aggregate nonce commitment `big_r`
///
/// The nonce is negated when `big_r` needs normalization and the additive share when the
/// public key does, so the partial signatures combine into a valid signature for the
/// normalized `R` and public key.
pub(crate) fn compute_partial_signature<C: Ciphersuite>(
    config: &SessionConfig,
    key_share: &SigningKeyShare<C>,
    k: &C::Scalar,
    big_r: C::Point,
    message: &[u8],
) -> Result<PartialSignature<C>> {
    let (big_r, negate_nonce) = normalize_point::<C>(big_r);
    let (public_key, negate_key) = normalize_point::<C>(key_share.public_key);
    let e = C::compute_challenge(&big_r, &public_key, message);

    let mut k = conditional_negate::<C>(*k, negate_nonce);
    let mut d = conditional_negate::<C>(
        to_additive::<C>(
            &key_share.share,
            config.my_sharing_id()?,
            config.signers(),
            config.cohort(),
        )?,
        negate_key,
    );

    let partial = PartialSignature {
        big_r: C::Point::generator() * k,
        s: k + e * d,
    };
    k.zeroize();
    d.zeroize();

    Ok(partial)
}
