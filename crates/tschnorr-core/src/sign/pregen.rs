//! Batched nonce pre-generation
//!
//! The commitment and reveal rounds of the interactive protocol run once for `tau` slots.
//! Every slot's commitment is bound to its index and to `tau`, every proof to its index, so
//! nonces cannot be moved between slots or batches. The result is one [`PreSignature`] per
//! slot, each of which must sign at most one message.

use std::collections::BTreeMap;

use rand_core::{CryptoRng, RngCore};
#[cfg(feature = "multi-thread")]
use rayon::prelude::*;
use tracing::{debug, info, instrument, warn};

use super::{
    peer_inputs, verify_reveal, Nonce, NonceBinding, PreGenRound1Broadcast, PreGenRound2Broadcast,
    PreSignature, PreSignatureBatch, Round2Broadcast, PRE_GENERATION_LABEL,
};
use crate::ciphersuite::Ciphersuite;
use crate::primitives::{Commitment, Transcript};
use crate::types::{IdentityKey, SessionConfig, SessionId};
use crate::{Error, Result};

const NONCE_DOMAIN: &[u8] = b"tschnorr-pregen-nonce";

enum PreGenState<C: Ciphersuite> {
    AwaitingRound1,
    AwaitingRound2(Vec<Nonce<C>>),
    AwaitingRound3 {
        nonces: Vec<Nonce<C>>,
        commitments: BTreeMap<IdentityKey, Vec<Commitment>>,
    },
    Done,
    Aborted,
}

impl<C: Ciphersuite> PreGenState<C> {
    fn name(&self) -> &'static str {
        match self {
            Self::AwaitingRound1 => "round 1",
            Self::AwaitingRound2(_) => "round 2",
            Self::AwaitingRound3 { .. } => "round 3",
            Self::Done => "done",
            Self::Aborted => "aborted",
        }
    }
}

/// One party of a pre-generation session
///
/// The session's participants are the parties that may later cosign with the resulting
/// pre-signatures; any threshold sized subset of them can use a slot.
pub struct PreGenParticipant<C: Ciphersuite> {
    config: SessionConfig,
    tau: usize,
    transcript: Transcript,
    signers_bytes: Vec<u8>,
    state: PreGenState<C>,
}

/// Borrowed context for checking the slots of one peer
struct SlotVerifier<'a> {
    owner: &'a IdentityKey,
    sid: &'a SessionId,
    signers: &'a [u8],
    tau: usize,
    transcript: &'a Transcript,
}

impl SlotVerifier<'_> {
    fn verify<C: Ciphersuite>(
        &self,
        index: usize,
        commitment: &Commitment,
        reveal: &Round2Broadcast<C>,
    ) -> Result<()> {
        let binding = NonceBinding {
            domain: NONCE_DOMAIN,
            owner: self.owner,
            signers: self.signers,
            slot: Some((index, self.tau)),
        };
        verify_reveal(&binding, self.sid, self.transcript, commitment, reveal)
            .map_err(|e| Error::abort(self.owner, format!("slot {index}: {e}")))
    }

    /// Verifies every slot, reporting the lowest failing index
    #[cfg(feature = "multi-thread")]
    fn verify_all<C: Ciphersuite>(
        &self,
        commitments: &[Commitment],
        reveals: &[Round2Broadcast<C>],
    ) -> Result<()> {
        commitments
            .par_iter()
            .zip(reveals.par_iter())
            .enumerate()
            .map(|(index, (commitment, reveal))| self.verify(index, commitment, reveal))
            .collect::<Vec<_>>()
            .into_iter()
            .collect()
    }

    #[cfg(not(feature = "multi-thread"))]
    fn verify_all<C: Ciphersuite>(
        &self,
        commitments: &[Commitment],
        reveals: &[Round2Broadcast<C>],
    ) -> Result<()> {
        commitments
            .iter()
            .zip(reveals)
            .enumerate()
            .try_for_each(|(index, (commitment, reveal))| self.verify(index, commitment, reveal))
    }
}

impl<C: Ciphersuite> PreGenParticipant<C> {
    /// Create a participant generating `tau` pre-signatures, with the default transcript
    pub fn new(config: SessionConfig, tau: usize) -> Result<Self> {
        Self::with_transcript(config, tau, Transcript::new(PRE_GENERATION_LABEL))
    }

    pub fn with_transcript(
        config: SessionConfig,
        tau: usize,
        mut transcript: Transcript,
    ) -> Result<Self> {
        if tau == 0 {
            return Err(Error::InvalidArgument("tau must be at least 1".into()));
        }

        transcript.append_message(b"ciphersuite", C::NAME.as_bytes());
        transcript.append_message(b"session-id", config.session_id().as_bytes());
        transcript.append_u64(b"tau", tau as u64);
        let signers_bytes = config.signers_bytes();

        Ok(Self {
            config,
            tau,
            transcript,
            signers_bytes,
            state: PreGenState::AwaitingRound1,
        })
    }

    pub fn identity(&self) -> &IdentityKey {
        self.config.me()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn tau(&self) -> usize {
        self.tau
    }

    /// Name of the round the participant expects next
    pub fn round(&self) -> &'static str {
        self.state.name()
    }

    fn binding(&self, index: usize) -> NonceBinding<'_> {
        NonceBinding {
            domain: NONCE_DOMAIN,
            owner: self.config.me(),
            signers: &self.signers_bytes,
            slot: Some((index, self.tau)),
        }
    }

    /// Round 1: sample `tau` nonces and commit to each of them
    #[instrument(skip_all, fields(party = %self.config.me(), tau = self.tau))]
    pub fn round1<R: RngCore + CryptoRng>(&mut self, rng: &mut R) -> Result<PreGenRound1Broadcast> {
        if !matches!(self.state, PreGenState::AwaitingRound1) {
            return Err(Error::InvalidRound {
                expected: "round 1",
                actual: self.state.name(),
            });
        }

        let sid = self.config.session_id();
        let (nonces, commitments): (Vec<_>, Vec<_>) = (0..self.tau)
            .map(|index| Nonce::sample(&self.binding(index), sid, &mut *rng))
            .unzip();
        self.state = PreGenState::AwaitingRound2(nonces);

        debug!("Committed to nonces");
        Ok(PreGenRound1Broadcast { commitments })
    }

    /// Round 2: record everyone's commitments and reveal every slot's nonce
    #[instrument(skip_all, fields(party = %self.config.me(), tau = self.tau))]
    pub fn round2<R: RngCore + CryptoRng>(
        &mut self,
        inputs: &BTreeMap<IdentityKey, PreGenRound1Broadcast>,
        rng: &mut R,
    ) -> Result<PreGenRound2Broadcast<C>> {
        let nonces = match std::mem::replace(&mut self.state, PreGenState::Aborted) {
            PreGenState::AwaitingRound2(nonces) => nonces,
            other => {
                let actual = other.name();
                self.state = other;
                return Err(Error::InvalidRound {
                    expected: "round 2",
                    actual,
                });
            }
        };

        let commitments = self.collect_commitments(inputs).map_err(|e| {
            warn!(error = %e, "Aborting");
            e
        })?;

        let sid = self.config.session_id();
        let slots = nonces
            .iter()
            .enumerate()
            .map(|(index, nonce)| nonce.reveal(&self.binding(index), sid, &self.transcript, &mut *rng))
            .collect();
        self.state = PreGenState::AwaitingRound3 {
            nonces,
            commitments,
        };

        debug!("Revealed nonce commitments");
        Ok(PreGenRound2Broadcast { slots })
    }

    /// Round 3: verify every slot of every peer and output the batch
    #[instrument(skip_all, fields(party = %self.config.me(), tau = self.tau))]
    pub fn round3(
        &mut self,
        inputs: &BTreeMap<IdentityKey, PreGenRound2Broadcast<C>>,
    ) -> Result<PreSignatureBatch<C>> {
        let (nonces, commitments) = match std::mem::replace(&mut self.state, PreGenState::Aborted) {
            PreGenState::AwaitingRound3 {
                nonces,
                commitments,
            } => (nonces, commitments),
            other => {
                let actual = other.name();
                self.state = other;
                return Err(Error::InvalidRound {
                    expected: "round 3",
                    actual,
                });
            }
        };

        let batch = self
            .verify_and_assemble(&nonces, &commitments, inputs)
            .map_err(|e| {
                warn!(error = %e, "Aborting");
                e
            })?;
        self.state = PreGenState::Done;

        info!("Generated pre-signatures");
        Ok(batch)
    }

    fn collect_commitments(
        &self,
        inputs: &BTreeMap<IdentityKey, PreGenRound1Broadcast>,
    ) -> Result<BTreeMap<IdentityKey, Vec<Commitment>>> {
        peer_inputs(&self.config, inputs)?
            .into_iter()
            .map(|(identity, input)| {
                if input.commitments.len() != self.tau {
                    return Err(Error::abort(
                        identity,
                        format!(
                            "sent {} commitments, expected {}",
                            input.commitments.len(),
                            self.tau
                        ),
                    ));
                }
                Ok((identity.clone(), input.commitments.clone()))
            })
            .collect()
    }

    fn verify_and_assemble(
        &self,
        nonces: &[Nonce<C>],
        commitments: &BTreeMap<IdentityKey, Vec<Commitment>>,
        inputs: &BTreeMap<IdentityKey, PreGenRound2Broadcast<C>>,
    ) -> Result<PreSignatureBatch<C>> {
        let me = self.config.me();
        let mut big_r: Vec<BTreeMap<IdentityKey, C::Point>> = nonces
            .iter()
            .map(|nonce| [(me.clone(), nonce.big_r())].into_iter().collect())
            .collect();

        for (identity, input) in peer_inputs(&self.config, inputs)? {
            if input.slots.len() != self.tau {
                return Err(Error::abort(
                    identity,
                    format!("sent {} slots, expected {}", input.slots.len(), self.tau),
                ));
            }
            let their_commitments = commitments
                .get(identity)
                .ok_or_else(|| Error::abort(identity, "no commitments recorded"))?;

            let verifier = SlotVerifier {
                owner: identity,
                sid: self.config.session_id(),
                signers: &self.signers_bytes,
                tau: self.tau,
                transcript: &self.transcript,
            };
            verifier.verify_all(their_commitments, &input.slots)?;
            debug!(peer = %identity, "Verified all slots");

            for (slot, reveal) in big_r.iter_mut().zip(&input.slots) {
                slot.insert(identity.clone(), reveal.big_r);
            }
        }

        let pre_signatures = nonces
            .iter()
            .zip(big_r)
            .enumerate()
            .map(|(index, (nonce, big_r))| PreSignature {
                index,
                tau: self.tau,
                k: *nonce.k(),
                big_r,
            })
            .collect();

        Ok(PreSignatureBatch::new(pre_signatures))
    }
}
