//! Interactive three round cosigner

use std::collections::BTreeMap;

use rand_core::{CryptoRng, RngCore};
use tracing::{debug, info, instrument, warn};

use super::{
    compute_partial_signature, peer_inputs, verify_reveal, Nonce, NonceBinding, PartialSignature,
    Round1Broadcast, Round2Broadcast, INTERACTIVE_SIGNING_LABEL,
};
use crate::ciphersuite::Ciphersuite;
use crate::primitives::{Commitment, Transcript};
use crate::types::{IdentityKey, SessionConfig, SigningKeyShare};
use crate::{Error, Result};

const NONCE_DOMAIN: &[u8] = b"tschnorr-interactive-nonce";

enum CosignerState<C: Ciphersuite> {
    AwaitingRound1,
    AwaitingRound2(Nonce<C>),
    AwaitingRound3 {
        nonce: Nonce<C>,
        commitments: BTreeMap<IdentityKey, Commitment>,
    },
    Done,
    Aborted,
}

impl<C: Ciphersuite> CosignerState<C> {
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

/// One party of an interactive signing session
///
/// Rounds must be called in order, exactly once each. Calling a round out of order fails
/// with [`Error::InvalidRound`] and leaves the cosigner untouched, any other failure aborts
/// the session for good.
pub struct Cosigner<C: Ciphersuite> {
    config: SessionConfig,
    key_share: SigningKeyShare<C>,
    transcript: Transcript,
    signers_bytes: Vec<u8>,
    state: CosignerState<C>,
}

impl<C: Ciphersuite> Cosigner<C> {
    /// Create a cosigner with the default transcript
    pub fn new(config: SessionConfig, key_share: SigningKeyShare<C>) -> Result<Self> {
        Self::with_transcript(config, key_share, Transcript::new(INTERACTIVE_SIGNING_LABEL))
    }

    /// Create a cosigner on top of a caller supplied transcript
    ///
    /// Every cosigner of the session must start from the same transcript state.
    pub fn with_transcript(
        config: SessionConfig,
        key_share: SigningKeyShare<C>,
        mut transcript: Transcript,
    ) -> Result<Self> {
        if config.signers().len() != config.cohort().threshold() {
            return Err(Error::InvalidArgument(format!(
                "{} cosigners given but threshold is {}",
                config.signers().len(),
                config.cohort().threshold()
            )));
        }

        transcript.append_message(b"ciphersuite", C::NAME.as_bytes());
        transcript.append_message(b"session-id", config.session_id().as_bytes());
        let signers_bytes = config.signers_bytes();

        Ok(Self {
            config,
            key_share,
            transcript,
            signers_bytes,
            state: CosignerState::AwaitingRound1,
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn identity(&self) -> &IdentityKey {
        self.config.me()
    }

    /// Shared public key the session signs for
    pub fn public_key(&self) -> C::Point {
        self.key_share.public_key
    }

    /// Name of the round the cosigner expects next
    pub fn round(&self) -> &'static str {
        self.state.name()
    }

    fn binding<'a>(&'a self, owner: &'a IdentityKey) -> NonceBinding<'a> {
        NonceBinding {
            domain: NONCE_DOMAIN,
            owner,
            signers: &self.signers_bytes,
            slot: None,
        }
    }

    /// Round 1: sample `k_i` and commit to `R_i = k_i·G`
    #[instrument(skip_all, fields(party = %self.config.me()))]
    pub fn round1<R: RngCore + CryptoRng>(&mut self, rng: &mut R) -> Result<Round1Broadcast> {
        if !matches!(self.state, CosignerState::AwaitingRound1) {
            return Err(Error::InvalidRound {
                expected: "round 1",
                actual: self.state.name(),
            });
        }

        let (nonce, commitment) =
            Nonce::sample(&self.binding(self.config.me()), self.config.session_id(), rng);
        self.state = CosignerState::AwaitingRound2(nonce);

        debug!("Committed to nonce");
        Ok(Round1Broadcast { commitment })
    }

    /// Round 2: record everyone's commitment and reveal `R_i` with a proof of knowledge
    #[instrument(skip_all, fields(party = %self.config.me()))]
    pub fn round2<R: RngCore + CryptoRng>(
        &mut self,
        inputs: &BTreeMap<IdentityKey, Round1Broadcast>,
        rng: &mut R,
    ) -> Result<Round2Broadcast<C>> {
        let nonce = match std::mem::replace(&mut self.state, CosignerState::Aborted) {
            CosignerState::AwaitingRound2(nonce) => nonce,
            other => {
                let actual = other.name();
                self.state = other;
                return Err(Error::InvalidRound {
                    expected: "round 2",
                    actual,
                });
            }
        };

        let commitments = peer_inputs(&self.config, inputs)
            .map_err(|e| {
                warn!(error = %e, "Aborting");
                e
            })?
            .into_iter()
            .map(|(identity, input)| (identity.clone(), input.commitment))
            .collect();

        let reveal = nonce.reveal(
            &self.binding(self.config.me()),
            self.config.session_id(),
            &self.transcript,
            rng,
        );
        self.state = CosignerState::AwaitingRound3 { nonce, commitments };

        debug!("Revealed nonce commitment");
        Ok(reveal)
    }

    /// Round 3: verify every reveal and produce this party's partial signature on `message`
    #[instrument(skip_all, fields(party = %self.config.me()))]
    pub fn round3(
        &mut self,
        inputs: &BTreeMap<IdentityKey, Round2Broadcast<C>>,
        message: &[u8],
    ) -> Result<PartialSignature<C>> {
        let (nonce, commitments) = match std::mem::replace(&mut self.state, CosignerState::Aborted)
        {
            CosignerState::AwaitingRound3 { nonce, commitments } => (nonce, commitments),
            other => {
                let actual = other.name();
                self.state = other;
                return Err(Error::InvalidRound {
                    expected: "round 3",
                    actual,
                });
            }
        };

        let partial = self
            .verify_and_sign(&nonce, &commitments, inputs, message)
            .map_err(|e| {
                warn!(error = %e, "Aborting");
                e
            })?;
        self.state = CosignerState::Done;

        info!("Produced partial signature");
        Ok(partial)
    }

    fn verify_and_sign(
        &self,
        nonce: &Nonce<C>,
        commitments: &BTreeMap<IdentityKey, Commitment>,
        inputs: &BTreeMap<IdentityKey, Round2Broadcast<C>>,
        message: &[u8],
    ) -> Result<PartialSignature<C>> {
        let sid = self.config.session_id();
        let mut big_r = nonce.big_r();

        for (identity, reveal) in peer_inputs(&self.config, inputs)? {
            let commitment = commitments
                .get(identity)
                .ok_or_else(|| Error::abort(identity, "no commitment recorded"))?;
            verify_reveal(&self.binding(identity), sid, &self.transcript, commitment, reveal)
                .map_err(|e| Error::abort(identity, e.to_string()))?;
            big_r += reveal.big_r;
        }
        debug!(cosigners = commitments.len() + 1, "Verified all nonce commitments");

        compute_partial_signature(&self.config, &self.key_share, nonce.k(), big_r, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ciphersuite::{Bitcoin, Ed25519, Secp256k1};
    use crate::sign::{aggregate, Signature};
    use crate::test_utils::{deal, init_tracing, Dealt};
    use elliptic_curve::group::GroupEncoding;
    use rand_chacha::ChaCha20Rng;
    use rand_core::SeedableRng;

    fn cosigners<C: Ciphersuite>(
        dealt: &Dealt<C>,
        session_id: &[u8],
        signers: &[IdentityKey],
    ) -> Vec<Cosigner<C>> {
        signers
            .iter()
            .map(|me| {
                Cosigner::new(dealt.config(session_id, me, signers), dealt.share(me)).unwrap()
            })
            .collect()
    }

    fn broadcast<T: Clone>(
        cosigners: &[Cosigner<impl Ciphersuite>],
        messages: &[T],
    ) -> BTreeMap<IdentityKey, T> {
        cosigners
            .iter()
            .map(|c| c.identity().clone())
            .zip(messages.iter().cloned())
            .collect()
    }

    /// Runs all three rounds in lockstep
    fn run<C: Ciphersuite>(
        cosigners: &mut [Cosigner<C>],
        message: &[u8],
        rng: &mut ChaCha20Rng,
    ) -> Vec<PartialSignature<C>> {
        let round1: Vec<_> = cosigners.iter_mut().map(|c| c.round1(&mut *rng).unwrap()).collect();
        let round1 = broadcast(cosigners, &round1);
        let round2: Vec<_> = cosigners
            .iter_mut()
            .map(|c| c.round2(&round1, &mut *rng).unwrap())
            .collect();
        let round2 = broadcast(cosigners, &round2);
        cosigners
            .iter_mut()
            .map(|c| c.round3(&round2, message).unwrap())
            .collect()
    }

    fn sign<C: Ciphersuite>(threshold: usize, n: usize, seed: u64) -> (Dealt<C>, Vec<u8>, Signature<C>) {
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        let dealt = deal::<C>(threshold, n, &mut rng);
        let signers: Vec<_> = dealt.identities.iter().take(threshold).cloned().collect();
        let mut cosigners = cosigners(&dealt, b"interactive-session", &signers);

        let message = b"threshold schnorr".to_vec();
        let partials = run(&mut cosigners, &message, &mut rng);
        let signature = aggregate(&partials).unwrap();
        (dealt, message, signature)
    }

    #[test]
    fn test_sign_secp256k1() {
        init_tracing();
        for (threshold, n) in [(2, 3), (3, 5)] {
            let (dealt, message, signature) = sign::<Secp256k1>(threshold, n, 1);
            assert!(signature.verify(&dealt.public_key, &message).is_ok());
        }
    }

    #[test]
    fn test_sign_ed25519_verifies_with_dalek() {
        for (threshold, n) in [(2, 3), (3, 5)] {
            let (dealt, message, signature) = sign::<Ed25519>(threshold, n, 2);
            assert!(signature.verify(&dealt.public_key, &message).is_ok());

            let verifying_key =
                ed25519_dalek::VerifyingKey::from_bytes(&dealt.public_key.to_bytes())
                    .unwrap();
            let bytes: [u8; 64] = signature.to_bytes().try_into().unwrap();
            let dalek_signature = ed25519_dalek::Signature::from_bytes(&bytes);
            assert!(verifying_key.verify_strict(&message, &dalek_signature).is_ok());
        }
    }

    #[test]
    fn test_sign_bitcoin_verifies_as_bip340() {
        // several seeds so both parities of R and the public key show up
        for seed in 0..8 {
            let (dealt, message, signature) = sign::<Bitcoin>(2, 3, seed);
            assert!(signature.verify(&dealt.public_key, &message).is_ok());

            let x_only = Bitcoin::serialize_normalized_point(&dealt.public_key);
            let verifying_key = k256::schnorr::VerifyingKey::from_bytes(&x_only).unwrap();
            let bip340 =
                k256::schnorr::Signature::try_from(signature.to_bytes().as_slice()).unwrap();
            assert!(verifying_key.verify_raw(&message, &bip340).is_ok());
        }
    }

    #[test]
    fn test_any_threshold_subset_signs() {
        let mut rng = ChaCha20Rng::seed_from_u64(3);
        let dealt = deal::<Secp256k1>(2, 3, &mut rng);
        let (alice, bob, carol) = (dealt.party(0), dealt.party(1), dealt.party(2));

        let signatures: Vec<_> = [vec![alice.clone(), bob.clone()], vec![bob, carol]]
            .into_iter()
            .enumerate()
            .map(|(i, signers)| {
                let sid = format!("session-{i}");
                let mut cosigners = cosigners(&dealt, sid.as_bytes(), &signers);
                let partials = run(&mut cosigners, b"hello", &mut rng);
                aggregate(&partials).unwrap()
            })
            .collect();

        for signature in &signatures {
            assert!(signature.verify(&dealt.public_key, b"hello").is_ok());
        }
        // fresh nonces per session
        assert_ne!(signatures[0].to_bytes(), signatures[1].to_bytes());
    }

    #[test]
    fn test_cosigning_set_must_match_threshold() {
        let mut rng = ChaCha20Rng::seed_from_u64(4);
        let dealt = deal::<Secp256k1>(2, 3, &mut rng);
        let me = dealt.party(0);
        let config = dealt.config(b"sid", &me, &dealt.identities);
        assert!(matches!(
            Cosigner::new(config, dealt.share(&me)),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_rounds_out_of_order() {
        let mut rng = ChaCha20Rng::seed_from_u64(5);
        let dealt = deal::<Secp256k1>(2, 3, &mut rng);
        let signers = &dealt.identities[..2];
        let mut cosigners = cosigners(&dealt, b"sid", signers);

        assert!(matches!(
            cosigners[0].round2(&BTreeMap::new(), &mut rng),
            Err(Error::InvalidRound { expected: "round 2", actual: "round 1" })
        ));
        assert!(matches!(
            cosigners[0].round3(&BTreeMap::new(), b"msg"),
            Err(Error::InvalidRound { .. })
        ));

        // the failed calls did not disturb the state
        cosigners[0].round1(&mut rng).unwrap();
        assert!(matches!(
            cosigners[0].round1(&mut rng),
            Err(Error::InvalidRound { expected: "round 1", actual: "round 2" })
        ));
        assert_eq!(cosigners[0].round(), "round 2");
    }

    #[test]
    fn test_missing_commitment_aborts() {
        let mut rng = ChaCha20Rng::seed_from_u64(6);
        let dealt = deal::<Secp256k1>(3, 5, &mut rng);
        let signers: Vec<_> = dealt.identities[..3].to_vec();
        let mut cosigners = cosigners(&dealt, b"sid", &signers);

        let round1: Vec<_> = cosigners.iter_mut().map(|c| c.round1(&mut rng).unwrap()).collect();
        let mut round1 = broadcast(&cosigners, &round1);
        round1.remove(&signers[2]);

        let err = cosigners[0].round2(&round1, &mut rng).unwrap_err();
        assert_eq!(err.culprit(), Some(&signers[2]));
        assert_eq!(cosigners[0].round(), "aborted");
        assert!(cosigners[0].round3(&BTreeMap::new(), b"msg").is_err());
    }

    #[test]
    fn test_missing_reveal_aborts() {
        let mut rng = ChaCha20Rng::seed_from_u64(10);
        let dealt = deal::<Secp256k1>(3, 5, &mut rng);
        let signers: Vec<_> = dealt.identities[..3].to_vec();
        let mut cosigners = cosigners(&dealt, b"sid", &signers);

        let round1: Vec<_> = cosigners.iter_mut().map(|c| c.round1(&mut rng).unwrap()).collect();
        let round1 = broadcast(&cosigners, &round1);
        let round2: Vec<_> = cosigners
            .iter_mut()
            .map(|c| c.round2(&round1, &mut rng).unwrap())
            .collect();
        let mut round2 = broadcast(&cosigners, &round2);
        round2.remove(&signers[1]);

        let err = cosigners[0].round3(&round2, b"msg").unwrap_err();
        assert!(matches!(err, Error::IdentifiableAbort { .. }));
        assert_eq!(err.culprit(), Some(&signers[1]));
        assert_eq!(cosigners[0].round(), "aborted");
    }

    #[test]
    fn test_reveal_with_torsion_component_does_not_decode() {
        let mut rng = ChaCha20Rng::seed_from_u64(11);
        let dealt = deal::<Ed25519>(2, 3, &mut rng);
        let signers: Vec<_> = dealt.identities[..2].to_vec();
        let mut cosigners = cosigners(&dealt, b"sid", &signers);

        let round1: Vec<_> = cosigners.iter_mut().map(|c| c.round1(&mut rng).unwrap()).collect();
        let round1 = broadcast(&cosigners, &round1);
        let reveal = cosigners[1].round2(&round1, &mut rng).unwrap();

        let mut value = serde_json::to_value(&reveal).unwrap();
        assert!(serde_json::from_value::<Round2Broadcast<Ed25519>>(value.clone()).is_ok());

        // R' = k·G + T with T of order 2 has no discrete log base G
        let tainted = curve25519_dalek::EdwardsPoint::from(reveal.big_r)
            + curve25519_dalek::constants::EIGHT_TORSION[4];
        value["big_r"] = serde_json::json!(tainted.compress().to_bytes().to_vec());
        assert!(serde_json::from_value::<Round2Broadcast<Ed25519>>(value).is_err());
    }

    #[test]
    fn test_tampered_reveal_names_culprit() {
        let mut rng = ChaCha20Rng::seed_from_u64(7);
        let dealt = deal::<Secp256k1>(2, 3, &mut rng);
        let signers: Vec<_> = dealt.identities[..2].to_vec();
        let mut cosigners = cosigners(&dealt, b"sid", &signers);

        let round1: Vec<_> = cosigners.iter_mut().map(|c| c.round1(&mut rng).unwrap()).collect();
        let round1 = broadcast(&cosigners, &round1);
        let mut round2: Vec<_> = cosigners
            .iter_mut()
            .map(|c| c.round2(&round1, &mut rng).unwrap())
            .collect();

        // the second cosigner swaps in a different R after committing
        round2[1].big_r += k256::ProjectivePoint::GENERATOR;
        let round2 = broadcast(&cosigners, &round2);

        let err = cosigners[0].round3(&round2, b"msg").unwrap_err();
        assert!(matches!(err, Error::IdentifiableAbort { .. }));
        assert_eq!(err.culprit(), Some(&signers[1]));
    }

    #[test]
    fn test_forged_proof_names_culprit() {
        let mut rng = ChaCha20Rng::seed_from_u64(8);
        let dealt = deal::<Ed25519>(2, 3, &mut rng);
        let signers: Vec<_> = dealt.identities[..2].to_vec();
        let mut cosigners = cosigners(&dealt, b"sid", &signers);

        let round1: Vec<_> = cosigners.iter_mut().map(|c| c.round1(&mut rng).unwrap()).collect();
        let round1 = broadcast(&cosigners, &round1);
        let mut round2: Vec<_> = cosigners
            .iter_mut()
            .map(|c| c.round2(&round1, &mut rng).unwrap())
            .collect();

        round2[1].proof.response += curve25519_dalek::Scalar::ONE;
        let round2 = broadcast(&cosigners, &round2);

        let err = cosigners[0].round3(&round2, b"msg").unwrap_err();
        assert_eq!(err.culprit(), Some(&signers[1]));
    }

    #[test]
    fn test_reveal_from_other_session_rejected() {
        let mut rng = ChaCha20Rng::seed_from_u64(9);
        let dealt = deal::<Secp256k1>(2, 3, &mut rng);
        let signers: Vec<_> = dealt.identities[..2].to_vec();
        let mut first = cosigners(&dealt, b"session-a", &signers);
        let mut second = cosigners(&dealt, b"session-b", &signers);

        let round1: Vec<_> = first.iter_mut().map(|c| c.round1(&mut rng).unwrap()).collect();
        let first_round1 = broadcast(&first, &round1);
        let round1: Vec<_> = second.iter_mut().map(|c| c.round1(&mut rng).unwrap()).collect();
        let second_round1 = broadcast(&second, &round1);

        let first_round2: Vec<_> = first
            .iter_mut()
            .map(|c| c.round2(&first_round1, &mut rng).unwrap())
            .collect();
        second[0].round2(&second_round1, &mut rng).unwrap();

        // replaying the first session's commitment and opening into the second session
        let mut replayed = broadcast(&first, &first_round2);
        replayed.remove(&signers[0]);

        let err = second[0].round3(&replayed, b"msg").unwrap_err();
        assert_eq!(err.culprit(), Some(&signers[1]));
    }
}
