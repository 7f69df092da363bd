//! Schnorr proof of knowledge of a discrete logarithm, made non-interactive with Fiat-Shamir
//!
//! The challenge binds the ciphersuite, the session id, caller supplied context, the base,
//! the statement and the prover's commitment. Proving and verifying fork the given
//! transcript, so both sides only need to agree on its starting state.

use elliptic_curve::ff::Field;
use rand_core::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::ciphersuite::Ciphersuite;
use crate::primitives::transcript::Transcript;
use crate::types::{point_serde, scalar_serde, SessionId};
use crate::{Error, Result};

/// Proof that the prover knows `x` such that `X = x·B`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct DlogProof<C: Ciphersuite> {
    #[serde(with = "point_serde")]
    pub commitment: C::Point,
    #[serde(with = "scalar_serde")]
    pub challenge: C::Scalar,
    #[serde(with = "scalar_serde")]
    pub response: C::Scalar,
}

impl<C: Ciphersuite> DlogProof<C> {
    /// Prove knowledge of `witness`, returning the proof and the statement `witness·base`
    pub fn prove<R: RngCore + CryptoRng>(
        witness: &C::Scalar,
        base: &C::Point,
        sid: &SessionId,
        context: &[u8],
        transcript: &Transcript,
        rng: &mut R,
    ) -> (Self, C::Point) {
        let statement = *base * witness;
        let mut blinding = C::Scalar::random(&mut *rng);
        let commitment = *base * blinding;
        let challenge = Self::challenge(base, &statement, &commitment, sid, context, transcript);
        let response = blinding + challenge * witness;
        blinding.zeroize();

        (
            Self {
                commitment,
                challenge,
                response,
            },
            statement,
        )
    }

    /// Verify the proof for `statement` over `base`
    pub fn verify(
        &self,
        statement: &C::Point,
        base: &C::Point,
        sid: &SessionId,
        context: &[u8],
        transcript: &Transcript,
    ) -> Result<()> {
        let expected = Self::challenge(base, statement, &self.commitment, sid, context, transcript);
        if expected != self.challenge {
            return Err(Error::VerificationFailed(
                "dlog proof challenge mismatch".into(),
            ));
        }
        if *base * self.response != self.commitment + *statement * self.challenge {
            return Err(Error::VerificationFailed(
                "dlog proof response mismatch".into(),
            ));
        }
        Ok(())
    }

    fn challenge(
        base: &C::Point,
        statement: &C::Point,
        commitment: &C::Point,
        sid: &SessionId,
        context: &[u8],
        transcript: &Transcript,
    ) -> C::Scalar {
        let mut transcript = transcript.fork();
        transcript.append_message(b"dlog-ciphersuite", C::NAME.as_bytes());
        transcript.append_message(b"dlog-sid", sid.as_bytes());
        transcript.append_message(b"dlog-context", context);
        transcript.append_message(b"dlog-base", &C::serialize_point(base));
        transcript.append_message(b"dlog-statement", &C::serialize_point(statement));
        transcript.append_message(b"dlog-commitment", &C::serialize_point(commitment));
        transcript.challenge_scalar::<C>(b"dlog-challenge")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ciphersuite::{Ed25519, Secp256k1};
    use elliptic_curve::group::Group;
    use rand_chacha::ChaCha20Rng;
    use rand_core::SeedableRng;

    fn sid(bytes: &[u8]) -> SessionId {
        SessionId::new(bytes.to_vec()).unwrap()
    }

    fn prove_verify<C: Ciphersuite>() {
        let mut rng = ChaCha20Rng::seed_from_u64(42);
        let transcript = Transcript::new(b"dlog-test");
        let generator = C::Point::generator();
        let x = C::Scalar::random(&mut rng);

        let (proof, statement) =
            DlogProof::<C>::prove(&x, &generator, &sid(b"sid"), b"ctx", &transcript, &mut rng);
        assert_eq!(statement, generator * x);
        assert!(proof
            .verify(&statement, &generator, &sid(b"sid"), b"ctx", &transcript)
            .is_ok());
    }

    #[test]
    fn test_prove_verify() {
        prove_verify::<Secp256k1>();
        prove_verify::<Ed25519>();
    }

    #[test]
    fn test_binding_to_context() {
        let mut rng = ChaCha20Rng::seed_from_u64(1);
        let transcript = Transcript::new(b"dlog-test");
        let generator = k256::ProjectivePoint::GENERATOR;
        let x = k256::Scalar::random(&mut rng);
        let (proof, statement) = DlogProof::<Secp256k1>::prove(
            &x,
            &generator,
            &sid(b"sid"),
            b"ctx",
            &transcript,
            &mut rng,
        );

        // different session
        assert!(proof
            .verify(&statement, &generator, &sid(b"other"), b"ctx", &transcript)
            .is_err());
        // different context
        assert!(proof
            .verify(&statement, &generator, &sid(b"sid"), b"other", &transcript)
            .is_err());
        // different transcript
        assert!(proof
            .verify(
                &statement,
                &generator,
                &sid(b"sid"),
                b"ctx",
                &Transcript::new(b"other")
            )
            .is_err());
        // different statement
        assert!(proof
            .verify(&(statement + generator), &generator, &sid(b"sid"), b"ctx", &transcript)
            .is_err());
    }

    #[test]
    fn test_forged_response_rejected() {
        let mut rng = ChaCha20Rng::seed_from_u64(2);
        let transcript = Transcript::new(b"dlog-test");
        let generator = k256::ProjectivePoint::GENERATOR;
        let x = k256::Scalar::random(&mut rng);
        let (mut proof, statement) = DlogProof::<Secp256k1>::prove(
            &x,
            &generator,
            &sid(b"sid"),
            b"",
            &transcript,
            &mut rng,
        );

        proof.response += k256::Scalar::ONE;
        assert!(matches!(
            proof.verify(&statement, &generator, &sid(b"sid"), b"", &transcript),
            Err(Error::VerificationFailed(_))
        ));
    }

    #[test]
    fn test_mismatched_challenge_rejected() {
        let mut rng = ChaCha20Rng::seed_from_u64(3);
        let transcript = Transcript::new(b"dlog-test");
        let generator = k256::ProjectivePoint::GENERATOR;
        let x = k256::Scalar::random(&mut rng);
        let (proof, statement) = DlogProof::<Secp256k1>::prove(
            &x,
            &generator,
            &sid(b"sid"),
            b"",
            &transcript,
            &mut rng,
        );

        // A prover who does not know x picks a response and challenge, then solves for the
        // commitment. The equation holds but the challenge is not the hash output.
        let challenge = k256::Scalar::random(&mut rng);
        let response = k256::Scalar::random(&mut rng);
        let forged = DlogProof::<Secp256k1> {
            commitment: generator * response - statement * challenge,
            challenge,
            response,
        };
        assert!(forged
            .verify(&statement, &generator, &sid(b"sid"), b"", &transcript)
            .is_err());

        let mut tampered = proof;
        tampered.challenge += k256::Scalar::ONE;
        assert!(tampered
            .verify(&statement, &generator, &sid(b"sid"), b"", &transcript)
            .is_err());
    }

    #[test]
    fn test_serde_roundtrip() {
        let mut rng = ChaCha20Rng::seed_from_u64(4);
        let transcript = Transcript::new(b"dlog-test");
        let generator = curve25519_dalek::edwards::SubgroupPoint::generator();
        let x = curve25519_dalek::Scalar::random(&mut rng);
        let (proof, statement) =
            DlogProof::<Ed25519>::prove(&x, &generator, &sid(b"sid"), b"", &transcript, &mut rng);

        let json = serde_json::to_string(&proof).unwrap();
        let decoded: DlogProof<Ed25519> = serde_json::from_str(&json).unwrap();
        assert!(decoded
            .verify(&statement, &generator, &sid(b"sid"), b"", &transcript)
            .is_ok());
    }
}
