use k256::elliptic_curve::{bigint::U512, ops::Reduce};
use sha2::{Digest, Sha512};

use super::Ciphersuite;

/// Schnorr over secp256k1, challenge is `SHA-512(R ‖ X ‖ m)` over compressed SEC1 points
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Secp256k1;

impl Ciphersuite for Secp256k1 {
    const NAME: &'static str = "TSCHNORR-SECP256K1-SHA512-v1";

    type Point = k256::ProjectivePoint;
    type Scalar = k256::Scalar;

    fn scalar_from_wide_bytes(bytes: &[u8; 64]) -> Self::Scalar {
        <k256::Scalar as Reduce<U512>>::reduce(U512::from_be_slice(bytes))
    }

    fn compute_challenge(big_r: &Self::Point, public_key: &Self::Point, msg: &[u8]) -> Self::Scalar {
        let digest = Sha512::new()
            .chain_update(Self::serialize_point(big_r))
            .chain_update(Self::serialize_point(public_key))
            .chain_update(msg)
            .finalize();

        let mut wide = [0u8; 64];
        wide.copy_from_slice(&digest);
        Self::scalar_from_wide_bytes(&wide)
    }
}
