use k256::elliptic_curve::{bigint::U256, ops::Reduce, point::AffineCoordinates};
use sha2::{Digest, Sha256};

use super::{Ciphersuite, Secp256k1};

const CHALLENGE_TAG: &[u8] = b"BIP0340/challenge";

/// Ciphersuite that outputs [BIP-340] compliant signatures
///
/// BIP-340 works with x-only points, so both `R` and the public key are implicitly the
/// points with even Y. Cosigners negate their nonce when the aggregated `R` has odd Y, and
/// their additive share when the public key has odd Y.
///
/// [BIP-340]: https://github.com/bitcoin/bips/blob/master/bip-0340.mediawiki
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Bitcoin;

impl Ciphersuite for Bitcoin {
    const NAME: &'static str = "TSCHNORR-BIP340-SHA256-v1";

    type Point = <Secp256k1 as Ciphersuite>::Point;
    type Scalar = <Secp256k1 as Ciphersuite>::Scalar;

    fn scalar_from_wide_bytes(bytes: &[u8; 64]) -> Self::Scalar {
        Secp256k1::scalar_from_wide_bytes(bytes)
    }

    fn compute_challenge(big_r: &Self::Point, public_key: &Self::Point, msg: &[u8]) -> Self::Scalar {
        let tag = Sha256::digest(CHALLENGE_TAG);
        let digest = Sha256::new()
            .chain_update(tag)
            .chain_update(tag)
            .chain_update(Self::serialize_normalized_point(big_r))
            .chain_update(Self::serialize_normalized_point(public_key))
            .chain_update(msg)
            .finalize();

        <k256::Scalar as Reduce<U256>>::reduce_bytes(&digest)
    }

    fn is_normalized(point: &Self::Point) -> bool {
        !bool::from(point.to_affine().y_is_odd())
    }

    fn serialize_normalized_point(point: &Self::Point) -> Vec<u8> {
        point.to_affine().x().to_vec()
    }
}
