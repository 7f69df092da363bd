use curve25519_dalek::edwards::SubgroupPoint;
use elliptic_curve::group::GroupEncoding;
use sha2::{Digest, Sha512};

use super::Ciphersuite;

/// Ed25519-compatible ciphersuite
///
/// The challenge is `SHA-512(R ‖ A ‖ m)` read little-endian, exactly as in RFC 8032, so
/// aggregated signatures verify with a standard Ed25519 verifier.
///
/// Points live in the prime-order subgroup. Decoding rejects any encoding with a torsion
/// component, so a nonce commitment without a discrete log base `G` never reaches the proof
/// check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Ed25519;

impl Ciphersuite for Ed25519 {
    const NAME: &'static str = "TSCHNORR-ED25519-SHA512-v1";

    type Point = SubgroupPoint;
    type Scalar = curve25519_dalek::Scalar;

    fn scalar_from_wide_bytes(bytes: &[u8; 64]) -> Self::Scalar {
        curve25519_dalek::Scalar::from_bytes_mod_order_wide(bytes)
    }

    fn compute_challenge(big_r: &Self::Point, public_key: &Self::Point, msg: &[u8]) -> Self::Scalar {
        let digest = Sha512::new()
            .chain_update(big_r.to_bytes())
            .chain_update(public_key.to_bytes())
            .chain_update(msg)
            .finalize();

        let mut wide = [0u8; 64];
        wide.copy_from_slice(&digest);
        Self::scalar_from_wide_bytes(&wide)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use curve25519_dalek::constants::EIGHT_TORSION;
    use curve25519_dalek::{EdwardsPoint, Scalar};
    use elliptic_curve::ff::Field;
    use elliptic_curve::group::Group;
    use rand_chacha::ChaCha20Rng;
    use rand_core::SeedableRng;

    #[test]
    fn test_torsion_component_rejected_on_decode() {
        let mut rng = ChaCha20Rng::seed_from_u64(1);
        let k = Scalar::random(&mut rng);
        let honest = EdwardsPoint::mul_base(&k);

        let decoded = SubgroupPoint::from_bytes(&honest.compress().to_bytes());
        assert_eq!(Option::<SubgroupPoint>::from(decoded).map(EdwardsPoint::from), Some(honest));

        for torsion in &EIGHT_TORSION[1..] {
            let tainted = (honest + torsion).compress().to_bytes();
            assert!(bool::from(SubgroupPoint::from_bytes(&tainted).is_none()));
        }
    }

    #[test]
    fn test_challenge_uses_compressed_encoding() {
        let mut rng = ChaCha20Rng::seed_from_u64(2);
        let big_r = SubgroupPoint::generator() * Scalar::random(&mut rng);
        let public_key = SubgroupPoint::generator() * Scalar::random(&mut rng);

        let digest = Sha512::new()
            .chain_update(EdwardsPoint::from(big_r).compress().as_bytes())
            .chain_update(EdwardsPoint::from(public_key).compress().as_bytes())
            .chain_update(b"msg")
            .finalize();
        let mut wide = [0u8; 64];
        wide.copy_from_slice(&digest);

        assert_eq!(
            Ed25519::compute_challenge(&big_r, &public_key, b"msg"),
            Scalar::from_bytes_mod_order_wide(&wide)
        );
    }
}
