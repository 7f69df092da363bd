//! Ciphersuites
//!
//! A ciphersuite fixes the prime-order group, its scalar field and the hash used for the
//! Schnorr challenge. The signing protocols are written once against [`Ciphersuite`] and
//! instantiated per suite:
//! * [`Secp256k1`] - plain Schnorr over secp256k1 with a SHA-512 challenge
//! * [`Ed25519`] - signatures accepted by any RFC 8032 verifier
//! * [`Bitcoin`] - BIP-340 (taproot) signatures

use core::fmt::Debug;

use elliptic_curve::ff::PrimeField;
use elliptic_curve::group::prime::PrimeGroup;
use elliptic_curve::group::{Group, GroupEncoding};
use zeroize::Zeroize;

mod bitcoin;
mod ed25519;
mod secp256k1;

pub use bitcoin::Bitcoin;
pub use ed25519::Ed25519;
pub use secp256k1::Secp256k1;

/// Group, scalar field and challenge hash of a threshold Schnorr instantiation
pub trait Ciphersuite: Sized + Clone + Copy + Debug + Send + Sync + 'static {
    /// Name of the ciphersuite, mixed into commitments and transcripts
    const NAME: &'static str;

    /// Prime-order group the signatures live in
    type Point: PrimeGroup<Scalar = Self::Scalar>;

    /// Scalar field of [`Self::Point`]
    type Scalar: PrimeField + Zeroize;

    /// Reduces a double-length digest into the scalar field without modular bias
    fn scalar_from_wide_bytes(bytes: &[u8; 64]) -> Self::Scalar;

    /// Computes the Schnorr challenge `e = H(R ‖ X ‖ m)`
    ///
    /// Both points are already normalized, see [`Ciphersuite::is_normalized`].
    fn compute_challenge(big_r: &Self::Point, public_key: &Self::Point, msg: &[u8]) -> Self::Scalar;

    /// Canonical encoding of a point
    fn serialize_point(point: &Self::Point) -> Vec<u8> {
        point.to_bytes().as_ref().to_vec()
    }

    /// Canonical encoding of a scalar
    fn serialize_scalar(scalar: &Self::Scalar) -> Vec<u8> {
        scalar.to_repr().as_ref().to_vec()
    }

    /// Determines whether the point is normalized according to the Schnorr scheme
    ///
    /// Schemes that work with x-only points (BIP-340) fix the Y coordinate implicitly. If
    /// `X` isn't normalized then `-X` must be. The identity is always normalized. Schemes
    /// without such a notion return `true` for every point.
    fn is_normalized(point: &Self::Point) -> bool {
        let _ = point;
        true
    }

    /// Encoding of a normalized point as the verifier expects it
    fn serialize_normalized_point(point: &Self::Point) -> Vec<u8> {
        Self::serialize_point(point)
    }
}

/// Returns the normalized form of `point` and whether it had to be negated
pub fn normalize_point<C: Ciphersuite>(point: C::Point) -> (C::Point, bool) {
    if bool::from(point.is_identity()) || C::is_normalized(&point) {
        (point, false)
    } else {
        (-point, true)
    }
}

/// Negates `scalar` when `negate` holds
pub(crate) fn conditional_negate<C: Ciphersuite>(scalar: C::Scalar, negate: bool) -> C::Scalar {
    if negate {
        -scalar
    } else {
        scalar
    }
}
