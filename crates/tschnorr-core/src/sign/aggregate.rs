//! Combining partial signatures

use std::collections::BTreeMap;
use std::fmt;

use elliptic_curve::ff::Field;
use elliptic_curve::group::Group;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use super::PartialSignature;
use crate::ciphersuite::{conditional_negate, normalize_point, Ciphersuite};
use crate::primitives::lagrange_coefficient;
use crate::types::{point_serde, scalar_serde, Cohort, IdentityKey};
use crate::{Error, Result};

/// Schnorr signature `(R, s)` with `s·G = R + H(R ‖ X ‖ m)·X`
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct Signature<C: Ciphersuite> {
    #[serde(with = "point_serde")]
    pub r: C::Point,
    #[serde(with = "scalar_serde")]
    pub s: C::Scalar,
}

impl<C: Ciphersuite> Signature<C> {
    /// Verify the signature on `message` under `public_key`
    pub fn verify(&self, public_key: &C::Point, message: &[u8]) -> Result<()> {
        if !C::is_normalized(&self.r) {
            return Err(Error::VerificationFailed("R is not normalized".into()));
        }
        let (public_key, _) = normalize_point::<C>(*public_key);
        let e = C::compute_challenge(&self.r, &public_key, message);
        if C::Point::generator() * self.s != self.r + public_key * e {
            return Err(Error::VerificationFailed("invalid signature".into()));
        }
        Ok(())
    }

    /// Encoding expected by the ciphersuite's standard verifier: `R ‖ s`
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = C::serialize_normalized_point(&self.r);
        bytes.extend_from_slice(&C::serialize_scalar(&self.s));
        bytes
    }
}

impl<C: Ciphersuite> fmt::Debug for Signature<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({})", hex::encode(self.to_bytes()))
    }
}

/// Sums partial signatures into `(Σ R_i, Σ s_i)`
///
/// Neither the partial signatures nor the result are verified, see [`Aggregator`].
pub fn aggregate<C: Ciphersuite>(partials: &[PartialSignature<C>]) -> Result<Signature<C>> {
    if partials.len() < 2 {
        return Err(Error::InvalidArgument(format!(
            "at least 2 partial signatures required, got {}",
            partials.len()
        )));
    }

    let (r, s) = partials.iter().fold(
        (C::Point::identity(), C::Scalar::ZERO),
        |(r, s), partial| (r + partial.big_r, s + partial.s),
    );
    Ok(Signature { r, s })
}

/// Aggregator that checks every partial signature before combining them
///
/// A partial signature `(R_i, s_i)` from a party with public share `X_i` is valid when
/// `s_i·G = R_i + e·λ_i·X_i`, which points at the culprit when the final signature would not
/// verify.
pub struct Aggregator<C: Ciphersuite> {
    cohort: Cohort,
    public_key: C::Point,
    public_shares: BTreeMap<IdentityKey, C::Point>,
}

impl<C: Ciphersuite> Aggregator<C> {
    /// `public_shares` holds `X_i = x_i·G` for every party of the cohort
    pub fn new(
        cohort: Cohort,
        public_key: C::Point,
        public_shares: BTreeMap<IdentityKey, C::Point>,
    ) -> Result<Self> {
        if let Some(missing) = cohort.participants().find(|id| !public_shares.contains_key(*id)) {
            return Err(Error::InvalidArgument(format!("no public share for {missing}")));
        }
        Ok(Self {
            cohort,
            public_key,
            public_shares,
        })
    }

    pub fn public_key(&self) -> C::Point {
        self.public_key
    }

    /// Verify every partial signature, combine them and verify the result
    #[instrument(skip_all, fields(cosigners = partials.len()))]
    pub fn aggregate(
        &self,
        message: &[u8],
        partials: &BTreeMap<IdentityKey, PartialSignature<C>>,
    ) -> Result<Signature<C>> {
        if partials.len() != self.cohort.threshold() {
            return Err(Error::InvalidArgument(format!(
                "{} partial signatures given but threshold is {}",
                partials.len(),
                self.cohort.threshold()
            )));
        }

        let ids = partials
            .keys()
            .map(|identity| {
                self.cohort.sharing_id(identity).ok_or_else(|| {
                    Error::InvalidArgument(format!("{identity} is not part of the cohort"))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let big_r = partials
            .values()
            .fold(C::Point::identity(), |acc, partial| acc + partial.big_r);
        let (big_r, _) = normalize_point::<C>(big_r);
        let (public_key, negate_key) = normalize_point::<C>(self.public_key);
        let e = C::compute_challenge(&big_r, &public_key, message);

        for ((identity, partial), id) in partials.iter().zip(&ids) {
            let lambda = conditional_negate::<C>(lagrange_coefficient::<C>(*id, &ids)?, negate_key);
            let public_share = self.public_shares[identity];
            if C::Point::generator() * partial.s != partial.big_r + public_share * (e * lambda) {
                warn!(party = %identity, "Invalid partial signature");
                return Err(Error::abort(identity, "invalid partial signature"));
            }
        }
        debug!("All partial signatures are valid");

        let partials: Vec<_> = partials.values().cloned().collect();
        let signature = aggregate(&partials)?;
        signature.verify(&self.public_key, message)?;
        Ok(signature)
    }
}
