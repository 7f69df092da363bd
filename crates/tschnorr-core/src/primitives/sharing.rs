//! Shamir to additive share conversion

use std::collections::BTreeSet;

use elliptic_curve::ff::Field;
use tracing::debug;

use crate::ciphersuite::Ciphersuite;
use crate::types::{Cohort, IdentityKey, SharingId};
use crate::{Error, Result};

/// Lagrange coefficient of `my_id` for interpolating at zero over `ids`
///
/// `λ_i = Π_{j≠i} x_j / (x_j - x_i)`
pub fn lagrange_coefficient<C: Ciphersuite>(
    my_id: SharingId,
    ids: &[SharingId],
) -> Result<C::Scalar> {
    if my_id == 0 || !ids.contains(&my_id) {
        return Err(Error::Failed(format!(
            "sharing id {my_id} is not among the interpolation points"
        )));
    }

    let x_i = C::Scalar::from(u64::from(my_id));
    let mut numerator = C::Scalar::ONE;
    let mut denominator = C::Scalar::ONE;

    for &id in ids.iter().filter(|&&id| id != my_id) {
        if id == 0 {
            return Err(Error::Failed("sharing id 0 is not a valid point".into()));
        }
        let x_j = C::Scalar::from(u64::from(id));
        numerator *= x_j;
        denominator *= x_j - x_i;
    }

    let inverse = Option::<C::Scalar>::from(denominator.invert())
        .ok_or_else(|| Error::Failed("duplicate sharing ids".into()))?;
    Ok(numerator * inverse)
}

/// Converts this party's Shamir share into an additive share over `cosigners`
///
/// The cosigning set must hold exactly `threshold` members of the cohort, this party among
/// them, and the additive shares of all cosigners then sum to the secret.
pub fn to_additive<C: Ciphersuite>(
    share: &C::Scalar,
    my_sharing_id: SharingId,
    cosigners: &BTreeSet<IdentityKey>,
    cohort: &Cohort,
) -> Result<C::Scalar> {
    if cosigners.len() != cohort.threshold() {
        return Err(Error::Failed(format!(
            "cosigning set has {} members but threshold is {}",
            cosigners.len(),
            cohort.threshold()
        )));
    }

    let ids = cosigners
        .iter()
        .map(|identity| {
            cohort
                .sharing_id(identity)
                .ok_or_else(|| Error::Failed(format!("{identity} has no sharing id")))
        })
        .collect::<Result<Vec<_>>>()?;

    let lambda = lagrange_coefficient::<C>(my_sharing_id, &ids)?;
    debug!(sharing_id = my_sharing_id, cosigners = ids.len(), "Converted to additive share");

    Ok(lambda * share)
}
