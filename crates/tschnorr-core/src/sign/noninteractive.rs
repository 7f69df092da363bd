//! Non-interactive signing with a pre-generated nonce

use std::collections::BTreeMap;

use elliptic_curve::group::Group;
use tracing::{info, instrument};
use zeroize::Zeroize;

use super::{compute_partial_signature, PartialSignature, PreSignature};
use crate::ciphersuite::Ciphersuite;
use crate::types::{IdentityKey, SessionConfig, SigningKeyShare};
use crate::{Error, Result};

/// Cosigner consuming one [`PreSignature`] slot
///
/// The cosigning set is the session's signers and must be a threshold sized subset of the
/// pre-generation participants. Using the same slot for two different messages reveals the
/// signing share, callers must discard a slot once it has been used.
pub struct NonInteractiveCosigner<C: Ciphersuite> {
    config: SessionConfig,
    key_share: SigningKeyShare<C>,
    k: C::Scalar,
    big_r: BTreeMap<IdentityKey, C::Point>,
}

impl<C: Ciphersuite> NonInteractiveCosigner<C> {
    pub fn new(
        config: SessionConfig,
        key_share: SigningKeyShare<C>,
        pre_signature: &PreSignature<C>,
    ) -> Result<Self> {
        if config.signers().len() != config.cohort().threshold() {
            return Err(Error::InvalidArgument(format!(
                "{} cosigners given but threshold is {}",
                config.signers().len(),
                config.cohort().threshold()
            )));
        }

        let big_r = config
            .signers()
            .iter()
            .map(|identity| {
                pre_signature
                    .big_r
                    .get(identity)
                    .map(|point| (identity.clone(), *point))
                    .ok_or_else(|| {
                        Error::InvalidArgument(format!(
                            "pre-signature has no nonce commitment from {identity}"
                        ))
                    })
            })
            .collect::<Result<BTreeMap<_, _>>>()?;

        if big_r.get(config.me()) != Some(&(C::Point::generator() * pre_signature.k)) {
            return Err(Error::InvalidArgument(
                "pre-signature was not generated by this party".into(),
            ));
        }

        Ok(Self {
            config,
            key_share,
            k: pre_signature.k,
            big_r,
        })
    }

    pub fn identity(&self) -> &IdentityKey {
        self.config.me()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Shared public key the slot signs for
    pub fn public_key(&self) -> C::Point {
        self.key_share.public_key
    }

    /// Sign `message` with the slot's nonce
    #[instrument(skip_all, fields(party = %self.config.me()))]
    pub fn produce_partial_signature(&self, message: &[u8]) -> Result<PartialSignature<C>> {
        let big_r = self.big_r.values().fold(C::Point::identity(), |acc, r| acc + r);
        let partial =
            compute_partial_signature(&self.config, &self.key_share, &self.k, big_r, message)?;

        info!("Produced partial signature");
        Ok(partial)
    }
}

impl<C: Ciphersuite> Drop for NonInteractiveCosigner<C> {
    fn drop(&mut self) {
        self.k.zeroize();
    }
}
