//! Helpers shared by the unit tests: a trusted dealer and session builders

use std::collections::BTreeMap;

use elliptic_curve::ff::Field;
use elliptic_curve::group::Group;
use rand_core::{CryptoRng, RngCore};
use sha2::{Digest, Sha256};

use crate::ciphersuite::Ciphersuite;
use crate::types::{Cohort, IdentityKey, SessionConfig, SessionId, SharingId, SigningKeyShare};

/// Identity derived from a name
pub(crate) fn identity(name: &str) -> IdentityKey {
    IdentityKey::new(Sha256::digest(name.as_bytes()).to_vec(), name)
}

pub(crate) fn sid(bytes: &[u8]) -> SessionId {
    SessionId::new(bytes.to_vec()).unwrap()
}

/// Output of a trusted dealer
pub(crate) struct Dealt<C: Ciphersuite> {
    pub cohort: Cohort,
    /// Sorted identities
    pub identities: Vec<IdentityKey>,
    pub shares: BTreeMap<IdentityKey, SigningKeyShare<C>>,
    pub public_shares: BTreeMap<IdentityKey, C::Point>,
    pub public_key: C::Point,
    pub secret: C::Scalar,
}

const NAMES: [&str; 7] = ["alice", "bob", "carol", "dave", "erin", "frank", "grace"];

/// Shamir shares a random secret among `n` parties with the given threshold
pub(crate) fn deal<C: Ciphersuite>(
    threshold: usize,
    n: usize,
    rng: &mut (impl RngCore + CryptoRng),
) -> Dealt<C> {
    assert!(n <= NAMES.len());
    let coefficients: Vec<C::Scalar> = (0..threshold).map(|_| C::Scalar::random(&mut *rng)).collect();
    let secret = coefficients[0];
    let public_key = C::Point::generator() * secret;

    let mut sharing_ids = BTreeMap::new();
    let mut shares = BTreeMap::new();
    let mut public_shares = BTreeMap::new();
    for (i, name) in NAMES.iter().take(n).enumerate() {
        let id = i as SharingId + 1;
        let x = C::Scalar::from(u64::from(id));
        let share = coefficients
            .iter()
            .rev()
            .fold(C::Scalar::ZERO, |acc, coefficient| acc * x + coefficient);

        let identity = identity(name);
        sharing_ids.insert(identity.clone(), id);
        public_shares.insert(identity.clone(), C::Point::generator() * share);
        shares.insert(identity, SigningKeyShare::new(share, public_key).unwrap());
    }

    Dealt {
        cohort: Cohort::new(threshold, sharing_ids).unwrap(),
        identities: shares.keys().cloned().collect(),
        shares,
        public_shares,
        public_key,
        secret,
    }
}

impl<C: Ciphersuite> Dealt<C> {
    /// Identity by dealer order (alice = 0, bob = 1, ...)
    pub fn party(&self, index: usize) -> IdentityKey {
        identity(NAMES[index])
    }

    pub fn share(&self, identity: &IdentityKey) -> SigningKeyShare<C> {
        self.shares[identity].clone()
    }

    pub fn config(&self, session_id: &[u8], me: &IdentityKey, signers: &[IdentityKey]) -> SessionConfig {
        SessionConfig::new(
            sid(session_id),
            self.cohort.clone(),
            me.clone(),
            signers.iter().cloned(),
        )
        .unwrap()
    }
}

/// Installs a test subscriber once, ignoring repeated calls
pub(crate) fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("tschnorr_core=debug")
        .with_test_writer()
        .try_init();
}
