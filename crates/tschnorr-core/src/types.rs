//! Core types shared by the signing protocols

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use elliptic_curve::ff::Field;
use elliptic_curve::group::Group;
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::ciphersuite::Ciphersuite;
use crate::{Error, Result};

/// Shamir evaluation point of a party (non-zero)
pub type SharingId = u32;

/// Identity of a party in the MPC network
///
/// Ordering, equality and hashing only look at the public key bytes, the label is
/// auxiliary data used for logging.
#[derive(Clone, Serialize, Deserialize)]
pub struct IdentityKey {
    public_key: Vec<u8>,
    label: String,
}

impl IdentityKey {
    /// Create an identity from its public key bytes and a human readable label
    pub fn new(public_key: impl Into<Vec<u8>>, label: impl Into<String>) -> Self {
        Self {
            public_key: public_key.into(),
            label: label.into(),
        }
    }

    /// Public key bytes
    pub fn public_key(&self) -> &[u8] {
        &self.public_key
    }

    /// Auxiliary label
    pub fn label(&self) -> &str {
        &self.label
    }
}

impl PartialEq for IdentityKey {
    fn eq(&self, other: &Self) -> bool {
        self.public_key == other.public_key
    }
}

impl Eq for IdentityKey {}

impl PartialOrd for IdentityKey {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for IdentityKey {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.public_key.cmp(&other.public_key)
    }
}

impl std::hash::Hash for IdentityKey {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.public_key.hash(state)
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = &self.public_key[..self.public_key.len().min(4)];
        if self.label.is_empty() {
            write!(f, "{}", hex::encode(prefix))
        } else {
            write!(f, "{}({})", self.label, hex::encode(prefix))
        }
    }
}

impl fmt::Debug for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IdentityKey({self})")
    }
}

/// Unique identifier of a signing session, agreed out of band
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(Vec<u8>);

impl SessionId {
    /// Wrap session id bytes, rejecting the empty string
    pub fn new(bytes: impl Into<Vec<u8>>) -> Result<Self> {
        let bytes = bytes.into();
        if bytes.is_empty() {
            return Err(Error::InvalidArgument("session id must not be empty".into()));
        }
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionId({})", hex::encode(&self.0))
    }
}

/// Key share held by a party, produced by key generation
#[derive(Clone)]
pub struct SigningKeyShare<C: Ciphersuite> {
    /// This party's Shamir share of the signing key
    pub share: C::Scalar,
    /// Shared public key
    pub public_key: C::Point,
}

impl<C: Ciphersuite> SigningKeyShare<C> {
    pub fn new(share: C::Scalar, public_key: C::Point) -> Result<Self> {
        if bool::from(share.is_zero()) {
            return Err(Error::InvalidArgument("key share is zero".into()));
        }
        if bool::from(public_key.is_identity()) {
            return Err(Error::InvalidArgument("public key is the identity".into()));
        }
        Ok(Self { share, public_key })
    }
}

impl<C: Ciphersuite> Drop for SigningKeyShare<C> {
    fn drop(&mut self) {
        self.share.zeroize();
    }
}

impl<C: Ciphersuite> fmt::Debug for SigningKeyShare<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKeyShare")
            .field("share", &"<redacted>")
            .field("public_key", &self.public_key)
            .finish()
    }
}

/// Threshold access structure: every party of the key and its Shamir evaluation point
#[derive(Debug, Clone)]
pub struct Cohort {
    threshold: usize,
    sharing_ids: BTreeMap<IdentityKey, SharingId>,
}

impl Cohort {
    /// Create a cohort of `sharing_ids.len()` parties with the given threshold
    pub fn new(threshold: usize, sharing_ids: BTreeMap<IdentityKey, SharingId>) -> Result<Self> {
        if threshold < 2 {
            return Err(Error::InvalidArgument(
                "threshold must be at least 2".into(),
            ));
        }
        if threshold > sharing_ids.len() {
            return Err(Error::InvalidArgument(format!(
                "threshold {} exceeds number of parties {}",
                threshold,
                sharing_ids.len()
            )));
        }
        let mut seen = BTreeSet::new();
        for (identity, id) in &sharing_ids {
            if *id == 0 {
                return Err(Error::InvalidArgument(format!(
                    "party {identity} has sharing id 0"
                )));
            }
            if !seen.insert(*id) {
                return Err(Error::InvalidArgument(format!(
                    "sharing id {id} is assigned twice"
                )));
            }
        }

        Ok(Self {
            threshold,
            sharing_ids,
        })
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Number of parties holding a share
    pub fn size(&self) -> usize {
        self.sharing_ids.len()
    }

    pub fn contains(&self, identity: &IdentityKey) -> bool {
        self.sharing_ids.contains_key(identity)
    }

    pub fn sharing_id(&self, identity: &IdentityKey) -> Option<SharingId> {
        self.sharing_ids.get(identity).copied()
    }

    pub fn sharing_ids(&self) -> &BTreeMap<IdentityKey, SharingId> {
        &self.sharing_ids
    }

    pub fn participants(&self) -> impl Iterator<Item = &IdentityKey> {
        self.sharing_ids.keys()
    }
}

/// Configuration of one protocol run, identical for every participant but `me`
#[derive(Debug, Clone)]
pub struct SessionConfig {
    session_id: SessionId,
    cohort: Cohort,
    me: IdentityKey,
    signers: BTreeSet<IdentityKey>,
}

impl SessionConfig {
    /// Create a session configuration
    ///
    /// `signers` are the parties taking part in this run, `me` must be one of them and all of
    /// them must belong to the cohort.
    pub fn new(
        session_id: SessionId,
        cohort: Cohort,
        me: IdentityKey,
        signers: impl IntoIterator<Item = IdentityKey>,
    ) -> Result<Self> {
        let signers: BTreeSet<_> = signers.into_iter().collect();
        if signers.len() < 2 {
            return Err(Error::InvalidArgument(
                "a session needs at least 2 participants".into(),
            ));
        }
        if let Some(stranger) = signers.iter().find(|id| !cohort.contains(id)) {
            return Err(Error::InvalidArgument(format!(
                "participant {stranger} is not part of the cohort"
            )));
        }
        if !signers.contains(&me) {
            return Err(Error::InvalidArgument(format!(
                "{me} is not among the session participants"
            )));
        }

        Ok(Self {
            session_id,
            cohort,
            me,
            signers,
        })
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn cohort(&self) -> &Cohort {
        &self.cohort
    }

    pub fn me(&self) -> &IdentityKey {
        &self.me
    }

    pub fn signers(&self) -> &BTreeSet<IdentityKey> {
        &self.signers
    }

    /// Session participants other than this party
    pub fn others(&self) -> BTreeSet<IdentityKey> {
        self.signers
            .iter()
            .filter(|id| **id != self.me)
            .cloned()
            .collect()
    }

    /// This party's sharing id
    pub fn my_sharing_id(&self) -> Result<SharingId> {
        self.cohort
            .sharing_id(&self.me)
            .ok_or_else(|| Error::InvalidArgument(format!("{} has no sharing id", self.me)))
    }

    /// Canonical encoding of the participant set `S`, sorted by identity
    pub fn signers_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        for identity in &self.signers {
            bytes.extend_from_slice(&(identity.public_key.len() as u32).to_le_bytes());
            bytes.extend_from_slice(&identity.public_key);
        }
        bytes
    }
}

/// Serde support for group elements, encoded with [`GroupEncoding`](elliptic_curve::group::GroupEncoding)
pub(crate) mod point_serde {
    use elliptic_curve::group::GroupEncoding;
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

    pub fn serialize<P, S>(point: &P, serializer: S) -> Result<S::Ok, S::Error>
    where
        P: GroupEncoding,
        S: Serializer,
    {
        serializer.serialize_bytes(point.to_bytes().as_ref())
    }

    pub fn deserialize<'de, P, D>(deserializer: D) -> Result<P, D::Error>
    where
        P: GroupEncoding,
        D: Deserializer<'de>,
    {
        let bytes: Vec<u8> = Vec::deserialize(deserializer)?;
        let mut repr = P::Repr::default();
        if repr.as_ref().len() != bytes.len() {
            return Err(D::Error::custom("invalid point length"));
        }
        repr.as_mut().copy_from_slice(&bytes);
        Option::<P>::from(P::from_bytes(&repr))
            .ok_or_else(|| D::Error::custom("invalid point encoding"))
    }
}

/// Serde support for scalars, encoded with [`PrimeField::to_repr`](elliptic_curve::ff::PrimeField::to_repr)
pub(crate) mod scalar_serde {
    use elliptic_curve::ff::PrimeField;
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

    pub fn serialize<F, S>(scalar: &F, serializer: S) -> Result<S::Ok, S::Error>
    where
        F: PrimeField,
        S: Serializer,
    {
        serializer.serialize_bytes(scalar.to_repr().as_ref())
    }

    pub fn deserialize<'de, F, D>(deserializer: D) -> Result<F, D::Error>
    where
        F: PrimeField,
        D: Deserializer<'de>,
    {
        let bytes: Vec<u8> = Vec::deserialize(deserializer)?;
        let mut repr = F::Repr::default();
        if repr.as_ref().len() != bytes.len() {
            return Err(D::Error::custom("invalid scalar length"));
        }
        repr.as_mut().copy_from_slice(&bytes);
        Option::<F>::from(F::from_repr(repr))
            .ok_or_else(|| D::Error::custom("scalar is not canonical"))
    }
}
