//! # Threshold Schnorr Core
//!
//! Threshold Schnorr signing with identifiable abort, following Lindell's three round
//! protocol for Schnorr and EdDSA.
//!
//! This crate provides:
//! - Ciphersuites for secp256k1, Ed25519 and BIP-340 (taproot)
//! - Interactive signing: commit to a nonce, reveal it with a proof of knowledge, sign
//! - Nonce pre-generation in batches followed by non-interactive signing
//! - Aggregation of partial signatures, optionally verifying each of them
//!
//! ## Protocol Overview
//!
//! A threshold sized set of cosigners each commits to `R_i = k_i·G`, then opens the
//! commitment together with a proof of knowledge of `k_i` bound to the session and the
//! cosigning set. Once every opening verifies, each cosigner converts its Shamir share into
//! an additive one and outputs `s_i = k_i + e·d_i`. Any party whose messages fail to verify
//! is named in the resulting [`Error::IdentifiableAbort`].
//!
//! Key generation is out of scope; shares come from any Shamir based DKG.
//!
//! ## Example
//!
//! ```rust,ignore
//! use tschnorr_core::{ciphersuite::Ed25519, sign, SessionConfig};
//!
//! let cosigner = sign::Cosigner::<Ed25519>::new(config, key_share)?;
//! let aggregator = sign::Aggregator::new(cohort, public_key, public_shares)?;
//! let signature =
//!     sign::run_interactive_signing(cosigner, message, &relay, Some(&aggregator), &mut OsRng)
//!         .await?;
//! ```

pub mod ciphersuite;
pub mod error;
pub mod mpc;
pub mod primitives;
pub mod sign;
pub mod types;

#[cfg(test)]
pub(crate) mod test_utils;

pub use ciphersuite::Ciphersuite;
pub use error::{Error, Result};
pub use sign::{PartialSignature, PreSignature, Signature};
pub use types::{Cohort, IdentityKey, SessionConfig, SessionId, SharingId, SigningKeyShare};

/// Protocol version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
