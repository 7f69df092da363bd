//! Building blocks shared by the signing protocols
//!
//! * [`commitment`] - hash commitments with a random witness
//! * [`dlog`] - non-interactive proof of knowledge of a discrete logarithm
//! * [`sharing`] - Shamir to additive share conversion
//! * [`transcript`] - Fiat-Shamir transcripts

pub mod commitment;
pub mod dlog;
pub mod sharing;
pub mod transcript;

pub use commitment::{Commitment, Witness};
pub use dlog::DlogProof;
pub use sharing::{lagrange_coefficient, to_additive};
pub use transcript::Transcript;
