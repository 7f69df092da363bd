//! Relay-driven signing sessions
//!
//! Each driver runs one party's side of a protocol over a [`Relay`], broadcasting its round
//! messages and feeding what it collects back into the state machine. The drivers share the
//! state machines' failure semantics: a peer that stays silent past the relay's timeout ends
//! the session with [`Error::IdentifiableAbort`] naming it. Given an [`Aggregator`], the
//! drivers also check every peer's partial signature and name the sender of a bad one.
//!
//! [`Error::IdentifiableAbort`]: crate::Error::IdentifiableAbort

use std::collections::BTreeMap;

use rand_core::{CryptoRng, RngCore};
use tracing::{debug, info, instrument};

use super::{
    aggregate, peer_inputs, Aggregator, Cosigner, NonInteractiveCosigner, PartialSignature,
    PreGenParticipant, PreGenRound1Broadcast, PreGenRound2Broadcast, PreSignatureBatch,
    Round1Broadcast, Round2Broadcast, Signature,
};
use crate::ciphersuite::Ciphersuite;
use crate::mpc::Relay;
use crate::types::{IdentityKey, SessionConfig};
use crate::{Error, Result};

/// Relay round carrying nonce commitments
const ROUND_COMMIT: u32 = 1;
/// Relay round carrying commitment openings
const ROUND_REVEAL: u32 = 2;
/// Relay round carrying partial signatures
const ROUND_PARTIAL: u32 = 3;

/// Run an interactive signing session to completion
///
/// # Arguments
/// * `cosigner` - This party's cosigner, fresh from [`Cosigner::new`]
/// * `message` - Message to sign
/// * `relay` - Message relay shared by the cosigners
/// * `aggregator` - Checks each partial signature before combining when given
/// * `rng` - Source of the nonce and proof randomness
///
/// # Returns
/// The aggregated signature, verified against the shared public key
#[instrument(skip_all, fields(party = %cosigner.identity()))]
pub async fn run_interactive_signing<C, R, G>(
    mut cosigner: Cosigner<C>,
    message: &[u8],
    relay: &R,
    aggregator: Option<&Aggregator<C>>,
    rng: &mut G,
) -> Result<Signature<C>>
where
    C: Ciphersuite,
    R: Relay,
    G: RngCore + CryptoRng + Send,
{
    let config = cosigner.config().clone();
    let sid = config.session_id();
    let me = config.me();
    let others = config.others();
    info!(cosigners = config.signers().len(), "Starting interactive signing");

    let round1 = cosigner.round1(rng)?;
    relay.broadcast(sid, ROUND_COMMIT, me, &round1).await?;
    let inputs = relay
        .collect_broadcasts::<Round1Broadcast>(sid, ROUND_COMMIT, &others)
        .await?;
    debug!("Collected nonce commitments");

    let round2 = cosigner.round2(&inputs, rng)?;
    relay.broadcast(sid, ROUND_REVEAL, me, &round2).await?;
    let inputs = relay
        .collect_broadcasts::<Round2Broadcast<C>>(sid, ROUND_REVEAL, &others)
        .await?;
    debug!("Collected commitment openings");

    let partial = cosigner.round3(&inputs, message)?;
    let signature = exchange_partial_signatures(
        &config,
        partial,
        &cosigner.public_key(),
        message,
        relay,
        aggregator,
    )
    .await?;

    info!(signature = ?signature, "Interactive signing completed successfully");
    Ok(signature)
}

/// Run a pre-generation session, producing `tau` pre-signatures
#[instrument(skip_all, fields(party = %participant.identity(), tau = participant.tau()))]
pub async fn run_pre_generation<C, R, G>(
    mut participant: PreGenParticipant<C>,
    relay: &R,
    rng: &mut G,
) -> Result<PreSignatureBatch<C>>
where
    C: Ciphersuite,
    R: Relay,
    G: RngCore + CryptoRng + Send,
{
    let config = participant.config().clone();
    let sid = config.session_id();
    let me = config.me();
    let others = config.others();
    info!(participants = config.signers().len(), "Starting pre-generation");

    let round1 = participant.round1(rng)?;
    relay.broadcast(sid, ROUND_COMMIT, me, &round1).await?;
    let inputs = relay
        .collect_broadcasts::<PreGenRound1Broadcast>(sid, ROUND_COMMIT, &others)
        .await?;

    let round2 = participant.round2(&inputs, rng)?;
    relay.broadcast(sid, ROUND_REVEAL, me, &round2).await?;
    let inputs = relay
        .collect_broadcasts::<PreGenRound2Broadcast<C>>(sid, ROUND_REVEAL, &others)
        .await?;

    let batch = participant.round3(&inputs)?;
    info!(pre_signatures = batch.len(), "Pre-generation completed successfully");
    Ok(batch)
}

/// Sign with a pre-signature and exchange partial signatures over the relay
#[instrument(skip_all, fields(party = %cosigner.identity()))]
pub async fn run_noninteractive_signing<C, R>(
    cosigner: NonInteractiveCosigner<C>,
    message: &[u8],
    relay: &R,
    aggregator: Option<&Aggregator<C>>,
) -> Result<Signature<C>>
where
    C: Ciphersuite,
    R: Relay,
{
    let config = cosigner.config().clone();
    let partial = cosigner.produce_partial_signature(message)?;
    let signature = exchange_partial_signatures(
        &config,
        partial,
        &cosigner.public_key(),
        message,
        relay,
        aggregator,
    )
    .await?;

    info!(signature = ?signature, "Non-interactive signing completed successfully");
    Ok(signature)
}

/// Broadcasts our partial signature, collects everyone else's and combines them
async fn exchange_partial_signatures<C, R>(
    config: &SessionConfig,
    partial: PartialSignature<C>,
    public_key: &C::Point,
    message: &[u8],
    relay: &R,
    aggregator: Option<&Aggregator<C>>,
) -> Result<Signature<C>>
where
    C: Ciphersuite,
    R: Relay,
{
    if aggregator.is_some_and(|aggregator| aggregator.public_key() != *public_key) {
        return Err(Error::InvalidArgument(
            "aggregator is for a different public key".into(),
        ));
    }

    let sid = config.session_id();
    relay
        .broadcast(sid, ROUND_PARTIAL, config.me(), &partial)
        .await?;
    let received: BTreeMap<IdentityKey, PartialSignature<C>> = relay
        .collect_broadcasts(sid, ROUND_PARTIAL, &config.others())
        .await?;

    let mut partials: BTreeMap<_, _> = peer_inputs(config, &received)?
        .into_iter()
        .map(|(identity, partial)| (identity.clone(), partial.clone()))
        .collect();
    partials.insert(config.me().clone(), partial);

    match aggregator {
        Some(aggregator) => aggregator.aggregate(message, &partials),
        None => {
            let partials: Vec<_> = partials.into_values().collect();
            let signature = aggregate(&partials)?;
            signature.verify(public_key, message)?;
            Ok(signature)
        }
    }
}
