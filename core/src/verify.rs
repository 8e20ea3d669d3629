//! Checking a proof tree's attestations against external sources of truth.

use crate::error::{Error, Result};
use crate::notary::{Attestation, BitcoinBlockHeader, EthereumBlock};
use crate::timestamp::Timestamp;

/// Looks up Bitcoin block headers by height, the one fact a
/// `BitcoinBlockHeader` attestation needs checked against.
pub trait BlockHeaderOracle {
    /// Returns the header at `height`, or
    /// [`crate::error::Error::NotFound`] if the oracle hasn't seen it
    /// (not yet synced, or the height doesn't exist).
    fn block_header(&self, height: u64) -> Result<BitcoinBlockHeader>;
}

/// Looks up Ethereum blocks by height, analogous to [`BlockHeaderOracle`].
pub trait EthereumBlockOracle {
    /// Returns the block at `height`, or
    /// [`crate::error::Error::NotFound`] if the oracle doesn't have it.
    fn block(&self, height: u64) -> Result<EthereumBlock>;
}

/// A single attestation that checked out, with the time it attests to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedAttestation {
    /// The digest this attestation vouches for (the proof node's `msg`).
    pub msg: Vec<u8>,
    /// The attestation itself.
    pub attestation: Attestation,
    /// Seconds since epoch, per the attesting block's own timestamp.
    pub time: u64,
}

/// Checks every `BitcoinBlockHeader`/`EthereumBlockHeader` attestation
/// reachable from `ts` against the given oracles.
///
/// `Pending` and `Unknown` attestations are not verifiable and are skipped.
/// An oracle [`crate::error::Error::NotFound`] (block not yet available) is
/// also skipped rather than treated as failure; any other mismatch —
/// wrong digest, wrong root — is a hard error, since it means the proof is
/// lying about what it attests to.
pub fn verify_timestamp(
    ts: &Timestamp,
    bitcoin: &impl BlockHeaderOracle,
    ethereum: &impl EthereumBlockOracle,
) -> Result<Vec<VerifiedAttestation>> {
    let mut out = Vec::new();
    for (msg, attestation) in ts.all_attestations() {
        match attestation {
            Attestation::BitcoinBlockHeader { height } => {
                match bitcoin.block_header(*height) {
                    Ok(header) => {
                        let time = attestation.verify_against_bitcoin_header(msg, &header)?;
                        out.push(VerifiedAttestation {
                            msg: msg.to_vec(),
                            attestation: attestation.clone(),
                            time,
                        });
                    }
                    Err(Error::NotFound) => continue,
                    Err(e) => return Err(e),
                }
            }
            Attestation::EthereumBlockHeader { height } => {
                match ethereum.block(*height) {
                    Ok(block) => {
                        let time = attestation.verify_against_ethereum_block(msg, &block)?;
                        out.push(VerifiedAttestation {
                            msg: msg.to_vec(),
                            attestation: attestation.clone(),
                            time,
                        });
                    }
                    Err(Error::NotFound) => continue,
                    Err(e) => return Err(e),
                }
            }
            Attestation::Pending { .. } | Attestation::Unknown { .. } => continue,
        }
    }
    Ok(out)
}

/// The earliest time any attestation in `verified` vouches for, i.e. the
/// most conservative claim the proof supports.
pub fn earliest_time(verified: &[VerifiedAttestation]) -> Option<u64> {
    verified.iter().map(|v| v.time).min()
}
