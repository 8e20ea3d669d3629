//! Linking a digest to a Bitcoin block: scanning the block's transactions
//! for one that commits to the digest, then building the proof path from
//! the digest up through that transaction and the block's merkle tree to
//! the block header.

use crate::error::{Error, Result};
use crate::merkle::make_bitcoin_merkle_path;
use crate::notary::Attestation;
use crate::op::Op;
use crate::timestamp::Timestamp;

/// Default ceiling on a candidate transaction's size, per spec. Scanning
/// anything larger is wasted work: a genuine OP_RETURN commitment never
/// needs one.
pub const DEFAULT_MAX_TX_SIZE: usize = 1000;

/// A transaction considered during the scan.
#[derive(Debug, Clone)]
pub struct CandidateTx {
    /// The transaction's raw serialized bytes, in the form they were
    /// broadcast and hashed.
    pub raw: Vec<u8>,
    /// The transaction's txid: double-SHA256 of `raw`, internal byte order.
    pub txid: Vec<u8>,
}

/// Scans `txs` for the smallest transaction whose raw bytes contain
/// `digest` as a contiguous substring, and links `digest` up through that
/// transaction and the block's merkle tree to a `BitcoinBlockHeader`
/// attestation at the root.
///
/// `max_tx_size` bounds how large a candidate transaction is allowed to be;
/// pass [`DEFAULT_MAX_TX_SIZE`] absent a caller-specific override.
///
/// Returns `Ok(None)` if no transaction in the block commits to `digest`.
pub fn make_timestamp_from_block(
    digest: &[u8],
    txs: &[CandidateTx],
    height: u64,
    max_tx_size: usize,
) -> Result<Option<Timestamp>> {
    let mut best: Option<(usize, usize)> = None;

    for (i, tx) in txs.iter().enumerate() {
        if tx.raw.len() > max_tx_size {
            continue;
        }
        if let Some(pos) = find_subslice(&tx.raw, digest) {
            let smaller = match best {
                None => true,
                Some((bi, _)) => tx.raw.len() < txs[bi].raw.len(),
            };
            if smaller {
                best = Some((i, pos));
            }
        }
    }

    let (tx_index, pos) = match best {
        Some(v) => v,
        None => return Ok(None),
    };

    let tx = &txs[tx_index];
    let prefix = tx.raw[..pos].to_vec();
    let suffix = tx.raw[pos + digest.len()..].to_vec();

    let mut ts = Timestamp::new(digest.to_vec());

    let prepend_op = Op::Prepend(prefix);
    let mut mid = Timestamp::new(prepend_op.apply(&ts.msg));

    let append_op = Op::Append(suffix);
    let reconstructed = append_op.apply(&mid.msg);
    if reconstructed != tx.raw {
        return Err(Error::Value(
            "reconstructed transaction does not match the candidate's raw bytes".into(),
        ));
    }

    let txid = Op::Sha256.apply(&Op::Sha256.apply(&reconstructed));
    if txid != tx.txid {
        return Err(Error::Value(
            "reconstructed transaction's txid does not match the candidate's txid".into(),
        ));
    }

    let txids: Vec<Vec<u8>> = txs.iter().map(|t| t.txid.clone()).collect();
    let mut merkle_ts = make_bitcoin_merkle_path(&txids, tx_index)?;
    merkle_ts.add_attestation(Attestation::BitcoinBlockHeader { height });

    let mut tx_node = Timestamp::new(reconstructed);
    let mut first_hash = Timestamp::new(Op::Sha256.apply(&tx_node.msg));
    first_hash.ops.insert(Op::Sha256, merkle_ts);
    tx_node.ops.insert(Op::Sha256, first_hash);
    mid.ops.insert(append_op, tx_node);
    ts.ops.insert(prepend_op, mid);

    Ok(Some(ts))
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}
