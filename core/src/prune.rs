//! Shrinking a proof tree down to the attestations actually worth keeping.
//!
//! A freshly upgraded tree tends to accumulate dead weight: redundant
//! attestations of the same chain at different heights, `Pending`
//! attestations a Bitcoin attestation has since superseded, and whole
//! branches that, once their attestations are gone, commit to nothing.
//! Pruning removes all three.

use std::collections::HashSet;

use crate::notary::Attestation;
use crate::timestamp::Timestamp;
use crate::verify::{verify_timestamp, BlockHeaderOracle, EthereumBlockOracle};

/// The set of `(msg, attestation)` pairs that verified successfully against
/// the given oracles, used to decide what [`prune_tree`] may discard.
pub fn verify_all_attestations(
    ts: &Timestamp,
    bitcoin: &impl BlockHeaderOracle,
    ethereum: &impl EthereumBlockOracle,
) -> crate::error::Result<HashSet<(Vec<u8>, Attestation)>> {
    let verified = verify_timestamp(ts, bitcoin, ethereum)?;
    Ok(verified
        .into_iter()
        .map(|v| (v.msg, v.attestation))
        .collect())
}

/// Removes attestations from `ts` (and every descendant) that `keep`
/// rejects. Returns whether anything was actually removed.
pub fn discard_attestations(ts: &mut Timestamp, keep: &dyn Fn(&[u8], &Attestation) -> bool) -> bool {
    let before = ts.attestations.len();
    let msg = ts.msg.clone();
    ts.attestations = ts
        .attestations
        .iter()
        .cloned()
        .filter(|a| keep(&msg, a))
        .collect();
    let mut changed = ts.attestations.len() != before;

    for child in ts.ops.values_mut() {
        changed |= discard_attestations(child, keep);
    }
    changed
}

/// A chain an attestation can anchor to, independent of its height. The two
/// variants are the only ones [`discard_suboptimal`] orders by height;
/// `Pending` and `Unknown` attestations have no "best" to pick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttestationClass {
    Bitcoin,
    Ethereum,
}

fn height_for_class(a: &Attestation, cls: AttestationClass) -> Option<u64> {
    match (cls, a) {
        (AttestationClass::Bitcoin, Attestation::BitcoinBlockHeader { height }) => Some(*height),
        (AttestationClass::Ethereum, Attestation::EthereumBlockHeader { height }) => Some(*height),
        _ => None,
    }
}

/// The best `(height, depth)` among `cls`-attestations anywhere in `ts`,
/// lower height first, shallower depth breaking ties.
fn best_in_subtree(ts: &Timestamp, cls: AttestationClass, depth: usize) -> Option<(u64, usize)> {
    let mut best = ts
        .attestations
        .iter()
        .filter_map(|a| height_for_class(a, cls))
        .map(|height| (height, depth))
        .min();

    for child in ts.ops.values() {
        if let Some(child_best) = best_in_subtree(child, cls, depth + 1) {
            best = Some(match best {
                Some(b) => b.min(child_best),
                None => child_best,
            });
        }
    }
    best
}

/// Removes every `cls`-attestation except the first one (in tree order)
/// matching `best`. Returns whether anything was removed.
fn remove_losers(
    ts: &mut Timestamp,
    cls: AttestationClass,
    depth: usize,
    best: (u64, usize),
    kept: &mut bool,
) -> bool {
    let before = ts.attestations.len();
    ts.attestations = ts
        .attestations
        .iter()
        .cloned()
        .filter(|a| match height_for_class(a, cls) {
            None => true,
            Some(height) => {
                if !*kept && (height, depth) == best {
                    *kept = true;
                    true
                } else {
                    false
                }
            }
        })
        .collect();
    let mut changed = ts.attestations.len() != before;

    for child in ts.ops.values_mut() {
        changed |= remove_losers(child, cls, depth + 1, best, kept);
    }
    changed
}

/// Keeps, per chain, the single best attestation of class `cls` — lower
/// height wins, ties broken by shallower tree depth — removing every other
/// attestation of that class anywhere in `ts`. Returns whether anything
/// changed.
pub fn discard_suboptimal(ts: &mut Timestamp, cls: AttestationClass) -> bool {
    let best = match best_in_subtree(ts, cls, 0) {
        Some(b) => b,
        None => return false,
    };
    let mut kept = false;
    remove_losers(ts, cls, 0, best, &mut kept)
}

/// Post-order walk that drops any child subtree left with no attestations
/// anywhere beneath it. Returns `(is_empty, changed)`: whether `ts` itself
/// is now empty, and whether anything was removed.
pub fn drop_empty_subtrees(ts: &mut Timestamp) -> (bool, bool) {
    let mut changed = false;
    let mut dead_ops = Vec::new();

    for (op, child) in ts.ops.iter_mut() {
        let (child_empty, child_changed) = drop_empty_subtrees(child);
        changed |= child_changed;
        if child_empty {
            dead_ops.push(op.clone());
        }
    }

    if !dead_ops.is_empty() {
        changed = true;
        for op in dead_ops {
            ts.ops.remove(&op);
        }
    }

    let is_empty = ts.attestations.is_empty() && ts.ops.is_empty();
    (is_empty, changed)
}

/// Prunes `ts` down to only attestations present in `verified`, keeps just
/// the single best Bitcoin and single best Ethereum attestation per chain,
/// then drops whatever subtrees that leaves empty.
///
/// Returns `(is_empty, changed)`: whether the whole tree collapsed to
/// nothing, and whether anything was removed at all. A caller that gets
/// `is_empty == true` back should treat the timestamp as having no
/// remaining proof value.
pub fn prune_tree(
    ts: &mut Timestamp,
    verified: &HashSet<(Vec<u8>, Attestation)>,
) -> (bool, bool) {
    let keep = |msg: &[u8], a: &Attestation| verified.contains(&(msg.to_vec(), a.clone()));
    let mut changed = discard_attestations(ts, &keep);
    changed |= discard_suboptimal(ts, AttestationClass::Bitcoin);
    changed |= discard_suboptimal(ts, AttestationClass::Ethereum);
    let (is_empty, dropped_changed) = drop_empty_subtrees(ts);
    changed |= dropped_changed;
    (is_empty, changed)
}
