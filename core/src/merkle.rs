//! Merkle tree construction: batching many digests into one commitment.
//!
//! Two variants are needed. [`make_merkle_tree`] is the generic form used to
//! batch independent submissions into a single calendar commitment: pairs
//! are joined with append/prepend plus a single SHA256, and a lone trailing
//! node at an odd level carries up unchanged. [`make_bitcoin_merkle_path`]
//! instead reproduces Bitcoin's own block merkle tree, which uses
//! double-SHA256 and duplicates a lone trailing node against itself (the
//! quirk tracked as CVE-2012-2459) rather than carrying it up.

use rand::Rng;

use crate::error::{Error, Result};
use crate::op::Op;
use crate::timestamp::Timestamp;

/// Length of the random nonce [`nonce_and_batch`] appends to each file
/// digest before hashing, per the stamp workflow.
const NONCE_LEN: usize = 16;

/// One leaf of a batch, after [`make_merkle_tree`] has attached its path up
/// to the shared root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerkleLeaf {
    /// The leaf's own timestamp, now with an op-chain reaching the root
    /// digest attached beneath it.
    pub timestamp: Timestamp,
    /// The op path from `timestamp.msg` down to the root digest. Used by
    /// callers to find the exact node the root's eventual attestation (or
    /// further sub-timestamp, from a calendar) should be merged into.
    pub path: Vec<Op>,
}

/// Looks up the node reached from `root` by following `path`.
pub fn node_at_path<'a>(root: &'a Timestamp, path: &[Op]) -> Option<&'a Timestamp> {
    let mut cur = root;
    for op in path {
        cur = cur.ops.get(op)?;
    }
    Some(cur)
}

/// Mutable counterpart of [`node_at_path`].
pub fn node_at_path_mut<'a>(root: &'a mut Timestamp, path: &[Op]) -> Option<&'a mut Timestamp> {
    let mut cur = root;
    for op in path {
        cur = cur.ops.get_mut(op)?;
    }
    Some(cur)
}

fn insert_single_sha256_step(parent: &mut Timestamp, combine_op: Op) -> Vec<u8> {
    let concat_msg = combine_op.apply(&parent.msg);
    let mut concat_node = Timestamp::new(concat_msg);
    let hash_msg = Op::Sha256.apply(&concat_node.msg);
    concat_node.ops.insert(Op::Sha256, Timestamp::new(hash_msg.clone()));
    parent.ops.insert(combine_op, concat_node);
    hash_msg
}

fn insert_double_sha256_step(parent: &mut Timestamp, combine_op: Op) -> Vec<u8> {
    let concat_msg = combine_op.apply(&parent.msg);
    let mut concat_node = Timestamp::new(concat_msg);
    let first_msg = Op::Sha256.apply(&concat_node.msg);
    let mut first_node = Timestamp::new(first_msg);
    let second_msg = Op::Sha256.apply(&first_node.msg);
    first_node.ops.insert(Op::Sha256, Timestamp::new(second_msg.clone()));
    concat_node.ops.insert(Op::Sha256, first_node);
    parent.ops.insert(combine_op, concat_node);
    second_msg
}

/// Batches `leaves` into a single root digest, attaching each leaf's op path
/// up to that root in place.
///
/// Returns the mutated leaves (each paired with its path to the root) and
/// the root digest. A single leaf is returned unchanged with an empty path.
pub fn make_merkle_tree(leaves: Vec<Timestamp>) -> Result<(Vec<MerkleLeaf>, Vec<u8>)> {
    if leaves.is_empty() {
        return Err(Error::Value(
            "cannot build a merkle tree from zero timestamps".into(),
        ));
    }

    let n = leaves.len();
    let mut timestamps = leaves;
    let mut paths: Vec<Vec<Op>> = vec![Vec::new(); n];
    let mut msgs: Vec<Vec<u8>> = timestamps.iter().map(|t| t.msg.clone()).collect();
    let mut active: Vec<usize> = (0..n).collect();

    while active.len() > 1 {
        let mut next_active = Vec::with_capacity(active.len().div_ceil(2));
        let mut i = 0;
        while i < active.len() {
            if i + 1 < active.len() {
                let li = active[i];
                let ri = active[i + 1];
                let right_msg = msgs[ri].clone();
                let left_msg = msgs[li].clone();

                let left_op = Op::Append(right_msg);
                let node = node_at_path_mut(&mut timestamps[li], &paths[li])
                    .ok_or_else(|| Error::Value("merkle path desync".into()))?;
                let parent_msg = insert_single_sha256_step(node, left_op.clone());
                paths[li].push(left_op);
                paths[li].push(Op::Sha256);
                msgs[li] = parent_msg.clone();

                let right_op = Op::Prepend(left_msg);
                let node = node_at_path_mut(&mut timestamps[ri], &paths[ri])
                    .ok_or_else(|| Error::Value("merkle path desync".into()))?;
                let parent_msg_check = insert_single_sha256_step(node, right_op.clone());
                debug_assert_eq!(parent_msg, parent_msg_check);
                paths[ri].push(right_op);
                paths[ri].push(Op::Sha256);
                msgs[ri] = parent_msg;

                next_active.push(li);
                i += 2;
            } else {
                next_active.push(active[i]);
                i += 1;
            }
        }
        active = next_active;
    }

    let root_msg = msgs[active[0]].clone();
    let leaves_out = timestamps
        .into_iter()
        .zip(paths)
        .map(|(timestamp, path)| MerkleLeaf { timestamp, path })
        .collect();
    Ok((leaves_out, root_msg))
}

/// Extends each file digest with its own random nonce (`append(nonce) ;
/// sha256`) before batching the nonced leaves into one merkle tip.
///
/// The nonce hides the bare file digest from calendar operators and keeps
/// sibling commitments independent even when two files happen to hash the
/// same. Returns one [`MerkleLeaf`] per input, rooted at the *original*
/// file digest (not the nonced hash) with the nonce edge and merkle path
/// already attached beneath it, plus the shared root digest to submit.
pub fn nonce_and_batch(file_digests: &[Vec<u8>]) -> Result<(Vec<MerkleLeaf>, Vec<u8>)> {
    if file_digests.is_empty() {
        return Err(Error::Value(
            "cannot batch zero files into a merkle tip".into(),
        ));
    }

    let mut append_ops = Vec::with_capacity(file_digests.len());
    let mut inner_leaves = Vec::with_capacity(file_digests.len());
    for digest in file_digests {
        let mut nonce = [0u8; NONCE_LEN];
        rand::thread_rng().fill(&mut nonce[..]);
        let append_op = Op::Append(nonce.to_vec());
        let nonced_msg = append_op.apply(digest);
        inner_leaves.push(Timestamp::new(Op::Sha256.apply(&nonced_msg)));
        append_ops.push(append_op);
    }

    let (batched_leaves, root) = make_merkle_tree(inner_leaves)?;

    let leaves_out = file_digests
        .iter()
        .zip(append_ops)
        .zip(batched_leaves)
        .map(|((digest, append_op), batched)| {
            let mut file_ts = Timestamp::new(digest.clone());
            let nonced_msg = append_op.apply(digest);
            let mut nonced_node = Timestamp::new(nonced_msg);
            nonced_node.ops.insert(Op::Sha256, batched.timestamp);
            file_ts.ops.insert(append_op.clone(), nonced_node);

            let mut path = vec![append_op, Op::Sha256];
            path.extend(batched.path);
            MerkleLeaf {
                timestamp: file_ts,
                path,
            }
        })
        .collect();

    Ok((leaves_out, root))
}

/// Builds a timestamp proof linking the transaction at `target_index`
/// within `txids` (internal byte order) up to the block's merkle root,
/// using Bitcoin's own double-SHA256 pairing and self-duplication rule for
/// odd-width levels.
pub fn make_bitcoin_merkle_path(txids: &[Vec<u8>], target_index: usize) -> Result<Timestamp> {
    if txids.is_empty() || target_index >= txids.len() {
        return Err(Error::Value("target index out of range".into()));
    }

    let mut level = txids.to_vec();
    let mut index = target_index;
    let mut ts = Timestamp::new(level[index].clone());
    let mut tip_path: Vec<Op> = Vec::new();

    while level.len() > 1 {
        if level.len() % 2 == 1 {
            level.push(level.last().unwrap().clone());
        }

        let is_left = index % 2 == 0;
        let sibling = level[index ^ 1].clone();
        let combine_op = if is_left {
            Op::Append(sibling)
        } else {
            Op::Prepend(sibling)
        };

        let node = node_at_path_mut(&mut ts, &tip_path)
            .expect("tip_path always tracks the tree built so far");
        insert_double_sha256_step(node, combine_op.clone());
        tip_path.push(combine_op);
        tip_path.push(Op::Sha256);
        tip_path.push(Op::Sha256);

        let mut next = Vec::with_capacity(level.len() / 2);
        for pair in level.chunks(2) {
            let mut concat = pair[0].clone();
            concat.extend_from_slice(&pair[1]);
            let once = Op::Sha256.apply(&concat);
            next.push(Op::Sha256.apply(&once));
        }
        level = next;
        index /= 2;
    }

    Ok(ts)
}
