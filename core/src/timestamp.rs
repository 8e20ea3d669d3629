//! The proof tree: a message, the attestations that vouch for it directly,
//! and the further transformed messages ([`Op`] edges) that vouch for it
//! indirectly.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;

use crate::error::{Error, Result};
use crate::notary::Attestation;
use crate::op::Op;
use crate::ser::{self, Reader, Writer};

const TAG_ATTESTATION: u8 = 0x00;
const TAG_MORE: u8 = 0xff;

/// A node in a timestamp proof tree.
///
/// `msg` is the digest or intermediate value this node commits to.
/// `attestations` vouch for `msg` directly; `ops` map a byte-transform to
/// the sub-timestamp for the transformed message, vouching for `msg`
/// indirectly through whatever attests to the child.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timestamp {
    /// The message this node of the tree is about.
    pub msg: Vec<u8>,
    /// Attestations directly vouching for `msg`.
    pub attestations: BTreeSet<Attestation>,
    /// Child timestamps, keyed by the op that produces the child's message
    /// from `msg`.
    pub ops: BTreeMap<Op, Timestamp>,
}

impl Timestamp {
    /// Creates a bare timestamp with no attestations or children.
    pub fn new(msg: impl Into<Vec<u8>>) -> Self {
        Timestamp {
            msg: msg.into(),
            attestations: BTreeSet::new(),
            ops: BTreeMap::new(),
        }
    }

    /// Adds a direct attestation to this node.
    pub fn add_attestation(&mut self, attestation: Attestation) {
        self.attestations.insert(attestation);
    }

    /// Returns the sub-timestamp reached by applying `op` to this node's
    /// message, inserting a fresh one if none exists yet.
    pub fn add_op(&mut self, op: Op) -> &mut Timestamp {
        let child_msg = op.apply(&self.msg);
        self.ops.entry(op).or_insert_with(|| Timestamp::new(child_msg))
    }

    /// Merges `other` into `self` in place. Both must have the same `msg`;
    /// attestations union and ops merge recursively.
    pub fn merge(&mut self, other: Timestamp) -> Result<()> {
        if self.msg != other.msg {
            return Err(Error::Value(
                "cannot merge timestamps with different messages".into(),
            ));
        }
        self.attestations.extend(other.attestations);
        for (op, other_child) in other.ops {
            match self.ops.get_mut(&op) {
                Some(existing) => existing.merge(other_child)?,
                None => {
                    self.ops.insert(op, other_child);
                }
            }
        }
        Ok(())
    }

    /// All attestations reachable from this node, at any depth.
    pub fn all_attestations(&self) -> Vec<(&[u8], &Attestation)> {
        let mut out = Vec::new();
        self.walk_attestations(&mut out);
        out
    }

    fn walk_attestations<'a>(&'a self, out: &mut Vec<(&'a [u8], &'a Attestation)>) {
        for a in &self.attestations {
            out.push((&self.msg, a));
        }
        for child in self.ops.values() {
            child.walk_attestations(out);
        }
    }

    /// Whether this node or any descendant carries at least one
    /// attestation.
    pub fn is_timestamp_complete(&self) -> bool {
        !self.attestations.is_empty() || self.ops.values().any(Timestamp::is_timestamp_complete)
    }

    /// Sub-timestamps one op away from this node: the direct children,
    /// paired with the op that reaches them. Used by the upgrade engine,
    /// which only ever needs to look one level of indirection ahead.
    pub fn directly_verified(&self) -> impl Iterator<Item = (&Op, &Timestamp)> {
        self.ops.iter()
    }

    /// Visits every node in the tree, including `self`, in pre-order.
    pub fn walk_all<'a>(&'a self, f: &mut impl FnMut(&'a Timestamp)) {
        f(self);
        for child in self.ops.values() {
            child.walk_all(f);
        }
    }

    /// Visits every node mutably, in pre-order.
    pub fn walk_all_mut(&mut self, f: &mut impl FnMut(&mut Timestamp)) {
        f(self);
        for child in self.ops.values_mut() {
            child.walk_all_mut(f);
        }
    }

    /// Serializes this node and everything beneath it, per the
    /// sentinel-delimited tree format: all but the last attestation/op are
    /// preceded by `0xff`; a bare `0x00` tag precedes an attestation, any
    /// other tag byte is an op's own tag.
    pub fn serialize(&self, w: &mut Writer) -> ser::Result<()> {
        if self.attestations.is_empty() && self.ops.is_empty() {
            return Err(ser::Error::Truncation {
                expected: 1,
                got: 0,
            });
        }

        enum Item<'a> {
            Attestation(&'a Attestation),
            Op(&'a Op, &'a Timestamp),
        }

        let items: Vec<Item> = self
            .attestations
            .iter()
            .map(Item::Attestation)
            .chain(self.ops.iter().map(|(op, child)| Item::Op(op, child)))
            .collect();

        for (i, item) in items.iter().enumerate() {
            if i + 1 < items.len() {
                w.write_u8(TAG_MORE)?;
            }
            match item {
                Item::Attestation(a) => {
                    w.write_u8(TAG_ATTESTATION)?;
                    a.serialize(w)?;
                }
                Item::Op(op, child) => {
                    op.serialize(w)?;
                    child.serialize(w)?;
                }
            }
        }

        Ok(())
    }

    /// Deserializes a node whose message is already known to be `msg`
    /// (computed by the caller by applying the parent's op).
    pub fn deserialize(r: &mut Reader, msg: Vec<u8>) -> Result<Timestamp> {
        let mut ts = Timestamp::new(msg);

        let mut tag = r.read_u8()?;
        while tag == TAG_MORE {
            let inner_tag = r.read_u8()?;
            Self::deserialize_one(r, &mut ts, inner_tag)?;
            tag = r.read_u8()?;
        }
        Self::deserialize_one(r, &mut ts, tag)?;

        Ok(ts)
    }

    fn deserialize_one(r: &mut Reader, ts: &mut Timestamp, tag: u8) -> Result<()> {
        if tag == TAG_ATTESTATION {
            ts.attestations.insert(Attestation::deserialize(r)?);
        } else {
            let op = Op::deserialize_payload(tag, r)?;
            let child_msg = op.apply(&ts.msg);
            let child = Timestamp::deserialize(r, child_msg)?;
            ts.ops.insert(op, child);
        }
        Ok(())
    }

    /// Renders this node and its descendants as an indented tree, for
    /// human-readable debugging output (`ots info`).
    pub fn str_tree(&self) -> String {
        let mut out = String::new();
        self.write_str_tree(&mut out, 0);
        out
    }

    fn write_str_tree(&self, out: &mut String, depth: usize) {
        let indent = "    ".repeat(depth);
        let _ = writeln!(out, "{indent}msg: {}", hex::encode(&self.msg));
        for a in &self.attestations {
            let _ = writeln!(out, "{indent}verify {a:?}");
        }
        for (op, child) in &self.ops {
            let _ = writeln!(out, "{indent}{op:?}");
            child.write_str_tree(out, depth + 1);
        }
    }
}

/// A detached proof: the hash op used to digest the original file, plus the
/// proof tree rooted at that digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetachedTimestampFile {
    /// The cryptographic op used to produce `timestamp.msg` from the
    /// original file's bytes.
    pub file_hash_op: Op,
    /// The proof tree, rooted at the file's digest.
    pub timestamp: Timestamp,
}

const HEADER_MAGIC: &[u8] =
    b"\x00OpenTimestamps\x00\x00Proof\x00\xbf\x89\xe2\xe8\x84\xe8\x92\x94\x00";

/// Detached proof files never commit to anything longer than this; the
/// three hash ops top out at 32 bytes, but a little slack is cheap.
const MAX_FILE_DIGEST_LEN: u64 = 64;

impl DetachedTimestampFile {
    /// Builds a fresh detached proof from a file's digest, with an empty
    /// proof tree (a single node, no attestations or ops yet).
    pub fn new(file_hash_op: Op, file_digest: Vec<u8>) -> Result<Self> {
        if !file_hash_op.is_cryptographic() {
            return Err(Error::Value(
                "file_hash_op must be a cryptographic hash".into(),
            ));
        }
        if file_digest.len() as u64 > MAX_FILE_DIGEST_LEN {
            return Err(Error::Value("file digest too long".into()));
        }
        Ok(DetachedTimestampFile {
            file_hash_op,
            timestamp: Timestamp::new(file_digest),
        })
    }

    /// Serializes the magic header, length-prefixed digest, hash op tag,
    /// and proof tree.
    pub fn serialize(&self, w: &mut Writer) -> ser::Result<()> {
        w.write_bytes(HEADER_MAGIC)?;
        w.write_varbytes(&self.timestamp.msg)?;
        w.write_u8(self.file_hash_op.tag())?;
        self.timestamp.serialize(w)
    }

    /// Parses a detached proof file.
    pub fn deserialize(r: &mut Reader) -> Result<Self> {
        let magic = r.read_fixed_bytes(HEADER_MAGIC.len())?;
        if magic != HEADER_MAGIC {
            return Err(Error::Deserialization(ser::Error::BadMagic));
        }
        let msg = r.read_varbytes(MAX_FILE_DIGEST_LEN)?;
        let file_hash_op = Op::deserialize(r)?;
        if !file_hash_op.is_cryptographic() {
            return Err(Error::Value(
                "file_hash_op must be a cryptographic hash".into(),
            ));
        }
        let timestamp = Timestamp::deserialize(r, msg)?;
        Ok(DetachedTimestampFile {
            file_hash_op,
            timestamp,
        })
    }
}
