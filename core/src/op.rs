//! Operations: deterministic byte-transforms forming the edges of a proof
//! tree.
//!
//! Each [`Op`] is a pure, total function from one message to another. The
//! three hash ops are the only ones permitted to start a proof tree's root,
//! since they're the only ones that map an arbitrary-length message to a
//! fixed-length digest (see [`Op::is_cryptographic`]).

use ripemd::Ripemd160;
use sha1::Sha1;
use sha2::{Digest, Sha256};

use crate::ser::{self, Reader, Writer};

/// Maximum length of an `append`/`prepend` payload, per spec.
pub const MAX_APPEND_PREPEND_LEN: u64 = 1 << 20;

const TAG_SHA1: u8 = 0x02;
const TAG_RIPEMD160: u8 = 0x03;
const TAG_SHA256: u8 = 0x08;
const TAG_APPEND: u8 = 0xf0;
const TAG_PREPEND: u8 = 0xf1;
const TAG_REVERSE: u8 = 0xf2;
const TAG_HEXLIFY: u8 = 0xf3;

/// A deterministic byte-transform.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum Op {
    /// Appends `suffix` to the message.
    Append(Vec<u8>),
    /// Prepends `prefix` to the message.
    Prepend(Vec<u8>),
    /// Reverses the message byte-for-byte. Deprecated but must still parse.
    Reverse,
    /// Lowercase-hex-encodes the message. Only used by the git-annex path.
    Hexlify,
    /// SHA1 digest.
    Sha1,
    /// RIPEMD160 digest.
    Ripemd160,
    /// SHA256 digest.
    Sha256,
}

impl Op {
    /// The single-byte wire tag for this op.
    pub fn tag(&self) -> u8 {
        match self {
            Op::Sha1 => TAG_SHA1,
            Op::Ripemd160 => TAG_RIPEMD160,
            Op::Sha256 => TAG_SHA256,
            Op::Append(_) => TAG_APPEND,
            Op::Prepend(_) => TAG_PREPEND,
            Op::Reverse => TAG_REVERSE,
            Op::Hexlify => TAG_HEXLIFY,
        }
    }

    /// The immediate payload bytes, if any. Used both for serialization and
    /// for canonical `(tag, payload)` ordering.
    fn payload(&self) -> &[u8] {
        match self {
            Op::Append(p) | Op::Prepend(p) => p,
            Op::Reverse | Op::Hexlify | Op::Sha1 | Op::Ripemd160 | Op::Sha256 => &[],
        }
    }

    /// Whether this op is a cryptographic hash, i.e. eligible to be the
    /// first op applied to a detached proof's file digest.
    pub fn is_cryptographic(&self) -> bool {
        matches!(self, Op::Sha1 | Op::Ripemd160 | Op::Sha256)
    }

    /// Digest length in bytes, for the hash ops.
    pub fn digest_len(&self) -> Option<usize> {
        match self {
            Op::Sha1 => Some(20),
            Op::Ripemd160 => Some(20),
            Op::Sha256 => Some(32),
            _ => None,
        }
    }

    /// Applies this op to `msg`, producing the child message.
    pub fn apply(&self, msg: &[u8]) -> Vec<u8> {
        match self {
            Op::Append(suffix) => {
                let mut out = Vec::with_capacity(msg.len() + suffix.len());
                out.extend_from_slice(msg);
                out.extend_from_slice(suffix);
                out
            }
            Op::Prepend(prefix) => {
                let mut out = Vec::with_capacity(msg.len() + prefix.len());
                out.extend_from_slice(prefix);
                out.extend_from_slice(msg);
                out
            }
            Op::Reverse => msg.iter().rev().copied().collect(),
            Op::Hexlify => hex::encode(msg).into_bytes(),
            Op::Sha1 => Sha1::digest(msg).to_vec(),
            Op::Ripemd160 => Ripemd160::digest(msg).to_vec(),
            Op::Sha256 => Sha256::digest(msg).to_vec(),
        }
    }

    /// Serializes the tag followed by any payload.
    pub fn serialize(&self, w: &mut Writer) -> ser::Result<()> {
        w.write_u8(self.tag())?;
        self.serialize_payload(w)
    }

    /// Serializes only the payload (assumes the tag was already written).
    pub fn serialize_payload(&self, w: &mut Writer) -> ser::Result<()> {
        match self {
            Op::Append(p) | Op::Prepend(p) => w.write_varbytes(p),
            Op::Reverse | Op::Hexlify | Op::Sha1 | Op::Ripemd160 | Op::Sha256 => Ok(()),
        }
    }

    /// Reads a tag byte and its payload, producing the corresponding `Op`.
    pub fn deserialize(r: &mut Reader) -> ser::Result<Op> {
        let tag = r.read_u8()?;
        Self::deserialize_payload(tag, r)
    }

    /// Reads the payload for an already-consumed `tag` byte.
    pub fn deserialize_payload(tag: u8, r: &mut Reader) -> ser::Result<Op> {
        match tag {
            TAG_SHA1 => Ok(Op::Sha1),
            TAG_RIPEMD160 => Ok(Op::Ripemd160),
            TAG_SHA256 => Ok(Op::Sha256),
            TAG_APPEND => Ok(Op::Append(r.read_varbytes(MAX_APPEND_PREPEND_LEN)?)),
            TAG_PREPEND => Ok(Op::Prepend(r.read_varbytes(MAX_APPEND_PREPEND_LEN)?)),
            TAG_REVERSE => Ok(Op::Reverse),
            TAG_HEXLIFY => Ok(Op::Hexlify),
            other => Err(ser::Error::UnknownTag(vec![other])),
        }
    }
}

/// Ops are ordered by `(tag, payload)` lexicographically: this is the
/// canonical traversal order used whenever a proof tree serializes its
/// `ops` map.
impl Ord for Op {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.tag(), self.payload()).cmp(&(other.tag(), other.payload()))
    }
}

impl PartialOrd for Op {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
