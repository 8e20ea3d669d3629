//! Attestations: declarations that a message existed at or before a
//! specific time, verifiable against an external source or deferred.

use crate::error::{Error, Result};
use crate::ser::{self, Reader, Writer};

/// Length of an attestation's tag, in bytes.
pub const TAG_LEN: usize = 8;

/// Maximum length of an attestation's payload.
pub const MAX_PAYLOAD_LEN: u64 = 8192;

const PENDING_TAG: [u8; TAG_LEN] = [0x83, 0xdf, 0xe3, 0x0d, 0x2e, 0xf9, 0x0c, 0x8e];
const BITCOIN_TAG: [u8; TAG_LEN] = [0x05, 0x88, 0x96, 0x0d, 0x73, 0xd7, 0x19, 0x01];
const ETHEREUM_TAG: [u8; TAG_LEN] = [0x30, 0xfe, 0x80, 0x87, 0xb5, 0xc7, 0xea, 0xd7];

const MAX_URI_LEN: usize = 1000;

/// Characters allowed in a pending attestation's URI: letters, digits, and
/// `-._/:`. Deliberately excludes query/fragment/param syntax.
fn uri_char_allowed(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'/' | b':')
}

/// Validates a URI string against the allowed character set and length
/// limit.
pub fn check_uri(uri: &str) -> Result<()> {
    if uri.len() > MAX_URI_LEN {
        return Err(Error::Deserialization(ser::Error::VarBytesTooLong {
            got: uri.len() as u64,
            max: MAX_URI_LEN as u64,
        }));
    }
    if let Some(bad) = uri.bytes().find(|&b| !uri_char_allowed(b)) {
        return Err(Error::Deserialization(ser::Error::UnknownTag(vec![bad])));
    }
    Ok(())
}

/// A Bitcoin block header, as needed to verify a
/// [`Attestation::BitcoinBlockHeader`].
#[derive(Debug, Clone, Copy)]
pub struct BitcoinBlockHeader {
    /// The header's merkle root.
    pub merkle_root: [u8; 32],
    /// The header's timestamp (`nTime`), seconds since epoch.
    pub time: u64,
}

/// An Ethereum block, as needed to verify a
/// [`Attestation::EthereumBlockHeader`]. Filed under "dubious" upstream;
/// kept opaque beyond the two fields this spec actually checks.
#[derive(Debug, Clone, Copy)]
pub struct EthereumBlock {
    /// The block's transactions root.
    pub transactions_root: [u8; 32],
    /// The block's timestamp, seconds since epoch.
    pub timestamp: u64,
}

/// A declaration that a message existed at or before a specific time.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum Attestation {
    /// Recorded in a remote calendar; a fuller proof may be fetched later
    /// from `uri`.
    Pending {
        /// Calendar URI this attestation's commitment can be looked up at.
        uri: String,
    },
    /// Attested by a Bitcoin block at `height`.
    BitcoinBlockHeader {
        /// Block height.
        height: u64,
    },
    /// Attested by an Ethereum block at `height`. Dubious: parsers must
    /// accept it but this spec makes no claims about its security.
    EthereumBlockHeader {
        /// Block height.
        height: u64,
    },
    /// Forward-compatibility placeholder for a tag this build doesn't
    /// recognize. Serializes bit-exact.
    Unknown {
        /// The unrecognized 8-byte tag.
        tag: [u8; TAG_LEN],
        /// The opaque payload, carried through unchanged.
        payload: Vec<u8>,
    },
}

impl Attestation {
    /// The 8-byte wire tag for this attestation.
    pub fn tag(&self) -> [u8; TAG_LEN] {
        match self {
            Attestation::Pending { .. } => PENDING_TAG,
            Attestation::BitcoinBlockHeader { .. } => BITCOIN_TAG,
            Attestation::EthereumBlockHeader { .. } => ETHEREUM_TAG,
            Attestation::Unknown { tag, .. } => *tag,
        }
    }

    fn payload_bytes(&self) -> Vec<u8> {
        ser::to_vec(|w| self.serialize_payload(w)).expect("in-memory write cannot fail")
    }

    /// Serializes the 8-byte tag followed by a varbytes-framed payload.
    pub fn serialize(&self, w: &mut Writer) -> ser::Result<()> {
        w.write_bytes(&self.tag())?;
        w.write_varbytes(&self.payload_bytes())
    }

    fn serialize_payload(&self, w: &mut Writer) -> ser::Result<()> {
        match self {
            Attestation::Pending { uri } => w.write_varbytes(uri.as_bytes()),
            Attestation::BitcoinBlockHeader { height }
            | Attestation::EthereumBlockHeader { height } => w.write_varuint(*height),
            Attestation::Unknown { payload, .. } => w.write_bytes(payload),
        }
    }

    /// Reads an 8-byte tag and its length-prefixed payload, producing the
    /// corresponding attestation. Unrecognized tags become
    /// [`Attestation::Unknown`] rather than an error.
    pub fn deserialize(r: &mut Reader) -> Result<Attestation> {
        let tag_vec = r.read_fixed_bytes(TAG_LEN)?;
        let mut tag = [0u8; TAG_LEN];
        tag.copy_from_slice(&tag_vec);

        let payload = r.read_varbytes(MAX_PAYLOAD_LEN)?;
        let mut pr_cursor = &payload[..];
        let mut pr = Reader::new(&mut pr_cursor);

        let attestation = if tag == PENDING_TAG {
            let raw = pr.read_varbytes(MAX_URI_LEN as u64)?;
            let uri = String::from_utf8(raw)
                .map_err(|_| Error::Deserialization(ser::Error::TrailingGarbage))?;
            check_uri(&uri)?;
            Attestation::Pending { uri }
        } else if tag == BITCOIN_TAG {
            Attestation::BitcoinBlockHeader {
                height: pr.read_varuint()?,
            }
        } else if tag == ETHEREUM_TAG {
            Attestation::EthereumBlockHeader {
                height: pr.read_varuint()?,
            }
        } else {
            return Ok(Attestation::Unknown { tag, payload });
        };

        // Any attestation with explicitly-specified fields must consume its
        // whole payload; unspecified future fields are the type's job to
        // declare, not ours to silently allow.
        pr.assert_eof()?;
        Ok(attestation)
    }

    /// Verifies a Bitcoin attestation against a block header. `msg` is the
    /// digest this node of the proof tree commits to.
    pub fn verify_against_bitcoin_header(
        &self,
        msg: &[u8],
        header: &BitcoinBlockHeader,
    ) -> Result<u64> {
        match self {
            Attestation::BitcoinBlockHeader { .. } => {
                if msg.len() != 32 {
                    return Err(Error::Verification(format!(
                        "expected 32-byte digest, got {}",
                        msg.len()
                    )));
                }
                if msg != header.merkle_root {
                    return Err(Error::Verification(
                        "digest does not match merkleroot".into(),
                    ));
                }
                Ok(header.time)
            }
            other => Err(Error::Verification(format!(
                "{other:?} is not a Bitcoin attestation"
            ))),
        }
    }

    /// Verifies an Ethereum attestation against a block. Same shape as the
    /// Bitcoin check, against `transactions_root` instead of `merkleroot`.
    pub fn verify_against_ethereum_block(
        &self,
        msg: &[u8],
        block: &EthereumBlock,
    ) -> Result<u64> {
        match self {
            Attestation::EthereumBlockHeader { .. } => {
                if msg.len() != 32 {
                    return Err(Error::Verification(format!(
                        "expected 32-byte digest, got {}",
                        msg.len()
                    )));
                }
                if msg != block.transactions_root {
                    return Err(Error::Verification(
                        "digest does not match transactionsRoot".into(),
                    ));
                }
                Ok(block.timestamp)
            }
            other => Err(Error::Verification(format!(
                "{other:?} is not an Ethereum attestation"
            ))),
        }
    }
}

/// Attestations are ordered by `(tag, payload)` lexicographically.
impl Ord for Attestation {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.tag(), self.payload_bytes()).cmp(&(other.tag(), other.payload_bytes()))
    }
}

impl PartialOrd for Attestation {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
