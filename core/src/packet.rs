//! Length-prefixed sub-packet framing.
//!
//! A packet is a sequence of sub-packets, each `<u8 length><length bytes>`
//! with length 1-255, terminated by a zero-length sub-packet. Splitting a
//! packet's payload into capped sub-packets means a write truncated
//! mid-flight corrupts at most the packet in progress; everything written
//! before it still reads back whole. This is the framing the timestamp log
//! file wraps every record in.

use crate::ser::{Reader, Writer};

const MAX_SUBPACKET_LEN: usize = 255;

/// The result of reading one packet.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReadPacket {
    /// The bytes assembled from sub-packets read before either the
    /// terminator or the stream ran out.
    pub data: Vec<u8>,
    /// Whether the stream ended before the terminating zero-length
    /// sub-packet arrived.
    pub truncated: bool,
}

/// Writes `data` as a sequence of sub-packets followed by the terminator.
pub fn write_packet(w: &mut Writer, data: &[u8]) -> crate::ser::Result<()> {
    if data.is_empty() {
        return w.write_u8(0);
    }
    for chunk in data.chunks(MAX_SUBPACKET_LEN) {
        w.write_u8(chunk.len() as u8)?;
        w.write_bytes(chunk)?;
    }
    w.write_u8(0)
}

/// Reads one packet. Never errors on truncation: a stream that runs out
/// before the terminator reports `truncated: true` with whatever
/// sub-packets were read intact before the cutoff, rather than an `Err`.
pub fn read_packet(r: &mut Reader) -> ReadPacket {
    let mut data = Vec::new();
    loop {
        let len = match r.read_u8() {
            Ok(len) => len,
            Err(_) => {
                return ReadPacket {
                    data,
                    truncated: true,
                }
            }
        };
        if len == 0 {
            return ReadPacket {
                data,
                truncated: false,
            };
        }
        match r.read_fixed_bytes(len as usize) {
            Ok(bytes) => data.extend_from_slice(&bytes),
            Err(_) => {
                return ReadPacket {
                    data,
                    truncated: true,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(data: &[u8]) {
        let bytes = crate::ser::to_vec(|w| write_packet(w, data)).unwrap();
        let mut cursor = &bytes[..];
        let mut r = Reader::new(&mut cursor);
        let packet = read_packet(&mut r);
        assert_eq!(packet.data, data);
        assert!(!packet.truncated);
        r.assert_eof().unwrap();
    }

    #[test]
    fn empty_packet_roundtrips() {
        roundtrip(b"");
    }

    #[test]
    fn small_packet_roundtrips() {
        roundtrip(b"hello, packet");
    }

    #[test]
    fn packet_spanning_multiple_subpackets_roundtrips() {
        let data = vec![0x42u8; 700];
        roundtrip(&data);
    }

    #[test]
    fn packet_exactly_one_subpacket_wide_roundtrips() {
        let data = vec![0x07u8; MAX_SUBPACKET_LEN];
        roundtrip(&data);
    }

    #[test]
    fn arbitrary_partition_of_the_payload_reads_back_whole() {
        // The framing only depends on the payload bytes, not on how a
        // caller assembled them before the single `write_packet` call, so
        // partitioning the same logical string differently should never
        // change what a reader gets back.
        let whole = b"split across several logical write calls".to_vec();
        for split_at in [0, 1, 7, whole.len() / 2, whole.len() - 1, whole.len()] {
            let mut reassembled = Vec::new();
            reassembled.extend_from_slice(&whole[..split_at]);
            reassembled.extend_from_slice(&whole[split_at..]);
            roundtrip(&reassembled);
        }
    }

    #[test]
    fn truncated_mid_subpacket_is_reported_not_raised() {
        let bytes = crate::ser::to_vec(|w| write_packet(w, b"hello world")).unwrap();
        let cut = &bytes[..bytes.len() - 3];
        let mut cursor = cut;
        let mut r = Reader::new(&mut cursor);
        let packet = read_packet(&mut r);
        assert!(packet.truncated);
    }

    #[test]
    fn truncated_before_terminator_is_reported_not_raised() {
        let bytes = crate::ser::to_vec(|w| write_packet(w, b"hi")).unwrap();
        let cut = &bytes[..bytes.len() - 1]; // drop the terminator byte
        let mut cursor = cut;
        let mut r = Reader::new(&mut cursor);
        let packet = read_packet(&mut r);
        assert_eq!(packet.data, b"hi");
        assert!(packet.truncated);
    }

    #[test]
    fn truncated_with_nothing_read_yet_is_reported() {
        let bytes: Vec<u8> = Vec::new();
        let mut cursor = &bytes[..];
        let mut r = Reader::new(&mut cursor);
        let packet = read_packet(&mut r);
        assert!(packet.data.is_empty());
        assert!(packet.truncated);
    }
}
