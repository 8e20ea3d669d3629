//! The append-only timestamp log file.
//!
//! Every record is wrapped in [`crate::packet`] framing, so a crash
//! mid-write leaves all prior records readable and the in-progress one
//! cleanly discarded rather than corrupting the file.

use crate::error::{Error, Result};
use crate::op::Op;
use crate::packet::{read_packet, write_packet};
use crate::ser::{self, Reader, Writer};
use crate::timestamp::Timestamp;

const LOG_MAGIC: &[u8] =
    b"\x00OpenTimestamps\x00\x00Log\x00\xd9\x19\xc5\x3a\x99\xb1\x12\xe9\xa6\xa1\x00";

/// One appended entry: the digest committed, its proof tree, and how many
/// bytes the log itself was before this record was written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub log_length_at_record_time: u64,
    pub digest: Vec<u8>,
    pub timestamp: Timestamp,
}

/// Writes the log file header: magic followed by the cryptographic op tag
/// every record's digest is measured in.
pub fn write_header(w: &mut Writer, file_hash_op: &Op) -> Result<()> {
    if !file_hash_op.is_cryptographic() {
        return Err(Error::Value(
            "file_hash_op must be a cryptographic hash".into(),
        ));
    }
    w.write_bytes(LOG_MAGIC)?;
    w.write_u8(file_hash_op.tag())?;
    Ok(())
}

/// Reads the log file header, returning the file-hash op it names.
pub fn read_header(r: &mut Reader) -> Result<Op> {
    let magic = r.read_fixed_bytes(LOG_MAGIC.len())?;
    if magic != LOG_MAGIC {
        return Err(Error::Deserialization(ser::Error::BadMagic));
    }
    let tag = r.read_u8()?;
    let op = Op::deserialize_payload(tag, r)?;
    if !op.is_cryptographic() {
        return Err(Error::Value(
            "file_hash_op must be a cryptographic hash".into(),
        ));
    }
    Ok(op)
}

/// Appends one packet-framed record.
pub fn write_record(w: &mut Writer, record: &LogRecord) -> Result<()> {
    let body = ser::to_vec(|bw| {
        bw.write_varuint(record.log_length_at_record_time)?;
        bw.write_bytes(&record.digest)?;
        record.timestamp.serialize(bw)
    })?;
    write_packet(w, &body)?;
    Ok(())
}

/// Reads the next record. Returns `Ok(None)` at a clean end of log, and
/// also for a record left truncated by a crash mid-write: packet framing
/// already guarantees everything before it is intact, so a truncated tail
/// is simply treated as "nothing more to read" rather than an error.
pub fn read_record(r: &mut Reader, digest_len: usize) -> Result<Option<LogRecord>> {
    let packet = read_packet(r);
    if packet.truncated || packet.data.is_empty() {
        return Ok(None);
    }

    let mut cursor = &packet.data[..];
    let mut body = Reader::new(&mut cursor);
    let log_length_at_record_time = body.read_varuint()?;
    let digest = body.read_fixed_bytes(digest_len)?;
    let timestamp = Timestamp::deserialize(&mut body, digest.clone())?;
    body.assert_eof()?;

    Ok(Some(LogRecord {
        log_length_at_record_time,
        digest,
        timestamp,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notary::Attestation;

    fn sample_record(n: u8) -> LogRecord {
        let digest = Op::Sha256.apply(&[n]);
        let mut ts = Timestamp::new(digest.clone());
        ts.add_attestation(Attestation::Pending {
            uri: "https://cal.example/".into(),
        });
        LogRecord {
            log_length_at_record_time: n as u64 * 100,
            digest,
            timestamp: ts,
        }
    }

    #[test]
    fn header_roundtrips() {
        let bytes = ser::to_vec(|w| write_header(w, &Op::Sha256)).unwrap();
        let mut cursor = &bytes[..];
        let mut r = Reader::new(&mut cursor);
        assert_eq!(read_header(&mut r).unwrap(), Op::Sha256);
    }

    #[test]
    fn non_cryptographic_hash_op_rejected_as_header() {
        let bytes = ser::to_vec(|w| {
            w.write_bytes(LOG_MAGIC)?;
            w.write_u8(Op::Reverse.tag())
        })
        .unwrap();
        let mut cursor = &bytes[..];
        let mut r = Reader::new(&mut cursor);
        assert!(read_header(&mut r).is_err());
    }

    #[test]
    fn multiple_records_append_and_read_back_in_order() {
        let records = vec![sample_record(1), sample_record(2), sample_record(3)];

        let bytes = ser::to_vec(|w| {
            write_header(w, &Op::Sha256)?;
            for rec in &records {
                write_record(w, rec)?;
            }
            Ok(())
        })
        .unwrap();

        let mut cursor = &bytes[..];
        let mut r = Reader::new(&mut cursor);
        assert_eq!(read_header(&mut r).unwrap(), Op::Sha256);

        let mut read_back = Vec::new();
        while let Some(rec) = read_record(&mut r, 32).unwrap() {
            read_back.push(rec);
        }
        assert_eq!(read_back, records);
    }

    #[test]
    fn truncated_trailing_record_is_silently_dropped() {
        let records = vec![sample_record(1), sample_record(2)];
        let mut bytes = ser::to_vec(|w| {
            write_header(w, &Op::Sha256)?;
            for rec in &records {
                write_record(w, rec)?;
            }
            Ok(())
        })
        .unwrap();
        bytes.truncate(bytes.len() - 4); // chop into the middle of the last record

        let mut cursor = &bytes[..];
        let mut r = Reader::new(&mut cursor);
        read_header(&mut r).unwrap();

        let first = read_record(&mut r, 32).unwrap().unwrap();
        assert_eq!(first, records[0]);

        let second = read_record(&mut r, 32).unwrap();
        assert!(second.is_none());
    }

    #[test]
    fn empty_log_has_no_records() {
        let bytes = ser::to_vec(|w| write_header(w, &Op::Sha256)).unwrap();
        let mut cursor = &bytes[..];
        let mut r = Reader::new(&mut cursor);
        read_header(&mut r).unwrap();
        assert!(read_record(&mut r, 32).unwrap().is_none());
    }
}
