use ots_core::calendar::{Calendar, UrlWhitelist};
use ots_core::error::{Error, Result};
use ots_core::merkle::{make_merkle_tree, node_at_path};
use ots_core::notary::Attestation;
use ots_core::op::Op;
use ots_core::packet::{read_packet, write_packet};
use ots_core::prune::{
    discard_attestations, discard_suboptimal, drop_empty_subtrees, prune_tree, verify_all_attestations,
    AttestationClass,
};
use ots_core::ser::{self, Reader};
use ots_core::timestamp::Timestamp;
use ots_core::upgrade::{upgrade_timestamp, Cache, CalendarLookup};
use ots_core::verify::{verify_timestamp, BlockHeaderOracle, EthereumBlockOracle};

fn sample_tree() -> Timestamp {
    let mut ts = Timestamp::new(b"root message".to_vec());
    ts.add_attestation(Attestation::Pending {
        uri: "https://a.example/".into(),
    });
    ts.add_op(Op::Sha256)
        .add_attestation(Attestation::BitcoinBlockHeader { height: 10 });
    ts.add_op(Op::Append(b"!".to_vec()))
        .add_attestation(Attestation::Pending {
            uri: "https://b.example/".into(),
        });
    ts
}

// 1. Round-trip.

#[test]
fn round_trip_timestamp_attestation_op() {
    let ts = sample_tree();
    let bytes = ser::to_vec(|w| ts.serialize(w)).unwrap();
    let mut cursor = &bytes[..];
    let mut r = Reader::new(&mut cursor);
    let decoded = Timestamp::deserialize(&mut r, ts.msg.clone()).unwrap();
    r.assert_eof().unwrap();
    assert_eq!(decoded, ts);

    for a in [
        Attestation::Pending {
            uri: "https://x.example/".into(),
        },
        Attestation::BitcoinBlockHeader { height: 99 },
        Attestation::EthereumBlockHeader { height: 5 },
        Attestation::Unknown {
            tag: [1, 2, 3, 4, 5, 6, 7, 8],
            payload: vec![9, 8, 7],
        },
    ] {
        let bytes = ser::to_vec(|w| a.serialize(w)).unwrap();
        let mut cursor = &bytes[..];
        let mut r = Reader::new(&mut cursor);
        assert_eq!(Attestation::deserialize(&mut r).unwrap(), a);
    }

    for op in [
        Op::Append(b"x".to_vec()),
        Op::Prepend(b"y".to_vec()),
        Op::Reverse,
        Op::Hexlify,
        Op::Sha1,
        Op::Ripemd160,
        Op::Sha256,
    ] {
        let bytes = ser::to_vec(|w| op.serialize_payload(w)).unwrap();
        let mut cursor = &bytes[..];
        let mut r = Reader::new(&mut cursor);
        assert_eq!(Op::deserialize_payload(op.tag(), &mut r).unwrap(), op);
    }
}

// 2. Evaluation.

#[test]
fn every_op_edge_evaluates_child_from_parent() {
    let ts = sample_tree();
    fn check(node: &Timestamp) {
        for (op, child) in node.ops.iter() {
            assert_eq!(op.apply(&node.msg), child.msg);
            check(child);
        }
    }
    check(&ts);
}

// 3. Merge laws.

#[test]
fn merge_is_commutative_associative_and_idempotent() {
    let base = Timestamp::new(b"shared".to_vec());

    let mut a = base.clone();
    a.add_attestation(Attestation::Pending {
        uri: "https://a.example/".into(),
    });

    let mut b = base.clone();
    b.add_attestation(Attestation::BitcoinBlockHeader { height: 1 });

    let mut c = base;
    c.add_op(Op::Sha256)
        .add_attestation(Attestation::EthereumBlockHeader { height: 2 });

    let mut ab = a.clone();
    ab.merge(b.clone()).unwrap();
    let mut ba = b.clone();
    ba.merge(a.clone()).unwrap();
    assert_eq!(ab, ba);

    let mut ab_c = ab.clone();
    ab_c.merge(c.clone()).unwrap();

    let mut bc = b.clone();
    bc.merge(c.clone()).unwrap();
    let mut a_bc = a.clone();
    a_bc.merge(bc).unwrap();
    assert_eq!(ab_c, a_bc);

    let mut aa = a.clone();
    aa.merge(a.clone()).unwrap();
    assert_eq!(aa, a);
}

// 4. Merkle.

#[test]
fn single_leaf_merkle_tree_is_identity() {
    let leaf = Timestamp::new(b"solo".to_vec());
    let (leaves, root) = make_merkle_tree(vec![leaf.clone()]).unwrap();
    assert_eq!(leaves.len(), 1);
    assert_eq!(root, leaf.msg);
    assert!(leaves[0].path.is_empty());
}

#[test]
fn every_leaf_reaches_the_tip_with_bounded_path_length() {
    let n = 11;
    let leaves: Vec<Timestamp> = (0..n)
        .map(|i| Timestamp::new(vec![i as u8; 32]))
        .collect();
    let (out, root) = make_merkle_tree(leaves).unwrap();

    let expected_depth = (n as f64).log2().ceil() as usize;
    for leaf in &out {
        let node = node_at_path(&leaf.timestamp, &leaf.path).unwrap();
        assert_eq!(node.msg, root);
        // Each level contributes two ops (combine + hash), so the op-path
        // length should be within one level of ceil(log2(n)).
        let depth = leaf.path.len() / 2;
        assert!(depth as i64 - expected_depth as i64 <= 1);
    }
}

// 5. Bitcoin anchoring — covered in tests/vectors.rs with concrete
// transaction data (anchoring_prefers_the_smallest_containing_transaction,
// anchoring_reports_none_when_nothing_commits).

// 6. Upgrade.

struct NullCache;
impl Cache for NullCache {
    fn get(&self, _commitment: &[u8]) -> Option<Timestamp> {
        None
    }
    fn put(&mut self, _commitment: &[u8], _timestamp: &Timestamp) {}
}

struct NoCalendars;
impl CalendarLookup for NoCalendars {
    fn calendar_for(&self, _uri: &str) -> Option<&dyn Calendar> {
        None
    }
}

struct BitcoinTipCalendar {
    url: String,
    commitment: Vec<u8>,
}
impl Calendar for BitcoinTipCalendar {
    fn submit(&self, _digest: &[u8]) -> Result<Timestamp> {
        unimplemented!()
    }
    fn get_timestamp(&self, commitment: &[u8]) -> Result<Timestamp> {
        if commitment == self.commitment {
            let mut ts = Timestamp::new(commitment.to_vec());
            ts.add_attestation(Attestation::BitcoinBlockHeader { height: 1 });
            Ok(ts)
        } else {
            Err(Error::NotFound)
        }
    }
    fn url(&self) -> &str {
        &self.url
    }
}
struct OneCalendar(BitcoinTipCalendar);
impl CalendarLookup for OneCalendar {
    fn calendar_for(&self, uri: &str) -> Option<&dyn Calendar> {
        if uri == self.0.url {
            Some(&self.0)
        } else {
            None
        }
    }
}

#[test]
fn upgrade_of_a_complete_timestamp_is_a_no_op() {
    let mut ts = Timestamp::new(b"digest".to_vec());
    ts.add_attestation(Attestation::BitcoinBlockHeader { height: 5 });
    let before = ts.clone();

    let wl = UrlWhitelist::new();
    let mut cache = NullCache;
    let changed = upgrade_timestamp(&mut ts, &wl, &NoCalendars, &mut cache).unwrap();
    assert!(!changed);
    assert_eq!(ts, before);
}

#[test]
fn upgrade_against_a_calendar_with_a_bitcoin_tip_completes_the_proof() {
    let mut ts = Timestamp::new(b"digest".to_vec());
    ts.add_attestation(Attestation::Pending {
        uri: "https://cal.example/".into(),
    });

    let wl = UrlWhitelist::from_urls(["https://cal.example/"]).unwrap();
    let lookup = OneCalendar(BitcoinTipCalendar {
        url: "https://cal.example/".into(),
        commitment: b"digest".to_vec(),
    });
    let mut cache = NullCache;

    let changed = upgrade_timestamp(&mut ts, &wl, &lookup, &mut cache).unwrap();
    assert!(changed);
    assert!(ts.is_timestamp_complete());
}

// 7. Prune idempotence.

struct FixedHeader(ots_core::notary::BitcoinBlockHeader);
impl BlockHeaderOracle for FixedHeader {
    fn block_header(&self, _height: u64) -> Result<ots_core::notary::BitcoinBlockHeader> {
        Ok(self.0)
    }
}
struct NoEthereum;
impl EthereumBlockOracle for NoEthereum {
    fn block(&self, _height: u64) -> Result<ots_core::notary::EthereumBlock> {
        Err(Error::NotFound)
    }
}

#[test]
fn pruning_twice_is_idempotent() {
    let digest = Op::Sha256.apply(b"prune me");
    let mut ts = Timestamp::new(digest.clone());
    ts.add_attestation(Attestation::Pending {
        uri: "https://cal.example/".into(),
    });
    ts.add_op(Op::Sha256)
        .add_attestation(Attestation::BitcoinBlockHeader { height: 3 });

    let mut root = [0u8; 32];
    let child_digest = Op::Sha256.apply(&digest);
    root.copy_from_slice(&child_digest);
    let oracle = FixedHeader(ots_core::notary::BitcoinBlockHeader {
        merkle_root: root,
        time: 42,
    });

    let verified = verify_all_attestations(&ts, &oracle, &NoEthereum).unwrap();

    let mut once = ts.clone();
    prune_tree(&mut once, &verified);
    let after_first = once.clone();

    prune_tree(&mut once, &verified);
    assert_eq!(once, after_first);
}

#[test]
fn discard_and_suboptimal_compose_as_prune_tree_does() {
    let mut ts = Timestamp::new(b"x".to_vec());
    ts.add_attestation(Attestation::Pending {
        uri: "https://cal.example/".into(),
    });
    ts.add_op(Op::Reverse);

    let changed_attestations =
        discard_attestations(&mut ts, &|_msg, a| matches!(a, Attestation::BitcoinBlockHeader { .. }));
    let changed_suboptimal = discard_suboptimal(&mut ts, AttestationClass::Bitcoin);
    let (is_empty, changed_subtrees) = drop_empty_subtrees(&mut ts);
    assert!(changed_attestations || changed_suboptimal || changed_subtrees);
    assert!(is_empty);
}

// 8. Packet framing.

#[test]
fn packet_framing_roundtrips_for_any_partition_and_reports_truncation() {
    let strings: Vec<Vec<u8>> = vec![
        b"".to_vec(),
        b"x".to_vec(),
        b"a reasonably sized commitment digest payload".to_vec(),
        vec![0xab; 512],
    ];

    for s in &strings {
        let bytes = ser::to_vec(|w| write_packet(w, s)).unwrap();
        let mut cursor = &bytes[..];
        let mut r = Reader::new(&mut cursor);
        let packet = read_packet(&mut r);
        assert_eq!(&packet.data, s);
        assert!(!packet.truncated);
        r.assert_eof().unwrap();

        if !bytes.is_empty() {
            for cut in 1..bytes.len() {
                let mut cut_cursor = &bytes[..cut];
                let mut cut_r = Reader::new(&mut cut_cursor);
                let cut_packet = read_packet(&mut cut_r);
                assert!(s.starts_with(&cut_packet.data));
                assert!(cut_packet.truncated, "cutting {cut} of {} bytes should be truncated", bytes.len());
            }
        }
    }
}

// 9. URL whitelist.

#[test]
fn whitelist_exact_glob_and_scheme_inference() {
    let wl = UrlWhitelist::from_urls(["https://*.cal.example/submit"]).unwrap();
    assert!(wl.contains("https://alice.cal.example/submit"));
    assert!(wl.contains("http://alice.cal.example/submit"));
    assert!(!wl.contains("https://alice.cal.example/other"));
    assert!(!wl.contains("https://evil.example/submit"));
}

#[test]
fn verify_timestamp_matches_what_prune_considers_verified() {
    let digest = Op::Sha256.apply(b"check me");
    let mut ts = Timestamp::new(digest.clone());
    ts.add_attestation(Attestation::BitcoinBlockHeader { height: 1 });

    let mut root = [0u8; 32];
    root.copy_from_slice(&digest);
    let oracle = FixedHeader(ots_core::notary::BitcoinBlockHeader {
        merkle_root: root,
        time: 7,
    });

    let verified = verify_timestamp(&ts, &oracle, &NoEthereum).unwrap();
    assert_eq!(verified.len(), 1);

    let set = verify_all_attestations(&ts, &oracle, &NoEthereum).unwrap();
    assert!(set.contains(&(digest, Attestation::BitcoinBlockHeader { height: 1 })));
}
