//! The upgrade engine: walking a proof tree for `Pending` attestations and
//! asking the calendars they point at whether a fuller proof exists yet.

use std::collections::HashSet;

use crate::calendar::{Calendar, UrlWhitelist};
use crate::error::Result;
use crate::notary::Attestation;
use crate::timestamp::Timestamp;

/// A place to remember commitments a calendar has already confirmed, so
/// repeated upgrade runs don't re-fetch proofs that can no longer change.
pub trait Cache {
    /// Returns a cached sub-timestamp for `commitment`, if one is stored.
    fn get(&self, commitment: &[u8]) -> Option<Timestamp>;
    /// Stores a sub-timestamp for `commitment`.
    fn put(&mut self, commitment: &[u8], timestamp: &Timestamp);
}

/// Resolves a `Pending` attestation's URI to the calendar client that talks
/// to it, if the caller has one configured.
pub trait CalendarLookup {
    /// Returns the calendar client for `uri`, if any.
    fn calendar_for(&self, uri: &str) -> Option<&dyn Calendar>;
}

/// Walks `ts` for `Pending` attestations whose URI is whitelisted, fetches
/// any fuller proof the calendar now has, and merges it in.
///
/// Returns whether anything in the tree changed. A calendar URI that isn't
/// whitelisted, or that returns [`crate::error::Error::NotFound`], is
/// skipped without being treated as an error; anything else propagates.
/// A URI that comes back `NotFound` is remembered only for the lifetime of
/// this call, so a later run will still retry it.
pub fn upgrade_timestamp(
    ts: &mut Timestamp,
    whitelist: &UrlWhitelist,
    calendars: &impl CalendarLookup,
    cache: &mut impl Cache,
) -> Result<bool> {
    let mut changed = false;
    let mut misses_this_run: HashSet<(String, Vec<u8>)> = HashSet::new();
    upgrade_node(ts, whitelist, calendars, cache, &mut misses_this_run, &mut changed)?;
    Ok(changed)
}

fn upgrade_node(
    node: &mut Timestamp,
    whitelist: &UrlWhitelist,
    calendars: &impl CalendarLookup,
    cache: &mut impl Cache,
    misses_this_run: &mut HashSet<(String, Vec<u8>)>,
    changed: &mut bool,
) -> Result<()> {
    let pending_uris: Vec<String> = node
        .attestations
        .iter()
        .filter_map(|a| match a {
            Attestation::Pending { uri } => Some(uri.clone()),
            _ => None,
        })
        .collect();

    for uri in pending_uris {
        if !whitelist.contains(&uri) {
            continue;
        }
        let key = (uri.clone(), node.msg.clone());
        if misses_this_run.contains(&key) {
            continue;
        }

        if let Some(cached) = cache.get(&node.msg) {
            let before = (node.attestations.len(), node.ops.len());
            node.merge(cached)?;
            if (node.attestations.len(), node.ops.len()) != before {
                *changed = true;
            }
            continue;
        }

        let calendar = match calendars.calendar_for(&uri) {
            Some(c) => c,
            None => continue,
        };

        match calendar.get_timestamp(&node.msg) {
            Ok(fetched) => {
                let before = (node.attestations.len(), node.ops.len());
                cache.put(&node.msg, &fetched);
                node.merge(fetched)?;
                if (node.attestations.len(), node.ops.len()) != before {
                    *changed = true;
                }
            }
            Err(crate::error::Error::NotFound) => {
                misses_this_run.insert(key);
            }
            Err(e) => {
                log::warn!("upgrade: calendar {uri} failed: {e}");
                misses_this_run.insert(key);
            }
        }
    }

    for child in node.ops.values_mut() {
        upgrade_node(child, whitelist, calendars, cache, misses_this_run, changed)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::HashMap;

    use super::*;
    use crate::op::Op;

    struct FakeCalendar {
        url: String,
        responses: HashMap<Vec<u8>, Timestamp>,
    }

    impl Calendar for FakeCalendar {
        fn submit(&self, _digest: &[u8]) -> Result<Timestamp> {
            unimplemented!("not exercised by upgrade tests")
        }

        fn get_timestamp(&self, commitment: &[u8]) -> Result<Timestamp> {
            self.responses
                .get(commitment)
                .cloned()
                .ok_or(crate::error::Error::NotFound)
        }

        fn url(&self) -> &str {
            &self.url
        }
    }

    struct FakeLookup(Vec<FakeCalendar>);

    impl CalendarLookup for FakeLookup {
        fn calendar_for(&self, uri: &str) -> Option<&dyn Calendar> {
            self.0
                .iter()
                .find(|c| c.url == uri)
                .map(|c| c as &dyn Calendar)
        }
    }

    #[derive(Default)]
    struct MemCache(RefCell<HashMap<Vec<u8>, Timestamp>>);

    impl Cache for MemCache {
        fn get(&self, commitment: &[u8]) -> Option<Timestamp> {
            self.0.borrow().get(commitment).cloned()
        }
        fn put(&mut self, commitment: &[u8], timestamp: &Timestamp) {
            self.0.borrow_mut().insert(commitment.to_vec(), timestamp.clone());
        }
    }

    fn whitelist_with(uri: &str) -> UrlWhitelist {
        UrlWhitelist::from_urls([uri]).unwrap()
    }

    #[test]
    fn merges_fresh_attestation_from_calendar() {
        let mut ts = Timestamp::new(b"digest".to_vec());
        ts.add_attestation(Attestation::Pending {
            uri: "https://cal.example/".into(),
        });

        let mut response = Timestamp::new(b"digest".to_vec());
        response.add_attestation(Attestation::BitcoinBlockHeader { height: 123 });

        let mut responses = HashMap::new();
        responses.insert(b"digest".to_vec(), response);
        let lookup = FakeLookup(vec![FakeCalendar {
            url: "https://cal.example/".into(),
            responses,
        }]);

        let wl = whitelist_with("https://cal.example/");
        let mut cache = MemCache::default();

        let changed = upgrade_timestamp(&mut ts, &wl, &lookup, &mut cache).unwrap();
        assert!(changed);
        assert!(ts
            .attestations
            .contains(&Attestation::BitcoinBlockHeader { height: 123 }));
    }

    #[test]
    fn unwhitelisted_uri_is_left_alone() {
        let mut ts = Timestamp::new(b"digest".to_vec());
        ts.add_attestation(Attestation::Pending {
            uri: "https://untrusted.example/".into(),
        });

        let lookup = FakeLookup(vec![]);
        let wl = whitelist_with("https://cal.example/");
        let mut cache = MemCache::default();

        let changed = upgrade_timestamp(&mut ts, &wl, &lookup, &mut cache).unwrap();
        assert!(!changed);
    }

    #[test]
    fn not_found_leaves_tree_unchanged_without_erroring() {
        let mut ts = Timestamp::new(b"digest".to_vec());
        ts.add_attestation(Attestation::Pending {
            uri: "https://cal.example/".into(),
        });

        let lookup = FakeLookup(vec![FakeCalendar {
            url: "https://cal.example/".into(),
            responses: HashMap::new(),
        }]);
        let wl = whitelist_with("https://cal.example/");
        let mut cache = MemCache::default();

        let changed = upgrade_timestamp(&mut ts, &wl, &lookup, &mut cache).unwrap();
        assert!(!changed);
    }

    #[test]
    fn recurses_into_child_ops() {
        let mut ts = Timestamp::new(b"digest".to_vec());
        ts.add_op(Op::Sha256).add_attestation(Attestation::Pending {
            uri: "https://cal.example/".into(),
        });
        let child_msg = Op::Sha256.apply(b"digest");

        let mut response = Timestamp::new(child_msg.clone());
        response.add_attestation(Attestation::BitcoinBlockHeader { height: 1 });
        let mut responses = HashMap::new();
        responses.insert(child_msg, response);

        let lookup = FakeLookup(vec![FakeCalendar {
            url: "https://cal.example/".into(),
            responses,
        }]);
        let wl = whitelist_with("https://cal.example/");
        let mut cache = MemCache::default();

        let changed = upgrade_timestamp(&mut ts, &wl, &lookup, &mut cache).unwrap();
        assert!(changed);
    }
}
