//! HTTP transport for the OpenTimestamps calendar protocol.
//!
//! A calendar speaks a small binary protocol over HTTP: `POST /digest` with
//! the raw commitment digest as the body submits it, and `GET
//! /timestamp/<hex digest>` fetches whatever proof the calendar has
//! accumulated so far. Both return a serialized [`Timestamp`] body.
//!
//! [`ots_core::calendar::Calendar`] is synchronous by design, so this uses
//! `reqwest`'s blocking client; the concurrent fan-out across many
//! calendars (spec'd as one task per URL) happens one layer up, in
//! `ots-cli`, via `tokio::task::spawn_blocking` around each call.

use std::time::Duration;

use ots_core::calendar::Calendar;
use ots_core::error::{Error, Result};
use ots_core::ser::Reader;
use ots_core::timestamp::Timestamp;
use reqwest::blocking::{Client, Response};
use tracing::{debug, warn};

/// Calendars never return a body larger than this; enforced before the
/// response body is buffered into memory, on top of whatever limit the
/// server itself claims to apply.
pub const MAX_RESPONSE_SIZE: u64 = 10_000;

const USER_AGENT: &str = concat!("ots-calendar/", env!("CARGO_PKG_VERSION"));
const ACCEPT_HEADER: &str = "application/vnd.opentimestamps.v1";

/// A [`Calendar`] reached over HTTP.
pub struct HttpCalendar {
    url: String,
    client: Client,
}

impl HttpCalendar {
    /// Builds a client for the calendar at `url` (e.g.
    /// `"https://alice.btc.calendar.opentimestamps.org"`).
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| Error::Io(e.to_string()))?;
        Ok(HttpCalendar {
            url: url.into(),
            client,
        })
    }

    fn base_url(&self) -> &str {
        self.url.trim_end_matches('/')
    }

    fn decode_response(&self, msg: Vec<u8>, resp: Response) -> Result<Timestamp> {
        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(Error::NotFound);
        }
        if !status.is_success() {
            return Err(Error::Io(format!(
                "calendar {} returned HTTP {status}",
                self.url
            )));
        }

        let body = resp.bytes().map_err(|e| Error::Io(e.to_string()))?;
        if body.len() as u64 > MAX_RESPONSE_SIZE {
            return Err(Error::Value(format!(
                "calendar {} response of {} bytes exceeds the {MAX_RESPONSE_SIZE}-byte cap",
                self.url,
                body.len()
            )));
        }

        let mut cursor: &[u8] = &body;
        let mut r = Reader::new(&mut cursor);
        let timestamp = Timestamp::deserialize(&mut r, msg)?;
        r.assert_eof()?;
        Ok(timestamp)
    }
}

impl Calendar for HttpCalendar {
    fn submit(&self, digest: &[u8]) -> Result<Timestamp> {
        debug!(calendar = %self.url, digest = %hex::encode(digest), "submitting digest");
        let resp = self
            .client
            .post(format!("{}/digest", self.base_url()))
            .header(reqwest::header::ACCEPT, ACCEPT_HEADER)
            .body(digest.to_vec())
            .send()
            .map_err(|e| {
                warn!(calendar = %self.url, error = %e, "submit request failed");
                Error::Io(e.to_string())
            })?;
        self.decode_response(digest.to_vec(), resp)
    }

    fn get_timestamp(&self, commitment: &[u8]) -> Result<Timestamp> {
        debug!(calendar = %self.url, commitment = %hex::encode(commitment), "fetching timestamp");
        let resp = self
            .client
            .get(format!(
                "{}/timestamp/{}",
                self.base_url(),
                hex::encode(commitment)
            ))
            .header(reqwest::header::ACCEPT, ACCEPT_HEADER)
            .send()
            .map_err(|e| Error::Io(e.to_string()))?;
        self.decode_response(commitment.to_vec(), resp)
    }

    fn url(&self) -> &str {
        &self.url
    }
}
