use crate::models::TIMESTAMP_FORMAT;
use chrono::{DateTime, Local, TimeZone};
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha1::Sha1;

type HmacSha1 = Hmac<Sha1>;

/// Per-call `AuthenticationHeader`.
///
/// The remote side checks `requestTimestamp` against a tolerance window, so a
/// header must be built immediately before each call and never reused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthHeader {
    #[serde(rename = "mktowsUserId")]
    pub user_id: String,
    #[serde(rename = "requestSignature")]
    pub signature: String,
    #[serde(rename = "requestTimestamp")]
    pub timestamp: String,
}

impl AuthHeader {
    /// Builds a header signed at the current local time.
    pub fn build(user_id: &str, secret: &str) -> Self {
        Self::build_at(user_id, secret, &Local::now())
    }

    /// Builds a header signed at `at`.
    pub fn build_at<Tz>(user_id: &str, secret: &str, at: &DateTime<Tz>) -> Self
    where
        Tz: TimeZone,
        Tz::Offset: std::fmt::Display,
    {
        let timestamp = at.format(TIMESTAMP_FORMAT).to_string();
        let signature = sign(secret, &timestamp, user_id);

        Self {
            user_id: user_id.to_string(),
            signature,
            timestamp,
        }
    }
}

/// Lowercase hex HMAC-SHA1 of `timestamp || user_id` keyed by `secret`.
pub fn sign(secret: &str, timestamp: &str, user_id: &str) -> String {
    let mut mac =
        HmacSha1::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(timestamp.as_bytes());
    mac.update(user_id.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}
