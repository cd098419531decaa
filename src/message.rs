//! Message headers, body decoding and link extraction

use crate::error::{Error, Result};
use chrono::{DateTime, FixedOffset};
use mailparse::{MailAddr, MailHeaderMap};
use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

static HTTPS_HOST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"https://([A-Za-z0-9.-]+)").expect("valid link regex")
});

static CONFIRMATION_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"https://[^\s/]+/s/[\w-]+").expect("valid confirmation regex")
});

/// A successful mailbox search result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailMatch {
    pub uid: u32,
    pub subject: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,
    /// Raw message source, kept for searches that inspect the body.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

/// One message fetched during a polling iteration.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub uid: u32,
    pub date: Option<DateTime<FixedOffset>>,
    pub subject: String,
    /// Display name of the first From address, falling back to the
    /// bare address when no name is given.
    pub sender: String,
    pub source: String,
    /// Everything after the header block.
    pub body: String,
}

impl Candidate {
    /// Parse the headers of a raw RFC 2822 message.
    pub fn parse(uid: u32, raw: &[u8]) -> Result<Self> {
        let (headers, body_start) = mailparse::parse_headers(raw)
            .map_err(|e| Error::Parse(format!("UID {uid}: {e}")))?;

        let subject = headers.get_first_value("Subject").unwrap_or_default();
        let date = headers
            .get_first_value("Date")
            .and_then(|d| DateTime::parse_from_rfc2822(d.trim()).ok());
        let sender = headers
            .get_first_header("From")
            .and_then(|h| mailparse::addrparse_header(h).ok())
            .and_then(|list| list.iter().find_map(display_name))
            .unwrap_or_default();

        Ok(Self {
            uid,
            date,
            subject,
            sender,
            source: String::from_utf8_lossy(raw).into_owned(),
            body: String::from_utf8_lossy(raw.get(body_start..).unwrap_or_default()).into_owned(),
        })
    }
}

fn display_name(addr: &MailAddr) -> Option<String> {
    match addr {
        MailAddr::Single(info) => Some(
            info.display_name
                .clone()
                .unwrap_or_else(|| info.addr.clone()),
        ),
        MailAddr::Group(group) => group
            .addrs
            .first()
            .map(|info| info.display_name.clone().unwrap_or_else(|| info.addr.clone())),
    }
}

/// Case-insensitive substring test.
#[must_use]
pub fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_uppercase().contains(&needle.to_uppercase())
}

/// Decode a quoted-printable body.
///
/// Soft line breaks (`=\r\n` and `=\n`) are removed and `=XX` escapes
/// become raw bytes; the result is read as UTF-8. Malformed escapes
/// pass through untouched.
#[must_use]
pub fn decode_quoted_printable(encoded: &str) -> String {
    let bytes = encoded.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != b'=' {
            out.push(bytes[i]);
            i += 1;
            continue;
        }

        match &bytes[i + 1..] {
            [b'\r', b'\n', ..] => i += 3,
            [b'\n', ..] => i += 2,
            [hi, lo, ..] if hi.is_ascii_hexdigit() && lo.is_ascii_hexdigit() => {
                out.push((hex_value(*hi) << 4) | hex_value(*lo));
                i += 3;
            }
            _ => {
                out.push(b'=');
                i += 1;
            }
        }
    }

    String::from_utf8_lossy(&out).into_owned()
}

const fn hex_value(digit: u8) -> u8 {
    match digit {
        b'0'..=b'9' => digit - b'0',
        b'a'..=b'f' => digit - b'a' + 10,
        _ => digit - b'A' + 10,
    }
}

/// True if `body` links over HTTPS to a host containing `portal_name`.
#[must_use]
pub fn has_portal_link(body: &str, portal_name: &str) -> bool {
    let expected = portal_name.to_lowercase();
    HTTPS_HOST
        .captures_iter(body)
        .any(|caps| caps[1].to_lowercase().contains(&expected))
}

/// First confirmation link (`https://<host>/s/<token>`) in `body`.
#[must_use]
pub fn find_confirmation_link(body: &str) -> Option<String> {
    CONFIRMATION_LINK
        .find(body)
        .map(|m| m.as_str().to_string())
}
