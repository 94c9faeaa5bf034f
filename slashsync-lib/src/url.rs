//! Slashtags URL codec.
//!
//! Identities and feeds are addressed by URLs of the form:
//! - `slash:<id>` for an identity (profile, contacts, slashpay.json)
//! - `slashfeed:<id>` for a feed drive
//!
//! where `<id>` is the z-base-32 encoding of the drive's 32-byte public key.
//! Both forms also accept `//` after the scheme, a trailing `/path`, a
//! `?query` and a `#fragment`.
//!
//! # Examples
//!
//! ```rust
//! use slashsync_lib::url::{parse, Protocol};
//!
//! let id = "y".repeat(52);
//! let url = parse(&format!("slash:{id}/profile.json"))?;
//! assert_eq!(url.protocol, Protocol::Slash);
//! assert_eq!(url.path, "/profile.json");
//! assert_eq!(url.id(), id);
//! # Ok::<(), slashsync_lib::SlashError>(())
//! ```

use std::fmt;
use std::str::FromStr;

use crate::encoding::{zbase32_decode, zbase32_encode};
use crate::{DriveKey, Result, SlashError};

/// URL scheme of a slashtags URL.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Protocol {
    /// `slash:` identity URL.
    Slash,
    /// `slashfeed:` feed URL.
    SlashFeed,
}

impl Protocol {
    /// The scheme including the trailing colon.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Slash => "slash:",
            Self::SlashFeed => "slashfeed:",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed slashtags URL.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlashUrl {
    /// The URL scheme.
    pub protocol: Protocol,
    /// The drive key the URL points at.
    pub key: DriveKey,
    /// Path inside the drive, empty or starting with `/`.
    pub path: String,
    /// Raw query string without the `?`.
    pub query: Option<String>,
    /// Raw fragment without the `#`.
    pub fragment: Option<String>,
}

impl SlashUrl {
    /// Bare URL for a key, no path, query or fragment.
    pub fn new(protocol: Protocol, key: DriveKey) -> Self {
        Self {
            protocol,
            key,
            path: String::new(),
            query: None,
            fragment: None,
        }
    }

    /// The z-base-32 identifier of the key.
    pub fn id(&self) -> String {
        self.key.id()
    }

    /// True for `slash:` URLs.
    pub fn is_identity(&self) -> bool {
        self.protocol == Protocol::Slash
    }
}

impl fmt::Display for SlashUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.protocol, self.id(), self.path)?;
        if let Some(query) = &self.query {
            write!(f, "?{query}")?;
        }
        if let Some(fragment) = &self.fragment {
            write!(f, "#{fragment}")?;
        }
        Ok(())
    }
}

impl FromStr for SlashUrl {
    type Err = SlashError;

    fn from_str(s: &str) -> Result<Self> {
        parse(s)
    }
}

/// Parse a slashtags URL.
///
/// # Errors
///
/// Returns `SlashError::InvalidUrl` for unknown schemes, a missing or
/// malformed identifier, or an identifier that does not decode to 32 bytes.
pub fn parse(url: &str) -> Result<SlashUrl> {
    let input = url.trim();

    let (scheme, rest) = input
        .split_once(':')
        .ok_or_else(|| SlashError::invalid_url(url, "missing scheme"))?;

    let protocol = match scheme.to_ascii_lowercase().as_str() {
        "slash" => Protocol::Slash,
        "slashfeed" => Protocol::SlashFeed,
        other => {
            return Err(SlashError::invalid_url(
                url,
                format!("unsupported protocol '{other}:'"),
            ))
        }
    };

    let rest = rest.strip_prefix("//").unwrap_or(rest);

    let (rest, fragment) = match rest.split_once('#') {
        Some((head, fragment)) => (head, Some(fragment.to_string())),
        None => (rest, None),
    };
    let (rest, query) = match rest.split_once('?') {
        Some((head, query)) => (head, Some(query.to_string())),
        None => (rest, None),
    };
    let (id, path) = match rest.find('/') {
        Some(idx) => rest.split_at(idx),
        None => (rest, ""),
    };

    if id.is_empty() {
        return Err(SlashError::invalid_url(url, "missing identifier"));
    }

    let key = parse_id(id).map_err(|reason| SlashError::invalid_url(url, reason))?;

    Ok(SlashUrl {
        protocol,
        key,
        path: path.to_string(),
        query,
        fragment,
    })
}

/// Non-throwing check that `url` is a valid `slash:` identity URL.
pub fn validate(url: &str) -> bool {
    matches!(parse(url), Ok(parsed) if parsed.protocol == Protocol::Slash)
}

fn parse_id(id: &str) -> std::result::Result<DriveKey, String> {
    let bytes = zbase32_decode(&id.to_ascii_lowercase())
        .ok_or_else(|| format!("identifier '{id}' is not z-base-32"))?;
    let key: [u8; 32] = bytes
        .try_into()
        .map_err(|b: Vec<u8>| format!("identifier decodes to {} bytes, expected 32", b.len()))?;
    Ok(DriveKey(key))
}

/// Encode a key as a bare `slash:` URL string.
pub fn format_identity_url(key: &DriveKey) -> String {
    format!("{}{}", Protocol::Slash, zbase32_encode(key.as_bytes()))
}
