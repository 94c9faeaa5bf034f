//! Byte encodings used on drives and in URLs.
//!
//! - z-base-32 for drive identifiers (`slash:<id>`)
//! - JSON documents stored as drive files, with a fallback for the legacy
//!   length-prefixed layout older clients wrote
//! - `data:` URLs for binary attachments such as profile images

use base64::Engine;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::{Result, SlashError};

/// Encode bytes as z-base-32.
///
/// ```
/// use slashsync_lib::encoding::zbase32_encode;
///
/// assert_eq!(zbase32_encode(&[0xf0, 0xbf, 0xc7]), "6n9hq");
/// ```
pub fn zbase32_encode(bytes: &[u8]) -> String {
    z32::encode(bytes)
}

/// Decode a z-base-32 string.
///
/// Returns `None` for characters outside the alphabet and for non-canonical
/// input (non-zero trailing bits), so every byte string has exactly one
/// accepted encoding.
pub fn zbase32_decode(input: &str) -> Option<Vec<u8>> {
    let bytes = z32::decode(input.as_bytes()).ok()?;
    (z32::encode(&bytes) == input).then_some(bytes)
}

/// Encode a value as a JSON drive file.
pub fn encode_json<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(value)?)
}

/// Decode a JSON drive file.
///
/// # Semantics
/// - `None` or an empty buffer decodes to `Ok(None)`.
/// - Plain JSON is tried first, then the legacy length-prefixed string layout.
/// - Anything else is `SlashError::DecodeFailed`; callers treat that as absence.
pub fn decode_json<T: DeserializeOwned>(path: &str, bytes: Option<&[u8]>) -> Result<Option<T>> {
    let bytes = match bytes {
        Some(b) if !b.is_empty() => b,
        _ => return Ok(None),
    };

    match serde_json::from_slice(bytes) {
        Ok(value) => Ok(Some(value)),
        Err(err) => match decode_legacy_json(bytes) {
            Some(text) => serde_json::from_str(text)
                .map(Some)
                .map_err(|e| SlashError::decode_failed(path, e)),
            None => Err(SlashError::decode_failed(path, err)),
        },
    }
}

/// Strip the varint length prefix from a legacy JSON file.
///
/// The prefix is a compact unsigned int: one byte below `0xfd`, otherwise a
/// marker byte followed by a little-endian u16/u32/u64.
fn decode_legacy_json(bytes: &[u8]) -> Option<&str> {
    let (&first, rest) = bytes.split_first()?;
    let (len, body) = match first {
        0xfd => {
            let (n, body) = rest.split_at_checked(2)?;
            (u16::from_le_bytes(n.try_into().ok()?) as u64, body)
        }
        0xfe => {
            let (n, body) = rest.split_at_checked(4)?;
            (u32::from_le_bytes(n.try_into().ok()?) as u64, body)
        }
        0xff => {
            let (n, body) = rest.split_at_checked(8)?;
            (u64::from_le_bytes(n.try_into().ok()?), body)
        }
        n => (u64::from(n), rest),
    };

    let len = usize::try_from(len).ok()?;
    let text = body.get(..len)?;
    std::str::from_utf8(text).ok()
}

/// Guess a mime type from a drive path's extension.
pub fn mime_type(path: &str) -> String {
    mime_guess::from_path(path)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

/// Build a `data:` URL for a file read from a drive.
pub fn to_data_url(path: &str, bytes: &[u8]) -> String {
    let payload = base64::engine::general_purpose::STANDARD.encode(bytes);
    format!("data:{};base64,{}", mime_type(path), payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn test_zbase32_known_vectors() {
        assert_eq!(zbase32_encode(&[0xf0, 0xbf, 0xc7]), "6n9hq");
        assert_eq!(zbase32_encode(&[0xd4, 0x7a, 0x04]), "4t7ye");
        assert_eq!(zbase32_decode("6n9hq"), Some(vec![0xf0, 0xbf, 0xc7]));
    }

    #[test]
    fn test_zbase32_key_length() {
        let id = zbase32_encode(&[0u8; 32]);
        assert_eq!(id.len(), 52);
        assert_eq!(zbase32_decode(&id), Some(vec![0u8; 32]));
    }

    #[test]
    fn test_zbase32_rejects_non_canonical() {
        // last character carries non-zero padding bits
        let mut id = zbase32_encode(&[0u8; 32]);
        id.pop();
        id.push('b');
        assert_eq!(zbase32_decode(&id), None);
        assert_eq!(zbase32_decode("0000"), None);
    }

    #[test]
    fn test_decode_json_plain() {
        let decoded: Option<Value> = decode_json("/x.json", Some(br#"{"a":1}"#)).unwrap();
        assert_eq!(decoded, Some(serde_json::json!({"a": 1})));
    }

    #[test]
    fn test_decode_json_empty_is_absent() {
        assert_eq!(decode_json::<Value>("/x", None).unwrap(), None);
        assert_eq!(decode_json::<Value>("/x", Some(b"")).unwrap(), None);
    }

    #[test]
    fn test_decode_json_legacy_prefix() {
        let body = br#"[{"type":"p2wpkh","value":"bc1q"}]"#;
        let mut legacy = vec![body.len() as u8];
        legacy.extend_from_slice(body);

        let decoded: Option<Value> = decode_json("/slashpay.json", Some(&legacy)).unwrap();
        assert_eq!(decoded.unwrap()[0]["value"], "bc1q");
    }

    #[test]
    fn test_decode_json_garbage() {
        let err = decode_json::<Value>("/profile.json", Some(b"\x02{")).unwrap_err();
        assert!(matches!(err, SlashError::DecodeFailed { .. }));
    }

    #[test]
    fn test_data_url() {
        assert_eq!(to_data_url("/images/me.PNG", b"hi"), "data:image/png;base64,aGk=");
        assert_eq!(mime_type("/blob"), "application/octet-stream");
        assert_eq!(mime_type("/avatar.svg"), "image/svg+xml");
        assert_eq!(mime_type("/profile.json"), "application/json");
    }
}
