//! Encoding-name resolution and byte/string conversion.
//!
//! Callers hand in an encoding label (an IANA charset name such as `utf-8`
//! or `ISO-8859-1`); `encoding_rs` resolves the label and performs the
//! conversion.

use crate::Error;

/// Resolve an encoding label to its encoding, case-insensitively.
pub fn resolve(label: &str) -> Result<&'static encoding_rs::Encoding, Error> {
    encoding_rs::Encoding::for_label(label.as_bytes())
        .ok_or_else(|| Error::UnsupportedEncoding(label.to_string()))
}

/// Decode bytes strictly; malformed sequences are an error.
pub fn decode(bytes: &[u8], label: &str) -> Result<String, Error> {
    let encoding = resolve(label)?;
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        return Err(Error::Decode(label.to_string()));
    }
    Ok(text.into_owned())
}

/// Decode bytes leniently; malformed sequences become replacement characters.
pub fn decode_lossy(bytes: &[u8], label: &str) -> Result<String, Error> {
    let encoding = resolve(label)?;
    let (text, _, _) = encoding.decode(bytes);
    Ok(text.into_owned())
}

/// Encode a string into the named encoding; unmappable characters are an
/// error.
pub fn encode(text: &str, label: &str) -> Result<Vec<u8>, Error> {
    let encoding = resolve(label)?;
    let (bytes, _, had_errors) = encoding.encode(text);
    if had_errors {
        return Err(Error::Encode(label.to_string()));
    }
    Ok(bytes.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_known_labels() {
        assert!(resolve("utf-8").is_ok());
        assert!(resolve("UTF-8").is_ok());
        assert!(resolve("ISO-8859-1").is_ok());
    }

    #[test]
    fn test_resolve_unknown_label() {
        let err = resolve("no-such-charset-42").unwrap_err();
        assert!(matches!(err, Error::UnsupportedEncoding(_)));
    }

    #[test]
    fn test_decode_utf8() {
        let text = decode(b"<root>caf\xC3\xA9</root>", "utf-8").unwrap();
        assert_eq!(text, "<root>caf\u{e9}</root>");
    }

    #[test]
    fn test_decode_latin1() {
        // 0xE9 is 'e with acute' in ISO-8859-1
        let text = decode(b"caf\xE9", "ISO-8859-1").unwrap();
        assert_eq!(text, "caf\u{e9}");
    }

    #[test]
    fn test_decode_rejects_malformed() {
        let err = decode(&[0x80, 0x81], "utf-8").unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }

    #[test]
    fn test_decode_lossy_replaces_malformed() {
        let text = decode_lossy(&[b'a', 0x80, b'b'], "utf-8").unwrap();
        assert_eq!(text, "a\u{fffd}b");
    }

    #[test]
    fn test_encode_round_trip() {
        let bytes = encode("caf\u{e9}", "ISO-8859-1").unwrap();
        assert_eq!(bytes, b"caf\xE9");
    }

    #[test]
    fn test_encode_rejects_unmappable() {
        // Katakana is not representable in Latin-1.
        let err = encode("\u{30ab}", "ISO-8859-1").unwrap_err();
        assert!(matches!(err, Error::Encode(_)));
    }
}
