//! Decoding of the hex-encoded memo attached to a received note.

use std::str::Utf8Error;

#[derive(Debug, thiserror::Error)]
pub enum MemoDecodeError {
    #[error("could not decode memo hex: {0}")]
    BadHex(#[from] hex::FromHexError),
    #[error("malformed memo utf-8 in {bytes:?}: {source}")]
    BadEncoding { bytes: Vec<u8>, source: Utf8Error },
}

/// Decode a memo as the node reports it: hex over UTF-8 text, padded to the
/// memo field width with trailing NULs.
pub fn decode_memo(memo_hex: &str) -> Result<String, MemoDecodeError> {
    let bytes = hex::decode(memo_hex)?;
    let text = std::str::from_utf8(&bytes).map_err(|source| MemoDecodeError::BadEncoding {
        bytes: bytes.clone(),
        source,
    })?;
    Ok(text.trim_matches('\0').trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_padded_memo() {
        let memo_hex = hex::encode("1a;2c;3y\0\0\0\0");
        assert_eq!(decode_memo(&memo_hex).unwrap(), "1a;2c;3y");
    }

    #[test]
    fn trims_surrounding_whitespace() {
        let memo_hex = hex::encode("  1a hello  \0\0");
        assert_eq!(decode_memo(&memo_hex).unwrap(), "1a hello");
    }

    #[test]
    fn decode_is_stable_under_reencoding() {
        let trimmed = decode_memo(&hex::encode("1a;2c;3y\0\0")).unwrap();
        assert_eq!(decode_memo(&hex::encode(&trimmed)).unwrap(), trimmed);
    }

    #[test]
    fn rejects_bad_hex() {
        assert!(matches!(
            decode_memo("not hex!"),
            Err(MemoDecodeError::BadHex(_))
        ));
    }

    #[test]
    fn rejects_bad_utf8() {
        // 0xff is never valid in utf-8
        assert!(matches!(
            decode_memo("ff00"),
            Err(MemoDecodeError::BadEncoding { .. })
        ));
    }
}
