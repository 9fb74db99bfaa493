//! Standard-alphabet base64 for moving binary payloads through text channels

use crate::{CoreError, CoreResult};
use base64::{engine::general_purpose::STANDARD, Engine as _};

/// Encode bytes as padded standard base64
pub fn encode(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Decode padded standard base64
pub fn decode(text: &str) -> CoreResult<Vec<u8>> {
    STANDARD
        .decode(text.trim_end_matches(&['\r', '\n'][..]))
        .map_err(|e| CoreError::InvalidEncoding(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_known_vectors() {
        assert_eq!(encode(b""), "");
        assert_eq!(encode(b"f"), "Zg==");
        assert_eq!(encode(b"fo"), "Zm8=");
        assert_eq!(encode(b"foobar"), "Zm9vYmFy");
        assert_eq!(decode("Zm9vYg==").unwrap(), b"foob");
    }

    #[test]
    fn test_every_byte_value() {
        let all: Vec<u8> = (0..=255u8).collect();
        assert_eq!(decode(&encode(&all)).unwrap(), all);
    }

    #[test]
    fn test_trailing_newline_accepted() {
        assert_eq!(decode("Zm8=\n").unwrap(), b"fo");
    }

    #[test]
    fn test_invalid_input() {
        assert!(matches!(decode("Zm9v!"), Err(CoreError::InvalidEncoding(_))));
        assert!(decode("Zg=").is_err());
    }

    proptest! {
        #[test]
        fn prop_round_trip(data in proptest::collection::vec(any::<u8>(), 0..512)) {
            prop_assert_eq!(decode(&encode(&data)).unwrap(), data);
        }
    }
}
