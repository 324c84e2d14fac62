//! Log record framing.
//!
//! Every entry is stored as one self-describing, checksummed record:
//!
//! ```text
//! ┌───────┬─────────┬──────┬─────────────┬───────┬──────┬─────────┬───────┐
//! │ magic │ version │ kind │ payload_len │ index │ term │ payload │ crc32 │
//! │   4   │    2    │  1   │      4      │   8   │  8   │   ...   │   4   │
//! └───────┴─────────┴──────┴─────────────┴───────┴──────┴─────────┴───────┘
//! ```
//!
//! All integers are little-endian. The CRC covers header and payload.
//! Records never span segment files, so a record that fails to decode
//! because the buffer is shorter than the declared length is the
//! signature of a torn write from an unclean shutdown.

use crate::error::{StoreError, StoreResult};
use crate::types::{EntryKind, LogEntry};

/// Magic bytes identifying a log record.
pub const RECORD_MAGIC: [u8; 4] = *b"QLOG";

/// Current record format version.
pub const FORMAT_VERSION: u16 = 1;

/// Header size: magic (4) + version (2) + kind (1) + payload_len (4)
/// + index (8) + term (8) = 27 bytes.
pub const HEADER_SIZE: usize = 27;

/// CRC trailer size.
pub const CRC_SIZE: usize = 4;

/// Maximum payload size, capped so a record's total encoded length
/// (header + payload + CRC) still fits in 32 bits.
pub const MAX_PAYLOAD_SIZE: usize = u32::MAX as usize - HEADER_SIZE - CRC_SIZE;

/// Returns the total encoded length of a record with the given payload size.
#[must_use]
pub const fn encoded_len(payload_len: usize) -> usize {
    HEADER_SIZE + payload_len + CRC_SIZE
}

/// Encodes an entry into a checksummed, length-framed record.
///
/// # Errors
///
/// Returns an error if the payload exceeds [`MAX_PAYLOAD_SIZE`].
pub fn encode(entry: &LogEntry) -> StoreResult<Vec<u8>> {
    if entry.payload.len() > MAX_PAYLOAD_SIZE {
        return Err(StoreError::invalid_operation(format!(
            "payload too large: {} bytes exceeds maximum of {MAX_PAYLOAD_SIZE}",
            entry.payload.len()
        )));
    }
    let len = entry.payload.len() as u32;

    let mut buf = Vec::with_capacity(encoded_len(entry.payload.len()));
    buf.extend_from_slice(&RECORD_MAGIC);
    buf.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    buf.push(entry.kind.as_byte());
    buf.extend_from_slice(&len.to_le_bytes());
    buf.extend_from_slice(&entry.index.to_le_bytes());
    buf.extend_from_slice(&entry.term.to_le_bytes());
    buf.extend_from_slice(&entry.payload);

    let crc = crc32fast::hash(&buf);
    buf.extend_from_slice(&crc.to_le_bytes());

    Ok(buf)
}

/// Decodes one record from the start of `buf`.
///
/// Returns the entry and the number of bytes it occupied. `buf` may
/// extend past the record; trailing bytes are ignored.
///
/// # Errors
///
/// - `Corruption` if the buffer is shorter than the record's declared
///   length (torn write), or the magic, version, or kind byte is invalid
/// - `ChecksumMismatch` if the stored CRC does not match the computed one
pub fn decode(buf: &[u8]) -> StoreResult<(LogEntry, usize)> {
    if buf.len() < HEADER_SIZE {
        return Err(StoreError::corruption(format!(
            "truncated record: {} bytes is shorter than the {HEADER_SIZE}-byte header",
            buf.len()
        )));
    }

    if buf[0..4] != RECORD_MAGIC {
        return Err(StoreError::corruption("invalid record magic"));
    }

    let version = u16::from_le_bytes([buf[4], buf[5]]);
    if version > FORMAT_VERSION {
        return Err(StoreError::corruption(format!(
            "unsupported record format version {version}"
        )));
    }

    let kind_byte = buf[6];
    let kind = EntryKind::from_byte(kind_byte)
        .ok_or_else(|| StoreError::corruption(format!("unknown entry kind byte {kind_byte}")))?;

    let payload_len = u32::from_le_bytes([buf[7], buf[8], buf[9], buf[10]]) as usize;
    let total_len = encoded_len(payload_len);

    if buf.len() < total_len {
        return Err(StoreError::corruption(format!(
            "truncated record: declared length {total_len}, only {} bytes present",
            buf.len()
        )));
    }

    let crc_start = total_len - CRC_SIZE;
    let stored_crc = u32::from_le_bytes([
        buf[crc_start],
        buf[crc_start + 1],
        buf[crc_start + 2],
        buf[crc_start + 3],
    ]);
    let computed_crc = crc32fast::hash(&buf[..crc_start]);
    if stored_crc != computed_crc {
        return Err(StoreError::ChecksumMismatch {
            expected: stored_crc,
            actual: computed_crc,
        });
    }

    let index = u64::from_le_bytes(buf[11..19].try_into().expect("8-byte slice"));
    let term = u64::from_le_bytes(buf[19..27].try_into().expect("8-byte slice"));
    let payload = buf[HEADER_SIZE..HEADER_SIZE + payload_len].to_vec();

    Ok((
        LogEntry {
            index,
            term,
            kind,
            payload,
        },
        total_len,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(index: u64, payload: &[u8]) -> LogEntry {
        LogEntry {
            index,
            term: 3,
            kind: EntryKind::Data,
            payload: payload.to_vec(),
        }
    }

    #[test]
    fn encode_decode_roundtrip() {
        let original = entry(7, b"hello log");
        let encoded = encode(&original).unwrap();
        assert_eq!(encoded.len(), encoded_len(9));

        let (decoded, consumed) = decode(&encoded).unwrap();
        assert_eq!(decoded, original);
        assert_eq!(consumed, encoded.len());
    }

    #[test]
    fn empty_payload_roundtrip() {
        let original = entry(1, b"");
        let encoded = encode(&original).unwrap();
        let (decoded, consumed) = decode(&encoded).unwrap();
        assert_eq!(decoded, original);
        assert_eq!(consumed, encoded_len(0));
    }

    #[test]
    fn configuration_kind_roundtrip() {
        let original = LogEntry {
            index: 42,
            term: 9,
            kind: EntryKind::Configuration,
            payload: vec![0xCA, 0xFE],
        };
        let encoded = encode(&original).unwrap();
        let (decoded, _) = decode(&encoded).unwrap();
        assert_eq!(decoded.kind, EntryKind::Configuration);
        assert_eq!(decoded, original);
    }

    #[test]
    fn decode_ignores_trailing_bytes() {
        let first = entry(1, b"first");
        let second = entry(2, b"second");

        let mut buf = encode(&first).unwrap();
        let first_len = buf.len();
        buf.extend_from_slice(&encode(&second).unwrap());

        let (decoded, consumed) = decode(&buf).unwrap();
        assert_eq!(decoded, first);
        assert_eq!(consumed, first_len);

        let (decoded, _) = decode(&buf[consumed..]).unwrap();
        assert_eq!(decoded, second);
    }

    #[test]
    fn truncated_header_is_corruption() {
        let encoded = encode(&entry(1, b"payload")).unwrap();
        let result = decode(&encoded[..HEADER_SIZE - 1]);
        assert!(matches!(result, Err(StoreError::Corruption { .. })));
    }

    #[test]
    fn truncated_payload_is_corruption() {
        let encoded = encode(&entry(1, b"a longer payload")).unwrap();
        let result = decode(&encoded[..encoded.len() - 3]);
        assert!(matches!(result, Err(StoreError::Corruption { .. })));
    }

    #[test]
    fn flipped_bit_is_checksum_mismatch() {
        let mut encoded = encode(&entry(1, b"payload")).unwrap();
        encoded[HEADER_SIZE] ^= 0x01;

        let result = decode(&encoded);
        assert!(matches!(result, Err(StoreError::ChecksumMismatch { .. })));
    }

    #[test]
    fn bad_magic_is_corruption() {
        let mut encoded = encode(&entry(1, b"payload")).unwrap();
        encoded[0] = b'X';

        let result = decode(&encoded);
        assert!(matches!(result, Err(StoreError::Corruption { .. })));
    }

    #[test]
    fn unknown_kind_is_corruption() {
        let mut encoded = encode(&entry(1, b"x")).unwrap();
        encoded[6] = 0xFF;

        let result = decode(&encoded);
        assert!(matches!(result, Err(StoreError::Corruption { .. })));
    }

    #[test]
    fn max_payload_keeps_total_length_in_u32_range() {
        assert_eq!(encoded_len(MAX_PAYLOAD_SIZE), u32::MAX as usize);
    }

    #[test]
    fn future_version_is_corruption() {
        let mut encoded = encode(&entry(1, b"x")).unwrap();
        encoded[4..6].copy_from_slice(&(FORMAT_VERSION + 1).to_le_bytes());

        let result = decode(&encoded);
        assert!(matches!(result, Err(StoreError::Corruption { .. })));
    }
}

#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn roundtrip_any_entry(
            index in 1u64..=u64::MAX,
            term in 0u64..=u64::MAX,
            payload in proptest::collection::vec(any::<u8>(), 0..2048),
        ) {
            for kind in EntryKind::ALL {
                let entry = LogEntry {
                    index,
                    term,
                    kind,
                    payload: payload.clone(),
                };
                let encoded = encode(&entry).unwrap();
                let (decoded, consumed) = decode(&encoded).unwrap();
                prop_assert_eq!(&decoded, &entry);
                prop_assert_eq!(consumed, encoded.len());
            }
        }

        #[test]
        fn decode_never_panics_on_garbage(
            bytes in proptest::collection::vec(any::<u8>(), 0..256),
        ) {
            let _ = decode(&bytes);
        }

        #[test]
        fn truncated_record_never_decodes(
            payload in proptest::collection::vec(any::<u8>(), 1..512),
            cut in 1usize..32,
        ) {
            let entry = LogEntry {
                index: 1,
                term: 1,
                kind: EntryKind::Data,
                payload,
            };
            let encoded = encode(&entry).unwrap();
            let result = decode(&encoded[..encoded.len() - cut]);
            prop_assert!(result.is_err());
        }
    }
}
