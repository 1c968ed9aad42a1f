//! Log record definitions
//!
//! Encodes and decodes single records of the append-only log. This is the
//! only place that knows the on-disk byte layout.

use std::io::{ErrorKind, Read};
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{CaskError, Result};

/// Header size: Checksum (4) + Timestamp (4) + KeyLen (4) + ValLen (4) = 16 bytes
pub const HEADER_SIZE: usize = 16;

/// A single record in the log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    /// Unix seconds when the record was appended
    pub timestamp: u32,

    pub key: Vec<u8>,

    /// Empty for a tombstone
    pub value: Vec<u8>,
}

impl LogRecord {
    /// Create a record stamped with the current time
    pub fn new(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        Self::with_timestamp(key, value, now())
    }

    /// Create a record with an explicit timestamp
    pub fn with_timestamp(
        key: impl Into<Vec<u8>>,
        value: impl Into<Vec<u8>>,
        timestamp: u32,
    ) -> Self {
        Self {
            timestamp,
            key: key.into(),
            value: value.into(),
        }
    }

    /// Create a delete marker for `key`
    pub fn tombstone(key: impl Into<Vec<u8>>) -> Self {
        Self::new(key, Vec::<u8>::new())
    }

    pub fn is_tombstone(&self) -> bool {
        self.value.is_empty()
    }

    /// Total bytes this record occupies in the log
    pub fn encoded_len(&self) -> u64 {
        (HEADER_SIZE + self.key.len() + self.value.len()) as u64
    }

    /// Distance from the record start to its first value byte
    pub fn value_offset(&self) -> u64 {
        (HEADER_SIZE + self.key.len()) as u64
    }

    pub fn encode(&self) -> Result<Bytes> {
        encode(&self.key, &self.value, self.timestamp)
    }

    /// Read one record from `reader`.
    ///
    /// Returns `EndOfLog` when no header byte is left, `TruncatedRecord` when
    /// the log stops inside a header or body, and `CorruptRecord` when the
    /// checksum does not match. A body cut short by a damaged length field is
    /// `CorruptRecord`, not `TruncatedRecord`.
    pub fn decode<R: Read>(reader: &mut R) -> Result<Self> {
        let mut header = [0u8; HEADER_SIZE];
        let read = read_full(reader, &mut header)?;
        if read == 0 {
            return Err(CaskError::EndOfLog);
        }
        if read < HEADER_SIZE {
            return Err(CaskError::TruncatedRecord {
                expected: HEADER_SIZE as u64,
                actual: read as u64,
            });
        }

        let mut fields = &header[..];
        let stored_crc = fields.get_u32_le();
        let timestamp = fields.get_u32_le();
        let key_len = fields.get_u32_le() as u64;
        let val_len = fields.get_u32_le() as u64;

        // take() grows the buffer as bytes arrive, so a garbage length
        // cannot force a huge allocation up front.
        let body_len = key_len + val_len;
        let mut body = Vec::new();
        reader.take(body_len).read_to_end(&mut body)?;
        if (body.len() as u64) < body_len {
            if let Some(expected) = damaged_length(&header, &body, stored_crc) {
                return Err(CaskError::CorruptRecord {
                    expected: stored_crc,
                    actual: expected,
                });
            }
            return Err(CaskError::TruncatedRecord {
                expected: HEADER_SIZE as u64 + body_len,
                actual: (HEADER_SIZE + body.len()) as u64,
            });
        }

        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&header[4..]);
        hasher.update(&body);
        let actual_crc = hasher.finalize();
        if actual_crc != stored_crc {
            return Err(CaskError::CorruptRecord {
                expected: stored_crc,
                actual: actual_crc,
            });
        }

        let value = body.split_off(key_len as usize);
        Ok(Self {
            timestamp,
            key: body,
            value,
        })
    }
}

/// Encode a record as
/// `checksum | timestamp | key_len | val_len | key | value`, little-endian,
/// with a CRC-32 over everything after the checksum field.
pub fn encode(key: &[u8], value: &[u8], timestamp: u32) -> Result<Bytes> {
    let key_len = u32::try_from(key.len()).map_err(|_| CaskError::RecordTooLarge {
        field: "key",
        len: key.len(),
    })?;
    let val_len = u32::try_from(value.len()).map_err(|_| CaskError::RecordTooLarge {
        field: "value",
        len: value.len(),
    })?;

    let mut buf = BytesMut::with_capacity(HEADER_SIZE + key.len() + value.len());
    buf.put_u32_le(0); // checksum, filled below
    buf.put_u32_le(timestamp);
    buf.put_u32_le(key_len);
    buf.put_u32_le(val_len);
    buf.put_slice(key);
    buf.put_slice(value);

    let crc = crc32fast::hash(&buf[4..]);
    buf[..4].copy_from_slice(&crc.to_le_bytes());

    Ok(buf.freeze())
}

/// Current time in Unix seconds
pub fn now() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as u32)
        .unwrap_or(0)
}

/// Tell a damaged length field apart from a torn write.
///
/// A record whose body runs past the end of the log is torn only if no
/// single-bit repair of its length fields makes the bytes that are present
/// match the stored checksum. On a match, returns the checksum computed over
/// the header as found.
fn damaged_length(header: &[u8; HEADER_SIZE], body: &[u8], stored_crc: u32) -> Option<u32> {
    for bit in 64..HEADER_SIZE * 8 {
        let mut repaired = *header;
        repaired[bit / 8] ^= 1 << (bit % 8);

        let mut lengths = &repaired[8..];
        let key_len = lengths.get_u32_le() as usize;
        let val_len = lengths.get_u32_le() as usize;
        let Some(len) = key_len.checked_add(val_len).filter(|len| *len <= body.len()) else {
            continue;
        };

        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&repaired[4..]);
        hasher.update(&body[..len]);
        if hasher.finalize() == stored_crc {
            let mut found = crc32fast::Hasher::new();
            found.update(&header[4..]);
            found.update(body);
            return Some(found.finalize());
        }
    }
    None
}

/// Fill `buf` as far as the reader allows; returns the bytes read.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
