//! BER length octets (X.690 Section 8.1.3).
//!
//! Short form for lengths up to 127, long form with up to four length octets
//! otherwise. The indefinite form is rejected.

use std::net::SocketAddr;

use crate::error::internal::DecodeErrorKind;
use crate::error::{Error, Result, UNKNOWN_TARGET};

/// Largest length accepted while decoding.
pub const MAX_LENGTH: usize = 0x20_0000;

/// Encode `len`, returning the octets in wire order and how many are used.
pub fn encode_length(len: usize) -> ([u8; 5], usize) {
    let mut out = [0u8; 5];
    if len <= 0x7F {
        out[0] = len as u8;
        return (out, 1);
    }
    let bytes = (len as u32).to_be_bytes();
    let skip = bytes.iter().take_while(|b| **b == 0).count();
    let significant = &bytes[skip..];
    out[0] = 0x80 | significant.len() as u8;
    out[1..=significant.len()].copy_from_slice(significant);
    (out, significant.len() + 1)
}

/// Decode length octets at the start of `data`, returning (length, consumed).
///
/// `offset` is only used for diagnostics.
pub fn decode_length(
    data: &[u8],
    offset: usize,
    target: Option<SocketAddr>,
) -> Result<(usize, usize)> {
    let fail = |kind: DecodeErrorKind| {
        tracing::debug!(target: "async_devmon::ber", { snmp.offset = offset, kind = %kind }, "bad length octets");
        Error::MalformedResponse {
            target: target.unwrap_or(UNKNOWN_TARGET),
        }
        .boxed()
    };

    let first = *data.first().ok_or_else(|| fail(DecodeErrorKind::TruncatedData))?;
    if first == 0x80 {
        return Err(fail(DecodeErrorKind::IndefiniteLength));
    }
    if first & 0x80 == 0 {
        return Ok((first as usize, 1));
    }

    let count = (first & 0x7F) as usize;
    if count > 4 {
        return Err(fail(DecodeErrorKind::LengthTooLong { octets: count }));
    }
    let octets = data
        .get(1..=count)
        .ok_or_else(|| fail(DecodeErrorKind::TruncatedData))?;
    let len = octets.iter().fold(0usize, |acc, b| (acc << 8) | *b as usize);
    if len > MAX_LENGTH {
        return Err(fail(DecodeErrorKind::LengthExceedsMax {
            length: len,
            max: MAX_LENGTH,
        }));
    }
    Ok((len, count + 1))
}
