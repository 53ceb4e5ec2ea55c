use bytes::{Buf, BufMut, Bytes};

use crate::error::Error;
use crate::field;
use crate::huffman;

const VARINT_MASK: u8 = 0b0111_1111;
const VARINT_FLAG: u8 = 0b1000_0000;
const HUFF_FLAG: u8 = 0b1000_0000;

// One prefix octet plus four continuation octets; decoded values stay
// below prefix mask + 2^28.
const MAX_INT_BYTES: usize = 5;

pub(crate) fn peek_u8<B: Buf>(buf: &B) -> Option<u8> {
    if buf.has_remaining() {
        Some(buf.chunk()[0])
    } else {
        None
    }
}

fn prefix_mask(prefix_bits: u8) -> u8 {
    if prefix_bits == 8 {
        0xff
    } else {
        (1u8 << prefix_bits).wrapping_sub(1)
    }
}

pub(crate) fn decode_integer<B: Buf>(buf: &mut B, prefix_bits: u8) -> Result<usize, Error> {
    debug_assert!((1..=8).contains(&prefix_bits));

    if !buf.has_remaining() {
        return Err(Error::Truncated);
    }

    let mask = prefix_mask(prefix_bits);
    let mut value = (buf.get_u8() & mask) as usize;

    if value < mask as usize {
        return Ok(value);
    }

    let mut bytes = 1;
    let mut shift = 0u32;

    while buf.has_remaining() {
        let b = buf.get_u8();

        bytes += 1;
        value = value
            .checked_add(((b & VARINT_MASK) as usize) << shift)
            .ok_or(Error::MalformedInteger)?;
        shift += 7;

        if b & VARINT_FLAG == 0 {
            return Ok(value);
        }

        if bytes == MAX_INT_BYTES {
            return Err(Error::MalformedInteger);
        }
    }

    Err(Error::Truncated)
}

pub(crate) fn encode_integer<B: BufMut>(
    dst: &mut B,
    mut value: usize,
    prefix_bits: u8,
    pattern: u8,
) -> Result<(), Error> {
    debug_assert!((1..=8).contains(&prefix_bits));

    let mask = prefix_mask(prefix_bits) as usize;

    if value < mask {
        dst.put_u8(pattern | value as u8);
        return Ok(());
    }

    value -= mask;

    // Anything larger would not survive the decode-side continuation cap.
    if value > 0x0fff_ffff {
        return Err(Error::MalformedInteger);
    }

    dst.put_u8(pattern | mask as u8);

    while value >= 128 {
        dst.put_u8(VARINT_FLAG | (value as u8 & VARINT_MASK));
        value >>= 7;
    }

    dst.put_u8(value as u8);

    Ok(())
}

pub(crate) fn encode_string<B: BufMut>(
    dst: &mut B,
    src: &[u8],
    huffman_enabled: bool,
) -> Result<(), Error> {
    if huffman_enabled && huffman::should_encode(src) {
        encode_integer(dst, huffman::encoded_len(src), 7, HUFF_FLAG)?;
        huffman::encode(src, dst);
    } else {
        encode_integer(dst, src.len(), 7, 0)?;
        dst.put_slice(src);
    }

    Ok(())
}

pub(crate) fn decode_string<B: Buf>(buf: &mut B) -> Result<Bytes, Error> {
    let huff = match peek_u8(buf) {
        Some(b) => b & HUFF_FLAG == HUFF_FLAG,
        None => return Err(Error::Truncated),
    };

    let len = decode_integer(buf, 7)?;

    if len > buf.remaining() {
        return Err(Error::Truncated);
    }

    let raw = buf.copy_to_bytes(len);

    let decoded = if huff {
        Bytes::from(huffman::decode(&raw)?)
    } else {
        raw
    };

    if !field::valid_value(&decoded) {
        return Err(Error::ProtocolError);
    }

    Ok(decoded)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(value: usize, prefix_bits: u8) -> usize {
        let mut dst = Vec::new();
        encode_integer(&mut dst, value, prefix_bits, 0).unwrap();
        let mut src = &dst[..];
        let decoded = decode_integer(&mut src, prefix_bits).unwrap();
        assert!(!src.has_remaining());
        decoded
    }

    #[test]
    fn integer_fits_in_prefix() {
        // RFC 7541 C.1.1: 10 in a 5-bit prefix.
        let mut dst = Vec::new();
        encode_integer(&mut dst, 10, 5, 0).unwrap();
        assert_eq!(dst, [0b0000_1010]);
    }

    #[test]
    fn integer_with_continuation() {
        // RFC 7541 C.1.2: 1337 in a 5-bit prefix.
        let mut dst = Vec::new();
        encode_integer(&mut dst, 1337, 5, 0).unwrap();
        assert_eq!(dst, [0b0001_1111, 0b1001_1010, 0b0000_1010]);
        assert_eq!(roundtrip(1337, 5), 1337);
    }

    #[test]
    fn integer_full_octet_prefix() {
        // RFC 7541 C.1.3: 42 in an 8-bit prefix.
        let mut dst = Vec::new();
        encode_integer(&mut dst, 42, 8, 0).unwrap();
        assert_eq!(dst, [0b0010_1010]);
    }

    #[test]
    fn integer_prefix_boundaries() {
        // M needs a zero continuation octet; M + 127 is the largest value
        // in one continuation octet; M + 128 needs two.
        let mut dst = Vec::new();
        encode_integer(&mut dst, 31, 5, 0).unwrap();
        assert_eq!(dst, [0x1f, 0x00]);

        let mut dst = Vec::new();
        encode_integer(&mut dst, 31 + 127, 5, 0).unwrap();
        assert_eq!(dst, [0x1f, 0x7f]);

        let mut dst = Vec::new();
        encode_integer(&mut dst, 31 + 128, 5, 0).unwrap();
        assert_eq!(dst, [0x1f, 0x80, 0x01]);

        for value in [0, 1, 30, 31, 158, 159, 16383, 1 << 20] {
            for prefix_bits in 1..=8 {
                assert_eq!(roundtrip(value, prefix_bits), value);
            }
        }
    }

    #[test]
    fn integer_truncated_mid_chain() {
        let mut src = &[0x1fu8, 0x80][..];
        assert_eq!(decode_integer(&mut src, 5), Err(Error::Truncated));

        let mut src = &[][..];
        assert_eq!(decode_integer(&mut src, 5), Err(Error::Truncated));
    }

    #[test]
    fn integer_overlong_chain() {
        let mut src = &[0x1fu8, 0x80, 0x80, 0x80, 0x80, 0x01][..];
        assert_eq!(decode_integer(&mut src, 5), Err(Error::MalformedInteger));
    }

    #[test]
    fn integer_too_large_to_encode() {
        let mut dst = Vec::new();
        assert_eq!(
            encode_integer(&mut dst, 1 << 29, 5, 0),
            Err(Error::MalformedInteger)
        );
    }

    #[test]
    fn string_raw_roundtrip() {
        let mut dst = Vec::new();
        encode_string(&mut dst, b"www.example.com", false).unwrap();
        assert_eq!(dst[0], 0x0f);

        let mut src = &dst[..];
        assert_eq!(
            decode_string(&mut src).unwrap(),
            Bytes::from_static(b"www.example.com")
        );
    }

    #[test]
    fn string_huffman_roundtrip() {
        let mut dst = Vec::new();
        encode_string(&mut dst, b"www.example.com", true).unwrap();
        // RFC 7541 C.4.1: Huffman form is 12 octets behind an H-flagged length.
        assert_eq!(dst[0], 0x8c);
        assert_eq!(dst.len(), 13);

        let mut src = &dst[..];
        assert_eq!(
            decode_string(&mut src).unwrap(),
            Bytes::from_static(b"www.example.com")
        );
    }

    #[test]
    fn string_incompressible_stays_raw() {
        // All-0xff input inflates under Huffman, so H must be 0 even with
        // Huffman enabled.
        let mut dst = Vec::new();
        encode_string(&mut dst, &[0xff, 0xfe, 0xfd], true).unwrap();
        assert_eq!(dst, [0x03, 0xff, 0xfe, 0xfd]);
    }

    #[test]
    fn string_truncated_body() {
        let mut src = &[0x85u8, 0xf1][..];
        assert_eq!(decode_string(&mut src), Err(Error::Truncated));
    }

    #[test]
    fn string_with_control_octets_rejected() {
        let mut dst = Vec::new();
        encode_integer(&mut dst, 3, 7, 0).unwrap();
        dst.extend_from_slice(b"a\x00b");

        let mut src = &dst[..];
        assert_eq!(decode_string(&mut src), Err(Error::ProtocolError));
    }
}
