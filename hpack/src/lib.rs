//! HPACK header compression (RFC 7541) for HTTP/2 connections.
//!
//! One `Encoder` per outgoing header stream and one `Decoder` per
//! incoming one; header blocks must be processed in transmission order so
//! the dynamic tables on both sides stay synchronized.

mod decoder;
mod encoder;
mod error;
mod field;
mod huffman;
mod primitives;
mod table;

pub use decoder::Decoder;
pub use encoder::{Encoder, EncodingOptions};
pub use error::Error;
pub use field::HeaderField;

use bytes::Bytes;

pub const DEFAULT_MAX_TABLE_SIZE: usize = 4096;
pub const DEFAULT_MAX_HEADER_LIST_SIZE: usize = 8192;
pub const DEFAULT_MAX_HEADER_STRING_SIZE: usize = 8192;

// One-shot helpers: a fresh agent with defaults, used once and dropped.
pub fn encode(headers: &[HeaderField], huffman: bool) -> Result<Bytes, Error> {
    let mut encoder = Encoder::default();
    encoder.set_huffman(huffman);
    encoder.encode_block(headers)
}

pub fn decode(src: &[u8]) -> Result<Vec<HeaderField>, Error> {
    Decoder::default().decode_block(src)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stateless_roundtrip() {
        let headers = vec![
            HeaderField::new(":status", "200"),
            HeaderField::new("content-type", "text/html"),
        ];

        for huffman in [false, true] {
            let block = encode(&headers, huffman).unwrap();
            assert_eq!(decode(&block).unwrap(), headers);
        }
    }

    #[test]
    fn stateless_agents_start_fresh() {
        // A one-shot encoder cannot have promoted anything, so the same
        // input encodes to the same octets every time.
        let headers = vec![HeaderField::new("x-cluster", "blue")];
        let first = encode(&headers, true).unwrap();
        let second = encode(&headers, true).unwrap();
        assert_eq!(first, second);
    }
}
