use bytes::Buf;

use crate::error::Error;
use crate::field::HeaderField;
use crate::primitives::{decode_integer, decode_string, peek_u8};
use crate::table::{IndexingTable, TABLE_SIZE_CAP};
use crate::{DEFAULT_MAX_HEADER_LIST_SIZE, DEFAULT_MAX_TABLE_SIZE};

#[derive(Debug)]
pub struct Decoder {
    table: IndexingTable,
    max_table_size: usize,
    max_header_list_size: usize,
}

// The masks must be tested in this order: the never-indexed pattern
// 0001xxxx is a subset of 0000xxxx when only the top nibble is examined.
enum Representation {
    Indexed,
    LiteralWithIndexing,
    LiteralWithoutIndexing,
    LiteralNeverIndexed,
    SizeUpdate,
}

impl Representation {
    fn load(byte: u8) -> Result<Representation, Error> {
        const INDEXED: u8 = 0b1000_0000;
        const LITERAL_WITH_INDEXING: u8 = 0b0100_0000;
        const SIZE_UPDATE: u8 = 0b0010_0000;
        const LITERAL_NEVER_INDEXED: u8 = 0b0001_0000;

        if byte & INDEXED == INDEXED {
            Ok(Representation::Indexed)
        } else if byte & 0b1100_0000 == LITERAL_WITH_INDEXING {
            Ok(Representation::LiteralWithIndexing)
        } else if byte & 0b1110_0000 == SIZE_UPDATE {
            Ok(Representation::SizeUpdate)
        } else if byte & 0b1111_0000 == LITERAL_NEVER_INDEXED {
            Ok(Representation::LiteralNeverIndexed)
        } else if byte & 0b1111_0000 == 0 {
            Ok(Representation::LiteralWithoutIndexing)
        } else {
            Err(Error::ProtocolError)
        }
    }
}

impl Decoder {
    pub fn new(max_table_size: usize, max_header_list_size: usize) -> Decoder {
        Decoder {
            table: IndexingTable::new(max_table_size),
            max_table_size,
            max_header_list_size,
        }
    }

    // Out-of-band cap on table-size updates, e.g. from an HTTP/2
    // SETTINGS frame.
    pub fn set_max_table_size(&mut self, size: usize) -> Result<(), Error> {
        if size > TABLE_SIZE_CAP {
            return Err(Error::Overflow);
        }

        self.max_table_size = size;
        Ok(())
    }

    pub fn table_size(&self) -> usize {
        self.table.dynamic().size()
    }

    pub fn max_table_size(&self) -> usize {
        self.table.dynamic().max_size()
    }

    pub fn reset(&mut self) {
        self.table.clear_dynamic();
    }

    pub fn decode_block(&mut self, src: &[u8]) -> Result<Vec<HeaderField>, Error> {
        let span = tracing::trace_span!("hpack_decode");
        let _e = span.enter();

        let mut buf = src;
        let mut fields = Vec::new();
        let mut list_size = 0usize;

        // Size updates are only legal before the first header field.
        let mut at_block_start = true;

        while let Some(first) = peek_u8(&buf) {
            match Representation::load(first)? {
                Representation::Indexed => {
                    tracing::trace!(rem = buf.remaining(), kind = %"Indexed");
                    at_block_start = false;

                    let index = decode_integer(&mut buf, 7)?;
                    let entry = self.table.get(index)?;
                    push_field(
                        entry,
                        &mut fields,
                        &mut list_size,
                        self.max_header_list_size,
                    )?;
                }
                Representation::LiteralWithIndexing => {
                    tracing::trace!(rem = buf.remaining(), kind = %"LiteralWithIndexing");
                    at_block_start = false;

                    let entry = self.decode_literal(&mut buf, 6)?;
                    self.table.add(entry.clone());
                    push_field(
                        entry,
                        &mut fields,
                        &mut list_size,
                        self.max_header_list_size,
                    )?;
                }
                Representation::LiteralWithoutIndexing => {
                    tracing::trace!(rem = buf.remaining(), kind = %"LiteralWithoutIndexing");
                    at_block_start = false;

                    let entry = self.decode_literal(&mut buf, 4)?;
                    push_field(
                        entry,
                        &mut fields,
                        &mut list_size,
                        self.max_header_list_size,
                    )?;
                }
                Representation::LiteralNeverIndexed => {
                    tracing::trace!(rem = buf.remaining(), kind = %"LiteralNeverIndexed");
                    at_block_start = false;

                    let entry = self.decode_literal(&mut buf, 4)?;
                    push_field(
                        entry,
                        &mut fields,
                        &mut list_size,
                        self.max_header_list_size,
                    )?;
                }
                Representation::SizeUpdate => {
                    tracing::trace!(rem = buf.remaining(), kind = %"SizeUpdate");
                    if !at_block_start {
                        return Err(Error::ProtocolError);
                    }

                    self.process_size_update(&mut buf)?;
                }
            }
        }

        Ok(fields)
    }

    fn decode_literal<B: Buf>(&self, buf: &mut B, prefix_bits: u8) -> Result<HeaderField, Error> {
        let name_index = decode_integer(buf, prefix_bits)?;

        if name_index == 0 {
            let name = decode_string(buf)?;
            let value = decode_string(buf)?;
            Ok(HeaderField::new(name, value))
        } else {
            let entry = self.table.get(name_index)?;
            let value = decode_string(buf)?;
            Ok(HeaderField::new(entry.name_bytes(), value))
        }
    }

    fn process_size_update<B: Buf>(&mut self, buf: &mut B) -> Result<(), Error> {
        let new_size = decode_integer(buf, 5)?;

        if new_size > self.max_table_size {
            return Err(Error::ProtocolError);
        }

        tracing::debug!(
            from = self.table.dynamic().max_size(),
            to = new_size,
            "peer resized the dynamic table"
        );

        self.table.resize(new_size);

        Ok(())
    }
}

impl Default for Decoder {
    fn default() -> Decoder {
        Decoder::new(DEFAULT_MAX_TABLE_SIZE, DEFAULT_MAX_HEADER_LIST_SIZE)
    }
}

fn push_field(
    entry: HeaderField,
    fields: &mut Vec<HeaderField>,
    list_size: &mut usize,
    max_header_list_size: usize,
) -> Result<(), Error> {
    *list_size += entry.name().len() + entry.value().len();

    if *list_size > max_header_list_size {
        return Err(Error::HeaderListTooLarge);
    }

    fields.push(entry);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(name: &'static str, value: &'static str) -> HeaderField {
        HeaderField::new(name, value)
    }

    #[test]
    fn indexed_static_entries() {
        let mut decoder = Decoder::default();
        let fields = decoder.decode_block(&[0x82, 0x86, 0x84]).unwrap();
        assert_eq!(
            fields,
            [field(":method", "GET"), field(":scheme", "http"), field(":path", "/")]
        );
        assert_eq!(decoder.table_size(), 0);
    }

    #[test]
    fn literal_with_indexing_populates_table() {
        // RFC 7541 C.3.1, fourth header field.
        let mut block = vec![0x41, 0x0f];
        block.extend_from_slice(b"www.example.com");

        let mut decoder = Decoder::default();
        let fields = decoder.decode_block(&block).unwrap();
        assert_eq!(fields, [field(":authority", "www.example.com")]);
        assert_eq!(decoder.table_size(), 57);

        // The new entry answers at index 62.
        assert_eq!(
            decoder.decode_block(&[0xbe]).unwrap(),
            [field(":authority", "www.example.com")]
        );
    }

    #[test]
    fn literal_never_indexed_stays_out_of_table() {
        let mut block = vec![0x10, 0x08];
        block.extend_from_slice(b"password");
        block.push(0x06);
        block.extend_from_slice(b"secret");

        let mut decoder = Decoder::default();
        let fields = decoder.decode_block(&block).unwrap();
        assert_eq!(fields, [field("password", "secret")]);
        assert_eq!(decoder.table_size(), 0);
    }

    #[test]
    fn index_zero_is_rejected() {
        let mut decoder = Decoder::default();
        assert_eq!(decoder.decode_block(&[0x80]), Err(Error::ProtocolError));
    }

    #[test]
    fn out_of_range_index_is_rejected() {
        let mut decoder = Decoder::default();
        assert_eq!(decoder.decode_block(&[0xbe]), Err(Error::ProtocolError));
        assert_eq!(decoder.decode_block(&[0xff, 0x00]), Err(Error::ProtocolError));
    }

    #[test]
    fn size_update_applies_at_block_start() {
        let mut decoder = Decoder::default();
        decoder.decode_block(&[0x3f, 0x31]).unwrap();
        assert_eq!(decoder.max_table_size(), 80);

        // Two consecutive updates are legal.
        decoder.decode_block(&[0x3f, 0x31, 0x20]).unwrap();
        assert_eq!(decoder.max_table_size(), 0);
    }

    #[test]
    fn size_update_after_header_is_rejected() {
        let mut decoder = Decoder::default();
        assert_eq!(
            decoder.decode_block(&[0x82, 0x20]),
            Err(Error::ProtocolError)
        );
    }

    #[test]
    fn size_update_above_settings_cap_is_rejected() {
        let mut decoder = Decoder::new(100, 8192);
        assert_eq!(
            decoder.decode_block(&[0x3f, 0x60]),
            Err(Error::ProtocolError)
        );

        decoder.set_max_table_size(200).unwrap();
        decoder.decode_block(&[0x3f, 0x60]).unwrap();
        assert_eq!(decoder.max_table_size(), 127);

        assert_eq!(
            decoder.set_max_table_size(TABLE_SIZE_CAP + 1),
            Err(Error::Overflow)
        );
    }

    #[test]
    fn truncated_literal_is_rejected() {
        let mut decoder = Decoder::default();
        assert_eq!(
            decoder.decode_block(&[0x40, 0x04, b'n']),
            Err(Error::Truncated)
        );
        assert_eq!(decoder.decode_block(&[0x40]), Err(Error::Truncated));
    }

    #[test]
    fn list_size_gate_counts_octets_without_overhead() {
        let mut block = vec![0x00, 0x04];
        block.extend_from_slice(b"name");
        block.push(0x05);
        block.extend_from_slice(b"value");

        let mut decoder = Decoder::new(4096, 8);
        assert_eq!(
            decoder.decode_block(&block),
            Err(Error::HeaderListTooLarge)
        );

        // Exactly at the cap is still legal.
        let mut decoder = Decoder::new(4096, 9);
        assert_eq!(decoder.decode_block(&block).unwrap().len(), 1);
    }

    #[test]
    fn reset_empties_dynamic_table() {
        let mut block = vec![0x41, 0x0f];
        block.extend_from_slice(b"www.example.com");

        let mut decoder = Decoder::default();
        decoder.decode_block(&block).unwrap();
        assert_eq!(decoder.table_size(), 57);

        decoder.reset();
        assert_eq!(decoder.table_size(), 0);
        assert_eq!(decoder.decode_block(&[0xbe]), Err(Error::ProtocolError));
    }
}
