use std::collections::{HashMap, HashSet};

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::Error;
use crate::field::{self, HeaderField};
use crate::primitives::{encode_integer, encode_string};
use crate::table::{IndexingTable, TABLE_SIZE_CAP};
use crate::{DEFAULT_MAX_HEADER_STRING_SIZE, DEFAULT_MAX_TABLE_SIZE};

// RFC 7541 section 7.1.3: values under these names never enter a table.
const SENSITIVE_NAMES: [&[u8]; 4] = [
    b"authorization",
    b"proxy-authorization",
    b"cookie",
    b"set-cookie",
];

#[derive(Debug, Clone)]
pub struct EncodingOptions {
    // Lowercase names emitted never-indexed on top of the built-in set.
    pub never_index_value_for_names: HashSet<Vec<u8>>,
    // A pair earns a table slot on the observation that reaches this
    // count; 1 disables probation.
    pub probation_threshold: u32,
    // Reserved; Huffman currently applies iff strictly shorter.
    pub min_huffman_savings_percent: u8,
}

impl Default for EncodingOptions {
    fn default() -> EncodingOptions {
        let never_index: [&[u8]; 4] = [b"etag", b"if-none-match", b"x-request-id", b"x-trace-id"];

        EncodingOptions {
            never_index_value_for_names: never_index.iter().map(|n| n.to_vec()).collect(),
            probation_threshold: 2,
            min_huffman_savings_percent: 0,
        }
    }
}

#[derive(Debug, Copy, Clone)]
enum LiteralKind {
    WithIndexing,
    WithoutIndexing,
    NeverIndexed,
}

impl LiteralKind {
    fn prefix(self) -> (u8, u8) {
        match self {
            LiteralKind::WithIndexing => (6, 0b0100_0000),
            LiteralKind::WithoutIndexing => (4, 0b0000_0000),
            LiteralKind::NeverIndexed => (4, 0b0001_0000),
        }
    }
}

#[derive(Debug)]
pub struct Encoder {
    table: IndexingTable,
    huffman_enabled: bool,
    max_header_string_size: usize,
    options: EncodingOptions,
    candidate_pool: HashMap<HeaderField, u32>,
}

impl Encoder {
    pub fn new(max_table_size: usize) -> Encoder {
        Encoder::with_options(max_table_size, EncodingOptions::default())
    }

    pub fn with_options(max_table_size: usize, options: EncodingOptions) -> Encoder {
        debug_assert!(options.probation_threshold >= 1);

        Encoder {
            table: IndexingTable::new(max_table_size),
            huffman_enabled: true,
            max_header_string_size: DEFAULT_MAX_HEADER_STRING_SIZE,
            options,
            candidate_pool: HashMap::new(),
        }
    }

    pub fn set_huffman(&mut self, enabled: bool) {
        self.huffman_enabled = enabled;
    }

    pub fn set_max_header_string_size(&mut self, size: usize) {
        self.max_header_string_size = size;
    }

    pub fn table_size(&self) -> usize {
        self.table.dynamic().size()
    }

    pub fn max_table_size(&self) -> usize {
        self.table.dynamic().max_size()
    }

    // Output is buffered per block, so a failing header emits nothing.
    pub fn encode_block(&mut self, headers: &[HeaderField]) -> Result<Bytes, Error> {
        let span = tracing::trace_span!("hpack_encode");
        let _e = span.enter();

        let mut dst = BytesMut::with_capacity(64 + headers.len() * 16);

        for header in headers {
            self.encode_field(header, &mut dst)?;
        }

        tracing::trace!(headers = headers.len(), octets = dst.len(), "encoded block");

        Ok(dst.freeze())
    }

    // Returns the size-update octets the caller must prepend to the next
    // block; empty if the size did not change.
    pub fn update_table_size(&mut self, new_max: usize) -> Result<Bytes, Error> {
        if new_max > TABLE_SIZE_CAP {
            return Err(Error::Overflow);
        }

        if new_max == self.table.dynamic().max_size() {
            return Ok(Bytes::new());
        }

        tracing::debug!(
            from = self.table.dynamic().max_size(),
            to = new_max,
            "encoder table resized"
        );

        self.table.resize(new_max);

        let mut dst = BytesMut::with_capacity(8);
        encode_integer(&mut dst, new_max, 5, 0b0010_0000)?;
        Ok(dst.freeze())
    }

    pub fn reset(&mut self) {
        self.table.clear_dynamic();
        self.candidate_pool.clear();
    }

    fn encode_field(&mut self, header: &HeaderField, dst: &mut BytesMut) -> Result<(), Error> {
        self.validate(header)?;

        if let Some(index) = self.table.find_index(header) {
            return encode_integer(dst, index, 7, 0b1000_0000);
        }

        if self.never_index(header.name()) {
            return self.encode_literal(header, LiteralKind::NeverIndexed, dst);
        }

        let seen = {
            let count = self.candidate_pool.entry(header.clone()).or_insert(0);
            *count += 1;
            *count
        };

        if seen >= self.options.probation_threshold {
            self.encode_literal(header, LiteralKind::WithIndexing, dst)?;
            self.table.add(header.clone());
            Ok(())
        } else {
            self.encode_literal(header, LiteralKind::WithoutIndexing, dst)
        }
    }

    fn encode_literal(
        &mut self,
        header: &HeaderField,
        kind: LiteralKind,
        dst: &mut BytesMut,
    ) -> Result<(), Error> {
        let (prefix_bits, pattern) = kind.prefix();

        match self.table.find_name_index(header.name()) {
            Some(index) => encode_integer(dst, index, prefix_bits, pattern)?,
            None => {
                dst.put_u8(pattern);
                encode_string(dst, header.name(), self.huffman_enabled)?;
            }
        }

        encode_string(dst, header.value(), self.huffman_enabled)
    }

    fn validate(&self, header: &HeaderField) -> Result<(), Error> {
        if !field::valid_name(header.name()) || !field::valid_value(header.value()) {
            return Err(Error::InvalidHeader);
        }

        if header.name().len() > self.max_header_string_size
            || header.value().len() > self.max_header_string_size
        {
            return Err(Error::InvalidHeader);
        }

        Ok(())
    }

    fn never_index(&self, name: &[u8]) -> bool {
        SENSITIVE_NAMES.contains(&name)
            || self.options.never_index_value_for_names.contains(name)
    }
}

impl Default for Encoder {
    fn default() -> Encoder {
        Encoder::new(DEFAULT_MAX_TABLE_SIZE)
    }
}
