use std::collections::{HashMap, VecDeque};

use bytes::Bytes;

use crate::error::Error;
use crate::field::HeaderField;

// RFC 7541 Appendix A.
pub(crate) const STATIC_TABLE: [(&[u8], &[u8]); 61] = [
    (b":authority", b""),
    (b":method", b"GET"),
    (b":method", b"POST"),
    (b":path", b"/"),
    (b":path", b"/index.html"),
    (b":scheme", b"http"),
    (b":scheme", b"https"),
    (b":status", b"200"),
    (b":status", b"204"),
    (b":status", b"206"),
    (b":status", b"304"),
    (b":status", b"400"),
    (b":status", b"404"),
    (b":status", b"500"),
    (b"accept-charset", b""),
    (b"accept-encoding", b"gzip, deflate"),
    (b"accept-language", b""),
    (b"accept-ranges", b""),
    (b"accept", b""),
    (b"access-control-allow-origin", b""),
    (b"age", b""),
    (b"allow", b""),
    (b"authorization", b""),
    (b"cache-control", b""),
    (b"content-disposition", b""),
    (b"content-encoding", b""),
    (b"content-language", b""),
    (b"content-length", b""),
    (b"content-location", b""),
    (b"content-range", b""),
    (b"content-type", b""),
    (b"cookie", b""),
    (b"date", b""),
    (b"etag", b""),
    (b"expect", b""),
    (b"expires", b""),
    (b"from", b""),
    (b"host", b""),
    (b"if-match", b""),
    (b"if-modified-since", b""),
    (b"if-none-match", b""),
    (b"if-range", b""),
    (b"if-unmodified-since", b""),
    (b"last-modified", b""),
    (b"link", b""),
    (b"location", b""),
    (b"max-forwards", b""),
    (b"proxy-authenticate", b""),
    (b"proxy-authorization", b""),
    (b"range", b""),
    (b"referer", b""),
    (b"refresh", b""),
    (b"retry-after", b""),
    (b"server", b""),
    (b"set-cookie", b""),
    (b"strict-transport-security", b""),
    (b"transfer-encoding", b""),
    (b"user-agent", b""),
    (b"vary", b""),
    (b"via", b""),
    (b"www-authenticate", b""),
];

pub(crate) const STATIC_TABLE_LEN: usize = STATIC_TABLE.len();

pub(crate) const TABLE_SIZE_CAP: usize = u32::MAX as usize;

fn static_entry(index: usize) -> Option<HeaderField> {
    let &(name, value) = STATIC_TABLE.get(index.checked_sub(1)?)?;
    Some(HeaderField::new(
        Bytes::from_static(name),
        Bytes::from_static(value),
    ))
}

fn static_find(name: &[u8], value: &[u8]) -> Option<usize> {
    match (name, value) {
        (b":authority", b"") => Some(1),
        (b":method", b"GET") => Some(2),
        (b":method", b"POST") => Some(3),
        (b":path", b"/") => Some(4),
        (b":path", b"/index.html") => Some(5),
        (b":scheme", b"http") => Some(6),
        (b":scheme", b"https") => Some(7),
        (b":status", b"200") => Some(8),
        (b":status", b"204") => Some(9),
        (b":status", b"206") => Some(10),
        (b":status", b"304") => Some(11),
        (b":status", b"400") => Some(12),
        (b":status", b"404") => Some(13),
        (b":status", b"500") => Some(14),
        (b"accept-encoding", b"gzip, deflate") => Some(16),
        (name, b"") => match static_find_name(name) {
            Some(index) if STATIC_TABLE[index - 1].1.is_empty() => Some(index),
            _ => None,
        },
        _ => None,
    }
}

fn static_find_name(name: &[u8]) -> Option<usize> {
    let index = match name {
        b":authority" => 1,
        b":method" => 2,
        b":path" => 4,
        b":scheme" => 6,
        b":status" => 8,
        b"accept-charset" => 15,
        b"accept-encoding" => 16,
        b"accept-language" => 17,
        b"accept-ranges" => 18,
        b"accept" => 19,
        b"access-control-allow-origin" => 20,
        b"age" => 21,
        b"allow" => 22,
        b"authorization" => 23,
        b"cache-control" => 24,
        b"content-disposition" => 25,
        b"content-encoding" => 26,
        b"content-language" => 27,
        b"content-length" => 28,
        b"content-location" => 29,
        b"content-range" => 30,
        b"content-type" => 31,
        b"cookie" => 32,
        b"date" => 33,
        b"etag" => 34,
        b"expect" => 35,
        b"expires" => 36,
        b"from" => 37,
        b"host" => 38,
        b"if-match" => 39,
        b"if-modified-since" => 40,
        b"if-none-match" => 41,
        b"if-range" => 42,
        b"if-unmodified-since" => 43,
        b"last-modified" => 44,
        b"link" => 45,
        b"location" => 46,
        b"max-forwards" => 47,
        b"proxy-authenticate" => 48,
        b"proxy-authorization" => 49,
        b"range" => 50,
        b"referer" => 51,
        b"refresh" => 52,
        b"retry-after" => 53,
        b"server" => 54,
        b"set-cookie" => 55,
        b"strict-transport-security" => 56,
        b"transfer-encoding" => 57,
        b"user-agent" => 58,
        b"vary" => 59,
        b"via" => 60,
        b"www-authenticate" => 61,
        _ => return None,
    };
    Some(index)
}

// Newest entry at relative position 1. `lookup` records the insertion
// sequence of the newest copy of each pair; relative positions are the
// distance to the running counter, so the map survives evictions.
#[derive(Debug, Default)]
pub(crate) struct DynamicTable {
    entries: VecDeque<HeaderField>,
    size: usize,
    max_size: usize,
    insertions: u64,
    lookup: HashMap<HeaderField, u64>,
}

impl DynamicTable {
    pub(crate) fn new(max_size: usize) -> DynamicTable {
        DynamicTable {
            entries: VecDeque::new(),
            size: 0,
            max_size,
            insertions: 0,
            lookup: HashMap::new(),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn size(&self) -> usize {
        self.size
    }

    pub(crate) fn max_size(&self) -> usize {
        self.max_size
    }

    pub(crate) fn get(&self, position: usize) -> Option<&HeaderField> {
        self.entries.get(position.checked_sub(1)?)
    }

    pub(crate) fn add(&mut self, entry: HeaderField) {
        let entry_size = entry.size();

        // An entry larger than the whole budget empties the table and is
        // itself dropped, RFC 7541 section 4.4.
        if entry_size > self.max_size {
            self.clear();
            return;
        }

        while self.size + entry_size > self.max_size {
            self.evict_oldest();
        }

        let seq = self.insertions;
        self.insertions += 1;
        self.size += entry_size;
        self.lookup.insert(entry.clone(), seq);
        self.entries.push_front(entry);
    }

    pub(crate) fn resize(&mut self, max_size: usize) {
        self.max_size = max_size;
        while self.size > max_size {
            self.evict_oldest();
        }
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
        self.lookup.clear();
        self.size = 0;
    }

    pub(crate) fn find(&self, entry: &HeaderField) -> Option<usize> {
        let seq = *self.lookup.get(entry)?;
        Some((self.insertions - seq) as usize)
    }

    pub(crate) fn find_name(&self, name: &[u8]) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| e.name() == name)
            .map(|i| i + 1)
    }

    fn evict_oldest(&mut self) {
        let seq = self.insertions - self.entries.len() as u64;
        let entry = match self.entries.pop_back() {
            Some(entry) => entry,
            None => return,
        };

        self.size -= entry.size();

        // Only drop the lookup slot if it still points at this copy.
        if self.lookup.get(&entry) == Some(&seq) {
            self.lookup.remove(&entry);
        }
    }
}

// Unified 1-based index space: 1..=61 static, 62 and up dynamic
// newest-first.
#[derive(Debug)]
pub(crate) struct IndexingTable {
    dynamic: DynamicTable,
}

impl IndexingTable {
    pub(crate) fn new(max_size: usize) -> IndexingTable {
        IndexingTable {
            dynamic: DynamicTable::new(max_size),
        }
    }

    pub(crate) fn get(&self, index: usize) -> Result<HeaderField, Error> {
        if index == 0 {
            return Err(Error::ProtocolError);
        }

        if let Some(entry) = static_entry(index) {
            return Ok(entry);
        }

        self.dynamic
            .get(index - STATIC_TABLE_LEN)
            .cloned()
            .ok_or(Error::ProtocolError)
    }

    pub(crate) fn find_index(&self, entry: &HeaderField) -> Option<usize> {
        static_find(entry.name(), entry.value())
            .or_else(|| self.dynamic.find(entry).map(|p| STATIC_TABLE_LEN + p))
    }

    pub(crate) fn find_name_index(&self, name: &[u8]) -> Option<usize> {
        static_find_name(name)
            .or_else(|| self.dynamic.find_name(name).map(|p| STATIC_TABLE_LEN + p))
    }

    pub(crate) fn add(&mut self, entry: HeaderField) {
        self.dynamic.add(entry);
    }

    pub(crate) fn resize(&mut self, max_size: usize) {
        self.dynamic.resize(max_size);
    }

    pub(crate) fn clear_dynamic(&mut self) {
        self.dynamic.clear();
    }

    pub(crate) fn dynamic(&self) -> &DynamicTable {
        &self.dynamic
    }
}
