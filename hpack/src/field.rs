use bytes::Bytes;

// Per-entry overhead charged against the table budget, RFC 7541 section 4.1.
pub(crate) const ENTRY_OVERHEAD: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HeaderField {
    name: Bytes,
    value: Bytes,
}

impl HeaderField {
    pub fn new(name: impl Into<Bytes>, value: impl Into<Bytes>) -> HeaderField {
        HeaderField {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn name(&self) -> &[u8] {
        &self.name
    }

    pub fn value(&self) -> &[u8] {
        &self.value
    }

    pub(crate) fn name_bytes(&self) -> Bytes {
        self.name.clone()
    }

    pub fn size(&self) -> usize {
        self.name.len() + self.value.len() + ENTRY_OVERHEAD
    }
}

// Names must already be lowercase on the encode side (RFC 7541 section
// 8.1.2 via RFC 7540).
pub(crate) fn valid_name(name: &[u8]) -> bool {
    !name.is_empty()
        && name
            .iter()
            .all(|&b| b.is_ascii_lowercase() || b.is_ascii_digit() || matches!(b, b'-' | b'_' | b':'))
}

// Horizontal tab is the one permitted control octet.
pub(crate) fn valid_value(value: &[u8]) -> bool {
    value.iter().all(|&b| b == b'\t' || (b >= 0x20 && b != 0x7f))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_size_includes_overhead() {
        let field = HeaderField::new("content-type", "text/html");
        assert_eq!(field.size(), 12 + 9 + 32);
    }

    #[test]
    fn empty_value_is_valid() {
        assert!(valid_value(b""));
        assert_eq!(HeaderField::new(":authority", "").size(), 42);
    }

    #[test]
    fn name_character_classes() {
        assert!(valid_name(b":method"));
        assert!(valid_name(b"x-request-id"));
        assert!(valid_name(b"sec_token2"));
        assert!(!valid_name(b""));
        assert!(!valid_name(b"Content-Type"));
        assert!(!valid_name(b"name with space"));
        assert!(!valid_name(b"na\x00me"));
    }

    #[test]
    fn value_rejects_controls_except_tab() {
        assert!(valid_value(b"Bearer abc"));
        assert!(valid_value(b"a\tb"));
        assert!(valid_value(&[0x80, 0xff]));
        assert!(!valid_value(b"a\r\nb"));
        assert!(!valid_value(&[0x00]));
        assert!(!valid_value(&[0x7f]));
    }
}
