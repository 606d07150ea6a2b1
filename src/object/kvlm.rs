use crate::error::{Error, Result};

/// key-value list with message, the record format shared by commits and tags
///
/// fields keep their insertion order and a key may carry several values
/// (`parent` on a merge commit). serialization is a fixed point: parsing
/// then re-serializing yields byte-identical output, which matters because
/// an object's digest is computed over this serialization.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Kvlm {
    fields: Vec<(String, Vec<Vec<u8>>)>,
    message: Vec<u8>,
}

impl Kvlm {
    /// create an empty record
    pub fn new() -> Self {
        Self::default()
    }

    /// parse the record format
    ///
    /// each field line is `key SP value NL`; a physical line starting with a
    /// space continues the previous value (the space is stripped). the first
    /// bare newline separates fields from the free-text message.
    pub fn parse(raw: &[u8]) -> Result<Self> {
        let mut fields: Vec<(String, Vec<Vec<u8>>)> = Vec::new();
        let mut pos = 0;

        loop {
            if raw.get(pos) == Some(&b'\n') {
                // blank line: everything after is the message
                let message = raw[pos + 1..].to_vec();
                return Ok(Self { fields, message });
            }

            let spc = find_byte(raw, b' ', pos)
                .ok_or_else(|| Error::CorruptObject("record field without value".into()))?;
            let nl = find_byte(raw, b'\n', pos)
                .ok_or_else(|| Error::CorruptObject("unterminated record field".into()))?;
            if nl < spc {
                return Err(Error::CorruptObject("record field without key".into()));
            }

            let key = std::str::from_utf8(&raw[pos..spc])
                .map_err(|_| Error::CorruptObject("non-utf8 record key".into()))?
                .to_string();

            // value ends at the first newline not followed by a space
            let mut end = spc;
            loop {
                end = find_byte(raw, b'\n', end + 1)
                    .ok_or_else(|| Error::CorruptObject("missing message separator".into()))?;
                if raw.get(end + 1) != Some(&b' ') {
                    break;
                }
            }

            let value = unescape(&raw[spc + 1..end]);
            match fields.iter_mut().find(|(k, _)| *k == key) {
                Some((_, values)) => values.push(value),
                None => fields.push((key, vec![value])),
            }

            pos = end + 1;
        }
    }

    /// serialize to the record format
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for (key, values) in &self.fields {
            for value in values {
                out.extend_from_slice(key.as_bytes());
                out.push(b' ');
                out.extend_from_slice(&escape(value));
                out.push(b'\n');
            }
        }
        out.push(b'\n');
        out.extend_from_slice(&self.message);
        out
    }

    /// first value for a key
    pub fn get(&self, key: &str) -> Option<&[u8]> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, values)| values[0].as_slice())
    }

    /// all values for a key
    pub fn get_all(&self, key: &str) -> &[Vec<u8>] {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, values)| values.as_slice())
            .unwrap_or(&[])
    }

    /// set a key to a single value, replacing any existing values
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Vec<u8>>) {
        let key = key.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(k, _)| *k == key) {
            Some((_, values)) => *values = vec![value],
            None => self.fields.push((key, vec![value])),
        }
    }

    /// append a value to a key, keeping existing values
    pub fn append(&mut self, key: impl Into<String>, value: impl Into<Vec<u8>>) {
        let key = key.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(k, _)| *k == key) {
            Some((_, values)) => values.push(value),
            None => self.fields.push((key, vec![value])),
        }
    }

    /// the free-text message
    pub fn message(&self) -> &[u8] {
        &self.message
    }

    /// replace the message
    pub fn set_message(&mut self, message: impl Into<Vec<u8>>) {
        self.message = message.into();
    }
}

fn find_byte(haystack: &[u8], needle: u8, from: usize) -> Option<usize> {
    haystack[from..]
        .iter()
        .position(|&b| b == needle)
        .map(|i| from + i)
}

/// escape newlines for storage: NL becomes NL SP
fn escape(value: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(value.len());
    for &b in value {
        out.push(b);
        if b == b'\n' {
            out.push(b' ');
        }
    }
    out
}

/// undo continuation-line escaping: NL SP collapses to NL
fn unescape(raw: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        if raw[i] == b'\n' && raw.get(i + 1) == Some(&b' ') {
            out.push(b'\n');
            i += 2;
        } else {
            out.push(raw[i]);
            i += 1;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple() {
        let raw = b"tree 29ff16c9c14e2652b22f8b78bb08a5a07930c147\nauthor A <a@b> 0 +0000\n\nhello\n";
        let kvlm = Kvlm::parse(raw).unwrap();

        assert_eq!(
            kvlm.get("tree").unwrap(),
            b"29ff16c9c14e2652b22f8b78bb08a5a07930c147"
        );
        assert_eq!(kvlm.message(), b"hello\n");
    }

    #[test]
    fn test_serialize_is_fixed_point() {
        let raw: &[u8] = b"tree 29ff16c9c14e2652b22f8b78bb08a5a07930c147\n\
parent 1111111111111111111111111111111111111111\n\
parent 2222222222222222222222222222222222222222\n\
author A <a@b> 1700000000 +0100\n\
committer A <a@b> 1700000000 +0100\n\
gpgsig -----BEGIN-----\n \n line two\n -----END-----\n\
\n\
multi-line\nmessage body\n";
        let kvlm = Kvlm::parse(raw).unwrap();
        assert_eq!(kvlm.serialize(), raw);
    }

    #[test]
    fn test_repeated_key_accumulates() {
        let raw = b"parent 1111111111111111111111111111111111111111\nparent 2222222222222222222222222222222222222222\n\nm";
        let kvlm = Kvlm::parse(raw).unwrap();

        let parents = kvlm.get_all("parent");
        assert_eq!(parents.len(), 2);
        assert_eq!(parents[0], b"1111111111111111111111111111111111111111");
        assert_eq!(parents[1], b"2222222222222222222222222222222222222222");
    }

    #[test]
    fn test_continuation_lines_collapse() {
        let raw = b"note first\n second\n third\n\nmsg";
        let kvlm = Kvlm::parse(raw).unwrap();

        assert_eq!(kvlm.get("note").unwrap(), b"first\nsecond\nthird");
    }

    #[test]
    fn test_multiline_value_roundtrip() {
        let mut kvlm = Kvlm::new();
        kvlm.set("note", b"line one\nline two\nline three".to_vec());
        kvlm.set_message(b"the message\n".to_vec());

        let bytes = kvlm.serialize();
        let parsed = Kvlm::parse(&bytes).unwrap();

        assert_eq!(parsed, kvlm);
        assert_eq!(parsed.serialize(), bytes);
    }

    #[test]
    fn test_empty_message() {
        let raw = b"key value\n\n";
        let kvlm = Kvlm::parse(raw).unwrap();
        assert_eq!(kvlm.message(), b"");
        assert_eq!(kvlm.serialize(), raw);
    }

    #[test]
    fn test_message_only() {
        let raw = b"\njust a message\n";
        let kvlm = Kvlm::parse(raw).unwrap();
        assert!(kvlm.get("tree").is_none());
        assert_eq!(kvlm.message(), b"just a message\n");
    }

    #[test]
    fn test_missing_separator_is_corrupt() {
        let raw = b"key value\n";
        assert!(matches!(
            Kvlm::parse(raw),
            Err(Error::CorruptObject(_))
        ));
    }

    #[test]
    fn test_set_replaces_append_accumulates() {
        let mut kvlm = Kvlm::new();
        kvlm.set("parent", b"one".to_vec());
        kvlm.append("parent", b"two".to_vec());
        assert_eq!(kvlm.get_all("parent").len(), 2);

        kvlm.set("parent", b"only".to_vec());
        assert_eq!(kvlm.get_all("parent"), &[b"only".to_vec()]);
    }
}
