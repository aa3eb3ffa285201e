//! Flattening of QuickTime / iTunes style key-value metadata.
//!
//! Metadata lives in `meta` boxes holding an optional `keys` table and an
//! `ilst` item list, and (QuickTime only) in `©xxx` text atoms directly under
//! `udta`. The extractor walks an already built box tree and re-reads the raw
//! bytes of those leaves by offset, so the tree itself stays free of
//! metadata-specific variants.
//!
//! Output order is stable: every file-level entry comes before every track
//! entry, tracks follow box order, and items keep their table order.

use crate::boxes::{FourCC, Mp4Box};
use crate::cursor::ByteCursor;
use crate::parser::{MIN_HEADER_SIZE, read_box_header};
use crate::util::payload_range;
use serde::Serialize;

const FREEFORM: FourCC = FourCC(*b"----");

/// A decoded metadata value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Text(String),
    Int(i64),
    UInt(u64),
    Float(f64),
}

impl MetadataValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetadataValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl std::fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetadataValue::Text(s) => write!(f, "{}", s),
            MetadataValue::Int(v) => write!(f, "{}", v),
            MetadataValue::UInt(v) => write!(f, "{}", v),
            MetadataValue::Float(v) => write!(f, "{}", v),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetadataEntry {
    /// Reverse-DNS key (`com.apple.quicktime.make`) or a 4CC such as `©nam`.
    pub key: String,
    /// Owning track, `None` for file-level metadata.
    pub track_id: Option<u32>,
    pub value: MetadataValue,
}

/// A metadata item that could not be decoded. Never fatal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub offset: u64,
    pub message: String,
}

/// Entries plus the diagnostics for everything that was skipped.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetadataList {
    pub entries: Vec<MetadataEntry>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Extract all metadata from a tree parsed over `data` (offsets relative to `data[0]`).
pub fn extract_metadata(boxes: &[Mp4Box], data: &[u8]) -> MetadataList {
    let source = ByteCursor::new(data);
    let mut ex = MetadataExtractor::new();
    for b in boxes {
        ex.visit_top_level(b, &source);
    }
    ex.finish()
}

/// Incremental extractor, fed one top-level box at a time.
#[derive(Debug, Default)]
pub struct MetadataExtractor {
    file_level: Vec<MetadataEntry>,
    tracks: Vec<MetadataEntry>,
    diagnostics: Vec<Diagnostic>,
}

#[derive(Clone, Copy)]
enum Scope {
    File,
    Track(Option<u32>),
}

impl MetadataExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// `source` must cover every byte of `b`.
    pub fn visit_top_level(&mut self, b: &Mp4Box, source: &ByteCursor<'_>) {
        match &b.box_type().0 {
            b"moov" => {
                for child in b.children() {
                    match &child.box_type().0 {
                        b"meta" => self.read_meta(child, source, Scope::File),
                        b"udta" => self.read_udta(child, source, Scope::File),
                        b"trak" => self.read_trak(child, source),
                        _ => {}
                    }
                }
            }
            b"meta" => self.read_meta(b, source, Scope::File),
            _ => {}
        }
    }

    pub fn finish(self) -> MetadataList {
        let mut entries = self.file_level;
        entries.extend(self.tracks);
        MetadataList {
            entries,
            diagnostics: self.diagnostics,
        }
    }

    fn diagnose(&mut self, offset: u64, message: String) {
        tracing::warn!(offset, "{}", message);
        self.diagnostics.push(Diagnostic { offset, message });
    }

    fn push(&mut self, scope: Scope, key: String, value: MetadataValue) {
        match scope {
            Scope::File => self.file_level.push(MetadataEntry {
                key,
                track_id: None,
                value,
            }),
            Scope::Track(track_id) => self.tracks.push(MetadataEntry {
                key,
                track_id,
                value,
            }),
        }
    }

    fn read_trak(&mut self, trak: &Mp4Box, source: &ByteCursor<'_>) {
        let track_id = match trak.child(FourCC::TKHD) {
            Some(Mp4Box::TkhdBox(t)) if t.track_id != 0 => Some(t.track_id),
            _ => None,
        };
        if track_id.is_none() {
            tracing::debug!(offset = trak.offset(), "track without a usable tkhd, its entries carry no track id");
        }

        for child in trak.children() {
            match &child.box_type().0 {
                b"meta" => self.read_meta(child, source, Scope::Track(track_id)),
                b"udta" => self.read_udta(child, source, Scope::Track(track_id)),
                _ => {}
            }
        }
    }

    fn read_udta(&mut self, udta: &Mp4Box, source: &ByteCursor<'_>, scope: Scope) {
        for child in udta.children() {
            let typ = child.box_type();
            if typ == FourCC::META {
                self.read_meta(child, source, scope);
            } else if typ.0[0] == 0xA9 {
                self.read_text_atom(child, source, scope);
            }
        }
    }

    fn payload<'a>(&mut self, b: &Mp4Box, source: &ByteCursor<'a>) -> Option<ByteCursor<'a>> {
        let (start, end) = payload_range(b);
        match source.sub_cursor(start, end) {
            Ok(c) => Some(c),
            Err(e) => {
                self.diagnose(b.offset(), format!("'{}' payload not readable: {}", b.box_type(), e));
                None
            }
        }
    }

    fn read_meta(&mut self, meta: &Mp4Box, source: &ByteCursor<'_>, scope: Scope) {
        let keys = match meta.child(FourCC::KEYS) {
            Some(k) => match self.payload(k, source) {
                Some(mut r) => Some(self.read_keys(k.offset(), &mut r)),
                None => None,
            },
            None => None,
        };

        if let Some(ilst) = meta.child(FourCC::ILST) {
            if let Some(mut r) = self.payload(ilst, source) {
                self.read_ilst(&mut r, keys.as_deref(), scope);
            }
        }
    }

    /// `keys`: version/flags, count, then (size, namespace, name) per key.
    fn read_keys(&mut self, offset: u64, r: &mut ByteCursor<'_>) -> Vec<String> {
        let mut keys = Vec::new();
        let count = match r.skip(4).and_then(|_| r.read_u32()) {
            Ok(n) => n,
            Err(e) => {
                self.diagnose(offset, format!("keys table header unreadable: {}", e));
                return keys;
            }
        };

        for i in 0..count {
            let at = r.position();
            let entry = r.read_u32().and_then(|size| {
                if size < 8 {
                    return Err(crate::Error::malformed(at, FourCC::KEYS, format!("key size {}", size)));
                }
                let _namespace = r.read_fourcc()?;
                r.read_bytes(size as u64 - 8)
            });
            match entry {
                Ok(name) => keys.push(String::from_utf8_lossy(name).into_owned()),
                Err(e) => {
                    self.diagnose(at, format!("keys entry {} of {} unreadable: {}", i + 1, count, e));
                    break;
                }
            }
        }
        keys
    }

    fn read_ilst(&mut self, r: &mut ByteCursor<'_>, keys: Option<&[String]>, scope: Scope) {
        while r.remaining() >= MIN_HEADER_SIZE {
            let h = match read_box_header(r) {
                Ok(h) => h,
                Err(e) => {
                    self.diagnose(r.position(), format!("ilst item header unreadable: {}", e));
                    return;
                }
            };
            let mut item = match r.sub_cursor(h.payload_start(), h.end()) {
                Ok(c) => c,
                Err(e) => {
                    self.diagnose(h.start, format!("ilst item overruns ilst: {}", e));
                    return;
                }
            };

            if let Some(key) = self.resolve_key(h.start, h.typ, keys) {
                self.read_item(h.start, key, &mut item, scope);
            }

            if r.seek(h.end()).is_err() {
                return;
            }
        }
    }

    fn resolve_key(&mut self, offset: u64, typ: FourCC, keys: Option<&[String]>) -> Option<String> {
        match keys {
            Some(keys) if typ.0[0] == 0 => {
                let index = typ.as_u32() as usize;
                if index >= 1 && index <= keys.len() {
                    Some(keys[index - 1].clone())
                } else {
                    self.diagnose(
                        offset,
                        format!("item refers to key {} but the keys table has {}", index, keys.len()),
                    );
                    None
                }
            }
            _ => Some(typ.as_latin1()),
        }
    }

    /// Item children: one or more `data`, plus `mean`/`name` for freeform items.
    fn read_item(&mut self, offset: u64, key: String, r: &mut ByteCursor<'_>, scope: Scope) {
        let mut values = Vec::new();
        let mut mean = None;
        let mut name = None;

        while r.remaining() >= MIN_HEADER_SIZE {
            let h = match read_box_header(r) {
                Ok(h) => h,
                Err(e) => {
                    self.diagnose(r.position(), format!("'{}' item child unreadable: {}", key, e));
                    break;
                }
            };
            let mut body = match r.sub_cursor(h.payload_start(), h.end()) {
                Ok(c) => c,
                Err(e) => {
                    self.diagnose(h.start, format!("'{}' item child overruns item: {}", key, e));
                    break;
                }
            };

            match &h.typ.0 {
                b"data" => {
                    if let Some(v) = self.read_data(h.start, &key, &mut body) {
                        values.push(v);
                    }
                }
                b"mean" | b"name" => {
                    // version/flags, then the string
                    let text = body
                        .skip(4)
                        .map(|_| String::from_utf8_lossy(body.read_rest()).into_owned())
                        .ok();
                    if h.typ.0 == *b"mean" {
                        mean = text;
                    } else {
                        name = text;
                    }
                }
                _ => {}
            }

            if r.seek(h.end()).is_err() {
                break;
            }
        }

        let key = if key.as_bytes() == FREEFORM.0 {
            match (mean, name) {
                (Some(m), Some(n)) => format!("----:{}:{}", m, n),
                _ => {
                    self.diagnose(offset, "freeform item without mean/name".to_string());
                    return;
                }
            }
        } else {
            key
        };

        if values.is_empty() {
            tracing::debug!(offset, key = %key, "metadata item carries no decodable value");
        }
        for v in values {
            self.push(scope, key.clone(), v);
        }
    }

    /// `data`: type indicator (type set byte + 24-bit well-known type), locale, value.
    fn read_data(&mut self, offset: u64, key: &str, r: &mut ByteCursor<'_>) -> Option<MetadataValue> {
        let indicator = match r.read_u32().and_then(|t| r.skip(4).map(|_| t)) {
            Ok(t) => t,
            Err(e) => {
                self.diagnose(offset, format!("'{}' data header unreadable: {}", key, e));
                return None;
            }
        };
        let type_set = indicator >> 24;
        let well_known = indicator & 0x00FF_FFFF;
        if type_set != 0 {
            self.diagnose(offset, format!("'{}' uses type set {}, not supported", key, type_set));
            return None;
        }

        let bytes = r.read_rest();
        match decode_value(well_known, bytes) {
            Ok(v) => Some(v),
            Err(reason) => {
                self.diagnose(offset, format!("'{}': {}", key, reason));
                None
            }
        }
    }

    fn read_text_atom(&mut self, atom: &Mp4Box, source: &ByteCursor<'_>, scope: Scope) {
        let Some(mut r) = self.payload(atom, source) else {
            return;
        };
        let key = atom.box_type().as_latin1();

        // One or more (u16 length, u16 language, text) records.
        while r.remaining() >= 4 {
            let at = r.position();
            let text = r
                .read_u16()
                .and_then(|len| r.skip(2).and_then(|_| r.read_bytes(len as u64)));
            match text {
                Ok(t) => self.push(scope, key.clone(), MetadataValue::Text(String::from_utf8_lossy(t).into_owned())),
                Err(e) => {
                    self.diagnose(at, format!("'{}' text record unreadable: {}", key, e));
                    return;
                }
            }
        }
    }
}

/// Interpret raw value bytes according to a QuickTime well-known data type.
pub fn decode_value(well_known: u32, bytes: &[u8]) -> Result<MetadataValue, String> {
    let mut r = ByteCursor::new(bytes);
    let n = bytes.len() as u64;
    let exact = |want: u64| {
        if n == want {
            Ok(())
        } else {
            Err(format!("type {} expects {} bytes, got {}", well_known, want, n))
        }
    };
    let flexible = || {
        if matches!(n, 1 | 2 | 3 | 4 | 8) {
            Ok(())
        } else {
            Err(format!("type {} with unsupported width {}", well_known, n))
        }
    };
    let io = |e: crate::Error| e.to_string();

    match well_known {
        1 => Ok(MetadataValue::Text(String::from_utf8_lossy(bytes).into_owned())),
        2 => {
            let units: Vec<u16> = bytes.chunks_exact(2).map(|c| u16::from_be_bytes([c[0], c[1]])).collect();
            Ok(MetadataValue::Text(String::from_utf16_lossy(&units)))
        }
        21 => {
            flexible()?;
            r.read_int(n).map(MetadataValue::Int).map_err(io)
        }
        22 => {
            flexible()?;
            r.read_uint(n).map(MetadataValue::UInt).map_err(io)
        }
        23 => {
            exact(4)?;
            r.read_f32().map(|v| MetadataValue::Float(v as f64)).map_err(io)
        }
        24 => {
            exact(8)?;
            r.read_f64().map(MetadataValue::Float).map_err(io)
        }
        65 | 66 | 67 | 74 => {
            let width = match well_known {
                65 => 1,
                66 => 2,
                67 => 4,
                _ => 8,
            };
            exact(width)?;
            r.read_int(width).map(MetadataValue::Int).map_err(io)
        }
        75 | 76 | 77 | 78 => {
            let width = match well_known {
                75 => 1,
                76 => 2,
                77 => 4,
                _ => 8,
            };
            exact(width)?;
            r.read_uint(width).map(MetadataValue::UInt).map_err(io)
        }
        other => Err(format!("unsupported data type {}", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_integer_widths() {
        assert_eq!(decode_value(21, &[0xff]).unwrap(), MetadataValue::Int(-1));
        assert_eq!(decode_value(21, &[0x00, 0x17]).unwrap(), MetadataValue::Int(23));
        assert_eq!(decode_value(22, &[0x01]).unwrap(), MetadataValue::UInt(1));
        assert_eq!(decode_value(67, &[0, 0, 1, 0]).unwrap(), MetadataValue::Int(256));
        assert!(decode_value(21, &[0, 0, 0, 0, 0]).is_err());
        assert!(decode_value(77, &[0, 0]).is_err());
    }

    #[test]
    fn decodes_floats_and_text() {
        assert_eq!(
            decode_value(23, &1.5f32.to_be_bytes()).unwrap(),
            MetadataValue::Float(1.5)
        );
        assert_eq!(
            decode_value(24, &(-0.25f64).to_be_bytes()).unwrap(),
            MetadataValue::Float(-0.25)
        );
        assert_eq!(
            decode_value(1, b"Apple").unwrap(),
            MetadataValue::Text("Apple".to_string())
        );
        assert_eq!(
            decode_value(2, &[0, b'h', 0, b'i']).unwrap(),
            MetadataValue::Text("hi".to_string())
        );
    }

    #[test]
    fn unknown_type_is_an_error_not_a_panic() {
        assert!(decode_value(13, &[0xff, 0xd8]).is_err());
    }
}
