use crate::{
    boxes::{BoxHeader, BoxKey, FourCC, Mp4Box, RegularBox},
    cursor::ByteCursor,
    error::{Error, Result},
    known_boxes::KnownBox,
    metadata::{Diagnostic, MetadataEntry, MetadataExtractor},
    parser::{DecodeContext, MIN_HEADER_SIZE, decode_box, read_box_header},
    registry::{Registry, default_registry},
    stream::{Progress, StreamParser},
};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

/// Chunk size used when pulling from a reader.
const READ_CHUNK: usize = 64 * 1024;

/// Which result categories a parse should materialize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Fields {
    /// The box tree.
    pub structure: bool,
    /// The flattened metadata list.
    pub metadata: bool,
}

impl Default for Fields {
    fn default() -> Self {
        Fields {
            structure: true,
            metadata: true,
        }
    }
}

impl Fields {
    pub fn structure_only() -> Self {
        Fields {
            structure: true,
            metadata: false,
        }
    }

    pub fn metadata_only() -> Self {
        Fields {
            structure: false,
            metadata: true,
        }
    }

    /// Whether a top-level box can be recorded (or dropped) without reading its payload.
    pub(crate) fn skips_top_level(&self, h: &BoxHeader, registry: &Registry) -> bool {
        if self.structure {
            let key = match h.uuid {
                Some(u) => BoxKey::Uuid(u),
                None => BoxKey::FourCC(h.typ),
            };
            return !registry.contains(&key) && !KnownBox::from(h.typ).is_container();
        }
        // metadata only lives in moov and top-level meta
        !(self.metadata && (h.typ == FourCC::MOOV || h.typ == FourCC::META))
    }

    pub(crate) fn decode_context<'r>(&self, registry: &'r Registry) -> DecodeContext<'r> {
        DecodeContext {
            sample_descriptions: self.structure,
            ..DecodeContext::new(registry)
        }
    }
}

/// Parse configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParseOptions {
    pub fields: Fields,
    /// Only consider the first `size_hint` bytes of the source.
    pub size_hint: Option<u64>,
}

impl ParseOptions {
    pub fn with_fields(mut self, fields: Fields) -> Self {
        self.fields = fields;
        self
    }

    pub fn with_size_hint(mut self, size_hint: u64) -> Self {
        self.size_hint = Some(size_hint);
        self
    }
}

/// Result of a parse. Categories that were not requested stay empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParseOutput {
    pub structure: Vec<Mp4Box>,
    pub metadata: Vec<MetadataEntry>,
    pub diagnostics: Vec<Diagnostic>,
}

/// True if `prefix` starts like an ISO-BMFF file (`ftyp` at bytes 4..8).
pub fn is_iso_bmff(prefix: &[u8]) -> bool {
    prefix.len() >= 8 && &prefix[4..8] == b"ftyp"
}

/// Parse an in-memory ISO-BMFF file.
///
/// Input that is not ISO-BMFF yields an empty [`ParseOutput`], not an error.
///
/// # Example
/// ```no_run
/// use bmffmeta::{ParseOptions, parse_bytes};
///
/// let data = std::fs::read("video.mov")?;
/// let out = parse_bytes(&data, &ParseOptions::default())?;
/// for entry in &out.metadata {
///     println!("{} = {}", entry.key, entry.value);
/// }
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn parse_bytes(data: &[u8], options: &ParseOptions) -> Result<ParseOutput> {
    let len = options
        .size_hint
        .map_or(data.len(), |h| h.min(data.len() as u64) as usize);
    let data = &data[..len];

    if !is_iso_bmff(data) {
        tracing::debug!("no ftyp signature, not an ISO-BMFF source");
        return Ok(ParseOutput::default());
    }

    let registry = default_registry();
    let fields = options.fields;
    let ctx = fields.decode_context(registry);
    let mut cur = ByteCursor::new(data);
    let mut extractor = MetadataExtractor::new();
    let mut structure = Vec::new();

    while cur.remaining() >= MIN_HEADER_SIZE {
        let h = read_box_header(&mut cur)?;
        if h.end() > cur.end() {
            return Err(Error::OutOfBounds {
                offset: h.start,
                needed: h.size,
                available: cur.end() - h.start,
            });
        }

        let b = if fields.skips_top_level(&h, registry) {
            Mp4Box::RegularBox(RegularBox::leaf(&h))
        } else {
            decode_box(&h, cur.sub_cursor(h.payload_start(), h.end())?, ctx)?
        };
        tracing::debug!(offset = h.start, size = h.size, box_type = %h.typ, "top-level box");

        if fields.metadata {
            extractor.visit_top_level(&b, &cur);
        }
        if fields.structure {
            structure.push(b);
        }
        cur.seek(h.end())?;
    }

    let meta = extractor.finish();
    Ok(ParseOutput {
        structure,
        metadata: meta.entries,
        diagnostics: meta.diagnostics,
    })
}

/// Parse from a seekable reader without loading skipped payloads (`mdat`) into memory.
pub fn parse_reader<R: Read + Seek>(mut r: R, options: &ParseOptions) -> Result<ParseOutput> {
    let len = r.seek(SeekFrom::End(0))?;
    r.seek(SeekFrom::Start(0))?;
    let limit = options.size_hint.map_or(len, |h| h.min(len));

    let mut parser = StreamParser::new(options.clone().with_size_hint(limit));
    let mut buf = vec![0u8; READ_CHUNK];
    let mut pos = 0u64;
    let mut progress = parser.push(&[])?;

    while let Progress::NeedMore { offset, .. } = progress {
        if offset > pos && offset <= limit && parser.skip_to(offset) {
            r.seek(SeekFrom::Start(offset))?;
            pos = offset;
        }
        if pos >= limit {
            break;
        }
        let want = (limit - pos).min(READ_CHUNK as u64) as usize;
        let n = r.read(&mut buf[..want])?;
        if n == 0 {
            break;
        }
        pos += n as u64;
        progress = parser.push(&buf[..n])?;
    }

    parser.finish()
}

/// Open and parse a file.
pub fn parse_file(path: impl AsRef<Path>, options: &ParseOptions) -> Result<ParseOutput> {
    let f = File::open(path)?;
    parse_reader(f, options)
}
