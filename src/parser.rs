use crate::boxes::{BoxHeader, BoxKey, FourCC, Mp4Box, RegularBox, SizeField};
use crate::cursor::ByteCursor;
use crate::error::{Error, Result};
use crate::known_boxes::KnownBox;
use crate::registry::Registry;

/// Size + type.
pub const MIN_HEADER_SIZE: u64 = 8;

/// Deepest nesting level accepted before giving up on a file.
pub const MAX_DEPTH: usize = 32;

/// Per-level state handed down through the recursive descent.
#[derive(Clone, Copy)]
pub struct DecodeContext<'r> {
    pub registry: &'r Registry,
    /// Nesting level of the boxes being parsed; 0 for top-level boxes.
    pub depth: usize,
    /// Decode `stsd` into typed sample descriptions.
    pub sample_descriptions: bool,
}

impl<'r> DecodeContext<'r> {
    pub fn new(registry: &'r Registry) -> Self {
        DecodeContext {
            registry,
            depth: 0,
            sample_descriptions: true,
        }
    }

    pub fn nested(self) -> Self {
        DecodeContext {
            depth: self.depth + 1,
            ..self
        }
    }

    fn wants_decoder(&self, typ: FourCC) -> bool {
        typ != FourCC::STSD || self.sample_descriptions
    }
}

pub fn read_box_header(cur: &mut ByteCursor<'_>) -> Result<BoxHeader> {
    let start = cur.position();
    let size32 = cur.read_u32()?;
    let typ = cur.read_fourcc()?;
    let mut header_size = MIN_HEADER_SIZE;

    let (size, size_field) = match size32 {
        1 => {
            header_size += 8;
            (cur.read_u64()?, SizeField::Large)
        }
        0 => (cur.end() - start, SizeField::ToEnd),
        n => (n as u64, SizeField::Compact),
    };

    let mut uuid = None;
    if typ == FourCC::UUID {
        let mut u = [0u8; 16];
        u.copy_from_slice(cur.read_bytes(16)?);
        uuid = Some(u);
        header_size += 16;
    }

    if size < header_size {
        return Err(Error::malformed(
            start,
            typ,
            format!("box size {} is smaller than its {}-byte header", size, header_size),
        ));
    }
    if start.checked_add(size).is_none() {
        return Err(Error::malformed(start, typ, "box size overflows the address space"));
    }

    Ok(BoxHeader {
        start,
        size,
        header_size,
        typ,
        uuid,
        size_field,
    })
}

/// Decode sibling boxes until fewer than a header's worth of bytes remain.
pub fn parse_children(cur: &mut ByteCursor<'_>, ctx: DecodeContext<'_>) -> Result<Vec<Mp4Box>> {
    if ctx.depth > MAX_DEPTH {
        return Err(Error::TooDeep {
            offset: cur.position(),
            depth: MAX_DEPTH,
        });
    }

    let mut kids = Vec::new();
    while cur.remaining() >= MIN_HEADER_SIZE {
        let h = read_box_header(cur)?;
        if h.end() > cur.end() {
            if ctx.depth == 0 {
                return Err(Error::OutOfBounds {
                    offset: h.start,
                    needed: h.size,
                    available: cur.end() - h.start,
                });
            }
            return Err(Error::malformed(
                h.start,
                h.typ,
                format!(
                    "declared size {} overruns its parent by {} bytes",
                    h.size,
                    h.end() - cur.end()
                ),
            ));
        }

        let payload = cur.sub_cursor(h.payload_start(), h.end())?;
        kids.push(decode_box(&h, payload, ctx)?);
        cur.seek(h.end())?;
    }
    Ok(kids)
}

/// Turn one box into its tree node: typed decoder, container, or opaque leaf.
pub fn decode_box(h: &BoxHeader, mut payload: ByteCursor<'_>, ctx: DecodeContext<'_>) -> Result<Mp4Box> {
    let key = match h.uuid {
        Some(u) => BoxKey::Uuid(u),
        None => BoxKey::FourCC(h.typ),
    };

    if ctx.wants_decoder(h.typ) {
        if let Some(res) = ctx.registry.decode(&key, h, &mut payload, ctx) {
            return match res {
                Ok(b) => Ok(b),
                Err(e @ (Error::UnsupportedFormat { .. } | Error::OutOfBounds { .. })) => {
                    tracing::warn!(offset = h.start, box_type = %h.typ, "{}; keeping as regular box", e);
                    Ok(Mp4Box::RegularBox(RegularBox::leaf(h)))
                }
                Err(e) => Err(e),
            };
        }
    }

    let kind = KnownBox::from(h.typ);
    if kind.is_container() {
        if kind == KnownBox::Meta {
            skip_meta_version(&mut payload)?;
        }
        let children = parse_children(&mut payload, ctx.nested())?;
        return Ok(Mp4Box::RegularBox(RegularBox::with_children(h, children)));
    }

    Ok(Mp4Box::RegularBox(RegularBox::leaf(h)))
}

// ISO 'meta' is a full box, QuickTime's is a plain container starting with 'hdlr'.
fn skip_meta_version(payload: &mut ByteCursor<'_>) -> Result<()> {
    if let Ok(tag) = payload.peek_at(payload.position() + 4, 4) {
        if tag == b"hdlr" {
            return Ok(());
        }
    }
    if payload.remaining() >= 4 {
        payload.skip(4)?;
    }
    Ok(())
}
