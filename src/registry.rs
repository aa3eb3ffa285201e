use crate::boxes::{
    BoxHeader, BoxKey, DimensionsBox, FourCC, FtypBox, HdlrBox, MdhdBox, Mp4Box, MvhdBox, TkhdBox,
};
use crate::cursor::ByteCursor;
use crate::error::{Error, Result};
use crate::parser::DecodeContext;
use crate::stsd::StsdDecoder;
use std::collections::HashMap;
use std::sync::OnceLock;

/// Trait for box payload decoders.
///
/// A decoder receives a cursor over exactly the payload of one box (header
/// already consumed) and returns its typed node. Returning
/// [`Error::UnsupportedFormat`] or running off the end of the payload makes the
/// dispatcher keep the box as an opaque [`RegularBox`](crate::boxes::RegularBox);
/// any other error aborts the parse.
pub trait BoxDecoder: Send + Sync {
    fn decode(
        &self,
        hdr: &BoxHeader,
        payload: &mut ByteCursor<'_>,
        ctx: DecodeContext<'_>,
    ) -> Result<Mp4Box>;
}

/// Registry of decoders keyed by `BoxKey` (4CC or UUID).
///
/// The registry is immutable once constructed; use [`Registry::with_decoder`]
/// to build it fluently.
pub struct Registry {
    map: HashMap<BoxKey, BoxDecoderEntry>,
}

struct BoxDecoderEntry {
    inner: Box<dyn BoxDecoder>,
    name: String,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            map: HashMap::new(),
        }
    }

    /// Return a new registry with the given decoder added.
    ///
    /// `name` is human-readable and used only for logging.
    pub fn with_decoder(mut self, key: BoxKey, name: &str, dec: Box<dyn BoxDecoder>) -> Self {
        self.map.insert(
            key,
            BoxDecoderEntry {
                inner: dec,
                name: name.to_string(),
            },
        );
        self
    }

    pub fn contains(&self, key: &BoxKey) -> bool {
        self.map.contains_key(key)
    }

    /// Try to decode the payload of a box using a registered decoder.
    ///
    /// Returns `None` if no decoder exists for the given key.
    pub fn decode(
        &self,
        key: &BoxKey,
        hdr: &BoxHeader,
        payload: &mut ByteCursor<'_>,
        ctx: DecodeContext<'_>,
    ) -> Option<Result<Mp4Box>> {
        self.map.get(key).map(|d| {
            tracing::trace!(decoder = %d.name, offset = hdr.start, "decoding box");
            d.inner.decode(hdr, payload, ctx)
        })
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

// ---------- Helpers ----------

fn lang_from_u16(code: u16) -> String {
    if code == 0 {
        return "und".to_string();
    }
    let c1 = ((code >> 10) & 0x1F) as u8 + 0x60;
    let c2 = ((code >> 5) & 0x1F) as u8 + 0x60;
    let c3 = (code & 0x1F) as u8 + 0x60;
    format!("{}{}{}", c1 as char, c2 as char, c3 as char)
}

// ---------- Decoders ----------

// ftyp: major + minor + compatible brands
pub struct FtypDecoder;

impl BoxDecoder for FtypDecoder {
    fn decode(&self, hdr: &BoxHeader, r: &mut ByteCursor<'_>, _ctx: DecodeContext<'_>) -> Result<Mp4Box> {
        if r.remaining() < 8 {
            return Err(Error::unsupported(
                hdr.start,
                hdr.typ,
                format!("payload too short ({} bytes)", r.remaining()),
            ));
        }
        let major_brand = r.read_fourcc()?;
        let minor_version = r.read_u32()?;

        let mut compatible_brands = Vec::new();
        while r.remaining() >= 4 {
            compatible_brands.push(r.read_fourcc()?);
        }

        Ok(Mp4Box::FtypBox(FtypBox {
            offset: hdr.start,
            box_size: hdr.size,
            header_size: hdr.header_size,
            major_brand,
            minor_version,
            compatible_brands,
        }))
    }
}

// mvhd: timescale + duration
pub struct MvhdDecoder;

impl BoxDecoder for MvhdDecoder {
    fn decode(&self, hdr: &BoxHeader, r: &mut ByteCursor<'_>, _ctx: DecodeContext<'_>) -> Result<Mp4Box> {
        let (version, _flags) = r.read_version_flags()?;

        let (creation_time, modification_time, timescale, duration) = if version == 1 {
            (r.read_u64()?, r.read_u64()?, r.read_u32()?, r.read_u64()?)
        } else {
            let creation = r.read_u32()? as u64;
            let modification = r.read_u32()? as u64;
            let ts = r.read_u32()?;
            let dur = r.read_u32()?;
            // all ones means "unknown" in both widths
            let dur = if dur == u32::MAX { u64::MAX } else { dur as u64 };
            (creation, modification, ts, dur)
        };

        let rate = r.read_fixed16_16()?;
        let volume = r.read_fixed8_8()?;
        // reserved (10) + matrix (36) + pre_defined (24)
        r.skip(10 + 36 + 24)?;
        let next_track_id = r.read_u32()?;

        let duration_seconds = if timescale > 0 && duration != u64::MAX {
            Some(duration as f64 / timescale as f64)
        } else {
            None
        };

        Ok(Mp4Box::MvhdBox(MvhdBox {
            offset: hdr.start,
            box_size: hdr.size,
            header_size: hdr.header_size,
            version,
            creation_time,
            modification_time,
            timescale,
            duration,
            duration_seconds,
            rate,
            volume,
            next_track_id,
        }))
    }
}

// tkhd: track id, duration, width, height
pub struct TkhdDecoder;

impl BoxDecoder for TkhdDecoder {
    fn decode(&self, hdr: &BoxHeader, r: &mut ByteCursor<'_>, _ctx: DecodeContext<'_>) -> Result<Mp4Box> {
        let (version, flags) = r.read_version_flags()?;

        let (track_id, duration) = if version == 1 {
            // creation_time (8), modification_time (8), track_id (4), reserved (4), duration (8)
            r.skip(16)?;
            let track_id = r.read_u32()?;
            r.skip(4)?;
            (track_id, r.read_u64()?)
        } else {
            r.skip(8)?;
            let track_id = r.read_u32()?;
            r.skip(4)?;
            (track_id, r.read_u32()? as u64)
        };

        // reserved[2]
        r.skip(8)?;
        let layer = r.read_i16()?;
        let alternate_group = r.read_i16()?;
        let volume = r.read_fixed8_8()?;
        r.skip(2)?;
        // matrix
        r.skip(36)?;
        let width = r.read_fixed16_16()?;
        let height = r.read_fixed16_16()?;

        Ok(Mp4Box::TkhdBox(TkhdBox {
            offset: hdr.start,
            box_size: hdr.size,
            header_size: hdr.header_size,
            version,
            flags,
            track_id,
            duration,
            layer,
            alternate_group,
            volume,
            width,
            height,
        }))
    }
}

// mdhd: timescale, duration, language
pub struct MdhdDecoder;

impl BoxDecoder for MdhdDecoder {
    fn decode(&self, hdr: &BoxHeader, r: &mut ByteCursor<'_>, _ctx: DecodeContext<'_>) -> Result<Mp4Box> {
        let (version, _flags) = r.read_version_flags()?;
        let (timescale, duration) = if version == 1 {
            r.skip(16)?;
            (r.read_u32()?, r.read_u64()?)
        } else {
            r.skip(8)?;
            (r.read_u32()?, r.read_u32()? as u64)
        };
        let language = lang_from_u16(r.read_u16()?);

        Ok(Mp4Box::MdhdBox(MdhdBox {
            offset: hdr.start,
            box_size: hdr.size,
            header_size: hdr.header_size,
            version,
            timescale,
            duration,
            language,
        }))
    }
}

// hdlr: handler type + name
pub struct HdlrDecoder;

impl BoxDecoder for HdlrDecoder {
    fn decode(&self, hdr: &BoxHeader, r: &mut ByteCursor<'_>, _ctx: DecodeContext<'_>) -> Result<Mp4Box> {
        // version/flags (4) + pre_defined (4)
        r.skip(8)?;
        let handler_type = r.read_fourcc()?;
        // reserved (3 * 4 bytes)
        r.skip(12)?;

        let mut name_bytes = r.read_rest();
        // QuickTime writes a Pascal string, ISO a C string
        if let Some((&len, rest)) = name_bytes.split_first() {
            if len as usize == rest.len() && len != 0 {
                name_bytes = rest;
            }
        }
        while let Some((&0, rest)) = name_bytes.split_last() {
            name_bytes = rest;
        }

        Ok(Mp4Box::HdlrBox(HdlrBox {
            offset: hdr.start,
            box_size: hdr.size,
            header_size: hdr.header_size,
            handler_type,
            name: String::from_utf8_lossy(name_bytes).to_string(),
        }))
    }
}

// dims: width + height as two u32
pub struct DimsDecoder;

impl BoxDecoder for DimsDecoder {
    fn decode(&self, hdr: &BoxHeader, r: &mut ByteCursor<'_>, _ctx: DecodeContext<'_>) -> Result<Mp4Box> {
        let width = r.read_u32()?;
        let height = r.read_u32()?;
        Ok(Mp4Box::DimensionsBox(DimensionsBox {
            offset: hdr.start,
            box_size: hdr.size,
            header_size: hdr.header_size,
            width,
            height,
        }))
    }
}

// ---------- Default registry ----------

fn build_default_registry() -> Registry {
    Registry::new()
        .with_decoder(BoxKey::FourCC(FourCC::FTYP), "ftyp", Box::new(FtypDecoder))
        .with_decoder(BoxKey::FourCC(FourCC(*b"mvhd")), "mvhd", Box::new(MvhdDecoder))
        .with_decoder(BoxKey::FourCC(FourCC::TKHD), "tkhd", Box::new(TkhdDecoder))
        .with_decoder(BoxKey::FourCC(FourCC(*b"mdhd")), "mdhd", Box::new(MdhdDecoder))
        .with_decoder(BoxKey::FourCC(FourCC::HDLR), "hdlr", Box::new(HdlrDecoder))
        .with_decoder(BoxKey::FourCC(FourCC(*b"dims")), "dims", Box::new(DimsDecoder))
        .with_decoder(BoxKey::FourCC(FourCC::STSD), "stsd", Box::new(StsdDecoder))
}

/// The built-in decoders, shared read-only by every parse.
pub fn default_registry() -> &'static Registry {
    static DEFAULT: OnceLock<Registry> = OnceLock::new();
    DEFAULT.get_or_init(build_default_registry)
}
