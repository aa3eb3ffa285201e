use serde::{Serialize, Serializer};
use std::fmt;

#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct FourCC(pub [u8; 4]);

impl FourCC {
    pub const FTYP: Self = Self(*b"ftyp");
    pub const MOOV: Self = Self(*b"moov");
    pub const TRAK: Self = Self(*b"trak");
    pub const TKHD: Self = Self(*b"tkhd");
    pub const UDTA: Self = Self(*b"udta");
    pub const META: Self = Self(*b"meta");
    pub const HDLR: Self = Self(*b"hdlr");
    pub const KEYS: Self = Self(*b"keys");
    pub const ILST: Self = Self(*b"ilst");
    pub const DATA: Self = Self(*b"data");
    pub const STSD: Self = Self(*b"stsd");
    pub const MEBX: Self = Self(*b"mebx");
    pub const UUID: Self = Self(*b"uuid");

    pub fn from_str(s: &str) -> Option<Self> {
        let b = s.as_bytes();
        if b.len() == 4 {
            Some(FourCC([b[0], b[1], b[2], b[3]]))
        } else {
            None
        }
    }

    pub fn as_u32(&self) -> u32 {
        u32::from_be_bytes(self.0)
    }

    pub fn as_str_lossy(&self) -> String {
        self.0
            .iter()
            .map(|&c| if (32..=126).contains(&c) { c as char } else { '.' })
            .collect()
    }

    /// Latin-1 rendering, so QuickTime's `0xA9` prefix comes out as `©`.
    pub fn as_latin1(&self) -> String {
        self.0.iter().map(|&c| c as char).collect()
    }
}

impl fmt::Debug for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str_lossy())
    }
}

impl fmt::Display for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str_lossy())
    }
}

impl Serialize for FourCC {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&self.as_latin1())
    }
}

/// Registry lookup key: plain 4CC, or the extended type of a `uuid` box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BoxKey {
    FourCC(FourCC),
    Uuid([u8; 16]),
}

/// How the size field of a header was encoded on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeField {
    /// 32-bit size.
    Compact,
    /// `size == 1`, 64-bit size after the type.
    Large,
    /// `size == 0`, box runs to the end of its enclosing region.
    ToEnd,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoxHeader {
    pub start: u64,       // absolute offset of header start
    pub size: u64,        // resolved total size including header
    pub header_size: u64, // 8, 16, 24 or 32
    pub typ: FourCC,
    pub uuid: Option<[u8; 16]>,
    pub size_field: SizeField,
}

impl BoxHeader {
    pub fn payload_start(&self) -> u64 {
        self.start + self.header_size
    }

    pub fn end(&self) -> u64 {
        self.start.saturating_add(self.size)
    }

    /// Re-emit the header exactly as it was laid out on disk.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.header_size as usize);
        let size32: u32 = match self.size_field {
            SizeField::Compact => self.size as u32,
            SizeField::Large => 1,
            SizeField::ToEnd => 0,
        };
        out.extend_from_slice(&size32.to_be_bytes());
        out.extend_from_slice(&self.typ.0);
        if self.size_field == SizeField::Large {
            out.extend_from_slice(&self.size.to_be_bytes());
        }
        if let Some(uuid) = &self.uuid {
            out.extend_from_slice(uuid);
        }
        out
    }
}

/// A decoded box.
///
/// Anything without a typed decoder ends up as [`RegularBox`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Mp4Box {
    RegularBox(RegularBox),
    FtypBox(FtypBox),
    MvhdBox(MvhdBox),
    TkhdBox(TkhdBox),
    MdhdBox(MdhdBox),
    HdlrBox(HdlrBox),
    DimensionsBox(DimensionsBox),
    StsdBox(StsdBox),
}

impl Mp4Box {
    pub fn offset(&self) -> u64 {
        match self {
            Mp4Box::RegularBox(b) => b.offset,
            Mp4Box::FtypBox(b) => b.offset,
            Mp4Box::MvhdBox(b) => b.offset,
            Mp4Box::TkhdBox(b) => b.offset,
            Mp4Box::MdhdBox(b) => b.offset,
            Mp4Box::HdlrBox(b) => b.offset,
            Mp4Box::DimensionsBox(b) => b.offset,
            Mp4Box::StsdBox(b) => b.offset,
        }
    }

    pub fn box_size(&self) -> u64 {
        match self {
            Mp4Box::RegularBox(b) => b.box_size,
            Mp4Box::FtypBox(b) => b.box_size,
            Mp4Box::MvhdBox(b) => b.box_size,
            Mp4Box::TkhdBox(b) => b.box_size,
            Mp4Box::MdhdBox(b) => b.box_size,
            Mp4Box::HdlrBox(b) => b.box_size,
            Mp4Box::DimensionsBox(b) => b.box_size,
            Mp4Box::StsdBox(b) => b.box_size,
        }
    }

    pub fn header_size(&self) -> u64 {
        match self {
            Mp4Box::RegularBox(b) => b.header_size,
            Mp4Box::FtypBox(b) => b.header_size,
            Mp4Box::MvhdBox(b) => b.header_size,
            Mp4Box::TkhdBox(b) => b.header_size,
            Mp4Box::MdhdBox(b) => b.header_size,
            Mp4Box::HdlrBox(b) => b.header_size,
            Mp4Box::DimensionsBox(b) => b.header_size,
            Mp4Box::StsdBox(b) => b.header_size,
        }
    }

    pub fn box_type(&self) -> FourCC {
        match self {
            Mp4Box::RegularBox(b) => b.box_type,
            Mp4Box::FtypBox(_) => FourCC::FTYP,
            Mp4Box::MvhdBox(_) => FourCC(*b"mvhd"),
            Mp4Box::TkhdBox(_) => FourCC::TKHD,
            Mp4Box::MdhdBox(_) => FourCC(*b"mdhd"),
            Mp4Box::HdlrBox(_) => FourCC::HDLR,
            Mp4Box::DimensionsBox(_) => FourCC(*b"dims"),
            Mp4Box::StsdBox(_) => FourCC::STSD,
        }
    }

    /// Child boxes; empty for leaves and typed boxes.
    pub fn children(&self) -> &[Mp4Box] {
        match self {
            Mp4Box::RegularBox(b) => &b.children,
            _ => &[],
        }
    }

    pub fn child(&self, typ: FourCC) -> Option<&Mp4Box> {
        self.children().iter().find(|c| c.box_type() == typ)
    }

    /// Walk a dotted path of 4CCs below this box, first match at each step.
    pub fn find_path(&self, path: &[FourCC]) -> Option<&Mp4Box> {
        path.iter().try_fold(self, |b, &typ| b.child(typ))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegularBox {
    pub offset: u64,
    pub box_size: u64,
    pub header_size: u64,
    pub box_type: FourCC,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    pub children: Vec<Mp4Box>,
}

impl RegularBox {
    pub fn leaf(hdr: &BoxHeader) -> Self {
        Self::with_children(hdr, Vec::new())
    }

    pub fn with_children(hdr: &BoxHeader, children: Vec<Mp4Box>) -> Self {
        RegularBox {
            offset: hdr.start,
            box_size: hdr.size,
            header_size: hdr.header_size,
            box_type: hdr.typ,
            uuid: hdr.uuid.map(hex::encode),
            children,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FtypBox {
    pub offset: u64,
    pub box_size: u64,
    pub header_size: u64,
    pub major_brand: FourCC,
    pub minor_version: u32,
    pub compatible_brands: Vec<FourCC>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MvhdBox {
    pub offset: u64,
    pub box_size: u64,
    pub header_size: u64,
    pub version: u8,
    pub creation_time: u64,
    pub modification_time: u64,
    pub timescale: u32,
    pub duration: u64,
    pub duration_seconds: Option<f64>,
    pub rate: f64,
    pub volume: f64,
    pub next_track_id: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TkhdBox {
    pub offset: u64,
    pub box_size: u64,
    pub header_size: u64,
    pub version: u8,
    pub flags: u32,
    pub track_id: u32,
    pub duration: u64,
    pub layer: i16,
    pub alternate_group: i16,
    pub volume: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MdhdBox {
    pub offset: u64,
    pub box_size: u64,
    pub header_size: u64,
    pub version: u8,
    pub timescale: u32,
    pub duration: u64,
    pub language: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HdlrBox {
    pub offset: u64,
    pub box_size: u64,
    pub header_size: u64,
    pub handler_type: FourCC,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DimensionsBox {
    pub offset: u64,
    pub box_size: u64,
    pub header_size: u64,
    pub width: u32,
    pub height: u32,
}

/// Sample description table (`stsd`).
///
/// `descriptions.len() == number_of_entries` whenever decoding succeeds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StsdBox {
    pub offset: u64,
    pub box_size: u64,
    pub header_size: u64,
    pub number_of_entries: u32,
    pub descriptions: Vec<SampleDescription>,
}

/// One `stsd` entry, by sample format.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum SampleDescription {
    MebxBox(MebxBox),
    VideoEntry(VideoSampleEntry),
    AudioEntry(AudioSampleEntry),
    SampleEntry(OpaqueSampleEntry),
}

impl SampleDescription {
    pub fn format(&self) -> FourCC {
        match self {
            SampleDescription::MebxBox(e) => e.format,
            SampleDescription::VideoEntry(e) => e.format,
            SampleDescription::AudioEntry(e) => e.format,
            SampleDescription::SampleEntry(e) => e.format,
        }
    }

    pub fn box_size(&self) -> u64 {
        match self {
            SampleDescription::MebxBox(e) => e.box_size,
            SampleDescription::VideoEntry(e) => e.box_size,
            SampleDescription::AudioEntry(e) => e.box_size,
            SampleDescription::SampleEntry(e) => e.box_size,
        }
    }

    pub fn children(&self) -> &[Mp4Box] {
        match self {
            SampleDescription::MebxBox(e) => &e.children,
            SampleDescription::VideoEntry(e) => &e.children,
            SampleDescription::AudioEntry(e) => &e.children,
            SampleDescription::SampleEntry(_) => &[],
        }
    }
}

/// Timed metadata sample entry; children typically hold a `keys` table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MebxBox {
    pub offset: u64,
    pub box_size: u64,
    pub format: FourCC,
    pub data_reference_index: u16,
    pub children: Vec<Mp4Box>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VideoSampleEntry {
    pub offset: u64,
    pub box_size: u64,
    pub format: FourCC,
    pub data_reference_index: u16,
    pub width: u16,
    pub height: u16,
    pub horizontal_resolution: f64,
    pub vertical_resolution: f64,
    pub frame_count: u16,
    pub compressor_name: String,
    pub depth: u16,
    pub children: Vec<Mp4Box>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AudioSampleEntry {
    pub offset: u64,
    pub box_size: u64,
    pub format: FourCC,
    pub data_reference_index: u16,
    pub version: u16,
    pub channel_count: u32,
    pub sample_size: u32,
    pub sample_rate: f64,
    pub children: Vec<Mp4Box>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OpaqueSampleEntry {
    pub offset: u64,
    pub box_size: u64,
    pub format: FourCC,
    pub data_reference_index: u16,
}
