//! Sample description table (`stsd`) and its per-format entries.

use crate::boxes::{
    AudioSampleEntry, BoxHeader, FourCC, MebxBox, Mp4Box, OpaqueSampleEntry, SampleDescription,
    StsdBox, VideoSampleEntry,
};
use crate::cursor::ByteCursor;
use crate::error::{Error, Result};
use crate::parser::{DecodeContext, MIN_HEADER_SIZE, parse_children, read_box_header};
use crate::registry::BoxDecoder;

static VISUAL_FORMATS: &[&[u8; 4]] = &[
    b"avc1", b"avc3", b"hvc1", b"hev1", b"vp08", b"vp09", b"av01", b"mp4v", b"jpeg", b"apch",
    b"apcn", b"apcs", b"apco", b"ap4h",
];

static AUDIO_FORMATS: &[&[u8; 4]] = &[
    b"mp4a", b"ac-3", b"ec-3", b"Opus", b"fLaC", b"alac", b"lpcm", b"sowt", b"twos", b"ipcm",
];

/// Common sample entry fields: 6 reserved bytes + data_reference_index.
const SAMPLE_ENTRY_COMMON: u64 = 8;

pub struct StsdDecoder;

impl BoxDecoder for StsdDecoder {
    fn decode(&self, hdr: &BoxHeader, r: &mut ByteCursor<'_>, ctx: DecodeContext<'_>) -> Result<Mp4Box> {
        // Byte accounting problems inside stsd are fatal, never a silent fallback.
        decode_stsd(hdr, r, ctx).map_err(|e| match e {
            Error::OutOfBounds { offset, needed, .. } => Error::malformed(
                hdr.start,
                hdr.typ,
                format!("truncated at offset {} (needed {} more bytes)", offset, needed),
            ),
            other => other,
        })
    }
}

fn decode_stsd(hdr: &BoxHeader, r: &mut ByteCursor<'_>, ctx: DecodeContext<'_>) -> Result<Mp4Box> {
    // version/flags
    r.skip(4)?;
    let number_of_entries = r.read_u32()?;

    let mut descriptions = Vec::with_capacity(number_of_entries.min(16) as usize);
    for i in 0..number_of_entries {
        if r.remaining() < MIN_HEADER_SIZE {
            return Err(Error::malformed(
                hdr.start,
                hdr.typ,
                format!("declares {} entries but only {} are present", number_of_entries, i),
            ));
        }

        let eh = read_box_header(r)?;
        if eh.end() > r.end() {
            return Err(Error::malformed(
                eh.start,
                eh.typ,
                format!(
                    "sample entry {} declares {} bytes but only {} remain in stsd",
                    i,
                    eh.size,
                    r.end() - eh.start
                ),
            ));
        }

        let mut entry = r.sub_cursor(eh.payload_start(), eh.end())?;
        descriptions.push(decode_sample_entry(&eh, &mut entry, ctx.nested())?);
        r.seek(eh.end())?;
    }

    if r.remaining() > 0 {
        tracing::debug!(
            offset = r.position(),
            bytes = r.remaining(),
            "ignoring bytes after the last declared stsd entry"
        );
    }

    Ok(Mp4Box::StsdBox(StsdBox {
        offset: hdr.start,
        box_size: hdr.size,
        header_size: hdr.header_size,
        number_of_entries,
        descriptions,
    }))
}

/// Decode one entry; `ctx` is the entry's own level.
fn decode_sample_entry(
    eh: &BoxHeader,
    r: &mut ByteCursor<'_>,
    ctx: DecodeContext<'_>,
) -> Result<SampleDescription> {
    if r.remaining() < SAMPLE_ENTRY_COMMON {
        return Err(Error::malformed(
            eh.start,
            eh.typ,
            format!("sample entry payload is {} bytes, need at least 8", r.remaining()),
        ));
    }
    r.skip(6)?;
    let data_reference_index = r.read_u16()?;

    let opaque = || {
        SampleDescription::SampleEntry(OpaqueSampleEntry {
            offset: eh.start,
            box_size: eh.size,
            format: eh.typ,
            data_reference_index,
        })
    };

    if eh.typ == FourCC::MEBX {
        let children = parse_children(r, ctx.nested())?;
        return Ok(SampleDescription::MebxBox(MebxBox {
            offset: eh.start,
            box_size: eh.size,
            format: eh.typ,
            data_reference_index,
            children,
        }));
    }

    let res = if VISUAL_FORMATS.contains(&&eh.typ.0) {
        decode_video_entry(eh, data_reference_index, r, ctx)
    } else if AUDIO_FORMATS.contains(&&eh.typ.0) {
        decode_audio_entry(eh, data_reference_index, r, ctx)
    } else {
        return Ok(opaque());
    };

    match res {
        Ok(d) => Ok(d),
        Err(e @ (Error::OutOfBounds { .. } | Error::UnsupportedFormat { .. })) => {
            tracing::debug!(offset = eh.start, format = %eh.typ, "{}; keeping opaque sample entry", e);
            Ok(opaque())
        }
        Err(e) => Err(e),
    }
}

fn decode_video_entry(
    eh: &BoxHeader,
    data_reference_index: u16,
    r: &mut ByteCursor<'_>,
    ctx: DecodeContext<'_>,
) -> Result<SampleDescription> {
    // pre_defined (2) + reserved (2) + pre_defined (12)
    r.skip(16)?;
    let width = r.read_u16()?;
    let height = r.read_u16()?;
    let horizontal_resolution = r.read_fixed16_16()?;
    let vertical_resolution = r.read_fixed16_16()?;
    r.skip(4)?;
    let frame_count = r.read_u16()?;

    // Pascal string padded to 32 bytes
    let name = r.read_bytes(32)?;
    let len = (name[0] as usize).min(31);
    let compressor_name = String::from_utf8_lossy(&name[1..1 + len]).to_string();

    let depth = r.read_u16()?;
    r.skip(2)?;

    let children = parse_children(r, ctx.nested())?;
    Ok(SampleDescription::VideoEntry(VideoSampleEntry {
        offset: eh.start,
        box_size: eh.size,
        format: eh.typ,
        data_reference_index,
        width,
        height,
        horizontal_resolution,
        vertical_resolution,
        frame_count,
        compressor_name,
        depth,
        children,
    }))
}

fn decode_audio_entry(
    eh: &BoxHeader,
    data_reference_index: u16,
    r: &mut ByteCursor<'_>,
    ctx: DecodeContext<'_>,
) -> Result<SampleDescription> {
    let version = r.read_u16()?;
    // revision (2) + vendor (4)
    r.skip(6)?;
    let mut channel_count = r.read_u16()? as u32;
    let mut sample_size = r.read_u16()? as u32;
    // compression_id (2) + packet_size (2)
    r.skip(4)?;
    let mut sample_rate = r.read_u32()? as f64 / 65536.0;

    match version {
        0 => {}
        // QuickTime sound description v1: four u32 packet/frame sizes
        1 => r.skip(16)?,
        // v2 replaces the v0 fields with full-width ones
        2 => {
            r.skip(4)?;
            sample_rate = r.read_f64()?;
            channel_count = r.read_u32()?;
            r.skip(4)?;
            sample_size = r.read_u32()?;
            r.skip(12)?;
        }
        v => {
            return Err(Error::unsupported(
                eh.start,
                eh.typ,
                format!("unknown sound description version {}", v),
            ));
        }
    }

    let children = parse_children(r, ctx.nested())?;
    Ok(SampleDescription::AudioEntry(AudioSampleEntry {
        offset: eh.start,
        box_size: eh.size,
        format: eh.typ,
        data_reference_index,
        version,
        channel_count,
        sample_size,
        sample_rate,
        children,
    }))
}
