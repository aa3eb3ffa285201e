use crate::boxes::FourCC;

/// Typed view over the box types this crate knows by name.
///
/// Anything not in this list becomes `KnownBox::Unknown(fourcc)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KnownBox {
    // File-level / top-level
    Ftyp,
    Moov,
    Mdat,
    Free,
    Skip,
    Wide,
    Meta,
    Moof,
    Mfra,
    Uuid,

    // moov / trak
    Mvhd,
    Trak,
    Tkhd,
    Tref,
    Edts,
    Elst,
    Mvex,
    Udta,

    // mdia / minf
    Mdia,
    Mdhd,
    Hdlr,
    Minf,
    Vmhd,
    Smhd,
    Gmhd,
    Dinf,
    Dref,

    // stbl
    Stbl,
    Stsd,
    Stts,
    Ctts,
    Stsc,
    Stsz,
    Stco,
    Co64,
    Stss,

    // fragments
    Traf,
    Tfhd,
    Trun,

    // metadata
    Keys,
    Ilst,
    Data,
    Mean,
    Name,
    Mebx,
    Dims,

    // sample entry children
    Sinf,
    Schi,
    Wave,
    Avcc,
    Hvcc,
    Esds,
    Pasp,
    Colr,

    // Anything else
    Unknown(FourCC),
}

impl From<FourCC> for KnownBox {
    fn from(cc: FourCC) -> Self {
        match &cc.0 {
            b"ftyp" => KnownBox::Ftyp,
            b"moov" => KnownBox::Moov,
            b"mdat" => KnownBox::Mdat,
            b"free" => KnownBox::Free,
            b"skip" => KnownBox::Skip,
            b"wide" => KnownBox::Wide,
            b"meta" => KnownBox::Meta,
            b"moof" => KnownBox::Moof,
            b"mfra" => KnownBox::Mfra,
            b"uuid" => KnownBox::Uuid,

            b"mvhd" => KnownBox::Mvhd,
            b"trak" => KnownBox::Trak,
            b"tkhd" => KnownBox::Tkhd,
            b"tref" => KnownBox::Tref,
            b"edts" => KnownBox::Edts,
            b"elst" => KnownBox::Elst,
            b"mvex" => KnownBox::Mvex,
            b"udta" => KnownBox::Udta,

            b"mdia" => KnownBox::Mdia,
            b"mdhd" => KnownBox::Mdhd,
            b"hdlr" => KnownBox::Hdlr,
            b"minf" => KnownBox::Minf,
            b"vmhd" => KnownBox::Vmhd,
            b"smhd" => KnownBox::Smhd,
            b"gmhd" => KnownBox::Gmhd,
            b"dinf" => KnownBox::Dinf,
            b"dref" => KnownBox::Dref,

            b"stbl" => KnownBox::Stbl,
            b"stsd" => KnownBox::Stsd,
            b"stts" => KnownBox::Stts,
            b"ctts" => KnownBox::Ctts,
            b"stsc" => KnownBox::Stsc,
            b"stsz" => KnownBox::Stsz,
            b"stco" => KnownBox::Stco,
            b"co64" => KnownBox::Co64,
            b"stss" => KnownBox::Stss,

            b"traf" => KnownBox::Traf,
            b"tfhd" => KnownBox::Tfhd,
            b"trun" => KnownBox::Trun,

            b"keys" => KnownBox::Keys,
            b"ilst" => KnownBox::Ilst,
            b"data" => KnownBox::Data,
            b"mean" => KnownBox::Mean,
            b"name" => KnownBox::Name,
            b"mebx" => KnownBox::Mebx,
            b"dims" => KnownBox::Dims,

            b"sinf" => KnownBox::Sinf,
            b"schi" => KnownBox::Schi,
            b"wave" => KnownBox::Wave,
            b"avcC" => KnownBox::Avcc,
            b"hvcC" => KnownBox::Hvcc,
            b"esds" => KnownBox::Esds,
            b"pasp" => KnownBox::Pasp,
            b"colr" => KnownBox::Colr,

            _ => KnownBox::Unknown(cc),
        }
    }
}

impl KnownBox {
    /// Does this box *contain* child boxes (container semantics)?
    ///
    /// `ilst` and `keys` are deliberately absent: their payloads are tables
    /// read by the metadata extractor, not generic box sequences.
    pub fn is_container(&self) -> bool {
        matches!(
            self,
            KnownBox::Moov
                | KnownBox::Trak
                | KnownBox::Tref
                | KnownBox::Edts
                | KnownBox::Mvex
                | KnownBox::Udta
                | KnownBox::Meta
                | KnownBox::Mdia
                | KnownBox::Minf
                | KnownBox::Gmhd
                | KnownBox::Dinf
                | KnownBox::Stbl
                | KnownBox::Moof
                | KnownBox::Traf
                | KnownBox::Mfra
                | KnownBox::Sinf
                | KnownBox::Schi
                | KnownBox::Wave
        )
    }

    pub fn full_name(&self) -> &'static str {
        match self {
            KnownBox::Ftyp => "File Type Box",
            KnownBox::Moov => "Movie Box",
            KnownBox::Mdat => "Media Data Box",
            KnownBox::Free => "Free Space Box",
            KnownBox::Skip => "Skip Box",
            KnownBox::Wide => "Wide Box",
            KnownBox::Meta => "Metadata Box",
            KnownBox::Moof => "Movie Fragment Box",
            KnownBox::Mfra => "Movie Fragment Random Access Box",
            KnownBox::Uuid => "User Extension Box",
            KnownBox::Mvhd => "Movie Header Box",
            KnownBox::Trak => "Track Box",
            KnownBox::Tkhd => "Track Header Box",
            KnownBox::Tref => "Track Reference Box",
            KnownBox::Edts => "Edit Box",
            KnownBox::Elst => "Edit List Box",
            KnownBox::Mvex => "Movie Extends Box",
            KnownBox::Udta => "User Data Box",
            KnownBox::Mdia => "Media Box",
            KnownBox::Mdhd => "Media Header Box",
            KnownBox::Hdlr => "Handler Reference Box",
            KnownBox::Minf => "Media Information Box",
            KnownBox::Vmhd => "Video Media Header Box",
            KnownBox::Smhd => "Sound Media Header Box",
            KnownBox::Gmhd => "Generic Media Header Box",
            KnownBox::Dinf => "Data Information Box",
            KnownBox::Dref => "Data Reference Box",
            KnownBox::Stbl => "Sample Table Box",
            KnownBox::Stsd => "Sample Description Box",
            KnownBox::Stts => "Decoding Time to Sample Box",
            KnownBox::Ctts => "Composition Time to Sample Box",
            KnownBox::Stsc => "Sample To Chunk Box",
            KnownBox::Stsz => "Sample Size Box",
            KnownBox::Stco => "Chunk Offset Box",
            KnownBox::Co64 => "64-bit Chunk Offset Box",
            KnownBox::Stss => "Sync Sample Box",
            KnownBox::Traf => "Track Fragment Box",
            KnownBox::Tfhd => "Track Fragment Header Box",
            KnownBox::Trun => "Track Fragment Run Box",
            KnownBox::Keys => "Metadata Item Keys Box",
            KnownBox::Ilst => "Metadata Item List Box",
            KnownBox::Data => "Metadata Value Box",
            KnownBox::Mean => "Freeform Mean Box",
            KnownBox::Name => "Freeform Name Box",
            KnownBox::Mebx => "Timed Metadata Sample Entry",
            KnownBox::Dims => "Dimensions Box",
            KnownBox::Sinf => "Protection Scheme Information Box",
            KnownBox::Schi => "Scheme Information Box",
            KnownBox::Wave => "QuickTime Sound Extension Box",
            KnownBox::Avcc => "AVC Configuration Box",
            KnownBox::Hvcc => "HEVC Configuration Box",
            KnownBox::Esds => "Elementary Stream Descriptor Box",
            KnownBox::Pasp => "Pixel Aspect Ratio Box",
            KnownBox::Colr => "Colour Information Box",
            KnownBox::Unknown(_) => "Unknown Box",
        }
    }
}
