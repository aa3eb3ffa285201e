//! Byte builders for synthetic MP4/QuickTime files.
#![allow(dead_code)]

pub fn bx(typ: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut v = Vec::with_capacity(8 + payload.len());
    v.extend_from_slice(&((8 + payload.len()) as u32).to_be_bytes());
    v.extend_from_slice(typ);
    v.extend_from_slice(payload);
    v
}

pub fn container(typ: &[u8; 4], children: &[Vec<u8>]) -> Vec<u8> {
    bx(typ, &children.concat())
}

pub fn ftyp() -> Vec<u8> {
    let mut p = Vec::new();
    p.extend_from_slice(b"qt  ");
    p.extend_from_slice(&0x0200u32.to_be_bytes());
    p.extend_from_slice(b"qt  ");
    bx(b"ftyp", &p)
}

pub fn mdat(len: usize) -> Vec<u8> {
    bx(b"mdat", &vec![0xAA; len])
}

/// Version 0 `tkhd` with the given track id and a 1920x1080 presentation size.
pub fn tkhd(track_id: u32) -> Vec<u8> {
    let mut p = vec![0, 0, 0, 3];
    p.extend_from_slice(&[0u8; 8]);
    p.extend_from_slice(&track_id.to_be_bytes());
    p.extend_from_slice(&[0u8; 4]);
    p.extend_from_slice(&600u32.to_be_bytes());
    p.extend_from_slice(&[0u8; 8]);
    p.extend_from_slice(&[0u8; 8]); // layer, alternate_group, volume, reserved
    p.extend_from_slice(&[0u8; 36]);
    p.extend_from_slice(&(1920u32 << 16).to_be_bytes());
    p.extend_from_slice(&(1080u32 << 16).to_be_bytes());
    bx(b"tkhd", &p)
}

pub fn hdlr(handler: &[u8; 4]) -> Vec<u8> {
    let mut p = vec![0u8; 8];
    p.extend_from_slice(handler);
    p.extend_from_slice(&[0u8; 12]);
    p.push(0);
    bx(b"hdlr", &p)
}

pub fn keys(names: &[&str]) -> Vec<u8> {
    let mut p = vec![0u8; 4];
    p.extend_from_slice(&(names.len() as u32).to_be_bytes());
    for n in names {
        p.extend_from_slice(&((8 + n.len()) as u32).to_be_bytes());
        p.extend_from_slice(b"mdta");
        p.extend_from_slice(n.as_bytes());
    }
    bx(b"keys", &p)
}

/// `data` box with a well-known type and default locale.
pub fn data(well_known: u32, value: &[u8]) -> Vec<u8> {
    let mut p = Vec::new();
    p.extend_from_slice(&well_known.to_be_bytes());
    p.extend_from_slice(&0u32.to_be_bytes());
    p.extend_from_slice(value);
    bx(b"data", &p)
}

/// `ilst` item referring to a 1-based `keys` index.
pub fn keyed_item(index: u32, well_known: u32, value: &[u8]) -> Vec<u8> {
    bx(&index.to_be_bytes(), &data(well_known, value))
}

/// QuickTime `meta` (no version/flags) with an `mdta` handler, keys and items.
pub fn mdta_meta(names: &[&str], items: &[Vec<u8>]) -> Vec<u8> {
    container(b"meta", &[hdlr(b"mdta"), keys(names), container(b"ilst", items)])
}

/// iTunes style `meta` (full box) with an `mdir` handler and 4CC items.
pub fn mdir_meta(items: &[Vec<u8>]) -> Vec<u8> {
    let mut p = vec![0u8; 4];
    p.extend_from_slice(&hdlr(b"mdir"));
    p.extend_from_slice(&container(b"ilst", items));
    bx(b"meta", &p)
}

/// QuickTime `udta` text atom (`©xxx`) with a single record.
pub fn text_atom(tag: &[u8; 4], text: &str) -> Vec<u8> {
    let mut p = Vec::new();
    p.extend_from_slice(&(text.len() as u16).to_be_bytes());
    p.extend_from_slice(&0x55c4u16.to_be_bytes());
    p.extend_from_slice(text.as_bytes());
    bx(tag, &p)
}

/// A small QuickTime file: file-level and track-level keyed metadata around an `mdat`.
pub fn sample_movie() -> Vec<u8> {
    let trak = container(
        b"trak",
        &[
            tkhd(1),
            mdta_meta(
                &["com.apple.quicktime.camera.lens_model"],
                &[keyed_item(1, 1, b"back camera 6.765mm f/1.78")],
            ),
        ],
    );
    let file_meta = mdta_meta(
        &["com.apple.quicktime.make", "com.apple.quicktime.live-photo.auto"],
        &[keyed_item(1, 1, b"Apple"), keyed_item(2, 22, &[1])],
    );
    // track comes first in moov, its entries must still come last
    let moov = container(b"moov", &[trak, file_meta]);
    [ftyp(), moov, mdat(4096)].concat()
}
