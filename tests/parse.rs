mod common;

use bmffmeta::boxes::{BoxHeader, FourCC, Mp4Box, SizeField};
use bmffmeta::cursor::ByteCursor;
use bmffmeta::parser::{DecodeContext, parse_children, read_box_header};
use bmffmeta::{Error, Fields, ParseOptions, default_registry, is_iso_bmff, parse_bytes};
use common::*;

#[test]
fn two_free_boxes() {
    let data = [bx(b"free", &[]), bx(b"free", &[])].concat();
    let mut cur = ByteCursor::new(&data);
    let boxes = parse_children(&mut cur, DecodeContext::new(default_registry())).unwrap();

    assert_eq!(boxes.len(), 2);
    for (b, offset) in boxes.iter().zip([0u64, 8]) {
        match b {
            Mp4Box::RegularBox(r) => {
                assert_eq!(r.offset, offset);
                assert_eq!(r.box_size, 8);
                assert_eq!(r.box_type, FourCC(*b"free"));
                assert!(r.children.is_empty());
            }
            other => panic!("expected regular box, got {:?}", other),
        }
    }
}

#[test]
fn non_bmff_input_yields_nothing() {
    let data = [bx(b"free", &[]), bx(b"free", &[])].concat();
    assert!(!is_iso_bmff(&data));

    let out = parse_bytes(&data, &ParseOptions::default()).unwrap();
    assert!(out.structure.is_empty());
    assert!(out.metadata.is_empty());

    let out = parse_bytes(b"\x89PNG\r\n\x1a\n", &ParseOptions::default()).unwrap();
    assert!(out.structure.is_empty());
}

#[test]
fn header_round_trip() {
    let data = ftyp();
    let mut cur = ByteCursor::new(&data);
    let hdr = read_box_header(&mut cur).unwrap();

    assert_eq!(
        hdr,
        BoxHeader {
            start: 0,
            size: 20,
            header_size: 8,
            typ: FourCC::FTYP,
            uuid: None,
            size_field: SizeField::Compact,
        }
    );
    assert_eq!(hdr.encode(), data[..8].to_vec());
}

#[test]
fn sample_movie_structure() {
    let data = sample_movie();
    let out = parse_bytes(&data, &ParseOptions::default().with_fields(Fields::structure_only())).unwrap();

    assert!(out.metadata.is_empty());
    assert_eq!(out.structure.len(), 3);

    match &out.structure[0] {
        Mp4Box::FtypBox(f) => {
            assert_eq!(f.major_brand, FourCC(*b"qt  "));
            assert_eq!(f.compatible_brands, vec![FourCC(*b"qt  ")]);
        }
        other => panic!("expected ftyp, got {:?}", other),
    }

    let moov = &out.structure[1];
    assert_eq!(moov.box_type(), FourCC::MOOV);
    match moov.find_path(&[FourCC::TRAK, FourCC::TKHD]) {
        Some(Mp4Box::TkhdBox(t)) => {
            assert_eq!(t.track_id, 1);
            assert_eq!((t.width, t.height), (1920.0, 1080.0));
        }
        other => panic!("expected tkhd, got {:?}", other),
    }
    match moov.find_path(&[FourCC::META, FourCC::HDLR]) {
        Some(Mp4Box::HdlrBox(h)) => assert_eq!(h.handler_type, FourCC(*b"mdta")),
        other => panic!("expected hdlr, got {:?}", other),
    }

    let mdat = &out.structure[2];
    assert_eq!(mdat.box_type(), FourCC(*b"mdat"));
    assert_eq!(mdat.box_size(), 8 + 4096);
    assert_eq!(mdat.offset() + mdat.box_size(), data.len() as u64);
}

#[test]
fn metadata_only_skips_the_tree() {
    let out = parse_bytes(&sample_movie(), &ParseOptions::default().with_fields(Fields::metadata_only())).unwrap();
    assert!(out.structure.is_empty());
    assert_eq!(out.metadata.len(), 3);
}

#[test]
fn nothing_requested_decodes_nothing() {
    let fields = Fields {
        structure: false,
        metadata: false,
    };
    let out = parse_bytes(&sample_movie(), &ParseOptions::default().with_fields(fields)).unwrap();
    assert_eq!(out, Default::default());
}

#[test]
fn truncated_top_level_box_is_out_of_bounds() {
    let mut data = ftyp();
    data.extend_from_slice(&100u32.to_be_bytes());
    data.extend_from_slice(b"mdat");
    data.extend_from_slice(&[0u8; 10]);

    let err = parse_bytes(&data, &ParseOptions::default()).unwrap_err();
    assert!(err.is_out_of_bounds(), "got {:?}", err);
}

#[test]
fn child_overrunning_parent_is_malformed() {
    // moov claims 24 bytes, its child claims 40
    let mut moov = Vec::new();
    moov.extend_from_slice(&24u32.to_be_bytes());
    moov.extend_from_slice(b"moov");
    moov.extend_from_slice(&40u32.to_be_bytes());
    moov.extend_from_slice(b"udta");
    moov.extend_from_slice(&[0u8; 8]);

    let err = parse_bytes(&[ftyp(), moov].concat(), &ParseOptions::default()).unwrap_err();
    assert!(matches!(err, Error::MalformedBox { offset: 28, .. }), "got {:?}", err);
}

#[test]
fn size_hint_limits_the_input() {
    let data = sample_movie();
    let mdat_at = data.len() as u64 - (8 + 4096);
    let out = parse_bytes(&data, &ParseOptions::default().with_size_hint(mdat_at)).unwrap();

    assert_eq!(out.structure.len(), 2);
    assert_eq!(out.metadata.len(), 3);
}

#[test]
fn zero_size_box_runs_to_end_of_file() {
    let mut data = ftyp();
    data.extend_from_slice(&0u32.to_be_bytes());
    data.extend_from_slice(b"mdat");
    data.extend_from_slice(&[0u8; 100]);

    let out = parse_bytes(&data, &ParseOptions::default()).unwrap();
    let mdat = &out.structure[1];
    assert_eq!(mdat.offset(), 20);
    assert_eq!(mdat.box_size(), 108);
}

#[test]
fn large_size_and_uuid_boxes() {
    let mut data = ftyp();
    data.extend_from_slice(&1u32.to_be_bytes());
    data.extend_from_slice(b"free");
    data.extend_from_slice(&20u64.to_be_bytes());
    data.extend_from_slice(&[0u8; 4]);

    let uuid: [u8; 16] = *b"\xbe\x7a\xcf\xcb\x97\xa9\x42\xe8\x9c\x71\x99\x94\x91\xe3\xaf\xac";
    data.extend_from_slice(&28u32.to_be_bytes());
    data.extend_from_slice(b"uuid");
    data.extend_from_slice(&uuid);
    data.extend_from_slice(&[1, 2, 3, 4]);

    let out = parse_bytes(&data, &ParseOptions::default()).unwrap();
    assert_eq!(out.structure.len(), 3);

    match &out.structure[1] {
        Mp4Box::RegularBox(r) => {
            assert_eq!(r.header_size, 16);
            assert_eq!(r.box_size, 20);
        }
        other => panic!("expected regular box, got {:?}", other),
    }
    match &out.structure[2] {
        Mp4Box::RegularBox(r) => {
            assert_eq!(r.header_size, 24);
            assert_eq!(r.uuid.as_deref(), Some("be7acfcb97a942e89c71999491e3afac"));
        }
        other => panic!("expected uuid box, got {:?}", other),
    }
}

#[test]
fn structure_serializes_as_tagged_union() {
    let out = parse_bytes(&sample_movie(), &ParseOptions::default()).unwrap();
    let v = serde_json::to_value(&out).unwrap();

    assert_eq!(v["structure"][0]["type"], "ftyp-box");
    assert_eq!(v["structure"][1]["type"], "regular-box");
    assert_eq!(v["structure"][1]["box_type"], "moov");
    assert_eq!(v["structure"][1]["children"][0]["children"][0]["type"], "tkhd-box");
    assert_eq!(v["metadata"][0]["value"], "Apple");
}

fn huge_box(typ: &[u8; 4]) -> Vec<u8> {
    let mut v = Vec::new();
    v.extend_from_slice(&1u32.to_be_bytes());
    v.extend_from_slice(typ);
    v.extend_from_slice(&u64::MAX.to_be_bytes());
    v
}

#[test]
fn large_size_past_address_space_is_malformed() {
    let data = [ftyp(), huge_box(b"free")].concat();

    let err = parse_bytes(&data, &ParseOptions::default()).unwrap_err();
    assert!(matches!(err, Error::MalformedBox { offset: 20, .. }), "got {:?}", err);

    let mut p = bmffmeta::StreamParser::new(ParseOptions::default());
    assert!(matches!(p.push(&data), Err(Error::MalformedBox { offset: 20, .. })));
}

#[test]
fn oversized_ilst_item_is_only_a_diagnostic() {
    let meta = container(
        b"meta",
        &[hdlr(b"mdir"), container(b"ilst", &[huge_box(b"\xa9nam")])],
    );
    let data = [ftyp(), container(b"moov", &[meta])].concat();

    let out = parse_bytes(&data, &ParseOptions::default()).unwrap();
    assert!(out.metadata.is_empty());
    assert_eq!(out.diagnostics.len(), 1);
    assert_eq!(out.structure.len(), 2);
}

#[test]
fn typed_box_with_large_header_keeps_its_payload_range() {
    // ftyp written with a 64-bit size
    let mut data = Vec::new();
    data.extend_from_slice(&1u32.to_be_bytes());
    data.extend_from_slice(b"ftyp");
    data.extend_from_slice(&28u64.to_be_bytes());
    data.extend_from_slice(b"isom");
    data.extend_from_slice(&0u32.to_be_bytes());
    data.extend_from_slice(b"mp42");

    let out = parse_bytes(&data, &ParseOptions::default()).unwrap();
    match &out.structure[0] {
        Mp4Box::FtypBox(f) => {
            assert_eq!(f.header_size, 16);
            assert_eq!(f.major_brand, FourCC(*b"isom"));
            assert_eq!(f.compatible_brands, vec![FourCC(*b"mp42")]);
        }
        other => panic!("expected ftyp, got {:?}", other),
    }
    assert_eq!(bmffmeta::util::payload_range(&out.structure[0]), (16, 28));
}
