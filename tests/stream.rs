mod common;

use bmffmeta::{
    Error, Fields, ParseOptions, ParseOutput, Progress, StreamParser, parse_bytes, parse_file,
    parse_reader,
};
use common::*;
use std::io::{Cursor, Write};

fn stream(data: &[u8], chunk: usize, options: &ParseOptions) -> ParseOutput {
    let mut p = StreamParser::new(options.clone());
    for c in data.chunks(chunk) {
        p.push(c).expect("push failed");
    }
    p.finish().expect("finish failed")
}

#[test]
fn chunked_push_matches_parse_bytes() {
    let data = sample_movie();
    for fields in [Fields::default(), Fields::structure_only(), Fields::metadata_only()] {
        let options = ParseOptions::default().with_fields(fields);
        let expected = parse_bytes(&data, &options).unwrap();
        for chunk in [1, 3, 7, 64, 1000, data.len()] {
            assert_eq!(stream(&data, chunk, &options), expected, "chunk size {}", chunk);
        }
    }
}

#[test]
fn skipped_payload_can_be_jumped_over() {
    let data = sample_movie();
    let mdat_at = data.len() - (8 + 4096);
    let options = ParseOptions::default().with_fields(Fields::metadata_only());

    let mut p = StreamParser::new(options.clone());
    let progress = p.push(&data[..mdat_at + 8]).unwrap();
    assert_eq!(
        progress,
        Progress::NeedMore {
            offset: data.len() as u64,
            needed: 8
        }
    );
    assert!(p.skip_to(data.len() as u64));
    // buffered payload bytes were never kept
    assert_eq!(p.delivered(), data.len() as u64);

    let out = p.finish().unwrap();
    assert_eq!(out, parse_bytes(&data, &options).unwrap());
}

#[test]
fn skip_to_is_refused_while_decoding() {
    let data = sample_movie();
    let mut p = StreamParser::new(ParseOptions::default());
    p.push(&data[..40]).unwrap();
    assert!(!p.skip_to(1000));
}

#[test]
fn waits_for_the_rest_of_a_box() {
    let data = sample_movie();
    let moov_len = u32::from_be_bytes([data[20], data[21], data[22], data[23]]) as u64;

    let mut p = StreamParser::new(ParseOptions::default());
    let progress = p.push(&data[..30]).unwrap();
    assert_eq!(
        progress,
        Progress::NeedMore {
            offset: 30,
            needed: 20 + moov_len - 30
        }
    );
}

#[test]
fn unknown_length_final_box() {
    let mut data = ftyp();
    data.extend_from_slice(&0u32.to_be_bytes());
    data.extend_from_slice(b"mdat");
    data.extend_from_slice(&[0u8; 300]);

    let out = stream(&data, 50, &ParseOptions::default());
    assert_eq!(out.structure.len(), 2);
    assert_eq!(out.structure[1].box_size(), 308);
    assert_eq!(out, parse_bytes(&data, &ParseOptions::default()).unwrap());
}

#[test]
fn truncated_stream_fails_at_finish() {
    let data = sample_movie();
    let mut p = StreamParser::new(ParseOptions::default());
    p.push(&data[..60]).unwrap();
    assert!(matches!(p.finish(), Err(Error::OutOfBounds { offset: 20, .. })));
}

#[test]
fn non_bmff_stream_is_done_immediately() {
    let mut p = StreamParser::new(ParseOptions::default());
    assert_eq!(p.push(b"RIFF\x00\x00\x00\x00WAVEfmt ").unwrap(), Progress::Done);
    assert_eq!(p.finish().unwrap(), ParseOutput::default());
}

#[test]
fn size_hint_ends_the_stream() {
    let data = sample_movie();
    let mdat_at = (data.len() - (8 + 4096)) as u64;
    let options = ParseOptions::default().with_size_hint(mdat_at);

    let mut p = StreamParser::new(options.clone());
    assert_eq!(p.push(&data).unwrap(), Progress::Done);
    assert_eq!(p.finish().unwrap(), parse_bytes(&data, &options).unwrap());
}

#[test]
fn reader_and_file_match_parse_bytes() {
    let data = sample_movie();
    let options = ParseOptions::default();
    let expected = parse_bytes(&data, &options).unwrap();

    assert_eq!(parse_reader(Cursor::new(data.clone()), &options).unwrap(), expected);

    let mut f = tempfile::NamedTempFile::new().unwrap();
    f.write_all(&data).unwrap();
    f.flush().unwrap();
    assert_eq!(parse_file(f.path(), &options).unwrap(), expected);

    let meta_only = ParseOptions::default().with_fields(Fields::metadata_only());
    assert_eq!(
        parse_file(f.path(), &meta_only).unwrap(),
        parse_bytes(&data, &meta_only).unwrap()
    );
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = parse_file(dir.path().join("missing.mp4"), &ParseOptions::default()).unwrap_err();
    assert!(matches!(err, Error::Io(_)));
}
