//! ISO Base Media File Format (MP4 / QuickTime) box tree decoding and
//! metadata extraction.
//!
//! [`parse_bytes`], [`parse_reader`] and [`parse_file`] return a
//! [`ParseOutput`] with the decoded box tree and a flat list of
//! [`MetadataEntry`] values. [`StreamParser`] does the same for bytes that
//! arrive in chunks.

pub mod api;
pub mod boxes;
pub mod cursor;
pub mod error;
pub mod known_boxes;
pub mod metadata;
pub mod parser;
pub mod registry;
pub mod stream;
pub mod stsd;
pub mod util;

pub use api::{Fields, ParseOptions, ParseOutput, is_iso_bmff, parse_bytes, parse_file, parse_reader};
pub use boxes::{BoxHeader, BoxKey, FourCC, Mp4Box, RegularBox, SampleDescription};
pub use error::{Error, Result};
pub use metadata::{Diagnostic, MetadataEntry, MetadataValue, extract_metadata};
pub use parser::{DecodeContext, parse_children, read_box_header};
pub use registry::{BoxDecoder, Registry, default_registry};
pub use stream::{Progress, StreamParser};
