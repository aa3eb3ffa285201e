//! Push-style parsing for byte sources that arrive over time.
//!
//! [`StreamParser`] is fed chunks in file order. It buffers one top-level box
//! at a time, decodes it once complete, and tells the caller what it is
//! waiting for through [`Progress`]. Payloads nobody asked for (`mdat` when
//! only metadata is requested, `free`, ...) are never buffered; a seekable
//! caller can jump over them with [`StreamParser::skip_to`].
//!
//! Dropping a parser cancels it: buffered bytes are released and the boxes
//! decoded so far are discarded.

use crate::{
    api::{Fields, ParseOptions, ParseOutput, is_iso_bmff},
    boxes::{BoxHeader, FourCC, Mp4Box, RegularBox, SizeField},
    cursor::ByteCursor,
    error::{Error, Result},
    metadata::MetadataExtractor,
    parser::{MIN_HEADER_SIZE, decode_box, read_box_header},
    registry::{Registry, default_registry},
};
use byteorder::{BigEndian, ByteOrder};

/// What the parser needs next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// Waiting for at least `needed` more bytes starting at absolute `offset`.
    ///
    /// `offset` can lie beyond the bytes pushed so far when the parser is
    /// skipping a payload; `needed` is 0 while a box that runs to the end of
    /// the input is being read.
    NeedMore { offset: u64, needed: u64 },
    /// Nothing more to read; call [`StreamParser::finish`].
    Done,
}

#[derive(Debug)]
enum State {
    Signature,
    Header,
    Body(BoxHeader),
    Skip { start: u64, until: u64 },
    /// Size-0 box with no known input length.
    UntilEnd { header: BoxHeader, decode: bool },
    NotIsoBmff,
}

pub struct StreamParser {
    fields: Fields,
    limit: Option<u64>,
    registry: &'static Registry,
    state: State,
    // bytes [buffer_start, buffer_start + buffer.len()) of the source
    buffer: Vec<u8>,
    buffer_start: u64,
    structure: Vec<Mp4Box>,
    extractor: MetadataExtractor,
}

impl StreamParser {
    pub fn new(options: ParseOptions) -> Self {
        StreamParser {
            fields: options.fields,
            limit: options.size_hint,
            registry: default_registry(),
            state: State::Signature,
            buffer: Vec::new(),
            buffer_start: 0,
            structure: Vec::new(),
            extractor: MetadataExtractor::new(),
        }
    }

    /// Absolute offset one past the last byte pushed (or skipped).
    pub fn delivered(&self) -> u64 {
        self.buffer_start + self.buffer.len() as u64
    }

    /// Feed the next chunk of the source. Bytes past the size hint are ignored.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Progress> {
        let chunk = match self.limit {
            Some(limit) => {
                let room = limit.saturating_sub(self.delivered());
                &chunk[..chunk.len().min(room as usize)]
            }
            None => chunk,
        };

        match self.state {
            State::Skip { until, .. } => {
                let start = self.delivered();
                let drop = until.saturating_sub(start).min(chunk.len() as u64) as usize;
                self.buffer_start = start + drop as u64;
                self.buffer.extend_from_slice(&chunk[drop..]);
            }
            State::NotIsoBmff | State::UntilEnd { decode: false, .. } => {
                self.buffer_start += chunk.len() as u64;
            }
            _ => self.buffer.extend_from_slice(chunk),
        }

        self.advance()
    }

    /// Jump forward inside a skipped payload without pushing its bytes.
    ///
    /// Returns false (and changes nothing) unless the parser is skipping and
    /// `offset` lies between what was delivered and the end of the skipped box.
    pub fn skip_to(&mut self, offset: u64) -> bool {
        match self.state {
            State::Skip { until, .. } if offset >= self.delivered() && offset <= until => {
                self.buffer.clear();
                self.buffer_start = offset;
                if offset == until {
                    self.state = State::Header;
                }
                true
            }
            _ => false,
        }
    }

    /// Signal end of input and collect the result.
    pub fn finish(mut self) -> Result<ParseOutput> {
        let delivered = self.delivered();
        match std::mem::replace(&mut self.state, State::Header) {
            State::Signature | State::NotIsoBmff => return Ok(ParseOutput::default()),
            State::Header => {
                if self.buffer.len() as u64 >= MIN_HEADER_SIZE {
                    return Err(Error::OutOfBounds {
                        offset: self.buffer_start,
                        needed: self.header_len(),
                        available: self.buffer.len() as u64,
                    });
                }
            }
            State::Body(h) => {
                return Err(Error::OutOfBounds {
                    offset: h.start,
                    needed: h.size,
                    available: delivered - h.start,
                });
            }
            State::Skip { start, until } => {
                if delivered < until {
                    return Err(Error::OutOfBounds {
                        offset: start,
                        needed: until - start,
                        available: delivered - start,
                    });
                }
            }
            State::UntilEnd { mut header, decode } => {
                header.size = delivered - header.start;
                if decode {
                    self.decode_buffered(&header)?;
                } else {
                    self.record_skipped(&header);
                }
            }
        }

        let meta = self.extractor.finish();
        Ok(ParseOutput {
            structure: self.structure,
            metadata: meta.entries,
            diagnostics: meta.diagnostics,
        })
    }

    fn advance(&mut self) -> Result<Progress> {
        loop {
            let end = self.delivered();
            match &self.state {
                State::NotIsoBmff => return Ok(Progress::Done),
                State::Signature => {
                    let have = self.buffer.len() as u64;
                    if have < 8 {
                        return Ok(self.need(end, 8 - have));
                    }
                    if !is_iso_bmff(&self.buffer) {
                        tracing::debug!("no ftyp signature, not an ISO-BMFF source");
                        self.buffer_start = end;
                        self.buffer = Vec::new();
                        self.state = State::NotIsoBmff;
                        return Ok(Progress::Done);
                    }
                    self.state = State::Header;
                }
                State::Header => {
                    let need = self.header_len();
                    let have = self.buffer.len() as u64;
                    if have < need {
                        return Ok(self.need(end, need - have));
                    }
                    let mut cur = ByteCursor::with_base(&self.buffer, self.buffer_start);
                    let h = read_box_header(&mut cur)?;
                    self.begin_box(h)?;
                }
                State::Body(h) => {
                    if end < h.end() {
                        return Ok(self.need(end, h.end() - end));
                    }
                    let h = h.clone();
                    self.decode_buffered(&h)?;
                    self.state = State::Header;
                }
                &State::Skip { until, .. } => {
                    if end < until {
                        return Ok(Progress::NeedMore {
                            offset: until,
                            needed: MIN_HEADER_SIZE,
                        });
                    }
                    self.discard_until(until);
                    self.state = State::Header;
                }
                State::UntilEnd { .. } => return Ok(Progress::NeedMore { offset: end, needed: 0 }),
            }
        }
    }

    /// `NeedMore`, or `Done` once the size hint is exhausted.
    fn need(&self, offset: u64, needed: u64) -> Progress {
        match self.limit {
            Some(limit) if offset >= limit => Progress::Done,
            _ => Progress::NeedMore { offset, needed },
        }
    }

    /// Header length of the box at the start of the buffer, as far as it can be told.
    fn header_len(&self) -> u64 {
        if (self.buffer.len() as u64) < MIN_HEADER_SIZE {
            return MIN_HEADER_SIZE;
        }
        let mut len = MIN_HEADER_SIZE;
        if BigEndian::read_u32(&self.buffer[0..4]) == 1 {
            len += 8;
        }
        if self.buffer[4..8] == FourCC::UUID.0 {
            len += 16;
        }
        len
    }

    fn begin_box(&mut self, mut h: BoxHeader) -> Result<()> {
        let skip = self.fields.skips_top_level(&h, self.registry);
        tracing::debug!(offset = h.start, box_type = %h.typ, skip, "top-level box");

        if h.size_field == SizeField::ToEnd {
            match self.limit {
                Some(limit) => {
                    h.size = limit - h.start;
                    if h.size < h.header_size {
                        return Err(Error::malformed(h.start, h.typ, "size-0 box shorter than its header"));
                    }
                }
                None => {
                    if skip {
                        self.buffer_start = self.delivered();
                        self.buffer.clear();
                    }
                    self.state = State::UntilEnd {
                        header: h,
                        decode: !skip,
                    };
                    return Ok(());
                }
            }
        }

        if skip {
            self.record_skipped(&h);
            let until = h.end();
            self.discard_until(until);
            self.state = State::Skip {
                start: h.start,
                until,
            };
        } else {
            self.state = State::Body(h);
        }
        Ok(())
    }

    fn discard_until(&mut self, until: u64) {
        let drop = (until.min(self.delivered()) - self.buffer_start) as usize;
        self.buffer.drain(..drop);
        self.buffer_start += drop as u64;
    }

    fn record_skipped(&mut self, h: &BoxHeader) {
        if self.fields.structure {
            self.structure.push(Mp4Box::RegularBox(RegularBox::leaf(h)));
        }
    }

    /// Decode the complete box `h` at the front of the buffer and release its bytes.
    fn decode_buffered(&mut self, h: &BoxHeader) -> Result<()> {
        let len = h.size as usize;
        let ctx = self.fields.decode_context(self.registry);
        let cur = ByteCursor::with_base(&self.buffer[..len], self.buffer_start);
        let b = decode_box(h, cur.sub_cursor(h.payload_start(), h.end())?, ctx)?;

        if self.fields.metadata {
            self.extractor.visit_top_level(&b, &cur);
        }
        if self.fields.structure {
            self.structure.push(b);
        }

        self.buffer.drain(..len);
        self.buffer_start += len as u64;
        Ok(())
    }
}
