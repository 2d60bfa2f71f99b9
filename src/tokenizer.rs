//! Buffered segment tokenization over a blocking byte source.
//!
//! [`SegmentTokenizer`] owns the physical source, a growable lookahead
//! buffer, and the delimiter set currently in force. It re-runs the format
//! detector whenever an interchange-closing segment has been consumed, so
//! one physical stream may carry several back-to-back interchanges of
//! different syntaxes.
//!
//! The tokenizer is strictly sequential: segments come out in stream
//! order, and suspension happens only as a blocking read on the source
//! when the buffer runs dry.

#![allow(
    clippy::indexing_slicing,
    reason = "buffer ranges are bounded by the scan positions that produced them"
)]

use std::io::{self, Read};

use bytes::BytesMut;
use memchr::memchr_iter;
use tracing::{debug, trace};

use crate::{
    delimiter::DelimiterSet,
    detect::{detect, is_extra},
    segment::{Parents, Segment, SegmentRef},
    syntax::SyntaxKind,
};

/// Refill chunk size for the lookahead buffer.
pub const CHUNK_SIZE: usize = 4096;

/// Envelope segment names for one syntax family: interchange opener,
/// functional group opener, transaction set opener, interchange closer.
const X12_ENVELOPE: [&str; 4] = ["ISA", "GS", "ST", "IEA"];
const EDIFACT_ENVELOPE: [&str; 4] = ["UNB", "UNG", "UNH", "UNZ"];
const TRADACOMS_ENVELOPE: [&str; 4] = ["STX", "BAT", "MHD", "END"];

/// Incremental tokenizer producing one [`Segment`] at a time.
#[derive(Debug)]
pub struct SegmentTokenizer<R> {
    source: R,
    buf: BytesMut,
    eof: bool,
    exhausted: bool,
    kind: SyntaxKind,
    delimiters: DelimiterSet,
    redetect: bool,
    next_ordinal: u64,
    interchange: Option<SegmentRef>,
    functional_group: Option<SegmentRef>,
    transaction_set: Option<SegmentRef>,
}

impl<R: Read> SegmentTokenizer<R> {
    /// Construct a tokenizer, performing the initial buffer fill and
    /// format detection.
    ///
    /// # Errors
    /// Propagates I/O errors from the initial read.
    pub fn new(source: R) -> io::Result<Self> {
        let mut tokenizer = Self {
            source,
            buf: BytesMut::with_capacity(CHUNK_SIZE * 2),
            eof: false,
            exhausted: false,
            kind: SyntaxKind::Unknown,
            delimiters: DelimiterSet::default(),
            redetect: false,
            next_ordinal: 0,
            interchange: None,
            functional_group: None,
            transaction_set: None,
        };
        tokenizer.fill()?;
        tokenizer.run_detection();
        Ok(tokenizer)
    }

    /// The syntax currently in force.
    #[must_use]
    pub const fn kind(&self) -> SyntaxKind { self.kind }

    /// The delimiter set currently in force.
    #[must_use]
    pub const fn delimiters(&self) -> &DelimiterSet { &self.delimiters }

    /// Whether the source and the lookahead buffer are both spent.
    #[must_use]
    pub fn is_drained(&self) -> bool { self.exhausted || (self.eof && self.buf.is_empty()) }

    /// Bring the tokenizer state current: refill an empty buffer and run
    /// any pending re-detection, then report the syntax in force.
    ///
    /// # Errors
    /// Propagates I/O errors from the refill.
    pub fn refresh(&mut self) -> io::Result<SyntaxKind> {
        if self.exhausted {
            return Ok(self.kind);
        }
        if self.buf.is_empty() {
            self.fill()?;
        }
        if self.redetect {
            if !self.eof {
                self.fill()?;
            }
            self.run_detection();
        }
        Ok(self.kind)
    }

    /// Produce the next logical segment, or `None` at end of stream.
    ///
    /// # Errors
    /// Propagates I/O errors from the underlying source unchanged.
    #[must_use = "handle the result"]
    pub fn next_segment(&mut self) -> io::Result<Option<Segment>> {
        self.refresh()?;
        if self.exhausted {
            return Ok(None);
        }
        loop {
            match self.scan() {
                Scan::Complete { data_len, total_len } => {
                    let raw = self.buf.split_to(total_len).to_vec();
                    let extra = total_len - data_len;
                    return Ok(Some(self.finish_segment(raw, extra)));
                }
                Scan::NeedMore => {}
            }
            if self.eof {
                return Ok(self.take_final_segment());
            }
            self.fill()?;
        }
    }

    /// Serve raw bytes without tokenizing: buffered bytes first, then the
    /// source directly. Used for opaque passthrough of unrecognised
    /// content.
    pub(crate) fn read_raw(&mut self, out: &mut [u8]) -> io::Result<usize> {
        if out.is_empty() {
            return Ok(0);
        }
        if self.buf.is_empty() && !self.eof {
            self.fill()?;
        }
        if self.buf.is_empty() {
            self.exhausted = true;
            return Ok(0);
        }
        let n = out.len().min(self.buf.len());
        let chunk = self.buf.split_to(n);
        out[..n].copy_from_slice(&chunk);
        Ok(n)
    }

    /// Locate the next unescaped segment terminator plus its trailing
    /// extra bytes. Extras that run to the end of the buffer are not yet a
    /// complete segment: more input may extend them.
    fn scan(&self) -> Scan {
        let terminator = self.delimiters.segment_terminator;
        for pos in memchr_iter(terminator, &self.buf) {
            if !self.delimiters.splits_at(&self.buf, pos, terminator) {
                continue;
            }
            let mut end = pos + 1;
            while end < self.buf.len() && is_extra(self.buf[end]) {
                end += 1;
            }
            if end < self.buf.len() {
                return Scan::Complete {
                    data_len: pos,
                    total_len: end,
                };
            }
            // Trailing extras reach the buffer end; a refill (or the EOF
            // backstop) decides where this segment really stops.
            return Scan::NeedMore;
        }
        Scan::NeedMore
    }

    /// At end of stream, emit whatever remains as one final segment,
    /// counting trailing terminator/extra bytes backwards from the end.
    fn take_final_segment(&mut self) -> Option<Segment> {
        if self.buf.is_empty() {
            self.exhausted = true;
            return None;
        }
        let raw = self.buf.split_to(self.buf.len()).to_vec();
        let terminator = self.delimiters.segment_terminator;
        let mut data_len = raw.len();
        while data_len > 0 {
            let byte = raw[data_len - 1];
            if byte == terminator || is_extra(byte) {
                data_len -= 1;
            } else {
                break;
            }
        }
        let extra = raw.len() - data_len;
        self.exhausted = true;
        Some(self.finish_segment(raw, extra))
    }

    fn finish_segment(&mut self, raw: Vec<u8>, extra: usize) -> Segment {
        let ordinal = self.next_ordinal;
        self.next_ordinal += 1;
        let mut segment = Segment::parse(self.kind, raw, extra, &self.delimiters, ordinal);
        self.track_envelope(&segment);
        segment.set_parents(Parents {
            interchange: self.interchange,
            functional_group: self.functional_group,
            transaction_set: self.transaction_set,
        });
        trace!(name = segment.name(), ordinal, "emitted segment");
        segment
    }

    /// Update the parent handles and arm re-detection after an
    /// interchange-closing segment.
    fn track_envelope(&mut self, segment: &Segment) {
        let [opens_interchange, opens_group, opens_transaction, closes] = match self.kind {
            kind if kind.is_x12() => X12_ENVELOPE,
            SyntaxKind::Edifact => EDIFACT_ENVELOPE,
            SyntaxKind::Tradacoms => TRADACOMS_ENVELOPE,
            _ => return,
        };
        let name = segment.name();
        if name == opens_interchange {
            self.interchange = Some(segment.ordinal());
            self.functional_group = None;
            self.transaction_set = None;
        } else if name == opens_group {
            self.functional_group = Some(segment.ordinal());
            self.transaction_set = None;
        } else if name == opens_transaction {
            self.transaction_set = Some(segment.ordinal());
        } else if name == closes {
            self.redetect = true;
            debug!(name, "interchange closed; re-detection armed");
        }
    }

    fn run_detection(&mut self) {
        let detection = detect(&self.buf);
        self.kind = detection.kind;
        if detection.kind != SyntaxKind::Unknown {
            self.delimiters = detection.delimiters;
        }
        self.redetect = false;
    }

    /// Read up to one chunk of new bytes, repeating short reads until the
    /// chunk is full or the source reports end of stream.
    fn fill(&mut self) -> io::Result<()> {
        if self.eof {
            return Ok(());
        }
        let mut chunk = [0u8; CHUNK_SIZE];
        let mut filled = 0usize;
        while filled < CHUNK_SIZE {
            let read = self.source.read(&mut chunk[filled..])?;
            if read == 0 {
                self.eof = true;
                break;
            }
            filled += read;
        }
        self.buf.extend_from_slice(&chunk[..filled]);
        trace!(bytes = filled, eof = self.eof, "refilled lookahead buffer");
        Ok(())
    }
}

enum Scan {
    /// A full segment is buffered: `data_len` bytes of element data,
    /// `total_len` bytes including the terminator and trailing extras.
    Complete { data_len: usize, total_len: usize },
    /// No complete segment in the buffer yet.
    NeedMore,
}
