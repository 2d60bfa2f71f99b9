//! Interchange splitting: re-exposing each envelope of a multi-document
//! stream as an independently consumable byte stream.
//!
//! [`Interchanges`] drives the tokenizer through one envelope header at a
//! time; the resulting [`Interchange`] view first replays the buffered
//! header segments byte for byte, then passes segments through on demand
//! until the syntax's closing segment has been yielded. Views share the
//! single tokenizer cursor and therefore come out one at a time, each
//! fully drained (or abandoned together with the stream) before the next.

use std::{
    collections::VecDeque,
    io::{self, Read},
};

use thiserror::Error;
use tracing::debug;

use crate::{
    metadata::Metadata,
    segment::Segment,
    syntax::SyntaxKind,
    tokenizer::SegmentTokenizer,
};

/// Errors surfaced while splitting a stream into interchanges.
#[derive(Debug, Error)]
pub enum SplitError {
    /// End of stream while envelope header segments were still being
    /// accumulated. Distinct from a clean end of input, which yields no
    /// interchange at all.
    #[error("incomplete envelope: end of stream inside an interchange header")]
    IncompleteEnvelope,
    /// I/O failure from the byte source, propagated unchanged.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Iterator-like producer of successive [`Interchange`] views over one
/// physical stream.
pub struct Interchanges<R> {
    tokenizer: SegmentTokenizer<R>,
    opaque_served: bool,
}

impl<R: Read> Interchanges<R> {
    /// Wrap a byte source, performing the initial format detection.
    ///
    /// # Errors
    /// Propagates I/O errors from the initial read.
    pub fn new(source: R) -> io::Result<Self> {
        Ok(Self {
            tokenizer: SegmentTokenizer::new(source)?,
            opaque_served: false,
        })
    }

    /// The syntax currently in force on the underlying tokenizer.
    #[must_use]
    pub const fn kind(&self) -> SyntaxKind { self.tokenizer.kind() }

    /// Produce the next interchange view, or `None` at clean end of
    /// input.
    ///
    /// A stream (or stream remainder) that does not classify as EDI is
    /// exposed as a single opaque view with no metadata, after which
    /// iteration ends. The previous view must have been fully drained:
    /// views share the tokenizer cursor.
    ///
    /// # Errors
    /// [`SplitError::IncompleteEnvelope`] when the stream ends inside an
    /// envelope header; [`SplitError::Io`] for source failures.
    #[must_use = "handle the result"]
    pub fn next_interchange(&mut self) -> Result<Option<Interchange<'_, R>>, SplitError> {
        if self.opaque_served {
            return Ok(None);
        }
        // Runs any re-detection armed by a previous closing segment, so
        // the metadata dispatch below sees the new interchange's syntax.
        let kind = self.tokenizer.refresh()?;
        if kind == SyntaxKind::Unknown {
            if self.tokenizer.is_drained() {
                return Ok(None);
            }
            self.opaque_served = true;
            debug!("unrecognised syntax; exposing remainder as one opaque view");
            return Ok(Some(Interchange::opaque(&mut self.tokenizer)));
        }
        let mut metadata = Metadata::new(kind);
        let mut header = VecDeque::new();
        while !metadata.typed() {
            match self.tokenizer.next_segment()? {
                None => {
                    return if header.is_empty() {
                        Ok(None)
                    } else {
                        Err(SplitError::IncompleteEnvelope)
                    };
                }
                Some(segment) => {
                    metadata.process(&segment);
                    header.push_back(segment);
                }
            }
        }
        debug!(%metadata, "envelope header complete");
        Ok(Some(Interchange::typed(&mut self.tokenizer, metadata, header)))
    }
}

/// One interchange re-exposed as a byte stream: buffered header segments
/// first, then segments pulled on demand through the closing segment.
///
/// Dropping the view closes only this logical stream; the underlying
/// physical source stays open for the next interchange.
#[derive(Debug)]
pub struct Interchange<'a, R> {
    tokenizer: &'a mut SegmentTokenizer<R>,
    metadata: Option<Metadata>,
    header: VecDeque<Segment>,
    current: Option<Chunk>,
    closed: bool,
    finished: bool,
    opaque: bool,
}

impl<'a, R: Read> Interchange<'a, R> {
    fn typed(
        tokenizer: &'a mut SegmentTokenizer<R>,
        metadata: Metadata,
        header: VecDeque<Segment>,
    ) -> Self {
        Self {
            tokenizer,
            metadata: Some(metadata),
            header,
            current: None,
            closed: false,
            finished: false,
            opaque: false,
        }
    }

    fn opaque(tokenizer: &'a mut SegmentTokenizer<R>) -> Self {
        Self {
            tokenizer,
            metadata: None,
            header: VecDeque::new(),
            current: None,
            closed: false,
            finished: false,
            opaque: true,
        }
    }

    /// Extracted envelope metadata; `None` for an opaque view.
    #[must_use]
    pub const fn metadata(&self) -> Option<&Metadata> { self.metadata.as_ref() }

    /// Consume the view, releasing its metadata snapshot.
    #[must_use]
    pub fn into_metadata(self) -> Option<Metadata> { self.metadata }

    /// Bytes servable without touching the underlying source.
    #[must_use]
    pub fn available(&self) -> usize {
        self.current.as_ref().map_or(0, Chunk::remaining)
    }

    /// Advance to the next servable chunk: replayed header segments
    /// first, then freshly tokenized segments until the closing segment
    /// has been served.
    fn load(&mut self) -> io::Result<()> {
        if self.closed {
            self.current = None;
            self.finished = true;
            return Ok(());
        }
        if let Some(segment) = self.header.pop_front() {
            self.current = Some(Chunk::new(segment.into_raw()));
            return Ok(());
        }
        match self.tokenizer.next_segment()? {
            None => {
                self.current = None;
                self.finished = true;
            }
            Some(segment) => {
                self.closed = self
                    .metadata
                    .as_ref()
                    .is_some_and(|m| m.is_closing(&segment));
                self.current = Some(Chunk::new(segment.into_raw()));
            }
        }
        Ok(())
    }
}

impl<R: Read> Read for Interchange<'_, R> {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        if self.opaque {
            return self.tokenizer.read_raw(out);
        }
        let mut written = 0usize;
        while written < out.len() && !self.finished {
            match self.current.as_mut() {
                Some(chunk) if !chunk.is_spent() => {
                    written += chunk.copy_into(out.get_mut(written..).unwrap_or_default());
                }
                _ => self.load()?,
            }
        }
        Ok(written)
    }
}

/// One segment's raw bytes being served to the reader.
#[derive(Debug)]
struct Chunk {
    bytes: Vec<u8>,
    pos: usize,
}

impl Chunk {
    const fn new(bytes: Vec<u8>) -> Self { Self { bytes, pos: 0 } }

    fn is_spent(&self) -> bool { self.pos >= self.bytes.len() }

    fn remaining(&self) -> usize { self.bytes.len().saturating_sub(self.pos) }

    fn copy_into(&mut self, out: &mut [u8]) -> usize {
        let n = out.len().min(self.remaining());
        if let (Some(dst), Some(src)) = (out.get_mut(..n), self.bytes.get(self.pos..self.pos + n)) {
            dst.copy_from_slice(src);
        }
        self.pos += n;
        n
    }
}
