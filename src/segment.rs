//! Segment, element, and subelement decomposition.
//!
//! Decomposition is pure: one delimited byte range plus the interchange's
//! [`DelimiterSet`] fully determines the name, elements, and subelements.
//! The raw bytes (including any trailing terminator/CR/LF "extra" bytes)
//! are retained so an interchange can be re-exposed byte for byte.

use crate::{delimiter::DelimiterSet, syntax::SyntaxKind};

/// Handle to an earlier segment in the same stream, identified by its
/// stream-wide ordinal. Handles are informational back-references, not
/// ownership: the segment they point at lives in the interchange's header
/// buffer (or has already been consumed by the caller).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentRef(u64);

impl SegmentRef {
    /// The stream-wide ordinal of the referenced segment.
    #[must_use]
    pub const fn ordinal(self) -> u64 { self.0 }
}

/// Back-references to the header segments enclosing a segment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Parents {
    /// The segment that opened the current interchange (`ISA`/`UNB`/`STX`).
    pub interchange: Option<SegmentRef>,
    /// The segment that opened the current functional group (`GS`/`UNG`/`BAT`).
    pub functional_group: Option<SegmentRef>,
    /// The segment that opened the current transaction set (`ST`/`UNH`/`MHD`).
    pub transaction_set: Option<SegmentRef>,
}

/// One data element: its unescaped text and its subelements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    text: String,
    subelements: Vec<String>,
}

impl Element {
    fn parse(piece: &str, delimiters: &DelimiterSet) -> Self {
        let bytes = piece.as_bytes();
        let text = into_clean_string(unescape(
            bytes,
            delimiters.subelement_separator,
            delimiters.subelement_separator,
            delimiters.escape,
            delimiters.escape_character,
        ));
        let mut subelements = Vec::new();
        let mut start = 0usize;
        for i in 0..=bytes.len() {
            let at_end = i == bytes.len();
            let split = !at_end && delimiters.splits_at(bytes, i, delimiters.subelement_separator);
            // An element with no subelement separator at all keeps an empty
            // subelement list; extraction falls back to the element text.
            if (at_end && !subelements.is_empty()) || split {
                subelements.push(into_clean_string(unescape(
                    bytes.get(start..i).unwrap_or_default(),
                    delimiters.subelement_separator,
                    delimiters.subelement_separator,
                    delimiters.escape,
                    delimiters.escape_character,
                )));
                start = i + 1;
            }
        }
        Self { text, subelements }
    }

    /// The element's unescaped text.
    #[must_use]
    pub fn text(&self) -> &str { &self.text }

    /// All subelements; empty when the element carries no subelement
    /// separator.
    #[must_use]
    pub fn subelements(&self) -> &[String] { &self.subelements }

    /// The subelement at `index`, if present.
    #[must_use]
    pub fn subelement(&self, index: usize) -> Option<&str> {
        self.subelements.get(index).map(String::as_str)
    }

    /// Number of subelements.
    #[must_use]
    pub fn subelement_count(&self) -> usize { self.subelements.len() }
}

/// One delimiter-terminated record of the EDI stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    kind: SyntaxKind,
    raw: Vec<u8>,
    extra: usize,
    name: String,
    elements: Vec<Element>,
    ordinal: u64,
    parents: Parents,
}

impl Segment {
    /// Decompose `raw` (whose final `extra` bytes are the terminator and
    /// any trailing CR/LF) under the given delimiters.
    pub(crate) fn parse(
        kind: SyntaxKind,
        raw: Vec<u8>,
        extra: usize,
        delimiters: &DelimiterSet,
        ordinal: u64,
    ) -> Self {
        let data_len = raw.len().saturating_sub(extra);
        let data = raw.get(..data_len).unwrap_or_default();
        let mut name: Option<String> = None;
        let mut pieces: Vec<String> = Vec::new();
        let mut start = 0usize;
        for i in 0..=data.len() {
            let at_end = i == data.len();
            if at_end || delimiters.splits_at(data, i, delimiters.element_separator) {
                let piece = into_clean_string(unescape(
                    data.get(start..i).unwrap_or_default(),
                    delimiters.segment_terminator,
                    delimiters.element_separator,
                    delimiters.escape,
                    delimiters.escape_character,
                ));
                if name.is_none() {
                    // TRADACOMS segments open with name=first-element.
                    if kind.is_tradacoms()
                        && let Some(equal) = piece.find('=')
                    {
                        name = Some(piece.get(..equal).unwrap_or_default().to_owned());
                        pieces.push(piece.get(equal + 1..).unwrap_or_default().to_owned());
                    } else {
                        name = Some(piece);
                    }
                } else {
                    pieces.push(piece);
                }
                start = i + 1;
            }
        }
        let elements = pieces
            .iter()
            .map(|piece| Element::parse(piece, delimiters))
            .collect();
        Self {
            kind,
            raw,
            extra,
            name: name.unwrap_or_default(),
            elements,
            ordinal,
            parents: Parents::default(),
        }
    }

    pub(crate) fn set_parents(&mut self, parents: Parents) { self.parents = parents; }

    /// The syntax this segment was tokenized under.
    #[must_use]
    pub const fn kind(&self) -> SyntaxKind { self.kind }

    /// The segment name (for TRADACOMS, the text left of the first `=`).
    #[must_use]
    pub fn name(&self) -> &str { &self.name }

    /// The original bytes, including the terminator and trailing extras.
    #[must_use]
    pub fn raw(&self) -> &[u8] { &self.raw }

    /// Consume the segment, keeping only its original bytes.
    #[must_use]
    pub fn into_raw(self) -> Vec<u8> { self.raw }

    /// The trailing terminator/CR/LF bytes that are not element data.
    #[must_use]
    pub fn trailing(&self) -> &[u8] {
        self.raw
            .get(self.raw.len().saturating_sub(self.extra)..)
            .unwrap_or_default()
    }

    /// All data elements, in order. The name is not an element.
    #[must_use]
    pub fn elements(&self) -> &[Element] { &self.elements }

    /// The element at `index`, if present.
    #[must_use]
    pub fn element(&self, index: usize) -> Option<&Element> { self.elements.get(index) }

    /// Number of data elements.
    #[must_use]
    pub fn element_count(&self) -> usize { self.elements.len() }

    /// This segment's stream-wide ordinal.
    #[must_use]
    pub const fn ordinal(&self) -> SegmentRef { SegmentRef(self.ordinal) }

    /// Back-references to the enclosing header segments.
    #[must_use]
    pub const fn parents(&self) -> &Parents { &self.parents }
}

/// Remove the escape character wherever it releases `delim1` or `delim2`;
/// the released delimiter byte is kept as literal data.
pub(crate) fn unescape(
    data: &[u8],
    delim1: u8,
    delim2: u8,
    escape: bool,
    escape_character: u8,
) -> Vec<u8> {
    if !escape {
        return data.to_vec();
    }
    let mut out = Vec::with_capacity(data.len());
    let mut i = 0usize;
    while i < data.len() {
        let byte = data.get(i).copied().unwrap_or_default();
        if byte == escape_character
            && let Some(&next) = data.get(i + 1)
            && (next == delim1 || next == delim2)
        {
            out.push(next);
            i += 2;
        } else {
            out.push(byte);
            i += 1;
        }
    }
    out
}

/// Strip stray CR/LF and non-ASCII bytes (line-wrap artifacts in
/// transmitted files) and build the element string.
fn into_clean_string(bytes: Vec<u8>) -> String {
    let kept: Vec<u8> = bytes
        .into_iter()
        .filter(|&b| b != b'\r' && b != b'\n' && b < 128)
        .collect();
    String::from_utf8_lossy(&kept).into_owned()
}

#[cfg(kani)]
mod kani;
