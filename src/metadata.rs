//! Envelope metadata extraction.
//!
//! A [`Metadata`] value is created empty at the start of each interchange
//! and mutated in place as the caller feeds it header segments. Field
//! sources per syntax:
//!
//! | field                  | X12        | EDIFACT          | TRADACOMS |
//! |------------------------|------------|------------------|-----------|
//! | sender qualifier:id    | ISA05:ISA06| UNB02.2:UNB02.1  | STX02.1   |
//! | receiver qualifier:id  | ISA07:ISA08| UNB03.2:UNB03.1  | STX03.1   |
//! | groupSender            | GS02       | UNG02.2:UNG02.1  |           |
//! | groupReceiver          | GS03       | UNG03.2:UNG03.1  |           |
//! | function               | GS01       | UNG01            |           |
//! | type                   | ST01       | UNH02.1          | MHD02.1   |
//! | icn                    | ISA13      | UNB05.1          | STX05.1   |
//!
//! Missing elements or subelements resolve to empty strings, never to an
//! error. `typed` flips after `ST`/`UNH`/`MHD`, at which point the
//! envelope header is complete and the value is treated as frozen.

use serde::Serialize;

use crate::{segment::Segment, syntax::SyntaxKind};

/// A qualified identifier: an id plus the code naming its numbering
/// scheme. Either part may be absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EnvelopeId {
    qualifier: Option<String>,
    id: Option<String>,
}

impl EnvelopeId {
    /// The qualifier, if one was present.
    #[must_use]
    pub fn qualifier(&self) -> Option<&str> { self.qualifier.as_deref() }

    /// The identifier, if one was present.
    #[must_use]
    pub fn id(&self) -> Option<&str> { self.id.as_deref() }

    /// True when neither part has been set.
    #[must_use]
    pub const fn is_empty(&self) -> bool { self.qualifier.is_none() && self.id.is_none() }

    fn set_id(&mut self, id: String) { self.id = Some(id); }

    fn set_qualifier(&mut self, qualifier: String) { self.qualifier = Some(qualifier); }

    /// EDIFACT identifier elements carry `id:qualifier` subelements; an
    /// element without subelements contributes its whole text as the id.
    fn from_edifact(&mut self, segment: &Segment, index: usize) {
        let Some(element) = segment.element(index) else {
            return;
        };
        if element.subelement_count() > 0 {
            self.id = Some(element.subelement(0).unwrap_or_default().trim().to_owned());
            self.qualifier = element.subelement(1).map(|q| q.trim().to_owned());
        } else {
            self.id = Some(element.text().trim().to_owned());
            self.qualifier = None;
        }
    }
}

impl std::fmt::Display for EnvelopeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(qualifier) = &self.qualifier {
            write!(f, "{qualifier}:")?;
        }
        if let Some(id) = &self.id {
            write!(f, "{id}")?;
        }
        Ok(())
    }
}

/// Routing-relevant envelope metadata for one interchange.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    #[serde(skip)]
    kind: SyntaxKind,
    sender: EnvelopeId,
    receiver: EnvelopeId,
    group_sender: EnvelopeId,
    group_receiver: EnvelopeId,
    function: Option<String>,
    #[serde(rename = "type")]
    doc_type: Option<String>,
    icn: Option<String>,
    #[serde(skip)]
    typed: bool,
}

impl Metadata {
    /// An empty metadata accumulator for an interchange of the given
    /// syntax.
    #[must_use]
    pub fn new(kind: SyntaxKind) -> Self {
        Self {
            kind,
            sender: EnvelopeId::default(),
            receiver: EnvelopeId::default(),
            group_sender: EnvelopeId::default(),
            group_receiver: EnvelopeId::default(),
            function: None,
            doc_type: None,
            icn: None,
            typed: false,
        }
    }

    /// Fold one header segment into the accumulated metadata.
    pub fn process(&mut self, segment: &Segment) {
        match self.kind {
            kind if kind.is_x12() => self.process_x12(segment),
            SyntaxKind::Edifact => self.process_edifact(segment),
            SyntaxKind::Tradacoms => self.process_tradacoms(segment),
            _ => {}
        }
    }

    fn process_x12(&mut self, segment: &Segment) {
        match segment.name() {
            "ISA" => {
                self.sender.set_id(element_text(segment, 5));
                self.sender.set_qualifier(element_text(segment, 4));
                self.receiver.set_id(element_text(segment, 7));
                self.receiver.set_qualifier(element_text(segment, 6));
                self.icn = Some(element_text(segment, 12));
            }
            "GS" => {
                self.function = Some(element_text(segment, 0));
                self.group_sender.set_id(element_text(segment, 1));
                self.group_receiver.set_id(element_text(segment, 2));
            }
            "ST" => {
                self.doc_type = Some(element_text(segment, 0));
                self.typed = true;
            }
            _ => {}
        }
    }

    fn process_edifact(&mut self, segment: &Segment) {
        // UNA only carries delimiters, which the detector already consumed.
        if segment.name().starts_with("UNA") {
            return;
        }
        match segment.name() {
            "UNB" => {
                self.sender.from_edifact(segment, 1);
                self.receiver.from_edifact(segment, 2);
                self.icn = Some(subelement_or_element(segment, 4));
            }
            "UNG" => {
                self.function = Some(subelement_or_element(segment, 0));
                self.group_sender.from_edifact(segment, 1);
                self.group_receiver.from_edifact(segment, 2);
            }
            "UNH" => {
                self.doc_type = Some(subelement_or_element(segment, 1));
                self.typed = true;
            }
            _ => {}
        }
    }

    fn process_tradacoms(&mut self, segment: &Segment) {
        match segment.name() {
            "STX" => {
                self.sender.set_id(subelement_or_element(segment, 1));
                self.receiver.set_id(subelement_or_element(segment, 2));
                self.icn = Some(subelement_or_element(segment, 4));
            }
            "MHD" => {
                self.doc_type = Some(subelement_or_element(segment, 1));
                self.typed = true;
            }
            _ => {}
        }
    }

    /// True once the envelope header is complete.
    #[must_use]
    pub const fn typed(&self) -> bool { self.typed }

    /// The syntax this metadata was extracted under.
    #[must_use]
    pub const fn kind(&self) -> SyntaxKind { self.kind }

    /// Interchange sender.
    #[must_use]
    pub const fn sender(&self) -> &EnvelopeId { &self.sender }

    /// Interchange receiver.
    #[must_use]
    pub const fn receiver(&self) -> &EnvelopeId { &self.receiver }

    /// Functional group sender.
    #[must_use]
    pub const fn group_sender(&self) -> &EnvelopeId { &self.group_sender }

    /// Functional group receiver.
    #[must_use]
    pub const fn group_receiver(&self) -> &EnvelopeId { &self.group_receiver }

    /// Functional group identification (`GS01`/`UNG01`).
    #[must_use]
    pub fn function(&self) -> Option<&str> { self.function.as_deref() }

    /// Transaction set / message type (`ST01`/`UNH02.1`/`MHD02.1`).
    #[must_use]
    pub fn doc_type(&self) -> Option<&str> { self.doc_type.as_deref() }

    /// Interchange control number.
    #[must_use]
    pub fn icn(&self) -> Option<&str> { self.icn.as_deref() }

    /// Whether the segment closes this metadata's interchange.
    #[must_use]
    pub fn is_closing(&self, segment: &Segment) -> bool {
        self.kind.closing_segment() == Some(segment.name())
    }

    /// True when no identifying field was extracted at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sender.is_empty()
            && self.receiver.is_empty()
            && self.group_sender.is_empty()
            && self.group_receiver.is_empty()
            && self.function.as_deref().unwrap_or_default().is_empty()
            && self.doc_type.as_deref().unwrap_or_default().is_empty()
    }
}

impl std::fmt::Display for Metadata {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut parts = Vec::new();
        if !self.sender.is_empty() {
            parts.push(format!("sender={}", self.sender));
        }
        if !self.receiver.is_empty() {
            parts.push(format!("receiver={}", self.receiver));
        }
        if !self.group_sender.is_empty() {
            parts.push(format!("groupSender={}", self.group_sender));
        }
        if !self.group_receiver.is_empty() {
            parts.push(format!("groupReceiver={}", self.group_receiver));
        }
        if let Some(function) = self.function.as_deref().filter(|s| !s.is_empty()) {
            parts.push(format!("function={function}"));
        }
        if let Some(doc_type) = self.doc_type.as_deref().filter(|s| !s.is_empty()) {
            parts.push(format!("type={doc_type}"));
        }
        if let Some(icn) = self.icn.as_deref().filter(|s| !s.is_empty()) {
            parts.push(format!("icn={icn}"));
        }
        f.write_str(&parts.join(" "))
    }
}

/// Element `index` as trimmed text, or `""` when absent.
fn element_text(segment: &Segment, index: usize) -> String {
    segment
        .element(index)
        .map(|e| e.text().trim().to_owned())
        .unwrap_or_default()
}

/// First subelement of element `index`, falling back to the whole element
/// text; `""` when the element is absent.
fn subelement_or_element(segment: &Segment, index: usize) -> String {
    segment
        .element(index)
        .map(|e| e.subelement(0).unwrap_or_else(|| e.text()).trim().to_owned())
        .unwrap_or_default()
}
