//! Core library for the edimux EDI interchange demultiplexer.
//!
//! The crate takes an arbitrary, possibly multi-document byte stream,
//! classifies it as X12, EDIFACT, or TRADACOMS, recovers the delimiter
//! set in use, tokenizes the stream into logical segments without
//! materializing the payload, extracts routing-relevant envelope
//! metadata, and re-exposes each interchange as an independently
//! consumable byte stream. Concatenated interchanges of different
//! syntaxes in one physical stream are supported; content that does not
//! classify as EDI is handed back as a single opaque view.

pub mod delimiter;
pub mod detect;
pub mod interchange;
pub mod metadata;
pub mod segment;
pub mod syntax;
pub mod tokenizer;
