//! Heuristic transmission syntax detection.
//!
//! The detector inspects a fixed-size leading window of the stream
//! (non-consuming) and classifies it as X12, EDIFACT, or TRADACOMS,
//! recovering the delimiter set actually in use. Detection never fails:
//! malformed input classifies as [`SyntaxKind::Unknown`].
//!
//! The X12 check walks the fixed `ISA` field length table:
//!
//! | field | 00  | 01 | 02 | 03 | 04 | 05 | 06 | 07 | 08 | 09 | 10 | 11 | 12 | 13 | 14 | 15 |
//! |-------|-----|----|----|----|----|----|----|----|----|----|----|----|----|----|----|----|
//! | len   | 3   | 2  | 10 | 2  | 10 | 2  | 15 | 2  | 15 | 6  | 4  | 1  | 5  | 9  | 1  | 1  |
//!
//! Field 00 is `ISA` itself; field 16 is the subelement separator and is
//! not length-checked. Short sender/receiver fields (06/08) degrade the
//! classification to [`SyntaxKind::FuzzyX12`] instead of rejecting.

#![allow(
    clippy::indexing_slicing,
    reason = "probe windows are length-validated before fixed-offset reads"
)]

use memchr::memchr;
use tracing::debug;

use crate::{delimiter::DelimiterSet, syntax::SyntaxKind};

/// Probe window for the X12 `ISA` segment (through the segment terminator).
pub const X12_PROBE: usize = 106;
/// Length of the EDIFACT `UNA` service string advice segment.
pub const UNA_PROBE: usize = 9;

/// Byte offset of the X12 subelement separator in a fully padded `ISA`.
const X12_SERVICE_OFFSET: usize = 104;

/// `ISA` field lengths; see the module table.
const ISA_FIELD_LENGTHS: [usize; 16] = [3, 2, 10, 2, 10, 2, 15, 2, 15, 6, 4, 1, 5, 9, 1, 1];
/// Index of the sender id field (ISA06).
const ISA_SENDER: usize = 6;
/// Index of the receiver id field (ISA08).
const ISA_RECEIVER: usize = 8;

/// Accepted element separator count before the first EDIFACT terminator.
///
/// The 5..=11 window is an empirically chosen tolerance carried over from
/// field experience with real-world producers.
const EDIFACT_ELEMENTS: std::ops::RangeInclusive<usize> = 5..=11;
/// Accepted element separator count before the first TRADACOMS terminator.
const TRADACOMS_ELEMENTS: std::ops::RangeInclusive<usize> = 4..=8;

/// Result of classifying a leading window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Detection {
    /// The detected syntax, or [`SyntaxKind::Unknown`].
    pub kind: SyntaxKind,
    /// Delimiters in force; meaningful only when `kind` is not `Unknown`.
    pub delimiters: DelimiterSet,
}

impl Detection {
    fn unknown() -> Self {
        Self {
            kind: SyntaxKind::Unknown,
            delimiters: DelimiterSet::default(),
        }
    }
}

/// Trailing bytes that are not segment data (segment terminators, CR/LF,
/// padding); anything non-alphanumeric qualifies.
pub(crate) const fn is_extra(byte: u8) -> bool { !byte.is_ascii_alphanumeric() }

/// A probe over the leading window with embedded CR/LF discarded.
struct Probe {
    bytes: Vec<u8>,
    skipped: usize,
}

/// Collect up to `len` bytes from `window`, skipping embedded CR/LF.
///
/// With `keep_last`, a CR/LF that would land exactly at the probe length
/// is kept; this is what lets a CR or LF segment terminator survive at
/// the end of the window.
fn probe(window: &[u8], len: usize, keep_last: bool) -> Probe {
    let mut bytes = Vec::with_capacity(len);
    let mut skipped = 0usize;
    for &b in window {
        if (b == b'\r' || b == b'\n') && (bytes.len() + 1 < len || !keep_last) {
            skipped += 1;
        } else {
            bytes.push(b);
        }
        if bytes.len() == len {
            break;
        }
    }
    Probe { bytes, skipped }
}

/// A prefix match over the probed window. The window may be shorter than
/// `len`; the syntax checks themselves reject windows that are missing
/// the bytes they need.
fn window_starts_with(window: &[u8], len: usize, keep_last: bool, prefix: &[u8]) -> bool {
    probe(window, len, keep_last).bytes.starts_with(prefix)
}

/// Classify a leading byte window and recover the delimiter set in use.
///
/// Deterministic and idempotent: the same window always yields the same
/// result. Never errors; unrecognisable input classifies as `Unknown`.
#[must_use]
pub fn detect(window: &[u8]) -> Detection {
    let detection = if window_starts_with(window, X12_PROBE, true, b"ISA") {
        check_x12(window)
    } else if window_starts_with(window, UNA_PROBE, true, b"UNA")
        || window_starts_with(window, 4, false, b"UNB+")
    {
        check_edifact(window)
    } else if window_starts_with(window, 7, false, b"STX=") {
        check_tradacoms(window)
    } else {
        Detection::unknown()
    };
    debug!(kind = %detection.kind, "classified leading window");
    detection
}

/// Walk the `ISA` length table; see the module docs for the tolerance rules.
fn check_x12(window: &[u8]) -> Detection {
    let mut isa = probe(window, X12_PROBE, true);
    let Some(&element_separator) = isa.bytes.get(3) else {
        return Detection::unknown();
    };
    let mut kind = SyntaxKind::X12;
    let mut cursor = 0usize;
    for (field, &len) in ISA_FIELD_LENGTHS.iter().enumerate() {
        let Some(span) = memchr(element_separator, &isa.bytes[cursor..]) else {
            return Detection::unknown();
        };
        if span < len {
            if field == ISA_SENDER || field == ISA_RECEIVER {
                kind = SyntaxKind::FuzzyX12;
            } else {
                return Detection::unknown();
            }
        }
        cursor += span + 1;
    }
    if cursor < X12_SERVICE_OFFSET {
        // Short fields shifted the service characters left; re-probe with an
        // adjusted length so a CR/LF terminator at the new offset is kept.
        isa = probe(window, cursor + 2, true);
    }
    let (Some(&subelement_separator), Some(&segment_terminator)) =
        (isa.bytes.get(cursor), isa.bytes.get(cursor + 1))
    else {
        return Detection::unknown();
    };
    Detection {
        kind,
        delimiters: DelimiterSet {
            element_separator,
            subelement_separator,
            segment_terminator,
            escape: false,
            escape_character: 0,
        },
    }
}

/// Validate `UNA`/`UNB` and recover the EDIFACT service characters.
fn check_edifact(window: &[u8]) -> Detection {
    let mut delimiters = DelimiterSet::EDIFACT_DEFAULT;
    let mut offset = 0usize;
    let una = probe(window, UNA_PROBE, true);
    if una.bytes.len() == UNA_PROBE && una.bytes.starts_with(b"UNA") {
        // UNA<sub><elem><decimal><escape><reserved><term>; the decimal
        // notation character at offset 5 is not used here.
        delimiters.subelement_separator = una.bytes[3];
        delimiters.element_separator = una.bytes[4];
        delimiters.escape_character = una.bytes[6];
        delimiters.segment_terminator = una.bytes[8];
        offset = UNA_PROBE + una.skipped;
        while window.get(offset).is_some_and(|&b| is_extra(b)) {
            offset += 1;
        }
    }
    let rest = window.get(offset..).unwrap_or_default();
    let unb = probe(rest, 4, false);
    if unb.bytes != [b'U', b'N', b'B', delimiters.element_separator] {
        return Detection::unknown();
    }
    if !header_element_count_ok(rest, &delimiters, EDIFACT_ELEMENTS) {
        return Detection::unknown();
    }
    Detection {
        kind: SyntaxKind::Edifact,
        delimiters,
    }
}

/// TRADACOMS carries no advice segment; only the fixed defaults apply.
fn check_tradacoms(window: &[u8]) -> Detection {
    let delimiters = DelimiterSet::TRADACOMS_DEFAULT;
    if !header_element_count_ok(window, &delimiters, TRADACOMS_ELEMENTS) {
        return Detection::unknown();
    }
    Detection {
        kind: SyntaxKind::Tradacoms,
        delimiters,
    }
}

/// Count element separators up to the first segment terminator in the
/// window and check the count against the accepted range. A window with
/// no terminator at all is accepted: the opening segment may simply be
/// longer than the buffered preview.
fn header_element_count_ok(
    window: &[u8],
    delimiters: &DelimiterSet,
    accepted: std::ops::RangeInclusive<usize>,
) -> bool {
    let mut count = 0usize;
    for &b in window {
        if b == delimiters.element_separator {
            count += 1;
        } else if b == delimiters.segment_terminator {
            return accepted.contains(&count);
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    const ISA: &str = "ISA*00*          *00*          *02*EPES           \
                       *08*3111190000     *171020*0834*U*00401*000059772*0*P*>~";

    #[test]
    fn detects_x12_with_delimiters() {
        let d = detect(ISA.as_bytes());
        assert_eq!(d.kind, SyntaxKind::X12);
        assert_eq!(d.delimiters.element_separator, b'*');
        assert_eq!(d.delimiters.subelement_separator, b'>');
        assert_eq!(d.delimiters.segment_terminator, b'~');
        assert!(!d.delimiters.escape);
    }

    #[test]
    fn short_sender_degrades_to_fuzzy() {
        let fuzzy = ISA.replace("EPES           ", "EPES");
        let d = detect(fuzzy.as_bytes());
        assert_eq!(d.kind, SyntaxKind::FuzzyX12);
        assert_eq!(d.delimiters.segment_terminator, b'~');
    }

    #[test]
    fn short_control_field_is_unknown() {
        let broken = ISA.replace("000059772", "0059772");
        assert_eq!(detect(broken.as_bytes()).kind, SyntaxKind::Unknown);
    }

    #[test]
    fn truncated_window_is_unknown() {
        assert_eq!(detect(b"ISA*00*          *00").kind, SyntaxKind::Unknown);
    }

    #[test]
    fn embedded_crlf_is_skipped_in_probe() {
        let wrapped = format!("{}\r\n{}", &ISA[..40], &ISA[40..]);
        assert_eq!(detect(wrapped.as_bytes()).kind, SyntaxKind::X12);
    }

    #[test]
    fn una_overrides_edifact_defaults() {
        let d = detect(b"UNA;^.! |UNB^UNOA;1^SENDER^RECEIVER^171020;0834^REF001|");
        assert_eq!(d.kind, SyntaxKind::Edifact);
        assert_eq!(d.delimiters.subelement_separator, b';');
        assert_eq!(d.delimiters.element_separator, b'^');
        assert_eq!(d.delimiters.escape_character, b'!');
        assert_eq!(d.delimiters.segment_terminator, b'|');
        assert!(d.delimiters.escape);
    }

    #[test]
    fn edifact_defaults_without_una() {
        let d = detect(b"UNB+UNOA:1+SENDER+RECEIVER+171020:0834+REF001'UNH+1+ORDERS:D'");
        assert_eq!(d.kind, SyntaxKind::Edifact);
        assert_eq!(d.delimiters, DelimiterSet::EDIFACT_DEFAULT);
    }

    #[rstest]
    #[case::too_few(b"UNB+ONLY+THREE+SEPS'".as_slice())]
    #[case::too_many(b"UNB+1+2+3+4+5+6+7+8+9+10+11+12'".as_slice())]
    fn edifact_element_count_window_is_enforced(#[case] window: &[u8]) {
        assert_eq!(detect(window).kind, SyntaxKind::Unknown);
    }

    #[test]
    fn tradacoms_uses_fixed_defaults() {
        let d = detect(b"STX=ANA:1+5000000000000:SUPPLIER+5010000000000:BUYER+920113:1012+000001+PASSW+ORDHDR+B'");
        assert_eq!(d.kind, SyntaxKind::Tradacoms);
        assert_eq!(d.delimiters, DelimiterSet::TRADACOMS_DEFAULT);
    }

    #[test]
    fn tradacoms_element_count_window_is_enforced() {
        assert_eq!(detect(b"STX=A+B'").kind, SyntaxKind::Unknown);
    }

    #[rstest]
    #[case::xml(b"<Blink><Flim flam=\"boo\">content</Flim></Blink>".as_slice())]
    #[case::empty(b"".as_slice())]
    #[case::free_text(b"hello, this is not EDI at all".as_slice())]
    fn arbitrary_content_is_unknown(#[case] window: &[u8]) {
        assert_eq!(detect(window).kind, SyntaxKind::Unknown);
    }

    #[test]
    fn detection_is_idempotent() {
        let first = detect(ISA.as_bytes());
        let second = detect(ISA.as_bytes());
        assert_eq!(first, second);
    }
}

#[cfg(test)]
mod bdd {
    use std::cell::RefCell;

    use rstest::fixture;
    use rstest_bdd_macros::{given, scenario, then, when};

    use super::*;

    const X12_WINDOW: &str = "ISA*00*          *00*          *02*EPES           \
                              *08*3111190000     *171020*0834*U*00401*000059772*0*P*>~";

    #[derive(Default)]
    struct DetectWorld {
        window: RefCell<Vec<u8>>,
        outcome: RefCell<Option<Detection>>,
    }

    impl DetectWorld {
        fn set_window(&self, bytes: &[u8]) {
            let mut target = self.window.borrow_mut();
            target.clear();
            target.extend_from_slice(bytes);
        }
    }

    #[fixture]
    fn world() -> DetectWorld {
        let world = DetectWorld::default();
        world.set_window(X12_WINDOW.as_bytes());
        world
    }

    fn window_for_kind(kind: &str) -> Vec<u8> {
        match kind {
            "x12" => X12_WINDOW.as_bytes().to_vec(),
            "fuzzy-x12" => X12_WINDOW
                .replace("EPES           ", "EPES")
                .into_bytes(),
            "edifact-una" => b"UNA:+.? 'UNB+UNOA:1+SENDER+RECEIVER+171020:0834+REF001'".to_vec(),
            "plain-text" => b"just some ordinary file content".to_vec(),
            other => panic!("unknown window kind '{other}'"),
        }
    }

    #[given("a transmission window of kind \"{kind}\"")]
    #[expect(
        clippy::needless_pass_by_value,
        reason = "rstest-bdd step parameters must be owned; keep String until macro supports &str \
                  captures"
    )]
    fn given_window(world: &DetectWorld, kind: String) {
        world.set_window(&window_for_kind(&kind));
    }

    #[when("I detect the transmission syntax")]
    fn when_detect(world: &DetectWorld) {
        let detection = detect(&world.window.borrow());
        world.outcome.borrow_mut().replace(detection);
    }

    #[expect(
        clippy::needless_pass_by_value,
        reason = "rstest-bdd step parameters must be owned; keep String until macro supports &str \
                  captures"
    )]
    #[then("the detected syntax is \"{name}\"")]
    fn then_syntax(world: &DetectWorld, name: String) {
        let outcome_ref = world.outcome.borrow();
        let Some(detection) = outcome_ref.as_ref() else {
            panic!("detection not executed");
        };
        assert_eq!(detection.kind.to_string(), name);
    }

    #[expect(
        clippy::needless_pass_by_value,
        reason = "rstest-bdd step parameters must be owned; keep String until macro supports &str \
                  captures"
    )]
    #[then("the segment terminator is \"{terminator}\"")]
    fn then_terminator(world: &DetectWorld, terminator: String) {
        let outcome_ref = world.outcome.borrow();
        let Some(detection) = outcome_ref.as_ref() else {
            panic!("detection not executed");
        };
        assert_eq!(
            terminator.as_bytes(),
            &[detection.delimiters.segment_terminator][..]
        );
    }

    #[scenario(path = "tests/features/detection.feature", index = 0)]
    fn classifies_x12(world: DetectWorld) { let _ = world; }

    #[scenario(path = "tests/features/detection.feature", index = 1)]
    fn degrades_to_fuzzy(world: DetectWorld) { let _ = world; }

    #[scenario(path = "tests/features/detection.feature", index = 2)]
    fn recovers_una_delimiters(world: DetectWorld) { let _ = world; }

    #[scenario(path = "tests/features/detection.feature", index = 3)]
    fn rejects_plain_text(world: DetectWorld) { let _ = world; }
}
