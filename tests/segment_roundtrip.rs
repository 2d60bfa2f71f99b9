//! Property tests: decomposition round-trips and escape safety.

use edimux::{detect::detect, syntax::SyntaxKind, tokenizer::SegmentTokenizer};
use proptest::prelude::*;

const ISA: &str = "ISA*00*          *00*          *02*EPES           \
                   *08*3111190000     *171020*0834*U*00401*000059772*0*P*>~";
const UNB: &str = "UNB+UNOA:1+SENDER+RECEIVER+171020:0834+REF001'";

/// Element content safe under X12 delimiters `* > ~`.
fn x12_text() -> impl Strategy<Value = String> {
    proptest::string::string_regex("[A-Za-z0-9 .-]{0,12}").expect("valid regex")
}

/// Element content that may contain the EDIFACT delimiters themselves
/// (escaped on the wire), but never the release character.
fn edifact_text() -> impl Strategy<Value = String> {
    proptest::string::string_regex("[A-Za-z0-9 +:']{0,12}").expect("valid regex")
}

/// Apply EDIFACT escaping: release every delimiter byte in `text`.
fn wire_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '+' | ':' | '\'') {
            out.push('?');
        }
        out.push(c);
    }
    out
}

proptest! {
    /// Reassembling name + elements + terminator reproduces the raw
    /// bytes of an X12 segment exactly.
    #[test]
    fn x12_segment_roundtrip(elements in proptest::collection::vec(x12_text(), 1..6)) {
        let body = format!("B10*{}~", elements.join("*"));
        let input = format!("{ISA}{body}IEA*1*000059772~");
        let mut tokenizer = SegmentTokenizer::new(input.as_bytes()).expect("tokenizer");
        let _isa = tokenizer.next_segment().expect("io").expect("segment");
        let seg = tokenizer.next_segment().expect("io").expect("segment");

        prop_assert_eq!(seg.name(), "B10");
        let texts: Vec<&str> = seg.elements().iter().map(|e| e.text()).collect();
        prop_assert_eq!(&texts, &elements);

        let mut rebuilt = seg.name().to_owned();
        for element in seg.elements() {
            rebuilt.push('*');
            rebuilt.push_str(element.text());
        }
        rebuilt.extend(seg.trailing().iter().map(|&b| char::from(b)));
        prop_assert_eq!(rebuilt.as_bytes(), seg.raw());
    }

    /// A delimiter byte preceded by the release character never splits,
    /// and re-escaping the decomposed texts reproduces the wire bytes.
    #[test]
    fn edifact_escape_roundtrip(elements in proptest::collection::vec(edifact_text(), 1..5)) {
        let escaped: Vec<String> = elements.iter().map(|e| wire_escape(e)).collect();
        let body = format!("FTX+{}'", escaped.join("+"));
        let input = format!("{UNB}{body}UNT+2+1'UNZ+1+REF001'");
        let mut tokenizer = SegmentTokenizer::new(input.as_bytes()).expect("tokenizer");
        let _unb = tokenizer.next_segment().expect("io").expect("segment");
        let seg = tokenizer.next_segment().expect("io").expect("segment");

        prop_assert_eq!(seg.name(), "FTX");
        let texts: Vec<&str> = seg.elements().iter().map(|e| e.text()).collect();
        prop_assert_eq!(&texts, &elements);

        let mut rebuilt = seg.name().to_owned();
        for element in seg.elements() {
            rebuilt.push('+');
            rebuilt.push_str(&wire_escape(element.text()));
        }
        rebuilt.push('\'');
        prop_assert_eq!(rebuilt.as_bytes(), seg.raw());
    }

    /// Classification of the same window is deterministic.
    #[test]
    fn detection_is_idempotent(window in proptest::collection::vec(any::<u8>(), 0..256)) {
        let first = detect(&window);
        let second = detect(&window);
        prop_assert_eq!(first, second);
    }

    /// Arbitrary short windows never classify as EDI unless they carry a
    /// plausible envelope opener.
    #[test]
    fn random_text_windows_classify_unknown(window in "[a-z ]{0,64}") {
        prop_assert_eq!(detect(window.as_bytes()).kind, SyntaxKind::Unknown);
    }
}
