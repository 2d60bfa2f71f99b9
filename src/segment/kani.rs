//! Kani harnesses for the element unescaper.

use super::unescape;

#[kani::proof]
fn kani_unescape_never_grows() {
    let data: [u8; 4] = kani::any();
    let delim1: u8 = kani::any();
    let delim2: u8 = kani::any();
    let escape_character: u8 = kani::any();

    let out = unescape(&data, delim1, delim2, true, escape_character);

    kani::assert(out.len() <= data.len(), "unescaping never grows the data");
}

#[kani::proof]
fn kani_unescape_is_identity_when_disabled() {
    let data: [u8; 4] = kani::any();
    let delim1: u8 = kani::any();
    let delim2: u8 = kani::any();
    let escape_character: u8 = kani::any();

    let out = unescape(&data, delim1, delim2, false, escape_character);

    kani::assert(out == data, "disabled escaping leaves data untouched");
}
