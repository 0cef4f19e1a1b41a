#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        // Forged signatures must fail verification, never panic.
        let _ = nfse::sign::verify_xml(s);
    }
});
