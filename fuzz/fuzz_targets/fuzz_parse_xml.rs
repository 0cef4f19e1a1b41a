#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        // Errors are fine, panics are bugs.
        if let Ok(tree) = nfse::dps::parse_xml(s) {
            let _ = tree.to_xml();
        }
    }
});
