#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Parsing is infallible; it must not panic or loop
    let _ = hcqr::query::parse_query(data);
});
