#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    twofilters_engine::fuzz_parse_state(data);
});
