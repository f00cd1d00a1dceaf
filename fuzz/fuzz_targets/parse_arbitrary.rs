#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Feed arbitrary bytes through the file parser. Err results are
    // expected and fine; what we verify is no panics and no OOB reads.
    let _ = hset::format::parse::parse(data);
});
