#![no_main]
use libfuzzer_sys::fuzz_target;
use visubrain::TckFile;

fuzz_target!(|data: &[u8]| {
    let _ = TckFile::from_bytes(data);
});
