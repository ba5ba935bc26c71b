#![no_main]
use libfuzzer_sys::fuzz_target;
use visubrain::TrkFile;

fuzz_target!(|data: &[u8]| {
    let _ = TrkFile::from_bytes(data);
});
