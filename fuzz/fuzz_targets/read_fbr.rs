#![no_main]
use libfuzzer_sys::fuzz_target;
use visubrain::FbrFile;

fuzz_target!(|data: &[u8]| {
    let _ = FbrFile::from_reader(data);
});
