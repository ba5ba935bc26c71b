//! An application for reading the group meta-data of an FBR file.

use std::env;
use visubrain::FbrFile;

fn main() {
    let mut args = env::args().skip(1);
    let filename = args.next().expect("Path to FBR file is required");
    let fbr = FbrFile::from_file(&filename).expect("Failed to read FBR file");
    println!("{}", fbr.summary(&filename));
}
