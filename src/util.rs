//! Private utility module
use either::Either;
use flate2::bufread::GzDecoder;
use std::convert::TryFrom;
use std::fs::File;
use std::io::{BufReader, Read, Result as IoResult};
use std::path::Path;

/// Upper bound on the number of elements reserved up front from a count
/// read out of a file. Larger collections still grow as data arrives.
pub const PREALLOC_LIMIT: usize = 1 << 16;

/// A file source which may need GZip decoding.
pub type MaybeGzFile = Either<GzDecoder<BufReader<File>>, BufReader<File>>;

/// Open a file for reading. If the file's name ends with ".gz", the
/// contents are decoded on the fly.
pub fn open_file<P: AsRef<Path>>(path: P) -> IoResult<MaybeGzFile> {
    let gz = is_gz_file(&path);
    let file = BufReader::new(File::open(path)?);
    if gz {
        Ok(Either::Left(GzDecoder::new(file)))
    } else {
        Ok(Either::Right(file))
    }
}

/// Read the whole contents of a file, decoding GZip if the name asks for it.
pub fn read_file<P: AsRef<Path>>(path: P) -> IoResult<Vec<u8>> {
    let mut source = open_file(path)?;
    let mut bytes = Vec::new();
    let _ = source.read_to_end(&mut bytes)?;
    Ok(bytes)
}

pub fn is_gz_file<P: AsRef<Path>>(path: P) -> bool {
    path.as_ref()
        .file_name()
        .map(|a| a.to_string_lossy().ends_with(".gz"))
        .unwrap_or(false)
}

/// Obtain the compound extension of a file name, lower-cased and without the
/// leading dot: everything after the first dot of the name, so that
/// `brain.nii.gz` yields `nii.gz`. Leading dots of hidden files are not
/// separators.
pub fn compound_extension<P: AsRef<Path>>(path: P) -> Option<String> {
    let name = path.as_ref().file_name()?.to_string_lossy().into_owned();
    let (_, ext) = name.trim_start_matches('.').split_once('.')?;
    if ext.is_empty() || ext.split('.').any(str::is_empty) {
        return None;
    }
    Some(ext.to_lowercase())
}

/// Decode a Latin-1 byte string. Every byte maps to the code point of the
/// same value, so this never fails.
pub fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

/// Encode a string as Latin-1, or `None` if a character lies beyond U+00FF.
pub fn encode_latin1(text: &str) -> Option<Vec<u8>> {
    text.chars()
        .map(|c| u8::try_from(u32::from(c)).ok())
        .collect()
}
