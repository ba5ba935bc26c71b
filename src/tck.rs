//! MRtrix (.tck) streamline files.
//!
//! The file starts with a text header made of `key: value` lines, opened by
//! `mrtrix tracks` and closed by `END`. The `file` field gives the offset of
//! the binary data, a sequence of point triplets in RAS+mm. A NaN triplet
//! ends a streamline and an infinite triplet ends the data.

use crate::error::{ConvertError, Result};
use crate::reference::AnatomicalReference;
use crate::streamline::{Point, Streamline, Tractogram};
use crate::util::read_file;
use byteordered::{ByteOrdered, Endian, Endianness};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::debug;

/// First line of every TCK file.
pub const MAGIC: &str = "mrtrix tracks";

/// Header keys managed by the codec itself.
const RESERVED_KEYS: [&str; 3] = ["count", "datatype", "file"];

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
enum DataType {
    Float32(Endianness),
    Float64(Endianness),
}

impl DataType {
    fn parse(text: &str) -> Result<Self> {
        match text {
            "Float32LE" => Ok(DataType::Float32(Endianness::Little)),
            "Float32BE" => Ok(DataType::Float32(Endianness::Big)),
            "Float64LE" => Ok(DataType::Float64(Endianness::Little)),
            "Float64BE" => Ok(DataType::Float64(Endianness::Big)),
            other => Err(ConvertError::InvalidTck(format!("unsupported datatype {:?}", other))),
        }
    }

    fn triplet_size(self) -> usize {
        match self {
            DataType::Float32(_) => 12,
            DataType::Float64(_) => 24,
        }
    }
}

/// A TCK file: its streamlines, in RAS+mm, and the header fields other than
/// `count`, `datatype` and `file`, in their original order.
#[derive(Debug, PartialEq, Clone, Default)]
pub struct TckFile {
    /// Header key-value pairs.
    pub fields: Vec<(String, String)>,
    /// Streamlines in RAS+mm.
    pub streamlines: Vec<Streamline>,
}

impl TckFile {
    /// Read a TCK file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let bytes = read_file(path)?;
        Self::from_bytes(&bytes)
    }

    /// Parse a whole TCK file held in memory.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let (fields, offset, datatype) = parse_header(bytes)?;
        if offset > bytes.len() {
            return Err(ConvertError::InvalidTck(format!(
                "data offset {} lies beyond the end of the file",
                offset
            )));
        }
        let streamlines = parse_data(&bytes[offset..], datatype)?;
        debug!(
            ?datatype,
            offset,
            streamlines = streamlines.len(),
            "parsed TCK file"
        );
        Ok(TckFile { fields, streamlines })
    }

    /// Tie the streamlines to an anatomical reference. TCK files carry no
    /// affine of their own.
    pub fn into_tractogram(self, reference: AnatomicalReference) -> Tractogram {
        Tractogram::new(self.streamlines, reference)
    }

    /// Take the RAS+mm streamlines of a tractogram, with no extra header
    /// fields.
    pub fn from_tractogram(tractogram: &Tractogram) -> Self {
        TckFile {
            fields: Vec::new(),
            streamlines: tractogram.streamlines().to_vec(),
        }
    }

    /// Write the file as little-endian `Float32LE` data.
    pub fn write_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.write_to(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    /// Serialize the file, with the data as little endian 32-bit floats.
    pub fn write_to<W: Write>(&self, writer: W) -> Result<()> {
        let mut out = ByteOrdered::le(writer);
        out.write_all(self.header_text().as_bytes())?;
        for s in &self.streamlines {
            for p in s {
                write_triplet(&mut out, p.x, p.y, p.z)?;
            }
            write_triplet(&mut out, f32::NAN, f32::NAN, f32::NAN)?;
        }
        write_triplet(&mut out, f32::INFINITY, f32::INFINITY, f32::INFINITY)?;
        Ok(())
    }

    /// The text header, with a `file` offset pointing right past it.
    fn header_text(&self) -> String {
        let mut base = format!(
            "{}\ncount: {:010}\ndatatype: Float32LE\n",
            MAGIC,
            self.streamlines.len()
        );
        for (key, value) in &self.fields {
            if !RESERVED_KEYS.contains(&key.as_str()) {
                base.push_str(&format!("{}: {}\n", key, value));
            }
        }
        // the offset is part of the header it measures
        let mut offset = base.len();
        loop {
            let total = base.len() + format!("file: . {}\nEND\n", offset).len();
            if total == offset {
                break;
            }
            offset = total;
        }
        format!("{}file: . {}\nEND\n", base, offset)
    }
}

fn write_triplet<W, E>(out: &mut ByteOrdered<W, E>, x: f32, y: f32, z: f32) -> Result<()>
where
    W: Write,
    E: Endian,
{
    out.write_f32(x)?;
    out.write_f32(y)?;
    out.write_f32(z)?;
    Ok(())
}

type Header = (Vec<(String, String)>, usize, DataType);

fn parse_header(bytes: &[u8]) -> Result<Header> {
    let mut lines = bytes.split(|&b| b == b'\n');
    let first = lines.next().unwrap_or_default();
    if String::from_utf8_lossy(first).trim_end() != MAGIC {
        return Err(ConvertError::InvalidTck("missing \"mrtrix tracks\" line".to_owned()));
    }

    let mut fields = Vec::new();
    let mut offset = None;
    let mut datatype = None;
    let mut ended = false;
    for line in lines {
        let line = String::from_utf8_lossy(line);
        let line = line.trim();
        if line == "END" {
            ended = true;
            break;
        }
        if line.is_empty() {
            continue;
        }
        let (key, value) = line
            .split_once(':')
            .ok_or_else(|| ConvertError::InvalidTck(format!("malformed header line {:?}", line)))?;
        let (key, value) = (key.trim(), value.trim());
        match key {
            "file" => offset = Some(parse_offset(value)?),
            "datatype" => datatype = Some(DataType::parse(value)?),
            "count" => {}
            _ => fields.push((key.to_owned(), value.to_owned())),
        }
    }

    if !ended {
        return Err(ConvertError::InvalidTck("header is not terminated by END".to_owned()));
    }
    let offset = offset.ok_or_else(|| ConvertError::InvalidTck("missing file field".to_owned()))?;
    let datatype =
        datatype.ok_or_else(|| ConvertError::InvalidTck("missing datatype field".to_owned()))?;
    Ok((fields, offset, datatype))
}

/// Parse the value of the `file` field, such as `. 67`.
fn parse_offset(value: &str) -> Result<usize> {
    let mut parts = value.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some("."), Some(offset), None) => offset
            .parse()
            .map_err(|_| ConvertError::InvalidTck(format!("invalid data offset {:?}", offset))),
        _ => Err(ConvertError::InvalidTck(format!(
            "data must follow the header in the same file, found {:?}",
            value
        ))),
    }
}

fn parse_data(data: &[u8], datatype: DataType) -> Result<Vec<Streamline>> {
    let size = datatype.triplet_size();
    let mut streamlines = Vec::new();
    let mut current = Vec::new();
    for chunk in data.chunks(size) {
        if chunk.len() < size {
            return Err(ConvertError::InvalidTck("truncated point data".to_owned()));
        }
        let [x, y, z] = read_triplet(chunk, datatype)?;
        if x.is_infinite() {
            break;
        }
        if x.is_nan() {
            streamlines.push(std::mem::take(&mut current));
        } else {
            current.push(Point::new(x, y, z));
        }
    }
    if !current.is_empty() {
        streamlines.push(current);
    }
    Ok(streamlines)
}

fn read_triplet(chunk: &[u8], datatype: DataType) -> Result<[f32; 3]> {
    let mut triplet = [0f32; 3];
    match datatype {
        DataType::Float32(e) => {
            let mut input = ByteOrdered::runtime(chunk, e);
            for v in &mut triplet {
                *v = input.read_f32()?;
            }
        }
        DataType::Float64(e) => {
            let mut input = ByteOrdered::runtime(chunk, e);
            for v in &mut triplet {
                *v = input.read_f64()? as f32;
            }
        }
    }
    Ok(triplet)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> TckFile {
        TckFile {
            fields: vec![("step_size".to_owned(), "0.5".to_owned())],
            streamlines: vec![
                vec![Point::new(1., 2., 3.), Point::new(4., 5., 6.)],
                vec![Point::new(-1., 0.5, 2.)],
            ],
        }
    }

    #[test]
    fn header_offset_is_consistent() {
        let tck = sample();
        let text = tck.header_text();
        assert!(text.starts_with("mrtrix tracks\ncount: 0000000002\ndatatype: Float32LE\n"));
        assert!(text.contains("step_size: 0.5\n"));
        assert!(text.ends_with("END\n"));
        let (_, offset, datatype) = parse_header(text.as_bytes()).unwrap();
        assert_eq!(offset, text.len());
        assert_eq!(datatype, DataType::Float32(Endianness::Little));
    }

    #[test]
    fn read_back() {
        let tck = sample();
        let mut bytes = Vec::new();
        tck.write_to(&mut bytes).unwrap();
        let back = TckFile::from_bytes(&bytes).unwrap();
        assert_eq!(back, tck);
    }

    #[test]
    fn float64_big_endian() {
        let header = "mrtrix tracks\ndatatype: Float64BE\nfile: . 64\nEND\n";
        let mut bytes = header.as_bytes().to_vec();
        bytes.resize(64, 0);
        for v in &[1.0f64, 2.0, 3.0, f64::NAN, f64::NAN, f64::NAN] {
            bytes.extend_from_slice(&v.to_be_bytes());
        }
        for _ in 0..3 {
            bytes.extend_from_slice(&f64::INFINITY.to_be_bytes());
        }
        let tck = TckFile::from_bytes(&bytes).unwrap();
        assert_eq!(tck.streamlines, vec![vec![Point::new(1., 2., 3.)]]);
    }

    #[test]
    fn rejects_bad_headers() {
        assert!(TckFile::from_bytes(b"not a tck file\nEND\n").is_err());
        assert!(TckFile::from_bytes(b"mrtrix tracks\ndatatype: Float32LE\nEND\n").is_err());
        assert!(TckFile::from_bytes(b"mrtrix tracks\ndatatype: Int8\nfile: . 40\nEND\n").is_err());
        assert!(TckFile::from_bytes(b"mrtrix tracks\nfile: . 30\ndatatype: Float32LE\n").is_err());
    }
}
