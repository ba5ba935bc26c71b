//! TrackVis (.trk) streamline files.
//!
//! A TRK file is a 1000-byte header followed by the streamlines. Each
//! streamline starts with its point count, followed by the points (and any
//! per-point scalars) then any per-streamline properties. Points are stored
//! in "voxmm" space: voxel coordinates with the origin at the corner of the
//! first voxel, multiplied by the voxel size.
//!
//! Scalars and properties are skipped when reading and never written.

use crate::affine::{self, Affine4};
use crate::error::{ConvertError, Result};
use crate::reference::AnatomicalReference;
use crate::streamline::{Point, Space, Streamline, Tractogram};
use crate::util::{read_file, PREALLOC_LIMIT};
use byteordered::{ByteOrdered, Endian, Endianness};
use nalgebra::Vector4;
use std::convert::TryFrom;
use std::fs::File;
use std::io::{self, BufWriter, Cursor, Read, Write};
use std::path::Path;
use tracing::{debug, warn};

/// Value of `hdr_size`, also used to detect the byte order of a file.
pub const HEADER_SIZE: usize = 1000;

/// The identification string opening every TRK file.
pub const MAGIC: [u8; 6] = *b"TRACK\0";

const NAMES_LEN: usize = 200;
const RESERVED_LEN: usize = 444;

/// The TrackVis header. Fields describing scalar and property names are
/// not retained.
#[derive(Debug, PartialEq, Clone)]
pub struct TrkHeader {
    /// Volume shape, in voxels.
    pub dim: [i16; 3],
    /// Voxel sizes in millimeters.
    pub voxel_size: [f32; 3],
    /// Unused by TrackVis; kept as read.
    pub origin: [f32; 3],
    /// Number of scalars stored with each point.
    pub n_scalars: i16,
    /// Number of properties stored with each streamline.
    pub n_properties: i16,
    /// Voxel to RAS+mm affine. All zeros in files older than version 2.
    pub vox_to_ras: Affine4,
    /// Axis codes of the voxel grid, such as `b"RAS\0"`.
    pub voxel_order: [u8; 4],
    /// DICOM image orientation, as written by the scanner.
    pub image_orientation_patient: [f32; 6],
    /// Display-only axis inversion flags.
    pub invert: [u8; 3],
    /// Display-only axis swap flags.
    pub swap: [u8; 3],
    /// Number of streamlines, or 0 when unknown.
    pub n_count: i32,
    /// Format version, 2 for files written by this crate.
    pub version: i32,
}

impl Default for TrkHeader {
    fn default() -> Self {
        TrkHeader {
            dim: [1; 3],
            voxel_size: [1.; 3],
            origin: [0.; 3],
            n_scalars: 0,
            n_properties: 0,
            vox_to_ras: Affine4::identity(),
            voxel_order: *b"RAS\0",
            image_orientation_patient: [0.; 6],
            invert: [0; 3],
            swap: [0; 3],
            n_count: 0,
            version: 2,
        }
    }
}

impl TrkHeader {
    /// The affine to use as voxel to RAS+mm. Headers without one fall back
    /// to a scaling by the voxel size.
    pub fn affine(&self) -> Affine4 {
        if self.vox_to_ras[(3, 3)] == 0.0 {
            let [x, y, z] = self.voxel_size;
            Affine4::from_diagonal(&Vector4::new(f64::from(x), f64::from(y), f64::from(z), 1.0))
        } else {
            self.vox_to_ras
        }
    }

    /// The anatomical reference described by the header.
    pub fn reference(&self) -> Result<AnatomicalReference> {
        let mut shape = [0; 3];
        for (s, d) in shape.iter_mut().zip(&self.dim) {
            *s = usize::try_from(*d).map_err(|_| ConvertError::InvalidTrk("negative dimension"))?;
        }
        let affine = self.affine();
        let codes = affine::axis_codes(&affine);
        if self.voxel_order[0] != 0 && self.voxel_order[..3] != codes {
            warn!(
                header = %String::from_utf8_lossy(&self.voxel_order[..3]),
                affine = %String::from_utf8_lossy(&codes),
                "TRK voxel order does not match the affine, trusting the affine"
            );
        }
        Ok(AnatomicalReference::new(shape, affine))
    }

    /// Build a header for streamlines tied to the given reference.
    pub fn from_reference(reference: &AnatomicalReference) -> Result<Self> {
        let mut dim = [0i16; 3];
        for (d, s) in dim.iter_mut().zip(&reference.shape()) {
            *d = i16::try_from(*s)
                .map_err(|_| ConvertError::InvalidTrk("volume dimensions exceed the TRK limit"))?;
        }
        let sizes = reference.voxel_sizes();
        let codes = reference.axis_codes();
        Ok(TrkHeader {
            dim,
            voxel_size: [sizes.x as f32, sizes.y as f32, sizes.z as f32],
            vox_to_ras: *reference.affine(),
            voxel_order: [codes[0], codes[1], codes[2], 0],
            ..TrkHeader::default()
        })
    }
}

/// A TRK file with its streamlines in voxmm space.
#[derive(Debug, PartialEq, Clone)]
pub struct TrkFile {
    /// The 1000-byte header.
    pub header: TrkHeader,
    /// Streamlines in voxmm.
    pub streamlines: Vec<Streamline>,
}

impl TrkFile {
    /// Read a TRK file. Names ending with ".gz" are decompressed first.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let bytes = read_file(path)?;
        Self::from_bytes(&bytes)
    }

    /// Parse a TRK file held in memory. The byte order is detected from the
    /// `hdr_size` field.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(ConvertError::InvalidTrk("file shorter than its header"));
        }
        if bytes[..5] != MAGIC[..5] {
            return Err(ConvertError::InvalidTrk("missing TRACK identification string"));
        }
        let mut size = [0u8; 4];
        size.copy_from_slice(&bytes[HEADER_SIZE - 4..HEADER_SIZE]);
        let endianness = if i32::from_le_bytes(size) == HEADER_SIZE as i32 {
            Endianness::Little
        } else if i32::from_be_bytes(size) == HEADER_SIZE as i32 {
            Endianness::Big
        } else {
            return Err(ConvertError::InvalidTrk("header size is not 1000"));
        };

        let header = parse_header(ByteOrdered::runtime(&bytes[..HEADER_SIZE], endianness))?;
        let streamlines = parse_streamlines(&bytes[HEADER_SIZE..], &header, endianness)?;
        debug!(
            ?endianness,
            version = header.version,
            streamlines = streamlines.len(),
            "parsed TRK file"
        );
        Ok(TrkFile { header, streamlines })
    }

    /// Bring the streamlines to RAS+mm.
    pub fn into_tractogram(self) -> Result<Tractogram> {
        let reference = self.header.reference()?;
        Tractogram::from_space(self.streamlines, Space::VoxMm, reference)
    }

    /// Prepare a tractogram for writing, with a header derived from its
    /// reference.
    pub fn from_tractogram(tractogram: &Tractogram) -> Result<Self> {
        let mut header = TrkHeader::from_reference(tractogram.reference())?;
        header.n_count = i32::try_from(tractogram.len())
            .map_err(|_| ConvertError::InvalidTrk("too many streamlines"))?;
        let streamlines = tractogram.streamlines_in(Space::VoxMm)?;
        Ok(TrkFile { header, streamlines })
    }

    /// Write the file, in little endian.
    pub fn write_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.write_to(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    /// Serialize the file into the given writer, in little endian.
    /// Scalar and property counts are written as 0.
    pub fn write_to<W: Write>(&self, writer: W) -> Result<()> {
        let mut out = ByteOrdered::le(writer);
        write_header(&mut out, &self.header)?;
        for s in &self.streamlines {
            let n = i32::try_from(s.len())
                .map_err(|_| ConvertError::InvalidTrk("streamline too long"))?;
            out.write_i32(n)?;
            for p in s {
                out.write_f32(p.x)?;
                out.write_f32(p.y)?;
                out.write_f32(p.z)?;
            }
        }
        Ok(())
    }
}

fn skip<R: Read>(input: &mut R, n: usize) -> io::Result<()> {
    let mut buf = [0u8; NAMES_LEN];
    let mut left = n;
    while left > 0 {
        let chunk = left.min(buf.len());
        input.read_exact(&mut buf[..chunk])?;
        left -= chunk;
    }
    Ok(())
}

fn parse_header<R, E>(mut input: ByteOrdered<R, E>) -> Result<TrkHeader>
where
    R: Read,
    E: Endian,
{
    skip(&mut input, MAGIC.len())?;
    let mut h = TrkHeader::default();
    for v in &mut h.dim {
        *v = input.read_i16()?;
    }
    for v in &mut h.voxel_size {
        *v = input.read_f32()?;
    }
    for v in &mut h.origin {
        *v = input.read_f32()?;
    }
    h.n_scalars = input.read_i16()?;
    skip(&mut input, NAMES_LEN)?;
    h.n_properties = input.read_i16()?;
    skip(&mut input, NAMES_LEN)?;
    for i in 0..4 {
        for j in 0..4 {
            h.vox_to_ras[(i, j)] = f64::from(input.read_f32()?);
        }
    }
    skip(&mut input, RESERVED_LEN)?;
    input.read_exact(&mut h.voxel_order)?;
    skip(&mut input, 4)?;
    for v in &mut h.image_orientation_patient {
        *v = input.read_f32()?;
    }
    skip(&mut input, 2)?;
    input.read_exact(&mut h.invert)?;
    input.read_exact(&mut h.swap)?;
    h.n_count = input.read_i32()?;
    h.version = input.read_i32()?;

    if h.n_scalars < 0 || h.n_properties < 0 {
        return Err(ConvertError::InvalidTrk("negative scalar or property count"));
    }
    Ok(h)
}

fn parse_streamlines(body: &[u8], header: &TrkHeader, endianness: Endianness) -> Result<Vec<Streamline>> {
    let truncated = |_| ConvertError::InvalidTrk("truncated streamline data");
    let n_scalars = header.n_scalars as usize;
    let n_properties = header.n_properties as usize;
    let expected = usize::try_from(header.n_count).unwrap_or(0);

    let mut streamlines = Vec::with_capacity(expected.min(PREALLOC_LIMIT));
    let mut cursor = Cursor::new(body);
    while (cursor.position() as usize) < body.len() {
        let mut input = ByteOrdered::runtime(&mut cursor, endianness);
        let n = input.read_i32().map_err(truncated)?;
        let n = usize::try_from(n).map_err(|_| ConvertError::InvalidTrk("negative point count"))?;
        let mut points = Vec::with_capacity(n.min(PREALLOC_LIMIT));
        for _ in 0..n {
            let x = input.read_f32().map_err(truncated)?;
            let y = input.read_f32().map_err(truncated)?;
            let z = input.read_f32().map_err(truncated)?;
            skip(&mut input, n_scalars * 4).map_err(truncated)?;
            points.push(Point::new(x, y, z));
        }
        skip(&mut input, n_properties * 4).map_err(truncated)?;
        streamlines.push(points);
    }

    if expected > 0 && expected != streamlines.len() {
        warn!(
            declared = expected,
            found = streamlines.len(),
            "TRK streamline count does not match its header"
        );
    }
    Ok(streamlines)
}

fn write_header<W, E>(out: &mut ByteOrdered<W, E>, h: &TrkHeader) -> Result<()>
where
    W: Write,
    E: Endian,
{
    out.write_all(&MAGIC)?;
    for v in &h.dim {
        out.write_i16(*v)?;
    }
    for v in h.voxel_size.iter().chain(&h.origin) {
        out.write_f32(*v)?;
    }
    out.write_i16(0)?;
    out.write_all(&[0; NAMES_LEN])?;
    out.write_i16(0)?;
    out.write_all(&[0; NAMES_LEN])?;
    for i in 0..4 {
        for j in 0..4 {
            out.write_f32(h.vox_to_ras[(i, j)] as f32)?;
        }
    }
    out.write_all(&[0; RESERVED_LEN])?;
    out.write_all(&h.voxel_order)?;
    out.write_all(&[0; 4])?;
    for v in &h.image_orientation_patient {
        out.write_f32(*v)?;
    }
    out.write_all(&[0; 2])?;
    out.write_all(&h.invert)?;
    out.write_all(&h.swap)?;
    out.write_i32(h.n_count)?;
    out.write_i32(h.version)?;
    out.write_i32(HEADER_SIZE as i32)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> TrkFile {
        let mut vox_to_ras = Affine4::from_diagonal(&Vector4::new(2., 2., 2., 1.));
        vox_to_ras[(0, 3)] = -20.0;
        TrkFile {
            header: TrkHeader {
                dim: [20, 20, 20],
                voxel_size: [2., 2., 2.],
                vox_to_ras,
                n_count: 2,
                ..TrkHeader::default()
            },
            streamlines: vec![
                vec![Point::new(1., 1., 1.), Point::new(3., 1., 1.)],
                vec![Point::new(5., 6., 7.)],
            ],
        }
    }

    #[test]
    fn header_is_1000_bytes() {
        let mut bytes = Vec::new();
        write_header(&mut ByteOrdered::le(&mut bytes), &sample().header).unwrap();
        assert_eq!(bytes.len(), HEADER_SIZE);
        assert_eq!(&bytes[..6], b"TRACK\0");
        assert_eq!(&bytes[948..952], b"RAS\0");
    }

    #[test]
    fn read_back() {
        let trk = sample();
        let mut bytes = Vec::new();
        trk.write_to(&mut bytes).unwrap();
        assert_eq!(bytes.len(), HEADER_SIZE + 4 + 24 + 4 + 12);
        let back = TrkFile::from_bytes(&bytes).unwrap();
        assert_eq!(back, trk);
    }

    #[test]
    fn big_endian_with_scalars() {
        let trk = sample();
        let mut bytes = Vec::new();
        {
            let mut out = ByteOrdered::be(&mut bytes);
            write_header(&mut out, &trk.header).unwrap();
            out.write_i32(1).unwrap();
            for v in &[4.0f32, 5.0, 6.0, 99.0] {
                out.write_f32(*v).unwrap();
            }
        }
        // scalar count as written by write_header is always 0
        bytes[36..38].copy_from_slice(&1i16.to_be_bytes());
        let back = TrkFile::from_bytes(&bytes).unwrap();
        assert_eq!(back.header.n_scalars, 1);
        assert_eq!(back.streamlines, vec![vec![Point::new(4., 5., 6.)]]);
    }

    #[test]
    fn voxmm_to_world() {
        let tractogram = sample().into_tractogram().unwrap();
        // voxmm (1, 1, 1) is the centre of voxel (0, 0, 0)
        let first = tractogram.streamlines()[0][0];
        assert_eq!(first, Point::new(-20.0, 0.0, 0.0));
    }

    #[test]
    fn bad_header_size() {
        let mut bytes = Vec::new();
        sample().write_to(&mut bytes).unwrap();
        bytes[996..1000].copy_from_slice(&[0, 0, 0, 0]);
        assert!(matches!(
            TrkFile::from_bytes(&bytes),
            Err(ConvertError::InvalidTrk(_))
        ));
    }
}
