//! BrainVoyager anatomical volumes (.vmr).
//!
//! A VMR file holds an 8-bit volume. It starts with the file version and the
//! three dimensions, followed by the voxel data with x varying fastest.
//! Files of version 3 and later carry a second header after the data,
//! describing the position of the volume in scanner space.

pub mod pose;

use crate::error::{ConvertError, Result};
use crate::util::{decode_latin1, encode_latin1, PREALLOC_LIMIT};
use byteordered::{ByteOrdered, Endian};
use ndarray::Array3;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;
use tracing::debug;

/// Version written by this crate.
pub const VMR_VERSION: u16 = 4;

/// A spatial transformation previously applied to the volume.
#[derive(Debug, PartialEq, Clone, Default)]
pub struct SpatialTransformation {
    /// Name of the transformation.
    pub name: String,
    /// BrainVoyager transformation type code.
    pub kind: i32,
    /// File the transformation was computed from.
    pub source_file: String,
    /// Transformation matrix values, row by row.
    pub values: Vec<f32>,
}

/// The VMR header fields, from both sides of the voxel data.
#[derive(Debug, PartialEq, Clone)]
pub struct VmrHeader {
    /// File version.
    pub version: u16,
    /// Number of voxels along the fastest varying axis.
    pub dim_x: u16,
    /// Number of voxels along the second axis.
    pub dim_y: u16,
    /// Number of slices.
    pub dim_z: u16,
    /// Offset of the volume within the framing cube.
    pub offset: [i16; 3],
    /// Side of the cube the volume is framed in.
    pub framing_cube_dim: i16,
    /// Non-zero if the position fields below are valid.
    pub pos_infos_verified: i32,
    /// Coordinate system code; 0 is scanner space.
    pub coordinate_system: i32,
    /// Centre of the first slice, in scanner coordinates.
    pub slice1_center: [f32; 3],
    /// Centre of the last slice, in scanner coordinates.
    pub slice_n_center: [f32; 3],
    /// Direction of the slice rows.
    pub row_dir: [f32; 3],
    /// Direction of the slice columns.
    pub col_dir: [f32; 3],
    /// Rows per slice in the original acquisition.
    pub n_rows: i32,
    /// Columns per slice in the original acquisition.
    pub n_cols: i32,
    /// Field of view along the rows.
    pub fov_rows: f32,
    /// Field of view along the columns.
    pub fov_cols: f32,
    /// Thickness of the original slices.
    pub slice_thickness: f32,
    /// Gap between the original slices.
    pub gap_thickness: f32,
    /// Transformations applied to the volume, oldest first.
    pub past_transformations: Vec<SpatialTransformation>,
    /// 1 for radiological, 0 for neurological convention.
    pub left_right_convention: u8,
    /// Reference space code; 0 is native space.
    pub reference_space: u8,
    /// Voxel sizes in millimeters, paired with the row, column and slice
    /// directions.
    pub voxel_size: [f32; 3],
    /// Non-zero if `voxel_size` is valid.
    pub voxel_resolution_verified: u8,
    /// Non-zero if Talairach space keeps the voxel resolution.
    pub voxel_resolution_in_tal_mm: u8,
    /// Lowest intensity of the original 16-bit data.
    pub v16_min: i32,
    /// Mean intensity of the original 16-bit data.
    pub v16_mean: i32,
    /// Highest intensity of the original 16-bit data.
    pub v16_max: i32,
}

impl Default for VmrHeader {
    fn default() -> Self {
        VmrHeader {
            version: VMR_VERSION,
            dim_x: 0,
            dim_y: 0,
            dim_z: 0,
            offset: [0; 3],
            framing_cube_dim: 256,
            pos_infos_verified: 0,
            coordinate_system: 0,
            slice1_center: [0.; 3],
            slice_n_center: [0.; 3],
            row_dir: [0.; 3],
            col_dir: [0.; 3],
            n_rows: 0,
            n_cols: 0,
            fov_rows: 0.,
            fov_cols: 0.,
            slice_thickness: 0.,
            gap_thickness: 0.,
            past_transformations: Vec::new(),
            left_right_convention: 1,
            reference_space: 0,
            voxel_size: [1.; 3],
            voxel_resolution_verified: 0,
            voxel_resolution_in_tal_mm: 1,
            v16_min: 0,
            v16_mean: 0,
            v16_max: 0,
        }
    }
}

impl VmrHeader {
    /// Shape of the voxel data, as `(DimZ, DimY, DimX)`.
    pub fn data_shape(&self) -> (usize, usize, usize) {
        (
            usize::from(self.dim_z),
            usize::from(self.dim_y),
            usize::from(self.dim_x),
        )
    }
}

/// A VMR volume. The data is indexed `[z, y, x]`.
#[derive(Debug, PartialEq, Clone)]
pub struct VmrVolume {
    /// Header fields.
    pub header: VmrHeader,
    /// Voxel values.
    pub data: Array3<u8>,
}

impl VmrVolume {
    /// Read a VMR file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = BufReader::new(File::open(path)?);
        Self::from_reader(file)
    }

    /// Read a VMR volume from a byte source.
    pub fn from_reader<R: Read>(source: R) -> Result<Self> {
        let mut input = ByteOrdered::le(source);
        let mut header = VmrHeader {
            version: input.read_u16().map_err(|_| truncated_header())?,
            dim_x: input.read_u16().map_err(|_| truncated_header())?,
            dim_y: input.read_u16().map_err(|_| truncated_header())?,
            dim_z: input.read_u16().map_err(|_| truncated_header())?,
            ..VmrHeader::default()
        };

        let shape = header.data_shape();
        let len = shape.0 * shape.1 * shape.2;
        let mut voxels = Vec::with_capacity(len.min(PREALLOC_LIMIT));
        let _ = input.by_ref().take(len as u64).read_to_end(&mut voxels)?;
        if voxels.len() < len {
            return Err(ConvertError::InvalidVmr("truncated voxel data"));
        }
        let data = Array3::from_shape_vec(shape, voxels)
            .map_err(|_| ConvertError::InvalidVmr("voxel data does not match the dimensions"))?;

        if header.version >= 3 {
            parse_post_header(&mut input, &mut header).map_err(|_| truncated_header())?;
        }
        debug!(
            version = header.version,
            dims = ?(header.dim_x, header.dim_y, header.dim_z),
            "parsed VMR file"
        );
        Ok(VmrVolume { header, data })
    }

    /// Write the volume as a version 4 VMR file.
    pub fn write_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.write_to(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    /// Serialize the volume into the given writer.
    pub fn write_to<W: Write>(&self, writer: W) -> Result<()> {
        let h = &self.header;
        if self.data.dim() != h.data_shape() {
            return Err(ConvertError::InvalidVmr("voxel data does not match the dimensions"));
        }
        let mut out = ByteOrdered::le(writer);
        out.write_u16(VMR_VERSION)?;
        out.write_u16(h.dim_x)?;
        out.write_u16(h.dim_y)?;
        out.write_u16(h.dim_z)?;
        match self.data.as_slice() {
            Some(voxels) => out.write_all(voxels)?,
            None => {
                let voxels: Vec<u8> = self.data.iter().copied().collect();
                out.write_all(&voxels)?;
            }
        }
        write_post_header(&mut out, h)
    }
}

fn truncated_header() -> ConvertError {
    ConvertError::InvalidVmr("truncated header")
}

fn read_cstring<R, E>(input: &mut ByteOrdered<R, E>) -> io::Result<String>
where
    R: Read,
    E: Endian,
{
    let mut bytes = Vec::new();
    loop {
        match input.read_u8()? {
            0 => break,
            c => bytes.push(c),
        }
    }
    Ok(decode_latin1(&bytes))
}

fn read_f32s<R, E>(input: &mut ByteOrdered<R, E>, out: &mut [f32]) -> io::Result<()>
where
    R: Read,
    E: Endian,
{
    for v in out {
        *v = input.read_f32()?;
    }
    Ok(())
}

fn parse_post_header<R, E>(input: &mut ByteOrdered<R, E>, h: &mut VmrHeader) -> io::Result<()>
where
    R: Read,
    E: Endian,
{
    for v in &mut h.offset {
        *v = input.read_i16()?;
    }
    h.framing_cube_dim = input.read_i16()?;
    h.pos_infos_verified = input.read_i32()?;
    h.coordinate_system = input.read_i32()?;
    read_f32s(input, &mut h.slice1_center)?;
    read_f32s(input, &mut h.slice_n_center)?;
    read_f32s(input, &mut h.row_dir)?;
    read_f32s(input, &mut h.col_dir)?;
    h.n_rows = input.read_i32()?;
    h.n_cols = input.read_i32()?;
    h.fov_rows = input.read_f32()?;
    h.fov_cols = input.read_f32()?;
    h.slice_thickness = input.read_f32()?;
    h.gap_thickness = input.read_f32()?;

    let count = input.read_i32()?.max(0) as usize;
    h.past_transformations = Vec::with_capacity(count.min(PREALLOC_LIMIT));
    for _ in 0..count {
        let name = read_cstring(input)?;
        let kind = input.read_i32()?;
        let source_file = read_cstring(input)?;
        let n = input.read_i32()?.max(0) as usize;
        let mut values = Vec::with_capacity(n.min(PREALLOC_LIMIT));
        for _ in 0..n {
            values.push(input.read_f32()?);
        }
        h.past_transformations.push(SpatialTransformation {
            name,
            kind,
            source_file,
            values,
        });
    }

    h.left_right_convention = input.read_u8()?;
    h.reference_space = input.read_u8()?;
    read_f32s(input, &mut h.voxel_size)?;
    h.voxel_resolution_verified = input.read_u8()?;
    h.voxel_resolution_in_tal_mm = input.read_u8()?;
    h.v16_min = input.read_i32()?;
    h.v16_mean = input.read_i32()?;
    h.v16_max = input.read_i32()?;
    Ok(())
}

fn write_cstring<W, E>(out: &mut ByteOrdered<W, E>, text: &str) -> Result<()>
where
    W: Write,
    E: Endian,
{
    let bytes = encode_latin1(text)
        .filter(|b| !b.contains(&0))
        .ok_or(ConvertError::InvalidVmr("string is not Latin-1 without NUL"))?;
    out.write_all(&bytes)?;
    out.write_u8(0)?;
    Ok(())
}

fn write_post_header<W, E>(out: &mut ByteOrdered<W, E>, h: &VmrHeader) -> Result<()>
where
    W: Write,
    E: Endian,
{
    for v in &h.offset {
        out.write_i16(*v)?;
    }
    out.write_i16(h.framing_cube_dim)?;
    out.write_i32(h.pos_infos_verified)?;
    out.write_i32(h.coordinate_system)?;
    let vectors = [h.slice1_center, h.slice_n_center, h.row_dir, h.col_dir];
    for v in vectors.iter().flatten() {
        out.write_f32(*v)?;
    }
    out.write_i32(h.n_rows)?;
    out.write_i32(h.n_cols)?;
    out.write_f32(h.fov_rows)?;
    out.write_f32(h.fov_cols)?;
    out.write_f32(h.slice_thickness)?;
    out.write_f32(h.gap_thickness)?;

    out.write_i32(h.past_transformations.len() as i32)?;
    for t in &h.past_transformations {
        write_cstring(out, &t.name)?;
        out.write_i32(t.kind)?;
        write_cstring(out, &t.source_file)?;
        out.write_i32(t.values.len() as i32)?;
        for v in &t.values {
            out.write_f32(*v)?;
        }
    }

    out.write_u8(h.left_right_convention)?;
    out.write_u8(h.reference_space)?;
    for v in &h.voxel_size {
        out.write_f32(*v)?;
    }
    out.write_u8(h.voxel_resolution_verified)?;
    out.write_u8(h.voxel_resolution_in_tal_mm)?;
    out.write_i32(h.v16_min)?;
    out.write_i32(h.v16_mean)?;
    out.write_i32(h.v16_max)?;
    Ok(())
}
