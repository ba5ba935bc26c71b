//! Scalar volumes loaded from NIfTI files, with their voxel to world affine.
//!
//! Reading and writing is done through the `nifti` crate. Volumes are kept
//! as three dimensional `f32` arrays indexed `[i, j, k]`.

use crate::affine::{self, Affine4};
use crate::error::{ConvertError, Result};
use ndarray::{Array, Array3, Axis, Ix3, IxDyn};
use nifti::writer::WriterOptions;
use nifti::{IntoNdArray, NiftiHeader, NiftiObject, ReaderOptions};
use std::path::Path;
use tracing::debug;

/// NIFTI_UNITS_MM
const UNITS_MM: u8 = 2;

/// A 3D scalar volume and its voxel to RAS+mm affine.
#[derive(Debug, PartialEq, Clone)]
pub struct Volume {
    data: Array3<f32>,
    affine: Affine4,
}

impl Volume {
    /// Wrap voxel values and their affine.
    pub fn new(data: Array3<f32>, affine: Affine4) -> Self {
        Volume { data, affine }
    }

    /// Load a NIfTI volume. Volumes with more than three dimensions are
    /// reduced to their first frame, and NaN voxels are replaced by zero.
    pub fn from_nifti_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let obj = ReaderOptions::new().read_file(path)?;
        let affine = obj.header().affine::<f64>();
        let data = obj.into_volume().into_ndarray::<f32>()?;
        let mut data = first_frame(data)?;
        data.mapv_inplace(|v| if v.is_nan() { 0.0 } else { v });
        debug!(shape = ?data.shape(), "loaded NIfTI volume");
        Ok(Volume { data, affine })
    }

    /// Voxel values, indexed `[i, j, k]`.
    pub fn data(&self) -> &Array3<f32> {
        &self.data
    }

    /// Take the voxel values out of the volume.
    pub fn into_data(self) -> Array3<f32> {
        self.data
    }

    /// Voxel to RAS+mm affine.
    pub fn affine(&self) -> &Affine4 {
        &self.affine
    }

    /// Number of voxels along each axis.
    pub fn shape(&self) -> [usize; 3] {
        let (x, y, z) = self.data.dim();
        [x, y, z]
    }

    /// Voxel sizes in millimeters, from the affine's column norms.
    pub fn voxel_sizes(&self) -> [f64; 3] {
        let v = affine::voxel_sizes(&self.affine);
        [v.x, v.y, v.z]
    }

    /// Reorder and flip the voxel axes so that they run along the closest
    /// RAS+ world axes. The affine is updated so that every voxel keeps its
    /// world position.
    pub fn as_closest_canonical(self) -> Self {
        let Volume {
            mut data,
            mut affine,
        } = self;
        let ornt = affine::orientation(&affine);
        let shape = data.dim();
        let shape = [shape.0, shape.1, shape.2];

        for (axis, &(_, sign)) in ornt.iter().enumerate() {
            if sign < 0.0 {
                data.invert_axis(Axis(axis));
                let shift = (shape[axis] as f64 - 1.0).max(0.0);
                for row in 0..3 {
                    affine[(row, 3)] += affine[(row, axis)] * shift;
                    affine[(row, axis)] = -affine[(row, axis)];
                }
            }
        }

        let mut perm = [0usize; 3];
        for (axis, &(world, _)) in ornt.iter().enumerate() {
            perm[world] = axis;
        }
        let data = data.permuted_axes(perm).as_standard_layout().into_owned();
        let original = affine;
        for (world, &axis) in perm.iter().enumerate() {
            for row in 0..4 {
                affine[(row, world)] = original[(row, axis)];
            }
        }
        Volume { data, affine }
    }
}

/// Reduce a volume of three or more dimensions to its first 3D frame.
fn first_frame(mut data: Array<f32, IxDyn>) -> Result<Array3<f32>> {
    let ndim = data.ndim();
    if ndim < 3 {
        return Err(ConvertError::UnsupportedDimensionality(ndim));
    }
    while data.ndim() > 3 {
        let last = data.ndim() - 1;
        data = data.index_axis_move(Axis(last), 0);
    }
    data.into_dimensionality::<Ix3>()
        .map_err(|_| ConvertError::UnsupportedDimensionality(ndim))
}

/// Write an 8-bit volume to a NIfTI file (".nii" or ".nii.gz") with the
/// given affine as its sform.
pub fn write_nifti<P: AsRef<Path>>(path: P, data: &Array3<u8>, affine: &Affine4) -> Result<()> {
    let mut header = NiftiHeader::default();
    header.set_affine(affine);
    header.xyzt_units = UNITS_MM;
    WriterOptions::new(path.as_ref())
        .reference_header(&header)
        .write_nifti(data)?;
    Ok(())
}
