//! Anatomical references: the volume grid that streamlines are tied to.

use crate::affine::{self, Affine4};
use crate::error::{ConvertError, Result};
use nalgebra::{Vector3, Vector4};
use nifti::NiftiHeader;
use std::path::Path;

/// The shape of a volume and the affine mapping its voxel indices to
/// RAS+mm world coordinates.
#[derive(Debug, PartialEq, Clone)]
pub struct AnatomicalReference {
    shape: [usize; 3],
    affine: Affine4,
}

impl AnatomicalReference {
    /// Build a reference from a grid shape and its voxel to RAS+mm affine.
    pub fn new(shape: [usize; 3], affine: Affine4) -> Self {
        AnatomicalReference { shape, affine }
    }

    /// Read the reference from the header of a NIfTI file
    /// (".nii", ".nii.gz" or ".hdr"). The volume itself is not loaded.
    pub fn from_nifti_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let header = NiftiHeader::from_file(path)?;
        Self::from_nifti_header(&header)
    }

    /// Obtain the reference described by a NIfTI header. The header must
    /// describe a volume of 3 or more dimensions.
    pub fn from_nifti_header(header: &NiftiHeader) -> Result<Self> {
        let ndim = usize::from(header.dim[0]);
        if !(3..=7).contains(&ndim) {
            return Err(ConvertError::UnsupportedDimensionality(ndim));
        }
        let shape = [
            usize::from(header.dim[1]),
            usize::from(header.dim[2]),
            usize::from(header.dim[3]),
        ];
        Ok(AnatomicalReference {
            shape,
            affine: header.affine::<f64>(),
        })
    }

    /// Volume shape, in voxels.
    pub fn shape(&self) -> [usize; 3] {
        self.shape
    }

    /// Voxel to RAS+mm affine.
    pub fn affine(&self) -> &Affine4 {
        &self.affine
    }

    /// Voxel sizes in millimeters.
    pub fn voxel_sizes(&self) -> Vector3<f64> {
        affine::voxel_sizes(&self.affine)
    }

    /// Physical extent of the volume along each voxel axis, in millimeters.
    pub fn dims_mm(&self) -> Vector3<f64> {
        let shape = Vector3::new(self.shape[0] as f64, self.shape[1] as f64, self.shape[2] as f64);
        shape.component_mul(&self.voxel_sizes())
    }

    /// World coordinates of the voxel at half the shape along each axis.
    pub fn center(&self) -> Vector3<f64> {
        let half = Vector3::new(
            self.shape[0] as f64 / 2.0,
            self.shape[1] as f64 / 2.0,
            self.shape[2] as f64 / 2.0,
        );
        affine::voxel_to_world(&self.affine, &half)
    }

    /// Axis codes of the voxel grid, such as `*b"RAS"`.
    pub fn axis_codes(&self) -> [u8; 3] {
        affine::axis_codes(&self.affine)
    }

    /// The affine bringing TrackVis "voxmm" coordinates (corner-aligned
    /// voxels scaled by the voxel size) to RAS+mm.
    pub fn voxmm_to_rasmm(&self) -> Result<Affine4> {
        let sizes = self.voxel_sizes();
        if sizes.iter().any(|s| *s <= 0.0) {
            return Err(ConvertError::SingularAffine);
        }
        let unscale = Affine4::from_diagonal(&Vector4::new(
            1.0 / sizes.x,
            1.0 / sizes.y,
            1.0 / sizes.z,
            1.0,
        ));
        let to_center = Affine4::new_translation(&Vector3::new(-0.5, -0.5, -0.5));
        Ok(self.affine * to_center * unscale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn from_header() {
        let mut header = NiftiHeader::default();
        header.dim = [3, 91, 109, 91, 1, 1, 1, 1];
        header.sform_code = 4;
        header.srow_x = [-2., 0., 0., 90.];
        header.srow_y = [0., 2., 0., -126.];
        header.srow_z = [0., 0., 2., -72.];
        let reference = AnatomicalReference::from_nifti_header(&header).unwrap();
        assert_eq!(reference.shape(), [91, 109, 91]);
        assert_eq!(&reference.axis_codes(), b"LAS");
        assert_abs_diff_eq!(reference.voxel_sizes(), Vector3::new(2.0, 2.0, 2.0));
        assert_abs_diff_eq!(reference.dims_mm(), Vector3::new(182.0, 218.0, 182.0));
        assert_abs_diff_eq!(reference.center(), Vector3::new(-1.0, -17.0, 19.0));
    }

    #[test]
    fn rejects_2d_headers() {
        let mut header = NiftiHeader::default();
        header.dim = [2, 64, 64, 1, 1, 1, 1, 1];
        assert!(matches!(
            AnatomicalReference::from_nifti_header(&header),
            Err(ConvertError::UnsupportedDimensionality(2))
        ));
    }
}
