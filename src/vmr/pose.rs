//! Position of VMR volumes in world space, and the mapping of voxel data
//! between VMR and NIfTI layouts.
//!
//! A VMR volume is placed by the centres of its first and last slices and
//! by the directions of its rows and columns, all in scanner (LPS+)
//! coordinates. NIfTI volumes use a voxel to RAS+ affine instead.

use super::VmrHeader;
use crate::affine::Affine4;
use crate::error::{ConvertError, Result};
use nalgebra::{Matrix3, Vector3, Vector4};
use ndarray::Array3;

/// Upper bound of the VMR intensity range. BrainVoyager keeps the values
/// above it for overlays.
pub const VMR_MAX_INTENSITY: f64 = 225.0;

/// Upper bound of the original 16-bit intensity range.
pub const V16_MAX_INTENSITY: f64 = 65535.0;

/// Position and orientation of a VMR volume.
#[derive(Debug, PartialEq, Clone, Copy)]
pub struct VmrPose {
    /// Centre of the first slice.
    pub slice1_center: Vector3<f64>,
    /// Centre of the last slice.
    pub slice_n_center: Vector3<f64>,
    /// Direction of the rows.
    pub row_dir: Vector3<f64>,
    /// Direction of the columns.
    pub col_dir: Vector3<f64>,
}

impl VmrPose {
    /// Copy the pose into the header fields.
    pub fn apply_to(&self, header: &mut VmrHeader) {
        let f = |v: &Vector3<f64>| [v.x as f32, v.y as f32, v.z as f32];
        header.slice1_center = f(&self.slice1_center);
        header.slice_n_center = f(&self.slice_n_center);
        header.row_dir = f(&self.row_dir);
        header.col_dir = f(&self.col_dir);
    }
}

/// Compute the VMR pose of a NIfTI volume from its affine, shape and voxel
/// sizes. Fails if a voxel size is zero.
pub fn pose_from_nifti(affine: &Affine4, shape: [usize; 3], voxel_sizes: [f64; 3]) -> Result<VmrPose> {
    if voxel_sizes.iter().any(|v| *v == 0.0) {
        return Err(ConvertError::SingularAffine);
    }
    let [dx, dy, dz] = [shape[0] as f64, shape[1] as f64, shape[2] as f64];
    let [vx, vy, vz] = voxel_sizes;

    #[rustfmt::skip]
    let nii_to_dcm = Affine4::new(
        -1.0, 0.0, 0.0, dx - 1.0,
        0.0, -1.0, 0.0, dy - 1.0,
        0.0, 0.0, 1.0, 0.0,
        0.0, 0.0, 0.0, 1.0,
    );
    let dcm = affine * nii_to_dcm;
    let to_slice = |slice: f64| {
        #[rustfmt::skip]
        let m = Affine4::new(
            1.0 / vx, 0.0, 0.0, dx / 2.0,
            0.0, 1.0 / vy, 0.0, dy / 2.0,
            0.0, 0.0, 1.0 / vz, slice,
            0.0, 0.0, 0.0, 1.0,
        );
        dcm * m
    };
    let first = to_slice(0.0);
    let last = to_slice(dz - 1.0);

    let column = |m: &Affine4, j: usize| Vector3::new(m[(0, j)], m[(1, j)], m[(2, j)]);
    Ok(VmrPose {
        slice1_center: column(&first, 3),
        slice_n_center: column(&last, 3),
        row_dir: column(&first, 0),
        col_dir: column(&first, 1),
    })
}

/// Voxel to RAS+ affine of a VMR volume, for its data laid out as a NIfTI
/// volume (see [`vmr_to_nifti_data`]).
///
/// A header without orientation information yields the identity.
pub fn affine_from_vmr(header: &VmrHeader) -> Affine4 {
    let v = |a: [f32; 3]| Vector3::new(f64::from(a[0]), f64::from(a[1]), f64::from(a[2]));
    let row = v(header.row_dir);
    let col = v(header.col_dir);
    let sizes = v(header.voxel_size);
    let orientation = Matrix3::from_columns(&[row, col, row.cross(&col)]);
    let rotation = orientation * Matrix3::from_diagonal(&sizes);
    let center = (v(header.slice1_center) + v(header.slice_n_center)) / 2.0;

    let mut dcm_to_patient = rotation.to_homogeneous();
    dcm_to_patient.fixed_view_mut::<3, 1>(0, 3).copy_from(&center);

    let shift = Affine4::new_translation(&Vector3::new(
        -(f64::from(header.dim_x) + 1.0) / 2.0,
        -(f64::from(header.dim_y) + 2.0) / 2.0,
        -(f64::from(header.dim_z) + 2.0) / 2.0,
    ));
    let lps_to_ras = Affine4::from_diagonal(&Vector4::new(-1.0, -1.0, 1.0, 1.0));
    let affine = lps_to_ras * dcm_to_patient * shift;

    if affine.fixed_view::<3, 3>(0, 0).iter().all(|v| *v == 0.0) {
        Affine4::identity()
    } else {
        affine
    }
}

/// The q-th percentile (0 to 100) of sorted values, interpolating linearly
/// between the two nearest ranks. Returns `None` for an empty slice.
pub fn percentile(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let rank = q.clamp(0.0, 100.0) / 100.0 * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

fn sorted_nonzero(data: &Array3<f32>) -> Result<Vec<f64>> {
    let mut values: Vec<f64> = data
        .iter()
        .filter(|v| **v != 0.0)
        .map(|v| f64::from(*v))
        .collect();
    if values.is_empty() {
        return Err(ConvertError::EmptyVolume);
    }
    values.sort_by(|a, b| a.total_cmp(b));
    Ok(values)
}

/// Clip every voxel to `[lo, hi]` and map that range linearly to
/// `[0, max]`. A degenerate range maps everything to zero.
fn rescale(data: &Array3<f32>, lo: f64, hi: f64, max: f64) -> Array3<f64> {
    let range = hi - lo;
    data.mapv(|v| {
        if range <= 0.0 {
            return 0.0;
        }
        (f64::from(v).max(lo).min(hi) - lo) / range * max
    })
}

/// Rescale intensities to the 8-bit VMR range. Voxels are clipped to the
/// 1st to 99th percentile of the non-zero voxels, mapped to `[0, 225]` and
/// truncated.
pub fn rescale_intensity(data: &Array3<f32>) -> Result<Array3<u8>> {
    let values = sorted_nonzero(data)?;
    let lo = percentile(&values, 1.0).unwrap_or(0.0);
    let hi = percentile(&values, 99.0).unwrap_or(0.0);
    Ok(rescale(data, lo, hi, VMR_MAX_INTENSITY).mapv(|v| v as u8))
}

/// Minimum, mean and maximum of the volume after rescaling the full range
/// of its non-zero voxels to 16 bits.
pub fn v16_statistics(data: &Array3<f32>) -> Result<(i32, i32, i32)> {
    let values = sorted_nonzero(data)?;
    let lo = values[0];
    let hi = values[values.len() - 1];
    let scaled = rescale(data, lo, hi, V16_MAX_INTENSITY).mapv(|v| v as u16);

    let min = scaled.iter().copied().min().unwrap_or(0);
    let max = scaled.iter().copied().max().unwrap_or(0);
    let sum: f64 = scaled.iter().map(|v| f64::from(*v)).sum();
    let mean = if scaled.is_empty() {
        0.0
    } else {
        sum / scaled.len() as f64
    };
    Ok((i32::from(min), mean as i32, i32::from(max)))
}

/// Lay out RAS+ NIfTI voxel data, of shape `(nx, ny, nz)`, as VMR data of
/// shape `(DimZ, DimY, DimX) = (nx, nz, ny)`.
pub fn nifti_to_vmr_data(nifti: &Array3<u8>) -> Array3<u8> {
    let (nx, ny, nz) = nifti.dim();
    Array3::from_shape_fn((nx, nz, ny), |(z, y, x)| nifti[[nx - 1 - z, ny - 1 - x, nz - 1 - y]])
}

/// Lay out VMR data, of shape `(DimZ, DimY, DimX)`, as NIfTI voxel data of
/// shape `(DimZ, DimX, DimY)`. This is the inverse of
/// [`nifti_to_vmr_data`].
pub fn vmr_to_nifti_data(raw: &Array3<u8>) -> Array3<u8> {
    let (dz, dy, dx) = raw.dim();
    Array3::from_shape_fn((dz, dx, dy), |(a, b, c)| raw[[dz - 1 - a, dy - 1 - c, dx - 1 - b]])
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::Array;
    use pretty_assertions::assert_eq;

    #[test]
    fn percentiles_interpolate() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(percentile(&values, 0.0), Some(1.0));
        assert_eq!(percentile(&values, 100.0), Some(5.0));
        assert_eq!(percentile(&values, 50.0), Some(3.0));
        assert_abs_diff_eq!(percentile(&values, 1.0).unwrap(), 1.04, epsilon = 1e-12);
        assert_abs_diff_eq!(percentile(&values, 99.0).unwrap(), 4.96, epsilon = 1e-12);
        assert_eq!(percentile(&[], 50.0), None);
    }

    #[test]
    fn rescaling() {
        let data = Array::from_shape_vec((1, 1, 5), vec![0.0, 1.0, 2.0, 3.0, 4.0]).unwrap();
        let scaled = rescale_intensity(&data).unwrap();
        // 1st and 99th percentiles of [1, 2, 3, 4] are 1.03 and 3.97
        assert_eq!(scaled.iter().copied().collect::<Vec<_>>(), vec![0, 0, 74, 150, 225]);
    }

    #[test]
    fn flat_and_empty_volumes() {
        let flat = Array3::from_elem((2, 2, 2), 7.0f32);
        assert!(rescale_intensity(&flat).unwrap().iter().all(|v| *v == 0));
        let empty = Array3::<f32>::zeros((2, 2, 2));
        assert!(matches!(rescale_intensity(&empty), Err(ConvertError::EmptyVolume)));
        assert!(matches!(v16_statistics(&empty), Err(ConvertError::EmptyVolume)));
    }

    #[test]
    fn v16_range() {
        let data = Array::from_shape_vec((1, 1, 4), vec![0.0, 10.0, 20.0, 30.0]).unwrap();
        assert_eq!(v16_statistics(&data).unwrap(), (0, 24575, 65535));
    }

    #[test]
    fn data_layouts_are_inverse() {
        let nifti = Array::from_shape_fn((2, 3, 4), |(i, j, k)| (i * 100 + j * 10 + k) as u8);
        let raw = nifti_to_vmr_data(&nifti);
        assert_eq!(raw.dim(), (2, 4, 3));
        // last x of the NIfTI volume is the first VMR slice
        assert_eq!(raw[[0, 0, 0]], nifti[[1, 2, 3]]);
        assert_eq!(vmr_to_nifti_data(&raw), nifti);
    }

    #[test]
    fn pose_of_identity_affine() {
        let pose = pose_from_nifti(&Affine4::identity(), [4, 6, 8], [1.0, 1.0, 1.0]).unwrap();
        assert_abs_diff_eq!(pose.row_dir, Vector3::new(-1.0, 0.0, 0.0));
        assert_abs_diff_eq!(pose.col_dir, Vector3::new(0.0, -1.0, 0.0));
        assert_abs_diff_eq!(pose.slice1_center, Vector3::new(1.0, 2.0, 0.0));
        assert_abs_diff_eq!(pose.slice_n_center, Vector3::new(1.0, 2.0, 7.0));
        assert!(pose_from_nifti(&Affine4::identity(), [4, 6, 8], [1.0, 0.0, 1.0]).is_err());
    }

    #[test]
    fn missing_orientation_gives_identity() {
        let header = VmrHeader {
            dim_x: 8,
            dim_y: 8,
            dim_z: 8,
            ..VmrHeader::default()
        };
        assert_eq!(affine_from_vmr(&header), Affine4::identity());
    }

    #[test]
    fn vmr_affine() {
        let header = VmrHeader {
            dim_x: 4,
            dim_y: 4,
            dim_z: 4,
            row_dir: [1.0, 0.0, 0.0],
            col_dir: [0.0, 1.0, 0.0],
            voxel_size: [2.0, 2.0, 2.0],
            slice1_center: [0.0, 0.0, -3.0],
            slice_n_center: [0.0, 0.0, 3.0],
            ..VmrHeader::default()
        };
        let affine = affine_from_vmr(&header);
        #[rustfmt::skip]
        let expected = Affine4::new(
            -2.0, 0.0, 0.0, 5.0,
            0.0, -2.0, 0.0, 6.0,
            0.0, 0.0, 2.0, -6.0,
            0.0, 0.0, 0.0, 1.0,
        );
        assert_abs_diff_eq!(affine, expected, epsilon = 1e-12);
    }
}
