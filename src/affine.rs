//! Affine transformations between voxel and world coordinates.
//!
//! All affines are 4x4 homogeneous matrices in double precision mapping
//! column vectors `(i, j, k, 1)` to `(x, y, z, 1)`.

use crate::error::{ConvertError, Result};
use crate::streamline::{Point, Streamline};
use nalgebra::{Matrix3, Matrix4, Vector3, Vector4};

/// Linear part of an affine.
pub type Affine3 = Matrix3<f64>;
/// Homogeneous voxel to world transform.
pub type Affine4 = Matrix4<f64>;

/// Separate a 4x4 affine into its 3x3 affine and translation components.
pub fn get_affine_and_translation(affine: &Affine4) -> (Affine3, Vector3<f64>) {
    let translation = Vector3::new(affine[(0, 3)], affine[(1, 3)], affine[(2, 3)]);
    let affine = affine.fixed_view::<3, 3>(0, 0).into_owned();
    (affine, translation)
}

/// Apply an affine to a single point.
pub fn apply_affine(affine: &Affine4, point: &Point) -> Point {
    let p = affine * Vector4::new(f64::from(point.x), f64::from(point.y), f64::from(point.z), 1.0);
    Point::new(p.x as f32, p.y as f32, p.z as f32)
}

/// Apply an affine to every point of a streamline.
pub fn transform_streamline(affine: &Affine4, streamline: &[Point]) -> Streamline {
    streamline.iter().map(|p| apply_affine(affine, p)).collect()
}

/// Invert an affine, failing if it is singular.
pub fn invert(affine: &Affine4) -> Result<Affine4> {
    affine.try_inverse().ok_or(ConvertError::SingularAffine)
}

/// Voxel sizes implied by an affine: the norms of its first three columns.
pub fn voxel_sizes(affine: &Affine4) -> Vector3<f64> {
    let (m, _) = get_affine_and_translation(affine);
    Vector3::new(m.column(0).norm(), m.column(1).norm(), m.column(2).norm())
}

/// World coordinates of the given (fractional) voxel position.
pub fn voxel_to_world(affine: &Affine4, voxel: &Vector3<f64>) -> Vector3<f64> {
    let p = affine * voxel.push(1.0);
    Vector3::new(p.x, p.y, p.z)
}

/// For each voxel axis, the world axis it is closest to and the direction
/// (`1.0` or `-1.0`) it runs along that axis.
///
/// Axes are paired greedily by the largest normalized component, so every
/// voxel axis maps to a distinct world axis even for oblique affines. A
/// degenerate affine yields the identity orientation.
pub fn orientation(affine: &Affine4) -> [(usize, f64); 3] {
    let (m, _) = get_affine_and_translation(affine);
    let mut result = [(0, 1.0), (1, 1.0), (2, 1.0)];
    let mut used_rows = [false; 3];
    let mut used_cols = [false; 3];
    for _ in 0..3 {
        let mut best: Option<(usize, usize, f64)> = None;
        for col in 0..3 {
            if used_cols[col] {
                continue;
            }
            let norm = m.column(col).norm();
            for row in 0..3 {
                if used_rows[row] {
                    continue;
                }
                let v = if norm > 0.0 { m[(row, col)] / norm } else { 0.0 };
                if best.map_or(true, |(_, _, b)| v.abs() > b.abs()) {
                    best = Some((row, col, v));
                }
            }
        }
        if let Some((row, col, v)) = best {
            used_rows[row] = true;
            used_cols[col] = true;
            result[col] = (row, if v < 0.0 { -1.0 } else { 1.0 });
        }
    }
    result
}

/// Axis codes of an affine, such as `*b"RAS"` or `*b"LPS"`.
pub fn axis_codes(affine: &Affine4) -> [u8; 3] {
    const POSITIVE: &[u8; 3] = b"RAS";
    const NEGATIVE: &[u8; 3] = b"LPI";
    let mut codes = [0u8; 3];
    for (code, (axis, sign)) in codes.iter_mut().zip(orientation(affine).iter()) {
        *code = if *sign < 0.0 { NEGATIVE[*axis] } else { POSITIVE[*axis] };
    }
    codes
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use nifti::NiftiHeader;

    #[test]
    fn orientation_of_common_affines() {
        let ras = Affine4::from_diagonal(&Vector4::new(2.0, 2.0, 2.0, 1.0));
        assert_eq!(&axis_codes(&ras), b"RAS");

        let lps = Affine4::from_diagonal(&Vector4::new(-1.0, -1.0, 1.0, 1.0));
        assert_eq!(&axis_codes(&lps), b"LPS");

        #[rustfmt::skip]
        let pil = Affine4::new(
            0.0, 0.0, -1.0, 0.0,
            -1.0, 0.0, 0.0, 0.0,
            0.0, -1.0, 0.0, 0.0,
            0.0, 0.0, 0.0, 1.0,
        );
        assert_eq!(&axis_codes(&pil), b"PIL");
        assert_eq!(orientation(&pil), [(1, -1.0), (2, -1.0), (0, -1.0)]);

        assert_eq!(&axis_codes(&Affine4::zeros()), b"RAS");
    }

    #[test]
    fn nifti_header_keeps_the_affine() {
        #[rustfmt::skip]
        let affine = Affine4::new(
            -2.0, 0.0, 0.0, 90.0,
            0.0, 2.0, 0.0, -126.0,
            0.0, 0.0, 3.0, -72.0,
            0.0, 0.0, 0.0, 1.0,
        );
        let mut header = NiftiHeader::default();
        header.set_affine(&affine);
        assert_eq!(header.sform_code, 2);
        assert_abs_diff_eq!(header.affine::<f64>(), affine, epsilon = 1e-6);
        assert_abs_diff_eq!(voxel_sizes(&header.affine::<f64>()), Vector3::new(2.0, 2.0, 3.0), epsilon = 1e-6);
    }

    #[test]
    fn singular_affine_is_rejected() {
        assert!(matches!(invert(&Affine4::zeros()), Err(ConvertError::SingularAffine)));
        let scaled = Affine4::from_diagonal(&Vector4::new(2.0, 4.0, 0.5, 1.0));
        let inverse = invert(&scaled).unwrap();
        assert_abs_diff_eq!(inverse * scaled, Affine4::identity(), epsilon = 1e-12);
    }
}
