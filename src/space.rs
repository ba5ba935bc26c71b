//! Conversions between RAS+ world coordinates and the BrainVoyager internal
//! (BVI) convention, plus direction-encoded streamline coloring.
//!
//! BVI coordinates are PIL+: the first axis points Posterior, the second
//! Inferior and the third Left. FBR files place their origin at the centre of
//! the volume, given in PIL+ millimeters as `(dimY/2, dimZ/2, dimX/2)` where
//! `dimX`, `dimY` and `dimZ` are the physical extents of the RAS+ volume.

use crate::streamline::{Point, Streamline};
use nalgebra::Vector3;
use rgb::RGB8;

/// Map a RAS+mm point to PIL+mm, given the PIL+ origin.
#[inline]
pub fn ras_to_pil(p: &Point, origin: &Vector3<f32>) -> Point {
    Point::new(-p.y + origin.x, -p.z + origin.y, -p.x + origin.z)
}

/// Map a PIL+mm point to RAS+mm. This is the inverse of [`ras_to_pil`] for
/// the same origin.
#[inline]
pub fn pil_to_ras(p: &Point, origin: &Vector3<f32>) -> Point {
    Point::new(-(p.z - origin.z), -(p.x - origin.x), -(p.y - origin.y))
}

/// The PIL+ origin of a volume with the given RAS+ physical extents.
pub fn pil_origin(dims_mm: &Vector3<f64>) -> Vector3<f32> {
    Vector3::new(
        (dims_mm.y / 2.0) as f32,
        (dims_mm.z / 2.0) as f32,
        (dims_mm.x / 2.0) as f32,
    )
}

/// [`ras_to_pil`] over a whole streamline.
pub fn streamline_ras_to_pil(streamline: &[Point], origin: &Vector3<f32>) -> Streamline {
    streamline.iter().map(|p| ras_to_pil(p, origin)).collect()
}

/// [`pil_to_ras`] over a whole streamline.
pub fn streamline_pil_to_ras(streamline: &[Point], origin: &Vector3<f32>) -> Streamline {
    streamline.iter().map(|p| pil_to_ras(p, origin)).collect()
}

/// Color each point of a streamline by its local direction.
///
/// The tangent at a point is the difference to the next point, the last
/// point reusing the previous tangent. The absolute unit tangent is scaled
/// to `[0, 255]`, the x, y and z components giving red, green and blue.
/// Repeated points have no direction and are black. A single point is
/// white.
pub fn tangent_colors(streamline: &[Point]) -> Vec<RGB8> {
    match streamline.len() {
        0 => Vec::new(),
        1 => vec![RGB8::new(255, 255, 255)],
        n => {
            let diffs: Vec<Vector3<f32>> = streamline.windows(2).map(|w| w[1] - w[0]).collect();
            diffs
                .iter()
                .chain(diffs.last())
                .take(n)
                .map(direction_color)
                .collect()
        }
    }
}

fn direction_color(d: &Vector3<f32>) -> RGB8 {
    let norm = d.norm();
    if norm == 0.0 {
        return RGB8::new(0, 0, 0);
    }
    let c = (d / norm).abs() * 255.0;
    RGB8::new(c.x as u8, c.y as u8, c.z as u8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn axis_permutation() {
        let origin = Vector3::new(10.0, 20.0, 30.0);
        let pil = ras_to_pil(&Point::new(1.0, 2.0, 3.0), &origin);
        assert_eq!(pil, Point::new(8.0, 17.0, 29.0));
        assert_eq!(pil_to_ras(&pil, &origin), Point::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn origin_from_extents() {
        let origin = pil_origin(&Vector3::new(182.0, 218.0, 182.0));
        assert_abs_diff_eq!(origin, Vector3::new(109.0, 91.0, 91.0));
    }

    #[test]
    fn colors_follow_direction() {
        let s = vec![
            Point::new(0.0, 0.0, 0.0),
            Point::new(2.0, 0.0, 0.0),
            Point::new(2.0, 0.0, -3.0),
        ];
        assert_eq!(
            tangent_colors(&s),
            vec![
                RGB8::new(255, 0, 0),
                RGB8::new(0, 0, 255),
                RGB8::new(0, 0, 255),
            ]
        );
        assert!(tangent_colors(&[]).is_empty());
    }
}
