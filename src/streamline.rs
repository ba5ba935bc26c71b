//! Streamline containers and the coordinate spaces they may live in.

use crate::affine::{self, Affine4};
use crate::error::Result;
use crate::reference::AnatomicalReference;
use nalgebra::Point3;

/// A point of a streamline.
pub type Point = Point3<f32>;

/// An ordered polyline representing one reconstructed fiber path.
pub type Streamline = Vec<Point>;

/// Coordinate space of streamline points, relative to an anatomical
/// reference.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum Space {
    /// World coordinates in millimeters, axes pointing Right, Anterior and
    /// Superior.
    RasMm,
    /// Voxel indices, with the centre of the first voxel at `(0, 0, 0)`.
    Voxel,
    /// Voxel coordinates with the origin at the corner of the first voxel,
    /// scaled by the voxel size. This is how TrackVis stores points.
    VoxMm,
}

impl Space {
    /// The affine bringing points in this space to RAS+mm.
    pub fn to_rasmm(self, reference: &AnatomicalReference) -> Result<Affine4> {
        match self {
            Space::RasMm => Ok(Affine4::identity()),
            Space::Voxel => Ok(*reference.affine()),
            Space::VoxMm => reference.voxmm_to_rasmm(),
        }
    }

    /// The affine bringing RAS+mm points to this space.
    pub fn from_rasmm(self, reference: &AnatomicalReference) -> Result<Affine4> {
        affine::invert(&self.to_rasmm(reference)?)
    }
}

/// A set of streamlines in RAS+mm together with the anatomical reference
/// they are tied to.
#[derive(Debug, PartialEq, Clone)]
pub struct Tractogram {
    streamlines: Vec<Streamline>,
    reference: AnatomicalReference,
}

impl Tractogram {
    /// Create a tractogram from streamlines already in RAS+mm.
    pub fn new(streamlines: Vec<Streamline>, reference: AnatomicalReference) -> Self {
        Tractogram { streamlines, reference }
    }

    /// Create a tractogram from streamlines in the given space, bringing
    /// them to RAS+mm.
    pub fn from_space(
        streamlines: Vec<Streamline>,
        space: Space,
        reference: AnatomicalReference,
    ) -> Result<Self> {
        let streamlines = if space == Space::RasMm {
            streamlines
        } else {
            let to_rasmm = space.to_rasmm(&reference)?;
            streamlines
                .iter()
                .map(|s| affine::transform_streamline(&to_rasmm, s))
                .collect()
        };
        Ok(Tractogram { streamlines, reference })
    }

    /// The streamlines, in RAS+mm.
    pub fn streamlines(&self) -> &[Streamline] {
        &self.streamlines
    }

    /// A copy of the streamlines in the requested space.
    pub fn streamlines_in(&self, space: Space) -> Result<Vec<Streamline>> {
        if space == Space::RasMm {
            return Ok(self.streamlines.clone());
        }
        let from_rasmm = space.from_rasmm(&self.reference)?;
        Ok(self
            .streamlines
            .iter()
            .map(|s| affine::transform_streamline(&from_rasmm, s))
            .collect())
    }

    /// The volume the streamlines are tied to.
    pub fn reference(&self) -> &AnatomicalReference {
        &self.reference
    }

    /// Number of streamlines.
    pub fn len(&self) -> usize {
        self.streamlines.len()
    }

    /// Whether there are no streamlines.
    pub fn is_empty(&self) -> bool {
        self.streamlines.is_empty()
    }

    /// Move the streamlines out of the tractogram.
    pub fn into_streamlines(self) -> Vec<Streamline> {
        self.streamlines
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use nalgebra::Vector4;

    fn reference() -> AnatomicalReference {
        let mut affine = Affine4::from_diagonal(&Vector4::new(2.0, 2.0, 2.0, 1.0));
        affine[(0, 3)] = -10.0;
        affine[(1, 3)] = 4.0;
        AnatomicalReference::new([10, 10, 10], affine)
    }

    #[test]
    fn voxmm_is_corner_aligned() {
        let reference = reference();
        // centre of voxel (0, 0, 0)
        let tractogram = Tractogram::new(vec![vec![Point::new(-10.0, 4.0, 0.0)]], reference);
        let voxel = tractogram.streamlines_in(Space::Voxel).unwrap();
        assert_abs_diff_eq!(voxel[0][0], Point::new(0.0, 0.0, 0.0), epsilon = 1e-6);
        let voxmm = tractogram.streamlines_in(Space::VoxMm).unwrap();
        assert_abs_diff_eq!(voxmm[0][0], Point::new(1.0, 1.0, 1.0), epsilon = 1e-6);
    }

    #[test]
    fn spaces_round_trip() {
        let streamlines = vec![vec![Point::new(1.0, 2.5, 3.0), Point::new(4.0, 5.0, 6.5)]];
        let tractogram =
            Tractogram::from_space(streamlines.clone(), Space::VoxMm, reference()).unwrap();
        let back = tractogram.streamlines_in(Space::VoxMm).unwrap();
        for (a, b) in back[0].iter().zip(&streamlines[0]) {
            assert_abs_diff_eq!(a, b, epsilon = 1e-5);
        }
        // stored in RAS+mm: voxmm (1, 2.5, 3) is voxel (0, 0.75, 1)
        let rasmm = tractogram.into_streamlines();
        assert_abs_diff_eq!(rasmm[0][0], Point::new(-10.0, 5.5, 2.0), epsilon = 1e-5);
    }
}
