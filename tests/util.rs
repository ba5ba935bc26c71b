use nalgebra::Vector4;
use ndarray::Array3;
use std::path::Path;
use visubrain::affine::Affine4;
use visubrain::streamline::{Point, Streamline};
use visubrain::trk::{TrkFile, TrkHeader};
use visubrain::volume::write_nifti;
use visubrain::AnatomicalReference;

/// Shape of the reference volume.
#[allow(dead_code)]
pub const REFERENCE_SHAPE: [usize; 3] = [10, 12, 14];

/// Voxel to world affine of the reference volume: 2mm voxels, RAS+, with
/// the world origin at the voxel `shape / 2`.
#[allow(dead_code)]
pub fn reference_affine() -> Affine4 {
    let mut affine = Affine4::from_diagonal(&Vector4::new(2., 2., 2., 1.));
    affine[(0, 3)] = -10.;
    affine[(1, 3)] = -12.;
    affine[(2, 3)] = -14.;
    affine
}

#[allow(dead_code)]
pub fn reference() -> AnatomicalReference {
    AnatomicalReference::new(REFERENCE_SHAPE, reference_affine())
}

/// Write the reference volume to a NIfTI file.
#[allow(dead_code)]
pub fn write_reference(path: &Path) {
    let [x, y, z] = REFERENCE_SHAPE;
    let data = Array3::from_shape_fn((x, y, z), |(i, j, k)| ((i + j + k) % 200) as u8 + 1);
    write_nifti(path, &data, &reference_affine()).unwrap();
}

/// Streamlines in voxmm space, all inside the reference volume.
#[allow(dead_code)]
pub fn sample_voxmm_streamlines() -> Vec<Streamline> {
    vec![
        vec![Point::new(4., 6., 8.), Point::new(5., 7., 9.), Point::new(6., 8., 10.)],
        vec![Point::new(10., 12., 14.), Point::new(10., 14., 14.)],
    ]
}

/// Write a TRK file tied to the reference volume.
#[allow(dead_code)]
pub fn write_sample_trk(path: &Path) -> TrkFile {
    let mut header = TrkHeader::from_reference(&reference()).unwrap();
    let streamlines = sample_voxmm_streamlines();
    header.n_count = streamlines.len() as i32;
    let trk = TrkFile {
        header,
        streamlines,
    };
    trk.write_file(path).unwrap();
    trk
}

/// Bytes of an FBR file with one group named "Test", holding one fiber of
/// the points (1, 3, 5) and (2, 4, 6), colored (100, 120, 140) and
/// (110, 130, 150).
#[allow(dead_code)]
pub fn test_group_fbr() -> Vec<u8> {
    let mut bytes = vec![0xA4, 0xD3, 0xC2, 0xB1];
    bytes.extend_from_slice(&5u32.to_le_bytes());
    bytes.extend_from_slice(&2u32.to_le_bytes());
    for v in &[0f32, 0., 0.] {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes.extend_from_slice(&1u32.to_le_bytes());

    bytes.extend_from_slice(b"Test\0");
    bytes.extend_from_slice(&1u32.to_le_bytes());
    bytes.extend_from_slice(&(-1i32).to_le_bytes());
    bytes.extend_from_slice(&0.3f32.to_le_bytes());
    bytes.extend_from_slice(&[0, 255, 255]);
    bytes.extend_from_slice(&1u32.to_le_bytes());

    bytes.extend_from_slice(&2u32.to_le_bytes());
    for v in &[1f32, 2., 3., 4., 5., 6.] {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes.extend_from_slice(&[100, 110, 120, 130, 140, 150]);
    bytes
}
