mod util;

use nalgebra::Vector4;
use pretty_assertions::assert_eq;
use visubrain::affine::Affine4;
use visubrain::filter::{drop_short, filter_within_bounds, validate_streamlines};
use visubrain::{AnatomicalReference, Point};

use util::reference;

#[test]
fn streamlines_are_kept_or_dropped_whole() {
    let reference = reference();
    // world x spans [-10, 10)
    let inside = vec![Point::new(-10., 0., 0.), Point::new(9.9, 11.9, 13.9)];
    let crossing = vec![Point::new(0., 0., 0.), Point::new(10., 0., 0.)];
    let outside = vec![Point::new(0., -12.5, 0.), Point::new(0., -13., 0.)];
    let kept = filter_within_bounds(vec![inside.clone(), crossing, outside], &reference).unwrap();
    assert_eq!(kept, vec![inside]);
}

#[test]
fn flipped_axes_use_the_inverse_affine() {
    // LAS: voxel i runs from world x = 9 down to x = 0
    let mut affine = Affine4::from_diagonal(&Vector4::new(-1., 1., 1., 1.));
    affine[(0, 3)] = 9.;
    let reference = AnatomicalReference::new([10, 10, 10], affine);
    let kept = filter_within_bounds(
        vec![
            vec![Point::new(0., 0., 0.), Point::new(9., 9., 9.)],
            vec![Point::new(-0.5, 0., 0.)],
            vec![Point::new(9.5, 0., 0.)],
        ],
        &reference,
    )
    .unwrap();
    assert_eq!(kept.len(), 2);
    assert_eq!(kept[1], vec![Point::new(-0.5, 0., 0.)]);
}

#[test]
fn validation_recenters_then_filters() {
    // 2mm voxels from the world origin: the volume spans [0, 20) on every
    // axis and its centre, voxel (5, 5, 5), sits at world (10, 10, 10)
    let affine = Affine4::from_diagonal(&Vector4::new(2., 2., 2., 1.));
    let reference = AnatomicalReference::new([10, 10, 10], affine);
    let streamlines = vec![
        // outside unless moved by the centre
        vec![Point::new(-10., -10., -10.), Point::new(9.5, 0., 0.)],
        vec![Point::new(-4., 0., 0.), Point::new(4., 0., 0.)],
        // inside as given, outside once moved
        vec![Point::new(0., 0., 0.), Point::new(10., 0., 0.)],
        vec![Point::new(15., 15., 15.), Point::new(16., 16., 16.)],
        // too short
        vec![Point::new(0., 0., 0.)],
    ];
    let kept = validate_streamlines(streamlines, &reference).unwrap();
    assert_eq!(
        kept,
        vec![
            vec![Point::new(0., 0., 0.), Point::new(19.5, 10., 10.)],
            vec![Point::new(6., 10., 10.), Point::new(14., 10., 10.)],
        ]
    );
}

#[test]
fn short_streamlines() {
    let kept = drop_short(vec![vec![], vec![Point::origin()], vec![Point::origin(); 2]]);
    assert_eq!(kept, vec![vec![Point::origin(); 2]]);
}
