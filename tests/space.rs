use approx::assert_abs_diff_eq;
use nalgebra::Vector3;
use rgb::RGB8;
use visubrain::space::{
    pil_origin, pil_to_ras, ras_to_pil, streamline_pil_to_ras, streamline_ras_to_pil,
    tangent_colors,
};
use visubrain::Point;

#[test]
fn pil_round_trip() {
    let origins = [
        Vector3::zeros(),
        pil_origin(&Vector3::new(182.0, 218.0, 182.0)),
        Vector3::new(-3.5, 1e3, 0.25),
    ];
    for origin in &origins {
        for i in -5..5 {
            for j in -5..5 {
                let p = Point::new(i as f32 * 17.3, j as f32 * -4.1, (i * j) as f32 * 0.7);
                let back = pil_to_ras(&ras_to_pil(&p, origin), origin);
                assert_abs_diff_eq!(back.coords, p.coords, epsilon = 1e-5 * (1.0 + p.coords.norm()));
            }
        }
    }
}

#[test]
fn pil_axes() {
    // moving right in RAS+ is moving away from the left in PIL+
    let origin = Vector3::zeros();
    assert_eq!(ras_to_pil(&Point::new(1., 0., 0.), &origin), Point::new(0., 0., -1.));
    assert_eq!(ras_to_pil(&Point::new(0., 1., 0.), &origin), Point::new(-1., 0., 0.));
    assert_eq!(ras_to_pil(&Point::new(0., 0., 1.), &origin), Point::new(0., -1., 0.));
}

#[test]
fn streamlines_keep_their_order() {
    let origin = Vector3::new(91.0, 109.0, 91.0);
    let s = vec![Point::new(1., 2., 3.), Point::new(4., 5., 6.), Point::new(7., 8., 9.)];
    let pil = streamline_ras_to_pil(&s, &origin);
    assert_eq!(pil.len(), 3);
    assert_eq!(pil[2], ras_to_pil(&s[2], &origin));
    assert_eq!(streamline_pil_to_ras(&pil, &origin), s);
}

#[test]
fn single_point_is_white() {
    assert_eq!(tangent_colors(&[Point::new(3., -2., 1.)]), vec![RGB8::new(255, 255, 255)]);
}

#[test]
fn repeated_points_are_black() {
    let s = [Point::new(1., 1., 1.), Point::new(1., 1., 1.), Point::new(1., 1., 2.)];
    assert_eq!(
        tangent_colors(&s),
        vec![RGB8::new(0, 0, 0), RGB8::new(0, 0, 255), RGB8::new(0, 0, 255)]
    );
}

#[test]
fn diagonal_direction() {
    let s = [Point::new(0., 0., 0.), Point::new(1., -1., 0.)];
    // 255 / sqrt(2) = 180.3
    assert_eq!(tangent_colors(&s), vec![RGB8::new(180, 180, 0); 2]);
}
