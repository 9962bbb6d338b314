use crate::tuple::Tuple4D;
use crate::matrix::Matrix4D;

/// A ray with an origin point and a direction vector.
///
/// The componentwise reciprocal of the direction is kept alongside, since
/// every bounding box test along the ray divides by it. A zero component
/// yields an infinite reciprocal, which the slab test relies on.
#[derive(Copy, Clone, Debug, Default)]
pub struct Ray4D {
    pub origin: Tuple4D,
    pub direction: Tuple4D,
    inv_direction: Tuple4D,
}

/// Rays compare by origin and direction only; the reciprocal may hold
/// infinities, which never compare approximately equal.
impl PartialEq for Ray4D {
    fn eq(&self, other: &Ray4D) -> bool {
        self.origin == other.origin && self.direction == other.direction
    }
}

impl Ray4D {
    pub fn new(mut origin: Tuple4D, mut direction: Tuple4D) -> Ray4D {
        if !origin.is_point() {
            origin.w = 1.0;
        }

        if !direction.is_vector() {
            direction.w = 0.0;
        }

        let inv_direction = Tuple4D::vector(
            1.0 / direction.x,
            1.0 / direction.y,
            1.0 / direction.z,
        );

        Ray4D { origin, direction, inv_direction }
    }

    /// The componentwise reciprocal of `direction`.
    pub fn inv_direction(&self) -> Tuple4D {
        self.inv_direction
    }

    pub fn position(&self, t: f64) -> Tuple4D {
        self.origin + (t * self.direction)
    }

    pub fn transform(&self, m: &Matrix4D) -> Ray4D {
        Ray4D::new(*m * self.origin, *m * self.direction)
    }
}

#[test]
fn ray_position() {
    let r = Ray4D::new(
                Tuple4D::point(2.0, 3.0, 4.0),
                Tuple4D::vector(1.0, 0.0, 0.0)
            );

    assert_eq!(r.position(0.0), Tuple4D::point(2.0, 3.0, 4.0));
    assert_eq!(r.position(1.0), Tuple4D::point(3.0, 3.0, 4.0));
    assert_eq!(r.position(-1.0), Tuple4D::point(1.0, 3.0, 4.0));
    assert_eq!(r.position(2.5), Tuple4D::point(4.5, 3.0, 4.0));
}

#[test]
fn ray_translation() {
    let r = Ray4D::new(
                Tuple4D::point(1.0, 2.0, 3.0),
                Tuple4D::vector(0.0, 1.0, 0.0)
            );
    let t = r.transform(&Matrix4D::translation(3.0, 4.0, 5.0));

    assert_eq!(t.origin, Tuple4D::point(4.0, 6.0, 8.0));
    assert_eq!(t.direction, Tuple4D::vector(0.0, 1.0, 0.0));
}

#[test]
fn ray_scaling_updates_inverse_direction() {
    let r = Ray4D::new(
                Tuple4D::point(1.0, 2.0, 3.0),
                Tuple4D::vector(0.0, 1.0, 0.0)
            );
    let t = r.transform(&Matrix4D::scaling(2.0, 4.0, 4.0));

    assert_eq!(t.origin, Tuple4D::point(2.0, 8.0, 12.0));
    assert_eq!(t.direction, Tuple4D::vector(0.0, 4.0, 0.0));
    assert_eq!(t.inv_direction().y, 0.25);
    assert!(t.inv_direction().x.is_infinite());
}
