use crate::error::{ Result, TracerError };
use crate::matrix::Matrix4D;
use crate::ray::Ray4D;
use crate::tuple::Tuple4D;

/// A camera record for generating a canvas.
///
/// This record gives a "frame" of the world. Based on camera parameters,
/// different perspectives can be produced. Canvas coordinates run from
/// `(0, 0)` at the top left corner of the first pixel to `(hsize, vsize)` at
/// the bottom right corner of the last one.
#[derive(Clone, Debug, PartialEq)]
pub struct Camera {
    /// The horizontal size of the resultant canvas.
    pub hsize: usize,

    /// The vertical size of the resultant canvas.
    pub vsize: usize,

    pub half_width: f64,
    pub half_height: f64,
    pub pixel_size: f64,

    /// The angle describing "how much" the camera can see.
    pub field_of_view: f64,

    /// Orients the world relative to the camera (typically a view
    /// transformation).
    transform: Matrix4D,
    inverse: Matrix4D,
}

impl Camera {
    /// Fails if `transform` has no inverse.
    pub fn new(hsize: usize, vsize: usize, field_of_view: f64,
        transform: Matrix4D) -> Result<Camera> {
        let inverse = transform.inverse().ok_or_else(|| {
            TracerError::NonInvertible(format!("{}", transform))
        })?;

        let half_view = (field_of_view / 2.0).tan();
        let aspect = (hsize as f64) / (vsize as f64);

        let (half_width, half_height) = if aspect >= 1.0 {
            (half_view, half_view / aspect)
        } else {
            (half_view * aspect, half_view)
        };

        let pixel_size = half_width * 2.0 / (hsize as f64);
        Ok(Camera {
            hsize,
            vsize,
            half_width,
            half_height,
            pixel_size,
            field_of_view,
            transform,
            inverse,
        })
    }

    pub fn transform(&self) -> &Matrix4D {
        &self.transform
    }

    /// The ray from the eye through a point of the canvas, given in
    /// (possibly fractional) canvas coordinates.
    pub fn ray_for_point(&self, x: f64, y: f64) -> Ray4D {
        // The untransformed coordinates of the point in world space. The
        // canvas sits at z = -1.
        let world_x = self.half_width - x * self.pixel_size;
        let world_y = self.half_height - y * self.pixel_size;

        let pixel = self.inverse * Tuple4D::point(world_x, world_y, -1.0);
        let origin = self.inverse * Tuple4D::point(0.0, 0.0, 0.0);
        let direction = (pixel - origin).normalize();

        Ray4D::new(origin, direction)
    }

    /// The ray through the center of a pixel.
    pub fn ray_for_pixel(&self, px: usize, py: usize) -> Ray4D {
        self.ray_for_point(px as f64 + 0.5, py as f64 + 0.5)
    }
}

#[test]
fn pixel_size_for_canvases() {
    let horizontal = Camera::new(200, 125, std::f64::consts::PI / 2.0,
        Matrix4D::identity()).unwrap();
    let vertical = Camera::new(125, 200, std::f64::consts::PI / 2.0,
        Matrix4D::identity()).unwrap();

    assert!(crate::feq(horizontal.pixel_size, 0.01));
    assert!(crate::feq(vertical.pixel_size, 0.01));
}

#[test]
fn ray_through_center() {
    let c = Camera::new(201, 101, std::f64::consts::PI / 2.0,
        Matrix4D::identity()).unwrap();
    let r = c.ray_for_pixel(100, 50);

    assert_eq!(r.origin, Tuple4D::point(0.0, 0.0, 0.0));
    assert_eq!(r.direction, Tuple4D::vector(0.0, 0.0, -1.0));
}

#[test]
fn ray_through_corner() {
    let c = Camera::new(201, 101, std::f64::consts::PI / 2.0,
        Matrix4D::identity()).unwrap();
    let r = c.ray_for_pixel(0, 0);

    assert_eq!(r.origin, Tuple4D::point(0.0, 0.0, 0.0));
    assert_eq!(r.direction, Tuple4D::vector(0.66519, 0.33259, -0.66851));
}

#[test]
fn ray_when_camera_transformed() {
    let c = Camera::new(201, 101, std::f64::consts::PI / 2.0,
        Matrix4D::rotation_y(std::f64::consts::PI / 4.0)
            * Matrix4D::translation(0.0, -2.0, 5.0)).unwrap();
    let r = c.ray_for_pixel(100, 50);

    assert_eq!(r.origin, Tuple4D::point(0.0, 2.0, -5.0));
    assert_eq!(r.direction,
        Tuple4D::vector(2.0f64.sqrt() / 2.0, 0.0, -(2.0f64.sqrt() / 2.0)));
}

#[test]
fn ray_for_point_matches_pixel_center() {
    let c = Camera::new(11, 7, std::f64::consts::PI / 3.0,
        Matrix4D::translation(1.0, 0.0, 2.0)).unwrap();

    assert_eq!(c.ray_for_point(3.5, 2.5), c.ray_for_pixel(3, 2));
}

#[test]
fn singular_camera_transform_is_rejected() {
    let result = Camera::new(10, 10, 1.0, Matrix4D::scaling(1.0, 0.0, 1.0));
    assert!(matches!(result, Err(TracerError::NonInvertible(_))));
}
