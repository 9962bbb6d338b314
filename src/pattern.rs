use crate::color::Color;
use crate::error::{ Result, TracerError };
use crate::feq;
use crate::matrix::Matrix4D;
use crate::shape::{ ShapeId, Shapes };
use crate::tuple::Tuple4D;

/// The kinds of pattern a material can carry, each with its two colors.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum PatternKind {
    /// Alternates across the X axis with period 2.
    Stripe(Color, Color),

    /// Blends linearly from the first color to the second along X.
    Gradient(Color, Color),

    /// Concentric rings in the XZ plane.
    Ring(Color, Color),

    /// A 3D checkerboard of unit cubes.
    Checker(Color, Color),

    /// Returns the pattern-space point as a color. Mostly for testing.
    Test,
}

/// A pattern with its own transform, relative to the shape it is applied to.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Pattern {
    pub kind: PatternKind,
    transform: Matrix4D,
    inverse: Matrix4D,
}

impl Pattern {
    pub fn new(kind: PatternKind) -> Pattern {
        Pattern {
            kind,
            transform: Matrix4D::identity(),
            inverse: Matrix4D::identity(),
        }
    }

    pub fn stripe(primary: Color, secondary: Color) -> Pattern {
        Pattern::new(PatternKind::Stripe(primary, secondary))
    }

    pub fn with_transform(mut self, transform: Matrix4D) -> Result<Pattern> {
        self.inverse = transform.inverse().ok_or_else(|| {
            TracerError::NonInvertible(format!("{}", transform))
        })?;
        self.transform = transform;
        Ok(self)
    }

    pub fn transform(&self) -> &Matrix4D {
        &self.transform
    }

    /// The color at a point in pattern space.
    pub fn pattern_at(&self, p: Tuple4D) -> Color {
        match self.kind {
            PatternKind::Stripe(a, b) => {
                if feq(p.x.floor().rem_euclid(2.0), 0.0) { a } else { b }
            },
            PatternKind::Gradient(a, b) => {
                a + (b - a) * (p.x - p.x.floor())
            },
            PatternKind::Ring(a, b) => {
                let r = (p.x.powi(2) + p.z.powi(2)).sqrt();
                if feq(r.floor().rem_euclid(2.0), 0.0) { a } else { b }
            },
            PatternKind::Checker(a, b) => {
                let sum = p.x.floor() + p.y.floor() + p.z.floor();
                if feq(sum.rem_euclid(2.0), 0.0) { a } else { b }
            },
            PatternKind::Test => Color::rgb(p.x, p.y, p.z),
        }
    }

    /// The color at a world-space point on `shape`, after converting through
    /// the shape's (and its ancestors') space into pattern space.
    pub fn pattern_at_shape(&self, shapes: &Shapes, shape: ShapeId,
        world_point: Tuple4D) -> Color {
        let object_point = shapes.world_to_object(shape, world_point);
        self.pattern_at(self.inverse * object_point)
    }
}

#[test]
fn stripe_pattern_is_constant_along_y_and_z() {
    let pattern = Pattern::stripe(Color::white(), Color::black());

    for &(y, z) in [(0.0, 0.0), (1.0, 0.0), (2.0, 0.0), (0.0, 1.0), (0.0, 2.0)].iter() {
        assert_eq!(pattern.pattern_at(Tuple4D::point(0.0, y, z)), Color::white());
    }
}

#[test]
fn stripe_pattern_alternates_along_x() {
    let pattern = Pattern::stripe(Color::white(), Color::black());

    assert_eq!(pattern.pattern_at(Tuple4D::point( 0.0, 0.0, 0.0)),
        Color::white());
    assert_eq!(pattern.pattern_at(Tuple4D::point( 0.9, 0.0, 0.0)),
        Color::white());
    assert_eq!(pattern.pattern_at(Tuple4D::point( 1.0, 0.0, 0.0)),
        Color::black());
    assert_eq!(pattern.pattern_at(Tuple4D::point(-0.1, 0.0, 0.0)),
        Color::black());
    assert_eq!(pattern.pattern_at(Tuple4D::point(-1.0, 0.0, 0.0)),
        Color::black());
    assert_eq!(pattern.pattern_at(Tuple4D::point(-1.1, 0.0, 0.0)),
        Color::white());
}

#[test]
fn gradient_ring_and_checker() {
    let gradient = Pattern::new(PatternKind::Gradient(Color::white(), Color::black()));
    assert_eq!(gradient.pattern_at(Tuple4D::point(0.25, 0.0, 0.0)),
        Color::rgb(0.75, 0.75, 0.75));
    assert_eq!(gradient.pattern_at(Tuple4D::point(0.75, 0.0, 0.0)),
        Color::rgb(0.25, 0.25, 0.25));

    let ring = Pattern::new(PatternKind::Ring(Color::white(), Color::black()));
    assert_eq!(ring.pattern_at(Tuple4D::point(0.0, 0.0, 0.0)), Color::white());
    assert_eq!(ring.pattern_at(Tuple4D::point(1.0, 0.0, 0.0)), Color::black());
    assert_eq!(ring.pattern_at(Tuple4D::point(0.708, 0.0, 0.708)), Color::black());

    let checker = Pattern::new(PatternKind::Checker(Color::white(), Color::black()));
    assert_eq!(checker.pattern_at(Tuple4D::point(0.99, 0.0, 0.0)), Color::white());
    assert_eq!(checker.pattern_at(Tuple4D::point(0.0, 1.01, 0.0)), Color::black());
    assert_eq!(checker.pattern_at(Tuple4D::point(0.0, 0.0, 1.01)), Color::black());
}

#[test]
fn pattern_with_shape_and_pattern_transforms() {
    use crate::shape::Shape;

    let mut shapes = Shapes::new();
    let s = shapes.add(
        Shape::sphere().with_transform(Matrix4D::scaling(2.0, 2.0, 2.0)).unwrap()
    );
    let pattern = Pattern::new(PatternKind::Test)
        .with_transform(Matrix4D::translation(0.5, 1.0, 1.5))
        .unwrap();

    let c = pattern.pattern_at_shape(&shapes, s, Tuple4D::point(2.5, 3.0, 3.5));
    assert_eq!(c, Color::rgb(0.75, 0.5, 0.25));
}

#[test]
fn pattern_on_a_grouped_shape() {
    use crate::shape::Shape;

    let mut shapes = Shapes::new();
    let g = shapes.add(
        Shape::group().with_transform(Matrix4D::scaling(2.0, 2.0, 2.0)).unwrap()
    );
    let s = shapes.add(
        Shape::sphere().with_transform(Matrix4D::translation(1.0, 0.0, 0.0)).unwrap()
    );
    shapes.add_child(g, s).unwrap();

    let pattern = Pattern::new(PatternKind::Test);
    let c = pattern.pattern_at_shape(&shapes, s, Tuple4D::point(4.0, 2.0, 0.0));
    assert_eq!(c, Color::rgb(1.0, 1.0, 0.0));
}
