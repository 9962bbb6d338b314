use crate::feq;
use crate::tuple::Tuple4D;
use crate::matrix::Matrix4D;
use crate::ray::Ray4D;

/// An axis-aligned bounding box.
///
/// `min <= max` componentwise unless the box is empty. The empty box is the
/// identity for `union`. Either end of an axis may be infinite (a plane is
/// unbounded along X and Z), and every operation here keeps infinities
/// intact rather than turning them into NaN.
#[derive(Copy, Clone, Debug)]
pub struct Bounds {
    pub min: Tuple4D,
    pub max: Tuple4D,
    empty: bool,
}

impl Default for Bounds {
    fn default() -> Bounds {
        Bounds::empty()
    }
}

/// Two empty boxes are equal regardless of their corners. Infinite corners
/// compare exactly, finite ones approximately.
impl PartialEq for Bounds {
    fn eq(&self, other: &Bounds) -> bool {
        if self.empty || other.empty {
            return self.empty == other.empty;
        }

        (0..3).all(|a| same(self.min[a], other.min[a])
            && same(self.max[a], other.max[a]))
    }
}

fn same(a: f64, b: f64) -> bool {
    a == b || feq(a, b)
}

impl Bounds {
    /// The box containing nothing.
    pub fn empty() -> Bounds {
        Bounds {
            min: Tuple4D::point(std::f64::INFINITY, std::f64::INFINITY,
                std::f64::INFINITY),
            max: Tuple4D::point(std::f64::NEG_INFINITY, std::f64::NEG_INFINITY,
                std::f64::NEG_INFINITY),
            empty: true,
        }
    }

    /// Creates a box from its two corners. The corners are reordered per
    /// axis, so any two opposite corners will do.
    pub fn new(a: Tuple4D, b: Tuple4D) -> Bounds {
        let a = Tuple4D::point(a.x, a.y, a.z);
        let b = Tuple4D::point(b.x, b.y, b.z);

        Bounds { min: a.min(&b), max: a.max(&b), empty: false }
    }

    /// The smallest box containing every point in `points`.
    pub fn from_points(points: &[Tuple4D]) -> Bounds {
        points.iter().fold(Bounds::empty(), |b, p| b.add_point(*p))
    }

    pub fn is_empty(&self) -> bool {
        self.empty
    }

    /// Grows the box to contain `p`.
    pub fn add_point(&self, p: Tuple4D) -> Bounds {
        self.union(&Bounds::new(p, p))
    }

    pub fn union(&self, other: &Bounds) -> Bounds {
        if self.empty {
            return *other;
        }
        if other.empty {
            return *self;
        }

        Bounds {
            min: self.min.min(&other.min),
            max: self.max.max(&other.max),
            empty: false,
        }
    }

    pub fn contains_point(&self, p: &Tuple4D) -> bool {
        !self.empty && (0..3).all(|a| self.min[a] <= p[a] && p[a] <= self.max[a])
    }

    /// Checks whether `other` lies entirely within this box. The empty box is
    /// contained in every box.
    pub fn contains_bounds(&self, other: &Bounds) -> bool {
        other.empty
            || (self.contains_point(&other.min) && self.contains_point(&other.max))
    }

    /// Transforms the box, returning the axis-aligned box around the result.
    ///
    /// Each output axis is accumulated from the matrix row, choosing for every
    /// term the smaller and larger of `m[i][j] * min[j]` and `m[i][j] *
    /// max[j]`. This equals transforming all eight corners, but zero matrix
    /// entries are skipped so an infinite extent never meets `0 * inf`.
    pub fn transform(&self, m: &Matrix4D) -> Bounds {
        if self.empty {
            return *self;
        }

        let mut lo = [0.0; 3];
        let mut hi = [0.0; 3];
        for i in 0..3 {
            lo[i] = m[(i, 3)];
            hi[i] = m[(i, 3)];

            for j in 0..3 {
                let a = m[(i, j)];
                if a == 0.0 {
                    continue;
                }

                let e = a * self.min[j];
                let f = a * self.max[j];
                lo[i] += e.min(f);
                hi[i] += e.max(f);
            }
        }

        Bounds {
            min: Tuple4D::point(lo[0], lo[1], lo[2]),
            max: Tuple4D::point(hi[0], hi[1], hi[2]),
            empty: false,
        }
    }

    /// Slab test against a ray, using its precomputed inverse direction.
    ///
    /// Misses when the box lies entirely behind the ray, when the per-axis
    /// slabs do not overlap, or when an axis produces NaN (the ray runs
    /// parallel to that axis with its origin exactly on a slab face).
    pub fn intersects(&self, ray: &Ray4D) -> bool {
        if self.empty {
            return false;
        }

        let inv = ray.inv_direction();
        let mut tmin = std::f64::NEG_INFINITY;
        let mut tmax = std::f64::INFINITY;

        for axis in 0..3 {
            let t1 = (self.min[axis] - ray.origin[axis]) * inv[axis];
            let t2 = (self.max[axis] - ray.origin[axis]) * inv[axis];
            if t1.is_nan() || t2.is_nan() {
                return false;
            }

            tmin = tmin.max(t1.min(t2));
            tmax = tmax.min(t1.max(t2));
        }

        tmax >= 0.0 && tmin <= tmax
    }

    /// Splits the box in two at the midpoint of its longest axis.
    ///
    /// Ties prefer X, then Y. When the chosen axis has one infinite end the
    /// cut is made at the finite end, and at zero when both ends are infinite.
    pub fn split(&self) -> (Bounds, Bounds) {
        let extent = self.max - self.min;
        let axis = if extent.x >= extent.y && extent.x >= extent.z {
            0
        } else if extent.y >= extent.z {
            1
        } else {
            2
        };

        let (lo, hi) = (self.min[axis], self.max[axis]);
        let mid = match (lo.is_finite(), hi.is_finite()) {
            (true, true) => lo + (hi - lo) / 2.0,
            (true, false) => lo,
            (false, true) => hi,
            (false, false) => 0.0,
        };

        let left = Bounds { max: with_axis(self.max, axis, mid), ..*self };
        let right = Bounds { min: with_axis(self.min, axis, mid), ..*self };

        (left, right)
    }
}

fn with_axis(mut t: Tuple4D, axis: usize, value: f64) -> Tuple4D {
    match axis {
        0 => t.x = value,
        1 => t.y = value,
        _ => t.z = value,
    }

    t
}

#[test]
fn union_with_empty_is_identity() {
    let b = Bounds::new(Tuple4D::point(-1.0, -2.0, -3.0),
        Tuple4D::point(3.0, 2.0, 1.0));

    assert_eq!(b.union(&Bounds::empty()), b);
    assert_eq!(Bounds::empty().union(&b), b);
    assert!(Bounds::empty().union(&Bounds::empty()).is_empty());
}

#[test]
fn union_is_commutative_and_associative() {
    let a = Bounds::new(Tuple4D::point(-5.0, -2.0, 0.0),
        Tuple4D::point(7.0, 4.0, 4.0));
    let b = Bounds::new(Tuple4D::point(8.0, -7.0, -2.0),
        Tuple4D::point(14.0, 2.0, 8.0));
    let c = Bounds::new(Tuple4D::point(0.0, 0.0, std::f64::NEG_INFINITY),
        Tuple4D::point(1.0, 1.0, 1.0));

    assert_eq!(a.union(&b), b.union(&a));
    assert_eq!(a.union(&b).union(&c), a.union(&b.union(&c)));
    assert_eq!(a.union(&b), Bounds::new(Tuple4D::point(-5.0, -7.0, -2.0),
        Tuple4D::point(14.0, 4.0, 8.0)));
}

#[test]
fn adding_points_grows_bounds() {
    let b = Bounds::from_points(&[
        Tuple4D::point(-5.0, 2.0, 0.0),
        Tuple4D::point(7.0, 0.0, -3.0),
    ]);

    assert_eq!(b.min, Tuple4D::point(-5.0, 0.0, -3.0));
    assert_eq!(b.max, Tuple4D::point(7.0, 2.0, 0.0));
}

#[test]
fn box_contains_points_and_boxes() {
    let b = Bounds::new(Tuple4D::point(5.0, -2.0, 0.0),
        Tuple4D::point(11.0, 4.0, 7.0));

    assert!(b.contains_point(&Tuple4D::point(5.0, -2.0, 0.0)));
    assert!(b.contains_point(&Tuple4D::point(8.0, 1.0, 3.0)));
    assert!(!b.contains_point(&Tuple4D::point(3.0, 0.0, 3.0)));
    assert!(!b.contains_point(&Tuple4D::point(8.0, 1.0, 8.0)));

    assert!(b.contains_bounds(&Bounds::new(Tuple4D::point(6.0, -1.0, 1.0),
        Tuple4D::point(10.0, 3.0, 6.0))));
    assert!(!b.contains_bounds(&Bounds::new(Tuple4D::point(4.0, -3.0, -1.0),
        Tuple4D::point(10.0, 3.0, 6.0))));
    assert!(b.contains_bounds(&Bounds::empty()));
}

#[test]
fn transforming_bounds() {
    let b = Bounds::new(Tuple4D::point(-1.0, -1.0, -1.0),
        Tuple4D::point(1.0, 1.0, 1.0));
    let m = Matrix4D::rotation_x(std::f64::consts::PI / 4.0)
        * Matrix4D::rotation_y(std::f64::consts::PI / 4.0);

    let t = b.transform(&m);

    assert_eq!(t.min, Tuple4D::point(-1.41421, -1.70711, -1.70711));
    assert_eq!(t.max, Tuple4D::point(1.41421, 1.70711, 1.70711));
}

#[test]
fn transforming_infinite_bounds_keeps_infinities() {
    let plane = Bounds::new(
        Tuple4D::point(std::f64::NEG_INFINITY, 0.0, std::f64::NEG_INFINITY),
        Tuple4D::point(std::f64::INFINITY, 0.0, std::f64::INFINITY),
    );

    let t = plane.transform(&Matrix4D::translation(1.0, 2.0, 3.0));

    assert_eq!(t.min.x, std::f64::NEG_INFINITY);
    assert_eq!(t.max.z, std::f64::INFINITY);
    assert_eq!(t.min.y, 2.0);
    assert_eq!(t.max.y, 2.0);
}

#[test]
fn ray_intersects_cube_bounds() {
    let b = Bounds::new(Tuple4D::point(-1.0, -1.0, -1.0),
        Tuple4D::point(1.0, 1.0, 1.0));

    let cases = [
        (Tuple4D::point(5.0, 0.5, 0.0), Tuple4D::vector(-1.0, 0.0, 0.0), true),
        (Tuple4D::point(-5.0, 0.5, 0.0), Tuple4D::vector(1.0, 0.0, 0.0), true),
        (Tuple4D::point(0.5, 5.0, 0.0), Tuple4D::vector(0.0, -1.0, 0.0), true),
        (Tuple4D::point(0.0, 0.5, 0.0), Tuple4D::vector(0.0, 0.0, 1.0), true),
        (Tuple4D::point(-2.0, 0.0, 0.0), Tuple4D::vector(2.0, 4.0, 6.0), false),
        (Tuple4D::point(0.0, -2.0, 0.0), Tuple4D::vector(6.0, 2.0, 4.0), false),
        (Tuple4D::point(2.0, 0.0, 2.0), Tuple4D::vector(0.0, 0.0, -1.0), false),
        (Tuple4D::point(0.0, 0.0, 5.0), Tuple4D::vector(0.0, 0.0, 1.0), false),
    ];

    for (origin, direction, expected) in cases.iter() {
        let r = Ray4D::new(*origin, direction.normalize());
        assert_eq!(b.intersects(&r), *expected, "{:?} {:?}", origin, direction);
    }
}

#[test]
fn ray_intersects_infinite_slab() {
    let ground = Bounds::new(
        Tuple4D::point(std::f64::NEG_INFINITY, -1.0, std::f64::NEG_INFINITY),
        Tuple4D::point(std::f64::INFINITY, 0.0, std::f64::INFINITY),
    );

    let down = Ray4D::new(Tuple4D::point(3.0, 5.0, -7.0),
        Tuple4D::vector(0.0, -1.0, 0.0));
    let slanted = Ray4D::new(Tuple4D::point(0.0, 5.0, 0.0),
        Tuple4D::vector(0.3, -1.0, 0.2).normalize());
    let above = Ray4D::new(Tuple4D::point(0.0, 5.0, 0.0),
        Tuple4D::vector(1.0, 0.0, 0.0));
    let away = Ray4D::new(Tuple4D::point(0.0, 5.0, 0.0),
        Tuple4D::vector(0.0, 1.0, 0.0));

    assert!(down.origin.y > 0.0 && ground.intersects(&down));
    assert!(ground.intersects(&slanted));
    assert!(!ground.intersects(&above));
    assert!(!ground.intersects(&away));
}

#[test]
fn splitting_on_longest_axis() {
    let b = Bounds::new(Tuple4D::point(-1.0, -2.0, -3.0),
        Tuple4D::point(9.0, 5.5, 3.0));
    let (left, right) = b.split();

    assert_eq!(left, Bounds::new(Tuple4D::point(-1.0, -2.0, -3.0),
        Tuple4D::point(4.0, 5.5, 3.0)));
    assert_eq!(right, Bounds::new(Tuple4D::point(4.0, -2.0, -3.0),
        Tuple4D::point(9.0, 5.5, 3.0)));

    let tall = Bounds::new(Tuple4D::point(-1.0, -7.0, -3.0),
        Tuple4D::point(9.0, 8.0, 3.0));
    let (left, right) = tall.split();

    assert_eq!(left.max.y, 0.5);
    assert_eq!(right.min.y, 0.5);
}
