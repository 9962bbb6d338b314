use std::ops::Index;

use crate::consts::{ FEQ_EPSILON, VACUUM_RI };
use crate::tuple::Tuple4D;
use crate::ray::Ray4D;
use crate::shape::{ ShapeId, Shapes };

/// An intersection.
///
/// This structure assumes that some ray produced an intersection. Parameter `t`
/// is analogous to `t` for a ray (the offset from the ray origin), and `shape`
/// is always a primitive; groups and solids never record hits of their own.
///
/// Smooth triangles also record the barycentric `uv` of the hit, which is
/// needed to interpolate their normal.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Intersection {
    pub t: f64,
    pub shape: ShapeId,
    pub uv: Option<(f64, f64)>,
}

impl Intersection {
    pub fn new(t: f64, shape: ShapeId) -> Intersection {
        Intersection { t, shape, uv: None }
    }

    pub fn with_uv(t: f64, shape: ShapeId, u: f64, v: f64) -> Intersection {
        Intersection { t, shape, uv: Some((u, v)) }
    }
}

/// A collection of intersections, always sorted by ascending `t`.
#[derive(Clone, Debug, Default)]
pub struct Intersections {
    intersections: Vec<Intersection>,
}

impl Index<usize> for Intersections {
    type Output = Intersection;

    fn index(&self, i: usize) -> &Intersection {
        &self.intersections[i]
    }
}

impl Intersections {
    /// Sorts `intersections` by `t`. NaN offsets are dropped.
    pub fn new(mut intersections: Vec<Intersection>) -> Intersections {
        intersections.retain(|i| !i.t.is_nan());
        intersections.sort_by(|a, b|
            a.t.partial_cmp(&b.t).unwrap_or(std::cmp::Ordering::Equal)
        );

        Intersections { intersections }
    }

    pub fn empty() -> Intersections {
        Intersections { intersections: Vec::new() }
    }

    /// Merges several lists into one sorted list.
    pub fn aggregate(lists: Vec<Intersections>) -> Intersections {
        let all = lists.into_iter()
            .flat_map(|l| l.intersections)
            .collect();

        Intersections::new(all)
    }

    /// The visible intersection: the first with a positive, finite `t`.
    pub fn hit(&self) -> Option<Intersection> {
        self.intersections.iter()
            .find(|i| i.t > 0.0 && i.t.is_finite())
            .copied()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Intersection> {
        self.intersections.iter()
    }

    pub fn len(&self) -> usize {
        self.intersections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intersections.is_empty()
    }
}

/// A record for computations associated with an `Intersection`.
///
/// Mostly a superset of an `Intersection`.
#[derive(Clone, Debug)]
pub struct IntersectionComputation {
    /// The "time" of the ray intersection.
    pub t: f64,

    /// The primitive being intersected.
    pub shape: ShapeId,

    /// The point where the intersection occurs.
    pub point: Tuple4D,

    /// A point slightly above the intersected surface. Used to prevent an
    /// object from shadowing itself (this causes "acne").
    pub over_point: Tuple4D,

    /// A point slightly below the intersected surface, where refracted rays
    /// start.
    pub under_point: Tuple4D,

    pub eyev: Tuple4D,

    /// The surface normal, flipped to face the eye.
    pub normalv: Tuple4D,

    /// The incoming ray, reflected across the normal.
    pub reflectv: Tuple4D,

    /// Whether the hit is on the inside of the surface.
    pub inside: bool,

    /// The refractive index of the material being exited.
    pub n1: f64,

    /// The refractive index of the material being entered.
    pub n2: f64,
}

impl IntersectionComputation {
    /// Prepares the shading state of `hit`, which must be one of `xs`.
    ///
    /// The full list `xs` is walked to find which materials the ray is inside
    /// of on either side of the hit.
    pub fn new(r: &Ray4D, hit: &Intersection, xs: &Intersections,
        shapes: &Shapes) -> IntersectionComputation {
        let t = hit.t;
        let point = r.position(t);
        let eyev = -r.direction;
        let mut normalv = shapes.normal_at(hit.shape, point, hit);

        let inside = if normalv.dot(&eyev) < 0.0 {
            normalv = -normalv;
            true
        } else {
            false
        };

        let over_point = point + normalv * FEQ_EPSILON;
        let under_point = point - normalv * FEQ_EPSILON;
        let reflectv = r.direction.reflect(&normalv);
        let (n1, n2) = Self::refraction_indices(hit, xs, shapes);

        IntersectionComputation {
            t, shape: hit.shape,
            point, over_point, under_point,
            eyev, normalv, reflectv,
            inside,
            n1, n2,
        }
    }

    fn refraction_indices(hit: &Intersection, xs: &Intersections,
        shapes: &Shapes) -> (f64, f64) {
        let outermost = |containers: &[ShapeId]| match containers.last() {
            Some(&s) => shapes[s].material.refractive_index,
            None => VACUUM_RI,
        };

        // Shapes the ray has entered but not yet left.
        let mut containers: Vec<ShapeId> = Vec::new();

        for i in xs.iter() {
            let is_hit = i == hit;
            let n1 = outermost(&containers);

            match containers.iter().position(|&s| s == i.shape) {
                Some(j) => { containers.remove(j); },
                None => containers.push(i.shape),
            }

            if is_hit {
                return (n1, outermost(&containers));
            }
        }

        (VACUUM_RI, VACUUM_RI)
    }

    /// The Schlick approximation of the fraction of light reflected at the
    /// hit, between 0 and 1.
    pub fn schlick(&self) -> f64 {
        let mut cos = self.eyev.dot(&self.normalv);

        // Total internal reflection can only occur if n1 > n2.
        if self.n1 > self.n2 {
            let n = self.n1 / self.n2;
            let sin2_t = n.powi(2) * (1.0 - cos.powi(2));
            if sin2_t > 1.0 {
                return 1.0;
            }

            cos = (1.0 - sin2_t).sqrt();
        }

        let r0 = ((self.n1 - self.n2) / (self.n1 + self.n2)).powi(2);
        r0 + (1.0 - r0) * (1.0 - cos).powi(5)
    }
}

#[cfg(test)]
use crate::matrix::Matrix4D;
#[cfg(test)]
use crate::shape::Shape;

#[cfg(test)]
fn one_sphere() -> (Shapes, ShapeId) {
    let mut shapes = Shapes::new();
    let s = shapes.add(Shape::sphere());
    (shapes, s)
}

#[test]
fn hit_with_all_positive() {
    let (_, s) = one_sphere();
    let i1 = Intersection::new(1.0, s);
    let i2 = Intersection::new(2.0, s);

    assert_eq!(Intersections::new(vec![i2, i1]).hit(), Some(i1));
}

#[test]
fn hit_with_some_negative() {
    let (_, s) = one_sphere();
    let i1 = Intersection::new(-1.0, s);
    let i2 = Intersection::new(1.0, s);

    assert_eq!(Intersections::new(vec![i2, i1]).hit(), Some(i2));
}

#[test]
fn hit_with_all_negative() {
    let (_, s) = one_sphere();
    let xs = Intersections::new(vec![
        Intersection::new(-2.0, s),
        Intersection::new(-1.0, s),
    ]);

    assert_eq!(xs.hit(), None);
}

#[test]
fn hit_ignores_zero_offset() {
    let (_, s) = one_sphere();
    let xs = Intersections::new(vec![
        Intersection::new(0.0, s),
        Intersection::new(0.5, s),
    ]);

    assert_eq!(xs.hit().map(|i| i.t), Some(0.5));
}

#[test]
fn hit_is_lowest_nonnegative() {
    let (_, s) = one_sphere();
    let i4 = Intersection::new(2.0, s);
    let xs = Intersections::new(vec![
        Intersection::new(5.0, s),
        Intersection::new(7.0, s),
        Intersection::new(-3.0, s),
        i4,
    ]);

    assert_eq!(xs.hit(), Some(i4));
}

#[test]
fn aggregate_sorts_everything() {
    let (_, s) = one_sphere();
    let a = Intersections::new(vec![Intersection::new(3.0, s), Intersection::new(1.0, s)]);
    let b = Intersections::new(vec![Intersection::new(2.0, s), Intersection::new(std::f64::NAN, s)]);

    let all = Intersections::aggregate(vec![a, b]);
    let ts: Vec<f64> = all.iter().map(|i| i.t).collect();
    assert_eq!(ts, vec![1.0, 2.0, 3.0]);
}

#[test]
fn precompute_outside_and_inside() {
    let (shapes, s) = one_sphere();

    let r = Ray4D::new(Tuple4D::point(0.0, 0.0, -5.0), Tuple4D::vector(0.0, 0.0, 1.0));
    let i = Intersection::new(4.0, s);
    let comps = IntersectionComputation::new(&r, &i, &Intersections::new(vec![i]), &shapes);
    assert_eq!(comps.point, Tuple4D::point(0.0, 0.0, -1.0));
    assert_eq!(comps.eyev, Tuple4D::vector(0.0, 0.0, -1.0));
    assert_eq!(comps.normalv, Tuple4D::vector(0.0, 0.0, -1.0));
    assert!(!comps.inside);

    let r = Ray4D::new(Tuple4D::point(0.0, 0.0, 0.0), Tuple4D::vector(0.0, 0.0, 1.0));
    let i = Intersection::new(1.0, s);
    let comps = IntersectionComputation::new(&r, &i, &Intersections::new(vec![i]), &shapes);
    assert_eq!(comps.point, Tuple4D::point(0.0, 0.0, 1.0));
    assert_eq!(comps.normalv, Tuple4D::vector(0.0, 0.0, -1.0));
    assert!(comps.inside);
}

#[test]
fn hit_should_offset_point() {
    let mut shapes = Shapes::new();
    let s = shapes.add(
        Shape::sphere().with_transform(Matrix4D::translation(0.0, 0.0, 1.0)).unwrap()
    );

    let r = Ray4D::new(Tuple4D::point(0.0, 0.0, -5.0), Tuple4D::vector(0.0, 0.0, 1.0));
    let i = Intersection::new(5.0, s);
    let comps = IntersectionComputation::new(&r, &i, &Intersections::new(vec![i]), &shapes);

    assert!(comps.over_point.z < -FEQ_EPSILON / 2.0);
    assert!(comps.point.z > comps.over_point.z);
    assert!(comps.under_point.z > FEQ_EPSILON / 2.0);
    assert!(comps.point.z < comps.under_point.z);
}

#[test]
fn precompute_reflection_vector() {
    let mut shapes = Shapes::new();
    let p = shapes.add(Shape::plane());

    let r2 = 2.0f64.sqrt() / 2.0;
    let r = Ray4D::new(Tuple4D::point(0.0, 1.0, -1.0), Tuple4D::vector(0.0, -r2, r2));
    let i = Intersection::new(2.0f64.sqrt(), p);
    let comps = IntersectionComputation::new(&r, &i, &Intersections::new(vec![i]), &shapes);

    assert_eq!(comps.reflectv, Tuple4D::vector(0.0, r2, r2));
}

#[test]
fn finding_n1_and_n2_at_various_intersections() {
    let mut shapes = Shapes::new();

    let mut a = Shape::glass_sphere()
        .with_transform(Matrix4D::scaling(2.0, 2.0, 2.0)).unwrap();
    a.material.refractive_index = 1.5;
    let mut b = Shape::glass_sphere()
        .with_transform(Matrix4D::translation(0.0, 0.0, -0.25)).unwrap();
    b.material.refractive_index = 2.0;
    let mut c = Shape::glass_sphere()
        .with_transform(Matrix4D::translation(0.0, 0.0, 0.25)).unwrap();
    c.material.refractive_index = 2.5;

    let a = shapes.add(a);
    let b = shapes.add(b);
    let c = shapes.add(c);

    let r = Ray4D::new(Tuple4D::point(0.0, 0.0, -4.0), Tuple4D::vector(0.0, 0.0, 1.0));
    let xs = Intersections::new(vec![
        Intersection::new(2.0, a),
        Intersection::new(2.75, b),
        Intersection::new(3.25, c),
        Intersection::new(4.75, b),
        Intersection::new(5.25, c),
        Intersection::new(6.0, a),
    ]);

    let expected = [
        (1.0, 1.5), (1.5, 2.0), (2.0, 2.5), (2.5, 2.5), (2.5, 1.5), (1.5, 1.0)
    ];
    for (i, &(n1, n2)) in expected.iter().enumerate() {
        let comps = IntersectionComputation::new(&r, &xs[i], &xs, &shapes);
        assert_eq!((comps.n1, comps.n2), (n1, n2), "intersection {}", i);
    }
}

#[test]
fn schlick_under_total_internal_reflection() {
    let mut shapes = Shapes::new();
    let s = shapes.add(Shape::glass_sphere());

    let r2 = 2.0f64.sqrt() / 2.0;
    let r = Ray4D::new(Tuple4D::point(0.0, 0.0, r2), Tuple4D::vector(0.0, 1.0, 0.0));
    let xs = Intersections::new(vec![
        Intersection::new(-r2, s),
        Intersection::new(r2, s),
    ]);
    let comps = IntersectionComputation::new(&r, &xs[1], &xs, &shapes);

    assert_eq!(comps.schlick(), 1.0);
}

#[test]
fn schlick_with_perpendicular_and_small_angles() {
    let mut shapes = Shapes::new();
    let s = shapes.add(Shape::glass_sphere());

    let r = Ray4D::new(Tuple4D::point(0.0, 0.0, 0.0), Tuple4D::vector(0.0, 1.0, 0.0));
    let xs = Intersections::new(vec![
        Intersection::new(-1.0, s),
        Intersection::new(1.0, s),
    ]);
    let comps = IntersectionComputation::new(&r, &xs[1], &xs, &shapes);
    assert!(crate::feq(comps.schlick(), 0.04));

    let r = Ray4D::new(Tuple4D::point(0.0, 0.99, -2.0), Tuple4D::vector(0.0, 0.0, 1.0));
    let xs = Intersections::new(vec![Intersection::new(1.8589, s)]);
    let comps = IntersectionComputation::new(&r, &xs[0], &xs, &shapes);
    assert!(crate::feq(comps.schlick(), 0.48873));
}
