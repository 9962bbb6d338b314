use serde::{ Deserialize, Serialize };

use crate::intersect::Intersections;
use crate::ray::Ray4D;
use crate::shape::{ ShapeId, ShapeType, Shapes };

/// The boolean operator of a constructive solid.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CsgOp {
    Union,
    Intersection,
    Difference,
}

impl CsgOp {
    /// Decides whether a hit survives the operator.
    ///
    /// `left_hit` is whether the hit is on the left operand; `in_left` and
    /// `in_right` whether the ray is currently inside each operand.
    pub fn allows(&self, left_hit: bool, in_left: bool, in_right: bool)
        -> bool {
        match self {
            CsgOp::Union => (left_hit && !in_right) || (!left_hit && !in_left),
            CsgOp::Intersection => (left_hit && in_right) || (!left_hit && in_left),
            CsgOp::Difference => (left_hit && !in_right) || (!left_hit && in_left),
        }
    }
}

impl Shapes {
    /// Keeps the hits from `xs` which lie on the surface of the solid `csg`.
    ///
    /// `xs` must be sorted by `t`. Every hit on a shape outside the solid is
    /// dropped; a non-solid `csg` yields no hits.
    pub fn filter_intersections(&self, csg: ShapeId, xs: &Intersections)
        -> Intersections {
        let (op, left) = match *self[csg].ty() {
            ShapeType::Csg(op, left, _) => (op, left),
            _ => return Intersections::empty(),
        };

        let mut in_left = false;
        let mut in_right = false;
        let mut kept = Vec::new();

        for i in xs.iter() {
            if !self.includes(csg, i.shape) {
                continue;
            }

            let left_hit = self.includes(left, i.shape);
            if op.allows(left_hit, in_left, in_right) {
                kept.push(*i);
            }

            if left_hit {
                in_left = !in_left;
            } else {
                in_right = !in_right;
            }
        }

        Intersections::new(kept)
    }

    pub(crate) fn intersect_csg(&self, id: ShapeId, op: CsgOp,
        left: ShapeId, right: ShapeId, ray: &Ray4D) -> Intersections {
        if !self.bounds(id).intersects(ray) {
            return Intersections::empty();
        }

        let xs = Intersections::aggregate(vec![
            self.intersect(left, ray),
            self.intersect(right, ray),
        ]);

        log::trace!("solid {:?} ({:?}) filtering {} hits", id, op, xs.len());
        self.filter_intersections(id, &xs)
    }
}

#[cfg(test)]
use crate::intersect::Intersection;
#[cfg(test)]
use crate::matrix::Matrix4D;
#[cfg(test)]
use crate::shape::Shape;
#[cfg(test)]
use crate::tuple::Tuple4D;

#[test]
fn csg_truth_table() {
    use CsgOp::*;

    // (op, left_hit, in_left, in_right, allowed)
    let table = [
        (Union, true, true, true, false),
        (Union, true, true, false, true),
        (Union, true, false, true, false),
        (Union, true, false, false, true),
        (Union, false, true, true, false),
        (Union, false, true, false, false),
        (Union, false, false, true, true),
        (Union, false, false, false, true),
        (Intersection, true, true, true, true),
        (Intersection, true, true, false, false),
        (Intersection, true, false, true, true),
        (Intersection, true, false, false, false),
        (Intersection, false, true, true, true),
        (Intersection, false, true, false, true),
        (Intersection, false, false, true, false),
        (Intersection, false, false, false, false),
        (Difference, true, true, true, false),
        (Difference, true, true, false, true),
        (Difference, true, false, true, false),
        (Difference, true, false, false, true),
        (Difference, false, true, true, true),
        (Difference, false, true, false, true),
        (Difference, false, false, true, false),
        (Difference, false, false, false, false),
    ];

    for &(op, lhit, inl, inr, expected) in table.iter() {
        assert_eq!(op.allows(lhit, inl, inr), expected,
                   "{:?} lhit={} inl={} inr={}", op, lhit, inl, inr);
    }
}

#[test]
fn csg_links_its_operands() {
    let mut shapes = Shapes::new();
    let s1 = shapes.add(Shape::sphere());
    let s2 = shapes.add(Shape::cube());
    let c = shapes.csg(CsgOp::Union, s1, s2).unwrap();

    assert_eq!(*shapes[c].ty(), ShapeType::Csg(CsgOp::Union, s1, s2));
    assert_eq!(shapes[s1].parent(), Some(c));
    assert_eq!(shapes[s2].parent(), Some(c));

    // Operands can belong to one solid only.
    assert!(shapes.csg(CsgOp::Difference, s1, s2).is_err());
}

#[test]
fn filtering_a_list_of_intersections() {
    let expected = [
        (CsgOp::Union, 0, 3),
        (CsgOp::Intersection, 1, 2),
        (CsgOp::Difference, 0, 1),
    ];

    for &(op, x0, x1) in expected.iter() {
        let mut shapes = Shapes::new();
        let s1 = shapes.add(Shape::sphere());
        let s2 = shapes.add(Shape::cube());
        let c = shapes.csg(op, s1, s2).unwrap();

        let xs = Intersections::new(vec![
            Intersection::new(1.0, s1),
            Intersection::new(2.0, s2),
            Intersection::new(3.0, s1),
            Intersection::new(4.0, s2),
        ]);

        let result = shapes.filter_intersections(c, &xs);
        assert_eq!(result.len(), 2);
        assert_eq!(result[0], xs[x0]);
        assert_eq!(result[1], xs[x1]);
    }
}

#[test]
fn ray_misses_a_solid() {
    let mut shapes = Shapes::new();
    let s1 = shapes.add(Shape::sphere());
    let s2 = shapes.add(Shape::cube());
    let c = shapes.csg(CsgOp::Union, s1, s2).unwrap();

    let r = Ray4D::new(Tuple4D::point(0.0, 2.0, -5.0), Tuple4D::vector(0.0, 0.0, 1.0));
    assert!(shapes.intersect(c, &r).is_empty());
}

#[test]
fn ray_hits_a_solid() {
    let mut shapes = Shapes::new();
    let s1 = shapes.add(Shape::sphere());
    let s2 = shapes.add(
        Shape::sphere().with_transform(Matrix4D::translation(0.0, 0.0, 0.5)).unwrap()
    );
    let c = shapes.csg(CsgOp::Union, s1, s2).unwrap();

    let r = Ray4D::new(Tuple4D::point(0.0, 0.0, -5.0), Tuple4D::vector(0.0, 0.0, 1.0));
    let xs = shapes.intersect(c, &r);

    assert_eq!(xs.len(), 2);
    assert!(crate::feq(xs[0].t, 4.0));
    assert_eq!(xs[0].shape, s1);
    assert!(crate::feq(xs[1].t, 6.5));
    assert_eq!(xs[1].shape, s2);
}

#[test]
fn nested_solids_classify_hits_by_subtree() {
    // (sphere - cube) union cube: hits on the inner solid count as left.
    let mut shapes = Shapes::new();
    let a = shapes.add(Shape::sphere());
    let b = shapes.add(
        Shape::cube().with_transform(Matrix4D::translation(0.0, 0.0, -1.5)).unwrap()
    );
    let inner = shapes.csg(CsgOp::Difference, a, b).unwrap();
    let c = shapes.add(
        Shape::cube().with_transform(Matrix4D::translation(0.0, 0.0, 3.0)).unwrap()
    );
    let outer = shapes.csg(CsgOp::Union, inner, c).unwrap();

    let r = Ray4D::new(Tuple4D::point(0.0, 0.0, -5.0), Tuple4D::vector(0.0, 0.0, 1.0));
    let xs = shapes.intersect(outer, &r);

    // Sphere front face is carved away by the cube: the solid starts at the
    // back of the cube (z = -0.5) and ends at the far side of the last cube.
    let hits: Vec<(f64, ShapeId)> = xs.iter().map(|i| (i.t, i.shape)).collect();
    assert_eq!(hits.len(), 4);
    assert!(crate::feq(hits[0].0, 4.5));
    assert_eq!(hits[0].1, b);
    assert!(crate::feq(hits[1].0, 6.0));
    assert_eq!(hits[1].1, a);
    assert!(crate::feq(hits[2].0, 7.0));
    assert_eq!(hits[2].1, c);
    assert!(crate::feq(hits[3].0, 9.0));
    assert_eq!(hits[3].1, c);
}

#[test]
fn solid_with_a_group_operand() {
    let mut shapes = Shapes::new();
    let g = shapes.add(Shape::group());
    let s1 = shapes.add(Shape::sphere());
    shapes.add_child(g, s1).unwrap();
    let s2 = shapes.add(
        Shape::sphere().with_transform(Matrix4D::translation(0.0, 0.0, 0.5)).unwrap()
    );
    let c = shapes.csg(CsgOp::Difference, g, s2).unwrap();

    let r = Ray4D::new(Tuple4D::point(0.0, 0.0, -5.0), Tuple4D::vector(0.0, 0.0, 1.0));
    let hits: Vec<(f64, ShapeId)> = shapes.intersect(c, &r).iter().map(|i| (i.t, i.shape)).collect();

    // Hits on the group's sphere count as left hits.
    assert_eq!(hits.len(), 2);
    assert!(crate::feq(hits[0].0, 4.0));
    assert_eq!(hits[0].1, s1);
    assert!(crate::feq(hits[1].0, 4.5));
    assert_eq!(hits[1].1, s2);
}
