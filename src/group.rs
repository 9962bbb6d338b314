use log::debug;

use crate::intersect::Intersections;
use crate::ray::Ray4D;
use crate::shape::{ Shape, ShapeId, ShapeType, Shapes };

impl Shapes {
    /// Intersects every child of a group, skipping them all when the ray
    /// misses the group's bounds.
    pub(crate) fn intersect_group(&self, id: ShapeId, children: &[ShapeId],
        ray: &Ray4D) -> Intersections {
        if children.is_empty() || !self.bounds(id).intersects(ray) {
            return Intersections::empty();
        }

        Intersections::aggregate(
            children.iter().map(|&c| self.intersect(c, ray)).collect()
        )
    }

    /// Builds a bounding volume hierarchy under `id`.
    ///
    /// Any group with at least `threshold` children has the children that
    /// fit wholly inside one half of its bounds moved into a new subgroup for
    /// that half. The process recurses into every child, including both
    /// operands of a solid. What a ray hits is unchanged.
    pub fn divide(&mut self, id: ShapeId, threshold: usize) {
        let operands = match *self[id].ty() {
            ShapeType::Csg(_, left, right) => Some((left, right)),
            _ => None,
        };
        if let Some((left, right)) = operands {
            self.divide(left, threshold);
            self.divide(right, threshold);
            return;
        }

        if !self[id].is_group() {
            return;
        }

        if self.children(id).len() >= threshold {
            self.split_group(id);
        }

        for child in self.children(id).to_vec() {
            self.divide(child, threshold);
        }
    }

    /// Sorts the children of a group into those inside the left half of its
    /// bounds, those inside the right half, and those straddling both.
    pub fn partition_children(&self, id: ShapeId)
        -> (Vec<ShapeId>, Vec<ShapeId>, Vec<ShapeId>) {
        let (left_box, right_box) = self.bounds(id).split();

        let mut left = Vec::new();
        let mut right = Vec::new();
        let mut straddling = Vec::new();

        for &child in self.children(id) {
            let b = self.parent_space_bounds(child);
            if left_box.contains_bounds(&b) {
                left.push(child);
            } else if right_box.contains_bounds(&b) {
                right.push(child);
            } else {
                straddling.push(child);
            }
        }

        (left, right, straddling)
    }

    fn split_group(&mut self, id: ShapeId) {
        let (left, right, straddling) = self.partition_children(id);

        // Moving everything into one subgroup would only add a level.
        let one_sided = straddling.is_empty()
            && (left.is_empty() || right.is_empty());
        if one_sided || (left.is_empty() && right.is_empty()) {
            debug!("group {} not split", id.index());
            return;
        }

        debug!("splitting group {}: {} left, {} right, {} kept",
               id.index(), left.len(), right.len(), straddling.len());

        self.set_children(id, straddling);
        for half in vec![left, right] {
            if !half.is_empty() {
                self.make_subgroup(id, half);
            }
        }
    }

    /// Moves `children` of `id` into a new identity-transform group, which is
    /// appended to `id`.
    fn make_subgroup(&mut self, id: ShapeId, children: Vec<ShapeId>) {
        let sub = self.add(Shape::group());
        for &child in &children {
            self.set_parent(child, sub);
        }
        self.set_children(sub, children);

        let mut siblings = self.children(id).to_vec();
        siblings.push(sub);
        self.set_children(id, siblings);
        self.set_parent(sub, id);
    }
}

#[cfg(test)]
use crate::bounds::Bounds;
#[cfg(test)]
use crate::csg::CsgOp;
#[cfg(test)]
use crate::matrix::Matrix4D;
#[cfg(test)]
use crate::tuple::Tuple4D;

#[cfg(test)]
fn sphere_at(shapes: &mut Shapes, x: f64, y: f64, z: f64) -> ShapeId {
    shapes.add(
        Shape::sphere().with_transform(Matrix4D::translation(x, y, z)).unwrap()
    )
}

#[cfg(test)]
fn hits(shapes: &Shapes, id: ShapeId, r: &Ray4D) -> Vec<(f64, ShapeId)> {
    shapes.intersect(id, r).iter().map(|i| (i.t, i.shape)).collect()
}

#[test]
fn intersecting_ray_with_empty_group() {
    let mut shapes = Shapes::new();
    let g = shapes.add(Shape::group());

    let r = Ray4D::new(Tuple4D::point(0.0, 0.0, 0.0), Tuple4D::vector(0.0, 0.0, 1.0));
    assert!(shapes.intersect(g, &r).is_empty());
}

#[test]
fn intersecting_ray_with_nonempty_group() {
    let mut shapes = Shapes::new();
    let g = shapes.add(Shape::group());
    let s1 = shapes.add(Shape::sphere());
    let s2 = sphere_at(&mut shapes, 0.0, 0.0, -3.0);
    let s3 = sphere_at(&mut shapes, 5.0, 0.0, 0.0);
    for &s in &[s1, s2, s3] {
        shapes.add_child(g, s).unwrap();
    }

    let r = Ray4D::new(Tuple4D::point(0.0, 0.0, -5.0), Tuple4D::vector(0.0, 0.0, 1.0));
    let xs = shapes.intersect(g, &r);

    assert_eq!(xs.len(), 4);
    assert_eq!(xs[0].shape, s2);
    assert_eq!(xs[1].shape, s2);
    assert_eq!(xs[2].shape, s1);
    assert_eq!(xs[3].shape, s1);
}

#[test]
fn intersecting_transformed_group() {
    let mut shapes = Shapes::new();
    let g = shapes.add(
        Shape::group().with_transform(Matrix4D::scaling(2.0, 2.0, 2.0)).unwrap()
    );
    let s = sphere_at(&mut shapes, 5.0, 0.0, 0.0);
    shapes.add_child(g, s).unwrap();

    let r = Ray4D::new(Tuple4D::point(10.0, 0.0, -10.0), Tuple4D::vector(0.0, 0.0, 1.0));
    assert_eq!(shapes.intersect(g, &r).len(), 2);
}

#[test]
fn group_bounds_contain_transformed_children() {
    let mut shapes = Shapes::new();
    let g = shapes.add(Shape::group());
    let s = shapes.add(
        Shape::sphere()
            .with_transform(
                Matrix4D::translation(2.0, 5.0, -3.0) * Matrix4D::scaling(2.0, 2.0, 2.0)
            )
            .unwrap()
    );
    let c = shapes.add(
        Shape::bounded_cylinder(-2.0, 2.0)
            .with_transform(
                Matrix4D::translation(-4.0, -1.0, 4.0) * Matrix4D::scaling(0.5, 1.0, 0.5)
            )
            .unwrap()
    );
    shapes.add_child(g, s).unwrap();
    shapes.add_child(g, c).unwrap();

    assert_eq!(shapes.bounds(g), Bounds::new(
        Tuple4D::point(-4.5, -3.0, -5.0),
        Tuple4D::point(4.0, 7.0, 4.5),
    ));
}

#[test]
fn partitioning_a_groups_children() {
    let mut shapes = Shapes::new();
    let g = shapes.add(Shape::group());
    let s1 = sphere_at(&mut shapes, -2.0, 0.0, 0.0);
    let s2 = sphere_at(&mut shapes, 2.0, 0.0, 0.0);
    let s3 = shapes.add(Shape::sphere());
    for &s in &[s1, s2, s3] {
        shapes.add_child(g, s).unwrap();
    }

    let (left, right, straddling) = shapes.partition_children(g);
    assert_eq!(left, vec![s1]);
    assert_eq!(right, vec![s2]);
    assert_eq!(straddling, vec![s3]);
}

#[test]
fn dividing_a_group_partitions_its_children() {
    let mut shapes = Shapes::new();
    let g = shapes.add(Shape::group());
    let s1 = sphere_at(&mut shapes, -2.0, -2.0, 0.0);
    let s2 = sphere_at(&mut shapes, -2.0, 2.0, 0.0);
    let s3 = shapes.add(
        Shape::sphere().with_transform(Matrix4D::scaling(4.0, 4.0, 4.0)).unwrap()
    );
    for &s in &[s1, s2, s3] {
        shapes.add_child(g, s).unwrap();
    }

    shapes.divide(g, 1);

    let children = shapes.children(g).to_vec();
    assert_eq!(children.len(), 2);
    assert_eq!(children[0], s3);

    let sub = children[1];
    assert_eq!(shapes[sub].parent(), Some(g));
    assert_eq!(shapes.children(sub).len(), 2);

    // The subgroup was divided too, one sphere per half.
    let grandchildren = shapes.children(sub).to_vec();
    assert_eq!(shapes.children(grandchildren[0]), &[s1]);
    assert_eq!(shapes.children(grandchildren[1]), &[s2]);
    assert_eq!(shapes[s1].parent(), Some(grandchildren[0]));
}

#[test]
fn dividing_below_threshold_does_nothing() {
    let mut shapes = Shapes::new();
    let g = shapes.add(Shape::group());
    let s1 = sphere_at(&mut shapes, -2.0, 0.0, 0.0);
    let s2 = sphere_at(&mut shapes, 2.0, 0.0, 0.0);
    shapes.add_child(g, s1).unwrap();
    shapes.add_child(g, s2).unwrap();

    shapes.divide(g, 3);
    assert_eq!(shapes.children(g), &[s1, s2]);
}

#[test]
fn dividing_preserves_every_hit() {
    let mut shapes = Shapes::new();
    let g = shapes.add(Shape::group());
    let mut spheres = Vec::new();
    for i in 0..8 {
        let x = -7.0 + 2.0 * i as f64;
        let s = sphere_at(&mut shapes, x, (i % 3) as f64, (i % 2) as f64);
        shapes.add_child(g, s).unwrap();
        spheres.push(s);
    }

    let rays = [
        Ray4D::new(Tuple4D::point(-10.0, 0.5, 0.5), Tuple4D::vector(1.0, 0.0, 0.0)),
        Ray4D::new(Tuple4D::point(-3.0, 0.0, -5.0), Tuple4D::vector(0.0, 0.0, 1.0)),
        Ray4D::new(Tuple4D::point(0.0, 10.0, 0.0), Tuple4D::vector(0.1, -1.0, 0.05)),
    ];
    let before: Vec<_> = rays.iter().map(|r| hits(&shapes, g, r)).collect();

    shapes.divide(g, 2);
    assert!(shapes.children(g).len() < spheres.len());
    for &s in &spheres {
        assert!(shapes.includes(g, s));
    }

    let after: Vec<_> = rays.iter().map(|r| hits(&shapes, g, r)).collect();
    assert_eq!(before, after);
}

#[test]
fn dividing_a_solid_divides_its_operands() {
    let mut shapes = Shapes::new();
    let left = shapes.add(Shape::group());
    let s1 = sphere_at(&mut shapes, -2.0, 0.0, 0.0);
    let s2 = sphere_at(&mut shapes, 2.0, 0.0, 0.0);
    shapes.add_child(left, s1).unwrap();
    shapes.add_child(left, s2).unwrap();

    let right = shapes.add(Shape::group());
    let s3 = sphere_at(&mut shapes, -2.0, 0.0, 0.0);
    let s4 = sphere_at(&mut shapes, 2.0, 0.0, 0.0);
    shapes.add_child(right, s3).unwrap();
    shapes.add_child(right, s4).unwrap();

    let c = shapes.csg(CsgOp::Difference, left, right).unwrap();
    shapes.divide(c, 1);

    assert_eq!(shapes.children(left).len(), 2);
    assert_eq!(shapes.children(shapes.children(left)[0]), &[s1]);
    assert_eq!(shapes.children(shapes.children(right)[1]), &[s4]);
}
