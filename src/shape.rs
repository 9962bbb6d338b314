use std::ops::{ Index, IndexMut };
use std::sync::OnceLock;

use crate::bounds::Bounds;
use crate::consts::FEQ_EPSILON;
use crate::csg::CsgOp;
use crate::error::{ Result, TracerError };
use crate::intersect::{ Intersection, Intersections };
use crate::light::Material;
use crate::matrix::Matrix4D;
use crate::ray::Ray4D;
use crate::tuple::Tuple4D;

/// A handle to a shape stored in a `Shapes` arena.
///
/// Handles are only ever produced by the arena that owns the shape, so a
/// handle taken from one arena should not be used with another.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShapeId(usize);

impl ShapeId {
    /// The position of the shape in its arena.
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Precomputed edges and face normal of a triangle.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TriangleInfo {
    pub p1: Tuple4D,
    pub p2: Tuple4D,
    pub p3: Tuple4D,
    pub e1: Tuple4D,
    pub e2: Tuple4D,
    pub normal: Tuple4D,
}

impl TriangleInfo {
    pub fn new(p1: Tuple4D, p2: Tuple4D, p3: Tuple4D) -> TriangleInfo {
        let e1 = p2 - p1;
        let e2 = p3 - p1;
        let normal = e2.cross(&e1).normalize();

        TriangleInfo { p1, p2, p3, e1, e2, normal }
    }
}

/// A triangle with a normal at each vertex, interpolated across the face.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SmoothTriangleInfo {
    pub triangle_info: TriangleInfo,
    pub n1: Tuple4D,
    pub n2: Tuple4D,
    pub n3: Tuple4D,
}

impl SmoothTriangleInfo {
    pub fn new(p1: Tuple4D, p2: Tuple4D, p3: Tuple4D,
        n1: Tuple4D, n2: Tuple4D, n3: Tuple4D) -> SmoothTriangleInfo {
        SmoothTriangleInfo {
            triangle_info: TriangleInfo::new(p1, p2, p3),
            n1,
            n2,
            n3,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ShapeType {
    /// A shape with no surface and no extent. Mostly for testing.
    Empty,

    /// A unit sphere with its center at the object-space origin.
    Sphere,

    /// The XZ plane.
    Plane,

    /// A cube spanning `-1..1` on every axis.
    Cube,

    /// A unit-radius cylinder around the Y axis.
    Cylinder { minimum: f64, maximum: f64, closed: bool },

    /// A double-napped cone around the Y axis.
    Cone { minimum: f64, maximum: f64, closed: bool },

    Triangle(TriangleInfo),
    SmoothTriangle(SmoothTriangleInfo),

    /// An ordered list of children, each owned by this group.
    Group(Vec<ShapeId>),

    /// A constructive solid: an operator and its left and right operands.
    Csg(CsgOp, ShapeId, ShapeId),
}

/// A single node of the scene graph.
///
/// Shapes are built detached, configured with a transform and material, and
/// then moved into a `Shapes` arena. Groups and solids are only ever
/// populated through the arena, which keeps the graph a tree.
#[derive(Debug)]
pub struct Shape {
    ty: ShapeType,
    pub material: Material,

    transform: Matrix4D,
    inverse: Matrix4D,
    inverse_transposed: Matrix4D,

    parent: Option<ShapeId>,
    bounds: OnceLock<Bounds>,
}

impl Default for Shape {
    fn default() -> Shape {
        Shape::with_type(ShapeType::Empty)
    }
}

impl Shape {
    fn with_type(ty: ShapeType) -> Shape {
        Shape {
            ty,
            material: Default::default(),
            transform: Matrix4D::identity(),
            inverse: Matrix4D::identity(),
            inverse_transposed: Matrix4D::identity(),
            parent: None,
            bounds: OnceLock::new(),
        }
    }

    pub fn empty() -> Shape {
        Shape::with_type(ShapeType::Empty)
    }

    /// Creates a unit sphere with identity transform and default material.
    pub fn sphere() -> Shape {
        Shape::with_type(ShapeType::Sphere)
    }

    /// A sphere made of glass, handy for refraction scenes.
    pub fn glass_sphere() -> Shape {
        let mut s = Shape::sphere();
        s.material.transparency = 1.0;
        s.material.refractive_index = crate::consts::GLASS_RI;
        s
    }

    pub fn plane() -> Shape {
        Shape::with_type(ShapeType::Plane)
    }

    pub fn cube() -> Shape {
        Shape::with_type(ShapeType::Cube)
    }

    /// Creates an infinitely long cylinder with no end caps.
    pub fn cylinder() -> Shape {
        Shape::bounded_cylinder(-std::f64::INFINITY, std::f64::INFINITY)
    }

    /// Creates a cylinder truncated at `minimum` and `maximum`, open at the
    /// ends.
    pub fn bounded_cylinder(minimum: f64, maximum: f64) -> Shape {
        Shape::with_type(ShapeType::Cylinder { minimum, maximum, closed: false })
    }

    pub fn capped_cylinder(minimum: f64, maximum: f64) -> Shape {
        Shape::with_type(ShapeType::Cylinder { minimum, maximum, closed: true })
    }

    /// Creates an infinite double-napped cone.
    pub fn cone() -> Shape {
        Shape::bounded_cone(-std::f64::INFINITY, std::f64::INFINITY)
    }

    pub fn bounded_cone(minimum: f64, maximum: f64) -> Shape {
        Shape::with_type(ShapeType::Cone { minimum, maximum, closed: false })
    }

    pub fn capped_cone(minimum: f64, maximum: f64) -> Shape {
        Shape::with_type(ShapeType::Cone { minimum, maximum, closed: true })
    }

    pub fn triangle(p1: Tuple4D, p2: Tuple4D, p3: Tuple4D) -> Shape {
        Shape::with_type(ShapeType::Triangle(TriangleInfo::new(p1, p2, p3)))
    }

    pub fn smooth_triangle(p1: Tuple4D, p2: Tuple4D, p3: Tuple4D,
        n1: Tuple4D, n2: Tuple4D, n3: Tuple4D) -> Shape {
        Shape::with_type(ShapeType::SmoothTriangle(
            SmoothTriangleInfo::new(p1, p2, p3, n1, n2, n3)
        ))
    }

    /// Creates an empty group. Children are added with `Shapes::add_child`.
    pub fn group() -> Shape {
        Shape::with_type(ShapeType::Group(Vec::new()))
    }

    /// Sets the transform, failing if it has no inverse.
    pub fn with_transform(mut self, transform: Matrix4D) -> Result<Shape> {
        self.set_transform(transform)?;
        Ok(self)
    }

    pub fn with_material(mut self, material: Material) -> Shape {
        self.material = material;
        self
    }

    /// Replaces the transform along with its cached inverse.
    ///
    /// On a shape that is already inside a group, use
    /// `Shapes::set_transform` so the ancestors' bounds are recomputed.
    pub fn set_transform(&mut self, transform: Matrix4D) -> Result<()> {
        let inverse = transform.inverse().ok_or_else(|| {
            TracerError::NonInvertible(format!("{}", transform))
        })?;

        self.transform = transform;
        self.inverse = inverse;
        self.inverse_transposed = inverse.transposition();
        Ok(())
    }

    pub fn ty(&self) -> &ShapeType {
        &self.ty
    }

    pub fn transform(&self) -> &Matrix4D {
        &self.transform
    }

    pub fn inverse(&self) -> &Matrix4D {
        &self.inverse
    }

    pub fn parent(&self) -> Option<ShapeId> {
        self.parent
    }

    pub fn is_group(&self) -> bool {
        matches!(self.ty, ShapeType::Group(_))
    }

    /// Object-space bounds of a primitive. Containers are handled by the
    /// arena, since their bounds depend on their children.
    fn primitive_bounds(&self) -> Bounds {
        let inf = std::f64::INFINITY;
        match self.ty {
            ShapeType::Empty => Bounds::empty(),
            ShapeType::Sphere | ShapeType::Cube => Bounds::new(
                Tuple4D::point(-1.0, -1.0, -1.0),
                Tuple4D::point(1.0, 1.0, 1.0),
            ),
            ShapeType::Plane => Bounds::new(
                Tuple4D::point(-inf, 0.0, -inf),
                Tuple4D::point(inf, 0.0, inf),
            ),
            ShapeType::Cylinder { minimum, maximum, .. } => Bounds::new(
                Tuple4D::point(-1.0, minimum, -1.0),
                Tuple4D::point(1.0, maximum, 1.0),
            ),
            ShapeType::Cone { minimum, maximum, .. } => {
                let r = minimum.abs().max(maximum.abs());
                Bounds::new(
                    Tuple4D::point(-r, minimum, -r),
                    Tuple4D::point(r, maximum, r),
                )
            },
            ShapeType::Triangle(ref ti) => Bounds::from_points(
                &[ti.p1, ti.p2, ti.p3]
            ),
            ShapeType::SmoothTriangle(ref sti) => {
                let ti = &sti.triangle_info;
                Bounds::from_points(&[ti.p1, ti.p2, ti.p3])
            },
            ShapeType::Group(_) | ShapeType::Csg(..) => unreachable!(
                "container bounds are computed by the arena"
            ),
        }
    }

    /// Intersects a ray, already in object space, with a primitive.
    fn intersect_primitive(&self, id: ShapeId, ray: &Ray4D) -> Intersections {
        match self.ty {
            ShapeType::Empty => Intersections::empty(),
            ShapeType::Sphere => intersect_sphere(id, ray),
            ShapeType::Plane => intersect_plane(id, ray),
            ShapeType::Cube => intersect_cube(id, ray),
            ShapeType::Cylinder { minimum, maximum, closed }
                => intersect_cylinder(id, ray, minimum, maximum, closed),
            ShapeType::Cone { minimum, maximum, closed }
                => intersect_cone(id, ray, minimum, maximum, closed),
            ShapeType::Triangle(ref ti) => {
                match intersect_triangle(ti, ray) {
                    Some((t, _, _)) => Intersections::new(
                        vec![Intersection::new(t, id)]
                    ),
                    None => Intersections::empty(),
                }
            },
            ShapeType::SmoothTriangle(ref sti) => {
                match intersect_triangle(&sti.triangle_info, ray) {
                    Some((t, u, v)) => Intersections::new(
                        vec![Intersection::with_uv(t, id, u, v)]
                    ),
                    None => Intersections::empty(),
                }
            },
            ShapeType::Group(_) | ShapeType::Csg(..) => unreachable!(
                "container intersections are computed by the arena"
            ),
        }
    }

    /// The object-space normal of a primitive at an object-space point.
    fn local_normal_at(&self, at: &Tuple4D, hit: &Intersection) -> Tuple4D {
        match self.ty {
            ShapeType::Empty | ShapeType::Sphere => Tuple4D { w: 0.0, ..*at },
            ShapeType::Plane => Tuple4D::vector(0.0, 1.0, 0.0),
            ShapeType::Cube => normal_at_cube(at),
            ShapeType::Cylinder { minimum, maximum, .. }
                => normal_at_cylinder(at, minimum, maximum),
            ShapeType::Cone { minimum, maximum, .. }
                => normal_at_cone(at, minimum, maximum),
            ShapeType::Triangle(ref ti) => ti.normal,
            ShapeType::SmoothTriangle(ref sti) => match hit.uv {
                Some((u, v)) => sti.n2 * u + sti.n3 * v + sti.n1 * (1.0 - u - v),
                None => sti.triangle_info.normal,
            },

            // Only primitives ever appear in an intersection list.
            ShapeType::Group(_) | ShapeType::Csg(..) => unreachable!(
                "normals are never computed on containers"
            ),
        }
    }
}

/// The scene graph: every shape of a world, addressed by `ShapeId`.
///
/// Parent links are handles back into the arena, so walking from a leaf to
/// the root never needs shared ownership.
#[derive(Debug, Default)]
pub struct Shapes {
    nodes: Vec<Shape>,
}

impl Index<ShapeId> for Shapes {
    type Output = Shape;

    fn index(&self, id: ShapeId) -> &Shape {
        &self.nodes[id.0]
    }
}

impl IndexMut<ShapeId> for Shapes {
    fn index_mut(&mut self, id: ShapeId) -> &mut Shape {
        &mut self.nodes[id.0]
    }
}

impl Shapes {
    pub fn new() -> Shapes {
        Shapes { nodes: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Moves a detached shape into the arena and returns its handle.
    pub fn add(&mut self, shape: Shape) -> ShapeId {
        self.nodes.push(shape);
        ShapeId(self.nodes.len() - 1)
    }

    pub fn get(&self, id: ShapeId) -> Option<&Shape> {
        self.nodes.get(id.0)
    }

    fn check(&self, id: ShapeId) -> Result<()> {
        if id.0 < self.nodes.len() {
            Ok(())
        } else {
            Err(TracerError::UnknownShape(id.0))
        }
    }

    /// Appends `child` to `group`, making `group` its parent.
    pub fn add_child(&mut self, group: ShapeId, child: ShapeId) -> Result<()> {
        self.check(group)?;
        self.check(child)?;

        if !self[group].is_group() {
            return Err(TracerError::NotAGroup(group.0));
        }
        if self[child].parent.is_some() {
            return Err(TracerError::AlreadyParented(child.0));
        }
        if child == group || self.includes(child, group) {
            return Err(TracerError::Cycle(child.0));
        }

        if let ShapeType::Group(ref mut children) = self.nodes[group.0].ty {
            children.push(child);
        }
        self.nodes[child.0].parent = Some(group);
        self.invalidate_bounds(group);
        Ok(())
    }

    /// Combines two detached shapes into a new solid and returns its handle.
    pub fn csg(&mut self, op: CsgOp, left: ShapeId, right: ShapeId)
        -> Result<ShapeId> {
        self.check(left)?;
        self.check(right)?;

        for &operand in &[left, right] {
            if self[operand].parent.is_some() {
                return Err(TracerError::AlreadyParented(operand.0));
            }
        }
        if left == right {
            return Err(TracerError::AlreadyParented(right.0));
        }

        let id = self.add(Shape::with_type(ShapeType::Csg(op, left, right)));
        self.nodes[left.0].parent = Some(id);
        self.nodes[right.0].parent = Some(id);
        Ok(id)
    }

    /// Replaces the transform of a shape that may already be in the graph,
    /// dropping any cached bounds that depended on the old one.
    pub fn set_transform(&mut self, id: ShapeId, transform: Matrix4D)
        -> Result<()> {
        self.check(id)?;
        self.nodes[id.0].set_transform(transform)?;
        if let Some(parent) = self.nodes[id.0].parent {
            self.invalidate_bounds(parent);
        }
        Ok(())
    }

    fn invalidate_bounds(&mut self, id: ShapeId) {
        let mut current = Some(id);
        while let Some(node) = current {
            self.nodes[node.0].bounds = OnceLock::new();
            current = self.nodes[node.0].parent;
        }
    }

    /// The children of a group, or an empty slice for any other shape.
    pub fn children(&self, id: ShapeId) -> &[ShapeId] {
        match self[id].ty {
            ShapeType::Group(ref children) => children,
            _ => &[],
        }
    }

    pub(crate) fn set_children(&mut self, id: ShapeId, children: Vec<ShapeId>) {
        if let ShapeType::Group(ref mut c) = self.nodes[id.0].ty {
            *c = children;
        }
    }

    pub(crate) fn set_parent(&mut self, id: ShapeId, parent: ShapeId) {
        self.nodes[id.0].parent = Some(parent);
    }

    /// Checks whether `other` is `id` itself or any shape beneath it.
    pub fn includes(&self, id: ShapeId, other: ShapeId) -> bool {
        if id == other {
            return true;
        }

        match self[id].ty {
            ShapeType::Group(ref children)
                => children.iter().any(|&c| self.includes(c, other)),
            ShapeType::Csg(_, left, right)
                => self.includes(left, other) || self.includes(right, other),
            _ => false,
        }
    }

    /// Object-space bounds, computed once per shape.
    pub fn bounds(&self, id: ShapeId) -> Bounds {
        *self[id].bounds.get_or_init(|| {
            match self[id].ty {
                ShapeType::Group(ref children) => children.iter()
                    .fold(Bounds::empty(), |b, &c| {
                        b.union(&self.parent_space_bounds(c))
                    }),
                ShapeType::Csg(_, left, right) => self.parent_space_bounds(left)
                    .union(&self.parent_space_bounds(right)),
                _ => self[id].primitive_bounds(),
            }
        })
    }

    /// Bounds of a shape expressed in its parent's space.
    pub fn parent_space_bounds(&self, id: ShapeId) -> Bounds {
        self.bounds(id).transform(&self[id].transform)
    }

    /// Intersects a world-space (or parent-space) ray with a shape.
    pub fn intersect(&self, id: ShapeId, ray: &Ray4D) -> Intersections {
        let local_ray = ray.transform(&self[id].inverse);
        self.local_intersect(id, &local_ray)
    }

    /// Intersects a ray already expressed in the shape's object space.
    pub fn local_intersect(&self, id: ShapeId, ray: &Ray4D) -> Intersections {
        match self[id].ty {
            ShapeType::Group(ref children)
                => self.intersect_group(id, children, ray),
            ShapeType::Csg(op, left, right)
                => self.intersect_csg(id, op, left, right, ray),
            _ => self[id].intersect_primitive(id, ray),
        }
    }

    /// Converts a world-space point into the object space of `id`, walking
    /// every ancestor on the way down.
    pub fn world_to_object(&self, id: ShapeId, point: Tuple4D) -> Tuple4D {
        let point = match self[id].parent {
            Some(parent) => self.world_to_object(parent, point),
            None => point,
        };

        self[id].inverse * point
    }

    /// Converts an object-space normal of `id` into world space.
    pub fn normal_to_world(&self, id: ShapeId, normal: Tuple4D) -> Tuple4D {
        let mut normal = self[id].inverse_transposed * normal;
        normal.w = 0.0;
        let normal = normal.normalize();

        match self[id].parent {
            Some(parent) => self.normal_to_world(parent, normal),
            None => normal,
        }
    }

    /// The world-space surface normal of a primitive at a world-space point.
    pub fn normal_at(&self, id: ShapeId, world_point: Tuple4D,
        hit: &Intersection) -> Tuple4D {
        let local_point = self.world_to_object(id, world_point);
        let local_normal = self[id].local_normal_at(&local_point, hit);
        self.normal_to_world(id, local_normal)
    }
}

fn intersect_sphere(id: ShapeId, ray: &Ray4D) -> Intersections {
    // Subtracting a point drops the w component.
    let sphere_to_ray = ray.origin - Tuple4D::point(0.0, 0.0, 0.0);

    let a = ray.direction.dot(&ray.direction);
    let b = 2.0 * ray.direction.dot(&sphere_to_ray);
    let c = sphere_to_ray.dot(&sphere_to_ray) - 1.0;

    let discriminant = b.powi(2) - (4.0 * a * c);
    if discriminant < 0.0 {
        return Intersections::empty();
    }

    let t1 = (-b - discriminant.sqrt()) / (2.0 * a);
    let t2 = (-b + discriminant.sqrt()) / (2.0 * a);

    Intersections::new(vec![
        Intersection::new(t1, id),
        Intersection::new(t2, id),
    ])
}

fn intersect_plane(id: ShapeId, ray: &Ray4D) -> Intersections {
    // Without a Y component the ray runs parallel to the plane.
    if ray.direction.y.abs() <= FEQ_EPSILON {
        return Intersections::empty();
    }

    let t = -ray.origin.y / ray.direction.y;
    Intersections::new(vec![Intersection::new(t, id)])
}

fn intersect_cube(id: ShapeId, ray: &Ray4D) -> Intersections {
    let (xtmin, xtmax) = check_cube_axis(ray.origin.x, ray.direction.x);
    let (ytmin, ytmax) = check_cube_axis(ray.origin.y, ray.direction.y);
    let (ztmin, ztmax) = check_cube_axis(ray.origin.z, ray.direction.z);

    let tmin = xtmin.max(ytmin).max(ztmin);
    let tmax = xtmax.min(ytmax).min(ztmax);

    if tmin > tmax {
        return Intersections::empty();
    }

    Intersections::new(vec![
        Intersection::new(tmin, id),
        Intersection::new(tmax, id),
    ])
}

/// Where a ray enters and leaves the `-1..1` slab of one cube axis, smaller
/// offset first.
fn check_cube_axis(origin: f64, direction: f64) -> (f64, f64) {
    let tmin_numerator = -1.0 - origin;
    let tmax_numerator = 1.0 - origin;

    let (tmin, tmax) = if direction.abs() >= FEQ_EPSILON {
        (tmin_numerator / direction, tmax_numerator / direction)
    } else {
        (tmin_numerator * std::f64::INFINITY,
         tmax_numerator * std::f64::INFINITY)
    };

    if tmin > tmax {
        (tmax, tmin)
    } else {
        (tmin, tmax)
    }
}

fn normal_at_cube(p: &Tuple4D) -> Tuple4D {
    let xa = p.x.abs();
    let ya = p.y.abs();
    let za = p.z.abs();

    let max_component = xa.max(ya).max(za);
    if max_component == xa {
        Tuple4D::vector(p.x, 0.0, 0.0)
    } else if max_component == ya {
        Tuple4D::vector(0.0, p.y, 0.0)
    } else {
        Tuple4D::vector(0.0, 0.0, p.z)
    }
}

/// Keeps the roots `t0` and `t1` whose Y lies strictly between the limits.
fn truncated(id: ShapeId, ray: &Ray4D, t0: f64, t1: f64,
    minimum: f64, maximum: f64, xs: &mut Vec<Intersection>) {
    for &t in &[t0, t1] {
        let y = ray.origin.y + t * ray.direction.y;
        if minimum < y && y < maximum {
            xs.push(Intersection::new(t, id));
        }
    }
}

fn intersect_cylinder(id: ShapeId, ray: &Ray4D,
    minimum: f64, maximum: f64, closed: bool) -> Intersections {
    let mut xs = Vec::new();
    let a = ray.direction.x.powi(2) + ray.direction.z.powi(2);

    // Parallel to the Y axis: only the caps can be hit.
    if a >= FEQ_EPSILON {
        let b = 2.0 * ray.origin.x * ray.direction.x
              + 2.0 * ray.origin.z * ray.direction.z;
        let c = ray.origin.x.powi(2) + ray.origin.z.powi(2) - 1.0;

        let disc = b.powi(2) - 4.0 * a * c;
        if disc < 0.0 {
            return Intersections::empty();
        }

        let t0 = (-b - disc.sqrt()) / (2.0 * a);
        let t1 = (-b + disc.sqrt()) / (2.0 * a);
        truncated(id, ray, t0, t1, minimum, maximum, &mut xs);
    }

    if closed {
        intersect_caps(id, ray, minimum, maximum, |_| 1.0, &mut xs);
    }

    Intersections::new(xs)
}

fn normal_at_cylinder(at: &Tuple4D, minimum: f64, maximum: f64) -> Tuple4D {
    let dist = at.x.powi(2) + at.z.powi(2);

    if dist < 1.0 && at.y >= maximum - FEQ_EPSILON {
        Tuple4D::vector(0.0, 1.0, 0.0)
    } else if dist < 1.0 && at.y <= minimum + FEQ_EPSILON {
        Tuple4D::vector(0.0, -1.0, 0.0)
    } else {
        Tuple4D::vector(at.x, 0.0, at.z)
    }
}

fn intersect_cone(id: ShapeId, ray: &Ray4D,
    minimum: f64, maximum: f64, closed: bool) -> Intersections {
    let mut xs = Vec::new();

    let a = ray.direction.x.powi(2)
          - ray.direction.y.powi(2)
          + ray.direction.z.powi(2);
    let b = 2.0 * ray.origin.x * ray.direction.x
          - 2.0 * ray.origin.y * ray.direction.y
          + 2.0 * ray.origin.z * ray.direction.z;
    let c = ray.origin.x.powi(2)
          - ray.origin.y.powi(2)
          + ray.origin.z.powi(2);

    if a.abs() < FEQ_EPSILON {
        // Parallel to one of the cone halves: at most a single wall hit.
        if b.abs() >= FEQ_EPSILON {
            let t = -c / (2.0 * b);
            truncated(id, ray, t, std::f64::NAN, minimum, maximum, &mut xs);
        }
    } else {
        let disc = b.powi(2) - 4.0 * a * c;
        if disc < 0.0 {
            return Intersections::empty();
        }

        let t0 = (-b - disc.sqrt()) / (2.0 * a);
        let t1 = (-b + disc.sqrt()) / (2.0 * a);
        truncated(id, ray, t0, t1, minimum, maximum, &mut xs);
    }

    if closed {
        intersect_caps(id, ray, minimum, maximum, f64::abs, &mut xs);
    }

    Intersections::new(xs)
}

fn normal_at_cone(at: &Tuple4D, minimum: f64, maximum: f64) -> Tuple4D {
    let dist = at.x.powi(2) + at.z.powi(2);

    if dist < maximum.powi(2) && at.y >= maximum - FEQ_EPSILON {
        Tuple4D::vector(0.0, 1.0, 0.0)
    } else if dist < minimum.powi(2) && at.y <= minimum + FEQ_EPSILON {
        Tuple4D::vector(0.0, -1.0, 0.0)
    } else {
        let mut y = dist.sqrt();
        if at.y > 0.0 {
            y = -y;
        }

        Tuple4D::vector(at.x, y, at.z)
    }
}

/// Adds hits on the end caps at `minimum` and `maximum`. `radius` gives the
/// cap radius at a given Y.
fn intersect_caps<F>(id: ShapeId, ray: &Ray4D, minimum: f64, maximum: f64,
    radius: F, xs: &mut Vec<Intersection>)
    where F: Fn(f64) -> f64 {
    if ray.direction.y.abs() < FEQ_EPSILON {
        return;
    }

    for &y in &[minimum, maximum] {
        let t = (y - ray.origin.y) / ray.direction.y;
        let x = ray.origin.x + t * ray.direction.x;
        let z = ray.origin.z + t * ray.direction.z;

        if x.powi(2) + z.powi(2) <= radius(y).powi(2) {
            xs.push(Intersection::new(t, id));
        }
    }
}

/// Moller-Trumbore. Returns the offset and barycentric `u`, `v` of the hit.
/// Triangles are hit from either side.
fn intersect_triangle(ti: &TriangleInfo, ray: &Ray4D)
    -> Option<(f64, f64, f64)> {
    let dir_cross_e2 = ray.direction.cross(&ti.e2);
    let determinant = ti.e1.dot(&dir_cross_e2);

    if determinant.abs() < FEQ_EPSILON {
        return None;
    }

    let f = 1.0 / determinant;
    let p1_to_origin = ray.origin - ti.p1;
    let u = f * p1_to_origin.dot(&dir_cross_e2);
    if u < 0.0 || u > 1.0 {
        return None;
    }

    let origin_cross_e1 = p1_to_origin.cross(&ti.e1);
    let v = f * ray.direction.dot(&origin_cross_e1);
    if v < 0.0 || u + v > 1.0 {
        return None;
    }

    Some((f * ti.e2.dot(&origin_cross_e1), u, v))
}

#[cfg(test)]
fn ray(origin: (f64, f64, f64), direction: (f64, f64, f64)) -> Ray4D {
    Ray4D::new(
        Tuple4D::point(origin.0, origin.1, origin.2),
        Tuple4D::vector(direction.0, direction.1, direction.2),
    )
}

#[cfg(test)]
fn ts(xs: &Intersections) -> Vec<f64> {
    xs.iter().map(|i| i.t).collect()
}

#[test]
fn ray_intersects_sphere_at_two_points() {
    let mut shapes = Shapes::new();
    let s = shapes.add(Shape::sphere());

    let xs = shapes.intersect(s, &ray((0.0, 0.0, -5.0), (0.0, 0.0, 1.0)));
    assert_eq!(ts(&xs), vec![4.0, 6.0]);
    assert_eq!(xs[0].shape, s);
}

#[test]
fn ray_is_tangent_to_sphere() {
    let mut shapes = Shapes::new();
    let s = shapes.add(Shape::sphere());

    let xs = shapes.intersect(s, &ray((0.0, 1.0, -5.0), (0.0, 0.0, 1.0)));
    assert_eq!(ts(&xs), vec![5.0, 5.0]);
}

#[test]
fn ray_is_inside_sphere() {
    let mut shapes = Shapes::new();
    let s = shapes.add(Shape::sphere());

    let xs = shapes.intersect(s, &ray((0.0, 0.0, 0.0), (0.0, 0.0, 1.0)));
    assert_eq!(ts(&xs), vec![-1.0, 1.0]);
}

#[test]
fn intersecting_scaled_sphere() {
    let mut shapes = Shapes::new();
    let s = shapes.add(
        Shape::sphere().with_transform(Matrix4D::scaling(2.0, 2.0, 2.0)).unwrap()
    );

    let xs = shapes.intersect(s, &ray((0.0, 0.0, -5.0), (0.0, 0.0, 1.0)));
    assert_eq!(ts(&xs), vec![3.0, 7.0]);
}

#[test]
fn singular_transform_is_rejected() {
    let result = Shape::sphere().with_transform(Matrix4D::scaling(0.0, 1.0, 1.0));

    match result {
        Err(TracerError::NonInvertible(_)) => (),
        other => panic!("expected a non-invertible error, got {:?}", other),
    }
}

#[test]
fn normal_on_transformed_sphere() {
    let mut shapes = Shapes::new();
    let transform = Matrix4D::scaling(1.0, 0.5, 1.0)
        * Matrix4D::rotation_z(std::f64::consts::PI / 5.0);
    let s = shapes.add(Shape::sphere().with_transform(transform).unwrap());

    let r2 = 2.0f64.sqrt() / 2.0;
    let n = shapes.normal_at(
        s,
        Tuple4D::point(0.0, r2, -r2),
        &Intersection::new(0.0, s),
    );
    assert_eq!(n, Tuple4D::vector(0.0, 0.97014, -0.24254));
}

#[test]
fn ray_intersecting_plane() {
    let mut shapes = Shapes::new();
    let p = shapes.add(Shape::plane());

    let parallel = shapes.intersect(p, &ray((0.0, 10.0, 0.0), (0.0, 0.0, 1.0)));
    assert!(parallel.is_empty());

    let above = shapes.intersect(p, &ray((0.0, 1.0, 0.0), (0.0, -1.0, 0.0)));
    assert_eq!(ts(&above), vec![1.0]);

    let below = shapes.intersect(p, &ray((0.0, -1.0, 0.0), (0.0, 1.0, 0.0)));
    assert_eq!(ts(&below), vec![1.0]);
}

#[test]
fn ray_intersects_cube() {
    let mut shapes = Shapes::new();
    let c = shapes.add(Shape::cube());

    let cases = [
        ((5.0, 0.5, 0.0), (-1.0, 0.0, 0.0), 4.0, 6.0),
        ((-5.0, 0.5, 0.0), (1.0, 0.0, 0.0), 4.0, 6.0),
        ((0.5, 5.0, 0.0), (0.0, -1.0, 0.0), 4.0, 6.0),
        ((0.5, 0.0, -5.0), (0.0, 0.0, 1.0), 4.0, 6.0),
        ((0.0, 0.5, 0.0), (0.0, 0.0, 1.0), -1.0, 1.0),
    ];

    for &(origin, direction, t1, t2) in cases.iter() {
        let xs = shapes.intersect(c, &ray(origin, direction));
        assert_eq!(ts(&xs), vec![t1, t2]);
    }

    let miss = shapes.intersect(c, &ray((-2.0, 0.0, 0.0), (0.2673, 0.5345, 0.8018)));
    assert!(miss.is_empty());
}

#[test]
fn normal_on_cube() {
    let s = Shape::cube();
    let i = Intersection::new(0.0, ShapeId(0));

    assert_eq!(s.local_normal_at(&Tuple4D::point(1.0, 0.5, -0.8), &i),
               Tuple4D::vector(1.0, 0.0, 0.0));
    assert_eq!(s.local_normal_at(&Tuple4D::point(-0.4, 0.3, -1.0), &i),
               Tuple4D::vector(0.0, 0.0, -1.0));
    assert_eq!(s.local_normal_at(&Tuple4D::point(1.0, 1.0, 1.0), &i),
               Tuple4D::vector(1.0, 0.0, 0.0));
}

#[test]
fn ray_strikes_cylinder() {
    let mut shapes = Shapes::new();
    let c = shapes.add(Shape::cylinder());

    let xs = shapes.intersect(c, &ray((1.0, 0.0, -5.0), (0.0, 0.0, 1.0)));
    assert_eq!(ts(&xs), vec![5.0, 5.0]);

    let xs = shapes.intersect(c, &ray((0.0, 0.0, -5.0), (0.0, 0.0, 1.0)));
    assert_eq!(ts(&xs), vec![4.0, 6.0]);

    let direction = Tuple4D::vector(0.1, 1.0, 1.0).normalize();
    let xs = shapes.intersect(c, &Ray4D::new(
        Tuple4D::point(0.5, 0.0, -5.0), direction,
    ));
    assert!(crate::feq(xs[0].t, 6.80798));
    assert!(crate::feq(xs[1].t, 7.08872));

    let miss = shapes.intersect(c, &ray((0.0, 0.0, 0.0), (0.0, 1.0, 0.0)));
    assert!(miss.is_empty());
}

#[test]
fn intersecting_truncated_and_capped_cylinders() {
    let mut shapes = Shapes::new();
    let open = shapes.add(Shape::bounded_cylinder(1.0, 2.0));
    let capped = shapes.add(Shape::capped_cylinder(1.0, 2.0));

    let diagonal = Tuple4D::vector(0.0, 1.0, 0.1).normalize();
    let xs = shapes.intersect(open, &Ray4D::new(Tuple4D::point(0.0, 1.5, 0.0), diagonal));
    assert!(xs.is_empty());

    let xs = shapes.intersect(open, &ray((0.0, 1.5, -2.0), (0.0, 0.0, 1.0)));
    assert_eq!(xs.len(), 2);

    let xs = shapes.intersect(capped, &ray((0.0, 3.0, 0.0), (0.0, -1.0, 0.0)));
    assert_eq!(ts(&xs), vec![1.0, 2.0]);

    let down = Tuple4D::vector(0.0, -1.0, 2.0).normalize();
    let xs = shapes.intersect(capped, &Ray4D::new(Tuple4D::point(0.0, 3.0, -2.0), down));
    assert_eq!(xs.len(), 2);
}

#[test]
fn normal_on_cylinder_caps() {
    let s = Shape::capped_cylinder(1.0, 2.0);
    let i = Intersection::new(0.0, ShapeId(0));

    assert_eq!(s.local_normal_at(&Tuple4D::point(0.5, 1.0, 0.0), &i),
               Tuple4D::vector(0.0, -1.0, 0.0));
    assert_eq!(s.local_normal_at(&Tuple4D::point(0.0, 2.0, 0.5), &i),
               Tuple4D::vector(0.0, 1.0, 0.0));
    assert_eq!(s.local_normal_at(&Tuple4D::point(-1.0, 1.5, 0.0), &i),
               Tuple4D::vector(-1.0, 0.0, 0.0));
}

#[test]
fn ray_intersects_cone() {
    let mut shapes = Shapes::new();
    let c = shapes.add(Shape::cone());

    let xs = shapes.intersect(c, &ray((0.0, 0.0, -5.0), (0.0, 0.0, 1.0)));
    assert_eq!(ts(&xs), vec![5.0, 5.0]);

    let xs = shapes.intersect(c, &Ray4D::new(
        Tuple4D::point(0.0, 0.0, -5.0),
        Tuple4D::vector(1.0, 1.0, 1.0).normalize(),
    ));
    assert!(crate::feq(xs[0].t, 8.66025));
    assert!(crate::feq(xs[1].t, 8.66025));

    let xs = shapes.intersect(c, &Ray4D::new(
        Tuple4D::point(1.0, 1.0, -5.0),
        Tuple4D::vector(-0.5, -1.0, 1.0).normalize(),
    ));
    assert!(crate::feq(xs[0].t, 4.55006));
    assert!(crate::feq(xs[1].t, 49.44994));
}

#[test]
fn ray_parallel_to_cone_half() {
    let mut shapes = Shapes::new();
    let c = shapes.add(Shape::cone());

    let xs = shapes.intersect(c, &Ray4D::new(
        Tuple4D::point(0.0, 0.0, -1.0),
        Tuple4D::vector(0.0, 1.0, 1.0).normalize(),
    ));
    assert_eq!(xs.len(), 1);
    assert!(crate::feq(xs[0].t, 0.35355));
}

#[test]
fn intersecting_cone_caps() {
    let mut shapes = Shapes::new();
    let c = shapes.add(Shape::capped_cone(-0.5, 0.5));

    let xs = shapes.intersect(c, &ray((0.0, 0.0, -5.0), (0.0, 1.0, 0.0)));
    assert_eq!(xs.len(), 0);

    let xs = shapes.intersect(c, &Ray4D::new(
        Tuple4D::point(0.0, 0.0, -0.25),
        Tuple4D::vector(0.0, 1.0, 1.0).normalize(),
    ));
    assert_eq!(xs.len(), 2);

    let xs = shapes.intersect(c, &ray((0.0, 0.0, -0.25), (0.0, 1.0, 0.0)));
    assert_eq!(xs.len(), 4);
}

#[test]
fn normal_on_cone() {
    let s = Shape::cone();
    let i = Intersection::new(0.0, ShapeId(0));

    assert_eq!(s.local_normal_at(&Tuple4D::point(1.0, 1.0, 1.0), &i),
               Tuple4D::vector(1.0, -(2.0f64.sqrt()), 1.0));
    assert_eq!(s.local_normal_at(&Tuple4D::point(-1.0, -1.0, 0.0), &i),
               Tuple4D::vector(-1.0, 1.0, 0.0));
}

#[test]
fn constructing_a_triangle() {
    let ti = TriangleInfo::new(
        Tuple4D::point(0.0, 1.0, 0.0),
        Tuple4D::point(-1.0, 0.0, 0.0),
        Tuple4D::point(1.0, 0.0, 0.0),
    );

    assert_eq!(ti.e1, Tuple4D::vector(-1.0, -1.0, 0.0));
    assert_eq!(ti.e2, Tuple4D::vector(1.0, -1.0, 0.0));
    assert_eq!(ti.normal, Tuple4D::vector(0.0, 0.0, -1.0));
}

#[test]
fn ray_against_triangle() {
    let mut shapes = Shapes::new();
    let t = shapes.add(Shape::triangle(
        Tuple4D::point(0.0, 1.0, 0.0),
        Tuple4D::point(-1.0, 0.0, 0.0),
        Tuple4D::point(1.0, 0.0, 0.0),
    ));

    let parallel = shapes.intersect(t, &ray((0.0, -1.0, -2.0), (0.0, 1.0, 0.0)));
    assert!(parallel.is_empty());

    let p1_p3 = shapes.intersect(t, &ray((1.0, 1.0, -2.0), (0.0, 0.0, 1.0)));
    assert!(p1_p3.is_empty());

    let p1_p2 = shapes.intersect(t, &ray((-1.0, 1.0, -2.0), (0.0, 0.0, 1.0)));
    assert!(p1_p2.is_empty());

    let p2_p3 = shapes.intersect(t, &ray((0.0, -1.0, -2.0), (0.0, 0.0, 1.0)));
    assert!(p2_p3.is_empty());

    let strike = shapes.intersect(t, &ray((0.0, 0.5, -2.0), (0.0, 0.0, 1.0)));
    assert_eq!(ts(&strike), vec![2.0]);
}

#[test]
fn smooth_triangle_interpolates_normal() {
    let mut shapes = Shapes::new();
    let t = shapes.add(Shape::smooth_triangle(
        Tuple4D::point(0.0, 1.0, 0.0),
        Tuple4D::point(-1.0, 0.0, 0.0),
        Tuple4D::point(1.0, 0.0, 0.0),
        Tuple4D::vector(0.0, 1.0, 0.0),
        Tuple4D::vector(-1.0, 0.0, 0.0),
        Tuple4D::vector(1.0, 0.0, 0.0),
    ));

    let xs = shapes.intersect(t, &ray((-0.2, 0.3, -2.0), (0.0, 0.0, 1.0)));
    let (u, v) = xs[0].uv.unwrap();
    assert!(crate::feq(u, 0.45));
    assert!(crate::feq(v, 0.25));

    let hit = Intersection::with_uv(1.0, t, 0.45, 0.25);
    let n = shapes.normal_at(t, Tuple4D::point(0.0, 0.0, 0.0), &hit);
    assert_eq!(n, Tuple4D::vector(-0.5547, 0.83205, 0.0));
}

#[cfg(test)]
fn nested_sphere() -> (Shapes, ShapeId) {
    let mut shapes = Shapes::new();
    let g1 = shapes.add(
        Shape::group()
            .with_transform(Matrix4D::rotation_y(std::f64::consts::PI / 2.0))
            .unwrap()
    );
    let g2 = shapes.add(
        Shape::group().with_transform(Matrix4D::scaling(1.0, 2.0, 3.0)).unwrap()
    );
    let s = shapes.add(
        Shape::sphere().with_transform(Matrix4D::translation(5.0, 0.0, 0.0)).unwrap()
    );

    shapes.add_child(g1, g2).unwrap();
    shapes.add_child(g2, s).unwrap();
    (shapes, s)
}

#[test]
fn converting_point_from_world_to_object_space() {
    let mut shapes = Shapes::new();
    let g1 = shapes.add(
        Shape::group()
            .with_transform(Matrix4D::rotation_y(std::f64::consts::PI / 2.0))
            .unwrap()
    );
    let g2 = shapes.add(
        Shape::group().with_transform(Matrix4D::scaling(2.0, 2.0, 2.0)).unwrap()
    );
    let s = shapes.add(
        Shape::sphere().with_transform(Matrix4D::translation(5.0, 0.0, 0.0)).unwrap()
    );
    shapes.add_child(g1, g2).unwrap();
    shapes.add_child(g2, s).unwrap();

    let p = shapes.world_to_object(s, Tuple4D::point(-2.0, 0.0, -10.0));
    assert_eq!(p, Tuple4D::point(0.0, 0.0, -1.0));
}

#[test]
fn converting_normal_from_object_to_world_space() {
    let (shapes, s) = nested_sphere();

    let r3 = 3.0f64.sqrt() / 3.0;
    let n = shapes.normal_to_world(s, Tuple4D::vector(r3, r3, r3));
    assert_eq!(n, Tuple4D::vector(0.2857, 0.4286, -0.8571));
}

#[test]
fn finding_normal_on_child_object() {
    let (shapes, s) = nested_sphere();

    let n = shapes.normal_at(
        s,
        Tuple4D::point(1.7321, 1.1547, -5.5774),
        &Intersection::new(0.0, s),
    );
    assert_eq!(n, Tuple4D::vector(0.2857, 0.4286, -0.8571));
}

#[test]
fn adding_children_enforces_a_tree() {
    let mut shapes = Shapes::new();
    let g1 = shapes.add(Shape::group());
    let g2 = shapes.add(Shape::group());
    let s = shapes.add(Shape::sphere());

    shapes.add_child(g1, s).unwrap();
    assert_eq!(shapes.children(g1), &[s]);
    assert_eq!(shapes[s].parent(), Some(g1));

    assert!(matches!(shapes.add_child(g2, s), Err(TracerError::AlreadyParented(_))));
    assert!(matches!(shapes.add_child(s, g2), Err(TracerError::NotAGroup(_))));
    assert!(matches!(shapes.add_child(g1, g1), Err(TracerError::Cycle(_))));

    shapes.add_child(g2, g1).unwrap();
    assert!(matches!(shapes.add_child(g1, g2), Err(TracerError::AlreadyParented(_))));
    assert!(shapes.includes(g2, s));
    assert!(!shapes.includes(g1, g2));
}

#[test]
fn primitive_bounds() {
    let mut shapes = Shapes::new();
    let cone = shapes.add(Shape::bounded_cone(-5.0, 3.0));
    let cylinder = shapes.add(Shape::bounded_cylinder(-5.0, 3.0));
    let plane = shapes.add(Shape::plane());

    assert_eq!(shapes.bounds(cone), Bounds::new(
        Tuple4D::point(-5.0, -5.0, -5.0), Tuple4D::point(5.0, 3.0, 5.0)
    ));
    assert_eq!(shapes.bounds(cylinder), Bounds::new(
        Tuple4D::point(-1.0, -5.0, -1.0), Tuple4D::point(1.0, 3.0, 1.0)
    ));

    let b = shapes.bounds(plane);
    assert!(b.min.x.is_infinite() && b.max.z.is_infinite());
    assert_eq!(b.min.y, 0.0);
}

#[test]
fn parent_space_bounds_apply_the_transform() {
    let mut shapes = Shapes::new();
    let s = shapes.add(
        Shape::sphere()
            .with_transform(
                Matrix4D::translation(1.0, -3.0, 5.0) * Matrix4D::scaling(0.5, 2.0, 4.0)
            )
            .unwrap()
    );

    assert_eq!(shapes.parent_space_bounds(s), Bounds::new(
        Tuple4D::point(0.5, -5.0, 1.0), Tuple4D::point(1.5, -1.0, 9.0)
    ));
}

#[test]
fn bounds_are_recomputed_after_transform_change() {
    let mut shapes = Shapes::new();
    let g = shapes.add(Shape::group());
    let s = shapes.add(Shape::sphere());
    shapes.add_child(g, s).unwrap();

    assert_eq!(shapes.bounds(g).max, Tuple4D::point(1.0, 1.0, 1.0));

    shapes.set_transform(s, Matrix4D::translation(2.0, 0.0, 0.0)).unwrap();
    assert_eq!(shapes.bounds(g).max, Tuple4D::point(3.0, 1.0, 1.0));
}
