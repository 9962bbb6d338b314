use log::info;

use crate::color::Color;
use crate::intersect::{ Intersections, IntersectionComputation };
use crate::light::{ PointLight, lighting };
use crate::matrix::Matrix4D;
use crate::ray::Ray4D;
use crate::shape::{ Shape, ShapeId, Shapes };
use crate::tuple::Tuple4D;

/// A world with objects and lights.
///
/// Every shape lives in the `shapes` arena; `objects` lists the roots of the
/// scene graph, which are the only shapes rays are cast against directly.
/// Most logic is performed within worlds for the ray tracer.
#[derive(Debug)]
pub struct World {
    pub shapes: Shapes,
    pub objects: Vec<ShapeId>,
    pub lights: Vec<PointLight>,
}

impl Default for World {
    fn default() -> World {
        World::new()
    }
}

impl World {
    /// Creates the default world: two concentric spheres lit from the upper
    /// left.
    pub fn new() -> World {
        let mut w = World::empty();
        w.lights.push(PointLight::new(
            Color::rgb(1.0, 1.0, 1.0),
            Tuple4D::point(-10.0, 10.0, -10.0)
        ));

        let mut s1 = Shape::sphere();
        s1.material.color = Color::rgb(0.8, 1.0, 0.6);
        s1.material.diffuse = 0.7;
        s1.material.specular = 0.2;
        w.add_object(s1);

        let s2 = Shape::sphere()
            .with_transform(Matrix4D::scaling(0.5, 0.5, 0.5))
            .expect("uniform scaling is invertible");
        w.add_object(s2);

        w
    }

    /// Creates an empty world with no objects and no lights.
    pub fn empty() -> World {
        World {
            shapes: Shapes::new(),
            objects: Vec::new(),
            lights: Vec::new(),
        }
    }

    /// Adds a shape to the arena as a new top-level object.
    pub fn add_object(&mut self, shape: Shape) -> ShapeId {
        let id = self.shapes.add(shape);
        self.objects.push(id);
        id
    }

    /// Builds a bounding volume hierarchy under every top-level object.
    pub fn divide(&mut self, threshold: usize) {
        let before = self.shapes.len();
        for &object in &self.objects {
            self.shapes.divide(object, threshold);
        }

        info!("divided scene with threshold {}: {} subgroups added",
              threshold, self.shapes.len() - before);
    }

    /// Intersects a ray against all objects in a world.
    pub fn intersect(&self, r: &Ray4D) -> Intersections {
        Intersections::aggregate(
            self.objects.iter().map(|&o| self.shapes.intersect(o, r)).collect()
        )
    }

    /// Checks whether anything lies between `point` and a light at
    /// `light_position`.
    pub fn is_shadowed(&self, light_position: Tuple4D, point: Tuple4D) -> bool {
        let v = light_position - point;
        let distance = v.magnitude();

        let r = Ray4D::new(point, v.normalize());
        match self.intersect(&r).hit() {
            Some(i) => i.t < distance,
            None => false,
        }
    }

    /// Calculates the color for a hit from every light, plus whatever is
    /// reflected and refracted there.
    ///
    /// `remaining` bounds how many more bounces secondary rays may take.
    pub fn shade_hit(&self, comps: &IntersectionComputation, remaining: usize)
        -> Color {
        let material = &self.shapes[comps.shape].material;

        let mut surface = Color::black();
        for light in &self.lights {
            let in_shadow = self.is_shadowed(light.position, comps.over_point);
            surface += lighting(material, &self.shapes, comps.shape, light,
                comps.over_point, comps.eyev, comps.normalv, in_shadow);
        }

        let reflected = self.reflected_color(comps, remaining);
        let refracted = self.refracted_color(comps, remaining);

        if material.reflective > 0.0 && material.transparency > 0.0 {
            let reflectance = comps.schlick();
            surface + reflected * reflectance + refracted * (1.0 - reflectance)
        } else {
            surface + reflected + refracted
        }
    }

    /// The color seen along the reflection of the incoming ray.
    pub fn reflected_color(&self, comps: &IntersectionComputation,
        remaining: usize) -> Color {
        let reflective = self.shapes[comps.shape].material.reflective;
        if remaining < 1 || reflective == 0.0 {
            return Color::black();
        }

        let r = Ray4D::new(comps.over_point, comps.reflectv);
        self.color_at(&r, remaining - 1) * reflective
    }

    /// The color seen through a transparent surface, bent by Snell's law.
    pub fn refracted_color(&self, comps: &IntersectionComputation,
        remaining: usize) -> Color {
        let transparency = self.shapes[comps.shape].material.transparency;
        if remaining < 1 || transparency == 0.0 {
            return Color::black();
        }

        let n_ratio = comps.n1 / comps.n2;
        let cos_i = comps.eyev.dot(&comps.normalv);
        let sin2_t = n_ratio.powi(2) * (1.0 - cos_i.powi(2));

        // Total internal reflection.
        if sin2_t > 1.0 {
            return Color::black();
        }

        let cos_t = (1.0 - sin2_t).sqrt();
        let direction = comps.normalv * (n_ratio * cos_i - cos_t)
            - comps.eyev * n_ratio;

        let r = Ray4D::new(comps.under_point, direction);
        self.color_at(&r, remaining - 1) * transparency
    }

    /// Determines the color seen along a ray, black if nothing is hit.
    pub fn color_at(&self, r: &Ray4D, remaining: usize) -> Color {
        let xs = self.intersect(r);

        match xs.hit() {
            None => Color::black(),
            Some(i) => {
                let comps = IntersectionComputation::new(r, &i, &xs, &self.shapes);
                self.shade_hit(&comps, remaining)
            },
        }
    }
}

#[cfg(test)]
use crate::consts::RECURSION_DEPTH;
#[cfg(test)]
use crate::intersect::Intersection;
#[cfg(test)]
use crate::pattern::{ Pattern, PatternKind };

#[cfg(test)]
fn ray(origin: Tuple4D, direction: Tuple4D) -> Ray4D {
    Ray4D::new(origin, direction)
}

#[cfg(test)]
fn comps_for(w: &World, r: &Ray4D, xs: &Intersections, i: usize)
    -> IntersectionComputation {
    IntersectionComputation::new(r, &xs[i], xs, &w.shapes)
}

#[test]
fn intersect_default_world_with_ray() {
    let w = World::new();
    let r = ray(Tuple4D::point(0.0, 0.0, -5.0), Tuple4D::vector(0.0, 0.0, 1.0));

    let ts: Vec<f64> = w.intersect(&r).iter().map(|i| i.t).collect();
    assert_eq!(ts, vec![4.0, 4.5, 5.5, 6.0]);
}

#[test]
fn shade_intersection_from_outside() {
    let w = World::new();
    let r = ray(Tuple4D::point(0.0, 0.0, -5.0), Tuple4D::vector(0.0, 0.0, 1.0));

    let xs = Intersections::new(vec![Intersection::new(4.0, w.objects[0])]);
    let c = w.shade_hit(&comps_for(&w, &r, &xs, 0), RECURSION_DEPTH);

    assert_eq!(c, Color::rgb(0.38066, 0.47583, 0.2855));
}

#[test]
fn shade_intersection_from_inside() {
    let mut w = World::new();
    w.lights = vec![PointLight::new(Color::white(), Tuple4D::point(0.0, 0.25, 0.0))];
    let r = ray(Tuple4D::point(0.0, 0.0, 0.0), Tuple4D::vector(0.0, 0.0, 1.0));

    let xs = Intersections::new(vec![Intersection::new(0.5, w.objects[1])]);
    let c = w.shade_hit(&comps_for(&w, &r, &xs, 0), RECURSION_DEPTH);

    assert_eq!(c, Color::rgb(0.90498, 0.90498, 0.90498));
}

#[test]
fn shade_intersection_in_shadow() {
    let mut w = World::empty();
    w.lights.push(PointLight::new(Color::white(), Tuple4D::point(0.0, 0.0, -10.0)));
    w.add_object(Shape::sphere());
    let s2 = w.add_object(
        Shape::sphere().with_transform(Matrix4D::translation(0.0, 0.0, 10.0)).unwrap()
    );

    let r = ray(Tuple4D::point(0.0, 0.0, 5.0), Tuple4D::vector(0.0, 0.0, 1.0));
    let xs = Intersections::new(vec![Intersection::new(4.0, s2)]);
    let c = w.shade_hit(&comps_for(&w, &r, &xs, 0), RECURSION_DEPTH);

    assert_eq!(c, Color::rgb(0.1, 0.1, 0.1));
}

#[test]
fn every_light_contributes() {
    let mut w = World::new();
    let r = ray(Tuple4D::point(0.0, 0.0, -5.0), Tuple4D::vector(0.0, 0.0, 1.0));
    let one = w.color_at(&r, RECURSION_DEPTH);

    w.lights.push(w.lights[0]);
    let two = w.color_at(&r, RECURSION_DEPTH);

    assert_eq!(two, one * 2.0);
}

#[test]
fn color_ray_miss_and_hit() {
    let w = World::new();

    let miss = ray(Tuple4D::point(0.0, 0.0, -5.0), Tuple4D::vector(0.0, 1.0, 0.0));
    assert_eq!(w.color_at(&miss, RECURSION_DEPTH), Color::black());

    let hit = ray(Tuple4D::point(0.0, 0.0, -5.0), Tuple4D::vector(0.0, 0.0, 1.0));
    assert_eq!(w.color_at(&hit, RECURSION_DEPTH), Color::rgb(0.38066, 0.47583, 0.2855));
}

#[test]
fn color_behind_ray() {
    let mut w = World::new();
    let (outer, inner) = (w.objects[0], w.objects[1]);
    w.shapes[outer].material.ambient = 1.0;
    w.shapes[inner].material.ambient = 1.0;

    let r = ray(Tuple4D::point(0.0, 0.0, 0.75), Tuple4D::vector(0.0, 0.0, -1.0));
    assert_eq!(w.color_at(&r, RECURSION_DEPTH), w.shapes[inner].material.color);
}

#[test]
fn shadows_in_default_world() {
    let w = World::new();
    let light = w.lights[0].position;

    assert!(!w.is_shadowed(light, Tuple4D::point(0.0, 10.0, 0.0)));
    assert!(w.is_shadowed(light, Tuple4D::point(10.0, -10.0, 10.0)));
    assert!(!w.is_shadowed(light, Tuple4D::point(-20.0, 20.0, -20.0)));
    assert!(!w.is_shadowed(light, Tuple4D::point(-2.0, 2.0, -2.0)));
}

#[test]
fn reflected_color_for_nonreflective_material() {
    let mut w = World::new();
    let inner = w.objects[1];
    w.shapes[inner].material.ambient = 1.0;

    let r = ray(Tuple4D::point(0.0, 0.0, 0.0), Tuple4D::vector(0.0, 0.0, 1.0));
    let xs = Intersections::new(vec![Intersection::new(1.0, inner)]);

    assert_eq!(w.reflected_color(&comps_for(&w, &r, &xs, 0), RECURSION_DEPTH),
               Color::black());
}

#[cfg(test)]
fn world_with_reflective_plane() -> (World, ShapeId) {
    let mut w = World::new();
    let mut plane = Shape::plane()
        .with_transform(Matrix4D::translation(0.0, -1.0, 0.0))
        .unwrap();
    plane.material.reflective = 0.5;
    let p = w.add_object(plane);
    (w, p)
}

#[test]
fn reflected_color_for_reflective_material() {
    let (w, p) = world_with_reflective_plane();
    let r2 = 2.0f64.sqrt() / 2.0;
    let r = ray(Tuple4D::point(0.0, 0.0, -3.0), Tuple4D::vector(0.0, -r2, r2));
    let xs = Intersections::new(vec![Intersection::new(2.0f64.sqrt(), p)]);
    let comps = comps_for(&w, &r, &xs, 0);

    assert!(w.reflected_color(&comps, RECURSION_DEPTH)
        .within(&Color::rgb(0.19032, 0.2379, 0.14274), 0.0005));
    assert!(w.shade_hit(&comps, RECURSION_DEPTH)
        .within(&Color::rgb(0.87677, 0.92436, 0.82918), 0.0005));

    // Out of bounces: nothing is reflected.
    assert_eq!(w.reflected_color(&comps, 0), Color::black());
}

#[test]
fn mutually_reflective_surfaces_terminate() {
    let mut w = World::empty();
    w.lights.push(PointLight::new(Color::white(), Tuple4D::point(0.0, 0.0, 0.0)));

    let mut lower = Shape::plane()
        .with_transform(Matrix4D::translation(0.0, -1.0, 0.0))
        .unwrap();
    lower.material.reflective = 1.0;
    w.add_object(lower);

    let mut upper = Shape::plane()
        .with_transform(Matrix4D::translation(0.0, 1.0, 0.0))
        .unwrap();
    upper.material.reflective = 1.0;
    w.add_object(upper);

    let r = ray(Tuple4D::point(0.0, 0.0, 0.0), Tuple4D::vector(0.0, 1.0, 0.0));
    let c = w.color_at(&r, RECURSION_DEPTH);
    assert!(c.r.is_finite() && c.r > 0.0);
}

#[test]
fn refracted_color_when_it_cannot_refract() {
    let w = World::new();
    let s = w.objects[0];
    let r = ray(Tuple4D::point(0.0, 0.0, -5.0), Tuple4D::vector(0.0, 0.0, 1.0));
    let xs = Intersections::new(vec![Intersection::new(4.0, s), Intersection::new(6.0, s)]);

    // Opaque.
    assert_eq!(w.refracted_color(&comps_for(&w, &r, &xs, 0), 5), Color::black());

    let mut w = World::new();
    w.shapes[s].material.transparency = 1.0;
    w.shapes[s].material.refractive_index = 1.5;

    // Out of bounces.
    assert_eq!(w.refracted_color(&comps_for(&w, &r, &xs, 0), 0), Color::black());

    // Total internal reflection.
    let r2 = 2.0f64.sqrt() / 2.0;
    let r = ray(Tuple4D::point(0.0, 0.0, r2), Tuple4D::vector(0.0, 1.0, 0.0));
    let xs = Intersections::new(vec![Intersection::new(-r2, s), Intersection::new(r2, s)]);
    assert_eq!(w.refracted_color(&comps_for(&w, &r, &xs, 1), 5), Color::black());
}

#[test]
fn refracted_color_with_refracted_ray() {
    let mut w = World::new();
    let (a, b) = (w.objects[0], w.objects[1]);
    w.shapes[a].material.ambient = 1.0;
    w.shapes[a].material.pattern = Some(Pattern::new(PatternKind::Test));
    w.shapes[b].material.transparency = 1.0;
    w.shapes[b].material.refractive_index = 1.5;

    let r = ray(Tuple4D::point(0.0, 0.0, 0.1), Tuple4D::vector(0.0, 1.0, 0.0));
    let xs = Intersections::new(vec![
        Intersection::new(-0.9899, a),
        Intersection::new(-0.4899, b),
        Intersection::new(0.4899, b),
        Intersection::new(0.9899, a),
    ]);

    let c = w.refracted_color(&comps_for(&w, &r, &xs, 2), 5);
    assert!(c.within(&Color::rgb(0.0, 0.99888, 0.04725), 0.001));
}

#[cfg(test)]
fn world_with_glass_floor(reflective: f64) -> (World, ShapeId) {
    let mut w = World::new();

    let mut floor = Shape::plane()
        .with_transform(Matrix4D::translation(0.0, -1.0, 0.0))
        .unwrap();
    floor.material.reflective = reflective;
    floor.material.transparency = 0.5;
    floor.material.refractive_index = 1.5;
    let floor = w.add_object(floor);

    let mut ball = Shape::sphere()
        .with_transform(Matrix4D::translation(0.0, -3.5, -0.5))
        .unwrap();
    ball.material.color = Color::red();
    ball.material.ambient = 0.5;
    w.add_object(ball);

    (w, floor)
}

#[test]
fn shade_hit_with_transparent_material() {
    let (w, floor) = world_with_glass_floor(0.0);
    let r2 = 2.0f64.sqrt() / 2.0;
    let r = ray(Tuple4D::point(0.0, 0.0, -3.0), Tuple4D::vector(0.0, -r2, r2));
    let xs = Intersections::new(vec![Intersection::new(2.0f64.sqrt(), floor)]);

    let c = w.shade_hit(&comps_for(&w, &r, &xs, 0), 5);
    assert!(c.within(&Color::rgb(0.93642, 0.68642, 0.68642), 0.0005));
}

#[test]
fn shade_hit_with_reflective_transparent_material() {
    let (w, floor) = world_with_glass_floor(0.5);
    let r2 = 2.0f64.sqrt() / 2.0;
    let r = ray(Tuple4D::point(0.0, 0.0, -3.0), Tuple4D::vector(0.0, -r2, r2));
    let xs = Intersections::new(vec![Intersection::new(2.0f64.sqrt(), floor)]);

    let c = w.shade_hit(&comps_for(&w, &r, &xs, 0), 5);
    assert!(c.within(&Color::rgb(0.93391, 0.69643, 0.69243), 0.0005));
}

#[test]
fn dividing_a_world_keeps_its_picture() {
    let mut w = World::new();
    let g = w.add_object(Shape::group());
    for i in 0..6 {
        let s = w.shapes.add(
            Shape::sphere()
                .with_transform(
                    Matrix4D::translation(-5.0 + 2.0 * i as f64, 2.0, 3.0)
                        * Matrix4D::scaling(0.5, 0.5, 0.5)
                )
                .unwrap()
        );
        w.shapes.add_child(g, s).unwrap();
    }

    let rays: Vec<Ray4D> = (0..6).map(|i| ray(
        Tuple4D::point(0.0, 0.0, -5.0),
        Tuple4D::vector(-0.6 + 0.25 * i as f64, 0.25, 1.0).normalize(),
    )).collect();
    let before: Vec<Color> = rays.iter().map(|r| w.color_at(r, RECURSION_DEPTH)).collect();

    w.divide(2);
    let after: Vec<Color> = rays.iter().map(|r| w.color_at(r, RECURSION_DEPTH)).collect();

    assert_eq!(before, after);
}
