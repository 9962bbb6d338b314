use crate::color::Color;
use crate::pattern::Pattern;
use crate::shape::{ ShapeId, Shapes };
use crate::tuple::Tuple4D;

/// A point light.
///
/// A very simple light source. Provides a color and a position where light is
/// produced from.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct PointLight {
    pub intensity: Color,
    pub position: Tuple4D,
}

impl PointLight {
    /// Creates a point light.
    ///
    /// If `position` isn't a point, it is converted to a point automatically.
    pub fn new(intensity: Color, mut position: Tuple4D) -> PointLight {
        if !position.is_point() {
            position.w = 1.0;
        }

        PointLight { intensity, position }
    }
}

/// A material record.
///
/// Materials use attributes from the Phong reflection model; ambient, diffuse,
/// specular and shininess. A material reflects when `reflective > 0` and
/// refracts when `transparency > 0`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Material {
    pub color: Color,
    pub pattern: Option<Pattern>,

    pub ambient: f64,
    pub diffuse: f64,
    pub specular: f64,
    pub shininess: f64,

    pub reflective: f64,
    pub refractive_index: f64,
    pub transparency: f64,
}

impl Default for Material {
    fn default() -> Material {
        Material {
            color: Color::rgb(1.0, 1.0, 1.0),
            pattern: None,

            ambient: 0.1,
            diffuse: 0.9,
            specular: 0.9,
            shininess: 200.0,

            reflective: 0.0,
            refractive_index: 1.0,
            transparency: 0.0,
        }
    }
}

/// Calculate the Phong lighting of a point on `shape` from one light.
///
/// The surface color comes from the material's pattern when it has one,
/// evaluated in the shape's space, and from `color` otherwise. If the point
/// is in a shadow only ambient light is used.
pub fn lighting(m: &Material, shapes: &Shapes, shape: ShapeId,
    light: &PointLight, point: Tuple4D, eyev: Tuple4D, normalv: Tuple4D,
    in_shadow: bool) -> Color {
    let color = match m.pattern {
        Some(ref pat) => pat.pattern_at_shape(shapes, shape, point),
        None => m.color,
    };

    let effective_color = color * light.intensity;
    let lightv = (light.position - point).normalize();
    let ambient = effective_color * m.ambient;

    if in_shadow {
        return ambient;
    }

    // The far side of the surface only gets ambient light.
    let light_dot_normal = lightv.dot(&normalv);
    if light_dot_normal < 0.0 {
        return ambient;
    }

    let diffuse = effective_color * m.diffuse * light_dot_normal;

    let reflectv = (-lightv).reflect(&normalv);
    let reflect_dot_eye = reflectv.dot(&eyev);
    let specular = if reflect_dot_eye <= 0.0 {
        Color::black()
    } else {
        light.intensity * m.specular * reflect_dot_eye.powf(m.shininess)
    };

    ambient + diffuse + specular
}

#[cfg(test)]
fn sphere_at_origin() -> (Shapes, ShapeId) {
    use crate::shape::Shape;

    let mut shapes = Shapes::new();
    let s = shapes.add(Shape::sphere());
    (shapes, s)
}

#[test]
fn lighting_by_eye_and_light_position() {
    let (shapes, s) = sphere_at_origin();
    let m: Material = Default::default();
    let position = Tuple4D::point(0.0, 0.0, 0.0);
    let normalv = Tuple4D::vector(0.0, 0.0, -1.0);
    let r2 = 2.0f64.sqrt() / 2.0;

    // (eye vector, light position, expected intensity)
    let cases = [
        (Tuple4D::vector(0.0, 0.0, -1.0), Tuple4D::point(0.0, 0.0, -10.0), 1.9),
        (Tuple4D::vector(0.0, r2, r2), Tuple4D::point(0.0, 0.0, -10.0), 1.0),
        (Tuple4D::vector(0.0, 0.0, -1.0), Tuple4D::point(0.0, 10.0, -10.0), 0.7364),
        (Tuple4D::vector(0.0, -r2, -r2), Tuple4D::point(0.0, 10.0, -10.0), 1.6364),
        (Tuple4D::vector(0.0, 0.0, -1.0), Tuple4D::point(0.0, 0.0, 10.0), 0.1),
    ];

    for &(eyev, light_position, expected) in cases.iter() {
        let light = PointLight::new(Color::white(), light_position);
        let res = lighting(&m, &shapes, s, &light, position, eyev, normalv, false);
        assert_eq!(res, Color::rgb(expected, expected, expected));
    }
}

#[test]
fn lighting_with_surface_in_shadow() {
    let (shapes, s) = sphere_at_origin();
    let m: Material = Default::default();

    let light = PointLight::new(Color::white(), Tuple4D::point(0.0, 0.0, -10.0));
    let res = lighting(&m, &shapes, s, &light,
        Tuple4D::point(0.0, 0.0, 0.0),
        Tuple4D::vector(0.0, 0.0, -1.0),
        Tuple4D::vector(0.0, 0.0, -1.0),
        true);

    assert_eq!(res, Color::rgb(0.1, 0.1, 0.1));
}

#[test]
fn lighting_with_stripe_pattern() {
    let (shapes, s) = sphere_at_origin();

    // Only ambient light, so the stripe color comes through unchanged.
    let m = Material {
        color: Color::rgb(0.5, 0.5, 0.5),
        pattern: Some(Pattern::stripe(Color::white(), Color::black())),
        ambient: 1.0,
        diffuse: 0.0,
        specular: 0.0,
        ..Default::default()
    };

    let eyev = Tuple4D::vector(0.0, 0.0, -1.0);
    let normalv = Tuple4D::vector(0.0, 0.0, -1.0);
    let light = PointLight::new(Color::white(), Tuple4D::point(0.0, 0.0, -10.0));

    assert_eq!(
        Color::white(),
        lighting(&m, &shapes, s, &light, Tuple4D::point(0.9, 0.0, 0.0),
            eyev, normalv, false)
    );
    assert_eq!(
        Color::black(),
        lighting(&m, &shapes, s, &light, Tuple4D::point(1.1, 0.0, 0.0),
            eyev, normalv, false)
    );
}
