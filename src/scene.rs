use std::convert::TryFrom;
use std::fs;
use std::path::{ Path, PathBuf };

use log::{ debug, info };
use serde::{ Serialize, Deserialize };

use crate::camera::Camera;
use crate::color::Color;
use crate::consts::{ DEFAULT_CANVAS_HEIGHT, DEFAULT_CANVAS_WIDTH, DEFAULT_MAX_DELTA,
    DEFAULT_MAX_PASSES };
use crate::csg::CsgOp;
use crate::error::{ Result, TracerError };
use crate::light::{ Material, PointLight };
use crate::matrix::Matrix4D;
use crate::obj::ObjParser;
use crate::pattern::{ Pattern, PatternKind };
use crate::sampler::Sampling;
use crate::shape::{ Shape, ShapeId, ShapeType, Shapes };
use crate::tuple::Tuple4D;
use crate::world::World;

/// A world, a camera to view it with, and optional render settings, as read
/// from a JSON scene description.
#[derive(Debug)]
pub struct Scene {
    pub world: World,
    pub camera: Camera,
    pub settings: RenderSettings,
}

/// Render settings a scene file may carry. Anything left out falls back to
/// the command line or the compiled-in defaults.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RenderSettings {
    pub depth: Option<usize>,
    pub sampling: Option<SamplingJson>,
    pub divide: Option<usize>,
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum SamplingJson {
    Direct,
    Adaptive {
        #[serde(default = "default_max_passes")]
        max_passes: usize,
        #[serde(default = "default_max_delta")]
        max_delta: f64,
    },
}

fn default_max_passes() -> usize {
    DEFAULT_MAX_PASSES
}

fn default_max_delta() -> f64 {
    DEFAULT_MAX_DELTA
}

impl From<SamplingJson> for Sampling {
    fn from(sampling: SamplingJson) -> Sampling {
        match sampling {
            SamplingJson::Direct => Sampling::Direct,
            SamplingJson::Adaptive { max_passes, max_delta } => {
                Sampling::Adaptive { max_passes, max_delta }
            },
        }
    }
}

impl Scene {
    /// Loads a scene file. Relative OBJ paths are resolved against the
    /// directory holding the scene file.
    pub fn load(path: &Path) -> Result<Scene> {
        let text = fs::read_to_string(path)?;
        let base = path.parent().map(Path::to_path_buf).unwrap_or_default();

        let scene = Scene::from_json(&text, &base)?;
        info!("loaded scene {:?}: {} objects, {} shapes, {} lights",
              path, scene.world.objects.len(), scene.world.shapes.len(),
              scene.world.lights.len());
        Ok(scene)
    }

    /// Parses a scene from JSON text, resolving OBJ paths against `base`.
    pub fn from_json(text: &str, base: &Path) -> Result<Scene> {
        let mut scene_json: SceneJson = serde_json::from_str(text)?;
        scene_json.base = base.to_path_buf();
        Scene::try_from(scene_json)
    }
}

impl TryFrom<SceneJson> for Scene {
    type Error = TracerError;

    fn try_from(scene_json: SceneJson) -> Result<Scene> {
        // Create the camera transform from the view parameters.
        let camera_transform = Matrix4D::view_transform(
            point(scene_json.camera_from),
            point(scene_json.camera_to),
            vector(scene_json.camera_up)
        );

        if scene_json.canvas_width == 0 || scene_json.canvas_height == 0 {
            return Err(TracerError::Scene("canvas must be at least 1x1".into()));
        }

        let camera = Camera::new(
            scene_json.canvas_width,
            scene_json.canvas_height,
            scene_json.field_of_view,
            camera_transform
        )?;

        let mut world = World::empty();
        world.lights = scene_json.lights.iter()
            .map(|l| PointLight::new(color(l.intensity), point(l.position)))
            .collect();

        for shape_json in scene_json.shapes {
            let id = build_shape(shape_json, &mut world.shapes, &scene_json.base, None)?;
            world.objects.push(id);
        }

        Ok(Scene { world, camera, settings: scene_json.render })
    }
}

#[derive(Serialize, Deserialize)]
pub struct SceneJson {
    #[serde(default = "default_canvas_width")]
    canvas_width: usize,
    #[serde(default = "default_canvas_height")]
    canvas_height: usize,
    field_of_view: f64,

    camera_from: [f64; 3],
    camera_to: [f64; 3],
    camera_up: [f64; 3],

    #[serde(default)]
    lights: Vec<LightJson>,
    #[serde(default)]
    shapes: Vec<ShapeJson>,
    #[serde(default)]
    render: RenderSettings,

    #[serde(skip)]
    base: PathBuf,
}

fn default_canvas_width() -> usize {
    DEFAULT_CANVAS_WIDTH
}

fn default_canvas_height() -> usize {
    DEFAULT_CANVAS_HEIGHT
}

#[derive(Clone, Serialize, Deserialize)]
struct LightJson {
    intensity: [f64; 3],
    position: [f64; 3],
}

/// One step of a shape or pattern transform. A list of steps is applied in
/// order, so `[{"scale": ..}, {"translate": ..}]` scales first.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum TransformJson {
    Translate([f64; 3]),
    Scale([f64; 3]),
    RotateX(f64),
    RotateY(f64),
    RotateZ(f64),
    Shear([f64; 6]),
}

impl TransformJson {
    fn matrix(&self) -> Matrix4D {
        match *self {
            TransformJson::Translate([x, y, z]) => Matrix4D::translation(x, y, z),
            TransformJson::Scale([x, y, z]) => Matrix4D::scaling(x, y, z),
            TransformJson::RotateX(r) => Matrix4D::rotation_x(r),
            TransformJson::RotateY(r) => Matrix4D::rotation_y(r),
            TransformJson::RotateZ(r) => Matrix4D::rotation_z(r),
            TransformJson::Shear([xy, xz, yx, yz, zx, zy]) => {
                Matrix4D::shearing(xy, xz, yx, yz, zx, zy)
            },
        }
    }
}

fn compose(steps: &[TransformJson]) -> Matrix4D {
    steps.iter().fold(Matrix4D::identity(), |m, step| step.matrix() * m)
}

#[derive(Clone, Default, Serialize, Deserialize)]
struct MaterialJson {
    color: Option<[f64; 3]>,
    pattern: Option<PatternJson>,
    ambient: Option<f64>,
    diffuse: Option<f64>,
    specular: Option<f64>,
    shininess: Option<f64>,
    reflective: Option<f64>,
    transparency: Option<f64>,
    refractive_index: Option<f64>,
}

impl MaterialJson {
    fn material(&self) -> Result<Material> {
        let mut m = Material::default();

        if let Some(c) = self.color {
            m.color = color(c);
        }
        if let Some(p) = &self.pattern {
            m.pattern = Some(p.pattern()?);
        }

        m.ambient = self.ambient.unwrap_or(m.ambient);
        m.diffuse = self.diffuse.unwrap_or(m.diffuse);
        m.specular = self.specular.unwrap_or(m.specular);
        m.shininess = self.shininess.unwrap_or(m.shininess);
        m.reflective = self.reflective.unwrap_or(m.reflective);
        m.transparency = self.transparency.unwrap_or(m.transparency);
        m.refractive_index = self.refractive_index.unwrap_or(m.refractive_index);

        Ok(m)
    }
}

#[derive(Clone, Serialize, Deserialize)]
struct PatternJson {
    kind: String,
    #[serde(default)]
    colors: Vec<[f64; 3]>,
    #[serde(default)]
    transform: Vec<TransformJson>,
}

impl PatternJson {
    fn pattern(&self) -> Result<Pattern> {
        let two = || -> Result<(Color, Color)> {
            match self.colors.as_slice() {
                [a, b] => Ok((color(*a), color(*b))),
                _ => Err(TracerError::Scene(
                    format!("{} pattern needs exactly two colors", self.kind)
                )),
            }
        };

        let kind = match self.kind.as_str() {
            "stripe" => { let (a, b) = two()?; PatternKind::Stripe(a, b) },
            "gradient" => { let (a, b) = two()?; PatternKind::Gradient(a, b) },
            "ring" => { let (a, b) = two()?; PatternKind::Ring(a, b) },
            "checker" => { let (a, b) = two()?; PatternKind::Checker(a, b) },
            "test" => PatternKind::Test,
            other => {
                return Err(TracerError::Scene(format!("unknown pattern {:?}", other)));
            },
        };

        Pattern::new(kind).with_transform(compose(&self.transform))
    }
}

#[derive(Clone, Serialize, Deserialize)]
struct ShapeJson {
    ty: String,
    #[serde(default)]
    transform: Vec<TransformJson>,
    material: Option<MaterialJson>,

    /// Group members, or the two operands of a solid.
    children: Option<Vec<ShapeJson>>,

    // Cylinders and cones.
    minimum: Option<f64>,
    maximum: Option<f64>,
    #[serde(default)]
    closed: bool,

    // Triangles: three points, then optionally three normals.
    points: Option<Vec<[f64; 3]>>,
    normals: Option<Vec<[f64; 3]>>,

    /// An OBJ mesh.
    file: Option<PathBuf>,
}

/// Adds a shape description (and everything under it) to the arena.
///
/// Only primitives are shaded, so a material given on a group, solid or mesh
/// is handed down to every primitive below it that has none of its own.
fn build_shape(shape_json: ShapeJson, shapes: &mut Shapes, base: &Path,
    inherited: Option<Material>) -> Result<ShapeId> {
    let transform = compose(&shape_json.transform);
    let material = match &shape_json.material {
        Some(m) => Some(m.material()?),
        None => inherited,
    };

    let minimum = shape_json.minimum.unwrap_or(f64::NEG_INFINITY);
    let maximum = shape_json.maximum.unwrap_or(f64::INFINITY);
    let closed = shape_json.closed;

    let primitive = match shape_json.ty.as_str() {
        // Primitives
        "empty" => Some(Shape::empty()),
        "sphere" => Some(Shape::sphere()),
        "glass_sphere" => Some(Shape::glass_sphere()),
        "plane" => Some(Shape::plane()),
        "cube" => Some(Shape::cube()),
        "cylinder" if closed => Some(Shape::capped_cylinder(minimum, maximum)),
        "cylinder" => Some(Shape::bounded_cylinder(minimum, maximum)),
        "cone" if closed => Some(Shape::capped_cone(minimum, maximum)),
        "cone" => Some(Shape::bounded_cone(minimum, maximum)),
        "triangle" => Some(triangle(&shape_json)?),
        _ => None,
    };

    if let Some(shape) = primitive {
        let mut shape = shape.with_transform(transform)?;
        if let Some(m) = material {
            shape = shape.with_material(m);
        }
        return Ok(shapes.add(shape));
    }

    let id = match shape_json.ty.as_str() {
        // Group-likes
        "group" => {
            let group = shapes.add(Shape::group());
            // It's okay to have an empty group (no children).
            for child in shape_json.children.unwrap_or_default() {
                let child = build_shape(child, shapes, base, material)?;
                shapes.add_child(group, child)?;
            }

            group
        },
        "union" | "intersection" | "difference" => {
            let op = match shape_json.ty.as_str() {
                "union" => CsgOp::Union,
                "intersection" => CsgOp::Intersection,
                _ => CsgOp::Difference,
            };

            let mut operands = shape_json.children.unwrap_or_default();
            if operands.len() != 2 {
                return Err(TracerError::Scene(format!(
                    "{} needs exactly two operands, found {}",
                    shape_json.ty, operands.len()
                )));
            }

            let right = operands.pop().map(|s| build_shape(s, shapes, base, material));
            let left = operands.pop().map(|s| build_shape(s, shapes, base, material));
            match (left, right) {
                (Some(left), Some(right)) => shapes.csg(op, left?, right?)?,
                _ => return Err(TracerError::Scene("missing operand".into())),
            }
        },

        // Models
        "obj" => {
            let file = shape_json.file.as_ref().ok_or_else(|| {
                TracerError::Scene("obj shape needs a file".into())
            })?;

            let parser = ObjParser::parse_file(&base.join(file))?;
            debug!("mesh {:?} ignored {} lines", file, parser.ignored_lines);
            let mesh = parser.into_group(shapes)?;
            if let Some(m) = material {
                paint(shapes, mesh, m);
            }
            mesh
        },

        other => {
            return Err(TracerError::Scene(format!("unknown shape type {:?}", other)));
        },
    };

    shapes.set_transform(id, transform)?;
    Ok(id)
}

/// Gives every primitive under `id` the same material.
fn paint(shapes: &mut Shapes, id: ShapeId, material: Material) {
    match shapes[id].ty().clone() {
        ShapeType::Group(children) => {
            for child in children {
                paint(shapes, child, material);
            }
        },
        ShapeType::Csg(_, left, right) => {
            paint(shapes, left, material);
            paint(shapes, right, material);
        },
        _ => shapes[id].material = material,
    }
}

fn triangle(shape_json: &ShapeJson) -> Result<Shape> {
    let points = match shape_json.points.as_deref() {
        Some([p1, p2, p3]) => (point(*p1), point(*p2), point(*p3)),
        _ => return Err(TracerError::Scene("triangle needs exactly three points".into())),
    };

    match shape_json.normals.as_deref() {
        None => Ok(Shape::triangle(points.0, points.1, points.2)),
        Some([n1, n2, n3]) => Ok(Shape::smooth_triangle(
            points.0, points.1, points.2,
            vector(*n1), vector(*n2), vector(*n3)
        )),
        Some(_) => Err(TracerError::Scene("triangle needs exactly three normals".into())),
    }
}

fn point([x, y, z]: [f64; 3]) -> Tuple4D {
    Tuple4D::point(x, y, z)
}

fn vector([x, y, z]: [f64; 3]) -> Tuple4D {
    Tuple4D::vector(x, y, z)
}

fn color([r, g, b]: [f64; 3]) -> Color {
    Color::rgb(r, g, b)
}

#[cfg(test)]
use crate::renderer::Renderer;

#[cfg(test)]
const DEFAULT_WORLD_JSON: &str = r#"{
    "canvas_width": 11,
    "canvas_height": 11,
    "field_of_view": 1.5707963267948966,
    "camera_from": [0, 0, -5],
    "camera_to": [0, 0, 0],
    "camera_up": [0, 1, 0],
    "lights": [{ "intensity": [1, 1, 1], "position": [-10, 10, -10] }],
    "shapes": [
        { "ty": "sphere",
          "material": { "color": [0.8, 1.0, 0.6], "diffuse": 0.7, "specular": 0.2 } },
        { "ty": "sphere", "transform": [{ "scale": [0.5, 0.5, 0.5] }] }
    ],
    "render": { "depth": 5, "sampling": { "mode": "direct" } }
}"#;

#[cfg(test)]
fn scene_with_shapes(shapes: &str) -> Result<Scene> {
    let text = format!(r#"{{
        "field_of_view": 1.0,
        "camera_from": [0, 0, -5],
        "camera_to": [0, 0, 0],
        "camera_up": [0, 1, 0],
        "shapes": {}
    }}"#, shapes);

    Scene::from_json(&text, Path::new("."))
}

#[test]
fn loading_default_world_scene() {
    let scene = Scene::from_json(DEFAULT_WORLD_JSON, Path::new(".")).unwrap();

    assert_eq!(scene.camera.hsize, 11);
    assert_eq!(scene.world.objects.len(), 2);
    assert_eq!(scene.world.lights.len(), 1);
    assert_eq!(scene.settings.depth, Some(5));
    assert_eq!(scene.settings.sampling, Some(SamplingJson::Direct));

    let outer = &scene.world.shapes[scene.world.objects[0]];
    assert_eq!(outer.material.color, Color::rgb(0.8, 1.0, 0.6));
    assert!(crate::feq(outer.material.ambient, 0.1));
}

#[test]
fn scene_renders_like_default_world() {
    let scene = Scene::from_json(DEFAULT_WORLD_JSON, Path::new(".")).unwrap();
    let renderer = Renderer::new(scene.camera, scene.world, 5, Sampling::Direct);

    assert_eq!(renderer.render_pixel(5, 5), Color::rgb(0.38066, 0.47583, 0.2855));
}

#[test]
fn transform_steps_apply_in_order() {
    let scene = scene_with_shapes(
        r#"[{ "ty": "cube", "transform": [{ "scale": [2, 2, 2] }, { "translate": [1, 0, 0] }] }]"#
    ).unwrap();
    let cube = &scene.world.shapes[scene.world.objects[0]];

    assert_eq!(*cube.transform(),
        Matrix4D::translation(1.0, 0.0, 0.0) * Matrix4D::scaling(2.0, 2.0, 2.0));
    assert_eq!(scene.camera.hsize, DEFAULT_CANVAS_WIDTH);
}

#[test]
fn groups_and_solids_are_linked() {
    let scene = scene_with_shapes(r#"[
        { "ty": "group", "children": [
            { "ty": "difference", "children": [
                { "ty": "cube" },
                { "ty": "sphere", "transform": [{ "translate": [0, 0, -1] }] }
            ] },
            { "ty": "cylinder", "minimum": 0, "maximum": 2, "closed": true }
        ] }
    ]"#).unwrap();

    let shapes = &scene.world.shapes;
    let group = scene.world.objects[0];
    let children = shapes.children(group);
    assert_eq!(children.len(), 2);

    match *shapes[children[0]].ty() {
        ShapeType::Csg(CsgOp::Difference, left, right) => {
            assert_eq!(shapes[left].parent(), Some(children[0]));
            assert_eq!(shapes[right].parent(), Some(children[0]));
        },
        ref other => panic!("expected a difference, got {:?}", other),
    }

    match *shapes[children[1]].ty() {
        ShapeType::Cylinder { minimum, maximum, closed } => {
            assert_eq!((minimum, maximum, closed), (0.0, 2.0, true));
        },
        ref other => panic!("expected a cylinder, got {:?}", other),
    }
}

#[test]
fn patterns_and_triangles() {
    let scene = scene_with_shapes(r#"[
        { "ty": "plane", "material": { "pattern": {
            "kind": "checker", "colors": [[1, 1, 1], [0, 0, 0]],
            "transform": [{ "scale": [0.5, 0.5, 0.5] }]
        } } },
        { "ty": "triangle", "points": [[0, 1, 0], [-1, 0, 0], [1, 0, 0]] }
    ]"#).unwrap();

    let plane = &scene.world.shapes[scene.world.objects[0]];
    let pattern = plane.material.pattern.unwrap();
    assert_eq!(pattern.kind, PatternKind::Checker(Color::white(), Color::black()));
    assert_eq!(*pattern.transform(), Matrix4D::scaling(0.5, 0.5, 0.5));

    let triangle = &scene.world.shapes[scene.world.objects[1]];
    assert!(matches!(triangle.ty(), ShapeType::Triangle(_)));
}

#[test]
fn loading_obj_meshes() {
    let dir = std::env::temp_dir().join(format!("adaptive-tracer-{}", std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("quad.obj"), "v -1 1 0\nv -1 0 0\nv 1 0 0\nv 1 1 0\nf 1 2 3 4\n").unwrap();
    fs::write(dir.join("scene.json"), r#"{
        "field_of_view": 1.0,
        "camera_from": [0, 0, -5],
        "camera_to": [0, 0, 0],
        "camera_up": [0, 1, 0],
        "shapes": [{ "ty": "obj", "file": "quad.obj", "material": { "color": [0, 1, 0] } }]
    }"#).unwrap();

    let scene = Scene::load(&dir.join("scene.json")).unwrap();
    let mesh = scene.world.objects[0];
    assert_eq!(scene.world.shapes.children(mesh).len(), 2);
    for &t in scene.world.shapes.children(mesh) {
        assert_eq!(scene.world.shapes[t].material.color, Color::green());
    }

    fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn malformed_scenes_are_rejected() {
    let unknown = scene_with_shapes(r#"[{ "ty": "teapot" }]"#);
    assert!(matches!(unknown, Err(TracerError::Scene(_))));

    let lonely = scene_with_shapes(r#"[{ "ty": "union", "children": [{ "ty": "sphere" }] }]"#);
    assert!(matches!(lonely, Err(TracerError::Scene(_))));

    let flat = scene_with_shapes(
        r#"[{ "ty": "sphere", "transform": [{ "scale": [1, 0, 1] }] }]"#
    );
    assert!(matches!(flat, Err(TracerError::NonInvertible(_))));

    let broken = Scene::from_json("{ \"shapes\": ", Path::new("."));
    assert!(matches!(broken, Err(TracerError::Json(_))));
}

#[test]
fn container_materials_reach_their_primitives() {
    let scene = scene_with_shapes(r#"[
        { "ty": "group", "material": { "color": [1, 0, 0] }, "children": [
            { "ty": "sphere" },
            { "ty": "cube", "material": { "color": [0, 0, 1] } },
            { "ty": "union", "children": [{ "ty": "sphere" }, { "ty": "cube" }] }
        ] },
        { "ty": "glass_sphere" }
    ]"#).unwrap();

    let shapes = &scene.world.shapes;
    let children = shapes.children(scene.world.objects[0]);
    assert_eq!(shapes[children[0]].material.color, Color::red());
    assert_eq!(shapes[children[1]].material.color, Color::blue());

    match *shapes[children[2]].ty() {
        ShapeType::Csg(_, left, right) => {
            assert_eq!(shapes[left].material.color, Color::red());
            assert_eq!(shapes[right].material.color, Color::red());
        },
        ref other => panic!("expected a union, got {:?}", other),
    }

    // A primitive with no material anywhere above it keeps its own.
    let glass = &shapes[scene.world.objects[1]];
    assert!(crate::feq(glass.material.transparency, 1.0));
    assert!(crate::feq(glass.material.refractive_index, 1.5));
}
