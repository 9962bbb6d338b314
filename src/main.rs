use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{ Context, Result };
use clap::{ Parser, ValueEnum };
use log::{ info, LevelFilter };

use adaptive_tracer::camera::Camera;
use adaptive_tracer::color::Color;
use adaptive_tracer::consts::{ DEFAULT_CANVAS_HEIGHT, DEFAULT_CANVAS_WIDTH, DEFAULT_DIVIDE_THRESHOLD,
    DEFAULT_MAX_DELTA, DEFAULT_MAX_PASSES, DEFAULT_OUT_FILE, DEFAULT_THREADS, GLASS_RI,
    RECURSION_DEPTH };
use adaptive_tracer::csg::CsgOp;
use adaptive_tracer::light::{ Material, PointLight };
use adaptive_tracer::logger::init_logger;
use adaptive_tracer::matrix::Matrix4D;
use adaptive_tracer::parallel;
use adaptive_tracer::pattern::{ Pattern, PatternKind };
use adaptive_tracer::renderer::Renderer;
use adaptive_tracer::sampler::Sampling;
use adaptive_tracer::scene::{ RenderSettings, Scene };
use adaptive_tracer::shape::Shape;
use adaptive_tracer::tuple::Tuple4D;
use adaptive_tracer::world::World;

#[derive(Debug, Clone, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

/// Renders a scene to a PPM image.
#[derive(Parser)]
#[clap(author, version, about)]
struct Args {
    /// JSON scene description; a built-in demo scene is rendered without one
    #[clap(short, long)]
    scene: Option<PathBuf>,

    /// Output PPM file
    #[clap(short, long, default_value = DEFAULT_OUT_FILE)]
    out: PathBuf,

    /// Worker threads
    #[clap(short, long, default_value_t = DEFAULT_THREADS)]
    threads: usize,

    /// Canvas width of the demo scene
    #[clap(long, default_value_t = DEFAULT_CANVAS_WIDTH)]
    width: usize,

    /// Canvas height of the demo scene
    #[clap(long, default_value_t = DEFAULT_CANVAS_HEIGHT)]
    height: usize,

    /// Reflection and refraction bounces per primary ray
    #[clap(long)]
    depth: Option<usize>,

    /// Refinement passes of the adaptive sampler
    #[clap(long)]
    max_passes: Option<usize>,

    /// Per-channel tolerance of the adaptive sampler
    #[clap(long)]
    max_delta: Option<f64>,

    /// Cast one ray through each pixel center instead of sampling adaptively
    #[clap(long, conflicts_with_all = &["max_passes", "max_delta"])]
    direct: bool,

    /// Split groups with at least this many children into a bounding volume
    /// hierarchy; 0 disables it
    #[clap(long)]
    divide: Option<usize>,

    /// Set the logging level
    #[clap(long, value_enum, default_value = "info")]
    log_level: LogLevel,
}

/// Command line settings win over scene settings, which win over defaults.
fn sampling(args: &Args, settings: &RenderSettings) -> Sampling {
    if args.direct {
        return Sampling::Direct;
    }

    let base = settings.sampling.map(Sampling::from);
    let (passes, delta) = match base {
        Some(Sampling::Adaptive { max_passes, max_delta }) => (max_passes, max_delta),
        Some(Sampling::Direct) if args.max_passes.is_none() && args.max_delta.is_none() => {
            return Sampling::Direct;
        },
        _ => (DEFAULT_MAX_PASSES, DEFAULT_MAX_DELTA),
    };

    Sampling::Adaptive {
        max_passes: args.max_passes.unwrap_or(passes),
        max_delta: args.max_delta.unwrap_or(delta),
    }
}

/// A floor, a glass sphere, a cone and a cube with a bite taken out of it.
fn demo_scene(width: usize, height: usize) -> Result<(World, Camera)> {
    let mut world = World::empty();
    world.lights.push(PointLight::new(
        Color::rgb(1.0, 1.0, 1.0),
        Tuple4D::point(-10.0, 10.0, -10.0),
    ));

    let floor_pattern = Pattern::new(PatternKind::Checker(Color::white(), Color::black()))
        .with_transform(Matrix4D::scaling(0.5, 0.5, 0.5))?;
    world.add_object(Shape::plane().with_material(Material {
        color: Color::rgb(0.5, 0.5, 0.5),
        pattern: Some(floor_pattern),
        specular: 0.0,
        reflective: 0.5,
        ..Default::default()
    }));

    world.add_object(
        Shape::sphere()
            .with_transform(Matrix4D::translation(-0.5, 1.0, 2.0))?
            .with_material(Material {
                color: Color::rgb(1.0, 0.4666, 0.2666),
                diffuse: 0.7,
                specular: 0.3,
                transparency: 0.5,
                reflective: 0.5,
                refractive_index: GLASS_RI,
                ..Default::default()
            })
    );

    world.add_object(
        Shape::capped_cone(0.0, 3.0)
            .with_transform(
                Matrix4D::translation(1.5, 2.5, -0.5)
                    * Matrix4D::scaling(0.25, 0.25, 0.25)
                    * Matrix4D::rotation_z(std::f64::consts::PI / 4.0)
                    * Matrix4D::rotation_y(std::f64::consts::PI / 8.0)
            )?
            .with_material(Material {
                color: Color::rgb(1.0, 0.6666, 0.2666),
                diffuse: 0.7,
                specular: 0.3,
                reflective: 0.3,
                ..Default::default()
            })
    );

    let red = Material {
        color: Color::rgb(0.8666, 0.2, 0.2),
        diffuse: 0.7,
        specular: 0.3,
        ..Default::default()
    };
    let cube = world.shapes.add(Shape::cube().with_material(red));
    let bite = world.shapes.add(
        Shape::sphere()
            .with_transform(Matrix4D::translation(0.6, 0.6, -0.6) * Matrix4D::scaling(0.8, 0.8, 0.8))?
            .with_material(red)
    );
    let solid = world.shapes.csg(CsgOp::Difference, cube, bite)?;
    world.shapes.set_transform(solid,
        Matrix4D::translation(-1.8, 0.5, -0.75)
            * Matrix4D::scaling(0.5, 0.5, 0.5)
            * Matrix4D::rotation_y(std::f64::consts::PI / 5.0)
    )?;
    world.objects.push(solid);

    let camera = Camera::new(width, height, std::f64::consts::PI / 3.0,
        Matrix4D::view_transform(
            Tuple4D::point(0.0, 1.5, -5.0),
            Tuple4D::point(0.0, 1.0, 0.0),
            Tuple4D::vector(0.0, 1.0, 0.0),
        ))?;

    Ok((world, camera))
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logger(args.log_level.clone().into());

    let (mut world, camera, settings) = match &args.scene {
        Some(path) => {
            let scene = Scene::load(path)
                .with_context(|| format!("failed to load scene {}", path.display()))?;
            (scene.world, scene.camera, scene.settings)
        },
        None => {
            let (world, camera) = demo_scene(args.width, args.height)
                .context("failed to build the demo scene")?;
            (world, camera, RenderSettings::default())
        },
    };

    let threshold = args.divide.or(settings.divide).unwrap_or(DEFAULT_DIVIDE_THRESHOLD);
    if threshold > 0 {
        world.divide(threshold);
    }

    let depth = args.depth.or(settings.depth).unwrap_or(RECURSION_DEPTH);
    let sampling = sampling(&args, &settings);
    info!("depth {}, sampling {:?}", depth, sampling);

    let renderer = Arc::new(Renderer::new(camera, world, depth, sampling));
    let canvas = parallel::render(renderer, args.threads);

    canvas.save(&args.out)
        .with_context(|| format!("failed to write {}", args.out.display()))?;
    info!("saved render to {}", args.out.display());

    Ok(())
}
