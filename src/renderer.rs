use log::{ debug, info };

use crate::camera::Camera;
use crate::canvas::Canvas;
use crate::color::Color;
use crate::sampler::{ AdaptiveSampler, LocalScopes, SampleCache, SampleSource, Sampling };
use crate::world::World;

/// Everything needed to turn a world into pixels.
///
/// A renderer is shared read-only between worker threads. The only state it
/// gathers while rendering is its sample cache, which is itself thread-safe.
#[derive(Debug)]
pub struct Renderer {
    pub camera: Camera,
    pub world: World,

    /// How many reflection/refraction bounces each primary ray may take.
    pub depth: usize,

    pub sampling: Sampling,
    cache: SampleCache,
}

impl SampleSource for Renderer {
    fn sample(&self, x: f64, y: f64) -> Color {
        let ray = self.camera.ray_for_point(x, y);
        self.world.color_at(&ray, self.depth)
    }
}

impl Renderer {
    pub fn new(camera: Camera, world: World, depth: usize, sampling: Sampling)
        -> Renderer {
        Renderer { camera, world, depth, sampling, cache: SampleCache::new() }
    }

    /// Samples shared between every pixel rendered so far.
    pub fn cache(&self) -> &SampleCache {
        &self.cache
    }

    /// The final color of pixel `(x, y)`.
    pub fn render_pixel(&self, x: usize, y: usize) -> Color {
        self.render_pixel_with(x, y, &mut LocalScopes::new())
    }

    /// Like `render_pixel`, reusing the caller's scope pool.
    pub fn render_pixel_with(&self, x: usize, y: usize, scopes: &mut LocalScopes)
        -> Color {
        match self.sampling {
            Sampling::Direct => {
                let ray = self.camera.ray_for_pixel(x, y);
                self.world.color_at(&ray, self.depth)
            },

            Sampling::Adaptive { max_passes, max_delta } => {
                AdaptiveSampler::new(max_passes, max_delta)
                    .sample_pixel(x as i64, y as i64, self, &self.cache, scopes)
            },
        }
    }

    /// Renders every pixel on the calling thread.
    pub fn render(&self) -> Canvas {
        let (hsize, vsize) = (self.camera.hsize, self.camera.vsize);
        info!("rendering {}x{} on one thread ({:?})", hsize, vsize, self.sampling);

        let mut canvas = Canvas::new(hsize, vsize);
        let mut scopes = LocalScopes::new();
        for y in 0..vsize {
            for x in 0..hsize {
                let color = self.render_pixel_with(x, y, &mut scopes);
                canvas.write_pixel(x, y, &color);
            }
        }

        debug!("{} shared samples cached", self.cache.len());
        info!("render finished");
        canvas
    }
}

#[cfg(test)]
use crate::matrix::Matrix4D;
#[cfg(test)]
use crate::tuple::Tuple4D;

#[cfg(test)]
fn default_world_renderer(sampling: Sampling) -> Renderer {
    let transform = Matrix4D::view_transform(
        Tuple4D::point(0.0, 0.0, -5.0),
        Tuple4D::point(0.0, 0.0, 0.0),
        Tuple4D::vector(0.0, 1.0, 0.0),
    );
    let camera = Camera::new(11, 11, std::f64::consts::PI / 2.0, transform).unwrap();

    Renderer::new(camera, World::default(), 5, sampling)
}

#[test]
fn rendering_default_world_directly() {
    let renderer = default_world_renderer(Sampling::Direct);
    let image = renderer.render();

    assert_eq!(image.read_pixel(5, 5).unwrap(), Color::rgb(0.38066, 0.47583, 0.2855));
    assert!(renderer.cache().is_empty());
}

#[test]
fn converged_pixel_is_mean_of_its_corners() {
    let renderer = default_world_renderer(Sampling::Adaptive {
        max_passes: 3,
        max_delta: 1.0,
    });
    let c = renderer.render_pixel(5, 5);

    let expected = Color::mean(&[
        renderer.sample(5.0, 5.0),
        renderer.sample(6.0, 5.0),
        renderer.sample(5.0, 6.0),
        renderer.sample(6.0, 6.0),
    ]);
    assert_eq!(c, expected);
    assert_eq!(renderer.cache().len(), 4);
}

#[test]
fn neighbouring_pixels_share_corner_samples() {
    let renderer = default_world_renderer(Sampling::Adaptive {
        max_passes: 0,
        max_delta: 0.05,
    });

    renderer.render_pixel(5, 5);
    renderer.render_pixel(6, 5);
    renderer.render_pixel(5, 6);
    renderer.render_pixel(6, 6);

    // A 2x2 block of pixels has a 3x3 lattice of corners.
    assert_eq!(renderer.cache().len(), 9);
}

#[test]
fn adaptive_render_covers_canvas() {
    let renderer = default_world_renderer(Sampling::Adaptive {
        max_passes: 2,
        max_delta: 0.05,
    });
    let image = renderer.render();

    assert_eq!((image.width, image.height), (11, 11));

    // Corners of the canvas see only the background.
    assert_eq!(image.read_pixel(0, 0).unwrap(), Color::black());
    assert!(renderer.cache().len() >= 12 * 12);
}
