use std::collections::HashMap;
use std::sync::{ Arc, OnceLock };

use parking_lot::RwLock;

use crate::color::Color;

/// A sample location inside a pixel.
///
/// The location is pixel `(x, y)` offset by `(dx, dy) / divisions`, where
/// `divisions` is a power of two and `0 <= dx, dy < divisions`. It is always
/// kept reduced, so two values naming the same point compare (and hash)
/// equal no matter how they were derived.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct SubPixel {
    x: i64,
    y: i64,
    divisions: i64,
    dx: i64,
    dy: i64,
}

impl SubPixel {
    /// Builds a reduced sub-pixel. Offsets outside `0..divisions` carry into
    /// the pixel coordinates.
    pub fn create(x: i64, y: i64, divisions: i64, dx: i64, dy: i64) -> SubPixel {
        debug_assert!(divisions > 0 && divisions & (divisions - 1) == 0,
                      "divisions must be a power of two");

        let mut p = SubPixel {
            x: x + dx.div_euclid(divisions),
            y: y + dy.div_euclid(divisions),
            divisions,
            dx: dx.rem_euclid(divisions),
            dy: dy.rem_euclid(divisions),
        };

        while p.divisions > 1 && p.dx % 2 == 0 && p.dy % 2 == 0 {
            p.divisions /= 2;
            p.dx /= 2;
            p.dy /= 2;
        }

        p
    }

    /// The center of pixel `(x, y)`.
    pub fn pixel_center(x: i64, y: i64) -> SubPixel {
        SubPixel::create(x, y, 2, 1, 1)
    }

    pub fn x(&self) -> i64 {
        self.x
    }

    pub fn y(&self) -> i64 {
        self.y
    }

    pub fn divisions(&self) -> i64 {
        self.divisions
    }

    pub fn dx(&self) -> i64 {
        self.dx
    }

    pub fn dy(&self) -> i64 {
        self.dy
    }

    /// The four neighbours one step away diagonally, at this point's own
    /// resolution: top-left, top-right, bottom-left, bottom-right.
    pub fn corners(&self) -> [SubPixel; 4] {
        let (x, y, d) = (self.x, self.y, self.divisions);
        [
            SubPixel::create(x, y, d, self.dx - 1, self.dy - 1),
            SubPixel::create(x, y, d, self.dx + 1, self.dy - 1),
            SubPixel::create(x, y, d, self.dx - 1, self.dy + 1),
            SubPixel::create(x, y, d, self.dx + 1, self.dy + 1),
        ]
    }

    /// The midpoint of two sub-pixels.
    pub fn center(a: &SubPixel, b: &SubPixel) -> SubPixel {
        let d = a.divisions.max(b.divisions);

        // Absolute numerators over `d`; their sum is twice the midpoint.
        let nx = a.numerator_x(d) + b.numerator_x(d);
        let ny = a.numerator_y(d) + b.numerator_y(d);

        SubPixel::create(0, 0, 2 * d, nx, ny)
    }

    fn numerator_x(&self, d: i64) -> i64 {
        self.x * d + self.dx * (d / self.divisions)
    }

    fn numerator_y(&self, d: i64) -> i64 {
        self.y * d + self.dy * (d / self.divisions)
    }

    /// Whether the point lies on a pixel boundary, where neighbouring pixels
    /// may sample it too.
    pub fn is_on_edge(&self) -> bool {
        self.dx == 0 || self.dy == 0
    }

    /// The point in canvas coordinates.
    pub fn position(&self) -> (f64, f64) {
        let d = self.divisions as f64;
        (self.x as f64 + self.dx as f64 / d, self.y as f64 + self.dy as f64 / d)
    }
}

/// Anything that can produce a color for a point in canvas coordinates.
pub trait SampleSource {
    fn sample(&self, x: f64, y: f64) -> Color;
}

/// Samples shared by every pixel of a render, safe to use across threads.
///
/// Each entry is rendered at most once: concurrent requests for the same
/// point wait for the first one to finish.
#[derive(Debug, Default)]
pub struct SampleCache {
    samples: RwLock<HashMap<SubPixel, Arc<OnceLock<Color>>>>,
}

impl SampleCache {
    pub fn new() -> SampleCache {
        SampleCache { samples: RwLock::new(HashMap::new()) }
    }

    /// A sample that has already been rendered, if any.
    pub fn get(&self, p: &SubPixel) -> Option<Color> {
        self.samples.read().get(p).and_then(|cell| cell.get().copied())
    }

    /// Returns the sample at `p`, rendering it with `render` if no thread
    /// has yet.
    pub fn get_or_render<F>(&self, p: SubPixel, render: F) -> Color
        where F: FnOnce() -> Color {
        let existing = self.samples.read().get(&p).cloned();
        let cell = match existing {
            Some(cell) => cell,
            None => self.samples.write()
                .entry(p)
                .or_insert_with(|| Arc::new(OnceLock::new()))
                .clone(),
        };

        *cell.get_or_init(render)
    }

    pub fn len(&self) -> usize {
        self.samples.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.read().is_empty()
    }

    pub fn keys(&self) -> Vec<SubPixel> {
        self.samples.read().keys().copied().collect()
    }
}

/// Private sample overlays for the refinement branches of one pixel.
///
/// Each refinement pushes a scope and pops it when the branch returns, which
/// throws away the interior samples it took. Popped maps are kept for reuse.
#[derive(Debug, Default)]
pub struct LocalScopes {
    stack: Vec<HashMap<SubPixel, Color>>,
    pool: Vec<HashMap<SubPixel, Color>>,
}

impl LocalScopes {
    pub fn new() -> LocalScopes {
        LocalScopes { stack: Vec::new(), pool: Vec::new() }
    }

    pub fn push(&mut self) {
        let scope = self.pool.pop().unwrap_or_default();
        self.stack.push(scope);
    }

    pub fn pop(&mut self) {
        if let Some(mut scope) = self.stack.pop() {
            scope.clear();
            self.pool.push(scope);
        }
    }

    pub fn is_active(&self) -> bool {
        !self.stack.is_empty()
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Looks through every active scope, innermost first.
    pub fn get(&self, p: &SubPixel) -> Option<Color> {
        self.stack.iter().rev().find_map(|scope| scope.get(p).copied())
    }

    /// Stores a sample in the innermost scope.
    pub fn insert(&mut self, p: SubPixel, color: Color) {
        if let Some(scope) = self.stack.last_mut() {
            scope.insert(p, color);
        }
    }
}

/// How each pixel is turned into samples.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Sampling {
    /// One ray through the pixel center.
    Direct,

    /// Recursive quadrant refinement. `max_passes` bounds the refinement
    /// depth and `max_delta` is the per-channel tolerance for a quad to be
    /// considered converged.
    Adaptive { max_passes: usize, max_delta: f64 },
}

/// Adaptive quadrant-refinement sampling of one pixel.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct AdaptiveSampler {
    pub max_passes: usize,
    pub max_delta: f64,
}

impl AdaptiveSampler {
    pub fn new(max_passes: usize, max_delta: f64) -> AdaptiveSampler {
        AdaptiveSampler { max_passes, max_delta }
    }

    /// The color of pixel `(x, y)`.
    ///
    /// Samples on pixel edges, and any taken outside a refinement branch, go
    /// through `cache`; interior samples of refinement branches live in
    /// `scopes` only for as long as their branch.
    pub fn sample_pixel<S: SampleSource>(&self, x: i64, y: i64, source: &S,
        cache: &SampleCache, scopes: &mut LocalScopes) -> Color {
        self.sample_quad(SubPixel::pixel_center(x, y), self.max_passes,
                         source, cache, scopes)
    }

    fn sample_quad<S: SampleSource>(&self, center: SubPixel, remaining: usize,
        source: &S, cache: &SampleCache, scopes: &mut LocalScopes) -> Color {
        let corners = center.corners();
        let mut colors = [Color::black(); 4];
        for (color, corner) in colors.iter_mut().zip(corners.iter()) {
            *color = self.lookup(*corner, source, cache, scopes);
        }

        let avg = Color::mean(&colors);
        if remaining < 2 {
            return avg;
        }

        let converged = colors.iter().all(|c| c.within(&avg, self.max_delta));
        if converged {
            return avg;
        }

        let center_color = self.lookup(center, source, cache, scopes);
        let weighted = Color::mean(&[
            colors[0], colors[1], colors[2], colors[3], center_color
        ]);

        for i in 0..4 {
            let off_avg = !colors[i].within(&avg, self.max_delta);
            let off_weighted = !colors[i].within(&weighted, self.max_delta);

            if off_avg && off_weighted {
                scopes.push();
                colors[i] = self.sample_quad(
                    SubPixel::center(&corners[i], &center),
                    remaining - 1,
                    source, cache, scopes,
                );
                scopes.pop();
            }
        }

        Color::mean(&colors)
    }

    fn lookup<S: SampleSource>(&self, p: SubPixel, source: &S,
        cache: &SampleCache, scopes: &mut LocalScopes) -> Color {
        let render = || {
            let (x, y) = p.position();
            source.sample(x, y)
        };

        if p.is_on_edge() || !scopes.is_active() {
            return cache.get_or_render(p, render);
        }

        if let Some(c) = scopes.get(&p) {
            return c;
        }
        if let Some(c) = cache.get(&p) {
            return c;
        }

        let c = render();
        scopes.insert(p, c);
        c
    }
}

#[cfg(test)]
use std::sync::atomic::{ AtomicUsize, Ordering };

/// Counts every sample; colors come from a plain function of the position.
#[cfg(test)]
struct CountingSource<F: Fn(f64, f64) -> Color + Sync> {
    samples: AtomicUsize,
    field: F,
}

#[cfg(test)]
impl<F: Fn(f64, f64) -> Color + Sync> CountingSource<F> {
    fn new(field: F) -> CountingSource<F> {
        CountingSource { samples: AtomicUsize::new(0), field }
    }

    fn samples(&self) -> usize {
        self.samples.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
impl<F: Fn(f64, f64) -> Color + Sync> SampleSource for CountingSource<F> {
    fn sample(&self, x: f64, y: f64) -> Color {
        self.samples.fetch_add(1, Ordering::SeqCst);
        (self.field)(x, y)
    }
}

#[test]
fn create_reduces_and_carries() {
    assert_eq!(SubPixel::create(0, 0, 4, 2, 2), SubPixel::create(0, 0, 2, 1, 1));
    assert_eq!(SubPixel::create(3, 4, 8, 0, 0), SubPixel::create(3, 4, 1, 0, 0));

    let p = SubPixel::create(0, 0, 4, 2, 0);
    assert_eq!((p.divisions(), p.dx(), p.dy()), (2, 1, 0));

    let carried = SubPixel::create(0, 0, 2, 2, 0);
    assert_eq!(carried, SubPixel::create(1, 0, 1, 0, 0));

    let negative = SubPixel::create(0, 0, 2, -1, 1);
    assert_eq!((negative.x(), negative.dx()), (-1, 1));
}

#[test]
fn center_of_two_pixel_corners() {
    let c = SubPixel::center(
        &SubPixel::create(0, 0, 1, 0, 0),
        &SubPixel::create(1, 1, 1, 0, 0),
    );

    assert_eq!(c, SubPixel::create(0, 0, 2, 1, 1));
}

#[test]
fn center_across_resolutions() {
    let c = SubPixel::center(
        &SubPixel::create(0, 0, 1, 0, 0),
        &SubPixel::create(0, 0, 2, 1, 1),
    );

    assert_eq!(c, SubPixel::create(0, 0, 4, 1, 1));
    assert_eq!(c.position(), (0.25, 0.25));
}

#[test]
fn corners_of_pixel_center_are_pixel_corners() {
    let corners = SubPixel::pixel_center(0, 0).corners();

    assert_eq!(corners, [
        SubPixel::create(0, 0, 1, 0, 0),
        SubPixel::create(1, 0, 1, 0, 0),
        SubPixel::create(0, 1, 1, 0, 0),
        SubPixel::create(1, 1, 1, 0, 0),
    ]);

    // Neighbouring pixels name their shared corners identically.
    let right = SubPixel::pixel_center(1, 0).corners();
    assert_eq!(right[0], corners[1]);
    assert_eq!(right[2], corners[3]);
}

#[test]
fn edge_and_position() {
    let edge = SubPixel::create(2, 3, 4, 0, 3);
    assert!(edge.is_on_edge());
    assert_eq!(edge.position(), (2.0, 3.75));

    let interior = SubPixel::create(2, 3, 4, 1, 3);
    assert!(!interior.is_on_edge());
}

#[test]
fn local_scopes_are_layered_and_recycled() {
    let p = SubPixel::create(0, 0, 4, 1, 1);
    let q = SubPixel::create(0, 0, 4, 3, 3);
    let mut scopes = LocalScopes::new();

    assert!(!scopes.is_active());
    scopes.insert(p, Color::red());
    assert_eq!(scopes.get(&p), None);

    scopes.push();
    scopes.insert(p, Color::red());
    scopes.push();
    scopes.insert(q, Color::green());
    assert_eq!(scopes.get(&p), Some(Color::red()));
    assert_eq!(scopes.get(&q), Some(Color::green()));

    scopes.pop();
    assert_eq!(scopes.get(&q), None);
    assert_eq!(scopes.depth(), 1);

    // The recycled scope comes back empty.
    scopes.push();
    assert_eq!(scopes.get(&q), None);
    scopes.pop();
    scopes.pop();
    assert!(!scopes.is_active());
}

#[test]
fn shared_cache_renders_each_point_once() {
    let cache = SampleCache::new();
    let p = SubPixel::create(0, 0, 1, 0, 0);
    let renders = AtomicUsize::new(0);

    std::thread::scope(|s| {
        for _ in 0..8 {
            s.spawn(|| {
                let c = cache.get_or_render(p, || {
                    renders.fetch_add(1, Ordering::SeqCst);
                    Color::blue()
                });
                assert_eq!(c, Color::blue());
            });
        }
    });

    assert_eq!(renders.load(Ordering::SeqCst), 1);
    assert_eq!(cache.len(), 1);
    assert_eq!(cache.get(&p), Some(Color::blue()));
}

#[test]
fn uniform_field_takes_four_samples() {
    for &(passes, delta) in [(0, 0.0), (1, 0.0), (3, 0.0), (5, 0.25)].iter() {
        let source = CountingSource::new(|_, _| Color::rgb(0.25, 0.5, 0.75));
        let cache = SampleCache::new();
        let sampler = AdaptiveSampler::new(passes, delta);

        let c = sampler.sample_pixel(3, 7, &source, &cache, &mut LocalScopes::new());

        assert_eq!(c, Color::rgb(0.25, 0.5, 0.75));
        assert_eq!(source.samples(), 4);
    }
}

#[test]
fn single_pass_averages_corners() {
    let source = CountingSource::new(|x, y| {
        if x >= 0.99 && y >= 0.99 { Color::white() } else { Color::black() }
    });
    let cache = SampleCache::new();
    let sampler = AdaptiveSampler::new(1, 0.1);

    let c = sampler.sample_pixel(0, 0, &source, &cache, &mut LocalScopes::new());

    assert_eq!(c, Color::rgb(0.25, 0.25, 0.25));
    assert_eq!(source.samples(), 4);
}

#[test]
fn refinement_reuses_shared_points() {
    // Only the bottom right corner of pixel (0, 0) is white.
    let source = CountingSource::new(|x, y| {
        if x >= 0.99 && y >= 0.99 { Color::white() } else { Color::black() }
    });
    let cache = SampleCache::new();
    let sampler = AdaptiveSampler::new(2, 0.1);

    let c = sampler.sample_pixel(0, 0, &source, &cache, &mut LocalScopes::new());

    // Four corners, the center, then the three edge midpoints and the bottom
    // midpoint found by the four quadrant refinements.
    assert_eq!(source.samples(), 9);
    assert_eq!(cache.len(), 9);
    assert_eq!(c, Color::rgb(0.0625, 0.0625, 0.0625));
}

#[test]
fn interior_refinement_samples_stay_local() {
    let source = CountingSource::new(|x, y| {
        if x >= 0.99 && y >= 0.99 { Color::white() } else { Color::black() }
    });
    let cache = SampleCache::new();
    let sampler = AdaptiveSampler::new(4, 0.1);
    let mut scopes = LocalScopes::new();

    let c = sampler.sample_pixel(0, 0, &source, &cache, &mut scopes);
    assert!(c.r > 0.0 && c.r < 0.25);
    assert!(!scopes.is_active());

    let center = SubPixel::pixel_center(0, 0);
    for p in cache.keys() {
        assert!(p.is_on_edge() || p == center, "{:?} leaked into the shared cache", p);
    }
    assert!(source.samples() > cache.len());
}
