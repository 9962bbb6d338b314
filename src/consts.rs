// Runtime defaults (overridable from the command line or the scene file)
pub const DEFAULT_THREADS: usize = 4;
pub const DEFAULT_CANVAS_WIDTH: usize = 200;
pub const DEFAULT_CANVAS_HEIGHT: usize = 100;
pub const DEFAULT_OUT_FILE: &str = "./out.ppm";

// Floating point comparisons, also the over/under point offset
pub const FEQ_EPSILON: f64 = 0.0001;

// Maximum recursion depth for reflection and refraction
pub const RECURSION_DEPTH: usize = 5;

// Adaptive sampler defaults
pub const DEFAULT_MAX_PASSES: usize = 3;
pub const DEFAULT_MAX_DELTA: f64 = 0.05;

// Groups with at least this many children are split by `divide`
pub const DEFAULT_DIVIDE_THRESHOLD: usize = 4;

// Common refraction indices
pub const VACUUM_RI: f64 = 1.0;
pub const GLASS_RI: f64 = 1.5;
