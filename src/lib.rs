pub mod tuple;
pub mod matrix;
pub mod ray;
pub mod bounds;

pub mod shape;
pub mod group;
pub mod csg;
pub mod intersect;

pub mod pattern;
pub mod light;
pub mod world;
pub mod camera;

pub mod color;
pub mod canvas;

pub mod sampler;
pub mod renderer;
pub mod parallel;

pub mod scene;
pub mod obj;

pub mod consts;
pub mod error;
pub mod logger;

use crate::consts::FEQ_EPSILON;

/// Approximate equality for scalars.
pub fn feq(left: f64, right: f64) -> bool {
    (left - right).abs() < FEQ_EPSILON
}
