use std::ops::{ Add, AddAssign, Sub, Mul, Div };

use crate::feq;

/// An RGB color.
///
/// Channels are nominally in `0.0..=1.0`, but intermediate shading results
/// may exceed that range; clamping happens only when the canvas is encoded.
///
/// # Examples
///
/// Blend two colors:
///
/// ```
/// # use adaptive_tracer::color::Color;
/// let blend = Color::average(&Color::green(), &Color::blue());
/// assert_eq!(blend, Color::rgb(0.0, 0.5, 0.5));
/// ```
#[derive(Copy, Clone, Debug, Default, PartialOrd)]
pub struct Color {
    pub r: f64,
    pub g: f64,
    pub b: f64,
}

/// Colors are compared component-wise, accounting for floating point error.
impl PartialEq for Color {
    fn eq(&self, other: &Color) -> bool {
        feq(self.r, other.r) &&
            feq(self.g, other.g) &&
            feq(self.b, other.b)
    }
}

/// Takes up to the first three elements of a slice as `r`, `g` and `b`;
/// missing channels default to `0.0`.
impl From<&[f64]> for Color {
    fn from(v: &[f64]) -> Color {
        match v.len() {
            0 => Default::default(),
            1 => Color { r: v[0], ..Default::default() },
            2 => Color { r: v[0], g: v[1], ..Default::default() },
            _ => Color { r: v[0], g: v[1], b: v[2] }
        }
    }
}

impl Color {
    /// Creates a color with red, green and blue values.
    pub fn rgb(r: f64, g: f64, b: f64) -> Color {
        Color { r, g, b }
    }

    pub fn black() -> Color {
        Color::rgb(0.0, 0.0, 0.0)
    }

    pub fn white() -> Color {
        Color::rgb(1.0, 1.0, 1.0)
    }

    pub fn red() -> Color {
        Color::rgb(1.0, 0.0, 0.0)
    }

    pub fn green() -> Color {
        Color::rgb(0.0, 1.0, 0.0)
    }

    pub fn blue() -> Color {
        Color::rgb(0.0, 0.0, 1.0)
    }

    /// Computes the Hadamard (componentwise) product of two colors.
    pub fn hadamard(c1: &Color, c2: &Color) -> Color {
        Color::rgb(c1.r * c2.r, c1.g * c2.g, c1.b * c2.b)
    }

    /// Averages two colors.
    pub fn average(c1: &Color, c2: &Color) -> Color {
        (*c1 + *c2) / 2.0
    }

    /// Averages any number of colors. An empty slice averages to black.
    pub fn mean(colors: &[Color]) -> Color {
        if colors.is_empty() {
            return Color::black();
        }

        let mut sum = Color::black();
        for c in colors {
            sum += *c;
        }

        sum / colors.len() as f64
    }

    /// Checks that every channel differs from `other` by at most `delta`.
    pub fn within(&self, other: &Color, delta: f64) -> bool {
        (self.r - other.r).abs() <= delta
            && (self.g - other.g).abs() <= delta
            && (self.b - other.b).abs() <= delta
    }
}

impl Add<Color> for Color {
    type Output = Color;

    fn add(self, other: Color) -> Self::Output {
        Color::rgb(self.r + other.r, self.g + other.g, self.b + other.b)
    }
}

impl AddAssign<Color> for Color {
    fn add_assign(&mut self, other: Color) {
        *self = *self + other;
    }
}

impl Sub<Color> for Color {
    type Output = Color;

    fn sub(self, other: Color) -> Self::Output {
        Color::rgb(self.r - other.r, self.g - other.g, self.b - other.b)
    }
}

impl Mul<f64> for Color {
    type Output = Color;

    fn mul(self, other: f64) -> Self::Output {
        Color::rgb(self.r * other, self.g * other, self.b * other)
    }
}

impl Mul<Color> for f64 {
    type Output = Color;

    fn mul(self, other: Color) -> Self::Output {
        other * self
    }
}

/// For colors `c1` and `c2`, `c1 * c2` is shorthand for
/// `Color::hadamard(&c1, &c2)`.
impl Mul<Color> for Color {
    type Output = Color;

    fn mul(self, other: Color) -> Self::Output {
        Color::hadamard(&self, &other)
    }
}

impl Div<f64> for Color {
    type Output = Color;

    fn div(self, other: f64) -> Self::Output {
        Color::rgb(self.r / other, self.g / other, self.b / other)
    }
}

#[test]
fn add_colors() {
    let c1 = Color::rgb(0.9, 0.6, 0.75);
    let c2 = Color::rgb(0.7, 0.1, 0.25);

    assert_eq!(c1 + c2, Color::rgb(1.6, 0.7, 1.0));
}

#[test]
fn subtract_colors() {
    let c1 = Color::rgb(0.9, 0.6, 0.75);
    let c2 = Color::rgb(0.7, 0.1, 0.25);

    assert_eq!(c1 - c2, Color::rgb(0.2, 0.5, 0.5));
}

#[test]
fn multiply_colors() {
    let c1 = Color::rgb(1.0, 0.2, 0.4);
    let c2 = Color::rgb(0.9, 1.0, 0.1);

    assert_eq!(c1 * c2, Color::rgb(0.9, 0.2, 0.04));
    assert_eq!(c1 * 2.0, Color::rgb(2.0, 0.4, 0.8));
}

#[test]
fn mean_of_colors() {
    let colors = [Color::red(), Color::green(), Color::blue(), Color::black()];

    assert_eq!(Color::mean(&colors), Color::rgb(0.25, 0.25, 0.25));
    assert_eq!(Color::mean(&[]), Color::black());
}

#[test]
fn within_tolerance_is_per_channel() {
    let base = Color::rgb(0.5, 0.5, 0.5);

    assert!(base.within(&Color::rgb(0.54, 0.46, 0.5), 0.05));
    assert!(!base.within(&Color::rgb(0.5, 0.5, 0.6), 0.05));
    assert!(base.within(&base, 0.0));
}
