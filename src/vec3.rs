// src/vec3.rs

/// Plain 3-vector used for spins, fields, positions and bond vectors.
pub type Vec3 = [f64; 3];

/// Fallback axis substituted when a zero-length vector is normalised.
pub const DEFAULT_AXIS: Vec3 = [0.0, 0.0, 1.0];

/// 3D vector dot product.
#[inline]
pub fn dot(a: Vec3, b: Vec3) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

/// 3D vector cross product: a × b.
#[inline]
pub fn cross(a: Vec3, b: Vec3) -> Vec3 {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

#[inline]
pub fn norm2(a: Vec3) -> f64 {
    dot(a, a)
}

#[inline]
pub fn norm(a: Vec3) -> f64 {
    dot(a, a).sqrt()
}

#[inline]
pub fn add(a: Vec3, b: Vec3) -> Vec3 {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
}

#[inline]
pub fn sub(a: Vec3, b: Vec3) -> Vec3 {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

#[inline]
pub fn scale(a: Vec3, s: f64) -> Vec3 {
    [a[0] * s, a[1] * s, a[2] * s]
}

/// a += s * b
#[inline]
pub fn add_scaled(a: &mut Vec3, s: f64, b: Vec3) {
    a[0] += s * b[0];
    a[1] += s * b[1];
    a[2] += s * b[2];
}

#[inline]
pub fn is_finite(a: Vec3) -> bool {
    a[0].is_finite() && a[1].is_finite() && a[2].is_finite()
}

/// Outcome of a normalisation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Normalized {
    /// The input had a usable length.
    Exact,
    /// The input was (numerically) zero and `DEFAULT_AXIS` was returned.
    Fallback,
}

/// Normalise a 3D vector to unit length.
///
/// Zero (or denormal) input returns `DEFAULT_AXIS` together with
/// `Normalized::Fallback`; the caller decides whether that deserves a diagnostic.
#[inline]
pub fn try_normalize(v: Vec3) -> (Vec3, Normalized) {
    let n2 = dot(v, v);
    if n2 <= f64::MIN_POSITIVE {
        return (DEFAULT_AXIS, Normalized::Fallback);
    }
    let inv = 1.0 / n2.sqrt();
    ([v[0] * inv, v[1] * inv, v[2] * inv], Normalized::Exact)
}

/// Normalise a 3D vector to unit length. If zero, return (0, 0, 1).
#[inline]
pub fn normalize(v: Vec3) -> Vec3 {
    try_normalize(v).0
}

/// Component of `v` perpendicular to the unit vector `s`.
#[inline]
pub fn tangential(v: Vec3, s: Vec3) -> Vec3 {
    let p = dot(v, s);
    [v[0] - p * s[0], v[1] - p * s[1], v[2] - p * s[2]]
}

/// Largest absolute component over a slice of vectors (infinity norm).
pub fn max_abs_component(field: &[Vec3]) -> f64 {
    field
        .iter()
        .flat_map(|v| v.iter())
        .fold(0.0_f64, |acc, c| acc.max(c.abs()))
}
