// src/vector_field.rs

use crate::vec3::{is_finite, norm, normalize, Vec3};

/// Spin configuration (or any per-site vector quantity): one 3-vector per site.
pub type VectorField = Vec<Vec3>;

/// Set all sites to the same vector.
pub fn set_uniform(field: &mut [Vec3], v: Vec3) {
    for cell in field.iter_mut() {
        *cell = v;
    }
}

/// Fill with zeros.
pub fn zero(field: &mut [Vec3]) {
    set_uniform(field, [0.0; 3]);
}

/// Renormalize every vector to unit length.
pub fn normalize_all(field: &mut [Vec3]) {
    for v in field.iter_mut() {
        *v = normalize(*v);
    }
}

/// Largest deviation of any vector's length from 1.
pub fn max_norm_deviation(field: &[Vec3]) -> f64 {
    field.iter().fold(0.0_f64, |acc, v| acc.max((norm(*v) - 1.0).abs()))
}

pub fn all_finite(field: &[Vec3]) -> bool {
    field.iter().all(|v| is_finite(*v))
}

/// Sum over sites of a . b.
pub fn field_dot(a: &[Vec3], b: &[Vec3]) -> f64 {
    a.iter().zip(b).map(|(x, y)| crate::vec3::dot(*x, *y)).sum()
}
