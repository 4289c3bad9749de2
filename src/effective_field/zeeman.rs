// src/effective_field/zeeman.rs
//
// Uniform external field acting on every moment.
//
//   E = -mu_s mu_B B (n . s)
//   F = mu_s mu_B B n

use crate::vec3::{dot, scale, Vec3};

/// Zeeman field in energy units (meV) for a moment of `mu_s` Bohr magnetons.
#[inline]
pub fn zeeman_field(mu_s_mu_b: f64, magnitude: f64, normal: Vec3) -> Vec3 {
    scale(normal, mu_s_mu_b * magnitude)
}

pub fn zeeman_energy(spins: &[Vec3], field: Vec3) -> f64 {
    -spins.iter().map(|s| dot(*s, field)).sum::<f64>()
}
