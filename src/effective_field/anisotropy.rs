// src/effective_field/anisotropy.rs
//
// Uniaxial anisotropy with easy axis n.
//
//   E = -K (n . s)^2
//   F = 2 K (n . s) n

use crate::vec3::{dot, scale, Vec3};

#[inline]
pub fn anisotropy_field_at(s: Vec3, k: f64, normal: Vec3) -> Vec3 {
    scale(normal, 2.0 * k * dot(normal, s))
}

pub fn anisotropy_energy(spins: &[Vec3], k: f64, normal: Vec3) -> f64 {
    if k == 0.0 {
        return 0.0;
    }
    -k * spins
        .iter()
        .map(|s| {
            let p = dot(normal, *s);
            p * p
        })
        .sum::<f64>()
}
