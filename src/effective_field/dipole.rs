// src/effective_field/dipole.rs
//
// Direct-sum dipole-dipole interaction over the pair table (no FFT, no Ewald).
//
//   E = -sum_pairs c / r^3 [3 (s_i.n)(s_j.n) - s_i.s_j],  c = mu_0 mu_B^2 mu_s^2 / (4 pi)
//
// Pairs are stored once, so the field is scattered to both ends. Self-image
// pairs (i == j) contribute twice to the same site, as the derivative requires.

use crate::neighbours::DipolePairTable;
use crate::vec3::{add_scaled, dot, Vec3};

#[inline]
fn pair_field(partner: Vec3, normal: Vec3, strength: f64) -> Vec3 {
    let p = 3.0 * dot(partner, normal);
    [
        strength * (p * normal[0] - partner[0]),
        strength * (p * normal[1] - partner[1]),
        strength * (p * normal[2] - partner[2]),
    ]
}

/// Scatter the dipolar field into `out` (accumulates).
pub fn add_dipole_field(spins: &[Vec3], table: &DipolePairTable, prefactor: f64, out: &mut [Vec3]) {
    for pair in &table.pairs {
        let strength = prefactor * pair.magnitude;
        let fi = pair_field(spins[pair.j], pair.normal, strength);
        let fj = pair_field(spins[pair.i], pair.normal, strength);
        add_scaled(&mut out[pair.i], 1.0, fi);
        add_scaled(&mut out[pair.j], 1.0, fj);
    }
}

pub fn dipole_energy(spins: &[Vec3], table: &DipolePairTable, prefactor: f64) -> f64 {
    let mut e = 0.0;
    for pair in &table.pairs {
        let (si, sj) = (spins[pair.i], spins[pair.j]);
        let n = pair.normal;
        e -= prefactor * pair.magnitude * (3.0 * dot(si, n) * dot(sj, n) - dot(si, sj));
    }
    e
}
