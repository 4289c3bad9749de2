// src/effective_field/four_spin.rs
//
// Four-spin interaction on first-shell plaquettes i-j-k-l (k diagonal to i).
//
//   Q = (s_i.s_j)(s_k.s_l) + (s_i.s_l)(s_j.s_k) - (s_i.s_k)(s_j.s_l)
//   E = -K sum_plaquettes Q
//   F_i = K sum_{plaquettes at i} [s_j (s_k.s_l) + s_l (s_j.s_k) - s_k (s_j.s_l)]
//
// Plaquettes are listed once per corner, so the energy sum carries a 1/4.

use crate::neighbours::FourSpinTable;
use crate::vec3::{add_scaled, dot, Vec3};

#[inline]
pub fn four_spin_field_at(i: usize, spins: &[Vec3], table: &FourSpinTable, k: f64) -> Vec3 {
    let mut f = [0.0; 3];
    for &[j, kk, l] in table.plaquettes(i) {
        let (sj, sk, sl) = (spins[j], spins[kk], spins[l]);
        add_scaled(&mut f, k * dot(sk, sl), sj);
        add_scaled(&mut f, k * dot(sj, sk), sl);
        add_scaled(&mut f, -k * dot(sj, sl), sk);
    }
    f
}

pub fn four_spin_energy(spins: &[Vec3], table: &FourSpinTable, k: f64) -> f64 {
    if k == 0.0 {
        return 0.0;
    }
    let mut e = 0.0;
    for (i, &si) in spins.iter().enumerate() {
        for &[j, kk, l] in table.plaquettes(i) {
            let (sj, sk, sl) = (spins[j], spins[kk], spins[l]);
            let q = dot(si, sj) * dot(sk, sl) + dot(si, sl) * dot(sj, sk) - dot(si, sk) * dot(sj, sl);
            e -= 0.25 * k * q;
        }
    }
    e
}
