// src/effective_field/exchange.rs
//
// Isotropic Heisenberg exchange over neighbour shells.
//
//   E = -1/2 sum_i sum_k J_k sum_{j in shell k of i} s_i . s_j
//   F_i = sum_k J_k sum_j s_j
//
// The 1/2 compensates for every bond being listed from both ends.

use crate::neighbours::ShellTable;
use crate::vec3::{add_scaled, dot, Vec3};

#[inline]
pub fn exchange_field_at(i: usize, spins: &[Vec3], shells: &ShellTable, j_ij: &[f64]) -> Vec3 {
    let mut f = [0.0; 3];
    for (shell, &j) in shells.shells().iter().zip(j_ij) {
        if j == 0.0 {
            continue;
        }
        for n in shell.neighbours(i) {
            add_scaled(&mut f, j, spins[n.j]);
        }
    }
    f
}

pub fn exchange_energy(spins: &[Vec3], shells: &ShellTable, j_ij: &[f64]) -> f64 {
    let mut e = 0.0;
    for (i, s) in spins.iter().enumerate() {
        e -= 0.5 * dot(*s, exchange_field_at(i, spins, shells, j_ij));
    }
    e
}
