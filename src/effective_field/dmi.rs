// src/effective_field/dmi.rs
//
// Dzyaloshinskii-Moriya interaction over the DMI shells, with per-bond normals
// d_ij from the topology (d_ji = -d_ij).
//
//   E = -1/2 sum_i sum_k D_k sum_j d_ij . (s_i x s_j)
//   F_i = sum_k D_k sum_j s_j x d_ij

use crate::neighbours::{DmiTable, ShellTable};
use crate::vec3::{add_scaled, cross, dot, Vec3};

#[inline]
pub fn dmi_field_at(i: usize, spins: &[Vec3], shells: &ShellTable, dmi: &DmiTable, d_ij: &[f64]) -> Vec3 {
    let mut f = [0.0; 3];
    for (k, &d) in d_ij.iter().enumerate().take(dmi.n_shells()) {
        if d == 0.0 {
            continue;
        }
        let bonds = shells.shell(k).neighbours(i);
        for (n, normal) in bonds.iter().zip(dmi.normals(shells, k, i)) {
            add_scaled(&mut f, d, cross(spins[n.j], *normal));
        }
    }
    f
}

pub fn dmi_energy(spins: &[Vec3], shells: &ShellTable, dmi: &DmiTable, d_ij: &[f64]) -> f64 {
    // s_i . (s_j x d) = d . (s_i x s_j)
    let mut e = 0.0;
    for (i, s) in spins.iter().enumerate() {
        e -= 0.5 * dot(*s, dmi_field_at(i, spins, shells, dmi, d_ij));
    }
    e
}
