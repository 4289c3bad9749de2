// src/constants.rs
//
// Physical constants in the unit system used throughout the crate:
// energies in meV, fields in Tesla, lengths in Angstrom, time in picoseconds.

/// Bohr magneton, meV / T.
pub const MU_B: f64 = 0.057_883_817_555;

/// Vacuum permeability, T^2 m^3 / meV.
pub const MU_0: f64 = 2.013_354_5e-28;

/// Boltzmann constant, meV / K.
pub const K_B: f64 = 0.086_173_303_50;

/// Electron gyromagnetic ratio, rad / (ps T).
pub const GAMMA_E: f64 = 0.176_085_964_4;

/// Cubic Angstrom in m^3.
pub const ANGSTROM3: f64 = 1e-30;

/// Prefactor of the dipole-dipole energy for unit moments at 1 Angstrom, meV.
///
///   mu_0 mu_B^2 / (4 pi r^3)
#[inline]
pub fn dipole_prefactor() -> f64 {
    MU_0 * MU_B * MU_B / (4.0 * std::f64::consts::PI * ANGSTROM3)
}
