// src/effective_field/mod.rs
//
// Effective field F = -dE/ds of the lattice Hamiltonian, in meV.
//
// Local terms (Zeeman, anisotropy, exchange, DMI, four-spin) are gathered per
// site and run in parallel over sites. The dipolar term is scattered from the
// pair table afterwards.

pub mod anisotropy;
pub mod dipole;
pub mod dmi;
pub mod exchange;
pub mod four_spin;
pub mod zeeman;

use crate::constants::{dipole_prefactor, MU_B};
use crate::energy::EnergyBreakdown;
use crate::error::{EngineError, Result};
use crate::neighbours::Topology;
use crate::params::HamiltonianParameters;
use crate::vec3::{add_scaled, try_normalize, Normalized, Vec3};

use rayon::prelude::*;
use std::sync::Arc;

/// Which Hamiltonian terms to include.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldMask {
    pub zeeman: bool,
    pub anisotropy: bool,
    pub exchange: bool,
    pub dmi: bool,
    pub four_spin: bool,
    pub dipole: bool,
}

impl FieldMask {
    pub const ALL: FieldMask = FieldMask {
        zeeman: true,
        anisotropy: true,
        exchange: true,
        dmi: true,
        four_spin: true,
        dipole: true,
    };

    pub const NONE: FieldMask = FieldMask {
        zeeman: false,
        anisotropy: false,
        exchange: false,
        dmi: false,
        four_spin: false,
        dipole: false,
    };
}

impl Default for FieldMask {
    fn default() -> Self {
        FieldMask::ALL
    }
}

fn unit_axis(v: Vec3, what: &'static str) -> Vec3 {
    let (n, outcome) = try_normalize(v);
    if outcome == Normalized::Fallback {
        tracing::warn!(axis = what, "zero-length axis, falling back to +z");
    }
    n
}

#[derive(Debug, Clone)]
pub struct Hamiltonian {
    params: HamiltonianParameters,
    topology: Arc<Topology>,
    nos: usize,
}

impl Hamiltonian {
    pub fn new(params: HamiltonianParameters, topology: Arc<Topology>, nos: usize) -> Result<Self> {
        let n_tables = topology.shells.shells().first().map_or(nos, |s| s.n_atoms());
        if n_tables != nos {
            return Err(EngineError::SiteCountMismatch {
                expected: nos,
                found: n_tables,
            });
        }
        let mut params = params;
        params.external_field_normal = unit_axis(params.external_field_normal, "external_field_normal");
        params.anisotropy_normal = unit_axis(params.anisotropy_normal, "anisotropy_normal");
        Ok(Self { params, topology, nos })
    }

    pub fn nos(&self) -> usize {
        self.nos
    }

    pub fn params(&self) -> &HamiltonianParameters {
        &self.params
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    /// Update the external field magnitude (T). The direction is unchanged.
    pub fn set_external_field_magnitude(&mut self, magnitude: f64) {
        self.params.external_field_magnitude = magnitude;
    }

    fn zeeman_vector(&self) -> Vec3 {
        zeeman::zeeman_field(
            self.params.mu_s * MU_B,
            self.params.external_field_magnitude,
            self.params.external_field_normal,
        )
    }

    fn dipole_strength(&self) -> f64 {
        dipole_prefactor() * self.params.mu_s * self.params.mu_s
    }

    /// Effective field with every term.
    pub fn effective_field(&self, spins: &[Vec3], out: &mut [Vec3]) {
        self.effective_field_masked(spins, out, FieldMask::ALL);
    }

    /// Effective field with a mask controlling which terms are included.
    /// `out` is overwritten.
    pub fn effective_field_masked(&self, spins: &[Vec3], out: &mut [Vec3], mask: FieldMask) {
        debug_assert_eq!(spins.len(), self.nos);
        debug_assert_eq!(out.len(), self.nos);

        let p = &self.params;
        let topo = &*self.topology;
        let b = if mask.zeeman { self.zeeman_vector() } else { [0.0; 3] };
        let with_anisotropy = mask.anisotropy && p.anisotropy_magnitude != 0.0;
        let with_exchange = mask.exchange && !p.exchange.is_empty();
        let dmi = topo.dmi.as_ref().filter(|_| mask.dmi);
        let four_spin = topo.four_spin.as_ref().filter(|_| mask.four_spin);

        out.par_iter_mut().enumerate().for_each(|(i, f)| {
            *f = b;
            if with_anisotropy {
                add_scaled(
                    f,
                    1.0,
                    anisotropy::anisotropy_field_at(spins[i], p.anisotropy_magnitude, p.anisotropy_normal),
                );
            }
            if with_exchange {
                add_scaled(f, 1.0, exchange::exchange_field_at(i, spins, &topo.shells, &p.exchange));
            }
            if let Some(table) = dmi {
                add_scaled(f, 1.0, dmi::dmi_field_at(i, spins, &topo.shells, table, &p.dmi));
            }
            if let Some(table) = four_spin {
                add_scaled(f, 1.0, four_spin::four_spin_field_at(i, spins, table, p.four_spin));
            }
        });

        if let Some(table) = topo.dipole.as_ref().filter(|_| mask.dipole) {
            dipole::add_dipole_field(spins, table, self.dipole_strength(), out);
        }
    }

    /// Energy per term (meV).
    pub fn energy(&self, spins: &[Vec3]) -> EnergyBreakdown {
        let p = &self.params;
        let topo = &*self.topology;
        EnergyBreakdown {
            zeeman: zeeman::zeeman_energy(spins, self.zeeman_vector()),
            anisotropy: anisotropy::anisotropy_energy(spins, p.anisotropy_magnitude, p.anisotropy_normal),
            exchange: exchange::exchange_energy(spins, &topo.shells, &p.exchange),
            dmi: topo
                .dmi
                .as_ref()
                .map_or(0.0, |t| dmi::dmi_energy(spins, &topo.shells, t, &p.dmi)),
            four_spin: topo
                .four_spin
                .as_ref()
                .map_or(0.0, |t| four_spin::four_spin_energy(spins, t, p.four_spin)),
            dipole: topo
                .dipole
                .as_ref()
                .map_or(0.0, |t| dipole::dipole_energy(spins, t, self.dipole_strength())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Geometry;

    fn hamiltonian(g: &Geometry, params: HamiltonianParameters) -> Hamiltonian {
        let topo = Topology::build(g, &params).unwrap();
        Hamiltonian::new(params, Arc::new(topo), g.nos()).unwrap()
    }

    #[test]
    fn ferromagnet_field_is_parallel_to_spins() {
        let g = Geometry::square(4, 4, 1.0, [true, true]).unwrap();
        let params = HamiltonianParameters {
            exchange: vec![2.0, 0.5],
            ..Default::default()
        };
        let h = hamiltonian(&g, params);
        let spins = vec![[0.0, 0.0, 1.0]; g.nos()];
        let mut f = vec![[0.0; 3]; g.nos()];
        h.effective_field(&spins, &mut f);
        for v in &f {
            assert!((v[2] - (4.0 * 2.0 + 4.0 * 0.5)).abs() < 1e-12);
            assert!(v[0].abs() < 1e-15 && v[1].abs() < 1e-15);
        }
        let e = h.energy(&spins);
        assert!((e.exchange + 0.5 * 16.0 * 10.0).abs() < 1e-10, "exchange energy {}", e.exchange);
    }

    #[test]
    fn zeeman_field_scales_with_moment() {
        let g = Geometry::square(2, 2, 1.0, [false, false]).unwrap();
        let params = HamiltonianParameters {
            mu_s: 2.0,
            exchange: vec![],
            external_field_magnitude: 3.0,
            external_field_normal: [0.0, 0.0, 5.0],
            ..Default::default()
        };
        let h = hamiltonian(&g, params);
        let spins = vec![[0.0, 0.0, 1.0]; g.nos()];
        let mut f = vec![[0.0; 3]; g.nos()];
        h.effective_field(&spins, &mut f);
        assert!((f[0][2] - 6.0 * MU_B).abs() < 1e-15);
        assert!((h.energy(&spins).zeeman + 4.0 * 6.0 * MU_B).abs() < 1e-14);
    }

    #[test]
    fn mask_excludes_terms() {
        let g = Geometry::square(3, 3, 1.0, [true, true]).unwrap();
        let params = HamiltonianParameters {
            anisotropy_magnitude: 0.7,
            ..Default::default()
        };
        let h = hamiltonian(&g, params);
        let spins = vec![[0.0, 0.0, 1.0]; g.nos()];
        let mut f = vec![[0.0; 3]; g.nos()];
        let mask = FieldMask {
            anisotropy: true,
            ..FieldMask::NONE
        };
        h.effective_field_masked(&spins, &mut f, mask);
        assert!((f[0][2] - 1.4).abs() < 1e-15);
    }
}
