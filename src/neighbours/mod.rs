// src/neighbours/mod.rs
//
// Interaction topology: everything the Hamiltonian needs to know about which
// sites talk to which. Built once per geometry and shared read-only afterwards.

pub mod dipole;
pub mod dmi;
pub mod four_spin;
pub mod shells;

pub use dipole::{
    build_dipole_pairs, dipole_neighbours, dipole_pairs_from_neighbours, DipoleNeighbour,
    DipoleNeighbours, DipolePair, DipolePairTable,
};
pub use dmi::{build_dmi_normals, DmiConvention, DmiTable};
pub use four_spin::{build_four_spin, FourSpinTable};
pub use shells::{
    build_shells, max_neighbours_per_shell, shell_radii, AtomScope, Neighbour, Shell, ShellTable,
};

use crate::error::{EngineError, Result};
use crate::geometry::Geometry;
use crate::params::HamiltonianParameters;
use crate::vec3::Vec3;

/// Translations of the whole box along periodic axes.
pub fn boundary_vectors(geometry: &Geometry) -> Vec<Vec3> {
    geometry.boundary_vectors()
}

#[derive(Debug, Clone, Default)]
pub struct Topology {
    pub shells: ShellTable,
    pub dmi: Option<DmiTable>,
    pub four_spin: Option<FourSpinTable>,
    pub dipole: Option<DipolePairTable>,
}

impl Topology {
    pub fn build(geometry: &Geometry, params: &HamiltonianParameters) -> Result<Self> {
        let n_shells = params.n_shells();
        let radii = shell_radii(geometry, n_shells);
        if radii.len() < n_shells {
            return Err(EngineError::ShellCountExceeded {
                requested: n_shells,
                available: radii.len(),
            });
        }

        let shells = build_shells(geometry, &radii, AtomScope::All);

        let dmi = (!params.dmi.is_empty())
            .then(|| build_dmi_normals(params.dmi_convention, geometry, &shells, params.dmi.len()));

        let four_spin = (params.four_spin != 0.0).then(|| {
            let n1 = shells.shell(0).max_count();
            build_four_spin(&shells, n1 * n1.saturating_sub(1))
        });

        let dipole = (params.ddi_radius > 0.0).then(|| build_dipole_pairs(geometry, params.ddi_radius));

        tracing::debug!(
            shells = shells.n_shells(),
            radii = ?radii,
            plaquettes = four_spin.as_ref().map_or(0, |t| t.len() / 4),
            dipole_pairs = dipole.as_ref().map_or(0, |t| t.len()),
            "topology built"
        );

        Ok(Self {
            shells,
            dmi,
            four_spin,
            dipole,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn too_many_shells_is_rejected() {
        let g = Geometry::simple_cubic([2, 1, 1], 1.0, [false; 3]).unwrap();
        let params = HamiltonianParameters {
            exchange: vec![1.0, 0.5],
            ..Default::default()
        };
        match Topology::build(&g, &params) {
            Err(EngineError::ShellCountExceeded { requested, available }) => {
                assert_eq!(requested, 2);
                assert_eq!(available, 1);
            }
            other => panic!("expected ShellCountExceeded, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn optional_tables_follow_parameters() {
        let g = Geometry::square(4, 4, 1.0, [true, true]).unwrap();
        let plain = Topology::build(&g, &HamiltonianParameters::default()).unwrap();
        assert!(plain.dmi.is_none() && plain.four_spin.is_none() && plain.dipole.is_none());

        let params = HamiltonianParameters {
            dmi: vec![0.2],
            four_spin: 0.05,
            ddi_radius: 1.5,
            ..Default::default()
        };
        let full = Topology::build(&g, &params).unwrap();
        assert_eq!(full.dmi.as_ref().map(|d| d.n_shells()), Some(1));
        assert_eq!(full.four_spin.as_ref().map(|t| t.plaquettes(0).len()), Some(4));
        // 4 nearest + 4 diagonal neighbours, each pair once.
        assert_eq!(full.dipole.as_ref().map(|t| t.len()), Some(16 * 8 / 2));
    }
}
