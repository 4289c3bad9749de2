// src/method/spin_torque.rs
//
// Spin-transfer torque as an additional effective field.
//
// The gradient form needs (j . grad) s per site. It is estimated from the
// first neighbour shell:
//
//   g_i = sum_n (j . b_n) (s_n - s_i) / sum_n (j . b_n)^2
//
// which is the central difference on a Bravais lattice with bonds along j, and
// zero for a site with no bond component along j.

use crate::geometry::Geometry;
use crate::neighbours::{build_shells, shell_radii, AtomScope, Shell, Topology};
use crate::params::SpinTorque;
use crate::vec3::{add, cross, dot, normalize, scale, sub, tangential, Vec3};

/// Directional derivative (j . grad) s at every site, projected onto the
/// tangent plane of the local spin. `direction` must be a unit vector.
pub fn directional_gradient(shell: &Shell, spins: &[Vec3], direction: Vec3, out: &mut [Vec3]) {
    for (i, (g, s)) in out.iter_mut().zip(spins).enumerate() {
        *g = site_gradient(shell, spins, i, *s, direction);
    }
}

fn site_gradient(shell: &Shell, spins: &[Vec3], i: usize, s: Vec3, direction: Vec3) -> Vec3 {
    let mut sum = [0.0; 3];
    let mut weight = 0.0;
    for n in shell.neighbours(i) {
        let projection = dot(direction, n.bond);
        if projection == 0.0 {
            continue;
        }
        sum = add(sum, scale(sub(spins[n.j], s), projection));
        weight += projection * projection;
    }
    if weight == 0.0 {
        return [0.0; 3];
    }
    tangential(scale(sum, 1.0 / weight), s)
}

/// Spin torque prepared for one system: normalised axes and, for the gradient
/// form, the first neighbour shell.
#[derive(Debug, Clone)]
pub struct SpinTorqueField {
    torque: SpinTorque,
    axis: Vec3,
    shell: Option<Shell>,
}

impl SpinTorqueField {
    /// Reuses the first shell of `topology` when present, otherwise builds it.
    pub fn new(torque: SpinTorque, geometry: &Geometry, topology: &Topology) -> Self {
        let (axis, shell) = match torque {
            SpinTorque::Polarised { polarisation, .. } => (normalize(polarisation), None),
            SpinTorque::Gradient { direction, .. } => {
                let shell = match topology.shells.shells().first() {
                    Some(first) => Some(first.clone()),
                    None => {
                        let radii = shell_radii(geometry, 1);
                        build_shells(geometry, &radii, AtomScope::All)
                            .shells()
                            .first()
                            .cloned()
                    }
                };
                if shell.is_none() {
                    tracing::warn!("no neighbours for the spin torque gradient; the torque is zero");
                }
                (normalize(direction), shell)
            }
        };
        Self { torque, axis, shell }
    }

    pub fn torque(&self) -> SpinTorque {
        self.torque
    }

    /// Add the torque field for `spins` to `field`.
    pub fn add_to(&self, spins: &[Vec3], gamma: f64, field: &mut [Vec3]) {
        match self.torque {
            SpinTorque::Polarised { magnitude, .. } => {
                for (f, s) in field.iter_mut().zip(spins) {
                    *f = add(*f, scale(cross(*s, self.axis), magnitude));
                }
            }
            SpinTorque::Gradient { velocity, beta, .. } => {
                let Some(shell) = self.shell.as_ref() else {
                    return;
                };
                let prefactor = -velocity / gamma;
                for (i, (f, s)) in field.iter_mut().zip(spins).enumerate() {
                    let g = site_gradient(shell, spins, i, *s, self.axis);
                    let h = add(cross(*s, g), scale(g, beta));
                    *f = add(*f, scale(h, prefactor));
                }
            }
        }
    }
}
