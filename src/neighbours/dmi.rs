// src/neighbours/dmi.rs
//
// DMI normal vectors, one per bond of the DMI shells, aligned with the shell
// tables. Both conventions are antisymmetric by construction: d(j,i) = -d(i,j).

use super::shells::ShellTable;
use crate::geometry::Geometry;
use crate::vec3::{add, cross, dot, norm, scale, sub, Vec3, DEFAULT_AXIS};

use serde::{Deserialize, Serialize};

/// How the DMI vector of a bond is derived from the bond direction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DmiConvention {
    /// d = r_hat x axis, with a fixed global axis.
    Bulk {
        #[serde(default = "default_axis")]
        axis: Vec3,
    },
    /// d = r_hat x n, with n the normal of an interface plane, signed by the side
    /// of the plane the bond midpoint lies on. `point` defaults to the lattice centre.
    Surface {
        #[serde(default = "default_axis")]
        normal: Vec3,
        #[serde(default)]
        point: Option<Vec3>,
    },
}

fn default_axis() -> Vec3 {
    DEFAULT_AXIS
}

impl Default for DmiConvention {
    fn default() -> Self {
        DmiConvention::Bulk { axis: DEFAULT_AXIS }
    }
}

/// DMI vectors per shell, indexed like `Shell::entries`.
#[derive(Debug, Clone, Default)]
pub struct DmiTable {
    normals: Vec<Vec<Vec3>>,
}

impl DmiTable {
    pub fn n_shells(&self) -> usize {
        self.normals.len()
    }

    /// Normals of atom `i` in shell `k`, parallel to `shells.shell(k).neighbours(i)`.
    #[inline]
    pub fn normals<'a>(&'a self, shells: &ShellTable, k: usize, i: usize) -> &'a [Vec3] {
        &self.normals[k][shells.shell(k).range(i)]
    }
}

/// First non-negligible component decides; used to pick one bond of a {+r, -r} pair.
pub(crate) fn lexicographically_positive(r: Vec3, tol: f64) -> bool {
    for c in r {
        if c > tol {
            return true;
        }
        if c < -tol {
            return false;
        }
    }
    false
}

/// Unit vector or zero; never the default-axis fallback, which would break antisymmetry.
fn unit_or_zero(v: Vec3, i: usize, j: usize) -> Vec3 {
    let n = norm(v);
    if n <= 1e-12 {
        tracing::debug!(i, j, "DMI bond parallel to its reference axis, normal set to zero");
        return [0.0; 3];
    }
    scale(v, 1.0 / n)
}

/// Side of the interface plane for bond i -> j. Evaluated from the lower index
/// (or, for self-image bonds, from the lexicographically positive direction) so
/// that both directions of a bond agree on the midpoint.
fn plane_side(
    positions: &[Vec3],
    i: usize,
    j: usize,
    bond: Vec3,
    normal: Vec3,
    point: Vec3,
    tol: f64,
) -> f64 {
    let from_i = i < j || (i == j && lexicographically_positive(bond, tol));
    let midpoint = if from_i {
        add(positions[i], scale(bond, 0.5))
    } else {
        sub(positions[j], scale(bond, 0.5))
    };
    let h = dot(sub(midpoint, point), normal);
    if h < -tol {
        -1.0
    } else {
        1.0
    }
}

/// Build DMI normals for the first `n_shells` shells.
pub fn build_dmi_normals(
    convention: DmiConvention,
    geometry: &Geometry,
    shells: &ShellTable,
    n_shells: usize,
) -> DmiTable {
    let n_shells = n_shells.min(shells.n_shells());
    let positions = geometry.positions();
    let tol = geometry.distance_tolerance();

    let mut normals = Vec::with_capacity(n_shells);
    for k in 0..n_shells {
        let shell = shells.shell(k);
        let mut table = Vec::with_capacity(shell.entries().len());
        for i in 0..shell.n_atoms() {
            for n in shell.neighbours(i) {
                let r_hat = scale(n.bond, 1.0 / norm(n.bond));
                let d = match convention {
                    DmiConvention::Bulk { axis } => unit_or_zero(cross(r_hat, axis), i, n.j),
                    DmiConvention::Surface { normal, point } => {
                        let point = point.unwrap_or_else(|| geometry.center());
                        let side = plane_side(positions, i, n.j, n.bond, normal, point, tol);
                        unit_or_zero(cross(r_hat, scale(normal, side)), i, n.j)
                    }
                };
                table.push(d);
            }
        }
        normals.push(table);
    }

    DmiTable { normals }
}
