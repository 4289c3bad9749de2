// src/geometry.rs
//
// Bravais lattice with a basis, replicated n_cells times along the three
// translation vectors.
//
// Conventions:
// - Basis positions and translation vectors are given in units of the lattice
//   constant; every derived quantity (positions, bond vectors, radii) is in Angstrom.
// - Site index = ibasis + n_basis * (a + na * (b + nb * c)).
// - Periodic flags are per translation axis and fixed at construction.

use crate::error::{EngineError, Result};
use crate::vec3::{cross, dot, norm, scale, Vec3};

#[derive(Debug, Clone)]
pub struct Geometry {
    basis: Vec<Vec3>,
    translation_vectors: [Vec3; 3],
    n_cells: [usize; 3],
    lattice_constant: f64,
    periodic: [bool; 3],
    positions: Vec<Vec3>,
}

impl Geometry {
    /// Build a geometry and precompute all site positions.
    pub fn new(
        basis: Vec<Vec3>,
        translation_vectors: [Vec3; 3],
        n_cells: [usize; 3],
        lattice_constant: f64,
        periodic: [bool; 3],
    ) -> Result<Self> {
        if basis.is_empty() {
            return Err(EngineError::InvalidGeometry("basis is empty".into()));
        }
        if n_cells.iter().any(|&n| n == 0) {
            return Err(EngineError::InvalidGeometry(format!(
                "cell counts must be >= 1, got {n_cells:?}"
            )));
        }
        if lattice_constant.is_nan() || lattice_constant <= 0.0 {
            return Err(EngineError::InvalidGeometry(format!(
                "lattice constant must be positive, got {lattice_constant}"
            )));
        }
        let [t0, t1, t2] = translation_vectors;
        let volume = dot(t0, cross(t1, t2));
        if volume.abs() < 1e-12 {
            return Err(EngineError::InvalidGeometry(
                "translation vectors are coplanar".into(),
            ));
        }

        let n_basis = basis.len();
        let nos = n_basis * n_cells[0] * n_cells[1] * n_cells[2];
        let mut positions = Vec::with_capacity(nos);
        for c in 0..n_cells[2] {
            for b in 0..n_cells[1] {
                for a in 0..n_cells[0] {
                    for atom in &basis {
                        let mut p = *atom;
                        for d in 0..3 {
                            p[d] += a as f64 * t0[d] + b as f64 * t1[d] + c as f64 * t2[d];
                        }
                        positions.push(scale(p, lattice_constant));
                    }
                }
            }
        }

        Ok(Self {
            basis,
            translation_vectors,
            n_cells,
            lattice_constant,
            periodic,
            positions,
        })
    }

    /// Simple cubic lattice with one atom per cell.
    pub fn simple_cubic(n_cells: [usize; 3], lattice_constant: f64, periodic: [bool; 3]) -> Result<Self> {
        Self::new(
            vec![[0.0; 3]],
            [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
            n_cells,
            lattice_constant,
            periodic,
        )
    }

    /// Single-layer square lattice (nc = 1, never periodic along c).
    pub fn square(na: usize, nb: usize, lattice_constant: f64, periodic: [bool; 2]) -> Result<Self> {
        Self::simple_cubic([na, nb, 1], lattice_constant, [periodic[0], periodic[1], false])
    }

    /// Single-layer triangular (hexagonal) lattice.
    pub fn triangular(na: usize, nb: usize, lattice_constant: f64, periodic: [bool; 2]) -> Result<Self> {
        Self::new(
            vec![[0.0; 3]],
            [
                [1.0, 0.0, 0.0],
                [0.5, 0.75_f64.sqrt(), 0.0],
                [0.0, 0.0, 1.0],
            ],
            [na, nb, 1],
            lattice_constant,
            [periodic[0], periodic[1], false],
        )
    }

    /// Number of sites.
    #[inline]
    pub fn nos(&self) -> usize {
        self.positions.len()
    }

    #[inline]
    pub fn n_basis(&self) -> usize {
        self.basis.len()
    }

    pub fn basis(&self) -> &[Vec3] {
        &self.basis
    }

    pub fn translation_vectors(&self) -> &[Vec3; 3] {
        &self.translation_vectors
    }

    pub fn n_cells(&self) -> [usize; 3] {
        self.n_cells
    }

    pub fn lattice_constant(&self) -> f64 {
        self.lattice_constant
    }

    pub fn periodic(&self) -> [bool; 3] {
        self.periodic
    }

    pub fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    /// Absolute tolerance used when comparing distances (Angstrom).
    #[inline]
    pub fn distance_tolerance(&self) -> f64 {
        1e-5 * self.lattice_constant
    }

    /// Flat index for basis atom `ibasis` in cell (a, b, c).
    #[inline]
    pub fn idx(&self, ibasis: usize, cell: [usize; 3]) -> usize {
        debug_assert!(ibasis < self.n_basis());
        debug_assert!((0..3).all(|d| cell[d] < self.n_cells[d]));
        ibasis + self.n_basis() * (cell[0] + self.n_cells[0] * (cell[1] + self.n_cells[1] * cell[2]))
    }

    /// Inverse of `idx`.
    #[inline]
    pub fn cell_of(&self, i: usize) -> (usize, [usize; 3]) {
        let nb = self.n_basis();
        let ibasis = i % nb;
        let mut rest = i / nb;
        let a = rest % self.n_cells[0];
        rest /= self.n_cells[0];
        let b = rest % self.n_cells[1];
        let c = rest / self.n_cells[1];
        (ibasis, [a, b, c])
    }

    /// Translation by an integer number of cells, in Angstrom.
    #[inline]
    pub fn cell_translation(&self, cell: [isize; 3]) -> Vec3 {
        let t = &self.translation_vectors;
        let mut v = [0.0; 3];
        for d in 0..3 {
            v[d] = (cell[0] as f64 * t[0][d] + cell[1] as f64 * t[1][d] + cell[2] as f64 * t[2][d])
                * self.lattice_constant;
        }
        v
    }

    /// Bond vector from basis atom `ib` to basis atom `jb` displaced by `cell` cells.
    #[inline]
    pub fn bond_vector(&self, ib: usize, jb: usize, cell: [isize; 3]) -> Vec3 {
        let shift = self.cell_translation(cell);
        let mut r = [0.0; 3];
        for d in 0..3 {
            r[d] = (self.basis[jb][d] - self.basis[ib][d]) * self.lattice_constant + shift[d];
        }
        r
    }

    /// Resolve `cell + offset` into an in-box cell, wrapping along periodic axes.
    /// Returns `None` when the target leaves the box along an open axis.
    #[inline]
    pub fn wrap_cell(&self, cell: [usize; 3], offset: [isize; 3]) -> Option<[usize; 3]> {
        let mut out = [0usize; 3];
        for d in 0..3 {
            let n = self.n_cells[d] as isize;
            let c = cell[d] as isize + offset[d];
            if self.periodic[d] {
                out[d] = c.rem_euclid(n) as usize;
            } else if c < 0 || c >= n {
                return None;
            } else {
                out[d] = c as usize;
            }
        }
        Some(out)
    }

    /// Largest cell offset per axis needed to reach every atom within `reach`
    /// (Angstrom). Open axes are clamped to the box.
    pub fn translation_window(&self, reach: f64) -> [isize; 3] {
        let [t0, t1, t2] = self.translation_vectors;
        let volume = dot(t0, cross(t1, t2)).abs();
        let faces = [cross(t1, t2), cross(t2, t0), cross(t0, t1)];
        let mut window = [0isize; 3];
        for d in 0..3 {
            // Spacing between consecutive lattice planes along axis d.
            let spacing = volume / norm(faces[d]) * self.lattice_constant;
            let w = (reach / spacing).ceil() as isize + 1;
            window[d] = if self.periodic[d] {
                w
            } else {
                w.min(self.n_cells[d] as isize - 1)
            };
        }
        window
    }

    /// Translations of the whole box along the periodic axes
    /// (all {-1, 0, 1} combinations except zero).
    pub fn boundary_vectors(&self) -> Vec<Vec3> {
        let range = |d: usize| if self.periodic[d] { -1..=1 } else { 0..=0 };
        let mut out = Vec::new();
        for k in range(2) {
            for j in range(1) {
                for i in range(0) {
                    if i == 0 && j == 0 && k == 0 {
                        continue;
                    }
                    out.push(self.cell_translation([
                        i * self.n_cells[0] as isize,
                        j * self.n_cells[1] as isize,
                        k * self.n_cells[2] as isize,
                    ]));
                }
            }
        }
        out
    }

    /// Geometric centre of all sites.
    pub fn center(&self) -> Vec3 {
        let n = self.nos() as f64;
        let mut c = [0.0; 3];
        for p in &self.positions {
            for d in 0..3 {
                c[d] += p[d] / n;
            }
        }
        c
    }

    /// Whether site `i` lies within `depth` cells of a box face along any axis
    /// that has more than one cell.
    pub fn is_border_site(&self, i: usize, depth: [isize; 3]) -> bool {
        let (_, cell) = self.cell_of(i);
        (0..3).any(|d| {
            let n = self.n_cells[d] as isize;
            let c = cell[d] as isize;
            n > 1 && (c < depth[d] || c >= n - depth[d])
        })
    }
}
