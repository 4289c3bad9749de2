// src/neighbours/shells.rs
//
// Neighbour shells: distinct inter-atom distances and, per shell, the bonds of
// every source atom.
//
// Tables are stored CSR-style (offsets + flat entries) so that the field loops
// only ever touch contiguous memory. Bond vectors are built from basis offsets
// plus integer cell translations, so they are the actual vectors to the chosen
// periodic image and never carry a raw box-wrap artefact.

use crate::geometry::Geometry;
use crate::vec3::{norm, Vec3};

use rayon::prelude::*;
use std::ops::Range;

/// Which source atoms a table build should visit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AtomScope {
    All,
    /// Only atoms within reach of a box face. Bulk atoms of a periodic lattice
    /// all share the same neighbourhood, so the border carries the interesting cases.
    BorderOnly,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbour {
    /// Index of the neighbouring site.
    pub j: usize,
    /// Vector from the source site to the neighbour's periodic image (Angstrom).
    pub bond: Vec3,
}

/// One shell: a radius and a CSR table of neighbours per source atom.
#[derive(Debug, Clone)]
pub struct Shell {
    radius: f64,
    offsets: Vec<usize>,
    entries: Vec<Neighbour>,
}

impl Shell {
    pub fn radius(&self) -> f64 {
        self.radius
    }

    /// Neighbours of atom `i` in this shell.
    #[inline]
    pub fn neighbours(&self, i: usize) -> &[Neighbour] {
        &self.entries[self.range(i)]
    }

    /// Position of atom `i`'s entries in the flat table. Tables aligned with the
    /// shell (e.g. DMI normals) index with the same range.
    #[inline]
    pub fn range(&self, i: usize) -> Range<usize> {
        self.offsets[i]..self.offsets[i + 1]
    }

    pub fn entries(&self) -> &[Neighbour] {
        &self.entries
    }

    pub fn n_atoms(&self) -> usize {
        self.offsets.len() - 1
    }

    /// Largest neighbour count of any atom in this shell.
    pub fn max_count(&self) -> usize {
        self.offsets.windows(2).map(|w| w[1] - w[0]).max().unwrap_or(0)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ShellTable {
    shells: Vec<Shell>,
}

impl ShellTable {
    pub fn n_shells(&self) -> usize {
        self.shells.len()
    }

    pub fn shells(&self) -> &[Shell] {
        &self.shells
    }

    pub fn shell(&self, k: usize) -> &Shell {
        &self.shells[k]
    }

    pub fn radii(&self) -> Vec<f64> {
        self.shells.iter().map(|s| s.radius).collect()
    }
}

/// Visit every neighbour of site `i` within `reach` (Angstrom), honouring the
/// periodic flags. The callback receives (neighbour index, bond vector, distance).
pub(crate) fn for_each_neighbour<F>(geometry: &Geometry, i: usize, reach: f64, mut f: F)
where
    F: FnMut(usize, Vec3, f64),
{
    let tol = geometry.distance_tolerance();
    let (ib, cell) = geometry.cell_of(i);
    let window = geometry.translation_window(reach);
    let n_basis = geometry.n_basis();

    for dc in -window[2]..=window[2] {
        for db in -window[1]..=window[1] {
            for da in -window[0]..=window[0] {
                let offset = [da, db, dc];
                let Some(target) = geometry.wrap_cell(cell, offset) else {
                    continue;
                };
                for jb in 0..n_basis {
                    let bond = geometry.bond_vector(ib, jb, offset);
                    let d = norm(bond);
                    if d <= tol || d > reach + tol {
                        continue;
                    }
                    f(geometry.idx(jb, target), bond, d);
                }
            }
        }
    }
}

/// Sorted distinct distances, merging values closer than `tol`.
fn dedup_sorted(mut dists: Vec<f64>, tol: f64) -> Vec<f64> {
    dists.sort_by(|a, b| a.total_cmp(b));
    dists.dedup_by(|later, kept| (*later - *kept).abs() < tol);
    dists
}

/// Radii of the first `n_shells` neighbour shells, ascending.
///
/// Distances are taken from basis atoms under lattice translations within a
/// window of `n_shells` cells per axis (clamped to the box along open axes).
/// A lattice with fewer distinct distances yields a shorter list; that is a
/// property of the lattice, not an error.
pub fn shell_radii(geometry: &Geometry, n_shells: usize) -> Vec<f64> {
    if n_shells == 0 {
        return Vec::new();
    }

    let tol = geometry.distance_tolerance();
    let n_cells = geometry.n_cells();
    let periodic = geometry.periodic();
    let mut window = [0isize; 3];
    for d in 0..3 {
        window[d] = if periodic[d] {
            n_shells as isize
        } else {
            (n_shells as isize).min(n_cells[d] as isize - 1)
        };
    }

    let n_basis = geometry.n_basis();
    let mut dists = Vec::new();
    for ib in 0..n_basis {
        for jb in 0..n_basis {
            for c in -window[2]..=window[2] {
                for b in -window[1]..=window[1] {
                    for a in -window[0]..=window[0] {
                        let d = norm(geometry.bond_vector(ib, jb, [a, b, c]));
                        if d > tol {
                            dists.push(d);
                        }
                    }
                }
            }
        }
    }

    let mut radii = dedup_sorted(dists, tol);
    if radii.len() < n_shells {
        tracing::warn!(
            requested = n_shells,
            available = radii.len(),
            "lattice provides fewer distinct neighbour distances than requested shells"
        );
    }
    radii.truncate(n_shells);
    radii
}

fn shell_index(radii: &[f64], d: f64, tol: f64) -> Option<usize> {
    radii.iter().position(|r| (r - d).abs() < tol)
}

/// Atoms visited for a given scope. `BorderOnly` adds one interior
/// representative per basis atom so that open-boundary maxima are still seen.
fn scoped_atoms(geometry: &Geometry, reach: f64, scope: AtomScope) -> Vec<usize> {
    match scope {
        AtomScope::All => (0..geometry.nos()).collect(),
        AtomScope::BorderOnly => {
            let depth = geometry.translation_window(reach);
            let n_cells = geometry.n_cells();
            let mid = [n_cells[0] / 2, n_cells[1] / 2, n_cells[2] / 2];
            let mut atoms: Vec<usize> = (0..geometry.nos())
                .filter(|&i| geometry.is_border_site(i, depth))
                .collect();
            for ib in 0..geometry.n_basis() {
                let i = geometry.idx(ib, mid);
                if !geometry.is_border_site(i, depth) {
                    atoms.push(i);
                }
            }
            atoms
        }
    }
}

fn count_in_shells(geometry: &Geometry, i: usize, radii: &[f64]) -> Vec<usize> {
    let tol = geometry.distance_tolerance();
    let reach = radii.last().copied().unwrap_or(0.0);
    let mut counts = vec![0usize; radii.len()];
    for_each_neighbour(geometry, i, reach, |_, _, d| {
        if let Some(k) = shell_index(radii, d, tol) {
            counts[k] += 1;
        }
    });
    counts
}

/// Upper bound on the number of neighbours per shell, used to preallocate tables.
pub fn max_neighbours_per_shell(geometry: &Geometry, radii: &[f64], scope: AtomScope) -> Vec<usize> {
    if radii.is_empty() {
        return Vec::new();
    }
    let reach = radii[radii.len() - 1];
    scoped_atoms(geometry, reach, scope)
        .par_iter()
        .map(|&i| count_in_shells(geometry, i, radii))
        .reduce(
            || vec![0usize; radii.len()],
            |mut acc, counts| {
                for (a, c) in acc.iter_mut().zip(counts) {
                    *a = (*a).max(c);
                }
                acc
            },
        )
}

/// Build per-shell neighbour tables. With `AtomScope::BorderOnly`, atoms away
/// from the box faces get empty rows.
pub fn build_shells(geometry: &Geometry, radii: &[f64], scope: AtomScope) -> ShellTable {
    let nos = geometry.nos();
    let n_shells = radii.len();
    if n_shells == 0 {
        return ShellTable::default();
    }

    let tol = geometry.distance_tolerance();
    let reach = radii[n_shells - 1];
    // The interior representative of `scoped_atoms` is for counting only.
    let depth = geometry.translation_window(reach);
    let visit = |i: usize| match scope {
        AtomScope::All => true,
        AtomScope::BorderOnly => geometry.is_border_site(i, depth),
    };

    let per_atom: Vec<Vec<Vec<Neighbour>>> = (0..nos)
        .into_par_iter()
        .map(|i| {
            let mut rows = vec![Vec::new(); n_shells];
            if visit(i) {
                for_each_neighbour(geometry, i, reach, |j, bond, d| {
                    if let Some(k) = shell_index(radii, d, tol) {
                        rows[k].push(Neighbour { j, bond });
                    }
                });
            }
            rows
        })
        .collect();

    let maxima = max_neighbours_per_shell(geometry, radii, AtomScope::BorderOnly);
    let mut shells: Vec<Shell> = radii
        .iter()
        .zip(maxima.iter())
        .map(|(&radius, &max_n)| {
            let mut offsets = Vec::with_capacity(nos + 1);
            offsets.push(0);
            Shell {
                radius,
                offsets,
                entries: Vec::with_capacity(nos * max_n),
            }
        })
        .collect();

    for rows in per_atom {
        for (shell, row) in shells.iter_mut().zip(rows) {
            shell.entries.extend(row);
            shell.offsets.push(shell.entries.len());
        }
    }

    ShellTable { shells }
}
