// src/neighbours/dipole.rs
//
// Dipole-dipole pair tables.
//
// Pair convention: (i, j) with i < j for every periodic image inside the radius;
// self-image pairs (i == j) are kept once per {+r, -r}. Each pair carries the
// 1/r^3 magnitude (r in Angstrom) and the unit separation vector i -> j.

use super::dmi::lexicographically_positive;
use super::shells::for_each_neighbour;
use crate::geometry::Geometry;
use crate::vec3::{add, norm, scale, sub, Vec3};

use rayon::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DipolePair {
    pub i: usize,
    pub j: usize,
    /// 1 / r^3 in Angstrom^-3.
    pub magnitude: f64,
    /// Unit vector from i to the image of j.
    pub normal: Vec3,
}

#[derive(Debug, Clone, Default)]
pub struct DipolePairTable {
    pub radius: f64,
    pub pairs: Vec<DipolePair>,
}

impl DipolePairTable {
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DipoleNeighbour {
    pub j: usize,
    pub bond: Vec3,
    pub distance: f64,
}

/// Every neighbour of every atom within a radius, both directions listed.
#[derive(Debug, Clone, Default)]
pub struct DipoleNeighbours {
    tolerance: f64,
    offsets: Vec<usize>,
    entries: Vec<DipoleNeighbour>,
}

impl DipoleNeighbours {
    pub fn neighbours(&self, i: usize) -> &[DipoleNeighbour] {
        &self.entries[self.offsets[i]..self.offsets[i + 1]]
    }

    pub fn n_atoms(&self) -> usize {
        self.offsets.len().saturating_sub(1)
    }
}

fn pair(i: usize, j: usize, bond: Vec3, d: f64) -> DipolePair {
    DipolePair {
        i,
        j,
        magnitude: 1.0 / (d * d * d),
        normal: scale(bond, 1.0 / d),
    }
}

fn keeps(i: usize, j: usize, bond: Vec3, tol: f64) -> bool {
    i < j || (i == j && lexicographically_positive(bond, tol))
}

fn warn_if_empty(table: &DipolePairTable) {
    if table.is_empty() && table.radius > 0.0 {
        tracing::warn!(radius = table.radius, "no dipole pairs within the cutoff radius");
    }
}

/// Periodic images of the whole box that can hold a partner within `radius`.
fn image_shifts(geometry: &Geometry, radius: f64) -> Vec<Vec3> {
    let window = geometry.translation_window(radius);
    let n_cells = geometry.n_cells();
    let periodic = geometry.periodic();
    let mut reach = [0isize; 3];
    for d in 0..3 {
        if periodic[d] {
            let n = n_cells[d] as isize;
            reach[d] = (window[d] + n - 1) / n;
        }
    }
    let mut shifts = Vec::new();
    for c in -reach[2]..=reach[2] {
        for b in -reach[1]..=reach[1] {
            for a in -reach[0]..=reach[0] {
                shifts.push(geometry.cell_translation([
                    a * n_cells[0] as isize,
                    b * n_cells[1] as isize,
                    c * n_cells[2] as isize,
                ]));
            }
        }
    }
    shifts
}

/// Exhaustive pair search over all periodic images within `radius`.
pub fn build_dipole_pairs(geometry: &Geometry, radius: f64) -> DipolePairTable {
    let tol = geometry.distance_tolerance();
    let positions = geometry.positions();
    let shifts = image_shifts(geometry, radius);
    let nos = geometry.nos();

    let pairs: Vec<DipolePair> = (0..nos)
        .into_par_iter()
        .flat_map_iter(|i| {
            let mut local = Vec::new();
            for j in i..nos {
                let base = sub(positions[j], positions[i]);
                for shift in &shifts {
                    let bond = add(base, *shift);
                    let d = norm(bond);
                    if d <= tol || d > radius + tol || !keeps(i, j, bond, tol) {
                        continue;
                    }
                    local.push(pair(i, j, bond, d));
                }
            }
            local
        })
        .collect();

    let table = DipolePairTable { radius, pairs };
    warn_if_empty(&table);
    table
}

/// Per-atom neighbour enumeration within `radius` using the lattice translation window.
pub fn dipole_neighbours(geometry: &Geometry, radius: f64) -> DipoleNeighbours {
    let nos = geometry.nos();
    let rows: Vec<Vec<DipoleNeighbour>> = (0..nos)
        .into_par_iter()
        .map(|i| {
            let mut row = Vec::new();
            for_each_neighbour(geometry, i, radius, |j, bond, distance| {
                row.push(DipoleNeighbour { j, bond, distance });
            });
            row
        })
        .collect();

    let mut offsets = Vec::with_capacity(nos + 1);
    let mut entries = Vec::new();
    offsets.push(0);
    for row in rows {
        entries.extend(row);
        offsets.push(entries.len());
    }
    DipoleNeighbours {
        tolerance: geometry.distance_tolerance(),
        offsets,
        entries,
    }
}

/// Reduce a (possibly wider) neighbour enumeration to the dipole pair set.
pub fn dipole_pairs_from_neighbours(neighbours: &DipoleNeighbours, radius: f64) -> DipolePairTable {
    let tol = neighbours.tolerance;
    let mut pairs = Vec::new();
    for i in 0..neighbours.n_atoms() {
        for n in neighbours.neighbours(i) {
            if n.distance <= radius + tol && keeps(i, n.j, n.bond, tol) {
                pairs.push(pair(i, n.j, n.bond, n.distance));
            }
        }
    }
    let table = DipolePairTable { radius, pairs };
    warn_if_empty(&table);
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_chain_pairs() {
        let g = Geometry::simple_cubic([4, 1, 1], 2.0, [false; 3]).unwrap();
        let table = build_dipole_pairs(&g, 4.0);
        // Distances 2 (3 pairs) and 4 (2 pairs).
        assert_eq!(table.len(), 5);
        for p in &table.pairs {
            assert!(p.i < p.j);
            assert_eq!(p.normal, [1.0, 0.0, 0.0]);
        }
        let near = table.pairs.iter().filter(|p| (p.magnitude - 0.125).abs() < 1e-15).count();
        assert_eq!(near, 3);
    }

    #[test]
    fn self_images_are_kept_once_per_direction_pair() {
        // One atom, periodic along a: its images at +-1 and +-2 cells.
        let g = Geometry::simple_cubic([1, 1, 1], 1.0, [true, false, false]).unwrap();
        let table = build_dipole_pairs(&g, 2.0);
        assert_eq!(table.len(), 2);
        assert!(table.pairs.iter().all(|p| p.i == 0 && p.j == 0 && p.normal[0] > 0.0));
    }

    #[test]
    fn zero_radius_gives_no_pairs() {
        let g = Geometry::square(3, 3, 1.0, [true, true]).unwrap();
        assert!(build_dipole_pairs(&g, 0.5).is_empty());
    }

    #[test]
    fn neighbour_lists_are_complete_in_both_directions() {
        let g = Geometry::square(4, 4, 1.0, [true, true]).unwrap();
        let nb = dipole_neighbours(&g, 1.5);
        for i in 0..g.nos() {
            assert_eq!(nb.neighbours(i).len(), 8);
        }
    }
}
