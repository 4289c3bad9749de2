// src/neighbours/four_spin.rs
//
// Four-spin plaquettes: closed 4-cycles i-j-k-l of first-shell bonds, with k
// diagonal to i. Built purely from the first shell table, no geometry queries.
//
// Every plaquette is stored once per corner atom (four times overall), with a
// single orientation per corner: (j, k, l) and (l, k, j) describe the same cycle.

use super::shells::{Shell, ShellTable};
use crate::vec3::{add, norm, sub};

#[derive(Debug, Clone, Default)]
pub struct FourSpinTable {
    offsets: Vec<usize>,
    plaquettes: Vec<[usize; 3]>,
}

impl FourSpinTable {
    /// Plaquettes (j, k, l) with corner `i`.
    #[inline]
    pub fn plaquettes(&self, i: usize) -> &[[usize; 3]] {
        &self.plaquettes[self.offsets[i]..self.offsets[i + 1]]
    }

    pub fn n_atoms(&self) -> usize {
        self.offsets.len().saturating_sub(1)
    }

    /// Number of stored (per-corner) entries; four per distinct plaquette.
    pub fn len(&self) -> usize {
        self.plaquettes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plaquettes.is_empty()
    }
}

fn plaquettes_of(shell: &Shell, i: usize, tol: f64) -> Vec<[usize; 3]> {
    let first = shell.neighbours(i);
    let mut found = Vec::new();

    // Unordered (j, l) pairs fix the orientation.
    for (a, nj) in first.iter().enumerate() {
        for nl in &first[a + 1..] {
            // Opposite bonds cannot close a rhombus.
            if norm(add(nj.bond, nl.bond)) < tol {
                continue;
            }
            for nk in shell.neighbours(nj.j) {
                let diagonal = add(nj.bond, nk.bond);
                if norm(diagonal) < tol {
                    continue;
                }
                let closes = shell
                    .neighbours(nl.j)
                    .iter()
                    .any(|m| m.j == nk.j && norm(sub(add(nl.bond, m.bond), diagonal)) < tol);
                if closes {
                    found.push([nj.j, nk.j, nl.j]);
                }
            }
        }
    }
    found
}

/// Enumerate plaquettes from the first shell. Atoms with more than `max_count`
/// plaquettes are truncated with a warning.
pub fn build_four_spin(shells: &ShellTable, max_count: usize) -> FourSpinTable {
    if shells.n_shells() == 0 {
        return FourSpinTable::default();
    }
    let shell = shells.shell(0);
    let tol = 1e-5 * shell.radius();
    let n_atoms = shell.n_atoms();

    let mut offsets = Vec::with_capacity(n_atoms + 1);
    let mut plaquettes = Vec::new();
    offsets.push(0);
    let mut truncated = 0usize;

    for i in 0..n_atoms {
        let mut found = plaquettes_of(shell, i, tol);
        if found.len() > max_count {
            truncated += 1;
            found.truncate(max_count);
        }
        plaquettes.extend(found);
        offsets.push(plaquettes.len());
    }

    if truncated > 0 {
        tracing::warn!(
            atoms = truncated,
            max_count,
            "four-spin plaquette count exceeded the limit, extra plaquettes dropped"
        );
    }

    FourSpinTable { offsets, plaquettes }
}
