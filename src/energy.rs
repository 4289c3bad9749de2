// src/energy.rs

use serde::Serialize;

/// Energy per Hamiltonian term (meV), summed over the lattice.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct EnergyBreakdown {
    pub zeeman: f64,
    pub anisotropy: f64,
    pub exchange: f64,
    pub dmi: f64,
    pub four_spin: f64,
    pub dipole: f64,
}

impl EnergyBreakdown {
    pub fn total(&self) -> f64 {
        self.zeeman + self.anisotropy + self.exchange + self.dmi + self.four_spin + self.dipole
    }

    /// Total energy divided by the number of sites.
    pub fn per_site(&self, nos: usize) -> f64 {
        if nos == 0 {
            0.0
        } else {
            self.total() / nos as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn per_site_divides_the_total() {
        let e = EnergyBreakdown {
            zeeman: -1.0,
            exchange: -8.0,
            dmi: 1.0,
            ..Default::default()
        };
        assert_eq!(e.total(), -8.0);
        assert_eq!(e.per_site(4), -2.0);
        assert_eq!(e.per_site(0), 0.0);
    }
}
