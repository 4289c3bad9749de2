// src/optimizer/sib2.rs
//
// Semi-implicit midpoint scheme (SIB) for stochastic LLG dynamics.
//
//   predictor:  s_p   = cayley(s, a(s))
//   midpoint:   s_m   = normalize((s + s_p) / 2), forces re-evaluated at s_m
//   corrector:  s_new = cayley(s, a(s_m))
//
// with a = A dt / 2 and v = A x s the virtual force (ds/dt). The thermal field
// is drawn once per iteration and enters both stages as an extra virtual term.
// Every rotation is a Cayley transform, so |s| is preserved exactly.

use super::{cayley_rotate, check_dims, half_step_axis, Optimizer};
use crate::chain::Chain;
use crate::error::Result;
use crate::method::Method;
use crate::vec3::{add, normalize, Vec3};
use crate::vector_field::{zero, VectorField};

use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use rand_xoshiro::Xoshiro256StarStar;
use rayon::prelude::*;

pub struct OptimizerSib2 {
    dt: f64,
    n_images: usize,
    nos: usize,
    stochastic: bool,
    rngs: Vec<Xoshiro256StarStar>,
    xi: Vec<VectorField>,
    thermal: Vec<VectorField>,
    thermal_virtual: Vec<VectorField>,
    midpoint: Vec<VectorField>,
    forces_mid: Vec<VectorField>,
    forces_virtual_mid: Vec<VectorField>,
}

impl OptimizerSib2 {
    /// Image k draws its noise from a generator seeded with `seed + k`.
    pub fn new(n_images: usize, nos: usize, dt: f64, seed: u64) -> Self {
        let zeros = vec![vec![[0.0; 3]; nos]; n_images];
        Self {
            dt,
            n_images,
            nos,
            stochastic: true,
            rngs: (0..n_images)
                .map(|k| Xoshiro256StarStar::seed_from_u64(seed.wrapping_add(k as u64)))
                .collect(),
            xi: zeros.clone(),
            thermal: zeros.clone(),
            thermal_virtual: zeros.clone(),
            midpoint: zeros.clone(),
            forces_mid: zeros.clone(),
            forces_virtual_mid: zeros,
        }
    }

    /// Switch the thermal field on or off. Off forces a deterministic step
    /// regardless of the method's temperature.
    pub fn set_stochastic(&mut self, stochastic: bool) {
        self.stochastic = stochastic;
    }

    /// Standard-normal draws of the last iteration.
    pub fn xi(&self, idx_image: usize) -> &[Vec3] {
        &self.xi[idx_image]
    }

    fn draw_noise(&mut self) {
        self.rngs
            .par_iter_mut()
            .zip(self.xi.par_iter_mut())
            .for_each(|(rng, xi)| {
                for x in xi.iter_mut() {
                    *x = [
                        rng.sample::<f64, _>(StandardNormal),
                        rng.sample::<f64, _>(StandardNormal),
                        rng.sample::<f64, _>(StandardNormal),
                    ];
                }
            });
    }
}

/// Thermal virtual term at `configurations`, or zero when the noise is off.
fn thermal_term(
    method: &dyn Method,
    configurations: &[VectorField],
    thermal: &[VectorField],
    out: &mut [VectorField],
    noisy: bool,
) -> Result<()> {
    if noisy {
        method.calculate_force_virtual(configurations, thermal, out)
    } else {
        out.iter_mut().for_each(|t| zero(t));
        Ok(())
    }
}

impl Optimizer for OptimizerSib2 {
    fn iteration(&mut self, method: &mut dyn Method, chain: &mut Chain, forces_virtual: &[VectorField]) -> Result<()> {
        check_dims(chain, forces_virtual, self.n_images, self.nos)?;
        let dt = self.dt;
        let noisy = self.stochastic && method.has_thermal_noise();

        if noisy {
            self.draw_noise();
            for (idx, (xi, thermal)) in self.xi.iter().zip(self.thermal.iter_mut()).enumerate() {
                method.thermal_field(idx, xi, thermal)?;
            }
        }

        // Predictor and midpoint.
        thermal_term(method, chain.images(), &self.thermal, &mut self.thermal_virtual, noisy)?;
        self.midpoint
            .par_iter_mut()
            .zip(chain.images().par_iter())
            .zip(forces_virtual.par_iter())
            .zip(self.thermal_virtual.par_iter())
            .for_each(|(((mid, spins), virt), thermal)| {
                for (((m, s), v), t) in mid.iter_mut().zip(spins).zip(virt).zip(thermal) {
                    let predicted = cayley_rotate(*s, half_step_axis(*s, add(*v, *t), dt));
                    *m = normalize(add(*s, predicted));
                }
            });

        method.calculate_force(&self.midpoint, &mut self.forces_mid)?;
        method.calculate_force_virtual(&self.midpoint, &self.forces_mid, &mut self.forces_virtual_mid)?;
        thermal_term(method, &self.midpoint, &self.thermal, &mut self.thermal_virtual, noisy)?;

        // Corrector: rotate the original spins with the midpoint term.
        chain
            .images_mut()
            .par_iter_mut()
            .zip(self.midpoint.par_iter())
            .zip(self.forces_virtual_mid.par_iter())
            .zip(self.thermal_virtual.par_iter())
            .for_each(|(((spins, mid), virt), thermal)| {
                for (((s, m), v), t) in spins.iter_mut().zip(mid).zip(virt).zip(thermal) {
                    *s = cayley_rotate(*s, half_step_axis(*m, add(*v, *t), dt));
                }
            });
        Ok(())
    }

    fn name(&self) -> &'static str {
        "SIB2"
    }

    fn full_name(&self) -> &'static str {
        "Semi-implicit midpoint (SIB2)"
    }
}
