// src/optimizer/vp.rs
//
// Velocity projection (VP) optimizer.
//
// A fictitious particle of mass m is accelerated by the force. Each step only the
// component of the previous velocity along the current force is kept:
//
//   projection  = <v_prev, f>      (summed over the image)
//   force_norm2 = |f|^2
//   v = (projection / force_norm2) f + f dt / m     if projection > 0
//   v = f dt / m                                    otherwise (reset)
//
// Each spin is then rotated along the tangential part of v_i dt.

use super::{check_dims, rotate_along, Optimizer};
use crate::chain::Chain;
use crate::error::Result;
use crate::method::Method;
use crate::vec3::{dot, scale, Vec3};
use crate::vector_field::VectorField;

use rayon::prelude::*;

/// Which update the last iteration used for an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VpBranch {
    /// Velocity kept its projection on the force.
    Accelerate,
    /// Velocity and force disagreed (or no history): restart from rest.
    Reset,
}

pub struct OptimizerVp {
    dt: f64,
    mass: f64,
    n_images: usize,
    nos: usize,
    velocity: Vec<VectorField>,
    velocity_previous: Vec<VectorField>,
    force_previous: Vec<VectorField>,
    projection: Vec<f64>,
    force_norm2: Vec<f64>,
    branch: Vec<VpBranch>,
}

struct ImageState<'a> {
    velocity: &'a mut VectorField,
    velocity_previous: &'a mut VectorField,
    force_previous: &'a mut VectorField,
    projection: &'a mut f64,
    force_norm2: &'a mut f64,
    branch: &'a mut VpBranch,
}

impl OptimizerVp {
    pub fn new(n_images: usize, nos: usize, dt: f64, mass: f64) -> Self {
        let zeros = vec![vec![[0.0; 3]; nos]; n_images];
        Self {
            dt,
            mass,
            n_images,
            nos,
            velocity: zeros.clone(),
            velocity_previous: zeros.clone(),
            force_previous: zeros,
            projection: vec![0.0; n_images],
            force_norm2: vec![0.0; n_images],
            branch: vec![VpBranch::Reset; n_images],
        }
    }

    pub fn velocity(&self, idx_image: usize) -> &[Vec3] {
        &self.velocity[idx_image]
    }

    pub fn force_previous(&self, idx_image: usize) -> &[Vec3] {
        &self.force_previous[idx_image]
    }

    pub fn branch(&self, idx_image: usize) -> VpBranch {
        self.branch[idx_image]
    }

    pub fn projection(&self, idx_image: usize) -> f64 {
        self.projection[idx_image]
    }

    pub fn force_norm2(&self, idx_image: usize) -> f64 {
        self.force_norm2[idx_image]
    }

    fn step_image(dt: f64, mass: f64, state: ImageState<'_>, spins: &mut [Vec3], force: &[Vec3]) {
        let projection: f64 = state
            .velocity_previous
            .iter()
            .zip(force)
            .map(|(v, f)| dot(*v, *f))
            .sum();
        let force_norm2: f64 = force.iter().map(|f| dot(*f, *f)).sum();

        let accelerate = projection > 0.0 && force_norm2 > 0.0;
        let ratio = if accelerate { projection / force_norm2 } else { 0.0 };
        let kick = dt / mass;

        for ((v, f), s) in state.velocity.iter_mut().zip(force).zip(spins.iter_mut()) {
            *v = scale(*f, ratio + kick);
            *s = rotate_along(*s, scale(*v, dt));
        }

        state.velocity_previous.copy_from_slice(&state.velocity[..]);
        state.force_previous.copy_from_slice(force);
        *state.projection = projection;
        *state.force_norm2 = force_norm2;
        *state.branch = if accelerate { VpBranch::Accelerate } else { VpBranch::Reset };
    }
}

impl Optimizer for OptimizerVp {
    fn iteration(&mut self, _method: &mut dyn Method, chain: &mut Chain, forces_virtual: &[VectorField]) -> Result<()> {
        check_dims(chain, forces_virtual, self.n_images, self.nos)?;
        let (dt, mass) = (self.dt, self.mass);

        self.velocity
            .par_iter_mut()
            .zip(self.velocity_previous.par_iter_mut())
            .zip(self.force_previous.par_iter_mut())
            .zip(self.projection.par_iter_mut())
            .zip(self.force_norm2.par_iter_mut())
            .zip(self.branch.par_iter_mut())
            .zip(chain.images_mut().par_iter_mut())
            .zip(forces_virtual.par_iter())
            .for_each(
                |(((((((velocity, velocity_previous), force_previous), projection), force_norm2), branch), spins), force)| {
                    let state = ImageState {
                        velocity,
                        velocity_previous,
                        force_previous,
                        projection,
                        force_norm2,
                        branch,
                    };
                    Self::step_image(dt, mass, state, spins, force);
                },
            );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "VP"
    }

    fn full_name(&self) -> &'static str {
        "Velocity Projection"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoMethod;

    impl Method for NoMethod {
        fn name(&self) -> &'static str {
            "none"
        }
        fn n_images(&self) -> usize {
            1
        }
        fn nos(&self) -> usize {
            1
        }
        fn calculate_force(&mut self, _: &[VectorField], _: &mut [VectorField]) -> Result<()> {
            Ok(())
        }
        fn calculate_force_virtual(&self, _: &[VectorField], _: &[VectorField], _: &mut [VectorField]) -> Result<()> {
            Ok(())
        }
        fn thermal_field(&self, _: usize, _: &[Vec3], _: &mut [Vec3]) -> Result<()> {
            Ok(())
        }
        fn temperature(&self) -> f64 {
            0.0
        }
        fn converged(&mut self) -> Result<&[bool]> {
            Ok(&[])
        }
        fn hook_pre_iteration(&mut self) -> Result<()> {
            Ok(())
        }
        fn hook_post_iteration(&mut self, _: &Chain) -> Result<()> {
            Ok(())
        }
        fn save_current(&mut self, _: &Chain, _: &str, _: usize, _: bool, _: bool) -> Result<()> {
            Ok(())
        }
        fn max_torque(&self) -> &[f64] {
            &[]
        }
        fn finalize(&mut self) {}
        fn is_finalized(&self) -> bool {
            false
        }
    }

    #[test]
    fn first_step_and_reversed_force_take_the_reset_branch() {
        let dt = 0.1;
        let mut vp = OptimizerVp::new(1, 1, dt, 1.0);
        let mut chain = Chain::new(1, 1);
        let mut method = NoMethod;

        let f = vec![vec![[0.2, 0.0, 0.0]]];
        vp.iteration(&mut method, &mut chain, &f).unwrap();
        assert_eq!(vp.branch(0), VpBranch::Reset);
        assert!((vp.velocity(0)[0][0] - 0.2 * dt).abs() < 1e-15);

        // Same direction: projection kept.
        vp.iteration(&mut method, &mut chain, &f).unwrap();
        assert_eq!(vp.branch(0), VpBranch::Accelerate);
        let expected = 0.2 * (0.2 * dt * 0.2 / 0.04) + 0.2 * dt;
        assert!((vp.velocity(0)[0][0] - expected).abs() < 1e-15);

        // Opposite force: velocity discarded.
        let back = vec![vec![[-0.3, 0.0, 0.0]]];
        vp.iteration(&mut method, &mut chain, &back).unwrap();
        assert_eq!(vp.branch(0), VpBranch::Reset);
        assert!(vp.projection(0) < 0.0);
        assert!((vp.velocity(0)[0][0] + 0.3 * dt).abs() < 1e-15);
    }

    #[test]
    fn spins_stay_normalized() {
        let mut vp = OptimizerVp::new(2, 3, 0.5, 1.0);
        let mut chain = Chain::new(2, 3);
        let f = vec![vec![[1.0, -2.0, 0.5], [0.0, 3.0, 0.0], [0.1, 0.1, 0.1]]; 2];
        for _ in 0..20 {
            vp.iteration(&mut NoMethod, &mut chain, &f).unwrap();
            assert!(chain.max_norm_deviation() < 1e-12);
        }
    }

    #[test]
    fn shape_mismatch_is_rejected() {
        let mut vp = OptimizerVp::new(1, 2, 0.1, 1.0);
        let mut chain = Chain::new(1, 2);
        let f = vec![vec![[0.0; 3]; 2]; 2];
        assert!(vp.iteration(&mut NoMethod, &mut chain, &f).is_err());
    }
}
