// src/optimizer/mod.rs
//
// Optimizers move the spins of every image given the virtual forces (ds/dt)
// computed by a method. They own their private state (velocities, RNGs,
// scratch configurations) and never touch the Hamiltonian.

pub mod sib2;
pub mod vp;

pub use sib2::OptimizerSib2;
pub use vp::{OptimizerVp, VpBranch};

use crate::chain::Chain;
use crate::error::{EngineError, Result};
use crate::method::Method;
use crate::params::LlgParameters;
use crate::vec3::{cross, dot, norm, normalize, scale, tangential, Vec3};
use crate::vector_field::VectorField;

use serde::{Deserialize, Serialize};

pub trait Optimizer: Send {
    /// Advance every image by one step. `forces_virtual` was computed by
    /// `method` for the current configurations.
    fn iteration(&mut self, method: &mut dyn Method, chain: &mut Chain, forces_virtual: &[VectorField]) -> Result<()>;

    fn name(&self) -> &'static str;

    fn full_name(&self) -> &'static str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizerKind {
    /// Velocity projection: a fast minimizer.
    #[default]
    Vp,
    /// Semi-implicit midpoint scheme: stochastic dynamics.
    Sib2,
}

/// Construct an optimizer for a chain of the given shape.
pub fn build_optimizer(kind: OptimizerKind, n_images: usize, nos: usize, parameters: &LlgParameters) -> Box<dyn Optimizer> {
    match kind {
        OptimizerKind::Vp => Box::new(OptimizerVp::new(n_images, nos, parameters.dt, parameters.vp_mass)),
        OptimizerKind::Sib2 => Box::new(OptimizerSib2::new(n_images, nos, parameters.dt, parameters.seed)),
    }
}

pub(crate) fn check_dims(chain: &Chain, forces_virtual: &[VectorField], n_images: usize, nos: usize) -> Result<()> {
    if chain.n_images() != n_images {
        return Err(EngineError::ImageCountMismatch {
            expected: n_images,
            found: chain.n_images(),
        });
    }
    if forces_virtual.len() != n_images {
        return Err(EngineError::ImageCountMismatch {
            expected: n_images,
            found: forces_virtual.len(),
        });
    }
    if chain.nos() != nos {
        return Err(EngineError::SiteCountMismatch {
            expected: nos,
            found: chain.nos(),
        });
    }
    Ok(())
}

/// Cayley transform: solves s' = s + a x (s + s') for s'.
///
///   s' = ((1 - |a|^2) s + 2 a x s + 2 (a.s) a) / (1 + |a|^2)
///
/// Preserves |s| exactly; for a perpendicular to s it rotates s about a by 2 atan|a|.
#[inline]
pub fn cayley_rotate(s: Vec3, a: Vec3) -> Vec3 {
    let a2 = dot(a, a);
    let axs = cross(a, s);
    let a_s = dot(a, s);
    let inv = 1.0 / (1.0 + a2);
    [
        ((1.0 - a2) * s[0] + 2.0 * axs[0] + 2.0 * a_s * a[0]) * inv,
        ((1.0 - a2) * s[1] + 2.0 * axs[1] + 2.0 * a_s * a[1]) * inv,
        ((1.0 - a2) * s[2] + 2.0 * axs[2] + 2.0 * a_s * a[2]) * inv,
    ]
}

/// Half-step rotation vector a = A dt / 2 for a velocity v = A x s (v tangent to s).
#[inline]
pub fn half_step_axis(s: Vec3, v: Vec3, dt: f64) -> Vec3 {
    scale(cross(s, v), 0.5 * dt)
}

/// Rotate unit `s` along the tangential part of `displacement` by its length.
#[inline]
pub fn rotate_along(s: Vec3, displacement: Vec3) -> Vec3 {
    let t = tangential(displacement, s);
    let theta = norm(t);
    if theta < 1e-300 {
        return s;
    }
    let (sin_t, cos_t) = theta.sin_cos();
    let k = sin_t / theta;
    normalize([
        cos_t * s[0] + k * t[0],
        cos_t * s[1] + k * t[1],
        cos_t * s[2] + k * t[2],
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cayley_preserves_norm_for_any_axis() {
        let s = normalize([0.3, -0.2, 0.9]);
        for a in [[0.0, 0.0, 0.0], [1.0, 2.0, 3.0], [-0.01, 0.5, 0.0], [100.0, 0.0, -3.0]] {
            let out = cayley_rotate(s, a);
            assert!((norm(out) - 1.0).abs() < 1e-14, "a = {:?}", a);
        }
    }

    #[test]
    fn cayley_rotation_angle() {
        // a perpendicular to s: rotation by 2 atan |a|.
        let s = [1.0, 0.0, 0.0];
        let a = [0.0, 0.0, 0.3];
        let out = cayley_rotate(s, a);
        let theta = 2.0 * 0.3f64.atan();
        assert!((out[0] - theta.cos()).abs() < 1e-15);
        assert!((out[1] - theta.sin()).abs() < 1e-15);
    }

    #[test]
    fn half_step_axis_reproduces_velocity() {
        let s = normalize([0.1, 0.4, 0.9]);
        let v = tangential([0.7, -0.3, 0.2], s);
        let a = half_step_axis(s, v, 2.0);
        let back = cross(a, s);
        for d in 0..3 {
            assert!((back[d] - v[d]).abs() < 1e-14);
        }
    }

    #[test]
    fn rotate_along_moves_by_the_tangential_length() {
        let s = [0.0, 0.0, 1.0];
        let out = rotate_along(s, [0.5, 0.0, 7.0]);
        assert!((out[0] - 0.5f64.sin()).abs() < 1e-15);
        assert!((out[2] - 0.5f64.cos()).abs() < 1e-15);
        assert_eq!(rotate_along(s, [0.0, 0.0, 1.0]), s);
    }
}
