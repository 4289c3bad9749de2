// src/params.rs
//
// Physical and integration parameters. Units: meV, Tesla, Angstrom, ps, Kelvin.

use crate::constants::{GAMMA_E, MU_B};
use crate::neighbours::DmiConvention;
use crate::vec3::{norm, Vec3, DEFAULT_AXIS};

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

fn all_finite(values: &[f64]) -> bool {
    values.iter().all(|v| v.is_finite())
}

fn validate_hamiltonian(p: &HamiltonianParameters) -> Result<(), ValidationError> {
    if !(p.mu_s.is_finite() && p.mu_s > 0.0) {
        return Err(ValidationError::new("mu_s must be positive"));
    }
    if !(p.ddi_radius.is_finite() && p.ddi_radius >= 0.0) {
        return Err(ValidationError::new("ddi_radius must be >= 0"));
    }
    let scalars = [p.external_field_magnitude, p.anisotropy_magnitude, p.four_spin];
    if !all_finite(&scalars)
        || !all_finite(&p.external_field_normal)
        || !all_finite(&p.anisotropy_normal)
        || !all_finite(&p.exchange)
        || !all_finite(&p.dmi)
    {
        return Err(ValidationError::new("hamiltonian parameters must be finite"));
    }
    Ok(())
}

/// Heisenberg Hamiltonian on the lattice.
///
/// Energy conventions (per spin pair counted once):
/// - Zeeman:      E = -mu_s mu_B B (n . s)
/// - anisotropy:  E = -K (n . s)^2
/// - exchange:    E = -J s_i . s_j
/// - DMI:         E = -D d_ij . (s_i x s_j)
/// - four-spin:   E = -K4 [(s_i.s_j)(s_k.s_l) + (s_i.s_l)(s_j.s_k) - (s_i.s_k)(s_j.s_l)]
/// - dipolar:     E = -C mu_s^2 / r^3 [3 (s_i.r)(s_j.r) - s_i.s_j]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
#[validate(schema(function = "validate_hamiltonian"))]
pub struct HamiltonianParameters {
    /// Magnetic moment per site, in Bohr magnetons.
    pub mu_s: f64,
    /// External field (T).
    pub external_field_magnitude: f64,
    pub external_field_normal: Vec3,
    /// Uniaxial anisotropy (meV).
    pub anisotropy_magnitude: f64,
    pub anisotropy_normal: Vec3,
    /// Exchange constant per shell (meV).
    pub exchange: Vec<f64>,
    /// DMI constant per shell (meV).
    pub dmi: Vec<f64>,
    pub dmi_convention: DmiConvention,
    /// Four-spin constant on first-shell plaquettes (meV). Zero disables.
    pub four_spin: f64,
    /// Dipolar cutoff radius (Angstrom). Zero disables.
    pub ddi_radius: f64,
}

impl Default for HamiltonianParameters {
    fn default() -> Self {
        Self {
            mu_s: 1.0,
            external_field_magnitude: 0.0,
            external_field_normal: DEFAULT_AXIS,
            anisotropy_magnitude: 0.0,
            anisotropy_normal: DEFAULT_AXIS,
            exchange: vec![1.0],
            dmi: Vec::new(),
            dmi_convention: DmiConvention::default(),
            four_spin: 0.0,
            ddi_radius: 0.0,
        }
    }
}

impl HamiltonianParameters {
    /// Number of neighbour shells the pair terms need.
    pub fn n_shells(&self) -> usize {
        let four_spin = usize::from(self.four_spin != 0.0);
        self.exchange.len().max(self.dmi.len()).max(four_spin)
    }
}

/// How per-site gradients are reduced to one number for the convergence test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConvergenceNorm {
    /// Largest absolute component over all sites (infinity norm).
    #[default]
    MaxComponent,
    /// Largest per-site vector length.
    MaxSite,
    /// Root mean square of the per-site vector lengths.
    Rms,
}

impl ConvergenceNorm {
    pub fn evaluate(&self, field: &[Vec3]) -> f64 {
        match self {
            ConvergenceNorm::MaxComponent => crate::vec3::max_abs_component(field),
            ConvergenceNorm::MaxSite => field
                .iter()
                .map(|v| crate::vec3::norm(*v))
                .fold(0.0_f64, f64::max),
            ConvergenceNorm::Rms => {
                if field.is_empty() {
                    return 0.0;
                }
                let sum: f64 = field.iter().map(|v| crate::vec3::norm2(*v)).sum();
                (sum / field.len() as f64).sqrt()
            }
        }
    }
}

/// Base temperature as a function of the iteration count.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TemperatureSchedule {
    #[default]
    Constant,
    /// Linear ramp from `temperature` to `final_temperature` over `n_iterations`.
    Linear { final_temperature: f64, n_iterations: usize },
    /// T(n) = temperature * exp(-decay * n).
    Exponential { decay: f64 },
}

impl TemperatureSchedule {
    pub fn temperature_at(&self, base: f64, iteration: usize) -> f64 {
        let t = match *self {
            TemperatureSchedule::Constant => base,
            TemperatureSchedule::Linear {
                final_temperature,
                n_iterations,
            } => {
                if n_iterations == 0 || iteration >= n_iterations {
                    final_temperature
                } else {
                    let f = iteration as f64 / n_iterations as f64;
                    base + (final_temperature - base) * f
                }
            }
            TemperatureSchedule::Exponential { decay } => base * (-decay * iteration as f64).exp(),
        };
        t.max(0.0)
    }
}

/// Linear sweep of the external field magnitude, applied between iterations.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FieldRamp {
    /// Change per iteration (T).
    pub rate: f64,
    /// Magnitude at which the ramp stops (T).
    pub target: f64,
}

impl FieldRamp {
    /// Next magnitude, moving towards the target without overshooting it.
    pub fn step(&self, current: f64) -> f64 {
        let delta = self.target - current;
        if delta.abs() <= self.rate.abs() {
            self.target
        } else {
            current + self.rate.abs() * delta.signum()
        }
    }
}

/// Spin-transfer torque from a spin-polarised current.
///
/// Both forms enter the dynamics as an extra effective field, so the damping
/// term of the equation of motion also acts on them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SpinTorque {
    /// Current through a fixed polariser: H = a_j (s x p).
    Polarised {
        /// a_j (meV).
        magnitude: f64,
        polarisation: Vec3,
    },
    /// In-plane current (Zhang-Li): H = -(u / gamma) (s x g + beta g) with
    /// g = (j . grad) s, giving
    ///   ds/dt += -(1 + alpha beta) u g + (beta - alpha) u s x g.
    Gradient {
        /// Drift velocity u (Angstrom / ps).
        velocity: f64,
        /// Current direction j.
        direction: Vec3,
        /// Non-adiabaticity.
        #[serde(default)]
        beta: f64,
    },
}

impl SpinTorque {
    fn is_valid(&self) -> bool {
        let (scalars, axis) = match *self {
            SpinTorque::Polarised {
                magnitude,
                polarisation,
            } => ([magnitude, 0.0], polarisation),
            SpinTorque::Gradient {
                velocity,
                direction,
                beta,
            } => ([velocity, beta], direction),
        };
        all_finite(&scalars) && all_finite(&axis) && norm(axis) > 0.0
    }
}

fn validate_llg(p: &LlgParameters) -> Result<(), ValidationError> {
    if !(p.dt.is_finite() && p.dt > 0.0) {
        return Err(ValidationError::new("dt must be positive"));
    }
    if !(p.gamma.is_finite() && p.gamma > 0.0) {
        return Err(ValidationError::new("gamma must be positive"));
    }
    if !(p.damping.is_finite() && p.damping >= 0.0) {
        return Err(ValidationError::new("damping must be >= 0"));
    }
    if !(p.force_convergence.is_finite() && p.force_convergence > 0.0) {
        return Err(ValidationError::new("force_convergence must be positive"));
    }
    if !(p.temperature.is_finite() && p.temperature >= 0.0) {
        return Err(ValidationError::new("temperature must be >= 0"));
    }
    if !(p.vp_mass.is_finite() && p.vp_mass > 0.0) {
        return Err(ValidationError::new("vp_mass must be positive"));
    }
    if let Some(ramp) = p.field_ramp {
        if !(ramp.rate.is_finite() && ramp.target.is_finite()) {
            return Err(ValidationError::new("field ramp must be finite"));
        }
    }
    if let Some(torque) = p.spin_torque {
        if !torque.is_valid() {
            return Err(ValidationError::new("spin torque must be finite with a non-zero axis"));
        }
    }
    if let TemperatureSchedule::Linear { final_temperature, .. } = p.temperature_schedule {
        if !(final_temperature.is_finite() && final_temperature >= 0.0) {
            return Err(ValidationError::new("final_temperature must be >= 0"));
        }
    }
    Ok(())
}

/// Parameters of the LLG method and its optimizers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
#[validate(schema(function = "validate_llg"))]
pub struct LlgParameters {
    /// Time step (ps).
    pub dt: f64,
    /// Gilbert damping alpha.
    pub damping: f64,
    /// Gyromagnetic ratio per unit energy, rad / (ps meV). The default is the
    /// electron value for a moment of one Bohr magneton.
    ///
    /// This is the gamma of the Landau-Lifshitz form used by the method: both
    /// the precession and the damping term are multiplied by it as given, and
    /// no 1 / (1 + alpha^2) factor is applied anywhere. The thermal field
    /// variance 2 alpha k_B T / (gamma dt) uses the same value. To reproduce
    /// Gilbert-form dynamics pass gamma / (1 + alpha^2).
    pub gamma: f64,
    /// Convergence threshold on the tangential gradient (meV).
    pub force_convergence: f64,
    pub convergence_norm: ConvergenceNorm,
    #[validate(range(min = 1))]
    pub n_iterations: usize,
    /// Log and checkpoint interval; 0 disables periodic output.
    pub n_iterations_log: usize,
    /// Base temperature (K).
    pub temperature: f64,
    pub temperature_gradient_direction: Vec3,
    /// Temperature change per Angstrom along the gradient direction (K / Angstrom).
    pub temperature_gradient_inclination: f64,
    pub temperature_schedule: TemperatureSchedule,
    pub field_ramp: Option<FieldRamp>,
    pub spin_torque: Option<SpinTorque>,
    /// Drop precession and use unit damping: pure energy descent.
    pub direct_minimization: bool,
    /// Base seed for the stochastic optimizer; image k uses seed + k.
    pub seed: u64,
    /// Fictitious mass of the velocity projection optimizer.
    pub vp_mass: f64,
}

impl Default for LlgParameters {
    fn default() -> Self {
        Self {
            dt: 1e-3,
            damping: 0.3,
            gamma: GAMMA_E / MU_B,
            force_convergence: 1e-8,
            convergence_norm: ConvergenceNorm::default(),
            n_iterations: 100_000,
            n_iterations_log: 1_000,
            temperature: 0.0,
            temperature_gradient_direction: [1.0, 0.0, 0.0],
            temperature_gradient_inclination: 0.0,
            temperature_schedule: TemperatureSchedule::default(),
            field_ramp: None,
            spin_torque: None,
            direct_minimization: false,
            seed: 20_006,
            vp_mass: 1.0,
        }
    }
}
