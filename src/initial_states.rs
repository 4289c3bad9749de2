// src/initial_states.rs
//
// Initial spin configurations.
//
// Conventions:
// - Every generator writes unit vectors only.
// - Positions are in Angstrom. Skyrmion and spiral centres are given relative to
//   the geometric centre of the lattice.

use crate::geometry::Geometry;
use crate::vec3::{add_scaled, cross, dot, normalize, sub, Vec3};

use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use rand_xoshiro::Xoshiro256StarStar;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Set every spin to the (normalised) direction.
pub fn homogeneous(spins: &mut [Vec3], dir: Vec3) {
    let v = normalize(dir);
    for s in spins.iter_mut() {
        *s = v;
    }
}

pub fn plus_z(spins: &mut [Vec3]) {
    homogeneous(spins, [0.0, 0.0, 1.0]);
}

pub fn minus_z(spins: &mut [Vec3]) {
    homogeneous(spins, [0.0, 0.0, -1.0]);
}

fn random_unit(rng: &mut Xoshiro256StarStar) -> Vec3 {
    // Normalised Gaussian triple: uniform on the sphere.
    let v = [
        rng.sample::<f64, _>(StandardNormal),
        rng.sample::<f64, _>(StandardNormal),
        rng.sample::<f64, _>(StandardNormal),
    ];
    normalize(v)
}

/// Uniformly random directions.
pub fn random(spins: &mut [Vec3], seed: u64) {
    let mut rng = Xoshiro256StarStar::seed_from_u64(seed);
    for s in spins.iter_mut() {
        *s = random_unit(&mut rng);
    }
}

/// Tilt every spin by a random vector of length up to `amplitude`, then renormalise.
/// Useful to break the symmetry of an exact stationary state.
pub fn add_noise(spins: &mut [Vec3], amplitude: f64, seed: u64) {
    let mut rng = Xoshiro256StarStar::seed_from_u64(seed);
    for s in spins.iter_mut() {
        let r: f64 = rng.gen::<f64>() * amplitude;
        add_scaled(s, r, random_unit(&mut rng));
        *s = normalize(*s);
    }
}

/// Point all spins on one side of the plane x = pos.x along `dir`.
/// `greater` selects the side x >= pos.x, otherwise x < pos.x. Other spins are untouched.
pub fn domain_wall(geometry: &Geometry, spins: &mut [Vec3], pos: Vec3, dir: Vec3, greater: bool) {
    let v = normalize(dir);
    for (s, p) in spins.iter_mut().zip(geometry.positions()) {
        let inside = if greater { p[0] >= pos[0] } else { p[0] < pos[0] };
        if inside {
            *s = v;
        }
    }
}

/// Parameters of a skyrmion seed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SkyrmionSeed {
    /// Centre relative to the lattice centre (Angstrom).
    pub pos: Vec3,
    /// Radius (Angstrom). Spins outside are untouched.
    pub radius: f64,
    /// Winding number of the in-plane angle.
    pub order: f64,
    /// In-plane rotation offset (degrees): 0 is Neel, 90 is Bloch.
    pub phase: f64,
    /// Background along -z (core along +z) instead of the default +z background.
    pub up_down: bool,
    /// No in-plane winding: a bubble with a fixed in-plane direction.
    pub achiral: bool,
    /// Reverse the in-plane rotation sense.
    pub right_left: bool,
}

/// Write a skyrmion: theta goes linearly from the core (opposite to the background)
/// at the centre to the background at `radius`.
pub fn skyrmion(geometry: &Geometry, spins: &mut [Vec3], seed: &SkyrmionSeed) {
    if seed.radius <= 0.0 {
        return;
    }
    let centre = geometry.center();
    let ksi = if seed.up_down { -1.0 } else { 1.0 };
    let handed = if seed.right_left { -1.0 } else { 1.0 };
    let phase = seed.phase.to_radians();

    for (s, p) in spins.iter_mut().zip(geometry.positions()) {
        let r = sub(sub(*p, centre), seed.pos);
        let d = (r[0] * r[0] + r[1] * r[1]).sqrt();
        if d > seed.radius {
            continue;
        }
        let theta = PI * d / seed.radius;
        let azimuth = if seed.achiral {
            phase
        } else {
            seed.order * r[1].atan2(r[0]) + phase
        };
        let in_plane = handed * theta.sin();
        *s = normalize([
            in_plane * azimuth.cos(),
            in_plane * azimuth.sin(),
            -ksi * theta.cos(),
        ]);
    }
}

/// Units of the spiral wave vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpiralDirection {
    /// Cartesian, cycles per Angstrom.
    #[default]
    RealSpace,
    /// Coefficients of the reciprocal lattice vectors.
    ReciprocalLattice,
}

fn reciprocal_vectors(geometry: &Geometry) -> [Vec3; 3] {
    let [t0, t1, t2] = *geometry.translation_vectors();
    let a = geometry.lattice_constant();
    let volume = dot(t0, cross(t1, t2)) * a;
    let scale_by = |v: Vec3| [v[0] / volume, v[1] / volume, v[2] / volume];
    [scale_by(cross(t1, t2)), scale_by(cross(t2, t0)), scale_by(cross(t0, t1))]
}

/// Orthonormal pair spanning the plane perpendicular to `axis`.
fn plane_basis(axis: Vec3) -> (Vec3, Vec3) {
    let reference = if axis[0].abs() < 0.9 { [1.0, 0.0, 0.0] } else { [0.0, 1.0, 0.0] };
    let e1 = normalize(cross(axis, reference));
    let e2 = cross(axis, e1);
    (e1, e2)
}

/// Conical spin spiral with wave vector `q` rotating about `axis`; `theta` is the
/// cone angle in degrees (90 gives a flat spiral).
pub fn spin_spiral(
    geometry: &Geometry,
    spins: &mut [Vec3],
    direction: SpiralDirection,
    q: Vec3,
    axis: Vec3,
    theta: f64,
) {
    let q_cart = match direction {
        SpiralDirection::RealSpace => q,
        SpiralDirection::ReciprocalLattice => {
            let b = reciprocal_vectors(geometry);
            let mut v = [0.0; 3];
            for (k, bk) in b.iter().enumerate() {
                add_scaled(&mut v, q[k], *bk);
            }
            v
        }
    };
    let axis = normalize(axis);
    let (e1, e2) = plane_basis(axis);
    let (sin_t, cos_t) = theta.to_radians().sin_cos();
    let centre = geometry.center();

    for (s, p) in spins.iter_mut().zip(geometry.positions()) {
        let phi = 2.0 * PI * dot(q_cart, sub(*p, centre));
        let mut v = [0.0; 3];
        add_scaled(&mut v, cos_t, axis);
        add_scaled(&mut v, sin_t * phi.cos(), e1);
        add_scaled(&mut v, sin_t * phi.sin(), e2);
        *s = normalize(v);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector_field::max_norm_deviation;

    #[test]
    fn noise_tilts_by_at_most_the_amplitude() {
        let mut untouched = vec![[0.0, 0.0, 1.0]; 50];
        add_noise(&mut untouched, 0.0, 3);
        assert!(untouched.iter().all(|s| *s == [0.0, 0.0, 1.0]));

        let amplitude = 0.1;
        let mut a = vec![[0.0, 0.0, 1.0]; 200];
        let mut b = a.clone();
        add_noise(&mut a, amplitude, 3);
        add_noise(&mut b, amplitude, 3);
        assert_eq!(a, b);
        assert!(max_norm_deviation(&a) < 1e-14);

        // s + r u with r <= amplitude turns s by at most asin(amplitude).
        let min_cos = (1.0 - amplitude * amplitude).sqrt();
        assert!(a.iter().all(|s| s[2] >= min_cos - 1e-12));
        assert!(a.iter().any(|s| s[2] < 1.0 - 1e-6));

        let mut c = vec![[0.0, 0.0, 1.0]; 200];
        add_noise(&mut c, amplitude, 4);
        assert_ne!(a, c);
    }

    #[test]
    fn random_is_reproducible_and_unit() {
        let mut a = vec![[0.0; 3]; 100];
        let mut b = vec![[0.0; 3]; 100];
        random(&mut a, 7);
        random(&mut b, 7);
        assert_eq!(a, b);
        assert!(max_norm_deviation(&a) < 1e-14);
        let mean_z: f64 = a.iter().map(|s| s[2]).sum::<f64>() / 100.0;
        assert!(mean_z.abs() < 0.3, "random spins biased: <s_z> = {}", mean_z);
    }

    #[test]
    fn domain_wall_splits_at_position() {
        let g = Geometry::square(6, 1, 1.0, [false, false]).unwrap();
        let mut s = vec![[0.0; 3]; g.nos()];
        plus_z(&mut s);
        domain_wall(&g, &mut s, [3.0, 0.0, 0.0], [0.0, 0.0, -1.0], true);
        assert_eq!(s[2], [0.0, 0.0, 1.0]);
        assert_eq!(s[3], [0.0, 0.0, -1.0]);
        assert_eq!(s[5], [0.0, 0.0, -1.0]);
    }

    #[test]
    fn skyrmion_core_opposes_background() {
        let g = Geometry::square(9, 9, 1.0, [true, true]).unwrap();
        let mut s = vec![[0.0; 3]; g.nos()];
        plus_z(&mut s);
        let seed = SkyrmionSeed {
            pos: [0.0; 3],
            radius: 3.0,
            order: 1.0,
            phase: 0.0,
            up_down: false,
            achiral: false,
            right_left: false,
        };
        skyrmion(&g, &mut s, &seed);
        let centre = g.idx(0, [4, 4, 0]);
        assert!((s[centre][2] + 1.0).abs() < 1e-12);
        assert_eq!(s[g.idx(0, [0, 0, 0])], [0.0, 0.0, 1.0]);
        // Neel: in-plane component points radially outward.
        let right = s[g.idx(0, [5, 4, 0])];
        assert!(right[0] > 0.5 && right[1].abs() < 1e-12);
        assert!(max_norm_deviation(&s) < 1e-14);
    }

    #[test]
    fn flat_spiral_has_requested_period() {
        let g = Geometry::simple_cubic([8, 1, 1], 1.0, [true, false, false]).unwrap();
        let mut s = vec![[0.0; 3]; g.nos()];
        spin_spiral(
            &g,
            &mut s,
            SpiralDirection::ReciprocalLattice,
            [0.25, 0.0, 0.0],
            [0.0, 0.0, 1.0],
            90.0,
        );
        for i in 0..4 {
            // Period of four sites.
            let d = sub(s[i], s[i + 4]);
            assert!(dot(d, d) < 1e-20);
            assert!(s[i][2].abs() < 1e-12);
        }
        assert!(dot(s[0], s[2]) + 1.0 < 1e-12);
    }
}
