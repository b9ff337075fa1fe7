use crate::error::{Error, Result};

/// Fixed spatial dimension (3D).
pub const DIM: usize = 3;

/// A hard particle in D=3.
///
/// Within a step the integrator runs on a step-local clock: `r` is the position
/// at local time 0 and the true position at local time `t` is `r + v t`
/// (see [`Particle::position_at`]). Between steps the two coincide.
#[derive(Debug, Clone, PartialEq)]
pub struct Particle {
    /// Stable particle identifier.
    pub id: u32,
    /// Position (x, y, z) at the step-local origin.
    pub r: [f64; DIM],
    /// Velocity (vx, vy, vz).
    pub v: [f64; DIM],
    /// Hard-core radius (> 0).
    pub radius: f64,
    /// Mass (> 0).
    pub mass: f64,
    /// Particle type; selects pair and field potentials.
    pub kind: u32,
    /// Number of resolved events this particle took part in.
    pub collision_count: u64,
}

impl Particle {
    /// Create a new particle of kind 0 after validating invariants.
    ///
    /// Errors:
    /// - `Error::InvalidParam` if `radius` or `mass` is non-positive or any component is NaN/inf.
    pub fn new(id: u32, r: [f64; DIM], v: [f64; DIM], radius: f64, mass: f64) -> Result<Self> {
        if !radius.is_finite() || radius <= 0.0 {
            return Err(Error::InvalidParam("radius must be finite and > 0".into()));
        }
        if !mass.is_finite() || mass <= 0.0 {
            return Err(Error::InvalidParam("mass must be finite and > 0".into()));
        }
        if !is_finite_vec(&r) {
            return Err(Error::InvalidParam("position must be finite".into()));
        }
        if !is_finite_vec(&v) {
            return Err(Error::InvalidParam("velocity must be finite".into()));
        }
        Ok(Self {
            id,
            r,
            v,
            radius,
            mass,
            kind: 0,
            collision_count: 0,
        })
    }

    /// Builder-style setter for the particle type.
    pub fn with_kind(mut self, kind: u32) -> Self {
        self.kind = kind;
        self
    }

    /// Increment the collision counter.
    #[inline]
    pub fn bump_collision_count(&mut self) {
        self.collision_count = self.collision_count.saturating_add(1);
    }

    /// Returns the particle's kinetic energy: 1/2 m |v|^2.
    #[inline]
    pub fn kinetic_energy(&self) -> f64 {
        0.5 * self.mass * dot(&self.v, &self.v)
    }

    /// True position at step-local time `t`.
    #[inline]
    pub fn position_at(&self, t: f64) -> [f64; DIM] {
        let mut out = self.r;
        for (x, &vk) in out.iter_mut().zip(self.v.iter()) {
            *x += vk * t;
        }
        out
    }

    /// Change the velocity at step-local time `t` while keeping the trajectory
    /// continuous: the origin position shifts by `-(v_new - v_old) t`.
    pub fn kick(&mut self, dv: [f64; DIM], t: f64) {
        for k in 0..DIM {
            self.v[k] += dv[k];
            self.r[k] -= dv[k] * t;
        }
    }

    /// Ballistic advance by `dt`.
    #[inline]
    pub fn advance(&mut self, dt: f64) {
        self.r = self.position_at(dt);
    }

    /// True if position and velocity are finite.
    #[inline]
    pub fn is_finite(&self) -> bool {
        is_finite_vec(&self.r) && is_finite_vec(&self.v)
    }

    /// Set position (validated as finite).
    pub fn set_position(&mut self, r: [f64; DIM]) -> Result<()> {
        if !is_finite_vec(&r) {
            return Err(Error::InvalidParam("position must be finite".into()));
        }
        self.r = r;
        Ok(())
    }

    /// Set velocity (validated as finite).
    pub fn set_velocity(&mut self, v: [f64; DIM]) -> Result<()> {
        if !is_finite_vec(&v) {
            return Err(Error::InvalidParam("velocity must be finite".into()));
        }
        self.v = v;
        Ok(())
    }
}

// ============ Vector helpers ============

#[inline]
pub(crate) fn dot(a: &[f64; DIM], b: &[f64; DIM]) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

#[inline]
pub(crate) fn sub(a: &[f64; DIM], b: &[f64; DIM]) -> [f64; DIM] {
    let mut out = [0.0_f64; DIM];
    for (o, (x, y)) in out.iter_mut().zip(a.iter().zip(b.iter())) {
        *o = x - y;
    }
    out
}

#[inline]
fn is_finite_vec(x: &[f64; DIM]) -> bool {
    x.iter().all(|c| c.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_particle_ok() -> Result<()> {
        let p = Particle::new(1, [0.0, 1.0, 2.0], [2.0, -3.0, 0.5], 0.5, 2.0)?;
        assert_eq!(p.id, 1);
        assert_eq!(p.r, [0.0, 1.0, 2.0]);
        assert_eq!(p.v, [2.0, -3.0, 0.5]);
        assert_eq!(p.kind, 0);
        assert_eq!(p.collision_count, 0);
        Ok(())
    }

    #[test]
    fn invalid_radius_rejected() {
        let err = Particle::new(0, [0.0; 3], [0.0; 3], 0.0, 1.0).unwrap_err();
        assert!(err.to_string().contains("radius"));
    }

    #[test]
    fn invalid_mass_rejected() {
        let err = Particle::new(0, [0.0; 3], [0.0; 3], 1.0, 0.0).unwrap_err();
        assert!(err.to_string().contains("mass"));
    }

    #[test]
    fn non_finite_velocity_rejected() -> Result<()> {
        let mut p = Particle::new(0, [0.0; 3], [0.0; 3], 1.0, 1.0)?;
        assert!(p.set_velocity([f64::NAN, 0.0, 0.0]).is_err());
        assert_eq!(p.v, [0.0; 3]);
        Ok(())
    }

    #[test]
    fn kinetic_energy_computed() -> Result<()> {
        // v = (3,4,0), |v|^2 = 25; KE = 0.5 * m * 25
        let p = Particle::new(7, [0.0; 3], [3.0, 4.0, 0.0], 1.0, 2.0)?;
        assert!((p.kinetic_energy() - 25.0).abs() < 1e-12);
        Ok(())
    }

    #[test]
    fn kick_keeps_trajectory_continuous() -> Result<()> {
        let mut p = Particle::new(0, [1.0, 0.0, 0.0], [2.0, 0.0, 0.0], 0.1, 1.0)?;
        let t = 0.75;
        let before = p.position_at(t);
        p.kick([-4.0, 1.0, 0.0], t);
        let after = p.position_at(t);
        for k in 0..DIM {
            assert!((before[k] - after[k]).abs() < 1e-12);
        }
        assert_eq!(p.v, [-2.0, 1.0, 0.0]);
        Ok(())
    }
}
