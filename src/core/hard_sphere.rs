use crate::core::particle::{dot, sub, Particle, DIM};
use crate::core::potential::{BumpOutcome, HardPotential, Interaction};
use crate::error::{Error, Result};

/// Small numeric tolerance for geometric checks.
const EPS: f64 = 1e-12;

/// Relative slack before two touching spheres count as overlapped.
const OVERLAP_SLACK: f64 = 1e-10;

/// Elastic hard-sphere pair potential; contact distance is the sum of radii.
#[derive(Debug, Clone, Default)]
pub struct HardSphere {
    collisions: u64,
}

impl HardSphere {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of collisions this potential resolved.
    pub fn collisions(&self) -> u64 {
        self.collisions
    }
}

impl HardPotential for HardSphere {
    fn name(&self) -> &str {
        "hard sphere"
    }

    fn collision_time(&self, interaction: Interaction, particles: &[Particle], now: f64) -> f64 {
        let Interaction::Pair(i, j) = interaction else {
            return f64::INFINITY;
        };
        let (pi, pj) = (&particles[i], &particles[j]);

        let d = sub(&pj.position_at(now), &pi.position_at(now));
        let u = sub(&pj.v, &pi.v);
        let a = dot(&u, &u);
        if a <= EPS {
            return f64::INFINITY; // No relative motion
        }
        let b = 2.0 * dot(&d, &u);
        if b >= 0.0 {
            return f64::INFINITY; // Separating
        }
        let r_sum = pi.radius + pj.radius;
        let c = dot(&d, &d) - r_sum * r_sum;

        let disc = b * b - 4.0 * a * c;
        if disc <= 0.0 {
            return f64::INFINITY;
        }
        // Earlier root; an approaching pair already in contact collides immediately.
        let t_rel = ((-b - disc.sqrt()) / (2.0 * a)).max(0.0);
        let t_abs = now + t_rel;
        if t_abs.is_finite() {
            t_abs
        } else {
            f64::INFINITY
        }
    }

    fn bump(
        &mut self,
        interaction: Interaction,
        particles: &mut [Particle],
        at: f64,
    ) -> Result<BumpOutcome> {
        let Interaction::Pair(i, j) = interaction else {
            return Err(Error::InvalidParam(
                "hard sphere potential needs a pair".into(),
            ));
        };

        // Unit normal at contact from i -> j
        let mut n = sub(&particles[j].position_at(at), &particles[i].position_at(at));
        let dist = dot(&n, &n).sqrt();
        if dist <= EPS {
            // Nearly coincident centers - numerical pathology
            return Err(Error::MathError(format!(
                "degenerate contact normal between particles {i} and {j}"
            )));
        }
        for nk in &mut n {
            *nk /= dist;
        }

        let (mi, mj) = (particles[i].mass, particles[j].mass);
        let u = sub(&particles[j].v, &particles[i].v);
        let u_n = dot(&u, &n);

        // Only the normal component changes
        let fi = (2.0 * mj / (mi + mj)) * u_n;
        let fj = (2.0 * mi / (mi + mj)) * u_n;
        let mut dvi = [0.0_f64; DIM];
        let mut dvj = [0.0_f64; DIM];
        for k in 0..DIM {
            dvi[k] = fi * n[k];
            dvj[k] = -fj * n[k];
        }
        particles[i].kick(dvi, at);
        particles[j].kick(dvj, at);
        self.collisions += 1;

        let reduced_mass = mi * mj / (mi + mj);
        Ok(BumpOutcome {
            energy_change: 0.0,
            virial: 2.0 * reduced_mass * u_n * dist,
        })
    }

    fn energy(&self, interaction: Interaction, particles: &[Particle]) -> f64 {
        let Interaction::Pair(i, j) = interaction else {
            return 0.0;
        };
        let (pi, pj) = (&particles[i], &particles[j]);
        let d = sub(&pj.r, &pi.r);
        let r_sum = pi.radius + pj.radius;
        if dot(&d, &d) < r_sum * r_sum * (1.0 - OVERLAP_SLACK) {
            f64::INFINITY
        } else {
            0.0
        }
    }
}
