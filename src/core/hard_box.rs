use crate::core::particle::{Particle, DIM};
use crate::core::potential::{BumpOutcome, HardPotential, Interaction};
use crate::error::{Error, Result};

/// Small numeric tolerance for time and geometric checks.
const EPS_TIME: f64 = 1e-12;

/// Relative window within which two wall contacts count as simultaneous.
const CONTACT_SLACK: f64 = 1e-10;

/// Static axis-aligned box `[0, L_k]` with specular hard walls, used as a field potential.
///
/// Walls are implicitly represented by six planes: for axis k, wall_id = 2*k is the
/// min wall at x_k = 0 and wall_id = 2*k+1 the max wall at x_k = L_k.
#[derive(Debug, Clone)]
pub struct HardBox {
    box_size: [f64; DIM],
    /// Accumulated |momentum| delivered to each wall.
    impulse: [f64; 2 * DIM],
}

impl HardBox {
    pub fn new(box_size: [f64; DIM]) -> Result<Self> {
        if !box_size.iter().all(|&l| l.is_finite() && l > 0.0) {
            return Err(Error::InvalidParam(
                "box_size components must be finite and > 0".into(),
            ));
        }
        Ok(Self {
            box_size,
            impulse: [0.0; 2 * DIM],
        })
    }

    pub fn box_size(&self) -> [f64; DIM] {
        self.box_size
    }

    /// Total momentum magnitude transferred to wall `wall_id`.
    pub fn impulse_on(&self, wall_id: usize) -> Option<f64> {
        self.impulse.get(wall_id).copied()
    }

    /// Earliest wall contact for `p` as seen from local time `now`: (t_abs, wall_id).
    fn next_wall(&self, p: &Particle, now: f64) -> Option<(f64, usize)> {
        let x_now = p.position_at(now);
        let mut best_t = f64::INFINITY;
        let mut best_wall: Option<usize> = None;

        for (k, ((&x, &v), &l)) in x_now.iter().zip(&p.v).zip(&self.box_size).enumerate() {
            let (t_rel, wall) = if v < -EPS_TIME {
                // Approaching min wall at 0: contact when x + v t = radius
                ((p.radius - x) / v, 2 * k)
            } else if v > EPS_TIME {
                // Approaching max wall at L: contact when x + v t = L - radius
                ((l - p.radius - x) / v, 2 * k + 1)
            } else {
                continue;
            };
            let t_abs = now + t_rel.max(0.0);
            if t_abs < best_t {
                best_t = t_abs;
                best_wall = Some(wall);
            }
        }

        best_wall.map(|w| (best_t, w))
    }

    /// Walls whose contact time coincides with `at` (up to rounding).
    fn walls_at(&self, p: &Particle, at: f64) -> Vec<usize> {
        let slack = CONTACT_SLACK * at.abs().max(1.0);
        let mut walls = Vec::new();
        for (k, ((&r, &v), &l)) in p.r.iter().zip(&p.v).zip(&self.box_size).enumerate() {
            let (t, wall) = if v < -EPS_TIME {
                ((p.radius - r) / v, 2 * k)
            } else if v > EPS_TIME {
                ((l - p.radius - r) / v, 2 * k + 1)
            } else {
                continue;
            };
            if t <= at + slack {
                walls.push(wall);
            }
        }
        walls
    }
}

impl HardPotential for HardBox {
    fn name(&self) -> &str {
        "hard box"
    }

    fn collision_time(&self, interaction: Interaction, particles: &[Particle], now: f64) -> f64 {
        let Interaction::Single(i) = interaction else {
            return f64::INFINITY;
        };
        self.next_wall(&particles[i], now)
            .map_or(f64::INFINITY, |(t, _)| t)
    }

    /// Mirror reflection on every wall the particle touches at `at`, so a
    /// corner hit turns all contacting axes in one event.
    fn bump(
        &mut self,
        interaction: Interaction,
        particles: &mut [Particle],
        at: f64,
    ) -> Result<BumpOutcome> {
        let Interaction::Single(i) = interaction else {
            return Err(Error::InvalidParam("hard box potential needs a single particle".into()));
        };
        let p = &mut particles[i];
        let (first, _) = self.next_wall(p, at).ok_or_else(|| {
            Error::MathError(format!("particle {i} is not approaching any wall"))
        })?;
        let contacts = self.walls_at(p, first);

        let mut dv = [0.0_f64; DIM];
        for &wall_id in &contacts {
            let (axis, _) = wall_axis_side(wall_id);
            dv[axis] = -2.0 * p.v[axis];
            self.impulse[wall_id] += p.mass * dv[axis].abs();
        }
        p.kick(dv, at);

        // Snap the true position at `at` onto each contact plane
        for &wall_id in &contacts {
            let (axis, is_max) = wall_axis_side(wall_id);
            let contact = if is_max {
                self.box_size[axis] - p.radius
            } else {
                p.radius
            };
            p.r[axis] = contact - p.v[axis] * at;
        }

        Ok(BumpOutcome::default())
    }

    fn energy(&self, interaction: Interaction, particles: &[Particle]) -> f64 {
        let Interaction::Single(i) = interaction else {
            return 0.0;
        };
        let p = &particles[i];
        let slack = 1e-10 * p.radius;
        let outside = p
            .r
            .iter()
            .zip(&self.box_size)
            .any(|(&x, &l)| x < p.radius - slack || x > l - p.radius + slack);
        if outside {
            f64::INFINITY
        } else {
            0.0
        }
    }
}

#[inline]
fn wall_axis_side(wall_id: usize) -> (usize, bool) {
    (wall_id / 2, wall_id % 2 == 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prediction_basic() -> Result<()> {
        // One particle heading toward the x-min wall
        let walls = HardBox::new([5.0, 5.0, 5.0])?;
        let p = Particle::new(0, [1.0, 2.5, 2.5], [-1.0, 0.0, 0.0], 0.5, 1.0)?;
        let (t, wall) = walls.next_wall(&p, 0.0).expect("should hit wall");
        assert_eq!(wall_axis_side(wall), (0, false));
        // Contact when x reaches radius = 0.5, starting at 1.0 moving -1.0: dt = 0.5
        assert!((t - 0.5).abs() < 1e-12);
        Ok(())
    }

    #[test]
    fn resting_particle_has_no_wall_event() -> Result<()> {
        let walls = HardBox::new([5.0, 5.0, 5.0])?;
        let ps = vec![Particle::new(0, [2.5; 3], [0.0; 3], 0.5, 1.0)?];
        assert!(walls
            .collision_time(Interaction::Single(0), &ps, 0.0)
            .is_infinite());
        Ok(())
    }

    #[test]
    fn bump_reflects_and_records_impulse() -> Result<()> {
        let mut walls = HardBox::new([5.0, 5.0, 5.0])?;
        let mut ps = vec![Particle::new(0, [4.0, 2.5, 2.5], [1.0, 0.0, 0.0], 0.5, 3.0)?];
        let t = walls.collision_time(Interaction::Single(0), &ps, 0.0);
        assert!((t - 0.5).abs() < 1e-12);
        walls.bump(Interaction::Single(0), &mut ps, t)?;
        assert_eq!(ps[0].v, [-1.0, 0.0, 0.0]);
        assert!((ps[0].position_at(t)[0] - 4.5).abs() < 1e-12);
        assert_eq!(walls.impulse_on(1), Some(6.0));
        // Moving away now, next contact is the opposite wall 4.0 later.
        let next = walls.collision_time(Interaction::Single(0), &ps, t);
        assert!((next - 4.5).abs() < 1e-12);
        Ok(())
    }

    #[test]
    fn corner_hit_reflects_both_axes() -> Result<()> {
        let mut walls = HardBox::new([10.0; 3])?;
        let mut ps = vec![Particle::new(0, [5.0; 3], [1.0, 1.0, 0.0], 0.5, 1.0)?];
        let t = walls.collision_time(Interaction::Single(0), &ps, 0.0);
        assert!((t - 4.5).abs() < 1e-12);
        walls.bump(Interaction::Single(0), &mut ps, t)?;
        assert_eq!(ps[0].v, [-1.0, -1.0, 0.0]);
        assert_eq!(walls.impulse_on(1), Some(2.0));
        assert_eq!(walls.impulse_on(3), Some(2.0));
        // Both axes now head for the far walls, 9.0 later.
        let next = walls.collision_time(Interaction::Single(0), &ps, t);
        assert!((next - 13.5).abs() < 1e-12);
        Ok(())
    }

    #[test]
    fn outside_particle_has_infinite_energy() -> Result<()> {
        let walls = HardBox::new([5.0, 5.0, 5.0])?;
        let ps = vec![Particle::new(0, [0.1, 2.5, 2.5], [0.0; 3], 0.5, 1.0)?];
        assert!(walls.energy(Interaction::Single(0), &ps).is_infinite());
        Ok(())
    }

    #[test]
    fn invalid_box_rejected() {
        assert!(HardBox::new([1.0, 0.0, 1.0]).is_err());
    }
}
