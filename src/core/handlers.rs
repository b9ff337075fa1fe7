//! Schedule maintenance: the Up, Down and Reverse scans.
//!
//! Each pair of interacting particles is examined from one side only: the
//! particle that has its partner in `Up` records the pair event on its own
//! agent. Down lets a changed particle tighten the predictions of the
//! particles that own its pairs, and Reverse finds the owners whose cached
//! partner is about to change so they can be rescanned.

use crate::config::DebugContext;
use crate::core::agent::CollisionAgent;
use crate::core::neighbors::{Direction, NeighborEnumerator};
use crate::core::particle::Particle;
use crate::core::potential::{Interaction, PotentialId, PotentialMaster};
use crate::core::schedule::EventSchedule;
use crate::error::Result;
use tracing::trace;

/// Borrowed view of everything the scans read and write.
pub(crate) struct CollisionHandlers<'a> {
    pub particles: &'a [Particle],
    pub agents: &'a mut [CollisionAgent],
    pub schedule: &'a mut EventSchedule,
    pub potentials: &'a PotentialMaster,
    pub neighbors: &'a dyn NeighborEnumerator,
    pub scratch: &'a mut Vec<usize>,
    pub debug: &'a DebugContext,
    /// Step-local time of the current kinematic state.
    pub now: f64,
}

impl CollisionHandlers<'_> {
    /// Lower the agent of `target` to its earliest event with an upstream partner.
    ///
    /// Starts from the agent's current time, so the result never increases it.
    /// Only the agent is written; scheduling is up to the caller.
    pub fn up(&mut self, target: usize) -> Result<()> {
        self.neighbors
            .candidates(self.particles, target, Direction::Up, self.scratch);

        let mut best: Option<(f64, usize, PotentialId)> = None;
        let mut min_time = self.agents[target].collision_time();
        for &j in self.scratch.iter() {
            let Some((t, id)) = pair_time(self.potentials, self.particles, target, j, self.now)?
            else {
                continue;
            };
            if self.debug.watches_pair(target, j) {
                trace!(particle = target, partner = j, time = t, "up time");
            }
            if t < min_time {
                min_time = t;
                best = Some((t, j, id));
            }
        }

        if let Some((t, j, id)) = best {
            if self.debug.watches_pair(target, j) {
                trace!(particle = target, partner = j, time = t, "setting up time");
            }
            self.agents[target].set_collision(t, Some(j), id);
        }
        Ok(())
    }

    /// Tighten the predictions of downstream agents against the changed `target`.
    pub fn down(&mut self, target: usize) -> Result<()> {
        self.neighbors
            .candidates(self.particles, target, Direction::Down, self.scratch);

        for &c in self.scratch.iter() {
            let Some((t, id)) = pair_time(self.potentials, self.particles, c, target, self.now)?
            else {
                continue;
            };
            if t.is_finite() && t < self.agents[c].collision_time() {
                if self.debug.watches_pair(c, target) {
                    trace!(particle = c, partner = target, time = t, "setting down time");
                }
                self.agents[c].set_collision(t, Some(target), id);
                self.schedule.reposition(c, &mut self.agents[c])?;
            }
        }
        Ok(())
    }

    /// Append to `stale` every downstream particle whose cached partner is `target`.
    pub fn reverse(&mut self, target: usize, stale: &mut Vec<usize>) {
        self.neighbors
            .candidates(self.particles, target, Direction::Down, self.scratch);

        for &c in self.scratch.iter() {
            if self.agents[c].partner() == Some(target) {
                if self.debug.watches_pair(c, target) {
                    trace!(particle = c, partner = target, "will update stale prediction");
                }
                stale.push(c);
            }
        }
    }

    /// Rescan particles whose partner changed; they fall back to their field time first.
    pub fn refresh_stale(&mut self, stale: &[usize]) -> Result<()> {
        for &q in stale {
            self.schedule.remove(&mut self.agents[q]);
            self.agents[q].reset_partial();
            self.up(q)?;
            self.schedule.insert(q, &mut self.agents[q])?;
        }
        Ok(())
    }

    /// Full repair for a particle whose own state changed: reset, Up, reinsert, Down.
    pub fn refresh_changed(&mut self, target: usize) -> Result<()> {
        self.schedule.remove(&mut self.agents[target]);
        self.reset_full(target)?;
        self.up(target)?;
        self.schedule.insert(target, &mut self.agents[target])?;
        self.down(target)
    }

    /// Recompute the field prediction of `target` from scratch.
    pub fn reset_full(&mut self, target: usize) -> Result<()> {
        let field_time = match self.agents[target].field_potential() {
            Some(id) => self.potentials.get(id)?.collision_time(
                Interaction::Single(target),
                self.particles,
                self.now,
            ),
            None => f64::INFINITY,
        };
        if self.debug.watches(target) {
            trace!(particle = target, time = field_time, "field time");
        }
        self.agents[target].reset_full(field_time);
        Ok(())
    }

    /// Recompute every agent from scratch and replace the schedule.
    ///
    /// Field assignments are looked up again from each particle's current kind.
    pub fn rebuild_all(&mut self) -> Result<()> {
        for i in 0..self.agents.len() {
            let field = self.potentials.field_for(self.particles[i].kind);
            self.agents[i].set_field_potential(field);
            self.reset_full(i)?;
        }
        for i in 0..self.agents.len() {
            self.up(i)?;
        }
        self.schedule.rebuild(self.agents)
    }
}

/// Pair event time between `i` (the recording side) and `j`, if a pair potential applies.
pub(crate) fn pair_time(
    potentials: &PotentialMaster,
    particles: &[Particle],
    i: usize,
    j: usize,
    now: f64,
) -> Result<Option<(f64, PotentialId)>> {
    let Some(id) = potentials.pair_for(particles[i].kind, particles[j].kind) else {
        return Ok(None);
    };
    let t = potentials
        .get(id)?
        .collision_time(Interaction::Pair(i, j), particles, now);
    Ok(Some((t, id)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::hard_box::HardBox;
    use crate::core::hard_sphere::HardSphere;
    use crate::core::neighbors::AllPairs;

    struct Fixture {
        particles: Vec<Particle>,
        agents: Vec<CollisionAgent>,
        schedule: EventSchedule,
        potentials: PotentialMaster,
        scratch: Vec<usize>,
        debug: DebugContext,
    }

    impl Fixture {
        /// Particles on the x axis of a 20^3 box.
        fn new(xs_vs: &[(f64, f64)]) -> Result<Self> {
            let mut potentials = PotentialMaster::new();
            let hs = potentials.add(Box::new(HardSphere::new()));
            let walls = potentials.add(Box::new(HardBox::new([20.0; 3])?));
            potentials.set_pair(0, 0, hs)?;
            potentials.set_field(0, Some(walls))?;
            let particles = xs_vs
                .iter()
                .enumerate()
                .map(|(i, &(x, v))| Particle::new(i as u32, [x, 10.0, 10.0], [v, 0.0, 0.0], 0.5, 1.0))
                .collect::<Result<Vec<_>>>()?;
            let agents = particles.iter().map(|_| CollisionAgent::new(Some(walls))).collect();
            Ok(Self {
                particles,
                agents,
                schedule: EventSchedule::new(),
                potentials,
                scratch: Vec::new(),
                debug: DebugContext::default(),
            })
        }

        fn handlers(&mut self) -> CollisionHandlers<'_> {
            CollisionHandlers {
                particles: &self.particles,
                agents: &mut self.agents,
                schedule: &mut self.schedule,
                potentials: &self.potentials,
                neighbors: &AllPairs,
                scratch: &mut self.scratch,
                debug: &self.debug,
                now: 0.0,
            }
        }
    }

    #[test]
    fn rebuild_records_pairs_on_lower_index() -> Result<()> {
        // 0 and 1 close in at relative speed 2 from gap 2.0: t = 1.0
        let mut fx = Fixture::new(&[(5.0, 1.0), (8.0, -1.0), (15.0, 0.0)])?;
        fx.handlers().rebuild_all()?;
        assert!((fx.agents[0].collision_time() - 1.0).abs() < 1e-12);
        assert_eq!(fx.agents[0].partner(), Some(1));
        // 1 sees only its wall ahead in Up (0 is downstream): x=8 -> 0.5 at speed 1
        assert_eq!(fx.agents[1].partner(), None);
        assert!((fx.agents[1].collision_time() - 7.5).abs() < 1e-12);
        assert!(fx.agents[2].collision_time().is_infinite());
        assert_eq!(fx.schedule.peek_min(), Some(0));
        assert_eq!(fx.schedule.len(), 3);
        Ok(())
    }

    #[test]
    fn up_is_monotone() -> Result<()> {
        let mut fx = Fixture::new(&[(5.0, 1.0), (8.0, -1.0)])?;
        fx.handlers().rebuild_all()?;
        let before = fx.agents[0].collision_time();
        fx.agents[0].set_collision(0.25, None, PotentialId(1));
        fx.handlers().up(0)?;
        assert_eq!(fx.agents[0].collision_time(), 0.25);
        assert!(before > 0.25);
        Ok(())
    }

    #[test]
    fn down_tightens_owner_of_pair() -> Result<()> {
        let mut fx = Fixture::new(&[(5.0, 0.0), (8.0, 0.0)])?;
        fx.handlers().rebuild_all()?;
        assert!(fx.agents[0].collision_time().is_infinite());

        // 1 starts moving towards 0; its agent does not own the pair.
        fx.particles[1].v = [-2.0, 0.0, 0.0];
        fx.handlers().refresh_changed(1)?;
        assert_eq!(fx.agents[0].partner(), Some(1));
        assert!((fx.agents[0].collision_time() - 1.0).abs() < 1e-12);
        assert_eq!(fx.schedule.peek_min(), Some(0));
        Ok(())
    }

    #[test]
    fn reverse_finds_stale_partners_and_loosens_them() -> Result<()> {
        let mut fx = Fixture::new(&[(5.0, 1.0), (8.0, -1.0)])?;
        fx.handlers().rebuild_all()?;
        assert_eq!(fx.agents[0].partner(), Some(1));

        let mut stale = Vec::new();
        fx.handlers().reverse(1, &mut stale);
        assert_eq!(stale, vec![0]);

        // 1 turns around; 0's cached time must grow back to its wall time.
        fx.particles[1].v = [1.0, 0.0, 0.0];
        let mut h = fx.handlers();
        h.refresh_stale(&stale)?;
        h.refresh_changed(1)?;
        assert_eq!(fx.agents[0].partner(), None);
        assert!((fx.agents[0].collision_time() - 14.5).abs() < 1e-12);
        Ok(())
    }

    #[test]
    fn repeated_up_down_is_idempotent() -> Result<()> {
        let mut fx = Fixture::new(&[(2.0, 0.5), (6.0, -0.25), (9.0, 1.0), (14.0, -1.5)])?;
        fx.handlers().rebuild_all()?;
        for i in 0..fx.agents.len() {
            let mut h = fx.handlers();
            h.up(i)?;
            h.down(i)?;
        }
        let once = fx.agents.clone();
        for i in 0..fx.agents.len() {
            fx.handlers().up(i)?;
        }
        assert_eq!(fx.agents, once);
        Ok(())
    }
}
