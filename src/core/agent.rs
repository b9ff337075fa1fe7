use crate::core::potential::PotentialId;
use crate::core::schedule::ScheduleKey;

/// Per-particle record of the next predicted event.
///
/// The time considers only partners upstream of the owning particle plus its
/// field (single-particle) potential. `partner` is `None` for field events.
/// Neither reset touches the schedule; callers remove the agent before
/// mutating it and reinsert afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct CollisionAgent {
    collision_time: f64,
    partner: Option<usize>,
    potential: Option<PotentialId>,
    field_potential: Option<PotentialId>,
    field_time: f64,
    pub(crate) handle: Option<ScheduleKey>,
}

impl CollisionAgent {
    /// Fresh agent with no prediction.
    pub fn new(field_potential: Option<PotentialId>) -> Self {
        Self {
            collision_time: f64::INFINITY,
            partner: None,
            potential: None,
            field_potential,
            field_time: f64::INFINITY,
            handle: None,
        }
    }

    /// Step-local time of the next predicted event (`+inf` if none).
    #[inline]
    pub fn collision_time(&self) -> f64 {
        self.collision_time
    }

    #[inline]
    pub fn partner(&self) -> Option<usize> {
        self.partner
    }

    /// Potential responsible for the predicted event.
    #[inline]
    pub fn potential(&self) -> Option<PotentialId> {
        self.potential
    }

    #[inline]
    pub fn field_potential(&self) -> Option<PotentialId> {
        self.field_potential
    }

    /// Last single-particle prediction.
    #[inline]
    pub fn field_time(&self) -> f64 {
        self.field_time
    }

    /// True while the agent has an entry in the schedule.
    #[inline]
    pub fn is_scheduled(&self) -> bool {
        self.handle.is_some()
    }

    pub(crate) fn set_field_potential(&mut self, field_potential: Option<PotentialId>) {
        self.field_potential = field_potential;
    }

    /// Record a predicted event.
    pub fn set_collision(&mut self, time: f64, partner: Option<usize>, potential: PotentialId) {
        self.collision_time = time;
        self.partner = partner;
        self.potential = Some(potential);
    }

    /// Fall back to the last known field prediction and forget the partner.
    ///
    /// Used when the partner's prediction went stale but this particle did not move.
    pub fn reset_partial(&mut self) {
        self.partner = None;
        self.potential = self.field_potential;
        self.collision_time = if self.field_potential.is_some() {
            self.field_time
        } else {
            f64::INFINITY
        };
    }

    /// Replace the field prediction with `field_time`, freshly computed by the
    /// field potential (ignored without one), and forget the partner.
    pub fn reset_full(&mut self, field_time: f64) {
        self.partner = None;
        self.potential = self.field_potential;
        self.field_time = if self.field_potential.is_some() {
            field_time
        } else {
            f64::INFINITY
        };
        self.collision_time = self.field_time;
    }

    /// Shift both cached times by a free-flight interval.
    pub fn decrement(&mut self, dt: f64) {
        self.collision_time -= dt;
        self.field_time -= dt;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_partial_reverts_to_field_time() {
        let field = PotentialId(0);
        let pair = PotentialId(1);
        let mut a = CollisionAgent::new(Some(field));
        a.reset_full(4.0);
        a.set_collision(1.5, Some(9), pair);
        assert_eq!(a.partner(), Some(9));

        a.reset_partial();
        assert_eq!(a.collision_time(), 4.0);
        assert_eq!(a.partner(), None);
        assert_eq!(a.potential(), Some(field));
    }

    #[test]
    fn reset_without_field_potential_is_infinite() {
        let mut a = CollisionAgent::new(None);
        a.set_collision(2.0, Some(1), PotentialId(3));
        a.reset_partial();
        assert!(a.collision_time().is_infinite());
        assert_eq!(a.potential(), None);

        a.reset_full(0.5);
        assert!(a.collision_time().is_infinite());
        assert!(a.field_time().is_infinite());
    }

    #[test]
    fn decrement_moves_both_times() {
        let mut a = CollisionAgent::new(Some(PotentialId(0)));
        a.reset_full(6.0);
        a.set_collision(3.0, Some(2), PotentialId(1));
        a.decrement(2.5);
        assert_eq!(a.collision_time(), 0.5);
        assert_eq!(a.field_time(), 3.5);

        let mut idle = CollisionAgent::new(None);
        idle.decrement(1.0);
        assert!(idle.collision_time().is_infinite());
    }
}
