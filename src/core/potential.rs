use crate::core::particle::Particle;
use crate::error::{Error, Result};
use std::collections::BTreeMap;
use std::fmt;

/// Handle to a potential registered with a [`PotentialMaster`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PotentialId(pub usize);

/// Particles taking part in a predicted or resolved event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interaction {
    /// Field or boundary event for one particle.
    Single(usize),
    /// Pair event; the first index is the particle whose agent records it.
    Pair(usize, usize),
}

impl Interaction {
    #[inline]
    pub fn first(&self) -> usize {
        match *self {
            Interaction::Single(i) | Interaction::Pair(i, _) => i,
        }
    }

    #[inline]
    pub fn partner(&self) -> Option<usize> {
        match *self {
            Interaction::Single(_) => None,
            Interaction::Pair(_, j) => Some(j),
        }
    }
}

/// What resolving an event did beyond changing velocities.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BumpOutcome {
    /// Potential energy gained by the event; kinetic energy changes by the negative.
    pub energy_change: f64,
    /// Pair virial `r_ij . dp_ij` of the impulse (0 for field events).
    pub virial: f64,
}

/// A hard (impulsive) interaction.
///
/// Times are on the step-local clock: `now` is the local time at which the
/// particles' true positions are `r + v now`, and the returned time is absolute
/// on the same clock (`+inf` when no event is predicted). `bump` must keep
/// trajectories continuous by shifting origins together with velocities, see
/// [`Particle::kick`].
pub trait HardPotential: fmt::Debug {
    /// Short human-readable name used in diagnostics.
    fn name(&self) -> &str;

    fn collision_time(&self, interaction: Interaction, particles: &[Particle], now: f64) -> f64;

    /// Apply the impulsive response at local time `at`.
    fn bump(
        &mut self,
        interaction: Interaction,
        particles: &mut [Particle],
        at: f64,
    ) -> Result<BumpOutcome>;

    /// Potential energy of the current configuration; `+inf` marks an overlap.
    fn energy(&self, _interaction: Interaction, _particles: &[Particle]) -> f64 {
        0.0
    }
}

/// Registry of potentials plus the lookup tables that assign them to particle kinds.
#[derive(Debug, Default)]
pub struct PotentialMaster {
    potentials: Vec<Box<dyn HardPotential>>,
    pairs: BTreeMap<(u32, u32), PotentialId>,
    fields: BTreeMap<u32, PotentialId>,
}

impl PotentialMaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a potential; it does nothing until assigned to kinds.
    pub fn add(&mut self, potential: Box<dyn HardPotential>) -> PotentialId {
        self.potentials.push(potential);
        PotentialId(self.potentials.len() - 1)
    }

    pub fn len(&self) -> usize {
        self.potentials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.potentials.is_empty()
    }

    pub fn get(&self, id: PotentialId) -> Result<&dyn HardPotential> {
        self.potentials
            .get(id.0)
            .map(|p| p.as_ref())
            .ok_or_else(|| Error::InvalidParam(format!("unknown potential id {}", id.0)))
    }

    pub fn get_mut(&mut self, id: PotentialId) -> Result<&mut (dyn HardPotential + 'static)> {
        self.potentials
            .get_mut(id.0)
            .map(|p| p.as_mut())
            .ok_or_else(|| Error::InvalidParam(format!("unknown potential id {}", id.0)))
    }

    /// Name of a potential, or a placeholder for an unknown id.
    pub fn name(&self, id: PotentialId) -> String {
        self.get(id)
            .map(|p| p.name().to_string())
            .unwrap_or_else(|_| format!("potential #{}", id.0))
    }

    /// Assign a pair potential to kinds `a` and `b` (in either order).
    pub fn set_pair(&mut self, a: u32, b: u32, id: PotentialId) -> Result<()> {
        self.get(id)?;
        self.pairs.insert(pair_key(a, b), id);
        Ok(())
    }

    pub fn pair_for(&self, a: u32, b: u32) -> Option<PotentialId> {
        self.pairs.get(&pair_key(a, b)).copied()
    }

    /// Assign (or clear) the field potential for one kind.
    pub fn set_field(&mut self, kind: u32, id: Option<PotentialId>) -> Result<()> {
        match id {
            Some(id) => {
                self.get(id)?;
                self.fields.insert(kind, id);
            }
            None => {
                self.fields.remove(&kind);
            }
        }
        Ok(())
    }

    pub fn field_for(&self, kind: u32) -> Option<PotentialId> {
        self.fields.get(&kind).copied()
    }
}

#[inline]
fn pair_key(a: u32, b: u32) -> (u32, u32) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::hard_box::HardBox;
    use crate::core::hard_sphere::HardSphere;

    #[test]
    fn pair_lookup_is_symmetric() -> Result<()> {
        let mut master = PotentialMaster::new();
        let hs = master.add(Box::new(HardSphere::new()));
        master.set_pair(2, 1, hs)?;
        assert_eq!(master.pair_for(1, 2), Some(hs));
        assert_eq!(master.pair_for(2, 1), Some(hs));
        assert_eq!(master.pair_for(1, 1), None);
        Ok(())
    }

    #[test]
    fn unknown_ids_are_rejected() {
        let mut master = PotentialMaster::new();
        assert!(master.set_pair(0, 0, PotentialId(3)).is_err());
        assert!(master.set_field(0, Some(PotentialId(0))).is_err());
        assert_eq!(master.name(PotentialId(9)), "potential #9");
    }

    #[test]
    fn field_can_be_cleared() -> Result<()> {
        let mut master = PotentialMaster::new();
        let walls = master.add(Box::new(HardBox::new([5.0, 5.0, 5.0])?));
        master.set_field(0, Some(walls))?;
        assert_eq!(master.field_for(0), Some(walls));
        assert_eq!(master.name(walls), "hard box");
        master.set_field(0, None)?;
        assert_eq!(master.field_for(0), None);
        Ok(())
    }

    #[test]
    fn interaction_accessors() {
        assert_eq!(Interaction::Pair(3, 8).first(), 3);
        assert_eq!(Interaction::Pair(3, 8).partner(), Some(8));
        assert_eq!(Interaction::Single(4).partner(), None);
    }
}
