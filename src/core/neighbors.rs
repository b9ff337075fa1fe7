use crate::core::particle::Particle;
use std::fmt;

/// Which half of a particle's candidate partners to enumerate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Partners whose pair events are recorded on the target's own agent.
    Up,
    /// Partners that record their pair event with the target on their agent.
    Down,
}

/// Supplies candidate partners for the collision handlers.
///
/// For any two particles `i` and `j` that may interact, exactly one of
/// `j ∈ Up(i)` or `i ∈ Up(j)` holds, and `j ∈ Up(i)` iff `i ∈ Down(j)`.
/// The order must be reproducible for a fixed configuration.
pub trait NeighborEnumerator: fmt::Debug {
    /// Append the candidates of `target` in `direction` to `out` (which is cleared first).
    fn candidates(
        &self,
        particles: &[Particle],
        target: usize,
        direction: Direction,
        out: &mut Vec<usize>,
    );
}

/// Every particle is a candidate; Up is the higher indices, Down the lower ones.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllPairs;

impl NeighborEnumerator for AllPairs {
    fn candidates(
        &self,
        particles: &[Particle],
        target: usize,
        direction: Direction,
        out: &mut Vec<usize>,
    ) {
        out.clear();
        match direction {
            Direction::Up => out.extend((target + 1)..particles.len()),
            Direction::Down => out.extend(0..target.min(particles.len())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;

    #[test]
    fn all_pairs_splits_at_target() -> Result<()> {
        let ps: Vec<Particle> = (0..5)
            .map(|i| Particle::new(i, [i as f64, 0.0, 0.0], [0.0; 3], 0.1, 1.0))
            .collect::<Result<_>>()?;
        let mut out = vec![99];
        AllPairs.candidates(&ps, 2, Direction::Up, &mut out);
        assert_eq!(out, vec![3, 4]);
        AllPairs.candidates(&ps, 2, Direction::Down, &mut out);
        assert_eq!(out, vec![0, 1]);
        AllPairs.candidates(&ps, 4, Direction::Up, &mut out);
        assert!(out.is_empty());
        Ok(())
    }

    #[test]
    fn every_pair_seen_exactly_once_upward() -> Result<()> {
        let ps: Vec<Particle> = (0..6)
            .map(|i| Particle::new(i, [i as f64, 0.0, 0.0], [0.0; 3], 0.1, 1.0))
            .collect::<Result<_>>()?;
        let mut seen = 0usize;
        let mut out = Vec::new();
        for i in 0..ps.len() {
            AllPairs.candidates(&ps, i, Direction::Up, &mut out);
            for &j in &out {
                let mut down = Vec::new();
                AllPairs.candidates(&ps, j, Direction::Down, &mut down);
                assert!(down.contains(&i));
                seen += 1;
            }
        }
        assert_eq!(seen, 6 * 5 / 2);
        Ok(())
    }
}
