use crate::core::agent::CollisionAgent;
use crate::error::{Error, Result};
use ordered_float::NotNan;
use std::cmp::Ordering;
use std::collections::BTreeSet;

/// Position of an agent in the [`EventSchedule`].
///
/// `time` is measured in the schedule's frame (step-local time plus the
/// schedule origin). Keys order by time, then by particle index, so equal
/// times resolve deterministically for a fixed input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScheduleKey {
    pub time: NotNan<f64>,
    pub index: usize,
}

impl ScheduleKey {
    /// Create a key, rejecting NaN times. Infinite times are allowed.
    pub fn new(time: f64, index: usize) -> Result<Self> {
        let time = NotNan::new(time).map_err(|_| {
            Error::MathError(format!("collision time for particle {index} is NaN"))
        })?;
        Ok(Self { time, index })
    }

    /// Returns the raw f64 event time.
    #[inline]
    pub fn time_f64(&self) -> f64 {
        self.time.into_inner()
    }
}

impl Ord for ScheduleKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.time.cmp(&other.time) {
            Ordering::Equal => self.index.cmp(&other.index),
            o => o,
        }
    }
}

impl PartialOrd for ScheduleKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Priority-ordered set of agents keyed by predicted collision time.
///
/// Each agent keeps its own key as the handle, so removal and repositioning are
/// O(log N) without searching. Keys are stored relative to a moving origin:
/// when every agent is decremented by the same free-flight interval the origin
/// advances instead and no entry has to move.
#[derive(Debug, Default)]
pub struct EventSchedule {
    entries: BTreeSet<ScheduleKey>,
    origin: f64,
    advances: u32,
}

impl EventSchedule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.origin = 0.0;
        self.advances = 0;
    }

    /// Insert the agent at `index` with its current collision time.
    ///
    /// An agent that is already scheduled is repositioned instead.
    pub fn insert(&mut self, index: usize, agent: &mut CollisionAgent) -> Result<()> {
        if agent.handle.is_some() {
            self.remove(agent);
        }
        let key = ScheduleKey::new(agent.collision_time() + self.origin, index)?;
        self.entries.insert(key);
        agent.handle = Some(key);
        Ok(())
    }

    /// Remove the agent's entry, if it has one.
    pub fn remove(&mut self, agent: &mut CollisionAgent) {
        if let Some(key) = agent.handle.take() {
            self.entries.remove(&key);
        }
    }

    /// Move the agent to match its (changed) collision time.
    pub fn reposition(&mut self, index: usize, agent: &mut CollisionAgent) -> Result<()> {
        self.remove(agent);
        self.insert(index, agent)
    }

    /// Index of the agent with the earliest predicted event.
    pub fn peek_min(&self) -> Option<usize> {
        self.entries.first().map(|k| k.index)
    }

    /// Key of the earliest entry.
    pub fn first_key(&self) -> Option<&ScheduleKey> {
        self.entries.first()
    }

    /// Replace every entry with one per agent, keyed by its current time.
    ///
    /// Resets the origin to 0.
    pub fn rebuild(&mut self, agents: &mut [CollisionAgent]) -> Result<()> {
        self.origin = 0.0;
        self.advances = 0;
        let mut keys = Vec::with_capacity(agents.len());
        for (i, agent) in agents.iter_mut().enumerate() {
            let key = ScheduleKey::new(agent.collision_time(), i)?;
            agent.handle = Some(key);
            keys.push(key);
        }
        self.entries = keys.into_iter().collect();
        Ok(())
    }

    /// Account for every agent having been decremented by `dt`.
    pub fn advance(&mut self, dt: f64) {
        self.origin += dt;
        self.advances += 1;
    }

    /// Number of [`advance`](Self::advance) calls since the last rebuild.
    pub fn advances_since_rebuild(&self) -> u32 {
        self.advances
    }

    /// Offset between key times and step-local agent times.
    pub fn origin(&self) -> f64 {
        self.origin
    }

    /// Step-local time of `key`.
    #[inline]
    pub fn local_time(&self, key: &ScheduleKey) -> f64 {
        key.time_f64() - self.origin
    }

    /// Iterate entries in schedule order.
    pub fn iter(&self) -> impl Iterator<Item = &ScheduleKey> {
        self.entries.iter()
    }

    pub(crate) fn contains(&self, key: &ScheduleKey) -> bool {
        self.entries.contains(key)
    }
}
