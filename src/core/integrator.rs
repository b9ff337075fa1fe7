use crate::config::IntegratorConfig;
use crate::core::agent::CollisionAgent;
use crate::core::handlers::{pair_time, CollisionHandlers};
use crate::core::listener::{CollisionEvent, CollisionListener, ListenerId, Listeners};
use crate::core::neighbors::{AllPairs, Direction, NeighborEnumerator};
use crate::core::particle::{dot, sub, Particle, DIM};
use crate::core::potential::{HardPotential, Interaction, PotentialId, PotentialMaster};
use crate::core::schedule::EventSchedule;
use crate::error::{Error, Result};
use tracing::{debug, error, trace, warn};

/// Free-flight steps between schedule rebuilds; bounds the rounding drift
/// between key times and agent times.
const REBASE_INTERVAL: u32 = 256;

/// Relative slack when comparing key times with agent times.
const KEY_SLACK: f64 = 1e-12;

/// Event-driven integrator for hard potentials.
///
/// Each step advances the system from collision to collision until the next
/// predicted event lies beyond the step budget, then lets every particle fly
/// freely to the end of the step. Predictions live in one [`CollisionAgent`]
/// per particle and are ordered by an [`EventSchedule`]; after each event only
/// the agents that can be affected are recomputed.
///
/// Times inside a step use a step-local clock starting at 0. Particle positions
/// are only brought up to date at the end of the step (see [`Particle::position_at`]).
#[derive(Debug)]
pub struct HardIntegrator {
    config: IntegratorConfig,
    particles: Vec<Particle>,
    agents: Vec<CollisionAgent>,
    schedule: EventSchedule,
    potentials: PotentialMaster,
    neighbors: Box<dyn NeighborEnumerator>,
    listeners: Listeners,
    scratch: Vec<usize>,
    stale: Vec<usize>,
    initialized: bool,
    corrupted: bool,
    elapsed: f64,
    collision_count: u64,
    kinetic_energy: f64,
    potential_energy: f64,
}

/// Summary of one call to [`HardIntegrator::do_step`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StepReport {
    /// Events resolved during the step.
    pub collisions: u64,
    /// Step-local time of the last resolved event.
    pub last_collision_time: Option<f64>,
}

/// The event at the head of the schedule.
#[derive(Debug, Clone, Copy, PartialEq)]
struct PendingEvent {
    particle: usize,
    partner: Option<usize>,
    potential: PotentialId,
    time: f64,
}

impl PendingEvent {
    fn interaction(&self) -> Interaction {
        match self.partner {
            Some(j) => Interaction::Pair(self.particle, j),
            None => Interaction::Single(self.particle),
        }
    }
}

enum StepState {
    AwaitingNextEvent,
    ResolvingEvent(PendingEvent),
    RepairingSchedule(PendingEvent),
    AdvancingFreeFlight,
    Complete,
}

impl HardIntegrator {
    /// Create an integrator over `particles` using the all-pairs enumerator.
    ///
    /// Agents are created here; predictions are computed by [`reset`](Self::reset),
    /// which the first step runs if the caller has not.
    pub fn new(
        particles: Vec<Particle>,
        potentials: PotentialMaster,
        config: IntegratorConfig,
    ) -> Result<Self> {
        config.validate()?;
        let agents = particles
            .iter()
            .map(|p| CollisionAgent::new(potentials.field_for(p.kind)))
            .collect();
        let kinetic_energy = particles.iter().map(Particle::kinetic_energy).sum();
        Ok(Self {
            config,
            particles,
            agents,
            schedule: EventSchedule::new(),
            potentials,
            neighbors: Box::new(AllPairs),
            listeners: Listeners::default(),
            scratch: Vec::new(),
            stale: Vec::new(),
            initialized: false,
            corrupted: false,
            elapsed: 0.0,
            collision_count: 0,
            kinetic_energy,
            potential_energy: 0.0,
        })
    }

    /// Replace the candidate enumerator; predictions are rebuilt on the next reset.
    pub fn with_neighbors(mut self, neighbors: Box<dyn NeighborEnumerator>) -> Self {
        self.neighbors = neighbors;
        self.invalidate();
        self
    }

    // ============ Accessors ============

    pub fn config(&self) -> &IntegratorConfig {
        &self.config
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn particle(&self, i: usize) -> Option<&Particle> {
        self.particles.get(i)
    }

    pub fn num_particles(&self) -> usize {
        self.particles.len()
    }

    pub fn agents(&self) -> &[CollisionAgent] {
        &self.agents
    }

    pub fn agent(&self, i: usize) -> Option<&CollisionAgent> {
        self.agents.get(i)
    }

    pub fn schedule(&self) -> &EventSchedule {
        &self.schedule
    }

    pub fn potential(&self, id: PotentialId) -> Result<&dyn HardPotential> {
        self.potentials.get(id)
    }

    /// Elapsed simulation time (sum of completed step budgets).
    pub fn elapsed_time(&self) -> f64 {
        self.elapsed
    }

    /// Total number of resolved events.
    pub fn collision_count(&self) -> u64 {
        self.collision_count
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// True after a fatal error until the next successful [`reset`](Self::reset).
    pub fn is_corrupted(&self) -> bool {
        self.corrupted
    }

    /// Kinetic energy recomputed from the particles.
    pub fn kinetic_energy(&self) -> f64 {
        self.particles.iter().map(Particle::kinetic_energy).sum()
    }

    /// Kinetic energy tracked through event energy changes.
    pub fn tracked_kinetic_energy(&self) -> f64 {
        self.kinetic_energy
    }

    /// Potential energy tracked through event energy changes (`+inf` while overlapped).
    pub fn potential_energy(&self) -> f64 {
        self.potential_energy
    }

    /// Agent at the head of the schedule.
    pub fn next_collision(&self) -> Option<(usize, &CollisionAgent)> {
        let i = self.schedule.peek_min()?;
        self.agents.get(i).map(|a| (i, a))
    }

    // ============ Controller operations ============

    /// Register a potential; assign it with [`set_pair_potential`](Self::set_pair_potential)
    /// or [`set_field_potential`](Self::set_field_potential).
    pub fn add_potential(&mut self, potential: Box<dyn HardPotential>) -> PotentialId {
        self.potentials.add(potential)
    }

    pub fn set_pair_potential(&mut self, a: u32, b: u32, id: PotentialId) -> Result<()> {
        self.potentials.set_pair(a, b, id)?;
        self.invalidate();
        Ok(())
    }

    /// Set (or clear) the single-particle potential for every particle of `kind`.
    pub fn set_field_potential(&mut self, kind: u32, id: Option<PotentialId>) -> Result<()> {
        self.potentials.set_field(kind, id)?;
        for (agent, p) in self.agents.iter_mut().zip(&self.particles) {
            if p.kind == kind {
                agent.set_field_potential(id);
            }
        }
        self.invalidate();
        Ok(())
    }

    /// Add a particle; returns its index. Predictions are rebuilt on the next reset.
    pub fn add_particle(&mut self, particle: Particle) -> usize {
        self.agents
            .push(CollisionAgent::new(self.potentials.field_for(particle.kind)));
        self.kinetic_energy += particle.kinetic_energy();
        self.particles.push(particle);
        self.invalidate();
        self.particles.len() - 1
    }

    /// Remove the particle at `index`; later particles shift down by one.
    pub fn remove_particle(&mut self, index: usize) -> Result<Particle> {
        if index >= self.particles.len() {
            return Err(Error::InvalidParam(format!(
                "particle index {index} out of range (n = {})",
                self.particles.len()
            )));
        }
        self.agents.remove(index);
        let removed = self.particles.remove(index);
        self.kinetic_energy -= removed.kinetic_energy();
        self.invalidate();
        Ok(removed)
    }

    pub fn add_collision_listener(&mut self, listener: Box<dyn CollisionListener>) -> ListenerId {
        self.listeners.add(listener)
    }

    pub fn remove_collision_listener(&mut self, id: ListenerId) -> Option<Box<dyn CollisionListener>> {
        self.listeners.remove(id)
    }

    pub fn num_listeners(&self) -> usize {
        self.listeners.len()
    }

    /// Full reinitialization: recompute energies and every prediction.
    ///
    /// Clears a corruption latch. If the configuration has overlapping
    /// particles the schedule is still rebuilt and
    /// [`Error::ConfigurationOverlap`] is returned.
    pub fn reset(&mut self) -> Result<()> {
        self.corrupted = false;
        self.kinetic_energy = self.kinetic_energy();
        self.reset_collision_times()?;
        self.initialized = true;

        let (energy, overlap) = self.compute_potential_energy()?;
        self.potential_energy = energy;
        if let Some((first, second)) = overlap {
            warn!(first, ?second, "initial configuration has overlapping particles");
            return Err(Error::ConfigurationOverlap { first, second });
        }
        Ok(())
    }

    /// Recompute every agent from scratch and rebuild the schedule.
    pub fn reset_collision_times(&mut self) -> Result<()> {
        let result = self.handlers(0.0).rebuild_all();
        if result.is_err() {
            self.corrupted = true;
        }
        result?;
        debug!(
            particles = self.particles.len(),
            next = ?self.next_collision().map(|(i, a)| (i, a.collision_time())),
            "collision times reset"
        );
        Ok(())
    }

    /// Notification that the neighbor structure changed.
    pub fn neighbors_updated(&mut self) -> Result<()> {
        if self.initialized {
            self.reset_collision_times()?;
        }
        Ok(())
    }

    /// Change one particle's velocity between steps and repair only what depends on it.
    pub fn set_velocity(&mut self, index: usize, v: [f64; DIM]) -> Result<()> {
        let Some(p) = self.particles.get_mut(index) else {
            return Err(Error::InvalidParam(format!(
                "particle index {index} out of range"
            )));
        };
        let before = p.kinetic_energy();
        p.set_velocity(v)?;
        self.kinetic_energy += p.kinetic_energy() - before;

        if self.initialized && !self.corrupted {
            self.repair(&[index], 0.0)?;
        }
        Ok(())
    }

    /// Apply a bulk change to the particles (e.g. velocity rescaling), then fully reset.
    pub fn perturb<F>(&mut self, f: F) -> Result<()>
    where
        F: FnOnce(&mut [Particle]),
    {
        f(&mut self.particles);
        if let Some(i) = self.particles.iter().position(|p| !p.is_finite()) {
            return Err(Error::InvalidParam(format!(
                "particle {i} has a non-finite position or velocity"
            )));
        }
        self.reset()
    }

    /// Run `steps` steps of the configured time step.
    pub fn run(&mut self, steps: usize) -> Result<StepReport> {
        let mut total = StepReport::default();
        for _ in 0..steps {
            let report = self.do_step(self.config.time_step)?;
            total.collisions += report.collisions;
            if report.last_collision_time.is_some() {
                total.last_collision_time = report.last_collision_time;
            }
        }
        Ok(total)
    }

    /// Advance the system by `budget`, resolving every event predicted within it.
    ///
    /// Any error raised inside the step latches the integrator as corrupted.
    pub fn do_step(&mut self, budget: f64) -> Result<StepReport> {
        if !budget.is_finite() || budget < 0.0 {
            return Err(Error::InvalidParam("step budget must be finite and >= 0".into()));
        }
        if self.corrupted {
            return Err(Error::ScheduleCorrupted);
        }
        if !self.initialized {
            self.reset()?;
        }
        if self.potential_energy.is_infinite() {
            // We were overlapped at some point; try to pick the energy up again.
            self.potential_energy = self.compute_potential_energy()?.0;
        }

        match self.step(budget) {
            Ok(report) => Ok(report),
            Err(e) => {
                self.corrupted = true;
                error!(error = %e, elapsed = self.elapsed, "step aborted");
                Err(e)
            }
        }
    }

    fn step(&mut self, budget: f64) -> Result<StepReport> {
        let tolerance = self.config.tolerance();
        let mut report = StepReport::default();
        let mut previous = 0.0_f64;
        let mut state = StepState::AwaitingNextEvent;

        loop {
            state = match state {
                StepState::AwaitingNextEvent => match self.next_event()? {
                    Some(ev) if ev.time < budget => StepState::ResolvingEvent(ev),
                    _ => StepState::AdvancingFreeFlight,
                },
                StepState::ResolvingEvent(ev) => {
                    if ev.time - previous < -tolerance {
                        return Err(self.time_travel(&ev, previous));
                    }
                    self.resolve(&ev)?;
                    report.collisions += 1;
                    report.last_collision_time = Some(ev.time);
                    StepState::RepairingSchedule(ev)
                }
                StepState::RepairingSchedule(ev) => {
                    match ev.partner {
                        Some(j) => self.repair(&[ev.particle, j], ev.time)?,
                        None => self.repair(&[ev.particle], ev.time)?,
                    }
                    if let Some(next) = self.next_event()? {
                        if next.particle == ev.particle
                            && next.partner == ev.partner
                            && next.time == ev.time
                        {
                            return Err(Error::RepeatedCollision {
                                particle: ev.particle,
                                partner: ev.partner,
                                time: ev.time,
                            });
                        }
                    }
                    previous = ev.time;
                    StepState::AwaitingNextEvent
                }
                StepState::AdvancingFreeFlight => {
                    self.advance_across(budget)?;
                    StepState::Complete
                }
                StepState::Complete => break,
            };
        }

        if self.config.debug.check_consistency {
            self.check_consistency()?;
        }
        Ok(report)
    }

    // ============ Step internals ============

    fn next_event(&self) -> Result<Option<PendingEvent>> {
        let Some((particle, agent)) = self.next_collision() else {
            return Ok(None);
        };
        let time = agent.collision_time();
        if !time.is_finite() {
            return Ok(None);
        }
        let potential = agent.potential().ok_or_else(|| {
            Error::Inconsistent(format!(
                "particle {particle} has event time {time} but no potential"
            ))
        })?;
        Ok(Some(PendingEvent {
            particle,
            partner: agent.partner(),
            potential,
            time,
        }))
    }

    /// Apply the event's response, update bookkeeping and notify listeners.
    fn resolve(&mut self, ev: &PendingEvent) -> Result<()> {
        if self.config.debug.watches(ev.particle)
            || ev.partner.is_some_and(|j| self.config.debug.watches(j))
        {
            trace!(
                particle = ev.particle,
                partner = ?ev.partner,
                time = ev.time,
                potential = %self.potentials.name(ev.potential),
                "collision"
            );
        }

        let outcome = self
            .potentials
            .get_mut(ev.potential)?
            .bump(ev.interaction(), &mut self.particles, ev.time)?;
        self.potential_energy += outcome.energy_change;
        self.kinetic_energy -= outcome.energy_change;
        self.collision_count += 1;

        for idx in std::iter::once(ev.particle).chain(ev.partner) {
            let p = &mut self.particles[idx];
            p.bump_collision_count();
            if !p.is_finite() {
                return Err(Error::NonFiniteState {
                    particle: idx,
                    potential: self.potentials.name(ev.potential),
                    time: ev.time,
                });
            }
        }

        self.listeners.notify(&CollisionEvent {
            particle: ev.particle,
            partner: ev.partner,
            potential: ev.potential,
            time: ev.time,
            sim_time: self.elapsed + ev.time,
            energy_change: outcome.energy_change,
            virial: outcome.virial,
        });
        Ok(())
    }

    /// Restore schedule consistency around the particles whose state changed.
    fn repair(&mut self, changed: &[usize], now: f64) -> Result<()> {
        let mut stale = std::mem::take(&mut self.stale);
        stale.clear();

        let mut handlers = self.handlers(now);
        // Reverse has to see the partner links from before the change.
        for &i in changed {
            handlers.reverse(i, &mut stale);
        }
        // The colliders get a full reset below.
        stale.retain(|q| !changed.contains(q));
        handlers.refresh_stale(&stale)?;
        for &i in changed {
            handlers.refresh_changed(i)?;
        }

        self.stale = stale;
        Ok(())
    }

    /// Ballistic motion of every particle to the end of the step.
    fn advance_across(&mut self, dt: f64) -> Result<()> {
        for p in &mut self.particles {
            p.advance(dt);
        }
        for agent in &mut self.agents {
            agent.decrement(dt);
        }
        self.schedule.advance(dt);
        if self.schedule.advances_since_rebuild() >= REBASE_INTERVAL {
            self.schedule.rebuild(&mut self.agents)?;
        }
        self.elapsed += dt;
        Ok(())
    }

    fn time_travel(&self, ev: &PendingEvent, previous: f64) -> Error {
        let separation = ev.partner.map(|j| {
            let (pi, pj) = (&self.particles[ev.particle], &self.particles[j]);
            let at = |t: f64| {
                let d = sub(&pj.position_at(t), &pi.position_at(t));
                dot(&d, &d).sqrt()
            };
            (at(previous), at(ev.time))
        });
        let err = Error::TimeTravel {
            particle: ev.particle,
            partner: ev.partner,
            previous,
            current: ev.time,
            potential: self.potentials.name(ev.potential),
            separation,
        };
        error!(
            particle = ev.particle,
            partner = ?ev.partner,
            previous,
            current = ev.time,
            "previous collision occurred after current one"
        );
        err
    }

    fn handlers(&mut self, now: f64) -> CollisionHandlers<'_> {
        CollisionHandlers {
            particles: &self.particles,
            agents: &mut self.agents,
            schedule: &mut self.schedule,
            potentials: &self.potentials,
            neighbors: self.neighbors.as_ref(),
            scratch: &mut self.scratch,
            debug: &self.config.debug,
            now,
        }
    }

    /// Drop the schedule; the next reset rebuilds it.
    fn invalidate(&mut self) {
        self.initialized = false;
        self.schedule.clear();
        for agent in &mut self.agents {
            agent.handle = None;
        }
    }

    // ============ Diagnostics ============

    /// Potential energy of the configuration and the first overlapping interaction, if any.
    fn compute_potential_energy(&self) -> Result<(f64, Option<(usize, Option<usize>)>)> {
        let mut total = 0.0;
        let mut overlap = None;
        let mut candidates = Vec::new();
        for i in 0..self.particles.len() {
            if let Some(id) = self.agents[i].field_potential() {
                let u = self
                    .potentials
                    .get(id)?
                    .energy(Interaction::Single(i), &self.particles);
                total += u;
                if u.is_infinite() && overlap.is_none() {
                    overlap = Some((i, None));
                }
            }
            self.neighbors
                .candidates(&self.particles, i, Direction::Up, &mut candidates);
            for &j in &candidates {
                let Some(id) = self
                    .potentials
                    .pair_for(self.particles[i].kind, self.particles[j].kind)
                else {
                    continue;
                };
                let u = self
                    .potentials
                    .get(id)?
                    .energy(Interaction::Pair(i, j), &self.particles);
                total += u;
                if u.is_infinite() && overlap.is_none() {
                    overlap = Some((i, Some(j)));
                }
            }
        }
        Ok((total, overlap))
    }

    /// Earliest event for particle `i` found by scanning from scratch at the
    /// step-local origin, without touching any state: (time, partner).
    pub fn predicted_collision(&self, i: usize) -> Result<(f64, Option<usize>)> {
        if i >= self.particles.len() {
            return Err(Error::InvalidParam(format!("particle index {i} out of range")));
        }
        let mut best = (f64::INFINITY, None);
        if let Some(id) = self.agents[i].field_potential() {
            best.0 = self
                .potentials
                .get(id)?
                .collision_time(Interaction::Single(i), &self.particles, 0.0);
        }
        let mut candidates = Vec::new();
        self.neighbors
            .candidates(&self.particles, i, Direction::Up, &mut candidates);
        for &j in &candidates {
            if let Some((t, _)) = pair_time(&self.potentials, &self.particles, i, j, 0.0)? {
                if t < best.0 {
                    best = (t, Some(j));
                }
            }
        }
        Ok(best)
    }

    /// Verify that every agent is scheduled under its current time, that the
    /// schedule head is the earliest agent, and that the tracked kinetic energy
    /// matches the particles. Meaningful between steps.
    pub fn check_consistency(&self) -> Result<()> {
        if !self.initialized {
            return Err(Error::Inconsistent("integrator is not initialized".into()));
        }
        if self.schedule.len() != self.agents.len() {
            return Err(Error::Inconsistent(format!(
                "schedule holds {} entries for {} agents",
                self.schedule.len(),
                self.agents.len()
            )));
        }

        let origin = self.schedule.origin();
        let close = |a: f64, b: f64| {
            a == b || (a - b).abs() <= KEY_SLACK * (origin.abs() + a.abs()).max(1.0)
        };

        let mut earliest = f64::INFINITY;
        for (i, agent) in self.agents.iter().enumerate() {
            let key = agent.handle.ok_or_else(|| {
                Error::Inconsistent(format!("agent {i} is not scheduled"))
            })?;
            let t = agent.collision_time();
            let filed = self.schedule.local_time(&key);
            if key.index != i || !close(filed, t) || !self.schedule.contains(&key) {
                return Err(Error::Inconsistent(format!(
                    "agent {i} (time {t}) is filed under {key:?}"
                )));
            }
            if t.is_finite() && agent.potential().is_none() {
                return Err(Error::Inconsistent(format!(
                    "agent {i} has time {t} but no potential"
                )));
            }
            earliest = earliest.min(t);
        }
        let head = self
            .schedule
            .first_key()
            .map_or(f64::INFINITY, |k| self.schedule.local_time(k));
        if !close(head, earliest) {
            return Err(Error::Inconsistent(format!(
                "schedule head {head} differs from earliest agent time {earliest}"
            )));
        }

        let ke = self.kinetic_energy();
        if (ke - self.kinetic_energy).abs() > 1e-8 * ke.abs().max(1.0) {
            return Err(Error::Inconsistent(format!(
                "kinetic energy is {ke} but tracked value is {}",
                self.kinetic_energy
            )));
        }
        Ok(())
    }
}
