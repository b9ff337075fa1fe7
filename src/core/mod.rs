//! Core data structures and the event-driven step driver.
//!
//! Particles carry their own kinematics; each has a [`CollisionAgent`] caching
//! its next predicted event, and the [`EventSchedule`] orders the agents by
//! that time. Potentials predict and resolve events, and the
//! [`HardIntegrator`] drives the whole thing step by step.

pub mod agent;
pub(crate) mod handlers;
pub mod hard_box;
pub mod hard_sphere;
pub mod integrator;
pub mod listener;
pub mod neighbors;
pub mod particle;
pub mod potential;
pub mod schedule;
pub mod setup;

pub use agent::CollisionAgent;
pub use hard_box::HardBox;
pub use hard_sphere::HardSphere;
pub use integrator::{HardIntegrator, StepReport};
pub use listener::{CollisionEvent, CollisionListener, ListenerId};
pub use neighbors::{AllPairs, Direction, NeighborEnumerator};
pub use particle::{Particle, DIM};
pub use potential::{BumpOutcome, HardPotential, Interaction, PotentialId, PotentialMaster};
pub use schedule::{EventSchedule, ScheduleKey};
pub use setup::{hard_sphere_box, random_gas};
