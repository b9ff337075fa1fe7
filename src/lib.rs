//! Event-driven dynamics for particles interacting through hard potentials.
//!
//! Between events particles move ballistically; at an event a potential applies
//! an impulsive response. The integrator keeps one cached prediction per
//! particle, orders them in a schedule and, after each event, repairs only the
//! predictions that the event can have invalidated.
//!
//! ```no_run
//! use hardsim::config::IntegratorConfig;
//! use hardsim::core::{hard_sphere_box, random_gas};
//!
//! # fn main() -> hardsim::error::Result<()> {
//! let particles = random_gas(64, [12.0; 3], 0.5, 1.0, Some(1))?;
//! let mut sim = hard_sphere_box(particles, [12.0; 3], IntegratorConfig::default())?;
//! sim.reset()?;
//! let report = sim.run(100)?;
//! println!("{} collisions, t = {}", report.collisions, sim.elapsed_time());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod core;
pub mod error;

pub use crate::config::IntegratorConfig;
pub use crate::core::HardIntegrator;
pub use crate::error::{Error, Result};
