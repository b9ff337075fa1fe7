use thiserror::Error;

/// Crate-wide result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the collision integrator.
///
/// Variants fall into two classes. Recoverable ones ([`Error::InvalidParam`],
/// [`Error::Config`], [`Error::ConfigurationOverlap`]) leave the integrator
/// usable; a caller may fix its input or regenerate the starting
/// configuration and retry. Fatal ones signal a corrupted event schedule: the
/// integrator latches and refuses further steps until a full reset.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid user or API parameter.
    #[error("invalid parameter: {0}")]
    InvalidParam(String),

    /// Numerical or geometric issue (e.g., degenerate contact normal, NaN event time).
    #[error("numerical error: {0}")]
    MathError(String),

    /// Configuration document could not be parsed.
    #[error("configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// The configuration handed to reset has overlapping particles.
    ///
    /// The schedule is still rebuilt before this is returned.
    #[error("configuration overlap involving particle {first}{}", fmt_partner(.second))]
    ConfigurationOverlap { first: usize, second: Option<usize> },

    /// An event was about to be resolved earlier than the previously resolved one.
    #[error(
        "this simulation is not a time machine: event for particle {particle}{} via {potential} at {current} precedes previous event at {previous}{}",
        fmt_partner(.partner),
        fmt_separation(.separation)
    )]
    TimeTravel {
        particle: usize,
        partner: Option<usize>,
        previous: f64,
        current: f64,
        potential: String,
        /// Pair separation at the previous and at the current event time.
        separation: Option<(f64, f64)>,
    },

    /// Resolving an event left a particle with a non-finite position or velocity.
    #[error("non-finite state for particle {particle} after {potential} event at {time}")]
    NonFiniteState {
        particle: usize,
        potential: String,
        time: f64,
    },

    /// Schedule repair produced the event it just resolved.
    #[error("repeating collision for particle {particle}{} at {time}", fmt_partner(.partner))]
    RepeatedCollision {
        particle: usize,
        partner: Option<usize>,
        time: f64,
    },

    /// Agents, schedule or tracked energies disagree.
    #[error("inconsistent integrator state: {0}")]
    Inconsistent(String),

    /// A previous fatal error left the schedule unusable; reset before stepping again.
    #[error("event schedule is corrupted; a full reset is required")]
    ScheduleCorrupted,
}

impl Error {
    /// True for errors that indicate schedule corruption.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::TimeTravel { .. }
                | Error::NonFiniteState { .. }
                | Error::RepeatedCollision { .. }
                | Error::Inconsistent(_)
                | Error::ScheduleCorrupted
        )
    }

    /// True for errors after which reinitializing and retrying is legitimate.
    pub fn is_recoverable(&self) -> bool {
        !self.is_fatal()
    }
}

fn fmt_partner(partner: &Option<usize>) -> String {
    match partner {
        Some(j) => format!(" (partner {j})"),
        None => String::new(),
    }
}

fn fmt_separation(separation: &Option<(f64, f64)>) -> String {
    match separation {
        Some((then, now)) => format!("; separation was {then}, now {now}"),
        None => String::new(),
    }
}
