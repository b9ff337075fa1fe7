use hardsim::config::{DebugContext, IntegratorConfig};
use hardsim::core::Particle;
use hardsim::Result;
use std::sync::Once;
use tracing_subscriber::{fmt, EnvFilter};

static INIT: Once = Once::new();

/// Route integrator logs to the test harness; `RUST_LOG` selects the level.
pub fn init_logging() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
        let _ = fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

/// Default settings with the per-step consistency check switched on.
pub fn checked_config() -> IntegratorConfig {
    IntegratorConfig {
        debug: DebugContext {
            check_consistency: true,
            watch: Vec::new(),
        },
        ..IntegratorConfig::default()
    }
}

/// Sphere of radius 0.5 and unit mass.
pub fn sphere(id: u32, r: [f64; 3], v: [f64; 3]) -> Result<Particle> {
    Particle::new(id, r, v, 0.5, 1.0)
}
