use crate::config::IntegratorConfig;
use crate::core::hard_box::HardBox;
use crate::core::hard_sphere::HardSphere;
use crate::core::integrator::HardIntegrator;
use crate::core::particle::{dot, sub, Particle, DIM};
use crate::core::potential::PotentialMaster;
use crate::error::{Error, Result};
use rand::{rng, rngs::StdRng, Rng, SeedableRng};
use tracing::debug;

const MAX_PLACEMENT_ATTEMPTS: usize = 1_000_000;

/// `n` non-overlapping spheres of kind 0 inside a box with walls at 0 and `box_size`.
///
/// Positions are rejection sampled within `[radius, L - radius]` on each axis and
/// velocity components are uniform in `[-1, 1]`. A fixed `seed` reproduces the
/// same configuration.
pub fn random_gas(
    n: usize,
    box_size: [f64; DIM],
    radius: f64,
    mass: f64,
    seed: Option<u64>,
) -> Result<Vec<Particle>> {
    if !box_size.iter().all(|&l| l.is_finite() && l >= 2.0 * radius) {
        return Err(Error::InvalidParam(
            "box_size must be finite and at least 2 * radius in every dimension".into(),
        ));
    }

    let mut rng: StdRng = match seed {
        Some(s) => SeedableRng::seed_from_u64(s),
        None => SeedableRng::seed_from_u64(rng().random()),
    };

    let mut particles: Vec<Particle> = Vec::with_capacity(n);
    for id in 0..n {
        let mut attempts = 0usize;
        let r = loop {
            if attempts >= MAX_PLACEMENT_ATTEMPTS {
                return Err(Error::InvalidParam(format!(
                    "failed to place particle {id} without overlap; try fewer particles or smaller radius"
                )));
            }
            attempts += 1;
            let mut r = [0.0_f64; DIM];
            for (k, r_k) in r.iter_mut().enumerate() {
                *r_k = rng.random_range(radius..=box_size[k] - radius);
            }
            if !overlaps_existing(&particles, &r, radius) {
                break r;
            }
        };

        let mut v = [0.0_f64; DIM];
        v.iter_mut().for_each(|x| *x = rng.random_range(-1.0..=1.0));

        let id = u32::try_from(id)
            .map_err(|_| Error::InvalidParam("too many particles".into()))?;
        particles.push(Particle::new(id, r, v, radius, mass)?);
    }
    debug!(n, ?box_size, radius, "placed random gas");
    Ok(particles)
}

/// Integrator with hard-sphere pairs and hard walls for every kind present in `particles`.
pub fn hard_sphere_box(
    particles: Vec<Particle>,
    box_size: [f64; DIM],
    config: IntegratorConfig,
) -> Result<HardIntegrator> {
    let mut potentials = PotentialMaster::new();
    let spheres = potentials.add(Box::new(HardSphere::new()));
    let walls = potentials.add(Box::new(HardBox::new(box_size)?));

    let mut kinds: Vec<u32> = particles.iter().map(|p| p.kind).collect();
    kinds.sort_unstable();
    kinds.dedup();
    for (n, &a) in kinds.iter().enumerate() {
        potentials.set_field(a, Some(walls))?;
        for &b in &kinds[n..] {
            potentials.set_pair(a, b, spheres)?;
        }
    }
    HardIntegrator::new(particles, potentials, config)
}

fn overlaps_existing(existing: &[Particle], r: &[f64; DIM], radius: f64) -> bool {
    existing.iter().any(|p| {
        let d = sub(r, &p.r);
        let sigma = radius + p.radius;
        dot(&d, &d) < sigma * sigma
    })
}
