//! Initial particle distribution.

use gravwell_core::{Float4, HostVec};
use rand::Rng;
use std::f32::consts::TAU;

/// Speed every particle starts with, along its outward direction.
pub const INITIAL_SPEED: f32 = 0.0;

const MIN_RADIUS: f32 = 0.1;
const MAX_RADIUS: f32 = 0.95;

/// Initial particle state, ready for a gravity payload.
#[derive(Debug)]
pub struct Particles {
    pub positions: Vec<Float4>,
    pub velocities: HostVec<Float4>,
    pub colors: Vec<Float4>,
}

/// Spread `n` particles on a ring around the z axis.
///
/// Particle `i` sits at angle `TAU * i / n` with a random radius in
/// `[0.1, 0.95)`; its height is `radius - 0.5`, so the ring forms a cone.
/// All particles start red.
pub fn seed_particles(n: usize, rng: &mut impl Rng) -> Particles {
    let mut positions = Vec::with_capacity(n);
    let mut velocities = Vec::with_capacity(n);

    for i in 0..n {
        let angle = TAU * i as f32 / n as f32;
        let (sin, cos) = angle.sin_cos();
        let radius = rng.random_range(MIN_RADIUS..MAX_RADIUS);

        positions.push(Float4::new(radius * cos, radius * sin, radius - 0.5, 1.0));
        velocities.push(Float4::new(
            cos * INITIAL_SPEED,
            sin * INITIAL_SPEED,
            INITIAL_SPEED,
            1.0,
        ));
    }

    Particles {
        positions,
        velocities: HostVec::new(velocities),
        colors: vec![Float4::new(1.0, 0.0, 0.0, 1.0); n],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_ring_layout() {
        let mut rng = StdRng::seed_from_u64(7);
        let particles = seed_particles(64, &mut rng);
        assert_eq!(particles.positions.len(), 64);
        assert_eq!(particles.velocities.len(), 64);
        assert_eq!(particles.colors.len(), 64);

        for p in &particles.positions {
            let radius = (p.x * p.x + p.y * p.y).sqrt();
            assert!((MIN_RADIUS - 1e-5..MAX_RADIUS + 1e-5).contains(&radius));
            assert!((p.z - (radius - 0.5)).abs() < 1e-5);
            assert_eq!(p.w, 1.0);
        }
        // First particle lies on the positive x axis
        assert!(particles.positions[0].y.abs() < 1e-6);
        assert!(particles.positions[0].x > 0.0);
    }

    #[test]
    fn test_starts_at_rest_and_red() {
        let mut rng = StdRng::seed_from_u64(1);
        let particles = seed_particles(8, &mut rng);
        for v in particles.velocities.read().iter() {
            assert_eq!(*v, Float4::new(0.0, 0.0, 0.0, 1.0));
        }
        assert!(particles.colors.iter().all(|c| *c == Float4::new(1.0, 0.0, 0.0, 1.0)));
    }

    #[test]
    fn test_seed_is_deterministic() {
        let a = seed_particles(16, &mut StdRng::seed_from_u64(42));
        let b = seed_particles(16, &mut StdRng::seed_from_u64(42));
        assert_eq!(a.positions, b.positions);
    }
}
