use super::{BeliefModel, Particle};
use serde::Serialize;

/// Shannon entropy (nats) of a distribution, skipping zero entries.
pub fn entropy(distribution: &[f64]) -> f64 {
    let mut total = 0.0;
    for p in distribution {
        if *p > 0.0 {
            total -= p * p.ln();
        }
    }
    total
}

/// Weight-averaged entropy of each particle's distribution.
pub fn particle_entropy(particles: &[Particle]) -> f64 {
    particles
        .iter()
        .map(|particle| particle.weight * entropy(&particle.distribution))
        .sum()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BeliefMetrics {
    pub true_probability: f64,
    pub entropy: f64,
    /// Hypotheses holding non-zero mass.
    pub support: usize,
}

impl BeliefMetrics {
    pub fn from_model<B: BeliefModel + ?Sized>(model: &B, true_index: usize) -> Self {
        let marginal = model.marginal();
        Self {
            true_probability: model.concept_probability(true_index),
            entropy: entropy(&marginal),
            support: marginal.iter().filter(|p| **p > 0.0).count(),
        }
    }
}
