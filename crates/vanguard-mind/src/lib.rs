//! Feed-forward policy minds trained online while their agent lives.
//!
//! The network is deliberately tiny: one ReLU hidden layer between the ten
//! sensors and the five control outputs, updated with plain SGD every tick.
//! Dead souls export their weights as a [`PolicyGenome`]; the universe hands
//! copies of the best genome to newborns.

use rand::RngCore;
use serde::{Deserialize, Serialize};

use vanguard_core::{gaussian, MindRunner, PolicyGenome, MIND_INPUTS, MIND_OUTPUTS};

/// Hidden layer width.
pub const HIDDEN: usize = 8;

/// Weight initialization scale.
const INIT_SCALE: f32 = 0.1;

/// SGD learning rate for the online updates.
const LEARNING_RATE: f32 = 0.01;

/// Two-layer perceptron with a ReLU hidden layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NeuralMind {
    /// Hidden weights, row-major `[HIDDEN][MIND_INPUTS]`.
    w1: Vec<f32>,
    b1: Vec<f32>,
    /// Output weights, row-major `[MIND_OUTPUTS][HIDDEN]`.
    w2: Vec<f32>,
    b2: Vec<f32>,
}

impl NeuralMind {
    /// Construct a mind with small gaussian weights.
    #[must_use]
    pub fn random(rng: &mut dyn RngCore) -> Self {
        let mut draw = |count: usize| -> Vec<f32> {
            (0..count).map(|_| gaussian(rng) * INIT_SCALE).collect()
        };
        Self {
            w1: draw(HIDDEN * MIND_INPUTS),
            b1: draw(HIDDEN),
            w2: draw(MIND_OUTPUTS * HIDDEN),
            b2: draw(MIND_OUTPUTS),
        }
    }

    /// Boxed runner for [`vanguard_core::Universe::install_minds`].
    #[must_use]
    pub fn runner(rng: &mut dyn RngCore) -> Box<dyn MindRunner> {
        Box::new(Self::random(rng))
    }

    fn hidden(&self, inputs: &[f32; MIND_INPUTS]) -> [f32; HIDDEN] {
        let mut hidden = [0.0f32; HIDDEN];
        for (row, activation) in hidden.iter_mut().enumerate() {
            let weights = &self.w1[row * MIND_INPUTS..(row + 1) * MIND_INPUTS];
            let sum: f32 = weights
                .iter()
                .zip(inputs.iter())
                .map(|(w, x)| w * x)
                .sum();
            *activation = (sum + self.b1[row]).max(0.0);
        }
        hidden
    }

    fn output(&self, hidden: &[f32; HIDDEN]) -> [f32; MIND_OUTPUTS] {
        let mut outputs = [0.0f32; MIND_OUTPUTS];
        for (row, output) in outputs.iter_mut().enumerate() {
            let weights = &self.w2[row * HIDDEN..(row + 1) * HIDDEN];
            let sum: f32 = weights
                .iter()
                .zip(hidden.iter())
                .map(|(w, h)| w * h)
                .sum();
            *output = sum + self.b2[row];
        }
        outputs
    }
}

impl MindRunner for NeuralMind {
    fn kind(&self) -> &'static str {
        "mlp.relu8"
    }

    fn decide(&mut self, inputs: &[f32; MIND_INPUTS]) -> [f32; MIND_OUTPUTS] {
        let hidden = self.hidden(inputs);
        self.output(&hidden)
    }

    /// One SGD step on squared error against the labeled target.
    fn observe(&mut self, inputs: &[f32; MIND_INPUTS], target: &[f32; MIND_OUTPUTS]) {
        let hidden = self.hidden(inputs);
        let outputs = self.output(&hidden);

        let mut output_error = [0.0f32; MIND_OUTPUTS];
        for idx in 0..MIND_OUTPUTS {
            output_error[idx] = outputs[idx] - target[idx];
        }

        // Backpropagate through the linear head into the ReLU layer.
        let mut hidden_error = [0.0f32; HIDDEN];
        for (row, &err) in output_error.iter().enumerate() {
            for (col, grad) in hidden_error.iter_mut().enumerate() {
                *grad += err * self.w2[row * HIDDEN + col];
            }
        }
        for (col, grad) in hidden_error.iter_mut().enumerate() {
            if hidden[col] <= 0.0 {
                *grad = 0.0;
            }
        }

        for (row, &err) in output_error.iter().enumerate() {
            for (col, &activation) in hidden.iter().enumerate() {
                self.w2[row * HIDDEN + col] -= LEARNING_RATE * err * activation;
            }
            self.b2[row] -= LEARNING_RATE * err;
        }
        for (row, &grad) in hidden_error.iter().enumerate() {
            for (col, &input) in inputs.iter().enumerate() {
                self.w1[row * MIND_INPUTS + col] -= LEARNING_RATE * grad * input;
            }
            self.b1[row] -= LEARNING_RATE * grad;
        }
    }

    fn genome(&self) -> PolicyGenome {
        let mut weights =
            Vec::with_capacity(self.w1.len() + self.b1.len() + self.w2.len() + self.b2.len());
        weights.extend_from_slice(&self.w1);
        weights.extend_from_slice(&self.b1);
        weights.extend_from_slice(&self.w2);
        weights.extend_from_slice(&self.b2);
        PolicyGenome {
            layout: vec![MIND_INPUTS, HIDDEN, MIND_OUTPUTS],
            weights,
        }
    }

    /// Overwrite parameters from a genome. Genomes with a foreign layout or
    /// a short weight vector are ignored rather than half-applied.
    fn load(&mut self, genome: &PolicyGenome) {
        if genome.layout != [MIND_INPUTS, HIDDEN, MIND_OUTPUTS] {
            return;
        }
        let expected = self.w1.len() + self.b1.len() + self.w2.len() + self.b2.len();
        if genome.weights.len() != expected {
            return;
        }
        let mut cursor = 0;
        for destination in [&mut self.w1, &mut self.b1, &mut self.w2, &mut self.b2] {
            let len = destination.len();
            destination.copy_from_slice(&genome.weights[cursor..cursor + len]);
            cursor += len;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;
    use vanguard_core::{Universe, UniverseConfig};

    fn seeded_mind(seed: u64) -> NeuralMind {
        let mut rng = SmallRng::seed_from_u64(seed);
        NeuralMind::random(&mut rng)
    }

    #[test]
    fn random_mind_has_small_finite_weights() {
        let mind = seeded_mind(0xDEAD_BEEF);
        assert_eq!(mind.w1.len(), HIDDEN * MIND_INPUTS);
        assert_eq!(mind.w2.len(), MIND_OUTPUTS * HIDDEN);
        assert!(mind.w1.iter().chain(&mind.w2).all(|w| w.is_finite()));
        assert!(mind.w1.iter().all(|w| w.abs() < 1.0));
    }

    #[test]
    fn decide_is_deterministic_for_fixed_weights() {
        let mut mind = seeded_mind(123);
        let inputs = [0.5; MIND_INPUTS];
        let first = mind.decide(&inputs);
        let second = mind.decide(&inputs);
        assert_eq!(first, second);
        assert!(first.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn training_reduces_squared_error() {
        let mut mind = seeded_mind(456);
        let inputs = [0.3; MIND_INPUTS];
        let target = [0.0, 0.0, 0.0, 1.0, 0.0];

        let error = |outputs: [f32; MIND_OUTPUTS]| -> f32 {
            outputs
                .iter()
                .zip(target.iter())
                .map(|(o, t)| (o - t) * (o - t))
                .sum()
        };

        // Even if the ReLU layer stays silent, the output biases alone
        // contract the error by (1 - lr) per step, so 1000 steps land
        // well below the bound.
        let before = error(mind.decide(&inputs));
        for _ in 0..1_000 {
            mind.observe(&inputs, &target);
        }
        let after = error(mind.decide(&inputs));
        assert!(
            after < before,
            "error should shrink under repeated SGD: {before} -> {after}"
        );
        assert!(after < 1e-2, "error should converge, got {after}");
    }

    #[test]
    fn genome_round_trips_through_load() {
        let donor = seeded_mind(789);
        let mut recipient = seeded_mind(987);
        assert_ne!(donor, recipient);

        let genome = donor.genome();
        assert_eq!(genome.layout, vec![MIND_INPUTS, HIDDEN, MIND_OUTPUTS]);
        recipient.load(&genome);
        assert_eq!(donor, recipient);

        // A foreign layout leaves the mind untouched.
        let alien = PolicyGenome {
            layout: vec![4, 4, 4],
            weights: vec![0.0; 36],
        };
        recipient.load(&alien);
        assert_eq!(donor, recipient);
    }

    #[test]
    fn genome_serializes_for_archival() {
        let mind = seeded_mind(31337);
        let genome = mind.genome();
        let encoded = serde_json::to_string(&genome).expect("serialize genome");
        let decoded: PolicyGenome = serde_json::from_str(&encoded).expect("deserialize genome");
        assert_eq!(decoded, genome);
    }

    #[test]
    fn universe_with_neural_minds_is_deterministic() {
        let run = |seed: u64| {
            let config = UniverseConfig {
                population: 10,
                rng_seed: Some(seed),
                report_interval: 0,
                ..UniverseConfig::default()
            };
            let mut universe = Universe::new(config).expect("valid config");
            universe.install_minds(NeuralMind::runner);
            for _ in 0..250 {
                universe.step();
            }
            universe.agents().positions().to_vec()
        };

        assert_eq!(run(11), run(11));
        assert_ne!(run(11), run(12));
    }
}
