//! End-to-end universe runs exercising the public API only.

use vanguard_core::{
    FrameSnapshot, MindRunner, PolicyGenome, Role, Tick, Universe, UniverseConfig,
    MIND_INPUTS, MIND_OUTPUTS,
};

/// Minimal deterministic mind: a fixed linear readout of three sensors.
/// Good enough to exercise the decide/observe/genome plumbing.
struct LinearMind {
    weights: [f32; 3],
}

impl LinearMind {
    fn new() -> Self {
        Self {
            weights: [0.01, -0.02, 0.005],
        }
    }
}

impl MindRunner for LinearMind {
    fn kind(&self) -> &'static str {
        "linear.test"
    }

    fn decide(&mut self, inputs: &[f32; MIND_INPUTS]) -> [f32; MIND_OUTPUTS] {
        let bias = inputs[3] * self.weights[0]
            + inputs[4] * self.weights[1]
            + inputs[5] * self.weights[2];
        [bias, -bias, bias * 0.5, 1.0, 0.5]
    }

    fn observe(&mut self, _inputs: &[f32; MIND_INPUTS], target: &[f32; MIND_OUTPUTS]) {
        // Nudge toward the danger label so training is observable.
        self.weights[1] += (target[4] - 0.5) * 1e-4;
    }

    fn genome(&self) -> PolicyGenome {
        PolicyGenome {
            layout: vec![3],
            weights: self.weights.to_vec(),
        }
    }

    fn load(&mut self, genome: &PolicyGenome) {
        for (slot, value) in self.weights.iter_mut().zip(&genome.weights) {
            *slot = *value;
        }
    }
}

fn seeded_config(seed: u64) -> UniverseConfig {
    UniverseConfig {
        population: 12,
        rng_seed: Some(seed),
        report_interval: 50,
        ..UniverseConfig::default()
    }
}

fn run_universe(seed: u64, ticks: u64, with_minds: bool) -> (Vec<f32>, FrameSnapshot) {
    let mut universe = Universe::new(seeded_config(seed)).expect("valid config");
    if with_minds {
        universe.install_minds(|_| Box::new(LinearMind::new()));
    }
    for _ in 0..ticks {
        universe.step();
    }
    let energies = universe.agents().energies().to_vec();
    let frame = universe.frame();
    (energies, frame)
}

#[test]
fn seeded_runs_replay_exactly_without_minds() {
    let (energies_a, frame_a) = run_universe(42, 400, false);
    let (energies_b, frame_b) = run_universe(42, 400, false);
    assert_eq!(energies_a, energies_b);
    assert_eq!(frame_a, frame_b);
    assert_eq!(frame_a.tick, Tick(400));
}

#[test]
fn seeded_runs_replay_exactly_with_minds() {
    let (energies_a, frame_a) = run_universe(7, 300, true);
    let (energies_b, frame_b) = run_universe(7, 300, true);
    assert_eq!(energies_a, energies_b);
    assert_eq!(frame_a, frame_b);
}

#[test]
fn long_runs_keep_the_population_and_bounds_intact() {
    let mut universe = Universe::new(seeded_config(1234)).expect("valid config");
    universe.install_minds(|_| Box::new(LinearMind::new()));

    for _ in 0..2_000 {
        universe.step();
    }

    let config = universe.config().clone();
    let agents = universe.agents();
    assert_eq!(agents.len(), config.population);
    for idx in 0..agents.len() {
        let energy = agents.energies()[idx];
        assert!(energy >= 0.0, "energy went negative for agent {idx}");
        assert!(
            agents.positions()[idx].norm() <= config.escape_radius,
            "agent {idx} survived outside the escape radius"
        );
        assert!((-1.0..=1.0).contains(&agents.moods()[idx]));
        assert!((0.0..=1.0).contains(&agents.fears()[idx]));
    }
    assert!(universe.memory().canvas_len() <= config.canvas_capacity);
    for trail in universe.trails() {
        assert!(trail.len() <= config.trail_capacity);
    }
}

#[test]
fn reports_populate_the_bounded_history() {
    let mut universe = Universe::new(seeded_config(9)).expect("valid config");
    for _ in 0..500 {
        universe.step();
    }
    let history: Vec<_> = universe.history().collect();
    assert_eq!(history.len(), 10, "expected a report every 50 ticks");
    assert_eq!(history[0].tick, Tick(50));
    for summary in &history {
        assert_eq!(
            summary.souls + summary.parasites + summary.judges,
            universe.config().population
        );
    }
}

#[test]
fn dying_souls_seed_the_elite_and_newborns_can_reuse_it() {
    let config = UniverseConfig {
        population: 8,
        rng_seed: Some(5150),
        // Deaths come quickly with a harsh drain, trails stay archivable.
        soul_drain: 0.05,
        parasite_drain: 0.05,
        judge_drain: 0.05,
        min_trail_len: 5,
        legend_threshold: 5.0,
        report_interval: 0,
        ..UniverseConfig::default()
    };
    let mut universe = Universe::new(config).expect("valid config");
    universe.install_minds(|_| Box::new(LinearMind::new()));

    for _ in 0..5_000 {
        universe.step();
    }

    assert!(universe.memory().total_deaths() > 0);
    let elite = universe
        .memory()
        .best()
        .expect("a dying soul should have seeded the elite policy");
    assert!(elite.score > 0.0);
    assert!(universe.agents().roles().contains(&Role::Soul));
}
