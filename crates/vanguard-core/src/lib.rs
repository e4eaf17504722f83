//! Core types shared across the Vanguard workspace.
//!
//! A `Universe` owns a fixed population of agents riding a Lorenz chaotic
//! flow, advances them one tick at a time through a staged pipeline, and
//! archives the trails of the dead into an `EternalMemory` that rendering
//! layers consume as read-only snapshots.

use ordered_float::OrderedFloat;
use rand::{Rng, RngCore, SeedableRng, rngs::SmallRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use thiserror::Error;

/// Number of sensor inputs wired into each agent mind.
pub const MIND_INPUTS: usize = 10;
/// Number of control outputs produced by each agent mind.
pub const MIND_OUTPUTS: usize = 5;

fn clamp01(value: f32) -> f32 {
    value.clamp(0.0, 1.0)
}

fn clamp_signed(value: f32) -> f32 {
    value.clamp(-1.0, 1.0)
}

/// Standard-normal sample via Box-Muller; avoids pulling in a distribution crate.
pub fn gaussian(rng: &mut dyn RngCore) -> f32 {
    const TWO_PI: f32 = std::f32::consts::TAU;
    let u1 = rng.random::<f32>().clamp(f32::MIN_POSITIVE, 1.0);
    let u2 = rng.random::<f32>();
    (-2.0 * u1.ln()).sqrt() * (TWO_PI * u2).cos()
}

/// High level simulation clock (ticks processed since boot).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct Tick(pub u64);

impl Tick {
    /// Returns the next sequential tick.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// Resets the tick counter back to zero.
    #[must_use]
    pub const fn zero() -> Self {
        Self(0)
    }
}

/// 3D point in the shared phase space.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    /// Construct a new vector.
    #[must_use]
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// All-zero vector.
    #[must_use]
    pub const fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    /// Squared Euclidean norm.
    #[must_use]
    pub fn norm_squared(self) -> f32 {
        self.x * self.x + self.y * self.y + self.z * self.z
    }

    /// Euclidean norm.
    #[must_use]
    pub fn norm(self) -> f32 {
        self.norm_squared().sqrt()
    }

    /// Distance to `other`.
    #[must_use]
    pub fn distance(self, other: Self) -> f32 {
        (other - self).norm()
    }
}

impl std::ops::Add for Vec3 {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl std::ops::AddAssign for Vec3 {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl std::ops::Sub for Vec3 {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl std::ops::Mul<f32> for Vec3 {
    type Output = Self;

    fn mul(self, rhs: f32) -> Self {
        Self::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

/// Behavioral category of an agent; determines its interaction rules.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum Role {
    #[default]
    Soul,
    Parasite,
    Judge,
}

impl Role {
    /// Stable lowercase identifier for logs and snapshots.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Soul => "soul",
            Self::Parasite => "parasite",
            Self::Judge => "judge",
        }
    }

    /// Whether souls perceive this role as a threat.
    #[must_use]
    pub const fn is_threat(self) -> bool {
        matches!(self, Self::Parasite | Self::Judge)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Constants of the intrinsic chaotic flow carried by each agent.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct LorenzParams {
    pub sigma: f32,
    pub rho: f32,
    pub beta: f32,
}

impl Default for LorenzParams {
    fn default() -> Self {
        Self {
            sigma: 10.0,
            rho: 28.0,
            beta: 2.666,
        }
    }
}

impl LorenzParams {
    /// Evaluate the Lorenz vector field at `p`.
    #[must_use]
    pub fn flow(self, p: Vec3) -> Vec3 {
        Vec3::new(
            self.sigma * (p.y - p.x),
            p.x * (self.rho - p.z) - p.y,
            p.x * p.y - self.beta * p.z,
        )
    }

    /// Copy of `self` with gaussian jitter applied to every constant.
    #[must_use]
    pub fn jittered(self, rng: &mut dyn RngCore, sigma: f32) -> Self {
        Self {
            sigma: self.sigma + gaussian(rng) * sigma,
            rho: self.rho + gaussian(rng) * sigma,
            beta: self.beta + gaussian(rng) * sigma,
        }
    }
}

/// Closed interval used for per-role birth energy draws.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct EnergyRange {
    pub min: f32,
    pub max: f32,
}

impl EnergyRange {
    /// Construct a new range.
    #[must_use]
    pub const fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    /// Draw a birth energy; degenerate ranges return `min`.
    pub fn sample(self, rng: &mut dyn RngCore) -> f32 {
        if self.max > self.min {
            rng.random_range(self.min..self.max)
        } else {
            self.min
        }
    }
}

/// Steering entry of the interaction table: `actor` reacts to `other`
/// within `radius`, attracted for positive `weight`, repelled for negative.
/// Exclusive rules act only on the nearest qualifying neighbor; the rest
/// accumulate over every neighbor in range.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct SteeringRule {
    pub actor: Role,
    pub other: Role,
    pub radius: f32,
    pub weight: f32,
    pub exclusive: bool,
}

/// Contact entry of the interaction table: when `actor` closes within
/// `radius` of `other`, both sides receive the listed energy/mood deltas
/// and the actor's color shifts by `actor_color`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ContactRule {
    pub actor: Role,
    pub other: Role,
    pub radius: f32,
    pub actor_energy: f32,
    pub other_energy: f32,
    pub actor_mood: f32,
    pub other_mood: f32,
    pub actor_color: [f32; 3],
}

/// Data-driven role-pair interaction rules.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InteractionTable {
    pub steering: Vec<SteeringRule>,
    pub contacts: Vec<ContactRule>,
}

impl Default for InteractionTable {
    fn default() -> Self {
        use Role::{Judge, Parasite, Soul};
        let steer = |actor, other, radius, weight, exclusive| SteeringRule {
            actor,
            other,
            radius,
            weight,
            exclusive,
        };
        Self {
            steering: vec![
                // Souls seek the nearest kindred soul and flee predators and law.
                steer(Soul, Soul, 7.0, 1.5, true),
                steer(Soul, Parasite, 10.0, -2.5, false),
                steer(Soul, Judge, 10.0, -2.5, false),
                // Parasites hunt the nearest soul and dread judges.
                steer(Parasite, Soul, 15.0, 1.2, true),
                steer(Parasite, Judge, 10.0, -3.0, false),
                // Judges scatter everything that crowds them.
                steer(Judge, Soul, 6.0, -5.0, false),
                steer(Judge, Parasite, 6.0, -5.0, false),
                steer(Judge, Judge, 6.0, -5.0, false),
            ],
            contacts: vec![
                // Vampirism: the parasite feeds, the soul withers and despairs.
                ContactRule {
                    actor: Parasite,
                    other: Soul,
                    radius: 2.0,
                    actor_energy: 0.1,
                    other_energy: -0.2,
                    actor_mood: 0.1,
                    other_mood: -0.2,
                    actor_color: [0.05, 0.0, 0.0],
                },
                // Judgement: standing too close to a judge is punished.
                ContactRule {
                    actor: Judge,
                    other: Soul,
                    radius: 6.0,
                    actor_energy: 0.0,
                    other_energy: -0.05,
                    actor_mood: 0.0,
                    other_mood: 0.0,
                    actor_color: [0.0; 3],
                },
                ContactRule {
                    actor: Judge,
                    other: Parasite,
                    radius: 6.0,
                    actor_energy: 0.0,
                    other_energy: -0.05,
                    actor_mood: 0.0,
                    other_mood: 0.0,
                    actor_color: [0.0; 3],
                },
            ],
        }
    }
}

/// Errors that can occur when constructing a universe.
#[derive(Debug, Error)]
pub enum UniverseError {
    /// Indicates an invalid configuration value.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
}

/// Static configuration for a Vanguard universe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UniverseConfig {
    /// Fixed number of recycled agent slots.
    pub population: usize,
    /// Integration timestep for the chaotic flow and steering forces.
    pub dt: f32,
    /// Probability mass assigned to judges at birth.
    pub judge_weight: f32,
    /// Probability mass assigned to parasites at birth; souls take the rest.
    pub parasite_weight: f32,
    /// Birth energy drawn per role.
    pub soul_energy: EnergyRange,
    pub parasite_energy: EnergyRange,
    pub judge_energy: EnergyRange,
    /// Baseline per-tick energy drain per role.
    pub soul_drain: f32,
    pub parasite_drain: f32,
    pub judge_drain: f32,
    /// Mood modulation of the drain: `drain * (1.1 - mood * relief)`.
    pub mood_drain_relief: f32,
    /// Half-extent of the uniform respawn cube.
    pub spawn_extent: f32,
    /// Distance from the origin beyond which an agent is lost to the void.
    pub escape_radius: f32,
    /// Bounded trail length retained per agent.
    pub trail_capacity: usize,
    /// Lower clamp on pairwise distances; coincident agents never blow up.
    pub min_separation: f32,
    /// Radius for the mood/fear neighbor census.
    pub perception_radius: f32,
    /// Vision range for nearest-soul / nearest-threat sensing.
    pub sense_horizon: f32,
    /// Sensor value reported when nothing is in sight.
    pub sense_default_distance: f32,
    /// Threat distance below which the training signal flags danger.
    pub alarm_radius: f32,
    /// Distance at which two souls couple.
    pub coupling_radius: f32,
    /// Per-tick color blend toward a coupled partner.
    pub coupling_color_blend: f32,
    /// Per-tick mood bonus while coupled.
    pub coupling_mood_bonus: f32,
    /// Mood gained per nearby soul and lost per nearby threat.
    pub mood_souls_gain: f32,
    pub mood_threats_drop: f32,
    /// Fear gained per nearby threat and relieved per nearby soul.
    pub fear_threats_gain: f32,
    pub fear_souls_relief: f32,
    /// Coupling of the global mood/fear broadcast into each agent.
    pub broadcast_gain: f32,
    /// Multiplicative fear decay applied every tick.
    pub fear_decay: f32,
    /// Gaussian mood noise sigma.
    pub mood_noise: f32,
    /// Gaussian steering noise sigma (per axis).
    pub force_noise: f32,
    /// Scale applied to the mind's free force bias.
    pub mind_force_gain: f32,
    /// A soul breaks into a parasite below both of these thresholds.
    pub conversion_mood: f32,
    pub conversion_energy: f32,
    /// Color assigned to a freshly broken soul.
    pub conversion_color: [f32; 3],
    /// Bounded archive of remembered trails.
    pub canvas_capacity: usize,
    /// Trails at or below this length leave no visual trace.
    pub min_trail_len: usize,
    /// Bounded archive of attractor-parameter lineage records.
    pub lineage_capacity: usize,
    /// Probability that a newborn inherits the latest lineage record.
    pub lineage_probability: f32,
    /// Gaussian jitter applied to inherited attractor parameters.
    pub lineage_jitter: f32,
    /// Probability that a newborn soul loads the elite policy.
    pub elite_reuse_probability: f32,
    /// Fitness above which a life is counted as legendary.
    pub legend_threshold: f32,
    /// Ticks between journal reports; 0 disables reporting.
    pub report_interval: u32,
    /// Maximum number of recent tick summaries retained in-memory.
    pub history_capacity: usize,
    /// Optional RNG seed for reproducible universes.
    pub rng_seed: Option<u64>,
    /// Role-pair interaction rules.
    pub interactions: InteractionTable,
}

impl Default for UniverseConfig {
    fn default() -> Self {
        Self {
            population: 16,
            dt: 0.006,
            judge_weight: 0.05,
            parasite_weight: 0.20,
            soul_energy: EnergyRange::new(3.0, 6.0),
            parasite_energy: EnergyRange::new(4.0, 4.0),
            judge_energy: EnergyRange::new(10.0, 10.0),
            soul_drain: 0.006,
            parasite_drain: 0.008,
            judge_drain: 0.002,
            mood_drain_relief: 0.2,
            spawn_extent: 15.0,
            escape_radius: 120.0,
            trail_capacity: 40,
            min_separation: 1e-3,
            perception_radius: 12.0,
            sense_horizon: 40.0,
            sense_default_distance: 100.0,
            alarm_radius: 10.0,
            coupling_radius: 5.0,
            coupling_color_blend: 0.01,
            coupling_mood_bonus: 0.02,
            mood_souls_gain: 0.01,
            mood_threats_drop: 0.02,
            fear_threats_gain: 0.05,
            fear_souls_relief: 0.01,
            broadcast_gain: 0.05,
            fear_decay: 0.95,
            mood_noise: 0.02,
            force_noise: 0.03,
            mind_force_gain: 0.4,
            conversion_mood: -0.8,
            conversion_energy: 1.0,
            conversion_color: [0.3, 0.0, 0.0],
            canvas_capacity: 200,
            min_trail_len: 10,
            lineage_capacity: 8,
            lineage_probability: 0.0,
            lineage_jitter: 0.05,
            elite_reuse_probability: 0.7,
            legend_threshold: 100.0,
            report_interval: 1_000,
            history_capacity: 256,
            rng_seed: None,
            interactions: InteractionTable::default(),
        }
    }
}

impl UniverseConfig {
    /// Validates the configuration.
    fn validate(&self) -> Result<(), UniverseError> {
        if self.population == 0 {
            return Err(UniverseError::InvalidConfig("population must be non-zero"));
        }
        if !(self.dt > 0.0 && self.dt.is_finite()) {
            return Err(UniverseError::InvalidConfig("dt must be positive"));
        }
        if self.judge_weight < 0.0
            || self.parasite_weight < 0.0
            || self.judge_weight + self.parasite_weight > 1.0
        {
            return Err(UniverseError::InvalidConfig(
                "role weights must be non-negative and sum to at most 1",
            ));
        }
        for range in [self.soul_energy, self.parasite_energy, self.judge_energy] {
            if range.min < 0.0 || range.max < range.min {
                return Err(UniverseError::InvalidConfig(
                    "energy ranges must be non-negative with min <= max",
                ));
            }
        }
        if self.soul_drain < 0.0 || self.parasite_drain < 0.0 || self.judge_drain < 0.0 {
            return Err(UniverseError::InvalidConfig(
                "energy drains must be non-negative",
            ));
        }
        if self.spawn_extent <= 0.0 || self.escape_radius <= self.spawn_extent {
            return Err(UniverseError::InvalidConfig(
                "spawn extent must be positive and inside the escape radius",
            ));
        }
        if self.trail_capacity == 0 {
            return Err(UniverseError::InvalidConfig(
                "trail_capacity must be non-zero",
            ));
        }
        if self.min_separation <= 0.0 {
            return Err(UniverseError::InvalidConfig(
                "min_separation must be positive",
            ));
        }
        if self.perception_radius <= 0.0 || self.sense_horizon <= 0.0 {
            return Err(UniverseError::InvalidConfig(
                "perception and sense radii must be positive",
            ));
        }
        if !(0.0..=1.0).contains(&self.fear_decay) {
            return Err(UniverseError::InvalidConfig(
                "fear_decay must lie in [0, 1]",
            ));
        }
        for probability in [self.lineage_probability, self.elite_reuse_probability] {
            if !(0.0..=1.0).contains(&probability) {
                return Err(UniverseError::InvalidConfig(
                    "probabilities must lie in [0, 1]",
                ));
            }
        }
        if self.mood_noise < 0.0 || self.force_noise < 0.0 {
            return Err(UniverseError::InvalidConfig(
                "noise sigmas must be non-negative",
            ));
        }
        if self.canvas_capacity == 0 {
            return Err(UniverseError::InvalidConfig(
                "canvas_capacity must be non-zero",
            ));
        }
        if self.history_capacity == 0 {
            return Err(UniverseError::InvalidConfig(
                "history_capacity must be non-zero",
            ));
        }
        for rule in &self.interactions.steering {
            if rule.radius <= 0.0 {
                return Err(UniverseError::InvalidConfig(
                    "steering radii must be positive",
                ));
            }
        }
        for rule in &self.interactions.contacts {
            if rule.radius <= 0.0 {
                return Err(UniverseError::InvalidConfig(
                    "contact radii must be positive",
                ));
            }
        }
        Ok(())
    }

    /// Returns the configured RNG. The determinism guarantee holds only
    /// when `rng_seed` is set; an unseeded universe draws a fresh entropy
    /// seed and is irreproducible by design.
    fn seeded_rng(&self) -> SmallRng {
        match self.rng_seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => {
                let seed: u64 = rand::random();
                SmallRng::seed_from_u64(seed)
            }
        }
    }

    fn drain_for(&self, role: Role) -> f32 {
        match role {
            Role::Soul => self.soul_drain,
            Role::Parasite => self.parasite_drain,
            Role::Judge => self.judge_drain,
        }
    }

    fn energy_for(&self, role: Role) -> EnergyRange {
        match role {
            Role::Soul => self.soul_energy,
            Role::Parasite => self.parasite_energy,
            Role::Judge => self.judge_energy,
        }
    }
}

/// Bounded ring of recent positions; oldest points drop first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trail {
    points: VecDeque<Vec3>,
    capacity: usize,
}

impl Trail {
    /// Create an empty trail with the given capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            points: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a point, evicting the oldest when full.
    pub fn push(&mut self, point: Vec3) {
        if self.points.len() == self.capacity {
            self.points.pop_front();
        }
        self.points.push_back(point);
    }

    /// Number of retained points.
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Returns true when no points are retained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Drop all points while keeping capacity.
    pub fn clear(&mut self) {
        self.points.clear();
    }

    /// Iterate oldest-to-newest.
    pub fn iter(&self) -> impl Iterator<Item = &Vec3> {
        self.points.iter()
    }

    /// Copy the retained points oldest-to-newest.
    #[must_use]
    pub fn to_vec(&self) -> Vec<Vec3> {
        self.points.iter().copied().collect()
    }
}

/// Collection of per-agent columns for hot-path iteration.
#[derive(Debug)]
pub struct AgentColumns {
    positions: Vec<Vec3>,
    roles: Vec<Role>,
    colors: Vec<[f32; 3]>,
    energies: Vec<f32>,
    moods: Vec<f32>,
    fears: Vec<f32>,
    attractors: Vec<LorenzParams>,
    coupled: Vec<bool>,
    rebirths: Vec<u32>,
}

impl AgentColumns {
    fn new(population: usize) -> Self {
        Self {
            positions: vec![Vec3::zero(); population],
            roles: vec![Role::Soul; population],
            colors: vec![[0.0; 3]; population],
            energies: vec![0.0; population],
            moods: vec![0.0; population],
            fears: vec![0.0; population],
            attractors: vec![LorenzParams::default(); population],
            coupled: vec![false; population],
            rebirths: vec![0; population],
        }
    }

    /// Number of agent slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Returns true for an empty population (never after construction).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Immutable access to positions.
    #[must_use]
    pub fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    /// Mutable access to positions.
    #[must_use]
    pub fn positions_mut(&mut self) -> &mut [Vec3] {
        &mut self.positions
    }

    /// Immutable access to roles.
    #[must_use]
    pub fn roles(&self) -> &[Role] {
        &self.roles
    }

    /// Mutable access to roles.
    #[must_use]
    pub fn roles_mut(&mut self) -> &mut [Role] {
        &mut self.roles
    }

    /// Immutable access to color triples.
    #[must_use]
    pub fn colors(&self) -> &[[f32; 3]] {
        &self.colors
    }

    /// Mutable access to color triples.
    #[must_use]
    pub fn colors_mut(&mut self) -> &mut [[f32; 3]] {
        &mut self.colors
    }

    /// Immutable access to energies.
    #[must_use]
    pub fn energies(&self) -> &[f32] {
        &self.energies
    }

    /// Mutable access to energies.
    #[must_use]
    pub fn energies_mut(&mut self) -> &mut [f32] {
        &mut self.energies
    }

    /// Immutable access to moods.
    #[must_use]
    pub fn moods(&self) -> &[f32] {
        &self.moods
    }

    /// Mutable access to moods.
    #[must_use]
    pub fn moods_mut(&mut self) -> &mut [f32] {
        &mut self.moods
    }

    /// Immutable access to fear levels.
    #[must_use]
    pub fn fears(&self) -> &[f32] {
        &self.fears
    }

    /// Immutable access to attractor parameters.
    #[must_use]
    pub fn attractors(&self) -> &[LorenzParams] {
        &self.attractors
    }

    /// Immutable access to coupling flags.
    #[must_use]
    pub fn coupled(&self) -> &[bool] {
        &self.coupled
    }

    /// Immutable access to per-slot rebirth counters.
    #[must_use]
    pub fn rebirths(&self) -> &[u32] {
        &self.rebirths
    }
}

/// Flattened policy parameters retained by `EternalMemory` and copied
/// (never aliased) into newborn minds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PolicyGenome {
    /// Layer widths, input first.
    pub layout: Vec<usize>,
    /// Row-major weights and biases, layer by layer.
    pub weights: Vec<f32>,
}

/// Thin trait object used to drive mind evaluations without coupling the
/// core to concrete mind crates.
pub trait MindRunner: Send {
    /// Static identifier of the mind implementation.
    fn kind(&self) -> &'static str;

    /// Evaluate control outputs for the provided sensors.
    fn decide(&mut self, inputs: &[f32; MIND_INPUTS]) -> [f32; MIND_OUTPUTS];

    /// Online learning step toward a hand-labeled target.
    fn observe(&mut self, inputs: &[f32; MIND_INPUTS], target: &[f32; MIND_OUTPUTS]);

    /// Export the current parameters.
    fn genome(&self) -> PolicyGenome;

    /// Overwrite parameters from an exported genome.
    fn load(&mut self, genome: &PolicyGenome);
}

/// Archived trail of a dead agent, retained purely for display.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrailRecord {
    pub points: Vec<Vec3>,
    pub color: [f32; 3],
    pub alpha: f32,
    pub width: f32,
}

/// Best learned policy so far, with the fitness that earned it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ElitePolicy {
    pub genome: PolicyGenome,
    pub score: f32,
}

/// Attractor parameters and color remembered from a finished life.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct LineageRecord {
    pub params: LorenzParams,
    pub color: [f32; 3],
}

/// The universe's memory of the dead: bounded trail archive, parameter
/// lineage, and the elite policy. Mutated only by agent deaths.
#[derive(Debug, Serialize, Deserialize)]
pub struct EternalMemory {
    canvas: VecDeque<TrailRecord>,
    canvas_capacity: usize,
    min_trail_len: usize,
    lineage: VecDeque<LineageRecord>,
    lineage_capacity: usize,
    legend_threshold: f32,
    best: Option<ElitePolicy>,
    total_deaths: u64,
    legendary_lives: u64,
}

impl EternalMemory {
    fn new(config: &UniverseConfig) -> Self {
        Self {
            canvas: VecDeque::with_capacity(config.canvas_capacity),
            canvas_capacity: config.canvas_capacity,
            min_trail_len: config.min_trail_len,
            lineage: VecDeque::with_capacity(config.lineage_capacity),
            lineage_capacity: config.lineage_capacity,
            legend_threshold: config.legend_threshold,
            best: None,
            total_deaths: 0,
            legendary_lives: 0,
        }
    }

    /// Archive a finished life. Trails at or below the minimum length leave
    /// no visual trace; souls carrying a genome compete for the elite slot.
    pub fn save(
        &mut self,
        trail: &[Vec3],
        color: [f32; 3],
        role: Role,
        mood: f32,
        attractor: LorenzParams,
        genome: Option<PolicyGenome>,
    ) {
        self.total_deaths += 1;

        if self.lineage_capacity > 0 {
            if self.lineage.len() == self.lineage_capacity {
                self.lineage.pop_front();
            }
            self.lineage.push_back(LineageRecord {
                params: attractor,
                color,
            });
        }

        if trail.len() <= self.min_trail_len {
            return;
        }

        // Visual intensity follows the mood the agent died with.
        let brightness = (0.5 + mood * 0.5).clamp(0.1, 1.0);
        let (alpha, width, color) = match role {
            Role::Soul => (0.3 * brightness, 1.2, color),
            Role::Parasite => (0.1 * brightness, 0.6, color),
            Role::Judge => (0.4, 1.5, [1.0, 1.0, 1.0]),
        };
        if self.canvas.len() == self.canvas_capacity {
            self.canvas.pop_front();
        }
        self.canvas.push_back(TrailRecord {
            points: trail.to_vec(),
            color,
            alpha,
            width,
        });

        if role == Role::Soul {
            if let Some(genome) = genome {
                let score = trail.len() as f32 * (1.0 + mood);
                if score > self.legend_threshold {
                    self.legendary_lives += 1;
                }
                let improved = self.best.as_ref().is_none_or(|elite| score > elite.score);
                if improved {
                    self.best = Some(ElitePolicy { genome, score });
                }
            }
        }
    }

    /// Read-only view of the archived trails, oldest first.
    pub fn canvas(&self) -> impl Iterator<Item = &TrailRecord> {
        self.canvas.iter()
    }

    /// Number of archived trails.
    #[must_use]
    pub fn canvas_len(&self) -> usize {
        self.canvas.len()
    }

    /// Most recent lineage record, if any.
    #[must_use]
    pub fn latest_lineage(&self) -> Option<LineageRecord> {
        self.lineage.back().copied()
    }

    /// The elite policy, if one has been earned.
    #[must_use]
    pub fn best(&self) -> Option<&ElitePolicy> {
        self.best.as_ref()
    }

    /// Total number of deaths recorded, traced or not.
    #[must_use]
    pub const fn total_deaths(&self) -> u64 {
        self.total_deaths
    }

    /// Lives whose fitness cleared the legend threshold.
    #[must_use]
    pub const fn legendary_lives(&self) -> u64 {
        self.legendary_lives
    }
}

/// Summary emitted to observer sinks on each report tick.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TickSummary {
    pub tick: Tick,
    pub souls: usize,
    pub parasites: usize,
    pub judges: usize,
    pub mean_mood: f32,
    pub mean_fear: f32,
    pub mean_energy: f32,
    /// Rebirths since the previous report.
    pub rebirths: usize,
    /// Soul-to-parasite conversions since the previous report.
    pub conversions: usize,
    pub total_deaths: u64,
    pub legendary_lives: u64,
    pub top_score: Option<f32>,
}

/// Observer sink invoked on report ticks.
pub trait UniverseObserver: Send {
    fn on_report(&mut self, summary: &TickSummary);
}

/// No-op observer sink.
#[derive(Debug, Default)]
pub struct NullObserver;

impl UniverseObserver for NullObserver {
    fn on_report(&mut self, _summary: &TickSummary) {}
}

/// Events emitted after processing a tick.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct TickEvents {
    pub tick: Tick,
    pub reported: bool,
}

/// Read-only view of one live agent for rendering layers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentSnapshot {
    pub index: usize,
    pub role: Role,
    pub color: [f32; 3],
    pub coupled: bool,
    pub mood: f32,
    pub fear: f32,
    pub energy: f32,
    pub position: Vec3,
    pub trail: Vec<Vec3>,
}

/// Immutable frame handed to rendering layers: live agents plus the canvas.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FrameSnapshot {
    pub tick: Tick,
    pub agents: Vec<AgentSnapshot>,
    pub canvas: Vec<TrailRecord>,
}

/// Per-agent neighborhood census computed from pre-tick state.
#[derive(Debug, Clone, Copy)]
struct SenseReport {
    soul_dist: f32,
    threat_dist: f32,
    souls_nearby: u32,
    threats_nearby: u32,
}

/// Per-agent output of the force scan; applied during commit.
#[derive(Debug, Clone)]
struct StepOutcome {
    force: Vec3,
    color: [f32; 3],
    coupled: Option<usize>,
    energy_gain: f32,
    mood_gain: f32,
    contributions: Vec<Contribution>,
}

/// One-sided write onto another agent, deferred to the commit stage so
/// every read in the scan observes pre-tick values.
#[derive(Debug, Clone, Copy)]
struct Contribution {
    target: usize,
    energy: f32,
    mood: f32,
}

/// Aggregate world state shared by the simulation and rendering layers.
pub struct Universe {
    config: UniverseConfig,
    tick: Tick,
    rng: SmallRng,
    agents: AgentColumns,
    trails: Vec<Trail>,
    minds: Vec<Option<Box<dyn MindRunner>>>,
    memory: EternalMemory,
    observer: Box<dyn UniverseObserver>,
    history: VecDeque<TickSummary>,
    rebirths_since_report: usize,
    conversions_since_report: usize,
}

impl fmt::Debug for Universe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Universe")
            .field("tick", &self.tick)
            .field("population", &self.agents.len())
            .field("canvas_len", &self.memory.canvas_len())
            .finish()
    }
}

impl Universe {
    /// Instantiate a new universe using the supplied configuration.
    pub fn new(config: UniverseConfig) -> Result<Self, UniverseError> {
        Self::with_observer(config, Box::new(NullObserver))
    }

    /// Instantiate a new universe with an observer sink attached.
    pub fn with_observer(
        config: UniverseConfig,
        observer: Box<dyn UniverseObserver>,
    ) -> Result<Self, UniverseError> {
        config.validate()?;
        let rng = config.seeded_rng();
        let population = config.population;
        let memory = EternalMemory::new(&config);
        let trails = (0..population)
            .map(|_| Trail::new(config.trail_capacity))
            .collect();
        let mut universe = Self {
            agents: AgentColumns::new(population),
            trails,
            minds: (0..population).map(|_| None).collect(),
            memory,
            observer,
            history: VecDeque::with_capacity(config.history_capacity),
            rebirths_since_report: 0,
            conversions_since_report: 0,
            tick: Tick::zero(),
            rng,
            config,
        };
        for index in 0..population {
            universe.reset_agent(index);
        }
        // The initial spawn is not a rebirth.
        universe.agents.rebirths.fill(0);
        Ok(universe)
    }

    /// Bind a freshly spawned mind to every agent slot.
    pub fn install_minds<F>(&mut self, spawner: F)
    where
        F: Fn(&mut dyn RngCore) -> Box<dyn MindRunner>,
    {
        for slot in &mut self.minds {
            *slot = Some(spawner(&mut self.rng));
        }
    }

    /// Returns an immutable reference to configuration.
    #[must_use]
    pub fn config(&self) -> &UniverseConfig {
        &self.config
    }

    /// Current simulation tick.
    #[must_use]
    pub const fn tick(&self) -> Tick {
        self.tick
    }

    /// Read-only access to the agent columns.
    #[must_use]
    pub fn agents(&self) -> &AgentColumns {
        &self.agents
    }

    /// Mutable access to the agent columns (scenario setup, tooling).
    #[must_use]
    pub fn agents_mut(&mut self) -> &mut AgentColumns {
        &mut self.agents
    }

    /// Per-agent bounded trails, aligned with the columns.
    #[must_use]
    pub fn trails(&self) -> &[Trail] {
        &self.trails
    }

    /// Read-only access to the eternal memory.
    #[must_use]
    pub fn memory(&self) -> &EternalMemory {
        &self.memory
    }

    /// Whether a mind is bound to the given slot.
    #[must_use]
    pub fn mind_bound(&self, index: usize) -> bool {
        self.minds.get(index).is_some_and(Option::is_some)
    }

    /// Replace the observer sink.
    pub fn set_observer(&mut self, observer: Box<dyn UniverseObserver>) {
        self.observer = observer;
    }

    /// Iterate over retained tick summaries, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &TickSummary> {
        self.history.iter()
    }

    /// Borrow the universe RNG mutably for deterministic sampling.
    #[must_use]
    pub fn rng(&mut self) -> &mut SmallRng {
        &mut self.rng
    }

    /// Produce a read-only frame for rendering layers.
    #[must_use]
    pub fn frame(&self) -> FrameSnapshot {
        let agents = (0..self.agents.len())
            .map(|index| AgentSnapshot {
                index,
                role: self.agents.roles[index],
                color: self.agents.colors[index],
                coupled: self.agents.coupled[index],
                mood: self.agents.moods[index],
                fear: self.agents.fears[index],
                energy: self.agents.energies[index],
                position: self.agents.positions[index],
                trail: self.trails[index].to_vec(),
            })
            .collect();
        FrameSnapshot {
            tick: self.tick,
            agents,
            canvas: self.memory.canvas.iter().cloned().collect(),
        }
    }

    /// Execute one simulation tick pipeline returning emitted events.
    pub fn step(&mut self) -> TickEvents {
        let next_tick = self.tick.next();

        // Aggregates are taken before any mutation so every agent hears the
        // same broadcast regardless of iteration order.
        let (global_mood, global_fear) = self.stage_aggregates();
        let (force_noise, mood_noise) = self.stage_noise();
        let (senses, inputs) = self.stage_sense(global_mood, global_fear);
        let decisions = self.stage_minds(&inputs);
        let outcomes = self.stage_forces(&decisions, &force_noise);
        self.stage_commit(&outcomes, &senses, global_mood, global_fear, &mood_noise);
        self.stage_training(&inputs, &senses);
        self.stage_lifecycle();
        let reported = self.stage_report(next_tick);

        self.tick = next_tick;
        TickEvents {
            tick: next_tick,
            reported,
        }
    }

    fn stage_aggregates(&self) -> (f32, f32) {
        let count = self.agents.len() as f32;
        let mood: f32 = self.agents.moods.iter().sum();
        let fear: f32 = self.agents.fears.iter().sum();
        (mood / count, fear / count)
    }

    /// Noise is drawn serially in slot order; the parallel stages stay
    /// free of RNG so seeded runs are bit-identical.
    fn stage_noise(&mut self) -> (Vec<Vec3>, Vec<f32>) {
        let force_sigma = self.config.force_noise;
        let mood_sigma = self.config.mood_noise;
        let population = self.agents.len();
        let mut forces = Vec::with_capacity(population);
        let mut moods = Vec::with_capacity(population);
        for _ in 0..population {
            forces.push(
                Vec3::new(
                    gaussian(&mut self.rng),
                    gaussian(&mut self.rng),
                    gaussian(&mut self.rng),
                ) * force_sigma,
            );
            moods.push(gaussian(&mut self.rng) * mood_sigma);
        }
        (forces, moods)
    }

    fn stage_sense(
        &self,
        global_mood: f32,
        global_fear: f32,
    ) -> (Vec<SenseReport>, Vec<[f32; MIND_INPUTS]>) {
        let positions = &self.agents.positions;
        let roles = &self.agents.roles;
        let moods = &self.agents.moods;
        let fears = &self.agents.fears;
        let energies = &self.agents.energies;
        let config = &self.config;

        let reports: Vec<SenseReport> = (0..positions.len())
            .into_par_iter()
            .map(|idx| {
                let pos = positions[idx];
                let mut report = SenseReport {
                    soul_dist: config.sense_default_distance,
                    threat_dist: config.sense_default_distance,
                    souls_nearby: 0,
                    threats_nearby: 0,
                };
                for (other, (&other_pos, &other_role)) in
                    positions.iter().zip(roles.iter()).enumerate()
                {
                    if other == idx {
                        continue;
                    }
                    let dist = pos.distance(other_pos).max(config.min_separation);
                    if dist < config.perception_radius {
                        if other_role == Role::Soul {
                            report.souls_nearby += 1;
                        } else {
                            report.threats_nearby += 1;
                        }
                    }
                    if dist < config.sense_horizon {
                        if other_role == Role::Soul {
                            if OrderedFloat(dist) < OrderedFloat(report.soul_dist) {
                                report.soul_dist = dist;
                            }
                        } else if OrderedFloat(dist) < OrderedFloat(report.threat_dist) {
                            report.threat_dist = dist;
                        }
                    }
                }
                report
            })
            .collect();

        let inputs: Vec<[f32; MIND_INPUTS]> = reports
            .par_iter()
            .enumerate()
            .map(|(idx, report)| {
                let pos = positions[idx];
                [
                    pos.x,
                    pos.y,
                    pos.z,
                    moods[idx],
                    fears[idx],
                    energies[idx],
                    report.threat_dist,
                    report.soul_dist,
                    global_mood,
                    global_fear,
                ]
            })
            .collect();

        (reports, inputs)
    }

    fn stage_minds(&mut self, inputs: &[[f32; MIND_INPUTS]]) -> Vec<Option<[f32; MIND_OUTPUTS]>> {
        self.minds
            .par_iter_mut()
            .zip(inputs.par_iter())
            .map(|(mind, input)| mind.as_mut().map(|mind| mind.decide(input)))
            .collect()
    }

    /// Steering weight for a rule, overridden by the mind's learned gains
    /// when the actor is a soul with a bound mind.
    fn effective_weight(
        rule: &SteeringRule,
        decision: Option<&[f32; MIND_OUTPUTS]>,
    ) -> f32 {
        match decision {
            Some(outputs) if rule.actor == Role::Soul => {
                if rule.exclusive && rule.other == Role::Soul {
                    outputs[3]
                } else if rule.weight < 0.0 {
                    -outputs[4]
                } else {
                    rule.weight
                }
            }
            _ => rule.weight,
        }
    }

    fn stage_forces(
        &self,
        decisions: &[Option<[f32; MIND_OUTPUTS]>],
        force_noise: &[Vec3],
    ) -> Vec<StepOutcome> {
        let positions = &self.agents.positions;
        let roles = &self.agents.roles;
        let colors = &self.agents.colors;
        let config = &self.config;
        let table = &self.config.interactions;

        (0..positions.len())
            .into_par_iter()
            .map(|idx| {
                let pos = positions[idx];
                let role = roles[idx];
                let decision = decisions[idx].as_ref();
                let mut outcome = StepOutcome {
                    force: force_noise[idx],
                    color: colors[idx],
                    coupled: None,
                    energy_gain: 0.0,
                    mood_gain: 0.0,
                    contributions: Vec::new(),
                };

                if let Some(outputs) = decision {
                    outcome.force += Vec3::new(outputs[0], outputs[1], outputs[2])
                        * config.mind_force_gain;
                }

                for rule in table.steering.iter().filter(|rule| rule.actor == role) {
                    let weight = Self::effective_weight(rule, decision);
                    if rule.exclusive {
                        let mut nearest: Option<(usize, f32)> = None;
                        for (other, (&other_pos, &other_role)) in
                            positions.iter().zip(roles.iter()).enumerate()
                        {
                            if other == idx || other_role != rule.other {
                                continue;
                            }
                            let dist = pos.distance(other_pos).max(config.min_separation);
                            if dist < rule.radius
                                && nearest.is_none_or(|(_, best)| {
                                    OrderedFloat(dist) < OrderedFloat(best)
                                })
                            {
                                nearest = Some((other, dist));
                            }
                        }
                        if let Some((other, dist)) = nearest {
                            outcome.force += (positions[other] - pos) * weight;
                            if role == Role::Soul
                                && rule.other == Role::Soul
                                && dist < config.coupling_radius
                            {
                                outcome.coupled = Some(other);
                                let blend = config.coupling_color_blend;
                                for (channel, partner) in
                                    outcome.color.iter_mut().zip(colors[other])
                                {
                                    *channel = *channel * (1.0 - blend) + partner * blend;
                                }
                            }
                        }
                    } else {
                        for (other, (&other_pos, &other_role)) in
                            positions.iter().zip(roles.iter()).enumerate()
                        {
                            if other == idx || other_role != rule.other {
                                continue;
                            }
                            let dist = pos.distance(other_pos).max(config.min_separation);
                            if dist < rule.radius {
                                outcome.force += (other_pos - pos) * weight;
                            }
                        }
                    }
                }

                for contact in table.contacts.iter().filter(|contact| contact.actor == role) {
                    for (other, (&other_pos, &other_role)) in
                        positions.iter().zip(roles.iter()).enumerate()
                    {
                        if other == idx || other_role != contact.other {
                            continue;
                        }
                        let dist = pos.distance(other_pos).max(config.min_separation);
                        if dist >= contact.radius {
                            continue;
                        }
                        outcome.energy_gain += contact.actor_energy;
                        outcome.mood_gain += contact.actor_mood;
                        for (channel, shift) in
                            outcome.color.iter_mut().zip(contact.actor_color)
                        {
                            *channel = clamp01(*channel + shift);
                        }
                        if contact.other_energy != 0.0 || contact.other_mood != 0.0 {
                            outcome.contributions.push(Contribution {
                                target: other,
                                energy: contact.other_energy,
                                mood: contact.other_mood,
                            });
                        }
                    }
                }

                outcome
            })
            .collect()
    }

    fn stage_commit(
        &mut self,
        outcomes: &[StepOutcome],
        senses: &[SenseReport],
        global_mood: f32,
        global_fear: f32,
        mood_noise: &[f32],
    ) {
        let population = self.agents.len();
        let mut energy_delta = vec![0.0f32; population];
        let mut mood_delta = vec![0.0f32; population];
        for outcome in outcomes {
            for contribution in &outcome.contributions {
                energy_delta[contribution.target] += contribution.energy;
                mood_delta[contribution.target] += contribution.mood;
            }
        }

        let config = &self.config;
        for idx in 0..population {
            let outcome = &outcomes[idx];
            let sense = &senses[idx];

            let flow = self.agents.attractors[idx].flow(self.agents.positions[idx]);
            let next = self.agents.positions[idx] + (flow + outcome.force) * config.dt;
            self.agents.positions[idx] = next;
            self.trails[idx].push(next);

            self.agents.colors[idx] = outcome.color;
            self.agents.coupled[idx] = outcome.coupled.is_some();

            let coupling_bonus = if outcome.coupled.is_some() {
                config.coupling_mood_bonus
            } else {
                0.0
            };
            let mood = clamp_signed(
                self.agents.moods[idx]
                    + sense.souls_nearby as f32 * config.mood_souls_gain
                    - sense.threats_nearby as f32 * config.mood_threats_drop
                    + global_mood * config.broadcast_gain
                    + mood_noise[idx]
                    + coupling_bonus
                    + outcome.mood_gain
                    + mood_delta[idx],
            );
            self.agents.moods[idx] = mood;

            let fear = clamp01(
                self.agents.fears[idx]
                    + sense.threats_nearby as f32 * config.fear_threats_gain
                    - sense.souls_nearby as f32 * config.fear_souls_relief
                    + global_fear * config.broadcast_gain,
            );
            self.agents.fears[idx] = fear * config.fear_decay;

            let drain = config.drain_for(self.agents.roles[idx])
                * (1.1 - mood * config.mood_drain_relief);
            self.agents.energies[idx] = (self.agents.energies[idx]
                + outcome.energy_gain
                + energy_delta[idx]
                - drain)
                .max(0.0);
        }
    }

    fn stage_training(&mut self, inputs: &[[f32; MIND_INPUTS]], senses: &[SenseReport]) {
        let alarm_radius = self.config.alarm_radius;
        let coupled = &self.agents.coupled;
        self.minds
            .par_iter_mut()
            .enumerate()
            .for_each(|(idx, mind)| {
                if let Some(mind) = mind.as_mut() {
                    let mut target = [0.0f32; MIND_OUTPUTS];
                    if coupled[idx] {
                        target[3] = 1.0;
                    }
                    if senses[idx].threat_dist < alarm_radius {
                        target[4] = 1.0;
                    }
                    mind.observe(&inputs[idx], &target);
                }
            });
    }

    fn stage_lifecycle(&mut self) {
        for idx in 0..self.agents.len() {
            // A soul broken by sustained despair turns parasite.
            if self.agents.roles[idx] == Role::Soul
                && self.agents.moods[idx] < self.config.conversion_mood
                && self.agents.energies[idx] < self.config.conversion_energy
            {
                self.agents.roles[idx] = Role::Parasite;
                self.agents.colors[idx] = self.config.conversion_color;
                self.agents.coupled[idx] = false;
                self.conversions_since_report += 1;
            }

            let escaped =
                self.agents.positions[idx].norm() > self.config.escape_radius;
            if self.agents.energies[idx] <= 0.0 || escaped {
                let role = self.agents.roles[idx];
                let genome = if role == Role::Soul {
                    self.minds[idx].as_ref().map(|mind| mind.genome())
                } else {
                    None
                };
                let trail = self.trails[idx].to_vec();
                self.memory.save(
                    &trail,
                    self.agents.colors[idx],
                    role,
                    self.agents.moods[idx],
                    self.agents.attractors[idx],
                    genome,
                );
                self.reset_agent(idx);
                self.rebirths_since_report += 1;
            }
        }
    }

    /// In-place rebirth: independent role draw from the cumulative buckets,
    /// role-dependent color and energy, fresh spirit, cleared trail.
    fn reset_agent(&mut self, idx: usize) {
        let roll: f32 = self.rng.random();
        let role = if roll < self.config.judge_weight {
            Role::Judge
        } else if roll < self.config.judge_weight + self.config.parasite_weight {
            Role::Parasite
        } else {
            Role::Soul
        };

        let color = match role {
            Role::Judge => [1.0, 1.0, 1.0],
            Role::Parasite => [0.2, 0.0, 0.0],
            Role::Soul => [
                self.rng.random_range(0.4..0.9),
                self.rng.random_range(0.4..0.9),
                self.rng.random_range(0.4..0.9),
            ],
        };
        let energy = self.config.energy_for(role).sample(&mut self.rng);

        let extent = self.config.spawn_extent;
        let position = Vec3::new(
            self.rng.random_range(-extent..extent),
            self.rng.random_range(-extent..extent),
            self.rng.random_range(-extent..extent),
        );

        let mut attractor = LorenzParams::default();
        let mut color = color;
        if self.config.lineage_probability > 0.0 {
            if let Some(record) = self.memory.latest_lineage() {
                if self.rng.random::<f32>() < self.config.lineage_probability {
                    attractor = record
                        .params
                        .jittered(&mut self.rng, self.config.lineage_jitter);
                    color = record.color;
                }
            }
        }

        self.agents.roles[idx] = role;
        self.agents.colors[idx] = color;
        self.agents.energies[idx] = energy;
        self.agents.moods[idx] = self.rng.random_range(-0.1..0.1);
        self.agents.fears[idx] = 0.0;
        self.agents.positions[idx] = position;
        self.agents.attractors[idx] = attractor;
        self.agents.coupled[idx] = false;
        self.agents.rebirths[idx] = self.agents.rebirths[idx].saturating_add(1);
        self.trails[idx].clear();

        // Newborn souls may take up the best policy the universe remembers.
        // The genome is copied, never shared.
        if role == Role::Soul {
            let elite = self
                .memory
                .best()
                .map(|elite| elite.genome.clone());
            if let Some(genome) = elite {
                if self.rng.random::<f32>() < self.config.elite_reuse_probability {
                    if let Some(mind) = self.minds[idx].as_mut() {
                        mind.load(&genome);
                    }
                }
            }
        }
    }

    fn stage_report(&mut self, next_tick: Tick) -> bool {
        let interval = self.config.report_interval;
        if interval == 0 || !next_tick.0.is_multiple_of(interval as u64) {
            return false;
        }

        let population = self.agents.len();
        let mut souls = 0;
        let mut parasites = 0;
        let mut judges = 0;
        for role in &self.agents.roles {
            match role {
                Role::Soul => souls += 1,
                Role::Parasite => parasites += 1,
                Role::Judge => judges += 1,
            }
        }
        let mean = |values: &[f32]| values.iter().sum::<f32>() / population as f32;

        let summary = TickSummary {
            tick: next_tick,
            souls,
            parasites,
            judges,
            mean_mood: mean(&self.agents.moods),
            mean_fear: mean(&self.agents.fears),
            mean_energy: mean(&self.agents.energies),
            rebirths: self.rebirths_since_report,
            conversions: self.conversions_since_report,
            total_deaths: self.memory.total_deaths(),
            legendary_lives: self.memory.legendary_lives(),
            top_score: self.memory.best().map(|elite| elite.score),
        };
        self.observer.on_report(&summary);
        if self.history.len() >= self.config.history_capacity {
            self.history.pop_front();
        }
        self.history.push_back(summary);
        self.rebirths_since_report = 0;
        self.conversions_since_report = 0;
        true
    }
}
