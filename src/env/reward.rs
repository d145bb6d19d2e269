use super::config::{ArenaConfig, Point2};
use super::sensors::SensorSnapshot;

/// Why an episode ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// LIDAR saw an obstacle inside the crash distance.
    Proximity,
    /// The bumper registered a contact.
    Contact,
    /// The step budget ran out.
    PowerDrained,
    /// The rover reached the checkpoint.
    Checkpoint,
    /// The rover left the map.
    OutOfBounds,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpisodeStatus {
    Running,
    Terminal(Termination),
}

/// What produced a step's reward.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RewardEvent {
    /// The reset call, nothing is evaluated.
    Reset,
    Terminated(Termination),
    /// One-time bonus for the waypoint at this index.
    Waypoint(usize),
    Shaping { multiplier: f32 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RewardOutcome {
    pub reward: f32,
    pub done: bool,
    pub event: RewardEvent,
}

impl RewardOutcome {
    /// The neutral result handed out for step 0.
    pub fn neutral() -> Self {
        Self {
            reward: 0.0,
            done: false,
            event: RewardEvent::Reset,
        }
    }

    fn terminated(reason: Termination, reward: f32) -> Self {
        Self {
            reward,
            done: true,
            event: RewardEvent::Terminated(reason),
        }
    }
}

/// Per-episode bookkeeping owned by the env. Rebuilt on every reset.
#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeState {
    pub steps: usize,
    /// Steps left before the episode is forced to end.
    pub power_supply_range: usize,
    /// One flag per arena waypoint, only ever set.
    pub reached_waypoints: Vec<bool>,
    pub reward_in_episode: f32,
    /// Position at the end of the previous step.
    pub last_position: Point2,
    /// Closest LIDAR distance of the current step.
    pub collision_threshold: f64,
    pub status: EpisodeStatus,
}

impl EpisodeState {
    pub fn new(arena: &ArenaConfig) -> Self {
        Self {
            steps: 0,
            power_supply_range: arena.max_steps,
            reached_waypoints: vec![false; arena.waypoints.len()],
            reward_in_episode: 0.0,
            last_position: arena.initial_position(),
            collision_threshold: f64::MAX,
            status: EpisodeStatus::Running,
        }
    }

    pub fn is_running(&self) -> bool {
        self.status == EpisodeStatus::Running
    }
}

/// Multiplier for how close the rover is to the checkpoint.
///
/// The initial distance is split into `bands` equal bands; the closest
/// band is worth `bands`, the next `bands - 1` and so on, and anything
/// beyond the last inner marker is worth 1. A distance exactly on a
/// marker belongs to the closer band.
pub fn proximity_multiplier(distance: f64, initial_distance: f64, bands: usize) -> f32 {
    let width = initial_distance / bands as f64;

    (1..bands)
        .find(|&k| distance <= width * k as f64)
        .map(|k| (bands + 1 - k) as f32)
        .unwrap_or(1.0)
}

/// Extra multiplier for keeping clear of obstacles.
pub fn safety_bonus(collision_threshold: f64) -> f32 {
    if collision_threshold >= 2.0 {
        1.0
    } else if collision_threshold >= 1.5 {
        0.5
    } else if collision_threshold >= 1.0 {
        0.25
    } else {
        0.0
    }
}

fn termination(arena: &ArenaConfig, episode: &EpisodeState, sensors: &SensorSnapshot) -> Option<RewardOutcome> {
    if episode.collision_threshold <= arena.crash_distance {
        return Some(RewardOutcome::terminated(Termination::Proximity, 0.0));
    }

    if sensors.collision {
        return Some(RewardOutcome::terminated(Termination::Contact, 0.0));
    }

    if episode.power_supply_range < 1 {
        return Some(RewardOutcome::terminated(Termination::PowerDrained, 0.0));
    }

    let last = episode.last_position;
    if last.x >= arena.checkpoint.x && last.y >= arena.checkpoint.y {
        // fewer steps, bigger reward
        let reward = arena.base_reward * arena.finished_reward_multiplier / episode.steps as f32;
        return Some(RewardOutcome::terminated(Termination::Checkpoint, reward));
    }

    if !arena.bounds.contains(&sensors.position, arena.boundary_margin) {
        return Some(RewardOutcome::terminated(Termination::OutOfBounds, 0.0));
    }

    None
}

/// Reward and termination for the step that just completed.
///
/// Must only be called once at least one step has been taken; the
/// reset call gets [`RewardOutcome::neutral`] instead. Marks reached
/// waypoints and moves the episode to its terminal status as a side
/// effect, nothing else.
pub fn evaluate(arena: &ArenaConfig, episode: &mut EpisodeState, sensors: &SensorSnapshot) -> RewardOutcome {
    debug_assert!(episode.steps > 0, "the reset step is never evaluated");

    if let Some(outcome) = termination(arena, episode, sensors) {
        if let RewardEvent::Terminated(reason) = outcome.event {
            episode.status = EpisodeStatus::Terminal(reason);
        }
        return outcome;
    }

    let steps = episode.steps as f32;
    let last = episode.last_position;
    for (idx, waypoint) in arena.waypoints.iter().enumerate() {
        if waypoint.reached(&last) && !episode.reached_waypoints[idx] {
            episode.reached_waypoints[idx] = true;
            return RewardOutcome {
                reward: waypoint.reward / steps,
                done: false,
                event: RewardEvent::Waypoint(idx),
            };
        }
    }

    let mut multiplier = proximity_multiplier(
        sensors.distance_to_checkpoint,
        arena.initial_distance_to_checkpoint(),
        arena.proximity_bands,
    );
    multiplier += safety_bonus(episode.collision_threshold);

    if !sensors.closer_to_checkpoint && multiplier > 0.0 {
        multiplier /= 2.0;
    }

    RewardOutcome {
        reward: arena.base_reward * multiplier,
        done: false,
        event: RewardEvent::Shaping { multiplier },
    }
}
