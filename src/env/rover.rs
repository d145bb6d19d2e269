use std::sync::Arc;

use ndarray::Array3;
use tracing::{debug, info, warn};

use crate::common::{
    errors::{EnvError, EnvResult},
    logger::{LogData, LogItem, Logger, TracingLogger},
    spaces::{ImageSpace, RoverActionSpace, Space},
};

use super::{
    action::{decode, Action, DriveCommand},
    base::{Env, EnvObservation, ResetOptions, RewardRange},
    camera::{to_observation, Observation},
    config::RoverEnvConfig,
    reward::{evaluate, EpisodeState, RewardEvent, RewardOutcome},
    sensors::{SensorChannel, SensorHub},
    simulator::{JointConfiguration, ModelState, Simulator},
};

/// A Mars rover driving towards a checkpoint, observed through its camera.
///
/// Every step sends one drive command to the simulator, waits for the
/// pose and LIDAR update it causes, grabs the newest camera frame and
/// scores the result. The episode ends on a crash, a bumper contact,
/// an empty power supply, leaving the map or reaching the checkpoint.
pub struct RoverEnv<S: Simulator> {
    config: RoverEnvConfig,
    simulator: S,
    hub: Arc<SensorHub>,
    episode: EpisodeState,
    observation: Observation,
    needs_reset: bool,
    metrics: Box<dyn Logger>,
}

impl<S: Simulator> RoverEnv<S> {
    pub fn new(config: RoverEnvConfig, simulator: S, hub: Arc<SensorHub>) -> EnvResult<Self> {
        config.validate()?;

        Ok(Self {
            episode: EpisodeState::new(&config.arena),
            observation: Array3::zeros((config.image_height, config.image_width, 3)),
            config,
            simulator,
            hub,
            needs_reset: true,
            metrics: Box::new(TracingLogger::default()),
        })
    }

    /// Replaces the sink episode metrics go to when `emit_metrics` is set.
    pub fn with_metrics(mut self, logger: Box<dyn Logger>) -> Self {
        self.metrics = logger;
        self
    }

    pub fn config(&self) -> &RoverEnvConfig {
        &self.config
    }

    pub fn episode(&self) -> &EpisodeState {
        &self.episode
    }

    pub fn hub(&self) -> &Arc<SensorHub> {
        &self.hub
    }

    pub fn simulator(&self) -> &S {
        &self.simulator
    }

    pub fn simulator_mut(&mut self) -> &mut S {
        &mut self.simulator
    }

    fn emit_episode_metrics(&mut self) {
        if !self.config.emit_metrics || self.episode.steps == 0 {
            return;
        }

        let item = LogItem::default()
            .push(
                "Episode_Reward".to_string(),
                LogData::Float(self.episode.reward_in_episode),
            )
            .push(
                "Episode_Steps".to_string(),
                LogData::Int(self.episode.steps as i32),
            )
            .push(
                "DistanceToCheckpoint".to_string(),
                LogData::Float(self.hub.snapshot().distance_to_checkpoint as f32),
            );

        if let Err(e) = self.metrics.log(item) {
            warn!(error = %e, "could not record episode metrics");
        }
    }

    // swaps in the newest camera frame, keeping the old one if it can't be decoded
    fn refresh_observation(&mut self) -> EnvResult<()> {
        let timeout = self.config.sensor_timeout();
        let frame = self
            .hub
            .frames()
            .take(timeout)
            .ok_or(EnvError::FrameTimeout { waited: timeout })?;

        match to_observation(&frame, self.config.image_width, self.config.image_height) {
            Ok(obs) => self.observation = obs,
            Err(e) => warn!(error = %e, "keeping previous observation"),
        }

        Ok(())
    }

    fn advance(&mut self, command: DriveCommand) -> EnvResult<RewardOutcome> {
        let timeout = self.config.sensor_timeout();
        let pose_seq = self.hub.sequence(SensorChannel::Pose);
        let scan_seq = self.hub.sequence(SensorChannel::Scan);

        self.simulator.send_action(command)?;

        self.hub.wait_for(SensorChannel::Pose, pose_seq, timeout)?;
        self.hub.wait_for(SensorChannel::Scan, scan_seq, timeout)?;

        self.score(command)
    }

    // the post-action half of a step, shared with reset
    fn score(&mut self, command: DriveCommand) -> EnvResult<RewardOutcome> {
        let timeout = self.config.sensor_timeout();
        let samples = self.config.arena.lidar_samples;
        let max_distance = self.config.arena.lidar_max_distance;

        self.episode.collision_threshold = self.hub.wait_for_scan(samples, max_distance, timeout)?;
        self.refresh_observation()?;

        let arena = &self.config.arena;
        self.episode.power_supply_range = arena.max_steps.saturating_sub(self.episode.steps);

        let sensors = self.hub.snapshot();
        let outcome = if self.episode.steps > 0 {
            evaluate(arena, &mut self.episode, &sensors)
        } else {
            RewardOutcome::neutral()
        };
        self.episode.reward_in_episode += outcome.reward;

        debug!(
            step = self.episode.steps,
            steering = command.steering,
            throttle = command.throttle,
            reward = outcome.reward,
            distance_to_checkpoint = sensors.distance_to_checkpoint,
            distance_travelled = sensors.distance_travelled,
            collision_threshold = self.episode.collision_threshold,
            closer_to_checkpoint = sensors.closer_to_checkpoint,
            power_supply_range = self.episode.power_supply_range,
            imu = sensors.imu_average,
            x = sensors.position.x,
            y = sensors.position.y,
        );

        match outcome.event {
            RewardEvent::Terminated(reason) => info!(
                ?reason,
                steps = self.episode.steps,
                reward = outcome.reward,
                "episode terminated"
            ),
            RewardEvent::Waypoint(idx) => info!(
                waypoint = %arena.waypoints[idx].name,
                reward = outcome.reward,
                "waypoint reached"
            ),
            _ => {}
        }

        self.episode.last_position = sensors.position;

        Ok(outcome)
    }
}

impl<S: Simulator> Env<Observation, Action> for RoverEnv<S> {
    fn step(&mut self, action: &Action) -> EnvResult<EnvObservation<Observation>> {
        if self.needs_reset || !self.episode.is_running() {
            return Err(EnvError::NeedsReset);
        }

        let command = decode(self.config.action_mode, action)?;
        self.episode.steps += 1;

        // a step that fails halfway leaves the episode in an unknown state
        let outcome = self.advance(command).inspect_err(|_| self.needs_reset = true)?;
        self.needs_reset = outcome.done;

        Ok(EnvObservation {
            obs: self.observation.clone(),
            reward: outcome.reward,
            terminated: outcome.done,
            truncated: false,
            info: Default::default(),
        })
    }

    fn reset(&mut self, _seed: Option<[u8; 32]>, _options: Option<ResetOptions>) -> EnvResult<Observation> {
        if self.episode.steps > 0 {
            info!(
                reward = self.episode.reward_in_episode,
                steps = self.episode.steps,
                "total episodic reward"
            );
        }
        self.emit_episode_metrics();

        // cleared only once the whole reset went through
        self.needs_reset = true;
        self.episode = EpisodeState::new(&self.config.arena);

        self.simulator.send_action(DriveCommand::stop())?;

        let timeout = self.config.sensor_timeout();
        let arena = &self.config.arena;
        self.hub.reset(arena.checkpoint, arena.initial_position());
        self.hub.frames().drain();

        let pose_seq = self.hub.sequence(SensorChannel::Pose);
        self.simulator.reset_model(
            &ModelState::at_rest(arena.initial_pose),
            &JointConfiguration::zeroed(),
        )?;
        self.hub.wait_for(SensorChannel::Pose, pose_seq, timeout)?;
        self.hub.restart_odometry();

        self.score(DriveCommand::stop())?;
        self.needs_reset = false;

        Ok(self.observation.clone())
    }

    fn action_space(&self) -> Box<dyn Space<Action>> {
        Box::new(RoverActionSpace::from(self.config.action_mode))
    }

    fn observation_space(&self) -> Box<dyn Space<Observation>> {
        Box::new(ImageSpace::new(
            self.config.image_height,
            self.config.image_width,
            3,
        ))
    }

    fn reward_range(&self) -> RewardRange {
        let arena = &self.config.arena;
        let finished = arena.base_reward * arena.finished_reward_multiplier;
        let shaping = arena.base_reward * (arena.proximity_bands as f32 + 1.0);

        RewardRange {
            low: 0.0,
            high: arena
                .waypoints
                .iter()
                .map(|w| w.reward)
                .fold(finished.max(shaping), f32::max),
        }
    }

    fn render(&self) {}

    fn renderable(&self) -> bool {
        false
    }

    fn close(&mut self) {
        if let Err(e) = self.simulator.send_action(DriveCommand::stop()) {
            warn!(error = %e, "could not stop the rover on close");
        }
    }

    fn unwrapped(&self) -> &dyn Env<Observation, Action> {
        self
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use crate::common::errors::EnvError;
    use crate::env::{
        action::{Action, ActionMode},
        base::Env,
        config::{ArenaConfig, RoverEnvConfig},
        reward::{EpisodeStatus, Termination},
        sensors::SensorHub,
        simulator::KinematicSimulator,
    };

    use super::RoverEnv;

    fn mars_env() -> RoverEnv<KinematicSimulator> {
        let hub = Arc::new(SensorHub::new());
        let sim = KinematicSimulator::new(hub.clone());
        RoverEnv::new(RoverEnvConfig::new(ArenaConfig::mars()), sim, hub).unwrap()
    }

    #[test]
    fn test_step_before_reset() {
        let mut env = mars_env();

        assert!(matches!(
            env.step(&Action::Discrete(2)),
            Err(EnvError::NeedsReset)
        ));
    }

    #[test]
    fn test_reset_observation() {
        let mut env = mars_env();
        let obs = env.reset(None, None).unwrap();

        assert_eq!(obs.dim(), (120, 160, 3));
        assert!(env.observation_space().contains(&obs));
        assert_eq!(env.episode().steps, 0);
        assert_eq!(env.episode().reward_in_episode, 0.0);
        assert_eq!(env.episode().status, EpisodeStatus::Running);
    }

    #[test]
    fn test_invalid_action_is_rejected() {
        let mut env = mars_env();
        env.reset(None, None).unwrap();

        assert!(matches!(
            env.step(&Action::Discrete(3)),
            Err(EnvError::InvalidAction(3))
        ));
        // nothing was counted
        assert_eq!(env.episode().steps, 0);
    }

    #[test]
    fn test_continuous_mode_rejects_discrete() {
        let hub = Arc::new(SensorHub::new());
        let sim = KinematicSimulator::new(hub.clone());
        let config = RoverEnvConfig::new(ArenaConfig::mars()).with_action_mode(ActionMode::Continuous);
        let mut env = RoverEnv::new(config, sim, hub).unwrap();
        env.reset(None, None).unwrap();

        assert!(env.step(&Action::Discrete(0)).is_err());
        let res = env
            .step(&Action::Continuous {
                steering: 0.0,
                throttle: 1.0,
            })
            .unwrap();
        assert!(!res.terminated);
    }

    #[test]
    fn test_straight_steps_collect_waypoints_then_shaping() {
        let mut env = mars_env();
        env.reset(None, None).unwrap();

        // the start already satisfies the second and third waypoint
        let first = env.step(&Action::Discrete(2)).unwrap();
        assert!(!first.done());
        assert!(first.info.is_empty());
        assert_eq!(first.reward, 2000.0);
        assert_eq!(env.episode().reached_waypoints, vec![false, true, false]);
        assert_eq!(env.episode().power_supply_range, 1999);

        let second = env.step(&Action::Discrete(2)).unwrap();
        assert_eq!(second.reward, 1500.0);

        let third = env.step(&Action::Discrete(2)).unwrap();
        assert!(third.reward > 0.0 && third.reward < 20.0);
        assert_eq!(env.episode().steps, 3);
        assert_eq!(
            env.episode().reward_in_episode,
            first.reward + second.reward + third.reward
        );
    }

    #[test]
    fn test_power_runs_out() {
        let hub = Arc::new(SensorHub::new());
        let sim = KinematicSimulator::new(hub.clone());
        let mut arena = ArenaConfig::mars();
        arena.max_steps = 3;
        let mut env = RoverEnv::new(RoverEnvConfig::new(arena), sim, hub).unwrap();
        env.reset(None, None).unwrap();

        let mut last = None;
        for _ in 0..3 {
            last = Some(env.step(&Action::Discrete(2)).unwrap());
        }

        let last = last.unwrap();
        assert!(last.terminated);
        assert_eq!(last.reward, 0.0);
        assert_eq!(
            env.episode().status,
            EpisodeStatus::Terminal(Termination::PowerDrained)
        );
        assert!(matches!(
            env.step(&Action::Discrete(2)),
            Err(EnvError::NeedsReset)
        ));

        // a reset starts over
        env.reset(None, None).unwrap();
        assert!(env.step(&Action::Discrete(2)).is_ok());
    }

    #[test]
    fn test_reward_range() {
        let env = mars_env();
        let range = env.reward_range();

        assert_eq!(range.low, 0.0);
        assert_eq!(range.high, 20000.0);
    }
}
