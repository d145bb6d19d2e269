use std::sync::Arc;

use assert_approx_eq::assert_approx_eq;
use parking_lot::Mutex;

use rover_gym::common::{
    errors::{EnvError, EnvResult},
    logger::{LogData, LogItem, Logger},
};
use rover_gym::env::{
    action::{Action, DriveCommand},
    base::Env,
    camera::{Encoding, RawImage},
    config::{ArenaConfig, Point2, RoverEnvConfig},
    reward::{EpisodeStatus, Termination},
    rover::RoverEnv,
    sensors::{SensorChannel, SensorHub},
    simulator::{JointConfiguration, KinematicSimulator, ModelState, Obstacle, Simulator},
};

const STRAIGHT: Action = Action::Discrete(2);

fn mars_with(arena: ArenaConfig, obstacles: Vec<Obstacle>) -> RoverEnv<KinematicSimulator> {
    let hub = Arc::new(SensorHub::new());
    let sim = KinematicSimulator::new(hub.clone()).with_obstacles(obstacles);

    RoverEnv::new(RoverEnvConfig::new(arena), sim, hub).unwrap()
}

fn drive_until_done<S: Simulator>(env: &mut RoverEnv<S>, limit: usize) -> (usize, f32) {
    for step in 1..=limit {
        let res = env.step(&STRAIGHT).unwrap();
        if res.terminated {
            return (step, res.reward);
        }
    }
    panic!("episode still running after {limit} steps");
}

#[test]
fn crash_into_rock_ends_episode() {
    // a rock straight ahead of the mars start
    let mut env = mars_with(
        ArenaConfig::mars(),
        vec![Obstacle {
            center: Point2::new(3.0, 0.35),
            radius: 1.0,
        }],
    );
    env.reset(None, None).unwrap();
    assert!(env.episode().collision_threshold > 2.0);

    let (steps, reward) = drive_until_done(&mut env, 5);

    assert_eq!(steps, 2);
    assert_eq!(reward, 0.0);
    assert!(env.episode().collision_threshold <= 0.5);
    assert_eq!(
        env.episode().status,
        EpisodeStatus::Terminal(Termination::Proximity)
    );
    assert!(matches!(env.step(&STRAIGHT), Err(EnvError::NeedsReset)));
}

#[test]
fn reaching_checkpoint_pays_by_speed() {
    let mut arena = ArenaConfig::mars();
    arena.checkpoint = Point2::new(1.0, -5.0);
    let mut env = mars_with(arena, Vec::new());
    env.reset(None, None).unwrap();

    // the position check lags one step behind
    let (steps, reward) = drive_until_done(&mut env, 5);

    assert_eq!(steps, 3);
    assert_approx_eq!(reward, 2.0 * 10000.0 / 3.0, 1e-2);
    assert_eq!(
        env.episode().status,
        EpisodeStatus::Terminal(Termination::Checkpoint)
    );
}

#[test]
fn leaving_the_map_ends_episode() {
    let mut arena = ArenaConfig::mars();
    arena.bounds.x_max = 1.0;
    let mut env = mars_with(arena, Vec::new());
    env.reset(None, None).unwrap();

    let (steps, reward) = drive_until_done(&mut env, 5);

    assert_eq!(steps, 2);
    assert_eq!(reward, 0.0);
    assert_eq!(
        env.episode().status,
        EpisodeStatus::Terminal(Termination::OutOfBounds)
    );
}

#[test]
fn turning_changes_heading_not_reward_sign() {
    let mut env = mars_with(ArenaConfig::mars(), Vec::new());
    env.reset(None, None).unwrap();
    let start = env.simulator().heading();

    env.step(&Action::Discrete(0)).unwrap();
    assert_approx_eq!(env.simulator().heading() - start, 0.3, 1e-9);

    env.step(&Action::Discrete(1)).unwrap();
    assert_approx_eq!(env.simulator().heading(), start, 1e-9);

    assert!(env.episode().reward_in_episode > 0.0);
}

#[derive(Clone, Default)]
struct Recorder {
    items: Arc<Mutex<Vec<LogItem>>>,
}

impl Logger for Recorder {
    fn log(&mut self, data: LogItem) -> EnvResult<()> {
        self.items.lock().push(data);
        Ok(())
    }

    fn dump(&self) -> EnvResult<()> {
        Ok(())
    }

    fn check_can_log(&self, _try_to_fix: bool) -> Result<(), &str> {
        Ok(())
    }

    fn print_last(&self) {}
}

#[test]
fn episode_metrics_are_emitted_on_reset() {
    let recorder = Recorder::default();
    let hub = Arc::new(SensorHub::new());
    let sim = KinematicSimulator::new(hub.clone());
    let config = RoverEnvConfig::new(ArenaConfig::mars()).with_emit_metrics(true);
    let mut env = RoverEnv::new(config, sim, hub)
        .unwrap()
        .with_metrics(Box::new(recorder.clone()));

    // nothing to report for the very first reset
    env.reset(None, None).unwrap();
    assert!(recorder.items.lock().is_empty());

    env.step(&STRAIGHT).unwrap();
    env.step(&STRAIGHT).unwrap();
    env.reset(None, None).unwrap();

    // nor for an episode that never stepped
    env.reset(None, None).unwrap();

    let items = recorder.items.lock();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].get("Episode_Steps"), Some(&LogData::Int(2)));
    assert_eq!(items[0].get("Episode_Reward"), Some(&LogData::Float(3500.0)));
    match items[0].get("DistanceToCheckpoint") {
        Some(LogData::Float(d)) => assert!(*d > 40.0 && *d < 45.0),
        other => panic!("unexpected distance entry {other:?}"),
    }
}

#[test]
fn metrics_stay_off_by_default() {
    let recorder = Recorder::default();
    let hub = Arc::new(SensorHub::new());
    let sim = KinematicSimulator::new(hub.clone());
    let mut env = RoverEnv::new(RoverEnvConfig::new(ArenaConfig::mars()), sim, hub)
        .unwrap()
        .with_metrics(Box::new(recorder.clone()));

    env.reset(None, None).unwrap();
    env.step(&STRAIGHT).unwrap();
    env.reset(None, None).unwrap();

    assert!(recorder.items.lock().is_empty());
}

// accepts everything and publishes nothing
struct Silent;

impl Simulator for Silent {
    fn send_action(&mut self, _command: DriveCommand) -> EnvResult<()> {
        Ok(())
    }

    fn reset_model(&mut self, _state: &ModelState, _joints: &JointConfiguration) -> EnvResult<()> {
        Ok(())
    }
}

#[test]
fn silent_sensors_time_out() {
    let hub = Arc::new(SensorHub::new());
    let config = RoverEnvConfig::new(ArenaConfig::training_grounds()).with_sensor_timeout_ms(20);
    let mut env = RoverEnv::new(config, Silent, hub).unwrap();

    match env.reset(None, None) {
        Err(EnvError::SensorTimeout { channel, .. }) => assert_eq!(channel, SensorChannel::Pose),
        other => panic!("expected a pose timeout, got {:?}", other.map(|o| o.dim())),
    }
    assert!(matches!(env.step(&STRAIGHT), Err(EnvError::NeedsReset)));
}

// pose and scan arrive but the camera never does
struct Blind {
    hub: Arc<SensorHub>,
}

impl Simulator for Blind {
    fn send_action(&mut self, _command: DriveCommand) -> EnvResult<()> {
        self.hub.on_pose(0.0, 0.0);
        self.hub.on_scan(&[f32::INFINITY; 360]);
        Ok(())
    }

    fn reset_model(&mut self, _state: &ModelState, _joints: &JointConfiguration) -> EnvResult<()> {
        self.send_action(DriveCommand::stop())
    }
}

#[test]
fn missing_camera_frame_times_out() {
    let hub = Arc::new(SensorHub::new());
    let sim = Blind { hub: hub.clone() };
    let config = RoverEnvConfig::new(ArenaConfig::mars()).with_sensor_timeout_ms(20);
    let mut env = RoverEnv::new(config, sim, hub).unwrap();

    assert!(matches!(
        env.reset(None, None),
        Err(EnvError::FrameTimeout { .. })
    ));
    assert!(matches!(env.step(&STRAIGHT), Err(EnvError::NeedsReset)));
}

// publishes clean frames on reset and truncated ones afterwards
struct GlitchyCamera {
    hub: Arc<SensorHub>,
}

impl GlitchyCamera {
    fn publish(&self, data: Vec<u8>) {
        self.hub.on_pose(0.0, 0.0);
        self.hub.on_scan(&[f32::INFINITY; 360]);
        self.hub.on_image(RawImage {
            width: 160,
            height: 120,
            encoding: Encoding::Rgb8,
            data,
        });
    }
}

impl Simulator for GlitchyCamera {
    fn send_action(&mut self, _command: DriveCommand) -> EnvResult<()> {
        self.publish(vec![0; 17]);
        Ok(())
    }

    fn reset_model(&mut self, _state: &ModelState, _joints: &JointConfiguration) -> EnvResult<()> {
        self.publish(vec![7; 160 * 120 * 3]);
        Ok(())
    }
}

#[test]
fn undecodable_frame_keeps_previous_observation() {
    let hub = Arc::new(SensorHub::new());
    let sim = GlitchyCamera { hub: hub.clone() };
    let mut env = RoverEnv::new(RoverEnvConfig::new(ArenaConfig::mars()), sim, hub).unwrap();

    let first = env.reset(None, None).unwrap();
    assert!(first.iter().all(|px| *px == 7));

    let res = env.step(&STRAIGHT).unwrap();
    assert_eq!(res.obs, first);
}

// forwards to the kinematic model, except that one chosen `send_action`
// call goes nowhere and the next `reset_model` can be made to fail
struct Flaky {
    inner: KinematicSimulator,
    calls: usize,
    dropped_call: usize,
    fail_next_reset: bool,
}

impl Flaky {
    fn new(hub: Arc<SensorHub>, dropped_call: usize) -> Self {
        Self {
            inner: KinematicSimulator::new(hub),
            calls: 0,
            dropped_call,
            fail_next_reset: false,
        }
    }
}

impl Simulator for Flaky {
    fn send_action(&mut self, command: DriveCommand) -> EnvResult<()> {
        self.calls += 1;
        if self.calls == self.dropped_call {
            return Ok(());
        }
        self.inner.send_action(command)
    }

    fn reset_model(&mut self, state: &ModelState, joints: &JointConfiguration) -> EnvResult<()> {
        if std::mem::take(&mut self.fail_next_reset) {
            return Err(EnvError::Simulator("model reset refused".to_string()));
        }
        self.inner.reset_model(state, joints)
    }
}

fn flaky_mars(dropped_call: usize) -> RoverEnv<Flaky> {
    let hub = Arc::new(SensorHub::new());
    let sim = Flaky::new(hub.clone(), dropped_call);
    let config = RoverEnvConfig::new(ArenaConfig::mars()).with_sensor_timeout_ms(50);

    RoverEnv::new(config, sim, hub).unwrap()
}

#[test]
fn timed_out_step_requires_reset() {
    // call 1 is the stop sent by reset, call 3 the second step
    let mut env = flaky_mars(3);
    env.reset(None, None).unwrap();

    assert_eq!(env.step(&STRAIGHT).unwrap().reward, 2000.0);
    assert!(matches!(
        env.step(&STRAIGHT),
        Err(EnvError::SensorTimeout {
            channel: SensorChannel::Pose,
            ..
        })
    ));
    assert!(matches!(env.step(&STRAIGHT), Err(EnvError::NeedsReset)));

    // the failed step is gone after a reset, so waypoint bonuses are undiluted
    env.reset(None, None).unwrap();
    assert_eq!(env.episode().steps, 0);
    assert_eq!(env.step(&STRAIGHT).unwrap().reward, 2000.0);
    assert_eq!(env.step(&STRAIGHT).unwrap().reward, 1500.0);
}

#[test]
fn failed_reset_blocks_stepping() {
    let mut env = flaky_mars(usize::MAX);
    env.reset(None, None).unwrap();
    env.step(&STRAIGHT).unwrap();

    env.simulator_mut().fail_next_reset = true;
    assert!(matches!(
        env.reset(None, None),
        Err(EnvError::Simulator(_))
    ));
    assert!(matches!(env.step(&STRAIGHT), Err(EnvError::NeedsReset)));

    env.reset(None, None).unwrap();
    assert!(env.step(&STRAIGHT).is_ok());
}

// replays a pose from before the teleport, as a slow transport would
struct LatePose {
    inner: KinematicSimulator,
    hub: Arc<SensorHub>,
}

impl Simulator for LatePose {
    fn send_action(&mut self, command: DriveCommand) -> EnvResult<()> {
        self.inner.send_action(command)
    }

    fn reset_model(&mut self, state: &ModelState, joints: &JointConfiguration) -> EnvResult<()> {
        self.hub.on_pose(30.0, 10.0);
        self.inner.reset_model(state, joints)
    }
}

#[test]
fn late_pose_does_not_count_as_travel() {
    let hub = Arc::new(SensorHub::new());
    let sim = LatePose {
        inner: KinematicSimulator::new(hub.clone()),
        hub: hub.clone(),
    };
    let mut env = RoverEnv::new(RoverEnvConfig::new(ArenaConfig::mars()), sim, hub).unwrap();

    env.reset(None, None).unwrap();
    let snap = env.hub().snapshot();
    assert_eq!(snap.distance_travelled, 0.0);
    assert!(!snap.closer_to_checkpoint);

    // one straight step at full throttle covers 3 m/s * 0.3 s
    env.step(&STRAIGHT).unwrap();
    let snap = env.hub().snapshot();
    assert_approx_eq!(snap.distance_travelled, 0.9, 1e-9);
    assert!(snap.closer_to_checkpoint);
}
