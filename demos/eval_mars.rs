extern crate rover_gym;

use std::sync::Arc;

use rover_gym::common::{
    errors::EnvResult,
    eval::{evaluate_policy, EvalConfig, RandomPolicy},
    logger::{CsvLogger, LogItem, Logger},
    spaces::seed_spaces_rng,
};
use rover_gym::env::{
    base::Env,
    config::{ArenaConfig, Point2, RoverEnvConfig},
    rover::RoverEnv,
    sensors::SensorHub,
    simulator::{KinematicSimulator, Obstacle},
    wrappers::TimeLimitWrapper,
};

fn main() -> EnvResult<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();
    seed_spaces_rng(0);

    let mut dump_path = std::env::temp_dir();
    dump_path.push("rover_gym_eval");
    dump_path.push("episodes.csv");
    let mut logger = CsvLogger::new(dump_path, false, true);
    if let Err(e) = logger.check_can_log(true) {
        tracing::warn!("logging disabled: {e}");
    }

    let hub = Arc::new(SensorHub::new());
    let sim = KinematicSimulator::new(hub.clone()).with_obstacles(vec![
        Obstacle {
            center: Point2::new(12.0, 1.0),
            radius: 2.0,
        },
        Obstacle {
            center: Point2::new(25.0, -6.0),
            radius: 1.0,
        },
    ]);
    let config = RoverEnvConfig::new(ArenaConfig::mars()).with_emit_metrics(true);
    // per-episode metrics go to the tracing output
    let env = RoverEnv::new(config, sim, hub)?;
    let mut env = TimeLimitWrapper::new(Box::new(env), 200);

    let mut policy = RandomPolicy::new(env.action_space());
    let cfg = EvalConfig::new()
        .with_n_eval_episodes(5)
        .with_show_progress(true);

    let result = evaluate_policy(&mut policy, &mut env, &cfg)?;
    let item: LogItem = result.into();
    logger.log(item)?;
    logger.print_last();
    logger.dump()?;

    Ok(())
}
