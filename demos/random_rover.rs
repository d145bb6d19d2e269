extern crate rover_gym;

use std::sync::Arc;

use rover_gym::common::errors::EnvResult;
use rover_gym::env::{
    base::Env,
    config::Point2,
    registry::make,
    sensors::SensorHub,
    simulator::{KinematicSimulator, Obstacle},
};

fn main() -> EnvResult<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    // a rock in the middle of the training grounds
    let hub = Arc::new(SensorHub::new());
    let sim = KinematicSimulator::new(hub.clone()).with_obstacles(vec![Obstacle {
        center: Point2::new(0.0, 0.0),
        radius: 1.5,
    }]);
    let mut env = make("Rover-TrainingGrounds-v2", sim, hub)?;

    let mut done = false;
    let mut reward = 0.0;
    let mut steps = 0;
    env.reset(None, None)?;

    while !done {
        let action = env.action_space().sample();
        let obs = env.step(&action)?;

        done = obs.done();
        reward += obs.reward;
        steps += 1;
    }
    env.close();

    println!("Finished random action episode after {steps} steps. Reward: {reward}");

    Ok(())
}
