use std::sync::Arc;

use crate::common::errors::{EnvError, EnvResult};

use super::{
    action::{Action, ActionMode},
    base::Env,
    camera::Observation,
    config::{ArenaConfig, RoverEnvConfig},
    rover::RoverEnv,
    sensors::SensorHub,
    simulator::Simulator,
    wrappers::TimeLimitWrapper,
};

/// A named, ready-to-build environment variant.
#[derive(Debug, Clone)]
pub struct EnvSpec {
    pub id: &'static str,
    pub max_episode_steps: usize,
    /// Mean episode reward at which the task counts as solved.
    pub reward_threshold: f32,
    pub config: RoverEnvConfig,
}

pub fn registry() -> Vec<EnvSpec> {
    vec![
        EnvSpec {
            id: "Rover-TrainingGrounds-v2",
            max_episode_steps: 1_000_000,
            reward_threshold: 500.0,
            config: RoverEnvConfig::new(ArenaConfig::training_grounds())
                .with_action_mode(ActionMode::Discrete),
        },
        EnvSpec {
            id: "Mars-v1",
            max_episode_steps: 1_000_000,
            reward_threshold: 2000.0,
            config: RoverEnvConfig::new(ArenaConfig::mars()).with_action_mode(ActionMode::Discrete),
        },
    ]
}

pub fn spec(id: &str) -> EnvResult<EnvSpec> {
    registry()
        .into_iter()
        .find(|s| s.id == id)
        .ok_or_else(|| EnvError::UnknownEnvironment(id.to_string()))
}

/// Builds the registered env `id` on top of `simulator`, wrapped in its
/// time limit.
pub fn make<S: Simulator + 'static>(
    id: &str,
    simulator: S,
    hub: Arc<SensorHub>,
) -> EnvResult<Box<dyn Env<Observation, Action>>> {
    let spec = spec(id)?;
    let env = RoverEnv::new(spec.config, simulator, hub)?;

    Ok(Box::new(TimeLimitWrapper::new(
        Box::new(env),
        spec.max_episode_steps,
    )))
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use crate::common::errors::EnvError;
    use crate::env::{sensors::SensorHub, simulator::KinematicSimulator};

    use super::{make, registry, spec};

    #[test]
    fn test_registry_ids_are_unique() {
        let specs = registry();
        let mut ids: Vec<_> = specs.iter().map(|s| s.id).collect();
        ids.dedup();

        assert_eq!(ids.len(), specs.len());
    }

    #[test]
    fn test_spec_lookup() {
        let mars = spec("Mars-v1").unwrap();
        assert_eq!(mars.max_episode_steps, 1_000_000);
        assert_eq!(mars.reward_threshold, 2000.0);
        assert_eq!(mars.config.arena.name, "mars");

        let grounds = spec("Rover-TrainingGrounds-v2").unwrap();
        assert_eq!(grounds.reward_threshold, 500.0);
        assert_eq!(grounds.config.arena.max_steps, 500);
    }

    #[test]
    fn test_unknown_id() {
        let hub = Arc::new(SensorHub::new());
        let sim = KinematicSimulator::new(hub.clone());

        assert!(matches!(
            make("CartPole-v1", sim, hub),
            Err(EnvError::UnknownEnvironment(id)) if id == "CartPole-v1"
        ));
    }

    #[test]
    fn test_make_resets() {
        let hub = Arc::new(SensorHub::new());
        let sim = KinematicSimulator::new(hub.clone());
        let mut env = make("Rover-TrainingGrounds-v2", sim, hub).unwrap();

        let obs = env.reset(None, None).unwrap();
        assert_eq!(obs.dim(), (120, 160, 3));
        assert_eq!(env.action_space().shape(), crate::env::action::Action::Discrete(3));
    }
}
