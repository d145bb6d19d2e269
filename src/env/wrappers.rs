use crate::common::{errors::EnvResult, spaces::Space};

use super::base::{Env, EnvObservation, ResetOptions, RewardRange};

/// Truncates episodes after `max_steps` steps, on top of whatever
/// termination the wrapped env does itself.
pub struct TimeLimitWrapper<O: Clone, A: Clone> {
    env: Box<dyn Env<O, A>>,
    max_steps: usize,
    curr_steps: usize,
}

impl<O: Clone, A: Clone> TimeLimitWrapper<O, A> {
    pub fn new(env: Box<dyn Env<O, A>>, max_steps: usize) -> Self {
        Self {
            env,
            max_steps,
            curr_steps: 0,
        }
    }

    pub fn max_steps(&self) -> usize {
        self.max_steps
    }
}

impl<O: Clone, A: Clone> Env<O, A> for TimeLimitWrapper<O, A> {
    fn step(&mut self, action: &A) -> EnvResult<EnvObservation<O>> {
        let mut step_result = self.env.step(action)?;

        self.curr_steps += 1;
        step_result.truncated |= self.curr_steps >= self.max_steps;

        Ok(step_result)
    }

    fn reset(&mut self, seed: Option<[u8; 32]>, options: Option<ResetOptions>) -> EnvResult<O> {
        self.curr_steps = 0;

        self.env.reset(seed, options)
    }

    fn action_space(&self) -> Box<dyn Space<A>> {
        self.env.action_space()
    }

    fn observation_space(&self) -> Box<dyn Space<O>> {
        self.env.observation_space()
    }

    fn reward_range(&self) -> RewardRange {
        self.env.reward_range()
    }

    fn render(&self) {
        self.env.render()
    }

    fn renderable(&self) -> bool {
        self.env.renderable()
    }

    fn close(&mut self) {
        self.env.close()
    }

    fn unwrapped(&self) -> &dyn Env<O, A> {
        self.env.unwrapped()
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use crate::env::{
        base::Env,
        config::{ArenaConfig, RoverEnvConfig},
        rover::RoverEnv,
        sensors::SensorHub,
        simulator::KinematicSimulator,
    };

    use super::TimeLimitWrapper;

    #[test]
    fn test_time_limit_wrapper() {
        let truncate_steps = 5;
        let hub = Arc::new(SensorHub::new());
        let sim = KinematicSimulator::new(hub.clone());
        // straight ahead from the mars start stays clear of every termination for a while
        let unwrapped_env = RoverEnv::new(RoverEnvConfig::new(ArenaConfig::mars()), sim, hub).unwrap();
        let mut wrapped_env = TimeLimitWrapper::new(Box::new(unwrapped_env), truncate_steps);

        let mut ep_len = 0;
        let mut done = false;

        wrapped_env.reset(None, None).unwrap();
        while !done {
            let step_result = wrapped_env
                .step(&crate::env::action::Action::Discrete(2))
                .unwrap();
            done = step_result.done();
            ep_len += 1;
        }

        assert_eq!(truncate_steps, ep_len);
    }
}
