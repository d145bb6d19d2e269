use std::collections::HashMap;

use crate::common::{errors::EnvResult, logger::LogData, spaces::Space};

/// Extra per-step diagnostics. The rover env always leaves it empty.
pub type Info = HashMap<String, LogData>;
pub type ResetOptions = HashMap<String, LogData>;

/// Result of one `step`.
#[derive(Clone, Debug)]
pub struct EnvObservation<O> {
    pub obs: O,
    pub reward: f32,
    /// The episode ended inside the env (crash, checkpoint, ...).
    pub terminated: bool,
    /// The episode was cut short from outside, e.g. by a time limit.
    pub truncated: bool,
    pub info: Info,
}

impl<O> EnvObservation<O> {
    pub fn done(&self) -> bool {
        self.terminated | self.truncated
    }
}

/// Bounds of the per-step reward.
#[derive(Clone, Debug, Copy, PartialEq)]
pub struct RewardRange {
    pub low: f32,
    pub high: f32,
}

/// A gym-style episodic environment over observations `O` and actions `A`.
///
/// `step` and `reset` fail instead of panicking: on an invalid action,
/// on a step without a preceding reset, or when the backing simulator
/// stops answering.
pub trait Env<O: Clone, A: Clone> {
    fn step(&mut self, action: &A) -> EnvResult<EnvObservation<O>>;
    fn reset(&mut self, seed: Option<[u8; 32]>, options: Option<ResetOptions>) -> EnvResult<O>;
    fn action_space(&self) -> Box<dyn Space<A>>;
    fn observation_space(&self) -> Box<dyn Space<O>>;
    fn reward_range(&self) -> RewardRange;
    fn render(&self);
    fn renderable(&self) -> bool;
    fn close(&mut self);
    fn unwrapped(&self) -> &dyn Env<O, A>;
}
