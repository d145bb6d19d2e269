use serde::{Deserialize, Serialize};

use crate::common::errors::{EnvError, EnvResult};

pub const MIN_STEERING: f32 = -1.0;
pub const MAX_STEERING: f32 = 1.0;
pub const MIN_THROTTLE: f32 = 0.0;
pub const MAX_THROTTLE: f32 = 3.0;

/// Throttle applied by every discrete action.
pub const DISCRETE_THROTTLE: f32 = 3.0;

/// What the agent hands to `step`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Action {
    Continuous { steering: f32, throttle: f32 },
    Discrete(usize),
}

/// Which action decoder the environment runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionMode {
    Continuous,
    Discrete,
}

/// A velocity command for the rover: steering is the yaw rate,
/// throttle the forward speed.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DriveCommand {
    pub steering: f32,
    pub throttle: f32,
}

impl DriveCommand {
    pub fn new(steering: f32, throttle: f32) -> Self {
        Self { steering, throttle }
    }

    pub fn stop() -> Self {
        Self::default()
    }
}

/// Maps a discrete index onto its fixed drive command.
///
/// 0 turns left, 1 turns right and 2 drives straight, all at full throttle.
pub fn decode_discrete(index: usize) -> EnvResult<DriveCommand> {
    let steering = match index {
        0 => 1.0,
        1 => -1.0,
        2 => 0.0,
        _ => return Err(EnvError::InvalidAction(index)),
    };

    Ok(DriveCommand::new(steering, DISCRETE_THROTTLE))
}

fn decode_continuous(steering: f32, throttle: f32) -> EnvResult<DriveCommand> {
    let in_bounds = (MIN_STEERING..=MAX_STEERING).contains(&steering)
        && (MIN_THROTTLE..=MAX_THROTTLE).contains(&throttle);

    if !in_bounds {
        return Err(EnvError::ActionOutOfBounds { steering, throttle });
    }

    Ok(DriveCommand::new(steering, throttle))
}

/// Turns an agent action into a drive command under the given mode.
///
/// A continuous action is accepted in discrete mode too, so callers
/// can issue raw commands (e.g. the stop command on reset) through
/// the same path.
pub fn decode(mode: ActionMode, action: &Action) -> EnvResult<DriveCommand> {
    match (mode, action) {
        (_, Action::Continuous { steering, throttle }) => decode_continuous(*steering, *throttle),
        (ActionMode::Discrete, Action::Discrete(idx)) => decode_discrete(*idx),
        (ActionMode::Continuous, Action::Discrete(idx)) => Err(EnvError::InvalidAction(*idx)),
    }
}
