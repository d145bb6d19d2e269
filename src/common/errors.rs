use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::env::sensors::SensorChannel;

pub type EnvResult<T> = Result<T, EnvError>;

#[derive(Error, Debug)]
pub enum EnvError {
    #[error("invalid discrete action index {0}, expected one of 0 (left), 1 (right), 2 (straight)")]
    InvalidAction(usize),
    #[error("continuous action out of bounds: steering={steering}, throttle={throttle}")]
    ActionOutOfBounds { steering: f32, throttle: f32 },
    #[error("no {channel:?} update arrived within {waited:?}")]
    SensorTimeout {
        channel: SensorChannel,
        waited: Duration,
    },
    #[error("no camera frame arrived within {waited:?}")]
    FrameTimeout { waited: Duration },
    #[error("environment needs a reset before it can be stepped")]
    NeedsReset,
    #[error("could not decode camera frame: {0}")]
    ImageDecode(String),
    #[error("simulator rejected command: {0}")]
    Simulator(String),
    #[error("metrics sink failure: {0}")]
    Metrics(String),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("no environment registered under id {0:?}")]
    UnknownEnvironment(String),
    #[error("tried {retries} times, but checkpoint never found in {dir:?}")]
    CheckpointNotFound { retries: usize, dir: PathBuf },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
