use std::sync::{LazyLock, Mutex};

use dyn_clone::DynClone;
use ndarray::Array3;
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::env::action::{Action, ActionMode, MAX_THROTTLE, MAX_STEERING, MIN_STEERING, MIN_THROTTLE};
use crate::env::camera::Observation;

pub static SHARED_RNG: LazyLock<Mutex<StdRng>> =
    LazyLock::new(|| Mutex::new(StdRng::seed_from_u64(1234)));

pub fn seed_spaces_rng(seed: u64) {
    *SHARED_RNG.lock().unwrap_or_else(|e| e.into_inner()) = StdRng::seed_from_u64(seed);
}

fn with_rng<T>(f: impl FnOnce(&mut StdRng) -> T) -> T {
    let mut rng = SHARED_RNG.lock().unwrap_or_else(|e| e.into_inner());
    f(&mut rng)
}

/// Defines a space in which a action, observation, or other may exist
pub trait Space<T: Clone>: DynClone {
    /// tests whether the sample is contained within the space
    fn contains(&self, sample: &T) -> bool;

    /// randomly samples from the space
    fn sample(&mut self) -> T;

    /// returns some semantic representation of the space of
    /// the space, to be used for initialising models
    fn shape(&self) -> T;
}

dyn_clone::clone_trait_object!(<T> Space<T> where T: Clone);

/// Defines a Discrete Space.
///
/// A Discrete space is a space on `usize` where samples
/// are drawn uniformly from `[0, n)`.
#[derive(Debug, Clone)]
pub struct Discrete {
    /// The upper bound on the space
    n: usize,
}

impl From<usize> for Discrete {
    fn from(value: usize) -> Self {
        Self { n: value }
    }
}

impl Space<usize> for Discrete {
    fn contains(&self, sample: &usize) -> bool {
        *sample < self.n
    }

    fn sample(&mut self) -> usize {
        with_rng(|rng| rng.gen_range(0..self.n))
    }

    fn shape(&self) -> usize {
        self.n
    }
}

/// Defines a `BoxSpace`.
///
/// A `BoxSpace` is an n-dimensional container of `f32`
/// values, each bounded by its own `[low, high]`.
#[derive(Debug, Clone)]
pub struct BoxSpace {
    /// The lower bound on the space
    low: Vec<f32>,

    /// The upper bound on the space
    high: Vec<f32>,
}

impl From<(Vec<f32>, Vec<f32>)> for BoxSpace {
    fn from(value: (Vec<f32>, Vec<f32>)) -> Self {
        Self {
            low: value.0,
            high: value.1,
        }
    }
}

impl Space<Vec<f32>> for BoxSpace {
    fn contains(&self, sample: &Vec<f32>) -> bool {
        if sample.len() != self.low.len() {
            return false;
        }

        sample
            .iter()
            .zip(self.low.iter())
            .zip(self.high.iter())
            .all(|((&s, &l), &h)| l <= s && s <= h)
    }

    fn sample(&mut self) -> Vec<f32> {
        with_rng(|rng| {
            (0..self.low.len())
                .map(|i| rng.gen_range(self.low[i]..=self.high[i]))
                .collect()
        })
    }

    fn shape(&self) -> Vec<f32> {
        self.low.clone()
    }
}

impl BoxSpace {
    pub fn low(&self) -> &Vec<f32> {
        &self.low
    }

    pub fn high(&self) -> &Vec<f32> {
        &self.high
    }
}

/// Camera frames, stored row-major as `(height, width, channels)` bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageSpace {
    pub height: usize,
    pub width: usize,
    pub channels: usize,
}

impl ImageSpace {
    pub fn new(height: usize, width: usize, channels: usize) -> Self {
        Self {
            height,
            width,
            channels,
        }
    }
}

impl Space<Observation> for ImageSpace {
    // every u8 is within [0, 255] so only the shape can disagree
    fn contains(&self, sample: &Observation) -> bool {
        sample.dim() == (self.height, self.width, self.channels)
    }

    fn sample(&mut self) -> Observation {
        with_rng(|rng| {
            Array3::from_shape_simple_fn((self.height, self.width, self.channels), || rng.gen())
        })
    }

    fn shape(&self) -> Observation {
        Array3::zeros((self.height, self.width, self.channels))
    }
}

/// The rover's action space, either a steering/throttle box or a
/// three-way discrete choice.
#[derive(Debug, Clone)]
pub enum RoverActionSpace {
    Continuous(BoxSpace),
    Discrete(Discrete),
}

impl From<ActionMode> for RoverActionSpace {
    fn from(mode: ActionMode) -> Self {
        match mode {
            ActionMode::Continuous => RoverActionSpace::Continuous(BoxSpace::from((
                vec![MIN_STEERING, MIN_THROTTLE],
                vec![MAX_STEERING, MAX_THROTTLE],
            ))),
            ActionMode::Discrete => RoverActionSpace::Discrete(Discrete::from(3)),
        }
    }
}

impl Space<Action> for RoverActionSpace {
    fn contains(&self, sample: &Action) -> bool {
        match (self, sample) {
            (
                RoverActionSpace::Continuous(space),
                Action::Continuous { steering, throttle },
            ) => space.contains(&vec![*steering, *throttle]),
            (RoverActionSpace::Discrete(space), Action::Discrete(idx)) => space.contains(idx),
            _ => false,
        }
    }

    fn sample(&mut self) -> Action {
        match self {
            RoverActionSpace::Continuous(space) => {
                let v = space.sample();
                Action::Continuous {
                    steering: v[0],
                    throttle: v[1],
                }
            }
            RoverActionSpace::Discrete(space) => Action::Discrete(space.sample()),
        }
    }

    fn shape(&self) -> Action {
        match self {
            RoverActionSpace::Continuous(space) => {
                let v = space.shape();
                Action::Continuous {
                    steering: v[0],
                    throttle: v[1],
                }
            }
            RoverActionSpace::Discrete(space) => Action::Discrete(space.shape()),
        }
    }
}
