use burn::config::Config;
use serde::{Deserialize, Serialize};

use crate::common::errors::{EnvError, EnvResult};

use super::action::ActionMode;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point2 {
    pub x: f64,
    pub y: f64,
}

impl Point2 {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point2) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quaternion {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub w: f64,
}

impl Quaternion {
    /// Rotation about the vertical axis, in radians.
    pub fn yaw(&self) -> f64 {
        let siny_cosp = 2.0 * (self.w * self.z + self.x * self.y);
        let cosy_cosp = 1.0 - 2.0 * (self.y * self.y + self.z * self.z);
        siny_cosp.atan2(cosy_cosp)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub position: Point3,
    pub orientation: Quaternion,
}

impl Pose {
    pub fn planar(&self) -> Point2 {
        Point2::new(self.position.x, self.position.y)
    }
}

/// Rectangular extent of the arena, in metres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
}

impl Bounds {
    /// Whether `p` lies inside the bounds grown by `margin` on every side.
    pub fn contains(&self, p: &Point2, margin: f64) -> bool {
        p.x >= self.x_min - margin
            && p.x <= self.x_max + margin
            && p.y >= self.y_min - margin
            && p.y <= self.y_max + margin
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Comparison {
    AtMost,
    AtLeast,
}

/// One half of a waypoint's entry condition.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisBound {
    pub value: f64,
    pub cmp: Comparison,
}

impl AxisBound {
    pub fn at_most(value: f64) -> Self {
        Self {
            value,
            cmp: Comparison::AtMost,
        }
    }

    pub fn at_least(value: f64) -> Self {
        Self {
            value,
            cmp: Comparison::AtLeast,
        }
    }

    pub fn holds(&self, v: f64) -> bool {
        match self.cmp {
            Comparison::AtMost => v <= self.value,
            Comparison::AtLeast => v >= self.value,
        }
    }
}

/// An intermediate milestone that pays `reward / steps` once per episode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub name: String,
    pub x: AxisBound,
    pub y: AxisBound,
    pub reward: f32,
}

impl Waypoint {
    pub fn new(name: &str, x: AxisBound, y: AxisBound, reward: f32) -> Self {
        Self {
            name: name.to_string(),
            x,
            y,
            reward,
        }
    }

    pub fn reached(&self, p: &Point2) -> bool {
        self.x.holds(p.x) && self.y.holds(p.y)
    }
}

/// Geometry and reward constants of one arena.
#[derive(Config, Debug)]
pub struct ArenaConfig {
    pub name: String,
    pub bounds: Bounds,
    pub checkpoint: Point2,
    pub initial_pose: Pose,
    /// Checked in order, at most one bonus per step.
    pub waypoints: Vec<Waypoint>,
    /// Minimum LIDAR distance below which the rover counts as crashed.
    pub crash_distance: f64,
    /// Power supply range: steps available before the episode is forced to end.
    pub max_steps: usize,
    #[config(default = 0.45)]
    pub boundary_margin: f64,
    #[config(default = 2.0)]
    pub base_reward: f32,
    #[config(default = 10000.0)]
    pub finished_reward_multiplier: f32,
    #[config(default = 5)]
    pub proximity_bands: usize,
    #[config(default = 4.5)]
    pub lidar_max_distance: f64,
    #[config(default = 360)]
    pub lidar_samples: usize,
}

impl ArenaConfig {
    /// The small walled square used for early training.
    pub fn training_grounds() -> Self {
        Self::new(
            "training_grounds".to_string(),
            Bounds {
                x_min: -10.0,
                x_max: 10.0,
                y_min: -10.0,
                y_max: 10.0,
            },
            Point2::new(8.5, 8.5),
            Pose {
                position: Point3 {
                    x: -8.5,
                    y: -8.5,
                    z: 0.65,
                },
                orientation: Quaternion {
                    x: 0.0174910797633,
                    y: 0.0178586654381,
                    z: -0.699497425461,
                    w: 0.71419778911,
                },
            },
            vec![Waypoint::new(
                "midpoint",
                AxisBound::at_least(0.0),
                AxisBound::at_least(0.0),
                2.0 * 5000.0,
            )],
            0.49,
            500,
        )
    }

    /// The large Mars terrain with three waypoints on the way to the checkpoint.
    pub fn mars() -> Self {
        Self::new(
            "mars".to_string(),
            Bounds {
                x_min: -10.0,
                x_max: 46.0,
                y_min: -22.0,
                y_max: 22.0,
            },
            Point2::new(44.25, -4.0),
            Pose {
                position: Point3 {
                    x: -0.170505086911,
                    y: 0.114341186761,
                    z: -0.0418765865136,
                },
                orientation: Quaternion {
                    x: 0.0135099011407,
                    y: 0.040927747122,
                    z: 0.0365547169101,
                    w: 0.998401800258,
                },
            },
            vec![
                Waypoint::new(
                    "waypoint_1",
                    AxisBound::at_most(11.0),
                    AxisBound::at_most(-1.0),
                    1000.0,
                ),
                Waypoint::new(
                    "waypoint_2",
                    AxisBound::at_most(22.0),
                    AxisBound::at_least(-2.0),
                    2000.0,
                ),
                Waypoint::new(
                    "waypoint_3",
                    AxisBound::at_most(33.0),
                    AxisBound::at_least(-3.0),
                    3000.0,
                ),
            ],
            0.50,
            2000,
        )
    }

    pub fn initial_position(&self) -> Point2 {
        self.initial_pose.planar()
    }

    pub fn initial_distance_to_checkpoint(&self) -> f64 {
        self.initial_position().distance(&self.checkpoint)
    }

    pub fn validate(&self) -> EnvResult<()> {
        let b = &self.bounds;
        if b.x_min >= b.x_max || b.y_min >= b.y_max {
            return Err(EnvError::Config(format!(
                "arena {} has empty bounds {:?}",
                self.name, b
            )));
        }
        if self.crash_distance <= 0.0 {
            return Err(EnvError::Config("crash distance must be positive".to_string()));
        }
        if self.proximity_bands == 0 {
            return Err(EnvError::Config("need at least one proximity band".to_string()));
        }
        if self.max_steps == 0 {
            return Err(EnvError::Config("step budget must be non-zero".to_string()));
        }
        if self.lidar_samples < 2 {
            return Err(EnvError::Config("need at least two lidar samples".to_string()));
        }
        if self.initial_distance_to_checkpoint() <= 0.0 {
            return Err(EnvError::Config(
                "initial pose must not coincide with the checkpoint".to_string(),
            ));
        }

        Ok(())
    }
}

#[derive(Config, Debug)]
pub struct RoverEnvConfig {
    pub arena: ArenaConfig,
    #[config(default = "ActionMode::Discrete")]
    pub action_mode: ActionMode,
    #[config(default = 160)]
    pub image_width: usize,
    #[config(default = 120)]
    pub image_height: usize,
    /// How long `step`/`reset` wait on any one sensor channel.
    #[config(default = 2000)]
    pub sensor_timeout_ms: u64,
    /// Log episode reward, steps and distance to checkpoint on reset.
    #[config(default = false)]
    pub emit_metrics: bool,
}

impl RoverEnvConfig {
    pub fn sensor_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.sensor_timeout_ms)
    }

    pub fn validate(&self) -> EnvResult<()> {
        if self.image_width == 0 || self.image_height == 0 {
            return Err(EnvError::Config("observation size must be non-zero".to_string()));
        }

        self.arena.validate()
    }

    /// Loads a JSON config written by `save`.
    pub fn load_json(path: &std::path::Path) -> EnvResult<Self> {
        let config = Self::load(path).map_err(|e| EnvError::Config(format!("{e:?}")))?;
        config.validate()?;

        Ok(config)
    }
}
