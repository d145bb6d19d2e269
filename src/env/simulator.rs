use std::f64::consts::PI;
use std::sync::Arc;

use crate::common::errors::{EnvError, EnvResult};

use super::action::DriveCommand;
use super::camera::{Encoding, RawImage};
use super::config::{Point2, Pose};
use super::sensors::SensorHub;

pub const ROVER_MODEL_NAME: &str = "rover";
pub const ROVER_URDF_PARAM: &str = "rover_description";

/// Every articulated joint of the rover, in the order the model reset expects.
pub const ROVER_JOINTS: [&str; 20] = [
    "rocker_left_corner_lb",
    "rocker_right_corner_rb",
    "body_rocker_left",
    "body_rocker_right",
    "rocker_right_bogie_right",
    "rocker_left_bogie_left",
    "bogie_left_corner_lf",
    "bogie_right_corner_rf",
    "corner_lf_wheel_lf",
    "imu_wheel_lf_joint",
    "bogie_left_wheel_lm",
    "imu_wheel_lm_joint",
    "corner_lb_wheel_lb",
    "imu_wheel_lb_joint",
    "corner_rf_wheel_rf",
    "imu_wheel_rf_joint",
    "bogie_right_wheel_rm",
    "imu_wheel_rm_joint",
    "corner_rb_wheel_rb",
    "imu_wheel_rb_joint",
];

/// Pose and velocity the model is teleported to on reset.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelState {
    pub model_name: String,
    pub pose: Pose,
    pub linear_velocity: [f64; 3],
    pub angular_velocity: [f64; 3],
}

impl ModelState {
    /// The rover at rest at `pose`.
    pub fn at_rest(pose: Pose) -> Self {
        Self {
            model_name: ROVER_MODEL_NAME.to_string(),
            pose,
            linear_velocity: [0.0; 3],
            angular_velocity: [0.0; 3],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct JointConfiguration {
    pub model_name: String,
    pub urdf_param_name: String,
    pub joint_names: Vec<String>,
    pub joint_positions: Vec<f64>,
}

impl JointConfiguration {
    /// All rover joints straightened out.
    pub fn zeroed() -> Self {
        Self {
            model_name: ROVER_MODEL_NAME.to_string(),
            urdf_param_name: ROVER_URDF_PARAM.to_string(),
            joint_names: ROVER_JOINTS.iter().map(|j| j.to_string()).collect(),
            joint_positions: vec![0.0; ROVER_JOINTS.len()],
        }
    }
}

/// The physics side of the environment: takes drive commands and
/// teleports the model. Sensor data flows back through a [`SensorHub`].
pub trait Simulator: Send {
    fn send_action(&mut self, command: DriveCommand) -> EnvResult<()>;

    fn reset_model(&mut self, state: &ModelState, joints: &JointConfiguration) -> EnvResult<()>;
}

/// A disc-shaped obstacle on the ground plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Obstacle {
    pub center: Point2,
    pub radius: f64,
}

/// Flat-ground unicycle model standing in for Gazebo.
///
/// Each drive command advances the rover one tick (throttle is the
/// forward speed, steering the yaw rate) and publishes pose, a 360 beam
/// scan, bumper contacts and a camera frame into the hub, all from the
/// calling thread.
pub struct KinematicSimulator {
    hub: Arc<SensorHub>,
    obstacles: Vec<Obstacle>,
    position: Point2,
    heading: f64,
    speed: f64,
    tick: f64,
    rover_radius: f64,
    scan_beams: usize,
    camera_size: (u32, u32),
    frame: u64,
}

impl KinematicSimulator {
    pub fn new(hub: Arc<SensorHub>) -> Self {
        Self {
            hub,
            obstacles: Vec::new(),
            position: Point2::default(),
            heading: 0.0,
            speed: 0.0,
            tick: 0.3,
            rover_radius: 0.5,
            scan_beams: 360,
            camera_size: (320, 240),
            frame: 0,
        }
    }

    pub fn with_obstacles(mut self, obstacles: Vec<Obstacle>) -> Self {
        self.obstacles = obstacles;
        self
    }

    /// Seconds of motion per drive command.
    pub fn with_tick(mut self, tick: f64) -> Self {
        self.tick = tick;
        self
    }

    pub fn with_camera_size(mut self, width: u32, height: u32) -> Self {
        self.camera_size = (width, height);
        self
    }

    pub fn position(&self) -> Point2 {
        self.position
    }

    pub fn heading(&self) -> f64 {
        self.heading
    }

    /// Distance along the ray from the rover at `angle` to the first
    /// obstacle it hits.
    fn cast(&self, angle: f64) -> f32 {
        let (dx, dy) = (angle.cos(), angle.sin());

        self.obstacles
            .iter()
            .filter_map(|o| {
                // |p + t d - c|^2 = r^2 with |d| = 1
                let fx = self.position.x - o.center.x;
                let fy = self.position.y - o.center.y;
                let b = fx * dx + fy * dy;
                let c = fx * fx + fy * fy - o.radius * o.radius;
                let disc = b * b - c;
                if disc < 0.0 {
                    return None;
                }
                let sq = disc.sqrt();
                [-b - sq, -b + sq].into_iter().find(|t| *t >= 0.0)
            })
            .fold(f64::INFINITY, f64::min) as f32
    }

    fn scan(&self) -> Vec<f32> {
        (0..self.scan_beams)
            .map(|i| self.cast(self.heading + 2.0 * PI * i as f64 / self.scan_beams as f64))
            .collect()
    }

    fn contacts(&self) -> usize {
        self.obstacles
            .iter()
            .filter(|o| self.position.distance(&o.center) <= o.radius + self.rover_radius)
            .count()
    }

    // a gradient that shifts with the pose, enough to tell frames apart
    fn render(&mut self) -> RawImage {
        let (width, height) = self.camera_size;
        let shade = ((self.heading.rem_euclid(2.0 * PI) / (2.0 * PI)) * 255.0) as u8;
        let frame = self.frame as u8;
        self.frame += 1;

        let mut data = Vec::with_capacity((width * height * 3) as usize);
        for row in 0..height {
            for col in 0..width {
                data.push((col * 255 / width.max(1)) as u8);
                data.push((row * 255 / height.max(1)) as u8 ^ frame);
                data.push(shade);
            }
        }

        RawImage {
            width,
            height,
            encoding: Encoding::Rgb8,
            data,
        }
    }

    fn publish(&mut self, acceleration: f64) {
        self.hub.on_pose(self.position.x, self.position.y);
        self.hub.on_scan(&self.scan());
        self.hub.on_contacts(self.contacts());
        self.hub.on_imu(acceleration.abs(), 0.0, 9.81);
        let frame = self.render();
        self.hub.on_image(frame);
    }
}

impl Simulator for KinematicSimulator {
    fn send_action(&mut self, command: DriveCommand) -> EnvResult<()> {
        if !command.steering.is_finite() || !command.throttle.is_finite() {
            return Err(EnvError::Simulator(format!("non-finite command {command:?}")));
        }

        let speed = command.throttle as f64;
        self.heading += command.steering as f64 * self.tick;
        self.position.x += speed * self.heading.cos() * self.tick;
        self.position.y += speed * self.heading.sin() * self.tick;

        // speed changes instantly, so the whole change lands in one tick
        let acceleration = (speed - self.speed) / self.tick.max(f64::EPSILON);
        self.speed = speed;

        self.publish(acceleration);

        Ok(())
    }

    fn reset_model(&mut self, state: &ModelState, joints: &JointConfiguration) -> EnvResult<()> {
        if state.model_name != ROVER_MODEL_NAME || joints.joint_names.len() != joints.joint_positions.len() {
            return Err(EnvError::Simulator(format!(
                "cannot reset model {:?} with {} joints and {} positions",
                state.model_name,
                joints.joint_names.len(),
                joints.joint_positions.len()
            )));
        }

        self.position = state.pose.planar();
        self.heading = state.pose.orientation.yaw();
        self.speed = 0.0;
        self.publish(0.0);

        Ok(())
    }
}
