use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, MutexGuard};

use crate::common::errors::{EnvError, EnvResult};

use super::camera::{FrameBuffer, RawImage};
use super::config::Point2;

/// Sensor streams with a readiness signal. Camera frames are handed
/// over through the hub's [`FrameBuffer`] instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SensorChannel {
    Pose,
    Scan,
    Contact,
    Imu,
}

impl SensorChannel {
    const COUNT: usize = 4;

    fn index(self) -> usize {
        match self {
            SensorChannel::Pose => 0,
            SensorChannel::Scan => 1,
            SensorChannel::Contact => 2,
            SensorChannel::Imu => 3,
        }
    }
}

/// The sensor-driven half of the episode, copied out under one lock.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorSnapshot {
    pub position: Point2,
    pub distance_travelled: f64,
    pub distance_to_checkpoint: f64,
    /// Whether the latest pose update moved the rover closer to the checkpoint.
    pub closer_to_checkpoint: bool,
    /// Bumper contact registered this episode.
    pub collision: bool,
    pub imu_average: f64,
}

#[derive(Debug)]
struct SensorState {
    checkpoint: Point2,
    position: Point2,
    distance_travelled: f64,
    distance_to_checkpoint: f64,
    closer_to_checkpoint: bool,
    collision: bool,
    ranges: Option<Vec<f32>>,
    max_lin_accel: [f64; 3],
    seq: [u64; SensorChannel::COUNT],
}

impl Default for SensorState {
    fn default() -> Self {
        Self {
            checkpoint: Point2::default(),
            position: Point2::default(),
            distance_travelled: 0.0,
            distance_to_checkpoint: 0.0,
            closer_to_checkpoint: false,
            collision: false,
            ranges: None,
            max_lin_accel: [0.0; 3],
            seq: [0; SensorChannel::COUNT],
        }
    }
}

/// Shared state written by the transport's subscriber callbacks and
/// read by the env.
///
/// Every handler bumps its channel's sequence number and wakes that
/// channel's waiters, so the env can block until something newer than
/// a given sequence has arrived instead of sleeping for a fixed time.
#[derive(Debug, Default)]
pub struct SensorHub {
    state: Mutex<SensorState>,
    signals: [Condvar; SensorChannel::COUNT],
    frames: FrameBuffer,
}

impl SensorHub {
    pub fn new() -> Self {
        Self::default()
    }

    fn publish(&self, channel: SensorChannel, mut state: MutexGuard<'_, SensorState>) {
        let idx = channel.index();
        state.seq[idx] += 1;
        drop(state);
        self.signals[idx].notify_all();
    }

    /// Odometry update.
    pub fn on_pose(&self, x: f64, y: f64) {
        let mut state = self.state.lock();
        let new_position = Point2::new(x, y);

        state.distance_travelled += state.position.distance(&new_position);

        let new_distance = new_position.distance(&state.checkpoint);
        state.closer_to_checkpoint = new_distance < state.distance_to_checkpoint;
        state.distance_to_checkpoint = new_distance;
        state.position = new_position;

        self.publish(SensorChannel::Pose, state);
    }

    /// Laser scan update, ranges in metres.
    pub fn on_scan(&self, ranges: &[f32]) {
        let mut state = self.state.lock();
        state.ranges = Some(ranges.to_vec());

        self.publish(SensorChannel::Scan, state);
    }

    /// Bumper update carrying the number of active contacts.
    pub fn on_contacts(&self, contacts: usize) {
        let mut state = self.state.lock();
        if contacts > 0 {
            state.collision = true;
        }

        self.publish(SensorChannel::Contact, state);
    }

    /// Wheel IMU update, keeps the per-axis maximum linear acceleration.
    pub fn on_imu(&self, ax: f64, ay: f64, az: f64) {
        let mut state = self.state.lock();
        for (max, v) in state.max_lin_accel.iter_mut().zip([ax, ay, az]) {
            if v > *max {
                *max = v;
            }
        }

        self.publish(SensorChannel::Imu, state);
    }

    /// Camera update. Returns false if the frame was dropped because the
    /// previous one has not been consumed yet.
    pub fn on_image(&self, frame: RawImage) -> bool {
        self.frames.offer(frame)
    }

    pub fn frames(&self) -> &FrameBuffer {
        &self.frames
    }

    /// Puts the hub back to the start-of-episode state. The last scan
    /// is discarded so the next reading comes from after the reset.
    pub fn reset(&self, checkpoint: Point2, initial_position: Point2) {
        let mut state = self.state.lock();

        state.checkpoint = checkpoint;
        state.position = initial_position;
        state.distance_travelled = 0.0;
        state.distance_to_checkpoint = initial_position.distance(&checkpoint);
        state.closer_to_checkpoint = false;
        state.collision = false;
        state.ranges = None;
        state.max_lin_accel = [0.0; 3];
    }

    /// Forgets the odometry accumulated so far, keeping the current
    /// position. Called once the rover has settled after a teleport.
    pub fn restart_odometry(&self) {
        let mut state = self.state.lock();

        state.distance_travelled = 0.0;
        state.closer_to_checkpoint = false;
        state.distance_to_checkpoint = state.position.distance(&state.checkpoint);
    }

    pub fn snapshot(&self) -> SensorSnapshot {
        let state = self.state.lock();
        let [ax, ay, az] = state.max_lin_accel;
        let imu_average = if ax > 0.0 || ay > 0.0 || az > 0.0 {
            (ax + ay + az) / 3.0
        } else {
            0.0
        };

        SensorSnapshot {
            position: state.position,
            distance_travelled: state.distance_travelled,
            distance_to_checkpoint: state.distance_to_checkpoint,
            closer_to_checkpoint: state.closer_to_checkpoint,
            collision: state.collision,
            imu_average,
        }
    }

    /// Number of updates seen so far on `channel`.
    pub fn sequence(&self, channel: SensorChannel) -> u64 {
        self.state.lock().seq[channel.index()]
    }

    /// Blocks until `channel` has moved past `after`, returning the new
    /// sequence number.
    pub fn wait_for(&self, channel: SensorChannel, after: u64, timeout: Duration) -> EnvResult<u64> {
        let idx = channel.index();
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();

        while state.seq[idx] <= after {
            if self.signals[idx].wait_until(&mut state, deadline).timed_out()
                && state.seq[idx] <= after
            {
                return Err(EnvError::SensorTimeout {
                    channel,
                    waited: timeout,
                });
            }
        }

        Ok(state.seq[idx])
    }

    /// Waits until a non-empty scan is held and reduces it to the
    /// distance of the closest obstacle.
    pub fn wait_for_scan(&self, samples: usize, max_distance: f64, timeout: Duration) -> EnvResult<f64> {
        let idx = SensorChannel::Scan.index();
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();

        loop {
            if let Some(min) = state
                .ranges
                .as_deref()
                .and_then(|r| reduce_scan(r, samples, max_distance))
            {
                return Ok(min);
            }

            if self.signals[idx].wait_until(&mut state, deadline).timed_out() {
                return state
                    .ranges
                    .as_deref()
                    .and_then(|r| reduce_scan(r, samples, max_distance))
                    .ok_or(EnvError::SensorTimeout {
                        channel: SensorChannel::Scan,
                        waited: timeout,
                    });
            }
        }
    }
}

/// Resamples a scan to `samples` evenly spaced beams by linear
/// interpolation, clamps each to `[0, max_distance]` (NaN counts as
/// `max_distance`) and returns the smallest. `None` for an empty scan.
pub fn reduce_scan(ranges: &[f32], samples: usize, max_distance: f64) -> Option<f64> {
    if ranges.is_empty() {
        return None;
    }

    let last = ranges.len() - 1;
    let step = if samples > 1 {
        last as f64 / (samples - 1) as f64
    } else {
        0.0
    };

    let closest = (0..samples.max(1))
        .map(|i| {
            let x = i as f64 * step;
            let lo = (x.floor() as usize).min(last);
            let hi = (lo + 1).min(last);
            let t = x - lo as f64;
            let a = ranges[lo] as f64;

            let v = if t == 0.0 || lo == hi {
                a
            } else {
                a + (ranges[hi] as f64 - a) * t
            };

            if v.is_nan() {
                max_distance
            } else {
                v.clamp(0.0, max_distance)
            }
        })
        .fold(max_distance, f64::min);

    Some(closest)
}
