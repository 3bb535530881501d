// ==============================================================================
// input.rs — INPUT FUSION (ACCELEROMETER + TOUCH -> CONTROL STATE)
// ------------------------------------------------------------------------------
// Turns raw device input into the two signals the vehicle controller reads:
// - steering bias: one-pole low-pass of the accelerometer, sign-flipped by
//   the forward/backward tilt (filtered x)
// - drive command: exact lookup on the number of fingers currently down
//
// InputFusion is plain data. The server shares it as `SharedInput`
// (Arc<Mutex<_>>) between connection tasks, the simulated sensor and the
// tick loop; the tick loop reads it through `snapshot()` in one lock.
// ==============================================================================

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

/// Weight of the newest sample in the one-pole filter.
pub const SMOOTHING_FACTOR: f32 = 0.5;

pub const DRIVE_ENGINE_FORCE: f32 = 50.0;
pub const BRAKE_FORCE: f32 = 100.0;

pub type SharedInput = Arc<Mutex<InputFusion>>;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AccelerationSample {
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FilterState {
    pub filtered_x: f32,
    pub filtered_y: f32,
}

#[inline]
pub fn low_pass(current: f32, updated: f32) -> f32 {
    updated * SMOOTHING_FACTOR + current * (1.0 - SMOOTHING_FACTOR)
}

/// Steering direction depends on which way the device leans forward/back.
#[inline]
pub fn steering_bias(filter: FilterState) -> f32 {
    if filter.filtered_x > 0.0 {
        -filter.filtered_y
    } else {
        filter.filtered_y
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DriveCommand {
    Idle,
    DriveForward,
    DriveReverse,
    Brake,
}

impl DriveCommand {
    /// Exact table, not a range: anything other than 1..=3 fingers is Idle.
    pub fn from_touch_count(touch_count: u32) -> Self {
        match touch_count {
            1 => DriveCommand::DriveForward,
            2 => DriveCommand::DriveReverse,
            3 => DriveCommand::Brake,
            _ => DriveCommand::Idle,
        }
    }

    pub fn engine_force(self) -> f32 {
        match self {
            DriveCommand::DriveForward => DRIVE_ENGINE_FORCE,
            DriveCommand::DriveReverse => -DRIVE_ENGINE_FORCE,
            DriveCommand::Brake | DriveCommand::Idle => 0.0,
        }
    }

    pub fn braking_force(self) -> f32 {
        match self {
            DriveCommand::Brake => BRAKE_FORCE,
            _ => 0.0,
        }
    }
}

/// What the controller sees on a physics tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ControlSnapshot {
    pub steering_bias: f32,
    pub command: DriveCommand,
}

impl Default for ControlSnapshot {
    fn default() -> Self {
        Self {
            steering_bias: 0.0,
            command: DriveCommand::Idle,
        }
    }
}

#[derive(Debug, Default)]
pub struct InputFusion {
    filter: FilterState,
    steering_bias: f32,
    touch_count: u32,
}

impl InputFusion {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedInput {
        Arc::new(Mutex::new(Self::new()))
    }

    pub fn on_acceleration_sample(&mut self, x: f32, y: f32) {
        self.filter.filtered_y = low_pass(self.filter.filtered_y, y);
        self.filter.filtered_x = low_pass(self.filter.filtered_x, x);
        self.steering_bias = steering_bias(self.filter);
    }

    pub fn on_touch_begin(&mut self, count: u32) {
        // Never clamped: extra fingers drift the count into Idle territory.
        self.touch_count = self.touch_count.saturating_add(count);
    }

    /// Any finger lifting clears the whole count.
    pub fn on_touch_end(&mut self) {
        self.touch_count = 0;
    }

    pub fn current_drive_command(&self) -> DriveCommand {
        DriveCommand::from_touch_count(self.touch_count)
    }

    pub fn steering_bias(&self) -> f32 {
        self.steering_bias
    }

    #[cfg(test)]
    pub fn filter_state(&self) -> FilterState {
        self.filter
    }

    #[cfg(test)]
    pub fn touch_count(&self) -> u32 {
        self.touch_count
    }

    pub fn snapshot(&self) -> ControlSnapshot {
        ControlSnapshot {
            steering_bias: self.steering_bias,
            command: self.current_drive_command(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn filter_halves_towards_each_sample() {
        let mut input = InputFusion::new();

        input.on_acceleration_sample(1.0, 0.0);
        assert_relative_eq!(input.filter_state().filtered_y, 0.0);
        assert_relative_eq!(input.filter_state().filtered_x, 0.5);

        input.on_acceleration_sample(0.0, 1.0);
        assert_relative_eq!(input.filter_state().filtered_y, 0.5);
        assert_relative_eq!(input.filter_state().filtered_x, 0.25);

        input.on_acceleration_sample(0.0, 0.0);
        assert_relative_eq!(input.filter_state().filtered_y, 0.25);
        assert_relative_eq!(input.filter_state().filtered_x, 0.125);
    }

    #[test]
    fn filter_is_linear_in_previous_value() {
        let samples = [(0.3, -0.7), (-0.9, 0.2), (0.05, 0.95), (1.0, -1.0)];
        let mut input = InputFusion::new();

        for (x, y) in samples {
            let prev = input.filter_state();
            input.on_acceleration_sample(x, y);
            let next = input.filter_state();
            assert_relative_eq!(next.filtered_x, 0.5 * x + 0.5 * prev.filtered_x);
            assert_relative_eq!(next.filtered_y, 0.5 * y + 0.5 * prev.filtered_y);
        }
    }

    #[test]
    fn steering_sign_follows_forward_tilt() {
        let forward = FilterState { filtered_x: 0.2, filtered_y: 0.3 };
        let backward = FilterState { filtered_x: -0.1, filtered_y: 0.3 };
        let level = FilterState { filtered_x: 0.0, filtered_y: 0.3 };

        assert_relative_eq!(steering_bias(forward), -0.3);
        assert_relative_eq!(steering_bias(backward), 0.3);
        assert_relative_eq!(steering_bias(level), 0.3);
    }

    #[test]
    fn bias_is_recomputed_on_every_sample() {
        let mut input = InputFusion::new();
        input.on_acceleration_sample(0.4, 0.6);
        // filtered = (0.2, 0.3)
        assert_relative_eq!(input.steering_bias(), -0.3);

        input.on_acceleration_sample(-0.6, 0.3);
        // filtered = (-0.2, 0.3)
        assert_relative_eq!(input.steering_bias(), 0.3);
    }

    #[test]
    fn no_samples_means_zero_bias() {
        let input = InputFusion::new();
        assert_eq!(input.steering_bias(), 0.0);
        assert_eq!(input.snapshot(), ControlSnapshot::default());
    }

    #[test]
    fn drive_table_is_exact() {
        let expected = [
            DriveCommand::Idle,
            DriveCommand::DriveForward,
            DriveCommand::DriveReverse,
            DriveCommand::Brake,
            DriveCommand::Idle,
            DriveCommand::Idle,
        ];
        for (count, command) in expected.into_iter().enumerate() {
            assert_eq!(DriveCommand::from_touch_count(count as u32), command, "count {count}");
        }
        assert_eq!(DriveCommand::from_touch_count(u32::MAX), DriveCommand::Idle);
    }

    #[test]
    fn command_forces() {
        assert_eq!(DriveCommand::DriveForward.engine_force(), 50.0);
        assert_eq!(DriveCommand::DriveReverse.engine_force(), -50.0);
        assert_eq!(DriveCommand::Brake.engine_force(), 0.0);
        assert_eq!(DriveCommand::Brake.braking_force(), 100.0);
        assert_eq!(DriveCommand::Idle.engine_force(), 0.0);
        assert_eq!(DriveCommand::Idle.braking_force(), 0.0);
        assert_eq!(DriveCommand::DriveForward.braking_force(), 0.0);
    }

    #[test]
    fn touches_accumulate_until_end() {
        let mut input = InputFusion::new();
        input.on_touch_begin(2);
        input.on_touch_begin(1);
        assert_eq!(input.touch_count(), 3);
        assert_eq!(input.current_drive_command(), DriveCommand::Brake);

        input.on_touch_begin(4);
        assert_eq!(input.touch_count(), 7);
        assert_eq!(input.current_drive_command(), DriveCommand::Idle);

        input.on_touch_end();
        assert_eq!(input.touch_count(), 0);
        assert_eq!(input.current_drive_command(), DriveCommand::Idle);
    }

    #[test]
    fn touch_count_saturates_instead_of_overflowing() {
        let mut input = InputFusion::new();
        input.on_touch_begin(u32::MAX);
        input.on_touch_begin(5);
        assert_eq!(input.touch_count(), u32::MAX);
        assert_eq!(input.current_drive_command(), DriveCommand::Idle);
    }

    #[test]
    fn reading_the_command_does_not_clear_touches() {
        let mut input = InputFusion::new();
        input.on_touch_begin(1);
        assert_eq!(input.snapshot().command, DriveCommand::DriveForward);
        assert_eq!(input.snapshot().command, DriveCommand::DriveForward);
        assert_eq!(input.touch_count(), 1);
    }

    #[tokio::test]
    async fn shared_input_snapshot_sees_concurrent_writers() {
        let shared = InputFusion::shared();

        let sensor = {
            let shared = Arc::clone(&shared);
            tokio::spawn(async move {
                for _ in 0..32 {
                    shared.lock().await.on_acceleration_sample(1.0, 1.0);
                }
            })
        };
        let touch = {
            let shared = Arc::clone(&shared);
            tokio::spawn(async move {
                shared.lock().await.on_touch_begin(2);
            })
        };
        sensor.await.unwrap();
        touch.await.unwrap();

        let snapshot = shared.lock().await.snapshot();
        assert_eq!(snapshot.command, DriveCommand::DriveReverse);
        assert!(snapshot.steering_bias < -0.99);
    }
}
