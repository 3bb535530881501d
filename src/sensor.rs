// ==============================================================================
// sensor.rs — ACCELEROMETER DELIVERY
// ------------------------------------------------------------------------------
// Two producers feed samples into the shared InputFusion:
// - remote: the AR client streams `accel` frames (see net.rs)
// - simulated: a local task emits a slow sine tilt plus noise, so the server
//   can be exercised without a phone attached
//
// Sensor failures never reach the controller. They are logged here and the
// filter keeps whatever it last computed.
// ==============================================================================

use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, warn};

use crate::error::SensorError;
use crate::input::{AccelerationSample, InputFusion, SharedInput};

/// Apply one sensor callback result to the filter.
pub fn deliver(input: &mut InputFusion, update: Result<AccelerationSample, SensorError>) {
    match update {
        Ok(sample) => input.on_acceleration_sample(sample.x, sample.y),
        Err(SensorError::Unavailable) => {
            warn!("accelerometer unavailable; steering stays at {:.3}", input.steering_bias());
        }
        Err(err) => warn!("dropping accelerometer sample: {err}"),
    }
}

pub struct SimulatedAccelerometer {
    rng: StdRng,
    phase: f32,
    step: f32,         // radians per sample
    amplitude: f32,    // peak lateral tilt
    forward_tilt: f32, // constant x lean
    noise: f32,        // uniform noise half-width
}

impl SimulatedAccelerometer {
    pub fn new(rng: StdRng) -> Self {
        Self {
            rng,
            phase: 0.0,
            step: 0.02,
            amplitude: 0.4,
            forward_tilt: 0.25,
            noise: 0.08,
        }
    }

    pub fn from_entropy() -> Self {
        Self::new(StdRng::from_entropy())
    }

    pub fn next_sample(&mut self) -> AccelerationSample {
        self.phase = (self.phase + self.step) % std::f32::consts::TAU;
        let jitter_x = self.rng.gen_range(-self.noise..=self.noise);
        let jitter_y = self.rng.gen_range(-self.noise..=self.noise);

        AccelerationSample {
            x: (self.forward_tilt + jitter_x).clamp(-1.0, 1.0),
            y: (self.amplitude * self.phase.sin() + jitter_y).clamp(-1.0, 1.0),
        }
    }
}

/// Runs until the runtime shuts down.
pub async fn run_simulated_sensor(input: SharedInput, period: Duration) {
    let mut sensor = SimulatedAccelerometer::from_entropy();
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    debug!("simulated accelerometer running every {:?}", period);

    loop {
        ticker.tick().await;
        let sample = sensor.next_sample();
        deliver(&mut *input.lock().await, Ok(sample));
    }
}
