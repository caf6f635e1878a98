// Fixed-rate encoder polling
// Samples both encoders every tick and hands each position to a callback.
// Runs on the calling thread; the clock decides how a tick is waited out.

use std::time::Duration;

use tracing::{debug, info};

use crate::clock::Clock;
use crate::config::{EncoderChannels, Settings};
use crate::device::{DaqDevice, DeviceError};
use crate::encoder::read_position;
use crate::messages::MonitorSample;
use crate::motion::Kinematics;

pub struct Monitor {
    channels: EncoderChannels,
    kinematics: Kinematics,
    period: Duration,
}

impl Monitor {
    pub fn new(settings: &Settings) -> Self {
        Self::with_params(
            settings.encoder_channels(),
            Kinematics::new(&settings.physical_constants()),
            settings.poll_hz,
        )
    }

    /// `poll_hz` of zero is treated as 1 Hz
    pub fn with_params(channels: EncoderChannels, kinematics: Kinematics, poll_hz: u32) -> Self {
        Self {
            channels,
            kinematics,
            period: Duration::from_secs_f64(1.0 / f64::from(poll_hz.max(1))),
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Poll `samples` times (forever if `None`). Stops at the first device
    /// error. Returns the number of samples taken.
    pub fn run<D, C, F>(
        &self,
        device: &mut D,
        clock: &mut C,
        samples: Option<u64>,
        mut on_sample: F,
    ) -> Result<u64, DeviceError>
    where
        D: DaqDevice + ?Sized,
        C: Clock,
        F: FnMut(&MonitorSample),
    {
        info!(
            "Monitor started: {:?} period, {}",
            self.period,
            samples.map_or("unbounded".to_string(), |n| format!("{} samples", n))
        );

        let mut index = 0;
        while samples.is_none_or(|n| index < n) {
            let position = read_position(device, &self.channels, &self.kinematics)?;
            let sample = MonitorSample {
                index,
                elapsed_s: self.period.as_secs_f64() * index as f64,
                position,
            };
            debug!("Sample {}: dx={} dy={}", index, position.dx, position.dy);
            on_sample(&sample);
            index += 1;

            if samples.is_none_or(|n| index < n) {
                clock.sleep(self.period);
            }
        }

        info!("Monitor finished after {} samples", index);
        Ok(index)
    }
}
