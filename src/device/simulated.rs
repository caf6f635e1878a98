// In-memory DAQ device
//
// Records every successful call in order so tests (and `--simulate` runs) can
// inspect exactly what would have been sent to the hardware. Counter and
// analog input values are set by the caller; nothing is derived from the
// commanded voltages.

use std::collections::HashMap;

use tracing::debug;

use super::{CounterConfig, DaqDevice, DeviceError, Result};

/// Vendor code used for injected failures (the Universal Library's
/// "board not responding" class of errors)
pub const SIMULATED_FAILURE_CODE: i32 = 1001;

/// One recorded device call
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCall {
    WriteVoltage { board: i32, channel: i32, volts: f64 },
    ReadVoltage { board: i32, channel: i32 },
    ReadCounter { board: i32, channel: i32 },
    CounterStatus { board: i32, channel: i32 },
    ConfigureCounter { board: i32, channel: i32, config: CounterConfig },
    ClearCounter { board: i32, channel: i32 },
}

#[derive(Debug, Default)]
pub struct SimulatedDaq {
    calls: Vec<DeviceCall>,
    counters: HashMap<(i32, i32), u32>,
    analog_inputs: HashMap<(i32, i32), f64>,
    /// Number of voltage writes attempted so far, including failed ones
    write_attempts: usize,
    /// 1-based indices of the voltage writes that should fail
    fail_writes_at: Vec<usize>,
}

impl SimulatedDaq {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the `n`-th voltage write (1-based, counted from now on) fail.
    /// Calls accumulate, so several writes can be set to fail.
    pub fn fail_on_write(&mut self, n: usize) {
        self.fail_writes_at.push(self.write_attempts + n);
    }

    pub fn set_counter(&mut self, board: i32, channel: i32, count: u32) {
        self.counters.insert((board, channel), count);
    }

    pub fn set_analog_input(&mut self, board: i32, channel: i32, volts: f64) {
        self.analog_inputs.insert((board, channel), volts);
    }

    /// All successful calls, oldest first
    pub fn calls(&self) -> &[DeviceCall] {
        &self.calls
    }

    /// Successful voltage writes as `(board, channel, volts)`
    pub fn voltage_writes(&self) -> Vec<(i32, i32, f64)> {
        self.calls
            .iter()
            .filter_map(|call| match *call {
                DeviceCall::WriteVoltage {
                    board,
                    channel,
                    volts,
                } => Some((board, channel, volts)),
                _ => None,
            })
            .collect()
    }

    /// Last voltage written to a channel, if any
    pub fn last_voltage(&self, board: i32, channel: i32) -> Option<f64> {
        self.voltage_writes()
            .into_iter()
            .rev()
            .find(|&(b, c, _)| b == board && c == channel)
            .map(|(_, _, volts)| volts)
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }
}

impl DaqDevice for SimulatedDaq {
    fn write_voltage(&mut self, board: i32, channel: i32, volts: f64) -> Result<()> {
        self.write_attempts += 1;
        if self.fail_writes_at.contains(&self.write_attempts) {
            return Err(DeviceError::new(
                SIMULATED_FAILURE_CODE,
                format!("Simulated failure on voltage write #{}", self.write_attempts),
            ));
        }
        debug!("sim: board {} channel {} <- {} V", board, channel, volts);
        self.calls.push(DeviceCall::WriteVoltage {
            board,
            channel,
            volts,
        });
        Ok(())
    }

    fn read_voltage(&mut self, board: i32, channel: i32) -> Result<f64> {
        self.calls.push(DeviceCall::ReadVoltage { board, channel });
        Ok(self
            .analog_inputs
            .get(&(board, channel))
            .copied()
            .unwrap_or(0.0))
    }

    fn read_counter(&mut self, board: i32, channel: i32) -> Result<u32> {
        // 16-bit read truncates like the real register
        Ok(self.read_counter_32(board, channel)? & 0xFFFF)
    }

    fn read_counter_32(&mut self, board: i32, channel: i32) -> Result<u32> {
        self.calls.push(DeviceCall::ReadCounter { board, channel });
        Ok(self.counters.get(&(board, channel)).copied().unwrap_or(0))
    }

    fn counter_status(&mut self, board: i32, channel: i32) -> Result<u32> {
        self.calls.push(DeviceCall::CounterStatus { board, channel });
        Ok(0)
    }

    fn configure_counter(
        &mut self,
        board: i32,
        channel: i32,
        config: &CounterConfig,
    ) -> Result<()> {
        self.calls.push(DeviceCall::ConfigureCounter {
            board,
            channel,
            config: *config,
        });
        Ok(())
    }

    fn clear_counter(&mut self, board: i32, channel: i32) -> Result<()> {
        self.calls.push(DeviceCall::ClearCounter { board, channel });
        self.counters.insert((board, channel), 0);
        Ok(())
    }
}
