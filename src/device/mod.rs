// Data-acquisition device interface
//
// Provides:
// - The capability set the rig needs from its DAQ boards (analog out/in,
//   quadrature counters)
// - An in-memory simulated device for tests and dry runs
// - (feature `mcc`) the binding to the vendor Universal Library

#[cfg(all(feature = "mcc", windows))]
pub mod mcc;
pub mod simulated;

#[cfg(all(feature = "mcc", windows))]
pub use mcc::MccDaq;
pub use simulated::{DeviceCall, SimulatedDaq};

/// Error reported by the device driver: the vendor error code plus the
/// message the driver resolves for it.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("Error {code}: {message}")]
pub struct DeviceError {
    pub code: i32,
    pub message: String,
}

impl DeviceError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DeviceError>;

/// Quadrature counter setup for an LS7266-style encoder channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterConfig {
    /// 0 = non-quadrature, 1/2/4 = x1/x2/x4 quadrature
    pub quadrature: i32,
    pub counting_mode: i32,
    pub data_encoding: i32,
    pub index_mode: i32,
    pub invert_index: i32,
    pub flag_pins: i32,
    pub gating: i32,
}

impl CounterConfig {
    /// The setup the rig uses for both motor encoders: x4 quadrature,
    /// normal counting, binary encoding, carry/borrow on the flag pins.
    pub const fn rig_encoder() -> Self {
        Self {
            quadrature: 4,
            counting_mode: 0,
            data_encoding: 2,
            index_mode: 0,
            invert_index: 0,
            flag_pins: 1,
            gating: 0,
        }
    }
}

impl Default for CounterConfig {
    fn default() -> Self {
        Self::rig_encoder()
    }
}

/// Everything the positioner asks of its DAQ hardware.
///
/// Every call is blocking and may fail with a [`DeviceError`]. Nothing here
/// retries.
pub trait DaqDevice {
    /// Write an analog output voltage (engineering volts)
    fn write_voltage(&mut self, board: i32, channel: i32, volts: f64) -> Result<()>;

    /// Read an analog input voltage (engineering volts)
    fn read_voltage(&mut self, board: i32, channel: i32) -> Result<f64>;

    /// Read a counter as a 16-bit unsigned value (0..=65535)
    fn read_counter(&mut self, board: i32, channel: i32) -> Result<u32>;

    /// Read a counter as a full 32-bit value
    fn read_counter_32(&mut self, board: i32, channel: i32) -> Result<u32>;

    /// Read the counter status register
    fn counter_status(&mut self, board: i32, channel: i32) -> Result<u32>;

    fn configure_counter(&mut self, board: i32, channel: i32, config: &CounterConfig)
    -> Result<()>;

    /// Reset a counter to zero
    fn clear_counter(&mut self, board: i32, channel: i32) -> Result<()>;
}

impl<T: DaqDevice + ?Sized> DaqDevice for Box<T> {
    fn write_voltage(&mut self, board: i32, channel: i32, volts: f64) -> Result<()> {
        (**self).write_voltage(board, channel, volts)
    }

    fn read_voltage(&mut self, board: i32, channel: i32) -> Result<f64> {
        (**self).read_voltage(board, channel)
    }

    fn read_counter(&mut self, board: i32, channel: i32) -> Result<u32> {
        (**self).read_counter(board, channel)
    }

    fn read_counter_32(&mut self, board: i32, channel: i32) -> Result<u32> {
        (**self).read_counter_32(board, channel)
    }

    fn counter_status(&mut self, board: i32, channel: i32) -> Result<u32> {
        (**self).counter_status(board, channel)
    }

    fn configure_counter(
        &mut self,
        board: i32,
        channel: i32,
        config: &CounterConfig,
    ) -> Result<()> {
        (**self).configure_counter(board, channel, config)
    }

    fn clear_counter(&mut self, board: i32, channel: i32) -> Result<()> {
        (**self).clear_counter(board, channel)
    }
}
