// Binding to the vendor Universal Library (cbw64.dll / cbw32.dll)
//
// Each call marshals its arguments, invokes the library and turns a non-zero
// return code into a DeviceError with the library's own message for it.

use std::ffi::{CStr, c_char, c_float, c_int, c_ulong, c_ushort};

use tracing::{debug, info};

use super::{CounterConfig, DaqDevice, DeviceError, Result};

/// Length of the buffer cbGetErrMsg writes into
const ERRSTRLEN: usize = 256;

/// ±10 V bipolar range
pub const BIP10VOLTS: c_int = 1;

const DEFAULT_OPTION: c_int = 0;

#[cfg_attr(target_pointer_width = "64", link(name = "cbw64"))]
#[cfg_attr(target_pointer_width = "32", link(name = "cbw32"))]
unsafe extern "system" {
    fn cbVOut(
        board_num: c_int,
        chan: c_int,
        range: c_int,
        data_value: c_float,
        options: c_int,
    ) -> c_int;
    fn cbVIn(
        board_num: c_int,
        chan: c_int,
        range: c_int,
        data_value: *mut c_float,
        options: c_int,
    ) -> c_int;
    fn cbCIn(board_num: c_int, counter_num: c_int, count: *mut c_ushort) -> c_int;
    fn cbCIn32(board_num: c_int, counter_num: c_int, count: *mut c_ulong) -> c_int;
    fn cbCStatus(board_num: c_int, counter_num: c_int, status: *mut c_ulong) -> c_int;
    fn cbC7266Config(
        board_num: c_int,
        counter_num: c_int,
        quadrature: c_int,
        counting_mode: c_int,
        data_encoding: c_int,
        index_mode: c_int,
        invert_index: c_int,
        flag_pins: c_int,
        gating: c_int,
    ) -> c_int;
    fn cbCClear(board_num: c_int, counter_num: c_int) -> c_int;
    fn cbGetErrMsg(err_code: c_int, err_msg: *mut c_char) -> c_int;
}

/// Resolve a vendor error code to the library's message
pub fn error_message(code: i32) -> String {
    let mut buf = [0 as c_char; ERRSTRLEN];
    // SAFETY: cbGetErrMsg writes a NUL-terminated string of at most ERRSTRLEN bytes.
    let rc = unsafe { cbGetErrMsg(code, buf.as_mut_ptr()) };
    if rc != 0 {
        return format!("unknown error (lookup failed with code {})", rc);
    }
    // SAFETY: buf is NUL-terminated by the library (and zero-initialised).
    unsafe { CStr::from_ptr(buf.as_ptr()) }
        .to_string_lossy()
        .into_owned()
}

fn check(code: c_int) -> Result<()> {
    if code == 0 {
        Ok(())
    } else {
        Err(DeviceError::new(code, error_message(code)))
    }
}

/// DAQ boards driven through the vendor library. Boards are addressed by the
/// numbers assigned in the vendor's configuration utility, so there is no
/// session to open or close.
#[derive(Debug)]
pub struct MccDaq {
    range: c_int,
}

impl MccDaq {
    pub fn new() -> Self {
        Self::with_range(BIP10VOLTS)
    }

    pub fn with_range(range: i32) -> Self {
        info!("Using vendor Universal Library (range code {})", range);
        Self { range }
    }
}

impl Default for MccDaq {
    fn default() -> Self {
        Self::new()
    }
}

impl DaqDevice for MccDaq {
    fn write_voltage(&mut self, board: i32, channel: i32, volts: f64) -> Result<()> {
        debug!("cbVOut board={} chan={} volts={}", board, channel, volts);
        // SAFETY: plain value arguments.
        check(unsafe { cbVOut(board, channel, self.range, volts as c_float, DEFAULT_OPTION) })
    }

    fn read_voltage(&mut self, board: i32, channel: i32) -> Result<f64> {
        let mut value: c_float = 0.0;
        // SAFETY: value outlives the call.
        check(unsafe { cbVIn(board, channel, self.range, &mut value, DEFAULT_OPTION) })?;
        Ok(f64::from(value))
    }

    fn read_counter(&mut self, board: i32, channel: i32) -> Result<u32> {
        let mut count: c_ushort = 0;
        // SAFETY: count outlives the call.
        check(unsafe { cbCIn(board, channel, &mut count) })?;
        Ok(u32::from(count))
    }

    fn read_counter_32(&mut self, board: i32, channel: i32) -> Result<u32> {
        let mut count: c_ulong = 0;
        // SAFETY: count outlives the call.
        check(unsafe { cbCIn32(board, channel, &mut count) })?;
        Ok(count as u32)
    }

    fn counter_status(&mut self, board: i32, channel: i32) -> Result<u32> {
        let mut status: c_ulong = 0;
        // SAFETY: status outlives the call.
        check(unsafe { cbCStatus(board, channel, &mut status) })?;
        Ok(status as u32)
    }

    fn configure_counter(
        &mut self,
        board: i32,
        channel: i32,
        config: &CounterConfig,
    ) -> Result<()> {
        debug!("cbC7266Config board={} chan={} {:?}", board, channel, config);
        // SAFETY: plain value arguments.
        check(unsafe {
            cbC7266Config(
                board,
                channel,
                config.quadrature,
                config.counting_mode,
                config.data_encoding,
                config.index_mode,
                config.invert_index,
                config.flag_pins,
                config.gating,
            )
        })
    }

    fn clear_counter(&mut self, board: i32, channel: i32) -> Result<()> {
        // SAFETY: plain value arguments.
        check(unsafe { cbCClear(board, channel) })
    }
}
