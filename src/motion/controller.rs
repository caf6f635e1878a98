// Open-loop motion primitives for the H-frame rig
//
// Every primitive first stops both motors, records the voltages it is about
// to command and then writes them. Nothing is read back: the tracked speeds
// are the last commanded voltages, not measured ones.

use std::ops::{Deref, DerefMut};
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::config::MotorChannels;
use crate::device::{DaqDevice, DeviceError};

/// Nominal side length of the square gesture
pub const SQUARE_SIDE: f64 = 1.5;

/// Errors raised by motion commands
#[derive(Debug, thiserror::Error)]
pub enum MotionError {
    #[error("Device error: {0}")]
    Device(#[from] DeviceError),

    #[error("Cannot derive a leg duration from {voltage} V")]
    InvalidLegDuration { voltage: f64 },
}

/// Last commanded voltage per motor
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct MotorSpeedState {
    pub speed_1: f64,
    pub speed_2: f64,
    /// Reserved for feedback integration, never set by the primitives
    pub cur_pos_1: Option<f64>,
    pub cur_pos_2: Option<f64>,
}

/// One of the two drive motors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Motor {
    One,
    Two,
}

/// Directions of the primitive gestures. Cardinal moves drive both motors,
/// diagonal moves drive a single one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    PosX,
    NegX,
    PosY,
    NegY,
    NorthEast,
    SouthEast,
    NorthWest,
    SouthWest,
}

impl Direction {
    pub const ALL: [Direction; 8] = [
        Direction::PosX,
        Direction::NegX,
        Direction::PosY,
        Direction::NegY,
        Direction::NorthEast,
        Direction::SouthEast,
        Direction::NorthWest,
        Direction::SouthWest,
    ];
}

/// What a direction writes to the hardware
#[derive(Debug, Clone, Copy, PartialEq)]
enum Drive {
    /// Signs applied to (motor 1, motor 2)
    Both(f64, f64),
    /// Signed write to one motor only
    Single(Motor, f64),
}

fn drive_for(direction: Direction) -> Drive {
    match direction {
        Direction::PosX => Drive::Both(-1.0, 1.0),
        Direction::NegX => Drive::Both(1.0, -1.0),
        Direction::PosY => Drive::Both(1.0, 1.0),
        Direction::NegY => Drive::Both(-1.0, -1.0),
        Direction::NorthEast => Drive::Single(Motor::Two, 1.0),
        Direction::SouthEast => Drive::Single(Motor::One, 1.0),
        Direction::NorthWest => Drive::Single(Motor::One, -1.0),
        Direction::SouthWest => Drive::Single(Motor::Two, -1.0),
    }
}

/// `|sensor_reading / 10| * base_voltage`
pub fn scaled_voltage(sensor_reading: f64, base_voltage: f64) -> f64 {
    (sensor_reading / 10.0).abs() * base_voltage
}

/// `distance / voltage` as a blocking delay
fn leg_duration(distance: f64, voltage: f64) -> Result<Duration, MotionError> {
    let secs = distance / voltage;
    if !(secs.is_finite() && secs > 0.0) {
        return Err(MotionError::InvalidLegDuration { voltage });
    }
    Duration::try_from_secs_f64(secs).map_err(|_| MotionError::InvalidLegDuration { voltage })
}

/// Open-loop controller for one rig: owns the device, the clock and the
/// tracked speeds.
///
/// Voltages are passed through as given. Keeping them within
/// `voltage_allowable` is the caller's job.
pub struct MotorController<D: DaqDevice, C: Clock> {
    device: D,
    clock: C,
    channels: MotorChannels,
    state: MotorSpeedState,
}

impl<D: DaqDevice, C: Clock> MotorController<D, C> {
    pub fn new(device: D, clock: C, channels: MotorChannels) -> Self {
        Self {
            device,
            clock,
            channels,
            state: MotorSpeedState::default(),
        }
    }

    pub fn state(&self) -> &MotorSpeedState {
        &self.state
    }

    pub fn channels(&self) -> MotorChannels {
        self.channels
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn into_parts(self) -> (D, C) {
        (self.device, self.clock)
    }

    fn write(&mut self, motor: Motor, volts: f64) -> Result<(), DeviceError> {
        let channel = match motor {
            Motor::One => self.channels.motor_1,
            Motor::Two => self.channels.motor_2,
        };
        debug!("Motor {:?} (channel {}) <- {} V", motor, channel, volts);
        self.device
            .write_voltage(self.channels.board, channel, volts)
    }

    /// Zero both tracked speeds and write 0 V to both motors
    pub fn stop_motors(&mut self) -> Result<(), DeviceError> {
        self.state.speed_1 = 0.0;
        self.state.speed_2 = 0.0;
        self.write(Motor::One, 0.0)?;
        self.write(Motor::Two, 0.0)
    }

    /// Stop, then drive in `direction` at `voltage`
    pub fn move_direction(&mut self, direction: Direction, voltage: f64) -> Result<(), DeviceError> {
        self.stop_motors()?;
        debug!("Moving {:?} at {} V", direction, voltage);
        match drive_for(direction) {
            Drive::Both(sign_1, sign_2) => {
                let (v1, v2) = (sign_1 * voltage, sign_2 * voltage);
                self.state.speed_1 = v1;
                self.state.speed_2 = v2;
                self.write(Motor::One, v1)?;
                self.write(Motor::Two, v2)
            }
            Drive::Single(motor, sign) => {
                // Only speed_1 is tracked for diagonals, whichever motor turns
                self.state.speed_1 = voltage;
                self.state.speed_2 = 0.0;
                self.write(motor, sign * voltage)
            }
        }
    }

    pub fn move_pos_x(&mut self, voltage: f64) -> Result<(), DeviceError> {
        self.move_direction(Direction::PosX, voltage)
    }

    pub fn move_neg_x(&mut self, voltage: f64) -> Result<(), DeviceError> {
        self.move_direction(Direction::NegX, voltage)
    }

    pub fn move_pos_y(&mut self, voltage: f64) -> Result<(), DeviceError> {
        self.move_direction(Direction::PosY, voltage)
    }

    pub fn move_neg_y(&mut self, voltage: f64) -> Result<(), DeviceError> {
        self.move_direction(Direction::NegY, voltage)
    }

    /// Counter-clockwise rotation of motor 2
    pub fn move_ne(&mut self, voltage: f64) -> Result<(), DeviceError> {
        self.move_direction(Direction::NorthEast, voltage)
    }

    /// Counter-clockwise rotation of motor 1
    pub fn move_se(&mut self, voltage: f64) -> Result<(), DeviceError> {
        self.move_direction(Direction::SouthEast, voltage)
    }

    /// Clockwise rotation of motor 1
    pub fn move_nw(&mut self, voltage: f64) -> Result<(), DeviceError> {
        self.move_direction(Direction::NorthWest, voltage)
    }

    /// Clockwise rotation of motor 2
    pub fn move_sw(&mut self, voltage: f64) -> Result<(), DeviceError> {
        self.move_direction(Direction::SouthWest, voltage)
    }

    /// Write `|sensor_reading / 10| * base_voltage` to both motors.
    ///
    /// Tracked speeds are left alone. Returns the voltage written.
    pub fn scale_voltage_by_sensor(
        &mut self,
        sensor_reading: f64,
        base_voltage: f64,
    ) -> Result<f64, DeviceError> {
        let v_out = scaled_voltage(sensor_reading, base_voltage);
        debug!("Sensor {} scales {} V to {} V", sensor_reading, base_voltage, v_out);
        self.write(Motor::One, v_out)?;
        self.write(Motor::Two, v_out)?;
        Ok(v_out)
    }

    /// Scale the last commanded motor 1 speed by a sensor reading
    pub fn adjust_speed(&mut self, sensor_reading: f64) -> Result<f64, DeviceError> {
        let base = self.state.speed_1;
        self.scale_voltage_by_sensor(sensor_reading, base)
    }

    /// Trace a square: -X, -Y, +X, +Y, one side length per leg
    pub fn draw_square(&mut self, voltage: f64) -> Result<(), MotionError> {
        let leg = leg_duration(SQUARE_SIDE, voltage)?;
        info!("Drawing square at {} V ({:?} per leg)", voltage, leg);
        self.run_legs(
            &[
                Direction::NegX,
                Direction::NegY,
                Direction::PosX,
                Direction::PosY,
            ],
            voltage,
            leg,
        )
    }

    /// Trace a diamond: SW, NW, NE, SE, one square diagonal per leg
    pub fn draw_diamond(&mut self, voltage: f64) -> Result<(), MotionError> {
        let diagonal = (2.0 * SQUARE_SIDE.powi(2)).sqrt();
        let leg = leg_duration(diagonal, voltage)?;
        info!("Drawing diamond at {} V ({:?} per leg)", voltage, leg);
        self.run_legs(
            &[
                Direction::SouthWest,
                Direction::NorthWest,
                Direction::NorthEast,
                Direction::SouthEast,
            ],
            voltage,
            leg,
        )
    }

    /// Run each leg for `leg`, then stop. The motors are stopped on every
    /// exit path; on failure the original error is returned.
    fn run_legs(
        &mut self,
        legs: &[Direction],
        voltage: f64,
        leg: Duration,
    ) -> Result<(), MotionError> {
        let mut guard = StopOnExit::new(self);
        guard.stop_motors()?;
        for (i, &direction) in legs.iter().enumerate() {
            debug!("Leg {}/{}: {:?}", i + 1, legs.len(), direction);
            guard.move_direction(direction, voltage)?;
            guard.clock.sleep(leg);
        }
        guard.finish()?;
        info!("Gesture complete");
        Ok(())
    }
}

/// Stops the motors when dropped unless `finish` ran
struct StopOnExit<'a, D: DaqDevice, C: Clock> {
    controller: &'a mut MotorController<D, C>,
    armed: bool,
}

impl<'a, D: DaqDevice, C: Clock> StopOnExit<'a, D, C> {
    fn new(controller: &'a mut MotorController<D, C>) -> Self {
        Self {
            controller,
            armed: true,
        }
    }

    /// Nominal terminal stop; its error is returned to the caller
    fn finish(mut self) -> Result<(), DeviceError> {
        self.armed = false;
        self.controller.stop_motors()
    }
}

impl<D: DaqDevice, C: Clock> Deref for StopOnExit<'_, D, C> {
    type Target = MotorController<D, C>;

    fn deref(&self) -> &Self::Target {
        self.controller
    }
}

impl<D: DaqDevice, C: Clock> DerefMut for StopOnExit<'_, D, C> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.controller
    }
}

impl<D: DaqDevice, C: Clock> Drop for StopOnExit<'_, D, C> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        warn!("Gesture aborted, stopping motors");
        if let Err(e) = self.controller.stop_motors() {
            warn!("Failed to stop motors after abort: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::VirtualClock;
    use crate::device::SimulatedDaq;
    use crate::device::simulated::SIMULATED_FAILURE_CODE;

    const BOARD: i32 = 1;
    const M1: i32 = 0;
    const M2: i32 = 1;

    fn controller() -> MotorController<SimulatedDaq, VirtualClock> {
        MotorController::new(
            SimulatedDaq::new(),
            VirtualClock::new(),
            MotorChannels {
                board: BOARD,
                motor_1: M1,
                motor_2: M2,
            },
        )
    }

    fn writes(c: &MotorController<SimulatedDaq, VirtualClock>) -> Vec<(i32, f64)> {
        c.device()
            .voltage_writes()
            .into_iter()
            .map(|(board, channel, volts)| {
                assert_eq!(board, BOARD);
                (channel, volts)
            })
            .collect()
    }

    /// Writes with the zero-voltage stop pairs removed
    fn drive_writes(c: &MotorController<SimulatedDaq, VirtualClock>) -> Vec<(i32, f64)> {
        writes(c).into_iter().filter(|&(_, v)| v != 0.0).collect()
    }

    #[test]
    fn test_starts_stopped() {
        let c = controller();
        assert_eq!(*c.state(), MotorSpeedState::default());
        assert!(c.state().cur_pos_1.is_none() && c.state().cur_pos_2.is_none());
    }

    #[test]
    fn test_stop_motors() {
        let mut c = controller();
        c.move_pos_y(2.0).unwrap();
        c.device_mut().clear_calls();

        c.stop_motors().unwrap();
        assert_eq!(c.state().speed_1, 0.0);
        assert_eq!(c.state().speed_2, 0.0);
        assert_eq!(writes(&c), vec![(M1, 0.0), (M2, 0.0)]);
    }

    #[test]
    fn test_cardinal_sign_table() {
        let v = 2.5;
        let cases = [
            (Direction::PosX, -v, v),
            (Direction::NegX, v, -v),
            (Direction::PosY, v, v),
            (Direction::NegY, -v, -v),
        ];
        for (direction, s1, s2) in cases {
            let mut c = controller();
            c.move_direction(direction, v).unwrap();
            assert_eq!((c.state().speed_1, c.state().speed_2), (s1, s2), "{:?}", direction);
            assert_eq!(
                writes(&c),
                vec![(M1, 0.0), (M2, 0.0), (M1, s1), (M2, s2)],
                "{:?}",
                direction
            );
        }
    }

    #[test]
    fn test_diagonal_table() {
        let v = 1.5;
        let cases = [
            (Direction::NorthEast, M2, v),
            (Direction::SouthEast, M1, v),
            (Direction::NorthWest, M1, -v),
            (Direction::SouthWest, M2, -v),
        ];
        for (direction, channel, volts) in cases {
            let mut c = controller();
            c.move_direction(direction, v).unwrap();
            // speed_1 carries the magnitude whichever motor is driven
            assert_eq!((c.state().speed_1, c.state().speed_2), (v, 0.0), "{:?}", direction);
            assert_eq!(
                writes(&c),
                vec![(M1, 0.0), (M2, 0.0), (channel, volts)],
                "{:?}",
                direction
            );
        }
    }

    #[test]
    fn test_named_primitives_match_directions() {
        let mut c = controller();
        c.move_pos_x(1.0).unwrap();
        c.move_neg_x(1.0).unwrap();
        c.move_pos_y(1.0).unwrap();
        c.move_neg_y(1.0).unwrap();
        c.move_ne(1.0).unwrap();
        c.move_se(1.0).unwrap();
        c.move_nw(1.0).unwrap();
        c.move_sw(1.0).unwrap();
        let named = writes(&c);

        let mut d = controller();
        for direction in Direction::ALL {
            d.move_direction(direction, 1.0).unwrap();
        }
        assert_eq!(named, writes(&d));
    }

    #[test]
    fn test_stop_happens_before_new_speeds() {
        let v = 3.0;
        let mut c = controller();
        c.move_pos_x(v).unwrap();
        assert_eq!((c.state().speed_1, c.state().speed_2), (-v, v));
        c.move_neg_x(v).unwrap();
        assert_eq!((c.state().speed_1, c.state().speed_2), (v, -v));

        assert_eq!(
            writes(&c),
            vec![
                (M1, 0.0),
                (M2, 0.0),
                (M1, -v),
                (M2, v),
                // defensive stop from move_neg_x
                (M1, 0.0),
                (M2, 0.0),
                (M1, v),
                (M2, -v),
            ]
        );
    }

    #[test]
    fn test_voltage_not_clamped() {
        let mut c = controller();
        c.move_pos_y(42.0).unwrap();
        assert_eq!(c.device().last_voltage(BOARD, M1), Some(42.0));
    }

    #[test]
    fn test_draw_square() {
        let mut c = controller();
        c.draw_square(2.0).unwrap();

        let sleeps = c.clock().sleeps();
        assert_eq!(sleeps.len(), 4);
        assert!(sleeps.iter().all(|&d| d == Duration::from_secs_f64(0.75)));

        // leading stop, 4 legs of (stop + drive), terminal stop
        assert_eq!(writes(&c).len(), 2 + 4 * 4 + 2);
        assert_eq!(
            drive_writes(&c),
            vec![
                (M1, 2.0),
                (M2, -2.0),
                (M1, -2.0),
                (M2, -2.0),
                (M1, -2.0),
                (M2, 2.0),
                (M1, 2.0),
                (M2, 2.0),
            ]
        );
        assert_eq!(&writes(&c)[writes(&c).len() - 2..], &[(M1, 0.0), (M2, 0.0)]);
        assert_eq!(*c.state(), MotorSpeedState::default());
    }

    #[test]
    fn test_draw_diamond() {
        let mut c = controller();
        c.draw_diamond(1.5).unwrap();

        let expected = (2.0f64 * 1.5 * 1.5).sqrt() / 1.5;
        let sleeps = c.clock().sleeps();
        assert_eq!(sleeps.len(), 4);
        for d in sleeps {
            assert!((d.as_secs_f64() - expected).abs() < 1e-9);
        }

        assert_eq!(
            drive_writes(&c),
            vec![(M2, -1.5), (M1, -1.5), (M2, 1.5), (M1, 1.5)]
        );
        assert_eq!(writes(&c).len(), 2 + 4 * 3 + 2);
        assert_eq!(*c.state(), MotorSpeedState::default());
    }

    #[test]
    fn test_square_error_on_third_write_aborts() {
        let mut c = controller();
        c.device_mut().fail_on_write(3);

        let err = c.draw_square(2.0).unwrap_err();
        match err {
            MotionError::Device(e) => assert_eq!(e.code, SIMULATED_FAILURE_CODE),
            other => panic!("unexpected error: {:?}", other),
        }

        // no leg ever started driving and nothing slept
        assert!(c.clock().sleeps().is_empty());
        assert!(drive_writes(&c).is_empty());
        // leading stop, then the abort stop
        assert_eq!(writes(&c), vec![(M1, 0.0), (M2, 0.0), (M1, 0.0), (M2, 0.0)]);
        assert_eq!(*c.state(), MotorSpeedState::default());
    }

    #[test]
    fn test_square_error_mid_leg_skips_remaining_legs() {
        let mut c = controller();
        // 1-2 leading stop, 3-6 first leg, 7-8 second leg's stop, 9 is its drive
        c.device_mut().fail_on_write(9);

        assert!(matches!(c.draw_square(2.0), Err(MotionError::Device(_))));
        assert_eq!(c.clock().sleeps().len(), 1);
        // only the first leg drove; pos_x and pos_y never ran
        assert_eq!(drive_writes(&c), vec![(M1, 2.0), (M2, -2.0)]);
        // the abort stop is the last thing written
        let all = writes(&c);
        assert_eq!(&all[all.len() - 2..], &[(M1, 0.0), (M2, 0.0)]);
        assert_eq!(*c.state(), MotorSpeedState::default());
    }

    #[test]
    fn test_diamond_error_mid_leg_skips_remaining_legs() {
        let mut c = controller();
        // 1-2 leading stop, 3-5 sw leg, 6-7 nw leg's stop, 8 is its drive
        c.device_mut().fail_on_write(8);

        assert!(matches!(c.draw_diamond(1.5), Err(MotionError::Device(_))));
        assert_eq!(c.clock().sleeps().len(), 1);
        // only the sw leg drove; ne and se never ran
        assert_eq!(drive_writes(&c), vec![(M2, -1.5)]);
        let all = writes(&c);
        assert_eq!(&all[all.len() - 2..], &[(M1, 0.0), (M2, 0.0)]);
        assert_eq!(*c.state(), MotorSpeedState::default());
    }

    #[test]
    fn test_failed_abort_stop_returns_leg_error() {
        let mut c = controller();
        // 3 fails the first leg, 4 fails the first write of the abort stop
        c.device_mut().fail_on_write(3);
        c.device_mut().fail_on_write(4);

        let err = c.draw_square(2.0).unwrap_err();
        match err {
            MotionError::Device(e) => assert!(e.message.contains("#3"), "{}", e.message),
            other => panic!("unexpected error: {:?}", other),
        }
        // abort stop gave up after its first write; only the leading stop landed
        assert_eq!(writes(&c), vec![(M1, 0.0), (M2, 0.0)]);
        assert!(c.clock().sleeps().is_empty());
        assert_eq!(*c.state(), MotorSpeedState::default());
    }

    #[test]
    fn test_invalid_leg_duration_touches_nothing() {
        for v in [0.0, -2.0, f64::NAN] {
            let mut c = controller();
            let err = c.draw_square(v).unwrap_err();
            assert!(matches!(err, MotionError::InvalidLegDuration { .. }));
            assert!(c.device().calls().is_empty());
        }
        let mut c = controller();
        assert!(c.draw_diamond(f64::INFINITY).is_err());
    }

    #[test]
    fn test_scale_voltage_by_sensor() {
        let mut c = controller();
        let v = c.scale_voltage_by_sensor(5.0, 10.0).unwrap();
        assert_eq!(v, 5.0);
        assert_eq!(writes(&c), vec![(M1, 5.0), (M2, 5.0)]);
        // raw write, tracked speeds untouched
        assert_eq!(*c.state(), MotorSpeedState::default());

        let v = c.scale_voltage_by_sensor(-2.0, 3.0).unwrap();
        assert!((v - 0.6).abs() < 1e-12);
        assert_eq!(scaled_voltage(-2.0, 3.0), v);
    }

    #[test]
    fn test_adjust_speed_uses_motor_1_speed() {
        let mut c = controller();
        c.move_pos_y(4.0).unwrap();
        c.device_mut().clear_calls();

        let v = c.adjust_speed(5.0).unwrap();
        assert_eq!(v, 2.0);
        assert_eq!(writes(&c), vec![(M1, 2.0), (M2, 2.0)]);
    }

    #[test]
    fn test_primitive_error_propagates() {
        let mut c = controller();
        c.device_mut().fail_on_write(3);
        let err = c.move_pos_x(1.0).unwrap_err();
        assert_eq!(err.code, SIMULATED_FAILURE_CODE);
        // speeds were set before the failed write
        assert_eq!(c.state().speed_1, -1.0);
    }
}
