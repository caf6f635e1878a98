use std::error::Error;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;

use hframe_positioner::clock::{Clock, SystemClock};
use hframe_positioner::config::Settings;
use hframe_positioner::device::{DaqDevice, SimulatedDaq};
use hframe_positioner::encoder;
use hframe_positioner::monitor::Monitor;
use hframe_positioner::motion::{Direction, Kinematics, MotorController, scaled_voltage};

type BoxError = Box<dyn Error + Send + Sync>;

#[derive(Parser)]
#[command(version, about = "Open-loop control of the H-frame positioning rig")]
struct Cli {
    /// TOML settings file (built-in defaults if omitted)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Drive an in-memory simulated device instead of the DAQ boards
    #[arg(long, global = true)]
    simulate: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write 0 V to both motors
    Stop,

    /// Drive in one direction
    Move {
        #[arg(value_enum)]
        direction: DirectionArg,

        /// Motor voltage (defaults to voltage_default)
        #[arg(short, long, allow_negative_numbers = true)]
        volts: Option<f64>,

        /// Stop again after this many seconds (otherwise the motors keep running)
        #[arg(long)]
        for_secs: Option<f64>,
    },

    /// Trace a square
    Square {
        #[arg(short, long)]
        volts: Option<f64>,
    },

    /// Trace a diamond
    Diamond {
        #[arg(short, long)]
        volts: Option<f64>,
    },

    /// Drive both motors at |sensor / 10| * volts
    Scale {
        /// Sensor reading to scale by
        #[arg(long, conflicts_with = "laser", required_unless_present = "laser")]
        sensor: Option<f64>,

        /// Read the sensor value from laser 1 or 2 instead
        #[arg(long, value_parser = clap::value_parser!(u8).range(1..=2))]
        laser: Option<u8>,

        #[arg(short, long)]
        volts: Option<f64>,
    },

    /// Print the current encoder counts and position as JSON
    Position,

    /// Set up both encoder counters for x4 quadrature
    ConfigureEncoders,

    /// Reset both encoder counters to zero
    ZeroEncoders,

    /// Poll the encoders at poll_hz and print one JSON line per sample
    Watch {
        /// Stop after this many samples (runs until killed otherwise)
        #[arg(long)]
        samples: Option<u64>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum DirectionArg {
    /// +Y
    N,
    /// -Y
    S,
    /// +X
    E,
    /// -X
    W,
    Ne,
    Se,
    Nw,
    Sw,
}

impl From<DirectionArg> for Direction {
    fn from(arg: DirectionArg) -> Self {
        match arg {
            DirectionArg::N => Direction::PosY,
            DirectionArg::S => Direction::NegY,
            DirectionArg::E => Direction::PosX,
            DirectionArg::W => Direction::NegX,
            DirectionArg::Ne => Direction::NorthEast,
            DirectionArg::Se => Direction::SouthEast,
            DirectionArg::Nw => Direction::NorthWest,
            DirectionArg::Sw => Direction::SouthWest,
        }
    }
}

#[cfg(all(feature = "mcc", windows))]
fn hardware_device() -> Result<Box<dyn DaqDevice>, BoxError> {
    Ok(Box::new(hframe_positioner::device::MccDaq::new()))
}

#[cfg(not(all(feature = "mcc", windows)))]
fn hardware_device() -> Result<Box<dyn DaqDevice>, BoxError> {
    Err("no DAQ backend in this build (enable feature `mcc` on Windows); use --simulate".into())
}

fn open_device(simulate: bool) -> Result<Box<dyn DaqDevice>, BoxError> {
    if simulate {
        info!("Using simulated DAQ device");
        Ok(Box::new(SimulatedDaq::new()))
    } else {
        hardware_device()
    }
}

/// The motion layer passes voltages through untouched, so limits are
/// enforced here, on the value that would actually be written.
fn check_allowable(v: f64, settings: &Settings) -> Result<f64, BoxError> {
    if !v.is_finite() || v.abs() > settings.voltage_allowable {
        return Err(format!(
            "{} V is outside the allowable range of ±{} V",
            v, settings.voltage_allowable
        )
        .into());
    }
    Ok(v)
}

fn checked_volts(volts: Option<f64>, settings: &Settings) -> Result<f64, BoxError> {
    check_allowable(volts.unwrap_or(settings.voltage_default), settings)
}

/// Base voltage and sensor reading must both give an allowable output
fn checked_scaled_volts(reading: f64, base: f64, settings: &Settings) -> Result<f64, BoxError> {
    check_allowable(base, settings)?;
    check_allowable(scaled_voltage(reading, base), settings)
        .map_err(|e| format!("sensor reading {} scales to {}", reading, e).into())
}

/// Hold time for `move --for-secs`, validated before the motors are driven
fn hold_duration(for_secs: Option<f64>) -> Result<Option<Duration>, BoxError> {
    Ok(for_secs.map(Duration::try_from_secs_f64).transpose()?)
}

fn run(cli: Cli) -> Result<(), BoxError> {
    let settings = match &cli.config {
        Some(path) => {
            info!("Loading settings from {}", path.display());
            Settings::load(path)?
        }
        None => Settings::default(),
    };
    let encoders = settings.encoder_channels();
    let kinematics = Kinematics::new(&settings.physical_constants());
    let mut controller = MotorController::new(
        open_device(cli.simulate)?,
        SystemClock,
        settings.motor_channels(),
    );

    match cli.command {
        Command::Position => {
            let report = encoder::read_position(controller.device_mut(), &encoders, &kinematics)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            return Ok(());
        }
        Command::ConfigureEncoders => {
            encoder::configure_encoders(controller.device_mut(), &encoders)?;
            return Ok(());
        }
        Command::ZeroEncoders => {
            encoder::zero_encoders(controller.device_mut(), &encoders)?;
            return Ok(());
        }
        Command::Watch { samples } => {
            let mut printed: Result<(), serde_json::Error> = Ok(());
            Monitor::new(&settings).run(
                controller.device_mut(),
                &mut SystemClock,
                samples,
                |sample| {
                    if printed.is_ok() {
                        printed = serde_json::to_string(sample).map(|line| println!("{}", line));
                    }
                },
            )?;
            printed?;
            return Ok(());
        }
        Command::Stop => controller.stop_motors()?,
        Command::Move {
            direction,
            volts,
            for_secs,
        } => {
            let v = checked_volts(volts, &settings)?;
            let hold = hold_duration(for_secs)?;
            controller.move_direction(direction.into(), v)?;
            if let Some(hold) = hold {
                SystemClock.sleep(hold);
                controller.stop_motors()?;
            }
        }
        Command::Square { volts } => controller.draw_square(checked_volts(volts, &settings)?)?,
        Command::Diamond { volts } => controller.draw_diamond(checked_volts(volts, &settings)?)?,
        Command::Scale {
            sensor,
            laser,
            volts,
        } => {
            let base = volts.unwrap_or(settings.voltage_default);
            let reading = match (sensor, laser) {
                (Some(reading), _) => reading,
                (None, Some(2)) => controller
                    .device_mut()
                    .read_voltage(settings.adc_board, settings.laser_2_channel)?,
                (None, _) => controller
                    .device_mut()
                    .read_voltage(settings.adc_board, settings.laser_1_channel)?,
            };
            checked_scaled_volts(reading, base, &settings)?;
            let v_out = controller.scale_voltage_by_sensor(reading, base)?;
            info!("Sensor {} -> {} V on both motors", reading, v_out);
        }
    }

    // Last commanded speeds
    println!("{}", serde_json::to_string(controller.state())?);
    Ok(())
}

fn main() {
    // Setup logging (set RUST_LOG=info or debug)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(e) = run(Cli::parse()) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
