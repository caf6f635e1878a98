// Quadrature encoder helpers: counter setup, zeroing and position readout

use tracing::{debug, info};

use crate::config::EncoderChannels;
use crate::device::{CounterConfig, DaqDevice, DeviceError};
use crate::messages::PositionReport;
use crate::motion::Kinematics;

/// Apply the rig's quadrature setup to both encoder counters
pub fn configure_encoders<D: DaqDevice + ?Sized>(
    device: &mut D,
    channels: &EncoderChannels,
) -> Result<(), DeviceError> {
    let config = CounterConfig::rig_encoder();
    info!(
        "Configuring encoder counters {} and {} on board {}",
        channels.encoder_1, channels.encoder_2, channels.board
    );
    device.configure_counter(channels.board, channels.encoder_1, &config)?;
    device.configure_counter(channels.board, channels.encoder_2, &config)
}

/// Reset both encoder counters to zero
pub fn zero_encoders<D: DaqDevice + ?Sized>(
    device: &mut D,
    channels: &EncoderChannels,
) -> Result<(), DeviceError> {
    info!("Zeroing encoders");
    device.clear_counter(channels.board, channels.encoder_1)?;
    device.clear_counter(channels.board, channels.encoder_2)
}

/// Read both encoder counters (16-bit)
pub fn read_counts<D: DaqDevice + ?Sized>(
    device: &mut D,
    channels: &EncoderChannels,
) -> Result<(u32, u32), DeviceError> {
    let count_1 = device.read_counter(channels.board, channels.encoder_1)?;
    let count_2 = device.read_counter(channels.board, channels.encoder_2)?;
    debug!("Encoder counts: {}, {}", count_1, count_2);
    Ok((count_1, count_2))
}

/// Read both counters and map them to a Cartesian position
pub fn read_position<D: DaqDevice + ?Sized>(
    device: &mut D,
    channels: &EncoderChannels,
    kinematics: &Kinematics,
) -> Result<PositionReport, DeviceError> {
    let (count_1, count_2) = read_counts(device, channels)?;
    let displacement =
        kinematics.position_from_encoder_counts(i64::from(count_1), i64::from(count_2));
    Ok(PositionReport::new(count_1, count_2, displacement))
}
