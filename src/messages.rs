// Report types printed by the CLI and produced by the monitor loop

use serde::{Deserialize, Serialize};

use crate::motion::Displacement;

/// Encoder counts and the Cartesian position they map to
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionReport {
    pub count_1: u32,
    pub count_2: u32,
    pub dx: f64,
    pub dy: f64,
}

impl PositionReport {
    pub fn new(count_1: u32, count_2: u32, displacement: Displacement) -> Self {
        Self {
            count_1,
            count_2,
            dx: displacement.dx,
            dy: displacement.dy,
        }
    }
}

/// One monitor tick
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MonitorSample {
    pub index: u64,
    /// Seconds since the monitor started, by the monitor's clock
    pub elapsed_s: f64,
    pub position: PositionReport,
}
