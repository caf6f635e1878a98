// Control utility for an H-frame two-motor positioning rig
//
// Open-loop motion primitives and kinematics over a data-acquisition device
// (analog voltage out to the motors, quadrature counters on the encoders).

pub mod clock;
pub mod config;
pub mod device;
pub mod encoder;
pub mod messages;
pub mod monitor;
pub mod motion;
