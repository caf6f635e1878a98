// Motion layer for the H-frame positioner
//
// Provides:
// - H-frame kinematics (motor angles / encoder counts -> Cartesian displacement)
// - Open-loop motion primitives and compound gestures over a DAQ device

mod controller;
pub mod kinematics;

pub use controller::{
    Direction, Motor, MotionError, MotorController, MotorSpeedState, SQUARE_SIDE,
    scaled_voltage,
};
pub use kinematics::{
    Displacement, KinematicTransform, Kinematics, displacement_from_angles,
    position_from_encoder_counts,
};
