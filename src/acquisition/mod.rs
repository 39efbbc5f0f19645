//! Sample acquisition module
//!
//! Sample storage and acquisition sequencing: the tri-axial circular buffer,
//! ODR bookkeeping and the controller that decides when filters reset and
//! when FFT cycles run.

mod circular_buffer;
mod controller;
mod odr;

pub use circular_buffer::CircularBuffer;
pub use controller::{hop_for_overlap, AcquisitionController};
pub use odr::{OdrMeter, OdrState};
