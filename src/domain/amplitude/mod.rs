//! Amplitude level value object and RMS reduction

mod level;

pub use level::{Amplitude, FULL_SCALE};
