//! Window and FFT providers.

pub mod spectrum;
pub mod window;

pub use window::{Window, WindowType};
