pub mod wav;

pub use wav::{write_wav, SampleDepth};
