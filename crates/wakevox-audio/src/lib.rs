pub mod capture;
pub mod device;
pub mod ring_buffer;

pub use capture::{CaptureConfig, CaptureSource, MicSource};
pub use device::SourceSelector;
pub use ring_buffer::{RingConsumer, RingProducer, SampleRing};
