use rtrb::{chunks::ChunkError, Consumer, Producer, RingBuffer};
use tracing::warn;

/// SPSC sample buffer between the audio callback and the pull side.
/// Backed by rtrb, so the callback side never allocates or blocks.
pub struct SampleRing {
    producer: Producer<i16>,
    consumer: Consumer<i16>,
}

impl SampleRing {
    pub fn new(capacity: usize) -> Self {
        let (producer, consumer) = RingBuffer::new(capacity);
        Self { producer, consumer }
    }

    pub fn split(self) -> (RingProducer, RingConsumer) {
        (
            RingProducer {
                producer: self.producer,
            },
            RingConsumer {
                consumer: self.consumer,
            },
        )
    }
}

/// Callback-side half. Writes whatever fits; excess samples are dropped
/// rather than stalling the audio thread.
pub struct RingProducer {
    producer: Producer<i16>,
}

impl RingProducer {
    pub fn write(&mut self, samples: &[i16]) -> usize {
        let want = samples.len().min(self.producer.slots());
        if want < samples.len() {
            warn!(
                "capture ring full: dropping {} of {} samples",
                samples.len() - want,
                samples.len()
            );
        }
        if want == 0 {
            return 0;
        }

        let mut chunk = match self.producer.write_chunk(want) {
            Ok(chunk) => chunk,
            Err(ChunkError::TooFewSlots(_)) => return 0,
        };

        // The chunk may wrap; fill both slices.
        let (first, second) = chunk.as_mut_slices();
        let split = first.len();
        first.copy_from_slice(&samples[..split]);
        if !second.is_empty() {
            second.copy_from_slice(&samples[split..want]);
        }
        chunk.commit_all();
        want
    }

    pub fn slots(&self) -> usize {
        self.producer.slots()
    }
}

/// Pull-side half, owned by the capture worker.
pub struct RingConsumer {
    consumer: Consumer<i16>,
}

impl RingConsumer {
    /// Non-blocking read of up to `buf.len()` samples; 0 means empty.
    pub fn read(&mut self, buf: &mut [i16]) -> usize {
        let chunk = match self.consumer.read_chunk(buf.len()) {
            Ok(chunk) => chunk,
            Err(ChunkError::TooFewSlots(available)) => {
                if available == 0 {
                    return 0;
                }
                self.consumer.read_chunk(available).unwrap()
            }
        };

        let len = chunk.len();
        let (first, second) = chunk.as_slices();
        let split = first.len();
        buf[..split].copy_from_slice(first);
        if !second.is_empty() {
            buf[split..split + second.len()].copy_from_slice(second);
        }
        chunk.commit_all();
        len
    }

    pub fn slots(&self) -> usize {
        self.consumer.slots()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_round_trip() {
        let (mut producer, mut consumer) = SampleRing::new(64).split();
        assert_eq!(producer.write(&[1, 2, 3, 4, 5]), 5);

        let mut buf = [0i16; 8];
        assert_eq!(consumer.read(&mut buf), 5);
        assert_eq!(&buf[..5], &[1, 2, 3, 4, 5]);
        assert_eq!(consumer.read(&mut buf), 0);
    }

    #[test]
    fn overflow_drops_excess_instead_of_blocking() {
        let (mut producer, mut consumer) = SampleRing::new(8).split();
        assert_eq!(producer.write(&[7i16; 12]), 8);
        assert_eq!(producer.write(&[9i16; 4]), 0);

        let mut buf = [0i16; 16];
        assert_eq!(consumer.read(&mut buf), 8);
        assert!(buf[..8].iter().all(|&s| s == 7));
    }

    #[test]
    fn wrapping_read_preserves_order() {
        let (mut producer, mut consumer) = SampleRing::new(8).split();
        producer.write(&[1, 2, 3, 4, 5, 6]);
        let mut buf = [0i16; 4];
        assert_eq!(consumer.read(&mut buf), 4);

        // Wraps around the ring boundary.
        producer.write(&[7, 8, 9, 10]);
        let mut rest = [0i16; 8];
        assert_eq!(consumer.read(&mut rest), 6);
        assert_eq!(&rest[..6], &[5, 6, 7, 8, 9, 10]);
    }
}
