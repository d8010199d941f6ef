//! Lock-free SPSC ring buffer carrying amplitude samples.
//!
//! Uses `ringbuf::HeapRb<AmplitudeSample>`, whose wait-free `try_push` is
//! safe to call from a real-time capture callback. Push order is preserved,
//! which is what gives the pipeline its non-decreasing timestamp guarantee.

pub mod sample;

use ringbuf::{traits::Split, HeapRb};

use sample::AmplitudeSample;

pub use ringbuf::traits::{Consumer, Observer, Producer};

/// Producer half — held by the amplitude-source side (see `SampleFeed`).
pub type SampleProducer = ringbuf::HeapProd<AmplitudeSample>;

/// Consumer half — held by the pipeline thread.
pub type SampleConsumer = ringbuf::HeapCons<AmplitudeSample>;

/// Ring capacity: 2^14 = 16 384 samples, several minutes of slack at a
/// display-driven sampling tick. Threshold crossings are timing-sensitive;
/// a full ring is reported as an error rather than dropping samples.
pub const RING_CAPACITY: usize = 1 << 14;

/// Create a matched producer/consumer pair backed by a heap-allocated ring.
pub fn create_sample_ring() -> (SampleProducer, SampleConsumer) {
    HeapRb::<AmplitudeSample>::new(RING_CAPACITY).split()
}
