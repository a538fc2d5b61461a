//! Incremental decoding of the streamed answer.
//!
//! - `frame`: byte chunks to `data: ` frames, tolerant of arbitrary splits
//! - `delta`: frame payloads to text deltas or stream errors
//! - `accumulator`: owns the growing answer and re-renders it per delta

pub mod accumulator;
pub mod delta;
pub mod frame;

pub use accumulator::{StreamAccumulator, StreamFailure};
pub use delta::{Delta, extract};
pub use frame::{Frame, FrameDecoder};
