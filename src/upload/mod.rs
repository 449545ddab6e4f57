//! The upload coordinator and the operations built on it.
//!
//! Every operation is a short sequence of store reads followed by conditional
//! writes. No lock is held across store calls. A write whose precondition no
//! longer matches surfaces as a state conflict.

mod coordinator;
mod lifecycle;
mod query;
mod verify;

pub use coordinator::Coordinator;
