//! Types shared between the engine and its front ends.

mod range;
mod trace;

pub use range::*;
pub use trace::*;
