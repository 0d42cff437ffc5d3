//! Alignment of independently sampled series onto a common time axis.
//!
//! Both operations walk their inputs once in timestamp order, so every
//! input index must be strictly increasing.

mod rendezvous;
mod resample;

pub use rendezvous::{match_indices, rendezvous, Direction, RendezvousOptions};
pub use resample::{resample, FillPolicy};
