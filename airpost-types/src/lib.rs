//! # airpost-types
//!
//! Core reading types for airpost telemetry nodes. This crate defines the
//! schema shared by sampling, display, and delivery: a fixed set of named
//! sensor channels and the always-fully-populated map of their latest
//! values.
//!
//! ## Design Goals
//!
//! - **Zero dependencies**: usable from firmware-style builds and host tools alike
//! - **Sealed schema**: the channel set is fixed at startup; only values change afterwards
//! - **Explicit failure**: a failed sensor reports [`SENTINEL`], never a missing key
//! - **Stable ordering**: channels iterate in the same order everywhere, so wire
//!   payloads and display rows never shuffle between cycles
//!
//! ## Features
//!
//! - `std` (default): Standard library support
//!
//! ## Example
//!
//! ```rust
//! use airpost_types::{ReadingSet, SENTINEL};
//!
//! let mut readings = ReadingSet::for_channels(["temperature", "co2"]);
//!
//! // Sampling updates values in place; unknown channels are rejected.
//! assert!(readings.set("temperature", 21.5));
//! assert!(!readings.set("wind_speed", 3.0));
//!
//! // A failed sensor writes the sentinel instead of dropping the key.
//! readings.set("co2", SENTINEL);
//! assert_eq!(readings.len(), 2);
//! ```

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod channels;
mod reading;

pub use channels::*;
pub use reading::*;
