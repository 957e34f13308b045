//! Canonical conversation types for codehook.
//!
//! Hosts exchange [`Message`] values with reply strategies. The types here are
//! plain data: they carry no behaviour beyond construction and serialization.

pub mod messages;

pub use messages::{Message, Role};
