//! Foundation utilities shared by every renderer subsystem
//!
//! Contains the generation-indexed slot array backing all resource storages,
//! math aliases, file helpers and logging setup.

pub mod file;
pub mod logging;
pub mod math;
pub mod slot_array;

pub use slot_array::{Handle, SlotArray};
