//! Buffer kinds, usage flags and descriptors.
//!
//! This module describes what each draw buffer holds and how it is laid out,
//! independent of where the bytes end up living.

mod buffer;

pub use buffer::{BufferDescriptor, BufferKind, BufferUsage, ComponentType};
