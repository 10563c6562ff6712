//! Backend implementations for the render module
//!
//! Only Vulkan (through `ash`) is supported.

/// Vulkan rendering backend implementation
pub mod vulkan;
