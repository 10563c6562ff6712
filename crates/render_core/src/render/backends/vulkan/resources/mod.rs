//! Vulkan resource management
//!
//! Descriptor pools, batched descriptor writes, set layouts and typed buffers.

pub mod buffer;
pub mod descriptor_allocator;
pub mod descriptor_set;
pub mod descriptor_writes;
