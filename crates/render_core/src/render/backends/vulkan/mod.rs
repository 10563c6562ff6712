//! Vulkan backend implementation
//!
//! Organized into the device seam, the presentation contract and the
//! descriptor/buffer resources built on top of them.

/// Device trait, error types and GPU object records
pub mod device;

/// `ash` implementation of the device trait
pub mod ash_device;

/// Presentation target contract
pub mod swapchain;

/// Vulkan resource management (descriptors, typed buffers)
pub mod resources;

#[cfg(test)]
pub(crate) mod mock;

pub use ash_device::AshDevice;
pub use device::{GpuBuffer, GpuImage, GraphicsDevice, MemoryLocation, VulkanError, VulkanResult};
pub use swapchain::{AcquireOutcome, PresentOutcome, SwapchainTarget};

pub use resources::buffer::{Storage, StorageBuffer, TypedBuffer, Uniform, UniformBuffer};
pub use resources::descriptor_allocator::DescriptorAllocator;
pub use resources::descriptor_set::{DescriptorSetLayout, DescriptorSetLayoutBuilder};
pub use resources::descriptor_writes::DescriptorWriteBatch;
