//! Device abstraction used by every storage and by the frame loop
//!
//! The renderer core never talks to `ash::Device` directly. It goes through
//! [`GraphicsDevice`], which exposes exactly the create/destroy/bind/draw
//! primitives the core needs in terms of `ash::vk` handle types. The
//! production implementation is [`AshDevice`](super::ash_device::AshDevice);
//! tests use a recording mock.
//!
//! Methods take `&self`: Vulkan objects are externally synchronized and the
//! core only drives the device from the frame thread.

use ash::vk;
use thiserror::Error;

/// Vulkan-specific error types
#[derive(Error, Debug)]
pub enum VulkanError {
    /// General Vulkan API error with result code
    #[error("Vulkan API error: {0:?}")]
    Api(vk::Result),

    /// Invalid operation attempted
    #[error("Invalid operation: {reason}")]
    InvalidOperation {
        /// Description of why the operation is invalid
        reason: String,
    },

    /// No suitable memory type found for allocation
    #[error("No suitable memory type found")]
    NoSuitableMemoryType,

    /// Object creation failed outside of a Vulkan result code
    #[error("Initialization failed: {0}")]
    InitializationFailed(String),

    /// An asset file could not be read or decoded
    #[error("Failed to load asset {path}: {reason}")]
    AssetLoad {
        /// Path of the asset
        path: String,
        /// What went wrong
        reason: String,
    },
}

impl VulkanError {
    /// Whether this error is the pool exhaustion a descriptor allocator recovers from
    pub fn is_pool_exhausted(&self) -> bool {
        matches!(
            self,
            Self::Api(vk::Result::ERROR_OUT_OF_POOL_MEMORY | vk::Result::ERROR_FRAGMENTED_POOL)
        )
    }
}

/// Result type for Vulkan operations
pub type VulkanResult<T> = Result<T, VulkanError>;

/// Where a buffer's memory lives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryLocation {
    /// Host visible and coherent, written through a mapping every update
    HostVisible,
    /// Device local, filled once through a staging copy
    DeviceLocal,
}

/// Buffer plus its backing allocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpuBuffer {
    /// Buffer handle
    pub buffer: vk::Buffer,
    /// Bound memory
    pub memory: vk::DeviceMemory,
    /// Size in bytes
    pub size: vk::DeviceSize,
}

/// Sampled 2D image with its view and allocation
#[derive(Debug, Clone, Copy)]
pub struct GpuImage {
    /// Image handle
    pub image: vk::Image,
    /// Full-image view used for sampling
    pub view: vk::ImageView,
    /// Bound memory
    pub memory: vk::DeviceMemory,
    /// Dimensions in texels
    pub extent: vk::Extent2D,
    /// Texel format
    pub format: vk::Format,
}

/// The opaque device of the renderer core
pub trait GraphicsDevice {
    /// Create an empty buffer
    fn create_buffer(
        &self,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        location: MemoryLocation,
    ) -> VulkanResult<GpuBuffer>;

    /// Create a device-local buffer initialized with `data`
    fn create_buffer_with_data(
        &self,
        data: &[u8],
        usage: vk::BufferUsageFlags,
    ) -> VulkanResult<GpuBuffer>;

    /// Copy `data` into a host-visible buffer at `offset`
    fn write_buffer(
        &self,
        buffer: &GpuBuffer,
        offset: vk::DeviceSize,
        data: &[u8],
    ) -> VulkanResult<()>;

    /// Destroy a buffer and free its memory
    fn destroy_buffer(&self, buffer: &GpuBuffer);

    /// Upload tightly packed texels into a shader-readable image
    fn create_texture_image(
        &self,
        extent: vk::Extent2D,
        format: vk::Format,
        pixels: &[u8],
    ) -> VulkanResult<GpuImage>;

    /// Destroy an image, its view and its memory
    fn destroy_image(&self, image: &GpuImage);

    /// Create a repeat-addressed sampler with the given filter
    fn create_sampler(&self, filter: vk::Filter) -> VulkanResult<vk::Sampler>;

    /// Destroy a sampler
    fn destroy_sampler(&self, sampler: vk::Sampler);

    /// Create a shader module from SPIR-V words
    fn create_shader_module(&self, code: &[u32]) -> VulkanResult<vk::ShaderModule>;

    /// Destroy a shader module
    fn destroy_shader_module(&self, module: vk::ShaderModule);

    /// Create a descriptor set layout
    fn create_descriptor_set_layout(
        &self,
        bindings: &[vk::DescriptorSetLayoutBinding],
    ) -> VulkanResult<vk::DescriptorSetLayout>;

    /// Destroy a descriptor set layout
    fn destroy_descriptor_set_layout(&self, layout: vk::DescriptorSetLayout);

    /// Create a descriptor pool
    fn create_descriptor_pool(
        &self,
        max_sets: u32,
        pool_sizes: &[vk::DescriptorPoolSize],
    ) -> VulkanResult<vk::DescriptorPool>;

    /// Allocate one set per layout from `pool`
    ///
    /// Exhaustion is reported as `ERROR_OUT_OF_POOL_MEMORY` or
    /// `ERROR_FRAGMENTED_POOL`.
    fn allocate_descriptor_sets(
        &self,
        pool: vk::DescriptorPool,
        layouts: &[vk::DescriptorSetLayout],
    ) -> VulkanResult<Vec<vk::DescriptorSet>>;

    /// Return every set of `pool` to it
    fn reset_descriptor_pool(&self, pool: vk::DescriptorPool) -> VulkanResult<()>;

    /// Destroy a descriptor pool
    fn destroy_descriptor_pool(&self, pool: vk::DescriptorPool);

    /// Apply descriptor writes in one call
    fn update_descriptor_sets(&self, writes: &[vk::WriteDescriptorSet]);

    /// Create a pipeline layout
    fn create_pipeline_layout(
        &self,
        set_layouts: &[vk::DescriptorSetLayout],
        push_constant_ranges: &[vk::PushConstantRange],
    ) -> VulkanResult<vk::PipelineLayout>;

    /// Destroy a pipeline layout
    fn destroy_pipeline_layout(&self, layout: vk::PipelineLayout);

    /// Compile a graphics pipeline
    fn create_graphics_pipeline(
        &self,
        create_info: &vk::GraphicsPipelineCreateInfo,
    ) -> VulkanResult<vk::Pipeline>;

    /// Destroy a pipeline
    fn destroy_pipeline(&self, pipeline: vk::Pipeline);

    /// Allocate primary command buffers from the device's graphics pool
    fn allocate_command_buffers(&self, count: u32) -> VulkanResult<Vec<vk::CommandBuffer>>;

    /// Return command buffers to the graphics pool
    fn free_command_buffers(&self, command_buffers: &[vk::CommandBuffer]);

    /// Reset a command buffer for re-recording
    fn reset_command_buffer(&self, command_buffer: vk::CommandBuffer) -> VulkanResult<()>;

    /// Begin recording
    fn begin_command_buffer(&self, command_buffer: vk::CommandBuffer) -> VulkanResult<()>;

    /// Finish recording
    fn end_command_buffer(&self, command_buffer: vk::CommandBuffer) -> VulkanResult<()>;

    /// Begin an inline render pass covering `extent`
    fn cmd_begin_render_pass(
        &self,
        command_buffer: vk::CommandBuffer,
        render_pass: vk::RenderPass,
        framebuffer: vk::Framebuffer,
        extent: vk::Extent2D,
        clear_values: &[vk::ClearValue],
    );

    /// End the current render pass
    fn cmd_end_render_pass(&self, command_buffer: vk::CommandBuffer);

    /// Set the dynamic viewport and scissor to cover `extent`
    fn cmd_set_viewport_and_scissor(&self, command_buffer: vk::CommandBuffer, extent: vk::Extent2D);

    /// Bind a graphics pipeline
    fn cmd_bind_pipeline(&self, command_buffer: vk::CommandBuffer, pipeline: vk::Pipeline);

    /// Bind descriptor sets starting at `first_set`
    fn cmd_bind_descriptor_sets(
        &self,
        command_buffer: vk::CommandBuffer,
        layout: vk::PipelineLayout,
        first_set: u32,
        sets: &[vk::DescriptorSet],
    );

    /// Push constant bytes
    fn cmd_push_constants(
        &self,
        command_buffer: vk::CommandBuffer,
        layout: vk::PipelineLayout,
        stages: vk::ShaderStageFlags,
        offset: u32,
        data: &[u8],
    );

    /// Bind a vertex buffer at binding 0
    fn cmd_bind_vertex_buffer(&self, command_buffer: vk::CommandBuffer, buffer: vk::Buffer);

    /// Bind a `u32` index buffer
    fn cmd_bind_index_buffer(&self, command_buffer: vk::CommandBuffer, buffer: vk::Buffer);

    /// Non-indexed draw
    fn cmd_draw(&self, command_buffer: vk::CommandBuffer, vertex_count: u32, instance_count: u32);

    /// Indexed draw
    fn cmd_draw_indexed(
        &self,
        command_buffer: vk::CommandBuffer,
        index_count: u32,
        instance_count: u32,
    );

    /// Create a fence
    fn create_fence(&self, signaled: bool) -> VulkanResult<vk::Fence>;

    /// Destroy a fence
    fn destroy_fence(&self, fence: vk::Fence);

    /// Block until `fence` is signaled
    fn wait_for_fence(&self, fence: vk::Fence) -> VulkanResult<()>;

    /// Unsignal a fence
    fn reset_fence(&self, fence: vk::Fence) -> VulkanResult<()>;

    /// Create a binary semaphore
    fn create_semaphore(&self) -> VulkanResult<vk::Semaphore>;

    /// Destroy a semaphore
    fn destroy_semaphore(&self, semaphore: vk::Semaphore);

    /// Submit one command buffer to the graphics queue
    fn submit_graphics(
        &self,
        command_buffer: vk::CommandBuffer,
        wait_semaphore: vk::Semaphore,
        wait_stage: vk::PipelineStageFlags,
        signal_semaphore: vk::Semaphore,
        fence: vk::Fence,
    ) -> VulkanResult<()>;

    /// Wait for all queued work to finish
    fn wait_idle(&self) -> VulkanResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_exhaustion_classification() {
        assert!(VulkanError::Api(vk::Result::ERROR_OUT_OF_POOL_MEMORY).is_pool_exhausted());
        assert!(VulkanError::Api(vk::Result::ERROR_FRAGMENTED_POOL).is_pool_exhausted());
        assert!(!VulkanError::Api(vk::Result::ERROR_DEVICE_LOST).is_pool_exhausted());
        assert!(!VulkanError::NoSuitableMemoryType.is_pool_exhausted());
    }

    #[test]
    fn test_error_display() {
        let err = VulkanError::AssetLoad {
            path: "mesh.obj".to_string(),
            reason: "missing".to_string(),
        };
        assert_eq!(err.to_string(), "Failed to load asset mesh.obj: missing");
    }
}
