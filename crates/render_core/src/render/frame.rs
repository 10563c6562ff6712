//! Per-frame-in-flight resources
//!
//! Each frame in flight owns its command buffer, synchronization objects and
//! scene uniform, so recording frame `n + 1` never touches data the GPU is
//! still reading for frame `n`.

use ash::vk;

use crate::render::backends::vulkan::{
    DescriptorAllocator, DescriptorWriteBatch, GraphicsDevice, UniformBuffer, VulkanError,
    VulkanResult,
};
use crate::render::shader_data::GpuSceneData;

/// Command buffer, sync objects and scene data of one frame in flight
#[derive(Debug)]
pub struct FrameData {
    /// Primary command buffer re-recorded every use
    pub command_buffer: vk::CommandBuffer,
    /// Signaled when the swapchain image is ready to be drawn into
    pub image_available: vk::Semaphore,
    /// Signaled when rendering is done and the image may be presented
    pub render_finished: vk::Semaphore,
    /// Signaled when the GPU finished this frame's submission
    pub in_flight: vk::Fence,
    /// Scene uniform bound through `global_set`
    pub scene_buffer: UniformBuffer<GpuSceneData>,
    /// Set 0 of every pipeline
    pub global_set: vk::DescriptorSet,
}

impl FrameData {
    /// Create the resources of one frame
    ///
    /// The fence starts signaled so the first wait returns immediately. The
    /// global set is usable once `batch` has been flushed.
    pub fn create<D: GraphicsDevice>(
        device: &D,
        global_layout: vk::DescriptorSetLayout,
        allocator: &mut DescriptorAllocator,
        batch: &mut DescriptorWriteBatch,
    ) -> VulkanResult<Self> {
        let command_buffer = device
            .allocate_command_buffers(1)?
            .into_iter()
            .next()
            .ok_or_else(|| VulkanError::InitializationFailed("no command buffer allocated".into()))?;
        let image_available = device.create_semaphore()?;
        let render_finished = device.create_semaphore()?;
        let in_flight = device.create_fence(true)?;

        let scene_buffer = UniformBuffer::<GpuSceneData>::create(device, 1)?;
        scene_buffer.update(device, &[GpuSceneData::default()])?;
        let global_set = allocator
            .allocate(device, global_layout, 1)?
            .into_iter()
            .next()
            .ok_or_else(|| VulkanError::InitializationFailed("no global set allocated".into()))?;
        batch.make_room(device, 1, 0);
        scene_buffer.bind(batch, global_set, 0);

        Ok(Self {
            command_buffer,
            image_available,
            render_finished,
            in_flight,
            scene_buffer,
            global_set,
        })
    }

    /// Destroy every object of this frame; the GPU must be idle
    pub fn destroy<D: GraphicsDevice>(&self, device: &D) {
        device.free_command_buffers(&[self.command_buffer]);
        device.destroy_semaphore(self.image_available);
        device.destroy_semaphore(self.render_finished);
        device.destroy_fence(self.in_flight);
        self.scene_buffer.destroy(device);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::backends::vulkan::mock::MockDevice;
    use ash::vk::Handle as _;

    #[test]
    fn test_create_and_destroy_frame() {
        let device = MockDevice::new();
        let pool_sizes = [vk::DescriptorPoolSize {
            ty: vk::DescriptorType::UNIFORM_BUFFER,
            descriptor_count: 1,
        }];
        let mut allocator = DescriptorAllocator::new(&pool_sizes, 2);
        let mut batch = DescriptorWriteBatch::new(2, 0);

        let frame = FrameData::create(
            &device,
            vk::DescriptorSetLayout::from_raw(1),
            &mut allocator,
            &mut batch,
        )
        .unwrap();
        batch.flush(&device);

        let writes = device.writes();
        assert_eq!(writes[0].set, frame.global_set);
        assert_eq!(writes[0].buffer, Some(frame.scene_buffer.handle()));
        assert_eq!(device.live("semaphore"), 2);

        frame.destroy(&device);
        for kind in ["command_buffer", "semaphore", "fence", "buffer"] {
            assert_eq!(device.live(kind), 0, "{} leaked", kind);
        }
    }
}
