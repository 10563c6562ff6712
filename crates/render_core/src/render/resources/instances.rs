//! Per-instance transform buffers for instanced draws
//!
//! Every registered instance buffer owns one storage buffer and one
//! descriptor set per frame in flight, so the CPU can fill frame `n + 1`
//! while the GPU still reads frame `n`.

use ash::vk;

use crate::foundation::{Handle, SlotArray};
use crate::render::backends::vulkan::{
    DescriptorAllocator, DescriptorWriteBatch, GraphicsDevice, StorageBuffer, VulkanResult,
};
use crate::render::pipelines::layouts::INSTANCE_SET;
use crate::render::shader_data::InstanceData;

#[derive(Debug)]
struct FrameInstances {
    buffer: StorageBuffer<InstanceData>,
    set: vk::DescriptorSet,
}

/// Storage buffers of one instance buffer, one per frame in flight
#[derive(Debug)]
pub struct InstanceBuffer {
    frames: Vec<FrameInstances>,
    capacity: usize,
}

/// Handle to an instance buffer in a [`RenderInstanceManager`]
pub type InstanceBufferHandle = Handle<InstanceBuffer>;

/// Owner of every instance buffer
#[derive(Debug)]
pub struct RenderInstanceManager {
    slots: SlotArray<InstanceBuffer>,
    buffers: Vec<Option<InstanceBuffer>>,
    frames_in_flight: usize,
}

impl RenderInstanceManager {
    /// Create a manager for up to `max_buffers` instance buffers
    pub fn new(max_buffers: usize, frames_in_flight: usize) -> Self {
        assert!(frames_in_flight > 0, "At least one frame must be in flight");
        Self {
            slots: SlotArray::new(max_buffers),
            buffers: (0..max_buffers).map(|_| None).collect(),
            frames_in_flight,
        }
    }

    /// Create buffers holding up to `capacity` instances per frame
    ///
    /// The descriptor sets are usable once `batch` has been flushed. A batch
    /// without room for one write per frame is flushed first.
    pub fn register<D: GraphicsDevice>(
        &mut self,
        device: &D,
        set_layout: vk::DescriptorSetLayout,
        allocator: &mut DescriptorAllocator,
        batch: &mut DescriptorWriteBatch,
        capacity: usize,
    ) -> VulkanResult<InstanceBufferHandle> {
        let sets = allocator.allocate(device, set_layout, self.frames_in_flight as u32)?;
        batch.make_room(device, sets.len(), 0);

        let mut frames = Vec::with_capacity(sets.len());
        for set in sets {
            match StorageBuffer::<InstanceData>::create(device, capacity) {
                Ok(buffer) => {
                    buffer.bind(batch, set, 0);
                    frames.push(FrameInstances { buffer, set });
                }
                Err(e) => {
                    for frame in &frames {
                        frame.buffer.destroy(device);
                    }
                    return Err(e);
                }
            }
        }

        let handle = self.slots.reserve();
        self.buffers[usize::from(handle.index())] = Some(InstanceBuffer { frames, capacity });
        log::debug!(
            "Registered instance buffer {:?} ({} instances x {} frames)",
            handle,
            capacity,
            self.frames_in_flight
        );
        Ok(handle)
    }

    fn get(&self, handle: InstanceBufferHandle) -> &InstanceBuffer {
        self.slots.assert_valid(handle, "instance buffer");
        self.buffers[usize::from(handle.index())]
            .as_ref()
            .unwrap_or_else(|| unreachable!("live instance slot {} is empty", handle.index()))
    }

    fn frame(&self, handle: InstanceBufferHandle, frame: usize) -> &FrameInstances {
        assert!(
            frame < self.frames_in_flight,
            "Frame {} is out of range for {} frames in flight",
            frame,
            self.frames_in_flight
        );
        &self.get(handle).frames[frame]
    }

    /// Write instance data for `frame`
    ///
    /// # Panics
    /// When `frame` is not a frame in flight or `data` exceeds the capacity.
    pub fn update<D: GraphicsDevice>(
        &self,
        device: &D,
        handle: InstanceBufferHandle,
        frame: usize,
        data: &[InstanceData],
    ) -> VulkanResult<()> {
        let capacity = self.capacity(handle);
        assert!(
            data.len() <= capacity,
            "Provided {} instances which exceeds the capacity of {}",
            data.len(),
            capacity
        );
        self.frame(handle, frame).buffer.update(device, data)
    }

    /// Bind the set of `frame` at the instance set index
    pub fn bind<D: GraphicsDevice>(
        &self,
        device: &D,
        command_buffer: vk::CommandBuffer,
        layout: vk::PipelineLayout,
        handle: InstanceBufferHandle,
        frame: usize,
    ) {
        let set = self.frame(handle, frame).set;
        device.cmd_bind_descriptor_sets(command_buffer, layout, INSTANCE_SET, &[set]);
    }

    /// Instances each frame's buffer holds
    pub fn capacity(&self, handle: InstanceBufferHandle) -> usize {
        self.get(handle).capacity
    }

    /// Whether `handle` refers to a live instance buffer
    pub fn is_valid(&self, handle: InstanceBufferHandle) -> bool {
        self.slots.is_valid(handle)
    }

    /// Number of frames each buffer is replicated for
    pub fn frames_in_flight(&self) -> usize {
        self.frames_in_flight
    }

    /// Destroy every storage buffer
    pub fn destroy<D: GraphicsDevice>(&mut self, device: &D) {
        let live = self.slots.live_handles();
        for &handle in &live {
            if let Some(buffer) = self.buffers[usize::from(handle.index())].take() {
                for frame in &buffer.frames {
                    frame.buffer.destroy(device);
                }
            }
        }
        self.slots.destroy(&live);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::{Mat4, Vec3};
    use crate::render::backends::vulkan::mock::{Command, MockDevice};
    use ash::vk::Handle as _;

    struct Fixture {
        device: MockDevice,
        allocator: DescriptorAllocator,
        batch: DescriptorWriteBatch,
        instances: RenderInstanceManager,
    }

    fn fixture() -> Fixture {
        let pool_sizes = [vk::DescriptorPoolSize {
            ty: vk::DescriptorType::STORAGE_BUFFER,
            descriptor_count: 1,
        }];
        Fixture {
            device: MockDevice::new(),
            allocator: DescriptorAllocator::new(&pool_sizes, 8),
            batch: DescriptorWriteBatch::new(8, 0),
            instances: RenderInstanceManager::new(4, 2),
        }
    }

    fn register(f: &mut Fixture, capacity: usize) -> InstanceBufferHandle {
        f.instances
            .register(
                &f.device,
                vk::DescriptorSetLayout::from_raw(1),
                &mut f.allocator,
                &mut f.batch,
                capacity,
            )
            .unwrap()
    }

    /// One buffer and one set per frame in flight
    #[test]
    fn test_register_replicates_per_frame() {
        let mut f = fixture();
        let handle = register(&mut f, 16);

        assert_eq!(f.instances.capacity(handle), 16);
        assert_eq!(f.device.live("buffer"), 2);
        assert_eq!(f.batch.pending_count(), 2);
    }

    /// Registering into a nearly full batch flushes it first
    #[test]
    fn test_register_flushes_full_batch() {
        let mut f = fixture();
        f.batch = DescriptorWriteBatch::new(3, 0);
        register(&mut f, 4);
        register(&mut f, 4);

        assert_eq!(f.device.update_calls(), 1);
        assert_eq!(f.batch.pending_count(), 2);
    }

    #[test]
    fn test_update_targets_frame_buffer() {
        let mut f = fixture();
        let handle = register(&mut f, 4);
        f.batch.flush(&f.device);
        let frame_one = f.device.writes()[1].buffer.unwrap();

        let data = [InstanceData::from_transform(&Mat4::new_translation(
            &Vec3::new(1.0, 2.0, 3.0),
        ))];
        f.instances.update(&f.device, handle, 1, &data).unwrap();

        let stored = f.device.buffer_values::<InstanceData>(frame_one);
        assert_eq!(stored[0], data[0]);
    }

    #[test]
    #[should_panic(expected = "exceeds the capacity of 2")]
    fn test_update_over_capacity_panics() {
        let mut f = fixture();
        let handle = register(&mut f, 2);
        let data = vec![InstanceData::from_transform(&Mat4::identity()); 3];
        let _ = f.instances.update(&f.device, handle, 0, &data);
    }

    #[test]
    #[should_panic(expected = "out of range for 2 frames in flight")]
    fn test_update_invalid_frame_panics() {
        let mut f = fixture();
        let handle = register(&mut f, 2);
        let _ = f.instances.update(&f.device, handle, 2, &[]);
    }

    #[test]
    fn test_bind_uses_instance_set_index() {
        let mut f = fixture();
        let handle = register(&mut f, 2);
        let layout = vk::PipelineLayout::from_raw(9);

        f.instances
            .bind(&f.device, vk::CommandBuffer::from_raw(1), layout, handle, 0);

        let commands = f.device.take_commands();
        assert!(matches!(
            &commands[0],
            Command::BindDescriptorSets { first_set, sets, .. }
                if *first_set == INSTANCE_SET && sets.len() == 1
        ));
    }

    #[test]
    fn test_destroy_releases_buffers() {
        let mut f = fixture();
        let first = register(&mut f, 2);
        register(&mut f, 2);
        f.instances.destroy(&f.device);

        assert_eq!(f.device.live("buffer"), 0);
        assert!(!f.instances.is_valid(first));
    }
}
