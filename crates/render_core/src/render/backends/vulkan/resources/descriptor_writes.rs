//! Batched descriptor set updates
//!
//! Resource loads queue their descriptor writes here instead of calling
//! `vkUpdateDescriptorSets` one by one. The frame loop flushes the batch once
//! before recording, so every set written since the previous frame is valid
//! by the time it is bound. Loaders call [`DescriptorWriteBatch::make_room`]
//! first so a full batch is flushed early instead of overflowing.

use ash::vk;

use crate::render::backends::vulkan::GraphicsDevice;

#[derive(Debug, Clone, Copy)]
enum PendingInfo {
    Buffer(usize),
    Image(usize),
}

#[derive(Debug, Clone, Copy)]
struct PendingWrite {
    set: vk::DescriptorSet,
    binding: u32,
    descriptor_type: vk::DescriptorType,
    info: PendingInfo,
}

/// Accumulator of pending buffer and image descriptor writes
#[derive(Debug)]
pub struct DescriptorWriteBatch {
    buffer_infos: Vec<vk::DescriptorBufferInfo>,
    image_infos: Vec<vk::DescriptorImageInfo>,
    writes: Vec<PendingWrite>,
    max_buffer_writes: usize,
    max_image_writes: usize,
}

impl DescriptorWriteBatch {
    /// Create a batch holding at most the given number of writes of each kind
    pub fn new(max_buffer_writes: usize, max_image_writes: usize) -> Self {
        Self {
            buffer_infos: Vec::with_capacity(max_buffer_writes),
            image_infos: Vec::with_capacity(max_image_writes),
            writes: Vec::with_capacity(max_buffer_writes + max_image_writes),
            max_buffer_writes,
            max_image_writes,
        }
    }

    /// Queue a buffer descriptor write
    ///
    /// # Panics
    /// When the buffer write capacity is used up; flush more often.
    pub fn write_buffer(
        &mut self,
        set: vk::DescriptorSet,
        binding: u32,
        buffer: vk::Buffer,
        descriptor_type: vk::DescriptorType,
        offset: vk::DeviceSize,
        range: vk::DeviceSize,
    ) {
        assert!(
            self.buffer_infos.len() < self.max_buffer_writes,
            "Descriptor write batch is full: {} pending buffer writes",
            self.max_buffer_writes
        );
        self.buffer_infos.push(vk::DescriptorBufferInfo {
            buffer,
            offset,
            range,
        });
        self.writes.push(PendingWrite {
            set,
            binding,
            descriptor_type,
            info: PendingInfo::Buffer(self.buffer_infos.len() - 1),
        });
    }

    /// Queue an image descriptor write
    ///
    /// # Panics
    /// When the image write capacity is used up; flush more often.
    pub fn write_image(
        &mut self,
        set: vk::DescriptorSet,
        binding: u32,
        image_view: vk::ImageView,
        descriptor_type: vk::DescriptorType,
        sampler: vk::Sampler,
        layout: vk::ImageLayout,
    ) {
        assert!(
            self.image_infos.len() < self.max_image_writes,
            "Descriptor write batch is full: {} pending image writes",
            self.max_image_writes
        );
        self.image_infos.push(vk::DescriptorImageInfo {
            sampler,
            image_view,
            image_layout: layout,
        });
        self.writes.push(PendingWrite {
            set,
            binding,
            descriptor_type,
            info: PendingInfo::Image(self.image_infos.len() - 1),
        });
    }

    /// Number of writes waiting for the next flush
    pub fn pending_count(&self) -> usize {
        self.writes.len()
    }

    /// Buffer writes that can still be queued before a flush is required
    pub fn remaining_buffer_writes(&self) -> usize {
        self.max_buffer_writes - self.buffer_infos.len()
    }

    /// Image writes that can still be queued before a flush is required
    pub fn remaining_image_writes(&self) -> usize {
        self.max_image_writes - self.image_infos.len()
    }

    /// Flush unless `buffer_writes` and `image_writes` more writes fit
    ///
    /// # Panics
    /// When the request exceeds the capacity of an empty batch.
    pub fn make_room<D: GraphicsDevice>(
        &mut self,
        device: &D,
        buffer_writes: usize,
        image_writes: usize,
    ) {
        assert!(
            buffer_writes <= self.max_buffer_writes && image_writes <= self.max_image_writes,
            "Descriptor write batch of {}/{} cannot hold {} buffer and {} image writes",
            self.max_buffer_writes,
            self.max_image_writes,
            buffer_writes,
            image_writes
        );
        if buffer_writes > self.remaining_buffer_writes()
            || image_writes > self.remaining_image_writes()
        {
            self.flush(device);
        }
    }

    /// Apply every pending write in one device call and empty the batch
    ///
    /// An empty batch makes no device call.
    pub fn flush<D: GraphicsDevice>(&mut self, device: &D) {
        if self.writes.is_empty() {
            return;
        }

        let writes: Vec<vk::WriteDescriptorSet> = self
            .writes
            .iter()
            .map(|pending| {
                let write = vk::WriteDescriptorSet::builder()
                    .dst_set(pending.set)
                    .dst_binding(pending.binding)
                    .dst_array_element(0)
                    .descriptor_type(pending.descriptor_type);
                match pending.info {
                    PendingInfo::Buffer(index) => write
                        .buffer_info(std::slice::from_ref(&self.buffer_infos[index]))
                        .build(),
                    PendingInfo::Image(index) => write
                        .image_info(std::slice::from_ref(&self.image_infos[index]))
                        .build(),
                }
            })
            .collect();

        log::debug!("Flushing {} descriptor writes", writes.len());
        device.update_descriptor_sets(&writes);
        self.clear();
    }

    /// Drop every pending write without applying it
    pub fn clear(&mut self) {
        self.writes.clear();
        self.buffer_infos.clear();
        self.image_infos.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::backends::vulkan::mock::MockDevice;
    use ash::vk::Handle;

    fn set(raw: u64) -> vk::DescriptorSet {
        vk::DescriptorSet::from_raw(raw)
    }

    #[test]
    fn test_flush_applies_all_writes_in_one_call() {
        let device = MockDevice::new();
        let mut batch = DescriptorWriteBatch::new(4, 4);

        batch.write_buffer(
            set(1),
            0,
            vk::Buffer::from_raw(10),
            vk::DescriptorType::UNIFORM_BUFFER,
            0,
            64,
        );
        batch.write_image(
            set(1),
            1,
            vk::ImageView::from_raw(20),
            vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
            vk::Sampler::from_raw(30),
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        );
        batch.write_buffer(
            set(2),
            0,
            vk::Buffer::from_raw(11),
            vk::DescriptorType::STORAGE_BUFFER,
            0,
            vk::WHOLE_SIZE,
        );
        assert_eq!(batch.pending_count(), 3);

        batch.flush(&device);

        assert_eq!(device.update_calls(), 1);
        let writes = device.writes();
        assert_eq!(writes.len(), 3);
        assert_eq!(writes[0].buffer, Some(vk::Buffer::from_raw(10)));
        assert_eq!(writes[1].image_view, Some(vk::ImageView::from_raw(20)));
        assert_eq!(writes[1].binding, 1);
        assert_eq!(writes[2].set, set(2));
        assert_eq!(writes[2].descriptor_type, vk::DescriptorType::STORAGE_BUFFER);
    }

    /// A second flush with nothing queued is a no-op
    #[test]
    fn test_flush_twice_is_safe() {
        let device = MockDevice::new();
        let mut batch = DescriptorWriteBatch::new(2, 2);
        batch.write_buffer(
            set(1),
            0,
            vk::Buffer::from_raw(10),
            vk::DescriptorType::UNIFORM_BUFFER,
            0,
            16,
        );

        batch.flush(&device);
        assert_eq!(batch.pending_count(), 0);
        batch.flush(&device);

        assert_eq!(device.update_calls(), 1);
        assert_eq!(device.writes().len(), 1);
    }

    /// Capacity is available again after a flush
    #[test]
    fn test_capacity_restored_after_flush() {
        let device = MockDevice::new();
        let mut batch = DescriptorWriteBatch::new(1, 1);
        for round in 0..3 {
            batch.write_buffer(
                set(round),
                0,
                vk::Buffer::from_raw(10),
                vk::DescriptorType::UNIFORM_BUFFER,
                0,
                16,
            );
            batch.flush(&device);
        }
        assert_eq!(device.update_calls(), 3);
    }

    #[test]
    fn test_remaining_writes_track_pending() {
        let device = MockDevice::new();
        let mut batch = DescriptorWriteBatch::new(2, 3);
        batch.write_image(
            set(1),
            1,
            vk::ImageView::from_raw(20),
            vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
            vk::Sampler::from_raw(30),
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        );
        assert_eq!(batch.remaining_buffer_writes(), 2);
        assert_eq!(batch.remaining_image_writes(), 2);

        batch.flush(&device);
        assert_eq!(batch.remaining_image_writes(), 3);
    }

    /// Only flushes when the requested writes would not fit
    #[test]
    fn test_make_room_flushes_when_full() {
        let device = MockDevice::new();
        let mut batch = DescriptorWriteBatch::new(2, 2);
        batch.write_buffer(
            set(1),
            0,
            vk::Buffer::from_raw(10),
            vk::DescriptorType::UNIFORM_BUFFER,
            0,
            16,
        );

        batch.make_room(&device, 1, 2);
        assert_eq!(device.update_calls(), 0);
        assert_eq!(batch.pending_count(), 1);

        batch.make_room(&device, 2, 0);
        assert_eq!(device.update_calls(), 1);
        assert_eq!(batch.pending_count(), 0);
    }

    #[test]
    #[should_panic(expected = "cannot hold")]
    fn test_make_room_beyond_capacity_panics() {
        let device = MockDevice::new();
        let mut batch = DescriptorWriteBatch::new(2, 2);
        batch.make_room(&device, 0, 3);
    }

    #[test]
    #[should_panic(expected = "pending buffer writes")]
    fn test_buffer_overflow_panics() {
        let mut batch = DescriptorWriteBatch::new(1, 1);
        for _ in 0..2 {
            batch.write_buffer(
                set(1),
                0,
                vk::Buffer::from_raw(10),
                vk::DescriptorType::UNIFORM_BUFFER,
                0,
                16,
            );
        }
    }

    #[test]
    #[should_panic(expected = "pending image writes")]
    fn test_image_overflow_panics() {
        let mut batch = DescriptorWriteBatch::new(4, 0);
        batch.write_image(
            set(1),
            1,
            vk::ImageView::from_raw(20),
            vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
            vk::Sampler::from_raw(30),
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        );
    }
}
