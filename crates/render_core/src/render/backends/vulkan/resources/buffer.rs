//! Host-visible buffers typed by element and descriptor kind
//!
//! `UniformBuffer<T>` and `StorageBuffer<T>` share one implementation; the
//! kind marker only selects the usage flags and the descriptor type written
//! by [`TypedBuffer::bind`].

use std::marker::PhantomData;
use std::mem;

use ash::vk;
use bytemuck::Pod;

use crate::render::backends::vulkan::{
    DescriptorWriteBatch, GpuBuffer, GraphicsDevice, MemoryLocation, VulkanResult,
};

/// Selects how a [`TypedBuffer`] is used by shaders
pub trait BufferKind {
    /// Buffer usage flags
    const USAGE: vk::BufferUsageFlags;
    /// Descriptor type used when binding
    const DESCRIPTOR_TYPE: vk::DescriptorType;
}

/// Uniform buffer kind
#[derive(Debug)]
pub struct Uniform;

impl BufferKind for Uniform {
    const USAGE: vk::BufferUsageFlags = vk::BufferUsageFlags::UNIFORM_BUFFER;
    const DESCRIPTOR_TYPE: vk::DescriptorType = vk::DescriptorType::UNIFORM_BUFFER;
}

/// Storage buffer kind
#[derive(Debug)]
pub struct Storage;

impl BufferKind for Storage {
    const USAGE: vk::BufferUsageFlags = vk::BufferUsageFlags::STORAGE_BUFFER;
    const DESCRIPTOR_TYPE: vk::DescriptorType = vk::DescriptorType::STORAGE_BUFFER;
}

/// Buffer of `count` values of `T`
#[derive(Debug)]
pub struct TypedBuffer<T, K> {
    buffer: GpuBuffer,
    count: usize,
    _marker: PhantomData<(fn() -> T, K)>,
}

/// Uniform buffer of `T`
pub type UniformBuffer<T> = TypedBuffer<T, Uniform>;

/// Storage buffer of `T`
pub type StorageBuffer<T> = TypedBuffer<T, Storage>;

impl<T: Pod, K: BufferKind> TypedBuffer<T, K> {
    /// Allocate room for `count` elements
    pub fn create<D: GraphicsDevice>(device: &D, count: usize) -> VulkanResult<Self> {
        assert!(count > 0, "A typed buffer must hold at least one element");
        let size = (count * mem::size_of::<T>()) as vk::DeviceSize;
        let buffer = device.create_buffer(size, K::USAGE, MemoryLocation::HostVisible)?;
        Ok(Self {
            buffer,
            count,
            _marker: PhantomData,
        })
    }

    /// Overwrite the first `data.len()` elements
    ///
    /// # Panics
    /// When `data` holds more elements than the buffer.
    pub fn update<D: GraphicsDevice>(&self, device: &D, data: &[T]) -> VulkanResult<()> {
        assert!(
            data.len() <= self.count,
            "Writing {} elements into a buffer of {}",
            data.len(),
            self.count
        );
        if data.is_empty() {
            return Ok(());
        }
        device.write_buffer(&self.buffer, 0, bytemuck::cast_slice(data))
    }

    /// Overwrite the element at `index`
    pub fn update_one<D: GraphicsDevice>(
        &self,
        device: &D,
        index: usize,
        value: &T,
    ) -> VulkanResult<()> {
        assert!(
            index < self.count,
            "Element index {} out of range [0, {})",
            index,
            self.count
        );
        let offset = (index * mem::size_of::<T>()) as vk::DeviceSize;
        device.write_buffer(&self.buffer, offset, bytemuck::bytes_of(value))
    }

    /// Queue a descriptor write covering the whole buffer
    pub fn bind(&self, batch: &mut DescriptorWriteBatch, set: vk::DescriptorSet, binding: u32) {
        batch.write_buffer(
            set,
            binding,
            self.buffer.buffer,
            K::DESCRIPTOR_TYPE,
            0,
            self.buffer.size,
        );
    }

    /// Release the buffer
    pub fn destroy<D: GraphicsDevice>(&self, device: &D) {
        device.destroy_buffer(&self.buffer);
    }

    /// Raw buffer handle
    pub fn handle(&self) -> vk::Buffer {
        self.buffer.buffer
    }

    /// Element capacity
    pub fn count(&self) -> usize {
        self.count
    }
}
