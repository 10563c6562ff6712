//! Texture storage
//!
//! Holds RGBA8 images uploaded for sampling. Materials reference textures by
//! [`TextureHandle`] and bind them through [`TextureStorage::bind_to_descriptor`].

use std::path::Path;

use ash::vk;

use crate::foundation::{Handle, SlotArray};
use crate::render::backends::vulkan::{
    DescriptorWriteBatch, GpuImage, GraphicsDevice, VulkanError, VulkanResult,
};

/// How the texels of an image are meant to be interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextureFormatHint {
    /// Color data stored with the sRGB transfer function
    #[default]
    Gamma8,
    /// Non-color data such as normals or heights
    Linear8,
}

impl TextureFormatHint {
    /// Vulkan format of four 8-bit channels with this interpretation
    pub fn format(self) -> vk::Format {
        match self {
            Self::Gamma8 => vk::Format::R8G8B8A8_SRGB,
            Self::Linear8 => vk::Format::R8G8B8A8_UNORM,
        }
    }
}

/// Handle to a texture in a [`TextureStorage`]
pub type TextureHandle = Handle<GpuImage>;

/// Fixed-capacity storage of sampled images
#[derive(Debug)]
pub struct TextureStorage {
    slots: SlotArray<GpuImage>,
    images: Vec<Option<GpuImage>>,
}

impl TextureStorage {
    /// Create an empty storage with room for `capacity` textures
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: SlotArray::new(capacity),
            images: vec![None; capacity],
        }
    }

    /// Upload tightly packed RGBA8 texels
    ///
    /// # Panics
    /// When `rgba` is not exactly `width * height * 4` bytes or the storage
    /// is full.
    pub fn load_from_pixels<D: GraphicsDevice>(
        &mut self,
        device: &D,
        width: u32,
        height: u32,
        rgba: &[u8],
        hint: TextureFormatHint,
    ) -> VulkanResult<TextureHandle> {
        let expected = width as usize * height as usize * 4;
        assert_eq!(
            rgba.len(),
            expected,
            "Texture of {}x{} needs {} bytes of RGBA8 data",
            width,
            height,
            expected
        );

        let extent = vk::Extent2D { width, height };
        let image = device.create_texture_image(extent, hint.format(), rgba)?;

        let handle = self.slots.reserve();
        self.images[usize::from(handle.index())] = Some(image);
        log::debug!("Loaded texture {:?} ({}x{})", handle, width, height);
        Ok(handle)
    }

    /// Decode an image file to RGBA8 and upload it
    pub fn load_from_file<D: GraphicsDevice>(
        &mut self,
        device: &D,
        path: impl AsRef<Path>,
        hint: TextureFormatHint,
    ) -> VulkanResult<TextureHandle> {
        let path = path.as_ref();
        let decoded = image::open(path)
            .map_err(|e| VulkanError::AssetLoad {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?
            .to_rgba8();
        let (width, height) = decoded.dimensions();
        log::info!("Read {} ({}x{})", path.display(), width, height);
        self.load_from_pixels(device, width, height, decoded.as_raw(), hint)
    }

    /// Whether `handle` refers to a live texture
    pub fn is_valid(&self, handle: TextureHandle) -> bool {
        self.slots.is_valid(handle)
    }

    /// Image of a live handle
    pub fn get(&self, handle: TextureHandle) -> &GpuImage {
        self.slots.assert_valid(handle, "texture");
        self.images[usize::from(handle.index())]
            .as_ref()
            .unwrap_or_else(|| unreachable!("live texture slot {} is empty", handle.index()))
    }

    /// Queue a combined image sampler write for this texture
    pub fn bind_to_descriptor(
        &self,
        handle: TextureHandle,
        set: vk::DescriptorSet,
        binding: u32,
        sampler: vk::Sampler,
        batch: &mut DescriptorWriteBatch,
    ) {
        let image = self.get(handle);
        batch.write_image(
            set,
            binding,
            image.view,
            vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
            sampler,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        );
    }

    /// Destroy specific textures and free their slots
    ///
    /// Descriptor sets still referring to an unloaded texture must not be
    /// used for drawing afterwards.
    pub fn unload<D: GraphicsDevice>(&mut self, device: &D, handles: &[TextureHandle]) {
        for &handle in handles {
            self.slots.destroy(&[handle]);
            if let Some(image) = self.images[usize::from(handle.index())].take() {
                device.destroy_image(&image);
            }
            log::debug!("Unloaded texture {:?}", handle);
        }
    }

    /// Destroy every live texture
    pub fn destroy<D: GraphicsDevice>(&mut self, device: &D) {
        let live = self.slots.live_handles();
        self.unload(device, &live);
    }

    /// Number of live textures
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// True when no texture is loaded
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
