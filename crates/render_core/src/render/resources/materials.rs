//! Material storage
//!
//! A material is one descriptor set of the material layout: a uniform buffer
//! of [`GpuMaterialProperties`] at binding 0 and up to four optional texture
//! maps. Which maps are present decides the material's
//! [`PipelineVariantKey`].
//!
//! Descriptor sets are never freed one by one. They go back to their pool
//! when the material allocator's pools are cleared.

use ash::vk;

use crate::foundation::{Handle, SlotArray};
use crate::render::backends::vulkan::{
    DescriptorAllocator, DescriptorWriteBatch, GraphicsDevice, UniformBuffer, VulkanError,
    VulkanResult,
};
use crate::render::pipelines::layouts::{MATERIAL_SET, MATERIAL_TEXTURE_BINDINGS};
use crate::render::pipelines::specialization::{PipelineVariantKey, SamplerInclusion};
use crate::render::resources::textures::{TextureHandle, TextureStorage};
use crate::render::shader_data::GpuMaterialProperties;

/// Textures and properties of a new material
#[derive(Debug, Clone, Copy, Default)]
pub struct MaterialCreateInfo {
    /// Base color map
    pub albedo: Option<TextureHandle>,
    /// Tangent-space normal map
    pub normal: Option<TextureHandle>,
    /// Height map used for parallax mapping
    pub displacement: Option<TextureHandle>,
    /// Emitted color map
    pub emission: Option<TextureHandle>,
    /// Uniform properties
    pub properties: GpuMaterialProperties,
}

impl MaterialCreateInfo {
    /// Material with only uniform properties
    pub fn new(properties: GpuMaterialProperties) -> Self {
        Self {
            properties,
            ..Self::default()
        }
    }

    /// Number of textures this material samples
    pub fn texture_count(&self) -> usize {
        self.texture_slots()
            .iter()
            .filter(|(_, texture)| texture.is_some())
            .count()
    }

    fn texture_slots(&self) -> [(SamplerInclusion, Option<TextureHandle>); 4] {
        [
            (SamplerInclusion::ALBEDO, self.albedo),
            (SamplerInclusion::NORMAL, self.normal),
            (SamplerInclusion::DISPLACEMENT, self.displacement),
            (SamplerInclusion::EMISSION, self.emission),
        ]
    }

    /// Maps this material provides
    pub fn sampler_inclusion(&self) -> SamplerInclusion {
        self.texture_slots()
            .iter()
            .filter(|(_, texture)| texture.is_some())
            .fold(SamplerInclusion::empty(), |acc, &(flag, _)| acc | flag)
    }
}

/// GPU side of one material
#[derive(Debug)]
pub struct Material {
    set: vk::DescriptorSet,
    uniform: UniformBuffer<GpuMaterialProperties>,
    variant: PipelineVariantKey,
}

/// Handle to a material in a [`MaterialStorage`]
pub type MaterialHandle = Handle<Material>;

/// Fixed-capacity storage of materials
#[derive(Debug)]
pub struct MaterialStorage {
    slots: SlotArray<Material>,
    materials: Vec<Option<Material>>,
}

impl MaterialStorage {
    /// Create an empty storage with room for `capacity` materials
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: SlotArray::new(capacity),
            materials: (0..capacity).map(|_| None).collect(),
        }
    }

    /// Create a material and queue the writes filling its descriptor set
    ///
    /// The set is usable once `batch` has been flushed. A batch without room
    /// for this material's writes is flushed first.
    ///
    /// # Panics
    /// When the storage is full or a texture handle is invalid.
    #[allow(clippy::too_many_arguments)]
    pub fn create<D: GraphicsDevice>(
        &mut self,
        device: &D,
        textures: &TextureStorage,
        info: &MaterialCreateInfo,
        set_layout: vk::DescriptorSetLayout,
        sampler: vk::Sampler,
        allocator: &mut DescriptorAllocator,
        batch: &mut DescriptorWriteBatch,
    ) -> VulkanResult<MaterialHandle> {
        let uniform = UniformBuffer::<GpuMaterialProperties>::create(device, 1)?;
        let set = match Self::allocate_set(device, &uniform, info, set_layout, allocator) {
            Ok(set) => set,
            Err(e) => {
                uniform.destroy(device);
                return Err(e);
            }
        };

        batch.make_room(device, 1, info.texture_count());
        uniform.bind(batch, set, 0);
        for ((_, texture), binding) in info.texture_slots().iter().zip(MATERIAL_TEXTURE_BINDINGS) {
            if let Some(texture) = texture {
                textures.bind_to_descriptor(*texture, set, binding, sampler, batch);
            }
        }

        let variant = PipelineVariantKey::new(info.sampler_inclusion());
        let handle = self.slots.reserve();
        self.materials[usize::from(handle.index())] = Some(Material {
            set,
            uniform,
            variant,
        });
        log::debug!("Created material {:?} ({:?})", handle, variant.sampler_inclusion);
        Ok(handle)
    }

    fn allocate_set<D: GraphicsDevice>(
        device: &D,
        uniform: &UniformBuffer<GpuMaterialProperties>,
        info: &MaterialCreateInfo,
        set_layout: vk::DescriptorSetLayout,
        allocator: &mut DescriptorAllocator,
    ) -> VulkanResult<vk::DescriptorSet> {
        uniform.update(device, &[info.properties])?;
        allocator
            .allocate(device, set_layout, 1)?
            .into_iter()
            .next()
            .ok_or_else(|| VulkanError::InvalidOperation {
                reason: "Descriptor allocation returned no set".to_string(),
            })
    }

    fn get(&self, handle: MaterialHandle) -> &Material {
        self.slots.assert_valid(handle, "material");
        self.materials[usize::from(handle.index())]
            .as_ref()
            .unwrap_or_else(|| unreachable!("live material slot {} is empty", handle.index()))
    }

    /// Whether `handle` refers to a live material
    pub fn is_valid(&self, handle: MaterialHandle) -> bool {
        self.slots.is_valid(handle)
    }

    /// Bind the material's set at the material set index
    pub fn bind<D: GraphicsDevice>(
        &self,
        device: &D,
        command_buffer: vk::CommandBuffer,
        layout: vk::PipelineLayout,
        handle: MaterialHandle,
    ) {
        let material = self.get(handle);
        device.cmd_bind_descriptor_sets(command_buffer, layout, MATERIAL_SET, &[material.set]);
    }

    /// Overwrite the uniform properties
    pub fn update<D: GraphicsDevice>(
        &self,
        device: &D,
        handle: MaterialHandle,
        properties: &GpuMaterialProperties,
    ) -> VulkanResult<()> {
        self.get(handle).uniform.update(device, std::slice::from_ref(properties))
    }

    /// Pipeline variant the material must be drawn with
    pub fn variant(&self, handle: MaterialHandle) -> PipelineVariantKey {
        self.get(handle).variant
    }

    /// Descriptor set of a live material
    pub fn descriptor_set(&self, handle: MaterialHandle) -> vk::DescriptorSet {
        self.get(handle).set
    }

    /// Release the uniform buffers of specific materials and free their slots
    ///
    /// Pending writes are flushed first, while the buffers they reference
    /// are still alive.
    pub fn unload<D: GraphicsDevice>(
        &mut self,
        device: &D,
        batch: &mut DescriptorWriteBatch,
        handles: &[MaterialHandle],
    ) {
        batch.flush(device);
        self.release(device, handles);
    }

    fn release<D: GraphicsDevice>(&mut self, device: &D, handles: &[MaterialHandle]) {
        for &handle in handles {
            self.slots.destroy(&[handle]);
            if let Some(material) = self.materials[usize::from(handle.index())].take() {
                material.uniform.destroy(device);
            }
            log::debug!("Unloaded material {:?}", handle);
        }
    }

    /// Release every live material; pending writes must have been dropped
    pub fn destroy<D: GraphicsDevice>(&mut self, device: &D) {
        let live = self.slots.live_handles();
        self.release(device, &live);
    }

    /// Number of live materials
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// True when no material exists
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::backends::vulkan::mock::{Command, MockDevice};
    use crate::render::pipelines::layouts::PipelineLayouts;
    use crate::render::resources::textures::TextureFormatHint;
    use ash::vk::Handle as _;

    struct Fixture {
        device: MockDevice,
        layouts: PipelineLayouts,
        allocator: DescriptorAllocator,
        batch: DescriptorWriteBatch,
        textures: TextureStorage,
        materials: MaterialStorage,
    }

    impl Fixture {
        fn new() -> Self {
            let device = MockDevice::new();
            let layouts = PipelineLayouts::new(&device).unwrap();
            let allocator = DescriptorAllocator::new(&layouts.material().pool_sizes(), 4);
            Self {
                device,
                layouts,
                allocator,
                batch: DescriptorWriteBatch::new(16, 16),
                textures: TextureStorage::new(4),
                materials: MaterialStorage::new(4),
            }
        }

        fn texture(&mut self) -> TextureHandle {
            self.textures
                .load_from_pixels(&self.device, 1, 1, &[255; 4], TextureFormatHint::Gamma8)
                .unwrap()
        }

        fn create(&mut self, info: &MaterialCreateInfo) -> MaterialHandle {
            self.materials
                .create(
                    &self.device,
                    &self.textures,
                    info,
                    self.layouts.material().handle(),
                    vk::Sampler::from_raw(77),
                    &mut self.allocator,
                    &mut self.batch,
                )
                .unwrap()
        }
    }

    /// Only present textures are written, each at its own binding
    #[test]
    fn test_create_writes_present_bindings() {
        let mut f = Fixture::new();
        let albedo = f.texture();
        let emission = f.texture();
        let info = MaterialCreateInfo {
            albedo: Some(albedo),
            emission: Some(emission),
            ..MaterialCreateInfo::default()
        };

        let material = f.create(&info);
        f.batch.flush(&f.device);

        let bindings: Vec<u32> = f.device.writes().iter().map(|w| w.binding).collect();
        assert_eq!(bindings, vec![0, 1, 4]);
        assert_eq!(
            f.materials.variant(material).sampler_inclusion,
            SamplerInclusion::ALBEDO | SamplerInclusion::EMISSION
        );
    }

    #[test]
    fn test_properties_uploaded_and_updated() {
        let mut f = Fixture::new();
        let properties = GpuMaterialProperties {
            shininess: 8.0,
            ..GpuMaterialProperties::default()
        };
        let material = f.create(&MaterialCreateInfo::new(properties));
        f.batch.flush(&f.device);

        let uniform = f.device.writes()[0].buffer.unwrap();
        assert_eq!(
            f.device.buffer_values::<GpuMaterialProperties>(uniform),
            vec![properties]
        );

        let updated = GpuMaterialProperties {
            shininess: 64.0,
            ..properties
        };
        f.materials.update(&f.device, material, &updated).unwrap();
        assert_eq!(
            f.device.buffer_values::<GpuMaterialProperties>(uniform),
            vec![updated]
        );
    }

    #[test]
    fn test_bind_uses_material_set_index() {
        let mut f = Fixture::new();
        let material = f.create(&MaterialCreateInfo::default());
        let layout = vk::PipelineLayout::from_raw(5);

        f.materials
            .bind(&f.device, vk::CommandBuffer::from_raw(1), layout, material);

        assert_eq!(
            f.device.take_commands(),
            vec![Command::BindDescriptorSets {
                layout,
                first_set: MATERIAL_SET,
                sets: vec![f.materials.descriptor_set(material)],
            }]
        );
    }

    #[test]
    #[should_panic(expected = "Using a material with an invalid handle")]
    fn test_update_unloaded_material_panics() {
        let mut f = Fixture::new();
        let material = f.create(&MaterialCreateInfo::default());
        f.materials.unload(&f.device, &mut f.batch, &[material]);
        let _ = f
            .materials
            .update(&f.device, material, &GpuMaterialProperties::default());
    }

    /// More materials than one pool holds spill into a second pool
    #[test]
    fn test_materials_span_pools() {
        let mut f = Fixture::new();
        f.materials = MaterialStorage::new(8);
        for _ in 0..6 {
            f.create(&MaterialCreateInfo::default());
        }
        assert_eq!(f.device.pools_created(), 2);
        assert_eq!(f.materials.len(), 6);
    }

    /// A batch too full for the next material is flushed instead of overflowing
    #[test]
    fn test_create_flushes_full_batch() {
        let mut f = Fixture::new();
        f.batch = DescriptorWriteBatch::new(2, 4);
        let texture = f.texture();
        let info = MaterialCreateInfo {
            albedo: Some(texture),
            normal: Some(texture),
            displacement: Some(texture),
            emission: Some(texture),
            ..MaterialCreateInfo::default()
        };
        assert_eq!(info.texture_count(), 4);

        for _ in 0..3 {
            f.create(&info);
        }

        assert_eq!(f.device.update_calls(), 2);
        assert_eq!(f.device.writes().len(), 10);
        assert_eq!(f.batch.pending_count(), 5);
    }

    /// Writes queued for a material land before its uniform is destroyed
    #[test]
    fn test_unload_flushes_pending_writes() {
        let mut f = Fixture::new();
        let material = f.create(&MaterialCreateInfo::default());
        let set = f.materials.descriptor_set(material);

        f.materials.unload(&f.device, &mut f.batch, &[material]);

        assert_eq!(f.batch.pending_count(), 0);
        let writes = f.device.writes();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].set, set);
        assert!(writes[0].buffer.is_some());
        assert_eq!(f.device.live("buffer"), 0);
    }

    #[test]
    fn test_destroy_releases_uniforms() {
        let mut f = Fixture::new();
        let texture = f.texture();
        f.create(&MaterialCreateInfo {
            normal: Some(texture),
            ..MaterialCreateInfo::default()
        });
        f.create(&MaterialCreateInfo::default());
        assert_eq!(f.device.live("buffer"), 2);

        f.materials.destroy(&f.device);
        assert_eq!(f.device.live("buffer"), 0);
        assert!(f.materials.is_empty());
    }
}
