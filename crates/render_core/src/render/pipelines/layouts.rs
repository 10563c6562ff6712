//! Descriptor set layouts and pipeline layouts shared by every pipeline
//!
//! | set | contents                                             |
//! |-----|------------------------------------------------------|
//! | 0   | scene uniform                                        |
//! | 1   | material uniform + albedo/normal/displacement/emission |
//! | 2   | instance storage buffer (instanced pipelines only)   |

use std::mem::size_of;

use ash::vk;

use crate::render::backends::vulkan::{
    DescriptorAllocator, DescriptorSetLayout, DescriptorSetLayoutBuilder, GraphicsDevice,
    VulkanResult,
};
use crate::render::pipelines::variant_cache::PipelineKind;
use crate::render::shader_data::GpuPushConstants;

/// Set index of the per-frame scene data
pub const GLOBAL_SET: u32 = 0;
/// Set index of material data
pub const MATERIAL_SET: u32 = 1;
/// Set index of per-instance data
pub const INSTANCE_SET: u32 = 2;

/// Material set binding of each optional texture map, in inclusion bit order
pub const MATERIAL_TEXTURE_BINDINGS: [u32; 4] = [1, 2, 3, 4];

/// Stages that read the regular pipeline's push constants
pub const PUSH_CONSTANT_STAGES: vk::ShaderStageFlags = vk::ShaderStageFlags::VERTEX;

/// Set layouts plus the regular and instanced pipeline layouts built on them
#[derive(Debug)]
pub struct PipelineLayouts {
    global: DescriptorSetLayout,
    material: DescriptorSetLayout,
    instance: DescriptorSetLayout,
    regular: vk::PipelineLayout,
    instanced: vk::PipelineLayout,
}

impl PipelineLayouts {
    /// Create every layout
    pub fn new<D: GraphicsDevice>(device: &D) -> VulkanResult<Self> {
        let global = DescriptorSetLayoutBuilder::new()
            .add_uniform_buffer(0, vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT)
            .build(device)?;

        let mut material_builder = DescriptorSetLayoutBuilder::new()
            .add_uniform_buffer(0, vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT);
        for binding in MATERIAL_TEXTURE_BINDINGS {
            material_builder = material_builder.add_combined_image_sampler(
                binding,
                vk::ShaderStageFlags::FRAGMENT,
            );
        }
        let material = material_builder.build(device)?;

        let instance = DescriptorSetLayoutBuilder::new()
            .add_storage_buffer(0, vk::ShaderStageFlags::VERTEX)
            .build(device)?;

        let push_constants = [vk::PushConstantRange {
            stage_flags: PUSH_CONSTANT_STAGES,
            offset: 0,
            size: size_of::<GpuPushConstants>() as u32,
        }];
        let regular =
            device.create_pipeline_layout(&[global.handle(), material.handle()], &push_constants)?;
        let instanced = device.create_pipeline_layout(
            &[global.handle(), material.handle(), instance.handle()],
            &[],
        )?;

        log::debug!("Created pipeline layouts");
        Ok(Self {
            global,
            material,
            instance,
            regular,
            instanced,
        })
    }

    /// Layout of set 0
    pub fn global(&self) -> &DescriptorSetLayout {
        &self.global
    }

    /// Layout of set 1
    pub fn material(&self) -> &DescriptorSetLayout {
        &self.material
    }

    /// Layout of set 2
    pub fn instance(&self) -> &DescriptorSetLayout {
        &self.instance
    }

    /// Pipeline layout of `kind`
    pub fn pipeline_layout(&self, kind: PipelineKind) -> vk::PipelineLayout {
        match kind {
            PipelineKind::Regular => self.regular,
            PipelineKind::Instanced => self.instanced,
        }
    }

    /// Destroy pipeline layouts and set layouts
    pub fn destroy<D: GraphicsDevice>(&self, device: &D) {
        device.destroy_pipeline_layout(self.regular);
        device.destroy_pipeline_layout(self.instanced);
        self.global.destroy(device);
        self.material.destroy(device);
        self.instance.destroy(device);
    }
}

/// One descriptor allocator per set kind
#[derive(Debug)]
pub struct DescriptorAllocators {
    /// Sets of layout 0
    pub global: DescriptorAllocator,
    /// Sets of layout 1
    pub material: DescriptorAllocator,
    /// Sets of layout 2
    pub instance: DescriptorAllocator,
}

impl DescriptorAllocators {
    /// Allocators sized from each layout's quota
    pub fn new(layouts: &PipelineLayouts, sets_per_pool: u32) -> Self {
        Self {
            global: DescriptorAllocator::new(&layouts.global.pool_sizes(), sets_per_pool),
            material: DescriptorAllocator::new(&layouts.material.pool_sizes(), sets_per_pool),
            instance: DescriptorAllocator::new(&layouts.instance.pool_sizes(), sets_per_pool),
        }
    }

    /// Destroy every backing pool
    pub fn destroy<D: GraphicsDevice>(&mut self, device: &D) {
        self.global.destroy(device);
        self.material.destroy(device);
        self.instance.destroy(device);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::backends::vulkan::mock::MockDevice;

    #[test]
    fn test_material_layout_bindings() {
        let device = MockDevice::new();
        let layouts = PipelineLayouts::new(&device).unwrap();

        let bindings = layouts.material().bindings();
        assert_eq!(bindings.len(), 5);
        assert_eq!(bindings[0].descriptor_type, vk::DescriptorType::UNIFORM_BUFFER);
        for (binding, expected) in bindings[1..].iter().zip(MATERIAL_TEXTURE_BINDINGS) {
            assert_eq!(binding.binding, expected);
            assert_eq!(
                binding.descriptor_type,
                vk::DescriptorType::COMBINED_IMAGE_SAMPLER
            );
        }
        assert_eq!(
            layouts.instance().bindings()[0].descriptor_type,
            vk::DescriptorType::STORAGE_BUFFER
        );
        assert_ne!(
            layouts.pipeline_layout(PipelineKind::Regular),
            layouts.pipeline_layout(PipelineKind::Instanced)
        );
    }

    /// Teardown releases every layout object
    #[test]
    fn test_destroy_layouts() {
        let device = MockDevice::new();
        let layouts = PipelineLayouts::new(&device).unwrap();
        let mut allocators = DescriptorAllocators::new(&layouts, 8);
        allocators
            .material
            .allocate(&device, layouts.material().handle(), 2)
            .unwrap();

        allocators.destroy(&device);
        layouts.destroy(&device);
        assert_eq!(device.live("pipeline_layout"), 0);
        assert_eq!(device.live("descriptor_set_layout"), 0);
        assert_eq!(device.live("descriptor_pool"), 0);
    }
}
