//! Lazily compiled pipeline variants
//!
//! Pipelines are compiled the first time a key is requested and kept until
//! the cache is destroyed. Regular and instanced draws use separate layouts
//! and vertex shaders, so each kind has its own map.

use std::collections::HashMap;

use ash::vk;

use crate::render::backends::vulkan::{GraphicsDevice, VulkanResult};
use crate::render::pipelines::pipeline_template::{create_variant, PipelineTemplate, VariantShaders};
use crate::render::pipelines::specialization::PipelineVariantKey;

/// Which family of pipelines a draw needs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineKind {
    /// One object per draw, transform in push constants
    Regular,
    /// Many objects per draw, transforms in a storage buffer
    Instanced,
}

#[derive(Debug)]
struct PipelineFamily {
    layout: vk::PipelineLayout,
    shaders: VariantShaders,
    variants: HashMap<PipelineVariantKey, vk::Pipeline>,
}

impl PipelineFamily {
    fn new(layout: vk::PipelineLayout, shaders: VariantShaders) -> Self {
        Self {
            layout,
            shaders,
            variants: HashMap::new(),
        }
    }
}

/// `key -> pipeline` maps for both pipeline kinds
#[derive(Debug)]
pub struct PipelineVariantCache {
    template: PipelineTemplate,
    render_pass: vk::RenderPass,
    regular: PipelineFamily,
    instanced: PipelineFamily,
}

impl PipelineVariantCache {
    /// Create an empty cache; nothing is compiled until requested
    pub fn new(
        template: PipelineTemplate,
        render_pass: vk::RenderPass,
        regular: (vk::PipelineLayout, VariantShaders),
        instanced: (vk::PipelineLayout, VariantShaders),
    ) -> Self {
        Self {
            template,
            render_pass,
            regular: PipelineFamily::new(regular.0, regular.1),
            instanced: PipelineFamily::new(instanced.0, instanced.1),
        }
    }

    fn family(&self, kind: PipelineKind) -> &PipelineFamily {
        match kind {
            PipelineKind::Regular => &self.regular,
            PipelineKind::Instanced => &self.instanced,
        }
    }

    /// Pipeline for `key`, compiling it on first use
    pub fn get_or_create<D: GraphicsDevice>(
        &mut self,
        device: &D,
        kind: PipelineKind,
        key: PipelineVariantKey,
    ) -> VulkanResult<vk::Pipeline> {
        let family = match kind {
            PipelineKind::Regular => &mut self.regular,
            PipelineKind::Instanced => &mut self.instanced,
        };
        if let Some(&pipeline) = family.variants.get(&key) {
            return Ok(pipeline);
        }

        let pipeline = create_variant(
            device,
            &self.template,
            key,
            self.render_pass,
            family.layout,
            family.shaders,
        )?;
        family.variants.insert(key, pipeline);
        log::info!(
            "Compiled {:?} pipeline for {:?} ({} cached)",
            kind,
            key,
            family.variants.len()
        );
        Ok(pipeline)
    }

    /// Already compiled pipeline for `key`
    pub fn get(&self, kind: PipelineKind, key: PipelineVariantKey) -> Option<vk::Pipeline> {
        self.family(kind).variants.get(&key).copied()
    }

    /// Pipeline layout shared by every pipeline of `kind`
    pub fn layout(&self, kind: PipelineKind) -> vk::PipelineLayout {
        self.family(kind).layout
    }

    /// Number of compiled pipelines of `kind`
    pub fn len(&self, kind: PipelineKind) -> usize {
        self.family(kind).variants.len()
    }

    /// Destroy every compiled pipeline
    pub fn destroy<D: GraphicsDevice>(&mut self, device: &D) {
        for family in [&mut self.regular, &mut self.instanced] {
            for (_, pipeline) in family.variants.drain() {
                device.destroy_pipeline(pipeline);
            }
        }
    }
}
