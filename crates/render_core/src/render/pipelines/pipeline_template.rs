//! Variant-independent graphics pipeline state
//!
//! [`PipelineTemplate`] holds every piece of fixed-function state shared by
//! all material pipelines. [`create_variant`] combines it with a
//! [`PipelineVariantKey`] passed as fragment specialization data.

use std::ffi::CStr;

use ash::vk;

use crate::render::backends::vulkan::{GraphicsDevice, VulkanResult};
use crate::render::pipelines::specialization::PipelineVariantKey;
use crate::render::vertex_layout::VulkanVertexLayout;

const SHADER_ENTRY: &[u8] = b"main\0";

/// Fixed-function state reused by every pipeline variant
#[derive(Debug, Clone)]
pub struct PipelineTemplate {
    dynamic_states: Vec<vk::DynamicState>,
    vertex_binding: vk::VertexInputBindingDescription,
    vertex_attributes: Vec<vk::VertexInputAttributeDescription>,
    input_assembly: vk::PipelineInputAssemblyStateCreateInfo,
    rasterizer: vk::PipelineRasterizationStateCreateInfo,
    multisampling: vk::PipelineMultisampleStateCreateInfo,
    blend_constants: [f32; 4],
    color_blend_attachment: vk::PipelineColorBlendAttachmentState,
    depth_stencil: vk::PipelineDepthStencilStateCreateInfo,
}

impl PipelineTemplate {
    /// Build the default state for a render pass using `samples` per pixel
    ///
    /// Viewport and scissor are dynamic, triangles are back-face culled with
    /// counter-clockwise front faces and colors are alpha blended.
    pub fn create_default(samples: vk::SampleCountFlags) -> Self {
        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::builder()
            .topology(vk::PrimitiveTopology::TRIANGLE_LIST)
            .primitive_restart_enable(false)
            .build();

        let rasterizer = vk::PipelineRasterizationStateCreateInfo::builder()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(vk::PolygonMode::FILL)
            .cull_mode(vk::CullModeFlags::BACK)
            .front_face(vk::FrontFace::COUNTER_CLOCKWISE)
            .depth_bias_enable(false)
            .line_width(1.0)
            .build();

        let multisampling = vk::PipelineMultisampleStateCreateInfo::builder()
            .rasterization_samples(samples)
            .sample_shading_enable(true)
            .min_sample_shading(0.2)
            .alpha_to_coverage_enable(false)
            .alpha_to_one_enable(false)
            .build();

        let color_blend_attachment = vk::PipelineColorBlendAttachmentState::builder()
            .color_write_mask(vk::ColorComponentFlags::RGBA)
            .blend_enable(true)
            .src_color_blend_factor(vk::BlendFactor::SRC_ALPHA)
            .dst_color_blend_factor(vk::BlendFactor::ONE_MINUS_SRC_ALPHA)
            .color_blend_op(vk::BlendOp::ADD)
            .src_alpha_blend_factor(vk::BlendFactor::ONE)
            .dst_alpha_blend_factor(vk::BlendFactor::ZERO)
            .alpha_blend_op(vk::BlendOp::ADD)
            .build();

        // Depth is off: the main pass has no depth attachment.
        let depth_stencil = vk::PipelineDepthStencilStateCreateInfo::builder()
            .depth_test_enable(false)
            .depth_write_enable(false)
            .depth_compare_op(vk::CompareOp::LESS)
            .depth_bounds_test_enable(false)
            .stencil_test_enable(false)
            .build();

        Self {
            dynamic_states: vec![vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR],
            vertex_binding: VulkanVertexLayout::binding_description(),
            vertex_attributes: VulkanVertexLayout::attribute_descriptions().to_vec(),
            input_assembly,
            rasterizer,
            multisampling,
            blend_constants: [0.0; 4],
            color_blend_attachment,
            depth_stencil,
        }
    }

    /// Sample count the template rasterizes with
    pub fn samples(&self) -> vk::SampleCountFlags {
        self.multisampling.rasterization_samples
    }
}

/// Shader modules a pipeline variant is built from
#[derive(Debug, Clone, Copy)]
pub struct VariantShaders {
    /// Vertex stage
    pub vertex: vk::ShaderModule,
    /// Fragment stage, specialized per variant
    pub fragment: vk::ShaderModule,
}

/// Compile one pipeline for `key` from the shared template
pub fn create_variant<D: GraphicsDevice>(
    device: &D,
    template: &PipelineTemplate,
    key: PipelineVariantKey,
    render_pass: vk::RenderPass,
    layout: vk::PipelineLayout,
    shaders: VariantShaders,
) -> VulkanResult<vk::Pipeline> {
    // SAFETY: the literal is nul terminated with no interior nul
    let entry = unsafe { CStr::from_bytes_with_nul_unchecked(SHADER_ENTRY) };

    let specialization_data = key.specialization_data();
    let map_entries = PipelineVariantKey::map_entries();
    let specialization = vk::SpecializationInfo::builder()
        .map_entries(&map_entries)
        .data(bytemuck::bytes_of(&specialization_data));

    let stages = [
        vk::PipelineShaderStageCreateInfo::builder()
            .stage(vk::ShaderStageFlags::VERTEX)
            .module(shaders.vertex)
            .name(entry)
            .build(),
        vk::PipelineShaderStageCreateInfo::builder()
            .stage(vk::ShaderStageFlags::FRAGMENT)
            .module(shaders.fragment)
            .name(entry)
            .specialization_info(&specialization)
            .build(),
    ];

    let vertex_bindings = [template.vertex_binding];
    let vertex_input = vk::PipelineVertexInputStateCreateInfo::builder()
        .vertex_binding_descriptions(&vertex_bindings)
        .vertex_attribute_descriptions(&template.vertex_attributes);

    let viewport_state = vk::PipelineViewportStateCreateInfo::builder()
        .viewport_count(1)
        .scissor_count(1);

    let dynamic_state =
        vk::PipelineDynamicStateCreateInfo::builder().dynamic_states(&template.dynamic_states);

    let attachments = [template.color_blend_attachment];
    let color_blending = vk::PipelineColorBlendStateCreateInfo::builder()
        .logic_op_enable(false)
        .logic_op(vk::LogicOp::COPY)
        .attachments(&attachments)
        .blend_constants(template.blend_constants);

    let create_info = vk::GraphicsPipelineCreateInfo::builder()
        .stages(&stages)
        .vertex_input_state(&vertex_input)
        .input_assembly_state(&template.input_assembly)
        .viewport_state(&viewport_state)
        .rasterization_state(&template.rasterizer)
        .multisample_state(&template.multisampling)
        .depth_stencil_state(&template.depth_stencil)
        .color_blend_state(&color_blending)
        .dynamic_state(&dynamic_state)
        .layout(layout)
        .render_pass(render_pass)
        .subpass(0);

    let pipeline = device.create_graphics_pipeline(&create_info)?;
    log::debug!(
        "Created pipeline variant {:?} (defines {:?})",
        key,
        key.glsl_defines()
    );
    Ok(pipeline)
}
