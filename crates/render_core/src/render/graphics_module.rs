//! The graphics module: owner of every renderer resource and the frame loop
//!
//! One [`GraphicsModule`] is built per device and swapchain. Applications load
//! resources through it, queue draws in a [`RenderSubmission`] and hand that
//! to [`GraphicsModule::draw_frame`] once per frame.

use std::path::Path;

use ash::vk;

use crate::config::RendererConfig;
use crate::render::backends::vulkan::{
    AcquireOutcome, DescriptorWriteBatch, GraphicsDevice, SwapchainTarget, VulkanError,
    VulkanResult,
};
use crate::render::frame::FrameData;
use crate::render::mesh::Vertex;
use crate::render::pipelines::{
    DescriptorAllocators, PipelineKind, PipelineLayouts, PipelineTemplate, PipelineVariantCache,
    PipelineVariantKey, VariantShaders,
};
use crate::render::resources::{
    InstanceBufferHandle, MaterialCreateInfo, MaterialHandle, MaterialStorage, MeshHandle,
    MeshStorage, RenderInstanceManager, ShaderHandle, ShaderStorage, TextureFormatHint,
    TextureHandle, TextureStorage,
};
use crate::render::shader_data::{GpuMaterialProperties, GpuSceneData};
use crate::render::submission::{DrawResources, RecordStats, RenderSubmission};

/// Precompiled SPIR-V of the material pipelines
#[derive(Debug, Clone, Default)]
pub struct PipelineShaderCode {
    /// Vertex shader reading the model matrix from push constants
    pub vertex: Vec<u8>,
    /// Vertex shader reading transforms from the instance buffer
    pub instanced_vertex: Vec<u8>,
    /// Fragment shader specialized per variant
    pub fragment: Vec<u8>,
}

/// Texture filtering used by a material
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SamplerType {
    /// Bilinear filtering
    #[default]
    Linear,
    /// Nearest-texel filtering
    Point,
}

/// Renderer facade over a device and a swapchain
pub struct GraphicsModule<D: GraphicsDevice, S: SwapchainTarget> {
    device: D,
    swapchain: S,
    config: RendererConfig,
    layouts: PipelineLayouts,
    allocators: DescriptorAllocators,
    write_batch: DescriptorWriteBatch,
    pipelines: PipelineVariantCache,
    shaders: ShaderStorage,
    meshes: MeshStorage,
    textures: TextureStorage,
    materials: MaterialStorage,
    instances: RenderInstanceManager,
    frames: Vec<FrameData>,
    current_frame: usize,
    linear_sampler: vk::Sampler,
    point_sampler: vk::Sampler,
    last_stats: RecordStats,
    shut_down: bool,
}

impl<D: GraphicsDevice, S: SwapchainTarget> GraphicsModule<D, S> {
    /// Create every long-lived renderer object
    pub fn new(
        device: D,
        swapchain: S,
        config: RendererConfig,
        shader_code: &PipelineShaderCode,
    ) -> VulkanResult<Self> {
        config
            .validate()
            .map_err(|e| VulkanError::InitializationFailed(e.to_string()))?;
        log::info!(
            "Creating graphics module ({} frames in flight)",
            config.frames_in_flight
        );

        let layouts = PipelineLayouts::new(&device)?;
        let mut allocators = DescriptorAllocators::new(&layouts, config.descriptors.sets_per_pool);
        let mut write_batch = DescriptorWriteBatch::new(
            config.descriptors.max_buffer_writes,
            config.descriptors.max_image_writes,
        );

        let capacities = config.capacities;
        let mut shaders = ShaderStorage::new(capacities.shaders);
        let vertex = shaders.load_from_bytecode(&device, &shader_code.vertex)?;
        let instanced_vertex = shaders.load_from_bytecode(&device, &shader_code.instanced_vertex)?;
        let fragment = shaders.load_from_bytecode(&device, &shader_code.fragment)?;
        let regular_shaders = VariantShaders {
            vertex: shaders.get_module(vertex),
            fragment: shaders.get_module(fragment),
        };
        let instanced_shaders = VariantShaders {
            vertex: shaders.get_module(instanced_vertex),
            fragment: shaders.get_module(fragment),
        };

        let pipelines = PipelineVariantCache::new(
            PipelineTemplate::create_default(vk::SampleCountFlags::TYPE_1),
            swapchain.render_pass(),
            (layouts.pipeline_layout(PipelineKind::Regular), regular_shaders),
            (layouts.pipeline_layout(PipelineKind::Instanced), instanced_shaders),
        );

        let frames = (0..config.frames_in_flight)
            .map(|_| {
                FrameData::create(
                    &device,
                    layouts.global().handle(),
                    &mut allocators.global,
                    &mut write_batch,
                )
            })
            .collect::<VulkanResult<Vec<_>>>()?;

        let linear_sampler = device.create_sampler(vk::Filter::LINEAR)?;
        let point_sampler = device.create_sampler(vk::Filter::NEAREST)?;

        Ok(Self {
            meshes: MeshStorage::new(capacities.meshes),
            textures: TextureStorage::new(capacities.textures),
            materials: MaterialStorage::new(capacities.materials),
            instances: RenderInstanceManager::new(
                capacities.instance_buffers,
                config.frames_in_flight,
            ),
            device,
            swapchain,
            config,
            layouts,
            allocators,
            write_batch,
            pipelines,
            shaders,
            frames,
            current_frame: 0,
            linear_sampler,
            point_sampler,
            last_stats: RecordStats::default(),
            shut_down: false,
        })
    }

    /// Upload a mesh; empty `indices` draws it non-indexed
    pub fn load_mesh(&mut self, vertices: &[Vertex], indices: &[u32]) -> VulkanResult<MeshHandle> {
        self.meshes.load(&self.device, vertices, indices)
    }

    /// Load an OBJ file as one mesh
    pub fn load_mesh_from_file(&mut self, path: impl AsRef<Path>) -> VulkanResult<MeshHandle> {
        self.meshes.load_from_file(&self.device, path)
    }

    /// Destroy meshes; they must not be referenced by queued draws
    pub fn unload_meshes(&mut self, handles: &[MeshHandle]) {
        self.meshes.unload(&self.device, handles);
    }

    /// Create a shader module from SPIR-V
    pub fn load_shader(&mut self, bytecode: &[u8]) -> VulkanResult<ShaderHandle> {
        self.shaders.load_from_bytecode(&self.device, bytecode)
    }

    /// Upload RGBA8 texels
    pub fn load_texture(
        &mut self,
        width: u32,
        height: u32,
        rgba: &[u8],
        hint: TextureFormatHint,
    ) -> VulkanResult<TextureHandle> {
        self.textures
            .load_from_pixels(&self.device, width, height, rgba, hint)
    }

    /// Decode and upload an image file
    pub fn load_texture_from_file(
        &mut self,
        path: impl AsRef<Path>,
        hint: TextureFormatHint,
    ) -> VulkanResult<TextureHandle> {
        self.textures.load_from_file(&self.device, path, hint)
    }

    /// Create a material sampling its textures with `sampler`
    pub fn load_material(
        &mut self,
        info: &MaterialCreateInfo,
        sampler: SamplerType,
    ) -> VulkanResult<MaterialHandle> {
        let sampler = match sampler {
            SamplerType::Linear => self.linear_sampler,
            SamplerType::Point => self.point_sampler,
        };
        self.materials.create(
            &self.device,
            &self.textures,
            info,
            self.layouts.material().handle(),
            sampler,
            &mut self.allocators.material,
            &mut self.write_batch,
        )
    }

    /// Overwrite a material's uniform properties
    pub fn update_material(
        &self,
        handle: MaterialHandle,
        properties: &GpuMaterialProperties,
    ) -> VulkanResult<()> {
        self.materials.update(&self.device, handle, properties)
    }

    /// Pipeline variant a material is drawn with
    pub fn material_variant(&self, handle: MaterialHandle) -> PipelineVariantKey {
        self.materials.variant(handle)
    }

    /// Release materials' uniform buffers and free their slots
    ///
    /// Pending descriptor writes are flushed first. The descriptor sets stay
    /// allocated until the material pools are cleared.
    pub fn unload_materials(&mut self, handles: &[MaterialHandle]) {
        self.materials
            .unload(&self.device, &mut self.write_batch, handles);
    }

    /// Create per-frame buffers for up to `capacity` instances
    pub fn register_instance_buffer(
        &mut self,
        capacity: usize,
    ) -> VulkanResult<InstanceBufferHandle> {
        self.instances.register(
            &self.device,
            self.layouts.instance().handle(),
            &mut self.allocators.instance,
            &mut self.write_batch,
            capacity,
        )
    }

    /// Render and present one frame
    ///
    /// Returns `false` when rendering cannot continue. An out-of-date
    /// swapchain is rebuilt and reported as `true`. The submission is
    /// cleared in every case.
    pub fn draw_frame(&mut self, submission: &mut RenderSubmission, scene: &GpuSceneData) -> bool {
        let result = self.try_draw_frame(submission, scene);
        submission.clear();
        match result {
            Ok(()) => true,
            Err(e) => {
                log::error!("Frame {} failed: {}", self.current_frame, e);
                false
            }
        }
    }

    fn try_draw_frame(
        &mut self,
        submission: &RenderSubmission,
        scene: &GpuSceneData,
    ) -> VulkanResult<()> {
        self.write_batch.flush(&self.device);

        let frame_index = self.current_frame;
        let frame = &self.frames[frame_index];
        self.device.wait_for_fence(frame.in_flight)?;

        let (image_index, acquired_suboptimal) = match self.swapchain.acquire_next_image(frame.image_available)? {
            AcquireOutcome::OutOfDate => {
                log::info!("Swapchain out of date on acquire");
                return self.swapchain.recreate();
            }
            AcquireOutcome::Ready {
                image_index,
                suboptimal,
            } => {
                if suboptimal {
                    log::warn!("Acquired image {} from a suboptimal swapchain", image_index);
                }
                (image_index, suboptimal)
            }
        };

        self.device.reset_command_buffer(frame.command_buffer)?;
        frame.scene_buffer.update(&self.device, std::slice::from_ref(scene))?;
        submission.prepare_for_recording(&self.device, &self.instances, frame_index)?;

        let command_buffer = frame.command_buffer;
        let extent = self.swapchain.extent();
        let clear_values = [vk::ClearValue {
            color: vk::ClearColorValue {
                float32: self.config.clear_color,
            },
        }];

        self.device.begin_command_buffer(command_buffer)?;
        self.device.cmd_begin_render_pass(
            command_buffer,
            self.swapchain.render_pass(),
            self.swapchain.framebuffer(image_index),
            extent,
            &clear_values,
        );
        self.device.cmd_set_viewport_and_scissor(command_buffer, extent);
        let resources = DrawResources {
            materials: &self.materials,
            meshes: &self.meshes,
            instances: &self.instances,
        };
        self.last_stats = submission.record(
            &self.device,
            command_buffer,
            frame.global_set,
            &mut self.pipelines,
            &resources,
            frame_index,
        );
        self.device.cmd_end_render_pass(command_buffer);
        self.device.end_command_buffer(command_buffer)?;

        // Only a submission signals the fence again.
        self.device.reset_fence(frame.in_flight)?;
        self.device.submit_graphics(
            command_buffer,
            frame.image_available,
            vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
            frame.render_finished,
            frame.in_flight,
        )?;
        let render_finished = frame.render_finished;
        self.current_frame = (frame_index + 1) % self.frames.len();

        let outcome = self.swapchain.present(image_index, render_finished)?;
        if outcome.needs_recreate() || acquired_suboptimal {
            log::warn!("Recreating swapchain after present ({:?})", outcome);
            self.swapchain.recreate()?;
        }
        Ok(())
    }

    /// Frame in flight the next `draw_frame` uses
    pub fn current_frame(&self) -> usize {
        self.current_frame
    }

    /// Binds and draws of the last recorded frame
    pub fn last_record_stats(&self) -> RecordStats {
        self.last_stats
    }

    /// Renderer configuration
    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    /// Underlying device
    pub fn device(&self) -> &D {
        &self.device
    }

    /// Underlying swapchain
    pub fn swapchain(&self) -> &S {
        &self.swapchain
    }

    /// Wait for the GPU and destroy every resource; later calls do nothing
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;
        if let Err(e) = self.device.wait_idle() {
            log::error!("Failed to wait for device idle during shutdown: {}", e);
        }

        self.write_batch.clear();
        self.pipelines.destroy(&self.device);
        for frame in &self.frames {
            frame.destroy(&self.device);
        }
        self.frames.clear();
        self.instances.destroy(&self.device);
        self.materials.destroy(&self.device);
        self.textures.destroy(&self.device);
        self.meshes.destroy(&self.device);
        self.shaders.destroy(&self.device);
        self.allocators.destroy(&self.device);
        self.layouts.destroy(&self.device);
        self.device.destroy_sampler(self.linear_sampler);
        self.device.destroy_sampler(self.point_sampler);
        log::info!("Graphics module shut down");
    }
}

impl<D: GraphicsDevice, S: SwapchainTarget> Drop for GraphicsModule<D, S> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
