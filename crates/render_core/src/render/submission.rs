//! Per-frame draw submission and batching
//!
//! Objects are accumulated during the frame and recorded in one pass. Before
//! recording, draws are stably sorted by pipeline variant, then material,
//! then mesh, so state changes are grouped and objects that tie keep their
//! submission order. Consecutive draws sharing a pipeline, material or mesh
//! skip the redundant bind.

use ash::vk;

use crate::foundation::math::Mat4;
use crate::render::backends::vulkan::{GraphicsDevice, VulkanResult};
use crate::render::pipelines::layouts::{GLOBAL_SET, PUSH_CONSTANT_STAGES};
use crate::render::pipelines::specialization::PipelineVariantKey;
use crate::render::pipelines::variant_cache::{PipelineKind, PipelineVariantCache};
use crate::render::resources::instances::{InstanceBufferHandle, RenderInstanceManager};
use crate::render::resources::materials::{MaterialHandle, MaterialStorage};
use crate::render::resources::meshes::{MeshHandle, MeshStorage};
use crate::render::shader_data::{GpuPushConstants, InstanceData};

/// One mesh drawn once with one material
#[derive(Debug, Clone, Copy)]
pub struct RenderObject {
    /// Object to world
    pub transform: Mat4,
    /// Material to draw with
    pub material: MaterialHandle,
    /// Mesh to draw
    pub mesh: MeshHandle,
}

/// One mesh drawn once per entry of an instance buffer
#[derive(Debug, Clone, Copy)]
pub struct InstancedRenderObject {
    /// Buffer receiving the per-instance data
    pub instance: InstanceBufferHandle,
    /// Material shared by every instance
    pub material: MaterialHandle,
    /// Mesh shared by every instance
    pub mesh: MeshHandle,
}

/// Storages a submission is recorded against
#[derive(Debug, Clone, Copy)]
pub struct DrawResources<'a> {
    /// Material storage
    pub materials: &'a MaterialStorage,
    /// Mesh storage
    pub meshes: &'a MeshStorage,
    /// Instance buffers
    pub instances: &'a RenderInstanceManager,
}

/// Bind and draw counts of one recording
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordStats {
    /// Pipeline binds issued
    pub pipeline_binds: usize,
    /// Material descriptor set binds issued
    pub material_binds: usize,
    /// Vertex/index buffer binds issued
    pub mesh_binds: usize,
    /// Draw calls issued
    pub draws: usize,
}

/// Last bound state; `None` forces the next bind
#[derive(Debug, Default)]
struct BoundState {
    pipeline: Option<vk::Pipeline>,
    material: Option<MaterialHandle>,
    mesh: Option<MeshHandle>,
}

/// Draws accumulated for one frame
#[derive(Debug, Default)]
pub struct RenderSubmission {
    objects: Vec<RenderObject>,
    instanced: Vec<InstancedRenderObject>,
    instance_data: Vec<Vec<InstanceData>>,
}

impl RenderSubmission {
    /// Create an empty submission
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue regular draws
    ///
    /// Handles are validated when the submission is recorded.
    pub fn submit(&mut self, objects: &[RenderObject]) {
        self.objects.extend_from_slice(objects);
    }

    /// Queue instanced draws; `data[i]` holds the instances of `objects[i]`
    ///
    /// # Panics
    /// When the two slices differ in length.
    pub fn submit_instanced(&mut self, objects: &[InstancedRenderObject], data: Vec<Vec<InstanceData>>) {
        assert_eq!(
            objects.len(),
            data.len(),
            "Every instanced object needs its instance data"
        );
        self.instanced.extend_from_slice(objects);
        self.instance_data.extend(data);
    }

    /// Upload instance data into the buffers of `frame`
    pub fn prepare_for_recording<D: GraphicsDevice>(
        &self,
        device: &D,
        instances: &RenderInstanceManager,
        frame: usize,
    ) -> VulkanResult<()> {
        for (object, data) in self.instanced.iter().zip(&self.instance_data) {
            instances.update(device, object.instance, frame, data)?;
        }
        Ok(())
    }

    /// Draw order of `keys`: stable sort by key
    fn draw_order<K: Ord>(keys: &[K]) -> Vec<usize> {
        let mut order: Vec<usize> = (0..keys.len()).collect();
        order.sort_by(|&a, &b| keys[a].cmp(&keys[b]));
        order
    }

    /// Record every queued draw into `command_buffer`
    ///
    /// Must be called inside a render pass with viewport and scissor set.
    /// `global_set` is bound at set 0 before the first draw of each pipeline
    /// kind. Missing pipeline variants are compiled on the spot.
    ///
    /// # Panics
    /// When any submitted handle is invalid or a pipeline variant fails to
    /// compile.
    pub fn record<D: GraphicsDevice>(
        &self,
        device: &D,
        command_buffer: vk::CommandBuffer,
        global_set: vk::DescriptorSet,
        pipelines: &mut PipelineVariantCache,
        resources: &DrawResources<'_>,
        frame: usize,
    ) -> RecordStats {
        let mut stats = RecordStats::default();
        self.record_regular(device, command_buffer, global_set, pipelines, resources, &mut stats);
        self.record_instanced(
            device,
            command_buffer,
            global_set,
            pipelines,
            resources,
            frame,
            &mut stats,
        );
        log::trace!("Recorded submission: {:?}", stats);
        stats
    }

    #[allow(clippy::too_many_arguments)]
    fn bind_shared_state<D: GraphicsDevice>(
        device: &D,
        command_buffer: vk::CommandBuffer,
        global_set: vk::DescriptorSet,
        pipelines: &mut PipelineVariantCache,
        kind: PipelineKind,
        variant: PipelineVariantKey,
        material: MaterialHandle,
        mesh: MeshHandle,
        resources: &DrawResources<'_>,
        bound: &mut BoundState,
        stats: &mut RecordStats,
    ) {
        let layout = pipelines.layout(kind);
        let pipeline = pipelines
            .get_or_create(device, kind, variant)
            .unwrap_or_else(|e| {
                panic!("Failed to create {:?} pipeline for {:?}: {}", kind, variant, e)
            });
        if bound.pipeline != Some(pipeline) {
            device.cmd_bind_pipeline(command_buffer, pipeline);
            if bound.pipeline.is_none() {
                device.cmd_bind_descriptor_sets(command_buffer, layout, GLOBAL_SET, &[global_set]);
            }
            bound.pipeline = Some(pipeline);
            stats.pipeline_binds += 1;
        }
        if bound.material != Some(material) {
            resources.materials.bind(device, command_buffer, layout, material);
            bound.material = Some(material);
            stats.material_binds += 1;
        }
        if bound.mesh != Some(mesh) {
            resources.meshes.bind(device, command_buffer, mesh);
            bound.mesh = Some(mesh);
            stats.mesh_binds += 1;
        }
    }

    fn record_regular<D: GraphicsDevice>(
        &self,
        device: &D,
        command_buffer: vk::CommandBuffer,
        global_set: vk::DescriptorSet,
        pipelines: &mut PipelineVariantCache,
        resources: &DrawResources<'_>,
        stats: &mut RecordStats,
    ) {
        let keys: Vec<_> = self
            .objects
            .iter()
            .map(|object| {
                (
                    resources.materials.variant(object.material),
                    object.material,
                    object.mesh,
                )
            })
            .collect();

        let layout = pipelines.layout(PipelineKind::Regular);
        let mut bound = BoundState::default();
        for index in Self::draw_order(&keys) {
            let object = &self.objects[index];
            let (variant, material, mesh) = keys[index];
            Self::bind_shared_state(
                device,
                command_buffer,
                global_set,
                pipelines,
                PipelineKind::Regular,
                variant,
                material,
                mesh,
                resources,
                &mut bound,
                stats,
            );

            let push_constants = GpuPushConstants::from_transform(&object.transform);
            device.cmd_push_constants(
                command_buffer,
                layout,
                PUSH_CONSTANT_STAGES,
                0,
                bytemuck::bytes_of(&push_constants),
            );
            resources.meshes.draw(device, command_buffer, mesh, 1);
            stats.draws += 1;
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn record_instanced<D: GraphicsDevice>(
        &self,
        device: &D,
        command_buffer: vk::CommandBuffer,
        global_set: vk::DescriptorSet,
        pipelines: &mut PipelineVariantCache,
        resources: &DrawResources<'_>,
        frame: usize,
        stats: &mut RecordStats,
    ) {
        let keys: Vec<_> = self
            .instanced
            .iter()
            .map(|object| {
                (
                    resources.materials.variant(object.material),
                    object.material,
                    object.mesh,
                )
            })
            .collect();

        let layout = pipelines.layout(PipelineKind::Instanced);
        let mut bound = BoundState::default();
        for index in Self::draw_order(&keys) {
            let count = self.instance_data[index].len();
            if count == 0 {
                continue;
            }
            let object = &self.instanced[index];
            let (variant, material, mesh) = keys[index];
            Self::bind_shared_state(
                device,
                command_buffer,
                global_set,
                pipelines,
                PipelineKind::Instanced,
                variant,
                material,
                mesh,
                resources,
                &mut bound,
                stats,
            );

            resources
                .instances
                .bind(device, command_buffer, layout, object.instance, frame);
            resources
                .meshes
                .draw(device, command_buffer, mesh, count as u32);
            stats.draws += 1;
        }
    }

    /// Number of queued regular and instanced objects
    pub fn len(&self) -> usize {
        self.objects.len() + self.instanced.len()
    }

    /// True when nothing is queued
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every queued draw
    pub fn clear(&mut self) {
        self.objects.clear();
        self.instanced.clear();
        self.instance_data.clear();
    }
}
