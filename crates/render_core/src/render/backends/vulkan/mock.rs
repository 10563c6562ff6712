//! Recording device and swapchain for GPU-free tests

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};

use ash::vk::{self, Handle as _};

use super::device::{GpuBuffer, GpuImage, GraphicsDevice, MemoryLocation, VulkanError, VulkanResult};
use super::swapchain::{AcquireOutcome, PresentOutcome, SwapchainTarget};

/// Smallest valid SPIR-V module: magic, version, generator, bound, schema
pub fn spirv_header() -> Vec<u8> {
    [0x0723_0203_u32, 0x0001_0000, 0, 1, 0]
        .iter()
        .flat_map(|word| word.to_le_bytes())
        .collect()
}

/// A command recorded into any command buffer
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    BeginRenderPass { framebuffer: vk::Framebuffer },
    EndRenderPass,
    SetViewportAndScissor,
    BindPipeline(vk::Pipeline),
    BindDescriptorSets {
        layout: vk::PipelineLayout,
        first_set: u32,
        sets: Vec<vk::DescriptorSet>,
    },
    PushConstants { data: Vec<u8> },
    BindVertexBuffer(vk::Buffer),
    BindIndexBuffer(vk::Buffer),
    Draw { vertex_count: u32, instance_count: u32 },
    DrawIndexed { index_count: u32, instance_count: u32 },
}

/// One descriptor write as seen by `update_descriptor_sets`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordedWrite {
    pub set: vk::DescriptorSet,
    pub binding: u32,
    pub descriptor_type: vk::DescriptorType,
    pub buffer: Option<vk::Buffer>,
    pub image_view: Option<vk::ImageView>,
}

#[derive(Debug, Default)]
struct MockPool {
    max_sets: u32,
    allocated: u32,
}

/// Device that hands out counter handles and records everything
#[derive(Default)]
pub struct MockDevice {
    next_handle: Cell<u64>,
    commands: RefCell<Vec<Command>>,
    writes: RefCell<Vec<RecordedWrite>>,
    update_calls: Cell<usize>,
    pools: RefCell<HashMap<vk::DescriptorPool, MockPool>>,
    pools_created: Cell<usize>,
    buffer_contents: RefCell<HashMap<vk::Buffer, Vec<u8>>>,
    live: RefCell<HashMap<&'static str, isize>>,
    pipelines_created: Cell<usize>,
    specializations: RefCell<Vec<Vec<u8>>>,
    submits: Cell<usize>,
    fence_waits: Cell<usize>,
    fail_fence_wait: Cell<bool>,
    fences: RefCell<HashMap<vk::Fence, bool>>,
    fail_end_command_buffer: Cell<bool>,
    fail_pipeline_creation: Cell<bool>,
}

impl MockDevice {
    pub fn new() -> Self {
        Self {
            next_handle: Cell::new(1),
            ..Self::default()
        }
    }

    fn next_raw(&self) -> u64 {
        let raw = self.next_handle.get();
        self.next_handle.set(raw + 1);
        raw
    }

    fn created(&self, kind: &'static str) {
        *self.live.borrow_mut().entry(kind).or_insert(0) += 1;
    }

    fn destroyed(&self, kind: &'static str) {
        *self.live.borrow_mut().entry(kind).or_insert(0) -= 1;
    }

    /// Objects of `kind` created and not yet destroyed
    pub fn live(&self, kind: &'static str) -> isize {
        self.live.borrow().get(kind).copied().unwrap_or(0)
    }

    pub fn take_commands(&self) -> Vec<Command> {
        std::mem::take(&mut *self.commands.borrow_mut())
    }

    pub fn commands(&self) -> Vec<Command> {
        self.commands.borrow().clone()
    }

    pub fn writes(&self) -> Vec<RecordedWrite> {
        self.writes.borrow().clone()
    }

    pub fn update_calls(&self) -> usize {
        self.update_calls.get()
    }

    pub fn pools_created(&self) -> usize {
        self.pools_created.get()
    }

    pub fn pool_allocated(&self, pool: vk::DescriptorPool) -> u32 {
        self.pools.borrow().get(&pool).map_or(0, |p| p.allocated)
    }

    pub fn buffer_contents(&self, buffer: vk::Buffer) -> Vec<u8> {
        self.buffer_contents
            .borrow()
            .get(&buffer)
            .cloned()
            .unwrap_or_default()
    }

    /// Buffer contents reinterpreted as `T` values
    pub fn buffer_values<T: bytemuck::Pod>(&self, buffer: vk::Buffer) -> Vec<T> {
        self.buffer_contents(buffer)
            .chunks_exact(std::mem::size_of::<T>())
            .map(bytemuck::pod_read_unaligned)
            .collect()
    }

    pub fn pipelines_created(&self) -> usize {
        self.pipelines_created.get()
    }

    /// Specialization data of every pipeline created, in order
    pub fn specializations(&self) -> Vec<Vec<u8>> {
        self.specializations.borrow().clone()
    }

    pub fn submits(&self) -> usize {
        self.submits.get()
    }

    pub fn fence_waits(&self) -> usize {
        self.fence_waits.get()
    }

    pub fn set_fail_fence_wait(&self, fail: bool) {
        self.fail_fence_wait.set(fail);
    }

    /// Whether `fence` is currently signaled
    pub fn fence_signaled(&self, fence: vk::Fence) -> bool {
        self.fences.borrow().get(&fence).copied().unwrap_or(false)
    }

    pub fn set_fail_end_command_buffer(&self, fail: bool) {
        self.fail_end_command_buffer.set(fail);
    }

    pub fn set_fail_pipeline_creation(&self, fail: bool) {
        self.fail_pipeline_creation.set(fail);
    }
}

impl GraphicsDevice for MockDevice {
    fn create_buffer(
        &self,
        size: vk::DeviceSize,
        _usage: vk::BufferUsageFlags,
        _location: MemoryLocation,
    ) -> VulkanResult<GpuBuffer> {
        let buffer = vk::Buffer::from_raw(self.next_raw());
        self.buffer_contents
            .borrow_mut()
            .insert(buffer, vec![0; size as usize]);
        self.created("buffer");
        Ok(GpuBuffer {
            buffer,
            memory: vk::DeviceMemory::from_raw(self.next_raw()),
            size,
        })
    }

    fn create_buffer_with_data(
        &self,
        data: &[u8],
        usage: vk::BufferUsageFlags,
    ) -> VulkanResult<GpuBuffer> {
        let buffer = self.create_buffer(
            data.len() as vk::DeviceSize,
            usage,
            MemoryLocation::DeviceLocal,
        )?;
        self.buffer_contents
            .borrow_mut()
            .insert(buffer.buffer, data.to_vec());
        Ok(buffer)
    }

    fn write_buffer(
        &self,
        buffer: &GpuBuffer,
        offset: vk::DeviceSize,
        data: &[u8],
    ) -> VulkanResult<()> {
        let mut contents = self.buffer_contents.borrow_mut();
        let Some(bytes) = contents.get_mut(&buffer.buffer) else {
            return Err(VulkanError::InvalidOperation {
                reason: "write to unknown buffer".to_string(),
            });
        };
        let start = offset as usize;
        if start + data.len() > bytes.len() {
            return Err(VulkanError::InvalidOperation {
                reason: "write overflows buffer".to_string(),
            });
        }
        bytes[start..start + data.len()].copy_from_slice(data);
        Ok(())
    }

    fn destroy_buffer(&self, buffer: &GpuBuffer) {
        self.buffer_contents.borrow_mut().remove(&buffer.buffer);
        self.destroyed("buffer");
    }

    fn create_texture_image(
        &self,
        extent: vk::Extent2D,
        format: vk::Format,
        _pixels: &[u8],
    ) -> VulkanResult<GpuImage> {
        self.created("image");
        Ok(GpuImage {
            image: vk::Image::from_raw(self.next_raw()),
            view: vk::ImageView::from_raw(self.next_raw()),
            memory: vk::DeviceMemory::from_raw(self.next_raw()),
            extent,
            format,
        })
    }

    fn destroy_image(&self, _image: &GpuImage) {
        self.destroyed("image");
    }

    fn create_sampler(&self, _filter: vk::Filter) -> VulkanResult<vk::Sampler> {
        self.created("sampler");
        Ok(vk::Sampler::from_raw(self.next_raw()))
    }

    fn destroy_sampler(&self, _sampler: vk::Sampler) {
        self.destroyed("sampler");
    }

    fn create_shader_module(&self, _code: &[u32]) -> VulkanResult<vk::ShaderModule> {
        self.created("shader_module");
        Ok(vk::ShaderModule::from_raw(self.next_raw()))
    }

    fn destroy_shader_module(&self, _module: vk::ShaderModule) {
        self.destroyed("shader_module");
    }

    fn create_descriptor_set_layout(
        &self,
        _bindings: &[vk::DescriptorSetLayoutBinding],
    ) -> VulkanResult<vk::DescriptorSetLayout> {
        self.created("descriptor_set_layout");
        Ok(vk::DescriptorSetLayout::from_raw(self.next_raw()))
    }

    fn destroy_descriptor_set_layout(&self, _layout: vk::DescriptorSetLayout) {
        self.destroyed("descriptor_set_layout");
    }

    fn create_descriptor_pool(
        &self,
        max_sets: u32,
        _pool_sizes: &[vk::DescriptorPoolSize],
    ) -> VulkanResult<vk::DescriptorPool> {
        let pool = vk::DescriptorPool::from_raw(self.next_raw());
        self.pools.borrow_mut().insert(
            pool,
            MockPool {
                max_sets,
                allocated: 0,
            },
        );
        self.pools_created.set(self.pools_created.get() + 1);
        self.created("descriptor_pool");
        Ok(pool)
    }

    fn allocate_descriptor_sets(
        &self,
        pool: vk::DescriptorPool,
        layouts: &[vk::DescriptorSetLayout],
    ) -> VulkanResult<Vec<vk::DescriptorSet>> {
        let mut pools = self.pools.borrow_mut();
        let Some(state) = pools.get_mut(&pool) else {
            return Err(VulkanError::Api(vk::Result::ERROR_UNKNOWN));
        };
        let count = layouts.len() as u32;
        if state.allocated + count > state.max_sets {
            return Err(VulkanError::Api(vk::Result::ERROR_OUT_OF_POOL_MEMORY));
        }
        state.allocated += count;
        Ok(layouts
            .iter()
            .map(|_| vk::DescriptorSet::from_raw(self.next_raw()))
            .collect())
    }

    fn reset_descriptor_pool(&self, pool: vk::DescriptorPool) -> VulkanResult<()> {
        if let Some(state) = self.pools.borrow_mut().get_mut(&pool) {
            state.allocated = 0;
        }
        Ok(())
    }

    fn destroy_descriptor_pool(&self, pool: vk::DescriptorPool) {
        self.pools.borrow_mut().remove(&pool);
        self.destroyed("descriptor_pool");
    }

    fn update_descriptor_sets(&self, writes: &[vk::WriteDescriptorSet]) {
        self.update_calls.set(self.update_calls.get() + 1);
        let mut recorded = self.writes.borrow_mut();
        for write in writes {
            // Reading through the info pointers proves they are still alive.
            let buffer = (!write.p_buffer_info.is_null())
                .then(|| unsafe { (*write.p_buffer_info).buffer });
            let image_view = (!write.p_image_info.is_null())
                .then(|| unsafe { (*write.p_image_info).image_view });
            recorded.push(RecordedWrite {
                set: write.dst_set,
                binding: write.dst_binding,
                descriptor_type: write.descriptor_type,
                buffer,
                image_view,
            });
        }
    }

    fn create_pipeline_layout(
        &self,
        _set_layouts: &[vk::DescriptorSetLayout],
        _push_constant_ranges: &[vk::PushConstantRange],
    ) -> VulkanResult<vk::PipelineLayout> {
        self.created("pipeline_layout");
        Ok(vk::PipelineLayout::from_raw(self.next_raw()))
    }

    fn destroy_pipeline_layout(&self, _layout: vk::PipelineLayout) {
        self.destroyed("pipeline_layout");
    }

    fn create_graphics_pipeline(
        &self,
        create_info: &vk::GraphicsPipelineCreateInfo,
    ) -> VulkanResult<vk::Pipeline> {
        if self.fail_pipeline_creation.get() {
            return Err(VulkanError::Api(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY));
        }
        let stages = unsafe {
            std::slice::from_raw_parts(create_info.p_stages, create_info.stage_count as usize)
        };
        let specialization = stages
            .iter()
            .find(|stage| !stage.p_specialization_info.is_null())
            .map(|stage| unsafe {
                let info = &*stage.p_specialization_info;
                std::slice::from_raw_parts(info.p_data.cast::<u8>(), info.data_size).to_vec()
            })
            .unwrap_or_default();
        self.specializations.borrow_mut().push(specialization);
        self.pipelines_created.set(self.pipelines_created.get() + 1);
        self.created("pipeline");
        Ok(vk::Pipeline::from_raw(self.next_raw()))
    }

    fn destroy_pipeline(&self, _pipeline: vk::Pipeline) {
        self.destroyed("pipeline");
    }

    fn allocate_command_buffers(&self, count: u32) -> VulkanResult<Vec<vk::CommandBuffer>> {
        Ok((0..count)
            .map(|_| {
                self.created("command_buffer");
                vk::CommandBuffer::from_raw(self.next_raw())
            })
            .collect())
    }

    fn free_command_buffers(&self, command_buffers: &[vk::CommandBuffer]) {
        for _ in command_buffers {
            self.destroyed("command_buffer");
        }
    }

    fn reset_command_buffer(&self, _command_buffer: vk::CommandBuffer) -> VulkanResult<()> {
        Ok(())
    }

    fn begin_command_buffer(&self, _command_buffer: vk::CommandBuffer) -> VulkanResult<()> {
        Ok(())
    }

    fn end_command_buffer(&self, _command_buffer: vk::CommandBuffer) -> VulkanResult<()> {
        if self.fail_end_command_buffer.get() {
            return Err(VulkanError::Api(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY));
        }
        Ok(())
    }

    fn cmd_begin_render_pass(
        &self,
        _command_buffer: vk::CommandBuffer,
        _render_pass: vk::RenderPass,
        framebuffer: vk::Framebuffer,
        _extent: vk::Extent2D,
        _clear_values: &[vk::ClearValue],
    ) {
        self.commands
            .borrow_mut()
            .push(Command::BeginRenderPass { framebuffer });
    }

    fn cmd_end_render_pass(&self, _command_buffer: vk::CommandBuffer) {
        self.commands.borrow_mut().push(Command::EndRenderPass);
    }

    fn cmd_set_viewport_and_scissor(&self, _command_buffer: vk::CommandBuffer, _extent: vk::Extent2D) {
        self.commands.borrow_mut().push(Command::SetViewportAndScissor);
    }

    fn cmd_bind_pipeline(&self, _command_buffer: vk::CommandBuffer, pipeline: vk::Pipeline) {
        self.commands.borrow_mut().push(Command::BindPipeline(pipeline));
    }

    fn cmd_bind_descriptor_sets(
        &self,
        _command_buffer: vk::CommandBuffer,
        layout: vk::PipelineLayout,
        first_set: u32,
        sets: &[vk::DescriptorSet],
    ) {
        self.commands.borrow_mut().push(Command::BindDescriptorSets {
            layout,
            first_set,
            sets: sets.to_vec(),
        });
    }

    fn cmd_push_constants(
        &self,
        _command_buffer: vk::CommandBuffer,
        _layout: vk::PipelineLayout,
        _stages: vk::ShaderStageFlags,
        _offset: u32,
        data: &[u8],
    ) {
        self.commands.borrow_mut().push(Command::PushConstants {
            data: data.to_vec(),
        });
    }

    fn cmd_bind_vertex_buffer(&self, _command_buffer: vk::CommandBuffer, buffer: vk::Buffer) {
        self.commands
            .borrow_mut()
            .push(Command::BindVertexBuffer(buffer));
    }

    fn cmd_bind_index_buffer(&self, _command_buffer: vk::CommandBuffer, buffer: vk::Buffer) {
        self.commands.borrow_mut().push(Command::BindIndexBuffer(buffer));
    }

    fn cmd_draw(&self, _command_buffer: vk::CommandBuffer, vertex_count: u32, instance_count: u32) {
        self.commands.borrow_mut().push(Command::Draw {
            vertex_count,
            instance_count,
        });
    }

    fn cmd_draw_indexed(
        &self,
        _command_buffer: vk::CommandBuffer,
        index_count: u32,
        instance_count: u32,
    ) {
        self.commands.borrow_mut().push(Command::DrawIndexed {
            index_count,
            instance_count,
        });
    }

    fn create_fence(&self, signaled: bool) -> VulkanResult<vk::Fence> {
        self.created("fence");
        let fence = vk::Fence::from_raw(self.next_raw());
        self.fences.borrow_mut().insert(fence, signaled);
        Ok(fence)
    }

    fn destroy_fence(&self, fence: vk::Fence) {
        self.fences.borrow_mut().remove(&fence);
        self.destroyed("fence");
    }

    /// Submissions complete immediately, so an unsignaled fence would block forever
    fn wait_for_fence(&self, fence: vk::Fence) -> VulkanResult<()> {
        self.fence_waits.set(self.fence_waits.get() + 1);
        if self.fail_fence_wait.get() {
            return Err(VulkanError::Api(vk::Result::ERROR_DEVICE_LOST));
        }
        assert!(
            self.fence_signaled(fence),
            "Waiting on fence {:?} that no submission will signal",
            fence
        );
        Ok(())
    }

    fn reset_fence(&self, fence: vk::Fence) -> VulkanResult<()> {
        self.fences.borrow_mut().insert(fence, false);
        Ok(())
    }

    fn create_semaphore(&self) -> VulkanResult<vk::Semaphore> {
        self.created("semaphore");
        Ok(vk::Semaphore::from_raw(self.next_raw()))
    }

    fn destroy_semaphore(&self, _semaphore: vk::Semaphore) {
        self.destroyed("semaphore");
    }

    fn submit_graphics(
        &self,
        _command_buffer: vk::CommandBuffer,
        _wait_semaphore: vk::Semaphore,
        _wait_stage: vk::PipelineStageFlags,
        _signal_semaphore: vk::Semaphore,
        fence: vk::Fence,
    ) -> VulkanResult<()> {
        self.submits.set(self.submits.get() + 1);
        if fence != vk::Fence::null() {
            self.fences.borrow_mut().insert(fence, true);
        }
        Ok(())
    }

    fn wait_idle(&self) -> VulkanResult<()> {
        Ok(())
    }
}

/// Swapchain with scripted acquire/present outcomes
pub struct MockSwapchain {
    image_count: u32,
    next_image: u32,
    acquire_script: VecDeque<AcquireOutcome>,
    present_script: VecDeque<PresentOutcome>,
    pub recreate_count: usize,
    pub presents: Vec<u32>,
}

impl MockSwapchain {
    pub fn new(image_count: u32) -> Self {
        Self {
            image_count,
            next_image: 0,
            acquire_script: VecDeque::new(),
            present_script: VecDeque::new(),
            recreate_count: 0,
            presents: Vec::new(),
        }
    }

    /// Outcome of the next acquire instead of the default ready image
    pub fn push_acquire(&mut self, outcome: AcquireOutcome) {
        self.acquire_script.push_back(outcome);
    }

    /// Outcome of the next present instead of `Presented`
    pub fn push_present(&mut self, outcome: PresentOutcome) {
        self.present_script.push_back(outcome);
    }
}

impl SwapchainTarget for MockSwapchain {
    fn acquire_next_image(&mut self, _signal: vk::Semaphore) -> VulkanResult<AcquireOutcome> {
        if let Some(outcome) = self.acquire_script.pop_front() {
            return Ok(outcome);
        }
        let image_index = self.next_image;
        self.next_image = (self.next_image + 1) % self.image_count;
        Ok(AcquireOutcome::Ready {
            image_index,
            suboptimal: false,
        })
    }

    fn present(&mut self, image_index: u32, _wait: vk::Semaphore) -> VulkanResult<PresentOutcome> {
        self.presents.push(image_index);
        Ok(self
            .present_script
            .pop_front()
            .unwrap_or(PresentOutcome::Presented))
    }

    fn recreate(&mut self) -> VulkanResult<()> {
        self.recreate_count += 1;
        Ok(())
    }

    fn extent(&self) -> vk::Extent2D {
        vk::Extent2D {
            width: 800,
            height: 600,
        }
    }

    fn render_pass(&self) -> vk::RenderPass {
        vk::RenderPass::from_raw(0xAA)
    }

    fn framebuffer(&self, image_index: u32) -> vk::Framebuffer {
        vk::Framebuffer::from_raw(0xF0 + u64::from(image_index))
    }
}
