//! Shader module storage
//!
//! Compiling shader source is somebody else's job; this storage only turns
//! precompiled SPIR-V into shader modules.

use std::io::Cursor;
use std::path::Path;

use ash::vk;

use crate::foundation::file::read_file;
use crate::foundation::{Handle, SlotArray};
use crate::render::backends::vulkan::{GraphicsDevice, VulkanError, VulkanResult};

/// Tag type for shader handles
#[derive(Debug)]
pub struct ShaderModuleTag;

/// Handle to a shader module in a [`ShaderStorage`]
pub type ShaderHandle = Handle<ShaderModuleTag>;

/// Fixed-capacity storage of shader modules
#[derive(Debug)]
pub struct ShaderStorage {
    slots: SlotArray<ShaderModuleTag>,
    modules: Vec<vk::ShaderModule>,
}

impl ShaderStorage {
    /// Create an empty storage with room for `capacity` modules
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: SlotArray::new(capacity),
            modules: vec![vk::ShaderModule::null(); capacity],
        }
    }

    /// Create a module from SPIR-V bytes
    ///
    /// The byte length must be a multiple of four and start with the SPIR-V
    /// magic number.
    pub fn load_from_bytecode<D: GraphicsDevice>(
        &mut self,
        device: &D,
        bytecode: &[u8],
    ) -> VulkanResult<ShaderHandle> {
        let code = ash::util::read_spv(&mut Cursor::new(bytecode)).map_err(|e| {
            VulkanError::InvalidOperation {
                reason: format!("Invalid SPIR-V: {}", e),
            }
        })?;
        let module = device.create_shader_module(&code)?;

        let handle = self.slots.reserve();
        self.modules[usize::from(handle.index())] = module;
        log::debug!("Loaded shader {:?} ({} words)", handle, code.len());
        Ok(handle)
    }

    /// Read a SPIR-V file and create a module from it
    pub fn load_from_file<D: GraphicsDevice>(
        &mut self,
        device: &D,
        path: impl AsRef<Path>,
    ) -> VulkanResult<ShaderHandle> {
        let path = path.as_ref();
        let bytecode = read_file(path).ok_or_else(|| VulkanError::AssetLoad {
            path: path.display().to_string(),
            reason: "file could not be read".to_string(),
        })?;
        self.load_from_bytecode(device, &bytecode)
    }

    /// Shader module of a live handle
    pub fn get_module(&self, handle: ShaderHandle) -> vk::ShaderModule {
        self.slots.assert_valid(handle, "shader");
        self.modules[usize::from(handle.index())]
    }

    /// Whether `handle` refers to a live module
    pub fn is_valid(&self, handle: ShaderHandle) -> bool {
        self.slots.is_valid(handle)
    }

    /// Destroy specific modules
    pub fn unload<D: GraphicsDevice>(&mut self, device: &D, handles: &[ShaderHandle]) {
        for &handle in handles {
            self.slots.destroy(&[handle]);
            let module = std::mem::replace(
                &mut self.modules[usize::from(handle.index())],
                vk::ShaderModule::null(),
            );
            device.destroy_shader_module(module);
        }
    }

    /// Destroy every live module
    pub fn destroy<D: GraphicsDevice>(&mut self, device: &D) {
        let live = self.slots.live_handles();
        self.unload(device, &live);
    }
}
