//! Mesh storage
//!
//! Vertex and index buffers live in a fixed-capacity slot array and are
//! referenced through [`MeshHandle`]s. Every bind/draw validates the handle
//! and panics on a stale or out-of-range one.

use std::path::Path;

use ash::vk;

use crate::foundation::{Handle, SlotArray};
use crate::render::backends::vulkan::{GpuBuffer, GraphicsDevice, VulkanError, VulkanResult};
use crate::render::mesh::Vertex;

/// GPU buffers of one mesh
#[derive(Debug)]
pub struct GpuMesh {
    vertices: GpuBuffer,
    indices: Option<GpuBuffer>,
    vertex_count: u32,
    index_count: u32,
}

impl GpuMesh {
    /// Number of vertices
    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    /// Number of indices, zero for non-indexed meshes
    pub fn index_count(&self) -> u32 {
        self.index_count
    }
}

/// Handle to a mesh in a [`MeshStorage`]
pub type MeshHandle = Handle<GpuMesh>;

/// Fixed-capacity storage of uploaded meshes
#[derive(Debug)]
pub struct MeshStorage {
    slots: SlotArray<GpuMesh>,
    meshes: Vec<Option<GpuMesh>>,
}

impl MeshStorage {
    /// Create an empty storage with room for `capacity` meshes
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: SlotArray::new(capacity),
            meshes: (0..capacity).map(|_| None).collect(),
        }
    }

    /// Upload vertex data; an empty index list makes a non-indexed mesh
    ///
    /// # Panics
    /// When the storage is full.
    pub fn load<D: GraphicsDevice>(
        &mut self,
        device: &D,
        vertices: &[Vertex],
        indices: &[u32],
    ) -> VulkanResult<MeshHandle> {
        if vertices.is_empty() {
            return Err(VulkanError::InvalidOperation {
                reason: "Cannot load a mesh without vertices".to_string(),
            });
        }

        let vertex_buffer = device.create_buffer_with_data(
            bytemuck::cast_slice(vertices),
            vk::BufferUsageFlags::VERTEX_BUFFER,
        )?;
        let index_buffer = if indices.is_empty() {
            None
        } else {
            match device.create_buffer_with_data(
                bytemuck::cast_slice(indices),
                vk::BufferUsageFlags::INDEX_BUFFER,
            ) {
                Ok(buffer) => Some(buffer),
                Err(e) => {
                    device.destroy_buffer(&vertex_buffer);
                    return Err(e);
                }
            }
        };

        let handle = self.slots.reserve();
        self.meshes[usize::from(handle.index())] = Some(GpuMesh {
            vertices: vertex_buffer,
            indices: index_buffer,
            vertex_count: vertices.len() as u32,
            index_count: indices.len() as u32,
        });
        log::debug!(
            "Loaded mesh {:?} ({} vertices, {} indices)",
            handle,
            vertices.len(),
            indices.len()
        );
        Ok(handle)
    }

    /// Load every model of an OBJ file as one triangulated mesh
    pub fn load_from_file<D: GraphicsDevice>(
        &mut self,
        device: &D,
        path: impl AsRef<Path>,
    ) -> VulkanResult<MeshHandle> {
        let path = path.as_ref();
        let options = tobj::LoadOptions {
            single_index: true,
            triangulate: true,
            ..Default::default()
        };
        let (models, _materials) =
            tobj::load_obj(path, &options).map_err(|e| VulkanError::AssetLoad {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;

        let (vertices, indices) = merge_obj_models(&models);
        log::info!(
            "Read {} ({} models, {} vertices)",
            path.display(),
            models.len(),
            vertices.len()
        );
        self.load(device, &vertices, &indices)
    }

    /// Whether `handle` refers to a live mesh
    pub fn is_valid(&self, handle: MeshHandle) -> bool {
        self.slots.is_valid(handle)
    }

    /// Mesh data for a live handle
    pub fn get(&self, handle: MeshHandle) -> &GpuMesh {
        self.slots.assert_valid(handle, "mesh");
        self.meshes[usize::from(handle.index())]
            .as_ref()
            .unwrap_or_else(|| unreachable!("live mesh slot {} is empty", handle.index()))
    }

    /// Bind vertex (and index) buffers
    pub fn bind<D: GraphicsDevice>(
        &self,
        device: &D,
        command_buffer: vk::CommandBuffer,
        handle: MeshHandle,
    ) {
        let mesh = self.get(handle);
        device.cmd_bind_vertex_buffer(command_buffer, mesh.vertices.buffer);
        if let Some(indices) = &mesh.indices {
            device.cmd_bind_index_buffer(command_buffer, indices.buffer);
        }
    }

    /// Draw a bound mesh `instance_count` times
    pub fn draw<D: GraphicsDevice>(
        &self,
        device: &D,
        command_buffer: vk::CommandBuffer,
        handle: MeshHandle,
        instance_count: u32,
    ) {
        let mesh = self.get(handle);
        if mesh.indices.is_some() {
            device.cmd_draw_indexed(command_buffer, mesh.index_count, instance_count);
        } else {
            device.cmd_draw(command_buffer, mesh.vertex_count, instance_count);
        }
    }

    /// Destroy the buffers of specific meshes and free their slots
    ///
    /// # Panics
    /// When any handle is already invalid.
    pub fn unload<D: GraphicsDevice>(&mut self, device: &D, handles: &[MeshHandle]) {
        for &handle in handles {
            self.slots.destroy(&[handle]);
            if let Some(mesh) = self.meshes[usize::from(handle.index())].take() {
                destroy_mesh(device, &mesh);
            }
            log::debug!("Unloaded mesh {:?}", handle);
        }
    }

    /// Destroy every live mesh
    pub fn destroy<D: GraphicsDevice>(&mut self, device: &D) {
        let live = self.slots.live_handles();
        self.unload(device, &live);
    }

    /// Number of live meshes
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// True when no mesh is loaded
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

fn destroy_mesh<D: GraphicsDevice>(device: &D, mesh: &GpuMesh) {
    device.destroy_buffer(&mesh.vertices);
    if let Some(indices) = &mesh.indices {
        device.destroy_buffer(indices);
    }
}

/// Flatten OBJ models into one vertex/index list
///
/// Missing normals and texture coordinates default to zero. The `v` texture
/// coordinate is flipped to Vulkan's top-left origin.
fn merge_obj_models(models: &[tobj::Model]) -> (Vec<Vertex>, Vec<u32>) {
    let mut vertices = Vec::new();
    let mut indices = Vec::new();

    for model in models {
        let mesh = &model.mesh;
        let base = vertices.len() as u32;
        let count = mesh.positions.len() / 3;

        for i in 0..count {
            let position = [
                mesh.positions[3 * i],
                mesh.positions[3 * i + 1],
                mesh.positions[3 * i + 2],
            ];
            let normal = if mesh.normals.len() >= 3 * (i + 1) {
                [
                    mesh.normals[3 * i],
                    mesh.normals[3 * i + 1],
                    mesh.normals[3 * i + 2],
                ]
            } else {
                [0.0; 3]
            };
            let tex_coord = if mesh.texcoords.len() >= 2 * (i + 1) {
                [mesh.texcoords[2 * i], 1.0 - mesh.texcoords[2 * i + 1]]
            } else {
                [0.0; 2]
            };
            vertices.push(Vertex::new(position, normal, tex_coord));
        }
        indices.extend(mesh.indices.iter().map(|index| base + index));
    }

    (vertices, indices)
}
