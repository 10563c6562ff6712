//! Configuration system
//!
//! [`Config`] gives any serde type TOML/RON file loading chosen by extension.
//! [`RendererConfig`] carries the design-time budgets of the renderer core:
//! frames in flight, per-kind storage capacities and descriptor batching
//! sizes.

pub use serde::{Deserialize, Serialize};

use crate::foundation::slot_array::MAX_SLOT_CAPACITY;
use crate::render::pipelines::layouts::MATERIAL_TEXTURE_BINDINGS;

/// Configuration trait
pub trait Config: Serialize + for<'de> Deserialize<'de> + Default {
    /// Load configuration from file
    fn load_from_file(path: &str) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(ConfigError::Io)?;

        if path.ends_with(".toml") {
            toml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
        } else if path.ends_with(".ron") {
            ron::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
        } else {
            Err(ConfigError::UnsupportedFormat(path.to_string()))
        }
    }

    /// Save configuration to file
    fn save_to_file(&self, path: &str) -> Result<(), ConfigError> {
        let contents = if path.ends_with(".toml") {
            toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?
        } else if path.ends_with(".ron") {
            ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
                .map_err(|e| ConfigError::Serialize(e.to_string()))?
        } else {
            return Err(ConfigError::UnsupportedFormat(path.to_string()));
        };

        std::fs::write(path, contents).map_err(ConfigError::Io)
    }
}

/// Configuration errors
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialize(String),

    /// Unsupported format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// A value is outside the range the renderer supports
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Slot capacities for every resource storage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageCapacities {
    /// Maximum live meshes
    pub meshes: usize,
    /// Maximum live shader modules
    pub shaders: usize,
    /// Maximum live textures
    pub textures: usize,
    /// Maximum live material instances
    pub materials: usize,
    /// Maximum registered instance buffers
    pub instance_buffers: usize,
}

impl Default for StorageCapacities {
    fn default() -> Self {
        Self {
            meshes: 1000,
            shaders: 1 << 8,
            textures: 1000,
            materials: 1000,
            instance_buffers: 64,
        }
    }
}

/// Descriptor pool growth and write batching sizes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DescriptorConfig {
    /// Descriptor sets carved from each backing pool
    pub sets_per_pool: u32,
    /// Pending buffer descriptor writes allowed between flushes
    pub max_buffer_writes: usize,
    /// Pending image descriptor writes allowed between flushes
    pub max_image_writes: usize,
}

impl Default for DescriptorConfig {
    fn default() -> Self {
        Self {
            sets_per_pool: 64,
            max_buffer_writes: 1024,
            max_image_writes: 1024,
        }
    }
}

/// Renderer core configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Frames the CPU may record ahead of the GPU
    pub frames_in_flight: usize,
    /// Clear color of the main render pass
    pub clear_color: [f32; 4],
    /// Storage capacities
    pub capacities: StorageCapacities,
    /// Descriptor pool / write batch sizing
    pub descriptors: DescriptorConfig,
}

impl RendererConfig {
    /// Create a configuration with default budgets
    pub fn new() -> Self {
        Self::default()
    }

    /// Set frames in flight
    pub fn with_frames_in_flight(mut self, frames: usize) -> Self {
        self.frames_in_flight = frames;
        self
    }

    /// Set storage capacities
    pub fn with_capacities(mut self, capacities: StorageCapacities) -> Self {
        self.capacities = capacities;
        self
    }

    /// Set descriptor sizing
    pub fn with_descriptors(mut self, descriptors: DescriptorConfig) -> Self {
        self.descriptors = descriptors;
        self
    }

    /// Set the clear color
    pub fn with_clear_color(mut self, clear_color: [f32; 4]) -> Self {
        self.clear_color = clear_color;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.frames_in_flight == 0 {
            return Err(ConfigError::Invalid(
                "Frames in flight must be at least 1".to_string(),
            ));
        }
        if self.frames_in_flight > 8 {
            return Err(ConfigError::Invalid(
                "Frames in flight should not exceed 8".to_string(),
            ));
        }

        let capacities = [
            ("meshes", self.capacities.meshes),
            ("shaders", self.capacities.shaders),
            ("textures", self.capacities.textures),
            ("materials", self.capacities.materials),
            ("instance_buffers", self.capacities.instance_buffers),
        ];
        for (name, capacity) in capacities {
            if capacity > MAX_SLOT_CAPACITY {
                return Err(ConfigError::Invalid(format!(
                    "Capacity for {} ({}) exceeds {}",
                    name, capacity, MAX_SLOT_CAPACITY
                )));
            }
        }

        if self.descriptors.sets_per_pool == 0 {
            return Err(ConfigError::Invalid(
                "Descriptor sets per pool must be at least 1".to_string(),
            ));
        }
        // Instance buffers allocate one set per frame in a single call.
        if (self.descriptors.sets_per_pool as usize) < self.frames_in_flight {
            return Err(ConfigError::Invalid(format!(
                "Descriptor sets per pool ({}) must cover every frame in flight ({})",
                self.descriptors.sets_per_pool, self.frames_in_flight
            )));
        }

        // One material or instance buffer must fit an empty write batch.
        if self.descriptors.max_buffer_writes < self.frames_in_flight {
            return Err(ConfigError::Invalid(format!(
                "Buffer write batch ({}) must cover every frame in flight ({})",
                self.descriptors.max_buffer_writes, self.frames_in_flight
            )));
        }
        if self.descriptors.max_image_writes < MATERIAL_TEXTURE_BINDINGS.len() {
            return Err(ConfigError::Invalid(format!(
                "Image write batch ({}) must hold the {} textures of one material",
                self.descriptors.max_image_writes,
                MATERIAL_TEXTURE_BINDINGS.len()
            )));
        }

        Ok(())
    }
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            frames_in_flight: 2,
            clear_color: [0.0, 0.0, 0.0, 1.0],
            capacities: StorageCapacities::default(),
            descriptors: DescriptorConfig::default(),
        }
    }
}

impl Config for RendererConfig {}
