//! Pipeline specialization keys
//!
//! A [`PipelineVariantKey`] is passed verbatim as fragment shader
//! specialization data. Constant id 0 is the sampler inclusion mask, constant
//! id 1 the parallax mapping mode.

use ash::vk;
use bitflags::bitflags;
use bytemuck::{Pod, Zeroable};

bitflags! {
    /// Optional texture maps a material provides
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
    pub struct SamplerInclusion: u32 {
        /// Albedo map at material binding 1
        const ALBEDO = 1;
        /// Normal map at material binding 2
        const NORMAL = 1 << 1;
        /// Displacement map at material binding 3
        const DISPLACEMENT = 1 << 2;
        /// Emission map at material binding 4
        const EMISSION = 1 << 3;
    }
}

impl Default for SamplerInclusion {
    fn default() -> Self {
        Self::empty()
    }
}

impl SamplerInclusion {
    /// Shader preprocessor define enabling each included map
    pub const GLSL_DEFINES: [(Self, &'static str); 4] = [
        (Self::ALBEDO, "HAS_ALBEDO"),
        (Self::NORMAL, "HAS_NORMAL"),
        (Self::DISPLACEMENT, "HAS_DISPLACEMENT"),
        (Self::EMISSION, "HAS_EMISSION"),
    ];
}

/// Parallax mapping technique used with displacement maps
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum ParallaxMappingMode {
    /// Single offset lookup
    Basic = 0,
    /// Fixed-step ray march
    Steep = 1,
    /// Ray march with interpolation between the last two steps
    ParallaxOcclusion = 2,
    /// Occlusion mapping with self-shadowing
    #[default]
    Deluxe = 3,
}

/// Everything that distinguishes one compiled pipeline variant from another
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct PipelineVariantKey {
    /// Texture maps the material binds
    pub sampler_inclusion: SamplerInclusion,
    /// Parallax technique
    pub parallax_mode: ParallaxMappingMode,
}

/// Byte layout of a [`PipelineVariantKey`] handed to the driver
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct SpecializationData {
    /// Constant id 0
    pub sampler_inclusion: u32,
    /// Constant id 1
    pub parallax_mode: u32,
}

impl PipelineVariantKey {
    /// Key with the default parallax mode
    pub fn new(sampler_inclusion: SamplerInclusion) -> Self {
        Self {
            sampler_inclusion,
            parallax_mode: ParallaxMappingMode::default(),
        }
    }

    /// Constant values in specialization layout
    pub fn specialization_data(&self) -> SpecializationData {
        SpecializationData {
            sampler_inclusion: self.sampler_inclusion.bits(),
            parallax_mode: self.parallax_mode as u32,
        }
    }

    /// Map entries describing [`SpecializationData`]
    pub fn map_entries() -> [vk::SpecializationMapEntry; 2] {
        [
            vk::SpecializationMapEntry {
                constant_id: 0,
                offset: 0,
                size: 4,
            },
            vk::SpecializationMapEntry {
                constant_id: 1,
                offset: 4,
                size: 4,
            },
        ]
    }

    /// Preprocessor defines for compiling a fragment shader for this key
    ///
    /// Shader compilation happens outside the renderer; this only lists the
    /// defines the compiler needs.
    pub fn glsl_defines(&self) -> Vec<&'static str> {
        SamplerInclusion::GLSL_DEFINES
            .iter()
            .filter(|(flag, _)| self.sampler_inclusion.contains(*flag))
            .map(|&(_, define)| define)
            .collect()
    }
}
