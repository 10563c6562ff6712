//! Pipeline layouts, the shared pipeline template and the variant cache

pub mod layouts;
pub mod pipeline_template;
pub mod specialization;
pub mod variant_cache;

pub use layouts::{DescriptorAllocators, PipelineLayouts, GLOBAL_SET, INSTANCE_SET, MATERIAL_SET};
pub use pipeline_template::{create_variant, PipelineTemplate, VariantShaders};
pub use specialization::{ParallaxMappingMode, PipelineVariantKey, SamplerInclusion};
pub use variant_cache::{PipelineKind, PipelineVariantCache};
