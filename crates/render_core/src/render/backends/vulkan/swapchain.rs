//! Presentation target contract
//!
//! Surface and swapchain negotiation live outside the renderer core. The frame
//! loop only needs to acquire an image, find the framebuffer that wraps it,
//! present it and ask for a rebuild when the surface changes.

use ash::vk;

use super::device::VulkanResult;

/// Result of acquiring the next presentable image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// An image is ready to be rendered into
    Ready {
        /// Swapchain image index
        image_index: u32,
        /// The swapchain still works but no longer matches the surface
        suboptimal: bool,
    },
    /// The swapchain must be recreated before rendering
    OutOfDate,
}

/// Result of presenting an image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentOutcome {
    /// Presented normally
    Presented,
    /// Presented, but the swapchain should be recreated
    Suboptimal,
    /// Not presented; the swapchain must be recreated
    OutOfDate,
}

impl PresentOutcome {
    /// Whether swapchain-dependent state has to be rebuilt
    pub fn needs_recreate(self) -> bool {
        !matches!(self, Self::Presented)
    }
}

/// Swapchain plus the render pass and framebuffers built on it
pub trait SwapchainTarget {
    /// Acquire the next image, signaling `signal` once it is available
    ///
    /// Out-of-date is reported through [`AcquireOutcome::OutOfDate`]; any
    /// other failure is an error.
    fn acquire_next_image(&mut self, signal: vk::Semaphore) -> VulkanResult<AcquireOutcome>;

    /// Queue `image_index` for presentation after `wait` is signaled
    fn present(&mut self, image_index: u32, wait: vk::Semaphore) -> VulkanResult<PresentOutcome>;

    /// Rebuild the swapchain and everything sized to it
    fn recreate(&mut self) -> VulkanResult<()>;

    /// Current image extent
    fn extent(&self) -> vk::Extent2D;

    /// Render pass compatible with every framebuffer
    fn render_pass(&self) -> vk::RenderPass;

    /// Framebuffer for a swapchain image
    fn framebuffer(&self, image_index: u32) -> vk::Framebuffer;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_present_outcome_recreate() {
        assert!(!PresentOutcome::Presented.needs_recreate());
        assert!(PresentOutcome::Suboptimal.needs_recreate());
        assert!(PresentOutcome::OutOfDate.needs_recreate());
    }
}
