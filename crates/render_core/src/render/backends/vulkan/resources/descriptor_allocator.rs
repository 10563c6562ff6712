//! Growable descriptor pool allocator
//!
//! Descriptor sets are carved from backing pools that each hold
//! `sets_per_pool` sets of one per-set quota. Pools with spare room sit in the
//! ready list; a pool that reports exhaustion moves to the full list and the
//! allocation retries on another (possibly brand new) pool. Nothing is freed
//! individually: [`DescriptorAllocator::clear_pools`] resets every pool at once
//! and invalidates every set handed out before it.

use ash::vk;

use crate::render::backends::vulkan::{GraphicsDevice, VulkanResult};

/// Descriptor allocator spanning any number of backing pools
#[derive(Debug)]
pub struct DescriptorAllocator {
    pool_sizes: Vec<vk::DescriptorPoolSize>,
    ready_pools: Vec<vk::DescriptorPool>,
    full_pools: Vec<vk::DescriptorPool>,
    sets_per_pool: u32,
}

impl DescriptorAllocator {
    /// Create an allocator; no pool exists until the first allocation
    ///
    /// `pool_sizes` is the quota of a single set, e.g. one uniform buffer and
    /// four combined image samplers.
    pub fn new(pool_sizes: &[vk::DescriptorPoolSize], sets_per_pool: u32) -> Self {
        assert!(sets_per_pool > 0, "A descriptor pool must hold at least one set");
        Self {
            pool_sizes: pool_sizes.to_vec(),
            ready_pools: Vec::new(),
            full_pools: Vec::new(),
            sets_per_pool,
        }
    }

    fn create_pool<D: GraphicsDevice>(&self, device: &D) -> VulkanResult<vk::DescriptorPool> {
        let sizes: Vec<vk::DescriptorPoolSize> = self
            .pool_sizes
            .iter()
            .map(|size| vk::DescriptorPoolSize {
                ty: size.ty,
                descriptor_count: size.descriptor_count * self.sets_per_pool,
            })
            .collect();

        let pool = device.create_descriptor_pool(self.sets_per_pool, &sizes)?;
        log::info!(
            "Created descriptor pool {:?} ({} sets, {} ready, {} full)",
            pool,
            self.sets_per_pool,
            self.ready_pools.len(),
            self.full_pools.len()
        );
        Ok(pool)
    }

    /// Allocate `count` sets of `layout`
    ///
    /// Spans as many pools as needed. Errors other than pool exhaustion are
    /// returned to the caller.
    ///
    /// # Panics
    /// When `count` exceeds `sets_per_pool`, since no single pool could ever
    /// satisfy the request.
    pub fn allocate<D: GraphicsDevice>(
        &mut self,
        device: &D,
        layout: vk::DescriptorSetLayout,
        count: u32,
    ) -> VulkanResult<Vec<vk::DescriptorSet>> {
        assert!(
            count <= self.sets_per_pool,
            "Number of descriptor sets requested at once ({}) is greater than the sets per pool ({})",
            count,
            self.sets_per_pool
        );
        let layouts = vec![layout; count as usize];

        loop {
            let pool = match self.ready_pools.pop() {
                Some(pool) => pool,
                None => self.create_pool(device)?,
            };

            match device.allocate_descriptor_sets(pool, &layouts) {
                Ok(sets) => {
                    self.ready_pools.push(pool);
                    return Ok(sets);
                }
                Err(e) if e.is_pool_exhausted() => {
                    log::debug!("Descriptor pool {:?} exhausted", pool);
                    self.full_pools.push(pool);
                }
                Err(e) => {
                    self.ready_pools.push(pool);
                    return Err(e);
                }
            }
        }
    }

    /// Reset every pool and make all of them ready again
    ///
    /// Every set previously allocated from this allocator becomes invalid.
    pub fn clear_pools<D: GraphicsDevice>(&mut self, device: &D) -> VulkanResult<()> {
        for &pool in self.ready_pools.iter().chain(&self.full_pools) {
            device.reset_descriptor_pool(pool)?;
        }
        self.ready_pools.append(&mut self.full_pools);
        Ok(())
    }

    /// Destroy every backing pool
    pub fn destroy<D: GraphicsDevice>(&mut self, device: &D) {
        for pool in self.ready_pools.drain(..).chain(self.full_pools.drain(..)) {
            device.destroy_descriptor_pool(pool);
        }
    }

    /// Pools with spare capacity
    pub fn ready_pool_count(&self) -> usize {
        self.ready_pools.len()
    }

    /// Pools retired until the next clear
    pub fn full_pool_count(&self) -> usize {
        self.full_pools.len()
    }

    /// Sets carved from each backing pool
    pub fn sets_per_pool(&self) -> u32 {
        self.sets_per_pool
    }
}
