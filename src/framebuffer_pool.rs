//! RTT framebuffer pool.
//!
//! Three size classes (256/512/1024 by default, see
//! [`crate::config::RendererConfig::rtt_pool_size_classes`]) each subdivide a
//! backing atlas texture into equal-sized regions. A request above the
//! largest size class falls back to a dedicated framebuffer.

use crate::id::TextureId;

/// One allocated render target: either a region of a shared atlas, or a
/// dedicated framebuffer for an oversized request.
#[derive(Debug, Clone, Copy)]
pub struct Allocation {
    pub backing_texture: TextureId,
    /// Offset and size within `backing_texture`, in pixels.
    pub rect: (u32, u32, u32, u32),
    pub dedicated: bool,
}

struct Atlas {
    backing_texture: TextureId,
    region_size: u32,
    regions_per_side: u32,
    free_regions: Vec<u32>,
}

impl Atlas {
    fn new(backing_texture: TextureId, region_size: u32, atlas_side: u32) -> Self {
        let regions_per_side = atlas_side / region_size;
        let total = regions_per_side * regions_per_side;
        Atlas { backing_texture, region_size, regions_per_side, free_regions: (0..total).rev().collect() }
    }

    fn alloc(&mut self) -> Option<Allocation> {
        let index = self.free_regions.pop()?;
        let col = index % self.regions_per_side;
        let row = index / self.regions_per_side;
        Some(Allocation {
            backing_texture: self.backing_texture,
            rect: (col * self.region_size, row * self.region_size, self.region_size, self.region_size),
            dedicated: false,
        })
    }

    fn free(&mut self, rect: (u32, u32, u32, u32)) {
        let col = rect.0 / self.region_size;
        let row = rect.1 / self.region_size;
        let index = row * self.regions_per_side + col;
        self.free_regions.push(index);
    }
}

/// Backs each size-class pool's atlas allocation; one atlas side fits a
/// reasonable number of regions without ballooning memory for size classes
/// that see light use.
const REGIONS_PER_ATLAS_SIDE: u32 = 4;

struct SizeClassPool {
    size_class: u32,
    atlases: Vec<Atlas>,
}

impl SizeClassPool {
    fn new(size_class: u32) -> Self {
        SizeClassPool { size_class, atlases: Vec::new() }
    }

    /// Allocates a region, creating a new backing atlas via `create_backing`
    /// if every existing atlas in this class is full.
    fn alloc(&mut self, create_backing: &mut dyn FnMut(u32) -> Option<TextureId>) -> Option<Allocation> {
        for atlas in &mut self.atlases {
            if let Some(alloc) = atlas.alloc() {
                return Some(alloc);
            }
        }
        let atlas_side = self.size_class * REGIONS_PER_ATLAS_SIDE;
        let backing = create_backing(atlas_side)?;
        let mut atlas = Atlas::new(backing, self.size_class, atlas_side);
        let alloc = atlas.alloc();
        self.atlases.push(atlas);
        alloc
    }

    fn free(&mut self, allocation: &Allocation) {
        if let Some(atlas) = self.atlases.iter_mut().find(|a| a.backing_texture == allocation.backing_texture) {
            atlas.free(allocation.rect);
        }
    }
}

/// Owns the three size-class pools plus dedicated-framebuffer bookkeeping
/// for oversized requests.
pub struct FramebufferPool {
    classes: Vec<SizeClassPool>,
    dedicated: Vec<TextureId>,
}

impl FramebufferPool {
    pub fn new(size_classes: &[u32]) -> Self {
        let mut classes: Vec<SizeClassPool> = size_classes.iter().map(|&s| SizeClassPool::new(s)).collect();
        classes.sort_by_key(|c| c.size_class);
        FramebufferPool { classes, dedicated: Vec::new() }
    }

    /// Allocates a render target able to hold `width x height`. Picks the
    /// smallest size class that fits both dimensions; falls back to a
    /// dedicated framebuffer if the request exceeds every class
    ///.
    pub fn alloc(
        &mut self,
        width: u32,
        height: u32,
        mut create_backing: impl FnMut(u32) -> Option<TextureId>,
        mut create_dedicated: impl FnMut(u32, u32) -> Option<TextureId>,
    ) -> Option<Allocation> {
        let largest = self.classes.last().map(|c| c.size_class).unwrap_or(0);
        if width > largest || height > largest {
            let texture = create_dedicated(width, height)?;
            self.dedicated.push(texture);
            return Some(Allocation { backing_texture: texture, rect: (0, 0, width, height), dedicated: true });
        }

        let class = self.classes.iter_mut().find(|c| c.size_class >= width.max(height))?;
        class.alloc(&mut create_backing)
    }

    pub fn free(&mut self, allocation: &Allocation) {
        if allocation.dedicated {
            self.dedicated.retain(|&t| t != allocation.backing_texture);
            return;
        }
        for class in &mut self.classes {
            class.free(allocation);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stub_backing(next_id: &mut u64) -> impl FnMut(u32) -> Option<TextureId> + '_ {
        move |_side| {
            *next_id += 1;
            Some(TextureId(*next_id))
        }
    }

    #[test]
    fn request_picks_smallest_fitting_size_class() {
        let mut pool = FramebufferPool::new(&[256, 512, 1024]);
        let mut next_id = 0u64;
        let alloc = pool.alloc(200, 200, stub_backing(&mut next_id), |_, _| None).unwrap();
        assert!(!alloc.dedicated);
        assert_eq!(alloc.rect.2, 256);
    }

    #[test]
    fn oversized_request_falls_back_to_dedicated() {
        let mut pool = FramebufferPool::new(&[256, 512, 1024]);
        let mut next_id = 0u64;
        let alloc = pool.alloc(2048, 2048, stub_backing(&mut next_id), |w, h| {
            next_id += 1;
            assert_eq!((w, h), (2048, 2048));
            Some(TextureId(next_id))
        });
        assert!(alloc.unwrap().dedicated);
    }

    #[test]
    fn freed_region_is_reused_before_allocating_a_new_atlas() {
        let mut pool = FramebufferPool::new(&[256]);
        let mut next_id = 0u64;
        let first = pool.alloc(256, 256, stub_backing(&mut next_id), |_, _| None).unwrap();
        pool.free(&first);
        let backing_count_before = next_id;
        let second = pool.alloc(256, 256, stub_backing(&mut next_id), |_, _| None).unwrap();
        assert_eq!(next_id, backing_count_before);
        assert_eq!(second.backing_texture, first.backing_texture);
    }
}
