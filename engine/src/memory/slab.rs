/*!
 * Slab Cache
 *
 * Free-list cache for the smallest allocation classes (16, 32, 64, 128
 * bytes). Each class chains its free objects through the first word of the
 * object itself; growing a class carves one slab of `objects_per_slab`
 * objects in ascending address order, splicing the previous list head onto
 * the tail. Slab bytes never count toward any pool's used size.
 */

use super::types::AddressSpace;
use crate::core::limits::{SLAB_CLASS_COUNT, SLAB_MAX_SIZE, SLAB_MIN_SIZE};
use crate::core::types::{Address, Size};
use log::debug;

/// End-of-list marker written into the last free object's link word
const LINK_NONE: u64 = u64::MAX;

/// Where an address landed inside the cache
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SlabHit {
    pub class_size: Size,
    pub object_base: Address,
    pub offset_in_object: Size,
}

struct SlabRegion {
    base: Address,
    bytes: Box<[u8]>,
}

struct SlabClass {
    object_size: Size,
    free_head: Option<Address>,
    free_objects: usize,
    regions: Vec<SlabRegion>,
}

impl SlabClass {
    fn region_of(&self, addr: Address) -> Option<&SlabRegion> {
        self.regions
            .iter()
            .find(|region| addr >= region.base && addr < region.base + region.bytes.len())
    }

    fn read_link(&self, addr: Address) -> Option<Address> {
        let region = self.region_of(addr).expect("free-list entry outside class");
        let at = addr - region.base;
        let raw = u64::from_le_bytes(region.bytes[at..at + 8].try_into().unwrap());
        (raw != LINK_NONE).then_some(raw as Address)
    }

    fn write_link(&mut self, addr: Address, link: Option<Address>) {
        let base = self
            .region_of(addr)
            .map(|region| region.base)
            .expect("free-list entry outside class");
        let region = self
            .regions
            .iter_mut()
            .find(|region| region.base == base)
            .unwrap();
        let at = addr - region.base;
        let raw = link.map_or(LINK_NONE, |link| link as u64);
        region.bytes[at..at + 8].copy_from_slice(&raw.to_le_bytes());
    }
}

/// Fixed-size-class cache for very small allocations
pub(crate) struct SlabCache {
    classes: Vec<SlabClass>,
    objects_per_slab: usize,
}

impl SlabCache {
    pub(crate) fn new(objects_per_slab: usize) -> Self {
        let classes = (0..SLAB_CLASS_COUNT)
            .map(|i| SlabClass {
                object_size: SLAB_MIN_SIZE << i,
                free_head: None,
                free_objects: 0,
                regions: Vec::new(),
            })
            .collect();
        Self {
            classes,
            objects_per_slab,
        }
    }

    /// Smallest class index whose size covers `size`; None above the
    /// slab maximum.
    fn class_index(size: Size) -> Option<usize> {
        if size > SLAB_MAX_SIZE {
            return None;
        }
        (0..SLAB_CLASS_COUNT).find(|&i| (SLAB_MIN_SIZE << i) >= size)
    }

    /// Pop an object from the matching class, carving a new slab when the
    /// free list is empty. None when the request exceeds the slab maximum.
    pub(crate) fn alloc(&mut self, size: Size, space: &AddressSpace) -> Option<Address> {
        let index = Self::class_index(size)?;

        if self.classes[index].free_objects == 0 {
            self.grow(index, space);
        }

        let class = &mut self.classes[index];
        let head = class.free_head?;
        class.free_head = class.read_link(head);
        class.free_objects -= 1;
        Some(head)
    }

    /// Carve one slab of `objects_per_slab` objects and splice it at the
    /// head of the class free list.
    fn grow(&mut self, index: usize, space: &AddressSpace) {
        let object_size = self.classes[index].object_size;
        let count = self.objects_per_slab;
        let slab_len = object_size * count;
        let base = space.claim(slab_len);

        let region = SlabRegion {
            base,
            bytes: vec![0u8; slab_len].into_boxed_slice(),
        };
        let old_head = self.classes[index].free_head;
        let class = &mut self.classes[index];
        class.regions.push(region);

        // Thread objects in ascending order; the last link points at the
        // previous head.
        for i in 0..count {
            let object = base + i * object_size;
            let link = if i + 1 < count {
                Some(base + (i + 1) * object_size)
            } else {
                old_head
            };
            class.write_link(object, link);
        }
        class.free_head = Some(base);
        class.free_objects += count;

        debug!(
            "slab class {}: grew by {} objects at 0x{:x}",
            object_size, count, base
        );
    }

    /// Push an object back on its class free list. The caller has already
    /// classified `addr` as slab-owned.
    pub(crate) fn free(&mut self, addr: Address, size: Size) {
        let Some(index) = Self::class_index(size) else {
            return;
        };
        let old_head = self.classes[index].free_head;
        let class = &mut self.classes[index];
        class.write_link(addr, old_head);
        class.free_head = Some(addr);
        class.free_objects += 1;
    }

    /// Classify an address against every class's slab regions.
    pub(crate) fn classify(&self, addr: Address) -> Option<SlabHit> {
        for class in &self.classes {
            if let Some(region) = class.region_of(addr) {
                let rel = addr - region.base;
                let object_base = region.base + rel / class.object_size * class.object_size;
                return Some(SlabHit {
                    class_size: class.object_size,
                    object_base,
                    offset_in_object: addr - object_base,
                });
            }
        }
        None
    }

    /// Find the (class, region) pair owning `addr`, with the bounds of the
    /// containing object checked against `len`.
    fn locate(&self, addr: Address, len: Size) -> Option<(usize, usize)> {
        for (class_idx, class) in self.classes.iter().enumerate() {
            for (region_idx, region) in class.regions.iter().enumerate() {
                if addr >= region.base && addr < region.base + region.bytes.len() {
                    let offset_in_object = (addr - region.base) % class.object_size;
                    if offset_in_object + len > class.object_size {
                        return None;
                    }
                    return Some((class_idx, region_idx));
                }
            }
        }
        None
    }

    /// Copy into an object's bytes; the write must stay inside one object.
    pub(crate) fn write(&mut self, addr: Address, data: &[u8]) -> bool {
        let Some((class_idx, region_idx)) = self.locate(addr, data.len()) else {
            return false;
        };
        let region = &mut self.classes[class_idx].regions[region_idx];
        let at = addr - region.base;
        region.bytes[at..at + data.len()].copy_from_slice(data);
        true
    }

    /// Read from an object's bytes; the read must stay inside one object.
    pub(crate) fn read(&self, addr: Address, len: Size) -> Option<Vec<u8>> {
        let (class_idx, region_idx) = self.locate(addr, len)?;
        let region = &self.classes[class_idx].regions[region_idx];
        let at = addr - region.base;
        Some(region.bytes[at..at + len].to_vec())
    }

    /// (class size, free object count) per class, for observability.
    pub(crate) fn free_counts(&self) -> Vec<(Size, usize)> {
        self.classes
            .iter()
            .map(|class| (class.object_size, class.free_objects))
            .collect()
    }
}
