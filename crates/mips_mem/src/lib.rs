use mmio::MmioOps;
use ram::Ram;
use std::cell::RefCell;
use std::rc::Rc;

/// Strip the kseg0/kseg1 high bits of a guest address, yielding the
/// physical offset both mirrors share.
///
/// kseg1 (uncached) starts at `0xa000_0000`, kseg0 (cached) at
/// `0x8000_0000`; everything below is kuseg and passes through.
pub fn kunseg(addr: u32) -> u32 {
  if addr >= 0xa000_0000 {
    addr - 0xa000_0000
  } else {
    addr & !0x8000_0000
  }
}

/// One entry of the guest memory map.
///
/// `base` and `len` describe the unsegmented guest range. Entries are
/// immutable after the map is built and must not overlap once unsegmented.
#[derive(Clone)]
pub struct MapRegion {
  pub base: u32,
  pub len: u32,
  pub backing: Backing,
}

impl MapRegion {
  pub fn ram(base: u32, ram: Ram) -> MapRegion {
    MapRegion {
      base,
      len: ram.len() as u32,
      backing: Backing::Ram(ram),
    }
  }

  pub fn io(base: u32, len: u32, ops: Rc<RefCell<dyn MmioOps>>) -> MapRegion {
    MapRegion {
      base,
      len,
      backing: Backing::Io(ops),
    }
  }

  fn contains(&self, addr: u32) -> bool {
    addr
      .checked_sub(self.base)
      .filter(|dist| *dist < self.len)
      .is_some()
  }
}

/// What serves a region: plain memory, or a set of I/O callbacks. The
/// presence of callbacks suppresses the direct-memory path entirely.
#[derive(Clone)]
pub enum Backing {
  Ram(Ram),
  Io(Rc<RefCell<dyn MmioOps>>),
}

/// A resolved guest address.
pub enum Resolved {
  /// Direct memory. `offset` is the distance of the unsegmented address
  /// from the region base.
  Ram { ram: Ram, offset: u32 },
  /// Memory-mapped I/O, dispatched through the region's callbacks.
  Io { ops: Rc<RefCell<dyn MmioOps>> },
}

/// The guest memory map: an ordered list of regions, fixed at init.
pub struct MemoryMap {
  regions: Vec<MapRegion>,
}

impl MemoryMap {
  pub fn new(regions: Vec<MapRegion>) -> MemoryMap {
    MemoryMap { regions }
  }

  pub fn len(&self) -> usize {
    self.regions.len()
  }

  pub fn is_empty(&self) -> bool {
    self.regions.is_empty()
  }

  pub fn regions(&self) -> &[MapRegion] {
    &self.regions
  }

  /// Translate a guest address, scanning regions in init order.
  ///
  /// I/O regions match on the raw address, plain memory on the unsegmented
  /// one. The asymmetry lets I/O handlers distinguish the kseg mirrors
  /// while plain memory collapses them.
  pub fn resolve(&self, addr: u32) -> Option<Resolved> {
    let kaddr = kunseg(addr);

    self.regions.iter().find_map(|region| match &region.backing {
      Backing::Io(ops) if region.contains(addr) => Some(Resolved::Io {
        ops: Rc::clone(ops),
      }),
      Backing::Ram(ram) if region.contains(kaddr) => Some(Resolved::Ram {
        ram: ram.clone(),
        offset: kaddr - region.base,
      }),
      _ => None,
    })
  }

  /// The scan order of the generated address-lookup stub: highest-indexed
  /// region downward, direct memory only. Takes an already unsegmented
  /// address.
  pub fn resolve_reverse(&self, kaddr: u32) -> Option<(Ram, u32)> {
    self.regions.iter().rev().find_map(|region| match &region.backing {
      Backing::Ram(ram) if region.contains(kaddr) => {
        Some((ram.clone(), kaddr - region.base))
      }
      _ => None,
    })
  }
}

pub mod mmio;
pub mod ram;
pub mod unaligned;
