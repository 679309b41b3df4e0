use crate::rw;
use crate::state::GuestState;
use mips_mem::{kunseg, ram::Ram};

/// A direct-memory hit from the address-lookup fast path.
pub struct DirectHit {
  pub ram: Ram,
  /// Distance of the unsegmented address from the region base.
  pub offset: u32,
}

/// Signature of the address-lookup routine on `state.lookup`.
pub type LookupFn = fn(&mut GuestState, u32) -> Option<DirectHit>;

/// Reference form of the generated address-lookup stub.
///
/// This is what a backend's [`generate_address_lookup`] output computes in
/// native code: unsegment the address, then scan the memory map from the
/// highest-indexed entry downward over direct regions only. A miss
/// tail-calls the segfault handler with the state and the raw address, so
/// the calling block runs on to its exit with the stop flag raised.
///
/// Going through this routine instead of the full dispatcher spares
/// emitted loads and stores the per-opcode table dispatch when the access
/// is known not to hit I/O.
///
/// [`generate_address_lookup`]: crate::backend::CodeBackend::generate_address_lookup
pub fn stub(state: &mut GuestState, addr: u32) -> Option<DirectHit> {
  let kaddr = kunseg(addr);

  match state.mem.resolve_reverse(kaddr) {
    Some((ram, offset)) => Some(DirectHit { ram, offset }),
    None => {
      rw::segfault(state, addr);
      None
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::state::ExitFlags;
  use crate::testutil::state_with_map;
  use mips_mem::{MapRegion, MemoryMap};

  #[test]
  fn resolves_direct_memory_through_the_mirrors() {
    let ram = Ram::zeroed(0x100);
    ram.write_byte(0x20, 0x99);
    let mut state = state_with_map(MemoryMap::new(vec![MapRegion::ram(0, ram)]));

    let hit = stub(&mut state, 0xa000_0020).unwrap();
    k9::assert_equal!(hit.offset, 0x20);
    k9::assert_equal!(hit.ram.read_byte(0x20), Some(0x99));
  }

  #[test]
  fn a_miss_tail_calls_the_segfault_handler() {
    let mut state = state_with_map(MemoryMap::new(vec![MapRegion::ram(
      0,
      Ram::zeroed(0x100),
    )]));

    assert!(stub(&mut state, 0x4000_0000).is_none());
    k9::assert_equal!(state.stop, true);
    assert!(state.exit_flags.contains(ExitFlags::SEGFAULT));
  }
}
