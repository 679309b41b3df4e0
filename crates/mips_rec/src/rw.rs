use crate::state::{ExitFlags, GuestState};
use mips_mem::mmio::MmioOps;
use mips_mem::ram::Ram;
use mips_mem::{unaligned, Resolved};
use mips_opcode::{Kind, Opcode};
use std::cell::RefCell;
use std::rc::Rc;

/// Signature of the load/store dispatcher reachable through
/// `state.rw`. `base` is the value of the base register, `data` the value
/// of the target register (stores and the merge half of `lwl`/`lwr`).
/// Loads return their result; stores return 0.
pub type RwFn = fn(&mut GuestState, &Opcode, u32, u32) -> u32;

/// Execute one guest memory operation with full MIPS semantics.
///
/// An unmapped address raises a segfault on the state and returns 0, so
/// emitted code never branches on failure; it simply runs on to its exit
/// jump with the stop flag raised behind it.
pub fn dispatch(state: &mut GuestState, op: &Opcode, base: u32, data: u32) -> u32 {
  let addr = base.wrapping_add(op.imm() as i32 as u32);

  match state.mem.resolve(addr) {
    None => segfault(state, addr),
    Some(Resolved::Io { ops }) => io_access(&ops, op, addr, data),
    Some(Resolved::Ram { ram, offset }) => ram_access(op, &ram, offset, data),
  }
}

/// Record a guest memory fault: raise the stop flag, mark the exit, let
/// the block run to its exit jump. The executor surfaces it from there.
pub fn segfault(state: &mut GuestState, addr: u32) -> u32 {
  log::error!("guest segfault at {addr:#010x}");
  state.stop = true;
  state.exit_flags.insert(ExitFlags::SEGFAULT);
  0
}

/// The direct-memory half of the engine, also reached from code compiled
/// against the address-lookup stub. `offset` locates the unsegmented
/// address inside the region; region bases are word aligned, so
/// `offset & 3` is the unaligned-access shift.
pub fn ram_access(op: &Opcode, ram: &Ram, offset: u32, data: u32) -> u32 {
  use Kind::*;

  let at = offset as usize;

  match op.kind() {
    Sb => {
      ram.write_byte(at, data as u8);
      0
    }
    Sh => {
      ram.write_halfword(at, data as u16);
      0
    }
    Sw => {
      ram.write_word(at, data);
      0
    }

    Swl | Swr | Lwl | Lwr => {
      let shift = offset & 3;
      let aligned = (offset & !3) as usize;
      let mem = ram.read_word(aligned).unwrap_or(0);

      match op.kind() {
        Swl => {
          ram.write_word(aligned, unaligned::swl(mem, data, shift));
          0
        }
        Swr => {
          ram.write_word(aligned, unaligned::swr(mem, data, shift));
          0
        }
        Lwl => unaligned::lwl(mem, data, shift),
        _ => unaligned::lwr(mem, data, shift),
      }
    }

    Lb => ram.read_byte(at).map(|b| b as i8 as i32 as u32).unwrap_or(0),
    Lbu => ram.read_byte(at).map(u32::from).unwrap_or(0),
    Lh => ram
      .read_halfword(at)
      .map(|h| h as i16 as i32 as u32)
      .unwrap_or(0),
    Lhu => ram.read_halfword(at).map(u32::from).unwrap_or(0),
    Lw => ram.read_word(at).unwrap_or(0),

    other => {
      log::warn!("non-memory opcode {other:?} reached the load/store engine");
      0
    }
  }
}

/// The I/O half: everything funnels through the region's callbacks, which
/// see the raw (pre-unsegment) address. Unaligned word ops read, merge
/// and write back through the word callbacks.
fn io_access(ops: &Rc<RefCell<dyn MmioOps>>, op: &Opcode, addr: u32, data: u32) -> u32 {
  use Kind::*;

  let mut ops = ops.borrow_mut();

  match op.kind() {
    Sb => {
      ops.sb(op, addr, data as u8);
      0
    }
    Sh => {
      ops.sh(op, addr, data as u16);
      0
    }
    Sw => {
      ops.sw(op, addr, data);
      0
    }

    Swl | Swr | Lwl | Lwr => {
      let shift = addr & 3;
      let aligned = addr & !3;
      let mem = ops.lw(op, aligned);

      match op.kind() {
        Swl => {
          ops.sw(op, aligned, unaligned::swl(mem, data, shift));
          0
        }
        Swr => {
          ops.sw(op, aligned, unaligned::swr(mem, data, shift));
          0
        }
        Lwl => unaligned::lwl(mem, data, shift),
        _ => unaligned::lwr(mem, data, shift),
      }
    }

    Lb => ops.lb(op, addr) as i8 as i32 as u32,
    Lbu => ops.lb(op, addr) as u32,
    Lh => ops.lh(op, addr) as i16 as i32 as u32,
    Lhu => ops.lh(op, addr) as u32,
    Lw => ops.lw(op, addr),

    other => {
      log::warn!("non-memory opcode {other:?} reached the load/store engine");
      0
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::testutil::state_with_map;
  use mips_mem::{MapRegion, MemoryMap};

  fn op(word: u32) -> Opcode {
    Opcode::new(word)
  }

  #[test]
  fn loads_extend_correctly() {
    let ram = Ram::zeroed(0x100);
    ram.write_byte(8, 0xff);
    let mut state = state_with_map(MemoryMap::new(vec![MapRegion::ram(0, ram)]));

    // lb $1, 8($0) / lbu $1, 8($0)
    k9::assert_equal!(dispatch(&mut state, &op(0x8001_0008), 0, 0), 0xffff_ffff);
    k9::assert_equal!(dispatch(&mut state, &op(0x9001_0008), 0, 0), 0x0000_00ff);
    k9::assert_equal!(state.stop, false);
  }

  #[test]
  fn negative_displacements_wrap() {
    let ram = Ram::zeroed(0x100);
    ram.write_byte(0x10, 0x42);
    let mut state = state_with_map(MemoryMap::new(vec![MapRegion::ram(0, ram)]));

    // lbu $1, -16($2) with $2 holding 0x20
    k9::assert_equal!(dispatch(&mut state, &op(0x9041_fff0), 0x20, 0), 0x42);
  }

  #[test]
  fn unmapped_access_raises_a_segfault() {
    let mut state = state_with_map(MemoryMap::new(vec![]));

    // lw $1, 0($0) against an empty map
    k9::assert_equal!(dispatch(&mut state, &op(0x8c01_0000), 0xdead_beef, 0), 0);
    k9::assert_equal!(state.stop, true);
    assert!(state.exit_flags.contains(ExitFlags::SEGFAULT));
  }

  #[test]
  fn store_then_load_through_the_mirrors() {
    let ram = Ram::zeroed(0x100);
    let mut state = state_with_map(MemoryMap::new(vec![MapRegion::ram(0, ram.clone())]));

    // sb $1, 0x10($2) via kseg1, then lbu via kseg0
    dispatch(&mut state, &op(0xa041_0010), 0xa000_0000, 0x77);
    k9::assert_equal!(ram.read_byte(0x10), Some(0x77));
    k9::assert_equal!(dispatch(&mut state, &op(0x9041_0010), 0x8000_0000, 0), 0x77);
  }

  #[test]
  fn unaligned_stores_merge_in_ram() {
    let ram = Ram::zeroed(0x200);
    ram.write_word(0x100, 0xaabb_ccdd);
    let mut state = state_with_map(MemoryMap::new(vec![MapRegion::ram(0, ram.clone())]));

    // swl $1, 0x101($0) then swr $1, 0x101($0)
    dispatch(&mut state, &op(0xa801_0101), 0, 0x1122_3344);
    k9::assert_equal!(ram.read_word(0x100), Some(0xaabb_1122));
    dispatch(&mut state, &op(0xb801_0101), 0, 0x1122_3344);
    k9::assert_equal!(ram.read_word(0x100), Some(0x2233_4422));
  }

  #[test]
  fn mmio_loads_are_sign_extended_by_the_engine() {
    struct NegByte;

    impl MmioOps for NegByte {
      fn sb(&mut self, _: &Opcode, _: u32, _: u8) {}
      fn sh(&mut self, _: &Opcode, _: u32, _: u16) {}
      fn sw(&mut self, _: &Opcode, _: u32, _: u32) {}
      fn lb(&mut self, _: &Opcode, _: u32) -> u8 {
        0x80
      }
      fn lh(&mut self, _: &Opcode, _: u32) -> u16 {
        0x8000
      }
      fn lw(&mut self, _: &Opcode, _: u32) -> u32 {
        0
      }
    }

    let ops: Rc<RefCell<dyn MmioOps>> = Rc::new(RefCell::new(NegByte));
    let mut state =
      state_with_map(MemoryMap::new(vec![MapRegion::io(0x1f00_0000, 0x100, ops)]));

    // lb $1, 0($2) / lh $1, 0($2) / lbu $1, 0($2)
    k9::assert_equal!(dispatch(&mut state, &op(0x8041_0000), 0x1f00_0000, 0), 0xffff_ff80);
    k9::assert_equal!(dispatch(&mut state, &op(0x8441_0000), 0x1f00_0000, 0), 0xffff_8000);
    k9::assert_equal!(dispatch(&mut state, &op(0x9041_0000), 0x1f00_0000, 0), 0x0000_0080);
  }
}
