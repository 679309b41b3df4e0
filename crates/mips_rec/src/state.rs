use crate::backend::CoprocOps;
use crate::lookup::LookupFn;
use crate::rw::RwFn;
use derive_more::Deref;
use mips_mem::MemoryMap;
use std::cell::RefCell;
use std::rc::Rc;

/// The guest register file.
///
/// Reads go through `Deref` straight into the array; writes go through
/// [`Registers::set`], which keeps `$zero` hard-wired to zero.
#[derive(Debug, Deref)]
pub struct Registers {
  #[deref]
  gpr: [u32; 32],
  pub hi: u32,
  pub lo: u32,
}

impl Registers {
  pub fn init() -> Registers {
    Registers {
      gpr: [0; 32],
      hi: 0,
      lo: 0,
    }
  }

  /// Write a general-purpose register. Writes to `$zero` are dropped.
  pub fn set(&mut self, n: usize, value: u32) {
    if let Some(slot) = self.gpr.get_mut(n).filter(|_| n != 0) {
      *slot = value;
    }
  }
}

/// Why the last block exited. `NORMAL` is the empty set; emitters may set
/// several of the other bits before jumping to the exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExitFlags(u32);

impl ExitFlags {
  pub const NORMAL: ExitFlags = ExitFlags(0);
  pub const SEGFAULT: ExitFlags = ExitFlags(1 << 0);
  pub const SYSCALL: ExitFlags = ExitFlags(1 << 1);
  pub const BREAK: ExitFlags = ExitFlags(1 << 2);

  pub fn insert(&mut self, other: ExitFlags) {
    self.0 |= other.0;
  }

  pub fn contains(self, other: ExitFlags) -> bool {
    self.0 & other.0 == other.0
  }

  pub fn bits(self) -> u32 {
    self.0
  }
}

/// Everything emitted code can see and touch while a block runs.
///
/// On a native backend this struct sits behind the state-pointer register
/// for the whole `execute` call, so it is boxed by the owning [`Dynarec`]
/// and never moves. The compilation machinery (cache, backend, allocator)
/// lives on the `Dynarec` instead, which keeps block execution and cache
/// bookkeeping from borrowing each other.
///
/// [`Dynarec`]: crate::Dynarec
pub struct GuestState {
  pub regs: Registers,
  /// Where execution resumes once the current block exits.
  pub next_pc: u32,
  /// Guest PC of the block currently executing, if any.
  pub current: Option<u32>,
  /// Set by the segfault handler and by callbacks to request a halt; the
  /// embedder observes it after `execute` returns.
  pub stop: bool,
  pub exit_flags: ExitFlags,
  /// Cycles the last block committed on its exit path.
  pub exit_cycles: u32,
  /// Running total of committed cycles across block exits.
  pub cycle_count: u32,
  pub mem: MemoryMap,
  /// Coprocessor operation table, opaque to the core. Emitted coprocessor
  /// instructions call through it at run time.
  pub cop: Rc<RefCell<dyn CoprocOps>>,
  /// The load/store dispatcher. Emitted code reaches every guest memory
  /// access that is not compiled as a direct access through this pointer.
  pub rw: RwFn,
  /// The reference address-lookup routine (see [`crate::lookup::stub`]).
  /// A native backend replaces calls to this with its generated stub.
  pub lookup: LookupFn,
}

impl GuestState {
  pub(crate) fn new(mem: MemoryMap, cop: Rc<RefCell<dyn CoprocOps>>) -> GuestState {
    GuestState {
      regs: Registers::init(),
      next_pc: 0,
      current: None,
      stop: false,
      exit_flags: ExitFlags::NORMAL,
      exit_cycles: 0,
      cycle_count: 0,
      mem,
      cop,
      rw: crate::rw::dispatch,
      lookup: crate::lookup::stub,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn zero_register_stays_zero() {
    let mut regs = Registers::init();
    regs.set(0, 0xdead_beef);
    regs.set(1, 0xdead_beef);

    k9::assert_equal!(regs[0], 0);
    k9::assert_equal!(regs[1], 0xdead_beef);
  }

  #[test]
  fn exit_flags_combine() {
    let mut flags = ExitFlags::NORMAL;
    k9::assert_equal!(flags, ExitFlags::NORMAL);

    flags.insert(ExitFlags::SEGFAULT);
    flags.insert(ExitFlags::SYSCALL);

    assert!(flags.contains(ExitFlags::SEGFAULT));
    assert!(flags.contains(ExitFlags::SYSCALL));
    assert!(!flags.contains(ExitFlags::BREAK));
  }
}
