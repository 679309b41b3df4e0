pub use backend::{
  BlockEmitter, CodeBackend, CoprocOps, Disassembler, EmitCtx, EmitStatus, OpcodeEmitter,
  RegAllocator,
};
pub use block::Block;
pub use cache::{BlockCache, CacheError};
pub use lookup::{DirectHit, LookupFn};
pub use recompile::CompileError;
pub use rw::RwFn;
pub use state::{ExitFlags, GuestState, Registers};

use mips_mem::{kunseg, MapRegion, MemoryMap};
use std::cell::RefCell;
use std::rc::Rc;

#[derive(Debug)]
pub enum InitError {
  /// The backend failed to generate the wrapper or the lookup stub.
  Backend,
  /// A map region base is not word aligned.
  UnalignedRegion(u32),
}

/// The recompiler: one guest, one backend, one block cache.
///
/// The embedder drives it by calling [`Dynarec::execute`] in a loop with
/// the PC the previous call returned, watching `state().stop` and the
/// exit flags in between. There is no pacing and no interpretation
/// fallback; a PC that cannot be compiled comes straight back unchanged.
pub struct Dynarec<B: CodeBackend> {
  state: Box<GuestState>,
  cache: BlockCache<B>,
  backend: B,
  wrapper: B::Wrapper,
  lookup: B::Lookup,
  emitter: Box<dyn OpcodeEmitter<B>>,
  disasm: Box<dyn Disassembler>,
  alloc: Box<dyn RegAllocator>,
}

impl<B: CodeBackend> Dynarec<B> {
  /// Stand up a recompiler. The backend generates the wrapper trampoline
  /// and the address-lookup stub here, once; the memory map is fixed from
  /// this point on.
  pub fn init(
    mut backend: B,
    regions: Vec<MapRegion>,
    cop: Rc<RefCell<dyn CoprocOps>>,
    emitter: Box<dyn OpcodeEmitter<B>>,
    disasm: Box<dyn Disassembler>,
    alloc: Box<dyn RegAllocator>,
  ) -> Result<Dynarec<B>, InitError> {
    if let Some(region) = regions.iter().find(|r| r.base % 4 != 0) {
      return Err(InitError::UnalignedRegion(region.base));
    }

    let wrapper = backend.generate_wrapper().ok_or(InitError::Backend)?;
    let lookup = backend
      .generate_address_lookup(regions.len())
      .ok_or(InitError::Backend)?;

    Ok(Dynarec {
      state: Box::new(GuestState::new(MemoryMap::new(regions), cop)),
      cache: BlockCache::new(),
      backend,
      wrapper,
      lookup,
      emitter,
      disasm,
      alloc,
    })
  }

  /// Run the block at `pc`, compiling and registering it first if the
  /// cache misses, and return the PC execution stopped at. Compilation
  /// failures are logged and reported by returning `pc` unchanged.
  pub fn execute(&mut self, pc: u32) -> u32 {
    if self.cache.find(pc).is_none() {
      let block = match self.recompile(pc) {
        Ok(block) => block,
        Err(err) => {
          log::error!("cannot recompile block at {pc:#010x}: {err:?}");
          return pc;
        }
      };

      if let Err(err) = self.cache.register(block) {
        log::error!("cannot register block at {pc:#010x}: {err:?}");
        return pc;
      }
    }

    let Some(block) = self.cache.find(pc) else {
      return pc;
    };

    self.state.exit_flags = ExitFlags::NORMAL;
    self.state.exit_cycles = 0;
    self.state.current = Some(pc);

    self.backend.enter(&self.wrapper, block.code(), &mut self.state);

    self.state.current = None;
    self.state.cycle_count = self.state.cycle_count.wrapping_add(self.state.exit_cycles);
    self.state.next_pc
  }

  /// Compile the block at `pc` without touching the cache.
  pub fn recompile(&mut self, pc: u32) -> Result<Block<B>, CompileError> {
    recompile::recompile(
      &mut self.backend,
      self.emitter.as_mut(),
      self.disasm.as_mut(),
      self.alloc.as_mut(),
      &self.state.mem,
      pc,
    )
  }

  /// The embedder's notice that guest memory changed: drop every cached
  /// block whose code intersects `[addr, addr + len)`, mirrors included.
  pub fn invalidate(&mut self, addr: u32, len: u32) {
    let kstart = u64::from(kunseg(addr));
    let dropped = self.cache.drop_covering(kstart, kstart + u64::from(len));

    if dropped > 0 {
      log::debug!("invalidated {dropped} block(s) over {addr:#010x}+{len:#x}");
    }
  }

  pub fn state(&self) -> &GuestState {
    &self.state
  }

  pub fn state_mut(&mut self) -> &mut GuestState {
    &mut self.state
  }

  pub fn cache(&self) -> &BlockCache<B> {
    &self.cache
  }

  pub fn cache_mut(&mut self) -> &mut BlockCache<B> {
    &mut self.cache
  }
}

pub mod backend;
pub mod block;
pub mod cache;
pub mod lookup;
pub mod recompile;
pub mod rw;
pub mod state;

#[cfg(test)]
pub(crate) mod testutil;
