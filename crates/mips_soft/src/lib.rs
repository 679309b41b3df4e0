//! Reference collaborators for the recompiler core.
//!
//! The backend here emits no machine code. "Emission" builds a list of
//! micro operations and "entering" a block interprets them against the
//! guest state, which makes the whole compile/cache/execute pipeline
//! runnable anywhere and gives native backends a contract to imitate:
//! everything observable about a block (register effects, load/store
//! dispatch, exit flags, committed cycles) behaves exactly as their
//! generated code must.

pub use alloc::SoftAllocator;
pub use backend::{MicroBuffer, MicroCode, MicroOp, SoftBackend, SoftLookup, SoftWrapper};
pub use cop::NoopCop;
pub use disasm::WordDisassembler;
pub use emitter::MicroEmitter;

pub mod alloc;
pub mod backend;
pub mod cop;
pub mod disasm;
pub mod emitter;
