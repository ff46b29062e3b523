//! The Keel runtime: sandboxed linear memory, compartments and their
//! object model, the linker, and the execution engine.
//!
//! The load pipeline continues from `keel-module`:
//! `Module -> Engine::load -> LoadedModule -> link -> instantiate ->
//! invoke`. Everything observable by guest code traps with the structured
//! [`Trap`] value; load-time failures stay in their own error bands.

#![warn(missing_docs)]
#![deny(unused_must_use)]

pub mod concurrency;
pub mod intrinsics;
pub mod linker;
pub mod platform;
pub mod runtime;

mod engine;
mod error;
mod exec;
mod instantiate;

pub use engine::{
    Engine,
    LoadedModule,
};
pub use error::{
    FrameInfo,
    LinkError,
    LoadError,
    MissingImport,
    Trap,
    TrapCode,
    TrapKind,
};
pub use exec::{
    invoke,
    ExecCtx,
};
pub use instantiate::instantiate;
pub use linker::{
    link,
    ModuleResolver,
    NullResolver,
    ResolvedImports,
    Resolver,
    StubResolver,
};
pub use runtime::{
    try_collect,
    Compartment,
    Context,
    Function,
    Global,
    Instance,
    Memory,
    Object,
    Table,
    Tag,
};
