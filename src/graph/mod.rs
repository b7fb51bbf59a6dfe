//! Graph node creation and linking (spec §3, §4.5, §6).
//!
//! The graph database itself is out of scope (spec §1); this module
//! defines the abstract contract ([`GraphEngine`]) a real backend would
//! implement, a reference [`memory::InMemoryGraphEngine`] used by the test
//! suite, and [`linker::GraphLinker`], which drives the contract according
//! to the forward/reverse routing rule.
mod engine;
mod linker;
mod memory;

pub use engine::{EdgeKind, GraphEngine, PropertyValue};
pub use linker::{resolve_current_file, resolve_targets, GraphLinker, LinkOutcome, LinkTargets};
pub use memory::InMemoryGraphEngine;
