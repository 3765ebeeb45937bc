//! The CSE machine: heap, environment, Control and Stash, and the stepper.
//!
//! # Reference-Count Invariant
//! Every live heap node's count equals the number of references to it from
//! the machine (Control instructions, Stash entries, the current-frame
//! pointer) plus the number of live nodes that depend on it.
//!
//! - Increments are applied immediately; decrements are queued and applied
//!   once per step, so a value popped and re-pushed within one step is never
//!   observed at zero.
//! - Heap data may form cycles (a frame binding a closure parented at that
//!   frame). Reference counting alone cannot reclaim those; mark-and-sweep
//!   over the machine's roots does.
//! - The Global and Program frames are permanent.
pub mod closure;
pub mod data_handler;
pub mod data_type;
pub mod error;
pub mod frame;
pub mod gc;
pub mod instruction;
pub mod language;
pub mod state;
pub mod stdlib;
pub mod value;
pub mod vm;
