pub mod heap;
pub mod heap_node;
pub mod heap_object;
pub mod identifier;

pub use heap::{Heap, HeapStats};
pub use heap_node::HeapNode;
pub use heap_object::{HeapData, OpaqueBox};
pub use identifier::{ArrayId, ClosureId, Identifier, OpaqueId, PairId};
