use std::{any::Any, fmt, rc::Rc};

use im_rc::{OrdSet, Vector};

use crate::runtime::{
    closure::{Closure, NativeClosure},
    data_type::DataType,
    frame::Frame,
    gc::Identifier,
    value::TypedValue,
};

/// A host value boxed for the machine.
#[derive(Clone)]
pub struct OpaqueBox {
    pub value: Rc<dyn Any>,
    pub immutable: bool,
}

impl fmt::Debug for OpaqueBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpaqueBox")
            .field("immutable", &self.immutable)
            .finish_non_exhaustive()
    }
}

/// Payloads that live on the machine heap.
#[derive(Debug, Clone)]
pub enum HeapData<F> {
    Pair {
        head: TypedValue,
        tail: TypedValue,
    },
    Array {
        element_type: Option<DataType>,
        elements: Vector<TypedValue>,
    },
    Closure(Closure<F>),
    NativeClosure(NativeClosure<F>),
    Opaque(OpaqueBox),
    Frame(Frame),
}

impl<F: Clone> HeapData<F> {
    pub fn data_type(&self) -> DataType {
        match self {
            HeapData::Pair { .. } => DataType::Pair,
            HeapData::Array { .. } => DataType::Array,
            HeapData::Closure(_) | HeapData::NativeClosure(_) => DataType::Closure,
            HeapData::Opaque(_) => DataType::Opaque,
            HeapData::Frame(_) => DataType::Frame,
        }
    }

    /// Identifiers the payload currently refers to.
    ///
    /// A node's dependency set is kept equal to this set by every mutation
    /// path; the audit in [`super::Heap::verify_dependencies`] relies on it.
    pub fn references(&self) -> OrdSet<Identifier> {
        match self {
            HeapData::Pair { head, tail } => head
                .identifier()
                .into_iter()
                .chain(tail.identifier())
                .collect(),
            HeapData::Array { elements, .. } => {
                elements.iter().filter_map(TypedValue::identifier).collect()
            }
            HeapData::Closure(closure) => closure.references(),
            HeapData::NativeClosure(native) => OrdSet::unit(native.parent_frame),
            HeapData::Opaque(_) => OrdSet::new(),
            HeapData::Frame(frame) => frame.references(),
        }
    }

    /// Short human-readable description used by snapshots and traces.
    pub fn summary(&self) -> String {
        match self {
            HeapData::Pair { head, tail } => format!("pair({}, {})", head, tail),
            HeapData::Array {
                element_type,
                elements,
            } => {
                let items: Vec<String> = elements.iter().map(|e| e.to_string()).collect();
                match element_type {
                    Some(t) => format!("array<{}>[{}]", t, items.join(", ")),
                    None => format!("array[{}]", items.join(", ")),
                }
            }
            HeapData::Closure(closure) => format!(
                "closure {}/{}",
                closure.name.as_deref().unwrap_or("lambda"),
                closure.arity
            ),
            HeapData::NativeClosure(native) => format!(
                "native {}/{}",
                native.signature.name.as_deref().unwrap_or("anonymous"),
                native.signature.arity
            ),
            HeapData::Opaque(opaque) => {
                if opaque.immutable {
                    "opaque (immutable)".to_string()
                } else {
                    "opaque".to_string()
                }
            }
            HeapData::Frame(frame) => format!("frame {}", frame.label),
        }
    }
}
