use im_rc::OrdSet;

use crate::runtime::{data_type::DataType, gc::Identifier, gc::heap_object::HeapData};

/// One slot of the machine heap.
///
/// A slot with no payload is free and tagged `Unassigned`.
#[derive(Debug, Clone)]
pub struct HeapNode<F> {
    pub data_type: DataType,
    pub data: Option<HeapData<F>>,
    pub dependencies: OrdSet<Identifier>,
    pub ref_count: usize,
}

impl<F: Clone> HeapNode<F> {
    pub(crate) fn new(data: HeapData<F>) -> Self {
        Self {
            data_type: data.data_type(),
            data: Some(data),
            dependencies: OrdSet::new(),
            ref_count: 0,
        }
    }

    pub(crate) fn free() -> Self {
        Self {
            data_type: DataType::Unassigned,
            data: None,
            dependencies: OrdSet::new(),
            ref_count: 0,
        }
    }

    pub fn is_assigned(&self) -> bool {
        self.data.is_some()
    }
}
