use im_rc::{OrdMap, OrdSet, Vector};

use crate::runtime::{gc::Identifier, value::TypedValue};

/// One scope record in the environment chain.
///
/// Frames live on the heap like every other reference object; a frame node
/// depends on its parent and on every reference-typed value bound in it.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub label: String,
    /// Absent only for the Global frame.
    pub parent: Option<Identifier>,
    /// Names declared when the frame was created, in declaration order.
    pub names: Vector<String>,
    pub bindings: OrdMap<String, TypedValue>,
    pub constant: OrdMap<String, bool>,
}

impl Frame {
    pub fn new(label: impl Into<String>, parent: Option<Identifier>) -> Self {
        Self {
            label: label.into(),
            parent,
            names: Vector::new(),
            bindings: OrdMap::new(),
            constant: OrdMap::new(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&TypedValue> {
        self.bindings.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    pub fn is_constant(&self, name: &str) -> bool {
        self.constant.get(name).copied().unwrap_or(false)
    }

    /// Every identifier this frame keeps alive: its parent plus its
    /// reference-typed bindings.
    pub fn references(&self) -> OrdSet<Identifier> {
        let mut refs: OrdSet<Identifier> = self
            .bindings
            .values()
            .filter_map(TypedValue::identifier)
            .collect();
        if let Some(parent) = self.parent {
            refs.insert(parent);
        }
        refs
    }
}
