use std::{any::Any, rc::Rc};

use im_rc::Vector;

use crate::runtime::{
    closure::{Closure, NativeClosure},
    data_type::DataType,
    error::{EvalError, assert_data_type},
    gc::{HeapData, Identifier, OpaqueBox},
    value::TypedValue,
};

use super::MachineState;

/// Converts a machine number into an array index.
pub(crate) fn checked_index(index: f64, length: usize) -> Result<usize, EvalError> {
    if index.fract() != 0.0 || index < 0.0 || index >= length as f64 {
        return Err(EvalError::IndexOutOfRange { index, length });
    }
    Ok(index as usize)
}

impl<F: Clone> MachineState<F> {
    /// Allocates `data` and ties it to everything it refers to.
    pub fn alloc(&mut self, data: HeapData<F>) -> Result<Identifier, EvalError> {
        self.verify_draft("alloc")?;
        let dependencies = data.references();
        let id = self.heap.alloc(data)?;
        for dependency in dependencies {
            self.heap.tie(id, Some(dependency))?;
        }
        Ok(id)
    }

    pub fn tie(&mut self, dependent: Identifier, dependee: Option<Identifier>) -> Result<(), EvalError> {
        self.verify_draft("tie")?;
        self.heap.tie(dependent, dependee)
    }

    pub fn untie(&mut self, dependent: Identifier, dependee: Option<Identifier>) -> Result<(), EvalError> {
        self.verify_draft("untie")?;
        self.heap.untie(dependent, dependee)
    }

    /// Re-syncs `id`'s dependency set after its payload changed from
    /// holding `old` to holding `new`.
    fn retie(
        &mut self,
        id: Identifier,
        old: Option<Identifier>,
        new: Option<Identifier>,
    ) -> Result<(), EvalError> {
        if let Some(old) = old {
            if !self.heap.get(id)?.references().contains(&old) {
                self.heap.untie(id, Some(old))?;
            }
        }
        self.heap.tie(id, new)
    }

    /// Fails with a `TypeMismatch` unless `value` is a reference of type `expected`.
    pub fn expect_reference(
        &self,
        context: &str,
        value: &TypedValue,
        expected: DataType,
    ) -> Result<Identifier, EvalError> {
        assert_data_type(context, value.data_type, expected)?;
        value
            .identifier()
            .ok_or_else(|| EvalError::type_mismatch(context, expected, value.data_type))
    }

    pub fn make_pair(&mut self, head: TypedValue, tail: TypedValue) -> Result<Identifier, EvalError> {
        self.alloc(HeapData::Pair { head, tail })
    }

    fn pair_parts(&self, id: Identifier) -> Result<(&TypedValue, &TypedValue), EvalError> {
        match self.heap.get(id)? {
            HeapData::Pair { head, tail } => Ok((head, tail)),
            other => Err(EvalError::type_mismatch(
                "Expected a pair",
                DataType::Pair,
                other.data_type(),
            )),
        }
    }

    pub fn pair_head(&self, id: Identifier) -> Result<TypedValue, EvalError> {
        Ok(self.pair_parts(id)?.0.clone())
    }

    pub fn pair_tail(&self, id: Identifier) -> Result<TypedValue, EvalError> {
        Ok(self.pair_parts(id)?.1.clone())
    }

    pub fn pair_set(&mut self, id: Identifier, head: bool, value: TypedValue) -> Result<(), EvalError> {
        self.verify_draft("pair_set")?;
        let new_ref = value.identifier();
        let old = match self.heap.get_mut(id)? {
            HeapData::Pair {
                head: slot_head,
                tail: slot_tail,
            } => {
                let slot = if head { slot_head } else { slot_tail };
                std::mem::replace(slot, value)
            }
            other => {
                return Err(EvalError::type_mismatch(
                    "Expected a pair",
                    DataType::Pair,
                    other.data_type(),
                ));
            }
        };
        self.retie(id, old.identifier(), new_ref)
    }

    /// Allocates an array after checking every element against `element_type`.
    pub fn make_array(
        &mut self,
        element_type: Option<DataType>,
        elements: Vector<TypedValue>,
    ) -> Result<Identifier, EvalError> {
        if let Some(expected) = element_type {
            for element in elements.iter() {
                assert_data_type("Array element type mismatch", element.data_type, expected)?;
            }
        }
        self.alloc(HeapData::Array {
            element_type,
            elements,
        })
    }

    fn array_parts(&self, id: Identifier) -> Result<(Option<DataType>, &Vector<TypedValue>), EvalError> {
        match self.heap.get(id)? {
            HeapData::Array {
                element_type,
                elements,
            } => Ok((*element_type, elements)),
            other => Err(EvalError::type_mismatch(
                "Expected an array",
                DataType::Array,
                other.data_type(),
            )),
        }
    }

    pub fn array_length(&self, id: Identifier) -> Result<usize, EvalError> {
        Ok(self.array_parts(id)?.1.len())
    }

    pub fn array_element_type(&self, id: Identifier) -> Result<Option<DataType>, EvalError> {
        Ok(self.array_parts(id)?.0)
    }

    pub fn array_get(&self, id: Identifier, index: f64) -> Result<TypedValue, EvalError> {
        let (_, elements) = self.array_parts(id)?;
        let index = checked_index(index, elements.len())?;
        Ok(elements[index].clone())
    }

    pub fn array_set(&mut self, id: Identifier, index: f64, value: TypedValue) -> Result<(), EvalError> {
        self.verify_draft("array_set")?;
        let (element_type, elements) = self.array_parts(id)?;
        let index = checked_index(index, elements.len())?;
        if let Some(expected) = element_type {
            assert_data_type("Array element type mismatch", value.data_type, expected)?;
        }

        let new_ref = value.identifier();
        let old = match self.heap.get_mut(id)? {
            HeapData::Array { elements, .. } => elements.set(index, value),
            _ => return Err(EvalError::internal(format!("{} stopped being an array", id))),
        };
        self.retie(id, old.identifier(), new_ref)
    }

    /// Allocates an interpreted closure; ties it to its parent frame and
    /// to every identifier its body refers to.
    pub fn make_closure(&mut self, closure: Closure<F>) -> Result<Identifier, EvalError> {
        self.expect_frame(closure.parent_frame)?;
        self.alloc(HeapData::Closure(closure))
    }

    pub fn make_native_closure(&mut self, native: NativeClosure<F>) -> Result<Identifier, EvalError> {
        self.expect_frame(native.parent_frame)?;
        self.alloc(HeapData::NativeClosure(native))
    }

    pub fn closure_arity(&self, id: Identifier) -> Result<usize, EvalError> {
        match self.heap.get(id)? {
            HeapData::Closure(closure) => Ok(closure.arity),
            HeapData::NativeClosure(native) => Ok(native.signature.arity),
            other => Err(EvalError::type_mismatch(
                "Expected a closure",
                DataType::Closure,
                other.data_type(),
            )),
        }
    }

    pub fn make_opaque(&mut self, value: Rc<dyn Any>, immutable: bool) -> Result<Identifier, EvalError> {
        self.alloc(HeapData::Opaque(OpaqueBox { value, immutable }))
    }

    pub fn opaque_get(&self, id: Identifier) -> Result<Rc<dyn Any>, EvalError> {
        match self.heap.get(id)? {
            HeapData::Opaque(opaque) => Ok(opaque.value.clone()),
            other => Err(EvalError::type_mismatch(
                "Expected an opaque value",
                DataType::Opaque,
                other.data_type(),
            )),
        }
    }

    pub fn opaque_set(&mut self, id: Identifier, value: Rc<dyn Any>) -> Result<(), EvalError> {
        self.verify_draft("opaque_set")?;
        match self.heap.get_mut(id)? {
            HeapData::Opaque(opaque) if opaque.immutable => Err(EvalError::Evaluator(format!(
                "Cannot modify immutable opaque value {}",
                id
            ))),
            HeapData::Opaque(opaque) => {
                opaque.value = value;
                Ok(())
            }
            other => Err(EvalError::type_mismatch(
                "Expected an opaque value",
                DataType::Opaque,
                other.data_type(),
            )),
        }
    }
}
