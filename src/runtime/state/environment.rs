use crate::runtime::{
    data_type::DataType,
    error::EvalError,
    frame::Frame,
    gc::{HeapData, Identifier},
    value::TypedValue,
};

use super::MachineState;

impl<F: Clone> MachineState<F> {
    pub(crate) fn expect_frame(&self, id: Identifier) -> Result<&Frame, EvalError> {
        match self.heap.get(id)? {
            HeapData::Frame(frame) => Ok(frame),
            other => Err(EvalError::internal(format!(
                "expected a frame at {}, found {}",
                id,
                other.data_type()
            ))),
        }
    }

    fn expect_frame_mut(&mut self, id: Identifier) -> Result<&mut Frame, EvalError> {
        match self.heap.get_mut(id)? {
            HeapData::Frame(frame) => Ok(frame),
            _ => Err(EvalError::internal(format!("expected a frame at {}", id))),
        }
    }

    /// Allocates a frame under `parent` (the current frame by default) and
    /// makes it current.
    ///
    /// Every name in `names` without an entry in `bindings` is bound to
    /// `Unassigned`.
    pub fn make_frame(
        &mut self,
        label: &str,
        names: &[String],
        bindings: Vec<(String, TypedValue)>,
        parent: Option<Identifier>,
    ) -> Result<Identifier, EvalError> {
        self.verify_draft("make_frame")?;
        let parent = parent.unwrap_or(self.current_frame);
        self.expect_frame(parent)?;

        let mut frame = Frame::new(label, Some(parent));
        for (name, value) in bindings {
            frame.bindings.insert(name, value);
        }
        for name in names {
            frame.names.push_back(name.clone());
            if !frame.contains(name) {
                frame.bindings.insert(name.clone(), TypedValue::unassigned());
            }
        }
        let dependencies = frame.references();

        let id = self.heap.alloc(HeapData::Frame(frame))?;
        for dependency in dependencies {
            self.heap.tie(id, Some(dependency))?;
        }
        self.set_current_frame(id)?;
        Ok(id)
    }

    /// Walks the parent chain from `start` (the current frame by default) and
    /// returns the first frame binding `name`.
    pub fn find_frame(
        &self,
        name: &str,
        start: Option<Identifier>,
    ) -> Result<Option<Identifier>, EvalError> {
        let mut cursor = Some(start.unwrap_or(self.current_frame));
        while let Some(id) = cursor {
            let frame = self.expect_frame(id)?;
            if frame.contains(name) {
                return Ok(Some(id));
            }
            cursor = frame.parent;
        }
        Ok(None)
    }

    pub fn lookup(&self, name: &str, start: Option<Identifier>) -> Result<TypedValue, EvalError> {
        let id = self
            .find_frame(name, start)?
            .ok_or_else(|| EvalError::NameNotFound(name.to_string()))?;
        self.expect_frame(id)?
            .get(name)
            .cloned()
            .ok_or_else(|| EvalError::NameNotFound(name.to_string()))
    }

    /// Writes the nearest binding of `name`.
    ///
    /// Fails with `ConstantAssignment` when that binding is constant. With
    /// `make_constant` the binding becomes constant after the write.
    pub fn modify(
        &mut self,
        name: &str,
        value: TypedValue,
        make_constant: bool,
        start: Option<Identifier>,
    ) -> Result<(), EvalError> {
        self.verify_draft("modify")?;
        let id = self
            .find_frame(name, start)?
            .ok_or_else(|| EvalError::NameNotFound(name.to_string()))?;
        if self.expect_frame(id)?.is_constant(name) {
            return Err(EvalError::ConstantAssignment(name.to_string()));
        }
        self.write_binding(id, name, value, make_constant)
    }

    /// Creates or replaces a binding in `frame` (the current frame by default).
    ///
    /// Replacing a constant binding fails with `ConstantAssignment`.
    pub fn define(
        &mut self,
        name: &str,
        value: TypedValue,
        constant: bool,
        frame: Option<Identifier>,
    ) -> Result<(), EvalError> {
        self.verify_draft("define")?;
        let id = frame.unwrap_or(self.current_frame);
        if self.expect_frame(id)?.is_constant(name) {
            return Err(EvalError::ConstantAssignment(name.to_string()));
        }
        self.write_binding(id, name, value, constant)
    }

    /// Stores `value` and retargets the frame's dependency edges.
    ///
    /// The old identifier is untied only when nothing else in the frame
    /// still refers to it.
    fn write_binding(
        &mut self,
        id: Identifier,
        name: &str,
        value: TypedValue,
        constant: bool,
    ) -> Result<(), EvalError> {
        let new_ref = value.identifier();
        let frame = self.expect_frame_mut(id)?;
        let old_ref = frame
            .bindings
            .insert(name.to_string(), value)
            .and_then(|old| old.identifier());
        if constant {
            frame.constant.insert(name.to_string(), true);
        }
        let still_held = match old_ref {
            Some(old) => frame.references().contains(&old),
            None => true,
        };

        if !still_held {
            self.heap.untie(id, old_ref)?;
        }
        self.heap.tie(id, new_ref)
    }

    /// All frames from `start` up to Global.
    pub fn frame_chain(&self, start: Option<Identifier>) -> Result<Vec<Identifier>, EvalError> {
        let mut chain = Vec::new();
        let mut cursor = Some(start.unwrap_or(self.current_frame));
        while let Some(id) = cursor {
            chain.push(id);
            cursor = self.expect_frame(id)?.parent;
        }
        Ok(chain)
    }

    pub fn is_frame(&self, id: Identifier) -> bool {
        matches!(self.heap.data_type(id), Ok(DataType::Frame))
    }
}
