use std::{fmt, rc::Rc};

use crate::runtime::{
    closure::Closure,
    data_type::DataType,
    error::{EvalError, assert_data_type},
    instruction::Instruction,
    language::Fragment,
    value::TypedValue,
};

use super::StepContext;

impl<F: Clone + fmt::Debug + 'static> StepContext<'_, F> {
    /// Executes one instruction that has already been popped from Control.
    pub(crate) fn execute(&mut self, instruction: Instruction<F>) -> Result<(), EvalError> {
        if self.trace {
            self.trace_instruction(&instruction);
        }

        match instruction {
            Instruction::Fragment(fragment) => self.lower_fragment(&fragment),
            Instruction::BinaryOp(op) => {
                let operands = self.state.stash_pop_n(2)?;
                let result = self.language.binary_op(&op, &operands[0], &operands[1])?;
                self.state.stash_push(result)
            }
            Instruction::UnaryOp(op) => {
                let operand = self.state.stash_pop()?;
                let result = self.language.unary_op(&op, &operand)?;
                self.state.stash_push(result)
            }
            Instruction::Apply(arity) => self.apply(arity),
            Instruction::ArrayLiteral {
                length,
                element_type,
            } => self.execute_array_literal(length, element_type),
            Instruction::ArrayIndex => self.execute_array_index(),
            Instruction::ArrayAssign => self.execute_array_assign(),
            Instruction::ArrayLength => self.execute_array_length(),
            Instruction::Assign { symbol, constant } => {
                let value = self.state.stash_pop()?;
                self.state.modify(&symbol, value, constant, None)
            }
            Instruction::Branch {
                consequent,
                alternate,
            } => {
                let predicate = self.state.stash_pop()?;
                assert_data_type(
                    "Cannot branch based on this value",
                    predicate.data_type,
                    DataType::Boolean,
                )?;
                if predicate.as_boolean() == Some(true) {
                    self.push_block(&consequent)
                } else if let Some(alternate) = alternate {
                    self.push_block(&alternate)
                } else {
                    Ok(())
                }
            }
            Instruction::Lookup(symbol) => {
                let value = self.state.lookup(&symbol, None)?;
                self.state.stash_push(value)
            }
            Instruction::Pop => {
                self.state.stash_pop()?;
                Ok(())
            }
            Instruction::Push(value) => self.state.stash_push(value),
            Instruction::Restore(continuation) => {
                let continuation =
                    Rc::try_unwrap(continuation).unwrap_or_else(|shared| (*shared).clone());
                self.restore(continuation)
            }
            Instruction::Define { symbol, constant } => {
                let value = self.state.stash_pop()?;
                self.state.define(&symbol, value, constant, None)
            }
            Instruction::MakeClosure {
                arity,
                param_names,
                param_types,
                name,
                body,
            } => {
                if param_names.len() != arity {
                    return Err(EvalError::internal(format!(
                        "closure of arity {} declares {} parameter name(s)",
                        arity,
                        param_names.len()
                    )));
                }
                let closure = Closure {
                    arity,
                    param_types,
                    param_names,
                    name: name.map(|n| n.to_string()),
                    parent_frame: self.state.current_frame(),
                    body,
                };
                let id = self.state.make_closure(closure)?;
                self.state
                    .stash_push(TypedValue::reference(DataType::Closure, id))
            }
        }
    }

    fn lower_fragment(&mut self, fragment: &Rc<Fragment<F>>) -> Result<(), EvalError> {
        let instructions = self.language.evaluate_fragment(fragment, &*self.state)?;
        for instruction in instructions {
            self.state.control_push(instruction)?;
        }
        Ok(())
    }

    /// Pushes a Control-ordered block so that its last element runs first.
    pub(crate) fn push_block(&mut self, block: &[Instruction<F>]) -> Result<(), EvalError> {
        for instruction in block {
            self.state.control_push(instruction.clone())?;
        }
        Ok(())
    }
}
