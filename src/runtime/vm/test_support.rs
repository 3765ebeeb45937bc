use std::{collections::HashMap, rc::Rc};

use crate::runtime::{
    data_type::DataType,
    error::EvalError,
    instruction::Instruction,
    language::{Fragment, Language, SourceLocation},
    state::{MachineState, Transaction},
    value::TypedValue,
};

use super::StepContext;

/// A fragment that is already a list of instructions, in Control order.
#[derive(Debug, Clone)]
pub(crate) struct Script(pub Vec<Instruction<Script>>);

pub(crate) type Instr = Instruction<Script>;

/// Test language: chunks name scripts registered up front.
#[derive(Default)]
pub(crate) struct ScriptLanguage {
    scripts: HashMap<String, Vec<Instr>>,
}

impl ScriptLanguage {
    /// `program` is written in execution order.
    pub(crate) fn with_script(mut self, name: &str, program: Vec<Instr>) -> Self {
        self.scripts.insert(name.to_string(), control_order(program));
        self
    }
}

pub(crate) fn control_order(mut program: Vec<Instr>) -> Vec<Instr> {
    program.reverse();
    program
}

pub(crate) fn block(program: Vec<Instr>) -> Rc<[Instr]> {
    Rc::from(control_order(program))
}

pub(crate) fn push_num(n: f64) -> Instr {
    Instr::Push(TypedValue::number(n))
}

pub(crate) fn sym(name: &str) -> Rc<str> {
    Rc::from(name)
}

impl Language for ScriptLanguage {
    type Fragment = Script;

    fn process_chunk(&self, chunk: &str) -> Result<Fragment<Script>, EvalError> {
        let program = self
            .scripts
            .get(chunk)
            .ok_or_else(|| EvalError::Evaluator(format!("no script named {}", chunk)))?;
        Ok(Fragment::new(
            SourceLocation::new(1, 0),
            SourceLocation::new(1, chunk.len()),
            Script(program.clone()),
        ))
    }

    fn evaluate_fragment(
        &self,
        fragment: &Fragment<Script>,
        _state: &MachineState<Script>,
    ) -> Result<Vec<Instr>, EvalError> {
        Ok(fragment.fragment.0.clone())
    }

    fn binary_op(&self, op: &str, lhs: &TypedValue, rhs: &TypedValue) -> Result<TypedValue, EvalError> {
        if op == "==" {
            return Ok(TypedValue::boolean(lhs == rhs));
        }
        let (Some(l), Some(r)) = (lhs.as_number(), rhs.as_number()) else {
            return Err(EvalError::type_mismatch(
                "Arithmetic on non-numbers",
                DataType::Number,
                lhs.data_type,
            ));
        };
        match op {
            "+" => Ok(TypedValue::number(l + r)),
            "-" => Ok(TypedValue::number(l - r)),
            "*" => Ok(TypedValue::number(l * r)),
            "<" => Ok(TypedValue::boolean(l < r)),
            _ => Err(EvalError::Evaluator(format!("unknown operator {}", op))),
        }
    }

    fn unary_op(&self, op: &str, operand: &TypedValue) -> Result<TypedValue, EvalError> {
        match (op, operand.as_number(), operand.as_boolean()) {
            ("neg", Some(n), _) => Ok(TypedValue::number(-n)),
            ("not", _, Some(b)) => Ok(TypedValue::boolean(!b)),
            _ => Err(EvalError::Evaluator(format!("bad operand for {}", op))),
        }
    }
}

/// Runs programs to completion inside single transactions.
pub(crate) struct Machine {
    pub(crate) state: MachineState<Script>,
    language: ScriptLanguage,
}

impl Machine {
    pub(crate) fn new() -> Self {
        Self {
            state: MachineState::new(),
            language: ScriptLanguage::default(),
        }
    }

    /// Runs `program` (execution order) and commits. On error the committed
    /// state is left as it was.
    pub(crate) fn run(&mut self, program: Vec<Instr>) -> Result<(), EvalError> {
        self.with_context(|ctx| {
            for instruction in control_order(program) {
                ctx.state.control_push(instruction)?;
            }
            ctx.drain()
        })
    }

    pub(crate) fn with_context<R>(
        &mut self,
        f: impl FnOnce(&mut StepContext<'_, Script>) -> Result<R, EvalError>,
    ) -> Result<R, EvalError> {
        let mut tx = Transaction::begin(&self.state);
        let value = {
            let mut ctx = StepContext::new(tx.state(), &self.language, false);
            f(&mut ctx)?
        };
        tx.state().reconcile_step()?;
        self.state = tx.commit()?;
        Ok(value)
    }

    pub(crate) fn stash(&self) -> Vec<TypedValue> {
        self.state.stash().iter().cloned().collect()
    }
}
