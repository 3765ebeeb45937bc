use std::{fmt, rc::Rc};

use im_rc::{OrdSet, Vector};

use crate::runtime::{
    data_type::DataType, gc::Identifier, language::Fragment, value::TypedValue,
};

/// A saved continuation: what RESTORE puts back.
///
/// The references held by the captured Control, Stash and frame pointer
/// move into the continuation and are recorded once, at capture, in
/// `refs`. Nested continuations contribute their own stored multiset, so
/// nothing here walks the chain of callers.
#[derive(Clone)]
pub struct Continuation<F> {
    control: Vec<Instruction<F>>,
    stash: Vec<TypedValue>,
    frame: Identifier,
    /// Values carried from the callee's stash onto the restored stash.
    save_count: usize,
    refs: Vector<Identifier>,
}

impl<F: Clone> Continuation<F> {
    /// `control` is bottom first, like Control itself.
    pub fn new(
        control: Vec<Instruction<F>>,
        stash: Vec<TypedValue>,
        frame: Identifier,
        save_count: usize,
    ) -> Self {
        let mut refs = Vector::new();
        for instruction in &control {
            refs.append(instruction.refs());
        }
        refs.extend(stash.iter().filter_map(TypedValue::identifier));
        refs.push_back(frame);
        Self {
            control,
            stash,
            frame,
            save_count,
            refs,
        }
    }

    pub fn frame(&self) -> Identifier {
        self.frame
    }

    pub fn save_count(&self) -> usize {
        self.save_count
    }

    /// Every reference this continuation holds, with multiplicity.
    pub fn refs(&self) -> &Vector<Identifier> {
        &self.refs
    }

    /// Splits into Control, Stash and frame, leaving the stored refs behind.
    pub fn into_parts(mut self) -> (Vec<Instruction<F>>, Vec<TypedValue>, Identifier) {
        (
            std::mem::take(&mut self.control),
            std::mem::take(&mut self.stash),
            self.frame,
        )
    }
}

// Unwinds a chain of nested continuations with a worklist. The default drop
// would recurse once per pending call.
impl<F> Drop for Continuation<F> {
    fn drop(&mut self) {
        let mut pending = detach_restores(&mut self.control);
        while let Some(continuation) = pending.pop() {
            if let Ok(mut continuation) = Rc::try_unwrap(continuation) {
                pending.extend(detach_restores(&mut continuation.control));
            }
        }
    }
}

fn detach_restores<F>(control: &mut Vec<Instruction<F>>) -> Vec<Rc<Continuation<F>>> {
    std::mem::take(control)
        .into_iter()
        .filter_map(|instruction| match instruction {
            Instruction::Restore(continuation) => Some(continuation),
            _ => None,
        })
        .collect()
}

impl<F> fmt::Debug for Continuation<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Continuation")
            .field("control_len", &self.control.len())
            .field("stash_len", &self.stash.len())
            .field("frame", &self.frame)
            .field("save_count", &self.save_count)
            .finish()
    }
}

/// Machine instructions.
///
/// Instruction sequences (branch arms, closure bodies) are stored in Control
/// order: the last element is pushed last and runs first.
#[derive(Debug, Clone)]
pub enum Instruction<F> {
    Fragment(Rc<Fragment<F>>),
    BinaryOp(Rc<str>),
    UnaryOp(Rc<str>),
    Apply(usize),
    ArrayLiteral {
        length: usize,
        element_type: Option<DataType>,
    },
    ArrayIndex,
    ArrayAssign,
    ArrayLength,
    /// Writes an existing binding. With `constant` set the binding becomes
    /// read-only afterwards.
    Assign {
        symbol: Rc<str>,
        constant: bool,
    },
    Branch {
        consequent: Rc<[Instruction<F>]>,
        alternate: Option<Rc<[Instruction<F>]>>,
    },
    Lookup(Rc<str>),
    Pop,
    Push(TypedValue),
    Restore(Rc<Continuation<F>>),
    /// Creates or replaces a binding in the current frame.
    Define {
        symbol: Rc<str>,
        constant: bool,
    },
    MakeClosure {
        arity: usize,
        param_names: Rc<[String]>,
        param_types: Option<Rc<[DataType]>>,
        name: Option<Rc<str>>,
        body: Rc<[Instruction<F>]>,
    },
}

impl<F: Clone> Instruction<F> {
    /// Heap identifiers this instruction keeps alive while it sits on
    /// Control, one entry per counted reference.
    pub fn refs(&self) -> Vector<Identifier> {
        match self {
            Instruction::Restore(continuation) => continuation.refs().clone(),
            other => other.code_refs().into_iter().collect(),
        }
    }

    /// Identifiers embedded in the instruction's code, without repeats.
    fn code_refs(&self) -> OrdSet<Identifier> {
        match self {
            Instruction::Push(value) => value.identifier().into_iter().collect(),
            Instruction::Branch {
                consequent,
                alternate,
            } => {
                let refs = block_refs(consequent);
                match alternate {
                    Some(alternate) => refs.union(block_refs(alternate)),
                    None => refs,
                }
            }
            Instruction::Restore(continuation) => continuation.refs().iter().copied().collect(),
            Instruction::MakeClosure { body, .. } => block_refs(body),
            Instruction::Fragment(_)
            | Instruction::BinaryOp(_)
            | Instruction::UnaryOp(_)
            | Instruction::Apply(_)
            | Instruction::ArrayLiteral { .. }
            | Instruction::ArrayIndex
            | Instruction::ArrayAssign
            | Instruction::ArrayLength
            | Instruction::Assign { .. }
            | Instruction::Lookup(_)
            | Instruction::Pop
            | Instruction::Define { .. } => OrdSet::new(),
        }
    }
}

/// Union of the identifiers embedded in every instruction of `block`.
pub fn block_refs<F: Clone>(block: &[Instruction<F>]) -> OrdSet<Identifier> {
    block
        .iter()
        .fold(OrdSet::new(), |acc, instr| acc.union(instr.code_refs()))
}

impl<F> fmt::Display for Instruction<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::Fragment(fragment) => {
                write!(f, "FRAGMENT {}-{}", fragment.start, fragment.end)
            }
            Instruction::BinaryOp(op) => write!(f, "BINARY_OP {}", op),
            Instruction::UnaryOp(op) => write!(f, "UNARY_OP {}", op),
            Instruction::Apply(arity) => write!(f, "APPLY {}", arity),
            Instruction::ArrayLiteral {
                length,
                element_type,
            } => match element_type {
                Some(t) => write!(f, "ARRAY_LITERAL {} {}", length, t),
                None => write!(f, "ARRAY_LITERAL {}", length),
            },
            Instruction::ArrayIndex => write!(f, "ARRAY_INDEX"),
            Instruction::ArrayAssign => write!(f, "ARRAY_ASSIGN"),
            Instruction::ArrayLength => write!(f, "ARRAY_LENGTH"),
            Instruction::Assign { symbol, constant } => {
                if *constant {
                    write!(f, "ASSIGN const {}", symbol)
                } else {
                    write!(f, "ASSIGN {}", symbol)
                }
            }
            Instruction::Branch {
                consequent,
                alternate,
            } => write!(
                f,
                "BRANCH {}/{}",
                consequent.len(),
                alternate.as_ref().map_or(0, |a| a.len())
            ),
            Instruction::Lookup(symbol) => write!(f, "LOOKUP {}", symbol),
            Instruction::Pop => write!(f, "POP"),
            Instruction::Push(value) => write!(f, "PUSH {}", value),
            Instruction::Restore(continuation) => write!(
                f,
                "RESTORE {} frame={}",
                continuation.save_count, continuation.frame
            ),
            Instruction::Define { symbol, constant } => {
                if *constant {
                    write!(f, "DEFINE const {}", symbol)
                } else {
                    write!(f, "DEFINE {}", symbol)
                }
            }
            Instruction::MakeClosure {
                arity, name, body, ..
            } => write!(
                f,
                "MAKE_CLOSURE {}/{} ({} instructions)",
                name.as_deref().unwrap_or("lambda"),
                arity,
                body.len()
            ),
        }
    }
}
