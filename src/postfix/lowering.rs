use std::rc::Rc;

use crate::runtime::{instruction::Instruction, value::TypedValue};

use super::{Program, parser::Node};

type Instr = Instruction<Program>;

/// Lowers `nodes` into instructions in Control order.
pub fn lower(nodes: &[Node]) -> Vec<Instr> {
    let mut out = Vec::with_capacity(nodes.len());
    for node in nodes {
        lower_node(node, &mut out);
    }
    out.reverse();
    out
}

fn lower_block(nodes: &[Node]) -> Rc<[Instr]> {
    Rc::from(lower(nodes))
}

/// Appends `node`'s instructions in execution order.
fn lower_node(node: &Node, out: &mut Vec<Instr>) {
    let instruction = match node {
        Node::Literal(value) => Instruction::Push(value.clone()),
        Node::Name(name) => Instruction::Lookup(name.clone()),
        Node::Assign(name) => Instruction::Assign {
            symbol: name.clone(),
            constant: false,
        },
        Node::Define { name, constant } => Instruction::Define {
            symbol: name.clone(),
            constant: *constant,
        },
        Node::BinaryOp(op) => Instruction::BinaryOp(op.clone()),
        Node::UnaryOp(op) => Instruction::UnaryOp(op.clone()),
        Node::Pop => Instruction::Pop,
        Node::Array(length) => Instruction::ArrayLiteral {
            length: *length,
            element_type: None,
        },
        Node::Index => Instruction::ArrayIndex,
        Node::IndexAssign => Instruction::ArrayAssign,
        Node::Length => Instruction::ArrayLength,
        Node::Call(arity) => Instruction::Apply(*arity),
        Node::If {
            consequent,
            alternate,
        } => Instruction::Branch {
            consequent: lower_block(consequent),
            alternate: alternate.as_deref().map(lower_block),
        },
        Node::Function { params, body } => {
            // A call must leave a result for RESTORE to carry back.
            let body = if body.is_empty() {
                Rc::from(vec![Instruction::Push(TypedValue::unassigned())])
            } else {
                lower_block(body)
            };
            Instruction::MakeClosure {
                arity: params.len(),
                param_names: Rc::from(params.as_slice()),
                param_types: None,
                name: None,
                body,
            }
        }
    };
    out.push(instruction);
}
