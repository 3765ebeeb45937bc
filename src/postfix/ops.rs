use crate::runtime::{
    data_type::DataType,
    error::EvalError,
    value::{TypedValue, Value},
};

pub fn binary_op(op: &str, lhs: &TypedValue, rhs: &TypedValue) -> Result<TypedValue, EvalError> {
    match op {
        "==" => return Ok(TypedValue::boolean(lhs == rhs)),
        "!=" => return Ok(TypedValue::boolean(lhs != rhs)),
        _ => {}
    }

    if op == "+" {
        if let (Value::String(l), Value::String(r)) = (&lhs.value, &rhs.value) {
            return Ok(TypedValue::string(&format!("{}{}", l, r)));
        }
    }

    let l = number_operand(op, lhs)?;
    let r = number_operand(op, rhs)?;
    let result = match op {
        "+" => TypedValue::number(l + r),
        "-" => TypedValue::number(l - r),
        "*" => TypedValue::number(l * r),
        "/" => TypedValue::number(l / nonzero(op, r)?),
        "%" => TypedValue::number(l % nonzero(op, r)?),
        "<" => TypedValue::boolean(l < r),
        ">" => TypedValue::boolean(l > r),
        "<=" => TypedValue::boolean(l <= r),
        ">=" => TypedValue::boolean(l >= r),
        _ => return Err(EvalError::Evaluator(format!("unknown binary operator {}", op))),
    };
    Ok(result)
}

pub fn unary_op(op: &str, operand: &TypedValue) -> Result<TypedValue, EvalError> {
    match op {
        "neg" => Ok(TypedValue::number(-number_operand(op, operand)?)),
        "not" => match operand.as_boolean() {
            Some(b) => Ok(TypedValue::boolean(!b)),
            None => Err(EvalError::type_mismatch(
                "Operand of not",
                DataType::Boolean,
                operand.data_type,
            )),
        },
        _ => Err(EvalError::Evaluator(format!("unknown unary operator {}", op))),
    }
}

fn number_operand(op: &str, value: &TypedValue) -> Result<f64, EvalError> {
    value.as_number().ok_or_else(|| {
        EvalError::type_mismatch(
            &format!("Operand of {}", op),
            DataType::Number,
            value.data_type,
        )
    })
}

fn nonzero(op: &str, divisor: f64) -> Result<f64, EvalError> {
    if divisor == 0.0 {
        Err(EvalError::Evaluator(format!("division by zero in {}", op)))
    } else {
        Ok(divisor)
    }
}
