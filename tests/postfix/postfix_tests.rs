use cse::{
    postfix::{Node, PostfixLanguage, block_depth, split_chunks},
    runtime::{
        error::EvalError,
        language::Language,
        value::TypedValue,
        vm::{CseEvaluator, EvaluatorConfig},
    },
};

fn run_program(source: &str) -> Vec<Result<Option<TypedValue>, EvalError>> {
    let mut ev = CseEvaluator::with_config(
        PostfixLanguage::new(),
        EvaluatorConfig {
            step_limit: 1_000_000,
            ..EvaluatorConfig::default()
        },
    );
    split_chunks(source)
        .iter()
        .map(|chunk| {
            ev.evaluate_chunk(chunk)
                .result()
                .expect("chunk did not finish")
        })
        .collect()
}

fn last_value(source: &str) -> TypedValue {
    run_program(source)
        .pop()
        .expect("no chunks")
        .unwrap()
        .expect("no value")
}

#[test]
fn split_chunks_keeps_blocks_together() {
    let source = "\
1 ->x

fn(a,b)
  a b +   # sum
end ->add
x 0 < if
  \"neg\"
else
  \"pos\"
end
";
    let chunks = split_chunks(source);
    assert_eq!(chunks.len(), 3);
    assert_eq!(chunks[0], "1 ->x");
    assert!(chunks[1].starts_with("fn(a,b)") && chunks[1].ends_with("end ->add"));
    assert_eq!(block_depth(&chunks[2]), 0);
}

#[test]
fn block_depth_ignores_comments() {
    assert_eq!(block_depth("x if # end"), 1);
    assert_eq!(block_depth("fn(n) n end"), 0);
    assert_eq!(block_depth("end"), -1);
}

#[test]
fn process_chunk_spans_the_tokens() {
    let language = PostfixLanguage::new();
    let fragment = language.process_chunk("  1 2 +\n  \"ab\"").unwrap();
    assert_eq!(fragment.start.to_string(), "1:2");
    assert_eq!(fragment.end.to_string(), "2:6");
    assert_eq!(fragment.fragment.0.len(), 4);
    assert!(matches!(fragment.fragment.0[2], Node::BinaryOp(_)));
}

#[test]
fn fibonacci() {
    let program = "\
fn(n)
  n 2 < if n else
    n 1 - fib call/1 n 2 - fib call/1 +
  end
end =>fib
15 fib call/1
";
    assert_eq!(last_value(program), TypedValue::number(610.0));
}

#[test]
fn counters_share_their_captured_frame() {
    let program = "\
fn()
  0 ->count
  fn() count 1 + =count count end
end ->make_counter
make_counter call/0 ->tick
tick call/0 pop
tick call/0 pop
tick call/0
";
    assert_eq!(last_value(program), TypedValue::number(3.0));
}

#[test]
fn string_building() {
    let program = "\
\"a\" ->s
s \"b\" + \"c\" + =s
s
";
    assert_eq!(last_value(program), TypedValue::string("abc"));
}

#[test]
fn arrays_of_arrays() {
    let program = "\
1 2 array/2 3 4 array/2 array/2 ->grid
grid 1 @ 0 @
";
    assert_eq!(last_value(program), TypedValue::number(3.0));
}

#[test]
fn list_sum_through_the_prelude() {
    let program = "\
1 2 3 4 array/4 array_to_list call/1 ->xs
fn(x,acc) x acc + end 0 xs accumulate call/3
";
    assert_eq!(last_value(program), TypedValue::number(10.0));
}

#[test]
fn errors_are_per_chunk() {
    let results = run_program("1 ->x\nx 0 /\nx neg");
    assert!(results[0].is_ok());
    assert_eq!(
        results[1],
        Err(EvalError::Evaluator("division by zero in /".into()))
    );
    assert_eq!(results[2], Ok(Some(TypedValue::number(-1.0))));
}

#[test]
fn lexer_errors_carry_a_position() {
    let err = PostfixLanguage::new().parse("1\n  \"open").unwrap_err();
    assert_eq!(
        err,
        EvalError::Evaluator("2:2: unterminated string \"open".into())
    );
}
