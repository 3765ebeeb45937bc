use cse::{
    postfix::PostfixLanguage,
    runtime::{
        data_handler::DataHandler,
        data_type::DataType,
        error::EvalError,
        gc::Identifier,
        stdlib::PRELUDE,
        value::TypedValue,
        vm::{CseEvaluator, EvaluatorConfig},
    },
};

fn evaluator() -> CseEvaluator<PostfixLanguage> {
    CseEvaluator::with_config(
        PostfixLanguage::new(),
        EvaluatorConfig {
            step_limit: 100_000,
            ..EvaluatorConfig::default()
        },
    )
}

fn eval(ev: &mut CseEvaluator<PostfixLanguage>, chunk: &str) -> Result<Option<TypedValue>, EvalError> {
    ev.evaluate_chunk(chunk).result().expect("chunk did not finish")
}

fn eval_value(ev: &mut CseEvaluator<PostfixLanguage>, chunk: &str) -> TypedValue {
    eval(ev, chunk).unwrap().expect("chunk produced no value")
}

const ONE_TWO_THREE: &str = "1 2 3 nil pair call/2 pair call/2 pair call/2 ->xs";

#[test]
fn prelude_is_bound_in_the_global_frame() {
    let ev = evaluator();
    for name in PRELUDE {
        let value = ev.state().lookup(name, Some(Identifier::GLOBAL)).unwrap();
        assert_eq!(value.data_type, DataType::Closure, "{} is not a closure", name);
    }
}

#[test]
fn pair_builds_lists_that_length_and_is_list_understand() {
    let mut ev = evaluator();
    eval(&mut ev, ONE_TWO_THREE).unwrap();
    assert_eq!(eval_value(&mut ev, "xs length call/1"), TypedValue::number(3.0));
    assert_eq!(eval_value(&mut ev, "xs is_list call/1"), TypedValue::boolean(true));
    assert_eq!(eval_value(&mut ev, "nil length call/1"), TypedValue::number(0.0));
    assert_eq!(eval_value(&mut ev, "1 2 pair call/2 is_list call/1"), TypedValue::boolean(false));
    assert_eq!(eval_value(&mut ev, "5 is_list call/1"), TypedValue::boolean(false));
}

#[test]
fn tail_walks_the_list() {
    let mut ev = evaluator();
    eval(&mut ev, ONE_TWO_THREE).unwrap();
    assert_eq!(
        eval_value(&mut ev, "xs tail call/1 tail call/1 length call/1"),
        TypedValue::number(1.0)
    );
    assert_eq!(
        eval_value(&mut ev, "xs tail call/1 tail call/1 tail call/1"),
        TypedValue::empty_list()
    );
    let err = eval(&mut ev, "nil tail call/1").unwrap_err();
    assert_eq!(
        err.to_string(),
        "Argument type mismatch (expected PAIR, got EMPTY_LIST)"
    );
}

#[test]
fn list_and_array_conversions() {
    let mut ev = evaluator();
    eval(&mut ev, ONE_TWO_THREE).unwrap();
    eval(&mut ev, "xs list_to_array call/1 ->arr").unwrap();
    assert_eq!(eval_value(&mut ev, "arr len"), TypedValue::number(3.0));
    assert_eq!(eval_value(&mut ev, "arr 2 @"), TypedValue::number(3.0));

    eval(&mut ev, "10 20 array/2 array_to_list call/1 ->ys").unwrap();
    assert_eq!(eval_value(&mut ev, "ys length call/1"), TypedValue::number(2.0));
    assert_eq!(
        eval_value(&mut ev, "ys list_to_array call/1 0 @"),
        TypedValue::number(10.0)
    );
}

#[test]
fn accumulate_folds_from_the_right_with_an_interpreted_closure() {
    let mut ev = evaluator();
    eval(&mut ev, ONE_TWO_THREE).unwrap();
    assert_eq!(
        eval_value(&mut ev, "fn(x,acc) x acc + end 0 xs accumulate call/3"),
        TypedValue::number(6.0)
    );
    // 1 - (2 - (3 - 0))
    assert_eq!(
        eval_value(&mut ev, "fn(x,acc) x acc - end 0 xs accumulate call/3"),
        TypedValue::number(2.0)
    );
    assert_eq!(ev.state().current_frame(), Identifier::PROGRAM);
    ev.state().verify_ref_counts().unwrap();
}

#[test]
fn accumulate_checks_its_operator() {
    let mut ev = evaluator();
    eval(&mut ev, ONE_TWO_THREE).unwrap();
    let err = eval(&mut ev, "fn(x) x end 0 xs accumulate call/3").unwrap_err();
    assert_eq!(
        err.to_string(),
        "Closure arity assertion failure (expected 2 arguments, got 1)"
    );
    let err = eval(&mut ev, "fn(x,acc) \"s\" end 0 xs accumulate call/3").unwrap_err();
    assert_eq!(
        err.to_string(),
        "Closure return type assertion failure (expected NUMBER, got CONST_STRING)"
    );
}

#[test]
fn circular_lists_are_reported() {
    let mut ev = evaluator();
    ev.with_data_handler(|ctx| {
        let pair = ctx.pair_make(TypedValue::number(1.0), TypedValue::empty_list())?;
        ctx.pair_set_tail(pair, TypedValue::reference(DataType::Pair, pair.id()))?;
        ctx.state_mut().define(
            "loop",
            TypedValue::reference(DataType::Pair, pair.id()),
            false,
            Some(Identifier::GLOBAL),
        )
    })
    .unwrap();

    assert_eq!(eval_value(&mut ev, "loop is_list call/1"), TypedValue::boolean(false));
    let err = eval(&mut ev, "loop list_to_array call/1").unwrap_err();
    assert_eq!(err, EvalError::Evaluator("Input is a circular list".into()));
    let err = eval(&mut ev, "loop length call/1").unwrap_err();
    assert_eq!(
        err.to_string(),
        "length(xs) expects a list (expected LIST, got PAIR)"
    );
}

#[test]
fn natives_reject_wrong_arity() {
    let mut ev = evaluator();
    let err = eval(&mut ev, "1 pair call/1").unwrap_err();
    assert!(err.to_string().contains("expected 2 arguments, got 1"), "{}", err);
}
