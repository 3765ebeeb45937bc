use cse::{
    postfix::PostfixLanguage,
    runtime::{
        closure::{NativeSignature, native_fn},
        data_type::DataType,
        error::{ErrorKind, EvalError},
        gc::Identifier,
        value::TypedValue,
        vm::{CompletionState, CseEvaluator, EvaluatorConfig, StepOutcome},
    },
};

fn evaluator_with(config: EvaluatorConfig) -> CseEvaluator<PostfixLanguage> {
    CseEvaluator::with_config(PostfixLanguage::new(), config)
}

fn evaluator() -> CseEvaluator<PostfixLanguage> {
    evaluator_with(EvaluatorConfig {
        step_limit: 100_000,
        ..EvaluatorConfig::default()
    })
}

fn eval(evaluator: &mut CseEvaluator<PostfixLanguage>, chunk: &str) -> Result<Option<TypedValue>, EvalError> {
    let completion = evaluator.evaluate_chunk(chunk);
    completion.result().expect("chunk did not finish")
}

fn eval_number(evaluator: &mut CseEvaluator<PostfixLanguage>, chunk: &str) -> f64 {
    eval(evaluator, chunk)
        .unwrap()
        .and_then(|v| v.as_number())
        .expect("expected a number")
}

#[test]
fn arithmetic_chunk_resolves_to_top_of_stash() {
    let mut ev = evaluator();
    assert_eq!(eval_number(&mut ev, "1 2 + 4 *"), 12.0);
}

#[test]
fn chunk_without_result_resolves_to_none() {
    let mut ev = evaluator();
    assert_eq!(eval(&mut ev, "1 pop").unwrap(), None);
    assert_eq!(eval(&mut ev, "# only a comment").unwrap(), None);
}

#[test]
fn bindings_persist_across_chunks() {
    let mut ev = evaluator();
    eval(&mut ev, "10 ->x").unwrap();
    eval(&mut ev, "x 1 + =x").unwrap();
    assert_eq!(eval_number(&mut ev, "x"), 11.0);
    assert_eq!(ev.state().current_frame(), Identifier::PROGRAM);
}

#[test]
fn constants_cannot_be_reassigned() {
    let mut ev = evaluator();
    eval(&mut ev, "3 =>k").unwrap();
    let err = eval(&mut ev, "4 =k").unwrap_err();
    assert_eq!(err, EvalError::ConstantAssignment("k".into()));
    assert_eq!(eval_number(&mut ev, "k"), 3.0);
}

#[test]
fn unknown_name_rejects_the_completion() {
    let mut ev = evaluator();
    let err = eval(&mut ev, "missing").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Name);
    assert_eq!(err.to_string(), "name not found: missing");
}

#[test]
fn syntax_error_is_rejected_without_stepping() {
    let mut ev = evaluator();
    let before = ev.snapshot().digest().unwrap();
    let err = eval(&mut ev, "1 if 2").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Evaluator);
    assert_eq!(ev.snapshot().digest().unwrap(), before);
}

#[test]
fn branches_pick_an_arm() {
    let mut ev = evaluator();
    let chunk = "5 ->n\nn 3 < if \"small\" else \"big\" end";
    assert_eq!(eval(&mut ev, chunk).unwrap(), Some(TypedValue::string("big")));
}

#[test]
fn recursive_closure_through_the_program_frame() {
    let mut ev = evaluator();
    eval(
        &mut ev,
        "fn(n) n 1 < if 1 else n n 1 - fact call/1 * end end ->fact",
    )
    .unwrap();
    assert_eq!(eval_number(&mut ev, "5 fact call/1"), 120.0);
    assert_eq!(ev.state().current_frame(), Identifier::PROGRAM);
    ev.state().verify_ref_counts().unwrap();
}

#[test]
fn deep_recursion_finishes_on_the_test_thread() {
    let mut ev = evaluator_with(EvaluatorConfig {
        step_limit: 1_000_000,
        ..EvaluatorConfig::default()
    });
    eval(&mut ev, "fn(n) n 0 == if 0 else n 1 - down call/1 end end ->down").unwrap();
    assert_eq!(eval_number(&mut ev, "5000 down call/1"), 0.0);
    assert_eq!(ev.state().current_frame(), Identifier::PROGRAM);
    assert!(ev.state().control().is_empty());
    ev.state().verify_ref_counts().unwrap();
}

#[test]
fn failure_deep_in_recursion_leaves_a_usable_machine() {
    let mut ev = evaluator_with(EvaluatorConfig {
        step_limit: 1_000_000,
        ..EvaluatorConfig::default()
    });
    eval(
        &mut ev,
        "fn(n) n 0 == if \"x\" 1 - else n 1 - dive call/1 end end ->dive",
    )
    .unwrap();
    let err = eval(&mut ev, "3000 dive call/1").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Type);
    ev.state().verify_ref_counts().unwrap();

    assert_eq!(eval_number(&mut ev, "1 2 +"), 3.0);
    assert_eq!(ev.state().current_frame(), Identifier::PROGRAM);
    ev.state().verify_ref_counts().unwrap();
}

#[test]
fn function_leaving_no_value_is_rejected() {
    let mut ev = evaluator();
    eval(&mut ev, "fn(a) a pop end ->f").unwrap();
    let err = eval(&mut ev, "1 f call/1").unwrap_err();
    assert_eq!(err, EvalError::Evaluator("function produced no value".into()));
    assert!(!err.is_internal());

    assert_eq!(eval_number(&mut ev, "2 3 +"), 5.0);
    ev.state().verify_ref_counts().unwrap();
}

#[test]
fn closures_capture_their_defining_frame() {
    let mut ev = evaluator();
    eval(
        &mut ev,
        "fn(n) fn(m) n m + end end ->adder\n2 adder call/1 ->add2",
    )
    .unwrap();
    assert_eq!(eval_number(&mut ev, "40 add2 call/1"), 42.0);
}

#[test]
fn arrays_index_assign_and_length() {
    let mut ev = evaluator();
    eval(&mut ev, "1 2 3 array/3 ->xs").unwrap();
    eval(&mut ev, "xs 1 20 @=").unwrap();
    assert_eq!(eval_number(&mut ev, "xs 1 @"), 20.0);
    assert_eq!(eval_number(&mut ev, "xs len"), 3.0);
    let err = eval(&mut ev, "xs 3 @").unwrap_err();
    assert_eq!(err, EvalError::IndexOutOfRange { index: 3.0, length: 3 });
}

#[test]
fn step_limit_leaves_the_completion_pending() {
    let mut ev = evaluator_with(EvaluatorConfig {
        step_limit: 3,
        ..EvaluatorConfig::default()
    });
    let completion = ev.evaluate_chunk("1 2 + 3 + 4 +");
    assert!(completion.is_pending());

    ev.run_to_completion(None);
    assert_eq!(
        completion.state(),
        CompletionState::Resolved(Some(TypedValue::number(10.0)))
    );
    assert_eq!(ev.step().unwrap(), StepOutcome::Idle);
}

#[test]
fn new_chunk_supersedes_a_pending_one() {
    let mut ev = evaluator_with(EvaluatorConfig {
        step_limit: 1,
        ..EvaluatorConfig::default()
    });
    let first = ev.evaluate_chunk("1 2 +");
    assert!(first.is_pending());
    let second = ev.evaluate_chunk("7");
    assert!(matches!(first.state(), CompletionState::Rejected(_)));
    ev.run_to_completion(None);
    assert_eq!(second.result(), Some(Ok(Some(TypedValue::number(7.0)))));
}

#[test]
fn failing_step_leaves_committed_state_in_place() {
    let mut ev = evaluator_with(EvaluatorConfig {
        step_limit: 0,
        ..EvaluatorConfig::default()
    });
    let completion = ev.evaluate_chunk("1 true +");
    loop {
        let before = ev.snapshot().digest().unwrap();
        match ev.step() {
            Ok(StepOutcome::Continue) => continue,
            Ok(outcome) => panic!("expected a failing step, got {:?}", outcome),
            Err(err) => {
                assert_eq!(err.kind(), ErrorKind::Type);
                assert_eq!(ev.snapshot().digest().unwrap(), before);
                break;
            }
        }
    }
    assert!(matches!(completion.state(), CompletionState::Rejected(_)));
}

#[test]
fn history_is_capped() {
    let mut ev = evaluator_with(EvaluatorConfig {
        step_limit: 1_000,
        saved_states: 3,
        ..EvaluatorConfig::default()
    });
    eval(&mut ev, "1 2 3 4 5 + + + +").unwrap();
    assert_eq!(ev.history().count(), 3);
    assert!(ev.history().all(|state| !state.is_draft()));
}

#[test]
fn host_globals_and_natives_are_visible_to_programs() {
    let mut ev = evaluator();
    ev.define_global("limit", TypedValue::number(3.0), true).unwrap();
    ev.define_native(
        NativeSignature::new("square", 1, DataType::Number).with_param_types(vec![DataType::Number]),
        native_fn(|_, args| {
            let n = args[0].as_number().unwrap_or(0.0);
            Ok(TypedValue::number(n * n))
        }),
    )
    .unwrap();

    assert_eq!(eval_number(&mut ev, "limit square call/1"), 9.0);
    let err = eval(&mut ev, "true square call/1").unwrap_err();
    assert_eq!(
        err.to_string(),
        "Argument type mismatch (expected NUMBER, got BOOLEAN)"
    );
    let err = eval(&mut ev, "1 =limit").unwrap_err();
    assert_eq!(err, EvalError::ConstantAssignment("limit".into()));
}

#[test]
fn data_handler_transaction_commits_only_on_success() {
    let mut ev = evaluator();
    let before = ev.snapshot().digest().unwrap();
    let err = ev
        .with_data_handler(|ctx| {
            ctx.state_mut()
                .define("scratch", TypedValue::number(1.0), false, None)?;
            Err::<(), _>(EvalError::Evaluator("abort".into()))
        })
        .unwrap_err();
    assert_eq!(err, EvalError::Evaluator("abort".into()));
    assert_eq!(ev.snapshot().digest().unwrap(), before);
    assert!(eval(&mut ev, "scratch").is_err());
}

#[test]
fn trace_can_be_toggled() {
    let mut ev = evaluator();
    assert!(!ev.config().trace);
    ev.set_trace(true);
    assert!(ev.config().trace);
    assert_eq!(eval_number(&mut ev, "2 3 *"), 6.0);
}
