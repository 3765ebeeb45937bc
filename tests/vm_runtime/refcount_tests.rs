use cse::{
    postfix::PostfixLanguage,
    runtime::{
        data_handler::DataHandler,
        data_type::DataType,
        value::TypedValue,
        vm::{CseEvaluator, EvaluatorConfig, StepOutcome},
    },
};

fn manual_evaluator(gc_threshold: usize) -> CseEvaluator<PostfixLanguage> {
    CseEvaluator::with_config(
        PostfixLanguage::new(),
        EvaluatorConfig {
            step_limit: 0,
            gc_threshold,
            ..EvaluatorConfig::default()
        },
    )
}

/// Steps `chunk` by hand, auditing every committed state.
fn step_audited(evaluator: &mut CseEvaluator<PostfixLanguage>, chunk: &str) -> Option<TypedValue> {
    let completion = evaluator.evaluate_chunk(chunk);
    evaluator.state().verify_ref_counts().unwrap();
    let mut steps = 0;
    loop {
        let outcome = evaluator.step().unwrap();
        evaluator
            .state()
            .verify_ref_counts()
            .unwrap_or_else(|err| panic!("audit failed after step {}: {}", steps, err));
        steps += 1;
        if outcome != StepOutcome::Continue {
            break;
        }
        assert!(steps < 50_000, "chunk did not finish");
    }
    completion.result().expect("chunk did not finish").unwrap()
}

#[test]
fn counts_hold_after_every_step_of_a_recursive_program() {
    let mut ev = manual_evaluator(16);
    step_audited(
        &mut ev,
        "fn(n) n 1 < if 1 else n n 1 - fact call/1 * end end ->fact",
    );
    let result = step_audited(&mut ev, "10 fact call/1");
    assert_eq!(result, Some(TypedValue::number(3_628_800.0)));
    assert!(ev.state().heap().stats().total_collections > 0);
}

#[test]
fn counts_hold_through_lists_and_arrays() {
    let mut ev = manual_evaluator(16);
    step_audited(&mut ev, "1 2 3 nil pair call/2 pair call/2 pair call/2 ->xs");
    step_audited(&mut ev, "xs list_to_array call/1 ->arr");
    step_audited(&mut ev, "arr 0 arr @=");
    let result = step_audited(&mut ev, "arr len");
    assert_eq!(result, Some(TypedValue::number(3.0)));
}

#[test]
fn counts_hold_when_a_step_fails() {
    let mut ev = manual_evaluator(16);
    let completion = ev.evaluate_chunk("1 2 array/2 5 @");
    loop {
        match ev.step() {
            Ok(StepOutcome::Continue) => ev.state().verify_ref_counts().unwrap(),
            Ok(outcome) => panic!("expected a failure, got {:?}", outcome),
            Err(_) => break,
        }
    }
    ev.state().verify_ref_counts().unwrap();
    assert!(completion.result().unwrap().is_err());
}

#[test]
fn mark_sweep_reclaims_cycles_the_cascade_cannot() {
    let mut ev = manual_evaluator(1024);
    let pair = ev
        .with_data_handler(|ctx| {
            let pair = ctx.pair_make(TypedValue::number(1.0), TypedValue::empty_list())?;
            ctx.pair_set_tail(pair, TypedValue::reference(DataType::Pair, pair.id()))?;
            Ok(pair)
        })
        .unwrap();
    assert_eq!(ev.state().heap().ref_count(pair.id()).unwrap(), 1);

    ev.with_data_handler(|ctx| ctx.state_mut().clean(None)).unwrap();
    assert!(ev.state().heap().node(pair.id()).unwrap().is_assigned());

    let live_before = ev.state().heap().live_count();
    let freed = ev
        .with_data_handler(|ctx| ctx.state_mut().mark_sweep())
        .unwrap();
    assert!(freed >= 1);
    assert!(!ev.state().heap().node(pair.id()).unwrap().is_assigned());
    assert_eq!(ev.state().heap().live_count(), live_before - freed);
    ev.state().verify_ref_counts().unwrap();
}

#[test]
fn extra_roots_survive_collection_without_being_counted() {
    let mut ev = manual_evaluator(1024);
    let pair = ev
        .with_data_handler(|ctx| {
            let pair = ctx.pair_make(TypedValue::number(1.0), TypedValue::number(2.0))?;
            ctx.state_mut().collect(Some(&[pair.id()]))?;
            Ok(pair)
        })
        .unwrap();
    let heap = ev.state().heap();
    assert!(heap.node(pair.id()).unwrap().is_assigned());
    assert_eq!(heap.ref_count(pair.id()).unwrap(), 0);
}

#[test]
fn freed_slots_are_recycled() {
    let mut ev = manual_evaluator(1024);
    let (before, after) = ev
        .with_data_handler(|ctx| {
            ctx.pair_make(TypedValue::number(1.0), TypedValue::number(2.0))?;
            let freed = ctx.state_mut().clean(None)?;
            assert!(freed >= 1);
            let before = ctx.state().heap().capacity();
            let second = ctx.pair_make(TypedValue::number(3.0), TypedValue::number(4.0))?;
            assert_eq!(ctx.state().heap().data_type(second.id())?, DataType::Pair);
            Ok((before, ctx.state().heap().capacity()))
        })
        .unwrap();
    assert_eq!(before, after);
    assert!(ev.state().heap().stats().recycled < ev.state().heap().capacity());
}

#[test]
fn disabled_collection_keeps_garbage_until_asked() {
    let mut ev = CseEvaluator::with_config(
        PostfixLanguage::new(),
        EvaluatorConfig {
            step_limit: 10_000,
            gc_threshold: 1,
            gc_enabled: false,
            ..EvaluatorConfig::default()
        },
    );
    let collections = ev.state().heap().stats().total_collections;
    ev.evaluate_chunk("1 2 array/2 pop 3 4 array/2 pop");
    assert_eq!(ev.state().heap().stats().total_collections, collections);
    ev.state().verify_ref_counts().unwrap();
}
