use super::*;
use crate::driver::{CompilationSession, CompiledTarget};
use crate::runtime_functions as rt;
use pretty_assertions::assert_eq;

fn interpreter_with(functions: Vec<(&str, NativeFunction)>) -> NativeInterpreter {
    let mut interpreter = NativeInterpreter::new();
    interpreter.add_definitions(functions.into_iter().map(|(name, f)| (name.to_string(), f)).collect());
    interpreter
}

fn counter() -> NativeExpr {
    NativeExpr::slot("i", NativeType::int64())
}

#[test]
fn test_tagged_teardown_runs_when_raising() {
    let text = NativeExpr::slot("s", rt::str_handle());
    let body = NativeExpr::Finally {
        body: Box::new(NativeExpr::sequence(vec![
            text.clone().store(rt::str_from_utf8().call(vec![NativeExpr::utf8("temporary")])),
            NativeExpr::ActivatesTeardown("s.live".into()),
            NativeExpr::throw("ValueError", NativeExpr::utf8("boom")),
        ])),
        teardowns: vec![
            Teardown::ByTag {
                tag: "s.live".into(),
                expr: rt::str_free().call(vec![text.clone().load()]),
            },
            Teardown::ByTag {
                tag: "never".into(),
                expr: rt::str_free().call(vec![text.load()]),
            },
        ],
    };
    let mut interpreter = interpreter_with(vec![("t", NativeFunction::new(vec![], NativeType::Void, body))]);
    let err = interpreter.call_function("t", vec![]).unwrap_err();
    assert_eq!(err, Trap::Raise(RuntimeError::new(ExceptionKind::ValueError, "boom")));
    assert_eq!(interpreter.live_allocations(), 0);
}

fn count_to(limit: i64) -> NativeFunction {
    let i = counter();
    let flag = NativeExpr::slot("done", NativeType::int64());
    let body = NativeExpr::sequence(vec![
        i.clone().store(NativeExpr::int(0)),
        NativeExpr::while_loop(
            i.clone().load().lt(NativeExpr::int(10)),
            NativeExpr::sequence(vec![
                NativeExpr::when(i.clone().load().eq(NativeExpr::int(limit)), NativeExpr::Break),
                i.clone().store(i.clone().load().add(NativeExpr::int(1))),
            ]),
            flag.clone().store(NativeExpr::int(100)),
        ),
        NativeExpr::ret(Some(i.load().add(flag.load()))),
    ]);
    NativeFunction::new(vec![], NativeType::int64(), body)
}

#[test]
fn test_while_else_skipped_after_break() {
    let mut interpreter = interpreter_with(vec![("early", count_to(3)), ("full", count_to(-1))]);
    assert_eq!(interpreter.call_function("early", vec![]).unwrap(), RtValue::Int(3));
    assert_eq!(interpreter.call_function("full", vec![]).unwrap(), RtValue::Int(110));
}

#[test]
fn test_runaway_recursion_raises() {
    let target = CallTarget::internal("forever", vec![], NativeType::int64());
    let body = NativeExpr::ret(Some(target.call(vec![])));
    let mut interpreter = interpreter_with(vec![("forever", NativeFunction::new(vec![], NativeType::int64(), body))]);
    let Err(Trap::Raise(err)) = interpreter.call_function("forever", vec![]) else {
        panic!("expected a RuntimeError");
    };
    assert_eq!(err.kind(), ExceptionKind::RuntimeError);
    assert_eq!(err.message(), "maximum recursion depth exceeded");
}

#[test]
fn test_invoke_converter_marshals_arguments() {
    let mut session = CompilationSession::default();
    let int = session.wrapper(&TypeKey::Int);
    let target = CompiledTarget::new("add".into(), vec![TypeKey::Int, TypeKey::Int], &[int.clone(), int.clone()], &int);
    let add = NativeFunction::new(
        vec![("a.x".into(), NativeType::int64()), ("a.y".into(), NativeType::int64())],
        NativeType::int64(),
        NativeExpr::ret(Some(NativeExpr::variable("a.x").add(NativeExpr::variable("a.y")))),
    );
    let converter = session.generate_call_converter(&target).unwrap();

    let mut interpreter = interpreter_with(vec![("add", add)]);
    interpreter.add_definitions(session.extract_new_definitions());
    assert!(interpreter.has_definition(&converter.name));

    let inputs = [TypeKey::Int, TypeKey::Int];
    let sum = interpreter
        .invoke_converter(&converter.name, &inputs, &TypeKey::Int, &[Value::Int(2), Value::Int(40)])
        .unwrap();
    assert_eq!(sum, Value::Int(42));

    let err = interpreter
        .invoke_converter("missing", &inputs, &TypeKey::Int, &[Value::Int(1), Value::Int(2)])
        .unwrap_err();
    assert_eq!(err, BackendError::UndefinedFunction("missing".into()));
}
