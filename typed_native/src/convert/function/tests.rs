use super::*;
use crate::ast::build::*;
use crate::ast::{CompareOperator, Operator};
use crate::config::CompilerConfig;
use crate::value::Globals;

fn convert(session: &mut CompilationSession, function: &FunctionRef, inputs: &[TypeKey]) -> CResult<ConvertedFunction> {
    FunctionConverter::new(session, function.clone(), inputs.to_vec(), None).convert()
}

#[test]
fn test_stable_function_converges_quickly() {
    let globals = Globals::new();
    let f = FunctionRef::define(
        function(
            "f",
            &["a"],
            vec![assign("b", binop(name("a"), Operator::Add, int(1))), ret(name("b"))],
        ),
        &globals,
    );
    let mut session = CompilationSession::default();
    let converted = convert(&mut session, &f, &[TypeKey::Int]).unwrap();
    assert_eq!(converted.output, TypeKey::Int);
    assert_eq!(converted.variable_types["b"], TypeKey::Int);
    assert!(converted.passes <= 2, "took {} passes", converted.passes);
    assert_eq!(converted.function.output_type, NativeType::int64());
}

#[test]
fn test_conflicting_assignments_widen_to_object() {
    let globals = Globals::new();
    let f = FunctionRef::define(
        function(
            "f",
            &["n"],
            vec![
                assign("x", int(0)),
                assign("i", int(0)),
                while_loop(
                    compare(name("i"), CompareOperator::Lt, name("n")),
                    vec![
                        assign("x", binop(name("x"), Operator::Add, float(1.5))),
                        aug_assign("i", Operator::Add, int(1)),
                    ],
                ),
                ret(name("x")),
            ],
        ),
        &globals,
    );
    let mut session = CompilationSession::default();
    let converted = convert(&mut session, &f, &[TypeKey::Int]).unwrap();
    assert_eq!(converted.variable_types["x"], TypeKey::Object);
    assert_eq!(converted.variable_types["i"], TypeKey::Int);
    assert_eq!(converted.output, TypeKey::Object);
    assert!(converted.passes >= 2);
    assert_eq!(session.stats().passes, converted.passes);
}

#[test]
fn test_pass_limit_is_enforced() {
    let globals = Globals::new();
    let f = FunctionRef::define(
        function(
            "f",
            &[],
            vec![assign("x", int(0)), assign("x", string("s")), ret(name("x"))],
        ),
        &globals,
    );
    let mut session = CompilationSession::new(CompilerConfig {
        max_type_passes: 1,
        ..CompilerConfig::default()
    });
    let err = convert(&mut session, &f, &[]).unwrap_err();
    assert!(err.message.contains("did not converge"), "{}", err);
    assert_eq!(err.function.as_deref(), Some("f"));
}

#[test]
fn test_local_never_assigned_on_any_path() {
    let globals = Globals::new();
    let f = FunctionRef::define(function("f", &[], vec![ret(name("y")), assign("y", int(1))]), &globals);
    let mut session = CompilationSession::default();
    let err = convert(&mut session, &f, &[]).unwrap_err();
    assert_eq!(err.message, "local variable 'y' referenced before assignment");
}

#[test]
fn test_declared_output_wins() {
    let globals = Globals::new();
    let f = FunctionRef::define(function("f", &[], vec![ret(int(1))]), &globals);
    let mut session = CompilationSession::default();
    let converted = FunctionConverter::new(&mut session, f, vec![], Some(TypeKey::Float))
        .convert()
        .unwrap();
    assert_eq!(converted.output, TypeKey::Float);
    assert_eq!(converted.function.output_type, NativeType::float64());
}

#[test]
fn test_recursion_with_base_case_resolves() {
    let globals = Globals::new();
    let fib = FunctionRef::define(
        function(
            "fib",
            &["n"],
            vec![
                if_then(compare(name("n"), CompareOperator::Lt, int(2)), vec![ret(name("n"))]),
                ret(binop(
                    call(name("fib"), vec![binop(name("n"), Operator::Sub, int(1))]),
                    Operator::Add,
                    call(name("fib"), vec![binop(name("n"), Operator::Sub, int(2))]),
                )),
            ],
        ),
        &globals,
    );
    let mut session = CompilationSession::default();
    let target = session.compile(&fib, &[TypeKey::Int], None).unwrap();
    assert_eq!(target.output_type, TypeKey::Int);
    assert_eq!(session.stats().compiles, 1);
}

#[test]
fn test_recursion_without_base_case_is_rejected() {
    let globals = Globals::new();
    let r = FunctionRef::define(
        function("r", &["n"], vec![ret(call(name("r"), vec![name("n")]))]),
        &globals,
    );
    let mut session = CompilationSession::default();
    let err = session.compile(&r, &[TypeKey::Int], None).unwrap_err();
    assert!(err.message.contains("every path recurses"), "{}", err);
    assert_eq!(session.pending_count(), 0);
}
