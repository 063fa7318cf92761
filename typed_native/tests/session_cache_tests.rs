mod common;

use std::rc::Rc;

use common::*;
use pretty_assertions::assert_eq;
use typed_native::ast::build::*;
use typed_native::ast::{CompareOperator, Operator};
use typed_native::prelude::*;

fn increment(globals: &Globals) -> FunctionRef {
    define(globals, function("f", &["a"], vec![ret(binop(name("a"), Operator::Add, int(1)))]))
}

#[test]
fn test_repeated_compiles_share_one_target() {
    let globals = module();
    let f = increment(&globals);
    let mut session = CompilationSession::default();

    let first = session.compile(&f, &[TypeKey::Int], None).unwrap();
    assert_eq!(session.extract_new_definitions().len(), 1);

    let second = session.compile(&f, &[TypeKey::Int], None).unwrap();
    assert!(Rc::ptr_eq(&first, &second));
    assert!(session.extract_new_definitions().is_empty());
    assert_eq!(session.stats().compiles, 1);
    assert_eq!(session.stats().cache_hits, 1);

    let float = session.compile(&f, &[TypeKey::Float], None).unwrap();
    assert_eq!(float.output_type, TypeKey::Float);
    assert_eq!(session.stats().compiles, 2);
}

#[test]
fn test_distinct_functions_get_distinct_names() {
    let mut session = CompilationSession::default();
    let first = increment(&module());
    let second = increment(&module());

    let a = session.compile(&first, &[TypeKey::Int], None).unwrap();
    let b = session.compile(&second, &[TypeKey::Int], None).unwrap();
    let c = session.compile(&first, &[TypeKey::Float], None).unwrap();
    assert_eq!(a.name, "py.f");
    assert_eq!(b.name, "py.f.1");
    assert_eq!(c.name, "py.f.2");

    let mut prefixed = CompilationSession::new(CompilerConfig {
        name_prefix: "jit.".into(),
        ..CompilerConfig::default()
    });
    let target = prefixed.compile(&first, &[TypeKey::Int], None).unwrap();
    assert_eq!(target.name, "jit.py.f");
}

#[test]
fn test_call_converters_share_one_signature() {
    let globals = module();
    let nullary = define(&globals, function("zero", &[], vec![ret(int(0))]));
    let unary = increment(&globals);
    let ternary = define(
        &globals,
        function(
            "pick",
            &["a", "b", "c"],
            vec![ret(binop(binop(name("a"), Operator::Add, name("b")), Operator::Add, name("c")))],
        ),
    );
    let mut session = CompilationSession::default();
    let cases: [(&FunctionRef, Vec<TypeKey>); 3] = [
        (&nullary, vec![]),
        (&unary, vec![TypeKey::Int]),
        (&ternary, vec![TypeKey::Float, TypeKey::Int, TypeKey::Int]),
    ];
    for (function, inputs) in cases {
        let target = session.compile(function, &inputs, None).unwrap();
        let converter = session.generate_call_converter(&target).unwrap();
        assert_eq!(converter.name, format!("{}.converter", target.name));
        assert_eq!(
            converter.arg_types,
            vec![NativeType::void_ptr(), NativeType::void_ptr().pointer()]
        );
        assert_eq!(converter.output_type, NativeType::Void);
    }

    let target = session.compile(&unary, &[TypeKey::Int], None).unwrap();
    let again = session.generate_call_converter(&target).unwrap();
    assert_eq!(again.name, "py.f.converter");
}

#[test]
fn test_failed_compile_rolls_back_callees() {
    let globals = module();
    define(&globals, function("g", &["a"], vec![ret(binop(name("a"), Operator::Mult, int(2)))]));
    let f = define(
        &globals,
        function(
            "f",
            &["a"],
            vec![
                assign("x", call(name("g"), vec![name("a")])),
                ret(subscript(tuple(vec![name("x"), name("x")]), int(5))),
            ],
        ),
    );
    let mut session = CompilationSession::default();
    let err = session.compile(&f, &[TypeKey::Int], None).unwrap_err();
    assert!(err.message.contains("out of range"), "{}", err);
    assert!(!session.is_defined("py.g"));
    assert!(!session.is_defined("py.f"));
    assert_eq!(session.pending_count(), 0);

    let g = match globals.get("g") {
        Some(PyValue::Function(g)) => g,
        other => panic!("g is not bound: {:?}", other),
    };
    let target = session.compile(&g, &[TypeKey::Int], None).unwrap();
    assert_eq!(target.name, "py.g");
    assert_eq!(session.extract_new_definitions().len(), 1);
}

#[test]
fn test_runtime_compile_loads_the_backend() {
    let globals = module();
    let f = increment(&globals);
    let runtime = Runtime::default();
    let target = runtime.compile(&f, &[TypeKey::Int]).unwrap();
    assert!(runtime.has_definition(&target.name).unwrap());
    assert!(runtime.has_definition("py.f.converter").unwrap());
    assert_eq!(run(&runtime, &f, &[Value::Int(1)]), Value::Int(2));
    assert_eq!(runtime.stats().unwrap().compiles, 1);
}

#[test]
fn test_changed_provisional_output_is_rejected() {
    let globals = module();
    // `fb` is compiled against `fa` returning int; `fa` then widens to object
    let fa = define(
        &globals,
        function(
            "fa",
            &["n"],
            vec![
                if_then(compare(name("n"), CompareOperator::Eq, int(0)), vec![ret(int(1))]),
                ret(binop(
                    call(name("fb"), vec![binop(name("n"), Operator::Sub, int(1))]),
                    Operator::Add,
                    float(0.5),
                )),
            ],
        ),
    );
    define(
        &globals,
        function("fb", &["n"], vec![ret(call(name("fa"), vec![name("n")]))]),
    );
    let mut session = CompilationSession::default();
    let err = session.compile(&fa, &[TypeKey::Int], None).unwrap_err();
    assert!(err.message.contains("declare its output type"), "{}", err);
    assert!(!session.is_defined("py.fb"));
    assert_eq!(session.pending_count(), 0);

    let target = session.compile(&fa, &[TypeKey::Int], Some(TypeKey::Float)).unwrap();
    assert_eq!(target.output_type, TypeKey::Float);
}
