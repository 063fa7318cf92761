mod common;

use common::*;
use pretty_assertions::assert_eq;
use typed_native::ast::build::*;
use typed_native::ast::{CompareOperator, Operator};
use typed_native::prelude::*;

#[test]
fn test_calls_between_compiled_functions() {
    let globals = module();
    define(&globals, function("g", &["a"], vec![ret(binop(name("a"), Operator::Add, int(2)))]));
    let f = define(
        &globals,
        function(
            "f",
            &["a"],
            vec![ret(binop(
                call(name("g"), vec![name("a")]),
                Operator::Add,
                call(name("g"), vec![int(1)]),
            ))],
        ),
    );
    let runtime = Runtime::default();
    let g = |a: i64| a + 2;
    assert_eq!(run(&runtime, &f, &[Value::Int(10)]), Value::Int(g(10) + g(1)));
}

#[test]
fn test_mutual_recursion() {
    let globals = module();
    let is_even = define(
        &globals,
        function(
            "is_even",
            &["n"],
            vec![
                if_then(compare(name("n"), CompareOperator::Eq, int(0)), vec![ret(boolean(true))]),
                ret(call(name("is_odd"), vec![binop(name("n"), Operator::Sub, int(1))])),
            ],
        ),
    );
    define(
        &globals,
        function(
            "is_odd",
            &["n"],
            vec![
                if_then(compare(name("n"), CompareOperator::Eq, int(0)), vec![ret(boolean(false))]),
                ret(call(name("is_even"), vec![binop(name("n"), Operator::Sub, int(1))])),
            ],
        ),
    );
    let runtime = Runtime::default();
    assert_eq!(run(&runtime, &is_even, &[Value::Int(10)]), Value::Bool(true));
    assert_eq!(run(&runtime, &is_even, &[Value::Int(7)]), Value::Bool(false));
    assert_eq!(runtime.stats().unwrap().compiles, 2);
}

#[test]
fn test_recursive_fibonacci() {
    let globals = module();
    let fib = define(
        &globals,
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
    );
    let runtime = Runtime::default();
    assert_eq!(run(&runtime, &fib, &[Value::Int(20)]), Value::Int(6765));
}

#[test]
fn test_string_semantics() {
    let globals = module();
    let prefixed = define(
        &globals,
        function(
            "prefixed",
            &["x"],
            vec![ret(method(name("x"), "startswith", vec![tuple(vec![string("a"), string("x")])]))],
        ),
    );
    let middle = define(
        &globals,
        function("middle", &["x"], vec![ret(slice(name("x"), Some(int(1)), Some(int(3))))]),
    );
    let same = define(
        &globals,
        function("same", &["a", "b"], vec![ret(compare(name("a"), CompareOperator::Eq, name("b")))]),
    );
    let runtime = Runtime::default();
    assert_eq!(run(&runtime, &prefixed, &[s("abc")]), Value::Bool(true));
    assert_eq!(run(&runtime, &prefixed, &[s("cab")]), Value::Bool(false));
    assert_eq!(run(&runtime, &middle, &[s("hello")]), s("el"));
    assert_eq!(run(&runtime, &same, &[s("abc"), s("abc")]), Value::Bool(true));
    assert_eq!(run(&runtime, &same, &[s("abc"), s("abd")]), Value::Bool(false));
}

#[test]
fn test_string_repetition_overflow_raises() {
    let globals = module();
    let repeat = define(
        &globals,
        function("repeat", &["s", "n"], vec![ret(binop(name("s"), Operator::Mult, name("n")))]),
    );
    let runtime = Runtime::default();
    assert_eq!(run(&runtime, &repeat, &[s("ab"), Value::Int(3)]), s("ababab"));
    let err = raised(&runtime, &repeat, &[s("ab"), Value::Int(i64::MAX)]);
    assert_eq!(err.kind(), ExceptionKind::OverflowError);
    assert_eq!(runtime.live_allocations().unwrap(), 0);
}

#[test]
fn test_math_errors_raise() {
    let globals = module();
    let root = define(
        &globals,
        function("root", &["x"], vec![ret(call(attr(name("math"), "sqrt"), vec![name("x")]))]),
    );
    let fact = define(
        &globals,
        function("fact", &["n"], vec![ret(call(attr(name("math"), "factorial"), vec![name("n")]))]),
    );
    let runtime = Runtime::default();
    assert_eq!(run(&runtime, &root, &[Value::Float(9.0)]), Value::Float(3.0));
    let err = raised(&runtime, &root, &[Value::Float(-1.0)]);
    assert_eq!(err.kind(), ExceptionKind::ValueError);
    assert_eq!(err.message(), "math domain error");

    assert_eq!(run(&runtime, &fact, &[Value::Int(5)]), Value::Int(120));
    assert_eq!(raised(&runtime, &fact, &[Value::Int(-1)]).kind(), ExceptionKind::ValueError);
}

#[test]
fn test_range_with_step() {
    let globals = module();
    let digits = define(
        &globals,
        function(
            "digits",
            &[],
            vec![
                assign("total", int(0)),
                for_in(
                    "i",
                    call(name("range"), vec![int(5), int(10), int(2)]),
                    vec![assign(
                        "total",
                        binop(binop(name("total"), Operator::Mult, int(10)), Operator::Add, name("i")),
                    )],
                ),
                ret(name("total")),
            ],
        ),
    );
    let runtime = Runtime::default();
    assert_eq!(run(&runtime, &digits, &[]), Value::Int(579));
}

#[test]
fn test_range_at_integer_limits() {
    let globals = module();
    let count = define(
        &globals,
        function(
            "count",
            &["start", "stop", "step"],
            vec![
                assign("total", int(0)),
                for_in(
                    "i",
                    call(name("range"), vec![name("start"), name("stop"), name("step")]),
                    vec![aug_assign("total", Operator::Add, int(1))],
                ),
                ret(name("total")),
            ],
        ),
    );
    let length = define(
        &globals,
        function(
            "length",
            &["start", "stop"],
            vec![ret(call(name("len"), vec![call(name("range"), vec![name("start"), name("stop")])]))],
        ),
    );
    let runtime = Runtime::default();
    let limits = [Value::Int(i64::MIN), Value::Int(i64::MAX), Value::Int(i64::MAX)];
    assert_eq!(run(&runtime, &count, &limits), Value::Int(3));
    let downward = [Value::Int(i64::MAX), Value::Int(i64::MIN), Value::Int(i64::MIN)];
    assert_eq!(run(&runtime, &count, &downward), Value::Int(2));
    assert_eq!(run(&runtime, &length, &[Value::Int(-3), Value::Int(4)]), Value::Int(7));
    let err = raised(&runtime, &length, &[Value::Int(i64::MIN), Value::Int(i64::MAX)]);
    assert_eq!(err.kind(), ExceptionKind::OverflowError);
}

#[test]
fn test_conditionally_assigned_local() {
    let globals = module();
    let pick = define(
        &globals,
        function(
            "pick",
            &["c"],
            vec![if_then(name("c"), vec![assign("y", int(1))]), ret(name("y"))],
        ),
    );
    let runtime = Runtime::default();
    assert_eq!(run(&runtime, &pick, &[Value::Bool(true)]), Value::Int(1));
    let err = raised(&runtime, &pick, &[Value::Bool(false)]);
    assert_eq!(err.kind(), ExceptionKind::UnboundLocalError);
    assert_eq!(err.message(), "local variable 'y' referenced before assignment");
}

#[test]
fn test_lambda_and_assertions() {
    let globals = module();
    let product = FunctionRef::new(lambda(&["a", "b"], binop(name("a"), Operator::Mult, name("b"))), &globals);
    let positive = define(
        &globals,
        function(
            "positive",
            &["x"],
            vec![
                assert_that(compare(name("x"), CompareOperator::Gt, int(0)), Some(string("must be positive"))),
                ret(name("x")),
            ],
        ),
    );
    let runtime = Runtime::default();
    assert_eq!(run(&runtime, &product, &[Value::Int(3), Value::Int(4)]), Value::Int(12));
    assert_eq!(run(&runtime, &positive, &[Value::Int(7)]), Value::Int(7));
    let err = raised(&runtime, &positive, &[Value::Int(-7)]);
    assert_eq!(err.kind(), ExceptionKind::AssertionError);
    assert_eq!(err.message(), "must be positive");
}

#[test]
fn test_widened_local_round_trips_as_object() {
    let globals = module();
    let accumulate = define(
        &globals,
        function(
            "accumulate",
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
    );
    let runtime = Runtime::default();
    assert_eq!(run(&runtime, &accumulate, &[Value::Int(2)]), Value::Float(3.0));
    assert_eq!(run(&runtime, &accumulate, &[Value::Int(0)]), Value::Int(0));
}
