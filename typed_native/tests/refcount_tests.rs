//! Compiled code must give back every heap reference it takes.

mod common;

use common::*;
use pretty_assertions::assert_eq;
use typed_native::ast::build::*;
use typed_native::ast::{CompareOperator, Operator};
use typed_native::prelude::*;

fn assert_no_leaks(runtime: &Runtime) {
    assert_eq!(runtime.live_allocations().unwrap(), 0);
}

#[test]
fn test_string_building_loop() {
    let globals = module();
    let repeat = define(
        &globals,
        function(
            "repeat",
            &["piece", "n"],
            vec![
                assign("out", string("")),
                for_in(
                    "i",
                    call(name("range"), vec![name("n")]),
                    vec![aug_assign("out", Operator::Add, name("piece"))],
                ),
                ret(name("out")),
            ],
        ),
    );
    let runtime = Runtime::default();
    assert_eq!(run(&runtime, &repeat, &[s("ab"), Value::Int(3)]), s("ababab"));
    assert_no_leaks(&runtime);
    assert_eq!(run(&runtime, &repeat, &[s("ab"), Value::Int(0)]), s(""));
    assert_no_leaks(&runtime);
}

#[test]
fn test_raising_releases_locals() {
    let globals = module();
    let check = define(
        &globals,
        function(
            "check",
            &["t", "n"],
            vec![
                assign("u", binop(name("t"), Operator::Add, string("!"))),
                if_then(
                    compare(name("n"), CompareOperator::Lt, int(0)),
                    vec![raise(call(name("ValueError"), vec![name("u")]))],
                ),
                ret(name("u")),
            ],
        ),
    );
    let runtime = Runtime::default();
    let err = raised(&runtime, &check, &[s("bad"), Value::Int(-1)]);
    assert_eq!(err.kind(), ExceptionKind::ValueError);
    assert_eq!(err.message(), "bad!");
    assert_no_leaks(&runtime);

    assert_eq!(run(&runtime, &check, &[s("ok"), Value::Int(1)]), s("ok!"));
    assert_no_leaks(&runtime);
}

#[test]
fn test_list_growth() {
    let globals = module();
    let squares = define(
        &globals,
        function(
            "squares",
            &["n"],
            vec![
                assign("xs", list(vec![int(0)])),
                for_in(
                    "i",
                    call(name("range"), vec![int(1), name("n")]),
                    vec![expr_stmt(method(
                        name("xs"),
                        "append",
                        vec![binop(name("i"), Operator::Mult, name("i"))],
                    ))],
                ),
                ret(call(name("len"), vec![name("xs")])),
            ],
        ),
    );
    let runtime = Runtime::default();
    assert_eq!(run(&runtime, &squares, &[Value::Int(20)]), Value::Int(20));
    assert_no_leaks(&runtime);
}

#[test]
fn test_returned_containers_share_elements() {
    let globals = module();
    let pair = define(
        &globals,
        function("pair", &["n"], vec![assign("a", call(name("str"), vec![name("n")])), ret(list(vec![name("a"), name("a")]))]),
    );
    let runtime = Runtime::default();
    assert_eq!(run(&runtime, &pair, &[Value::Int(7)]), Value::List(vec![s("7"), s("7")]));
    assert_no_leaks(&runtime);
}

#[test]
fn test_split_results_are_released() {
    let globals = module();
    let fields = define(
        &globals,
        function("fields", &["line"], vec![ret(method(name("line"), "split", vec![string(",")]))]),
    );
    let count = define(
        &globals,
        function(
            "count",
            &["line"],
            vec![ret(call(name("len"), vec![method(name("line"), "split", vec![string(",")])]))],
        ),
    );
    let runtime = Runtime::default();
    assert_eq!(
        run(&runtime, &fields, &[s("a,b,,c")]),
        Value::List(vec![s("a"), s("b"), s(""), s("c")])
    );
    assert_no_leaks(&runtime);
    assert_eq!(run(&runtime, &count, &[s("x,y")]), Value::Int(2));
    assert_no_leaks(&runtime);
}
