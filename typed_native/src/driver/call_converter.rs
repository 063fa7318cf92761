//! Call converters
//!
//! A call converter gives every compiled specialization the same native
//! signature, `(return: void*, input: void**) -> void`, so an untyped caller
//! can invoke any of them. `input[i]` points at Python argument `i`: the
//! converter loads POD arguments from it and passes the pointer itself for
//! arguments passed by reference. The result is written through `return`.

use super::target::CompiledTarget;
use super::CompilationSession;
use crate::native::{NativeExpr, NativeType};
use crate::typed_value::CResult;

pub const RETURN_ARG: &str = ".return_slot";
pub const INPUT_ARG: &str = ".input";

/// Native parameters shared by every call converter.
pub fn converter_args() -> Vec<(String, NativeType)> {
    vec![
        (RETURN_ARG.to_string(), NativeType::void_ptr()),
        (INPUT_ARG.to_string(), NativeType::void_ptr().pointer()),
    ]
}

pub(super) fn converter_body(session: &mut CompilationSession, target: &CompiledTarget) -> CResult<NativeExpr> {
    let output = session.wrapper(&target.output_type);
    let return_slot = NativeExpr::variable(RETURN_ARG);
    let mut args = Vec::with_capacity(target.arg_types.len());
    if output.is_pass_by_ref() {
        args.push(return_slot.clone().cast(output.layout().pointer()));
    }
    for (i, key) in target.input_types.iter().enumerate() {
        let wrapper = session.wrapper(key);
        if wrapper.is_empty() {
            continue;
        }
        let pointer = NativeExpr::variable(INPUT_ARG)
            .element_ptr(vec![NativeExpr::int(i as i64)])
            .load()
            .cast(wrapper.layout().pointer());
        args.push(if wrapper.is_pass_by_ref() { pointer } else { pointer.load() });
    }
    let call = target.call_target().call(args);
    let body = if output.is_empty() || output.is_pass_by_ref() {
        call
    } else {
        return_slot.cast(output.layout().pointer()).store(call)
    };
    Ok(NativeExpr::sequence(vec![body, NativeExpr::ret(None)]))
}
