//! Runtime library symbols for the reference interpreter.
//!
//! Each external call target resolves to a Rust function over interpreter
//! values. Handles arrive borrowed and handles returned are new, with a
//! reference count of one. The algorithms themselves live in
//! `typed_native_runtime`; this module only moves values in and out of
//! interpreter memory.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use typed_native_runtime::dispatch::{dynamic_binop, dynamic_contains, dynamic_getitem, dynamic_unaryop, BinOp, UnaryOp};
use typed_native_runtime::intrinsics::{self, FSum};
use typed_native_runtime::strings::{self, StripSide};
use typed_native_runtime::{convert, RuntimeError, Value};

use super::memory::{fault, list_element_type, Memory, Payload, RtValue, Trap};
use crate::native::CallTarget;
use crate::runtime_functions::{STRIP_BOTH, STRIP_LEFT, STRIP_RIGHT};

pub type Extern = fn(&mut Memory, &CallTarget, &[RtValue]) -> Result<RtValue, Trap>;

/// Look up the implementation of an external symbol.
pub fn lookup(target: &CallTarget) -> Option<Extern> {
    if let Some(function) = EXTERNS.get(target.name.as_str()) {
        return Some(*function);
    }
    if !target.intrinsic {
        return None;
    }
    if intrinsics::unary_float_function(&target.name).is_some() {
        return Some(unary_float);
    }
    if intrinsics::binary_float_function(&target.name).is_some() {
        return Some(binary_float);
    }
    None
}

fn arg<'a>(target: &CallTarget, args: &'a [RtValue], index: usize) -> Result<&'a RtValue, Trap> {
    match args.get(index) {
        Some(value) => Ok(value),
        None => fault(format!("{} expects argument {}", target.name, index)),
    }
}

fn int(target: &CallTarget, args: &[RtValue], index: usize) -> Result<i64, Trap> {
    arg(target, args, index)?.as_int()
}

fn float(target: &CallTarget, args: &[RtValue], index: usize) -> Result<f64, Trap> {
    arg(target, args, index)?.as_float()
}

fn flag(target: &CallTarget, args: &[RtValue], index: usize) -> Result<bool, Trap> {
    arg(target, args, index)?.as_bool()
}

fn text(memory: &Memory, target: &CallTarget, args: &[RtValue], index: usize) -> Result<String, Trap> {
    memory.read_str(arg(target, args, index)?)
}

fn object(memory: &Memory, target: &CallTarget, args: &[RtValue], index: usize) -> Result<Value, Trap> {
    memory.read_object(arg(target, args, index)?)
}

/// `(has, value)` argument pairs for optional integers.
fn optional_int(target: &CallTarget, args: &[RtValue], index: usize) -> Result<Option<i64>, Trap> {
    if flag(target, args, index)? {
        Ok(Some(int(target, args, index + 1)?))
    } else {
        Ok(None)
    }
}

fn free_handle(memory: &mut Memory, handle: &RtValue) -> Result<RtValue, Trap> {
    if let Some(address) = handle.as_ptr()? {
        memory.free(&address.clone())?;
    }
    Ok(RtValue::Void)
}

fn unary_float(_: &mut Memory, target: &CallTarget, args: &[RtValue]) -> Result<RtValue, Trap> {
    match intrinsics::unary_float_function(&target.name) {
        Some(function) => Ok(RtValue::Float(function(float(target, args, 0)?))),
        None => fault(format!("unknown intrinsic {}", target.name)),
    }
}

fn binary_float(_: &mut Memory, target: &CallTarget, args: &[RtValue]) -> Result<RtValue, Trap> {
    match intrinsics::binary_float_function(&target.name) {
        Some(function) => Ok(RtValue::Float(function(float(target, args, 0)?, float(target, args, 1)?))),
        None => fault(format!("unknown intrinsic {}", target.name)),
    }
}

// ========== Strings ==========

fn str_search(memory: &mut Memory, target: &CallTarget, args: &[RtValue]) -> Result<RtValue, Trap> {
    let s = text(memory, target, args, 0)?;
    let sub = text(memory, target, args, 1)?;
    let start = optional_int(target, args, 2)?;
    let end = optional_int(target, args, 4)?;
    let result = match target.name.as_str() {
        "str_find" => strings::find(&s, &sub, start, end),
        "str_rfind" => strings::rfind(&s, &sub, start, end),
        "str_index" => strings::index(&s, &sub, start, end)?,
        "str_rindex" => strings::rindex(&s, &sub, start, end)?,
        "str_count" => strings::count(&s, &sub, start, end),
        "str_startswith" => i64::from(strings::startswith(&s, &sub, start, end)),
        "str_endswith" => i64::from(strings::endswith(&s, &sub, start, end)),
        other => return fault(format!("unknown search method {}", other)),
    };
    Ok(RtValue::Int(result))
}

fn str_transform(memory: &mut Memory, target: &CallTarget, args: &[RtValue]) -> Result<RtValue, Trap> {
    let s = text(memory, target, args, 0)?;
    let result = match target.name.as_str() {
        "str_lower" => strings::lower(&s),
        "str_upper" => strings::upper(&s),
        "str_capitalize" => strings::capitalize(&s),
        "str_swapcase" => strings::swapcase(&s),
        "str_title" => strings::title(&s),
        "str_casefold" => strings::casefold(&s),
        other => return fault(format!("unknown string transform {}", other)),
    };
    Ok(memory.new_str(result))
}

fn str_predicate(memory: &mut Memory, target: &CallTarget, args: &[RtValue]) -> Result<RtValue, Trap> {
    let s = text(memory, target, args, 0)?;
    let result = match target.name.as_str() {
        "str_isalpha" => strings::isalpha(&s),
        "str_isdigit" => strings::isdigit(&s),
        "str_isalnum" => strings::isalnum(&s),
        "str_isspace" => strings::isspace(&s),
        "str_islower" => strings::islower(&s),
        "str_isupper" => strings::isupper(&s),
        "str_isdecimal" => strings::isdecimal(&s),
        "str_isnumeric" => strings::isnumeric(&s),
        "str_istitle" => strings::istitle(&s),
        "str_isidentifier" => strings::isidentifier(&s),
        "str_isprintable" => strings::isprintable(&s),
        other => return fault(format!("unknown string predicate {}", other)),
    };
    Ok(RtValue::bool(result))
}

fn str_split(memory: &mut Memory, target: &CallTarget, args: &[RtValue]) -> Result<RtValue, Trap> {
    let s = text(memory, target, args, 0)?;
    let sep = if flag(target, args, 1)? {
        Some(text(memory, target, args, 2)?)
    } else {
        None
    };
    let maxsplit = int(target, args, 3)?;
    let parts = strings::split(&s, sep.as_deref(), maxsplit)?;
    let element = list_element_type(&target.output_type)?;
    let handles: Vec<RtValue> = parts.into_iter().map(|part| memory.new_str(part)).collect();
    let reserved = handles.len();
    Ok(memory.new_list(&element, handles, reserved))
}

fn str_join(memory: &mut Memory, target: &CallTarget, args: &[RtValue]) -> Result<RtValue, Trap> {
    let sep = text(memory, target, args, 0)?;
    let parts = memory
        .list_items(arg(target, args, 1)?)?
        .iter()
        .map(|handle| memory.read_str(handle))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(memory.new_str(strings::join(&sep, &parts)))
}

fn str_strip(memory: &mut Memory, target: &CallTarget, args: &[RtValue]) -> Result<RtValue, Trap> {
    let s = text(memory, target, args, 0)?;
    let chars = if flag(target, args, 1)? {
        Some(text(memory, target, args, 2)?)
    } else {
        None
    };
    let side = match int(target, args, 3)? {
        STRIP_LEFT => StripSide::Left,
        STRIP_RIGHT => StripSide::Right,
        STRIP_BOTH => StripSide::Both,
        other => return fault(format!("invalid strip side {}", other)),
    };
    Ok(memory.new_str(strings::strip(&s, chars.as_deref(), side)))
}

// ========== Math ==========

fn fsum_accumulator<'m>(
    memory: &'m mut Memory,
    target: &CallTarget,
    args: &[RtValue],
) -> Result<&'m mut FSum, Trap> {
    let address = arg(target, args, 0)?.address()?.clone();
    match memory.payload_mut(&address)? {
        Payload::FSum(sum) => Ok(sum),
        other => fault(format!("expected an fsum accumulator, found {:?}", other)),
    }
}

// ========== Objects ==========

fn object_binop(memory: &mut Memory, target: &CallTarget, args: &[RtValue]) -> Result<RtValue, Trap> {
    let code = int(target, args, 0)?;
    let Some(op) = BinOp::from_code(code) else {
        return fault(format!("invalid binary operator code {}", code));
    };
    let lhs = object(memory, target, args, 1)?;
    let rhs = object(memory, target, args, 2)?;
    let result = dynamic_binop(op, &lhs, &rhs)?;
    Ok(memory.new_object(result))
}

fn object_unaryop(memory: &mut Memory, target: &CallTarget, args: &[RtValue]) -> Result<RtValue, Trap> {
    let code = int(target, args, 0)?;
    let Some(op) = UnaryOp::from_code(code) else {
        return fault(format!("invalid unary operator code {}", code));
    };
    let operand = object(memory, target, args, 1)?;
    let result = dynamic_unaryop(op, &operand)?;
    Ok(memory.new_object(result))
}

// ========== Lists ==========

fn list_new(memory: &mut Memory, target: &CallTarget, args: &[RtValue]) -> Result<RtValue, Trap> {
    let capacity = int(target, args, 0)?;
    let element = list_element_type(&target.output_type)?;
    Ok(memory.new_list(&element, Vec::new(), capacity.max(0) as usize))
}

fn list_resize(memory: &mut Memory, target: &CallTarget, args: &[RtValue]) -> Result<RtValue, Trap> {
    let handle = arg(target, args, 0)?.address()?.clone();
    let reserved = int(target, args, 1)?;
    let element = match target.arg_types.first() {
        Some(handle_type) => list_element_type(handle_type)?,
        None => return fault("list_resize has no handle type"),
    };
    memory.resize_list(&handle, reserved, &element)?;
    Ok(RtValue::Void)
}

fn list_free(memory: &mut Memory, target: &CallTarget, args: &[RtValue]) -> Result<RtValue, Trap> {
    if let Some(handle) = arg(target, args, 0)?.as_ptr()? {
        memory.free_list(&handle.clone())?;
    }
    Ok(RtValue::Void)
}

static EXTERNS: Lazy<HashMap<&'static str, Extern>> = Lazy::new(|| {
    let mut table: HashMap<&'static str, Extern> = HashMap::new();

    table.insert("str_from_utf8", |m, t, a| match arg(t, a, 0)? {
        RtValue::Utf8(text) => Ok(m.new_str(text.clone())),
        other => fault(format!("str_from_utf8 expects a static buffer, got {:?}", other)),
    });
    table.insert("str_free", |m, t, a| free_handle(m, arg(t, a, 0)?));
    table.insert("str_len", |m, t, a| Ok(RtValue::Int(strings::char_len(&text(m, t, a, 0)?))));
    table.insert("str_concat", |m, t, a| {
        let joined = text(m, t, a, 0)? + &text(m, t, a, 1)?;
        Ok(m.new_str(joined))
    });
    table.insert("str_repeat", |m, t, a| {
        let repeated = strings::repeat(&text(m, t, a, 0)?, int(t, a, 1)?)?;
        Ok(m.new_str(repeated))
    });
    table.insert("str_eq", |m, t, a| Ok(RtValue::bool(text(m, t, a, 0)? == text(m, t, a, 1)?)));
    table.insert("str_cmp", |m, t, a| {
        Ok(RtValue::Int(strings::compare(&text(m, t, a, 0)?, &text(m, t, a, 1)?)))
    });
    table.insert("str_contains", |m, t, a| {
        Ok(RtValue::bool(strings::contains(&text(m, t, a, 0)?, &text(m, t, a, 1)?)))
    });
    table.insert("str_getitem", |m, t, a| {
        let item = strings::getitem(&text(m, t, a, 0)?, int(t, a, 1)?)?;
        Ok(m.new_str(item))
    });
    table.insert("str_slice", |m, t, a| {
        let sliced = strings::slice(&text(m, t, a, 0)?, optional_int(t, a, 1)?, optional_int(t, a, 3)?);
        Ok(m.new_str(sliced))
    });
    for name in [
        "str_find",
        "str_rfind",
        "str_index",
        "str_rindex",
        "str_count",
        "str_startswith",
        "str_endswith",
    ] {
        table.insert(name, str_search);
    }
    table.insert("str_replace", |m, t, a| {
        let replaced = strings::replace(&text(m, t, a, 0)?, &text(m, t, a, 1)?, &text(m, t, a, 2)?, int(t, a, 3)?);
        Ok(m.new_str(replaced))
    });
    table.insert("str_split", str_split);
    table.insert("str_join", str_join);
    table.insert("str_strip", str_strip);
    for name in ["str_lower", "str_upper", "str_capitalize", "str_swapcase", "str_title", "str_casefold"] {
        table.insert(name, str_transform);
    }
    for name in [
        "str_isalpha",
        "str_isdigit",
        "str_isalnum",
        "str_isspace",
        "str_islower",
        "str_isupper",
        "str_isdecimal",
        "str_isnumeric",
        "str_istitle",
        "str_isidentifier",
        "str_isprintable",
    ] {
        table.insert(name, str_predicate);
    }
    table.insert("str_to_int", |m, t, a| Ok(RtValue::Int(convert::parse_int(&text(m, t, a, 0)?)?)));
    table.insert("str_to_float", |m, t, a| Ok(RtValue::Float(convert::parse_float(&text(m, t, a, 0)?)?)));
    table.insert("str_from_int", |m, t, a| Ok(m.new_str(int(t, a, 0)?.to_string())));
    table.insert("str_from_float", |m, t, a| Ok(m.new_str(convert::float_repr(float(t, a, 0)?))));
    table.insert("str_ord", |m, t, a| Ok(RtValue::Int(strings::ord(&text(m, t, a, 0)?)?)));
    table.insert("str_chr", |m, t, a| {
        let character = strings::chr(int(t, a, 0)?)?;
        Ok(m.new_str(character))
    });

    table.insert("int64_floordiv", |_, t, a| Ok(RtValue::Int(intrinsics::int_floordiv(int(t, a, 0)?, int(t, a, 1)?)?)));
    table.insert("int64_mod", |_, t, a| Ok(RtValue::Int(intrinsics::int_mod(int(t, a, 0)?, int(t, a, 1)?)?)));
    table.insert("range_len", |_, t, a| {
        Ok(RtValue::Int(intrinsics::range_len(int(t, a, 0)?, int(t, a, 1)?, int(t, a, 2)?)?))
    });
    table.insert("range_count", |_, t, a| {
        Ok(RtValue::Int(intrinsics::range_count(int(t, a, 0)?, int(t, a, 1)?, int(t, a, 2)?)))
    });
    table.insert("int64_pow", |_, t, a| Ok(RtValue::Int(intrinsics::int_pow(int(t, a, 0)?, int(t, a, 1)?)?)));
    table.insert("int64_lshift", |_, t, a| Ok(RtValue::Int(intrinsics::int_lshift(int(t, a, 0)?, int(t, a, 1)?)?)));
    table.insert("int64_rshift", |_, t, a| Ok(RtValue::Int(intrinsics::int_rshift(int(t, a, 0)?, int(t, a, 1)?)?)));
    table.insert("float64_floordiv", |_, t, a| {
        Ok(RtValue::Float(intrinsics::float_floordiv(float(t, a, 0)?, float(t, a, 1)?)?))
    });
    table.insert("float64_mod", |_, t, a| Ok(RtValue::Float(intrinsics::float_mod(float(t, a, 0)?, float(t, a, 1)?)?)));
    table.insert("float64_pow", |_, t, a| Ok(RtValue::Float(intrinsics::float_pow(float(t, a, 0)?, float(t, a, 1)?)?)));
    table.insert("float64_to_int", |_, t, a| Ok(RtValue::Int(convert::float_to_int(float(t, a, 0)?)?)));

    table.insert("math_pow", |_, t, a| Ok(RtValue::Float(intrinsics::math_pow(float(t, a, 0)?, float(t, a, 1)?)?)));
    table.insert("math_factorial", |_, t, a| Ok(RtValue::Int(intrinsics::factorial(int(t, a, 0)?)?)));
    table.insert("math_gcd", |_, t, a| Ok(RtValue::Int(intrinsics::gcd(int(t, a, 0)?, int(t, a, 1)?))));
    table.insert("fsum_new", |m, _, _| {
        Ok(RtValue::Ptr(Some(m.allocate(Vec::new(), Payload::FSum(FSum::new()), true))))
    });
    table.insert("fsum_add", |m, t, a| {
        let value = float(t, a, 1)?;
        fsum_accumulator(m, t, a)?.add(value)?;
        Ok(RtValue::Void)
    });
    table.insert("fsum_total", |m, t, a| Ok(RtValue::Float(fsum_accumulator(m, t, a)?.total()?)));
    table.insert("fsum_free", |m, t, a| free_handle(m, arg(t, a, 0)?));

    table.insert("object_from_none", |m, _, _| Ok(m.new_object(Value::None)));
    table.insert("object_from_bool", |m, t, a| Ok(m.new_object(Value::Bool(flag(t, a, 0)?))));
    table.insert("object_from_int", |m, t, a| Ok(m.new_object(Value::Int(int(t, a, 0)?))));
    table.insert("object_from_float", |m, t, a| Ok(m.new_object(Value::Float(float(t, a, 0)?))));
    table.insert("object_from_str", |m, t, a| {
        let value = Value::Str(text(m, t, a, 0)?);
        Ok(m.new_object(value))
    });
    table.insert("object_binop", object_binop);
    table.insert("object_unaryop", object_unaryop);
    table.insert("object_truthy", |m, t, a| Ok(RtValue::bool(object(m, t, a, 0)?.truthy())));
    table.insert("object_is_none", |m, t, a| Ok(RtValue::bool(object(m, t, a, 0)?.is_none())));
    table.insert("object_to_int", |m, t, a| Ok(RtValue::Int(object(m, t, a, 0)?.to_int()?)));
    table.insert("object_to_float", |m, t, a| Ok(RtValue::Float(object(m, t, a, 0)?.to_float()?)));
    table.insert("object_to_str", |m, t, a| {
        let rendered = object(m, t, a, 0)?.to_string();
        Ok(m.new_str(rendered))
    });
    table.insert("object_len", |m, t, a| Ok(RtValue::Int(object(m, t, a, 0)?.len()?)));
    table.insert("object_getitem", |m, t, a| {
        let item = dynamic_getitem(&object(m, t, a, 0)?, &object(m, t, a, 1)?)?;
        Ok(m.new_object(item))
    });
    table.insert("object_contains", |m, t, a| {
        Ok(RtValue::bool(dynamic_contains(&object(m, t, a, 0)?, &object(m, t, a, 1)?)?))
    });
    table.insert("object_free", |m, t, a| free_handle(m, arg(t, a, 0)?));

    table.insert("list_new", list_new);
    table.insert("list_resize", list_resize);
    table.insert("list_free", list_free);
    table
});

/// Raise `kind(message)` the way a `Throw` expression does.
pub fn raise(exception: &str, message: String) -> Trap {
    match typed_native_runtime::ExceptionKind::from_name(exception) {
        Some(kind) => Trap::Raise(RuntimeError::new(kind, message)),
        None => Trap::Fault(format!("unknown exception class {}", exception)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime_functions as rt;
    use typed_native_runtime::ExceptionKind;

    fn call(memory: &mut Memory, target: &CallTarget, args: &[RtValue]) -> Result<RtValue, Trap> {
        let function = lookup(target).unwrap_or_else(|| panic!("no extern for {}", target.name));
        function(memory, target, args)
    }

    #[test]
    fn test_every_runtime_symbol_resolves() {
        let mut targets = vec![
            rt::str_from_utf8(),
            rt::str_slice(),
            rt::str_split(),
            rt::str_join(),
            rt::str_to_float(),
            rt::math_factorial(),
            rt::range_len(),
            rt::range_count(),
            rt::fsum_total(),
            rt::object_contains(),
            rt::list_resize(rt::str_handle()),
            rt::float_unary_intrinsic("sqrt64"),
            rt::float_binary_intrinsic("atan2_64"),
        ];
        targets.extend(rt::STR_SEARCH_METHODS.iter().map(|m| rt::str_search(m)));
        targets.extend(rt::STR_TRANSFORM_METHODS.iter().map(|m| rt::str_transform(m)));
        targets.extend(rt::STR_PREDICATE_METHODS.iter().map(|m| rt::str_predicate(m)));
        for target in targets {
            assert!(lookup(&target).is_some(), "{} has no implementation", target.name);
        }
        assert!(lookup(&CallTarget::external("no_such_symbol", vec![], crate::native::NativeType::Void, false)).is_none());
    }

    #[test]
    fn test_split_and_join() {
        let mut memory = Memory::new();
        let s = memory.new_str("a,b,,c".to_string());
        let sep = memory.new_str(",".to_string());
        let list = call(&mut memory, &rt::str_split(), &[s.clone(), RtValue::bool(true), sep, RtValue::Int(-1)]).unwrap();
        let parts: Vec<String> = memory
            .list_items(&list)
            .unwrap()
            .iter()
            .map(|h| memory.read_str(h).unwrap())
            .collect();
        assert_eq!(parts, ["a", "b", "", "c"]);

        let dash = memory.new_str("-".to_string());
        let joined = call(&mut memory, &rt::str_join(), &[dash, list]).unwrap();
        assert_eq!(memory.read_str(&joined).unwrap(), "a-b--c");
    }

    #[test]
    fn test_errors_raise_python_exceptions() {
        let mut memory = Memory::new();
        let err = call(&mut memory, &rt::math_factorial(), &[RtValue::Int(-1)]).unwrap_err();
        let Trap::Raise(err) = err else {
            panic!("expected a Python exception");
        };
        assert_eq!(err.kind(), ExceptionKind::ValueError);

        let s = memory.new_str("abc".to_string());
        let sub = memory.new_str("z".to_string());
        let args = [s, sub, RtValue::bool(false), RtValue::Int(0), RtValue::bool(false), RtValue::Int(0)];
        assert_eq!(call(&mut memory, &rt::str_search("find"), &args).unwrap(), RtValue::Int(-1));
        let err = call(&mut memory, &rt::str_search("index"), &args).unwrap_err();
        assert!(matches!(err, Trap::Raise(e) if e.kind() == ExceptionKind::ValueError));
    }

    #[test]
    fn test_fsum_accumulates_exactly() {
        let mut memory = Memory::new();
        let sum = call(&mut memory, &rt::fsum_new(), &[]).unwrap();
        for value in [0.1; 10] {
            call(&mut memory, &rt::fsum_add(), &[sum.clone(), RtValue::Float(value)]).unwrap();
        }
        assert_eq!(call(&mut memory, &rt::fsum_total(), &[sum.clone()]).unwrap(), RtValue::Float(1.0));
        call(&mut memory, &rt::fsum_free(), &[sum]).unwrap();
        assert_eq!(memory.live_heap_allocations(), 0);
    }
}
