//! Call targets for the runtime library
//!
//! Every symbol generated code can call in `typed_native_runtime`, with its
//! native signature. Handles (strings, objects, lists) are passed borrowed
//! and returned owned with a reference count of one.

use crate::native::{CallTarget, NativeType};

// ========== Layouts ==========

/// `{refcount, pointcount, data}*`; a null handle is the empty string.
pub fn str_handle() -> NativeType {
    NativeType::Struct(vec![
        ("refcount".to_string(), NativeType::int64()),
        ("pointcount".to_string(), NativeType::int64()),
        ("data".to_string(), NativeType::uint8().pointer()),
    ])
    .pointer()
}

/// `{refcount, payload}*` holding a dynamically typed value.
pub fn object_handle() -> NativeType {
    NativeType::Struct(vec![
        ("refcount".to_string(), NativeType::int64()),
        ("payload".to_string(), NativeType::uint8().pointer()),
    ])
    .pointer()
}

/// `{refcount, count, reserved, data}*` with `data` pointing at `reserved` elements.
pub fn list_handle(element: NativeType) -> NativeType {
    NativeType::Struct(vec![
        ("refcount".to_string(), NativeType::int64()),
        ("count".to_string(), NativeType::int64()),
        ("reserved".to_string(), NativeType::int64()),
        ("data".to_string(), element.pointer()),
    ])
    .pointer()
}

pub const REFCOUNT_FIELD: usize = 0;
pub const LIST_COUNT_FIELD: usize = 1;
pub const LIST_RESERVED_FIELD: usize = 2;
pub const LIST_DATA_FIELD: usize = 3;

fn i64t() -> NativeType {
    NativeType::int64()
}

fn f64t() -> NativeType {
    NativeType::float64()
}

fn boolt() -> NativeType {
    NativeType::bool()
}

fn strt() -> NativeType {
    str_handle()
}

fn objt() -> NativeType {
    object_handle()
}

fn ext(name: &str, args: Vec<NativeType>, output: NativeType, can_throw: bool) -> CallTarget {
    CallTarget::external(name, args, output, can_throw)
}

// ========== Strings ==========

pub fn str_from_utf8() -> CallTarget {
    ext("str_from_utf8", vec![NativeType::uint8().pointer()], strt(), false)
}

pub fn str_free() -> CallTarget {
    ext("str_free", vec![strt()], NativeType::Void, false)
}

pub fn str_len() -> CallTarget {
    ext("str_len", vec![strt()], i64t(), false)
}

pub fn str_concat() -> CallTarget {
    ext("str_concat", vec![strt(), strt()], strt(), false)
}

pub fn str_repeat() -> CallTarget {
    ext("str_repeat", vec![strt(), i64t()], strt(), true)
}

pub fn str_eq() -> CallTarget {
    ext("str_eq", vec![strt(), strt()], boolt(), false)
}

/// Three-way comparison by code point: -1, 0 or 1.
pub fn str_cmp() -> CallTarget {
    ext("str_cmp", vec![strt(), strt()], i64t(), false)
}

pub fn str_contains() -> CallTarget {
    ext("str_contains", vec![strt(), strt()], boolt(), false)
}

pub fn str_getitem() -> CallTarget {
    ext("str_getitem", vec![strt(), i64t()], strt(), true)
}

/// `(s, has_lower, lower, has_upper, upper)`
pub fn str_slice() -> CallTarget {
    ext(
        "str_slice",
        vec![strt(), boolt(), i64t(), boolt(), i64t()],
        strt(),
        false,
    )
}

/// Methods with the shape `(s, sub, has_start, start, has_end, end) -> int`.
pub const STR_SEARCH_METHODS: &[&str] = &["find", "rfind", "index", "rindex", "count"];

pub fn str_search(method: &str) -> CallTarget {
    let can_throw = method == "index" || method == "rindex";
    ext(
        &format!("str_{}", method),
        vec![strt(), strt(), boolt(), i64t(), boolt(), i64t()],
        i64t(),
        can_throw,
    )
}

/// `(s, prefix, has_start, start, has_end, end) -> bool`
pub fn str_tailmatch(method: &str) -> CallTarget {
    ext(
        &format!("str_{}", method),
        vec![strt(), strt(), boolt(), i64t(), boolt(), i64t()],
        boolt(),
        false,
    )
}

pub fn str_replace() -> CallTarget {
    ext("str_replace", vec![strt(), strt(), strt(), i64t()], strt(), false)
}

/// `(s, has_sep, sep, maxsplit) -> list[str]`
pub fn str_split() -> CallTarget {
    ext(
        "str_split",
        vec![strt(), boolt(), strt(), i64t()],
        list_handle(strt()),
        true,
    )
}

pub fn str_join() -> CallTarget {
    ext("str_join", vec![strt(), list_handle(strt())], strt(), false)
}

/// Strip side codes accepted by `str_strip`.
pub const STRIP_LEFT: i64 = 0;
pub const STRIP_RIGHT: i64 = 1;
pub const STRIP_BOTH: i64 = 2;

/// `(s, has_chars, chars, side)`
pub fn str_strip() -> CallTarget {
    ext("str_strip", vec![strt(), boolt(), strt(), i64t()], strt(), false)
}

/// Case-changing methods, each `(s) -> str`.
pub const STR_TRANSFORM_METHODS: &[&str] =
    &["lower", "upper", "capitalize", "swapcase", "title", "casefold"];

pub fn str_transform(method: &str) -> CallTarget {
    ext(&format!("str_{}", method), vec![strt()], strt(), false)
}

/// Predicate methods, each `(s) -> bool`.
pub const STR_PREDICATE_METHODS: &[&str] = &[
    "isalpha",
    "isdigit",
    "isalnum",
    "isspace",
    "islower",
    "isupper",
    "isdecimal",
    "isnumeric",
    "istitle",
    "isidentifier",
    "isprintable",
];

pub fn str_predicate(method: &str) -> CallTarget {
    ext(&format!("str_{}", method), vec![strt()], boolt(), false)
}

pub fn str_to_int() -> CallTarget {
    ext("str_to_int", vec![strt()], i64t(), true)
}

pub fn str_to_float() -> CallTarget {
    ext("str_to_float", vec![strt()], f64t(), true)
}

pub fn str_from_int() -> CallTarget {
    ext("str_from_int", vec![i64t()], strt(), false)
}

pub fn str_from_float() -> CallTarget {
    ext("str_from_float", vec![f64t()], strt(), false)
}

pub fn str_ord() -> CallTarget {
    ext("str_ord", vec![strt()], i64t(), true)
}

pub fn str_chr() -> CallTarget {
    ext("str_chr", vec![i64t()], strt(), true)
}

// ========== Integers and floats ==========

/// `int64_floordiv`, `int64_mod`, `int64_pow`, `int64_lshift`, `int64_rshift`
pub fn int64_binary(name: &str) -> CallTarget {
    ext(name, vec![i64t(), i64t()], i64t(), true)
}

/// `len(range)`; raises `OverflowError` past `i64::MAX`.
pub fn range_len() -> CallTarget {
    ext("range_len", vec![i64t(), i64t(), i64t()], i64t(), true)
}

/// Items a range iterator produces, saturating.
pub fn range_count() -> CallTarget {
    ext("range_count", vec![i64t(), i64t(), i64t()], i64t(), false)
}

/// `float64_floordiv`, `float64_mod`, `float64_pow`
pub fn float64_binary(name: &str) -> CallTarget {
    ext(name, vec![f64t(), f64t()], f64t(), true)
}

pub fn float64_to_int() -> CallTarget {
    ext("float64_to_int", vec![f64t()], i64t(), true)
}

// ========== math ==========

/// A plain IEEE float function by its runtime table name, e.g. `sqrt64`.
pub fn float_unary_intrinsic(name: &str) -> CallTarget {
    ext(name, vec![f64t()], f64t(), false).intrinsic()
}

pub fn float_binary_intrinsic(name: &str) -> CallTarget {
    ext(name, vec![f64t(), f64t()], f64t(), false).intrinsic()
}

pub fn math_pow() -> CallTarget {
    ext("math_pow", vec![f64t(), f64t()], f64t(), true)
}

pub fn math_factorial() -> CallTarget {
    ext("math_factorial", vec![i64t()], i64t(), true)
}

pub fn math_gcd() -> CallTarget {
    ext("math_gcd", vec![i64t(), i64t()], i64t(), false)
}

/// Opaque accumulator handle for `math.fsum`.
pub fn fsum_handle() -> NativeType {
    NativeType::uint8().pointer()
}

pub fn fsum_new() -> CallTarget {
    ext("fsum_new", vec![], fsum_handle(), false)
}

pub fn fsum_add() -> CallTarget {
    ext("fsum_add", vec![fsum_handle(), f64t()], NativeType::Void, true)
}

pub fn fsum_total() -> CallTarget {
    ext("fsum_total", vec![fsum_handle()], f64t(), true)
}

pub fn fsum_free() -> CallTarget {
    ext("fsum_free", vec![fsum_handle()], NativeType::Void, false)
}

// ========== Objects ==========

pub fn object_from_none() -> CallTarget {
    ext("object_from_none", vec![], objt(), false)
}

pub fn object_from_bool() -> CallTarget {
    ext("object_from_bool", vec![boolt()], objt(), false)
}

pub fn object_from_int() -> CallTarget {
    ext("object_from_int", vec![i64t()], objt(), false)
}

pub fn object_from_float() -> CallTarget {
    ext("object_from_float", vec![f64t()], objt(), false)
}

pub fn object_from_str() -> CallTarget {
    ext("object_from_str", vec![strt()], objt(), false)
}

/// `(op code, lhs, rhs)`; codes are `typed_native_runtime::BinOp::code`.
pub fn object_binop() -> CallTarget {
    ext("object_binop", vec![i64t(), objt(), objt()], objt(), true)
}

pub fn object_unaryop() -> CallTarget {
    ext("object_unaryop", vec![i64t(), objt()], objt(), true)
}

pub fn object_truthy() -> CallTarget {
    ext("object_truthy", vec![objt()], boolt(), false)
}

pub fn object_is_none() -> CallTarget {
    ext("object_is_none", vec![objt()], boolt(), false)
}

pub fn object_to_int() -> CallTarget {
    ext("object_to_int", vec![objt()], i64t(), true)
}

pub fn object_to_float() -> CallTarget {
    ext("object_to_float", vec![objt()], f64t(), true)
}

pub fn object_to_str() -> CallTarget {
    ext("object_to_str", vec![objt()], strt(), false)
}

pub fn object_len() -> CallTarget {
    ext("object_len", vec![objt()], i64t(), true)
}

pub fn object_getitem() -> CallTarget {
    ext("object_getitem", vec![objt(), objt()], objt(), true)
}

pub fn object_contains() -> CallTarget {
    ext("object_contains", vec![objt(), objt()], boolt(), true)
}

pub fn object_free() -> CallTarget {
    ext("object_free", vec![objt()], NativeType::Void, false)
}

// ========== Lists ==========

/// Allocate an empty list with room for `capacity` elements.
pub fn list_new(element: NativeType) -> CallTarget {
    ext("list_new", vec![i64t()], list_handle(element), false)
}

/// Grow the element buffer to `reserved` slots, moving existing elements.
pub fn list_resize(element: NativeType) -> CallTarget {
    ext(
        "list_resize",
        vec![list_handle(element), i64t()],
        NativeType::Void,
        false,
    )
}

/// Release the list header and buffer; elements must already be destroyed.
pub fn list_free(element: NativeType) -> CallTarget {
    ext("list_free", vec![list_handle(element)], NativeType::Void, false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_targets() {
        assert!(str_search("index").can_throw);
        assert!(!str_search("find").can_throw);
        assert_eq!(str_search("rfind").name, "str_rfind");
        assert!(STR_SEARCH_METHODS.iter().all(|m| str_search(m).external));
    }

    #[test]
    fn test_list_layout_fields() {
        let handle = list_handle(NativeType::int64());
        let layout = handle.pointee().cloned().unwrap();
        assert_eq!(layout.field_index("count"), Some(LIST_COUNT_FIELD));
        assert_eq!(layout.field_index("reserved"), Some(LIST_RESERVED_FIELD));
        assert_eq!(layout.field_index("data"), Some(LIST_DATA_FIELD));
    }
}
