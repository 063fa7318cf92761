//! `str` and its iterator
//!
//! Strings are immutable, reference-counted runtime handles with value
//! semantics: equality and ordering compare contents, and every operation
//! producing a string returns a new handle owned by the caller. Operations
//! on two constants are folded when they cannot raise.

use typed_native_runtime::{strings, BinOp, ExceptionKind, Value};

use super::{refcounted, unsupported_bin_op, Wrapper, WrapperRef};
use crate::convert::{arity_error, ExpressionContext};
use crate::driver::CompilationSession;
use crate::native::{NativeBinaryOp, NativeExpr, NativeType};
use crate::runtime_functions::{self as rt, STRIP_BOTH, STRIP_LEFT, STRIP_RIGHT};
use crate::typed_value::{CResult, ConvertResult, TypedValue};
use crate::types::TypeKey;

fn free(handle: NativeExpr) -> NativeExpr {
    rt::str_free().call(vec![handle])
}

fn constant_text(value: &TypedValue) -> Option<&str> {
    match &value.constant {
        Some(Value::Str(s)) => Some(s),
        _ => None,
    }
}

fn int_arg(value: &TypedValue) -> NativeExpr {
    match value.key() {
        TypeKey::Int => value.nonref_expr(),
        _ => value.nonref_expr().cast(NativeType::int64()),
    }
}

fn is_int_like(key: &TypeKey) -> bool {
    matches!(key, TypeKey::Int | TypeKey::Bool)
}

/// An optional integer argument at the native boundary: a presence flag and
/// the value.
struct OptionalInt {
    present: NativeExpr,
    value: NativeExpr,
}

impl OptionalInt {
    fn absent() -> Self {
        Self {
            present: NativeExpr::bool(false),
            value: NativeExpr::int(0),
        }
    }
}

/// `None` (or a missing argument) is absent; anything else must be an int.
fn optional_int(ctx: &mut ExpressionContext<'_, '_>, value: Option<&TypedValue>) -> CResult<Option<OptionalInt>> {
    match value {
        None => Ok(Some(OptionalInt::absent())),
        Some(value) if value.key() == &TypeKey::None => Ok(Some(OptionalInt::absent())),
        Some(value) if is_int_like(value.key()) => Ok(Some(OptionalInt {
            present: NativeExpr::bool(true),
            value: int_arg(value),
        })),
        Some(_) => {
            ctx.push_exception(
                ExceptionKind::TypeError,
                "slice indices must be integers or None or have an __index__ method",
            )?;
            Ok(None)
        }
    }
}

#[derive(Debug)]
pub struct StrWrapper {
    key: TypeKey,
}

impl StrWrapper {
    pub fn new() -> Self {
        Self { key: TypeKey::Str }
    }

    fn owned(&self, ctx: &mut ExpressionContext<'_, '_>, handle: NativeExpr) -> ConvertResult {
        let wrapper = ctx.wrapper(&self.key);
        Ok(Some(ctx.push_owned(&wrapper, handle)?))
    }

    fn require_str(&self, ctx: &mut ExpressionContext<'_, '_>, value: &TypedValue, what: &str) -> CResult<bool> {
        if value.key() == &TypeKey::Str {
            return Ok(true);
        }
        ctx.push_exception(
            ExceptionKind::TypeError,
            &format!("{} must be str, not {}", what, value.wrapper.type_name()),
        )?;
        Ok(false)
    }

    /// `find`, `rfind`, `index`, `rindex`, `count`
    fn search(
        &self,
        ctx: &mut ExpressionContext<'_, '_>,
        value: &TypedValue,
        method: &str,
        args: &[TypedValue],
    ) -> ConvertResult {
        if args.is_empty() || args.len() > 3 {
            return arity_error(ctx, method, "from 1 to 3 positional arguments", args.len());
        }
        if !self.require_str(ctx, &args[0], "substring")? {
            return Ok(None);
        }
        let Some(start) = optional_int(ctx, args.get(1))? else {
            return Ok(None);
        };
        let Some(end) = optional_int(ctx, args.get(2))? else {
            return Ok(None);
        };
        let target = rt::str_search(method);
        let call = target.call(vec![
            value.nonref_expr(),
            args[0].nonref_expr(),
            start.present,
            start.value,
            end.present,
            end.value,
        ]);
        let int = ctx.wrapper(&TypeKey::Int);
        if target.can_throw {
            Ok(Some(ctx.push_pod(&int, call)))
        } else {
            Ok(Some(TypedValue::new(call, int, false)))
        }
    }

    /// `startswith` and `endswith`; the fragment may be a tuple of strings.
    fn tail_match(
        &self,
        ctx: &mut ExpressionContext<'_, '_>,
        value: &TypedValue,
        method: &str,
        args: &[TypedValue],
    ) -> ConvertResult {
        if args.is_empty() || args.len() > 3 {
            return arity_error(ctx, method, "from 1 to 3 positional arguments", args.len());
        }
        let Some(start) = optional_int(ctx, args.get(1))? else {
            return Ok(None);
        };
        let Some(end) = optional_int(ctx, args.get(2))? else {
            return Ok(None);
        };
        let fragment = &args[0];

        let fragments: Vec<TypedValue> = match fragment.key().clone() {
            TypeKey::Str => vec![fragment.clone()],
            TypeKey::Tuple(elements) => {
                let mut items = Vec::with_capacity(elements.len());
                for (i, element) in elements.iter().enumerate() {
                    if element != &TypeKey::Str {
                        return ctx.push_exception(
                            ExceptionKind::TypeError,
                            &format!(
                                "tuple for {} must only contain str, not {}",
                                method,
                                element.python_name()
                            ),
                        );
                    }
                    let index = ctx.constant_int(i as i64);
                    let Some(item) = fragment.convert_getitem(ctx, &index)? else {
                        return Ok(None);
                    };
                    items.push(item);
                }
                items
            }
            other => {
                return ctx.push_exception(
                    ExceptionKind::TypeError,
                    &format!(
                        "{} first arg must be str or a tuple of str, not {}",
                        method,
                        other.python_name()
                    ),
                )
            }
        };

        if ctx.constant_folding() && args.len() == 1 {
            if let Some(text) = constant_text(value) {
                let constants: Option<Vec<&str>> = fragments.iter().map(constant_text).collect();
                if let Some(constants) = constants {
                    let matched = constants.iter().any(|fragment| {
                        if method == "startswith" {
                            strings::startswith(text, fragment, None, None)
                        } else {
                            strings::endswith(text, fragment, None, None)
                        }
                    });
                    return Ok(Some(ctx.constant_bool(matched)));
                }
            }
        }

        let target = rt::str_tailmatch(method);
        let mut result: Option<NativeExpr> = None;
        for item in &fragments {
            let test = target.call(vec![
                value.nonref_expr(),
                item.nonref_expr(),
                start.present.clone(),
                start.value.clone(),
                end.present.clone(),
                end.value.clone(),
            ]);
            result = Some(match result {
                None => test,
                Some(previous) => previous.binop(NativeBinaryOp::BitOr, test),
            });
        }
        match result {
            Some(test) => Ok(Some(ctx.bool_value(test))),
            // an empty tuple matches nothing
            None => Ok(Some(ctx.constant_bool(false))),
        }
    }

    fn strip(
        &self,
        ctx: &mut ExpressionContext<'_, '_>,
        value: &TypedValue,
        method: &str,
        args: &[TypedValue],
    ) -> ConvertResult {
        if args.len() > 1 {
            return arity_error(ctx, method, "at most 1 argument", args.len());
        }
        let side = match method {
            "lstrip" => STRIP_LEFT,
            "rstrip" => STRIP_RIGHT,
            _ => STRIP_BOTH,
        };
        let (present, chars) = match args.first() {
            None => (false, None),
            Some(chars) if chars.key() == &TypeKey::None => (false, None),
            Some(chars) => {
                if chars.key() != &TypeKey::Str {
                    return ctx.push_exception(
                        ExceptionKind::TypeError,
                        &format!("{} arg must be None or str", method),
                    );
                }
                (true, Some(chars.nonref_expr()))
            }
        };
        let chars = chars.unwrap_or_else(|| NativeExpr::null(rt::str_handle()));
        let call = rt::str_strip().call(vec![
            value.nonref_expr(),
            NativeExpr::bool(present),
            chars,
            NativeExpr::int(side),
        ]);
        self.owned(ctx, call)
    }

    fn split(&self, ctx: &mut ExpressionContext<'_, '_>, value: &TypedValue, args: &[TypedValue]) -> ConvertResult {
        if args.len() > 2 {
            return arity_error(ctx, "split", "at most 2 arguments", args.len());
        }
        let (present, sep) = match args.first() {
            None => (false, NativeExpr::null(rt::str_handle())),
            Some(sep) if sep.key() == &TypeKey::None => (false, NativeExpr::null(rt::str_handle())),
            Some(sep) => {
                if !self.require_str(ctx, sep, "separator")? {
                    return Ok(None);
                }
                (true, sep.nonref_expr())
            }
        };
        let maxsplit = match args.get(1) {
            None => NativeExpr::int(-1),
            Some(limit) if is_int_like(limit.key()) => int_arg(limit),
            Some(limit) => {
                return ctx.push_exception(
                    ExceptionKind::TypeError,
                    &format!(
                        "'{}' object cannot be interpreted as an integer",
                        limit.wrapper.type_name()
                    ),
                )
            }
        };
        let call = rt::str_split().call(vec![value.nonref_expr(), NativeExpr::bool(present), sep, maxsplit]);
        let list = ctx.wrapper(&TypeKey::list_of(TypeKey::Str));
        Ok(Some(ctx.push_owned(&list, call)?))
    }

    fn join(&self, ctx: &mut ExpressionContext<'_, '_>, value: &TypedValue, args: &[TypedValue]) -> ConvertResult {
        let [parts] = args else {
            return arity_error(ctx, "join", "exactly one argument", args.len());
        };
        if parts.key() != &TypeKey::list_of(TypeKey::Str) {
            return ctx.push_exception(
                ExceptionKind::TypeError,
                &format!("can only join a list of str, not '{}'", parts.key()),
            );
        }
        let parts = ctx.ensure_reference(parts.clone())?;
        self.owned(ctx, rt::str_join().call(vec![value.nonref_expr(), parts.nonref_expr()]))
    }

    fn replace(&self, ctx: &mut ExpressionContext<'_, '_>, value: &TypedValue, args: &[TypedValue]) -> ConvertResult {
        if args.len() < 2 || args.len() > 3 {
            return arity_error(ctx, "replace", "from 2 to 3 positional arguments", args.len());
        }
        if !self.require_str(ctx, &args[0], "replace() argument 1")?
            || !self.require_str(ctx, &args[1], "replace() argument 2")?
        {
            return Ok(None);
        }
        let count = match args.get(2) {
            None => NativeExpr::int(-1),
            Some(count) if is_int_like(count.key()) => int_arg(count),
            Some(count) => {
                return ctx.push_exception(
                    ExceptionKind::TypeError,
                    &format!(
                        "'{}' object cannot be interpreted as an integer",
                        count.wrapper.type_name()
                    ),
                )
            }
        };
        let call = rt::str_replace().call(vec![
            value.nonref_expr(),
            args[0].nonref_expr(),
            args[1].nonref_expr(),
            count,
        ]);
        self.owned(ctx, call)
    }
}

impl Default for StrWrapper {
    fn default() -> Self {
        Self::new()
    }
}

const METHODS: &[&str] = &[
    "find",
    "rfind",
    "index",
    "rindex",
    "count",
    "startswith",
    "endswith",
    "strip",
    "lstrip",
    "rstrip",
    "split",
    "join",
    "replace",
];

fn is_method(name: &str) -> bool {
    METHODS.contains(&name)
        || rt::STR_TRANSFORM_METHODS.contains(&name)
        || rt::STR_PREDICATE_METHODS.contains(&name)
}

impl Wrapper for StrWrapper {
    fn key(&self) -> &TypeKey {
        &self.key
    }

    fn layout(&self) -> NativeType {
        rt::str_handle()
    }

    fn is_pod(&self) -> bool {
        false
    }

    fn iterated_type(&self) -> Option<TypeKey> {
        Some(TypeKey::Str)
    }

    fn copy_initialize(
        &self,
        _session: &mut CompilationSession,
        target: NativeExpr,
        source: NativeExpr,
    ) -> CResult<NativeExpr> {
        Ok(refcounted::copy_initialize(target, source, &self.layout()))
    }

    fn assign(&self, _session: &mut CompilationSession, target: NativeExpr, source: NativeExpr) -> CResult<NativeExpr> {
        Ok(refcounted::assign(target, source, &self.layout(), free))
    }

    fn destroy(&self, _session: &mut CompilationSession, target: NativeExpr) -> CResult<NativeExpr> {
        Ok(refcounted::destroy(target, &self.layout(), free))
    }

    fn convert_attribute(&self, ctx: &mut ExpressionContext<'_, '_>, value: &TypedValue, attr: &str) -> ConvertResult {
        if !is_method(attr) {
            return ctx.push_exception(
                ExceptionKind::AttributeError,
                &format!("'str' object has no attribute '{}'", attr),
            );
        }
        let bound = ctx.wrapper(&TypeKey::BoundMethod(Box::new(TypeKey::Str), attr.to_string()));
        Ok(Some(value.change_type(bound)))
    }

    fn convert_method_call(
        &self,
        ctx: &mut ExpressionContext<'_, '_>,
        value: &TypedValue,
        method: &str,
        args: &[TypedValue],
    ) -> ConvertResult {
        match method {
            m if rt::STR_SEARCH_METHODS.contains(&m) => self.search(ctx, value, m, args),
            "startswith" | "endswith" => self.tail_match(ctx, value, method, args),
            "strip" | "lstrip" | "rstrip" => self.strip(ctx, value, method, args),
            "split" => self.split(ctx, value, args),
            "join" => self.join(ctx, value, args),
            "replace" => self.replace(ctx, value, args),
            m if rt::STR_TRANSFORM_METHODS.contains(&m) || rt::STR_PREDICATE_METHODS.contains(&m) => {
                if !args.is_empty() {
                    return arity_error(ctx, m, "no arguments", args.len());
                }
                if rt::STR_PREDICATE_METHODS.contains(&m) {
                    let test = rt::str_predicate(m).call(vec![value.nonref_expr()]);
                    Ok(Some(ctx.bool_value(test)))
                } else {
                    self.owned(ctx, rt::str_transform(m).call(vec![value.nonref_expr()]))
                }
            }
            _ => ctx.push_exception(
                ExceptionKind::AttributeError,
                &format!("'str' object has no attribute '{}'", method),
            ),
        }
    }

    fn convert_bin_op(
        &self,
        ctx: &mut ExpressionContext<'_, '_>,
        left: &TypedValue,
        op: BinOp,
        right: &TypedValue,
    ) -> ConvertResult {
        match right.key() {
            TypeKey::Str => {
                let folded = match (constant_text(left), constant_text(right)) {
                    (Some(a), Some(b)) if ctx.constant_folding() => Some((a.to_string(), b.to_string())),
                    _ => None,
                };
                if let Some((a, b)) = folded {
                    match op {
                        BinOp::Add => return Ok(Some(ctx.constant_str(&format!("{}{}", a, b))?)),
                        BinOp::Eq => return Ok(Some(ctx.constant_bool(a == b))),
                        BinOp::NotEq => return Ok(Some(ctx.constant_bool(a != b))),
                        _ => {}
                    }
                }
                let (l, r) = (left.nonref_expr(), right.nonref_expr());
                match op {
                    BinOp::Add => self.owned(ctx, rt::str_concat().call(vec![l, r])),
                    BinOp::Eq => Ok(Some(ctx.bool_value(rt::str_eq().call(vec![l, r])))),
                    BinOp::NotEq => Ok(Some(ctx.bool_value(rt::str_eq().call(vec![l, r]).logical_not()))),
                    BinOp::Lt | BinOp::LtE | BinOp::Gt | BinOp::GtE => {
                        let native = match op {
                            BinOp::Lt => NativeBinaryOp::Lt,
                            BinOp::LtE => NativeBinaryOp::LtE,
                            BinOp::Gt => NativeBinaryOp::Gt,
                            _ => NativeBinaryOp::GtE,
                        };
                        let order = rt::str_cmp().call(vec![l, r]);
                        Ok(Some(ctx.bool_value(order.binop(native, NativeExpr::int(0)))))
                    }
                    _ => unsupported_bin_op(ctx, left, op, right),
                }
            }
            TypeKey::Int | TypeKey::Bool if op == BinOp::Mul => {
                let call = rt::str_repeat().call(vec![left.nonref_expr(), int_arg(right)]);
                self.owned(ctx, call)
            }
            TypeKey::Object => right.wrapper.clone().convert_bin_op_reverse(ctx, right, op, left),
            _ => unsupported_bin_op(ctx, left, op, right),
        }
    }

    fn convert_bin_op_reverse(
        &self,
        ctx: &mut ExpressionContext<'_, '_>,
        right: &TypedValue,
        op: BinOp,
        left: &TypedValue,
    ) -> ConvertResult {
        if op == BinOp::Mul && is_int_like(left.key()) {
            let call = rt::str_repeat().call(vec![right.nonref_expr(), int_arg(left)]);
            return self.owned(ctx, call);
        }
        unsupported_bin_op(ctx, left, op, right)
    }

    fn convert_contains(
        &self,
        ctx: &mut ExpressionContext<'_, '_>,
        container: &TypedValue,
        item: &TypedValue,
    ) -> ConvertResult {
        if item.key() != &TypeKey::Str {
            return ctx.push_exception(
                ExceptionKind::TypeError,
                &format!(
                    "'in <string>' requires string as left operand, not {}",
                    item.wrapper.type_name()
                ),
            );
        }
        if let (Some(s), Some(sub)) = (constant_text(container), constant_text(item)) {
            if ctx.constant_folding() {
                let found = strings::contains(s, sub);
                return Ok(Some(ctx.constant_bool(found)));
            }
        }
        let test = rt::str_contains().call(vec![container.nonref_expr(), item.nonref_expr()]);
        Ok(Some(ctx.bool_value(test)))
    }

    fn convert_getitem(&self, ctx: &mut ExpressionContext<'_, '_>, value: &TypedValue, index: &TypedValue) -> ConvertResult {
        if !is_int_like(index.key()) {
            return ctx.push_exception(
                ExceptionKind::TypeError,
                &format!("string indices must be integers, not '{}'", index.wrapper.type_name()),
            );
        }
        if let (Some(s), Some(i)) = (constant_text(value), index.constant_int()) {
            if ctx.constant_folding() {
                if let Ok(ch) = strings::getitem(s, i) {
                    return Ok(Some(ctx.constant_str(&ch)?));
                }
            }
        }
        self.owned(ctx, rt::str_getitem().call(vec![value.nonref_expr(), int_arg(index)]))
    }

    fn convert_getslice(
        &self,
        ctx: &mut ExpressionContext<'_, '_>,
        value: &TypedValue,
        lower: Option<&TypedValue>,
        upper: Option<&TypedValue>,
    ) -> ConvertResult {
        let Some(low) = optional_int(ctx, lower)? else {
            return Ok(None);
        };
        let Some(high) = optional_int(ctx, upper)? else {
            return Ok(None);
        };
        if let Some(s) = constant_text(value) {
            let bound = |v: Option<&TypedValue>| match v {
                None => Some(None),
                Some(v) if v.key() == &TypeKey::None => Some(None),
                Some(v) => v.constant_int().map(Some),
            };
            if let (Some(lo), Some(hi)) = (bound(lower), bound(upper)) {
                if ctx.constant_folding() {
                    let sliced = strings::slice(s, lo, hi);
                    return Ok(Some(ctx.constant_str(&sliced)?));
                }
            }
        }
        let call = rt::str_slice().call(vec![
            value.nonref_expr(),
            low.present,
            low.value,
            high.present,
            high.value,
        ]);
        self.owned(ctx, call)
    }

    fn convert_len(&self, ctx: &mut ExpressionContext<'_, '_>, value: &TypedValue) -> ConvertResult {
        if let Some(s) = constant_text(value) {
            if ctx.constant_folding() {
                return Ok(Some(ctx.constant_int(strings::char_len(s))));
            }
        }
        Ok(Some(ctx.int_value(rt::str_len().call(vec![value.nonref_expr()]))))
    }

    fn convert_bool_cast(&self, ctx: &mut ExpressionContext<'_, '_>, value: &TypedValue) -> ConvertResult {
        let length = rt::str_len().call(vec![value.nonref_expr()]);
        Ok(Some(ctx.bool_value(length.ne(NativeExpr::int(0)))))
    }

    fn convert_int_cast(&self, ctx: &mut ExpressionContext<'_, '_>, value: &TypedValue) -> ConvertResult {
        let int = ctx.wrapper(&TypeKey::Int);
        Ok(Some(ctx.push_pod(&int, rt::str_to_int().call(vec![value.nonref_expr()]))))
    }

    fn convert_float_cast(&self, ctx: &mut ExpressionContext<'_, '_>, value: &TypedValue) -> ConvertResult {
        let float = ctx.wrapper(&TypeKey::Float);
        Ok(Some(ctx.push_pod(&float, rt::str_to_float().call(vec![value.nonref_expr()]))))
    }

    fn convert_str_cast(&self, _ctx: &mut ExpressionContext<'_, '_>, value: &TypedValue) -> ConvertResult {
        Ok(Some(value.clone()))
    }

    fn convert_iter(&self, ctx: &mut ExpressionContext<'_, '_>, value: &TypedValue) -> ConvertResult {
        let wrapper = ctx.wrapper(&TypeKey::StrIterator);
        let string = value.nonref_expr();
        let layout = self.layout();
        let iterator = ctx.push(&wrapper, |_, slot| {
            Ok(NativeExpr::sequence(vec![
                slot.clone().field(0).store(string),
                refcounted::incref(slot.clone().field(0).load(), &layout),
                slot.field(1).store(NativeExpr::int(-1)),
            ]))
        })?;
        Ok(Some(iterator))
    }

    fn box_to_object(&self, ctx: &mut ExpressionContext<'_, '_>, value: &TypedValue) -> ConvertResult {
        let object = ctx.wrapper(&TypeKey::Object);
        let call = rt::object_from_str().call(vec![value.nonref_expr()]);
        Ok(Some(ctx.push_owned(&object, call)?))
    }
}

/// Iterator over the characters of a string: `{string, index}`.
#[derive(Debug)]
pub struct StrIteratorWrapper {
    key: TypeKey,
    string: WrapperRef,
}

impl StrIteratorWrapper {
    pub fn new(string: WrapperRef) -> Self {
        Self {
            key: TypeKey::StrIterator,
            string,
        }
    }
}

impl Wrapper for StrIteratorWrapper {
    fn key(&self) -> &TypeKey {
        &self.key
    }

    fn layout(&self) -> NativeType {
        NativeType::Struct(vec![
            ("string".to_string(), self.string.layout()),
            ("index".to_string(), NativeType::int64()),
        ])
    }

    fn is_pod(&self) -> bool {
        false
    }

    fn copy_initialize(
        &self,
        _session: &mut CompilationSession,
        target: NativeExpr,
        source: NativeExpr,
    ) -> CResult<NativeExpr> {
        Ok(NativeExpr::sequence(vec![
            target.clone().store(source),
            refcounted::incref(target.field(0).load(), &self.string.layout()),
        ]))
    }

    fn assign(&self, session: &mut CompilationSession, target: NativeExpr, source: NativeExpr) -> CResult<NativeExpr> {
        let stash = NativeExpr::slot(".assign_iter", self.layout());
        Ok(NativeExpr::sequence(vec![
            self.copy_initialize(session, stash.clone(), source)?,
            self.destroy(session, target.clone())?,
            target.store(stash.load()),
        ]))
    }

    fn destroy(&self, session: &mut CompilationSession, target: NativeExpr) -> CResult<NativeExpr> {
        self.string.destroy(session, target.field(0))
    }

    fn convert_iter(&self, _ctx: &mut ExpressionContext<'_, '_>, value: &TypedValue) -> ConvertResult {
        Ok(Some(value.clone()))
    }

    fn convert_next(
        &self,
        ctx: &mut ExpressionContext<'_, '_>,
        iterator: &TypedValue,
    ) -> CResult<Option<(TypedValue, NativeExpr)>> {
        let string = iterator.expr.clone().field(0).load();
        let index = iterator.expr.clone().field(1);
        ctx.push_effect(index.clone().store(index.clone().load().add(NativeExpr::int(1))));
        let more = index.clone().load().lt(rt::str_len().call(vec![string.clone()]));
        let item = rt::str_getitem().call(vec![string, index.load()]);
        Ok(Some((TypedValue::new(item, self.string.clone(), false), more)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_table() {
        assert!(is_method("startswith"));
        assert!(is_method("isidentifier"));
        assert!(is_method("casefold"));
        assert!(!is_method("format"));
    }

    #[test]
    fn test_iterator_layout() {
        let iterator = StrIteratorWrapper::new(std::rc::Rc::new(StrWrapper::new()));
        assert!(!iterator.is_pod());
        assert_eq!(iterator.layout().field_index("index"), Some(1));
    }
}
