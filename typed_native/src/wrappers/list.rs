//! Homogeneous lists
//!
//! `list[T]` is a reference-counted handle to `{refcount, count, reserved,
//! data}` where `data` holds `reserved` slots of `T`'s layout, the first
//! `count` of them initialized. Elements are owned by the list. Releasing
//! the last reference runs a destructor that is generated once per element
//! type as a native function of its own.

use typed_native_runtime::{BinOp, ExceptionKind};

use super::{refcounted, unsupported_bin_op, Wrapper, WrapperRef};
use crate::convert::{arity_error, ExpressionContext};
use crate::driver::{CompilationIdentity, CompilationSession};
use crate::native::{CallTarget, NativeBinaryOp, NativeExpr, NativeType};
use crate::runtime_functions::{self as rt, LIST_COUNT_FIELD, LIST_DATA_FIELD, LIST_RESERVED_FIELD};
use crate::typed_value::{CResult, ConvertResult, TypedValue};
use crate::types::lattice::join;
use crate::types::TypeKey;

const METHODS: &[&str] = &["append", "extend", "pop", "clear", "index", "count"];

fn count_of(handle: &NativeExpr) -> NativeExpr {
    handle.clone().field(LIST_COUNT_FIELD)
}

fn reserved_of(handle: &NativeExpr) -> NativeExpr {
    handle.clone().field(LIST_RESERVED_FIELD)
}

/// Address of element `index`.
fn slot_at(handle: &NativeExpr, index: NativeExpr) -> NativeExpr {
    handle.clone().field(LIST_DATA_FIELD).load().element_ptr(vec![index])
}

fn element_at(handle: &NativeExpr, element: &WrapperRef, index: NativeExpr) -> TypedValue {
    if element.is_empty() {
        return TypedValue::empty(element.clone());
    }
    TypedValue::new(slot_at(handle, index), element.clone(), true)
}

fn increment(slot: &NativeExpr) -> NativeExpr {
    slot.clone().store(slot.clone().load().add(NativeExpr::int(1)))
}

fn is_index(key: &TypeKey) -> bool {
    matches!(key, TypeKey::Int | TypeKey::Bool)
}

fn as_int(value: &TypedValue) -> NativeExpr {
    match value.key() {
        TypeKey::Int => value.nonref_expr(),
        _ => value.nonref_expr().cast(NativeType::int64()),
    }
}

/// Allocate an empty list with room for `capacity` elements.
fn new_list(ctx: &mut ExpressionContext<'_, '_>, element: &TypeKey, capacity: NativeExpr) -> CResult<TypedValue> {
    let key = TypeKey::list_of(element.clone());
    let wrapper = ctx.wrapper(&key);
    let element_layout = ctx.wrapper(element).layout();
    ctx.push_owned(&wrapper, rt::list_new(element_layout).call(vec![capacity]))
}

/// Append a copy of `value` to `list`, growing the buffer when it is full.
/// Returns false if control does not continue.
fn push_back(
    ctx: &mut ExpressionContext<'_, '_>,
    list: &TypedValue,
    element: &WrapperRef,
    value: &TypedValue,
) -> CResult<bool> {
    let Some(value) = value.convert_to_type(ctx, element)? else {
        return Ok(false);
    };
    let value = if value.is_pod() {
        value
    } else {
        ctx.ensure_reference(value)?
    };
    let handle = list.nonref_expr();
    let count = count_of(&handle);
    let reserved = reserved_of(&handle);
    let grow = rt::list_resize(element.layout()).call(vec![
        handle.clone(),
        reserved
            .clone()
            .load()
            .binop(NativeBinaryOp::Mul, NativeExpr::int(2))
            .add(NativeExpr::int(4)),
    ]);
    ctx.push_effect(NativeExpr::when(count.clone().load().eq(reserved.load()), grow));
    let init = element.copy_initialize(ctx.session(), slot_at(&handle, count.clone().load()), value.nonref_expr())?;
    ctx.push_effect(init);
    ctx.push_effect(increment(&count));
    Ok(true)
}

/// Append every element of the list `source` to `target`.
fn extend_from(
    ctx: &mut ExpressionContext<'_, '_>,
    target: &TypedValue,
    element: &WrapperRef,
    source: &TypedValue,
    source_element: &WrapperRef,
) -> CResult<()> {
    let source_handle = source.nonref_expr();
    // the length is read once so that `xs.extend(xs)` terminates
    let int = ctx.wrapper(&TypeKey::Int);
    let length = ctx.push_pod(&int, count_of(&source_handle).load()).nonref_expr();
    let index = ctx.push_pod(&int, NativeExpr::int(0)).expr;
    ctx.while_loop(
        |_| Ok(index.clone().load().lt(length)),
        |ctx| {
            let item = element_at(&source_handle, source_element, index.clone().load());
            if push_back(ctx, target, element, &item)? {
                ctx.push_effect(increment(&index));
            }
            Ok(())
        },
    )
}

/// Normalize a possibly negative index and raise `IndexError` when it is
/// out of range. Evaluates to the position.
fn checked_index(
    ctx: &mut ExpressionContext<'_, '_>,
    handle: &NativeExpr,
    index: &TypedValue,
    message: &str,
) -> NativeExpr {
    let int = ctx.wrapper(&TypeKey::Int);
    let raw = as_int(index);
    let count = count_of(handle).load();
    let position = ctx
        .push_pod(
            &int,
            NativeExpr::branch(raw.clone().lt(NativeExpr::int(0)), raw.clone().add(count.clone()), raw),
        )
        .nonref_expr();
    ctx.raise_if(
        position
            .clone()
            .lt(NativeExpr::int(0))
            .binop(NativeBinaryOp::BitOr, position.clone().ge(count)),
        ExceptionKind::IndexError,
        message,
    );
    position
}

/// `[a, b, ...]`. The element type is the join of the element types; an
/// empty literal is a `list[object]`.
pub(crate) fn build_list(ctx: &mut ExpressionContext<'_, '_>, values: &[TypedValue]) -> ConvertResult {
    let element_key = values
        .iter()
        .map(|value| value.key().clone())
        .reduce(|a, b| join(&a, &b))
        .unwrap_or(TypeKey::Object);
    let element = ctx.wrapper(&element_key);
    let list = new_list(ctx, &element_key, NativeExpr::int(values.len() as i64))?;
    for value in values {
        if !push_back(ctx, &list, &element, value)? {
            return Ok(None);
        }
    }
    Ok(Some(list))
}

/// `list()` and `list(iterable)`.
pub(super) fn construct(ctx: &mut ExpressionContext<'_, '_>, args: &[TypedValue]) -> ConvertResult {
    match args {
        [] => Ok(Some(new_list(ctx, &TypeKey::Object, NativeExpr::int(0))?)),
        [iterable] => {
            let element_key = iterable.wrapper.iterated_type().unwrap_or(TypeKey::Object);
            let element = ctx.wrapper(&element_key);
            let list = new_list(ctx, &element_key, NativeExpr::int(0))?;
            let iterated = ctx.for_each(iterable, |ctx, item| {
                push_back(ctx, &list, &element, &item)?;
                Ok(())
            })?;
            Ok(iterated.then_some(list))
        }
        _ => ctx.push_exception(
            ExceptionKind::TypeError,
            &format!("list expected at most 1 argument, got {}", args.len()),
        ),
    }
}

/// `item in container` for any iterable, by comparing every element.
pub(super) fn contains_by_iteration(
    ctx: &mut ExpressionContext<'_, '_>,
    container: &TypedValue,
    item: &TypedValue,
) -> ConvertResult {
    let bool_wrapper = ctx.wrapper(&TypeKey::Bool);
    let found = ctx.push_pod(&bool_wrapper, NativeExpr::bool(false));
    let flag = found.expr.clone();
    let iterated = ctx.for_each(container, |ctx, element| {
        let Some(same) = element.eq(ctx, item)? else {
            return Ok(());
        };
        let Some(truth) = same.convert_bool_cast(ctx)? else {
            return Ok(());
        };
        ctx.push_effect(NativeExpr::when(truth.nonref_expr(), flag.clone().store(NativeExpr::bool(true))));
        Ok(())
    })?;
    Ok(iterated.then_some(found))
}

#[derive(Debug)]
pub struct ListWrapper {
    key: TypeKey,
    element: WrapperRef,
}

impl ListWrapper {
    pub fn new(element: WrapperRef) -> Self {
        Self {
            key: TypeKey::list_of(element.key().clone()),
            element,
        }
    }

    /// The native function releasing a list whose count dropped to zero.
    fn destructor(&self, session: &mut CompilationSession) -> CResult<CallTarget> {
        let layout = self.layout();
        let element = self.element.clone();
        let free = rt::list_free(element.layout());
        if element.is_pod() {
            return Ok(free);
        }
        session.define_native_function(
            CompilationIdentity::Native("list_destroy".to_string(), vec![self.key.clone()]),
            "list_destroy",
            vec![("a.list".to_string(), layout)],
            NativeType::Void,
            move |session, _target| {
                let handle = NativeExpr::variable("a.list");
                let index = NativeExpr::slot(".i", NativeType::int64());
                let destroy = element.destroy(session, slot_at(&handle, index.clone().load()))?;
                Ok(NativeExpr::sequence(vec![
                    index.clone().store(NativeExpr::int(0)),
                    NativeExpr::while_loop(
                        index.clone().load().lt(count_of(&handle).load()),
                        NativeExpr::sequence(vec![destroy, increment(&index)]),
                        NativeExpr::void(),
                    ),
                    free.call(vec![handle]),
                    NativeExpr::ret(None),
                ]))
            },
        )
    }

    fn same_list_type(&self, ctx: &mut ExpressionContext<'_, '_>, value: &TypedValue, method: &str) -> CResult<bool> {
        if value.key() == &self.key {
            return Ok(true);
        }
        ctx.push_exception(
            ExceptionKind::TypeError,
            &format!(
                "{}() argument must be a '{}', not '{}'",
                method,
                self.key,
                value.key()
            ),
        )?;
        Ok(false)
    }

    fn pop(&self, ctx: &mut ExpressionContext<'_, '_>, list: &TypedValue, args: &[TypedValue]) -> ConvertResult {
        let handle = list.nonref_expr();
        let count = count_of(&handle);
        let position = match args {
            [] => {
                ctx.raise_if(
                    count.clone().load().eq(NativeExpr::int(0)),
                    ExceptionKind::IndexError,
                    "pop from empty list",
                );
                count.clone().load().sub(NativeExpr::int(1))
            }
            [index] if is_index(index.key()) => {
                ctx.raise_if(
                    count.clone().load().eq(NativeExpr::int(0)),
                    ExceptionKind::IndexError,
                    "pop from empty list",
                );
                checked_index(ctx, &handle, index, "pop index out of range")
            }
            [index] => {
                return ctx.push_exception(
                    ExceptionKind::TypeError,
                    &format!(
                        "'{}' object cannot be interpreted as an integer",
                        index.wrapper.type_name()
                    ),
                )
            }
            _ => return arity_error(ctx, "pop", "at most 1 argument", args.len()),
        };
        let int = ctx.wrapper(&TypeKey::Int);
        let position = ctx.push_pod(&int, position).nonref_expr();

        // move the element out; the list no longer owns it
        let element = self.element.clone();
        let item = if element.is_empty() {
            TypedValue::empty(element.clone())
        } else if element.is_pod() {
            ctx.push_pod(&element, slot_at(&handle, position.clone()).load())
        } else {
            ctx.push_owned(&element, slot_at(&handle, position.clone()).load())?
        };

        let cursor = ctx.push_pod(&int, position).expr;
        let last = count.clone().load().sub(NativeExpr::int(1));
        ctx.while_loop(
            |_| Ok(cursor.clone().load().lt(last)),
            |ctx| {
                let next = cursor.clone().load().add(NativeExpr::int(1));
                if !element.is_empty() {
                    ctx.push_effect(slot_at(&handle, cursor.clone().load()).store(slot_at(&handle, next).load()));
                }
                ctx.push_effect(increment(&cursor));
                Ok(())
            },
        )?;
        ctx.push_effect(count.clone().store(count.load().sub(NativeExpr::int(1))));
        Ok(Some(item))
    }

    fn clear(&self, ctx: &mut ExpressionContext<'_, '_>, list: &TypedValue) -> ConvertResult {
        let handle = list.nonref_expr();
        let count = count_of(&handle);
        if !self.element.is_pod() {
            let int = ctx.wrapper(&TypeKey::Int);
            let index = ctx.push_pod(&int, NativeExpr::int(0)).expr;
            let element = self.element.clone();
            let end = count.clone().load();
            ctx.while_loop(
                |_| Ok(index.clone().load().lt(end)),
                |ctx| {
                    let destroy = element.destroy(ctx.session(), slot_at(&handle, index.clone().load()))?;
                    ctx.push_effect(destroy);
                    ctx.push_effect(increment(&index));
                    Ok(())
                },
            )?;
        }
        ctx.push_effect(count.store(NativeExpr::int(0)));
        Ok(Some(ctx.none_value()))
    }

    /// `index` and `count`: one pass comparing every element with `item`.
    fn search(&self, ctx: &mut ExpressionContext<'_, '_>, list: &TypedValue, method: &str, item: &TypedValue) -> ConvertResult {
        let handle = list.nonref_expr();
        let int = ctx.wrapper(&TypeKey::Int);
        let index = ctx.push_pod(&int, NativeExpr::int(0)).expr;
        let initial = if method == "index" { -1 } else { 0 };
        let result = ctx.push_pod(&int, NativeExpr::int(initial));
        let result_slot = result.expr.clone();
        let element = self.element.clone();
        let find_first = method == "index";
        ctx.while_loop(
            |_| {
                let more = index.clone().load().lt(count_of(&handle).load());
                Ok(if find_first {
                    more.binop(
                        NativeBinaryOp::BitAnd,
                        result_slot.clone().load().eq(NativeExpr::int(-1)),
                    )
                } else {
                    more
                })
            },
            |ctx| {
                let candidate = element_at(&handle, &element, index.clone().load());
                let Some(same) = candidate.eq(ctx, item)? else {
                    return Ok(());
                };
                let Some(truth) = same.convert_bool_cast(ctx)? else {
                    return Ok(());
                };
                let hit = if find_first {
                    result_slot.clone().store(index.clone().load())
                } else {
                    increment(&result_slot)
                };
                ctx.push_effect(NativeExpr::when(truth.nonref_expr(), hit));
                ctx.push_effect(increment(&index));
                Ok(())
            },
        )?;
        if find_first {
            ctx.raise_if(
                result.nonref_expr().eq(NativeExpr::int(-1)),
                ExceptionKind::ValueError,
                "list.index(x): x not in list",
            );
        }
        Ok(Some(result))
    }

    fn concat(&self, ctx: &mut ExpressionContext<'_, '_>, left: &TypedValue, right: &TypedValue) -> ConvertResult {
        let capacity = count_of(&left.nonref_expr())
            .load()
            .add(count_of(&right.nonref_expr()).load());
        let list = new_list(ctx, self.element.key(), capacity)?;
        extend_from(ctx, &list, &self.element, left, &self.element)?;
        extend_from(ctx, &list, &self.element, right, &self.element)?;
        Ok(Some(list))
    }

    fn equal(&self, ctx: &mut ExpressionContext<'_, '_>, left: &TypedValue, right: &TypedValue) -> CResult<TypedValue> {
        let right_element = match right.key() {
            TypeKey::ListOf(element) => ctx.wrapper(element),
            _ => ctx.wrapper(&TypeKey::Object),
        };
        let (a, b) = (left.nonref_expr(), right.nonref_expr());
        let bool_wrapper = ctx.wrapper(&TypeKey::Bool);
        let int = ctx.wrapper(&TypeKey::Int);
        let same = ctx.push_pod(&bool_wrapper, count_of(&a).load().eq(count_of(&b).load()));
        let flag = same.expr.clone();
        let index = ctx.push_pod(&int, NativeExpr::int(0)).expr;
        let element = self.element.clone();
        ctx.while_loop(
            |_| {
                Ok(flag
                    .clone()
                    .load()
                    .binop(NativeBinaryOp::BitAnd, index.clone().load().lt(count_of(&a).load())))
            },
            |ctx| {
                let x = element_at(&a, &element, index.clone().load());
                let y = element_at(&b, &right_element, index.clone().load());
                let Some(eq) = x.eq(ctx, &y)? else {
                    return Ok(());
                };
                let Some(truth) = eq.convert_bool_cast(ctx)? else {
                    return Ok(());
                };
                ctx.push_effect(flag.clone().store(truth.nonref_expr()));
                ctx.push_effect(increment(&index));
                Ok(())
            },
        )?;
        Ok(same)
    }
}

impl Wrapper for ListWrapper {
    fn key(&self) -> &TypeKey {
        &self.key
    }

    fn layout(&self) -> NativeType {
        rt::list_handle(self.element.layout())
    }

    fn is_pod(&self) -> bool {
        false
    }

    fn iterated_type(&self) -> Option<TypeKey> {
        Some(self.element.key().clone())
    }

    fn copy_initialize(
        &self,
        _session: &mut CompilationSession,
        target: NativeExpr,
        source: NativeExpr,
    ) -> CResult<NativeExpr> {
        Ok(refcounted::copy_initialize(target, source, &self.layout()))
    }

    fn assign(&self, session: &mut CompilationSession, target: NativeExpr, source: NativeExpr) -> CResult<NativeExpr> {
        let destructor = self.destructor(session)?;
        Ok(refcounted::assign(target, source, &self.layout(), |handle| {
            destructor.call(vec![handle])
        }))
    }

    fn destroy(&self, session: &mut CompilationSession, target: NativeExpr) -> CResult<NativeExpr> {
        let destructor = self.destructor(session)?;
        Ok(refcounted::destroy(target, &self.layout(), |handle| {
            destructor.call(vec![handle])
        }))
    }

    fn convert_attribute(&self, ctx: &mut ExpressionContext<'_, '_>, value: &TypedValue, attr: &str) -> ConvertResult {
        if !METHODS.contains(&attr) {
            return ctx.push_exception(
                ExceptionKind::AttributeError,
                &format!("'list' object has no attribute '{}'", attr),
            );
        }
        let bound = ctx.wrapper(&TypeKey::BoundMethod(Box::new(self.key.clone()), attr.to_string()));
        Ok(Some(value.change_type(bound)))
    }

    fn convert_method_call(
        &self,
        ctx: &mut ExpressionContext<'_, '_>,
        value: &TypedValue,
        method: &str,
        args: &[TypedValue],
    ) -> ConvertResult {
        let list = ctx.ensure_reference(value.clone())?;
        match (method, args) {
            ("append", [item]) => {
                let element = self.element.clone();
                if !push_back(ctx, &list, &element, item)? {
                    return Ok(None);
                }
                Ok(Some(ctx.none_value()))
            }
            ("append", _) => arity_error(ctx, "append", "exactly one argument", args.len()),
            ("extend", [other]) => {
                if !self.same_list_type(ctx, other, "extend")? {
                    return Ok(None);
                }
                let other = ctx.ensure_reference(other.clone())?;
                extend_from(ctx, &list, &self.element, &other, &self.element)?;
                Ok(Some(ctx.none_value()))
            }
            ("extend", _) => arity_error(ctx, "extend", "exactly one argument", args.len()),
            ("pop", _) => self.pop(ctx, &list, args),
            ("clear", []) => self.clear(ctx, &list),
            ("clear", _) => arity_error(ctx, "clear", "no arguments", args.len()),
            ("index" | "count", [item]) => self.search(ctx, &list, method, item),
            ("index" | "count", _) => arity_error(ctx, method, "exactly one argument", args.len()),
            _ => ctx.push_exception(
                ExceptionKind::AttributeError,
                &format!("'list' object has no attribute '{}'", method),
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
        if !matches!(right.key(), TypeKey::ListOf(_)) {
            return unsupported_bin_op(ctx, left, op, right);
        }
        let a = ctx.ensure_reference(left.clone())?;
        let b = ctx.ensure_reference(right.clone())?;
        match op {
            BinOp::Add if right.key() == &self.key => self.concat(ctx, &a, &b),
            BinOp::Eq => Ok(Some(self.equal(ctx, &a, &b)?)),
            BinOp::NotEq => {
                let same = self.equal(ctx, &a, &b)?;
                Ok(Some(ctx.bool_value(same.nonref_expr().logical_not())))
            }
            _ => unsupported_bin_op(ctx, left, op, right),
        }
    }

    fn convert_getitem(&self, ctx: &mut ExpressionContext<'_, '_>, value: &TypedValue, index: &TypedValue) -> ConvertResult {
        if !is_index(index.key()) {
            return ctx.push_exception(
                ExceptionKind::TypeError,
                &format!(
                    "list indices must be integers or slices, not {}",
                    index.wrapper.type_name()
                ),
            );
        }
        let list = ctx.ensure_reference(value.clone())?;
        let handle = list.nonref_expr();
        let position = checked_index(ctx, &handle, index, "list index out of range");
        let item = element_at(&handle, &self.element, position);
        if item.is_empty() {
            return Ok(Some(item));
        }
        // copied out so the result survives later mutation of the list
        Ok(Some(ctx.push_copy(&item)?))
    }

    fn convert_setitem(
        &self,
        ctx: &mut ExpressionContext<'_, '_>,
        value: &TypedValue,
        index: &TypedValue,
        item: &TypedValue,
    ) -> ConvertResult {
        if !is_index(index.key()) {
            return ctx.push_exception(
                ExceptionKind::TypeError,
                &format!(
                    "list indices must be integers or slices, not {}",
                    index.wrapper.type_name()
                ),
            );
        }
        let Some(item) = item.convert_to_type(ctx, &self.element)? else {
            return Ok(None);
        };
        let item = if item.is_pod() {
            item
        } else {
            ctx.ensure_reference(item)?
        };
        let list = ctx.ensure_reference(value.clone())?;
        let handle = list.nonref_expr();
        let position = checked_index(ctx, &handle, index, "list assignment index out of range");
        if !self.element.is_empty() {
            let assign = self
                .element
                .assign(ctx.session(), slot_at(&handle, position), item.nonref_expr())?;
            ctx.push_effect(assign);
        }
        Ok(Some(ctx.none_value()))
    }

    fn convert_len(&self, ctx: &mut ExpressionContext<'_, '_>, value: &TypedValue) -> ConvertResult {
        let list = ctx.ensure_reference(value.clone())?;
        let int = ctx.wrapper(&TypeKey::Int);
        Ok(Some(ctx.push_pod(&int, count_of(&list.nonref_expr()).load())))
    }

    fn convert_bool_cast(&self, ctx: &mut ExpressionContext<'_, '_>, value: &TypedValue) -> ConvertResult {
        let list = ctx.ensure_reference(value.clone())?;
        let count = count_of(&list.nonref_expr()).load();
        Ok(Some(ctx.bool_value(count.ne(NativeExpr::int(0)))))
    }

    fn convert_contains(
        &self,
        ctx: &mut ExpressionContext<'_, '_>,
        container: &TypedValue,
        item: &TypedValue,
    ) -> ConvertResult {
        contains_by_iteration(ctx, container, item)
    }

    fn convert_iter(&self, ctx: &mut ExpressionContext<'_, '_>, value: &TypedValue) -> ConvertResult {
        let list = ctx.ensure_reference(value.clone())?;
        let handle = list.nonref_expr();
        let layout = self.layout();
        let wrapper = ctx.wrapper(&TypeKey::ListIterator(Box::new(self.element.key().clone())));
        let iterator = ctx.push(&wrapper, |_, slot| {
            Ok(NativeExpr::sequence(vec![
                slot.clone().field(0).store(handle),
                refcounted::incref(slot.clone().field(0).load(), &layout),
                slot.field(1).store(NativeExpr::int(-1)),
            ]))
        })?;
        Ok(Some(iterator))
    }
}

/// `{list, index}`
#[derive(Debug)]
pub struct ListIteratorWrapper {
    key: TypeKey,
    list: WrapperRef,
    element: WrapperRef,
}

impl ListIteratorWrapper {
    pub fn new(list: WrapperRef, element: WrapperRef) -> Self {
        Self {
            key: TypeKey::ListIterator(Box::new(element.key().clone())),
            list,
            element,
        }
    }
}

impl Wrapper for ListIteratorWrapper {
    fn key(&self) -> &TypeKey {
        &self.key
    }

    fn layout(&self) -> NativeType {
        NativeType::Struct(vec![
            ("list".to_string(), self.list.layout()),
            ("index".to_string(), NativeType::int64()),
        ])
    }

    fn is_pod(&self) -> bool {
        false
    }

    fn iterated_type(&self) -> Option<TypeKey> {
        Some(self.element.key().clone())
    }

    fn copy_initialize(
        &self,
        _session: &mut CompilationSession,
        target: NativeExpr,
        source: NativeExpr,
    ) -> CResult<NativeExpr> {
        Ok(NativeExpr::sequence(vec![
            target.clone().store(source),
            refcounted::incref(target.field(0).load(), &self.list.layout()),
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
        self.list.destroy(session, target.field(0))
    }

    fn convert_iter(&self, _ctx: &mut ExpressionContext<'_, '_>, value: &TypedValue) -> ConvertResult {
        Ok(Some(value.clone()))
    }

    fn convert_next(
        &self,
        ctx: &mut ExpressionContext<'_, '_>,
        iterator: &TypedValue,
    ) -> CResult<Option<(TypedValue, NativeExpr)>> {
        let handle = iterator.expr.clone().field(0).load();
        let index = iterator.expr.clone().field(1);
        ctx.push_effect(increment(&index));
        let more = index.clone().load().lt(count_of(&handle).load());
        Ok(Some((element_at(&handle, &self.element, index.load()), more)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wrappers::TypeRegistry;

    #[test]
    fn test_list_of_str_layout() {
        let mut registry = TypeRegistry::new();
        let list = registry.get(&TypeKey::list_of(TypeKey::Str));
        assert!(!list.is_pod());
        assert_eq!(list.iterated_type(), Some(TypeKey::Str));
        let element = registry.get(&TypeKey::Str).layout();
        assert_eq!(list.layout(), rt::list_handle(element));
    }

    #[test]
    fn test_iterator_key_tracks_element() {
        let mut registry = TypeRegistry::new();
        let iterator = registry.get(&TypeKey::ListIterator(Box::new(TypeKey::Int)));
        assert_eq!(iterator.key().to_string(), "list_iterator[int]");
        assert_eq!(iterator.iterated_type(), Some(TypeKey::Int));
    }
}
