//! Shared lifecycle code for reference-counted handles.
//!
//! A handle is a pointer to a struct whose first field is the reference
//! count. A null handle is a valid zero value and is never dereferenced.

use crate::native::{NativeExpr, NativeType};
use crate::runtime_functions::REFCOUNT_FIELD;

fn refcount(handle: NativeExpr) -> NativeExpr {
    handle.field(REFCOUNT_FIELD)
}

fn not_null(handle: NativeExpr, layout: &NativeType) -> NativeExpr {
    handle.ne(NativeExpr::null(layout.clone()))
}

pub(crate) fn incref(handle: NativeExpr, layout: &NativeType) -> NativeExpr {
    let count = refcount(handle.clone());
    NativeExpr::when(
        not_null(handle, layout),
        count.clone().store(count.load().add(NativeExpr::int(1))),
    )
}

/// Drop the reference stored at `target`, running `finalize` on the handle
/// when the count reaches zero.
pub(crate) fn destroy<F>(target: NativeExpr, layout: &NativeType, finalize: F) -> NativeExpr
where
    F: FnOnce(NativeExpr) -> NativeExpr,
{
    let handle = target.load();
    let count = refcount(handle.clone());
    NativeExpr::when(
        not_null(handle.clone(), layout),
        NativeExpr::sequence(vec![
            count.clone().store(count.clone().load().sub(NativeExpr::int(1))),
            NativeExpr::when(count.load().eq(NativeExpr::int(0)), finalize(handle)),
        ]),
    )
}

pub(crate) fn copy_initialize(target: NativeExpr, source: NativeExpr, layout: &NativeType) -> NativeExpr {
    NativeExpr::sequence(vec![target.clone().store(source), incref(target.load(), layout)])
}

/// Take the new reference before dropping the old one so that assigning a
/// handle to itself is safe.
pub(crate) fn assign<F>(target: NativeExpr, source: NativeExpr, layout: &NativeType, finalize: F) -> NativeExpr
where
    F: FnOnce(NativeExpr) -> NativeExpr,
{
    let stash = NativeExpr::slot(".assign", layout.clone());
    NativeExpr::sequence(vec![
        stash.clone().store(source),
        incref(stash.clone().load(), layout),
        destroy(target.clone(), layout, finalize),
        target.store(stash.load()),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime_functions::{str_free, str_handle};

    #[test]
    fn test_destroy_guards_null() {
        let layout = str_handle();
        let code = destroy(NativeExpr::variable("p"), &layout, |h| str_free().call(vec![h]));
        let NativeExpr::Branch { cond, .. } = &code else {
            panic!("expected a null check, got {:?}", code);
        };
        assert_eq!(
            **cond,
            NativeExpr::variable("p").load().ne(NativeExpr::null(layout))
        );
    }
}
