//! Lattice operations for local-variable type inference.
//!
//! The lattice is deliberately flat:
//!
//! ```text
//!            Object
//!   /    /    |     \     \
//! int  float  str  list[int] ...
//!   \    \    |     /     /
//!          (untyped)
//! ```
//!
//! Untyped is represented by absence (`Option::None`). Every chain has
//! length at most two, which bounds the number of widenings a variable can
//! go through and therefore the number of inference passes.

use super::TypeKey;

/// Join (⊔): least upper bound of two keys.
///
/// ```text
/// join(int, int)   = int
/// join(int, float) = object
/// join(T, object)  = object
/// ```
pub fn join(a: &TypeKey, b: &TypeKey) -> TypeKey {
    if a == b {
        a.clone()
    } else {
        TypeKey::Object
    }
}

/// Join with the untyped bottom element.
pub fn join_optional(current: Option<&TypeKey>, incoming: &TypeKey) -> TypeKey {
    match current {
        None => incoming.clone(),
        Some(current) => join(current, incoming),
    }
}

/// Whether moving from `old` to `new` is a strict widening.
pub fn widens(old: Option<&TypeKey>, new: &TypeKey) -> bool {
    old != Some(new)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_is_idempotent_and_commutative() {
        let keys = [
            TypeKey::Int,
            TypeKey::Float,
            TypeKey::Str,
            TypeKey::Object,
            TypeKey::list_of(TypeKey::Int),
        ];
        for a in &keys {
            assert_eq!(join(a, a), a.clone());
            for b in &keys {
                assert_eq!(join(a, b), join(b, a));
                assert_eq!(join(&join(a, b), b), join(a, b));
            }
        }
    }

    #[test]
    fn test_chains_are_short() {
        let first = join_optional(None, &TypeKey::Int);
        assert_eq!(first, TypeKey::Int);
        let second = join_optional(Some(&first), &TypeKey::Str);
        assert_eq!(second, TypeKey::Object);
        let third = join_optional(Some(&second), &TypeKey::Float);
        assert!(!widens(Some(&second), &third));
    }
}
