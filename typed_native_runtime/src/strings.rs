//! String algorithms with Python `str` semantics
//!
//! Strings are indexed by code point, never by byte. Index arguments follow
//! Python's clamping rules: negative indices count from the end and
//! out-of-range slice bounds are clipped rather than rejected.

// SAFETY: every i64→usize cast below happens after clamping to 0..=len.
#![allow(clippy::cast_sign_loss)]

use std::cmp::Ordering;

use crate::error::{RuntimeError, RuntimeResult};

/// Number of code points in `s`.
pub fn char_len(s: &str) -> i64 {
    s.chars().count() as i64
}

/// Byte offset of the code point at `index`, or `s.len()` past the end.
fn byte_offset(s: &str, index: usize) -> usize {
    s.char_indices()
        .nth(index)
        .map(|(offset, _)| offset)
        .unwrap_or(s.len())
}

/// Substring between two code-point positions already clamped to `0..=len`.
fn substring(s: &str, start: usize, stop: usize) -> &str {
    if stop <= start {
        return "";
    }
    let begin = byte_offset(s, start);
    let end = begin + byte_offset(&s[begin..], stop - start);
    &s[begin..end]
}

/// Resolve slice bounds the way `s[start:stop]` does.
pub fn slice_bounds(len: i64, start: Option<i64>, stop: Option<i64>) -> (i64, i64) {
    let clamp = |value: i64| -> i64 {
        if value < 0 {
            (value + len).max(0)
        } else {
            value.min(len)
        }
    };
    let start = start.map(clamp).unwrap_or(0);
    let stop = stop.map(clamp).unwrap_or(len);
    (start, stop.max(start))
}

/// Resolve `start`/`end` arguments of the search methods.
///
/// Unlike slicing, `start` is not clipped to the length, so a start past the
/// end makes every search fail.
fn adjust_indices(len: i64, start: Option<i64>, end: Option<i64>) -> (i64, i64) {
    let mut end = end.unwrap_or(len);
    if end > len {
        end = len;
    } else if end < 0 {
        end = (end + len).max(0);
    }
    let mut start = start.unwrap_or(0);
    if start < 0 {
        start = (start + len).max(0);
    }
    (start, end)
}

/// `s[start:stop]`
pub fn slice(s: &str, start: Option<i64>, stop: Option<i64>) -> String {
    let (start, stop) = slice_bounds(char_len(s), start, stop);
    substring(s, start as usize, stop as usize).to_string()
}

/// `s[index]`, a one-character string.
pub fn getitem(s: &str, index: i64) -> RuntimeResult<String> {
    let len = char_len(s);
    let resolved = if index < 0 { index + len } else { index };
    if resolved < 0 || resolved >= len {
        return Err(RuntimeError::index_error("string index out of range"));
    }
    Ok(s.chars()
        .nth(resolved as usize)
        .map(String::from)
        .unwrap_or_default())
}

/// `s.find(sub, start, end)`
pub fn find(s: &str, sub: &str, start: Option<i64>, end: Option<i64>) -> i64 {
    let (start, end) = adjust_indices(char_len(s), start, end);
    let sub_len = char_len(sub);
    if end - start < sub_len {
        return -1;
    }
    let window = substring(s, start as usize, end as usize);
    match window.find(sub) {
        Some(byte) => start + char_len(&window[..byte]),
        None => -1,
    }
}

/// `s.rfind(sub, start, end)`
pub fn rfind(s: &str, sub: &str, start: Option<i64>, end: Option<i64>) -> i64 {
    let (start, end) = adjust_indices(char_len(s), start, end);
    let sub_len = char_len(sub);
    if end - start < sub_len {
        return -1;
    }
    let window = substring(s, start as usize, end as usize);
    match window.rfind(sub) {
        Some(byte) => start + char_len(&window[..byte]),
        None => -1,
    }
}

/// `s.index(sub, start, end)`
pub fn index(s: &str, sub: &str, start: Option<i64>, end: Option<i64>) -> RuntimeResult<i64> {
    match find(s, sub, start, end) {
        -1 => Err(RuntimeError::value_error("substring not found")),
        found => Ok(found),
    }
}

/// `s.rindex(sub, start, end)`
pub fn rindex(s: &str, sub: &str, start: Option<i64>, end: Option<i64>) -> RuntimeResult<i64> {
    match rfind(s, sub, start, end) {
        -1 => Err(RuntimeError::value_error("substring not found")),
        found => Ok(found),
    }
}

/// `s.count(sub, start, end)`
pub fn count(s: &str, sub: &str, start: Option<i64>, end: Option<i64>) -> i64 {
    let (start, end) = adjust_indices(char_len(s), start, end);
    if end - start < char_len(sub) {
        return 0;
    }
    let window = substring(s, start as usize, end as usize);
    if sub.is_empty() {
        return char_len(window) + 1;
    }
    window.matches(sub).count() as i64
}

/// `sub in s`
pub fn contains(s: &str, sub: &str) -> bool {
    s.contains(sub)
}

/// `s.replace(old, new, count)`; a negative count replaces every occurrence.
pub fn replace(s: &str, old: &str, new: &str, count: i64) -> String {
    if count < 0 {
        s.replace(old, new)
    } else {
        s.replacen(old, new, count as usize)
    }
}

fn tail_match(s: &str, fragment: &str, start: Option<i64>, end: Option<i64>, at_end: bool) -> bool {
    let (start, end) = adjust_indices(char_len(s), start, end);
    let frag_len = char_len(fragment);
    if start + frag_len > end {
        return false;
    }
    let window = substring(s, start as usize, end as usize);
    if at_end {
        window.ends_with(fragment)
    } else {
        window.starts_with(fragment)
    }
}

/// `s.startswith(prefix, start, end)`
pub fn startswith(s: &str, prefix: &str, start: Option<i64>, end: Option<i64>) -> bool {
    tail_match(s, prefix, start, end, false)
}

/// `s.endswith(suffix, start, end)`
pub fn endswith(s: &str, suffix: &str, start: Option<i64>, end: Option<i64>) -> bool {
    tail_match(s, suffix, start, end, true)
}

/// Python's notion of whitespace, a superset of Rust's.
pub fn is_python_space(c: char) -> bool {
    c.is_whitespace() || ('\x1c'..='\x1f').contains(&c)
}

/// `s.split(sep, maxsplit)`; a negative maxsplit means no limit.
pub fn split(s: &str, sep: Option<&str>, maxsplit: i64) -> RuntimeResult<Vec<String>> {
    match sep {
        Some("") => Err(RuntimeError::value_error("empty separator")),
        Some(sep) => {
            let parts: Vec<String> = if maxsplit < 0 {
                s.split(sep).map(str::to_string).collect()
            } else {
                s.splitn(maxsplit as usize + 1, sep)
                    .map(str::to_string)
                    .collect()
            };
            Ok(parts)
        }
        None => Ok(split_whitespace(s, maxsplit)),
    }
}

fn split_whitespace(s: &str, maxsplit: i64) -> Vec<String> {
    let mut parts = Vec::new();
    let mut rest = s.trim_start_matches(is_python_space);
    while !rest.is_empty() {
        if maxsplit >= 0 && parts.len() as i64 == maxsplit {
            parts.push(rest.to_string());
            break;
        }
        match rest.find(is_python_space) {
            Some(end) => {
                parts.push(rest[..end].to_string());
                rest = rest[end..].trim_start_matches(is_python_space);
            }
            None => {
                parts.push(rest.to_string());
                break;
            }
        }
    }
    parts
}

/// `sep.join(parts)`
pub fn join<S: AsRef<str>>(sep: &str, parts: &[S]) -> String {
    let mut out = String::new();
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            out.push_str(sep);
        }
        out.push_str(part.as_ref());
    }
    out
}

/// Which ends `strip` removes characters from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StripSide {
    Left,
    Right,
    Both,
}

/// `s.strip(chars)`, `s.lstrip(chars)`, `s.rstrip(chars)`
pub fn strip(s: &str, chars: Option<&str>, side: StripSide) -> String {
    let matches = |c: char| match chars {
        Some(set) => set.contains(c),
        None => is_python_space(c),
    };
    let trimmed = match side {
        StripSide::Left => s.trim_start_matches(matches),
        StripSide::Right => s.trim_end_matches(matches),
        StripSide::Both => s.trim_matches(matches),
    };
    trimmed.to_string()
}

/// `s * n`. Fails with `OverflowError` when the result cannot be allocated.
pub fn repeat(s: &str, n: i64) -> RuntimeResult<String> {
    if n <= 0 || s.is_empty() {
        return Ok(String::new());
    }
    let total = usize::try_from(n)
        .ok()
        .and_then(|n| s.len().checked_mul(n))
        .filter(|total| *total <= isize::MAX as usize)
        .ok_or_else(|| RuntimeError::overflow_error("repeated string is too long"))?;
    let mut out = String::new();
    out.try_reserve_exact(total)
        .map_err(|_| RuntimeError::overflow_error("repeated string is too long"))?;
    for _ in 0..n {
        out.push_str(s);
    }
    Ok(out)
}

/// Three-way comparison by code point.
pub fn compare(a: &str, b: &str) -> i64 {
    match a.cmp(b) {
        Ordering::Less => -1,
        Ordering::Equal => 0,
        Ordering::Greater => 1,
    }
}

pub fn lower(s: &str) -> String {
    s.to_lowercase()
}

pub fn upper(s: &str) -> String {
    s.to_uppercase()
}

pub fn casefold(s: &str) -> String {
    s.to_lowercase()
}

pub fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => {
            let mut out: String = first.to_uppercase().collect();
            out.push_str(&chars.as_str().to_lowercase());
            out
        }
        None => String::new(),
    }
}

pub fn swapcase(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if c.is_uppercase() {
            out.extend(c.to_lowercase());
        } else if c.is_lowercase() {
            out.extend(c.to_uppercase());
        } else {
            out.push(c);
        }
    }
    out
}

fn is_cased(c: char) -> bool {
    c.is_uppercase() || c.is_lowercase()
}

pub fn title(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut previous_cased = false;
    for c in s.chars() {
        if previous_cased {
            out.extend(c.to_lowercase());
        } else {
            out.extend(c.to_uppercase());
        }
        previous_cased = is_cased(c);
    }
    out
}

fn all_nonempty(s: &str, pred: impl Fn(char) -> bool) -> bool {
    !s.is_empty() && s.chars().all(pred)
}

fn is_decimal_char(c: char) -> bool {
    c.is_ascii_digit() || (!c.is_ascii() && c.is_numeric() && !c.is_alphabetic())
}

pub fn isalpha(s: &str) -> bool {
    all_nonempty(s, char::is_alphabetic)
}

pub fn isdigit(s: &str) -> bool {
    all_nonempty(s, is_decimal_char)
}

pub fn isdecimal(s: &str) -> bool {
    all_nonempty(s, is_decimal_char)
}

pub fn isnumeric(s: &str) -> bool {
    all_nonempty(s, char::is_numeric)
}

pub fn isalnum(s: &str) -> bool {
    all_nonempty(s, char::is_alphanumeric)
}

pub fn isspace(s: &str) -> bool {
    all_nonempty(s, is_python_space)
}

pub fn islower(s: &str) -> bool {
    s.chars().any(is_cased) && !s.chars().any(char::is_uppercase)
}

pub fn isupper(s: &str) -> bool {
    s.chars().any(is_cased) && !s.chars().any(char::is_lowercase)
}

pub fn istitle(s: &str) -> bool {
    let mut previous_cased = false;
    let mut seen_cased = false;
    for c in s.chars() {
        if c.is_uppercase() {
            if previous_cased {
                return false;
            }
            previous_cased = true;
            seen_cased = true;
        } else if c.is_lowercase() {
            if !previous_cased {
                return false;
            }
            previous_cased = true;
            seen_cased = true;
        } else {
            previous_cased = false;
        }
    }
    seen_cased
}

pub fn isidentifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) if first == '_' || first.is_alphabetic() => {
            chars.all(|c| c == '_' || c.is_alphanumeric())
        }
        _ => false,
    }
}

pub fn isprintable(s: &str) -> bool {
    s.chars().all(|c| c == ' ' || !(c.is_control() || c.is_whitespace()))
}

/// `ord(s)`
pub fn ord(s: &str) -> RuntimeResult<i64> {
    let mut chars = s.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(i64::from(u32::from(c))),
        _ => Err(RuntimeError::type_error(format!(
            "ord() expected a character, but string of length {} found",
            char_len(s)
        ))),
    }
}

/// `chr(code)`
pub fn chr(code: i64) -> RuntimeResult<String> {
    u32::try_from(code)
        .ok()
        .and_then(char::from_u32)
        .map(String::from)
        .ok_or_else(|| RuntimeError::value_error("chr() arg not in range(0x110000)"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExceptionKind;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_slice_clamps() {
        assert_eq!(slice("hello", Some(1), Some(3)), "el");
        assert_eq!(slice("hello", Some(-3), None), "llo");
        assert_eq!(slice("hello", Some(4), Some(100)), "o");
        assert_eq!(slice("hello", Some(3), Some(1)), "");
        assert_eq!(slice("héllo", Some(1), Some(2)), "é");
    }

    #[test]
    fn test_getitem_bounds() {
        assert_eq!(getitem("abc", -1).unwrap(), "c");
        assert_eq!(
            getitem("abc", 3).unwrap_err(),
            RuntimeError::index_error("string index out of range")
        );
    }

    #[test]
    fn test_find_family() {
        assert_eq!(find("abcabc", "c", None, None), 2);
        assert_eq!(find("abcabc", "c", Some(3), None), 5);
        assert_eq!(rfind("abcabc", "a", None, None), 3);
        assert_eq!(find("abc", "", Some(3), None), 3);
        assert_eq!(find("abc", "", Some(4), None), -1);
        assert_eq!(count("aaaa", "aa", None, None), 2);
        assert_eq!(count("abc", "", None, None), 4);
        assert!(index("abc", "z", None, None).is_err());
    }

    #[test]
    fn test_startswith_bounds() {
        assert!(startswith("abc", "a", None, None));
        assert!(startswith("abc", "", Some(3), None));
        assert!(!startswith("abc", "", Some(4), None));
        assert!(endswith("abcdef", "cd", None, Some(4)));
        assert!(!endswith("abc", "abcd", None, None));
    }

    #[test]
    fn test_replace_and_split() {
        assert_eq!(replace("aaa", "a", "b", 2), "bba");
        assert_eq!(replace("abc", "", "-", -1), "-a-b-c-");
        assert_eq!(split("  a  b c ", None, -1).unwrap(), vec!["a", "b", "c"]);
        assert_eq!(split("a b  c", None, 1).unwrap(), vec!["a", "b  c"]);
        assert_eq!(split("a,,b", Some(","), -1).unwrap(), vec!["a", "", "b"]);
        assert!(split("abc", Some(""), -1).is_err());
        assert_eq!(join("-", &["x", "y", "z"]), "x-y-z");
    }

    #[test]
    fn test_case_and_predicates() {
        assert_eq!(capitalize("hELLO"), "Hello");
        assert_eq!(title("hello wORLD"), "Hello World");
        assert_eq!(swapcase("aB"), "Ab");
        assert!(istitle("Hello World"));
        assert!(!istitle("Hello world"));
        assert!(islower("abc1"));
        assert!(!islower("123"));
        assert!(isidentifier("_x1"));
        assert!(!isidentifier("1x"));
        assert_eq!(strip("xxhixx", Some("x"), StripSide::Left), "hixx");
    }

    #[test]
    fn test_repeat_bounds() {
        assert_eq!(repeat("ab", 3).unwrap(), "ababab");
        assert_eq!(repeat("ab", -2).unwrap(), "");
        assert_eq!(repeat("", i64::MAX).unwrap(), "");
        let err = repeat("ab", i64::MAX).unwrap_err();
        assert_eq!(err.kind(), ExceptionKind::OverflowError);
    }

    #[test]
    fn test_ord_chr() {
        assert_eq!(ord("a").unwrap(), 97);
        assert!(ord("ab").is_err());
        assert_eq!(chr(0x263a).unwrap(), "\u{263a}");
        assert!(chr(-1).is_err());
    }
}
