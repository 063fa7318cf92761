use std::fmt;

use thiserror::Error;

use crate::span::Span;

/// A function (or one of its operations) has no valid native lowering.
///
/// Raised at compile time only. The conversion engine may retry a pass that
/// failed after widening a type; otherwise the error surfaces to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct ConversionError {
    pub message: String,
    pub span: Option<Span>,
    /// Name of the Python function being converted when the error occurred.
    pub function: Option<String>,
}

impl ConversionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            span: None,
            function: None,
        }
    }

    pub fn at(message: impl Into<String>, span: Span) -> Self {
        Self::new(message).with_span(span)
    }

    /// Attach a location unless a more precise one is already known.
    pub fn with_span(mut self, span: Span) -> Self {
        if self.span.is_none() {
            self.span = Some(span);
        }
        self
    }

    /// Attach the enclosing function unless a nested conversion already did.
    pub fn in_function(mut self, name: &str) -> Self {
        if self.function.is_none() {
            self.function = Some(name.to_string());
        }
        self
    }
}

impl fmt::Display for ConversionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(function) = &self.function {
            write!(f, "in function '{}' ", function)?;
        }
        if let Some(span) = &self.span {
            write!(f, "at {}", span)?;
        }
        if self.function.is_some() || self.span.is_some() {
            f.write_str(": ")?;
        }
        f.write_str(&self.message)
    }
}

/// `Err` shorthand used throughout code generation.
pub fn conversion_error<T>(message: impl Into<String>) -> Result<T, ConversionError> {
    Err(ConversionError::new(message))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_with_context() {
        let err = ConversionError::at("cannot add 'int' and 'str'", Span::at(3, 9)).in_function("f");
        assert_eq!(err.to_string(), "in function 'f' at 3:9: cannot add 'int' and 'str'");
        assert_eq!(ConversionError::new("plain").to_string(), "plain");
    }

    #[test]
    fn test_innermost_context_wins() {
        let err = ConversionError::at("x", Span::at(1, 1))
            .in_function("inner")
            .with_span(Span::at(9, 9))
            .in_function("outer");
        assert_eq!(err.span, Some(Span::at(1, 1)));
        assert_eq!(err.function.as_deref(), Some("inner"));
    }
}
