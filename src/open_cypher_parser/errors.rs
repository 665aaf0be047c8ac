use nom::error::{ContextError, FromExternalError, ParseError};
use std::fmt;

#[derive(Debug, PartialEq)]
pub struct OpenCypherParsingError<'a> {
    pub errors: Vec<(&'a str, &'static str)>,
}

impl<'a> OpenCypherParsingError<'a> {
    pub fn new(input: &'a str, message: &'static str) -> Self {
        OpenCypherParsingError {
            errors: vec![(input, message)],
        }
    }

    /// The innermost failure position with its message, shortened for display.
    pub fn hint(&self) -> String {
        match self.errors.first() {
            Some((input, ctx)) => {
                let near: String = input.chars().take(32).collect();
                if near.is_empty() {
                    format!("{} at end of input", ctx)
                } else {
                    format!("{} near `{}`", ctx, near)
                }
            }
            None => "unable to parse".to_string(),
        }
    }
}

impl<'a> ParseError<&'a str> for OpenCypherParsingError<'a> {
    fn from_error_kind(input: &'a str, _kind: nom::error::ErrorKind) -> Self {
        OpenCypherParsingError {
            errors: vec![(input, "unexpected input")],
        }
    }

    fn append(input: &'a str, _kind: nom::error::ErrorKind, mut other: Self) -> Self {
        other.errors.push((input, "unexpected input (appended)"));
        other
    }

    fn or(self, other: Self) -> Self {
        // keep the branch that got further into the input
        let self_rest = self.errors.first().map(|(i, _)| i.len()).unwrap_or(usize::MAX);
        let other_rest = other.errors.first().map(|(i, _)| i.len()).unwrap_or(usize::MAX);
        if other_rest <= self_rest {
            other
        } else {
            self
        }
    }
}

impl<'a> ContextError<&'a str> for OpenCypherParsingError<'a> {
    fn add_context(input: &'a str, ctx: &'static str, mut other: Self) -> Self {
        other.errors.push((input, ctx));
        other
    }
}

impl<'a, E> FromExternalError<&'a str, E> for OpenCypherParsingError<'a> {
    fn from_external_error(input: &'a str, _kind: nom::error::ErrorKind, _e: E) -> Self {
        OpenCypherParsingError {
            errors: vec![(input, "invalid literal")],
        }
    }
}

impl fmt::Display for OpenCypherParsingError<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (input, ctx) in &self.errors {
            writeln!(f, "{}: {:}", ctx, input)?;
        }
        Ok(())
    }
}

impl<'a> From<nom::error::Error<&'a str>> for OpenCypherParsingError<'a> {
    fn from(err: nom::error::Error<&'a str>) -> Self {
        OpenCypherParsingError {
            errors: vec![(err.input, "Unable to parse")],
        }
    }
}
