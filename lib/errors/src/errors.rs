use std::fmt::Display;

use itertools::Itertools;

/// A non-empty batch of diagnostics of the same kind, e.g. every parse error
/// collected before giving up on a source file.
///
/// Displays as one diagnostic per line.
#[derive(thiserror::Error, Debug, Clone, PartialEq, derive_more::Deref, derive_more::DerefMut)]
pub struct Errors<E: std::error::Error>(pub Vec<E>);

impl<E: std::error::Error> Errors<E> {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// `Ok(value)` if nothing was collected, otherwise all collected errors.
    pub fn into_result<T>(self, value: T) -> Result<T, Self> {
        if self.0.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }
}

impl<E: std::error::Error> Default for Errors<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: std::error::Error> From<E> for Errors<E> {
    fn from(e: E) -> Self {
        Self(vec![e])
    }
}

impl<E: std::error::Error> Display for Errors<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.0.iter().join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[derive(thiserror::Error, Debug, Clone, PartialEq)]
    #[error("oops {0}")]
    struct Oops(usize);

    #[test]
    fn display_joins_lines() {
        let errors = Errors(vec![Oops(1), Oops(2)]);
        assert_eq!(errors.to_string(), "oops 1\noops 2");
    }

    #[test]
    fn into_result() {
        let mut errors = Errors::new();
        assert_eq!(errors.clone().into_result(3), Ok(3));

        errors.push(Oops(7));
        assert_eq!(errors.len(), 1);
        assert_eq!(errors.into_result(3), Err(Errors::from(Oops(7))));
    }
}
