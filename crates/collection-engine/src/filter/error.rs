//! Error types for filter validation.

use std::fmt;

use thiserror::Error;

use super::catalog::ParameterKind;

/// A specialized Result type for filter construction and validation.
pub type FilterResult<T> = Result<T, ValidationErrors>;

/// A single violation found while validating a filter tree.
///
/// Every variant carries the JSON-path-like location of the offending node
/// (`$` for the root, `$.children[1]` for its second child, and so on).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FilterError {
    /// The node names an operator that is not in the catalog.
    #[error("{path}: unknown operator kind '{kind}'{}", suggestion_suffix(.suggestion))]
    UnknownOperator {
        /// Location of the node.
        path: String,
        /// The unrecognized kind tag.
        kind: String,
        /// Closest known kind tag, if any.
        suggestion: Option<&'static str>,
    },

    /// The node has a parameter its operator does not declare.
    #[error("{path}: {kind} does not take a parameter named '{parameter}'")]
    UnknownParameter {
        /// Location of the node.
        path: String,
        /// The operator kind.
        kind: &'static str,
        /// The unexpected parameter name.
        parameter: String,
    },

    /// A declared parameter is absent.
    #[error("{path}: {kind} requires parameter '{parameter}'")]
    MissingParameter {
        /// Location of the node.
        path: String,
        /// The operator kind.
        kind: &'static str,
        /// The missing parameter name.
        parameter: &'static str,
    },

    /// A parameter has the wrong JSON type.
    #[error("{path}: parameter '{parameter}' must be a {expected}")]
    InvalidParameterType {
        /// Location of the node.
        path: String,
        /// The parameter name.
        parameter: &'static str,
        /// The declared parameter kind.
        expected: ParameterKind,
    },

    /// A parameter value is outside its operator's domain.
    #[error("{path}: invalid value '{value}' for parameter '{parameter}' (expected {allowed})")]
    OutOfDomain {
        /// Location of the node.
        path: String,
        /// The parameter name.
        parameter: &'static str,
        /// The rejected value, rendered as text.
        value: String,
        /// Description of the accepted values.
        allowed: String,
    },

    /// A composite node has the wrong number of children, or a leaf has any.
    #[error("{path}: {kind} takes {expected}, found {found}")]
    InvalidArity {
        /// Location of the node.
        path: String,
        /// The operator kind.
        kind: &'static str,
        /// Description of the accepted child count.
        expected: String,
        /// The actual child count.
        found: usize,
    },

    /// A hand-built node holds a parameter in a non-canonical spelling.
    #[error("{path}: tree contains non-canonical parameter values")]
    NonCanonical {
        /// Location of the node.
        path: String,
    },
}

fn suggestion_suffix(suggestion: &Option<&'static str>) -> String {
    match suggestion {
        Some(s) => format!(" (did you mean '{s}'?)"),
        None => String::new(),
    }
}

impl FilterError {
    /// Creates an out-of-domain error.
    pub fn out_of_domain(
        path: impl Into<String>,
        parameter: &'static str,
        value: impl fmt::Display,
        allowed: impl Into<String>,
    ) -> Self {
        FilterError::OutOfDomain {
            path: path.into(),
            parameter,
            value: value.to_string(),
            allowed: allowed.into(),
        }
    }

    /// Returns the location of the offending node.
    pub fn path(&self) -> &str {
        match self {
            FilterError::UnknownOperator { path, .. }
            | FilterError::UnknownParameter { path, .. }
            | FilterError::MissingParameter { path, .. }
            | FilterError::InvalidParameterType { path, .. }
            | FilterError::OutOfDomain { path, .. }
            | FilterError::InvalidArity { path, .. }
            | FilterError::NonCanonical { path } => path,
        }
    }
}

/// All violations found in one tree. Never empty.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{}", render(.0))]
pub struct ValidationErrors(Vec<FilterError>);

fn render(errors: &[FilterError]) -> String {
    let messages: Vec<String> = errors.iter().map(ToString::to_string).collect();
    match messages.len() {
        1 => messages.concat(),
        n => format!("{n} validation errors: {}", messages.join("; ")),
    }
}

impl ValidationErrors {
    /// Wraps a single violation.
    pub fn single(error: FilterError) -> Self {
        Self(vec![error])
    }

    /// Wraps a list of violations, returning `None` if it is empty.
    pub fn from_vec(errors: Vec<FilterError>) -> Option<Self> {
        if errors.is_empty() {
            None
        } else {
            Some(Self(errors))
        }
    }

    /// Returns the violations.
    pub fn errors(&self) -> &[FilterError] {
        &self.0
    }

    /// Returns the number of violations.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false; present for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Consumes the wrapper, returning the violations.
    pub fn into_vec(self) -> Vec<FilterError> {
        self.0
    }
}

impl IntoIterator for ValidationErrors {
    type Item = FilterError;
    type IntoIter = std::vec::IntoIter<FilterError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}
