//! Boolean guards over a [`Context`].

use crate::Context;
use std::ops::{BitAnd, BitOr, Not};

/// A closed predicate expression.
///
/// Leaves test attributes of the current context; `&`, `|` and `!` build
/// conjunctions, disjunctions and negations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Predicate {
    /// Always true.
    Always,
    /// True if the attribute is present.
    Has(String),
    /// True if the attribute equals the value.
    Is(String, String),
    /// True if the attribute is a set flag.
    Flag(String),
    /// Negation.
    Not(Box<Predicate>),
    /// Conjunction.
    And(Box<Predicate>, Box<Predicate>),
    /// Disjunction.
    Or(Box<Predicate>, Box<Predicate>),
}

/// True if `key` is present.
#[must_use]
pub fn has(key: &str) -> Predicate {
    Predicate::Has(key.to_string())
}

/// True if `key` equals `value`.
#[must_use]
pub fn is(key: &str, value: &str) -> Predicate {
    Predicate::Is(key.to_string(), value.to_string())
}

/// True if `key` is a set flag.
#[must_use]
pub fn flag(key: &str) -> Predicate {
    Predicate::Flag(key.to_string())
}

impl Predicate {
    /// Evaluate against a context.
    #[must_use]
    pub fn eval(&self, ctx: &Context) -> bool {
        match self {
            Self::Always => true,
            Self::Has(key) => ctx.has(key),
            Self::Is(key, value) => ctx.get(key) == Some(value.as_str()),
            Self::Flag(key) => ctx.flag(key),
            Self::Not(inner) => !inner.eval(ctx),
            Self::And(a, b) => a.eval(ctx) && b.eval(ctx),
            Self::Or(a, b) => a.eval(ctx) || b.eval(ctx),
        }
    }
}

impl BitAnd for Predicate {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self::And(Box::new(self), Box::new(rhs))
    }
}

impl BitOr for Predicate {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self::Or(Box::new(self), Box::new(rhs))
    }
}

impl Not for Predicate {
    type Output = Self;

    fn not(self) -> Self {
        Self::Not(Box::new(self))
    }
}
