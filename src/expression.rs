#![warn(missing_docs)]

//! # Expression Module
//!
//! A raw SQL fragment paired with its own argument vector, for injecting
//! computed values into an `UPDATE ... SET` clause alongside plain
//! column-to-value assignments.

use crate::value::Value;

/// A raw `column = <sql>` right-hand side plus the values that fill its `?`
/// placeholders, rendered inline via [`crate::literal::render`] like
/// everything else `scoop` emits.
#[derive(Clone, Debug, PartialEq)]
pub struct Expression {
    sql: String,
    args: Vec<Value>,
}

impl Expression {
    /// Builds an expression from a raw SQL fragment and its ordinal args.
    pub fn new(sql: impl Into<String>, args: Vec<Value>) -> Self {
        Expression { sql: sql.into(), args }
    }

    /// Interleaves `?` placeholders in the fragment with rendered literals.
    pub fn render(&self) -> String {
        if !self.sql.contains('?') {
            return self.sql.clone();
        }
        let mut out = String::with_capacity(self.sql.len());
        let mut args = self.args.iter();
        let mut parts = self.sql.split('?').peekable();
        while let Some(part) = parts.next() {
            out.push_str(part);
            if parts.peek().is_some() {
                if let Some(arg) = args.next() {
                    out.push_str(&crate::literal::render(arg, true));
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_fragment_without_placeholders_unchanged() {
        let e = Expression::new("count + 1", Vec::new());
        assert_eq!(e.render(), "count + 1");
    }

    #[test]
    fn interleaves_args_over_placeholders() {
        let e = Expression::new("count + ?", vec![Value::Int32(1)]);
        assert_eq!(e.render(), "count + 1");
    }
}
