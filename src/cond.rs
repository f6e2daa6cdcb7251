#![warn(missing_docs)]

//! # Cond Module
//!
//! `Cond` is the recursive predicate builder: it accepts heterogeneous terms
//! (booleans, field/operator/value triples, raw fragments, meta-commands,
//! sub-conditions) and renders a single dialect-correct boolean SQL
//! expression.
//!
//! The primary surface is the typed [`CondTerm`] / [`IntoCondTerm`] pair;
//! the free functions at the bottom of this module (`where_`, `or_where`,
//! `like`, ...) are a compatibility layer over the same machinery.

use crate::dialect::Dialect;
use crate::literal;
use crate::value::Value;

/// How a `Cond`'s fragments join when it has more than one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combinator {
    /// Fragments join with ` AND `.
    And,
    /// Fragments join with ` OR `.
    Or,
}

/// One recognized shape of input to a `Cond`.
///
/// Constructed directly or via [`IntoCondTerm::into_cond_term`].
#[derive(Clone, Debug)]
pub enum CondTerm {
    /// `true` → the tautology `(1=1)`; `false` → the contradiction `(1=0)`
    /// and the owning Cond's skip flag is set.
    Bool(bool),
    /// A fragment appended exactly as given, with no further processing.
    Verbatim(String),
    /// A raw SQL fragment containing `?` placeholders, interleaved with
    /// rendered literals in ordinal order.
    Raw(String, Vec<Value>),
    /// `$and`: the terms are rendered into a fresh AND-combined sub-Cond and
    /// appended as a single fragment.
    MetaAnd(Vec<CondTerm>),
    /// `$or`: same as `MetaAnd` but OR-combined.
    MetaOr(Vec<CondTerm>),
    /// A `field [operator] value` triple. `operator` of `None` defaults to
    /// `=`, or is parsed out of `field` itself when embedded (e.g. `"age >="`).
    Field(String, Option<String>, Value),
    /// A flat set of `field = value` pairs, each appended as its own
    /// fragment (iteration order is caller-supplied here, unlike a true
    /// unordered map).
    Map(Vec<(String, Value)>),
    /// Another `Cond`, rendered with an extra, unconditional wrap of
    /// parentheses and appended as a single fragment.
    SubCond(Cond),
    /// A list of terms where each one becomes its own parenthesized
    /// AND-subcondition, appended as a fragment of the outer Cond.
    Group(Vec<CondTerm>),
}

/// Converts an ergonomic Rust value into a [`CondTerm`].
pub trait IntoCondTerm {
    /// Performs the conversion.
    fn into_cond_term(self) -> CondTerm;
}

impl IntoCondTerm for CondTerm {
    fn into_cond_term(self) -> CondTerm {
        self
    }
}

impl IntoCondTerm for bool {
    fn into_cond_term(self) -> CondTerm {
        CondTerm::Bool(self)
    }
}

impl IntoCondTerm for &str {
    fn into_cond_term(self) -> CondTerm {
        if self.contains('?') {
            CondTerm::Raw(self.to_string(), Vec::new())
        } else {
            CondTerm::Verbatim(self.to_string())
        }
    }
}

impl IntoCondTerm for String {
    fn into_cond_term(self) -> CondTerm {
        self.as_str().into_cond_term()
    }
}

impl IntoCondTerm for Cond {
    fn into_cond_term(self) -> CondTerm {
        CondTerm::SubCond(self)
    }
}

impl<V> IntoCondTerm for (&str, V)
where
    V: Into<Value>,
{
    fn into_cond_term(self) -> CondTerm {
        CondTerm::Field(self.0.to_string(), None, self.1.into())
    }
}

impl<V> IntoCondTerm for (&str, &str, V)
where
    V: Into<Value>,
{
    fn into_cond_term(self) -> CondTerm {
        CondTerm::Field(self.0.to_string(), Some(self.1.to_string()), self.2.into())
    }
}

impl<T> IntoCondTerm for Vec<T>
where
    T: IntoCondTerm,
{
    fn into_cond_term(self) -> CondTerm {
        CondTerm::Group(self.into_iter().map(IntoCondTerm::into_cond_term).collect())
    }
}

const OPERATORS: &[&str] = &[
    "=",
    "!=",
    "<",
    "<=",
    ">",
    ">=",
    "LIKE",
    "NOT LIKE",
    "IN",
    "NOT IN",
    "BETWEEN",
    "NOT BETWEEN",
];

fn normalize_operator(op: &str) -> String {
    let upper = op.trim().to_ascii_uppercase();
    for candidate in OPERATORS {
        if candidate.eq_ignore_ascii_case(&upper) {
            return candidate.to_string();
        }
    }
    panic!("scoop: unrecognized condition operator {op:?}");
}

fn is_identifier_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b' ' || b == b'.' || b == b'`'
}

/// Splits a string like `"age >="` into `("age", Some(">="))`, or returns
/// `(s, None)` if no operator byte is present.
fn parse_field_and_op(s: &str) -> (String, Option<String>) {
    let bytes = s.as_bytes();
    match bytes.iter().position(|&b| !is_identifier_byte(b)) {
        None => (s.trim().to_string(), None),
        Some(idx) => {
            let field = s[..idx].trim().to_string();
            let op = s[idx..].trim().to_string();
            if op.is_empty() {
                (field, None)
            } else {
                (field, Some(op))
            }
        }
    }
}

/// The recursive predicate builder.
///
/// Grounded on the teacher's recursive `build_filter_expr`, generalized from
/// a single `Filtered` trait-object dispatch to the [`CondTerm`] closed enum.
#[derive(Clone, Debug)]
pub struct Cond {
    fragments: Vec<String>,
    combinator: Combinator,
    top_level: bool,
    table_prefix: Option<String>,
    skip: bool,
    dialect: Dialect,
}

impl Cond {
    /// A fresh, AND-combined Cond for `dialect`.
    pub fn new(dialect: Dialect) -> Self {
        Cond {
            fragments: Vec::new(),
            combinator: Combinator::And,
            top_level: false,
            table_prefix: None,
            skip: false,
            dialect,
        }
    }

    /// A fresh, OR-combined Cond for `dialect`.
    pub fn new_or(dialect: Dialect) -> Self {
        let mut c = Cond::new(dialect);
        c.combinator = Combinator::Or;
        c
    }

    /// Marks this Cond as the root of a Scoop's WHERE clause, suppressing
    /// the outer-parentheses wrap that a nested Cond would otherwise get.
    pub fn top_level(mut self) -> Self {
        self.top_level = true;
        self
    }

    /// Qualifies bare field names with `prefix.` when rendering (used when
    /// a Scoop joins or aliases its target table).
    pub fn with_table_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.table_prefix = Some(prefix.into());
        self
    }

    /// True once a `false` boolean term has been pushed; the owning Scoop
    /// should short-circuit rather than issue SQL.
    pub fn is_skip(&self) -> bool {
        self.skip
    }

    /// Appends one term, applying the dispatch rules for its shape.
    pub fn push(mut self, term: impl IntoCondTerm) -> Self {
        self.push_term(term.into_cond_term());
        self
    }

    /// Empties the fragment list and clears `skip`, returning the Cond to
    /// an initial state suitable for reuse.
    pub fn reset(&mut self) -> &mut Self {
        self.fragments.clear();
        self.skip = false;
        self
    }

    fn quote_field(&self, name: &str) -> String {
        let qualified = match (&self.table_prefix, name.contains('.')) {
            (Some(prefix), false) => format!("{prefix}.{name}"),
            _ => name.to_string(),
        };
        self.dialect.quote_path(&qualified)
    }

    fn push_term(&mut self, term: CondTerm) {
        match term {
            CondTerm::Bool(true) => self.fragments.push("(1=1)".to_string()),
            CondTerm::Bool(false) => {
                self.fragments.push("(1=0)".to_string());
                self.skip = true;
            }
            CondTerm::Verbatim(s) => self.fragments.push(s),
            CondTerm::Raw(sql, args) => self.fragments.push(render_raw(&sql, &args)),
            CondTerm::MetaAnd(terms) => {
                let mut sub = Cond::new(self.dialect);
                if let Some(prefix) = &self.table_prefix {
                    sub = sub.with_table_prefix(prefix.clone());
                }
                for t in terms {
                    sub.push_term(t);
                }
                self.skip = self.skip || sub.skip;
                self.fragments.push(sub.to_string());
            }
            CondTerm::MetaOr(terms) => {
                let mut sub = Cond::new_or(self.dialect);
                if let Some(prefix) = &self.table_prefix {
                    sub = sub.with_table_prefix(prefix.clone());
                }
                for t in terms {
                    sub.push_term(t);
                }
                self.skip = self.skip || sub.skip;
                self.fragments.push(sub.to_string());
            }
            CondTerm::Field(name, op, value) => {
                let (parsed_field, parsed_op) = parse_field_and_op(&name);
                let op = normalize_operator(op.as_deref().or(parsed_op.as_deref()).unwrap_or("="));
                let quoted = self.quote_field(&parsed_field);
                let rendered = literal::render(&value, true);
                self.fragments.push(format!("({quoted} {op} {rendered})"));
            }
            CondTerm::Map(pairs) => {
                for (name, value) in pairs {
                    self.push_term(CondTerm::Field(name, None, value));
                }
            }
            CondTerm::SubCond(sub) => {
                self.skip = self.skip || sub.skip;
                self.fragments.push(format!("({})", sub));
            }
            CondTerm::Group(terms) => {
                for t in terms {
                    let mut sub = Cond::new(self.dialect);
                    if let Some(prefix) = &self.table_prefix {
                        sub = sub.with_table_prefix(prefix.clone());
                    }
                    sub.push_term(t);
                    self.skip = self.skip || sub.skip;
                    self.fragments.push(format!("({})", sub));
                }
            }
        }
    }
}

fn render_raw(sql: &str, args: &[Value]) -> String {
    if !sql.contains('?') {
        return sql.to_string();
    }
    let mut out = String::with_capacity(sql.len());
    let mut args = args.iter();
    let mut parts = sql.split('?').peekable();
    while let Some(part) = parts.next() {
        out.push_str(part);
        if parts.peek().is_some() {
            if let Some(arg) = args.next() {
                out.push_str(&literal::render(arg, true));
            }
        }
    }
    out
}

impl std::fmt::Display for Cond {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.fragments.len() {
            0 => Ok(()),
            1 => write!(f, "{}", self.fragments[0]),
            _ => {
                let sep = match self.combinator {
                    Combinator::And => " AND ",
                    Combinator::Or => " OR ",
                };
                let joined = self.fragments.join(sep);
                if self.top_level {
                    write!(f, "{joined}")
                } else {
                    write!(f, "({joined})")
                }
            }
        }
    }
}

/// Builds a fresh, AND-combined Cond from the given terms.
pub fn where_(dialect: Dialect, terms: Vec<CondTerm>) -> Cond {
    let mut c = Cond::new(dialect);
    for t in terms {
        c.push_term(t);
    }
    c
}

/// Builds a fresh, OR-combined Cond from the given terms.
pub fn or_where(dialect: Dialect, terms: Vec<CondTerm>) -> Cond {
    let mut c = Cond::new_or(dialect);
    for t in terms {
        c.push_term(t);
    }
    c
}

/// `(quote(col) LIKE '%value%')`.
pub fn like(dialect: Dialect, col: &str, value: &str) -> Cond {
    like_pattern(dialect, col, format!("%{value}%"), "LIKE")
}

/// `(quote(col) LIKE 'value%')`.
pub fn left_like(dialect: Dialect, col: &str, value: &str) -> Cond {
    like_pattern(dialect, col, format!("{value}%"), "LIKE")
}

/// `(quote(col) LIKE '%value')`.
pub fn right_like(dialect: Dialect, col: &str, value: &str) -> Cond {
    like_pattern(dialect, col, format!("%{value}"), "LIKE")
}

/// `(quote(col) NOT LIKE '%value%')`.
pub fn not_like(dialect: Dialect, col: &str, value: &str) -> Cond {
    like_pattern(dialect, col, format!("%{value}%"), "NOT LIKE")
}

/// `(quote(col) NOT LIKE 'value%')`.
pub fn not_left_like(dialect: Dialect, col: &str, value: &str) -> Cond {
    like_pattern(dialect, col, format!("{value}%"), "NOT LIKE")
}

/// `(quote(col) NOT LIKE '%value')`.
pub fn not_right_like(dialect: Dialect, col: &str, value: &str) -> Cond {
    like_pattern(dialect, col, format!("%{value}"), "NOT LIKE")
}

fn like_pattern(dialect: Dialect, col: &str, pattern: String, op: &str) -> Cond {
    Cond::new(dialect).push(CondTerm::Field(col.to_string(), Some(op.to_string()), Value::String(pattern)))
}

/// `(quote(col) BETWEEN lo AND hi)`.
pub fn between(dialect: Dialect, col: &str, lo: impl Into<Value>, hi: impl Into<Value>) -> Cond {
    Cond::new(dialect).push(CondTerm::Field(
        col.to_string(),
        Some("BETWEEN".to_string()),
        Value::Between(Box::new(lo.into()), Box::new(hi.into())),
    ))
}

/// `(quote(col) NOT BETWEEN lo AND hi)`.
pub fn not_between(dialect: Dialect, col: &str, lo: impl Into<Value>, hi: impl Into<Value>) -> Cond {
    Cond::new(dialect).push(CondTerm::Field(
        col.to_string(),
        Some("NOT BETWEEN".to_string()),
        Value::Between(Box::new(lo.into()), Box::new(hi.into())),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::Dialect;

    #[test]
    fn s1_single_field_equality() {
        let c = where_(Dialect::MySQL, vec![CondTerm::Field("a".into(), None, Value::Int32(1))]);
        assert_eq!(c.to_string(), "(`a` = 1)");
    }

    #[test]
    fn s2_or_where_over_three_maps() {
        let c = or_where(
            Dialect::MySQL,
            vec![
                CondTerm::Map(vec![("a".to_string(), Value::Int32(1))]),
                CondTerm::Map(vec![("a".to_string(), Value::Int32(2))]),
                CondTerm::Map(vec![("a".to_string(), Value::Int32(3))]),
            ],
        );
        assert_eq!(c.to_string(), "((`a` = 1) OR (`a` = 2) OR (`a` = 3))");
    }

    #[test]
    fn s3_bool_literals_and_skip_flag() {
        let c = where_(Dialect::MySQL, vec![CondTerm::Bool(true)]);
        assert_eq!(c.to_string(), "(1=1)");
        assert!(!c.is_skip());

        let c = where_(Dialect::MySQL, vec![CondTerm::Bool(false)]);
        assert_eq!(c.to_string(), "(1=0)");
        assert!(c.is_skip());
    }

    #[test]
    fn s4_between() {
        let c = between(Dialect::MySQL, "age", 18, 65);
        assert_eq!(c.to_string(), "(`age` BETWEEN 18 AND 65)");
    }

    #[test]
    fn quote_char_follows_dialect_for_sqlite() {
        let c = where_(Dialect::Sqlite, vec![CondTerm::Field("a".into(), None, Value::Int32(1))]);
        assert_eq!(c.to_string(), "(\"a\" = 1)");
    }

    #[test]
    fn embedded_operator_is_parsed_from_field_string() {
        let c = where_(
            Dialect::MySQL,
            vec![CondTerm::Field("age >=".into(), None, Value::Int32(18))],
        );
        assert_eq!(c.to_string(), "(`age` >= 18)");
    }

    #[test]
    #[should_panic(expected = "unrecognized condition operator")]
    fn unknown_operator_panics() {
        normalize_operator("~=");
    }

    #[test]
    fn nested_sub_cond_gets_an_extra_parenthesis_wrap() {
        let inner = where_(Dialect::MySQL, vec![CondTerm::Field("a".into(), None, Value::Int32(1))]);
        let outer = where_(Dialect::MySQL, vec![CondTerm::SubCond(inner)]);
        assert_eq!(outer.to_string(), "((`a` = 1))");
    }

    #[test]
    fn raw_fragment_interleaves_literals_over_placeholders() {
        let c = where_(
            Dialect::MySQL,
            vec![CondTerm::Raw(
                "age > ? AND age < ?".to_string(),
                vec![Value::Int32(18), Value::Int32(65)],
            )],
        );
        assert_eq!(c.to_string(), "age > 18 AND age < 65");
    }

    #[test]
    fn group_wraps_each_element_as_its_own_and_subcondition() {
        let c = where_(
            Dialect::MySQL,
            vec![CondTerm::Group(vec![
                CondTerm::Map(vec![("a".to_string(), Value::Int32(1))]),
                CondTerm::Map(vec![("b".to_string(), Value::Int32(2))]),
            ])],
        );
        assert_eq!(c.to_string(), "(((`a` = 1)) AND ((`b` = 2)))");
    }

    #[test]
    fn top_level_suppresses_outer_wrap() {
        let c = where_(
            Dialect::MySQL,
            vec![
                CondTerm::Field("a".into(), None, Value::Int32(1)),
                CondTerm::Field("b".into(), None, Value::Int32(2)),
            ],
        )
        .top_level();
        assert_eq!(c.to_string(), "(`a` = 1) AND (`b` = 2)");
    }

    #[test]
    fn in_operator_renders_array_with_parens() {
        let c = where_(
            Dialect::MySQL,
            vec![CondTerm::Field(
                "id".into(),
                Some("IN".to_string()),
                Value::Array(vec![Value::Int32(1), Value::Int32(2), Value::Int32(3)]),
            )],
        );
        assert_eq!(c.to_string(), "(`id` IN (1, 2, 3))");
    }
}
