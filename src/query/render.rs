//! Text rendering of statements for diagnostics.
//!
//! Rendered text is only ever logged; engines execute the typed objects. All
//! literal escaping lives in [`escape_literal`].

use std::fmt;

use crate::query::term::{Change, Scope, SelectQuery, Statement, Term, Triple};
use crate::value::Value;

/// Escapes a string for use inside a double-quoted literal.
#[must_use]
pub fn escape_literal(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + 2);
    for c in raw.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => out.push_str(&format!("\\u{{{:04x}}}", c as u32)),
            c => out.push(c),
        }
    }
    out
}

fn write_literal(f: &mut fmt::Formatter<'_>, value: &Value) -> fmt::Result {
    match value {
        Value::String(s) => write!(f, "\"{}\"", escape_literal(s)),
        Value::Reference(l) => write!(f, "<{l}>"),
        Value::List(items) => {
            write!(f, "(")?;
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    write!(f, " ")?;
                }
                write_literal(f, item)?;
            }
            write!(f, ")")
        }
        other => write!(f, "\"{}\"^^{}", escape_literal(&other.to_string()), other.type_name()),
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Locator(l) => write!(f, "<{l}>"),
            Self::Literal(v) => write_literal(f, v),
        }
    }
}

impl fmt::Display for Triple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}> <{}> {} .", self.subject(), self.predicate(), self.object())
    }
}

impl fmt::Display for SelectQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "select")?;
        for p in self.projections() {
            write!(f, " ?{}", p.variable())?;
        }
        write!(f, " where {{ ")?;
        match self.scope() {
            Scope::ById { locator } => write!(f, "bind ?iri = <{locator}> . ")?,
            Scope::All => {}
            Scope::Within { parent, predicate } => write!(f, "<{parent}> <{predicate}> ?iri . ")?,
        }
        write!(f, "?iri is \"{}\" . ", escape_literal(self.object_type()))?;
        for p in self.projections() {
            if p.is_optional() {
                write!(f, "optional {{ ?iri <{}> ?{} }} ", p.predicate(), p.variable())?;
            } else {
                write!(f, "?iri <{}> ?{} . ", p.predicate(), p.variable())?;
            }
        }
        write!(f, "}}")
    }
}

fn write_locators(f: &mut fmt::Formatter<'_>, objects: &[crate::id::Locator]) -> fmt::Result {
    for (i, o) in objects.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "<{o}>")?;
    }
    Ok(())
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Insert { partition, triples } => {
                write!(f, "insert <{partition}> {{ ")?;
                for t in triples {
                    write!(f, "{t} ")?;
                }
                write!(f, "}}")
            }
            Self::DeletePartition { partition } => write!(f, "delete <{partition}>"),
            Self::Attach {
                partition,
                predicate,
                objects,
            } => {
                write!(f, "attach <{partition}> <{predicate}> ")?;
                write_locators(f, objects)
            }
            Self::Detach {
                partition,
                predicate,
                objects,
            } => {
                write!(f, "detach <{partition}> <{predicate}> ")?;
                write_locators(f, objects)
            }
            Self::Edit { partition, changes } => {
                write!(f, "edit <{partition}> {{ ")?;
                for change in changes {
                    match change {
                        Change::Clear { predicate } => write!(f, "clear <{predicate}> ; ")?,
                        Change::Add { triple } => write!(f, "add {triple} ")?,
                        Change::Remove { triple } => write!(f, "remove {triple} ")?,
                    }
                }
                write!(f, "}}")
            }
        }
    }
}
