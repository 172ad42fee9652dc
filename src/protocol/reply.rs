//! Reply definitions
//!
//! Typed command results, rendered to text only at the protocol boundary.

use std::fmt;

/// Token sent for a missing value
pub const NIL: &str = "(nil)";

/// Token sent for an empty key listing
pub const EMPTY: &str = "(empty)";

/// A successful command result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Acknowledgement
    Ok,
    /// A stored value
    Value(String),
    /// The key is absent
    Nil,
    /// Boolean answer, sent as `1` or `0`
    Bool(bool),
    /// Numeric answer
    Integer(i64),
    /// Key listing
    Keys(Vec<String>),
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Ok => f.write_str("OK"),
            Reply::Value(value) => f.write_str(value),
            Reply::Nil => f.write_str(NIL),
            Reply::Bool(true) => f.write_str("1"),
            Reply::Bool(false) => f.write_str("0"),
            Reply::Integer(n) => write!(f, "{}", n),
            Reply::Keys(keys) if keys.is_empty() => f.write_str(EMPTY),
            Reply::Keys(keys) => f.write_str(&keys.join(" ")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_replies() {
        assert_eq!(Reply::Ok.to_string(), "OK");
        assert_eq!(Reply::Value("a b".into()).to_string(), "a b");
        assert_eq!(Reply::Nil.to_string(), "(nil)");
        assert_eq!(Reply::Bool(true).to_string(), "1");
        assert_eq!(Reply::Bool(false).to_string(), "0");
        assert_eq!(Reply::Integer(-2).to_string(), "-2");
    }

    #[test]
    fn test_render_keys() {
        assert_eq!(Reply::Keys(vec![]).to_string(), "(empty)");
        assert_eq!(
            Reply::Keys(vec!["a".into(), "b".into(), "c".into()]).to_string(),
            "a b c"
        );
    }
}
