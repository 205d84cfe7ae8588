//! Sql string operations: plain queries and `@name`-style named parameters.
use std::borrow::Cow;

use crate::error::UsageError;

/// A value that yields the literal SQL text sent to postgres.
pub trait Sql {
    /// Returns sql string.
    fn sql(&self) -> &str;
}

impl Sql for &str {
    fn sql(&self) -> &str {
        self
    }
}

impl Sql for String {
    fn sql(&self) -> &str {
        self
    }
}

impl Sql for Cow<'_, str> {
    fn sql(&self) -> &str {
        self
    }
}

/// Rewrite `@name` placeholders into positional `$n` parameters.
///
/// `names` is matched case-insensitively against every `@name` occurrence in
/// `sql`. Names are numbered in the order they first occur in the text,
/// starting at `start + 1`. A `@word` that matches none of `names` is a fatal
/// [`UsageError::MissingParameter`] — every `@name` referenced by the SQL
/// text must be supplied. A supplied name that never occurs in the SQL text
/// is not an error; it is simply left unsent (see the caller in `query.rs`,
/// which only pushes values for the indices returned here).
///
/// Returns the rewritten sql plus, for each referenced name (by index into
/// `names`), the position it was assigned — callers use this to place bound
/// values into their final, positional order.
pub(crate) fn substitute_named(
    sql: &str,
    names: &[Cow<'_, str>],
    start: usize,
) -> Result<(String, Vec<usize>), UsageError> {
    fn next_token(rest: &str) -> &str {
        let end = rest
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(rest.len());
        &rest[..end]
    }

    let mut order: Vec<usize> = Vec::new();
    let mut rest = sql;
    while let Some(at) = rest.find('@') {
        rest = &rest[at + 1..];
        let token = next_token(rest);
        if !token.is_empty() {
            match names.iter().position(|n| n.eq_ignore_ascii_case(token)) {
                Some(idx) => {
                    if !order.contains(&idx) {
                        order.push(idx);
                    }
                },
                None => return Err(UsageError::MissingParameter(token.to_string())),
            }
        }
        rest = &rest[token.len()..];
    }

    let mut out = String::with_capacity(sql.len());
    let mut rest = sql;
    while let Some(at) = rest.find('@') {
        out.push_str(&rest[..at]);
        rest = &rest[at + 1..];
        let token = next_token(rest);
        if token.is_empty() {
            out.push('@');
        } else {
            let idx = names.iter().position(|n| n.eq_ignore_ascii_case(token)).expect("validated above");
            let pos = order.iter().position(|&i| i == idx).expect("collected above") + start + 1;
            out.push('$');
            out.push_str(itoa::Buffer::new().format(pos));
        }
        rest = &rest[token.len()..];
    }
    out.push_str(rest);

    Ok((out, order))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn renumbers_in_order_of_first_occurrence() {
        let names = vec![Cow::Borrowed("b"), Cow::Borrowed("a")];
        let (sql, order) = substitute_named("select * from t where a = @a and b = @b and a2 = @a", &names, 0).unwrap();
        assert_eq!(sql, "select * from t where a = $1 and b = $2 and a2 = $1");
        assert_eq!(order, vec![1, 0]);
    }

    #[test]
    fn case_insensitive() {
        let names = vec![Cow::Borrowed("Foo")];
        let (sql, _) = substitute_named("where x = @FOO", &names, 0).unwrap();
        assert_eq!(sql, "where x = $1");
    }

    #[test]
    fn unreferenced_name_in_sql_is_an_error() {
        let names = vec![Cow::Borrowed("id")];
        assert!(matches!(substitute_named("select @missing", &names, 0), Err(UsageError::MissingParameter(_))));
    }

    #[test]
    fn unreferenced_supplied_param_is_allowed() {
        let names = vec![Cow::Borrowed("a"), Cow::Borrowed("unused")];
        let (sql, order) = substitute_named("select * from t where x = @a", &names, 0).unwrap();
        assert_eq!(sql, "select * from t where x = $1");
        assert_eq!(order, vec![0]);
    }

    #[test]
    fn offsets_after_positional_params() {
        let names = vec![Cow::Borrowed("x")];
        let (sql, _) = substitute_named("$1, @x", &names, 1).unwrap();
        assert_eq!(sql, "$1, $2");
    }
}
