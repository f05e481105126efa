//! Script placeholder parser using nom.
//!
//! Scripts name their parameters with `@name` placeholders. Drivers bind
//! positionally, so each script is split once, at load time, into literal
//! text and placeholders, then rendered per dialect.
//!
//! ```text
//! INSERT INTO resource (id, value) VALUES (@id, @value) -- '@ignored'
//!                                          ─┬─  ──┬───     ────┬────
//!                                           │     │            └── comment, kept verbatim
//!                                           └─────┴── placeholders
//!
//! SQLite / MySQL:  ... VALUES (?, ?)      bindings: [id, value]
//! PostgreSQL:      ... VALUES ($1, $2)    bindings: [id, value]
//! ```

use nom::{
    branch::alt,
    bytes::complete::{is_not, tag, take_till, take_till1, take_until, take_while},
    character::complete::{char, one_of, satisfy},
    combinator::{map, not, recognize},
    multi::{many0, many0_count},
    sequence::{pair, preceded, tuple},
    IResult,
};
use std::collections::HashMap;

use crate::engine::Dialect;
use crate::error::{ScriptError, ScriptResult};
use crate::params::ParameterSet;
use crate::value::Value;

/// One lexical piece of a script.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Piece<'a> {
    Text(&'a str),
    Param(&'a str),
}

/// A script rendered for one placeholder style.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    /// SQL text with driver placeholders.
    pub sql: String,
    /// Parameter name for each positional argument, in order.
    pub bindings: Vec<String>,
}

/// A script split into text and placeholders, pre-rendered for every dialect.
#[derive(Debug, Clone)]
pub struct CompiledScript {
    source: String,
    placeholders: Vec<String>,
    positional: Rendered,
    numbered: Rendered,
}

impl CompiledScript {
    /// Parse `source` and render it for both placeholder styles.
    pub fn compile(source: impl Into<String>) -> ScriptResult<Self> {
        let source = source.into();
        let pieces = parse_pieces(&source)?;

        let mut placeholders: Vec<String> = Vec::new();
        let mut positional = Rendered {
            sql: String::with_capacity(source.len()),
            bindings: Vec::new(),
        };
        let mut numbered = positional.clone();
        let mut numbers: HashMap<&str, usize> = HashMap::new();

        for piece in &pieces {
            match piece {
                Piece::Text(text) => {
                    positional.sql.push_str(text);
                    numbered.sql.push_str(text);
                }
                Piece::Param(name) => {
                    positional.sql.push('?');
                    positional.bindings.push(name.to_string());

                    let next = numbers.len() + 1;
                    let n = *numbers.entry(*name).or_insert(next);
                    if n == next {
                        placeholders.push(name.to_string());
                        numbered.bindings.push(name.to_string());
                    }
                    numbered.sql.push('$');
                    numbered.sql.push_str(&n.to_string());
                }
            }
        }

        Ok(Self {
            source,
            placeholders,
            positional,
            numbered,
        })
    }

    /// The script text exactly as the provider returned it.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Distinct placeholder names in order of first appearance.
    pub fn placeholders(&self) -> &[String] {
        &self.placeholders
    }

    /// The script rendered for `dialect`.
    pub fn render(&self, dialect: Dialect) -> &Rendered {
        if dialect.numbered_placeholders() {
            &self.numbered
        } else {
            &self.positional
        }
    }

    /// Resolve the positional arguments for `dialect` from a parameter set.
    pub fn arguments(&self, dialect: Dialect, params: &ParameterSet) -> ScriptResult<Vec<Value>> {
        self.render(dialect)
            .bindings
            .iter()
            .map(|name| {
                params
                    .lookup(name)
                    .cloned()
                    .ok_or_else(|| ScriptError::UnboundParameter(name.clone()))
            })
            .collect()
    }
}

/// Split a complete script into pieces.
fn parse_pieces(input: &str) -> ScriptResult<Vec<Piece<'_>>> {
    match many0(parse_piece)(input) {
        Ok(("", pieces)) => Ok(pieces),
        Ok((remaining, _)) => Err(ScriptError::parse(
            input.len() - remaining.len(),
            unterminated(remaining),
        )),
        Err(e) => Err(ScriptError::parse(0, format!("Parse failed: {:?}", e))),
    }
}

/// Parse one piece of script text.
fn parse_piece(input: &str) -> IResult<&str, Piece<'_>> {
    alt((
        map(single_quoted, Piece::Text),
        map(double_quoted, Piece::Text),
        map(backtick_quoted, Piece::Text),
        map(dollar_quoted, Piece::Text),
        map(line_comment, Piece::Text),
        map(block_comment, Piece::Text),
        map(system_variable, Piece::Text),
        map(placeholder, Piece::Param),
        map(
            take_till1(|c: char| matches!(c, '\'' | '"' | '`' | '$' | '-' | '/' | '@')),
            Piece::Text,
        ),
        // A lone `$ - / @` that starts none of the above
        map(
            preceded(
                not(alt((tag("$$"), tag("/*")))),
                recognize(one_of("$-/@")),
            ),
            Piece::Text,
        ),
    ))(input)
}

/// Describe the construct left open at the start of `remaining`.
fn unterminated(remaining: &str) -> String {
    let what = match remaining.chars().next() {
        Some('\'') => "string literal",
        Some('"') => "quoted identifier",
        Some('`') => "backtick identifier",
        Some('$') => "dollar-quoted body",
        Some('/') => "block comment",
        _ => "construct",
    };
    let preview: String = remaining.chars().take(20).collect();
    format!("Unterminated {}: '{}'", what, preview)
}

/// Parse an identifier character.
fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Parse a placeholder `@name`, returning the name.
fn placeholder(input: &str) -> IResult<&str, &str> {
    preceded(
        char('@'),
        recognize(pair(
            satisfy(|c| c.is_alphabetic() || c == '_'),
            take_while(is_ident_char),
        )),
    )(input)
}

/// Parse a MySQL system variable `@@name`, kept as text.
fn system_variable(input: &str) -> IResult<&str, &str> {
    recognize(pair(tag("@@"), take_while(is_ident_char)))(input)
}

/// Parse a string literal `'...'` with `''` escapes.
fn single_quoted(input: &str) -> IResult<&str, &str> {
    recognize(tuple((
        char('\''),
        many0_count(alt((is_not("'"), tag("''")))),
        char('\''),
    )))(input)
}

/// Parse a quoted identifier `"..."`.
fn double_quoted(input: &str) -> IResult<&str, &str> {
    recognize(tuple((
        char('"'),
        many0_count(alt((is_not("\""), tag("\"\"")))),
        char('"'),
    )))(input)
}

/// Parse a MySQL quoted identifier `` `...` ``.
fn backtick_quoted(input: &str) -> IResult<&str, &str> {
    recognize(tuple((
        char('`'),
        many0_count(alt((is_not("`"), tag("``")))),
        char('`'),
    )))(input)
}

/// Parse a PostgreSQL dollar-quoted body `$$...$$`.
fn dollar_quoted(input: &str) -> IResult<&str, &str> {
    recognize(tuple((tag("$$"), take_until("$$"), tag("$$"))))(input)
}

/// Parse a `-- ...` comment up to (not including) the newline.
fn line_comment(input: &str) -> IResult<&str, &str> {
    recognize(pair(tag("--"), take_till(|c| c == '\n')))(input)
}

/// Parse a `/* ... */` comment.
fn block_comment(input: &str) -> IResult<&str, &str> {
    recognize(tuple((tag("/*"), take_until("*/"), tag("*/"))))(input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn params(pairs: &[(&str, Value)]) -> ParameterSet {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_positional_rendering() {
        let script =
            CompiledScript::compile("INSERT INTO resource (id, value) VALUES (@id, @value);")
                .unwrap();
        let rendered = script.render(Dialect::Sqlite);
        assert_eq!(rendered.sql, "INSERT INTO resource (id, value) VALUES (?, ?);");
        assert_eq!(rendered.bindings, vec!["id", "value"]);
    }

    #[test]
    fn test_numbered_rendering_reuses_indices() {
        let script =
            CompiledScript::compile("SELECT * FROM t WHERE a = @x OR b = @y OR c = @x").unwrap();

        let pg = script.render(Dialect::Postgres);
        assert_eq!(pg.sql, "SELECT * FROM t WHERE a = $1 OR b = $2 OR c = $1");
        assert_eq!(pg.bindings, vec!["x", "y"]);

        let mysql = script.render(Dialect::MySql);
        assert_eq!(mysql.sql, "SELECT * FROM t WHERE a = ? OR b = ? OR c = ?");
        assert_eq!(mysql.bindings, vec!["x", "y", "x"]);

        assert_eq!(script.placeholders(), &["x".to_string(), "y".to_string()]);
    }

    #[test]
    fn test_literals_and_comments_are_skipped() {
        let source = "SELECT '@not', \"@col\", `@tick` -- @gone\n/* @block */ FROM t WHERE v = @param AND @@version > 0";
        let script = CompiledScript::compile(source).unwrap();
        let rendered = script.render(Dialect::Sqlite);
        assert_eq!(rendered.bindings, vec!["param"]);
        assert_eq!(
            rendered.sql,
            "SELECT '@not', \"@col\", `@tick` -- @gone\n/* @block */ FROM t WHERE v = ? AND @@version > 0"
        );
    }

    #[test]
    fn test_escaped_quote_inside_string() {
        let script = CompiledScript::compile("SELECT 'it''s @x' WHERE a = @a").unwrap();
        assert_eq!(script.placeholders(), &["a".to_string()]);
    }

    #[test]
    fn test_script_without_placeholders_is_verbatim() {
        let source = "CREATE TABLE \"table\" (id INTEGER);\nCREATE TABLE another_table (id INTEGER);";
        let script = CompiledScript::compile(source).unwrap();
        assert_eq!(script.source(), source);
        assert_eq!(script.render(Dialect::Postgres).sql, source);
        assert!(script.placeholders().is_empty());
    }

    #[test]
    fn test_lone_at_and_minus() {
        let script = CompiledScript::compile("SELECT 1 - 2, a @> b, x / y").unwrap();
        assert!(script.placeholders().is_empty());
        assert_eq!(script.render(Dialect::Sqlite).sql, "SELECT 1 - 2, a @> b, x / y");
    }

    #[test]
    fn test_unterminated_constructs_are_errors() {
        let cases = [
            ("SELECT 'open", 7, "string literal"),
            ("SELECT \"col FROM t", 7, "quoted identifier"),
            ("SELECT `col", 7, "backtick identifier"),
            ("SELECT 1 /* never closed", 9, "block comment"),
            ("DO $$ BEGIN", 3, "dollar-quoted body"),
            ("SELECT 'it''s", 7, "string literal"),
        ];
        for (source, at, what) in cases {
            match CompiledScript::compile(source) {
                Err(ScriptError::Parse { position, message }) => {
                    assert_eq!(position, at, "{source}");
                    assert!(message.contains(what), "{source}: {message}");
                }
                other => panic!("{source}: expected a parse error, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_dollar_numbers_and_trailing_dash_are_text() {
        let script = CompiledScript::compile("SELECT $1, a-b, 'x' -").unwrap();
        assert!(script.placeholders().is_empty());
        assert_eq!(script.render(Dialect::Sqlite).sql, "SELECT $1, a-b, 'x' -");
    }

    #[test]
    fn test_arguments_lookup() {
        let script = CompiledScript::compile("SELECT @Id, @value, @id").unwrap();
        let set = params(&[("id", Value::Int(1)), ("value", Value::Null)]);

        let args = script.arguments(Dialect::Sqlite, &set).unwrap();
        assert_eq!(args, vec![Value::Int(1), Value::Null, Value::Int(1)]);

        let err = script
            .arguments(Dialect::Sqlite, &params(&[("id", Value::Int(1))]))
            .unwrap_err();
        assert!(matches!(err, ScriptError::UnboundParameter(name) if name == "value"));
    }
}
