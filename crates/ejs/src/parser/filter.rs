//! Filter chain syntax: `base | name | name:arg1, arg2`.

use winnow::ascii::digit1;
use winnow::combinator::{alt, opt};
use winnow::prelude::*;
use winnow::token::{any, one_of, take_while};

use crate::error::CompileError;
use crate::parser::ast::{FilterArg, FilterCall};

/// Parse the text after `<%=:` into a base expression and its filters.
pub fn parse_chain(chain: &str, line: usize) -> Result<(String, Vec<FilterCall>), CompileError> {
    let invalid = |message: String| CompileError::InvalidFilter { line, message };

    let mut stages = split_outside_quotes(chain, '|').into_iter();
    let base = stages.next().unwrap_or_default().trim();
    if base.is_empty() {
        return Err(invalid("missing expression before first filter".to_string()));
    }

    let mut filters = Vec::new();
    for stage in stages {
        let stage = stage.trim();
        let (name, args) = match stage.split_once(':') {
            Some((name, args)) => (name.trim(), args),
            None => (stage, ""),
        };
        if !is_identifier(name) {
            return Err(invalid(format!("invalid filter name '{name}'")));
        }
        let args = if args.trim().is_empty() {
            Vec::new()
        } else {
            split_outside_quotes(args, ',')
                .into_iter()
                .map(|arg| {
                    filter_arg
                        .parse(arg.trim())
                        .map_err(|_| invalid(format!("invalid argument '{}' to '{name}'", arg.trim())))
                })
                .collect::<Result<Vec<_>, _>>()?
        };
        filters.push(FilterCall {
            name: name.to_string(),
            args,
        });
    }

    Ok((base.to_string(), filters))
}

/// Split on `separator` outside of quoted strings. A doubled `|` is the
/// logical-or operator, not a pipe.
fn split_outside_quotes(text: &str, separator: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            c if c == separator => {
                if separator == '|' && chars.peek().is_some_and(|&(_, next)| next == '|') {
                    chars.next();
                    continue;
                }
                parts.push(&text[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&text[start..]);
    parts
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
}

fn filter_arg(input: &mut &str) -> ModalResult<FilterArg> {
    alt((
        double_quoted.map(FilterArg::Str),
        single_quoted.map(FilterArg::Str),
        number.map(FilterArg::Number),
        name_path.map(|path: &str| FilterArg::Ident(path.to_string())),
    ))
    .parse_next(input)
}

fn double_quoted(input: &mut &str) -> ModalResult<String> {
    quoted(input, '"')
}

fn single_quoted(input: &mut &str) -> ModalResult<String> {
    quoted(input, '\'')
}

fn quoted(input: &mut &str, quote: char) -> ModalResult<String> {
    next_char.verify(|c: &char| *c == quote).parse_next(input)?;
    let mut text = String::new();
    loop {
        match next_char(input)? {
            c if c == quote => return Ok(text),
            '\\' => {
                let escaped = next_char(input)?;
                text.push(match escaped {
                    'n' => '\n',
                    't' => '\t',
                    'r' => '\r',
                    other => other,
                });
            }
            c => text.push(c),
        }
    }
}

fn next_char(input: &mut &str) -> ModalResult<char> {
    any.parse_next(input)
}

fn number(input: &mut &str) -> ModalResult<f64> {
    (opt(one_of(['-', '+'])), digit1, opt(('.', digit1)))
        .take()
        .try_map(str::parse::<f64>)
        .parse_next(input)
}

fn name_path<'i>(input: &mut &'i str) -> ModalResult<&'i str> {
    (
        one_of(|c: char| c.is_alphabetic() || c == '_' || c == '$'),
        take_while(0.., |c: char| c.is_alphanumeric() || matches!(c, '_' | '$' | '.')),
    )
        .take()
        .parse_next(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_base_and_filters() {
        let (base, filters) = parse_chain(" items | reverse | first ", 1).unwrap();
        assert_eq!(base, "items");
        let names: Vec<_> = filters.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["reverse", "first"]);
        assert!(filters.iter().all(|f| f.args.is_empty()));
    }

    #[test]
    fn parses_arguments() {
        let (_, filters) = parse_chain(r#" word | truncate: 2,"..." | join:"::" | get:user.name "#, 1).unwrap();
        assert_eq!(
            filters[0].args,
            vec![FilterArg::Number(2.0), FilterArg::Str("...".to_string())]
        );
        assert_eq!(filters[1].args, vec![FilterArg::Str("::".to_string())]);
        assert_eq!(filters[2].args, vec![FilterArg::Ident("user.name".to_string())]);
    }

    #[test]
    fn pipes_inside_quotes_and_logical_or_are_not_separators() {
        let (base, filters) = parse_chain(r#" a || b | join:"|" "#, 1).unwrap();
        assert_eq!(base, "a || b");
        assert_eq!(filters[0].args, vec![FilterArg::Str("|".to_string())]);
    }

    #[test]
    fn rejects_bad_names_and_arguments() {
        assert!(parse_chain(" x | 9lives ", 3).is_err());
        assert!(matches!(
            parse_chain(" x | join:( ", 3),
            Err(CompileError::InvalidFilter { line: 3, .. })
        ));
        assert!(parse_chain(" | first ", 1).is_err());
    }
}
