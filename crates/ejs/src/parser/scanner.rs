//! Splits template text into literal and tag segments.
//!
//! Scanning alternates between literal mode, which runs up to the next open
//! delimiter, and tag mode, which runs up to the next close delimiter. Tags
//! are classified by the character right after the open delimiter.

use std::mem;

use winnow::prelude::*;
use winnow::stream::Stream;
use winnow::token::take_until;

use crate::error::CompileError;
use crate::options::Delimiters;
use crate::parser::ast::{Segment, SegmentKind};
use crate::parser::filter::parse_chain;

/// Scan a template into segments.
pub fn parse_template(
    input: &str,
    delimiters: &Delimiters,
    filename: Option<&str>,
) -> Result<Vec<Segment>, CompileError> {
    let mut scanner = Scanner {
        remaining: input,
        line: 1,
        delimiters,
        filename,
        segments: Vec::new(),
    };
    scanner.scan()?;
    Ok(scanner.segments)
}

struct Scanner<'i, 'd> {
    remaining: &'i str,
    line: usize,
    delimiters: &'d Delimiters,
    filename: Option<&'d str>,
    segments: Vec<Segment>,
}

impl<'i> Scanner<'i, '_> {
    fn scan(&mut self) -> Result<(), CompileError> {
        let delimiters = self.delimiters;
        let open = delimiters.open();
        let close = delimiters.close();
        let marker = delimiters.literal_marker();

        loop {
            let Some(text) = until(&mut self.remaining, open) else {
                let text = mem::take(&mut self.remaining);
                self.push_literal(text);
                return Ok(());
            };
            self.push_literal(text);

            let line = self.line;
            if self.remaining.starts_with(marker.as_str()) {
                self.remaining.next_slice(marker.len());
                self.segments.push(Segment {
                    kind: SegmentKind::LiteralTagEscape(open.to_string()),
                    line,
                    newlines: count_newlines(open),
                    trim: false,
                });
                self.line += count_newlines(open);
                continue;
            }

            self.remaining.next_slice(open.len());
            let Some(body) = until(&mut self.remaining, close) else {
                return Err(CompileError::UnterminatedTag {
                    close: close.to_string(),
                    line,
                    filename: self.filename.map(ToString::to_string),
                });
            };
            self.remaining.next_slice(close.len());

            let newlines = count_newlines(open) + count_newlines(body) + count_newlines(close);
            let segment = tag(body, line, newlines)?;
            self.line += newlines;
            self.segments.push(segment);
        }
    }

    fn push_literal(&mut self, text: &'i str) {
        if text.is_empty() {
            return;
        }
        let newlines = count_newlines(text);
        self.segments.push(Segment {
            kind: SegmentKind::Literal(text.to_string()),
            line: self.line,
            newlines,
            trim: false,
        });
        self.line += newlines;
    }
}

/// Consume input up to (not including) `needle`.
fn until<'i>(input: &mut &'i str, needle: &str) -> Option<&'i str> {
    let found: ModalResult<&'i str> = take_until(0.., needle).parse_next(input);
    found.ok()
}

/// Classify a tag body.
fn tag(body: &str, line: usize, newlines: usize) -> Result<Segment, CompileError> {
    let (sigil, rest) = match body.chars().next() {
        Some(c @ ('=' | '-' | '#')) => (Some(c), &body[1..]),
        _ => (None, body),
    };
    let (code, trim) = match rest.strip_suffix('-') {
        Some(code) => (code, true),
        None => (rest, false),
    };

    let kind = match sigil {
        Some('#') => SegmentKind::Comment(code.to_string()),
        Some(c) => {
            let escape = c == '=';
            match code.strip_prefix(':') {
                Some(chain) => {
                    let (base, filters) = parse_chain(chain, line)?;
                    SegmentKind::FilteredExpression {
                        base,
                        filters,
                        escape,
                    }
                }
                None => SegmentKind::Expression {
                    code: code.to_string(),
                    escape,
                },
            }
        }
        None => SegmentKind::Scriptlet(code.to_string()),
    };

    Ok(Segment {
        kind,
        line,
        newlines,
        trim,
    })
}

fn count_newlines(text: &str) -> usize {
    text.bytes().filter(|&b| b == b'\n').count()
}
