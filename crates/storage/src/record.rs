// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! File log record codec
//!
//! One line per event, tab-separated fields `sequence\tkind\tkey\tvalue`,
//! newline-terminated. Tabs, newlines, and backslashes inside key and value
//! are backslash-escaped so the line framing survives arbitrary strings.

use okv_core::{Event, EventKind};
use std::borrow::Cow;
use thiserror::Error;

/// Parse failures for a single record line.
#[derive(Debug, Error, PartialEq, Eq)]
pub(crate) enum RecordError {
    #[error("expected 4 tab-separated fields")]
    FieldCount,
    #[error("invalid sequence number: {0}")]
    BadSequence(String),
    #[error("unknown event kind code: {0}")]
    BadKind(String),
    #[error("invalid escape sequence in field")]
    BadEscape,
}

/// Serialize one event as a single log line, trailing newline included.
pub(crate) fn encode(event: &Event) -> String {
    format!(
        "{}\t{}\t{}\t{}\n",
        event.sequence,
        event.kind.code(),
        escape(&event.key),
        escape(&event.value),
    )
}

/// Parse a single log line (without its trailing newline).
pub(crate) fn decode(line: &str) -> Result<Event, RecordError> {
    let mut fields = line.splitn(4, '\t');
    let sequence = fields.next().ok_or(RecordError::FieldCount)?;
    let kind = fields.next().ok_or(RecordError::FieldCount)?;
    let key = fields.next().ok_or(RecordError::FieldCount)?;
    let value = fields.next().ok_or(RecordError::FieldCount)?;

    let sequence: u64 = sequence
        .parse()
        .map_err(|_| RecordError::BadSequence(sequence.to_string()))?;
    let code: u8 = kind
        .parse()
        .map_err(|_| RecordError::BadKind(kind.to_string()))?;
    let kind = EventKind::from_code(code).ok_or_else(|| RecordError::BadKind(kind.to_string()))?;

    Ok(Event {
        sequence,
        kind,
        key: unescape(key)?,
        value: unescape(value)?,
    })
}

fn escape(field: &str) -> Cow<'_, str> {
    if !field.contains(['\\', '\t', '\n']) {
        return Cow::Borrowed(field);
    }

    let mut out = String::with_capacity(field.len() + 4);
    for c in field.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            _ => out.push(c),
        }
    }
    Cow::Owned(out)
}

fn unescape(field: &str) -> Result<String, RecordError> {
    if !field.contains('\\') {
        return Ok(field.to_string());
    }

    let mut out = String::with_capacity(field.len());
    let mut chars = field.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            _ => return Err(RecordError::BadEscape),
        }
    }
    Ok(out)
}

#[cfg(test)]
#[path = "record_tests.rs"]
mod tests;
