//! Diagnostics shared by every stage of the pipeline.
//!
//! Both error kinds are fatal and carry a pre-rendered view of the offending
//! source line with a caret under the failing byte, so callers only need to
//! print them.

use snafu::Snafu;

pub type CompileResult<T> = Result<T, CompileError>;

#[derive(Debug, Snafu)]
pub enum CompileError {
  /// An input character matches none of the token shapes.
  #[snafu(display("{line}\n{marker} {message}"))]
  Lex {
    line: String,
    marker: String,
    message: String,
    loc: usize,
  },
  /// The parser reached a grammar position whose required token is absent.
  #[snafu(display("{line}\n{marker} {message}"))]
  Syntax {
    line: String,
    marker: String,
    message: String,
    loc: usize,
  },
}

impl CompileError {
  /// Lexical error anchored at byte offset `loc` of `source`.
  pub fn lex(source: &str, loc: usize, message: impl Into<String>) -> Self {
    let (line, marker) = locate(source, loc);
    Self::Lex {
      line,
      marker,
      message: message.into(),
      loc,
    }
  }

  /// Syntax error anchored at byte offset `loc` of `source`.
  pub fn syntax(source: &str, loc: usize, message: impl Into<String>) -> Self {
    let (line, marker) = locate(source, loc);
    Self::Syntax {
      line,
      marker,
      message: message.into(),
      loc,
    }
  }

  /// Byte offset into the source where the error was detected.
  pub fn loc(&self) -> usize {
    match self {
      Self::Lex { loc, .. } | Self::Syntax { loc, .. } => *loc,
    }
  }

  pub fn message(&self) -> &str {
    match self {
      Self::Lex { message, .. } | Self::Syntax { message, .. } => message,
    }
  }

  pub fn is_syntax(&self) -> bool {
    matches!(self, Self::Syntax { .. })
  }
}

/// Render the line containing `loc` and a caret marker pointing at it.
fn locate(source: &str, loc: usize) -> (String, String) {
  let mut at = loc.min(source.len());
  while !source.is_char_boundary(at) {
    at -= 1;
  }

  let start = source[..at].rfind('\n').map_or(0, |i| i + 1);
  let end = source[at..].find('\n').map_or(source.len(), |i| at + i);
  let column = source[start..at].chars().count();

  let line = source[start..end].to_string();
  let marker = format!("{}^", " ".repeat(column));
  (line, marker)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn caret_points_at_offending_byte() {
    let err = CompileError::syntax("1+;", 2, "expected an expression");
    assert_eq!(err.to_string(), "1+;\n  ^ expected an expression");
    assert_eq!(err.loc(), 2);
    assert!(err.is_syntax());
  }

  #[test]
  fn offset_zero_has_no_padding() {
    let err = CompileError::lex("$", 0, "invalid token: '$'");
    assert_eq!(err.to_string(), "$\n^ invalid token: '$'");
    assert!(!err.is_syntax());
  }

  #[test]
  fn end_of_input_is_clamped() {
    let err = CompileError::syntax("a", 7, "expected \";\"");
    assert_eq!(err.to_string(), "a\n ^ expected \";\"");
  }

  #[test]
  fn multiline_source_shows_only_the_failing_line() {
    let err = CompileError::syntax("a=1;\nb=;", 7, "expected an expression");
    assert_eq!(err.to_string(), "b=;\n  ^ expected an expression");
  }
}
