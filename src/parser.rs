//! Recursive-descent parser producing the statement list and expression AST.
//!
//! Grammar, lowest precedence first:
//!
//! ```text
//! program    = stmt*
//! stmt       = "return" expr ";" | expr ";"
//! expr       = assign
//! assign     = equality ("=" assign)?
//! equality   = relational ("==" relational | "!=" relational)*
//! relational = add ("<" add | "<=" add | ">" add | ">=" add)*
//! add        = mul ("+" mul | "-" mul)*
//! mul        = unary ("*" unary | "/" unary)*
//! unary      = ("+" | "-")? primary
//! primary    = num | ident | "(" expr ")"
//! ```
//!
//! Variables are resolved while parsing: the first mention of a name
//! allocates the next stack slot and every later mention reuses it, so the
//! tree only ever holds frame offsets.

use tracing::{debug, trace};

use crate::error::{CompileError, CompileResult};
use crate::tokenizer::{Token, TokenKind, describe_token, token_text};

/// Size in bytes of the single integer type, and of every stack slot.
pub const WORD_SIZE: i64 = 8;

/// Deepest expression tree the parser will build. Parenthesised groups,
/// chained assignments and every further operator in a chain each count as
/// one level; the parser and the code generator both recurse once per level.
pub const MAX_DEPTH: usize = 256;

/// Binary operators that survive into the tree. `>` and `>=` are rewritten
/// to `Lt`/`Le` with their operands swapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
  Add,
  Sub,
  Mul,
  Div,
  Eq,
  Ne,
  Lt,
  Le,
}

/// Expression and statement tree produced by the parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AstNode {
  Num {
    value: i64,
  },
  /// Local variable, already resolved to its offset below the frame base.
  Var {
    offset: i64,
  },
  Binary {
    op: BinaryOp,
    lhs: Box<AstNode>,
    rhs: Box<AstNode>,
  },
  /// The parser guarantees `lhs` is a `Var`.
  Assign {
    lhs: Box<AstNode>,
    rhs: Box<AstNode>,
  },
  Return {
    expr: Box<AstNode>,
  },
}

impl AstNode {
  pub fn number(value: i64) -> Self {
    Self::Num { value }
  }

  pub fn var(offset: i64) -> Self {
    Self::Var { offset }
  }

  pub fn binary(op: BinaryOp, lhs: AstNode, rhs: AstNode) -> Self {
    Self::Binary {
      op,
      lhs: Box::new(lhs),
      rhs: Box::new(rhs),
    }
  }

  pub fn assign(lhs: AstNode, rhs: AstNode) -> Self {
    Self::Assign {
      lhs: Box::new(lhs),
      rhs: Box::new(rhs),
    }
  }

  pub fn ret(expr: AstNode) -> Self {
    Self::Return {
      expr: Box::new(expr),
    }
  }
}

/// Entry in the variable table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalVar {
  pub name: String,
  pub offset: i64,
}

/// Parsed program: statements in source order plus the variable table.
#[derive(Debug, Clone)]
pub struct Program {
  pub body: Vec<AstNode>,
  pub locals: Vec<LocalVar>,
  /// Bytes of frame space needed for all locals.
  pub stack_size: i64,
}

/// Parse a sequence of statements from the token stream.
pub fn parse(tokens: Vec<Token>, source: &str) -> CompileResult<Program> {
  let mut parser = Parser {
    stream: TokenStream::new(tokens, source),
    locals: Vec::new(),
    depth: 0,
  };

  let mut body = Vec::new();
  while !parser.stream.is_eof() {
    body.push(parser.parse_stmt()?);
  }

  let stack_size = parser.locals.len() as i64 * WORD_SIZE;
  debug!(
    statements = body.len(),
    locals = parser.locals.len(),
    stack_size,
    "parsed program"
  );

  Ok(Program {
    body,
    locals: parser.locals,
    stack_size,
  })
}

struct Parser<'a> {
  stream: TokenStream<'a>,
  locals: Vec<LocalVar>,
  depth: usize,
}

impl<'a> Parser<'a> {
  fn parse_stmt(&mut self) -> CompileResult<AstNode> {
    if self.stream.consume_kind(TokenKind::Return) {
      let expr = self.parse_expr()?;
      self.stream.skip(";")?;
      return Ok(AstNode::ret(expr));
    }

    let expr = self.parse_expr()?;
    self.stream.skip(";")?;
    Ok(expr)
  }

  fn parse_expr(&mut self) -> CompileResult<AstNode> {
    self.parse_assign()
  }

  fn parse_assign(&mut self) -> CompileResult<AstNode> {
    let start = self.stream.loc();
    let node = self.parse_equality()?;

    if self.stream.equal("=") {
      if !matches!(node, AstNode::Var { .. }) {
        return Err(CompileError::syntax(
          self.stream.source,
          start,
          "not an lvalue",
        ));
      }
      let depth = self.depth;
      self.descend()?;
      let rhs = self.parse_assign()?;
      self.depth = depth;
      return Ok(AstNode::assign(node, rhs));
    }

    Ok(node)
  }

  fn parse_equality(&mut self) -> CompileResult<AstNode> {
    let depth = self.depth;
    let mut node = self.parse_relational()?;

    loop {
      let op = match self.stream.peek_punct() {
        Some("==") => BinaryOp::Eq,
        Some("!=") => BinaryOp::Ne,
        _ => break,
      };

      self.stream.advance();
      self.descend()?;
      let rhs = self.parse_relational()?;
      node = AstNode::binary(op, node, rhs);
    }

    self.depth = depth;
    Ok(node)
  }

  fn parse_relational(&mut self) -> CompileResult<AstNode> {
    let depth = self.depth;
    let mut node = self.parse_add()?;

    loop {
      // `swap` marks `>`/`>=`, which become `<`/`<=` with operands exchanged.
      let (op, swap) = match self.stream.peek_punct() {
        Some("<") => (BinaryOp::Lt, false),
        Some("<=") => (BinaryOp::Le, false),
        Some(">") => (BinaryOp::Lt, true),
        Some(">=") => (BinaryOp::Le, true),
        _ => break,
      };

      self.stream.advance();
      self.descend()?;
      let rhs = self.parse_add()?;
      node = if swap {
        AstNode::binary(op, rhs, node)
      } else {
        AstNode::binary(op, node, rhs)
      };
    }

    self.depth = depth;
    Ok(node)
  }

  fn parse_add(&mut self) -> CompileResult<AstNode> {
    let depth = self.depth;
    let mut node = self.parse_mul()?;

    loop {
      let op = match self.stream.peek_punct() {
        Some("+") => BinaryOp::Add,
        Some("-") => BinaryOp::Sub,
        _ => break,
      };

      self.stream.advance();
      self.descend()?;
      let rhs = self.parse_mul()?;
      node = AstNode::binary(op, node, rhs);
    }

    self.depth = depth;
    Ok(node)
  }

  fn parse_mul(&mut self) -> CompileResult<AstNode> {
    let depth = self.depth;
    let mut node = self.parse_unary()?;

    loop {
      let op = match self.stream.peek_punct() {
        Some("*") => BinaryOp::Mul,
        Some("/") => BinaryOp::Div,
        _ => break,
      };

      self.stream.advance();
      self.descend()?;
      let rhs = self.parse_unary()?;
      node = AstNode::binary(op, node, rhs);
    }

    self.depth = depth;
    Ok(node)
  }

  fn parse_unary(&mut self) -> CompileResult<AstNode> {
    if self.stream.equal("+") {
      return self.parse_primary();
    }

    if self.stream.equal("-") {
      let operand = self.parse_primary()?;
      return Ok(AstNode::binary(BinaryOp::Sub, AstNode::number(0), operand));
    }

    self.parse_primary()
  }

  fn parse_primary(&mut self) -> CompileResult<AstNode> {
    if self.stream.peek_punct() == Some("(") {
      let depth = self.depth;
      self.descend()?;
      self.stream.advance();
      let node = self.parse_expr()?;
      self.stream.skip(")")?;
      self.depth = depth;
      return Ok(node);
    }

    if let Some(name) = self.stream.consume_ident() {
      let offset = self.resolve_local(name);
      return Ok(AstNode::var(offset));
    }

    if let Some(value) = self.stream.consume_number() {
      return Ok(AstNode::number(value));
    }

    Err(self.stream.unexpected("an expression"))
  }

  /// Enter one more level of nesting, failing at the current token once
  /// `MAX_DEPTH` is reached.
  fn descend(&mut self) -> CompileResult<()> {
    if self.depth >= MAX_DEPTH {
      return Err(CompileError::syntax(
        self.stream.source,
        self.stream.loc(),
        "expression nested too deeply",
      ));
    }
    self.depth += 1;
    Ok(())
  }

  /// Return the slot for `name`, allocating the next one on first mention.
  fn resolve_local(&mut self, name: &str) -> i64 {
    if let Some(var) = self.locals.iter().find(|var| var.name == name) {
      return var.offset;
    }

    let offset = self
      .locals
      .last()
      .map_or(WORD_SIZE, |var| var.offset + WORD_SIZE);
    trace!(name, offset, "allocated local");
    self.locals.push(LocalVar {
      name: name.to_string(),
      offset,
    });
    offset
  }
}

/// Lightweight cursor over the token vector.
struct TokenStream<'a> {
  tokens: Vec<Token>,
  source: &'a str,
  pos: usize,
}

impl<'a> TokenStream<'a> {
  /// Take ownership of the token stream; the parser will advance `pos` as it consumes input.
  fn new(tokens: Vec<Token>, source: &'a str) -> Self {
    Self {
      tokens,
      source,
      pos: 0,
    }
  }

  fn peek(&self) -> Option<&Token> {
    self.tokens.get(self.pos)
  }

  /// Text of the current token if it is a punctuator.
  fn peek_punct(&self) -> Option<&'a str> {
    let source = self.source;
    self
      .peek()
      .filter(|token| token.kind == TokenKind::Punctuator)
      .map(|token| token_text(token, source))
  }

  fn advance(&mut self) {
    self.pos += 1;
  }

  /// Byte offset of the current token, or the end of input.
  fn loc(&self) -> usize {
    self.peek().map_or(self.source.len(), |token| token.loc)
  }

  /// Consume the current token if it matches the provided punctuator.
  fn equal(&mut self, op: &str) -> bool {
    if self.peek_punct() == Some(op) {
      self.advance();
      return true;
    }
    false
  }

  fn consume_kind(&mut self, kind: TokenKind) -> bool {
    if self.peek().is_some_and(|token| token.kind == kind) {
      self.advance();
      return true;
    }
    false
  }

  fn skip(&mut self, s: &str) -> CompileResult<()> {
    if self.equal(s) {
      Ok(())
    } else {
      Err(self.unexpected(&format!("\"{s}\"")))
    }
  }

  fn consume_ident(&mut self) -> Option<&'a str> {
    let source = self.source;
    let name = self
      .peek()
      .filter(|token| token.kind == TokenKind::Ident)
      .map(|token| token_text(token, source))?;
    self.advance();
    Some(name)
  }

  fn consume_number(&mut self) -> Option<i64> {
    let value = self
      .peek()
      .filter(|token| token.kind == TokenKind::Num)
      .and_then(|token| token.value)?;
    self.advance();
    Some(value)
  }

  /// Syntax error at the current token, naming what was expected instead.
  fn unexpected(&self, expected: &str) -> CompileError {
    let got = describe_token(self.peek(), self.source);
    CompileError::syntax(
      self.source,
      self.loc(),
      format!("expected {expected}, but got \"{got}\""),
    )
  }

  fn is_eof(&self) -> bool {
    matches!(self.peek().map(|token| token.kind), Some(TokenKind::Eof))
  }
}
