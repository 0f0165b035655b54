//! Code generation: lower the parsed program into AT&T x86-64 assembly.
//!
//! The emitter is a pure stack machine. Every expression pushes exactly one
//! word; binary operators pop their two operands and push the result.
//! Locals live below `%rbp` at the offsets the parser assigned, and the
//! program result is whatever ends up in `%rax` when the epilogue runs.

use tracing::debug;

use crate::config::Config;
use crate::parser::{AstNode, BinaryOp, Program};

/// Emit assembly for a whole program.
pub fn generate(program: &Program, config: &Config) -> String {
  let entry = &config.entry_symbol;
  let mut asm = String::new();
  asm.push_str(&format!(".global {entry}\n"));
  asm.push_str(&format!("{entry}:\n"));
  asm.push_str("    push %rbp\n");
  asm.push_str("    mov %rsp, %rbp\n");
  if program.stack_size > 0 {
    asm.push_str(&format!("    sub ${}, %rsp\n", program.stack_size));
  }

  if program.body.is_empty() {
    asm.push_str("    mov $0, %rax\n");
  }

  for stmt in &program.body {
    emit_stmt(stmt, &mut asm);
  }

  // Reached only when no `return` ran; `%rax` holds the last statement's value.
  emit_epilogue(&mut asm);

  debug!(bytes = asm.len(), "emitted assembly");
  asm
}

/// Emit one statement, leaving the operand stack empty afterwards.
fn emit_stmt(stmt: &AstNode, asm: &mut String) {
  match stmt {
    AstNode::Return { expr } => {
      emit_expr(expr, asm);
      asm.push_str("    pop %rax\n");
      emit_epilogue(asm);
    }
    expr => {
      emit_expr(expr, asm);
      asm.push_str("    pop %rax\n");
    }
  }
}

fn emit_epilogue(asm: &mut String) {
  asm.push_str("    mov %rbp, %rsp\n");
  asm.push_str("    pop %rbp\n");
  asm.push_str("    ret\n");
}

/// Emit stack-based code for a single expression node.
fn emit_expr(node: &AstNode, asm: &mut String) {
  match node {
    AstNode::Num { value } => {
      asm.push_str(&format!("    mov ${value}, %rax\n"));
      asm.push_str("    push %rax\n");
    }
    AstNode::Var { .. } => {
      emit_addr(node, asm);
      asm.push_str("    pop %rax\n");
      asm.push_str("    mov (%rax), %rax\n");
      asm.push_str("    push %rax\n");
    }
    AstNode::Assign { lhs, rhs } => {
      emit_expr(rhs, asm);
      emit_addr(lhs, asm);
      asm.push_str("    pop %rdi\n");
      asm.push_str("    pop %rax\n");
      asm.push_str("    mov %rax, (%rdi)\n");
      asm.push_str("    push %rax\n");
    }
    AstNode::Binary { op, lhs, rhs } => {
      emit_expr(lhs, asm);
      emit_expr(rhs, asm);
      asm.push_str("    pop %rdi\n");
      asm.push_str("    pop %rax\n");
      match op {
        BinaryOp::Add => asm.push_str("    add %rdi, %rax\n"),
        BinaryOp::Sub => asm.push_str("    sub %rdi, %rax\n"),
        BinaryOp::Mul => asm.push_str("    imul %rdi, %rax\n"),
        BinaryOp::Div => {
          asm.push_str("    cqo\n");
          asm.push_str("    idiv %rdi\n");
        }
        BinaryOp::Eq => emit_compare("sete", asm),
        BinaryOp::Ne => emit_compare("setne", asm),
        BinaryOp::Lt => emit_compare("setl", asm),
        BinaryOp::Le => emit_compare("setle", asm),
      }
      asm.push_str("    push %rax\n");
    }
    AstNode::Return { .. } => unreachable!("parser only builds return as a statement"),
  }
}

/// Compare `%rax` with `%rdi` and leave 0 or 1 in `%rax`.
fn emit_compare(set: &str, asm: &mut String) {
  asm.push_str("    cmp %rdi, %rax\n");
  asm.push_str(&format!("    {set} %al\n"));
  asm.push_str("    movzb %al, %rax\n");
}

/// Push the address of an lvalue.
fn emit_addr(node: &AstNode, asm: &mut String) {
  match node {
    AstNode::Var { offset } => {
      asm.push_str("    mov %rbp, %rax\n");
      asm.push_str(&format!("    sub ${offset}, %rax\n"));
      asm.push_str("    push %rax\n");
    }
    _ => unreachable!("parser only builds assignments to variables"),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::parser::parse;
  use crate::tokenizer::tokenize;

  fn compile(src: &str) -> String {
    let program = parse(tokenize(src).unwrap(), src).unwrap();
    generate(&program, &Config::default())
  }

  fn body_lines(asm: &str) -> Vec<&str> {
    asm.lines().map(str::trim).collect()
  }

  /// Net push/pop balance of the emitted instructions, ignoring the frame.
  fn stack_depth(lines: &[&str]) -> i64 {
    lines
      .iter()
      .filter(|line| !line.ends_with("%rbp"))
      .map(|line| {
        if line.starts_with("push ") {
          1
        } else if line.starts_with("pop ") {
          -1
        } else {
          0
        }
      })
      .sum()
  }

  #[test]
  fn frame_reserves_one_word_per_variable() {
    let asm = compile("a=1;b=2;c=a+b;");
    assert!(asm.starts_with(".global main\nmain:\n    push %rbp\n    mov %rsp, %rbp\n"));
    assert!(asm.contains("    sub $24, %rsp\n"));
  }

  #[test]
  fn no_frame_reservation_without_variables() {
    let asm = compile("1;");
    assert!(!asm.lines().any(|l| l.trim().starts_with("sub $") && l.ends_with("%rsp")));
  }

  #[test]
  fn every_statement_leaves_stack_balanced() {
    let asm = compile("a=3; b=5*6-8; a+b; a==b; a<b;");
    let lines = body_lines(&asm);
    assert_eq!(stack_depth(&lines), 0);
  }

  #[test]
  fn number_is_pushed() {
    let asm = compile("42;");
    assert!(asm.contains("    mov $42, %rax\n    push %rax\n    pop %rax\n"));
  }

  #[test]
  fn variable_rvalue_loads_through_address() {
    let asm = compile("a;");
    assert!(asm.contains(
      "    mov %rbp, %rax\n    sub $8, %rax\n    push %rax\n    pop %rax\n    mov (%rax), %rax\n    push %rax\n"
    ));
  }

  #[test]
  fn assignment_evaluates_value_then_address_and_keeps_value() {
    let asm = compile("a=7;");
    assert!(asm.contains(
      "    mov $7, %rax\n    push %rax\n    mov %rbp, %rax\n    sub $8, %rax\n    push %rax\n    pop %rdi\n    pop %rax\n    mov %rax, (%rdi)\n    push %rax\n"
    ));
  }

  #[test]
  fn binary_evaluates_left_before_right() {
    let asm = compile("1-2;");
    let one = asm.find("mov $1, %rax").unwrap();
    let two = asm.find("mov $2, %rax").unwrap();
    assert!(one < two);
    assert!(asm.contains("    pop %rdi\n    pop %rax\n    sub %rdi, %rax\n    push %rax\n"));
  }

  #[test]
  fn comparisons_yield_boolean_word() {
    for (src, set) in [("1==2;", "sete"), ("1!=2;", "setne"), ("1<2;", "setl"), ("1<=2;", "setle")] {
      let asm = compile(src);
      assert!(
        asm.contains(&format!("    cmp %rdi, %rax\n    {set} %al\n    movzb %al, %rax\n")),
        "{src}"
      );
    }
  }

  #[test]
  fn greater_than_matches_swapped_less_than() {
    assert_eq!(compile("a=1;b=2;a>b;"), compile("a=1;b=2;b<a;"));
    assert_eq!(compile("3>=4;"), compile("4<=3;"));
  }

  #[test]
  fn division_sign_extends() {
    let asm = compile("7/2;");
    assert!(asm.contains("    cqo\n    idiv %rdi\n"));
  }

  #[test]
  fn return_moves_value_and_leaves_frame() {
    let asm = compile("return 5;");
    assert!(asm.contains(
      "    mov $5, %rax\n    push %rax\n    pop %rax\n    mov %rbp, %rsp\n    pop %rbp\n    ret\n"
    ));
  }

  #[test]
  fn statements_after_return_are_still_emitted() {
    let asm = compile("return 1; 2;");
    assert_eq!(asm.matches("ret\n").count(), 2);
    let first_ret = asm.find("ret\n").unwrap();
    let two = asm.find("mov $2, %rax").unwrap();
    assert!(first_ret < two);
  }

  #[test]
  fn empty_program_returns_zero() {
    let asm = compile("");
    assert_eq!(
      asm,
      ".global main\nmain:\n    push %rbp\n    mov %rsp, %rbp\n    mov $0, %rax\n    mov %rbp, %rsp\n    pop %rbp\n    ret\n"
    );
  }

  #[test]
  #[should_panic(expected = "parser only builds return as a statement")]
  fn nested_return_is_rejected() {
    let program = Program {
      body: vec![AstNode::binary(
        BinaryOp::Add,
        AstNode::number(1),
        AstNode::ret(AstNode::number(2)),
      )],
      locals: Vec::new(),
      stack_size: 0,
    };
    generate(&program, &Config::default());
  }

  #[test]
  fn entry_symbol_comes_from_config() {
    let src = "1;";
    let program = parse(tokenize(src).unwrap(), src).unwrap();
    let config = Config {
      entry_symbol: "start".into(),
      ..Config::default()
    };
    let asm = generate(&program, &config);
    assert!(asm.starts_with(".global start\nstart:\n"));
  }
}
