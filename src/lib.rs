//! Crate root: wires together the compilation pipeline.
//!
//! - `tokenizer` performs lexical analysis and produces a flat token stream.
//! - `parser` owns all syntactic knowledge and returns the statement list
//!   together with the variable table.
//! - `codegen` lowers the program into x86-64 AT&T assembly.
//! - `error` centralises the caret-style diagnostics shared by the stages.
//! - `config` reads the environment knobs used by the binary.

pub mod config;
pub mod error;
pub mod parser;
pub mod tokenizer;

mod codegen;

pub use config::Config;
pub use error::{CompileError, CompileResult};

/// Compile a source string into AT&T assembly using the default configuration.
pub fn generate_assembly(source: &str) -> CompileResult<String> {
  generate_assembly_with(&Config::default(), source)
}

/// Compile a source string into AT&T assembly.
pub fn generate_assembly_with(config: &Config, source: &str) -> CompileResult<String> {
  let tokens = tokenizer::tokenize(source)?;
  let program = parser::parse(tokens, source)?;
  Ok(codegen::generate(&program, config))
}
