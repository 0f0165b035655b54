use std::env;
use std::ffi::OsString;
use std::io;
use std::process;

use stackcc::tokenizer::decode_source;
use stackcc::{CompileResult, Config, generate_assembly_with};
use tracing::{debug, warn};

fn main() {
  let args: Vec<OsString> = env::args_os().collect();
  if args.len() != 2 {
    let program = args
      .first()
      .map(|arg| arg.to_string_lossy().into_owned())
      .unwrap_or_else(|| "stackcc".to_string());
    eprintln!("usage: {program} <source>");
    process::exit(1);
  }

  let (config, rejected) = Config::from_env();
  tracing_subscriber::fmt()
    .with_writer(io::stderr)
    .with_max_level(config.log_level)
    .with_target(false)
    .init();
  for message in &rejected {
    warn!("{message}");
  }
  debug!(entry = %config.entry_symbol, "compiling");

  match compile(&config, args[1].clone()) {
    Ok(asm) => print!("{asm}"),
    Err(err) => {
      eprintln!("{err}");
      process::exit(1);
    }
  }
}

fn compile(config: &Config, arg: OsString) -> CompileResult<String> {
  let source = decode_source(arg.into_encoded_bytes())?;
  generate_assembly_with(config, &source)
}
