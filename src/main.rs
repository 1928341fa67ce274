use sprig_lang::diagnostics::{emit_runtime_error, emit_syntax_errors, report_io_error};
use sprig_lang::language::{lexer, names::NameTable, parser};
use sprig_lang::runtime::interpreter::Interpreter;
use std::env;
use std::fs;
use std::path::Path;
use std::process::exit;

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() != 3 || args[1] != "run" {
        eprintln!("Usage: sprig-lang run <filename.sprig>");
        exit(1);
    }

    let filename = &args[2];
    if !filename.ends_with(".sprig") {
        eprintln!("Invalid file extension. Only .sprig files are allowed.");
        exit(1);
    }

    let path = Path::new(filename);
    let source = match fs::read_to_string(path) {
        Ok(source) => source,
        Err(err) => {
            report_io_error(path, &err);
            exit(1);
        }
    };

    let tokens = match lexer::lex(&source) {
        Ok(tokens) => tokens,
        Err(errors) => {
            emit_syntax_errors(path, &source, &errors);
            exit(1);
        }
    };

    let mut names = NameTable::new();
    let program = match parser::parse_program(&tokens, &mut names) {
        Ok(program) => program,
        Err(err) => {
            emit_syntax_errors(path, &source, std::slice::from_ref(&err));
            exit(1);
        }
    };

    let mut interp = Interpreter::new(names);
    if let Err(err) = interp.run(&program) {
        emit_runtime_error(path, &source, &err);
        exit(1);
    }
}
