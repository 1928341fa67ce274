pub mod ast;
pub mod errors;
pub mod lexer;
pub mod names;
pub mod parser;
pub mod span;
pub mod token;
