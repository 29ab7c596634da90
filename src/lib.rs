pub mod ast;
pub mod backend;
pub mod fixtures;
pub mod lexer;
pub mod parser;
pub mod scope;
pub mod token;
pub mod types;
pub mod walk;
