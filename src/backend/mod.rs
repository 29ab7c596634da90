use anyhow::Result;

use crate::ast::Program;

pub mod generator;
pub mod interpreter;

pub trait Backend {
    fn name(&self) -> &'static str;
    fn run(&mut self, program: &Program) -> Result<String>;
}

pub fn backends() -> Vec<Box<dyn Backend>> {
    vec![
        Box::new(interpreter::Interpreter::new()),
        Box::new(generator::Generator::new("Program")),
    ]
}
