//! Front end and instruction lowering for the rill language.
//!
//! Currently, what you need to do to evaluate a script is the following:
//! 1. load the source file into a string.
//! 1. scan it into tokens using [`scanner::scan`]
//! 1. parse the tokens into a statement tree using [`parser::parse`]
//! 1. lower the tree against the default environment using
//!    [`compiler::generate`], which yields the instruction stream
//! 1. print the stream with [`core::render`], or register it as the main
//!    module of an [`vm::Evaluator`] next to the Base module and run it:
//!
//!    ```
//!    use rill_lib::{compiler, parser, scanner, vm};
//!
//!    let tokens = scanner::scan("x <- 1 + 2").unwrap();
//!    let program = parser::parse(&tokens).unwrap();
//!    let code = compiler::generate(&program, &vm::base::base_table()).unwrap();
//!
//!    let mut evaluator = vm::Evaluator::new(vm::Module::Generated(code));
//!    evaluator.register(vm::base::BASE_MODULE, vm::base::base_module());
//!    evaluator.run().unwrap();
//!    ```

pub mod compiler;
pub mod core;
pub mod parser;
pub mod scanner;
pub mod vm;
