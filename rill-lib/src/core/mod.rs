//! contains all important data structures

pub mod token;
pub use token::*;

pub mod ast;
pub use ast::*;

pub mod names;
pub use names::*;

pub mod scopes;
pub use scopes::*;

pub mod instruction;
pub use instruction::*;

pub mod code_builder;
pub use code_builder::*;
