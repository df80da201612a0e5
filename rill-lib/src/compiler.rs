//! Lowers the statement tree to the flat instruction stream.
//!
//! Lowering resolves every identifier through the scope chain, allocates a
//! fresh binding identity per produced value, and emits the hold/drop
//! bookkeeping that keeps the stream's reference counts balanced: a call
//! holds its callee and every argument while they are live and drops them
//! once the call has consumed them, and a closing scope drops every name it
//! introduced.

use thiserror::Error;

use std::ops::Range;

use crate::core::{
    condition_offsets, BindName, CodeBuilder, Expression, ExpressionKind, Instruction, Statement,
    StatementKind, SymbolTable, FUNCTION_HEADER_LEN,
};

pub type CompilationResult<T> = Result<T, CompilationError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompilationError {
    #[error("undefined symbol: {name}")]
    UndefinedSymbol {
        name: String,
        /// token range of the expression the symbol occurred in
        tokens: Range<usize>,
    },
}

/// Lowering interface implemented by the tree node types.
pub trait Compilable {
    /// What lowering a node hands back to its surrounding context:
    /// expressions return the binding holding their result, statements
    /// return nothing.
    type Output;

    fn compile(&self, builder: &mut CodeBuilder) -> CompilationResult<Self::Output>;
}

/// Lower a statement tree against the given environment. The environment's
/// entries stay resolvable everywhere, including inside function bodies.
pub fn generate(
    statement: &Statement,
    env: &SymbolTable,
) -> CompilationResult<Vec<Instruction>> {
    let mut builder = CodeBuilder::new(env);
    statement.compile(&mut builder)?;
    Ok(builder.into_instructions())
}

impl Compilable for Statement {
    type Output = ();

    fn compile(&self, builder: &mut CodeBuilder) -> CompilationResult<()> {
        use StatementKind::*;
        match &self.kind {
            Assignment(name, expr) => {
                let value = expr.compile(builder)?;
                builder.bind(name, value);
                Ok(())
            }
            Condition(condition, true_branch, false_branch) => {
                let condition = condition.compile(builder)?;
                let true_code = builder.branch(|b| true_branch.compile(b))?;
                let false_code = builder.branch(|b| false_branch.compile(b))?;
                let (clear_false, clear_true) =
                    condition_offsets(false_code.len(), true_code.len());
                builder.emit(Instruction::JumpIf(clear_false, condition));
                builder.extend(false_code);
                builder.emit(Instruction::Jump(clear_true));
                builder.extend(true_code);
                Ok(())
            }
            Block(statements) => {
                builder.open_scope();
                for statement in statements {
                    statement.compile(builder)?;
                }
                builder.collapse_scope();
                Ok(())
            }
        }
    }
}

impl Compilable for Expression {
    type Output = BindName;

    fn compile(&self, builder: &mut CodeBuilder) -> CompilationResult<BindName> {
        use ExpressionKind::*;
        match &self.kind {
            Number(value) => {
                let dest = builder.fresh();
                builder.emit(Instruction::Constant(dest.clone(), *value));
                Ok(dest)
            }
            Identifier(name) => {
                builder
                    .resolve(name)
                    .ok_or_else(|| CompilationError::UndefinedSymbol {
                        name: name.clone(),
                        tokens: self.tokens.clone(),
                    })
            }
            Calling(callee, args) => {
                let dest = builder.fresh();
                let callee = callee.compile(builder)?;
                builder.emit(Instruction::Hold(callee.clone(), Some(dest.clone())));
                let mut arg_names = Vec::with_capacity(args.len());
                for arg in args {
                    let arg_name = arg.compile(builder)?;
                    builder.emit(Instruction::Hold(arg_name.clone(), Some(dest.clone())));
                    arg_names.push(arg_name);
                }
                builder.emit(Instruction::Arg(arg_names.clone()));
                builder.emit(Instruction::Calling(dest.clone(), callee.clone()));
                builder.emit(Instruction::Drop(callee));
                for arg_name in arg_names {
                    builder.emit(Instruction::Drop(arg_name));
                }
                Ok(dest)
            }
            Function(params, body) => {
                let body_code = builder.function_body(|b| {
                    for (index, param) in params.iter().enumerate() {
                        let name = b.fresh();
                        b.emit(Instruction::Unarg(name.clone(), index));
                        b.bind(param, name);
                    }
                    body.compile(b)?;
                    b.emit(Instruction::JumpBack);
                    Ok(())
                })?;
                // the function value is the address of the first body
                // instruction, right behind this constant and the jump
                // that clears the body
                let dest = builder.fresh();
                let address = builder.len() + FUNCTION_HEADER_LEN;
                builder.emit(Instruction::Constant(dest.clone(), address as i64));
                builder.emit(Instruction::Jump(body_code.len() as isize));
                builder.extend(body_code);
                Ok(dest)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::render;
    use crate::parser::parse;
    use crate::scanner::scan;
    use crate::vm::base::base_table;

    fn listing(source: &str) -> String {
        let tokens = scan(source).unwrap();
        let program = parse(&tokens).unwrap();
        render(&generate(&program, &base_table()).unwrap())
    }

    fn lower(source: &str) -> CompilationResult<Vec<Instruction>> {
        let tokens = scan(source).unwrap();
        let program = parse(&tokens).unwrap();
        generate(&program, &base_table())
    }

    #[test]
    fn assignment_drops_its_binding_at_scope_exit() {
        assert_eq!(listing("x <- 42"), "x0 <- 42\ndrop x0\n");
    }

    #[test]
    fn nested_calls_balance_holds_and_drops() {
        assert_eq!(
            listing("z <- 1 + 2 * 3"),
            "\
hold Base.Add for x0
x1 <- 1
hold x1 for x0
hold Base.Mul for x2
x3 <- 2
hold x3 for x2
x4 <- 3
hold x4 for x2
arg [x3, x4]
x2 <- call Base.Mul
drop Base.Mul
drop x3
drop x4
hold x2 for x0
arg [x1, x2]
x0 <- call Base.Add
drop Base.Add
drop x1
drop x2
drop x0
"
        );
    }

    #[test]
    fn call_arguments_are_staged_in_source_order() {
        let code = lower("a <- 1\nb <- 2\nz <- abs(a, b)").unwrap();
        let staged: Vec<_> = code
            .iter()
            .filter_map(|instruction| match instruction {
                Instruction::Arg(names) => Some(names.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(
            staged,
            vec![vec![BindName::Anonymous(0), BindName::Anonymous(1)]]
        );
    }

    #[test]
    fn conditionals_lay_out_false_branch_first() {
        assert_eq!(
            listing("x <- 1\nif x then y <- 2 else y <- 3"),
            "\
x0 <- 1
x0 ?> 2
x2 <- 3
>> 1
x1 <- 2
drop x0
"
        );
    }

    #[test]
    fn conditional_branch_blocks_drop_their_own_names() {
        assert_eq!(
            listing("a <- 1\nif a\n  b <- 2\n  c <- 3\nelse\n  d <- 4"),
            "\
x0 <- 1
x0 ?> 3
x3 <- 4
drop x3
>> 4
x1 <- 2
x2 <- 3
drop x1
drop x2
drop x0
"
        );
    }

    #[test]
    fn function_literals_splice_their_body_behind_a_jump() {
        assert_eq!(
            listing("f <- \\a, b -> c <- a"),
            "\
x2 <- 2
>> 3
x0 <- arg 0
x1 <- arg 1
<<
drop x2
"
        );
    }

    #[test]
    fn unresolved_identifiers_fail_lowering() {
        let error = lower("x <- y").unwrap_err();
        assert_eq!(
            error,
            CompilationError::UndefinedSymbol {
                name: "y".into(),
                tokens: 2..3,
            }
        );
    }

    #[test]
    fn sibling_assignments_to_one_name_shadow_instead_of_reassigning() {
        let code = lower("x <- 1\nx <- 2").unwrap();
        assert_eq!(
            code,
            vec![
                Instruction::Constant(BindName::Anonymous(0), 1),
                Instruction::Constant(BindName::Anonymous(1), 2),
                Instruction::Drop(BindName::Anonymous(1)),
            ]
        );
    }

    #[test]
    fn inner_blocks_never_drop_outer_names() {
        let code = lower("a <- 1\nif a\n  b <- 2\nelse\n  c <- 3").unwrap();
        let drops: Vec<_> = code
            .iter()
            .filter(|instruction| matches!(instruction, Instruction::Drop(_)))
            .collect();
        // one drop per branch block binding, one for the outer `a`
        assert_eq!(
            drops,
            vec![
                &Instruction::Drop(BindName::Anonymous(2)),
                &Instruction::Drop(BindName::Anonymous(1)),
                &Instruction::Drop(BindName::Anonymous(0)),
            ]
        );
    }

    #[test]
    fn function_bodies_reach_parameters_and_globals() {
        assert!(lower("f <- \\a -> b <- a + 1").is_ok());
    }

    #[test]
    fn function_bodies_cannot_capture_enclosing_locals() {
        let error = lower("x <- 1\nf <- \\a -> b <- x").unwrap_err();
        assert!(matches!(
            error,
            CompilationError::UndefinedSymbol { ref name, .. } if name == "x"
        ));
    }

    #[test]
    fn the_default_environment_resolves_the_base_operators() {
        for source in [
            "x <- 1 + 2",
            "x <- 1 - 2",
            "x <- 1 * 2",
            "x <- 1 / 2",
            "x <- abs(1)",
        ] {
            assert!(lower(source).is_ok(), "source: {}", source);
        }
    }
}
