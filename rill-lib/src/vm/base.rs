//! The native primitive set the front end's default environment points at.
//!
//! Primitives get the execution context and the binding their result must
//! land in; they read their operands from the staged argument list.

use once_cell::sync::Lazy;

use std::collections::HashMap;

use crate::core::{BindName, Scope, Scopes, SymbolTable};
use crate::vm::{rt_err, Context, EvalError, Module, NativeFn};

pub const BASE_MODULE: &str = "Base";

fn external(name: &str) -> BindName {
    BindName::External {
        module: BASE_MODULE.to_owned(),
        name: name.to_owned(),
    }
}

/// The bindings every compilation starts from: the arithmetic operators and
/// `abs`, resolved to their Base primitives.
pub fn base_table() -> SymbolTable {
    let scope: Scope<String, BindName> = [
        ("+", "Add"),
        ("-", "Sub"),
        ("*", "Mul"),
        ("/", "Div"),
        ("abs", "Abs"),
    ]
    .iter()
    .map(|(op, name)| ((*op).to_owned(), external(name)))
    .collect();
    Scopes::from_global(scope)
}

static PRIMITIVES: Lazy<HashMap<String, NativeFn>> = Lazy::new(|| {
    let mut table: HashMap<String, NativeFn> = HashMap::new();
    table.insert("Add".to_owned(), add);
    table.insert("Sub".to_owned(), sub);
    table.insert("Mul".to_owned(), mul);
    table.insert("Div".to_owned(), div);
    table.insert("Abs".to_owned(), abs);
    table
});

/// The Base module itself, ready to be registered with an evaluator.
pub fn base_module() -> Module {
    Module::Native(PRIMITIVES.clone())
}

fn binary(context: &Context, name: &str) -> Result<(i64, i64), EvalError> {
    if context.args.len() != 2 {
        return Err(rt_err!(
            "{} takes two arguments, got {}",
            name,
            context.args.len()
        ));
    }
    Ok((context.arg(0)?, context.arg(1)?))
}

fn unary(context: &Context, name: &str) -> Result<i64, EvalError> {
    if context.args.len() != 1 {
        return Err(rt_err!(
            "{} takes one argument, got {}",
            name,
            context.args.len()
        ));
    }
    context.arg(0)
}

fn add(context: &mut Context, dest: BindName) -> Result<(), EvalError> {
    let (a, b) = binary(context, "Add")?;
    let value = a.checked_add(b).ok_or_else(|| rt_err!("addition overflow"))?;
    context.bind(dest, value)
}

fn sub(context: &mut Context, dest: BindName) -> Result<(), EvalError> {
    // with a single staged argument this is the prefix negation
    let value = if context.args.len() == 1 {
        context
            .arg(0)?
            .checked_neg()
            .ok_or_else(|| rt_err!("negation overflow"))?
    } else {
        let (a, b) = binary(context, "Sub")?;
        a.checked_sub(b)
            .ok_or_else(|| rt_err!("subtraction overflow"))?
    };
    context.bind(dest, value)
}

fn mul(context: &mut Context, dest: BindName) -> Result<(), EvalError> {
    let (a, b) = binary(context, "Mul")?;
    let value = a
        .checked_mul(b)
        .ok_or_else(|| rt_err!("multiplication overflow"))?;
    context.bind(dest, value)
}

fn div(context: &mut Context, dest: BindName) -> Result<(), EvalError> {
    let (a, b) = binary(context, "Div")?;
    if b == 0 {
        return Err(rt_err!("division by zero"));
    }
    let value = a.checked_div(b).ok_or_else(|| rt_err!("division overflow"))?;
    context.bind(dest, value)
}

fn abs(context: &mut Context, dest: BindName) -> Result<(), EvalError> {
    let value = unary(context, "Abs")?
        .checked_abs()
        .ok_or_else(|| rt_err!("absolute value overflow"))?;
    context.bind(dest, value)
}
