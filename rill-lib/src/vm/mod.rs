//! Executes generated instruction streams.
//!
//! The evaluator holds a registry of modules and a single mutable
//! [`Context`]. One instruction is executed per [`Evaluator::step`]; the
//! offset is advanced before the instruction acts, so jump offsets are
//! relative to the instruction after the jump. Calls into anonymous
//! bindings jump to the address stored in the binding; calls into external
//! bindings go through the registry, where a native module dispatches the
//! primitive directly and a generated module is entered through a new call
//! frame.

use thiserror::Error;

use std::collections::HashMap;

use crate::core::{BindName, Instruction};

pub mod base;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EvalError {
    #[error("reached the end of the instruction list")]
    IsEnd,

    #[error("reassignment of bound name {0}")]
    Reassign(BindName),

    #[error("reference to unbound name {0}")]
    InvalidName(BindName),

    #[error("no staged argument at position {0}")]
    MissingArgument(usize),

    #[error("unknown module {0}")]
    UnknownModule(String),

    #[error("unknown primitive {module}.{name}")]
    UnknownPrimitive { module: String, name: String },

    #[error("runtime error: {0}")]
    Runtime(String),
}

macro_rules! rt_err {
    ($msg:literal $(, $args:expr)*) => { EvalError::Runtime(format!($msg $(, $args)*)) };
}
pub(crate) use rt_err;

/// Signature of a native primitive: full access to the execution context to
/// read the staged arguments, plus the binding the result must be written
/// to.
pub type NativeFn = fn(&mut Context, BindName) -> Result<(), EvalError>;

/// A unit the evaluator can call into: either generated code or a table of
/// native primitives keyed by name.
#[derive(Clone)]
pub enum Module {
    Generated(Vec<Instruction>),
    Native(HashMap<String, NativeFn>),
}

/// A call frame: where to pick up again when the callee returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub module: String,
    pub offset: usize,
}

/// The mutable state one evaluation runs against. Created per top-level
/// evaluation and discarded afterwards.
#[derive(Debug, Default)]
pub struct Context {
    /// name of the module the offset points into
    pub module: String,
    pub offset: usize,
    /// the argument list staged for the in-flight call
    pub args: Vec<BindName>,
    pub frames: Vec<Frame>,
    pub mem: HashMap<BindName, i64>,
    pub ref_count: HashMap<BindName, usize>,
}

impl Context {
    /// Insert a fresh binding with one reference.
    pub fn bind(&mut self, name: BindName, value: i64) -> Result<(), EvalError> {
        if self.mem.contains_key(&name) {
            return Err(EvalError::Reassign(name));
        }
        self.ref_count.insert(name.clone(), 1);
        self.mem.insert(name, value);
        Ok(())
    }

    /// Current value of a binding.
    pub fn value(&self, name: &BindName) -> Result<i64, EvalError> {
        self.mem
            .get(name)
            .copied()
            .ok_or_else(|| EvalError::InvalidName(name.clone()))
    }

    /// Value of the staged argument at `index`.
    pub fn arg(&self, index: usize) -> Result<i64, EvalError> {
        let name = self
            .args
            .get(index)
            .ok_or(EvalError::MissingArgument(index))?;
        self.value(name)
    }
}

/// Name under which [`Evaluator::new`] registers the main module.
pub const MAIN_MODULE: &str = "Main";

pub struct Evaluator {
    modules: HashMap<String, Module>,
    pub context: Context,
}

impl Evaluator {
    /// An evaluator whose `Main` module is the given one, positioned at its
    /// first instruction.
    pub fn new(main: Module) -> Self {
        let mut modules = HashMap::new();
        modules.insert(MAIN_MODULE.to_owned(), main);
        Evaluator {
            modules,
            context: Context {
                module: MAIN_MODULE.to_owned(),
                ..Context::default()
            },
        }
    }

    /// Register a module under `name`, replacing any previous entry.
    pub fn register(&mut self, name: &str, module: Module) {
        self.modules.insert(name.to_owned(), module);
    }

    /// Execute the instruction under the current offset.
    pub fn step(&mut self) -> Result<(), EvalError> {
        let instructions = match self.modules.get(&self.context.module) {
            Some(Module::Generated(instructions)) => instructions,
            Some(Module::Native(_)) => {
                panic!("module {} is native, it cannot be stepped", self.context.module)
            }
            None => return Err(EvalError::UnknownModule(self.context.module.clone())),
        };
        if self.context.offset >= instructions.len() {
            return Err(EvalError::IsEnd);
        }
        let instruction = instructions[self.context.offset].clone();
        self.context.offset += 1;

        use Instruction::*;
        match instruction {
            Constant(name, value) => self.context.bind(name, value),
            Hold(name, _) => self.hold(name),
            Drop(name) => self.drop_ref(name),
            Arg(names) => {
                self.context.args = names;
                Ok(())
            }
            Unarg(dest, index) => {
                let value = self.context.arg(index)?;
                self.context.bind(dest, value)
            }
            Calling(dest, callee) => self.call(dest, callee),
            JumpIf(offset, condition) => {
                if self.context.value(&condition)? != 0 {
                    self.jump(offset);
                }
                Ok(())
            }
            Jump(offset) => {
                self.jump(offset);
                Ok(())
            }
            JumpBack => self.jump_back(),
        }
    }

    /// Step until the program runs out of instructions.
    pub fn run(&mut self) -> Result<(), EvalError> {
        loop {
            match self.step() {
                Ok(()) => {}
                Err(EvalError::IsEnd) => return Ok(()),
                Err(error) => return Err(error),
            }
        }
    }

    fn jump(&mut self, offset: isize) {
        self.context.offset = (self.context.offset as isize + offset) as usize;
    }

    fn hold(&mut self, name: BindName) -> Result<(), EvalError> {
        // externals are supplied from outside the program and carry no count
        if matches!(name, BindName::External { .. }) {
            return Ok(());
        }
        match self.context.ref_count.get_mut(&name) {
            Some(count) => {
                *count += 1;
                Ok(())
            }
            None => Err(EvalError::InvalidName(name)),
        }
    }

    fn drop_ref(&mut self, name: BindName) -> Result<(), EvalError> {
        if matches!(name, BindName::External { .. }) {
            return Ok(());
        }
        match self.context.ref_count.get_mut(&name) {
            Some(count) if *count > 1 => {
                *count -= 1;
                Ok(())
            }
            Some(_) => {
                // last reference gone, release the binding
                self.context.ref_count.remove(&name);
                self.context.mem.remove(&name);
                Ok(())
            }
            None => Err(EvalError::InvalidName(name)),
        }
    }

    fn call(&mut self, dest: BindName, callee: BindName) -> Result<(), EvalError> {
        match callee {
            BindName::Anonymous(_) => {
                let address = self.context.value(&callee)? as usize;
                self.context.frames.push(Frame {
                    module: self.context.module.clone(),
                    offset: self.context.offset,
                });
                self.context.offset = address;
                Ok(())
            }
            BindName::External { module, name } => match self.modules.get(&module) {
                Some(Module::Native(primitives)) => {
                    let primitive =
                        *primitives
                            .get(&name)
                            .ok_or_else(|| EvalError::UnknownPrimitive {
                                module: module.clone(),
                                name: name.clone(),
                            })?;
                    primitive(&mut self.context, dest)
                }
                Some(Module::Generated(_)) => {
                    self.context.frames.push(Frame {
                        module: self.context.module.clone(),
                        offset: self.context.offset,
                    });
                    self.context.module = module;
                    self.context.offset = 0;
                    Ok(())
                }
                None => Err(EvalError::UnknownModule(module)),
            },
        }
    }

    fn jump_back(&mut self) -> Result<(), EvalError> {
        match self.context.frames.pop() {
            Some(frame) => {
                self.context.module = frame.module;
                self.context.offset = frame.offset;
                Ok(())
            }
            // a return with no caller left ends the program
            None => Err(EvalError::IsEnd),
        }
    }
}
