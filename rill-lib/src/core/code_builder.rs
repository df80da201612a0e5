//! Accumulates the instruction stream for one compilation unit.
//!
//! The builder owns the scope chain and the name allocator, so lowering can
//! resolve, bind and allocate through a single handle. Sub-buffers (branch
//! bodies, function bodies) share the allocator of their parent, which keeps
//! every name of a compilation unit unique.

use crate::core::{BindName, Instruction, NameAlloc, Scopes, SymbolTable};

#[derive(Debug, Clone)]
pub struct CodeBuilder {
    /// the program
    text: Vec<Instruction>,
    /// scoped mapping from source name to binding identity
    symbols: SymbolTable,
    /// fresh-name source for this compilation unit
    names: NameAlloc,
}

impl CodeBuilder {
    /// A builder whose scope chain starts from the given environment.
    pub fn new(env: &SymbolTable) -> Self {
        CodeBuilder {
            text: Vec::new(),
            symbols: env.clone(),
            names: NameAlloc::default(),
        }
    }

    /// A fresh anonymous binding identity.
    pub fn fresh(&mut self) -> BindName {
        self.names.fresh()
    }

    pub fn emit(&mut self, instruction: Instruction) {
        self.text.push(instruction);
    }

    pub fn extend(&mut self, instructions: Vec<Instruction>) {
        self.text.extend(instructions);
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Resolve a source name through the scope chain.
    pub fn resolve(&self, name: &str) -> Option<BindName> {
        self.symbols.find_entry(name).cloned()
    }

    /// Bind `name` in the innermost scope, shadowing without touching any
    /// outer entry.
    pub fn bind(&mut self, name: &str, target: BindName) {
        self.symbols.add_entry(name.to_owned(), target);
    }

    pub fn open_scope(&mut self) {
        self.symbols.open_new();
    }

    /// Close the innermost scope and emit one `Drop` per name it
    /// introduced. The drops are ordered by binding identity so listings
    /// stay deterministic.
    pub fn collapse_scope(&mut self) {
        let scope = self.symbols.collapse_innermost();
        let mut introduced: Vec<BindName> = scope.values().cloned().collect();
        introduced.sort();
        for name in introduced {
            self.emit(Instruction::Drop(name));
        }
    }

    /// Lower through `f` into a separate buffer that shares this builder's
    /// allocator and starts from the given scope chain.
    pub fn sub_buffer<E>(
        &mut self,
        symbols: SymbolTable,
        f: impl FnOnce(&mut CodeBuilder) -> Result<(), E>,
    ) -> Result<Vec<Instruction>, E> {
        let mut child = CodeBuilder {
            text: Vec::new(),
            symbols,
            names: std::mem::take(&mut self.names),
        };
        let result = f(&mut child);
        self.names = child.names;
        result.map(|_| child.text)
    }

    /// A branch buffer: sees the enclosing scope, but bindings made inside
    /// it stay inside it.
    pub fn branch<E>(
        &mut self,
        f: impl FnOnce(&mut CodeBuilder) -> Result<(), E>,
    ) -> Result<Vec<Instruction>, E> {
        let symbols = self.symbols.clone();
        self.sub_buffer(symbols, f)
    }

    /// A function-body buffer: sees the global scope and a fresh scope for
    /// the parameters, never the enclosing locals.
    pub fn function_body<E>(
        &mut self,
        f: impl FnOnce(&mut CodeBuilder) -> Result<(), E>,
    ) -> Result<Vec<Instruction>, E> {
        let mut symbols = Scopes::from_global(self.symbols.global());
        symbols.open_new();
        self.sub_buffer(symbols, f)
    }

    pub fn into_instructions(self) -> Vec<Instruction> {
        self.text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapse_drops_every_introduced_name_once() {
        let mut builder = CodeBuilder::new(&SymbolTable::default());
        builder.open_scope();
        let a = builder.fresh();
        let b = builder.fresh();
        builder.bind("a", a.clone());
        builder.bind("b", b.clone());
        builder.collapse_scope();
        assert_eq!(
            builder.into_instructions(),
            vec![Instruction::Drop(a), Instruction::Drop(b)]
        );
    }

    #[test]
    fn rebinding_in_one_scope_drops_only_the_survivor() {
        let mut builder = CodeBuilder::new(&SymbolTable::default());
        builder.open_scope();
        let first = builder.fresh();
        let second = builder.fresh();
        builder.bind("x", first);
        builder.bind("x", second.clone());
        builder.collapse_scope();
        assert_eq!(builder.into_instructions(), vec![Instruction::Drop(second)]);
    }

    #[test]
    fn branch_bindings_do_not_leak() {
        let mut builder = CodeBuilder::new(&SymbolTable::default());
        builder.open_scope();
        let outer = builder.fresh();
        builder.bind("outer", outer);
        builder
            .branch::<()>(|b| {
                assert!(b.resolve("outer").is_some());
                let inner = b.fresh();
                b.bind("inner", inner);
                Ok(())
            })
            .unwrap();
        assert!(builder.resolve("inner").is_none());
    }

    #[test]
    fn function_bodies_see_globals_but_not_enclosing_locals() {
        let mut env = SymbolTable::default();
        env.add_entry(
            "+".into(),
            BindName::External {
                module: "Base".into(),
                name: "Add".into(),
            },
        );
        let mut builder = CodeBuilder::new(&env);
        builder.open_scope();
        let local = builder.fresh();
        builder.bind("local", local);
        builder
            .function_body::<()>(|b| {
                assert!(b.resolve("+").is_some());
                assert!(b.resolve("local").is_none());
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn sub_buffers_share_the_allocator() {
        let mut builder = CodeBuilder::new(&SymbolTable::default());
        let outer = builder.fresh();
        let mut inner = None;
        builder
            .branch::<()>(|b| {
                inner = Some(b.fresh());
                Ok(())
            })
            .unwrap();
        let after = builder.fresh();
        assert_ne!(Some(outer.clone()), inner);
        assert_ne!(Some(after), inner);
    }
}
