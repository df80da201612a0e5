//! The instruction set generated programs are made of.
//!
//! Reference management is explicit: the generator emits `Hold`/`Drop`
//! pairs instead of leaving lifetimes to a collector, so an instruction
//! sequence carries its own memory discipline.

use serde::{Deserialize, Serialize};

use std::fmt;

use crate::core::BindName;

/// One step of a generated program. Jump offsets are relative to the
/// instruction after the jump itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Instruction {
    /// materialize a literal into a fresh binding
    Constant(BindName, i64),
    /// increment a binding's reference count; the optional second name
    /// records which result the reference is being kept alive for
    Hold(BindName, Option<BindName>),
    /// release one reference
    Drop(BindName),
    /// stage the argument list for the next call
    Arg(Vec<BindName>),
    /// bind a parameter to the staged argument at the given position
    Unarg(BindName, usize),
    /// invoke the callee, producing the destination
    Calling(BindName, BindName),
    /// relative jump, taken when the condition value is nonzero
    JumpIf(isize, BindName),
    /// unconditional relative jump
    Jump(isize),
    /// return from a function body
    JumpBack,
}

/// Number of instructions emitted ahead of a spliced function body: the
/// address constant and the jump over the body.
pub const FUNCTION_HEADER_LEN: usize = 2;

/// Offsets for the two jumps of a lowered conditional, as a function of the
/// branch buffer lengths.
///
/// The layout is `JumpIf`, false branch, `Jump`, true branch: the
/// conditional jump clears the false branch and the unconditional jump
/// behind it, the unconditional jump clears the true branch.
pub fn condition_offsets(false_len: usize, true_len: usize) -> (isize, isize) {
    (false_len as isize + 1, true_len as isize)
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Instruction::*;
        match self {
            Constant(dest, value) => write!(f, "{} <- {}", dest, value),
            Hold(name, Some(owner)) => write!(f, "hold {} for {}", name, owner),
            Hold(name, None) => write!(f, "hold {}", name),
            Drop(name) => write!(f, "drop {}", name),
            Arg(names) => {
                write!(f, "arg [")?;
                for (i, name) in names.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", name)?;
                }
                write!(f, "]")
            }
            Unarg(dest, index) => write!(f, "{} <- arg {}", dest, index),
            Calling(dest, callee) => write!(f, "{} <- call {}", dest, callee),
            JumpIf(offset, condition) => write!(f, "{} ?> {}", condition, offset),
            Jump(offset) => write!(f, ">> {}", offset),
            JumpBack => write!(f, "<<"),
        }
    }
}

/// Renders an instruction sequence as its canonical listing, one
/// instruction per line. The listing is stable, which is what the golden
/// tests diff against.
pub fn render(instructions: &[Instruction]) -> String {
    let mut out = String::new();
    for instruction in instructions {
        out.push_str(&instruction.to_string());
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn anon(index: u32) -> BindName {
        BindName::Anonymous(index)
    }

    fn external(name: &str) -> BindName {
        BindName::External {
            module: "Base".into(),
            name: name.into(),
        }
    }

    #[test]
    fn rendering_is_stable() {
        let cases = [
            (Instruction::Constant(anon(3), 42), "x3 <- 42"),
            (Instruction::Hold(anon(2), Some(anon(5))), "hold x2 for x5"),
            (Instruction::Hold(external("Add"), None), "hold Base.Add"),
            (Instruction::Drop(anon(2)), "drop x2"),
            (Instruction::Arg(vec![anon(1), anon(2)]), "arg [x1, x2]"),
            (Instruction::Unarg(anon(4), 0), "x4 <- arg 0"),
            (Instruction::Calling(anon(5), anon(2)), "x5 <- call x2"),
            (Instruction::JumpIf(3, anon(1)), "x1 ?> 3"),
            (Instruction::Jump(3), ">> 3"),
            (Instruction::JumpBack, "<<"),
        ];
        for (instruction, expected) in cases {
            assert_eq!(instruction.to_string(), expected);
        }
    }

    #[test]
    fn render_joins_lines() {
        let listing = render(&[Instruction::Constant(anon(0), 1), Instruction::JumpBack]);
        assert_eq!(listing, "x0 <- 1\n<<\n");
    }

    #[test]
    fn condition_offsets_clear_the_right_spans() {
        // empty branches still need to clear the unconditional jump
        assert_eq!(condition_offsets(0, 0), (1, 0));
        assert_eq!(condition_offsets(2, 3), (3, 3));
        assert_eq!(condition_offsets(5, 1), (6, 1));
    }
}
