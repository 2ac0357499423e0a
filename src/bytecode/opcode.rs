//! Opcodes understood by the VM.

use std::fmt;

/// A VM instruction code. Numeric values are internal to one run.
///
/// Every opcode whose operand is an instruction address sits above
/// `BranchInstructions`, so relocation after `append` is a single
/// comparison per instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Opcode {
    NoOperation,

    // Stack
    Push,
    Drop,
    Dup,
    Swap,
    Copy,
    ReadStack,
    Flatten,
    DropToMarker,

    // Data
    Load,
    Store,
    LoadIndex,
    StoreIndex,
    LoadSlice,
    Member,
    ClassMember,
    Array,
    MakeArray,
    Struct,
    Coerce,
    Explode,

    // Arithmetic and logic
    Add,
    Sub,
    Mul,
    Div,
    Exp,
    Modulo,
    Negate,
    And,
    Or,

    // Bitwise
    BitAnd,
    BitOr,
    BitShift,

    // Comparison
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,

    // Flow
    Call,
    Return,
    Stop,
    Panic,
    AtLine,

    // Scope
    PushScope,
    PopScope,
    SymbolCreate,
    SymbolDelete,
    Constant,

    // Error handling
    TryPop,

    // I/O
    Print,
    Newline,
    Say,
    Log,

    // Misc
    Template,
    Timer,
    SetThis,
    LoadThis,
    ArgCheck,
    RequiredType,
    StaticTyping,

    /// Sentinel; never emitted.
    BranchInstructions,

    Try,
    Branch,
    BranchTrue,
    BranchFalse,
}

impl Opcode {
    /// All opcodes in numeric order, including the sentinel.
    pub const ALL: &'static [Opcode] = &[
        Opcode::NoOperation,
        Opcode::Push,
        Opcode::Drop,
        Opcode::Dup,
        Opcode::Swap,
        Opcode::Copy,
        Opcode::ReadStack,
        Opcode::Flatten,
        Opcode::DropToMarker,
        Opcode::Load,
        Opcode::Store,
        Opcode::LoadIndex,
        Opcode::StoreIndex,
        Opcode::LoadSlice,
        Opcode::Member,
        Opcode::ClassMember,
        Opcode::Array,
        Opcode::MakeArray,
        Opcode::Struct,
        Opcode::Coerce,
        Opcode::Explode,
        Opcode::Add,
        Opcode::Sub,
        Opcode::Mul,
        Opcode::Div,
        Opcode::Exp,
        Opcode::Modulo,
        Opcode::Negate,
        Opcode::And,
        Opcode::Or,
        Opcode::BitAnd,
        Opcode::BitOr,
        Opcode::BitShift,
        Opcode::Equal,
        Opcode::NotEqual,
        Opcode::LessThan,
        Opcode::LessThanOrEqual,
        Opcode::GreaterThan,
        Opcode::GreaterThanOrEqual,
        Opcode::Call,
        Opcode::Return,
        Opcode::Stop,
        Opcode::Panic,
        Opcode::AtLine,
        Opcode::PushScope,
        Opcode::PopScope,
        Opcode::SymbolCreate,
        Opcode::SymbolDelete,
        Opcode::Constant,
        Opcode::TryPop,
        Opcode::Print,
        Opcode::Newline,
        Opcode::Say,
        Opcode::Log,
        Opcode::Template,
        Opcode::Timer,
        Opcode::SetThis,
        Opcode::LoadThis,
        Opcode::ArgCheck,
        Opcode::RequiredType,
        Opcode::StaticTyping,
        Opcode::BranchInstructions,
        Opcode::Try,
        Opcode::Branch,
        Opcode::BranchTrue,
        Opcode::BranchFalse,
    ];

    pub const COUNT: usize = Opcode::BranchFalse as usize + 1;

    /// True for opcodes whose operand is an instruction address.
    pub fn is_branch(self) -> bool {
        self > Opcode::BranchInstructions
    }

    pub fn name(self) -> &'static str {
        match self {
            Opcode::NoOperation => "NoOperation",
            Opcode::Push => "Push",
            Opcode::Drop => "Drop",
            Opcode::Dup => "Dup",
            Opcode::Swap => "Swap",
            Opcode::Copy => "Copy",
            Opcode::ReadStack => "ReadStack",
            Opcode::Flatten => "Flatten",
            Opcode::DropToMarker => "DropToMarker",
            Opcode::Load => "Load",
            Opcode::Store => "Store",
            Opcode::LoadIndex => "LoadIndex",
            Opcode::StoreIndex => "StoreIndex",
            Opcode::LoadSlice => "LoadSlice",
            Opcode::Member => "Member",
            Opcode::ClassMember => "ClassMember",
            Opcode::Array => "Array",
            Opcode::MakeArray => "MakeArray",
            Opcode::Struct => "Struct",
            Opcode::Coerce => "Coerce",
            Opcode::Explode => "Explode",
            Opcode::Add => "Add",
            Opcode::Sub => "Sub",
            Opcode::Mul => "Mul",
            Opcode::Div => "Div",
            Opcode::Exp => "Exp",
            Opcode::Modulo => "Modulo",
            Opcode::Negate => "Negate",
            Opcode::And => "And",
            Opcode::Or => "Or",
            Opcode::BitAnd => "BitAnd",
            Opcode::BitOr => "BitOr",
            Opcode::BitShift => "BitShift",
            Opcode::Equal => "Equal",
            Opcode::NotEqual => "NotEqual",
            Opcode::LessThan => "LessThan",
            Opcode::LessThanOrEqual => "LessThanOrEqual",
            Opcode::GreaterThan => "GreaterThan",
            Opcode::GreaterThanOrEqual => "GreaterThanOrEqual",
            Opcode::Call => "Call",
            Opcode::Return => "Return",
            Opcode::Stop => "Stop",
            Opcode::Panic => "Panic",
            Opcode::AtLine => "AtLine",
            Opcode::PushScope => "PushScope",
            Opcode::PopScope => "PopScope",
            Opcode::SymbolCreate => "SymbolCreate",
            Opcode::SymbolDelete => "SymbolDelete",
            Opcode::Constant => "Constant",
            Opcode::TryPop => "TryPop",
            Opcode::Print => "Print",
            Opcode::Newline => "Newline",
            Opcode::Say => "Say",
            Opcode::Log => "Log",
            Opcode::Template => "Template",
            Opcode::Timer => "Timer",
            Opcode::SetThis => "SetThis",
            Opcode::LoadThis => "LoadThis",
            Opcode::ArgCheck => "ArgCheck",
            Opcode::RequiredType => "RequiredType",
            Opcode::StaticTyping => "StaticTyping",
            Opcode::BranchInstructions => "BranchInstructions",
            Opcode::Try => "Try",
            Opcode::Branch => "Branch",
            Opcode::BranchTrue => "BranchTrue",
            Opcode::BranchFalse => "BranchFalse",
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADDRESS_OPCODES: &[Opcode] = &[
        Opcode::Try,
        Opcode::Branch,
        Opcode::BranchTrue,
        Opcode::BranchFalse,
    ];

    #[test]
    fn test_branch_opcodes_sit_above_sentinel() {
        for op in Opcode::ALL {
            let is_address = ADDRESS_OPCODES.contains(op);
            if *op == Opcode::BranchInstructions {
                continue;
            }
            assert_eq!(
                op.is_branch(),
                is_address,
                "{} is on the wrong side of BranchInstructions",
                op
            );
        }
    }

    #[test]
    fn test_all_is_dense_and_ordered() {
        assert_eq!(Opcode::ALL.len(), Opcode::COUNT);
        for (i, op) in Opcode::ALL.iter().enumerate() {
            assert_eq!(*op as usize, i);
        }
    }
}
