//! The opcode dispatch table.

use lazy_static::lazy_static;

use crate::bytecode::{Opcode, Operand};
use crate::error::Result;
use crate::vm::context::Context;
use crate::vm::{call_ops, data_ops, flow_ops, io_ops, math_ops, scope_ops, stack_ops};

/// Every instruction handler has this shape.
pub type Handler = fn(&mut Context, &Operand) -> Result<()>;

fn handler(op: Opcode) -> Handler {
    match op {
        Opcode::NoOperation => stack_ops::no_operation,
        Opcode::Push => stack_ops::push,
        Opcode::Drop => stack_ops::drop_values,
        Opcode::Dup => stack_ops::dup,
        Opcode::Swap => stack_ops::swap,
        Opcode::Copy => stack_ops::copy,
        Opcode::ReadStack => stack_ops::read_stack,
        Opcode::Flatten => stack_ops::flatten,
        Opcode::DropToMarker => stack_ops::drop_to_marker,

        Opcode::Load => data_ops::load,
        Opcode::Store => data_ops::store,
        Opcode::LoadIndex => data_ops::load_index,
        Opcode::StoreIndex => data_ops::store_index,
        Opcode::LoadSlice => data_ops::load_slice,
        Opcode::Member => data_ops::member,
        Opcode::ClassMember => data_ops::class_member,
        Opcode::Array => data_ops::array,
        Opcode::MakeArray => data_ops::make_array,
        Opcode::Struct => data_ops::make_struct,
        Opcode::Coerce => data_ops::coerce_top,
        Opcode::Explode => data_ops::explode,

        Opcode::Add => math_ops::add,
        Opcode::Sub => math_ops::sub,
        Opcode::Mul => math_ops::mul,
        Opcode::Div => math_ops::div,
        Opcode::Exp => math_ops::exp,
        Opcode::Modulo => math_ops::modulo,
        Opcode::Negate => math_ops::negate,
        Opcode::And => math_ops::and,
        Opcode::Or => math_ops::or,
        Opcode::BitAnd => math_ops::bit_and,
        Opcode::BitOr => math_ops::bit_or,
        Opcode::BitShift => math_ops::bit_shift,
        Opcode::Equal => math_ops::equal,
        Opcode::NotEqual => math_ops::not_equal,
        Opcode::LessThan => math_ops::less_than,
        Opcode::LessThanOrEqual => math_ops::less_than_or_equal,
        Opcode::GreaterThan => math_ops::greater_than,
        Opcode::GreaterThanOrEqual => math_ops::greater_than_or_equal,

        Opcode::Call => call_ops::call,
        Opcode::Return => call_ops::ret,
        Opcode::Stop => flow_ops::stop,
        Opcode::Panic => flow_ops::panic,
        Opcode::AtLine => flow_ops::at_line,

        Opcode::PushScope => scope_ops::push_scope,
        Opcode::PopScope => scope_ops::pop_scope,
        Opcode::SymbolCreate => scope_ops::symbol_create,
        Opcode::SymbolDelete => scope_ops::symbol_delete,
        Opcode::Constant => scope_ops::constant,

        Opcode::TryPop => flow_ops::try_pop,

        Opcode::Print => io_ops::print,
        Opcode::Newline => io_ops::newline,
        Opcode::Say => io_ops::say,
        Opcode::Log => io_ops::log,
        Opcode::Template => io_ops::template,
        Opcode::Timer => io_ops::timer,
        Opcode::SetThis => io_ops::set_this,
        Opcode::LoadThis => io_ops::load_this,
        Opcode::ArgCheck => io_ops::arg_check,
        Opcode::RequiredType => io_ops::required_type,
        Opcode::StaticTyping => io_ops::static_typing,

        Opcode::BranchInstructions => flow_ops::unimplemented,

        Opcode::Try => flow_ops::try_block,
        Opcode::Branch => flow_ops::branch,
        Opcode::BranchTrue => flow_ops::branch_true,
        Opcode::BranchFalse => flow_ops::branch_false,
    }
}

lazy_static! {
    /// Handlers indexed by opcode number.
    pub static ref DISPATCH: Vec<Handler> = Opcode::ALL.iter().map(|op| handler(*op)).collect();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_covers_every_opcode() {
        assert_eq!(DISPATCH.len(), Opcode::COUNT);
    }
}
