//! Bytecode disassembler for debug output.

use crate::bytecode::chunk::ByteCode;
use crate::bytecode::instruction::Operand;
use crate::bytecode::opcode::Opcode;
use crate::value::Value;

/// Disassemble a bytecode unit, followed by every function it pushes.
pub fn disassemble(code: &ByteCode) -> String {
    let mut out = String::new();
    let title = match &code.declaration {
        Some(decl) => decl.to_string(),
        None => code.name.clone(),
    };
    out.push_str(&format!("== {} ({} instructions) ==\n", title, code.len()));
    disassemble_into(code, &mut out);

    for instruction in code.instructions() {
        if let (Opcode::Push, Operand::Value(Value::Function(f))) =
            (instruction.op, &instruction.operand)
        {
            out.push('\n');
            out.push_str(&disassemble(&f.code));
        }
    }
    out
}

fn disassemble_into(code: &ByteCode, out: &mut String) {
    let mut line = 0;
    for (addr, instruction) in code.instructions().iter().enumerate() {
        if instruction.op == Opcode::AtLine {
            line = instruction.operand.as_int().unwrap_or(0) as usize;
        }
        let line_str = if instruction.op == Opcode::AtLine {
            format!("{:4}", line)
        } else {
            "   |".to_string()
        };
        out.push_str(&format!("{:04} {} {}\n", addr, line_str, format_instruction(code, addr)));
    }
}

fn format_instruction(code: &ByteCode, addr: usize) -> String {
    let Some(instruction) = code.instruction(addr) else {
        return String::new();
    };
    match (&instruction.op, &instruction.operand) {
        (_, Operand::Value(Value::Function(f))) => {
            format!("{:<18} <{}>", instruction.op.name(), f.name())
        }
        _ => instruction.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listing_format() {
        let mut b = ByteCode::new("main");
        b.emit(Opcode::AtLine, Operand::Int(1)).unwrap();
        b.emit(Opcode::Push, Operand::Value(Value::Int(7))).unwrap();
        b.emit(Opcode::Print, Operand::Int(1)).unwrap();
        let text = disassemble(&b);
        assert!(text.starts_with("== main (3 instructions) =="));
        assert!(text.contains("0000    1 AtLine"));
        assert!(text.contains("0001    | Push"));
        assert!(text.contains("7"));
    }
}
