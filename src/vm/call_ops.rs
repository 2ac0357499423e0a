//! Function calls and returns.
//!
//! A bytecode call saves the caller's state as a [`CallFrame`] value on the
//! stack, points `fp` at it, and switches the context over to the callee's
//! code and a fresh symbol table. `Return` unwinds exactly that record.
//! Natives run to completion inside the `Call` handler.

use std::sync::Arc;

use tracing::trace;

use crate::builtins::{NativeContext, NativeFunction};
use crate::bytecode::{FunctionScope, Operand, CALL_MULTI, CALL_SPREAD, CALL_THIS};
use crate::error::{Error, ErrorKind, Result};
use crate::symbols::SymbolTable;
use crate::value::coerce::coerce;
use crate::value::{FunctionValue, StackMarker, Type, Value};
use crate::vm::context::Context;
use crate::vm::frame::CallFrame;

/// Decode a `Call` operand: a bare argument count, or `[argc, flags]`.
fn call_operand(operand: &Operand) -> Result<(usize, i64)> {
    let (argc, flags) = match operand {
        Operand::Tuple(parts) => (
            parts.first().and_then(Operand::as_int),
            parts.get(1).and_then(Operand::as_int).unwrap_or(0),
        ),
        other => (other.as_int().or(Some(0)), 0),
    };
    let argc = argc.ok_or_else(|| Error::new(ErrorKind::InvalidFunctionCall).context(operand))?;
    Ok((argc.max(0) as usize, flags))
}

/// Push call results. Several results need a multi-value context, where
/// they land as a results marker then the values, first one on top.
fn push_results(ctx: &mut Context, values: Vec<Value>, multi: bool) -> Result<()> {
    match values.len() {
        0 => ctx.push(Value::marker(StackMarker::VOID)),
        1 => ctx.push(values.into_iter().next().unwrap_or(Value::Nil)),
        _ if multi => {
            ctx.push(Value::marker(StackMarker::RESULTS));
            ctx.stack.extend(values.into_iter().rev());
        }
        count => return Err(Error::new(ErrorKind::MultipleResults).context(count)),
    }
    Ok(())
}

pub(crate) fn call(ctx: &mut Context, operand: &Operand) -> Result<()> {
    let (argc, flags) = call_operand(operand)?;
    let multi = flags & CALL_MULTI != 0;

    let mut total = argc;
    if flags & CALL_SPREAD != 0 {
        let count = ctx
            .pop()?
            .as_int()
            .ok_or_else(|| Error::new(ErrorKind::InvalidFunctionCall).context("spread"))?;
        total = argc.saturating_sub(1) + count.max(0) as usize;
    }
    let args = ctx.pop_n(total)?;
    if args.iter().any(Value::is_marker) {
        return Err(Error::new(ErrorKind::VoidReturn));
    }
    let callee = ctx.pop_value()?;
    let this = if flags & CALL_THIS != 0 {
        ctx.this_stack.pop()
    } else {
        None
    };

    match callee {
        Value::Function(func) => call_bytecode(ctx, &func, args, this, multi),
        Value::Native(native) => call_native(ctx, &native, args, this, multi),
        Value::Type(t) => call_type(ctx, &t, args),
        other => Err(Error::new(ErrorKind::InvalidFunctionCall).context(other.type_name())),
    }
}

/// A type used as a function is a conversion.
fn call_type(ctx: &mut Context, target: &Type, args: Vec<Value>) -> Result<()> {
    let value = match args.as_slice() {
        [] => Value::zero(target),
        [value] => coerce(value, target)?,
        _ => return Err(Error::new(ErrorKind::ArgumentCount).context(target)),
    };
    ctx.push(value);
    Ok(())
}

fn call_native(
    ctx: &mut Context,
    native: &Arc<NativeFunction>,
    args: Vec<Value>,
    this: Option<Value>,
    multi: bool,
) -> Result<()> {
    native.check_arity(args.len())?;
    let symbols = if native.full_scope {
        Arc::clone(&ctx.symbols)
    } else {
        SymbolTable::new_boundary(&ctx.symbols, &native.name)
    };
    let runtime = Arc::clone(&ctx.runtime);
    let mut native_ctx = NativeContext {
        runtime: &runtime,
        symbols,
        this,
        multiple: multi,
    };
    trace!(target: "tern::trace", name = %native.name, argc = args.len(), "native call");
    let result = (native.func)(&mut native_ctx, &args);

    if !native.error_return {
        return match result? {
            Value::Tuple(values) => push_results(ctx, values, multi),
            value => {
                ctx.push(value);
                Ok(())
            }
        };
    }

    let (value, err) = match result {
        Ok(value) => (value, Value::Nil),
        Err(err) if err.is_control() => return Err(err),
        Err(err) if !multi => {
            return Err(Error::new(ErrorKind::UnusedErrorReturn).caused_by(err));
        }
        Err(err) => (Value::Nil, Value::error(err)),
    };
    if multi {
        ctx.push(Value::marker(StackMarker::RESULTS));
        ctx.push(err);
    }
    ctx.push(value);
    Ok(())
}

fn call_bytecode(
    ctx: &mut Context,
    func: &FunctionValue,
    args: Vec<Value>,
    this: Option<Value>,
    multi: bool,
) -> Result<()> {
    let scope = func
        .code
        .declaration
        .as_ref()
        .map(|d| d.scope)
        .unwrap_or_default();
    let table = match scope {
        FunctionScope::Lexical => {
            let parent = func.scope.as_ref().unwrap_or(&ctx.symbols);
            SymbolTable::new_child(parent, func.name())
        }
        FunctionScope::Caller => SymbolTable::new_boundary(&ctx.symbols, func.name()),
    };
    table.set_always("_args", Value::array(args));
    if let Some(this) = this {
        table.set_always("_this", this);
    }

    let frame = CallFrame {
        module: ctx.module.clone(),
        line: ctx.line,
        symbols: std::mem::replace(&mut ctx.symbols, table),
        bytecode: std::mem::replace(&mut ctx.bytecode, Arc::clone(&func.code)),
        pc: ctx.pc,
        fp: ctx.fp,
        this_len: ctx.this_stack.len(),
        multi,
    };
    ctx.push(Value::Frame(Box::new(frame)));
    ctx.fp = ctx.stack.len() - 1;
    ctx.depth += 1;
    ctx.pc = 0;
    if let Some(package) = &func.code.package {
        ctx.module = package.clone();
    }
    trace!(target: "tern::trace", name = func.name(), depth = ctx.depth, "call");
    Ok(())
}

/// Unwind the current bytecode call, handing `count` results to the caller.
/// Off the outermost frame this stops the context.
pub(crate) fn return_from_call(ctx: &mut Context, count: usize) -> Result<()> {
    if ctx.depth == 0 {
        return Err(Error::stop());
    }
    let values = ctx.pop_n(count)?;
    ctx.stack.truncate(ctx.fp + 1);
    let Some(Value::Frame(frame)) = ctx.stack.pop() else {
        return Err(Error::new(ErrorKind::StackUnderflow).context("call frame"));
    };
    let frame = *frame;
    ctx.depth -= 1;
    let depth = ctx.depth;
    ctx.try_stack.retain(|record| record.depth <= depth);
    ctx.this_stack.truncate(frame.this_len);
    ctx.fp = frame.fp;
    ctx.pc = frame.pc;
    ctx.bytecode = frame.bytecode;
    ctx.symbols = frame.symbols;
    ctx.module = frame.module;
    ctx.line = frame.line;
    push_results(ctx, values, frame.multi)
}

pub(crate) fn ret(ctx: &mut Context, operand: &Operand) -> Result<()> {
    let count = operand.as_int().unwrap_or(0).max(0) as usize;
    return_from_call(ctx, count)
}
