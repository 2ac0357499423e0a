//! The `sync` package and the methods of wait groups, mutexes and channels.

use std::sync::Arc;

use crate::builtins::{define_value, int_arg, NativeContext, NativeFn, NativeFunction};
use crate::error::{Error, ErrorKind, Result};
use crate::symbols::SymbolTable;
use crate::value::coerce::coerce;
use crate::value::{Channel, Kind, MutexValue, Type, Value, WaitGroup};

pub fn register_sync_builtins(root: &Arc<SymbolTable>) {
    define_value(root, "sync.WaitGroup", Value::Type(Type::of(Kind::WaitGroup)));
    define_value(root, "sync.Mutex", Value::Type(Type::of(Kind::Mutex)));
}

fn wait_group<'a>(ctx: &'a NativeContext<'_>) -> Result<&'a Arc<WaitGroup>> {
    match ctx.this()? {
        Value::WaitGroup(wg) => Ok(wg),
        other => Err(Error::new(ErrorKind::InvalidType).context(other.type_name())),
    }
}

fn mutex<'a>(ctx: &'a NativeContext<'_>) -> Result<&'a Arc<MutexValue>> {
    match ctx.this()? {
        Value::Mutex(m) => Ok(m),
        other => Err(Error::new(ErrorKind::InvalidType).context(other.type_name())),
    }
}

fn channel<'a>(ctx: &'a NativeContext<'_>) -> Result<&'a Arc<Channel>> {
    match ctx.this()? {
        Value::Channel(c) => Ok(c),
        other => Err(Error::new(ErrorKind::InvalidType).context(other.type_name())),
    }
}

fn wg_add(ctx: &mut NativeContext<'_>, args: &[Value]) -> Result<Value> {
    let delta = int_arg("Add", args, 0)?;
    wait_group(ctx)?.add(delta)?;
    Ok(Value::Nil)
}

fn wg_done(ctx: &mut NativeContext<'_>, _: &[Value]) -> Result<Value> {
    wait_group(ctx)?.done()?;
    Ok(Value::Nil)
}

fn wg_wait(ctx: &mut NativeContext<'_>, _: &[Value]) -> Result<Value> {
    wait_group(ctx)?.wait();
    Ok(Value::Nil)
}

fn mutex_lock(ctx: &mut NativeContext<'_>, _: &[Value]) -> Result<Value> {
    mutex(ctx)?.lock();
    Ok(Value::Nil)
}

fn mutex_unlock(ctx: &mut NativeContext<'_>, _: &[Value]) -> Result<Value> {
    mutex(ctx)?.unlock()?;
    Ok(Value::Nil)
}

fn chan_send(ctx: &mut NativeContext<'_>, args: &[Value]) -> Result<Value> {
    let ch = channel(ctx)?;
    let value = coerce(&args[0], &ch.element)?;
    ch.send(value)?;
    Ok(Value::Nil)
}

/// `v := <-ch` or `v, ok := <-ch`.
fn chan_receive(ctx: &mut NativeContext<'_>, _: &[Value]) -> Result<Value> {
    let (value, ok) = channel(ctx)?.receive();
    Ok(ctx.results(vec![value, Value::Bool(ok)]))
}

fn chan_close(ctx: &mut NativeContext<'_>, _: &[Value]) -> Result<Value> {
    channel(ctx)?.close()?;
    Ok(Value::Nil)
}

fn chan_len(ctx: &mut NativeContext<'_>, _: &[Value]) -> Result<Value> {
    Ok(Value::Int(channel(ctx)?.len() as i64))
}

/// Methods keyed by receiver kind. Both the Go spelling and a lowercase
/// alias are accepted.
pub fn methods() -> Vec<(Kind, &'static str, NativeFunction)> {
    let table: [(Kind, &'static str, &'static str, usize, NativeFn); 7] = [
        (Kind::WaitGroup, "Add", "add", 1, wg_add),
        (Kind::WaitGroup, "Done", "done", 0, wg_done),
        (Kind::WaitGroup, "Wait", "wait", 0, wg_wait),
        (Kind::Mutex, "Lock", "lock", 0, mutex_lock),
        (Kind::Mutex, "Unlock", "unlock", 0, mutex_unlock),
        (Kind::Channel, "Send", "send", 1, chan_send),
        (Kind::Channel, "Receive", "receive", 0, chan_receive),
    ];
    let mut methods = Vec::new();
    for (kind, name, alias, argc, func) in table {
        for spelling in [name, alias] {
            let full = format!("{}.{}", kind.name(), spelling);
            methods.push((kind, spelling, NativeFunction::new(&full, argc, Some(argc), func)));
        }
    }
    for (spelling, func) in [("close", chan_close as NativeFn), ("len", chan_len)] {
        let full = format!("chan.{}", spelling);
        methods.push((Kind::Channel, spelling, NativeFunction::new(&full, 0, Some(0), func)));
    }
    methods
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::Runtime;
    use pretty_assertions::assert_eq;

    fn invoke(receiver: Value, name: &str, args: &[Value]) -> Result<Value> {
        let (runtime, _) = Runtime::with_capture();
        let Some(Value::Native(native)) = crate::builtins::method(&receiver, name) else {
            panic!("no method {}", name);
        };
        let mut ctx = NativeContext {
            runtime: &runtime,
            symbols: runtime.root(),
            this: Some(receiver),
            multiple: true,
        };
        (native.func)(&mut ctx, args)
    }

    #[test]
    fn test_wait_group_methods() {
        let wg = Value::WaitGroup(Arc::new(WaitGroup::new()));
        invoke(wg.clone(), "Add", &[Value::Int(2)]).unwrap();
        invoke(wg.clone(), "done", &[]).unwrap();
        invoke(wg.clone(), "Done", &[]).unwrap();
        invoke(wg.clone(), "Wait", &[]).unwrap();
        assert!(invoke(wg, "Done", &[]).is_err());
    }

    #[test]
    fn test_channel_methods() {
        let ch = Value::Channel(Arc::new(Channel::new(Type::of(Kind::Int), 2)));
        invoke(ch.clone(), "send", &[Value::string("7")]).unwrap();
        assert_eq!(invoke(ch.clone(), "len", &[]).unwrap(), Value::Int(1));
        invoke(ch.clone(), "close", &[]).unwrap();
        let Value::Tuple(first) = invoke(ch.clone(), "receive", &[]).unwrap() else {
            panic!("expected tuple");
        };
        assert_eq!(first, vec![Value::Int(7), Value::Bool(true)]);
        let Value::Tuple(second) = invoke(ch, "receive", &[]).unwrap() else {
            panic!("expected tuple");
        };
        assert_eq!(second, vec![Value::Int(0), Value::Bool(false)]);
    }

    #[test]
    fn test_unknown_method() {
        let m = Value::Mutex(Arc::new(MutexValue::new()));
        assert!(crate::builtins::method(&m, "Add").is_none());
    }
}
