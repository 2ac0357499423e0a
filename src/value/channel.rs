//! Bounded channels between goroutines.

use std::fmt;
use std::sync::{Mutex, PoisonError};

use crossbeam::channel::{bounded, Receiver, Sender};
use uuid::Uuid;

use crate::error::{Error, ErrorKind, Result};
use crate::value::{Type, Value};

/// A FIFO with a fixed buffer. Closing drops the sending half, so receivers
/// drain what is buffered and then observe the closed state.
pub struct Channel {
    pub id: Uuid,
    pub element: Type,
    pub capacity: usize,
    sender: Mutex<Option<Sender<Value>>>,
    receiver: Receiver<Value>,
}

impl Channel {
    pub fn new(element: Type, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (sender, receiver) = bounded(capacity);
        Self {
            id: Uuid::new_v4(),
            element,
            capacity,
            sender: Mutex::new(Some(sender)),
            receiver,
        }
    }

    fn sender(&self) -> Option<Sender<Value>> {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Blocks while the buffer is full. Fails once the channel is closed.
    pub fn send(&self, value: Value) -> Result<()> {
        let sender = self
            .sender()
            .ok_or_else(|| Error::new(ErrorKind::ChannelClosed))?;
        sender
            .send(value)
            .map_err(|_| Error::new(ErrorKind::ChannelClosed))
    }

    /// Blocks until a value arrives. On a closed, drained channel returns
    /// the element zero value and `false`.
    pub fn receive(&self) -> (Value, bool) {
        match self.receiver.recv() {
            Ok(value) => (value, true),
            Err(_) => (Value::zero(&self.element), false),
        }
    }

    pub fn close(&self) -> Result<()> {
        let mut guard = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        match guard.take() {
            Some(_) => Ok(()),
            None => Err(Error::new(ErrorKind::ChannelClosed)),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "chan({}, {}/{})", self.element, self.len(), self.capacity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Kind;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_fifo_order() {
        let ch = Channel::new(Type::of(Kind::Int), 3);
        for i in 0..3 {
            ch.send(Value::Int(i)).unwrap();
        }
        for i in 0..3 {
            assert_eq!(ch.receive(), (Value::Int(i), true));
        }
    }

    #[test]
    fn test_closed_channel() {
        let ch = Channel::new(Type::of(Kind::Int), 1);
        ch.send(Value::Int(5)).unwrap();
        ch.close().unwrap();
        assert_eq!(ch.send(Value::Int(6)).unwrap_err().kind, ErrorKind::ChannelClosed);
        assert_eq!(ch.receive(), (Value::Int(5), true));
        assert_eq!(ch.receive(), (Value::Int(0), false));
        assert!(ch.close().is_err());
    }

    #[test]
    fn test_cross_thread() {
        let ch = Arc::new(Channel::new(Type::interface(), 1));
        let producer = {
            let ch = Arc::clone(&ch);
            thread::spawn(move || {
                for i in 0..10 {
                    ch.send(Value::Int(i)).unwrap();
                }
                ch.close().unwrap();
            })
        };
        let mut total = 0;
        loop {
            match ch.receive() {
                (v, true) => total += v.as_int().unwrap(),
                (_, false) => break,
            }
        }
        producer.join().unwrap();
        assert_eq!(total, 45);
    }
}
