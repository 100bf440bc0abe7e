//! Script values living on an execution context's thread.
//!
//! [`Value`] is deliberately `!Send`: a [`Function`] wraps an [`Rc`] closure,
//! so a script value can never be moved or dropped off the thread that owns
//! it. Code that needs to carry a value across threads persists it in the
//! context's handle table and carries the resulting
//! [`Persistent`](crate::Persistent) instead.

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::rc::Rc;

use crate::context::ContextScope;
use crate::error::BridgeError;
use crate::frame::FrameInfo;

type FunctionBody = dyn Fn(&mut ContextScope<'_>, Value) -> Result<Value, BridgeError>;

/// A callable script value.
///
/// Functions take exactly one argument and run with access to the scope of
/// the context that invokes them.
#[derive(Clone)]
pub struct Function {
    body: Rc<FunctionBody>,
}

impl Function {
    pub fn new<F>(body: F) -> Self
    where
        F: Fn(&mut ContextScope<'_>, Value) -> Result<Value, BridgeError> + 'static,
    {
        Self {
            body: Rc::new(body),
        }
    }

    /// Invoke the function synchronously within `scope`.
    pub fn call(&self, scope: &mut ContextScope<'_>, argument: Value) -> Result<Value, BridgeError> {
        (self.body)(scope, argument)
    }
}

impl Debug for Function {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str("Function")
    }
}

/// A dynamically-typed script value.
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Function(Function),
    /// A decoded frame delivered by a codec.
    Frame(FrameInfo),
}

impl Value {
    /// Wrap a closure as a function value.
    pub fn function<F>(body: F) -> Self
    where
        F: Fn(&mut ContextScope<'_>, Value) -> Result<Value, BridgeError> + 'static,
    {
        Value::Function(Function::new(body))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns `true` if the value can be invoked.
    pub fn is_function(&self) -> bool {
        matches!(self, Value::Function(_))
    }

    pub fn as_function(&self) -> Option<&Function> {
        match self {
            Value::Function(function) => Some(function),
            _ => None,
        }
    }

    pub fn as_frame(&self) -> Option<&FrameInfo> {
        match self {
            Value::Frame(frame) => Some(frame),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(text) => Some(text),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(text: &str) -> Self {
        Value::String(text.to_owned())
    }
}

impl From<f64> for Value {
    fn from(number: f64) -> Self {
        Value::Number(number)
    }
}

impl From<bool> for Value {
    fn from(flag: bool) -> Self {
        Value::Bool(flag)
    }
}

impl From<FrameInfo> for Value {
    fn from(frame: FrameInfo) -> Self {
        Value::Frame(frame)
    }
}
