/// Callable signatures — the executable hooks a game definition carries.
///
/// Predicates, expressions, and actions are resolved ahead of time by the
/// loader (or supplied programmatically) and invoked by signature only; the
/// engine never inspects their origin.
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::core::qualities::QualityAccess;
use crate::schema::state::GameState;

/// An error raised inside an authored callable.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct CallableError(pub String);

impl CallableError {
    pub fn new(message: impl Into<String>) -> CallableError {
        CallableError(message.into())
    }
}

/// A non-fatal failure from an authored callable, caught and buffered by the
/// engine so a broken hook cannot block legitimate game progress.
#[derive(Debug, Clone, Error)]
#[error("{context}: {source}")]
pub struct CallableFault {
    pub context: String,
    #[source]
    pub source: CallableError,
}

/// A value produced by an expression callable, stringified into content.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(f64),
    Text(String),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{}", n),
            Value::Text(s) => write!(f, "{}", s),
        }
    }
}

/// Boolean-producing callable evaluated against live state.
pub type Predicate = Arc<dyn Fn(&GameState) -> Result<bool, CallableError> + Send + Sync>;

/// Value-producing callable for computed content inserts.
pub type Expression = Arc<dyn Fn(&GameState) -> Result<Value, CallableError> + Send + Sync>;

/// State-mutating callable; mutates qualities through the clamping and
/// signalling accessor rather than touching raw state.
pub type Action =
    Arc<dyn Fn(&mut QualityAccess<'_>) -> Result<(), CallableError> + Send + Sync>;

/// Wrap an infallible closure as a [`Predicate`].
pub fn predicate<F>(f: F) -> Predicate
where
    F: Fn(&GameState) -> bool + Send + Sync + 'static,
{
    Arc::new(move |state| Ok(f(state)))
}

/// Wrap an infallible closure as an [`Expression`].
pub fn expression<F>(f: F) -> Expression
where
    F: Fn(&GameState) -> Value + Send + Sync + 'static,
{
    Arc::new(move |state| Ok(f(state)))
}

/// Wrap an infallible closure as an [`Action`].
pub fn action<F>(f: F) -> Action
where
    F: Fn(&mut QualityAccess<'_>) + Send + Sync + 'static,
{
    Arc::new(move |access| {
        f(access);
        Ok(())
    })
}

/// Evaluate an optional predicate, falling back to `default` when the
/// predicate is absent or fails. Failures are buffered, never propagated.
pub fn run_predicate(
    pred: Option<&Predicate>,
    default: bool,
    state: &GameState,
    context: &str,
    faults: &mut Vec<CallableFault>,
) -> bool {
    match pred {
        None => default,
        Some(p) => match p(state) {
            Ok(value) => value,
            Err(source) => {
                faults.push(CallableFault {
                    context: context.to_string(),
                    source,
                });
                default
            }
        },
    }
}

/// Evaluate an optional expression, falling back to `default` when the
/// expression is absent or fails.
pub fn run_expression(
    expr: Option<&Expression>,
    default: Value,
    state: &GameState,
    context: &str,
    faults: &mut Vec<CallableFault>,
) -> Value {
    match expr {
        None => default,
        Some(e) => match e(state) {
            Ok(value) => value,
            Err(source) => {
                faults.push(CallableFault {
                    context: context.to_string(),
                    source,
                });
                default
            }
        },
    }
}

/// Run a list of actions in order. Each action is isolated: a failure is
/// buffered and the remaining actions still run.
pub fn run_actions(actions: &[Action], access: &mut QualityAccess<'_>, context: &str) {
    for action in actions {
        if let Err(source) = action(access) {
            access.record_fault(CallableFault {
                context: context.to_string(),
                source,
            });
        }
    }
}
