//! Execution-scoped context propagation.
//!
//! A [`Context`] is an immutable, parent-linked bag of values. Deriving a new
//! context via [`Context::with_value`] leaves the original untouched, and
//! [`Context::attach`] installs a context as the current one for the calling
//! thread until the returned guard is dropped, restoring the previous context
//! deterministically even when attach scopes are nested.

use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::trace::SpanContext;

thread_local! {
    static CURRENT_CONTEXT: RefCell<Vec<Context>> = const { RefCell::new(Vec::new()) };
}

/// An immutable execution-scoped collection of values.
#[derive(Clone, Default)]
pub struct Context {
    entries: Option<Arc<EntryMap>>,
}

type EntryMap = HashMap<TypeId, Arc<dyn Any + Send + Sync>>;

impl Context {
    /// Creates an empty context, unrelated to the current one.
    pub fn new() -> Self {
        Context::default()
    }

    /// Returns a clone of the context current for this thread.
    pub fn current() -> Self {
        CURRENT_CONTEXT
            .with(|stack| stack.borrow().last().cloned())
            .unwrap_or_default()
    }

    /// Applies a function to the current context without cloning it.
    pub fn map_current<T>(f: impl FnOnce(&Context) -> T) -> T {
        CURRENT_CONTEXT.with(|stack| match stack.borrow().last() {
            Some(cx) => f(cx),
            None => f(&Context::default()),
        })
    }

    /// Returns a copy of this context with `value` added.
    ///
    /// Values are keyed by type, so storing a second value of the same type
    /// shadows the first.
    pub fn with_value<T: 'static + Send + Sync>(&self, value: T) -> Self {
        let mut entries = self
            .entries
            .as_deref()
            .cloned()
            .unwrap_or_default();
        entries.insert(TypeId::of::<T>(), Arc::new(value));
        Context {
            entries: Some(Arc::new(entries)),
        }
    }

    /// Returns a reference to the stored value of type `T`, if any.
    pub fn get<T: 'static>(&self) -> Option<&T> {
        self.entries
            .as_ref()?
            .get(&TypeId::of::<T>())
            .and_then(|v| v.downcast_ref())
    }

    /// Returns a copy of this context with the given active span context.
    pub fn with_span_context(&self, span_context: SpanContext) -> Self {
        self.with_value(ActiveSpanContext(span_context))
    }

    /// Returns the active span context stored in this context, if any.
    pub fn span_context(&self) -> Option<&SpanContext> {
        self.get::<ActiveSpanContext>().map(|a| &a.0)
    }

    /// Installs this context as the current one for the calling thread.
    ///
    /// The previous context is restored when the returned guard is dropped.
    pub fn attach(self) -> ContextGuard {
        CURRENT_CONTEXT.with(|stack| stack.borrow_mut().push(self));
        ContextGuard {
            _not_send: std::marker::PhantomData,
        }
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field(
                "entries",
                &self.entries.as_ref().map(|e| e.len()).unwrap_or(0),
            )
            .finish()
    }
}

struct ActiveSpanContext(SpanContext);

/// A guard that restores the previously current context on drop.
#[must_use = "dropping the guard detaches the context immediately"]
pub struct ContextGuard {
    // Contexts are attached per thread, moving the guard across threads would
    // detach the wrong entry.
    _not_send: std::marker::PhantomData<*const ()>,
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        CURRENT_CONTEXT.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

impl fmt::Debug for ContextGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ContextGuard")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::{SpanId, TraceFlags, TraceId};

    #[derive(Debug, PartialEq)]
    struct ValueA(u64);

    #[test]
    fn nested_attach_restores_previous() {
        let outer = Context::new().with_value(ValueA(1));
        let guard_outer = outer.attach();
        assert_eq!(Context::current().get::<ValueA>(), Some(&ValueA(1)));
        {
            let inner = Context::current().with_value(ValueA(2));
            let _guard_inner = inner.attach();
            assert_eq!(Context::current().get::<ValueA>(), Some(&ValueA(2)));
        }
        assert_eq!(Context::current().get::<ValueA>(), Some(&ValueA(1)));
        drop(guard_outer);
        assert_eq!(Context::current().get::<ValueA>(), None);
    }

    #[test]
    fn with_value_does_not_mutate_parent() {
        let parent = Context::new().with_value(ValueA(1));
        let _child = parent.with_value(ValueA(2));
        assert_eq!(parent.get::<ValueA>(), Some(&ValueA(1)));
    }

    #[test]
    fn span_context_round_trip() {
        let sc = SpanContext::new(
            TraceId::from_hex("1234567890abcdef1234567890abcdef").unwrap(),
            SpanId::from_hex("1234567890abcdef").unwrap(),
            TraceFlags::SAMPLED,
            false,
            Default::default(),
        );
        let cx = Context::new().with_span_context(sc.clone());
        assert_eq!(cx.span_context(), Some(&sc));
    }
}
