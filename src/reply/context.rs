//! Value-carrying, cancellable context.
//!
//! Each [`Context::with_value`] call wraps the previous context in a new
//! layer. Layers are shared through `Arc`, so deriving a context from a root
//! never mutates the root or any sibling derived from it.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

type ContextValue = Arc<dyn Any + Send + Sync>;

struct Layer {
    key: String,
    value: ContextValue,
    parent: Option<Arc<Layer>>,
}

/// Parent-chained key/value context with a cancellation signal.
#[derive(Clone, Default)]
pub struct Context {
    top: Option<Arc<Layer>>,
    cancel: CancellationToken,
}

impl Context {
    /// Empty, never-cancelled root context.
    pub fn background() -> Self {
        Self::default()
    }

    /// Root context cancelled through `token`.
    pub fn with_cancellation(token: CancellationToken) -> Self {
        Self { top: None, cancel: token }
    }

    /// Derive a context that sees all values of `self` and is cancelled when
    /// `self` is, but whose own cancellation does not reach `self`.
    pub fn child(&self) -> Self {
        Self {
            top: self.top.clone(),
            cancel: self.cancel.child_token(),
        }
    }

    /// Derive a context with one more layer holding `key → value`.
    pub fn with_value<T>(&self, key: impl Into<String>, value: T) -> Self
    where
        T: Any + Send + Sync,
    {
        Self {
            top: Some(Arc::new(Layer {
                key: key.into(),
                value: Arc::new(value),
                parent: self.top.clone(),
            })),
            cancel: self.cancel.clone(),
        }
    }

    /// Nearest value stored under `key`, of any type.
    pub fn value(&self, key: &str) -> Option<&(dyn Any + Send + Sync)> {
        self.layers().find(|layer| layer.key == key).map(|layer| &*layer.value)
    }

    /// Nearest value stored under `key`, if it has type `T`.
    ///
    /// A nearer layer of another type shadows older layers with the same key.
    pub fn get<T: Any>(&self, key: &str) -> Option<&T> {
        self.value(key).and_then(|value| value.downcast_ref::<T>())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.value(key).is_some()
    }

    /// Distinct keys visible from this context, nearest first.
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = Vec::new();
        for layer in self.layers() {
            if !keys.contains(&layer.key.as_str()) {
                keys.push(&layer.key);
            }
        }
        keys
    }

    /// Cancel this context and everything derived from it.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves once this context is cancelled.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    fn layers(&self) -> impl Iterator<Item = &Layer> {
        std::iter::successors(self.top.as_deref(), |layer| layer.parent.as_deref())
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("keys", &self.keys())
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
