use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::{Duration, Instant};

use uuid::Uuid;

use super::error::PipelineError;
use crate::security::SecurityContext;

/// Name of a context value together with its type
pub struct ContextKey<T> {
    name: &'static str,
    _type: PhantomData<fn() -> T>,
}

impl<T> ContextKey<T> {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _type: PhantomData,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl<T> Clone for ContextKey<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for ContextKey<T> {}

impl<T> fmt::Debug for ContextKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContextKey({})", self.name)
    }
}

/// State shared by the steps of one pipeline invocation.
///
/// Values are stored under string names with their type fixed by the key.
/// The security context of the caller travels alongside and can be swapped
/// when a request is rebuilt from a cache record.
pub struct PipelineContext {
    values: HashMap<&'static str, Box<dyn Any + Send + Sync>>,
    security: Arc<SecurityContext>,
    request_id: Uuid,
    start_time: Instant,
}

impl fmt::Debug for PipelineContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<&&str> = self.values.keys().collect();
        keys.sort();
        f.debug_struct("PipelineContext")
            .field("keys", &keys)
            .field("request_id", &self.request_id)
            .field("security", &self.security.id())
            .finish()
    }
}

impl PipelineContext {
    pub fn new(security: Arc<SecurityContext>) -> Self {
        Self {
            values: HashMap::new(),
            security,
            request_id: Uuid::new_v4(),
            start_time: Instant::now(),
        }
    }

    pub fn put<T: Send + Sync + 'static>(&mut self, key: ContextKey<T>, value: T) {
        self.values.insert(key.name, Box::new(value));
    }

    #[must_use]
    pub fn with<T: Send + Sync + 'static>(mut self, key: ContextKey<T>, value: T) -> Self {
        self.put(key, value);
        self
    }

    pub fn get<T: 'static>(&self, key: ContextKey<T>) -> Option<&T> {
        self.values.get(key.name).and_then(|boxed| boxed.downcast_ref::<T>())
    }

    /// Value a step cannot do without
    pub fn require<T: 'static>(&self, key: ContextKey<T>) -> Result<&T, PipelineError> {
        self.get(key)
            .ok_or_else(|| PipelineError::MissingParameter(key.name.to_string()))
    }

    pub fn get_or<T: Clone + 'static>(&self, key: ContextKey<T>, default: T) -> T {
        self.get(key).cloned().unwrap_or(default)
    }

    pub fn contains<T: 'static>(&self, key: ContextKey<T>) -> bool {
        self.get(key).is_some()
    }

    pub fn remove<T: 'static>(&mut self, key: ContextKey<T>) -> Option<T> {
        let boxed = self.values.remove(key.name)?;
        boxed.downcast::<T>().ok().map(|value| *value)
    }

    pub fn security(&self) -> &Arc<SecurityContext> {
        &self.security
    }

    pub fn set_security(&mut self, security: Arc<SecurityContext>) {
        self.security = security;
    }

    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    pub fn execution_time(&self) -> Duration {
        self.start_time.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COUNT: ContextKey<usize> = ContextKey::new("count");
    const NAME: ContextKey<String> = ContextKey::new("name");

    #[test]
    fn test_typed_values() {
        let mut ctx = PipelineContext::new(Arc::new(SecurityContext::anonymous())).with(COUNT, 3);
        ctx.put(NAME, "roads".to_string());
        assert_eq!(ctx.get(COUNT), Some(&3));
        assert_eq!(ctx.require(NAME).unwrap(), "roads");
        assert_eq!(ctx.remove(COUNT), Some(3));
        assert!(!ctx.contains(COUNT));
        assert_eq!(ctx.get_or(COUNT, 7), 7);
    }

    #[test]
    fn test_missing_value_names_key() {
        let ctx = PipelineContext::new(Arc::new(SecurityContext::anonymous()));
        match ctx.require(NAME) {
            Err(PipelineError::MissingParameter(name)) => assert_eq!(name, "name"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_request_identity_and_elapsed_time() {
        let ctx = PipelineContext::new(Arc::new(SecurityContext::anonymous()));
        let other = PipelineContext::new(Arc::new(SecurityContext::anonymous()));
        assert_ne!(ctx.request_id(), other.request_id());

        let first = ctx.execution_time();
        std::thread::sleep(Duration::from_millis(2));
        assert!(ctx.execution_time() > first);
    }
}
