//! Context Store: run-scoped, key-addressed state shared by the steps of one run.
//!
//! Values are stored type-erased and read back by type. Every operation takes
//! the store lock for the duration of the call only, so no lock is ever held
//! across a step boundary.

use crate::error::WorkflowError;
use crate::event::WorkflowEvent;
use crate::stream::EventSink;
use std::any::{Any, type_name};
use std::collections::HashMap;
use tokio::sync::Mutex;

type Slot = Box<dyn Any + Send + Sync>;

/// State and stream access for a single workflow run.
///
/// Created by the scheduler when a run starts and dropped when it ends.
pub struct Context<E: WorkflowEvent> {
    run_id: String,
    store: Mutex<HashMap<String, Slot>>,
    sink: EventSink<E>,
}

impl<E: WorkflowEvent> Context<E> {
    pub(crate) fn new(run_id: String, sink: EventSink<E>) -> Self {
        Self {
            run_id,
            store: Mutex::new(HashMap::new()),
            sink,
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Read `key`, or `default` if nothing is stored there.
    ///
    /// Fails only when the stored value is of a different type.
    pub async fn get<T>(&self, key: &str, default: T) -> Result<T, WorkflowError>
    where
        T: Clone + Send + Sync + 'static,
    {
        Ok(self.get_opt(key).await?.unwrap_or(default))
    }

    /// Read `key` if present.
    pub async fn get_opt<T>(&self, key: &str) -> Result<Option<T>, WorkflowError>
    where
        T: Clone + Send + Sync + 'static,
    {
        let store = self.store.lock().await;
        match store.get(key) {
            None => Ok(None),
            Some(slot) => downcast_ref::<T>(key, slot).map(|v| Some(v.clone())),
        }
    }

    /// Store `value` under `key`, replacing whatever was there.
    pub async fn set<T>(&self, key: impl Into<String>, value: T)
    where
        T: Send + Sync + 'static,
    {
        self.store.lock().await.insert(key.into(), Box::new(value));
    }

    /// Mutate the value under `key` in place, seeding it with `default` if absent.
    ///
    /// The read and the write happen under one lock acquisition.
    pub async fn update<T, R>(
        &self,
        key: &str,
        default: T,
        f: impl FnOnce(&mut T) -> R + Send,
    ) -> Result<R, WorkflowError>
    where
        T: Send + Sync + 'static,
    {
        let mut store = self.store.lock().await;
        let slot = store
            .entry(key.to_string())
            .or_insert_with(|| Box::new(default) as Slot);
        match slot.downcast_mut::<T>() {
            Some(value) => Ok(f(value)),
            None => Err(type_mismatch::<T>(key)),
        }
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.store.lock().await.contains_key(key)
    }

    /// Remove `key`. Returns whether something was stored there.
    pub async fn remove(&self, key: &str) -> bool {
        self.store.lock().await.remove(key).is_some()
    }

    /// Publish an observable event to the run's stream.
    pub async fn publish(&self, event: E) {
        self.sink.publish(event).await;
    }

    pub(crate) fn sink(&self) -> &EventSink<E> {
        &self.sink
    }
}

fn downcast_ref<'a, T: 'static>(key: &str, slot: &'a Slot) -> Result<&'a T, WorkflowError> {
    slot.downcast_ref::<T>().ok_or_else(|| type_mismatch::<T>(key))
}

fn type_mismatch<T>(key: &str) -> WorkflowError {
    WorkflowError::ContextType {
        key: key.to_string(),
        expected: type_name::<T>(),
    }
}

impl<E: WorkflowEvent> std::fmt::Debug for Context<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("run_id", &self.run_id)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream;

    #[derive(Debug, Clone)]
    struct Noop;

    impl WorkflowEvent for Noop {
        type Kind = u8;
        fn kind(&self) -> u8 {
            0
        }
        fn is_terminal(&self) -> bool {
            false
        }
        fn stop() -> Self {
            Noop
        }
    }

    fn ctx() -> Context<Noop> {
        let (sink, _stream) = stream::channel(4);
        Context::new("run-test".into(), sink)
    }

    #[tokio::test]
    async fn get_returns_default_when_absent() {
        let ctx = ctx();
        let v: Vec<String> = ctx.get("sources", Vec::new()).await.unwrap();
        assert!(v.is_empty());
        assert!(!ctx.contains("sources").await);
    }

    #[tokio::test]
    async fn set_replaces_value() {
        let ctx = ctx();
        ctx.set("n", 1u32).await;
        ctx.set("n", 2u32).await;
        assert_eq!(ctx.get("n", 0u32).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn type_mismatch_is_an_error() {
        let ctx = ctx();
        ctx.set("memory", "not a vec".to_string()).await;
        let err = ctx.get::<Vec<u8>>("memory", Vec::new()).await.unwrap_err();
        assert!(matches!(err, WorkflowError::ContextType { ref key, .. } if key == "memory"));
    }

    #[tokio::test]
    async fn update_seeds_and_mutates() {
        let ctx = ctx();
        let len = ctx
            .update("trace", Vec::<u8>::new(), |v| {
                v.push(1);
                v.len()
            })
            .await
            .unwrap();
        assert_eq!(len, 1);
        ctx.update("trace", Vec::<u8>::new(), |v| v.push(2)).await.unwrap();
        assert_eq!(ctx.get("trace", Vec::<u8>::new()).await.unwrap(), vec![1, 2]);
    }

    #[tokio::test]
    async fn update_with_wrong_type_fails() {
        let ctx = ctx();
        ctx.set("trace", 5u8).await;
        let res = ctx.update("trace", String::new(), |s| s.push('x')).await;
        assert!(res.is_err());
    }

    #[tokio::test]
    async fn remove_reports_presence() {
        let ctx = ctx();
        ctx.set("k", true).await;
        assert!(ctx.remove("k").await);
        assert!(!ctx.remove("k").await);
    }
}
