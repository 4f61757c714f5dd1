//! Callable references stored in the route table.
//!
//! # Responsibilities
//! - Wrap business functions as `TargetFn` (positional arguments in, JSON out)
//! - Wrap request middleware as `Middleware`
//! - Provide typed access to positional arguments
//!
//! # Design Decisions
//! - Both references are `Arc`-backed so table entries clone cheaply
//! - Results are serialized when the business function returns, so the
//!   compiled handler only ever deals with `serde_json::Value`

use std::borrow::Cow;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use axum::body::Body;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;
use futures_util::future::{BoxFuture, FutureExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::http::response::DispatchError;
use crate::routing::resolver::Signature;

/// Future returned by a target function.
pub type TargetFuture = BoxFuture<'static, Result<Value, DispatchError>>;

type TargetCall = dyn Fn(Arguments) -> TargetFuture + Send + Sync;
type MiddlewareCall = dyn Fn(Request<Body>, Next) -> BoxFuture<'static, Response> + Send + Sync;

/// Positional arguments assembled for a target function.
///
/// Slots that could not be bound from the request are `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Arguments {
    slots: Vec<Option<Value>>,
}

impl Arguments {
    pub fn with_arity(arity: usize) -> Self {
        Self {
            slots: vec![None; arity],
        }
    }

    pub fn set(&mut self, index: usize, value: Value) {
        if index >= self.slots.len() {
            self.slots.resize(index + 1, None);
        }
        self.slots[index] = Some(value);
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.slots.get(index).and_then(Option::as_ref)
    }

    /// Slot as a string slice, if it holds a JSON string.
    pub fn str(&self, index: usize) -> Option<&str> {
        self.get(index).and_then(Value::as_str)
    }

    pub fn string(&self, index: usize) -> Option<String> {
        self.str(index).map(str::to_owned)
    }

    /// Deserialize a slot. An unset slot yields `Ok(None)`.
    pub fn parse<T: DeserializeOwned>(&self, index: usize) -> Result<Option<T>, DispatchError> {
        match self.get(index) {
            None => Ok(None),
            Some(value) => serde_json::from_value(value.clone())
                .map(Some)
                .map_err(|e| DispatchError::BadRequest(format!("argument {}: {}", index, e))),
        }
    }

    pub fn into_values(self) -> Vec<Option<Value>> {
        self.slots
    }
}

/// A business function bound into the route table.
#[derive(Clone)]
pub struct TargetFn {
    name: Cow<'static, str>,
    signature: Option<Signature>,
    call: Arc<TargetCall>,
}

impl TargetFn {
    /// Wrap an async function of the positional arguments.
    pub fn new<F, Fut, T>(name: impl Into<Cow<'static, str>>, f: F) -> Self
    where
        F: Fn(Arguments) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, DispatchError>> + Send + 'static,
        T: Serialize + Send + 'static,
    {
        let call = move |args: Arguments| {
            let fut = f(args);
            async move {
                let result = fut.await?;
                serde_json::to_value(result).map_err(DispatchError::Serialize)
            }
            .boxed()
        };
        Self {
            name: name.into(),
            signature: None,
            call: Arc::new(call),
        }
    }

    /// Attach the declared parameter list used to derive binding names.
    pub fn with_signature(mut self, signature: Signature) -> Self {
        self.signature = Some(signature);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn signature(&self) -> Option<&Signature> {
        self.signature.as_ref()
    }

    pub fn call(&self, args: Arguments) -> TargetFuture {
        (self.call)(args)
    }
}

impl fmt::Debug for TargetFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TargetFn")
            .field("name", &self.name)
            .field("signature", &self.signature)
            .finish_non_exhaustive()
    }
}

/// A pre-handler step that may short-circuit or augment the request.
#[derive(Clone)]
pub struct Middleware {
    name: Cow<'static, str>,
    call: Arc<MiddlewareCall>,
}

impl Middleware {
    pub fn from_fn<F, Fut>(name: impl Into<Cow<'static, str>>, f: F) -> Self
    where
        F: Fn(Request<Body>, Next) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Response> + Send + 'static,
    {
        Self {
            name: name.into(),
            call: Arc::new(move |req, next| f(req, next).boxed()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn call(&self, req: Request<Body>, next: Next) -> BoxFuture<'static, Response> {
        (self.call)(req, next)
    }
}

impl fmt::Debug for Middleware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Middleware").field(&self.name).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_arguments_accessors() {
        let mut args = Arguments::with_arity(2);
        args.set(0, json!("hi"));
        args.set(3, json!({"n": 4}));

        assert_eq!(args.len(), 4);
        assert_eq!(args.str(0), Some("hi"));
        assert_eq!(args.get(1), None);

        #[derive(serde::Deserialize, PartialEq, Debug)]
        struct N {
            n: u32,
        }
        assert_eq!(args.parse::<N>(3).unwrap(), Some(N { n: 4 }));
        assert_eq!(args.parse::<N>(1).unwrap(), None);
        assert!(args.parse::<u32>(0).is_err());
    }

    #[tokio::test]
    async fn test_target_serializes_result() {
        let target = TargetFn::new("double", |args: Arguments| async move {
            let n: u32 = args.parse(0)?.unwrap_or_default();
            Ok::<_, DispatchError>(n * 2)
        });
        let mut args = Arguments::with_arity(1);
        args.set(0, json!(21));

        assert_eq!(target.name(), "double");
        assert_eq!(target.call(args).await.unwrap(), json!(42));
    }
}
