//! Named middleware stacks
//!
//! A [`MiddlewareStack`] is an ordered list of named request interceptors.
//! Building a stack snapshots it into an immutable [`MiddlewareChain`]; later
//! additions only affect chains built afterwards. The first entry of a chain
//! is the outermost wrapper around the terminal handler.

use std::convert::Infallible;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use axum::extract::Request;
use axum::response::Response;
use tower::util::BoxCloneSyncService;
use tower::{Layer, Service, ServiceExt};

use crate::{Error, Result};

/// Type-erased request handler shared by sites, middlewares and the dispatcher
pub type BoxHandler = BoxCloneSyncService<Request, Response, Infallible>;

/// Box any infallible tower service (an axum `Router`, a `service_fn`, ...)
pub fn boxed<S>(service: S) -> BoxHandler
where
    S: Service<Request, Response = Response, Error = Infallible> + Clone + Send + Sync + 'static,
    S::Future: Send + 'static,
{
    BoxCloneSyncService::new(service)
}

/// Build a handler from an async function
pub fn handler_fn<F, Fut>(f: F) -> BoxHandler
where
    F: Fn(Request) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    boxed(tower::service_fn(move |req: Request| {
        let fut = f(req);
        async move { Ok::<_, Infallible>(fut.await) }
    }))
}

/// Drive a handler to completion
pub async fn call_handler(handler: BoxHandler, req: Request) -> Response {
    match handler.oneshot(req).await {
        Ok(response) => response,
        Err(never) => match never {},
    }
}

/// How [`MiddlewareStack::add`] treats names that are already present
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Duplication {
    /// Reject the whole batch when any name collides
    Abort,
    /// Drop colliding entries and add the rest
    Skip,
}

type WrapFn = dyn Fn(BoxHandler) -> BoxHandler + Send + Sync;

/// A named request interceptor
#[derive(Clone)]
pub struct Middleware {
    name: String,
    wrap: Arc<WrapFn>,
}

impl Middleware {
    /// Create a middleware from a function wrapping the next handler
    pub fn new<F>(name: impl Into<String>, wrap: F) -> Self
    where
        F: Fn(BoxHandler) -> BoxHandler + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            wrap: Arc::new(wrap),
        }
    }

    /// Create a middleware from an async function receiving the request and the next handler
    ///
    /// ```no_run
    /// # use siteplex_core::middleware::{Middleware, call_handler};
    /// let mw = Middleware::from_fn("x-site", |req, next| async move {
    ///     let mut res = call_handler(next, req).await;
    ///     res.headers_mut().insert("x-site", "1".parse().unwrap());
    ///     res
    /// });
    /// ```
    pub fn from_fn<F, Fut>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(Request, BoxHandler) -> Fut + Clone + Send + Sync + 'static,
        Fut: Future<Output = Response> + Send + 'static,
    {
        Self::new(name, move |next: BoxHandler| {
            let f = f.clone();
            handler_fn(move |req| f(req, next.clone()))
        })
    }

    /// Create a middleware from a tower layer
    pub fn from_layer<L>(name: impl Into<String>, layer: L) -> Self
    where
        L: Layer<BoxHandler> + Send + Sync + 'static,
        L::Service: Service<Request, Response = Response, Error = Infallible>
            + Clone
            + Send
            + Sync
            + 'static,
        <L::Service as Service<Request>>::Future: Send + 'static,
    {
        Self::new(name, move |next| boxed(layer.layer(next)))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Wrap `next` with this middleware
    pub fn wrap(&self, next: BoxHandler) -> BoxHandler {
        (self.wrap)(next)
    }
}

impl fmt::Debug for Middleware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Middleware").field("name", &self.name).finish()
    }
}

/// Ordered, duplicate-rejecting list of middlewares
#[derive(Debug)]
pub struct MiddlewareStack {
    name: String,
    items: RwLock<Vec<Middleware>>,
    generation: AtomicU64,
}

impl MiddlewareStack {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            items: RwLock::new(Vec::new()),
            generation: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Add a batch of middlewares
    ///
    /// Returns the number of entries actually added. With
    /// [`Duplication::Abort`] a collision (against the stack or inside the
    /// batch) leaves the stack untouched.
    pub fn add(
        &self,
        middlewares: impl IntoIterator<Item = Middleware>,
        policy: Duplication,
    ) -> Result<usize> {
        let mut items = self
            .items
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let mut accepted: Vec<Middleware> = Vec::new();
        for mw in middlewares {
            let collides = items.iter().any(|m| m.name == mw.name)
                || accepted.iter().any(|m| m.name == mw.name);
            if !collides {
                accepted.push(mw);
                continue;
            }
            match policy {
                Duplication::Abort => {
                    return Err(Error::DuplicateMiddleware {
                        name: mw.name,
                        stack: self.name.clone(),
                    });
                }
                Duplication::Skip => {
                    tracing::debug!(
                        "Skipping duplicate middleware {:?} in stack {:?}",
                        mw.name,
                        self.name
                    );
                }
            }
        }

        let added = accepted.len();
        if added > 0 {
            items.extend(accepted);
            self.generation.fetch_add(1, Ordering::Release);
        }
        Ok(added)
    }

    /// Add a single middleware, rejecting duplicates
    pub fn push(&self, middleware: Middleware) -> Result<()> {
        self.add([middleware], Duplication::Abort).map(|_| ())
    }

    pub fn get(&self, name: &str) -> Option<Middleware> {
        self.items
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .find(|m| m.name == name)
            .cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.items
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .map(|m| m.name.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.items
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Changes whenever middlewares are added
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Snapshot the stack into an immutable chain
    pub fn build(&self) -> MiddlewareChain {
        let items = self
            .items
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        MiddlewareChain {
            items: items.iter().cloned().collect(),
        }
    }
}

/// Immutable middleware chain produced by [`MiddlewareStack::build`]
#[derive(Debug, Clone, Default)]
pub struct MiddlewareChain {
    items: Arc<[Middleware]>,
}

impl MiddlewareChain {
    /// Wrap `terminal` so that the first middleware runs first
    pub fn handler(&self, terminal: BoxHandler) -> BoxHandler {
        self.items
            .iter()
            .rev()
            .fold(terminal, |next, mw| mw.wrap(next))
    }

    pub fn names(&self) -> Vec<&str> {
        self.items.iter().map(|m| m.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
