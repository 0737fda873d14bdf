use std::{collections::HashMap, future::Future, sync::Arc};

use async_trait::async_trait;

use crate::{errors::Error, request::Request, Result};

/// An async command handler.
///
/// Closures `Fn(Request) -> impl Future<Output = Result<()>>` implement this
/// directly, so most plugins never name the trait.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn handle(&self, req: Request) -> Result<()>;
}

#[async_trait]
impl<F, Fut> CommandHandler for F
where
    F: Fn(Request) -> Fut + Send + Sync,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    async fn handle(&self, req: Request) -> Result<()> {
        (self)(req).await
    }
}

enum Route {
    Handler(Arc<dyn CommandHandler>),
    Nested(Router),
}

/// Keyword → handler dispatch table with nested namespaces.
///
/// Built once at startup and then moved into [`crate::bastion::Bastion`];
/// read-only afterwards.
#[derive(Default)]
pub struct Router {
    routes: HashMap<String, Route>,
}

/// Result of a dispatch attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Dispatched {
    /// A handler ran; `path` is the full command path (e.g. `fit profile`).
    Handled { path: String },
    /// No registered keyword matched; nothing ran and nothing was replied.
    NoMatch,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler. Keywords are case-sensitive and must be unique.
    pub fn register<H>(&mut self, keyword: &str, handler: H) -> Result<()>
    where
        H: CommandHandler + 'static,
    {
        self.insert(keyword, Route::Handler(Arc::new(handler)))
    }

    /// Create an empty sub-router reachable as `namespace <command>`.
    pub fn sub_router(&mut self, namespace: &str) -> Result<&mut Router> {
        self.insert(namespace, Route::Nested(Router::new()))?;
        match self.routes.get_mut(namespace) {
            Some(Route::Nested(r)) => Ok(r),
            _ => Err(Error::Config(format!(
                "sub-router `{namespace}` vanished after insert"
            ))),
        }
    }

    /// Attach a pre-built router under `namespace`.
    pub fn nest(&mut self, namespace: &str, router: Router) -> Result<()> {
        self.insert(namespace, Route::Nested(router))
    }

    fn insert(&mut self, keyword: &str, route: Route) -> Result<()> {
        if keyword.is_empty() || keyword.chars().any(char::is_whitespace) {
            return Err(Error::Config(format!(
                "invalid command keyword `{keyword}`"
            )));
        }
        if self.routes.contains_key(keyword) {
            return Err(Error::DuplicateCommand(keyword.to_string()));
        }
        self.routes.insert(keyword.to_string(), route);
        Ok(())
    }

    /// Resolve `text` (instigator already stripped) to a handler, its full
    /// command path and the remaining text.
    pub fn resolve(&self, text: &str) -> Option<(Arc<dyn CommandHandler>, String, String)> {
        let (keyword, rest) = split_keyword(text);
        match self.routes.get(keyword)? {
            Route::Handler(h) => Some((h.clone(), keyword.to_string(), rest.to_string())),
            Route::Nested(sub) => {
                let (h, path, rest) = sub.resolve(rest)?;
                Some((h, format!("{keyword} {path}"), rest))
            }
        }
    }

    /// Invoke the handler matching the request's remaining text, if any.
    pub async fn dispatch(&self, req: Request) -> Result<Dispatched> {
        let Some((handler, path, rest)) = self.resolve(req.remainder()) else {
            return Ok(Dispatched::NoMatch);
        };
        handler.handle(req.with_remainder(rest)).await?;
        Ok(Dispatched::Handled { path })
    }

    /// Every registered command path, sorted.
    pub fn commands(&self) -> Vec<String> {
        let mut out = Vec::new();
        for (keyword, route) in &self.routes {
            match route {
                Route::Handler(_) => out.push(keyword.clone()),
                Route::Nested(sub) => {
                    out.extend(sub.commands().into_iter().map(|c| format!("{keyword} {c}")))
                }
            }
        }
        out.sort();
        out
    }
}

/// Split on the first whitespace run: `("fit", "profile now")`.
pub fn split_keyword(text: &str) -> (&str, &str) {
    let text = text.trim_start();
    match text.find(char::is_whitespace) {
        Some(idx) => (&text[..idx], text[idx..].trim()),
        None => (text, ""),
    }
}
