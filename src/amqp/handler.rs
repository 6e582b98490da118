use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;

/// Receives the body of every message a listener consumes.
///
/// Returning an error aborts the listen session, the message is then left
/// unacknowledged.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, body: &str) -> anyhow::Result<()>;
}

#[async_trait]
impl<F> MessageHandler for F
where
    F: Fn(&str) -> anyhow::Result<()> + Send + Sync,
{
    async fn handle(&self, body: &str) -> anyhow::Result<()> {
        self(body)
    }
}

/// An object exposing message handlers by method name.
pub trait HandlerTarget: Send + Sync {
    fn resolve(&self, method: &str) -> Option<&dyn MessageHandler>;
}

/// Named handlers, the usual [`HandlerTarget`].
///
/// ```
/// use amqp_context::amqp::handler::{HandlerTarget, Service};
///
/// let service = Service::new().route("start", |body: &str| -> anyhow::Result<()> {
///     println!("{}", body);
///     Ok(())
/// });
/// assert!(service.resolve("start").is_some());
/// assert!(service.resolve("stop").is_none());
/// ```
#[derive(Default)]
pub struct Service {
    routes: HashMap<String, Box<dyn MessageHandler>>,
}

impl Service {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` under `method`, replacing any previous one.
    pub fn route<H>(mut self, method: &str, handler: H) -> Self
    where
        H: MessageHandler + 'static,
    {
        self.routes.insert(method.to_string(), Box::new(handler));
        self
    }

    pub fn methods(&self) -> Vec<&str> {
        let mut methods: Vec<&str> = self.routes.keys().map(String::as_str).collect();
        methods.sort_unstable();
        methods
    }
}

impl HandlerTarget for Service {
    fn resolve(&self, method: &str) -> Option<&dyn MessageHandler> {
        self.routes.get(method).map(|handler| handler.as_ref())
    }
}

impl fmt::Debug for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Service").field("methods", &self.methods()).finish()
    }
}
