use crate::browser::Page;
use crate::context::CrawlContext;
use crate::error::{HandlerError, RegistryError};
use crate::request::{Label, Request};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// Processing logic bound to one label
#[async_trait]
pub trait Handler<P: Page>: Send + Sync {
    async fn handle(&self, ctx: &mut CrawlContext<'_, P>) -> Result<(), HandlerError>;
}

/// Maps request labels to their handlers.
///
/// Built once before the crawl and shared read-only with every worker.
pub struct HandlerRegistry<P: Page> {
    handlers: HashMap<Label, Arc<dyn Handler<P>>>,
}

impl<P: Page> Default for HandlerRegistry<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Page> HandlerRegistry<P> {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Bind `handler` to `label`. Each label can be bound once.
    pub fn register(
        &mut self,
        label: Label,
        handler: impl Handler<P> + 'static,
    ) -> Result<&mut Self, RegistryError> {
        if self.handlers.contains_key(&label) {
            return Err(RegistryError::DuplicateHandler(label));
        }
        ::log::debug!("Registered handler for label {}", label);
        self.handlers.insert(label, Arc::new(handler));
        Ok(self)
    }

    /// Bind the handler for unlabeled requests
    pub fn register_default(
        &mut self,
        handler: impl Handler<P> + 'static,
    ) -> Result<&mut Self, RegistryError> {
        self.register(Label::Default, handler)
    }

    /// Fail unless a default handler is bound
    pub fn validate(&self) -> Result<(), RegistryError> {
        if self.handlers.contains_key(&Label::Default) {
            Ok(())
        } else {
            Err(RegistryError::MissingDefault)
        }
    }

    /// Handler for the request's label.
    ///
    /// The default handler only serves unlabeled requests; a label with no
    /// handler of its own is an error rather than a fallback to the default.
    pub fn resolve(&self, request: &Request) -> Result<Arc<dyn Handler<P>>, RegistryError> {
        self.handlers
            .get(&request.label())
            .cloned()
            .ok_or(RegistryError::NoHandler(request.label()))
    }

    pub fn labels(&self) -> Vec<Label> {
        Label::ALL
            .into_iter()
            .filter(|label| self.handlers.contains_key(label))
            .collect()
    }
}
