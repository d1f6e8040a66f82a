use tracing::{debug, instrument};

use crate::element::ElementRecord;
use crate::errors::AutomationError;
use crate::query::Query;
use crate::{FindResult, Spyglass, WaitResult};
use std::time::Duration;

// Default timeout if none is specified on the locator itself
const DEFAULT_LOCATOR_TIMEOUT: Duration = Duration::from_secs(30);

/// A reusable query bound to a [`Spyglass`] instance, with its own default
/// wait timeout.
#[derive(Debug, Clone)]
pub struct Locator {
    spyglass: Spyglass,
    query: Query,
    timeout: Duration,
}

impl Locator {
    pub(crate) fn new(spyglass: Spyglass, query: Query) -> Self {
        Self {
            spyglass,
            query,
            timeout: DEFAULT_LOCATOR_TIMEOUT,
        }
    }

    /// Set a default timeout for waiting operations on this locator instance.
    /// This timeout is used if no specific timeout is passed to `wait`/`first`.
    pub fn set_default_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Scopes the locator to the subtree of a previously returned element id.
    pub fn within(mut self, element_id: impl Into<String>) -> Self {
        self.query = self.query.within(element_id);
        self
    }

    /// Narrows the query further with another one; fields set on `refinement` win.
    pub fn and(mut self, refinement: Query) -> Self {
        let q = &mut self.query;
        macro_rules! take {
            ($($field:ident),*) => {
                $(if refinement.$field.is_some() { q.$field = refinement.$field; })*
            };
        }
        take!(
            name,
            automation_id,
            control_type,
            class_name,
            within,
            window,
            exact_depth,
            max_depth,
            region,
            near,
            match_index,
            limit
        );
        q.prominent |= refinement.prominent;
        self
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    /// Every current match, without waiting.
    pub async fn all(&self) -> Result<FindResult, AutomationError> {
        self.spyglass.find(&self.query).await
    }

    /// First match, waiting up to `timeout` (or the locator default).
    pub async fn first(&self, timeout: Option<Duration>) -> Result<ElementRecord, AutomationError> {
        let found = self.wait(timeout).await?;
        Ok(found.element)
    }

    /// Wait for an element matching the locator to appear, up to the specified timeout.
    /// If no timeout is provided, uses the locator's default timeout.
    #[instrument(level = "debug", skip(self, timeout))]
    pub async fn wait(&self, timeout: Option<Duration>) -> Result<WaitResult, AutomationError> {
        debug!("Waiting for element matching selector: {}", self.query);
        let effective_timeout = timeout.unwrap_or(self.timeout);
        self.spyglass
            .wait_for(&self.query, Some(effective_timeout))
            .await
    }

    pub fn selector_string(&self) -> String {
        self.query.to_string()
    }
}
