//! Provider-state coordination.
//!
//! Callers register setup and teardown hooks per state label. Before an
//! interaction runs, the setup hook of each of its states is invoked; after
//! its response has been matched, teardown hooks run on a best-effort basis.

use crate::contract::Interaction;
use crate::error::InteractionError;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Hook invoked with the provider-state label it was registered for.
#[async_trait]
pub trait StateHook: Send + Sync {
    /// Put the provider into (or take it out of) the given state.
    async fn run(&self, state: &str) -> anyhow::Result<()>;
}

#[async_trait]
impl<F> StateHook for F
where
    F: Fn(&str) -> anyhow::Result<()> + Send + Sync,
{
    async fn run(&self, state: &str) -> anyhow::Result<()> {
        self(state)
    }
}

/// Hooks registered for one provider-state label.
#[derive(Clone)]
pub struct ProviderStateRegistration {
    label: String,
    setup: Option<Arc<dyn StateHook>>,
    teardown: Option<Arc<dyn StateHook>>,
}

impl ProviderStateRegistration {
    /// Register a label with no hooks.
    #[must_use]
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            setup: None,
            teardown: None,
        }
    }

    /// Attach a setup hook.
    #[must_use]
    pub fn with_setup(mut self, hook: impl StateHook + 'static) -> Self {
        self.setup = Some(Arc::new(hook));
        self
    }

    /// Attach a teardown hook.
    #[must_use]
    pub fn with_teardown(mut self, hook: impl StateHook + 'static) -> Self {
        self.teardown = Some(Arc::new(hook));
        self
    }

    /// Attach optional, already shared hooks.
    #[must_use]
    pub fn with_hooks(
        mut self,
        setup: Option<Arc<dyn StateHook>>,
        teardown: Option<Arc<dyn StateHook>>,
    ) -> Self {
        self.setup = setup;
        self.teardown = teardown;
        self
    }

    /// State label.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Whether a setup hook is attached.
    #[must_use]
    pub const fn has_setup(&self) -> bool {
        self.setup.is_some()
    }

    /// Whether a teardown hook is attached.
    #[must_use]
    pub const fn has_teardown(&self) -> bool {
        self.teardown.is_some()
    }
}

impl fmt::Debug for ProviderStateRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderStateRegistration")
            .field("label", &self.label)
            .field("setup", &self.has_setup())
            .field("teardown", &self.has_teardown())
            .finish()
    }
}

/// Ordered set of registrations keyed by exact label.
#[derive(Debug, Clone, Default)]
pub struct ProviderStates {
    registrations: Vec<ProviderStateRegistration>,
}

impl ProviderStates {
    /// Create an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a registration. A later registration for the same label replaces
    /// the earlier one in place.
    pub fn register(&mut self, registration: ProviderStateRegistration) {
        match self
            .registrations
            .iter_mut()
            .find(|r| r.label == registration.label)
        {
            Some(existing) => *existing = registration,
            None => self.registrations.push(registration),
        }
    }

    /// Look up a registration by exact label.
    #[must_use]
    pub fn get(&self, label: &str) -> Option<&ProviderStateRegistration> {
        self.registrations.iter().find(|r| r.label == label)
    }

    /// Registered labels, in registration order.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.registrations.iter().map(|r| r.label.as_str())
    }

    /// Number of registrations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    /// Whether nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    /// Run setup hooks for each of the interaction's states, in order.
    ///
    /// Unregistered states and registrations without a setup hook are
    /// skipped. The first failing hook stops setup for this interaction.
    ///
    /// # Errors
    ///
    /// Returns [`InteractionError::ProviderStateSetup`] naming the failing state.
    pub async fn set_up(&self, interaction: &Interaction) -> Result<(), InteractionError> {
        for state in interaction.states() {
            let Some(hook) = self.get(state).and_then(|r| r.setup.as_ref()) else {
                debug!(state, "no setup hook registered");
                continue;
            };
            debug!(state, "running provider state setup");
            hook.run(state)
                .await
                .map_err(|e| InteractionError::ProviderStateSetup {
                    state: state.to_string(),
                    message: format!("{e:#}"),
                })?;
        }
        Ok(())
    }

    /// Run teardown hooks for each of the interaction's states, in reverse
    /// order. Failures are returned as warnings and never abort.
    pub async fn tear_down(&self, interaction: &Interaction) -> Vec<String> {
        let mut warnings = Vec::new();
        for state in interaction.states().into_iter().rev() {
            let Some(hook) = self.get(state).and_then(|r| r.teardown.as_ref()) else {
                continue;
            };
            debug!(state, "running provider state teardown");
            if let Err(e) = hook.run(state).await {
                warn!(state, error = %e, "provider state teardown failed");
                warnings.push(format!("teardown for state {state:?} failed: {e:#}"));
            }
        }
        warnings
    }
}
