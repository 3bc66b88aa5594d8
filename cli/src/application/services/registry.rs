//! Application service — the in-process agent registry.
//!
//! One readers-writer lock guards both the id → agent map and the set of ids
//! whose creation is in flight. Creation claims its id with [`AgentRegistry::reserve`]
//! before touching the runtime, so two concurrent creates of the same id in
//! one process cannot both proceed.

use std::collections::{HashMap, HashSet};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use capsulate_common::AgentState;

use crate::domain::{Agent, RegistryError};

#[derive(Debug, Default)]
struct RegistryInner {
    agents: HashMap<String, Agent>,
    reserved: HashSet<String>,
}

/// Concurrency-safe map of agent id to agent.
///
/// Process-local: it says nothing about whether the backing container still
/// exists.
#[derive(Debug, Default)]
pub struct AgentRegistry {
    inner: RwLock<RegistryInner>,
}

impl AgentRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, RegistryInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, RegistryInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Claim `id` for an in-flight creation.
    ///
    /// The claim is released when the returned guard is dropped, unless it is
    /// turned into a registration with [`Reservation::commit`].
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::AlreadyExists`] if `id` is registered or
    /// already reserved.
    pub fn reserve(&self, id: &str) -> Result<Reservation<'_>, RegistryError> {
        let mut inner = self.write();
        if inner.agents.contains_key(id) || inner.reserved.contains(id) {
            return Err(RegistryError::AlreadyExists(id.to_string()));
        }
        inner.reserved.insert(id.to_string());
        Ok(Reservation {
            registry: self,
            id: id.to_string(),
            committed: false,
        })
    }

    /// # Errors
    ///
    /// Returns [`RegistryError::AlreadyExists`] if the id is registered or
    /// reserved.
    pub fn register(&self, agent: Agent) -> Result<(), RegistryError> {
        let mut inner = self.write();
        if inner.agents.contains_key(&agent.id) || inner.reserved.contains(&agent.id) {
            return Err(RegistryError::AlreadyExists(agent.id));
        }
        inner.agents.insert(agent.id.clone(), agent);
        Ok(())
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<Agent> {
        self.read().agents.get(id).cloned()
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.read().agents.contains_key(id)
    }

    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] if `id` is not registered.
    pub fn remove(&self, id: &str) -> Result<Agent, RegistryError> {
        self.write()
            .agents
            .remove(id)
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))
    }

    /// All registered agents, sorted by id.
    #[must_use]
    pub fn list(&self) -> Vec<Agent> {
        let mut agents: Vec<Agent> = self.read().agents.values().cloned().collect();
        agents.sort_by(|a, b| a.id.cmp(&b.id));
        agents
    }

    /// Apply `f` to the stored agent and return the updated copy.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] if `id` is not registered.
    pub fn update(&self, id: &str, f: impl FnOnce(&mut Agent)) -> Result<Agent, RegistryError> {
        let mut inner = self.write();
        let agent = inner
            .agents
            .get_mut(id)
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;
        f(agent);
        Ok(agent.clone())
    }

    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] if `id` is not registered.
    pub fn set_state(&self, id: &str, state: AgentState) -> Result<Agent, RegistryError> {
        self.update(id, |agent| agent.state = state)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.read().agents.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn release(&self, id: &str) {
        self.write().reserved.remove(id);
    }

    fn commit_reserved(&self, agent: Agent) {
        let mut inner = self.write();
        inner.reserved.remove(&agent.id);
        inner.agents.insert(agent.id.clone(), agent);
    }
}

/// Claim on an agent id held for the duration of a creation.
#[derive(Debug)]
#[must_use = "dropping a reservation releases the id"]
pub struct Reservation<'a> {
    registry: &'a AgentRegistry,
    id: String,
    committed: bool,
}

impl Reservation<'_> {
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Turn the claim into a registration of `agent`.
    ///
    /// # Panics
    ///
    /// Debug builds assert that `agent.id` matches the reserved id.
    pub fn commit(mut self, agent: Agent) {
        debug_assert_eq!(agent.id, self.id);
        self.committed = true;
        self.registry.commit_reserved(agent);
    }
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.registry.release(&self.id);
        }
    }
}
