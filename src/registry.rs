//! Instance registry for rendered containers
//!
//! A container with one logical id can render many times on a page: once
//! per row of a repeating list, or as late-mounting duplicates while data
//! is still arriving. The registry tracks every rendered instance,
//! evaluates the condition set once per identity slot, and replays the
//! cached decision to the rest.

use crate::config::ContainerConfig;
use crate::evaluator::decide;
use crate::lookup::LookupFilter;
use crate::profile::{ChildInitializer, DiagnosticSink, ProfileStore};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Unique handle for one rendered instance
pub type InstanceId = u64;

/// Identity of a rendered container: the author-assigned logical id shared
/// by all copies, plus a row discriminator when the container sits inside a
/// repeating collection. Instances with the same id and no row scope share
/// one decision; different row scopes are evaluated independently.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContainerIdentity {
    pub container_id: String,
    pub row_scope: Option<String>,
}

impl ContainerIdentity {
    pub fn new(container_id: impl Into<String>) -> Self {
        Self {
            container_id: container_id.into(),
            row_scope: None,
        }
    }

    pub fn scoped(container_id: impl Into<String>, row_scope: impl Into<String>) -> Self {
        Self {
            container_id: container_id.into(),
            row_scope: Some(row_scope.into()),
        }
    }
}

/// Visibility decision state for an identity slot or an instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Evaluation has not completed yet
    Pending,
    /// Final visibility for the slot
    Resolved(bool),
}

impl Decision {
    /// The resolved visibility, if any
    pub fn visible(&self) -> Option<bool> {
        match self {
            Decision::Pending => None,
            Decision::Resolved(visible) => Some(*visible),
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Decision::Pending)
    }
}

/// One rendered instance tracked by the registry
#[derive(Debug, Clone)]
struct RegistryEntry<E> {
    identity: ContainerIdentity,
    element: E,
    decision: Decision,
    initialized: bool,
}

/// Clone-out view of a tracked instance
#[derive(Debug, Clone)]
pub struct InstanceSnapshot<E> {
    pub instance: InstanceId,
    pub identity: ContainerIdentity,
    pub element: E,
    pub decision: Decision,
    /// Whether this instance's children have been initialized
    pub initialized: bool,
}

/// Context handed to the host when a container's children initialize
#[derive(Debug, Clone)]
pub struct InstanceContext {
    pub instance: InstanceId,
    pub identity: ContainerIdentity,
}

/// Ownership claim on an identity slot at registration time
enum Claim {
    /// First registration for the slot; this instance evaluates
    Owner,
    /// Another instance is evaluating; its completion sweep covers us
    Follower,
    /// The slot already resolved; apply the cached decision
    Cached(bool),
}

/// Tracks all rendered container instances and their visibility decisions.
///
/// The registry owns the only shared mutable state in the engine. It is
/// constructed with its collaborators injected and scoped to one page or
/// session; entries live until the registry is dropped.
pub struct InstanceRegistry<E> {
    entries: DashMap<InstanceId, RegistryEntry<E>>,
    decisions: DashMap<ContainerIdentity, Decision>,
    next_instance: AtomicU64,
    profiles: Arc<dyn ProfileStore>,
    children: Arc<dyn ChildInitializer<E>>,
    diagnostics: Option<Arc<dyn DiagnosticSink>>,
}

impl<E: Clone + Send + Sync + 'static> InstanceRegistry<E> {
    pub fn new(profiles: Arc<dyn ProfileStore>, children: Arc<dyn ChildInitializer<E>>) -> Self {
        Self {
            entries: DashMap::new(),
            decisions: DashMap::new(),
            next_instance: AtomicU64::new(1),
            profiles,
            children,
            diagnostics: None,
        }
    }

    /// Attach a diagnostic sink (preview/development contexts only)
    pub fn with_diagnostics(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.diagnostics = Some(sink);
        self
    }

    /// Register a newly mounted instance and resolve its visibility.
    ///
    /// The first instance of an identity slot fetches the profile and runs
    /// the condition set; duplicates receive the cached decision without
    /// re-evaluation. Always completes: a failed profile fetch resolves the
    /// slot as hidden.
    pub async fn register(
        &self,
        identity: ContainerIdentity,
        element: E,
        config: &ContainerConfig,
    ) -> InstanceId {
        let instance = self.next_instance.fetch_add(1, Ordering::Relaxed);
        self.entries.insert(
            instance,
            RegistryEntry {
                identity: identity.clone(),
                element,
                decision: Decision::Pending,
                initialized: false,
            },
        );

        // Claim the identity slot. The map guard must not live across an
        // await, so the claim is decided in its own statement.
        let claim = match self.decisions.entry(identity.clone()) {
            Entry::Occupied(slot) => match *slot.get() {
                Decision::Resolved(visible) => Claim::Cached(visible),
                Decision::Pending => Claim::Follower,
            },
            Entry::Vacant(slot) => {
                slot.insert(Decision::Pending);
                Claim::Owner
            }
        };

        match claim {
            Claim::Cached(visible) => self.apply_to_instance(instance, visible).await,
            Claim::Follower => {
                // The in-flight owner's completion sweep picks this entry up.
            }
            Claim::Owner => {
                let visible = self.evaluate(config).await;
                // Cache before touching any instance, so a registration that
                // lands mid-sweep observes the result instead of starting a
                // second evaluation.
                self.decisions
                    .insert(identity.clone(), Decision::Resolved(visible));
                self.apply_to_slot(&identity, visible).await;
            }
        }

        instance
    }

    /// Cached decision for a logical id, `Pending` when nothing has
    /// resolved yet
    pub fn decision(&self, container_id: &str, row_scope: Option<&str>) -> Decision {
        let key = ContainerIdentity {
            container_id: container_id.to_string(),
            row_scope: row_scope.map(str::to_string),
        };
        self.decisions
            .get(&key)
            .map(|slot| *slot.value())
            .unwrap_or(Decision::Pending)
    }

    /// Clone-out view of one instance
    pub fn snapshot(&self, instance: InstanceId) -> Option<InstanceSnapshot<E>> {
        self.entries.get(&instance).map(|entry| InstanceSnapshot {
            instance,
            identity: entry.identity.clone(),
            element: entry.element.clone(),
            decision: entry.decision,
            initialized: entry.initialized,
        })
    }

    /// All instances matching a filter, in registration order
    pub fn find(&self, filter: &LookupFilter<E>) -> Vec<InstanceSnapshot<E>> {
        let mut hits: Vec<InstanceSnapshot<E>> = self
            .entries
            .iter()
            .map(|entry| InstanceSnapshot {
                instance: *entry.key(),
                identity: entry.identity.clone(),
                element: entry.element.clone(),
                decision: entry.decision,
                initialized: entry.initialized,
            })
            .filter(|snapshot| filter.matches(snapshot))
            .collect();
        hits.sort_by_key(|snapshot| snapshot.instance);
        hits
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Run the profile fetch and condition-set decision for a slot owner.
    /// Never fails: fetch errors resolve as hidden.
    async fn evaluate(&self, config: &ContainerConfig) -> bool {
        if !config.is_conditional() {
            return true;
        }
        match self.profiles.fetch_profile().await {
            Ok(profile) => decide(config, profile.as_ref(), self.diagnostics.as_deref()),
            Err(err) => {
                log::warn!("profile fetch failed, hiding container: {}", err);
                false
            }
        }
    }

    /// Apply a resolved decision to every instance sharing an identity slot.
    async fn apply_to_slot(&self, identity: &ContainerIdentity, visible: bool) {
        let members: Vec<InstanceId> = self
            .entries
            .iter()
            .filter(|entry| entry.identity == *identity)
            .map(|entry| *entry.key())
            .collect();

        for instance in members {
            self.apply_to_instance(instance, visible).await;
        }
    }

    /// Record the decision on one instance and, when visible, boot its
    /// children. Initialization runs at most once per instance.
    async fn apply_to_instance(&self, instance: InstanceId, visible: bool) {
        let pending_init = {
            let Some(mut entry) = self.entries.get_mut(&instance) else {
                return;
            };
            entry.decision = Decision::Resolved(visible);
            if visible && !entry.initialized {
                entry.initialized = true;
                Some((entry.element.clone(), entry.identity.clone()))
            } else {
                None
            }
        };

        if let Some((element, identity)) = pending_init {
            let context = InstanceContext { instance, identity };
            if let Err(err) = self.children.initialize_children(&element, &context).await {
                log::warn!(
                    "child initialization failed for container '{}': {}",
                    context.identity.container_id,
                    err
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Toggle;
    use crate::profile::Profile;
    use crate::types::{Logic, Rule, Visibility};
    use crate::ContainerError;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    struct StaticProfiles {
        profile: Option<Profile>,
        fail: bool,
        fetches: AtomicUsize,
    }

    impl StaticProfiles {
        fn with(profile: Profile) -> Arc<Self> {
            Arc::new(Self {
                profile: Some(profile),
                fail: false,
                fetches: AtomicUsize::new(0),
            })
        }

        fn unauthenticated() -> Arc<Self> {
            Arc::new(Self {
                profile: None,
                fail: false,
                fetches: AtomicUsize::new(0),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                profile: None,
                fail: true,
                fetches: AtomicUsize::new(0),
            })
        }

        fn fetches(&self) -> usize {
            self.fetches.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ProfileStore for StaticProfiles {
        async fn fetch_profile(&self) -> crate::Result<Option<Profile>> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(ContainerError::ProfileFetch("session store offline".into()));
            }
            Ok(self.profile.clone())
        }
    }

    struct CountingInit {
        initialized: Mutex<Vec<String>>,
    }

    impl CountingInit {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                initialized: Mutex::new(Vec::new()),
            })
        }

        fn elements(&self) -> Vec<String> {
            self.initialized.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ChildInitializer<String> for CountingInit {
        async fn initialize_children(
            &self,
            element: &String,
            _context: &InstanceContext,
        ) -> crate::Result<()> {
            self.initialized.lock().unwrap().push(element.clone());
            Ok(())
        }
    }

    fn admin_show_config() -> ContainerConfig {
        ContainerConfig {
            use_as_conditional_container: Toggle::enabled(),
            conditions: vec![Rule::new("role", Logic::Equal, "admin", Visibility::Show)],
        }
    }

    fn admin_profile() -> Profile {
        Profile::from_attributes([("role", "admin")])
    }

    #[tokio::test]
    async fn test_owner_evaluates_and_initializes() {
        let profiles = StaticProfiles::with(admin_profile());
        let children = CountingInit::new();
        let registry = InstanceRegistry::new(profiles.clone(), children.clone());

        let instance = registry
            .register(ContainerIdentity::new("42"), "el-1".to_string(), &admin_show_config())
            .await;

        let snapshot = registry.snapshot(instance).unwrap();
        assert_eq!(snapshot.decision, Decision::Resolved(true));
        assert!(snapshot.initialized);
        assert_eq!(profiles.fetches(), 1);
        assert_eq!(children.elements(), vec!["el-1".to_string()]);
    }

    #[tokio::test]
    async fn test_cached_decision_replayed_without_reevaluation() {
        let profiles = StaticProfiles::with(admin_profile());
        let children = CountingInit::new();
        let registry = InstanceRegistry::new(profiles.clone(), children.clone());
        let config = admin_show_config();

        let first = registry
            .register(ContainerIdentity::new("42"), "el-1".to_string(), &config)
            .await;
        let second = registry
            .register(ContainerIdentity::new("42"), "el-2".to_string(), &config)
            .await;

        assert_eq!(profiles.fetches(), 1);
        assert_eq!(
            registry.snapshot(first).unwrap().decision,
            Decision::Resolved(true)
        );
        assert_eq!(
            registry.snapshot(second).unwrap().decision,
            Decision::Resolved(true)
        );
        // Each instance's children initialize exactly once.
        assert_eq!(
            children.elements(),
            vec!["el-1".to_string(), "el-2".to_string()]
        );
    }

    #[tokio::test]
    async fn test_row_scopes_evaluate_independently() {
        let profiles = StaticProfiles::with(admin_profile());
        let children = CountingInit::new();
        let registry = InstanceRegistry::new(profiles.clone(), children.clone());
        let config = admin_show_config();

        registry
            .register(
                ContainerIdentity::scoped("42", "row-1"),
                "el-1".to_string(),
                &config,
            )
            .await;
        registry
            .register(
                ContainerIdentity::scoped("42", "row-2"),
                "el-2".to_string(),
                &config,
            )
            .await;

        assert_eq!(profiles.fetches(), 2);
        assert_eq!(
            registry.decision("42", Some("row-1")),
            Decision::Resolved(true)
        );
        assert_eq!(
            registry.decision("42", Some("row-2")),
            Decision::Resolved(true)
        );
        // The non-scoped slot never resolved.
        assert_eq!(registry.decision("42", None), Decision::Pending);
    }

    #[tokio::test]
    async fn test_disabled_conditional_skips_fetch_and_shows() {
        let profiles = StaticProfiles::unauthenticated();
        let children = CountingInit::new();
        let registry = InstanceRegistry::new(profiles.clone(), children.clone());
        let config = ContainerConfig::default();

        let instance = registry
            .register(ContainerIdentity::new("plain"), "el".to_string(), &config)
            .await;

        assert_eq!(
            registry.snapshot(instance).unwrap().decision,
            Decision::Resolved(true)
        );
        assert_eq!(profiles.fetches(), 0);
        assert_eq!(children.elements(), vec!["el".to_string()]);
    }

    #[tokio::test]
    async fn test_unauthenticated_hides_without_initialization() {
        let profiles = StaticProfiles::unauthenticated();
        let children = CountingInit::new();
        let registry = InstanceRegistry::new(profiles.clone(), children.clone());

        let instance = registry
            .register(
                ContainerIdentity::new("42"),
                "el".to_string(),
                &admin_show_config(),
            )
            .await;

        let snapshot = registry.snapshot(instance).unwrap();
        assert_eq!(snapshot.decision, Decision::Resolved(false));
        assert!(!snapshot.initialized);
        assert!(children.elements().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_failure_fails_closed() {
        let profiles = StaticProfiles::failing();
        let children = CountingInit::new();
        let registry = InstanceRegistry::new(profiles.clone(), children.clone());

        let instance = registry
            .register(
                ContainerIdentity::new("42"),
                "el".to_string(),
                &admin_show_config(),
            )
            .await;

        assert_eq!(
            registry.snapshot(instance).unwrap().decision,
            Decision::Resolved(false)
        );
        assert!(children.elements().is_empty());
    }

    #[tokio::test]
    async fn test_hidden_decision_is_cached_too() {
        let profiles = StaticProfiles::with(Profile::from_attributes([("role", "user")]));
        let children = CountingInit::new();
        let registry = InstanceRegistry::new(profiles.clone(), children.clone());
        let config = admin_show_config();

        registry
            .register(ContainerIdentity::new("42"), "el-1".to_string(), &config)
            .await;
        registry
            .register(ContainerIdentity::new("42"), "el-2".to_string(), &config)
            .await;

        assert_eq!(profiles.fetches(), 1);
        assert_eq!(registry.decision("42", None), Decision::Resolved(false));
        assert!(children.elements().is_empty());
    }

    #[tokio::test]
    async fn test_decision_pending_before_any_registration() {
        let profiles = StaticProfiles::with(admin_profile());
        let children = CountingInit::new();
        let registry: InstanceRegistry<String> = InstanceRegistry::new(profiles, children);

        assert_eq!(registry.decision("nowhere", None), Decision::Pending);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_find_by_id_spans_row_scopes() {
        let profiles = StaticProfiles::with(admin_profile());
        let children = CountingInit::new();
        let registry = InstanceRegistry::new(profiles, children);
        let config = admin_show_config();

        registry
            .register(ContainerIdentity::new("42"), "a".to_string(), &config)
            .await;
        registry
            .register(
                ContainerIdentity::scoped("42", "row-1"),
                "b".to_string(),
                &config,
            )
            .await;
        registry
            .register(ContainerIdentity::new("7"), "c".to_string(), &config)
            .await;

        let hits = registry.find(&LookupFilter::id("42"));
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|hit| hit.identity.container_id == "42"));
    }
}
