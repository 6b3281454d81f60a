//! # Error Registry
//!
//! Owns the name to kind mapping, the active [`Policy`] and the logger, and
//! governs the `Uninitialized -> Initializing -> Ready` lifecycle.
//!
//! Concurrent asynchronous initializers share one in-flight future, so the
//! population procedure runs at most once per registry. The kind table and
//! policy are built off to the side and installed with a single write; after
//! `Ready` they are never touched again. [`ErrorRegistry::reconfigure`]
//! builds a fresh registry and swaps the process-wide handle instead of
//! mutating the old one.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};
use futures::future::{BoxFuture, FutureExt, Shared};
use metrics::counter;
use once_cell::sync::Lazy;
use tracing::{debug, info, warn};

use crate::environment::Environment;
use crate::kind::{builtin_kinds, HttpErrorKind, INTERNAL_KIND_NAME};
use crate::loader::{DirectoryKindLoader, KindLoader};
use crate::logger::{ErrorLogger, LeveledLogger};
use crate::policy::{ErrortyConfig, Policy};
use crate::types::{Error, Result};

// Process-wide registry handle, replaced wholesale by `reconfigure`
static GLOBAL_REGISTRY: Lazy<RwLock<Arc<ErrorRegistry>>> =
    Lazy::new(|| RwLock::new(ErrorRegistry::new(with_detected_environment(ErrortyConfig::default()))));

/// Observable lifecycle of a registry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Uninitialized,
    Initializing,
    Ready,
}

type PendingInit = Shared<BoxFuture<'static, Result<()>>>;

enum Lifecycle {
    Uninitialized,
    Initializing(PendingInit),
    Ready,
}

impl Lifecycle {
    fn state(&self) -> LifecycleState {
        match self {
            Lifecycle::Uninitialized => LifecycleState::Uninitialized,
            Lifecycle::Initializing(_) => LifecycleState::Initializing,
            Lifecycle::Ready => LifecycleState::Ready,
        }
    }
}

struct RegistryState {
    policy: Policy,
    kinds: HashMap<String, HttpErrorKind>,
    logger: Arc<dyn ErrorLogger>,
}

/// The kind map, policy and logger behind one lifecycle
pub struct ErrorRegistry {
    /// Construction-time options; initialization overrides are layered on top
    config: ErrortyConfig,
    state: RwLock<RegistryState>,
    lifecycle: Mutex<Lifecycle>,
    initializations: AtomicUsize,
}

impl std::fmt::Debug for ErrorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorRegistry")
            .field("state", &self.state())
            .field("kinds", &self.kind_count())
            .field("policy", &self.policy())
            .finish()
    }
}

impl ErrorRegistry {
    /// Creates an uninitialized registry. Until initialization installs the
    /// full table, lookups see the sources that need no I/O: built-ins, the
    /// custom map and the explicit list.
    pub fn new(config: ErrortyConfig) -> Arc<Self> {
        let mut policy = Policy::default();
        policy.apply(&config);

        let logger = config
            .logger
            .clone()
            .unwrap_or_else(|| Arc::new(LeveledLogger::default()) as Arc<dyn ErrorLogger>);

        let kinds = populate(&config, Vec::new());

        Arc::new(Self {
            config,
            state: RwLock::new(RegistryState { policy, kinds, logger }),
            lifecycle: Mutex::new(Lifecycle::Uninitialized),
            initializations: AtomicUsize::new(0),
        })
    }

    /// Returns the process-wide registry, creating it with default policy on
    /// first access
    pub fn get_or_create() -> Arc<Self> {
        let global = GLOBAL_REGISTRY
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(&global)
    }

    /// Builds and fully initializes a new registry from `config`, then makes
    /// it the process-wide instance. Holders of the previous instance keep
    /// using it unchanged. On failure the current instance stays in place.
    pub async fn reconfigure(config: ErrortyConfig) -> Result<Arc<Self>> {
        let registry = Self::new(with_detected_environment(config));
        registry.initialize_async(None).await?;
        Self::install_global(Arc::clone(&registry));
        Ok(registry)
    }

    /// Synchronous [`reconfigure`](Self::reconfigure); directory sources are skipped
    pub fn reconfigure_sync(config: ErrortyConfig) -> Arc<Self> {
        let registry = Self::new(with_detected_environment(config));
        registry.initialize_sync(None);
        Self::install_global(Arc::clone(&registry));
        registry
    }

    fn install_global(registry: Arc<Self>) {
        let mut global = GLOBAL_REGISTRY
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *global = registry;
        info!("Error registry reconfigured");
    }

    /// Initializes the registry, loading directory kind sources.
    ///
    /// Returns immediately once `Ready`. While another initialization is in
    /// flight the caller joins it (its own `overrides` are ignored) and
    /// observes the same outcome. A failed attempt leaves the registry
    /// uninitialized so a later call can retry.
    pub async fn initialize_async(self: &Arc<Self>, overrides: Option<ErrortyConfig>) -> Result<()> {
        let pending = {
            let mut lifecycle = self.lock_lifecycle();
            match &*lifecycle {
                Lifecycle::Ready => return Ok(()),
                Lifecycle::Initializing(pending) => pending.clone(),
                Lifecycle::Uninitialized => {
                    // The stored future must not keep its own registry alive
                    let registry = Arc::downgrade(self);
                    let pending = Self::run_async_initialization(registry, overrides)
                        .boxed()
                        .shared();
                    *lifecycle = Lifecycle::Initializing(pending.clone());
                    pending
                }
            }
        };

        pending.await
    }

    async fn run_async_initialization(registry: Weak<Self>, overrides: Option<ErrortyConfig>) -> Result<()> {
        let config = {
            let this = upgrade(&registry)?;
            this.record_initialization();
            this.effective_config(overrides.as_ref())
        };

        let loaded = match config.error_overrides.as_ref().and_then(|o| o.path.clone()) {
            Some(path) => {
                let loader = config
                    .kind_loader
                    .clone()
                    .unwrap_or_else(|| Arc::new(DirectoryKindLoader::new()) as Arc<dyn KindLoader>);
                loader.load(&path).await
            }
            None => Ok(Vec::new()),
        };

        let this = upgrade(&registry)?;
        let mut lifecycle = this.lock_lifecycle();
        match loaded {
            Ok(loaded) => {
                if matches!(*lifecycle, Lifecycle::Ready) {
                    debug!("Registry became ready before asynchronous initialization finished; discarding result");
                    return Ok(());
                }
                this.install(&config, populate(&config, loaded));
                *lifecycle = Lifecycle::Ready;
                Ok(())
            }
            Err(err) => {
                if !matches!(*lifecycle, Lifecycle::Ready) {
                    *lifecycle = Lifecycle::Uninitialized;
                }
                warn!(error = %err, "Error registry initialization failed");
                Err(err)
            }
        }
    }

    /// Initializes the registry without suspending. Only built-in, custom
    /// map and explicit-list kinds are registered; a configured directory is
    /// skipped with a warning. No-op once `Ready`.
    pub fn initialize_sync(&self, overrides: Option<ErrortyConfig>) {
        let mut lifecycle = self.lock_lifecycle();
        if matches!(*lifecycle, Lifecycle::Ready) {
            return;
        }

        self.run_sync_initialization(&mut lifecycle, overrides.as_ref());
    }

    /// Synchronous initialization for callers that cannot wait, such as a
    /// dispatch arriving before startup finished. Runs only from
    /// `Uninitialized`; an in-flight asynchronous initialization is left to
    /// install the full table. Returns the state observed before any
    /// transition.
    pub fn initialize_sync_if_uninitialized(&self) -> LifecycleState {
        let mut lifecycle = self.lock_lifecycle();
        let observed = lifecycle.state();
        if observed == LifecycleState::Uninitialized {
            self.run_sync_initialization(&mut lifecycle, None);
        }
        observed
    }

    fn run_sync_initialization(&self, lifecycle: &mut Lifecycle, overrides: Option<&ErrortyConfig>) {
        let config = self.effective_config(overrides);
        if let Some(path) = config.error_overrides.as_ref().and_then(|o| o.path.as_ref()) {
            warn!(
                path = %path.display(),
                "Directory kind sources require asynchronous initialization; skipping"
            );
        }

        self.record_initialization();
        self.install(&config, populate(&config, Vec::new()));
        *lifecycle = Lifecycle::Ready;
    }

    fn effective_config(&self, overrides: Option<&ErrortyConfig>) -> ErrortyConfig {
        match overrides {
            Some(overrides) => self.config.merged_with(overrides),
            None => self.config.clone(),
        }
    }

    fn record_initialization(&self) {
        self.initializations.fetch_add(1, Ordering::SeqCst);
        counter!("errorty.registry.initializations", 1);
    }

    fn install(&self, config: &ErrortyConfig, kinds: HashMap<String, HttpErrorKind>) {
        let mut policy = Policy::default();
        policy.apply(config);

        let mut state = self.write_state();
        let logger = config.logger.clone().unwrap_or_else(|| Arc::clone(&state.logger));
        let kind_count = kinds.len();
        *state = RegistryState { policy, kinds, logger };
        drop(state);

        info!(kinds = kind_count, "Error registry ready");
    }

    /// Looks up the kind registered under exactly `name`
    pub fn resolve_kind(&self, name: &str) -> Option<HttpErrorKind> {
        self.read_state().kinds.get(name).cloned()
    }

    /// The generic internal-error kind; always registered
    pub fn internal_kind(&self) -> HttpErrorKind {
        self.resolve_kind(INTERNAL_KIND_NAME)
            .unwrap_or_else(HttpErrorKind::internal)
    }

    pub fn policy(&self) -> Policy {
        self.read_state().policy.clone()
    }

    pub fn logger(&self) -> Arc<dyn ErrorLogger> {
        Arc::clone(&self.read_state().logger)
    }

    pub fn state(&self) -> LifecycleState {
        self.lock_lifecycle().state()
    }

    pub fn is_ready(&self) -> bool {
        self.state() == LifecycleState::Ready
    }

    /// Number of times a population procedure actually ran
    pub fn initialization_count(&self) -> usize {
        self.initializations.load(Ordering::SeqCst)
    }

    pub fn kind_count(&self) -> usize {
        self.read_state().kinds.len()
    }

    /// Registered kind names, sorted
    pub fn kind_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.read_state().kinds.keys().cloned().collect();
        names.sort();
        names
    }

    fn lock_lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn read_state(&self) -> RwLockReadGuard<'_, RegistryState> {
        self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, RegistryState> {
        self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Builds the kind table; later sources overwrite earlier entries of the
/// same name: built-ins, custom map, `loaded`, explicit list
fn populate(config: &ErrortyConfig, loaded: Vec<HttpErrorKind>) -> HashMap<String, HttpErrorKind> {
    let mut kinds = HashMap::new();
    let mut register = |kind: HttpErrorKind| {
        kinds.insert(kind.name.clone(), kind);
    };

    builtin_kinds().into_iter().for_each(&mut register);

    for (name, status) in &config.custom_error_map {
        register(HttpErrorKind::custom(name.clone(), *status));
    }

    loaded.into_iter().for_each(&mut register);

    if let Some(overrides) = &config.error_overrides {
        overrides.errors.iter().cloned().for_each(&mut register);
    }

    kinds
}

fn upgrade(registry: &Weak<ErrorRegistry>) -> Result<Arc<ErrorRegistry>> {
    registry
        .upgrade()
        .ok_or_else(|| Error::Initialization("registry dropped during initialization".to_string()))
}

fn with_detected_environment(config: ErrortyConfig) -> ErrortyConfig {
    if config.environment.is_some() {
        config
    } else {
        config.environment(Environment::from_env())
    }
}
