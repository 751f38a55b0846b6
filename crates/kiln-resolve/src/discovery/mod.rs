//! Concurrent mod discovery.
//!
//! Every source item becomes a task. A task opens its container on the
//! blocking pool, validates and inserts the candidate, then extracts the
//! nested archives it declares and forks one child task per archive. A task
//! completes only after all of its children did, so the whole phase is a
//! task tree with a join barrier per archive level.
//!
//! Per-item problems never cancel siblings: unreadable archives are
//! collected as [`DiscoveryFailure`]s, invalid descriptors as
//! [`ConfigError`]s which fail the phase once everything has been visited.

pub(crate) mod archive;
mod source;

pub use source::{BuiltinSource, CandidateSource, DirectorySource, ExplicitSource, SourceItem, SourceKind};

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use log::{debug, info, trace, warn};
use tokio::sync::{OnceCell, Semaphore};
use tokio::task::JoinSet;

use crate::candidate::{ArchiveStore, CandidateId, CandidateStore, ModLocation, NewCandidate};
use crate::config::ResolverConfig;
use crate::error::{ConfigError, DiscoveryError, DiscoveryFailure};
use crate::identifier::is_valid_identifier;
use crate::metadata::ModMetadata;
use archive::{Container, Extracted, LoadError, Loaded};

/// A container that did not yield a candidate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnmatchedOrigin {
    pub location: String,
    /// Directory without a descriptor, still usable as a classpath entry
    pub classpath_only: bool,
}

/// Everything discovery found
#[derive(Debug, Default)]
pub struct DiscoveryOutcome {
    pub store: CandidateStore,
    /// Localized, non-fatal problems
    pub failures: Vec<DiscoveryFailure>,
    pub unmatched: Vec<UnmatchedOrigin>,
}

type ExtractionResult = Vec<Result<Extracted, (String, String)>>;

#[derive(Default)]
struct State {
    store: CandidateStore,
    failures: Vec<DiscoveryFailure>,
    config_errors: Vec<ConfigError>,
    unmatched: Vec<UnmatchedOrigin>,
    seen_roots: HashSet<String>,
}

struct Shared {
    descriptor_name: String,
    archives: Arc<ArchiveStore>,
    permits: Semaphore,
    state: Mutex<State>,
    extractions: Mutex<HashMap<String, Arc<OnceCell<ExtractionResult>>>>,
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn fail(&self, location: impl Into<String>, reason: impl Into<String>) {
        let failure = DiscoveryFailure::new(location, reason);
        warn!("Skipping {}", failure);
        self.state().failures.push(failure);
    }

    fn config_error(&self, error: ConfigError) {
        debug!("{}", error);
        self.state().config_errors.push(error);
    }

    fn unmatched(&self, location: String, classpath_only: bool) {
        debug!("No mod descriptor in {}", location);
        self.state().unmatched.push(UnmatchedOrigin {
            location,
            classpath_only,
        });
    }

    /// Extraction results for a container, computed once per location
    fn extraction_cell(&self, key: &str) -> Arc<OnceCell<ExtractionResult>> {
        let mut map = self.extractions.lock().unwrap_or_else(PoisonError::into_inner);
        map.entry(key.to_string()).or_default().clone()
    }
}

enum Item {
    Path(PathBuf),
    Stored(Extracted),
    Builtin(ModMetadata),
}

impl Item {
    fn canonical_key(&self) -> String {
        match self {
            Item::Path(path) => ModLocation::File(path.clone()).canonical_key(),
            Item::Stored(extracted) => format!("mem:{}", extracted.name),
            Item::Builtin(metadata) => ModLocation::Builtin(metadata.id.clone()).canonical_key(),
        }
    }
}

struct Task {
    item: Item,
    parent: Option<CandidateId>,
    /// Canonical keys of every enclosing container
    ancestors: Arc<Vec<String>>,
    remap_required: bool,
}

/// Walks candidate sources and builds the candidate store
pub struct Discoverer {
    config: ResolverConfig,
    archives: Arc<ArchiveStore>,
}

impl Discoverer {
    /// Create a new discoverer writing nested archives into `archives`
    pub fn new(config: ResolverConfig, archives: Arc<ArchiveStore>) -> Self {
        Self { config, archives }
    }

    /// Discover every candidate reachable from the sources.
    ///
    /// Fails with [`DiscoveryError::Configuration`] if any descriptor was
    /// invalid and with [`DiscoveryError::Timeout`] if the phase took longer
    /// than the configured limit.
    pub async fn discover(
        &self,
        sources: &[Box<dyn CandidateSource>],
    ) -> Result<DiscoveryOutcome, DiscoveryError> {
        let start = Instant::now();
        let mut failures = Vec::new();
        let mut items = Vec::new();

        for source in sources {
            match source.collect(&self.config) {
                Ok(found) => {
                    debug!("Source {} yielded {} items", source.name(), found.len());
                    items.extend(found);
                }
                Err(e) => {
                    warn!("Cannot read source {}: {}", source.name(), e);
                    failures.push(DiscoveryFailure::new(source.name(), e.to_string()));
                }
            }
        }

        info!(
            "Discovering mods from {} items with {} workers",
            items.len(),
            self.config.worker_count()
        );

        let shared = Arc::new(Shared {
            descriptor_name: self.config.descriptor_name.clone(),
            archives: self.archives.clone(),
            permits: Semaphore::new(self.config.worker_count()),
            state: Mutex::new(State::default()),
            extractions: Mutex::new(HashMap::new()),
        });

        let run = {
            let shared = shared.clone();
            async move {
                let mut tasks = JoinSet::new();
                for item in items {
                    let task = Task {
                        item: match item.kind {
                            SourceKind::Path(path) => Item::Path(path),
                            SourceKind::Builtin(metadata) => Item::Builtin(metadata),
                        },
                        parent: None,
                        ancestors: Arc::new(Vec::new()),
                        remap_required: item.remap_required,
                    };
                    tasks.spawn(discover_item(shared.clone(), task));
                }
                join_all(&shared, &mut tasks, "discovery").await;
            }
        };

        let timeout = self.config.discovery_timeout();
        if tokio::time::timeout(timeout, run).await.is_err() {
            warn!("Mod discovery timed out after {:?}", timeout);
            return Err(DiscoveryError::Timeout(timeout));
        }

        let mut state = std::mem::take(&mut *shared.state());
        if !state.config_errors.is_empty() {
            state.config_errors.sort_by_key(|e| e.to_string());
            state.config_errors.dedup();
            return Err(DiscoveryError::Configuration(state.config_errors));
        }

        state.store.recompute_depths();
        failures.append(&mut state.failures);
        failures.sort_by(|a, b| a.location.cmp(&b.location));
        state.unmatched.sort_by(|a, b| a.location.cmp(&b.location));

        info!(
            "Discovered {} mods in {:?} ({} failures)",
            state.store.len(),
            start.elapsed(),
            failures.len()
        );

        Ok(DiscoveryOutcome {
            store: state.store,
            failures,
            unmatched: state.unmatched,
        })
    }
}

async fn join_all(shared: &Shared, tasks: &mut JoinSet<()>, location: &str) {
    while let Some(result) = tasks.join_next().await {
        if let Err(e) = result {
            shared.fail(location, format!("discovery task failed: {}", e));
        }
    }
}

fn discover_item(shared: Arc<Shared>, task: Task) -> BoxFuture<'static, ()> {
    async move {
        let Task {
            item,
            parent,
            ancestors,
            remap_required,
        } = task;

        let item = match item {
            Item::Path(path) => Item::Path(std::fs::canonicalize(&path).unwrap_or(path)),
            other => other,
        };
        let key = item.canonical_key();

        if ancestors.contains(&key) {
            shared.fail(key, "archive contains itself");
            return;
        }
        if parent.is_none() && !shared.state().seen_roots.insert(key.clone()) {
            trace!("Already visited {}", key);
            return;
        }

        let Some((metadata, location, container)) = load(&shared, item).await else {
            return;
        };

        if !validate(&shared, &metadata, &location) {
            return;
        }

        let nested = metadata.nested.clone();
        let outcome = {
            let mut state = shared.state();
            state.store.insert(NewCandidate {
                metadata,
                location: location.clone(),
                parent,
                remap_required,
            })
        };
        let id = match outcome {
            Ok(outcome) if outcome.is_inserted() => outcome.id(),
            Ok(_) => return,
            Err(e) => {
                shared.config_error(e);
                return;
            }
        };

        let Some(container) = container else {
            return;
        };
        if nested.is_empty() {
            return;
        }

        let cell = shared.extraction_cell(&key);
        let extracted = cell
            .get_or_init(|| extract(shared.clone(), container, nested))
            .await
            .clone();

        let mut chain = (*ancestors).clone();
        chain.push(key);
        let chain = Arc::new(chain);

        let mut children = JoinSet::new();
        for result in extracted {
            match result {
                Ok(extracted) => {
                    children.spawn(discover_item(
                        shared.clone(),
                        Task {
                            item: Item::Stored(extracted),
                            parent: Some(id),
                            ancestors: chain.clone(),
                            remap_required,
                        },
                    ));
                }
                Err((entry, reason)) => shared.fail(format!("{}!/{}", location, entry), reason),
            }
        }
        join_all(&shared, &mut children, &location.to_string()).await;
    }
    .boxed()
}

/// Open an item on the blocking pool
async fn load(
    shared: &Arc<Shared>,
    item: Item,
) -> Option<(ModMetadata, ModLocation, Option<Container>)> {
    let descriptor = shared.descriptor_name.clone();

    match item {
        Item::Builtin(metadata) => {
            let location = ModLocation::Builtin(metadata.id.clone());
            Some((metadata, location, None))
        }
        Item::Path(path) => {
            let target = path.clone();
            let result = blocking(shared, move || archive::load_path(&target, &descriptor)).await?;
            match result {
                Ok(Loaded::Mod { metadata, container }) => {
                    let location = match container {
                        Container::Directory(_) => ModLocation::Directory(path),
                        Container::Archive(_) => ModLocation::File(path),
                    };
                    Some((metadata, location, Some(container)))
                }
                other => {
                    record_unloaded(shared, path.display().to_string(), other);
                    None
                }
            }
        }
        Item::Stored(extracted) => {
            let bytes = extracted.bytes.clone();
            let result = blocking(shared, move || archive::load_archive(bytes, &descriptor)).await?;
            let location = ModLocation::Stored {
                name: extracted.name,
                entry: extracted.entry,
                hash: extracted.hash,
            };
            match result {
                Ok(Loaded::Mod { metadata, container }) => Some((metadata, location, Some(container))),
                other => {
                    record_unloaded(shared, location.to_string(), other);
                    None
                }
            }
        }
    }
}

/// Record why an item did not produce a candidate
fn record_unloaded(shared: &Shared, location: String, result: Result<Loaded, LoadError>) {
    match result {
        Ok(Loaded::Mod { .. }) => {}
        Ok(Loaded::NoDescriptor) => shared.unmatched(location, false),
        Ok(Loaded::ClasspathOnly) => shared.unmatched(location, true),
        Err(LoadError::Corrupt(reason)) => shared.fail(location, reason),
        Err(LoadError::Malformed(e)) => shared.config_error(ConfigError::MalformedDescriptor {
            location,
            reason: e.to_string(),
        }),
    }
}

/// Run blocking work while holding a worker permit.
///
/// Returns `None` (after recording a failure) if the work panicked.
async fn blocking<F, T>(shared: &Arc<Shared>, work: F) -> Option<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let _permit = shared.permits.acquire().await.ok()?;
    match tokio::task::spawn_blocking(work).await {
        Ok(value) => Some(value),
        Err(e) => {
            shared.fail("discovery", format!("worker failed: {}", e));
            None
        }
    }
}

async fn extract(shared: Arc<Shared>, container: Container, entries: Vec<String>) -> ExtractionResult {
    let archives = shared.archives.clone();
    let names = entries.clone();
    let result = blocking(&shared, move || {
        archive::extract_nested(&container, &entries, &archives)
    })
    .await;

    result.unwrap_or_else(|| {
        names
            .into_iter()
            .map(|entry| Err((entry, "extraction failed".to_string())))
            .collect()
    })
}

/// Check the identifier and aliases, recording every problem
fn validate(shared: &Shared, metadata: &ModMetadata, location: &ModLocation) -> bool {
    let mut valid = true;

    if !is_valid_identifier(&metadata.id) {
        shared.config_error(ConfigError::InvalidIdentifier {
            id: metadata.id.clone(),
            location: location.to_string(),
        });
        valid = false;
    }
    for alias in &metadata.provides {
        if !is_valid_identifier(alias) {
            shared.config_error(ConfigError::InvalidAlias {
                id: metadata.id.clone(),
                alias: alias.clone(),
                location: location.to_string(),
            });
            valid = false;
        }
    }

    valid
}
