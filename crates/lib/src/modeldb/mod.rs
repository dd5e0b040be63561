//! The per-document store.
//!
//! A [`ModelDB`] owns one realtime document. It serves factory calls right away
//! from a temporary in-memory document while the network document is resolved
//! and loaded in the background, then moves every bridge it created over to the
//! network document:
//!
//! - If the network root already has content it is authoritative. Registered
//!   bridges are re-pointed at the matching network objects and receive one
//!   resync event each; entries the network root lacks are seeded into it.
//! - If the network root is empty, the in-memory content is copied into new
//!   network objects and the bridges are re-pointed at the copies.
//!
//! Presence is set up against the network document after that, and only then
//! does [`ModelDB::connected`] resolve.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::Result;
use crate::bridge::{
    BridgeError, ObservableList, ObservableMap, ObservableString, ObservableUndoableList,
    ObservableValue, Relinker, Value,
};
use crate::collaborators::CollaboratorMap;
use crate::realtime::memory::MemoryDocument;
use crate::realtime::{
    CollaborativeDocument, CollaborativeMap, CollaborativeModel, DocumentProvider, RemoteValue,
};
use crate::utils::join_path;

mod config;
mod errors;

pub use config::ModelDbConfig;
pub use errors::ModelDbError;

/// Connection lifecycle of a [`ModelDB`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    /// Serving from the in-memory document while the network one loads
    Initializing,
    /// Bridges are backed by the network document
    Connected,
    /// The network document failed to load; the store stays in memory
    Failed(String),
    /// The store was disposed
    Disposed,
}

impl ConnectionState {
    pub fn is_initializing(&self) -> bool {
        matches!(self, ConnectionState::Initializing)
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, ConnectionState::Failed(_))
    }

    pub fn is_disposed(&self) -> bool {
        matches!(self, ConnectionState::Disposed)
    }
}

/// The kinds of [`Observable`] a [`ModelDB`] creates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObservableKind {
    String,
    List,
    Map,
    Value,
}

impl ObservableKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ObservableKind::String => "string",
            ObservableKind::List => "list",
            ObservableKind::Map => "map",
            ObservableKind::Value => "value",
        }
    }

    /// The kind [`Observable::wrap`] produces for `remote`.
    fn of_remote(remote: &RemoteValue) -> Self {
        match remote {
            RemoteValue::Primitive(_) => ObservableKind::Value,
            RemoteValue::String(_) => ObservableKind::String,
            RemoteValue::List(_) => ObservableKind::List,
            RemoteValue::Map(_) => ObservableKind::Map,
        }
    }
}

impl std::fmt::Display for ObservableKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Anything a [`ModelDB`] can hold at a path.
#[derive(Debug, Clone)]
pub enum Observable {
    String(ObservableString),
    List(ObservableUndoableList),
    Map(ObservableMap),
    Value(ObservableValue),
}

impl Observable {
    pub fn observable_kind(&self) -> ObservableKind {
        match self {
            Observable::String(_) => ObservableKind::String,
            Observable::List(_) => ObservableKind::List,
            Observable::Map(_) => ObservableKind::Map,
            Observable::Value(_) => ObservableKind::Value,
        }
    }

    /// Returns the variant name as a string
    pub fn kind(&self) -> &'static str {
        self.observable_kind().as_str()
    }

    pub fn as_string(&self) -> Option<&ObservableString> {
        match self {
            Observable::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&ObservableUndoableList> {
        match self {
            Observable::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&ObservableMap> {
        match self {
            Observable::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_value(&self) -> Option<&ObservableValue> {
        match self {
            Observable::Value(v) => Some(v),
            _ => None,
        }
    }

    /// Deep JSON snapshot of the content.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Observable::String(s) => s.to_json(),
            Observable::List(l) => l.to_json(),
            Observable::Map(m) => m.to_json(),
            Observable::Value(v) => v.get(),
        }
    }

    pub fn dispose(&self) {
        match self {
            Observable::String(s) => s.dispose(),
            Observable::List(l) => l.dispose(),
            Observable::Map(m) => m.dispose(),
            Observable::Value(v) => v.dispose(),
        }
    }

    pub fn is_disposed(&self) -> bool {
        match self {
            Observable::String(s) => s.is_disposed(),
            Observable::List(l) => l.is_disposed(),
            Observable::Map(m) => m.is_disposed(),
            Observable::Value(v) => v.is_disposed(),
        }
    }

    /// The container as a storable value, `None` for values.
    fn container(&self) -> Option<Value> {
        match self {
            Observable::String(s) => Some(Value::String(s.clone())),
            Observable::List(l) => Some(Value::List(l.list().clone())),
            Observable::Map(m) => Some(Value::Map(m.clone())),
            Observable::Value(_) => None,
        }
    }

    /// Wrap the remote entry stored at `path` of `root`.
    fn wrap(
        model: &Arc<dyn CollaborativeModel>,
        root: &Arc<dyn CollaborativeMap>,
        path: &str,
        remote: RemoteValue,
    ) -> Self {
        match remote {
            RemoteValue::Primitive(_) => Observable::Value(ObservableValue::new(root.clone(), path)),
            RemoteValue::String(handle) => Observable::String(ObservableString::from_remote(handle)),
            RemoteValue::List(handle) => Observable::List(ObservableUndoableList::new(
                ObservableList::from_remote(handle, model),
            )),
            RemoteValue::Map(handle) => {
                Observable::Map(ObservableMap::from_remote(handle, model))
            }
        }
    }
}

/// Store of observables backed by one realtime document.
///
/// Cheap to clone. [`ModelDB::view`] returns a handle onto the same store that
/// prefixes every path with a base path.
#[derive(Clone)]
pub struct ModelDB {
    inner: Arc<ModelDbInner>,
    base_path: String,
    is_view: bool,
}

struct ModelDbInner {
    config: ModelDbConfig,
    /// Serves factory calls until the network document is loaded
    memory: Arc<MemoryDocument>,
    state: Mutex<DbState>,
    connection: watch::Sender<ConnectionState>,
    task: Mutex<Option<JoinHandle<()>>>,
}

struct DbState {
    model: Arc<dyn CollaborativeModel>,
    document: Option<Arc<dyn CollaborativeDocument>>,
    collaborators: Option<CollaboratorMap>,
    entries: BTreeMap<String, Observable>,
    prepopulated: bool,
    disposed: bool,
}

impl ModelDB {
    /// Open the document described by `config`.
    ///
    /// Returns immediately; the network document is loaded on a spawned task,
    /// so this must be called from within a tokio runtime. Await
    /// [`connected`](Self::connected) to wait for it.
    pub fn open(config: ModelDbConfig, provider: Arc<dyn DocumentProvider>) -> Self {
        let memory = Arc::new(MemoryDocument::new());
        let (connection, _) = watch::channel(ConnectionState::Initializing);
        let path = config.path.clone();
        let base_path = config.base_path.clone();

        let inner = Arc::new(ModelDbInner {
            config,
            memory: memory.clone(),
            state: Mutex::new(DbState {
                model: memory.model(),
                document: None,
                collaborators: None,
                entries: BTreeMap::new(),
                prepopulated: false,
                disposed: false,
            }),
            connection,
            task: Mutex::new(None),
        });

        tracing::debug!(path = %path, "Opening document");
        let task = tokio::spawn(connect(Arc::downgrade(&inner), provider, path));
        *inner.task.lock().unwrap() = Some(task);

        Self {
            inner,
            base_path,
            is_view: false,
        }
    }

    /// Wait until the network document is connected.
    ///
    /// Fails with [`ModelDbError::LoadFailed`] if it could not be loaded and
    /// with [`ModelDbError::Disposed`] if the store was disposed first.
    pub async fn connected(&self) -> Result<()> {
        let mut rx = self.inner.connection.subscribe();
        let state = rx
            .wait_for(|state| !state.is_initializing())
            .await
            .map_err(|_| ModelDbError::Disposed)?
            .clone();
        match state {
            ConnectionState::Connected | ConnectionState::Initializing => Ok(()),
            ConnectionState::Failed(reason) => Err(ModelDbError::LoadFailed {
                path: self.inner.config.path.clone(),
                reason,
            }
            .into()),
            ConnectionState::Disposed => Err(ModelDbError::Disposed.into()),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.connection.borrow().clone()
    }

    /// Whether the network document already had content when it was loaded.
    pub fn is_prepopulated(&self) -> bool {
        self.inner.state.lock().unwrap().prepopulated
    }

    /// File path of the document.
    pub fn path(&self) -> &str {
        &self.inner.config.path
    }

    /// Prefix applied to the paths passed to this handle.
    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    pub fn is_view(&self) -> bool {
        self.is_view
    }

    /// The model currently backing the store's bridges.
    pub fn model(&self) -> Arc<dyn CollaborativeModel> {
        self.inner.state.lock().unwrap().model.clone()
    }

    /// The network document, once loaded.
    pub fn document(&self) -> Option<Arc<dyn CollaborativeDocument>> {
        self.inner.state.lock().unwrap().document.clone()
    }

    /// Collaborator presence, available once connected.
    pub fn collaborators(&self) -> Option<CollaboratorMap> {
        self.inner.state.lock().unwrap().collaborators.clone()
    }

    /// Get or create the string at `path`.
    pub fn create_string(&self, path: &str) -> Result<ObservableString> {
        match self.entry(path, ObservableKind::String)? {
            Observable::String(string) => Ok(string),
            other => Err(self.mismatch(path, ObservableKind::String, &other)),
        }
    }

    /// Get or create the list at `path`.
    pub fn create_list(&self, path: &str) -> Result<ObservableUndoableList> {
        match self.entry(path, ObservableKind::List)? {
            Observable::List(list) => Ok(list),
            other => Err(self.mismatch(path, ObservableKind::List, &other)),
        }
    }

    /// Get or create the map at `path`.
    pub fn create_map(&self, path: &str) -> Result<ObservableMap> {
        match self.entry(path, ObservableKind::Map)? {
            Observable::Map(map) => Ok(map),
            other => Err(self.mismatch(path, ObservableKind::Map, &other)),
        }
    }

    /// Get or create the JSON value at `path`. A new value starts out `null`.
    pub fn create_value(&self, path: &str) -> Result<ObservableValue> {
        match self.entry(path, ObservableKind::Value)? {
            Observable::Value(value) => Ok(value),
            other => Err(self.mismatch(path, ObservableKind::Value, &other)),
        }
    }

    /// Read the JSON value at `path`.
    pub fn get_value(&self, path: &str) -> Result<serde_json::Value> {
        match self.get(path) {
            Some(Observable::Value(value)) => Ok(value.get()),
            _ => Err(ModelDbError::NotAValue {
                path: self.full_path(path),
            }
            .into()),
        }
    }

    /// Write the JSON value at `path`, which must hold a value.
    pub fn set_value(&self, path: &str, value: serde_json::Value) -> Result<()> {
        match self.get(path) {
            Some(Observable::Value(observable)) => observable.set(value),
            _ => Err(ModelDbError::NotAValue {
                path: self.full_path(path),
            }
            .into()),
        }
    }

    /// Check whether anything is stored at `path`.
    pub fn has(&self, path: &str) -> bool {
        let full = self.full_path(path);
        let state = self.inner.state.lock().unwrap();
        !state.disposed && (state.entries.contains_key(&full) || state.model.root().has(&full))
    }

    /// The observable at `path`.
    ///
    /// Entries present in the document but not yet opened through this store
    /// are wrapped and registered on first access.
    pub fn get(&self, path: &str) -> Option<Observable> {
        let full = self.full_path(path);
        let mut state = self.inner.state.lock().unwrap();
        if state.disposed {
            return None;
        }
        if let Some(existing) = state.entries.get(&full) {
            return Some(existing.clone());
        }
        let model = state.model.clone();
        let root = model.root();
        let observable = Observable::wrap(&model, &root, &full, root.get(&full)?);
        state.entries.insert(full, observable.clone());
        Some(observable)
    }

    /// Store an existing container at `path`.
    ///
    /// The container is linked into the store's model: its content is copied
    /// into new remote objects and the bridge is re-pointed at them.
    pub fn set(&self, path: &str, observable: Observable) -> Result<()> {
        let full = self.full_path(path);
        let Some(container) = observable.container() else {
            return Err(BridgeError::NotLinkable {
                key: full,
                kind: observable.kind(),
            }
            .into());
        };
        container.check_bridged()?;
        let mut state = self.live_state()?;
        let model = state.model.clone();
        let remote = Relinker::with_reachable(&model).relink(&container)?;
        model.root().set(&full, remote);
        tracing::debug!(path = %full, kind = observable.kind(), "Linked observable into store");
        state.entries.insert(full, observable);
        Ok(())
    }

    /// A handle onto the same store whose paths are prefixed with `base_path`.
    pub fn view(&self, base_path: &str) -> ModelDB {
        ModelDB {
            inner: self.inner.clone(),
            base_path: join_path(&self.base_path, base_path),
            is_view: true,
        }
    }

    /// Close the document and dispose every observable created through the
    /// store. On a view this is a no-op.
    pub fn dispose(&self) {
        if self.is_view {
            tracing::debug!(base_path = %self.base_path, "Ignoring dispose on view");
            return;
        }
        self.inner.dispose();
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.state.lock().unwrap().disposed
    }

    fn full_path(&self, path: &str) -> String {
        join_path(&self.base_path, path)
    }

    fn live_state(&self) -> Result<MutexGuard<'_, DbState>> {
        let state = self.inner.state.lock().unwrap();
        if state.disposed {
            return Err(ModelDbError::Disposed.into());
        }
        Ok(state)
    }

    fn mismatch(&self, path: &str, expected: ObservableKind, found: &Observable) -> crate::Error {
        ModelDbError::KindMismatch {
            path: self.full_path(path),
            expected,
            actual: found.observable_kind(),
        }
        .into()
    }

    /// The registered or stored entry at `path`, created if missing.
    fn entry(&self, path: &str, kind: ObservableKind) -> Result<Observable> {
        let full = self.full_path(path);
        let mut state = self.live_state()?;
        if let Some(existing) = state.entries.get(&full) {
            return Ok(existing.clone());
        }

        let model = state.model.clone();
        let root = model.root();
        let observable = match root.get(&full) {
            Some(remote) => {
                let actual = ObservableKind::of_remote(&remote);
                if actual != kind {
                    return Err(ModelDbError::KindMismatch {
                        path: full,
                        expected: kind,
                        actual,
                    }
                    .into());
                }
                Observable::wrap(&model, &root, &full, remote)
            }
            None => create(&model, &root, &full, kind),
        };
        tracing::debug!(path = %full, kind = %kind, "Registered observable");
        state.entries.insert(full, observable.clone());
        Ok(observable)
    }
}

impl std::fmt::Debug for ModelDB {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelDB")
            .field("path", &self.inner.config.path)
            .field("base_path", &self.base_path)
            .field("is_view", &self.is_view)
            .field("state", &self.state())
            .finish()
    }
}

/// Create a new entry of `kind` at `path` of `root`.
fn create(
    model: &Arc<dyn CollaborativeModel>,
    root: &Arc<dyn CollaborativeMap>,
    path: &str,
    kind: ObservableKind,
) -> Observable {
    match kind {
        ObservableKind::String => {
            let handle = model.create_string("");
            root.set(path, RemoteValue::String(handle.clone()));
            Observable::String(ObservableString::from_remote(handle))
        }
        ObservableKind::List => {
            let handle = model.create_list();
            root.set(path, RemoteValue::List(handle.clone()));
            Observable::List(ObservableUndoableList::new(ObservableList::from_remote(
                handle, model,
            )))
        }
        ObservableKind::Map => {
            let handle = model.create_map();
            root.set(path, RemoteValue::Map(handle.clone()));
            Observable::Map(ObservableMap::from_remote(handle, model))
        }
        ObservableKind::Value => Observable::Value(ObservableValue::new(root.clone(), path)),
    }
}

async fn connect(inner: Weak<ModelDbInner>, provider: Arc<dyn DocumentProvider>, path: String) {
    let loaded = load_document(provider.as_ref(), &path).await;
    let Some(inner) = inner.upgrade() else {
        return;
    };
    match loaded.and_then(|document| inner.transition(document)) {
        Ok(()) => {}
        Err(err) => {
            tracing::error!(path = %path, error = %err, "Failed to connect document");
            inner
                .connection
                .send_replace(ConnectionState::Failed(err.to_string()));
        }
    }
}

async fn load_document(
    provider: &dyn DocumentProvider,
    path: &str,
) -> Result<Arc<dyn CollaborativeDocument>> {
    let resource = provider.resolve(path).await?;
    provider.load(&resource).await
}

impl ModelDbInner {
    /// Move every registered observable over to `document`.
    ///
    /// Every entry is checked before any bridge is re-pointed, so a failed
    /// transition leaves the store whole on the in-memory document.
    fn transition(&self, document: Arc<dyn CollaborativeDocument>) -> Result<()> {
        let network = document.model();
        let root = network.root();
        let prepopulated = root
            .keys()
            .iter()
            .any(|key| *key != self.config.presence_key);

        let entries: Vec<(String, Observable)> = {
            let state = self.state.lock().unwrap();
            if state.disposed {
                document.close();
                return Ok(());
            }
            state
                .entries
                .iter()
                .filter(|(_, observable)| !observable.is_disposed())
                .map(|(path, observable)| (path.clone(), observable.clone()))
                .collect()
        };
        let checked = entries.iter().try_for_each(|(_, observable)| {
            observable.container().map_or(Ok(()), |container| container.check_bridged())
        });
        if let Err(err) = checked {
            document.close();
            return Err(err);
        }

        {
            let mut state = self.state.lock().unwrap();
            state.model = network.clone();
            state.document = Some(document.clone());
            state.prepopulated = prepopulated;
        }
        tracing::debug!(
            path = %self.config.path,
            prepopulated,
            entries = entries.len(),
            "Moving observables to network document"
        );

        let mut relinker = Relinker::with_reachable(&network);
        let moved = entries.iter().try_for_each(|(path, observable)| {
            if prepopulated {
                adopt(&mut relinker, &root, path, observable)
            } else {
                seed(&mut relinker, &root, path, observable)
            }
        });
        if let Err(err) = moved {
            let mut state = self.state.lock().unwrap();
            state.model = self.memory.model();
            state.document = None;
            state.prepopulated = false;
            document.close();
            return Err(err);
        }
        if prepopulated {
            for (_, observable) in &entries {
                if let Observable::List(list) = observable {
                    list.clear_undo();
                }
            }
        }

        let collaborators = CollaboratorMap::new(document, &self.config.presence_key)?;
        {
            let mut state = self.state.lock().unwrap();
            if state.disposed {
                collaborators.dispose();
                return Ok(());
            }
            state.collaborators = Some(collaborators);
        }
        self.memory.close();
        self.connection.send_replace(ConnectionState::Connected);
        tracing::debug!(path = %self.config.path, "Document connected");
        Ok(())
    }

    fn dispose(&self) {
        let (document, collaborators, entries) = {
            let mut state = self.state.lock().unwrap();
            if state.disposed {
                return;
            }
            state.disposed = true;
            (
                state.document.take(),
                state.collaborators.take(),
                std::mem::take(&mut state.entries),
            )
        };
        tracing::debug!(path = %self.config.path, entries = entries.len(), "Disposing ModelDB");

        if let Some(task) = self.task.lock().unwrap().take() {
            task.abort();
        }
        if let Some(document) = document {
            document.close();
        }
        self.memory.close();
        if let Some(collaborators) = collaborators {
            collaborators.dispose();
        }
        for observable in entries.values() {
            observable.dispose();
        }
        self.connection.send_replace(ConnectionState::Disposed);
    }
}

impl Drop for ModelDbInner {
    fn drop(&mut self) {
        if let Some(task) = self.task.get_mut().unwrap().take() {
            task.abort();
        }
        if let Some(document) = self.state.get_mut().unwrap().document.take() {
            document.close();
        }
    }
}

/// Re-point `observable` at the network entry at `path`, or seed it if the
/// network root has none.
fn adopt(
    relinker: &mut Relinker<'_>,
    root: &Arc<dyn CollaborativeMap>,
    path: &str,
    observable: &Observable,
) -> Result<()> {
    let Some(remote) = root.get(path) else {
        tracing::debug!(path, "Seeding entry missing from network document");
        return seed(relinker, root, path, observable);
    };
    let network = relinker.model();
    match (observable, remote) {
        (Observable::String(string), RemoteValue::String(handle)) => string.swap_remote(handle),
        (Observable::List(list), RemoteValue::List(handle)) => list.swap_remote(handle, network),
        (Observable::Map(map), RemoteValue::Map(handle)) => map.swap_remote(handle, network),
        (Observable::Value(value), RemoteValue::Primitive(_)) => value.swap_root(root.clone()),
        (observable, remote) => {
            tracing::warn!(
                path,
                expected = observable.kind(),
                actual = remote.kind(),
                "Network entry has a different kind, keeping in-memory copy"
            );
            Ok(())
        }
    }
}

/// Copy `observable` into the network model and store it at `path`.
///
/// Bridges shared between entries are copied once.
fn seed(
    relinker: &mut Relinker<'_>,
    root: &Arc<dyn CollaborativeMap>,
    path: &str,
    observable: &Observable,
) -> Result<()> {
    match observable {
        Observable::Value(value) => {
            root.set(path, RemoteValue::Primitive(value.get()));
            value.swap_root(root.clone())
        }
        Observable::String(_) | Observable::List(_) | Observable::Map(_) => {
            let Some(container) = observable.container() else {
                return Ok(());
            };
            let remote = relinker.relink(&container)?;
            root.set(path, remote);
            Ok(())
        }
    }
}
