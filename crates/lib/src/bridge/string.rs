//! String bridge.

use std::sync::{Arc, Mutex};

use super::{BridgeError, WriteSource};
use crate::Result;
use crate::realtime::{CollaborativeModel, CollaborativeString, ListenerId, StringEvent};
use crate::signal::Signal;
use crate::utils::{byte_offset, byte_range, char_len};

/// What a [`StringChange`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringChangeKind {
    Insert,
    Remove,
    Set,
}

/// Change event of an [`ObservableString`].
///
/// `start..end` is the affected character range in the text after an insert
/// or set, and in the text before a remove. `value` is the inserted, removed or
/// new text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringChange {
    pub kind: StringChangeKind,
    pub start: usize,
    pub end: usize,
    pub value: String,
    pub origin: WriteSource,
}

/// An observable text buffer mirrored against a collaborative string.
///
/// Cheap to clone; clones share the same bridge. Offsets are character
/// offsets.
#[derive(Clone)]
pub struct ObservableString {
    inner: Arc<StringInner>,
}

struct StringInner {
    state: Mutex<StringState>,
    changed: Signal<StringChange>,
}

struct StringState {
    remote: Option<Arc<dyn CollaborativeString>>,
    listener: Option<ListenerId>,
    text: String,
}

impl ObservableString {
    /// Create a new collaborative string in `model` and bridge it.
    pub fn create(model: &Arc<dyn CollaborativeModel>, initial: &str) -> Self {
        Self::from_remote(model.create_string(initial))
    }

    /// Bridge an existing collaborative string.
    pub fn from_remote(remote: Arc<dyn CollaborativeString>) -> Self {
        let inner = Arc::new(StringInner {
            state: Mutex::new(StringState {
                remote: None,
                listener: None,
                text: String::new(),
            }),
            changed: Signal::new(),
        });
        let listener = inner.attach(&remote);
        {
            let mut state = inner.state.lock().unwrap();
            state.text = remote.text();
            state.remote = Some(remote);
            state.listener = Some(listener);
        }
        Self { inner }
    }

    /// The current text.
    pub fn text(&self) -> String {
        self.inner.state.lock().unwrap().text.clone()
    }

    /// Length in characters.
    pub fn len(&self) -> usize {
        char_len(&self.inner.state.lock().unwrap().text)
    }

    pub fn is_empty(&self) -> bool {
        self.inner.state.lock().unwrap().text.is_empty()
    }

    /// Replace the whole text.
    ///
    /// Setting the text it already has writes nothing and emits nothing.
    pub fn set_text(&self, text: &str) -> Result<()> {
        let remote = self.remote_or_disposed()?;
        if self.inner.state.lock().unwrap().text == text {
            return Ok(());
        }

        remote.set_text(text);
        self.inner.state.lock().unwrap().text = text.to_string();

        self.inner.changed.emit(&StringChange {
            kind: StringChangeKind::Set,
            start: 0,
            end: char_len(text),
            value: text.to_string(),
            origin: WriteSource::Local,
        });
        Ok(())
    }

    /// Insert `text` at character offset `index`.
    pub fn insert(&self, index: usize, text: &str) -> Result<()> {
        let remote = self.remote_or_disposed()?;
        let len = self.len();
        if index > len {
            return Err(BridgeError::IndexOutOfBounds { index, len }.into());
        }
        if text.is_empty() {
            return Ok(());
        }

        remote.insert_string(index, text);
        {
            let mut state = self.inner.state.lock().unwrap();
            let offset = byte_offset(&state.text, index);
            state.text.insert_str(offset, text);
        }

        self.inner.changed.emit(&StringChange {
            kind: StringChangeKind::Insert,
            start: index,
            end: index + char_len(text),
            value: text.to_string(),
            origin: WriteSource::Local,
        });
        Ok(())
    }

    /// Remove the characters in `start..end`.
    pub fn remove(&self, start: usize, end: usize) -> Result<()> {
        let remote = self.remote_or_disposed()?;
        let len = self.len();
        if start > end || end > len {
            return Err(BridgeError::InvalidRange { start, end, len }.into());
        }
        if start == end {
            return Ok(());
        }

        remote.remove_range(start, end);
        let removed = {
            let mut state = self.inner.state.lock().unwrap();
            let range = byte_range(&state.text, start, end);
            state.text.drain(range).collect::<String>()
        };

        self.inner.changed.emit(&StringChange {
            kind: StringChangeKind::Remove,
            start,
            end,
            value: removed,
            origin: WriteSource::Local,
        });
        Ok(())
    }

    /// Remove all text.
    pub fn clear(&self) -> Result<()> {
        self.set_text("")
    }

    /// Change events for local and remote edits.
    pub fn changed(&self) -> &Signal<StringChange> {
        &self.inner.changed
    }

    /// The bridged remote string, `None` once disposed.
    pub fn remote(&self) -> Option<Arc<dyn CollaborativeString>> {
        self.inner.state.lock().unwrap().remote.clone()
    }

    /// Object id of the bridged remote string.
    pub fn remote_id(&self) -> Option<String> {
        self.inner
            .state
            .lock()
            .unwrap()
            .remote
            .as_ref()
            .map(|remote| remote.id().to_string())
    }

    /// Re-point the bridge at another remote string.
    ///
    /// The mirror is resynchronized from the new handle. If its text differs
    /// from the mirror, one `Set` change with [`WriteSource::Remote`] is
    /// emitted so dependents can reconcile.
    pub fn swap_remote(&self, remote: Arc<dyn CollaborativeString>) -> Result<()> {
        let listener = self.inner.attach(&remote);
        let change = {
            let mut state = self.inner.state.lock().unwrap();
            let Some(old) = state.remote.take() else {
                remote.remove_listener(listener);
                return Err(BridgeError::Disposed { kind: "string" }.into());
            };
            if let Some(id) = state.listener.take() {
                old.remove_listener(id);
            }
            tracing::debug!(from = %old.id(), to = %remote.id(), "Re-pointing string bridge");

            let text = remote.text();
            state.remote = Some(remote);
            state.listener = Some(listener);
            if text == state.text {
                None
            } else {
                state.text = text.clone();
                Some(StringChange {
                    kind: StringChangeKind::Set,
                    start: 0,
                    end: char_len(&text),
                    value: text,
                    origin: WriteSource::Remote,
                })
            }
        };

        if let Some(change) = change {
            self.inner.changed.emit(&change);
        }
        Ok(())
    }

    /// Detach from the remote string and drop all subscribers.
    ///
    /// Disposing twice is a no-op.
    pub fn dispose(&self) {
        let detached = {
            let mut state = self.inner.state.lock().unwrap();
            state.remote.take().map(|remote| (remote, state.listener.take()))
        };
        if let Some((remote, listener)) = detached {
            if let Some(id) = listener {
                remote.remove_listener(id);
            }
            self.inner.changed.disconnect_all();
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.state.lock().unwrap().remote.is_none()
    }

    /// Check whether two handles refer to the same bridge.
    pub fn ptr_eq(&self, other: &ObservableString) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// JSON snapshot of the text.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::String(self.text())
    }

    fn remote_or_disposed(&self) -> Result<Arc<dyn CollaborativeString>> {
        self.remote()
            .ok_or_else(|| BridgeError::Disposed { kind: "string" }.into())
    }
}

impl StringInner {
    fn attach(self: &Arc<Self>, remote: &Arc<dyn CollaborativeString>) -> ListenerId {
        let weak = Arc::downgrade(self);
        remote.add_listener(Arc::new(move |event: &StringEvent| {
            if let Some(inner) = weak.upgrade() {
                inner.on_remote_event(event);
            }
        }))
    }

    fn on_remote_event(&self, event: &StringEvent) {
        if event.is_local() {
            tracing::trace!("Dropping local echo on string bridge");
            return;
        }

        let change = {
            let mut state = self.state.lock().unwrap();
            let Some(remote) = state.remote.clone() else {
                return;
            };
            let len = char_len(&state.text);
            match event {
                StringEvent::Inserted { index, text, .. } if *index <= len => {
                    let offset = byte_offset(&state.text, *index);
                    state.text.insert_str(offset, text);
                    StringChange {
                        kind: StringChangeKind::Insert,
                        start: *index,
                        end: index + char_len(text),
                        value: text.clone(),
                        origin: WriteSource::Remote,
                    }
                }
                StringEvent::Deleted { index, text, .. } if index + char_len(text) <= len => {
                    let end = index + char_len(text);
                    let range = byte_range(&state.text, *index, end);
                    let removed = state.text.drain(range).collect::<String>();
                    StringChange {
                        kind: StringChangeKind::Remove,
                        start: *index,
                        end,
                        value: removed,
                        origin: WriteSource::Remote,
                    }
                }
                _ => {
                    tracing::warn!(id = %remote.id(), "String event out of range, resyncing mirror");
                    state.text = remote.text();
                    StringChange {
                        kind: StringChangeKind::Set,
                        start: 0,
                        end: char_len(&state.text),
                        value: state.text.clone(),
                        origin: WriteSource::Remote,
                    }
                }
            }
        };
        self.changed.emit(&change);
    }
}

impl Drop for StringInner {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap();
        if let (Some(remote), Some(id)) = (state.remote.take(), state.listener.take()) {
            remote.remove_listener(id);
        }
    }
}

impl std::fmt::Debug for ObservableString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObservableString")
            .field("remote", &self.remote_id())
            .field("text", &self.text())
            .finish()
    }
}
