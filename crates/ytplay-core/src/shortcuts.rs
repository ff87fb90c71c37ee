//! Keyboard shortcut boundary
//!
//! The key map itself (play/pause, seek, volume, rate, fullscreen,
//! picture-in-picture, captions, frame-step, help, escape) belongs to the
//! collaborator. The controller only hands over the element and a close
//! action, keeps the returned binding alive for the session, and mirrors the
//! help overlay flag.

use crate::{platform::MediaElement, CloseReason};
use std::sync::Arc;
use tokio::sync::watch;

/// Close action shared with the host and the keyboard layer
#[derive(Clone)]
pub struct CloseHandle {
    tx: Arc<watch::Sender<Option<CloseReason>>>,
}

impl CloseHandle {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    /// Ask the host to close the player. Only the first reason is kept.
    pub fn request_close(&self, reason: CloseReason) {
        self.tx.send_if_modified(|current| {
            if current.is_none() {
                *current = Some(reason);
                true
            } else {
                false
            }
        });
    }

    pub fn requested(&self) -> Option<CloseReason> {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<CloseReason>> {
        self.tx.subscribe()
    }
}

impl Default for CloseHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// What the keyboard layer receives on attach
#[derive(Clone)]
pub struct ShortcutTarget {
    pub element: Arc<dyn MediaElement>,
    pub enabled: bool,
    pub close: CloseHandle,
}

/// A live keyboard attachment. Detaches when dropped.
pub struct ShortcutBinding {
    help_visible: watch::Receiver<bool>,
    detach: Option<Box<dyn FnOnce() + Send>>,
}

impl ShortcutBinding {
    pub fn new(help_visible: watch::Receiver<bool>, detach: impl FnOnce() + Send + 'static) -> Self {
        Self {
            help_visible,
            detach: Some(Box::new(detach)),
        }
    }

    pub fn help_visible(&self) -> watch::Receiver<bool> {
        self.help_visible.clone()
    }

    pub fn is_attached(&self) -> bool {
        self.detach.is_some()
    }

    /// Idempotent
    pub fn detach(&mut self) {
        if let Some(detach) = self.detach.take() {
            detach();
        }
    }
}

impl Drop for ShortcutBinding {
    fn drop(&mut self) {
        self.detach();
    }
}

/// The keyboard collaborator
pub trait ShortcutController: Send + Sync {
    fn attach(&self, target: ShortcutTarget) -> ShortcutBinding;
}

/// Collaborator for hosts without a keyboard
#[derive(Debug, Default)]
pub struct NoShortcuts;

impl ShortcutController for NoShortcuts {
    fn attach(&self, _target: ShortcutTarget) -> ShortcutBinding {
        let (_tx, rx) = watch::channel(false);
        ShortcutBinding::new(rx, || {})
    }
}
