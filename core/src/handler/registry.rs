use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::document::Surface;
use crate::error::RegistryError;

use super::{EditorKind, LanguageHandler, Method};

/// A live handler instance plus the bookkeeping the core keeps for it.
pub struct RegisteredHandler {
    pub id: String,
    pub handler: Arc<dyn LanguageHandler>,
    initialized: AtomicBool,
}

impl RegisteredHandler {
    pub fn new(id: impl Into<String>, handler: Arc<dyn LanguageHandler>) -> Self {
        Self {
            id: id.into(),
            handler,
            initialized: AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> &str {
        self.handler.name()
    }

    /// Flip the one-shot `initialized` flag. Returns `true` only for the first caller.
    pub fn mark_initialized(&self) -> bool {
        !self.initialized.swap(true, Ordering::AcqRel)
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    pub fn matches(&self, method: Method, target: &MatchTarget<'_>) -> bool {
        is_match(self.handler.as_ref(), method, target)
    }

    /// Language and surface check alone, for capability queries that are not method calls.
    pub fn serves(&self, language: &str, surface: Surface) -> bool {
        editor_accepts(self.handler.handles_editor(), surface) && self.handler.handles_language(language)
    }
}

impl std::fmt::Debug for RegisteredHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredHandler")
            .field("id", &self.id)
            .field("name", &self.handler.name())
            .field("initialized", &self.is_initialized())
            .finish()
    }
}

/// What a handler is matched against: the part (or whole document) about to be handed over.
#[derive(Debug, Clone, Copy)]
pub struct MatchTarget<'a> {
    pub language: &'a str,
    pub len_chars: usize,
    pub surface: Surface,
    pub default_max_size: usize,
    pub ignore_size: bool,
}

impl<'a> MatchTarget<'a> {
    pub fn new(language: &'a str, len_chars: usize, surface: Surface, default_max_size: usize) -> Self {
        Self {
            language,
            len_chars,
            surface,
            default_max_size,
            ignore_size: false,
        }
    }

    pub fn ignoring_size(mut self) -> Self {
        self.ignore_size = true;
        self
    }
}

fn editor_accepts(kind: EditorKind, surface: Surface) -> bool {
    match kind {
        EditorKind::EditorOnly => surface == Surface::Editor,
        EditorKind::ConsoleOnly => surface == Surface::Console,
        EditorKind::Both | EditorKind::Any => true,
    }
}

pub fn is_match(handler: &dyn LanguageHandler, method: Method, target: &MatchTarget<'_>) -> bool {
    if !handler.supports(method) {
        return false;
    }
    if !editor_accepts(handler.handles_editor(), target.surface) || !handler.handles_language(target.language) {
        return false;
    }
    if !target.ignore_size {
        let max = handler.max_file_size().unwrap_or(target.default_max_size);
        if target.len_chars > max {
            return false;
        }
    }
    true
}

/// Ordered set of active handlers. Registration order is dispatch order.
#[derive(Debug, Default)]
pub struct HandlerRegistry {
    handlers: Vec<Arc<RegisteredHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, id: &str, handler: Arc<dyn LanguageHandler>) -> Result<Arc<RegisteredHandler>, RegistryError> {
        if self.handlers.iter().any(|h| h.id == id) {
            return Err(RegistryError::AlreadyRegistered(id.to_string()));
        }
        let entry = Arc::new(RegisteredHandler::new(id, handler));
        self.handlers.push(entry.clone());
        Ok(entry)
    }

    pub fn unregister(&mut self, id: &str) -> Option<Arc<RegisteredHandler>> {
        let idx = self.handlers.iter().position(|h| h.id == id)?;
        Some(self.handlers.remove(idx))
    }

    /// Cheap copy of the current list for a fan-out that may outlive later (un)registrations.
    pub fn snapshot(&self) -> Vec<Arc<RegisteredHandler>> {
        self.handlers.clone()
    }

    pub fn ids(&self) -> Vec<String> {
        self.handlers.iter().map(|h| h.id.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
