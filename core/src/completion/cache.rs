use std::hash::Hasher;
use std::sync::Arc;

use regex::Regex;
use tokio::sync::oneshot;
use twox_hash::XxHash64;

use super::CompletionMatch;
use crate::document::{Document, Pos};
use crate::text::{following_identifier, preceding_identifier};

pub type Matches = Arc<Vec<CompletionMatch>>;

/// Structural fingerprint of "the document around the cursor, minus what is being typed".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKey {
    /// Hash of the document with the cursor row emptied.
    pub value_hash: u64,
    /// Cursor row with the identifier under the cursor cut out.
    pub blanked_line: String,
    /// Cursor position with the prefix length subtracted.
    pub pos: Pos,
    pub path: Arc<str>,
    pub prefix: String,
}

impl CacheKey {
    pub fn compute(document: &Document, pos: Pos, regex: Option<&Regex>) -> Option<Self> {
        let line = document.line(pos.row)?;
        let column = (pos.column as usize).min(line.chars().count());
        let prefix = preceding_identifier(&line, column, regex);
        let suffix = following_identifier(&line, column, regex);
        let start = column - prefix.chars().count();
        let end = column + suffix.chars().count();
        let blanked_line: String = line
            .chars()
            .enumerate()
            .filter(|(i, _)| *i < start || *i >= end)
            .map(|(_, ch)| ch)
            .collect();

        let blanked = document.with_line_replaced(pos.row, "").ok()?;
        let mut hasher = XxHash64::default();
        for chunk in blanked.rope().chunks() {
            hasher.write(chunk.as_bytes());
        }

        Some(Self {
            value_hash: hasher.finish(),
            blanked_line,
            pos: Pos::new(pos.row, start as u32),
            path: document.path().clone(),
            prefix,
        })
    }

    /// Whether a result computed for `self` can serve `newer`: same surroundings, and the
    /// user has only kept typing the same identifier.
    pub fn serves(&self, newer: &CacheKey) -> bool {
        self.path == newer.path
            && self.pos == newer.pos
            && self.blanked_line == newer.blanked_line
            && self.value_hash == newer.value_hash
            && newer.prefix.starts_with(&self.prefix)
    }
}

#[derive(Debug)]
struct CacheEntry {
    key: CacheKey,
    result: Option<Matches>,
    waiters: Vec<oneshot::Sender<Matches>>,
}

impl CacheEntry {
    fn pending(key: CacheKey) -> Self {
        Self {
            key,
            result: None,
            waiters: Vec::new(),
        }
    }

    fn lookup(&mut self) -> Lookup {
        match &self.result {
            Some(result) => Lookup::Hit(result.clone()),
            None => {
                let (tx, rx) = oneshot::channel();
                self.waiters.push(tx);
                Lookup::Pending(rx)
            }
        }
    }

    fn fill(&mut self, result: Matches) {
        for waiter in self.waiters.drain(..) {
            let _ = waiter.send(result.clone());
        }
        self.result = Some(result);
    }
}

#[derive(Debug)]
pub enum Lookup {
    Hit(Matches),
    /// A computation for a compatible key is in flight.
    Pending(oneshot::Receiver<Matches>),
    Miss,
}

/// One live entry plus one speculative entry, never more.
#[derive(Debug, Default)]
pub struct CompletionCache {
    live: Option<CacheEntry>,
    prediction: Option<CacheEntry>,
}

impl CompletionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Find a usable entry for `key`. A matching prediction is promoted to live.
    pub fn lookup(&mut self, key: &CacheKey) -> Lookup {
        if let Some(live) = self.live.as_mut().filter(|e| e.key.serves(key)) {
            return live.lookup();
        }
        if self.prediction.as_ref().is_some_and(|e| e.key.serves(key)) {
            self.live = self.prediction.take();
            if let Some(live) = self.live.as_mut() {
                return live.lookup();
            }
        }
        Lookup::Miss
    }

    /// Start computing `key` as the live entry, evicting whatever was there.
    pub fn begin(&mut self, key: CacheKey) {
        self.live = Some(CacheEntry::pending(key));
    }

    pub fn begin_prediction(&mut self, key: CacheKey) {
        self.prediction = Some(CacheEntry::pending(key));
    }

    /// Store the result for `key` and wake its waiters. Returns `false` if the entry was
    /// evicted while the computation ran.
    pub fn fill(&mut self, key: &CacheKey, result: Matches) -> bool {
        for slot in [&mut self.live, &mut self.prediction] {
            if let Some(entry) = slot.as_mut().filter(|e| &e.key == key) {
                entry.fill(result);
                return true;
            }
        }
        false
    }

    /// Key of the current live entry.
    pub fn live_key(&self) -> Option<&CacheKey> {
        self.live.as_ref().map(|e| &e.key)
    }

    pub fn has_prediction(&self) -> bool {
        self.prediction.is_some()
    }

    /// Drop both entries. Pending waiters see a closed channel.
    pub fn invalidate(&mut self) {
        self.live = None;
        self.prediction = None;
    }
}
