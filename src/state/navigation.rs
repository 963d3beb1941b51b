//! Tab-scoped navigation.
//!
//! Each top-level tab owns its own back stack. Switching tabs keeps every
//! stack as it was, so leaving a tab and coming back restores its depth.
//!
//! Invariant: every stack is non-empty and its first entry is the key of the
//! tab that owns it. `pop` never removes that entry; only
//! `pop_to_root_and_navigate` replaces a stack, and it puts the root back.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// Navigable screens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NavKey {
    /// Search tab: search field and result list
    #[serde(alias = "news")]
    NewsList,
    /// Web view of a single article, pushed on top of either tab
    #[serde(alias = "web")]
    ArticleWeb,
    /// Saved articles tab
    #[serde(alias = "saved")]
    ArticlesList,
}

impl NavKey {
    /// Tabs shown in the bottom bar
    pub const TOP_LEVEL: [NavKey; 2] = [NavKey::NewsList, NavKey::ArticlesList];

    pub fn title(&self) -> &'static str {
        match self {
            NavKey::NewsList => "Search",
            NavKey::ArticleWeb => "Read",
            NavKey::ArticlesList => "Saved",
        }
    }

    pub fn is_top_level(&self) -> bool {
        Self::TOP_LEVEL.contains(self)
    }
}

impl fmt::Display for NavKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NavKey::NewsList => "NewsList",
            NavKey::ArticleWeb => "ArticleWeb",
            NavKey::ArticlesList => "ArticlesList",
        };
        f.write_str(name)
    }
}

impl FromStr for NavKey {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "news" | "search" | "news_list" | "newslist" => Ok(NavKey::NewsList),
            "saved" | "articles" | "articles_list" | "articleslist" => Ok(NavKey::ArticlesList),
            "web" | "read" | "article_web" | "articleweb" => Ok(NavKey::ArticleWeb),
            _ => anyhow::bail!("Unknown screen: {}", s),
        }
    }
}

/// Per-tab back stacks plus the active tab pointer
#[derive(Debug, Clone)]
pub struct BackStacks<K> {
    stacks: HashMap<K, Vec<K>>,
    current: K,
}

impl<K> BackStacks<K>
where
    K: Clone + Eq + Hash + fmt::Debug,
{
    /// Single tab `start` with the stack `[start]`
    pub fn new(start: K) -> Self {
        let mut stacks = HashMap::new();
        stacks.insert(start.clone(), vec![start.clone()]);
        Self {
            stacks,
            current: start,
        }
    }

    pub fn current_tab(&self) -> &K {
        &self.current
    }

    /// Stack of the active tab, root first
    pub fn current_stack(&self) -> &[K] {
        self.stacks
            .get(&self.current)
            .map(Vec::as_slice)
            .unwrap_or(std::slice::from_ref(&self.current))
    }

    /// Stack of any tab that has been visited
    pub fn stack_for(&self, tab: &K) -> Option<&[K]> {
        self.stacks.get(tab).map(Vec::as_slice)
    }

    /// Screen on top of the active stack
    pub fn top(&self) -> &K {
        self.current_stack().last().unwrap_or(&self.current)
    }

    fn current_stack_mut(&mut self) -> &mut Vec<K> {
        let tab = self.current.clone();
        self.stacks
            .entry(tab.clone())
            .or_insert_with(|| vec![tab])
    }

    pub fn push(&mut self, key: K) {
        self.current_stack_mut().push(key);
    }

    /// Remove the top entry unless it is the tab root. Returns the removed key.
    pub fn pop(&mut self) -> Option<K> {
        let stack = self.current_stack_mut();
        if stack.len() > 1 { stack.pop() } else { None }
    }

    /// Make `tab` active, creating `[tab]` on first visit
    pub fn switch_top_level(&mut self, tab: K) {
        self.stacks
            .entry(tab.clone())
            .or_insert_with(|| vec![tab.clone()]);
        self.current = tab;
    }

    /// Activate `tab` and reset its stack to `[tab]`. Other tabs are untouched.
    pub fn pop_to_root_and_navigate(&mut self, tab: K) {
        self.switch_top_level(tab.clone());
        let stack = self.current_stack_mut();
        stack.clear();
        stack.push(tab);
    }

    /// Visited tabs with their stacks, in no particular order
    pub fn iter(&self) -> impl Iterator<Item = (&K, &[K])> {
        self.stacks.iter().map(|(k, v)| (k, v.as_slice()))
    }
}

struct NavigatorInner {
    stacks: Mutex<BackStacks<NavKey>>,
    active: watch::Sender<Vec<NavKey>>,
}

/// Shared navigation controller.
///
/// Cheap to clone; every clone drives the same stacks. Observers get the
/// active stack through [`Navigator::subscribe`].
#[derive(Clone)]
pub struct Navigator {
    inner: Arc<NavigatorInner>,
}

impl Navigator {
    pub fn new(start: NavKey) -> Self {
        let stacks = BackStacks::new(start);
        let (active, _) = watch::channel(stacks.current_stack().to_vec());
        tracing::debug!("Navigator created, start tab {}", start);
        Self {
            inner: Arc::new(NavigatorInner {
                stacks: Mutex::new(stacks),
                active,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BackStacks<NavKey>> {
        self.inner
            .stacks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply `f` to the stacks, then publish the active stack and dump state
    fn mutate<R>(&self, f: impl FnOnce(&mut BackStacks<NavKey>) -> R) -> R {
        let mut stacks = self.lock();
        let result = f(&mut stacks);
        let current = stacks.current_stack().to_vec();
        dump(&stacks);
        drop(stacks);

        self.inner.active.send_if_modified(|active| {
            if *active != current {
                *active = current;
                true
            } else {
                false
            }
        });
        result
    }

    pub fn push(&self, key: NavKey) {
        tracing::debug!("push: {}", key);
        self.mutate(|s| s.push(key));
    }

    pub fn pop(&self) -> Option<NavKey> {
        let removed = self.mutate(|s| s.pop());
        match removed {
            Some(key) => tracing::debug!("pop: removed {}", key),
            None => tracing::debug!("pop: at root of {}", self.current_tab()),
        }
        removed
    }

    pub fn switch_top_level(&self, tab: NavKey) {
        if self.current_tab() == tab {
            tracing::debug!("switchTopLevel: already on {}", tab);
            return;
        }
        tracing::debug!("switchTopLevel -> {}", tab);
        self.mutate(|s| s.switch_top_level(tab));
    }

    pub fn pop_to_root_and_navigate(&self, tab: NavKey) {
        tracing::debug!("popToRootAndNavigate -> {}", tab);
        self.mutate(|s| s.pop_to_root_and_navigate(tab));
    }

    pub fn current_tab(&self) -> NavKey {
        *self.lock().current_tab()
    }

    pub fn current_stack(&self) -> Vec<NavKey> {
        self.lock().current_stack().to_vec()
    }

    pub fn top(&self) -> NavKey {
        *self.lock().top()
    }

    /// Copy of all stacks, for display
    pub fn snapshot(&self) -> BackStacks<NavKey> {
        self.lock().clone()
    }

    /// Active stack, replayed immediately and updated on every change
    pub fn subscribe(&self) -> watch::Receiver<Vec<NavKey>> {
        self.inner.active.subscribe()
    }
}

fn dump(stacks: &BackStacks<NavKey>) {
    if !tracing::enabled!(tracing::Level::DEBUG) {
        return;
    }
    tracing::debug!("=== Navigation State ===");
    tracing::debug!("Current Top-Level: {}", stacks.current_tab());
    for (tab, stack) in stacks.iter() {
        let marker = if tab == stacks.current_tab() { ">>> " } else { "    " };
        let keys: Vec<String> = stack.iter().map(ToString::to_string).collect();
        tracing::debug!("{}[{}] = [{}]", marker, tab, keys.join(", "));
    }
}
