use clerk_core::{
    ContextualInsights, Preferences, SessionContext, StructuredQuery, now_unix_millis, synthesize,
};

use crate::error::Result;
use crate::store::Store;

/// Emitted after a mutation has been applied in memory (and, best-effort,
/// persisted). Listeners see the new state, never the intermediate one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangeEvent {
    PreferencesUpdated,
    PreferencesCleared,
    PageUpdated,
}

pub type Notifier = Box<dyn Fn(ChangeEvent) + Send>;

/// Durable preference model: in-memory [`Preferences`] and [`SessionContext`]
/// backed by a [`Store`].
///
/// Mutations go through `&mut self`, so every update (count bump plus
/// dimension-wide renormalization) is observed atomically. Persistence is
/// best-effort: a failed write is logged and the in-memory state stays
/// authoritative for the rest of the process.
pub struct PreferenceStore {
    preferences: Preferences,
    session: SessionContext,
    store: Store,
    notifier: Option<Notifier>,
}

impl PreferenceStore {
    /// Load prior state from the store, or start fresh if none exists.
    pub fn load(store: Store) -> Result<Self> {
        let preferences = store.load_preferences()?;
        let session = store.load_session()?;
        Ok(Self {
            preferences,
            session,
            store,
            notifier: None,
        })
    }

    pub fn set_notifier(&mut self, notifier: Notifier) {
        self.notifier = Some(notifier);
    }

    pub fn preferences(&self) -> &Preferences {
        &self.preferences
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Fold one parsed query into the model: session ring buffer first,
    /// then the five preference dimensions, then persistence.
    pub fn learn(&mut self, query: &str, parsed: &StructuredQuery) {
        let now_ms = now_unix_millis();
        self.session.record_query(query, parsed, now_ms);
        self.preferences.learn(parsed, now_ms);

        if let Err(e) = self.store.save_preferences(&self.preferences) {
            tracing::warn!("failed to persist preferences: {e}");
        }
        if let Err(e) = self.store.save_session(&self.session) {
            tracing::warn!("failed to persist session: {e}");
        }
        self.notify(ChangeEvent::PreferencesUpdated);
    }

    /// Drop all learned preferences, in memory and on disk. The session
    /// context survives.
    pub fn clear(&mut self) -> Result<()> {
        self.preferences.clear();
        self.store.clear_preferences()?;
        self.notify(ChangeEvent::PreferencesCleared);
        Ok(())
    }

    pub fn update_page(&mut self, site: &str, product_count: usize) {
        self.session.update_page(site, product_count);
        if let Err(e) = self.store.save_session(&self.session) {
            tracing::warn!("failed to persist session: {e}");
        }
        self.notify(ChangeEvent::PageUpdated);
    }

    /// Snapshot of current insights, synthesized from live state.
    pub fn insights(&self) -> ContextualInsights {
        synthesize(&self.preferences, &self.session)
    }

    fn notify(&self, event: ChangeEvent) {
        if let Some(notifier) = &self.notifier {
            notifier(event);
        }
    }
}
