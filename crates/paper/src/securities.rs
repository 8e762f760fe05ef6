use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use common::Security;
use surface::{SecurityProvider, SecurityProviderEvents};

/// In-memory security catalogue.
#[derive(Default)]
pub struct SecurityStore {
    events: SecurityProviderEvents,
    securities: Mutex<Vec<Security>>,
}

impl SecurityStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Add or replace securities by id.
    pub fn add(&self, securities: Vec<Security>) {
        if securities.is_empty() {
            return;
        }
        {
            let mut known = self.securities.lock();
            for security in &securities {
                match known.iter_mut().find(|s| s.id == security.id) {
                    Some(existing) => *existing = security.clone(),
                    None => known.push(security.clone()),
                }
            }
        }
        debug!(count = securities.len(), "securities added");
        self.events.added.raise(securities);
    }

    pub fn remove(&self, ids: &[&str]) {
        let removed: Vec<Security> = {
            let mut known = self.securities.lock();
            let (gone, kept): (Vec<Security>, Vec<Security>) =
                known.drain(..).partition(|s| ids.contains(&s.id.as_str()));
            *known = kept;
            gone
        };
        if !removed.is_empty() {
            self.events.removed.raise(removed);
        }
    }

    pub fn clear(&self) {
        self.securities.lock().clear();
        self.events.cleared.raise();
    }

    pub fn all(&self) -> Vec<Security> {
        self.securities.lock().clone()
    }

    /// Securities whose code contains `code`, case-insensitively. An empty
    /// pattern matches everything.
    pub fn find(&self, code: &str) -> Vec<Security> {
        let pattern = code.to_lowercase();
        self.securities
            .lock()
            .iter()
            .filter(|s| s.code.to_lowercase().contains(&pattern))
            .cloned()
            .collect()
    }
}

impl SecurityProvider for SecurityStore {
    fn security_provider_events(&self) -> &SecurityProviderEvents {
        &self.events
    }

    fn lookup_security(&self, security_id: &str) -> Option<Security> {
        self.securities
            .lock()
            .iter()
            .find(|s| s.id == security_id)
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rx::Collector;
    use surface::RxSecurityProvider;

    #[test]
    fn add_replaces_by_id_and_announces() {
        let store = SecurityStore::new();
        let seen = Collector::new();
        let _sub = store.rx_added().subscribe(seen.clone());

        store.add(vec![Security::new("A", "X")]);
        let mut tick = Security::new("A", "X");
        tick.price_step = 0.5;
        store.add(vec![tick]);

        assert_eq!(store.all().len(), 1);
        assert_eq!(store.lookup_security("A@X").map(|s| s.price_step), Some(0.5));
        assert_eq!(seen.len(), 2);
    }

    #[test]
    fn remove_reports_only_known_securities() {
        let store = SecurityStore::new();
        store.add(vec![Security::new("A", "X"), Security::new("B", "X")]);
        let seen = Collector::new();
        let _sub = store.rx_removed().subscribe(seen.clone());

        store.remove(&["B@X", "Z@X"]);
        store.remove(&["Z@X"]);

        assert_eq!(seen.values(), vec![vec![Security::new("B", "X")]]);
        assert_eq!(store.all(), vec![Security::new("A", "X")]);
    }

    #[test]
    fn find_matches_code_fragments() {
        let store = SecurityStore::new();
        store.add(vec![Security::new("SBER", "TQBR"), Security::new("GAZP", "TQBR")]);
        assert_eq!(store.find("sb").len(), 1);
        assert_eq!(store.find("").len(), 2);
    }
}
