use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use common::{OrderSide, Portfolio, Position};
use surface::{PortfolioProvider, PortfolioProviderEvents};

/// Portfolios and positions of the paper account. A portfolio's
/// `current_value` is its cash balance.
#[derive(Default)]
pub struct PortfolioBook {
    events: PortfolioProviderEvents,
    accounts: Mutex<Accounts>,
}

#[derive(Default)]
struct Accounts {
    portfolios: HashMap<String, Portfolio>,
    positions: HashMap<(String, String), Position>,
}

/// What one fill did to the account.
#[derive(Debug, Clone, PartialEq)]
pub struct AccountChange {
    pub portfolio: Portfolio,
    pub position: Position,
    /// The fill opened a position that did not exist before.
    pub opened: bool,
}

impl PortfolioBook {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add(&self, portfolio: Portfolio) {
        self.accounts
            .lock()
            .portfolios
            .insert(portfolio.name.clone(), portfolio.clone());
        self.events.new_portfolio.raise(portfolio);
    }

    /// All portfolios, ordered by name.
    pub fn portfolios(&self) -> Vec<Portfolio> {
        let mut portfolios: Vec<Portfolio> =
            self.accounts.lock().portfolios.values().cloned().collect();
        portfolios.sort_by(|a, b| a.name.cmp(&b.name));
        portfolios
    }

    pub fn position(&self, portfolio: &str, security_id: &str) -> Option<Position> {
        self.accounts
            .lock()
            .positions
            .get(&(portfolio.to_string(), security_id.to_string()))
            .cloned()
    }

    pub fn positions(&self) -> Vec<Position> {
        self.accounts.lock().positions.values().cloned().collect()
    }

    /// Book a fill: cash moves against the side, the position with it.
    /// Returns `None` for an unknown portfolio.
    pub(crate) fn apply_fill(
        &self,
        portfolio: &str,
        security_id: &str,
        side: OrderSide,
        volume: f64,
        price: f64,
    ) -> Option<AccountChange> {
        let change = {
            let mut accounts = self.accounts.lock();
            let updated = {
                let entry = accounts.portfolios.get_mut(portfolio)?;
                entry.current_value -= side.sign() * volume * price;
                entry.clone()
            };
            let key = (portfolio.to_string(), security_id.to_string());
            let opened = !accounts.positions.contains_key(&key);
            let position = accounts.positions.entry(key).or_insert_with(|| Position {
                portfolio: portfolio.to_string(),
                security_id: security_id.to_string(),
                begin_value: 0.0,
                current_value: 0.0,
            });
            position.current_value += side.sign() * volume;
            AccountChange {
                portfolio: updated,
                position: position.clone(),
                opened,
            }
        };
        debug!(
            portfolio,
            security = security_id,
            cash = change.portfolio.current_value,
            position = change.position.current_value,
            "fill booked"
        );
        self.events.portfolio_changed.raise(change.portfolio.clone());
        Some(change)
    }
}

impl PortfolioProvider for PortfolioBook {
    fn portfolio_provider_events(&self) -> &PortfolioProviderEvents {
        &self.events
    }

    fn lookup_portfolio(&self, name: &str) -> Option<Portfolio> {
        self.accounts.lock().portfolios.get(name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rx::Collector;
    use surface::RxPortfolioProvider;

    #[test]
    fn buy_spends_cash_and_opens_position() {
        let book = PortfolioBook::new();
        book.add(Portfolio::new("main", 1000.0));

        let change = book
            .apply_fill("main", "A@X", OrderSide::Buy, 2.0, 100.0)
            .unwrap();
        assert_eq!(change.portfolio.current_value, 800.0);
        assert_eq!(change.position.current_value, 2.0);
        assert!(change.opened);

        let change = book
            .apply_fill("main", "A@X", OrderSide::Sell, 1.0, 110.0)
            .unwrap();
        assert_eq!(change.portfolio.current_value, 910.0);
        assert_eq!(change.position.current_value, 1.0);
        assert!(!change.opened);
    }

    #[test]
    fn unknown_portfolio_books_nothing() {
        let book = PortfolioBook::new();
        assert!(book.apply_fill("nope", "A@X", OrderSide::Buy, 1.0, 1.0).is_none());
        assert!(book.positions().is_empty());
    }

    #[test]
    fn provider_events_follow_the_book() {
        let book = PortfolioBook::new();
        let added = Collector::new();
        let changed = Collector::new();
        let _a = book.rx_new_portfolio().subscribe(added.clone());
        let _b = book.rx_portfolio_changed().subscribe(changed.clone());

        book.add(Portfolio::new("main", 100.0));
        book.apply_fill("main", "A@X", OrderSide::Buy, 1.0, 10.0);

        assert_eq!(added.values(), vec![Portfolio::new("main", 100.0)]);
        let cash: Vec<f64> = changed.values().iter().map(|p| p.current_value).collect();
        assert_eq!(cash, vec![90.0]);
    }
}
