//! Funds collaborator consulted by the service pass.

/// Source of funds for unit upkeep.
pub trait Economy {
    fn current_funds(&self) -> i64;

    /// Deduct `amount`. Spending is unconditional; balances may go negative.
    fn spend_funds(&mut self, amount: i64);
}

/// Plain in-memory balance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Treasury {
    funds: i64,
}

impl Treasury {
    pub fn new(funds: i64) -> Self {
        Self { funds }
    }

    pub fn deposit(&mut self, amount: i64) {
        self.funds = self.funds.saturating_add(amount);
    }
}

impl Economy for Treasury {
    fn current_funds(&self) -> i64 {
        self.funds
    }

    fn spend_funds(&mut self, amount: i64) {
        self.funds = self.funds.saturating_sub(amount);
    }
}
