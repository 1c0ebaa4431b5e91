use super::aggregate::InvestmentState;
use super::events::InvestmentId;
use super::log::{EventLog, EventLogError};
use std::collections::HashMap;
use std::sync::RwLock;

/// Read-model cache of folded investment state.
///
/// Never authoritative: every read catches up from the log past the cached
/// version, and the cache can be cleared at any time.
#[derive(Debug, Default)]
pub struct ProjectionCache {
    states: RwLock<HashMap<InvestmentId, InvestmentState>>,
}

impl ProjectionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state of an investment, folding only events newer than the
    /// cached version. Unknown investments yield a default state at version 0.
    pub fn load<L: EventLog + ?Sized>(
        &self,
        log: &L,
        investment_id: &InvestmentId,
    ) -> Result<InvestmentState, EventLogError> {
        let mut state = {
            let states = self.states.read().map_err(|_| EventLogError::Poisoned)?;
            states.get(investment_id).cloned().unwrap_or_default()
        };

        let newer = log.read_from(investment_id, state.version)?;
        if newer.is_empty() {
            return Ok(state);
        }
        for event in &newer {
            state.apply(event);
        }

        let mut states = self.states.write().map_err(|_| EventLogError::Poisoned)?;
        let replace = states
            .get(investment_id)
            .map_or(true, |cached| cached.version < state.version);
        if replace {
            states.insert(investment_id.clone(), state.clone());
        }
        Ok(state)
    }

    pub fn clear(&self) {
        if let Ok(mut states) = self.states.write() {
            states.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.states.read().map_or(0, |s| s.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
