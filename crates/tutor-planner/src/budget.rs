use crate::PlanError;
use std::time::{Duration, Instant};

/// Hard cutoff around one planning call, checked at every visited node.
#[derive(Debug)]
pub(crate) struct Budget {
    started: Instant,
    time_cap: Option<Duration>,
    node_cap: Option<usize>,
    nodes: usize,
}

impl Budget {
    pub(crate) fn new(time_cap_ms: Option<u64>, node_cap: Option<usize>) -> Self {
        Self {
            started: Instant::now(),
            time_cap: time_cap_ms.map(Duration::from_millis),
            node_cap,
            nodes: 0,
        }
    }

    pub(crate) fn tick(&mut self) -> Result<(), PlanError> {
        self.nodes = self.nodes.saturating_add(1);
        let over_nodes = self.node_cap.is_some_and(|cap| self.nodes > cap);
        let over_time = self
            .time_cap
            .is_some_and(|cap| self.started.elapsed() >= cap);
        if over_nodes || over_time {
            return Err(PlanError::BudgetExhausted {
                nodes: self.nodes,
                elapsed_ms: self.elapsed_ms(),
            });
        }
        Ok(())
    }

    pub(crate) fn nodes(&self) -> usize {
        self.nodes
    }

    pub(crate) fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_cap_is_inclusive() {
        let mut budget = Budget::new(None, Some(2));
        assert!(budget.tick().is_ok());
        assert!(budget.tick().is_ok());
        assert!(matches!(
            budget.tick(),
            Err(PlanError::BudgetExhausted { nodes: 3, .. })
        ));
    }

    #[test]
    fn unbounded_budget_never_stops() {
        let mut budget = Budget::new(None, None);
        for _ in 0..1000 {
            budget.tick().unwrap();
        }
        assert_eq!(budget.nodes(), 1000);
    }
}
