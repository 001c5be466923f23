//! ListPlansHandler - Query handler for the plan catalog.

use crate::domain::billing::{Plan, PlanCatalog};

#[derive(Debug, Clone, Default)]
pub struct ListPlansQuery;

#[derive(Debug, Clone)]
pub struct ListPlansResult {
    pub plans: Vec<Plan>,
}

pub struct ListPlansHandler {
    catalog: PlanCatalog,
}

impl ListPlansHandler {
    pub fn new(catalog: PlanCatalog) -> Self {
        Self { catalog }
    }

    pub fn handle(&self, _query: ListPlansQuery) -> ListPlansResult {
        ListPlansResult {
            plans: self.catalog.plans().to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::billing::PlanId;

    #[test]
    fn lists_both_plans_with_configured_prices() {
        let result = ListPlansHandler::new(PlanCatalog::new(300, 3000)).handle(ListPlansQuery);
        assert_eq!(result.plans.len(), 2);
        assert_eq!(result.plans[0].id, PlanId::Monthly);
        assert_eq!(result.plans[0].amount, 300);
        assert_eq!(result.plans[1].id, PlanId::Annual);
        assert_eq!(result.plans[1].amount, 3000);
    }
}
