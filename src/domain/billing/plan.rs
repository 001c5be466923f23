//! Purchasable plans and the static plan catalog.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::ValidationError;

/// Identifier of a purchasable plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanId {
    Monthly,
    Annual,
}

impl PlanId {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanId::Monthly => "monthly",
            PlanId::Annual => "annual",
        }
    }

    /// Each plan renews on its own calendar boundary.
    pub fn cadence(&self) -> BillingCadence {
        match self {
            PlanId::Monthly => BillingCadence::Monthly,
            PlanId::Annual => BillingCadence::Annual,
        }
    }
}

impl fmt::Display for PlanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlanId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "monthly" => Ok(PlanId::Monthly),
            "annual" | "yearly" => Ok(PlanId::Annual),
            other => Err(ValidationError::invalid_format(
                "plan_id",
                format!("unknown plan '{}'", other),
            )),
        }
    }
}

/// Calendar period a plan is billed over.
///
/// Monthly renews on the 1st of every month, annual on January 1st.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BillingCadence {
    Monthly,
    Annual,
}

impl BillingCadence {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillingCadence::Monthly => "monthly",
            BillingCadence::Annual => "annual",
        }
    }
}

/// A purchasable plan. Immutable once the catalog is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub id: PlanId,
    /// Full price in whole currency units (KES has no minor unit in practice).
    pub amount: u64,
    pub cadence: BillingCadence,
}

/// The two plans on sale, priced at process start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanCatalog {
    monthly: Plan,
    annual: Plan,
}

impl PlanCatalog {
    pub fn new(monthly_amount: u64, annual_amount: u64) -> Self {
        Self {
            monthly: Plan {
                id: PlanId::Monthly,
                amount: monthly_amount,
                cadence: BillingCadence::Monthly,
            },
            annual: Plan {
                id: PlanId::Annual,
                amount: annual_amount,
                cadence: BillingCadence::Annual,
            },
        }
    }

    pub fn get(&self, id: PlanId) -> Plan {
        match id {
            PlanId::Monthly => self.monthly,
            PlanId::Annual => self.annual,
        }
    }

    /// Resolves a caller-supplied plan identifier.
    ///
    /// # Errors
    ///
    /// `InvalidFormat` on `plan_id` when the identifier names no plan.
    pub fn resolve(&self, plan_id: &str) -> Result<Plan, ValidationError> {
        let id: PlanId = plan_id.parse()?;
        Ok(self.get(id))
    }

    pub fn plans(&self) -> [Plan; 2] {
        [self.monthly, self.annual]
    }
}

impl Default for PlanCatalog {
    fn default() -> Self {
        Self::new(250, 2500)
    }
}
