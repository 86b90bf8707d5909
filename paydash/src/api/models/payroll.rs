//! API request models for payroll previews.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::payroll::{CommissionRule, PayrollItem, PayrollRules};

/// Body of `POST /api/payroll/preview` and `POST /api/payroll/preview.csv`.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct PayrollPreviewRequest {
    pub items: Vec<PayrollItem>,
    /// Defaults to 0.50/hour for "danny"
    #[serde(default)]
    pub commission: Option<CommissionRule>,
}

impl PayrollPreviewRequest {
    pub fn rules(&self) -> PayrollRules {
        PayrollRules {
            commission: self.commission.clone().unwrap_or_default(),
            ..Default::default()
        }
    }
}
