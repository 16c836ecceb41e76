//! Catalog read models
//!
//! Plans and items are owned by the catalog collaborator. The engine only
//! reads them to build contracts and to fill in display data.

use serde::{Deserialize, Serialize};

use crate::domain::value_objects::{Money, PlanId};

/// An AMC or rental plan as offered in the catalog.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanTemplate {
    pub id: PlanId,
    pub name: String,
    pub price: Money,
    pub duration_months: u32,
    pub service_quota: u32,
    pub parts_included: bool,
    pub is_active: bool,
    pub image_url: Option<String>,
}

/// A product or spare part, resolved through one polymorphic lookup.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub name: String,
    pub image_url: Option<String>,
    pub plan_ids: Vec<PlanId>,
}

impl CatalogItem {
    pub fn offers_plan(&self, plan_id: &PlanId) -> bool {
        self.plan_ids.contains(plan_id)
    }
}
