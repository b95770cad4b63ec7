//! The static plan catalog.
//!
//! Plans mirror the seed data the fulfillment side expects: slug, price in
//! minor currency units, delivery window, and task priority. The `custom`
//! plan exists for quoting only and cannot be purchased through the order
//! endpoint.

use serde::Serialize;

/// Task priority attached to a plan's fulfillment work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanPriority {
    /// Standard queue position.
    Normal,
    /// Ahead of normal work.
    High,
    /// Front of the queue.
    Urgent,
}

impl PlanPriority {
    /// Returns a lowercase label suitable for task records and logs.
    #[must_use]
    pub const fn as_label(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::High => "high",
            Self::Urgent => "urgent",
        }
    }
}

/// A purchasable (or quotable) plan.
#[derive(Debug, Clone, Serialize)]
pub struct Plan {
    /// Human-readable plan name.
    pub name: &'static str,
    /// URL-safe plan slug.
    pub slug: &'static str,
    /// Price in minor currency units.
    pub price_minor: i64,
    /// Formatted display price.
    pub display_price: &'static str,
    /// Delivery window in days; drives project deadlines and task due dates.
    pub delivery_days: i64,
    /// Fulfillment priority.
    pub priority: PlanPriority,
    /// Marketing feature list.
    pub features: &'static [&'static str],
}

impl Plan {
    /// Returns true if an order can be created for this plan.
    ///
    /// The custom plan requires a service request instead of a checkout.
    #[must_use]
    pub fn is_purchasable(&self) -> bool {
        self.slug != "custom"
    }
}

const PLANS: &[Plan] = &[
    Plan {
        name: "Starter",
        slug: "starter",
        price_minor: 399_900,
        display_price: "\u{20b9}3,999",
        delivery_days: 3,
        priority: PlanPriority::Normal,
        features: &[
            "1-page landing website",
            "Mobile responsive",
            "Contact form",
            "3-day delivery",
        ],
    },
    Plan {
        name: "Growth",
        slug: "growth",
        price_minor: 999_900,
        display_price: "\u{20b9}9,999",
        delivery_days: 7,
        priority: PlanPriority::High,
        features: &[
            "5-page website",
            "Basic SEO",
            "Contact form",
            "7-day delivery",
        ],
    },
    Plan {
        name: "Pro",
        slug: "pro",
        price_minor: 1_999_900,
        display_price: "\u{20b9}19,999",
        delivery_days: 14,
        priority: PlanPriority::Urgent,
        features: &[
            "Full custom website (8-10 pages)",
            "Admin dashboard for leads",
            "Payment integration",
            "SEO setup",
            "14-day delivery",
        ],
    },
    Plan {
        name: "Custom",
        slug: "custom",
        price_minor: 0,
        display_price: "Contact Us",
        delivery_days: 30,
        priority: PlanPriority::Normal,
        features: &["Web apps", "SaaS", "Dashboards", "Maintenance"],
    },
];

/// Lookup interface over the static plan set.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlanCatalog;

impl PlanCatalog {
    /// Creates the catalog.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Returns the plan with the given slug, if any.
    #[must_use]
    pub fn get(&self, slug: &str) -> Option<&'static Plan> {
        PLANS.iter().find(|p| p.slug == slug)
    }

    /// Returns all plans.
    #[must_use]
    pub fn all(&self) -> &'static [Plan] {
        PLANS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_slugs_resolve() {
        let catalog = PlanCatalog::new();
        for slug in ["starter", "growth", "pro", "custom"] {
            assert!(catalog.get(slug).is_some(), "missing plan {slug}");
        }
    }

    #[test]
    fn unknown_slug_is_none() {
        assert!(PlanCatalog::new().get("platinum").is_none());
    }

    #[test]
    fn custom_plan_is_not_purchasable() {
        let catalog = PlanCatalog::new();
        assert!(!catalog.get("custom").unwrap().is_purchasable());
        assert!(catalog.get("starter").unwrap().is_purchasable());
    }

    #[test]
    fn prices_are_positive_for_purchasable_plans() {
        for plan in PlanCatalog::new().all() {
            if plan.is_purchasable() {
                assert!(plan.price_minor > 0, "{} has no price", plan.slug);
            }
        }
    }
}
