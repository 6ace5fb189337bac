use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SupplierId(pub String);

impl SupplierId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SupplierId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Operational track record reported for a supplier. Every rate is optional because
/// new suppliers arrive with partial data.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SupplierMetrics {
    pub response_time_hours: Option<f64>,
    /// Percent, 0-100.
    pub acceptance_rate: Option<f64>,
    /// Percent, 0-100.
    pub on_time_delivery: Option<f64>,
    /// Rating, 1-5.
    pub quality_rating: Option<f64>,
    pub similar_request_count: u32,
}

impl SupplierMetrics {
    pub fn is_well_formed(&self) -> bool {
        [self.response_time_hours, self.acceptance_rate, self.on_time_delivery, self.quality_rating]
            .into_iter()
            .flatten()
            .all(|value| value.is_finite() && value >= 0.0)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplierAttributes {
    pub preferred_categories: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Supplier {
    pub id: SupplierId,
    pub company_name: String,
    pub description: String,
    pub categories: Vec<String>,
    pub location: String,
    pub verified: bool,
    pub metrics: Option<SupplierMetrics>,
    pub attributes: Option<SupplierAttributes>,
}

impl Supplier {
    pub fn search_text(&self) -> String {
        format!("{} {} {}", self.company_name, self.description, self.categories.join(" "))
    }

    /// Declared categories only; preferred categories are a softer signal.
    pub fn offers_category(&self, category: &str) -> bool {
        let category = category.trim();
        self.categories.iter().any(|declared| declared.trim().eq_ignore_ascii_case(category))
    }

    /// Declared and preferred categories together.
    pub fn category_labels(&self) -> impl Iterator<Item = &str> {
        self.categories.iter().map(String::as_str).chain(
            self.attributes
                .iter()
                .flat_map(|attributes| attributes.preferred_categories.iter().map(String::as_str)),
        )
    }
}
