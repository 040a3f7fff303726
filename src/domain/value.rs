//! Reported aggregate values
//!
//! A [`ReportedValue`] mirrors one entry of a DHIS2 `dataValues` array.
//! Identifier fields are rewritten as the value moves from the source
//! representation to the destination; `value` itself is never touched.

use serde::{Deserialize, Serialize};

/// One aggregate value keyed by element, period, unit and category breakdown
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportedValue {
    /// Data element id
    pub data_element: String,

    /// Reporting period
    pub period: String,

    /// Organisation unit id
    pub org_unit: String,

    /// Category option combo id (disaggregation)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_option_combo: Option<String>,

    /// Attribute option combo id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute_option_combo: Option<String>,

    /// Value payload
    #[serde(default)]
    pub value: String,

    /// Author of the value on the source instance
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stored_by: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub followup: Option<bool>,
}

impl ReportedValue {
    /// Creates a value with the mandatory keys and no category breakdown
    pub fn new(
        data_element: impl Into<String>,
        period: impl Into<String>,
        org_unit: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            data_element: data_element.into(),
            period: period.into(),
            org_unit: org_unit.into(),
            category_option_combo: None,
            attribute_option_combo: None,
            value: value.into(),
            stored_by: None,
            comment: None,
            followup: None,
        }
    }

    /// Sets the category option combo
    pub fn with_category_option_combo(mut self, id: impl Into<String>) -> Self {
        self.category_option_combo = Some(id.into());
        self
    }

    /// Sets the attribute option combo
    pub fn with_attribute_option_combo(mut self, id: impl Into<String>) -> Self {
        self.attribute_option_combo = Some(id.into());
        self
    }
}
