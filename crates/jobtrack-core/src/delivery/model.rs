//! Delivery log models.

use serde::{Deserialize, Serialize};

use crate::time::{parse_datetime, to_storage};
use crate::{Error, Result};

/// One submitted application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delivery {
    /// Row id.
    pub id: i64,
    /// Company applied to.
    pub company_name: String,
    /// When the application was sent, `YYYY-MM-DD HH:MM:SS`.
    pub delivery_date: String,
    /// Free-form status, e.g. "applied" or "rejected".
    pub status: String,
}

/// A delivery as submitted by a client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewDelivery {
    /// Company applied to.
    pub company_name: String,
    /// Any date or date/time form the tracker accepts.
    pub delivery_date: String,
    /// Status.
    pub status: String,
}

impl NewDelivery {
    /// Creates a delivery.
    #[must_use]
    pub fn new(
        company_name: impl Into<String>,
        delivery_date: impl Into<String>,
        status: impl Into<String>,
    ) -> Self {
        Self {
            company_name: company_name.into(),
            delivery_date: delivery_date.into(),
            status: status.into(),
        }
    }

    /// Trims every field and rewrites the date in storage form.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if a field is blank or the date cannot
    /// be parsed.
    pub fn normalized(&self) -> Result<Self> {
        let company_name = self.company_name.trim();
        let delivery_date = self.delivery_date.trim();
        let status = self.status.trim();
        if company_name.is_empty() || delivery_date.is_empty() || status.is_empty() {
            return Err(Error::Validation(
                "company_name, delivery_date and status are required".to_string(),
            ));
        }

        let parsed = parse_datetime(delivery_date).ok_or_else(|| {
            Error::Validation(format!("invalid delivery date '{delivery_date}'"))
        })?;

        Ok(Self::new(company_name, to_storage(&parsed), status))
    }
}
