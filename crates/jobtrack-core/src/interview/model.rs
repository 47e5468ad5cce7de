//! Interview schedule models.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// A scheduled interview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interview {
    /// Row id.
    pub id: i64,
    /// Company name.
    pub company: String,
    /// Position applied for.
    pub position: String,
    /// Scheduled time, minute precision.
    #[serde(with = "minute_precision")]
    pub datetime: Option<NaiveDateTime>,
    /// Whether preparation is done.
    pub preparation: bool,
    /// Whether the interview took place.
    pub completion: bool,
    /// When the row was written.
    pub created_at: String,
}

/// An interview as submitted by a client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewInterview {
    /// Company name, required.
    pub company: String,
    /// Position, required.
    pub position: String,
    /// Scheduled time.
    #[serde(with = "minute_precision")]
    pub datetime: Option<NaiveDateTime>,
    /// Whether preparation is done.
    pub preparation: bool,
    /// Whether the interview took place.
    pub completion: bool,
}

impl NewInterview {
    /// Creates an unscheduled interview.
    #[must_use]
    pub fn new(company: impl Into<String>, position: impl Into<String>) -> Self {
        Self {
            company: company.into(),
            position: position.into(),
            ..Self::default()
        }
    }

    /// Sets the scheduled time.
    #[must_use]
    pub const fn at(mut self, datetime: NaiveDateTime) -> Self {
        self.datetime = Some(datetime);
        self
    }

    /// Checks required fields.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if company or position is blank.
    pub fn validate(&self) -> Result<()> {
        if self.company.trim().is_empty() {
            return Err(Error::Validation("interview company is required".to_string()));
        }
        if self.position.trim().is_empty() {
            return Err(Error::Validation("interview position is required".to_string()));
        }
        Ok(())
    }
}

/// `YYYY-MM-DDTHH:MM` on the wire; any form [`crate::time::parse_datetime`]
/// understands is accepted on input. Blank means unscheduled.
mod minute_precision {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer, de};

    const WIRE_FORMAT: &str = "%Y-%m-%dT%H:%M";

    #[allow(clippy::ref_option)]
    pub fn serialize<S: Serializer>(
        value: &Option<NaiveDateTime>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(datetime) => serializer.serialize_str(&datetime.format(WIRE_FORMAT).to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<NaiveDateTime>, D::Error> {
        let Some(raw) = Option::<String>::deserialize(deserializer)? else {
            return Ok(None);
        };
        if raw.trim().is_empty() {
            return Ok(None);
        }
        crate::time::parse_datetime(&raw)
            .map(Some)
            .ok_or_else(|| de::Error::custom(format!("invalid interview datetime '{raw}'")))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wire_format_is_minute_precision() {
        let interview = NewInterview::new("Tencent", "Frontend")
            .at(crate::time::parse_datetime("2025-09-20 09:00:59").unwrap());
        let value = serde_json::to_value(&interview).unwrap();
        assert_eq!(value["datetime"], "2025-09-20T09:00");
    }

    #[test]
    fn test_lenient_input() {
        let parsed: NewInterview = serde_json::from_value(json!({
            "company": "Alibaba",
            "position": "Java",
            "datetime": "2025-09-22T14:00:00.000Z",
            "preparation": true
        }))
        .unwrap();
        assert_eq!(
            parsed.datetime.unwrap().format("%Y-%m-%dT%H:%M").to_string(),
            "2025-09-22T14:00"
        );
        assert!(parsed.preparation);
        assert!(!parsed.completion);
    }

    #[test]
    fn test_blank_datetime_is_unscheduled() {
        let parsed: NewInterview =
            serde_json::from_value(json!({ "company": "JD", "position": "Sales", "datetime": "" }))
                .unwrap();
        assert!(parsed.datetime.is_none());

        let parsed: NewInterview =
            serde_json::from_value(json!({ "company": "JD", "position": "Sales", "datetime": null }))
                .unwrap();
        assert!(parsed.datetime.is_none());
    }

    #[test]
    fn test_malformed_datetime_rejected() {
        let result: std::result::Result<NewInterview, _> =
            serde_json::from_value(json!({ "company": "JD", "position": "Sales", "datetime": "soon" }));
        assert!(result.is_err());
    }

    #[test]
    fn test_validation() {
        assert!(NewInterview::new("ByteDance", "PM").validate().is_ok());
        assert!(matches!(
            NewInterview::new(" ", "PM").validate(),
            Err(Error::Validation(_))
        ));
        assert!(NewInterview::new("ByteDance", "").validate().is_err());
    }
}
