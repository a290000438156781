use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// One uploaded document as recorded in the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    /// Opaque identifier, equal to the stored name
    pub id: String,
    pub stored_name: String,
    pub original_name: String,
    pub size: u64,
    #[serde(with = "iso_millis")]
    #[schema(value_type = String, format = DateTime, example = "2024-05-01T10:00:00.000Z")]
    pub uploaded_at: DateTime<Utc>,
}

impl FileEntry {
    pub fn new(
        stored_name: String,
        original_name: String,
        size: u64,
        uploaded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: stored_name.clone(),
            stored_name,
            original_name,
            size,
            uploaded_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

/// RFC 3339 in UTC with exactly three fractional digits on output,
/// any RFC 3339 offset or precision on input.
mod iso_millis {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_entry_json_shape() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        let entry = FileEntry::new(
            "1714557600000__report.pdf".to_string(),
            "report.pdf".to_string(),
            42,
            at,
        );

        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["id"], "1714557600000__report.pdf");
        assert_eq!(json["storedName"], "1714557600000__report.pdf");
        assert_eq!(json["originalName"], "report.pdf");
        assert_eq!(json["size"], 42);
        assert_eq!(json["uploadedAt"], "2024-05-01T10:00:00.000Z");
    }

    #[test]
    fn test_uploaded_at_accepts_offsets() {
        let raw = r#"{
            "id": "1__a.pdf",
            "storedName": "1__a.pdf",
            "originalName": "a.pdf",
            "size": 1,
            "uploadedAt": "2024-05-01T12:00:00+02:00"
        }"#;
        let entry: FileEntry = serde_json::from_str(raw).unwrap();
        assert_eq!(
            entry.uploaded_at,
            Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap()
        );
    }
}
