// Copyright 2025
// SPDX-License-Identifier: Apache-2.0
//
// Message records produced by the redaction step

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use super::config::PhiTag;
use super::error::Result;
use super::redactor::PhiRedactor;

pub const REDACTION_ACTOR: &str = "redaction-service";
pub const REDACT_ACTION: &str = "redact";

/// Structured value extracted from a message by an upstream collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    #[serde(rename = "type")]
    pub entity_type: String,
    #[serde(default, deserialize_with = "value_as_string")]
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

impl Entity {
    pub fn new(entity_type: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            value: value.into(),
            confidence: None,
        }
    }
}

/// Accept any JSON value for an entity value: null becomes an empty string,
/// scalars their text form, and arrays or objects their JSON text.
fn value_as_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s,
        serde_json::Value::Bool(b) => b.to_string(),
        serde_json::Value::Number(n) => n.to_string(),
        other => other.to_string(),
    })
}

/// One append-only audit trail entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub event_id: String,
    pub actor: String,
    pub action: String,
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl AuditEvent {
    /// The event recorded when a message had PHI removed
    pub fn redaction(at: DateTime<Utc>) -> Self {
        Self {
            event_id: Uuid::new_v4().to_string(),
            actor: REDACTION_ACTOR.to_string(),
            action: REDACT_ACTION.to_string(),
            timestamp: format_utc(at),
            reason: None,
            details: None,
        }
    }
}

/// Caller-supplied metadata accompanying a raw message
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MessageMetadata {
    pub session_id: Option<String>,
    pub message_id: Option<String>,
    pub timestamp: Option<String>,
    pub user_role: Option<String>,
    pub channel: Option<String>,
    pub language: Option<String>,
    pub entities: Vec<Entity>,
    pub intent: Option<String>,
    pub urgency: Option<String>,
    pub confidence: Option<f64>,
    pub consent_given: Option<bool>,
    pub retention_policy: Option<String>,
}

/// A chat message after redaction, ready for schema validation and storage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub session_id: String,
    pub message_id: String,
    pub timestamp: String,
    pub user_role: String,
    pub channel: String,
    pub raw_text: String,
    pub clean_text: String,
    pub language: String,
    pub phi_flags: Vec<PhiTag>,
    pub audit_trail: Vec<AuditEvent>,
    pub intent: Option<String>,
    pub entities: Vec<Entity>,
    pub urgency: Option<String>,
    pub confidence: Option<f64>,
    pub consent_given: bool,
    pub retention_policy: String,
}

/// `%Y-%m-%dT%H:%M:%SZ`
pub fn format_utc(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Coerce a caller timestamp to ISO-8601 UTC with second precision.
///
/// Accepts RFC 3339 and a few common naive layouts (read as UTC); anything
/// else falls back to `now`.
pub fn to_iso_utc(ts: Option<&str>, now: DateTime<Utc>) -> String {
    let Some(ts) = ts.map(str::trim).filter(|s| !s.is_empty()) else {
        return format_utc(now);
    };
    if let Ok(parsed) = DateTime::parse_from_rfc3339(ts) {
        return format_utc(parsed.with_timezone(&Utc));
    }
    for layout in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S", "%d/%m/%Y %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(ts, layout) {
            return format_utc(naive.and_utc());
        }
    }
    if let Some(midnight) = NaiveDate::parse_from_str(ts, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
    {
        return format_utc(midnight.and_utc());
    }
    format_utc(now)
}

impl PhiRedactor {
    /// Redact a raw message into a record, stamping events with the current time.
    pub fn process_message(&self, raw: &str, metadata: &MessageMetadata) -> Result<MessageRecord> {
        self.process_message_at(raw, metadata, Utc::now())
    }

    /// Redact a raw message into a record.
    ///
    /// `raw_text` is kept verbatim; `clean_text` is the normalized redacted
    /// text. Entity flags are folded into `phi_flags`, and a redaction audit
    /// event is appended only when `phi_flags` is non-empty.
    pub fn process_message_at(
        &self,
        raw: &str,
        metadata: &MessageMetadata,
        now: DateTime<Utc>,
    ) -> Result<MessageRecord> {
        let redaction = self.redact(raw)?;
        let clean_text = self.normalize(&redaction.text);
        let (entities, entity_flags) = self.redact_entities(&metadata.entities)?;

        let phi_flags: Vec<PhiTag> = redaction
            .flags
            .into_iter()
            .chain(entity_flags)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let mut audit_trail = Vec::new();
        if !phi_flags.is_empty() {
            audit_trail.push(AuditEvent::redaction(now));
        }

        let or_uuid = |id: &Option<String>| {
            id.clone()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| Uuid::new_v4().to_string())
        };
        let or_default = |value: &Option<String>, default: &str| {
            value
                .clone()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        Ok(MessageRecord {
            session_id: or_uuid(&metadata.session_id),
            message_id: or_uuid(&metadata.message_id),
            timestamp: to_iso_utc(metadata.timestamp.as_deref(), now),
            user_role: or_default(&metadata.user_role, "user"),
            channel: or_default(&metadata.channel, "web"),
            raw_text: raw.to_string(),
            clean_text,
            language: or_default(&metadata.language, "en"),
            phi_flags,
            audit_trail,
            intent: metadata.intent.clone(),
            entities,
            urgency: metadata.urgency.clone(),
            confidence: metadata.confidence,
            consent_given: metadata.consent_given.unwrap_or(false),
            retention_policy: or_default(&metadata.retention_policy, "dev-30d"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap()
    }

    #[test]
    fn test_to_iso_utc_layouts() {
        let now = fixed_now();
        assert_eq!(to_iso_utc(None, now), "2024-03-01T12:30:00Z");
        assert_eq!(to_iso_utc(Some(""), now), "2024-03-01T12:30:00Z");
        assert_eq!(
            to_iso_utc(Some("2023-07-04T10:00:00+02:00"), now),
            "2023-07-04T08:00:00Z"
        );
        assert_eq!(to_iso_utc(Some("2023-07-04T10:00:00Z"), now), "2023-07-04T10:00:00Z");
        assert_eq!(
            to_iso_utc(Some("2023-07-04T10:00:00.123456"), now),
            "2023-07-04T10:00:00Z"
        );
        assert_eq!(to_iso_utc(Some("2023-07-04 10:00:00"), now), "2023-07-04T10:00:00Z");
        assert_eq!(to_iso_utc(Some("2023-07-04"), now), "2023-07-04T00:00:00Z");
        assert_eq!(to_iso_utc(Some("04/07/2023 10:00:00"), now), "2023-07-04T10:00:00Z");
        assert_eq!(to_iso_utc(Some("not a date"), now), "2024-03-01T12:30:00Z");
    }

    #[test]
    fn test_process_message_with_phi() {
        let redactor = PhiRedactor::with_defaults().unwrap();
        let metadata = MessageMetadata {
            session_id: Some("s-1".to_string()),
            entities: vec![Entity::new("id", "MRN 884201"), Entity::new("note", "")],
            ..Default::default()
        };
        let raw = "  Call me at 555-0101 or email test1@example.com   ";
        let record = redactor.process_message_at(raw, &metadata, fixed_now()).unwrap();

        assert_eq!(record.raw_text, raw);
        assert_eq!(
            record.clean_text,
            "Call me at [REDACTED_PHONE] or email [REDACTED_EMAIL]"
        );
        assert_eq!(
            record.phi_flags,
            vec![PhiTag::Email, PhiTag::MedicalRecord, PhiTag::Phone]
        );
        assert_eq!(record.entities[0].value, "[REDACTED_ID]");
        assert_eq!(record.entities[1].value, "");
        assert_eq!(record.session_id, "s-1");
        assert!(Uuid::parse_str(&record.message_id).is_ok());
        assert_eq!(record.timestamp, "2024-03-01T12:30:00Z");
        assert_eq!(record.user_role, "user");
        assert_eq!(record.channel, "web");
        assert_eq!(record.language, "en");
        assert_eq!(record.retention_policy, "dev-30d");
        assert!(!record.consent_given);

        assert_eq!(record.audit_trail.len(), 1);
        let event = &record.audit_trail[0];
        assert_eq!(event.actor, REDACTION_ACTOR);
        assert_eq!(event.action, REDACT_ACTION);
        assert_eq!(event.timestamp, "2024-03-01T12:30:00Z");
        assert!(Uuid::parse_str(&event.event_id).is_ok());
    }

    #[test]
    fn test_process_message_without_phi_has_no_audit_event() {
        let redactor = PhiRedactor::with_defaults().unwrap();
        let record = redactor
            .process_message_at("Follow-up in 2 weeks", &MessageMetadata::default(), fixed_now())
            .unwrap();
        assert!(record.phi_flags.is_empty());
        assert!(record.audit_trail.is_empty());
        assert_eq!(record.clean_text, "Follow-up in 2 weeks");
    }

    #[test]
    fn test_record_serializes_wire_names() {
        let redactor = PhiRedactor::with_defaults().unwrap();
        let record = redactor
            .process_message_at("My SSN is 123-45-6789", &MessageMetadata::default(), fixed_now())
            .unwrap();
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["phi_flags"], serde_json::json!(["SSN"]));
        assert_eq!(json["audit_trail"][0]["actor"], "redaction-service");
        assert!(json["audit_trail"][0].get("reason").is_none());
    }

    #[test]
    fn test_metadata_deserializes_with_defaults() {
        let metadata: MessageMetadata = serde_json::from_str(
            r#"{"channel": "mobile", "entities": [{"type": "note"}], "consent_given": true}"#,
        )
        .unwrap();
        assert_eq!(metadata.channel.as_deref(), Some("mobile"));
        assert_eq!(metadata.entities[0].value, "");
        assert_eq!(metadata.consent_given, Some(true));
    }

    #[test]
    fn test_entity_values_coerced_from_non_strings() {
        let metadata: MessageMetadata = serde_json::from_str(
            r#"{"entities": [
                {"type": "note", "value": null},
                {"type": "phone", "value": 5550101234},
                {"type": "flag", "value": true}
            ]}"#,
        )
        .unwrap();
        let values: Vec<_> = metadata.entities.iter().map(|e| e.value.as_str()).collect();
        assert_eq!(values, vec!["", "5550101234", "true"]);

        let redactor = PhiRedactor::with_defaults().unwrap();
        let record = redactor.process_message_at("hello", &metadata, fixed_now()).unwrap();
        assert_eq!(record.entities[0].value, "");
        assert_eq!(record.entities[1].value, "[REDACTED_PHONE]");
        assert_eq!(record.entities[2].value, "true");
        assert_eq!(record.phi_flags, vec![PhiTag::Phone]);
    }
}
