//! Call target and disposition types.

use once_cell::sync::Lazy;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};

/// Characters operators commonly type as phone number separators.
static SEPARATORS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\s\-\.\(\)/]").unwrap());

/// A dialable number: optional leading `+`, then 3 to 15 digits (E.164 upper bound).
static DIALABLE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\+?[0-9]{3,15}$").unwrap());

/// Normalize a raw phone number into a dialable string.
///
/// Returns `None` when nothing dialable remains after stripping separators.
pub fn normalize_phone(raw: &str) -> Option<String> {
    let stripped = SEPARATORS.replace_all(raw.trim(), "");
    if DIALABLE.is_match(&stripped) {
        Some(stripped.into_owned())
    } else {
        None
    }
}

/// Operator-assigned outcome category for a call attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    NoAnswer,
    Voicemail,
    Callback,
    DoNotCall,
    NotInterested,
    Qualified,
}

impl Disposition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Disposition::NoAnswer => "no_answer",
            Disposition::Voicemail => "voicemail",
            Disposition::Callback => "callback",
            Disposition::DoNotCall => "do_not_call",
            Disposition::NotInterested => "not_interested",
            Disposition::Qualified => "qualified",
        }
    }

    /// Parse from the snake_case wire name.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "no_answer" => Some(Disposition::NoAnswer),
            "voicemail" => Some(Disposition::Voicemail),
            "callback" => Some(Disposition::Callback),
            "do_not_call" => Some(Disposition::DoNotCall),
            "not_interested" => Some(Disposition::NotInterested),
            "qualified" => Some(Disposition::Qualified),
            _ => None,
        }
    }

    /// Qualified leads hand off to a workflow outside the dialer.
    pub fn requires_handoff(&self) -> bool {
        matches!(self, Disposition::Qualified)
    }
}

impl std::fmt::Display for Disposition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One dialable entity.
///
/// `id` and `phone` are identity; `display_name` and `current_status` may be
/// refreshed in place while the target sits in a queue snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallTarget {
    pub id: String,
    pub phone: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_status: Option<Disposition>,
}

impl CallTarget {
    pub fn new(id: impl Into<String>, phone: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            phone: phone.into(),
            display_name: display_name.into(),
            current_status: None,
        }
    }

    pub fn with_status(mut self, status: Disposition) -> Self {
        self.current_status = Some(status);
        self
    }

    /// The number handed to the telephony line, if this target has one.
    pub fn dialable_number(&self) -> Option<String> {
        normalize_phone(&self.phone)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_phone_strips_separators() {
        assert_eq!(normalize_phone("(555) 123-4567"), Some("5551234567".to_string()));
        assert_eq!(normalize_phone("+44 20 7946.0018"), Some("+442079460018".to_string()));
    }

    #[test]
    fn test_normalize_phone_rejects_garbage() {
        assert_eq!(normalize_phone(""), None);
        assert_eq!(normalize_phone("   "), None);
        assert_eq!(normalize_phone("call me"), None);
        assert_eq!(normalize_phone("12"), None);
        assert_eq!(normalize_phone("555-CALL-NOW"), None);
        assert_eq!(normalize_phone("++15551234"), None);
    }

    #[test]
    fn test_disposition_round_trip_names() {
        for d in [
            Disposition::NoAnswer,
            Disposition::Voicemail,
            Disposition::Callback,
            Disposition::DoNotCall,
            Disposition::NotInterested,
            Disposition::Qualified,
        ] {
            assert_eq!(Disposition::parse(d.as_str()), Some(d));
            let json = serde_json::to_string(&d).unwrap();
            assert_eq!(json, format!("\"{}\"", d.as_str()));
        }
        assert_eq!(Disposition::parse("sold"), None);
    }

    #[test]
    fn test_only_qualified_requires_handoff() {
        assert!(Disposition::Qualified.requires_handoff());
        assert!(!Disposition::DoNotCall.requires_handoff());
        assert!(!Disposition::Callback.requires_handoff());
    }

    #[test]
    fn test_target_deserialize_minimal() {
        let target: CallTarget =
            serde_json::from_str(r#"{"id": "t-1", "phone": "555 0100"}"#).unwrap();
        assert_eq!(target.id, "t-1");
        assert_eq!(target.display_name, "");
        assert_eq!(target.current_status, None);
        assert_eq!(target.dialable_number(), Some("5550100".to_string()));
    }
}
