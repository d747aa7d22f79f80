//! Code systems, registration statuses and event types

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Base URL every CRVS extension, identifier system and code system lives under.
pub const SPECIFICATION_URL: &str = "http://opencrvs.org/specs/";

pub const REG_STATUS_SYSTEM: &str = "http://opencrvs.org/specs/reg-status";
pub const EVENT_TYPE_SYSTEM: &str = "http://opencrvs.org/specs/types";
pub const DOC_SECTIONS_SYSTEM: &str = "http://opencrvs.org/doc-sections";
pub const COMPOSITION_IDENTIFIER_SYSTEM: &str = "urn:ietf:rfc:3986";
pub const CRVS_OFFICE_TYPE: &str = "CRVS_OFFICE";

/// Composition types raised by health-facility notifications rather than declarations.
pub const NOTIFICATION_TYPES: [&str; 2] = ["birth-notification", "death-notification"];

/// Vital event a registration is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    Birth,
    Death,
    Marriage,
}

impl EventType {
    /// Code stored on `Task.code` (`BIRTH`, `DEATH`, `MARRIAGE`)
    pub fn code(&self) -> &'static str {
        match self {
            EventType::Birth => "BIRTH",
            EventType::Death => "DEATH",
            EventType::Marriage => "MARRIAGE",
        }
    }

    /// Lowercase form used in identifier systems and URL paths
    pub fn slug(&self) -> &'static str {
        match self {
            EventType::Birth => "birth",
            EventType::Death => "death",
            EventType::Marriage => "marriage",
        }
    }

    /// Leading letter of every tracking id for this event
    pub fn tracking_prefix(&self) -> char {
        match self {
            EventType::Birth => 'B',
            EventType::Death => 'D',
            EventType::Marriage => 'M',
        }
    }

    /// Identifier system of the tracking id mirrored on the Task
    pub fn tracking_id_system(&self) -> String {
        format!("{SPECIFICATION_URL}id/{}-tracking-id", self.slug())
    }

    /// Identifier system of the registration number
    pub fn registration_number_system(&self) -> String {
        format!("{SPECIFICATION_URL}id/{}-registration-number", self.slug())
    }

    /// Derive the event from a Composition type code such as `birth-declaration`
    pub fn from_composition_type(code: &str) -> Result<Self> {
        let lower = code.to_ascii_lowercase();
        if lower.starts_with("birth") {
            Ok(EventType::Birth)
        } else if lower.starts_with("death") {
            Ok(EventType::Death)
        } else if lower.starts_with("marriage") {
            Ok(EventType::Marriage)
        } else {
            Err(Error::UnknownEventType(code.to_string()))
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for EventType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "BIRTH" => Ok(EventType::Birth),
            "DEATH" => Ok(EventType::Death),
            "MARRIAGE" => Ok(EventType::Marriage),
            _ => Err(Error::UnknownEventType(s.to_string())),
        }
    }
}

/// Business status of a registration, carried on `Task.businessStatus`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RegStatus {
    InProgress,
    Declared,
    Validated,
    Rejected,
    WaitingValidation,
    Registered,
    Certified,
    Issued,
    RequestedCorrection,
    Reinstated,
    Archived,
}

impl RegStatus {
    pub const ALL: [RegStatus; 11] = [
        RegStatus::InProgress,
        RegStatus::Declared,
        RegStatus::Validated,
        RegStatus::Rejected,
        RegStatus::WaitingValidation,
        RegStatus::Registered,
        RegStatus::Certified,
        RegStatus::Issued,
        RegStatus::RequestedCorrection,
        RegStatus::Reinstated,
        RegStatus::Archived,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RegStatus::InProgress => "IN_PROGRESS",
            RegStatus::Declared => "DECLARED",
            RegStatus::Validated => "VALIDATED",
            RegStatus::Rejected => "REJECTED",
            RegStatus::WaitingValidation => "WAITING_VALIDATION",
            RegStatus::Registered => "REGISTERED",
            RegStatus::Certified => "CERTIFIED",
            RegStatus::Issued => "ISSUED",
            RegStatus::RequestedCorrection => "REQUESTED_CORRECTION",
            RegStatus::Reinstated => "REINSTATED",
            RegStatus::Archived => "ARCHIVED",
        }
    }

    /// Statuses after which the Composition is no longer a draft
    pub fn is_submitted(&self) -> bool {
        !matches!(self, RegStatus::InProgress)
    }
}

impl fmt::Display for RegStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RegStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        RegStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| Error::UnknownStatus(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_type_from_composition_type_code() {
        assert_eq!(
            EventType::from_composition_type("birth-declaration").unwrap(),
            EventType::Birth
        );
        assert_eq!(
            EventType::from_composition_type("death-notification").unwrap(),
            EventType::Death
        );
        assert_eq!(
            EventType::from_composition_type("marriage-declaration").unwrap(),
            EventType::Marriage
        );
        assert!(EventType::from_composition_type("adoption").is_err());
    }

    #[test]
    fn tracking_id_system_uses_event_slug() {
        assert_eq!(
            EventType::Death.tracking_id_system(),
            "http://opencrvs.org/specs/id/death-tracking-id"
        );
    }

    #[test]
    fn reg_status_round_trips_through_wire_code() {
        for status in RegStatus::ALL {
            assert_eq!(status.as_str().parse::<RegStatus>().unwrap(), status);
            let json = serde_json::to_value(status).unwrap();
            assert_eq!(json, serde_json::json!(status.as_str()));
        }
        assert!("PENDING".parse::<RegStatus>().is_err());
    }
}
