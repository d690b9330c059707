//! # Domain Types
//!
//! Identifiers, closed enumerations and rates shared by every module.
//!
//! ## Type Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │  AttendeeId     │   │  AttendeeType   │   │ RegistrationMode│       │
//! │  │  ItemId         │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  PackageId      │   │  PrimaryMember  │   │  Individual     │       │
//! │  │  RegistrationId │   │  SecondaryMember│   │  Lodge          │       │
//! │  │  (opaque)       │   │  Guest, Partner │   │  Delegation     │       │
//! │  └─────────────────┘   │  OfficialDelegate│  └─────────────────┘       │
//! │                        └─────────────────┘                              │
//! │  ┌─────────────────┐                                                    │
//! │  │    FeeRate      │                                                    │
//! │  │  bps (u32)      │                                                    │
//! │  │  175 = 1.75%    │                                                    │
//! │  └─────────────────┘                                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;
use uuid::Uuid;

use crate::error::{EngineError, ValidationError};

// =============================================================================
// Identifiers
// =============================================================================

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS,
        )]
        #[serde(transparent)]
        #[ts(export)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                $name(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                $name(id.to_string())
            }
        }
    };
}

string_id!(
    /// Opaque attendee id, stable for the registration's lifetime.
    AttendeeId
);
string_id!(
    /// Catalog id of a single-event ticket.
    ItemId
);
string_id!(
    /// Catalog id of a bundle of items.
    PackageId
);
string_id!(
    /// Id of one registration (one draft, one eventual payment).
    RegistrationId
);

impl AttendeeId {
    /// Generates a fresh UUID v4 attendee id.
    pub fn generate() -> Self {
        AttendeeId(Uuid::new_v4().to_string())
    }
}

impl RegistrationId {
    pub fn generate() -> Self {
        RegistrationId(Uuid::new_v4().to_string())
    }
}

// =============================================================================
// Attendee Type
// =============================================================================

/// The closed set of attendee types.
///
/// Older registration records used a zoo of labels ("mason", "ladypartner",
/// "guestpartner", ...). They collapse into these canonical variants through
/// serde aliases and [`FromStr`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS,
)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum AttendeeType {
    /// A member registering in their own right.
    #[serde(alias = "mason", alias = "member", alias = "lodge_member")]
    PrimaryMember,
    /// A further member in the same lodge or individual registration.
    #[serde(alias = "additional_mason", alias = "additional_member")]
    SecondaryMember,
    /// A non-member guest.
    #[serde(alias = "visitor", alias = "guest_attendee")]
    Guest,
    /// The partner of another attendee.
    #[serde(
        alias = "lady_partner",
        alias = "ladypartner",
        alias = "guest_partner",
        alias = "guestpartner",
        alias = "mason_partner"
    )]
    Partner,
    /// A member of an official delegation.
    #[serde(alias = "delegate", alias = "grand_officer")]
    OfficialDelegate,
}

impl AttendeeType {
    /// All canonical variants, in declaration order.
    pub const ALL: [AttendeeType; 5] = [
        AttendeeType::PrimaryMember,
        AttendeeType::SecondaryMember,
        AttendeeType::Guest,
        AttendeeType::Partner,
        AttendeeType::OfficialDelegate,
    ];

    /// Guests and partners do not count toward the lodge minimum.
    pub fn counts_toward_lodge_minimum(&self) -> bool {
        !matches!(self, AttendeeType::Guest | AttendeeType::Partner)
    }
}

impl fmt::Display for AttendeeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttendeeType::PrimaryMember => write!(f, "primary_member"),
            AttendeeType::SecondaryMember => write!(f, "secondary_member"),
            AttendeeType::Guest => write!(f, "guest"),
            AttendeeType::Partner => write!(f, "partner"),
            AttendeeType::OfficialDelegate => write!(f, "official_delegate"),
        }
    }
}

impl FromStr for AttendeeType {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "primary_member" | "primary" | "mason" | "member" | "lodge_member" => {
                Ok(AttendeeType::PrimaryMember)
            }
            "secondary_member" | "secondary" | "additional_mason" | "additional_member" => {
                Ok(AttendeeType::SecondaryMember)
            }
            "guest" | "visitor" | "guest_attendee" => Ok(AttendeeType::Guest),
            "partner" | "lady_partner" | "ladypartner" | "guest_partner" | "guestpartner"
            | "mason_partner" => Ok(AttendeeType::Partner),
            "official_delegate" | "delegate" | "grand_officer" => {
                Ok(AttendeeType::OfficialDelegate)
            }
            other => Err(ValidationError::InvalidFormat {
                field: "attendee type".to_string(),
                reason: format!("unknown attendee type '{}'", other),
            }
            .into()),
        }
    }
}

// =============================================================================
// Registration Mode
// =============================================================================

/// How a registration is being made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationMode {
    /// One member plus partner/guests.
    #[default]
    Individual,
    /// A lodge registering several members, optionally as a bulk block.
    Lodge,
    /// An official delegation, ordered by protocol rank.
    Delegation,
}

impl fmt::Display for RegistrationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistrationMode::Individual => write!(f, "individual"),
            RegistrationMode::Lodge => write!(f, "lodge"),
            RegistrationMode::Delegation => write!(f, "delegation"),
        }
    }
}

impl FromStr for RegistrationMode {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "individual" | "individuals" | "myself" => Ok(RegistrationMode::Individual),
            "lodge" | "lodges" => Ok(RegistrationMode::Lodge),
            "delegation" | "delegations" | "official" => Ok(RegistrationMode::Delegation),
            other => Err(ValidationError::InvalidFormat {
                field: "registration type".to_string(),
                reason: format!("unknown registration type '{}'", other),
            }
            .into()),
        }
    }
}

// =============================================================================
// Fee Rate
// =============================================================================

/// Percentage rate represented in basis points (bps).
///
/// 1 basis point = 0.01%, so 175 bps = 1.75%.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[serde(transparent)]
#[ts(export)]
pub struct FeeRate(u32);

impl FeeRate {
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        FeeRate(bps)
    }

    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn zero() -> Self {
        FeeRate(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
