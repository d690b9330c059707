//! # Wizard Steps
//!
//! ```text
//!  TypeSelection ──► AttendeeDetails ──► TicketSelection ──► OrderReview
//!                          ◄──                 ◄──               ◄──
//!                                                                  │
//!                                    Confirmation ◄── Payment ◄────┘
//!                                     (terminal)
//! ```
//!
//! Moves are linear. `back` only ever goes to the immediately preceding
//! step. The guards that decide whether a forward move is allowed live on
//! [`crate::registration::Registration`]; this module only knows the shape.

use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::error::{EngineError, EngineResult};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Hash, Serialize, Deserialize, TS,
)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum WizardStep {
    #[default]
    TypeSelection,
    AttendeeDetails,
    TicketSelection,
    OrderReview,
    Payment,
    Confirmation,
}

impl WizardStep {
    pub const ALL: [WizardStep; 6] = [
        WizardStep::TypeSelection,
        WizardStep::AttendeeDetails,
        WizardStep::TicketSelection,
        WizardStep::OrderReview,
        WizardStep::Payment,
        WizardStep::Confirmation,
    ];

    pub fn next(self) -> Option<WizardStep> {
        match self {
            WizardStep::TypeSelection => Some(WizardStep::AttendeeDetails),
            WizardStep::AttendeeDetails => Some(WizardStep::TicketSelection),
            WizardStep::TicketSelection => Some(WizardStep::OrderReview),
            WizardStep::OrderReview => Some(WizardStep::Payment),
            WizardStep::Payment => Some(WizardStep::Confirmation),
            WizardStep::Confirmation => None,
        }
    }

    /// The step `back` returns to. None from the first and terminal steps.
    pub fn previous(self) -> Option<WizardStep> {
        match self {
            WizardStep::TypeSelection | WizardStep::Confirmation => None,
            WizardStep::AttendeeDetails => Some(WizardStep::TypeSelection),
            WizardStep::TicketSelection => Some(WizardStep::AttendeeDetails),
            WizardStep::OrderReview => Some(WizardStep::TicketSelection),
            WizardStep::Payment => Some(WizardStep::OrderReview),
        }
    }

    pub fn is_terminal(self) -> bool {
        self == WizardStep::Confirmation
    }

    /// Attendee and selection edits are only accepted before payment starts.
    pub fn allows_edits(self) -> bool {
        matches!(
            self,
            WizardStep::AttendeeDetails | WizardStep::TicketSelection | WizardStep::OrderReview
        )
    }

    pub(crate) fn forward(self) -> EngineResult<WizardStep> {
        self.next()
            .ok_or_else(|| transition_error(self, "beyond confirmation"))
    }

    pub(crate) fn backward(self) -> EngineResult<WizardStep> {
        self.previous()
            .ok_or_else(|| transition_error(self, "the previous step"))
    }
}

fn transition_error(from: WizardStep, to: &str) -> EngineError {
    EngineError::InvalidTransition {
        from: from.to_string(),
        to: to.to_string(),
    }
}

impl fmt::Display for WizardStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WizardStep::TypeSelection => "type_selection",
            WizardStep::AttendeeDetails => "attendee_details",
            WizardStep::TicketSelection => "ticket_selection",
            WizardStep::OrderReview => "order_review",
            WizardStep::Payment => "payment",
            WizardStep::Confirmation => "confirmation",
        };
        write!(f, "{}", name)
    }
}
