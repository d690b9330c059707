//! # Attendee Graph
//!
//! The ordered collection of attendees in one registration and the
//! relationships between them.
//!
//! ## Relationships
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   ┌──────────────────┐  partner ──►   ┌──────────────────┐             │
//! │   │ Bro. Smith       │                │ Mrs Smith        │             │
//! │   │ primary_member   │  ◄── partner_of│ partner          │             │
//! │   │ is_primary       │                │                  │             │
//! │   └──────────────────┘                └──────────────────┘             │
//! │                                                                         │
//! │   Both sides are plain ids into the arena, never owning pointers.      │
//! │   Mutations keep them symmetric; a partner never has a partner.        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Display Order
//! ```text
//!   primary, primary's partner,
//!   then every other non-partner attendee (insertion order, or protocol
//!   rank first in delegation mode) each followed by its own partner
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;
use ts_rs::TS;

use crate::error::{EngineError, EngineResult};
use crate::types::{AttendeeId, AttendeeType, RegistrationMode};
use crate::validation;

// =============================================================================
// Attendee
// =============================================================================

/// One person attending the function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Attendee {
    pub id: AttendeeId,
    pub attendee_type: AttendeeType,
    pub is_primary: bool,
    /// The attendee this one is the partner of.
    #[serde(default)]
    pub partner_of: Option<AttendeeId>,
    /// This attendee's partner.
    #[serde(default)]
    pub partner: Option<AttendeeId>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    /// Rank or post-nominal shown on name badges.
    #[serde(default)]
    pub rank: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub dietary_requirements: Option<String>,
    #[serde(default)]
    pub special_needs: Option<String>,
    /// How a partner relates to the attendee they accompany ("Wife", ...).
    #[serde(default)]
    pub relationship: Option<String>,
    /// Delegation seating precedence; lower sorts earlier.
    #[serde(default)]
    pub protocol_rank: Option<u32>,
    /// Insertion sequence, the tie-breaker for every ordering.
    pub position: u64,
}

impl Attendee {
    fn new(id: AttendeeId, attendee_type: AttendeeType, position: u64) -> Self {
        Attendee {
            id,
            attendee_type,
            is_primary: false,
            partner_of: None,
            partner: None,
            title: String::new(),
            first_name: String::new(),
            last_name: String::new(),
            rank: None,
            email: None,
            phone: None,
            dietary_requirements: None,
            special_needs: None,
            relationship: None,
            protocol_rank: None,
            position,
        }
    }

    /// True if this attendee is somebody's partner.
    pub fn is_partner(&self) -> bool {
        self.partner_of.is_some()
    }

    pub fn full_name(&self) -> String {
        [self.title.as_str(), self.first_name.as_str(), self.last_name.as_str()]
            .iter()
            .filter(|s| !s.is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join(" ")
    }
}

// =============================================================================
// Attendee Patch
// =============================================================================

/// Partial update for an attendee. `None` leaves a field unchanged.
///
/// Relationship fields are not patchable; use [`AttendeeGraph::add_partner`]
/// and [`AttendeeGraph::remove_attendee`] so both sides stay in step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct AttendeePatch {
    pub attendee_type: Option<AttendeeType>,
    pub title: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub rank: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub dietary_requirements: Option<String>,
    pub special_needs: Option<String>,
    pub relationship: Option<String>,
    pub protocol_rank: Option<u32>,
}

impl AttendeePatch {
    fn validate(&self) -> EngineResult<()> {
        for (field, value) in [
            ("title", &self.title),
            ("first name", &self.first_name),
            ("last name", &self.last_name),
            ("rank", &self.rank),
            ("phone", &self.phone),
            ("relationship", &self.relationship),
        ] {
            if let Some(value) = value {
                validation::validate_short_text(field, value)?;
            }
        }
        for (field, value) in [
            ("dietary requirements", &self.dietary_requirements),
            ("special needs", &self.special_needs),
        ] {
            if let Some(value) = value {
                validation::validate_notes(field, value)?;
            }
        }
        if let Some(email) = &self.email {
            if !email.trim().is_empty() {
                validation::validate_email(email)?;
            }
        }
        Ok(())
    }

    fn apply(self, attendee: &mut Attendee) {
        fn optional(value: String) -> Option<String> {
            let trimmed = value.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }

        if let Some(ty) = self.attendee_type {
            attendee.attendee_type = ty;
        }
        if let Some(title) = self.title {
            attendee.title = title.trim().to_string();
        }
        if let Some(first) = self.first_name {
            attendee.first_name = first.trim().to_string();
        }
        if let Some(last) = self.last_name {
            attendee.last_name = last.trim().to_string();
        }
        if let Some(rank) = self.rank {
            attendee.rank = optional(rank);
        }
        if let Some(email) = self.email {
            attendee.email = optional(email);
        }
        if let Some(phone) = self.phone {
            attendee.phone = optional(phone);
        }
        if let Some(dietary) = self.dietary_requirements {
            attendee.dietary_requirements = optional(dietary);
        }
        if let Some(needs) = self.special_needs {
            attendee.special_needs = optional(needs);
        }
        if let Some(relationship) = self.relationship {
            attendee.relationship = optional(relationship);
        }
        if let Some(rank) = self.protocol_rank {
            attendee.protocol_rank = Some(rank);
        }
    }
}

// =============================================================================
// Attendee Graph
// =============================================================================

/// Id-indexed arena of attendees.
///
/// ## Invariants
/// - At most one attendee has `is_primary` set
/// - `a.partner == Some(b)` if and only if `b.partner_of == Some(a)`
/// - An attendee with `partner_of` set never has `partner` set
/// - `position` values are unique and strictly increase with insertion
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Attendee>", into = "Vec<Attendee>")]
pub struct AttendeeGraph {
    attendees: HashMap<AttendeeId, Attendee>,
    next_position: u64,
}

impl AttendeeGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.attendees.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attendees.is_empty()
    }

    pub fn get(&self, id: &AttendeeId) -> Option<&Attendee> {
        self.attendees.get(id)
    }

    pub fn require(&self, id: &AttendeeId) -> EngineResult<&Attendee> {
        self.attendees
            .get(id)
            .ok_or_else(|| EngineError::attendee_not_found(id.as_str()))
    }

    pub fn contains(&self, id: &AttendeeId) -> bool {
        self.attendees.contains_key(id)
    }

    pub fn primary(&self) -> Option<&Attendee> {
        self.attendees.values().find(|a| a.is_primary)
    }

    /// Attendees in insertion order.
    pub fn in_insertion_order(&self) -> Vec<&Attendee> {
        let mut all: Vec<&Attendee> = self.attendees.values().collect();
        all.sort_by_key(|a| a.position);
        all
    }

    /// Creates a new attendee with empty fields.
    ///
    /// The first attendee of an empty graph becomes the primary.
    pub fn add_attendee(&mut self, attendee_type: AttendeeType) -> AttendeeId {
        let id = AttendeeId::generate();
        let mut attendee = Attendee::new(id.clone(), attendee_type, self.next_position);
        attendee.is_primary = self.attendees.is_empty();
        self.next_position += 1;

        debug!(
            attendee_id = %id,
            attendee_type = %attendee_type,
            is_primary = attendee.is_primary,
            "Attendee added"
        );
        self.attendees.insert(id.clone(), attendee);
        id
    }

    /// Creates a partner for `owner` and links both sides.
    pub fn add_partner(
        &mut self,
        owner: &AttendeeId,
        attendee_type: AttendeeType,
    ) -> EngineResult<AttendeeId> {
        let owner_attendee = self.require(owner)?;
        if owner_attendee.is_partner() {
            return Err(EngineError::invariant(format!(
                "attendee {} is a partner and cannot have a partner of their own",
                owner
            )));
        }
        if let Some(existing) = &owner_attendee.partner {
            return Err(EngineError::invariant(format!(
                "attendee {} already has partner {}",
                owner, existing
            )));
        }

        let id = AttendeeId::generate();
        let mut partner = Attendee::new(id.clone(), attendee_type, self.next_position);
        partner.partner_of = Some(owner.clone());
        self.next_position += 1;
        self.attendees.insert(id.clone(), partner);

        if let Some(owner_attendee) = self.attendees.get_mut(owner) {
            owner_attendee.partner = Some(id.clone());
        }

        debug!(attendee_id = %id, partner_of = %owner, "Partner added");
        Ok(id)
    }

    /// Merges `patch` into the attendee. Nothing changes if validation fails.
    pub fn update_attendee(&mut self, id: &AttendeeId, patch: AttendeePatch) -> EngineResult<()> {
        patch.validate()?;
        let attendee = self
            .attendees
            .get_mut(id)
            .ok_or_else(|| EngineError::attendee_not_found(id.as_str()))?;
        patch.apply(attendee);
        debug!(attendee_id = %id, "Attendee updated");
        Ok(())
    }

    /// Removes an attendee and returns every id that left the graph.
    ///
    /// ## Rules
    /// - Removing an attendee who has a partner removes the partner too
    /// - Removing a partner clears the owner's `partner` reference
    /// - The primary can only go when nobody but their own partner remains
    pub fn remove_attendee(&mut self, id: &AttendeeId) -> EngineResult<Vec<AttendeeId>> {
        let attendee = self.require(id)?;

        if attendee.is_primary {
            let own_partner = usize::from(attendee.partner.is_some());
            let others = self.attendees.len() - 1 - own_partner;
            if others > 0 {
                return Err(EngineError::invariant(format!(
                    "the primary attendee cannot be removed while {} other attendee(s) remain",
                    others
                )));
            }
        }

        let partner = attendee.partner.clone();
        let owner = attendee.partner_of.clone();
        let mut removed = vec![id.clone()];

        self.attendees.remove(id);
        if let Some(partner_id) = partner {
            self.attendees.remove(&partner_id);
            removed.push(partner_id);
        }
        if let Some(owner_id) = owner {
            if let Some(owner_attendee) = self.attendees.get_mut(&owner_id) {
                owner_attendee.partner = None;
            }
        }

        debug!(attendee_id = %id, removed = removed.len(), "Attendee removed");
        Ok(removed)
    }

    /// Full graph clear: the only way to remove a primary with others present.
    pub fn clear(&mut self) {
        self.attendees.clear();
        self.next_position = 0;
    }

    /// Attendees in display order.
    ///
    /// Deterministic for a given state: every tie is broken by insertion
    /// position.
    pub fn order_for_display(&self, mode: RegistrationMode) -> Vec<&Attendee> {
        let mut heads: Vec<&Attendee> = self
            .attendees
            .values()
            .filter(|a| !a.is_primary && !a.is_partner())
            .collect();

        if mode == RegistrationMode::Delegation {
            heads.sort_by_key(|a| (a.protocol_rank.is_none(), a.protocol_rank, a.position));
        } else {
            heads.sort_by_key(|a| a.position);
        }

        let mut ordered = Vec::with_capacity(self.attendees.len());
        let primary = self.primary().filter(|p| !p.is_partner());
        for head in primary.into_iter().chain(heads) {
            ordered.push(head);
            if let Some(partner) = head.partner.as_ref().and_then(|p| self.attendees.get(p)) {
                ordered.push(partner);
            }
        }

        // A dangling partner cannot appear through a valid mutation sequence,
        // but a restored snapshot is still never allowed to hide an attendee.
        if ordered.len() < self.attendees.len() {
            let mut rest: Vec<&Attendee> = self
                .attendees
                .values()
                .filter(|a| !ordered.iter().any(|o| o.id == a.id))
                .collect();
            rest.sort_by_key(|a| a.position);
            ordered.extend(rest);
        }

        ordered
    }

    /// Non-partner attendees whose type counts toward the lodge minimum.
    pub fn lodge_member_count(&self) -> usize {
        self.attendees
            .values()
            .filter(|a| !a.is_partner() && a.attendee_type.counts_toward_lodge_minimum())
            .count()
    }

    /// Checks the relationship invariants.
    pub fn validate_links(&self) -> EngineResult<()> {
        let primaries = self.attendees.values().filter(|a| a.is_primary).count();
        if primaries > 1 {
            return Err(EngineError::invariant(format!(
                "{} attendees are marked primary",
                primaries
            )));
        }

        for attendee in self.attendees.values() {
            if let Some(partner_id) = &attendee.partner {
                if attendee.is_partner() {
                    return Err(EngineError::invariant(format!(
                        "partner {} cannot have a partner of their own",
                        attendee.id
                    )));
                }
                let back = self.attendees.get(partner_id).and_then(|p| p.partner_of.as_ref());
                if back != Some(&attendee.id) {
                    return Err(EngineError::invariant(format!(
                        "partner reference from {} to {} is not reciprocated",
                        attendee.id, partner_id
                    )));
                }
            }
            if let Some(owner_id) = &attendee.partner_of {
                let forward = self.attendees.get(owner_id).and_then(|o| o.partner.as_ref());
                if forward != Some(&attendee.id) {
                    return Err(EngineError::invariant(format!(
                        "attendee {} claims to partner {} but is not referenced back",
                        attendee.id, owner_id
                    )));
                }
            }
        }
        Ok(())
    }

    /// Checks that the graph may leave the attendee-details step.
    pub fn validate_for_progression(
        &self,
        mode: RegistrationMode,
        lodge_minimum: usize,
    ) -> EngineResult<()> {
        if self.attendees.is_empty() {
            return Err(EngineError::invariant("at least one attendee is required"));
        }
        if self.primary().is_none() {
            return Err(EngineError::invariant("a primary attendee is required"));
        }
        self.validate_links()?;

        if mode == RegistrationMode::Lodge {
            let members = self.lodge_member_count();
            if members < lodge_minimum {
                return Err(EngineError::invariant(format!(
                    "a lodge registration needs at least {} members, found {}",
                    lodge_minimum, members
                )));
            }
        }
        Ok(())
    }
}

impl From<AttendeeGraph> for Vec<Attendee> {
    fn from(graph: AttendeeGraph) -> Self {
        let mut all: Vec<Attendee> = graph.attendees.into_values().collect();
        all.sort_by_key(|a| a.position);
        all
    }
}

impl TryFrom<Vec<Attendee>> for AttendeeGraph {
    type Error = EngineError;

    fn try_from(attendees: Vec<Attendee>) -> Result<Self, Self::Error> {
        let next_position = attendees.iter().map(|a| a.position + 1).max().unwrap_or(0);
        let mut map = HashMap::with_capacity(attendees.len());
        for attendee in attendees {
            let id = attendee.id.clone();
            if map.insert(id.clone(), attendee).is_some() {
                return Err(EngineError::invariant(format!("duplicate attendee id {}", id)));
            }
        }
        let graph = AttendeeGraph {
            attendees: map,
            next_position,
        };
        graph.validate_links()?;
        Ok(graph)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
