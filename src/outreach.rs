//! Recipient selection for assignment messages
//!
//! Decides who gets an "updated assignments" message. The message body and
//! the sending client live elsewhere; this only applies the rules:
//!
//! - no email → skipped
//! - no assigned families → skipped (nothing to tell them)
//! - no ministers or no companions → sent anyway, with a warning

use serde::Serialize;
use tracing::warn;

use crate::types::{AssignmentView, PersonId};

/// Subject line for ministers receiving their assignments
pub const MINISTER_SUBJECT: &str = "Updated Assignments";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Recipient {
    pub id: PersonId,
    pub email: String,
    pub subject: String,
    pub view: AssignmentView,
}

pub fn select_recipients(views: &[AssignmentView]) -> Vec<Recipient> {
    views
        .iter()
        .filter_map(|view| {
            let member = &view.member;

            if member.email.is_empty() {
                warn!(id = %member.id, name = %member.nickname, "No email");
                return None;
            }

            if view.assigned_families.is_empty() {
                warn!(id = %member.id, name = %member.nickname, "No assignment");
                return None;
            }

            if view.assigned_ministers.is_empty() {
                warn!(id = %member.id, name = %member.nickname, "No ministers");
            }

            if view.companions.is_empty() {
                warn!(id = %member.id, name = %member.nickname, "No companions");
            }

            Some(Recipient {
                id: member.id.clone(),
                email: member.email.clone(),
                subject: MINISTER_SUBJECT.to_string(),
                view: view.clone(),
            })
        })
        .collect()
}
