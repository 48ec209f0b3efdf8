use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} value '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

/// Account role as persisted in the `users.role` column.
///
/// `Warden` is a legacy value still present in old databases. It carries no
/// permissions of its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Student,
    Warden,
    Department,
    SuperAdmin,
}

impl Role {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Student => "student",
            Self::Warden => "warden",
            Self::Department => "department",
            Self::SuperAdmin => "super_admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "student" => Ok(Self::Student),
            "warden" => Ok(Self::Warden),
            "department" => Ok(Self::Department),
            "super_admin" => Ok(Self::SuperAdmin),
            other => Err(UnknownVariant {
                kind: "role",
                value: other.to_string(),
            }),
        }
    }
}

/// Lifecycle state of a complaint.
///
/// ```text
/// pending ──> inprogress ──> resolved
///    │            │
///    └────────────┴──> rejected
/// ```
///
/// `Resolved` and `Rejected` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComplaintStatus {
    Pending,
    InProgress,
    Resolved,
    Rejected,
}

impl ComplaintStatus {
    pub const ALL: [ComplaintStatus; 4] = [
        Self::Pending,
        Self::InProgress,
        Self::Resolved,
        Self::Rejected,
    ];

    /// Every legal (from, to) pair. Anything not listed here is refused.
    pub const TRANSITIONS: [(ComplaintStatus, ComplaintStatus); 4] = [
        (Self::Pending, Self::InProgress),
        (Self::InProgress, Self::Resolved),
        (Self::Pending, Self::Rejected),
        (Self::InProgress, Self::Rejected),
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "inprogress",
            Self::Resolved => "resolved",
            Self::Rejected => "rejected",
        }
    }

    pub fn can_transition_to(self, next: ComplaintStatus) -> bool {
        Self::TRANSITIONS.contains(&(self, next))
    }

    pub fn is_terminal(self) -> bool {
        !Self::TRANSITIONS.iter().any(|(from, _)| *from == self)
    }
}

impl fmt::Display for ComplaintStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ComplaintStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownVariant {
                kind: "status",
                value: s.to_string(),
            })
    }
}

/// Who is making a request, after the session token has been verified.
///
/// A department account always belongs to a category; one whose category was
/// removed from under it becomes `UnassignedDepartment` instead of carrying an
/// empty reference around.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Principal {
    Student { user_id: Uuid },
    Warden { user_id: Uuid },
    Department { user_id: Uuid, category_id: Uuid },
    UnassignedDepartment { user_id: Uuid },
    SuperAdmin { user_id: Uuid },
}

impl Principal {
    pub fn new(user_id: Uuid, role: Role, category_id: Option<Uuid>) -> Self {
        match (role, category_id) {
            (Role::Student, _) => Self::Student { user_id },
            (Role::Warden, _) => Self::Warden { user_id },
            (Role::Department, Some(category_id)) => Self::Department {
                user_id,
                category_id,
            },
            (Role::Department, None) => Self::UnassignedDepartment { user_id },
            (Role::SuperAdmin, _) => Self::SuperAdmin { user_id },
        }
    }

    pub fn user_id(&self) -> Uuid {
        match *self {
            Self::Student { user_id }
            | Self::Warden { user_id }
            | Self::Department { user_id, .. }
            | Self::UnassignedDepartment { user_id }
            | Self::SuperAdmin { user_id } => user_id,
        }
    }

    pub fn role(&self) -> Role {
        match self {
            Self::Student { .. } => Role::Student,
            Self::Warden { .. } => Role::Warden,
            Self::Department { .. } | Self::UnassignedDepartment { .. } => Role::Department,
            Self::SuperAdmin { .. } => Role::SuperAdmin,
        }
    }

    pub fn category_id(&self) -> Option<Uuid> {
        match *self {
            Self::Department { category_id, .. } => Some(category_id),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_its_wire_name() {
        for status in ComplaintStatus::ALL {
            assert_eq!(status.as_str().parse::<ComplaintStatus>(), Ok(status));
        }
        assert!("in_progress".parse::<ComplaintStatus>().is_err());
        assert!("".parse::<ComplaintStatus>().is_err());
    }

    #[test]
    fn only_forward_transitions_are_legal() {
        use ComplaintStatus::*;

        assert!(Pending.can_transition_to(InProgress));
        assert!(InProgress.can_transition_to(Resolved));
        assert!(Pending.can_transition_to(Rejected));
        assert!(InProgress.can_transition_to(Rejected));

        assert!(!Resolved.can_transition_to(Pending));
        assert!(!Rejected.can_transition_to(Pending));
        assert!(!Pending.can_transition_to(Resolved));
        assert!(!InProgress.can_transition_to(Pending));
        for status in ComplaintStatus::ALL {
            assert!(!status.can_transition_to(status), "{status} -> {status}");
        }
    }

    #[test]
    fn terminal_states() {
        assert!(ComplaintStatus::Resolved.is_terminal());
        assert!(ComplaintStatus::Rejected.is_terminal());
        assert!(!ComplaintStatus::Pending.is_terminal());
        assert!(!ComplaintStatus::InProgress.is_terminal());
    }

    #[test]
    fn department_without_category_is_unassigned() {
        let id = Uuid::new_v4();
        let cat = Uuid::new_v4();

        assert_eq!(
            Principal::new(id, Role::Department, Some(cat)),
            Principal::Department { user_id: id, category_id: cat }
        );
        assert_eq!(
            Principal::new(id, Role::Department, None),
            Principal::UnassignedDepartment { user_id: id }
        );
        // Category is meaningless outside the department role.
        assert_eq!(
            Principal::new(id, Role::SuperAdmin, Some(cat)).category_id(),
            None
        );
    }

    #[test]
    fn role_serializes_snake_case() {
        assert_eq!(serde_json::to_string(&Role::SuperAdmin).unwrap(), "\"super_admin\"");
        assert_eq!("warden".parse::<Role>(), Ok(Role::Warden));
        assert!("admin".parse::<Role>().is_err());
    }
}
