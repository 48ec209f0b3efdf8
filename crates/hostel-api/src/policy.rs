//! Who may do what.
//!
//! `authorize` is a pure function over the caller and the action. Every
//! combination ends in either an `Access` or a `Denial`; there is no
//! fall-through arm.

use uuid::Uuid;

use hostel_types::models::Principal;

use crate::error::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    SubmitComplaint,
    TrackComplaint,
    ListComplaints,
    /// Carries the category of the complaint being read.
    ReadComplaint(Uuid),
    /// Carries the category of the complaint being updated.
    UpdateComplaint(Uuid),
    ListDepartments,
    ChangePassword,
}

/// What an allowed caller gets to see.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Unrestricted,
    Category(Uuid),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denial {
    NotAuthenticated,
    WrongCategory,
    RoleForbidden,
}

pub fn authorize(caller: Option<&Principal>, action: Action) -> Result<Access, Denial> {
    use Action::*;

    match (caller, action) {
        (_, SubmitComplaint | TrackComplaint) => Ok(Access::Unrestricted),

        (None, _) => Err(Denial::NotAuthenticated),

        (Some(Principal::SuperAdmin { .. }), _) => Ok(Access::Unrestricted),

        (Some(Principal::Department { category_id, .. }), ListComplaints) => {
            Ok(Access::Category(*category_id))
        }
        (Some(Principal::Department { category_id, .. }), ReadComplaint(target) | UpdateComplaint(target)) => {
            if *category_id == target {
                Ok(Access::Category(target))
            } else {
                Err(Denial::WrongCategory)
            }
        }
        (Some(Principal::Department { .. }), ListDepartments | ChangePassword) => {
            Err(Denial::RoleForbidden)
        }

        (Some(Principal::UnassignedDepartment { .. }), _) => Err(Denial::RoleForbidden),
        (Some(Principal::Student { .. } | Principal::Warden { .. }), _) => Err(Denial::RoleForbidden),
    }
}

impl From<Denial> for ApiError {
    fn from(denial: Denial) -> Self {
        match denial {
            Denial::NotAuthenticated => ApiError::auth("Authentication required"),
            Denial::WrongCategory => ApiError::forbidden("Access denied"),
            Denial::RoleForbidden => ApiError::forbidden("Access denied"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids() -> (Uuid, Uuid) {
        (Uuid::new_v4(), Uuid::new_v4())
    }

    #[test]
    fn anonymous_can_only_submit_and_track() {
        let (cat, _) = ids();
        assert_eq!(authorize(None, Action::SubmitComplaint), Ok(Access::Unrestricted));
        assert_eq!(authorize(None, Action::TrackComplaint), Ok(Access::Unrestricted));

        for action in [
            Action::ListComplaints,
            Action::ReadComplaint(cat),
            Action::UpdateComplaint(cat),
            Action::ListDepartments,
            Action::ChangePassword,
        ] {
            assert_eq!(authorize(None, action), Err(Denial::NotAuthenticated), "{action:?}");
        }
    }

    #[test]
    fn department_is_scoped_to_its_category() {
        let (own, other) = ids();
        let dept = Principal::Department {
            user_id: Uuid::new_v4(),
            category_id: own,
        };

        assert_eq!(authorize(Some(&dept), Action::ListComplaints), Ok(Access::Category(own)));
        assert_eq!(authorize(Some(&dept), Action::ReadComplaint(own)), Ok(Access::Category(own)));
        assert_eq!(authorize(Some(&dept), Action::UpdateComplaint(own)), Ok(Access::Category(own)));

        assert_eq!(authorize(Some(&dept), Action::ReadComplaint(other)), Err(Denial::WrongCategory));
        assert_eq!(authorize(Some(&dept), Action::UpdateComplaint(other)), Err(Denial::WrongCategory));
        assert_eq!(authorize(Some(&dept), Action::ListDepartments), Err(Denial::RoleForbidden));
        assert_eq!(authorize(Some(&dept), Action::ChangePassword), Err(Denial::RoleForbidden));
    }

    #[test]
    fn unassigned_department_gets_nothing() {
        let (cat, _) = ids();
        let dept = Principal::UnassignedDepartment { user_id: Uuid::new_v4() };

        for action in [
            Action::ListComplaints,
            Action::ReadComplaint(cat),
            Action::UpdateComplaint(cat),
        ] {
            assert_eq!(authorize(Some(&dept), action), Err(Denial::RoleForbidden));
        }
    }

    #[test]
    fn super_admin_sees_everything() {
        let (cat, _) = ids();
        let admin = Principal::SuperAdmin { user_id: Uuid::new_v4() };

        for action in [
            Action::ListComplaints,
            Action::ReadComplaint(cat),
            Action::UpdateComplaint(cat),
            Action::ListDepartments,
            Action::ChangePassword,
        ] {
            assert_eq!(authorize(Some(&admin), action), Ok(Access::Unrestricted));
        }
    }

    #[test]
    fn students_and_wardens_have_no_staff_actions() {
        let (cat, _) = ids();
        let student = Principal::Student { user_id: Uuid::new_v4() };
        let warden = Principal::Warden { user_id: Uuid::new_v4() };

        for caller in [student, warden] {
            assert_eq!(authorize(Some(&caller), Action::SubmitComplaint), Ok(Access::Unrestricted));
            assert_eq!(authorize(Some(&caller), Action::ListComplaints), Err(Denial::RoleForbidden));
            assert_eq!(authorize(Some(&caller), Action::ReadComplaint(cat)), Err(Denial::RoleForbidden));
            assert_eq!(authorize(Some(&caller), Action::ChangePassword), Err(Denial::RoleForbidden));
        }
    }
}
