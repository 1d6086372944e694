//! Record-level authorization for attendance.

use crate::auth::auth::AuthUser;
use crate::error::{AppError, AppResult};
use crate::model::role::Capability;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttendanceAction {
    View,
    Update,
    Delete,
    Export,
    /// Submitting on behalf of the owner employee.
    Submit,
}

/// `owner` is the employee the record belongs to (or is being submitted for).
pub fn can_perform(actor: &AuthUser, action: AttendanceAction, owner: Option<u64>) -> bool {
    let owns = owner.is_some_and(|id| actor.owns(id));

    match action {
        AttendanceAction::View => actor.can(Capability::ViewAllAttendance) || owns,
        AttendanceAction::Update | AttendanceAction::Delete => {
            actor.can(Capability::ManageAttendance)
        }
        AttendanceAction::Export => actor.can(Capability::ExportAttendance),
        AttendanceAction::Submit => {
            actor.can(Capability::SubmitAttendance)
                && (owns || actor.can(Capability::ManageAttendance))
        }
    }
}

pub fn authorize(actor: &AuthUser, action: AttendanceAction, owner: Option<u64>) -> AppResult<()> {
    if can_perform(actor, action, owner) {
        Ok(())
    } else {
        tracing::debug!(user_id = actor.user_id, ?action, ?owner, "Attendance action denied");
        Err(AppError::Forbidden)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::role::Role;

    fn actor(role: Role, employee_id: Option<u64>) -> AuthUser {
        AuthUser {
            user_id: 1,
            username: "u".into(),
            role,
            roles: vec![role],
            employee_id,
        }
    }

    #[test]
    fn employees_see_and_submit_only_their_own() {
        let emp = actor(Role::Employee, Some(7));
        assert!(can_perform(&emp, AttendanceAction::View, Some(7)));
        assert!(!can_perform(&emp, AttendanceAction::View, Some(8)));
        assert!(can_perform(&emp, AttendanceAction::Submit, Some(7)));
        assert!(!can_perform(&emp, AttendanceAction::Submit, Some(8)));
        assert!(!can_perform(&emp, AttendanceAction::Update, Some(7)));
        assert!(!can_perform(&emp, AttendanceAction::Export, None));
    }

    #[test]
    fn hr_manages_everyone() {
        let hr = actor(Role::Hr, None);
        for action in [
            AttendanceAction::View,
            AttendanceAction::Update,
            AttendanceAction::Delete,
            AttendanceAction::Export,
            AttendanceAction::Submit,
        ] {
            assert!(can_perform(&hr, action, Some(8)), "{action:?}");
        }
    }

    #[test]
    fn team_leader_views_but_cannot_submit_for_others() {
        let lead = actor(Role::TeamLeader, Some(2));
        assert!(can_perform(&lead, AttendanceAction::View, Some(8)));
        assert!(!can_perform(&lead, AttendanceAction::Submit, Some(8)));
        assert!(matches!(
            authorize(&lead, AttendanceAction::Delete, Some(8)),
            Err(AppError::Forbidden)
        ));
    }
}
