use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumIter, EnumString, IntoStaticStr};
use utoipa::ToSchema;

use super::Labeled;

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize, ToSchema,
    EnumString, Display, EnumIter, AsRefStr, IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Role {
    Admin = 1,
    Hr = 2,
    Employee = 3,
    TeamLeader = 4,
}

/// Things a role may do; checked instead of comparing role names.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Display)]
pub enum Capability {
    SubmitAttendance,
    ViewAllAttendance,
    ManageAttendance,
    ExportAttendance,
    RequestLeave,
    ReviewLeave,
    ManageEmployees,
    ManageUsers,
}

use Capability::*;

const ADMIN_CAPABILITIES: &[Capability] = &[
    SubmitAttendance,
    ViewAllAttendance,
    ManageAttendance,
    ExportAttendance,
    RequestLeave,
    ReviewLeave,
    ManageEmployees,
    ManageUsers,
];

const HR_CAPABILITIES: &[Capability] = &[
    SubmitAttendance,
    ViewAllAttendance,
    ManageAttendance,
    ExportAttendance,
    RequestLeave,
    ReviewLeave,
    ManageEmployees,
];

const TEAM_LEADER_CAPABILITIES: &[Capability] =
    &[SubmitAttendance, ViewAllAttendance, RequestLeave, ReviewLeave];

const EMPLOYEE_CAPABILITIES: &[Capability] = &[SubmitAttendance, RequestLeave];

impl Role {
    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            1 => Some(Role::Admin),
            2 => Some(Role::Hr),
            3 => Some(Role::Employee),
            4 => Some(Role::TeamLeader),
            _ => None,
        }
    }

    pub fn id(self) -> u8 {
        self as u8
    }

    pub fn capabilities(self) -> &'static [Capability] {
        match self {
            Role::Admin => ADMIN_CAPABILITIES,
            Role::Hr => HR_CAPABILITIES,
            Role::TeamLeader => TEAM_LEADER_CAPABILITIES,
            Role::Employee => EMPLOYEE_CAPABILITIES,
        }
    }

    pub fn can(self, capability: Capability) -> bool {
        self.capabilities().contains(&capability)
    }
}

impl Labeled for Role {
    fn label(&self) -> &'static str {
        match self {
            Role::Admin => "Administrator",
            Role::Hr => "Human Resources",
            Role::Employee => "Employee",
            Role::TeamLeader => "Team Leader",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn ids_round_trip() {
        for role in Role::iter() {
            assert_eq!(Role::from_id(role.id()), Some(role));
        }
        assert_eq!(Role::from_id(0), None);
        assert_eq!(Role::from_id(9), None);
    }

    #[test]
    fn employees_only_submit_and_request() {
        assert!(Role::Employee.can(SubmitAttendance));
        assert!(Role::Employee.can(RequestLeave));
        assert!(!Role::Employee.can(ViewAllAttendance));
        assert!(!Role::Employee.can(ManageAttendance));
    }

    #[test]
    fn only_admin_manages_users() {
        let managers: Vec<Role> = Role::iter().filter(|r| r.can(ManageUsers)).collect();
        assert_eq!(managers, vec![Role::Admin]);
    }

    #[test]
    fn team_leader_reviews_but_does_not_edit() {
        assert!(Role::TeamLeader.can(ViewAllAttendance));
        assert!(Role::TeamLeader.can(ReviewLeave));
        assert!(!Role::TeamLeader.can(ManageAttendance));
        assert!(!Role::TeamLeader.can(ExportAttendance));
    }
}
