use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use derive_more::Display;
use serde::Serialize;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;

use super::schedule::ScheduleResolver;
use super::submission::AttendanceSubmission;
use crate::auth::auth::AuthUser;
use crate::auth::policy::{AttendanceAction, authorize};
use crate::error::{AppError, AppResult};
use crate::model::attendance::{
    Attendance, AttendanceChanges, AttendanceType, NewAttendance, ProofKind, ProofPaths,
    ShiftType, WorkMode,
};
use crate::model::employee::{AttendanceStatus, Employee};
use crate::model::role::Capability;
use crate::model::{EnumOption, Labeled};
use crate::repository::attendance::{AttendanceFilter, AttendanceRepository, GroupBy};
use crate::repository::employee::EmployeeRepository;
use crate::storage::FileStore;
use crate::utils::db_utils::PageRequest;

pub const PAGE_SIZE: u32 = 15;

/// Folder holding the five proofs of one `(employee, day, shift, type)`.
/// Resubmitting under the same key replaces the files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[display(
    fmt = "attendance-proofs/{}/{}/{}-{}",
    employee_id,
    date,
    shift_type,
    attendance_type
)]
pub struct StorageKey {
    pub employee_id: u64,
    pub date: NaiveDate,
    pub shift_type: ShiftType,
    pub attendance_type: AttendanceType,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AttendanceGroup {
    #[schema(example = "7")]
    pub key: String,
    pub records: Vec<Attendance>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AttendancePage {
    pub data: Vec<Attendance>,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 15)]
    pub per_page: u32,
    #[schema(example = 42)]
    pub total: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_by: Option<GroupBy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub groups: Option<Vec<AttendanceGroup>>,
}

/// Everything the submission form needs to render.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CreateForm {
    #[schema(nullable = true)]
    pub employee: Option<Employee>,
    pub shift_types: Vec<EnumOption>,
    pub attendance_types: Vec<EnumOption>,
    pub work_modes: Vec<EnumOption>,
    /// `null` when now falls between configured shift windows.
    #[schema(nullable = true)]
    pub current_shift: Option<ShiftType>,
    #[schema(nullable = true)]
    pub current_attendance_type: Option<AttendanceType>,
}

/// Splits an already ordered page into runs sharing the same key.
pub fn group_records(records: &[Attendance], by: GroupBy) -> Vec<AttendanceGroup> {
    let mut groups: Vec<AttendanceGroup> = Vec::new();
    for record in records {
        let key = by.key_of(record);
        match groups.last_mut() {
            Some(group) if group.key == key => group.records.push(record.clone()),
            _ => groups.push(AttendanceGroup {
                key,
                records: vec![record.clone()],
            }),
        }
    }
    groups
}

pub struct AttendanceService {
    attendances: Arc<dyn AttendanceRepository>,
    employees: Arc<dyn EmployeeRepository>,
    files: Arc<dyn FileStore>,
    schedule: ScheduleResolver,
}

impl AttendanceService {
    pub fn new(
        attendances: Arc<dyn AttendanceRepository>,
        employees: Arc<dyn EmployeeRepository>,
        files: Arc<dyn FileStore>,
        schedule: ScheduleResolver,
    ) -> Self {
        Self {
            attendances,
            employees,
            files,
            schedule,
        }
    }

    pub fn create_form_options(&self, now: NaiveDateTime) -> CreateForm {
        CreateForm {
            employee: None,
            shift_types: ShiftType::options(),
            attendance_types: AttendanceType::options(),
            work_modes: WorkMode::options(),
            current_shift: self.schedule.current_shift(now),
            current_attendance_type: self.schedule.current_attendance_type(now),
        }
    }

    pub async fn create_form(&self, actor: &AuthUser, now: NaiveDateTime) -> AppResult<CreateForm> {
        actor.require(Capability::SubmitAttendance)?;

        let employee = match actor.employee_id {
            Some(id) => self.employees.find(id).await?,
            None => None,
        };

        Ok(CreateForm {
            employee,
            ..self.create_form_options(now)
        })
    }

    /// Stores the five proofs, records the submission for `now`'s date and
    /// marks the employee present.
    ///
    /// A record-store failure leaves the stored proofs in place; a retry under
    /// the same key overwrites them.
    #[instrument(
        name = "attendance_submit",
        skip(self, actor, submission),
        fields(
            employee_id = submission.employee_id,
            shift_type = %submission.shift_type,
            attendance_type = %submission.attendance_type,
        )
    )]
    pub async fn submit(
        &self,
        actor: &AuthUser,
        submission: AttendanceSubmission,
        now: NaiveDateTime,
    ) -> AppResult<Attendance> {
        let employee_id = submission.employee_id;

        // Checked before the lookup: a non-manager learns nothing about other ids.
        authorize(actor, AttendanceAction::Submit, Some(employee_id))?;
        if self.employees.find(employee_id).await?.is_none() {
            return Err(AppError::validation(
                "employee_id",
                "The selected employee id is invalid.",
            ));
        }

        let key = StorageKey {
            employee_id,
            date: now.date(),
            shift_type: submission.shift_type,
            attendance_type: submission.attendance_type,
        };
        let namespace = key.to_string();

        let mut stored = Vec::with_capacity(5);
        for (kind, image) in submission.proofs.iter() {
            let filename = format!("{}.{}", kind.stem(), image.format.extension());
            let path = self
                .files
                .store(&image.bytes, &namespace, &filename)
                .await
                .inspect_err(|e| warn!(error = %e, %kind, "Proof store failed"))?;
            stored.push((*kind, path));
        }

        let record = self
            .attendances
            .create(NewAttendance {
                employee_id,
                date: key.date,
                shift_type: submission.shift_type,
                attendance_type: submission.attendance_type,
                work_mode: submission.work_mode,
                proofs: proof_paths(stored)?,
            })
            .await
            .inspect_err(|e| warn!(error = %e, %namespace, "Attendance insert failed; proofs left in place"))?;

        self.update_attendance_status(employee_id, AttendanceStatus::Present)
            .await?;

        info!(attendance_id = record.id, "Attendance submitted");
        Ok(record)
    }

    /// Unconditional overwrite of the employee-level status.
    pub async fn update_attendance_status(
        &self,
        employee_id: u64,
        status: AttendanceStatus,
    ) -> AppResult<()> {
        if self
            .employees
            .set_attendance_status(employee_id, status)
            .await?
        {
            Ok(())
        } else {
            Err(AppError::NotFound("Employee".into()))
        }
    }

    pub async fn list(
        &self,
        actor: &AuthUser,
        mut filter: AttendanceFilter,
        group_by: Option<GroupBy>,
        page: Option<u32>,
    ) -> AppResult<AttendancePage> {
        if !actor.can(Capability::ViewAllAttendance) {
            filter.employee_id = Some(actor.employee()?);
        }

        let page = PageRequest::new(page, PAGE_SIZE);
        let (data, total) = self.attendances.list(&filter, group_by, page).await?;
        let groups = group_by.map(|by| group_records(&data, by));

        Ok(AttendancePage {
            data,
            page: page.page,
            per_page: page.per_page,
            total,
            group_by,
            groups,
        })
    }

    async fn existing(&self, id: u64) -> AppResult<Attendance> {
        self.attendances
            .find(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Attendance".into()))
    }

    pub async fn show(&self, actor: &AuthUser, id: u64) -> AppResult<Attendance> {
        let record = self.existing(id).await?;
        authorize(actor, AttendanceAction::View, Some(record.employee_id))?;
        Ok(record)
    }

    pub async fn update(
        &self,
        actor: &AuthUser,
        id: u64,
        changes: AttendanceChanges,
    ) -> AppResult<Attendance> {
        let record = self.existing(id).await?;
        authorize(actor, AttendanceAction::Update, Some(record.employee_id))?;

        if changes.is_empty() {
            return Ok(record);
        }

        let updated = self
            .attendances
            .update(id, &changes)
            .await?
            .ok_or_else(|| AppError::NotFound("Attendance".into()))?;
        info!(attendance_id = id, "Attendance updated");
        Ok(updated)
    }

    pub async fn delete(&self, actor: &AuthUser, id: u64) -> AppResult<()> {
        let record = self.existing(id).await?;
        authorize(actor, AttendanceAction::Delete, Some(record.employee_id))?;

        if !self.attendances.delete(id).await? {
            return Err(AppError::NotFound("Attendance".into()));
        }
        info!(attendance_id = id, "Attendance deleted");
        Ok(())
    }

    pub fn authorize_export(&self, actor: &AuthUser) -> AppResult<()> {
        authorize(actor, AttendanceAction::Export, None)
    }
}

fn proof_paths(stored: Vec<(ProofKind, String)>) -> AppResult<ProofPaths> {
    let find = |kind: ProofKind| -> AppResult<String> {
        stored
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, path)| path.clone())
            .ok_or_else(|| AppError::Internal(format!("proof {kind} was not stored")))
    };

    Ok(ProofPaths {
        screenshot_workstation_selfie: find(ProofKind::WorkstationSelfie)?,
        screenshot_cgc_chat: find(ProofKind::CgcChat)?,
        screenshot_department_chat: find(ProofKind::DepartmentChat)?,
        screenshot_team_chat: find(ProofKind::TeamChat)?,
        screenshot_group_chat: find(ProofKind::GroupChat)?,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::model::employee::Gender;
    use crate::model::role::Role;
    use crate::repository::memory::{MemoryAttendanceRepository, MemoryEmployeeRepository};
    use crate::services::schedule::{DEFAULT_ATTENDANCE_TYPE_WINDOWS, DEFAULT_SHIFT_WINDOWS};
    use crate::services::submission::tests::{JPEG_BYTES, complete_form};
    use crate::storage::memory::MemoryFileStore;

    pub fn employee(id: u64, status: AttendanceStatus) -> Employee {
        Employee {
            id,
            employee_code: format!("EMP-{id:03}"),
            first_name: "Test".into(),
            last_name: format!("Employee{id}"),
            email: format!("emp{id}@company.com"),
            gender: Some(Gender::Other),
            department: None,
            department_team: None,
            hire_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            attendance_status: status,
        }
    }

    pub fn actor(role: Role, employee_id: Option<u64>) -> AuthUser {
        AuthUser {
            user_id: 100 + employee_id.unwrap_or(0),
            username: format!("{role}"),
            role,
            roles: vec![role],
            employee_id,
        }
    }

    pub fn schedule() -> ScheduleResolver {
        ScheduleResolver::new(
            DEFAULT_SHIFT_WINDOWS.parse().unwrap(),
            DEFAULT_ATTENDANCE_TYPE_WINDOWS.parse().unwrap(),
        )
    }

    pub fn at(date: &str, time: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(&format!("{date} {time}"), "%Y-%m-%d %H:%M").unwrap()
    }

    struct Fixture {
        service: AttendanceService,
        attendances: Arc<MemoryAttendanceRepository>,
        employees: Arc<MemoryEmployeeRepository>,
        files: Arc<MemoryFileStore>,
    }

    fn fixture_with(attendances: MemoryAttendanceRepository, files: MemoryFileStore) -> Fixture {
        let attendances = Arc::new(attendances);
        let employees = Arc::new(MemoryEmployeeRepository::with(vec![
            employee(7, AttendanceStatus::Absent),
            employee(8, AttendanceStatus::OnLeave),
        ]));
        let files = Arc::new(files);
        let service = AttendanceService::new(
            attendances.clone(),
            employees.clone(),
            files.clone(),
            schedule(),
        );
        Fixture {
            service,
            attendances,
            employees,
            files,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(MemoryAttendanceRepository::default(), MemoryFileStore::default())
    }

    fn submission() -> AttendanceSubmission {
        complete_form().validate(1502 * 1024).unwrap()
    }

    #[test]
    fn storage_key_is_deterministic() {
        let key = StorageKey {
            employee_id: 7,
            date: NaiveDate::from_ymd_opt(2026, 1, 5).unwrap(),
            shift_type: ShiftType::Evening,
            attendance_type: AttendanceType::TimeOut,
        };
        assert_eq!(key.to_string(), "attendance-proofs/7/2026-01-05/evening-time_out");
    }

    #[actix_web::test]
    async fn morning_time_in_creates_record_and_marks_present() {
        let f = fixture();
        let now = at("2026-01-05", "07:12");

        let record = f
            .service
            .submit(&actor(Role::Employee, Some(7)), submission(), now)
            .await
            .unwrap();

        assert_eq!(record.employee_id, 7);
        assert_eq!(record.date, now.date());
        assert_eq!(record.shift_type, ShiftType::Morning);
        assert_eq!(record.attendance_type, AttendanceType::TimeIn);
        assert_eq!(record.work_mode, WorkMode::OnSite);
        assert_eq!(
            record.proofs.screenshot_workstation_selfie,
            "attendance-proofs/7/2026-01-05/morning-time_in/selfie.png"
        );
        assert_eq!(
            record.proofs.screenshot_group_chat,
            "attendance-proofs/7/2026-01-05/morning-time_in/group.png"
        );
        assert_eq!(f.employees.status_of(7), Some(AttendanceStatus::Present));
        assert_eq!(f.attendances.all().len(), 1);
    }

    #[actix_web::test]
    async fn each_proof_keeps_its_own_extension() {
        let f = fixture();
        let mut form = complete_form();
        form.files.insert(ProofKind::CgcChat, JPEG_BYTES.to_vec());
        let submission = form.validate(1502 * 1024).unwrap();

        let record = f
            .service
            .submit(&actor(Role::Hr, None), submission, at("2026-01-05", "07:12"))
            .await
            .unwrap();

        assert!(record.proofs.screenshot_cgc_chat.ends_with("/cgc.jpg"));
        assert!(record.proofs.screenshot_team_chat.ends_with("/team.png"));
    }

    #[actix_web::test]
    async fn resubmission_overwrites_files_but_adds_a_record() {
        let f = fixture();
        let emp = actor(Role::Employee, Some(7));

        let first = f
            .service
            .submit(&emp, submission(), at("2026-01-05", "07:00"))
            .await
            .unwrap();
        let second = f
            .service
            .submit(&emp, submission(), at("2026-01-05", "07:40"))
            .await
            .unwrap();

        assert_ne!(first.id, second.id);
        assert_eq!(first.proofs, second.proofs);
        assert_eq!(f.files.paths().len(), 5);
        assert_eq!(f.files.write_count(), 10);
        assert_eq!(f.attendances.all().len(), 2);
    }

    #[actix_web::test]
    async fn next_day_uses_a_new_folder() {
        let f = fixture();
        let emp = actor(Role::Employee, Some(7));

        f.service
            .submit(&emp, submission(), at("2026-01-05", "07:00"))
            .await
            .unwrap();
        f.service
            .submit(&emp, submission(), at("2026-01-06", "07:00"))
            .await
            .unwrap();

        assert_eq!(f.files.paths().len(), 10);
    }

    #[actix_web::test]
    async fn unknown_employee_is_rejected_before_any_write() {
        let f = fixture();
        let mut form = complete_form();
        form.fields.insert("employee_id".into(), "99".into());
        let submission = form.validate(1502 * 1024).unwrap();

        let err = f
            .service
            .submit(&actor(Role::Hr, None), submission, at("2026-01-05", "07:00"))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Validation { ref field, .. } if field == "employee_id"));
        assert_eq!(f.files.write_count(), 0);
        assert!(f.attendances.all().is_empty());
    }

    #[actix_web::test]
    async fn employee_cannot_submit_for_a_colleague() {
        let f = fixture();
        let err = f
            .service
            .submit(&actor(Role::Employee, Some(8)), submission(), at("2026-01-05", "07:00"))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Forbidden));
        assert_eq!(f.files.write_count(), 0);
        assert_eq!(f.employees.status_of(7), Some(AttendanceStatus::Absent));
    }

    #[actix_web::test]
    async fn employee_cannot_tell_unknown_ids_from_colleagues() {
        let f = fixture();
        let mut form = complete_form();
        form.fields.insert("employee_id".into(), "99".into());
        let unknown = form.validate(1502 * 1024).unwrap();

        let err = f
            .service
            .submit(&actor(Role::Employee, Some(8)), unknown, at("2026-01-05", "07:00"))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Forbidden));
        assert_eq!(f.files.write_count(), 0);
    }

    #[actix_web::test]
    async fn persistence_failure_leaves_proofs_and_status_untouched() {
        let f = fixture_with(MemoryAttendanceRepository::failing(), MemoryFileStore::default());

        let err = f
            .service
            .submit(&actor(Role::Employee, Some(7)), submission(), at("2026-01-05", "07:00"))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Persistence(_)));
        assert_eq!(f.files.paths().len(), 5);
        assert_eq!(f.employees.status_of(7), Some(AttendanceStatus::Absent));
    }

    #[actix_web::test]
    async fn store_failure_aborts_before_the_record() {
        let f = fixture_with(
            MemoryAttendanceRepository::default(),
            MemoryFileStore::failing_on("dept.png"),
        );

        let err = f
            .service
            .submit(&actor(Role::Employee, Some(7)), submission(), at("2026-01-05", "07:00"))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Storage(_)));
        assert_eq!(f.files.paths().len(), 2);
        assert!(f.attendances.all().is_empty());
    }

    #[actix_web::test]
    async fn status_overwrite_ignores_previous_state() {
        let f = fixture();
        f.service
            .update_attendance_status(8, AttendanceStatus::Present)
            .await
            .unwrap();
        assert_eq!(f.employees.status_of(8), Some(AttendanceStatus::Present));

        let err = f
            .service
            .update_attendance_status(99, AttendanceStatus::Present)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[actix_web::test]
    async fn employee_listing_is_scoped_whatever_the_filter() {
        let f = fixture();
        let hr = actor(Role::Hr, None);
        for id in [7, 8, 7] {
            let mut form = complete_form();
            form.fields.insert("employee_id".into(), id.to_string());
            f.service
                .submit(&hr, form.validate(1502 * 1024).unwrap(), at("2026-01-05", "07:00"))
                .await
                .unwrap();
        }

        let filter = AttendanceFilter {
            employee_id: Some(8),
            ..Default::default()
        };
        let page = f
            .service
            .list(&actor(Role::Employee, Some(7)), filter, None, None)
            .await
            .unwrap();

        assert_eq!(page.total, 2);
        assert!(page.data.iter().all(|r| r.employee_id == 7));

        let all = f
            .service
            .list(&hr, AttendanceFilter::default(), None, None)
            .await
            .unwrap();
        assert_eq!(all.total, 3);
        assert_eq!(all.per_page, PAGE_SIZE);
    }

    #[actix_web::test]
    async fn grouped_listing_builds_groups_in_order() {
        let f = fixture();
        let hr = actor(Role::Hr, None);
        for id in [8, 7, 8] {
            let mut form = complete_form();
            form.fields.insert("employee_id".into(), id.to_string());
            f.service
                .submit(&hr, form.validate(1502 * 1024).unwrap(), at("2026-01-05", "07:00"))
                .await
                .unwrap();
        }

        let page = f
            .service
            .list(&hr, AttendanceFilter::default(), Some(GroupBy::Employee), Some(1))
            .await
            .unwrap();

        let groups = page.groups.unwrap();
        let keys: Vec<&str> = groups.iter().map(|g| g.key.as_str()).collect();
        assert_eq!(keys, vec!["7", "8"]);
        assert_eq!(groups[1].records.len(), 2);
    }

    #[actix_web::test]
    async fn show_update_delete_follow_the_policy() {
        let f = fixture();
        let record = f
            .service
            .submit(&actor(Role::Employee, Some(7)), submission(), at("2026-01-05", "07:00"))
            .await
            .unwrap();

        let other = actor(Role::Employee, Some(8));
        assert!(matches!(
            f.service.show(&other, record.id).await,
            Err(AppError::Forbidden)
        ));
        assert!(matches!(
            f.service.show(&other, 999).await,
            Err(AppError::NotFound(_))
        ));

        let owner = actor(Role::Employee, Some(7));
        assert_eq!(f.service.show(&owner, record.id).await.unwrap().id, record.id);
        assert!(matches!(
            f.service.delete(&owner, record.id).await,
            Err(AppError::Forbidden)
        ));

        let hr = actor(Role::Hr, None);
        let changes = AttendanceChanges {
            work_mode: Some(WorkMode::Remote),
            proofs: vec![(ProofKind::TeamChat, "attendance-proofs/manual/team.png".into())],
            ..Default::default()
        };
        let updated = f.service.update(&hr, record.id, changes).await.unwrap();
        assert_eq!(updated.work_mode, WorkMode::Remote);
        assert_eq!(updated.shift_type, ShiftType::Morning);
        assert_eq!(updated.proofs.screenshot_team_chat, "attendance-proofs/manual/team.png");
        assert_eq!(updated.proofs.screenshot_cgc_chat, record.proofs.screenshot_cgc_chat);

        f.service.delete(&hr, record.id).await.unwrap();
        assert!(f.attendances.all().is_empty());
    }

    #[actix_web::test]
    async fn create_form_reports_gaps_as_none() {
        let f = fixture();
        let form = f
            .service
            .create_form(&actor(Role::Employee, Some(7)), at("2026-01-05", "23:30"))
            .await
            .unwrap();
        assert_eq!(form.current_shift, None);
        assert_eq!(form.current_attendance_type, None);
        assert_eq!(form.employee.map(|e| e.id), Some(7));
        assert_eq!(form.shift_types.len(), 2);

        let form = f.service.create_form_options(at("2026-01-05", "14:30"));
        assert_eq!(form.current_shift, Some(ShiftType::Evening));
        assert_eq!(form.current_attendance_type, Some(AttendanceType::TimeIn));
    }
}
