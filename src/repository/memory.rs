use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use super::attendance::{AttendanceFilter, AttendanceRepository, GroupBy};
use super::employee::EmployeeRepository;
use crate::error::{AppError, AppResult};
use crate::model::attendance::{Attendance, AttendanceChanges, NewAttendance};
use crate::model::employee::{AttendanceStatus, Employee};
use crate::utils::db_utils::PageRequest;

#[derive(Default)]
pub struct MemoryAttendanceRepository {
    rows: Mutex<BTreeMap<u64, Attendance>>,
    next_id: Mutex<u64>,
    fail_writes: bool,
}

impl MemoryAttendanceRepository {
    pub fn failing() -> Self {
        Self {
            fail_writes: true,
            ..Default::default()
        }
    }

    pub fn all(&self) -> Vec<Attendance> {
        self.rows.lock().unwrap().values().cloned().collect()
    }
}

#[async_trait]
impl AttendanceRepository for MemoryAttendanceRepository {
    async fn create(&self, new: NewAttendance) -> AppResult<Attendance> {
        if self.fail_writes {
            return Err(AppError::Persistence("connection reset".into()));
        }

        let mut next_id = self.next_id.lock().unwrap();
        *next_id += 1;
        let now = Utc::now();
        let record = Attendance {
            id: *next_id,
            employee_id: new.employee_id,
            date: new.date,
            shift_type: new.shift_type,
            attendance_type: new.attendance_type,
            work_mode: new.work_mode,
            proofs: new.proofs,
            created_at: now,
            updated_at: now,
        };
        self.rows.lock().unwrap().insert(record.id, record.clone());
        Ok(record)
    }

    async fn find(&self, id: u64) -> AppResult<Option<Attendance>> {
        Ok(self.rows.lock().unwrap().get(&id).cloned())
    }

    async fn update(&self, id: u64, changes: &AttendanceChanges) -> AppResult<Option<Attendance>> {
        let mut rows = self.rows.lock().unwrap();
        Ok(rows.get_mut(&id).map(|record| {
            changes.apply_to(record);
            record.updated_at = Utc::now();
            record.clone()
        }))
    }

    async fn delete(&self, id: u64) -> AppResult<bool> {
        Ok(self.rows.lock().unwrap().remove(&id).is_some())
    }

    async fn list(
        &self,
        filter: &AttendanceFilter,
        order_by: Option<GroupBy>,
        page: PageRequest,
    ) -> AppResult<(Vec<Attendance>, i64)> {
        let mut matching: Vec<Attendance> = self
            .rows
            .lock()
            .unwrap()
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();

        matching.sort_by(|a, b| {
            let primary = match order_by {
                Some(group) => group.compare(a, b),
                None => b.date.cmp(&a.date),
            };
            primary.then(b.id.cmp(&a.id))
        });

        let total = matching.len() as i64;
        let data = matching
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.per_page as usize)
            .collect();
        Ok((data, total))
    }
}

#[derive(Default)]
pub struct MemoryEmployeeRepository {
    rows: Mutex<BTreeMap<u64, Employee>>,
}

impl MemoryEmployeeRepository {
    pub fn with(employees: Vec<Employee>) -> Self {
        Self {
            rows: Mutex::new(employees.into_iter().map(|e| (e.id, e)).collect()),
        }
    }

    pub fn status_of(&self, id: u64) -> Option<AttendanceStatus> {
        self.rows.lock().unwrap().get(&id).map(|e| e.attendance_status)
    }
}

#[async_trait]
impl EmployeeRepository for MemoryEmployeeRepository {
    async fn find(&self, id: u64) -> AppResult<Option<Employee>> {
        Ok(self.rows.lock().unwrap().get(&id).cloned())
    }

    async fn set_attendance_status(&self, id: u64, status: AttendanceStatus) -> AppResult<bool> {
        let mut rows = self.rows.lock().unwrap();
        match rows.get_mut(&id) {
            Some(employee) => {
                employee.attendance_status = status;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
