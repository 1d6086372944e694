use std::str::FromStr;

use actix_multipart::Multipart;
use actix_web::{HttpResponse, Responder, http::header, web};
use chrono::{Local, NaiveDate};
use futures_util::StreamExt;
use serde::Deserialize;
use serde_json::json;
use utoipa::{IntoParams, ToSchema};

use crate::auth::auth::AuthUser;
use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::model::attendance::{
    Attendance, AttendanceChanges, AttendanceType, ProofKind, ShiftType, WorkMode,
};
use crate::repository::attendance::{AttendanceFilter, GroupBy};
use crate::services::attendance::{AttendancePage, AttendanceService, CreateForm};
use crate::services::submission::{ProofImage, SubmissionForm, parse_choice};

/// Text parts are short; anything longer is not a form value.
const MAX_TEXT_FIELD_BYTES: usize = 1024;

/// Width of the proof path columns.
const MAX_PROOF_PATH_LEN: usize = 255;

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AttendanceListQuery {
    /// Inclusive lower bound, `YYYY-MM-DD`
    pub date_from: Option<String>,
    /// Inclusive upper bound, `YYYY-MM-DD`
    pub date_to: Option<String>,
    pub employee_id: Option<String>,
    pub shift_type: Option<String>,
    #[serde(rename = "type")]
    pub attendance_type: Option<String>,
    pub work_mode: Option<String>,
    /// `employee`, `date` or `shift_type`; anything else lists ungrouped
    pub group_by: Option<String>,
    pub page: Option<u32>,
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn parse_date(field: &str, raw: &str) -> AppResult<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
        AppError::validation(field, format!("The {} is not a valid date.", field.replace('_', " ")))
    })
}

impl AttendanceListQuery {
    pub fn into_criteria(self) -> AppResult<(AttendanceFilter, Option<GroupBy>, Option<u32>)> {
        let filter = AttendanceFilter {
            date_from: present(&self.date_from).map(|d| parse_date("date_from", d)).transpose()?,
            date_to: present(&self.date_to).map(|d| parse_date("date_to", d)).transpose()?,
            employee_id: present(&self.employee_id)
                .map(|id| {
                    id.parse::<u64>().map_err(|_| {
                        AppError::validation("employee_id", "The employee id must be an integer.")
                    })
                })
                .transpose()?,
            shift_type: present(&self.shift_type)
                .map(|v| parse_choice::<ShiftType>("shift_type", v))
                .transpose()?,
            attendance_type: present(&self.attendance_type)
                .map(|v| parse_choice::<AttendanceType>("type", v))
                .transpose()?,
            work_mode: present(&self.work_mode)
                .map(|v| parse_choice::<WorkMode>("work_mode", v))
                .transpose()?,
        };

        if let (Some(from), Some(to)) = (filter.date_from, filter.date_to) {
            if from > to {
                return Err(AppError::validation(
                    "date_to",
                    "The date to must be a date after or equal to date from.",
                ));
            }
        }

        let group_by = present(&self.group_by).and_then(|g| GroupBy::from_str(g).ok());

        Ok((filter, group_by, self.page))
    }
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct AttendanceUpdateReq {
    #[schema(example = "2026-01-05")]
    pub date: Option<String>,
    #[schema(example = "evening")]
    pub shift_type: Option<String>,
    #[serde(rename = "type")]
    #[schema(example = "time_out")]
    pub attendance_type: Option<String>,
    #[schema(example = "remote")]
    pub work_mode: Option<String>,
    pub screenshot_workstation_selfie: Option<String>,
    pub screenshot_cgc_chat: Option<String>,
    pub screenshot_department_chat: Option<String>,
    pub screenshot_team_chat: Option<String>,
    pub screenshot_group_chat: Option<String>,
}

fn check_proof_path(kind: ProofKind, path: &str) -> AppResult<String> {
    if path.len() > MAX_PROOF_PATH_LEN {
        return Err(AppError::validation(
            kind.field_name(),
            format!("The proof path must not be greater than {MAX_PROOF_PATH_LEN} characters."),
        ));
    }

    let valid = !path.starts_with('/')
        && path
            .split('/')
            .all(|seg| !seg.is_empty() && seg != "." && seg != ".." && !seg.contains('\\'));
    if valid {
        Ok(path.to_string())
    } else {
        Err(AppError::validation(
            kind.field_name(),
            "The proof path must be a relative storage path.",
        ))
    }
}

impl AttendanceUpdateReq {
    pub fn into_changes(self) -> AppResult<AttendanceChanges> {
        let mut changes = AttendanceChanges {
            date: present(&self.date).map(|d| parse_date("date", d)).transpose()?,
            shift_type: present(&self.shift_type)
                .map(|v| parse_choice::<ShiftType>("shift_type", v))
                .transpose()?,
            attendance_type: present(&self.attendance_type)
                .map(|v| parse_choice::<AttendanceType>("type", v))
                .transpose()?,
            work_mode: present(&self.work_mode)
                .map(|v| parse_choice::<WorkMode>("work_mode", v))
                .transpose()?,
            proofs: Vec::new(),
        };

        let paths = [
            (ProofKind::WorkstationSelfie, &self.screenshot_workstation_selfie),
            (ProofKind::CgcChat, &self.screenshot_cgc_chat),
            (ProofKind::DepartmentChat, &self.screenshot_department_chat),
            (ProofKind::TeamChat, &self.screenshot_team_chat),
            (ProofKind::GroupChat, &self.screenshot_group_chat),
        ];
        for (kind, path) in paths {
            if let Some(path) = present(path) {
                changes.proofs.push((kind, check_proof_path(kind, path)?));
            }
        }

        Ok(changes)
    }
}

/// Multipart layout of a submission, for the API docs.
#[derive(Deserialize, ToSchema)]
#[allow(dead_code)]
pub struct AttendanceUpload {
    #[schema(example = 7)]
    employee_id: u64,
    shift_type: ShiftType,
    #[serde(rename = "type")]
    attendance_type: AttendanceType,
    work_mode: WorkMode,
    #[schema(value_type = String, format = Binary)]
    screenshot_workstation_selfie: Vec<u8>,
    #[schema(value_type = String, format = Binary)]
    screenshot_cgc_chat: Vec<u8>,
    #[schema(value_type = String, format = Binary)]
    screenshot_department_chat: Vec<u8>,
    #[schema(value_type = String, format = Binary)]
    screenshot_team_chat: Vec<u8>,
    #[schema(value_type = String, format = Binary)]
    screenshot_group_chat: Vec<u8>,
}

/// Collects text parts and the five proof files, bounding what is buffered.
async fn read_submission(mut payload: Multipart, max_proof_bytes: usize) -> AppResult<SubmissionForm> {
    let mut form = SubmissionForm::default();

    while let Some(item) = payload.next().await {
        let mut field = item.map_err(|e| {
            AppError::validation("form", format!("Malformed multipart body: {e}"))
        })?;
        let name = field
            .content_disposition()
            .get_name()
            .unwrap_or_default()
            .to_string();
        let proof = ProofKind::from_field_name(&name);
        let limit = if proof.is_some() {
            max_proof_bytes
        } else {
            MAX_TEXT_FIELD_BYTES
        };

        let mut bytes = Vec::new();
        while let Some(chunk) = field.next().await {
            let chunk = chunk.map_err(|e| {
                AppError::validation(name.clone(), format!("Upload interrupted: {e}"))
            })?;
            if bytes.len() + chunk.len() > limit {
                return Err(match proof {
                    Some(kind) => ProofImage::oversized(kind, max_proof_bytes),
                    None => AppError::validation(name, "The field value is too long."),
                });
            }
            bytes.extend_from_slice(&chunk);
        }

        match proof {
            Some(kind) => {
                form.files.insert(kind, bytes);
            }
            None if !name.is_empty() => {
                let value = String::from_utf8(bytes)
                    .map_err(|_| AppError::validation(name.clone(), "The field must be text."))?;
                form.fields.insert(name, value);
            }
            None => {}
        }
    }

    Ok(form)
}

/// List attendance records
#[utoipa::path(
    get,
    path = "/api/attendance",
    params(AttendanceListQuery),
    responses(
        (status = 200, description = "One page of records, 15 per page", body = AttendancePage),
        (status = 400, description = "Invalid filter value"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn list_attendance(
    auth: AuthUser,
    service: web::Data<AttendanceService>,
    query: web::Query<AttendanceListQuery>,
) -> actix_web::Result<impl Responder> {
    let (filter, group_by, page) = query.into_inner().into_criteria()?;
    let page = service.list(&auth, filter, group_by, page).await?;
    Ok(HttpResponse::Ok().json(page))
}

/// Data for the submission form, including the currently resolved shift and type
#[utoipa::path(
    get,
    path = "/api/attendance/create",
    responses(
        (status = 200, description = "Form options", body = CreateForm),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn create_form(
    auth: AuthUser,
    service: web::Data<AttendanceService>,
) -> actix_web::Result<impl Responder> {
    let form = service.create_form(&auth, Local::now().naive_local()).await?;
    Ok(HttpResponse::Ok().json(form))
}

/// Submit attendance with five proof screenshots
///
/// Each screenshot must be a JPEG or PNG no larger than `MAX_PROOF_KB`.
#[utoipa::path(
    post,
    path = "/api/attendance",
    request_body(content = AttendanceUpload, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Attendance recorded; employee marked present", body = Attendance),
        (status = 400, description = "Validation failed", body = Object, example = json!({
            "message": "The Team Chat screenshot is required.",
            "field": "screenshot_team_chat"
        })),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn submit_attendance(
    auth: AuthUser,
    service: web::Data<AttendanceService>,
    config: web::Data<Config>,
    payload: Multipart,
) -> actix_web::Result<impl Responder> {
    let max_bytes = config.max_proof_bytes;
    let submission = read_submission(payload, max_bytes).await?.validate(max_bytes)?;

    let record = service
        .submit(&auth, submission, Local::now().naive_local())
        .await?;

    let location = format!(
        "{}/attendance/{}",
        config.api_prefix.trim_end_matches('/'),
        record.id
    );
    Ok(HttpResponse::Created()
        .insert_header((header::LOCATION, location))
        .json(record))
}

/// Get one attendance record
#[utoipa::path(
    get,
    path = "/api/attendance/{id}",
    params(("id" = u64, Path, description = "Attendance ID")),
    responses(
        (status = 200, description = "Attendance record", body = Attendance),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Attendance not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn get_attendance(
    auth: AuthUser,
    service: web::Data<AttendanceService>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let record = service.show(&auth, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(record))
}

/// Partially update an attendance record
#[utoipa::path(
    patch,
    path = "/api/attendance/{id}",
    params(("id" = u64, Path, description = "Attendance ID")),
    request_body = AttendanceUpdateReq,
    responses(
        (status = 200, description = "Updated record", body = Attendance),
        (status = 400, description = "Validation failed"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Attendance not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn update_attendance(
    auth: AuthUser,
    service: web::Data<AttendanceService>,
    path: web::Path<u64>,
    body: web::Json<AttendanceUpdateReq>,
) -> actix_web::Result<impl Responder> {
    let changes = body.into_inner().into_changes()?;
    let record = service.update(&auth, path.into_inner(), changes).await?;
    Ok(HttpResponse::Ok().json(record))
}

/// Delete an attendance record
#[utoipa::path(
    delete,
    path = "/api/attendance/{id}",
    params(("id" = u64, Path, description = "Attendance ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Attendance not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn delete_attendance(
    auth: AuthUser,
    service: web::Data<AttendanceService>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    service.delete(&auth, path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}

/// Export attendance (not implemented yet)
#[utoipa::path(
    get,
    path = "/api/attendance/export",
    responses(
        (status = 200, description = "Placeholder", body = Object, example = json!({
            "message": "Export functionality"
        })),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn export_attendance(
    auth: AuthUser,
    service: web::Data<AttendanceService>,
) -> actix_web::Result<impl Responder> {
    service.authorize_export(&auth)?;
    Ok(HttpResponse::Ok().json(json!({ "message": "Export functionality" })))
}
