//! Input checks that run before the submission workflow touches anything.
//!
//! A submission either converts into a complete [`AttendanceSubmission`] or
//! fails with the first offending field; there is no partial form.

use std::collections::HashMap;
use std::str::FromStr;

use strum::IntoEnumIterator;

use crate::error::{AppError, AppResult};
use crate::model::Labeled;
use crate::model::attendance::{AttendanceType, ProofKind, ShiftType, WorkMode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Jpeg,
    Png,
}

impl ImageFormat {
    /// Sniffs the magic bytes; the client-supplied name and MIME type are ignored.
    pub fn detect(bytes: &[u8]) -> Option<Self> {
        const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
        const JPEG: &[u8] = &[0xFF, 0xD8, 0xFF];

        if bytes.starts_with(PNG) {
            Some(ImageFormat::Png)
        } else if bytes.starts_with(JPEG) {
            Some(ImageFormat::Jpeg)
        } else {
            None
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "jpg",
            ImageFormat::Png => "png",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProofImage {
    pub bytes: Vec<u8>,
    pub format: ImageFormat,
}

impl ProofImage {
    pub fn validate(kind: ProofKind, bytes: Vec<u8>, max_bytes: usize) -> AppResult<Self> {
        let field = kind.field_name();

        if bytes.is_empty() {
            return Err(AppError::validation(
                field,
                format!("The {} screenshot is required.", kind.label()),
            ));
        }
        if bytes.len() > max_bytes {
            return Err(Self::oversized(kind, max_bytes));
        }
        let format = ImageFormat::detect(&bytes).ok_or_else(|| {
            AppError::validation(
                field,
                format!("The {} screenshot must be a file of type: jpg, png.", kind.label()),
            )
        })?;

        Ok(Self { bytes, format })
    }

    pub fn oversized(kind: ProofKind, max_bytes: usize) -> AppError {
        AppError::validation(
            kind.field_name(),
            format!(
                "The {} screenshot must not be greater than {} kilobytes.",
                kind.label(),
                max_bytes / 1024
            ),
        )
    }
}

/// All five proofs, in [`ProofKind`] declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProofBundle {
    images: Vec<(ProofKind, ProofImage)>,
}

impl ProofBundle {
    pub fn new(mut images: HashMap<ProofKind, ProofImage>) -> AppResult<Self> {
        let mut ordered = Vec::with_capacity(5);
        for kind in ProofKind::iter() {
            let image = images.remove(&kind).ok_or_else(|| {
                AppError::validation(
                    kind.field_name(),
                    format!("The {} screenshot is required.", kind.label()),
                )
            })?;
            ordered.push((kind, image));
        }
        Ok(Self { images: ordered })
    }

    pub fn iter(&self) -> impl Iterator<Item = &(ProofKind, ProofImage)> {
        self.images.iter()
    }
}

/// A fully validated submission. Constructed only through [`SubmissionForm::validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttendanceSubmission {
    pub employee_id: u64,
    pub shift_type: ShiftType,
    pub attendance_type: AttendanceType,
    pub work_mode: WorkMode,
    pub proofs: ProofBundle,
}

/// Raw multipart content as received.
#[derive(Debug, Default)]
pub struct SubmissionForm {
    pub fields: HashMap<String, String>,
    pub files: HashMap<ProofKind, Vec<u8>>,
}

impl SubmissionForm {
    pub fn validate(mut self, max_proof_bytes: usize) -> AppResult<AttendanceSubmission> {
        let employee_id = self.required("employee_id")?;
        let employee_id = employee_id
            .trim()
            .parse::<u64>()
            .map_err(|_| AppError::validation("employee_id", "The employee id field must be an integer."))?;

        let shift_type = parse_choice::<ShiftType>("shift_type", &self.required("shift_type")?)?;
        let attendance_type = parse_choice::<AttendanceType>("type", &self.required("type")?)?;
        let work_mode = parse_choice::<WorkMode>("work_mode", &self.required("work_mode")?)?;

        let mut images = HashMap::with_capacity(5);
        for kind in ProofKind::iter() {
            let bytes = self.files.remove(&kind).unwrap_or_default();
            images.insert(kind, ProofImage::validate(kind, bytes, max_proof_bytes)?);
        }

        Ok(AttendanceSubmission {
            employee_id,
            shift_type,
            attendance_type,
            work_mode,
            proofs: ProofBundle::new(images)?,
        })
    }

    fn required(&self, field: &str) -> AppResult<String> {
        match self.fields.get(field).map(|v| v.trim()) {
            Some(v) if !v.is_empty() => Ok(v.to_string()),
            _ => Err(AppError::validation(
                field,
                format!("The {} field is required.", field.replace('_', " ")),
            )),
        }
    }
}

/// Parses one member of a closed set, naming the field on failure.
pub fn parse_choice<T: FromStr + Labeled>(field: &str, raw: &str) -> AppResult<T> {
    T::from_str(raw.trim()).map_err(|_| {
        AppError::validation(
            field,
            format!(
                "The selected {} is invalid. Allowed: {}",
                field.replace('_', " "),
                T::values().join(", ")
            ),
        )
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub const PNG_BYTES: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 13];
    pub const JPEG_BYTES: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0, 16, b'J', b'F', b'I', b'F'];

    pub fn complete_form() -> SubmissionForm {
        let mut form = SubmissionForm::default();
        form.fields.insert("employee_id".into(), "7".into());
        form.fields.insert("shift_type".into(), "morning".into());
        form.fields.insert("type".into(), "time_in".into());
        form.fields.insert("work_mode".into(), "on_site".into());
        for kind in ProofKind::iter() {
            form.files.insert(kind, PNG_BYTES.to_vec());
        }
        form
    }

    fn field_of(err: AppError) -> String {
        match err {
            AppError::Validation { field, .. } => field,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn detects_png_and_jpeg_only() {
        assert_eq!(ImageFormat::detect(PNG_BYTES), Some(ImageFormat::Png));
        assert_eq!(ImageFormat::detect(JPEG_BYTES), Some(ImageFormat::Jpeg));
        assert_eq!(ImageFormat::detect(b"GIF89a...."), None);
        assert_eq!(ImageFormat::detect(b""), None);
    }

    #[test]
    fn complete_form_validates() {
        let submission = complete_form().validate(1502 * 1024).unwrap();
        assert_eq!(submission.employee_id, 7);
        assert_eq!(submission.shift_type, ShiftType::Morning);
        assert_eq!(submission.attendance_type, AttendanceType::TimeIn);
        assert_eq!(submission.work_mode, WorkMode::OnSite);
        let kinds: Vec<ProofKind> = submission.proofs.iter().map(|(k, _)| *k).collect();
        assert_eq!(kinds, ProofKind::iter().collect::<Vec<_>>());
    }

    #[test]
    fn each_missing_proof_is_reported_by_field() {
        for kind in ProofKind::iter() {
            let mut form = complete_form();
            form.files.remove(&kind);
            let err = form.validate(1502 * 1024).unwrap_err();
            assert_eq!(field_of(err), kind.field_name());
        }
    }

    #[test]
    fn oversized_and_non_image_proofs_are_rejected() {
        let mut form = complete_form();
        let mut big = PNG_BYTES.to_vec();
        big.resize(2048, 0);
        form.files.insert(ProofKind::TeamChat, big);
        let err = form.validate(1024).unwrap_err();
        assert_eq!(field_of(err), "screenshot_team_chat");

        let mut form = complete_form();
        form.files.insert(ProofKind::GroupChat, b"%PDF-1.7".to_vec());
        let err = form.validate(1502 * 1024).unwrap_err();
        assert_eq!(field_of(err), "screenshot_group_chat");
    }

    #[test]
    fn classification_fields_must_be_known_members() {
        let mut form = complete_form();
        form.fields.insert("work_mode".into(), "hybrid".into());
        assert_eq!(field_of(form.validate(1502 * 1024).unwrap_err()), "work_mode");

        let mut form = complete_form();
        form.fields.remove("type");
        assert_eq!(field_of(form.validate(1502 * 1024).unwrap_err()), "type");

        let mut form = complete_form();
        form.fields.insert("employee_id".into(), "seven".into());
        assert_eq!(field_of(form.validate(1502 * 1024).unwrap_err()), "employee_id");
    }

    #[test]
    fn parse_choice_lists_allowed_values() {
        let err = parse_choice::<ShiftType>("shift_type", "night").unwrap_err();
        assert_eq!(
            err.to_string(),
            "The selected shift type is invalid. Allowed: morning, evening"
        );
    }
}
