pub mod attendance;
pub mod employee;
pub mod leave_request;
pub mod role;
pub mod user;

use serde::Serialize;
use strum::IntoEnumIterator;
use utoipa::ToSchema;

/// One `(value, label)` pair of a closed set, as rendered in form option lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct EnumOption {
    #[schema(example = "morning")]
    pub value: &'static str,
    #[schema(example = "Morning")]
    pub label: &'static str,
}

/// Closed enumerations with a wire value (via strum) and a display label.
pub trait Labeled: IntoEnumIterator + Into<&'static str> + Copy {
    fn label(&self) -> &'static str;

    /// Wire value as stored in the database and sent over JSON.
    fn value(&self) -> &'static str {
        (*self).into()
    }

    fn options() -> Vec<EnumOption> {
        Self::iter()
            .map(|v| EnumOption {
                label: v.label(),
                value: v.into(),
            })
            .collect()
    }

    fn values() -> Vec<&'static str> {
        Self::iter().map(Into::into).collect()
    }
}
