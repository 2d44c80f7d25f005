mod class_summary;
mod classno_summary;
mod homeworks;
mod list;
mod update;

pub use class_summary::ClassSummary;
pub use classno_summary::ClassnoSummary;
pub use homeworks::Homeworks;
pub use list::List;
pub use update::Update;

use crate::auth::Claims;
use crate::error::ApiError;

/// The caller's class names, or 400 when the token carries none.
fn caller_classes(user: &Claims) -> Result<Vec<String>, ApiError> {
    if user.classes.is_empty() {
        return Err(ApiError::bad_request("No classes found for the user"));
    }
    Ok(user.classes.names().to_vec())
}
