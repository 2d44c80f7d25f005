mod class_summary;
mod classno_summary;
mod list;

pub use class_summary::ClassSummary;
pub use classno_summary::ClassnoSummary;
pub use list::List;
