//! Packaging and notification after a run.
//!
//! Neither step affects the pipeline result; they only consume the
//! [`RunSummary`](crate::models::RunSummary) it produces.

pub mod archive;
pub mod mailer;

pub use archive::zip_directory;
pub use mailer::{build_message, send_email, MailSettings};
