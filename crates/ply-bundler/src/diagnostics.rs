//! Learner-facing error records.
//!
//! Every failure leaving a pass is converted into an [`ErrorRecord`] here, so
//! consumers see one shape regardless of where the failure came from. The
//! conversions never panic and never leave a field unset.

use std::any::Any;
use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::error::BundleError;

/// Name given to failures that carry no structure of their own.
pub const GENERIC_ERROR_NAME: &str = "GenericBundleError";

/// Appended by the linker when a module that is not JavaScript reaches the
/// graph. Stripped before presentation.
pub const NON_JS_IMPORT_NOTE: &str =
    " (Note that you need plugins to import files that are not JavaScript)";

/// Sanitized error sent to the preview overlay.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorRecord {
    pub name: String,
    pub message: String,
    /// File the error points at; the entry point when unknown.
    pub source_path: String,
    /// Byte offset into `source_path`; 0 when unknown.
    pub character_offset: u32,
}

/// Converts a pass failure into a record.
///
/// Structured fields on the error are kept; missing ones default to the entry
/// point and offset 0.
pub fn sanitize(error: &BundleError, entry_point: &str) -> ErrorRecord {
    ErrorRecord {
        name: error.name().to_string(),
        message: strip_internal_note(&error.message()),
        source_path: error.location().unwrap_or(entry_point).to_string(),
        character_offset: error.position().unwrap_or(0),
    }
}

/// Converts an unstructured failure message into a record.
pub fn sanitize_message(message: impl Display, entry_point: &str) -> ErrorRecord {
    ErrorRecord {
        name: GENERIC_ERROR_NAME.to_string(),
        message: strip_internal_note(&message.to_string()),
        source_path: entry_point.to_string(),
        character_offset: 0,
    }
}

/// Converts a caught panic payload into a record.
pub fn sanitize_panic(payload: &(dyn Any + Send), entry_point: &str) -> ErrorRecord {
    let message = if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "The bundler stopped unexpectedly".to_string()
    };
    sanitize_message(message, entry_point)
}

fn strip_internal_note(message: &str) -> String {
    match message.find(NON_JS_IMPORT_NOTE) {
        Some(index) => message[..index].to_string(),
        None => message.to_string(),
    }
}

/// Converts a 0-based line and 1-based column into a byte offset.
///
/// Columns count characters, not bytes. Out-of-range lines yield `None`.
pub fn line_col_to_offset(source: &str, line: u32, column: u32) -> Option<u32> {
    let mut offset = 0usize;
    for (index, text) in source.split('\n').enumerate() {
        if index == line as usize {
            let col_bytes = text
                .char_indices()
                .nth(column.saturating_sub(1) as usize)
                .map_or(text.len(), |(pos, _)| pos);
            return u32::try_from(offset + col_bytes).ok();
        }
        offset += text.len() + 1;
    }
    None
}
