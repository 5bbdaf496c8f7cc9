// This file contains the poem record struct and related definitions.
#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};

// Records are addressed by convention as poem-<id>.json.
pub const POEM_FILE_PREFIX : &str = "poem-";
pub const POEM_FILE_SUFFIX : &str = ".json";

// ---------------------------------------------------------------------------
// PoemRecord:
// ---------------------------------------------------------------------------
/** One archived poem.  The date, category and location are free text that
 * is displayed and searched but never interpreted.
 */
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoemRecord {
    pub id: u32,
    pub title: String,
    pub date: String,
    pub category: String,
    pub location: String,
    pub content: String,
}

impl PoemRecord {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: u32,
        title: String,
        date: String,
        category: String,
        location: String,
        content: String,
    )
    -> PoemRecord {
        PoemRecord {id, title, date, category, location, content}
    }
}

// ---------------------------------------------------------------------------
// poem_file_name:
// ---------------------------------------------------------------------------
/** Return the resource name of a poem id, ex: poem-7.json */
pub fn poem_file_name(id: u32) -> String {
    format!("{}{}{}", POEM_FILE_PREFIX, id, POEM_FILE_SUFFIX)
}
