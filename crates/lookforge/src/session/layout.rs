//! On-disk layout of a session directory.
//!
//! ```text
//! <sessions root>/<session id>/
//! ├── meta.json
//! ├── input/...            uploaded references
//! └── <output dirs>/...    generated images
//! ```
//!
//! Every path stored inside a session document is relative to the session
//! directory.

use std::path::PathBuf;

use super::model::SessionType;

pub const META_FILE: &str = "meta.json";

// detail
pub const MODEL_INPUT_DIR: &str = "input/model";
pub const CLOTHES_INPUT_DIR: &str = "input/clothes";
pub const SECTION_INPUT_DIR: &str = "input/detail-refs";
pub const STEP1_DIR: &str = "step1";
pub const STEP2_DIR: &str = "step2";
pub const FINAL_DIR: &str = "final";
pub const FINAL_FILE: &str = "final/detail-page.jpg";

// retouch
pub const RETOUCH_INPUT_DIR: &str = "input/retouch";
pub const RETOUCH_OUTPUT_DIR: &str = "retouch";

// clothingDetail
pub const CLOTHING_DETAIL_INPUT_DIR: &str = "input/clothing-detail";
pub const CLOTHING_DETAIL_OUTPUT_DIR: &str = "clothing-detail";

/// Directories created up front for a fresh session of the given type.
pub fn skeleton(session_type: SessionType) -> &'static [&'static str] {
    match session_type {
        SessionType::Detail => &[
            MODEL_INPUT_DIR,
            CLOTHES_INPUT_DIR,
            SECTION_INPUT_DIR,
            STEP1_DIR,
            STEP2_DIR,
            FINAL_DIR,
        ],
        SessionType::Retouch => &[RETOUCH_INPUT_DIR, RETOUCH_OUTPUT_DIR],
        SessionType::ClothingDetail => &[CLOTHING_DETAIL_INPUT_DIR, CLOTHING_DETAIL_OUTPUT_DIR],
    }
}

/// Human-facing, one-based, zero-padded label for an index: 0 -> "01".
pub fn label(index: u32) -> String {
    format!("{:02}", u64::from(index) + 1)
}

pub fn section_ref_path(index: u32, ext: &str) -> PathBuf {
    PathBuf::from(SECTION_INPUT_DIR).join(format!("{}{}", label(index), ext))
}

pub fn section_result_path(index: u32) -> PathBuf {
    PathBuf::from(STEP2_DIR).join(format!("section-{}.jpg", label(index)))
}

pub fn group_input_path(group_id: &str, side: &str, ext: &str) -> PathBuf {
    PathBuf::from(CLOTHES_INPUT_DIR).join(format!("{}-{}{}", group_id, side, ext))
}

pub fn group_result_path(group_id: &str, side: &str) -> PathBuf {
    PathBuf::from(STEP1_DIR).join(format!("{}-{}.jpg", group_id, side))
}

pub fn model_input_path(side: &str, ext: &str) -> PathBuf {
    PathBuf::from(MODEL_INPUT_DIR).join(format!("{}{}", side, ext))
}
