use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionType {
    Detail,
    Retouch,
    ClothingDetail,
}

impl SessionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionType::Detail => "detail",
            SessionType::Retouch => "retouch",
            SessionType::ClothingDetail => "clothingDetail",
        }
    }
}

impl fmt::Display for SessionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "detail" => Ok(SessionType::Detail),
            "retouch" => Ok(SessionType::Retouch),
            "clothingDetail" | "clothing-detail" | "clothing_detail" => {
                Ok(SessionType::ClothingDetail)
            }
            other => Err(format!("unknown session type: {}", other)),
        }
    }
}

/// Coarse lifecycle marker. Only ever moves forward; see [`Session::advance`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    Uploading,
    Step1Done,
    Step2Done,
    Generated,
    Finished,
}

/// An uploaded reference image. `index` is permanent for the life of the
/// item and never reused within its list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceItem {
    pub index: u32,
    /// Original upload name, display only.
    pub name: String,
    /// Relative to the session directory.
    pub path: PathBuf,
}

/// Role of a detail-page section. Unknown values read back as `Detail`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SectionType {
    #[default]
    Detail,
    Showcase,
    Highlight,
}

impl SectionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SectionType::Detail => "detail",
            SectionType::Showcase => "showcase",
            SectionType::Highlight => "highlight",
        }
    }
}

impl From<String> for SectionType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "showcase" => SectionType::Showcase,
            "highlight" => SectionType::Highlight,
            _ => SectionType::Detail,
        }
    }
}

impl From<SectionType> for String {
    fn from(value: SectionType) -> Self {
        value.as_str().to_string()
    }
}

impl FromStr for SectionType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(SectionType::from(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionRef {
    pub index: u32,
    pub name: String,
    pub path: PathBuf,
    #[serde(default)]
    pub section_type: SectionType,
}

/// Generated output for the subject with the same index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultItem {
    pub index: u32,
    pub path: PathBuf,
}

/// Anything carrying a permanent index.
pub trait Indexed {
    fn index(&self) -> u32;
}

impl Indexed for ReferenceItem {
    fn index(&self) -> u32 {
        self.index
    }
}

impl Indexed for SectionRef {
    fn index(&self) -> u32 {
        self.index
    }
}

impl Indexed for ResultItem {
    fn index(&self) -> u32 {
        self.index
    }
}

/// Front or back of a garment or model photo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Front,
    Back,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Front => "front",
            Side::Back => "back",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "front" => Ok(Side::Front),
            "back" => Ok(Side::Back),
            other => Err(format!("unknown side: {}", other)),
        }
    }
}

/// One garment: a front and a back photo. Step 1 only runs for complete groups.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub group_id: String,
    #[serde(default)]
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub front: Option<ReferenceItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub back: Option<ReferenceItem>,
}

impl Group {
    pub fn is_complete(&self) -> bool {
        self.front.is_some() && self.back.is_some()
    }

    pub fn side(&self, side: Side) -> Option<&ReferenceItem> {
        match side {
            Side::Front => self.front.as_ref(),
            Side::Back => self.back.as_ref(),
        }
    }

    pub fn side_mut(&mut self, side: Side) -> &mut Option<ReferenceItem> {
        match side {
            Side::Front => &mut self.front,
            Side::Back => &mut self.back,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupResult {
    pub group_id: String,
    pub front: PathBuf,
    pub back: PathBuf,
}

impl GroupResult {
    pub fn side(&self, side: Side) -> &PathBuf {
        match side {
            Side::Front => &self.front,
            Side::Back => &self.back,
        }
    }
}

/// State shared by the retouch and clothing-detail flows: every subject
/// image gets the material images applied to it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SwapState {
    pub subject_refs: Vec<ReferenceItem>,
    pub material_refs: Vec<ReferenceItem>,
    pub results: Vec<ResultItem>,
    pub notes: String,
    /// Next index to hand out per list. Never decreases.
    pub next_subject_index: u32,
    pub next_material_index: u32,
}

/// State of the two-step detail-page flow.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DetailState {
    pub model_front: Option<ReferenceItem>,
    pub model_back: Option<ReferenceItem>,
    pub clothes_groups: Vec<Group>,
    pub additional_notes: String,
    pub step1_results: Vec<GroupResult>,
    pub detail_refs: Vec<SectionRef>,
    pub step2_results: Vec<ResultItem>,
    pub final_path: Option<PathBuf>,
    pub next_section_index: u32,
}

impl DetailState {
    pub fn model(&self, side: Side) -> Option<&ReferenceItem> {
        match side {
            Side::Front => self.model_front.as_ref(),
            Side::Back => self.model_back.as_ref(),
        }
    }

    pub fn model_mut(&mut self, side: Side) -> &mut Option<ReferenceItem> {
        match side {
            Side::Front => &mut self.model_front,
            Side::Back => &mut self.model_back,
        }
    }

    /// Drops the stitched page after the section set changed, returning its
    /// path so the caller can remove the file.
    pub fn take_final(&mut self) -> Option<PathBuf> {
        self.final_path.take()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SessionKind {
    Detail(DetailState),
    Retouch(SwapState),
    ClothingDetail(SwapState),
}

impl SessionKind {
    pub fn empty(session_type: SessionType) -> Self {
        match session_type {
            SessionType::Detail => SessionKind::Detail(DetailState::default()),
            SessionType::Retouch => SessionKind::Retouch(SwapState::default()),
            SessionType::ClothingDetail => SessionKind::ClothingDetail(SwapState::default()),
        }
    }

    pub fn session_type(&self) -> SessionType {
        match self {
            SessionKind::Detail(_) => SessionType::Detail,
            SessionKind::Retouch(_) => SessionType::Retouch,
            SessionKind::ClothingDetail(_) => SessionType::ClothingDetail,
        }
    }
}

/// The persisted session document (`meta.json`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub status: SessionStatus,
    #[serde(flatten)]
    pub kind: SessionKind,
}

impl Session {
    pub fn new(session_id: String, session_type: SessionType) -> Self {
        let now = Utc::now();
        Self {
            session_id,
            created_at: now,
            updated_at: now,
            status: SessionStatus::Uploading,
            kind: SessionKind::empty(session_type),
        }
    }

    pub fn session_type(&self) -> SessionType {
        self.kind.session_type()
    }

    /// Moves the status forward to `next`. Never moves it back.
    pub fn advance(&mut self, next: SessionStatus) {
        if next > self.status {
            self.status = next;
        }
    }

    /// Moves the status back to `to` when it is past it. Only used when the
    /// artifact of a later phase is discarded.
    pub fn rewind(&mut self, to: SessionStatus) {
        if self.status > to {
            self.status = to;
        }
    }

    pub fn detail(&self) -> Option<&DetailState> {
        match &self.kind {
            SessionKind::Detail(state) => Some(state),
            _ => None,
        }
    }

    pub fn detail_mut(&mut self) -> Option<&mut DetailState> {
        match &mut self.kind {
            SessionKind::Detail(state) => Some(state),
            _ => None,
        }
    }

    /// Swap state, if this session is of the given swap type.
    pub fn swap(&self, session_type: SessionType) -> Option<&SwapState> {
        match (&self.kind, session_type) {
            (SessionKind::Retouch(state), SessionType::Retouch)
            | (SessionKind::ClothingDetail(state), SessionType::ClothingDetail) => Some(state),
            _ => None,
        }
    }

    pub fn swap_mut(&mut self, session_type: SessionType) -> Option<&mut SwapState> {
        match (&mut self.kind, session_type) {
            (SessionKind::Retouch(state), SessionType::Retouch)
            | (SessionKind::ClothingDetail(state), SessionType::ClothingDetail) => Some(state),
            _ => None,
        }
    }

    /// Listing view. For detail sessions the counts are garment groups,
    /// section references and generated sections.
    pub fn summary(&self) -> SessionSummary {
        let (subject_count, material_count, result_count) = match &self.kind {
            SessionKind::Detail(state) => (
                state.clothes_groups.len(),
                state.detail_refs.len(),
                state.step2_results.len(),
            ),
            SessionKind::Retouch(state) | SessionKind::ClothingDetail(state) => (
                state.subject_refs.len(),
                state.material_refs.len(),
                state.results.len(),
            ),
        };
        SessionSummary {
            session_id: self.session_id.clone(),
            session_type: self.session_type(),
            status: self.status,
            created_at: self.created_at,
            updated_at: self.updated_at,
            subject_count,
            material_count,
            result_count,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub session_id: String,
    #[serde(rename = "type")]
    pub session_type: SessionType,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub subject_count: usize,
    pub material_count: usize,
    pub result_count: usize,
}
