//! Read-only views returned by every orchestrator operation.
//!
//! Paths in views are absolute so callers can open them directly.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::session::{
    DetailState, Indexed, ReferenceItem, ResultItem, SectionType, Session, SessionKind,
    SessionStatus, SessionType, SwapState,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefEntry {
    pub index: u32,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section_type: Option<SectionType>,
}

/// Result state of one subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectStatus {
    pub index: u32,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    pub generated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapStatus {
    pub session_id: String,
    #[serde(rename = "type")]
    pub session_type: SessionType,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub subject_refs: Vec<RefEntry>,
    pub material_refs: Vec<RefEntry>,
    pub results: Vec<SubjectStatus>,
    pub notes: String,
}

impl SwapStatus {
    pub fn build(session: &Session, state: &SwapState, dir: &Path) -> Self {
        Self {
            session_id: session.session_id.clone(),
            session_type: session.session_type(),
            status: session.status,
            created_at: session.created_at,
            updated_at: session.updated_at,
            subject_refs: state.subject_refs.iter().map(ref_entry).collect(),
            material_refs: state.material_refs.iter().map(ref_entry).collect(),
            results: subject_statuses(
                state.subject_refs.iter().map(|r| (r.index, r.name.as_str())),
                &state.results,
                dir,
            ),
            notes: state.notes.clone(),
        }
    }

    pub fn pending_count(&self) -> usize {
        self.results.iter().filter(|r| !r.generated).count()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupStatus {
    pub group_id: String,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub front_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub back_name: Option<String>,
    pub complete: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub front: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub back: Option<PathBuf>,
    pub generated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailStatus {
    pub session_id: String,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_front: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_back: Option<String>,
    pub additional_notes: String,
    pub groups: Vec<GroupStatus>,
    pub sections: Vec<RefEntry>,
    pub section_results: Vec<SubjectStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_path: Option<PathBuf>,
}

impl DetailStatus {
    pub fn build(session: &Session, state: &DetailState, dir: &Path) -> Self {
        let step1: HashMap<&str, _> = state
            .step1_results
            .iter()
            .map(|r| (r.group_id.as_str(), r))
            .collect();

        let groups = state
            .clothes_groups
            .iter()
            .map(|g| {
                let result = step1.get(g.group_id.as_str());
                GroupStatus {
                    group_id: g.group_id.clone(),
                    label: g.label.clone(),
                    front_name: g.front.as_ref().map(|r| r.name.clone()),
                    back_name: g.back.as_ref().map(|r| r.name.clone()),
                    complete: g.is_complete(),
                    front: result.map(|r| dir.join(&r.front)),
                    back: result.map(|r| dir.join(&r.back)),
                    generated: result.is_some(),
                }
            })
            .collect();

        Self {
            session_id: session.session_id.clone(),
            status: session.status,
            created_at: session.created_at,
            updated_at: session.updated_at,
            model_front: state.model_front.as_ref().map(|r| r.name.clone()),
            model_back: state.model_back.as_ref().map(|r| r.name.clone()),
            additional_notes: state.additional_notes.clone(),
            groups,
            sections: state
                .detail_refs
                .iter()
                .map(|r| RefEntry {
                    index: r.index,
                    name: r.name.clone(),
                    section_type: Some(r.section_type),
                })
                .collect(),
            section_results: subject_statuses(
                state.detail_refs.iter().map(|r| (r.index, r.name.as_str())),
                &state.step2_results,
                dir,
            ),
            final_path: state.final_path.as_ref().map(|p| dir.join(p)),
        }
    }
}

/// Status view for any session type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum SessionView {
    Detail(DetailStatus),
    Swap(SwapStatus),
}

impl SessionView {
    pub fn build(session: &Session, dir: &Path) -> Self {
        match &session.kind {
            SessionKind::Detail(state) => SessionView::Detail(DetailStatus::build(session, state, dir)),
            SessionKind::Retouch(state) | SessionKind::ClothingDetail(state) => {
                SessionView::Swap(SwapStatus::build(session, state, dir))
            }
        }
    }
}

/// Outcome of a batch: the new state plus how the batch went.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport<S> {
    pub status: S,
    /// Units that produced a result in this batch.
    pub new_count: usize,
    pub failed_count: usize,
}

fn ref_entry(item: &ReferenceItem) -> RefEntry {
    RefEntry {
        index: item.index,
        name: item.name.clone(),
        section_type: None,
    }
}

fn subject_statuses<'a>(
    subjects: impl Iterator<Item = (u32, &'a str)>,
    results: &[ResultItem],
    dir: &Path,
) -> Vec<SubjectStatus> {
    let by_index: HashMap<u32, &ResultItem> = results.iter().map(|r| (r.index(), r)).collect();
    subjects
        .map(|(index, name)| {
            let result = by_index.get(&index);
            SubjectStatus {
                index,
                name: name.to_string(),
                path: result.map(|r| dir.join(&r.path)),
                generated: result.is_some(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{Group, GroupResult, SectionRef};

    fn item(index: u32, name: &str) -> ReferenceItem {
        ReferenceItem {
            index,
            name: name.into(),
            path: PathBuf::from(format!("input/{}", name)),
        }
    }

    #[test]
    fn test_swap_status_marks_generated() {
        let mut session = Session::new("1-abcdef".into(), SessionType::Retouch);
        let state = session.swap_mut(SessionType::Retouch).unwrap();
        state.subject_refs = vec![item(0, "a.jpg"), item(2, "c.jpg")];
        state.material_refs = vec![item(0, "shirt.jpg")];
        state.results = vec![ResultItem {
            index: 2,
            path: "retouch/result-03.jpg".into(),
        }];
        let state = state.clone();

        let status = SwapStatus::build(&session, &state, Path::new("/sessions/1-abcdef"));

        assert_eq!(status.results.len(), 2);
        assert!(!status.results[0].generated);
        assert!(status.results[0].path.is_none());
        assert!(status.results[1].generated);
        assert_eq!(
            status.results[1].path.as_deref(),
            Some(Path::new("/sessions/1-abcdef/retouch/result-03.jpg"))
        );
        assert_eq!(status.pending_count(), 1);
    }

    #[test]
    fn test_detail_status_groups_and_sections() {
        let mut session = Session::new("1-abcdef".into(), SessionType::Detail);
        let state = session.detail_mut().unwrap();
        state.clothes_groups = vec![
            Group {
                group_id: "red".into(),
                label: "Red".into(),
                front: Some(item(0, "red-f.jpg")),
                back: Some(item(0, "red-b.jpg")),
            },
            Group {
                group_id: "blue".into(),
                label: "Blue".into(),
                front: Some(item(0, "blue-f.jpg")),
                back: None,
            },
        ];
        state.step1_results = vec![GroupResult {
            group_id: "red".into(),
            front: "step1/red-front.jpg".into(),
            back: "step1/red-back.jpg".into(),
        }];
        state.detail_refs = vec![SectionRef {
            index: 0,
            name: "hero.jpg".into(),
            path: "input/detail-refs/01.jpg".into(),
            section_type: SectionType::Showcase,
        }];
        let state = state.clone();

        let status = DetailStatus::build(&session, &state, Path::new("/s"));

        assert!(status.groups[0].complete && status.groups[0].generated);
        assert!(!status.groups[1].complete && !status.groups[1].generated);
        assert_eq!(status.sections[0].section_type, Some(SectionType::Showcase));
        assert!(!status.section_results[0].generated);

        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["sections"][0]["sectionType"], "showcase");
        assert!(json.get("finalPath").is_none());
    }
}
