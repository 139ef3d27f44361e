//! Step 1 of a detail session: photos of the model wearing each garment
//! group, front and back.

use std::path::{Path, PathBuf};

use rand::seq::SliceRandom;
use tracing::Instrument;

use crate::prompts::{model_prompt, PromptOptions};
use crate::sanitize::{is_safe_token, redact_path};
use crate::session::layout::{group_input_path, group_result_path, model_input_path};
use crate::session::{
    DetailState, Group, GroupResult, ReferenceItem, Session, SessionStatus, SessionType, Side,
};
use crate::storage::FileStorage;
use crate::worker::run_bounded;

use super::context::PipelineContext;
use super::error::PipelineError;
use super::status::{BatchReport, DetailStatus};
use super::unit::{run_unit, UnitRequest};
use super::upload::{store_upload, UploadFile};

const POSE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp"];

/// Inputs for one garment group, copied out of the session.
#[derive(Debug, Clone)]
struct GroupJob {
    group_id: String,
    model_front: PathBuf,
    model_back: PathBuf,
    garment_front: PathBuf,
    garment_back: PathBuf,
    notes: String,
}

impl GroupJob {
    fn model(&self, side: Side) -> &Path {
        match side {
            Side::Front => &self.model_front,
            Side::Back => &self.model_back,
        }
    }

    fn garment(&self, side: Side) -> &Path {
        match side {
            Side::Front => &self.garment_front,
            Side::Back => &self.garment_back,
        }
    }
}

pub struct ModelImagePipeline {
    ctx: PipelineContext,
}

impl ModelImagePipeline {
    pub fn new(ctx: PipelineContext) -> Self {
        Self { ctx }
    }

    pub fn status(&self, session: &Session) -> Result<DetailStatus, PipelineError> {
        let state = detail(session)?;
        let dir = self.ctx.store.session_dir(&session.session_id)?;
        Ok(DetailStatus::build(session, state, &dir))
    }

    /// Stores the model's front or back photo, replacing any earlier one.
    pub async fn upload_model(
        &self,
        session: &mut Session,
        side: Side,
        upload: &UploadFile,
    ) -> Result<DetailStatus, PipelineError> {
        detail(session)?;
        let files = self.ctx.files(session)?;
        let path = model_input_path(side.as_str(), &upload.extension());
        store_upload(&files, &path, upload).await?;

        let previous = detail_mut(session)?.model_mut(side).replace(ReferenceItem {
            index: 0,
            name: upload.name.clone(),
            path: path.clone(),
        });
        self.ctx.store.save(session).await?;

        if let Some(old) = previous.filter(|old| old.path != path) {
            files.remove_best_effort(&old.path).await;
        }
        self.status(session)
    }

    /// Stores one side of a garment group. The group is created on first
    /// upload; `label` renames it when given.
    pub async fn upload_garment(
        &self,
        session: &mut Session,
        group_id: &str,
        side: Side,
        upload: &UploadFile,
        label: Option<&str>,
    ) -> Result<DetailStatus, PipelineError> {
        if !is_safe_token(group_id) {
            return Err(PipelineError::Validation(format!(
                "group id '{}' may only contain letters, digits, '-' and '_'",
                group_id
            )));
        }
        detail(session)?;
        let files = self.ctx.files(session)?;
        let path = group_input_path(group_id, side.as_str(), &upload.extension());
        store_upload(&files, &path, upload).await?;

        let state = detail_mut(session)?;
        let group = match state.clothes_groups.iter().position(|g| g.group_id == group_id) {
            Some(pos) => &mut state.clothes_groups[pos],
            None => {
                state.clothes_groups.push(Group {
                    group_id: group_id.to_string(),
                    label: group_id.to_string(),
                    front: None,
                    back: None,
                });
                let last = state.clothes_groups.len() - 1;
                &mut state.clothes_groups[last]
            }
        };
        if let Some(label) = label.map(str::trim).filter(|l| !l.is_empty()) {
            group.label = label.to_string();
        }
        let previous = group.side_mut(side).replace(ReferenceItem {
            index: 0,
            name: upload.name.clone(),
            path: path.clone(),
        });
        self.ctx.store.save(session).await?;

        if let Some(old) = previous.filter(|old| old.path != path) {
            files.remove_best_effort(&old.path).await;
        }
        self.status(session)
    }

    /// Drops a garment group together with its step-1 result and files.
    pub async fn remove_group(
        &self,
        session: &mut Session,
        group_id: &str,
    ) -> Result<DetailStatus, PipelineError> {
        let files = self.ctx.files(session)?;
        let state = detail_mut(session)?;

        let pos = state
            .clothes_groups
            .iter()
            .position(|g| g.group_id == group_id)
            .ok_or_else(|| PipelineError::UnknownGroup(group_id.to_string()))?;
        let group = state.clothes_groups.remove(pos);
        let result_pos = state.step1_results.iter().position(|r| r.group_id == group_id);
        let result = result_pos.map(|p| state.step1_results.remove(p));

        self.ctx.store.save(session).await?;

        for item in [group.front, group.back].into_iter().flatten() {
            files.remove_best_effort(&item.path).await;
        }
        if let Some(result) = result {
            files.remove_best_effort(&result.front).await;
            files.remove_best_effort(&result.back).await;
        }
        tracing::info!(session_id = %session.session_id, group_id, "removed garment group");
        self.status(session)
    }

    /// Generates front and back photos for every complete group that has no
    /// result yet.
    pub async fn generate(
        &self,
        session: &mut Session,
        notes: Option<String>,
    ) -> Result<BatchReport<DetailStatus>, PipelineError> {
        let state = detail(session)?;

        let (Some(model_front), Some(model_back)) = (&state.model_front, &state.model_back) else {
            return Err(PipelineError::Validation(
                "upload the model's front and back photos first".into(),
            ));
        };
        let complete: Vec<&Group> = state.clothes_groups.iter().filter(|g| g.is_complete()).collect();
        if complete.is_empty() {
            return Err(PipelineError::Validation(
                "upload at least one garment group with both front and back".into(),
            ));
        }

        let notes = notes.unwrap_or_else(|| state.additional_notes.clone());
        let jobs: Vec<GroupJob> = complete
            .into_iter()
            .filter(|g| !state.step1_results.iter().any(|r| r.group_id == g.group_id))
            .filter_map(|g| {
                Some(GroupJob {
                    group_id: g.group_id.clone(),
                    model_front: model_front.path.clone(),
                    model_back: model_back.path.clone(),
                    garment_front: g.front.as_ref()?.path.clone(),
                    garment_back: g.back.as_ref()?.path.clone(),
                    notes: notes.clone(),
                })
            })
            .collect();
        if jobs.is_empty() {
            return Err(PipelineError::NothingPending(
                "every complete garment group already has model photos".into(),
            ));
        }

        detail_mut(session)?.additional_notes = notes;

        let files = self.ctx.files(session)?;
        let ctx = &self.ctx;
        let tasks: Vec<_> = jobs
            .iter()
            .map(|job| {
                let files = &files;
                async move { render_group(ctx, files, job).await }
                    .instrument(tracing::info_span!("unit", group_id = %job.group_id))
            })
            .collect();

        let span = tracing::info_span!(
            "batch",
            session_id = %session.session_id,
            kind = "model",
            pending = jobs.len()
        );
        let outcomes = run_bounded(tasks, ctx.config.concurrency, ctx.progress.as_ref())
            .instrument(span)
            .await;

        let total = outcomes.len();
        let produced: Vec<GroupResult> = outcomes.into_iter().flatten().collect();
        let new_count = produced.len();

        let state = detail_mut(session)?;
        for result in produced {
            upsert_group_result(&mut state.step1_results, result);
        }
        if !state.step1_results.is_empty() {
            session.advance(SessionStatus::Step1Done);
        }
        self.ctx.store.save(session).await?;

        Ok(BatchReport {
            status: self.status(session)?,
            new_count,
            failed_count: total - new_count,
        })
    }

    /// Re-renders one side of one group.
    pub async fn regenerate(
        &self,
        session: &mut Session,
        group_id: &str,
        side: Side,
        adjustment: Option<&str>,
    ) -> Result<DetailStatus, PipelineError> {
        let state = detail(session)?;
        let group = state
            .clothes_groups
            .iter()
            .find(|g| g.group_id == group_id)
            .ok_or_else(|| PipelineError::UnknownGroup(group_id.to_string()))?;
        let (Some(model_front), Some(model_back)) = (&state.model_front, &state.model_back) else {
            return Err(PipelineError::Validation(
                "upload the model's front and back photos first".into(),
            ));
        };
        let (Some(garment_front), Some(garment_back)) = (&group.front, &group.back) else {
            return Err(PipelineError::Validation(format!(
                "garment group '{}' needs both front and back photos",
                group_id
            )));
        };
        let job = GroupJob {
            group_id: group_id.to_string(),
            model_front: model_front.path.clone(),
            model_back: model_back.path.clone(),
            garment_front: garment_front.path.clone(),
            garment_back: garment_back.path.clone(),
            notes: state.additional_notes.clone(),
        };

        let files = self.ctx.files(session)?;
        let path = render_side(&self.ctx, &files, &job, side, adjustment)
            .instrument(tracing::info_span!(
                "regenerate",
                session_id = %session.session_id,
                group_id,
                side = side.as_str()
            ))
            .await?;

        let other = match side {
            Side::Front => Side::Back,
            Side::Back => Side::Front,
        };
        let other_path = group_result_path(group_id, other.as_str());
        let other_exists = files.exists(&other_path).await;

        let state = detail_mut(session)?;
        match state.step1_results.iter_mut().find(|r| r.group_id == group_id) {
            Some(existing) => match side {
                Side::Front => existing.front = path,
                Side::Back => existing.back = path,
            },
            None if other_exists => {
                let (front, back) = match side {
                    Side::Front => (path, other_path),
                    Side::Back => (other_path, path),
                };
                state.step1_results.push(GroupResult {
                    group_id: group_id.to_string(),
                    front,
                    back,
                });
            }
            None => {
                tracing::info!(group_id, "other side not generated yet, result deferred");
            }
        }
        if !state.step1_results.is_empty() {
            session.advance(SessionStatus::Step1Done);
        }
        self.ctx.store.save(session).await?;
        self.status(session)
    }
}

async fn render_group(
    ctx: &PipelineContext,
    files: &FileStorage,
    job: &GroupJob,
) -> Result<GroupResult, PipelineError> {
    let front = render_side(ctx, files, job, Side::Front, None).await?;
    let back = render_side(ctx, files, job, Side::Back, None).await?;
    Ok(GroupResult {
        group_id: job.group_id.clone(),
        front,
        back,
    })
}

async fn render_side(
    ctx: &PipelineContext,
    files: &FileStorage,
    job: &GroupJob,
    side: Side,
    adjustment: Option<&str>,
) -> Result<PathBuf, PipelineError> {
    let mut inputs = vec![job.model(side).to_path_buf(), job.garment(side).to_path_buf()];
    if let Some(pose) = pick_pose(ctx.config.poses_dir.as_deref()).await {
        tracing::debug!(pose = %redact_path(&pose), "attaching pose reference");
        inputs.push(pose);
    }

    let prompt = model_prompt(
        side,
        &PromptOptions {
            additional_notes: &job.notes,
            adjustment,
            material_count: 1,
        },
    );
    run_unit(
        ctx,
        files,
        UnitRequest {
            prompt,
            inputs,
            output: group_result_path(&job.group_id, side.as_str()),
        },
    )
    .await
}

/// A uniformly random image from the pose pool, as an absolute path.
/// A missing or empty pool yields `None`.
pub async fn pick_pose(dir: Option<&Path>) -> Option<PathBuf> {
    let dir = dir?;
    let dir = match tokio::fs::canonicalize(dir).await {
        Ok(dir) => dir,
        Err(e) => {
            tracing::warn!(dir = %dir.display(), error = %e, "pose directory unavailable");
            return None;
        }
    };

    let mut entries = tokio::fs::read_dir(&dir).await.ok()?;
    let mut poses = Vec::new();
    while let Ok(Some(entry)) = entries.next_entry().await {
        let path = entry.path();
        let is_image = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| POSE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()));
        if is_image {
            poses.push(path);
        }
    }
    poses.sort();

    if poses.is_empty() {
        tracing::warn!(dir = %dir.display(), "pose directory has no images");
        return None;
    }
    poses.choose(&mut rand::thread_rng()).cloned()
}

fn upsert_group_result(results: &mut Vec<GroupResult>, result: GroupResult) {
    match results.iter_mut().find(|r| r.group_id == result.group_id) {
        Some(existing) => *existing = result,
        None => results.push(result),
    }
}

fn detail(session: &Session) -> Result<&DetailState, PipelineError> {
    let actual = session.session_type();
    session.detail().ok_or(PipelineError::WrongSessionType {
        expected: SessionType::Detail,
        actual,
    })
}

fn detail_mut(session: &mut Session) -> Result<&mut DetailState, PipelineError> {
    let actual = session.session_type();
    session.detail_mut().ok_or(PipelineError::WrongSessionType {
        expected: SessionType::Detail,
        actual,
    })
}
