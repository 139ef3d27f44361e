//! Retouch and clothing-detail orchestration.
//!
//! Both flows apply every material image to each subject image, one
//! generation call per subject. They differ only in file names and prompt,
//! captured by [`SwapFlavor`].

use std::path::PathBuf;
use std::str::FromStr;

use tracing::Instrument;

use crate::prompts::{clothing_detail_prompt, retouch_prompt, PromptOptions};
use crate::sanitize::redact_path;
use crate::session::layout::{
    self, CLOTHING_DETAIL_INPUT_DIR, CLOTHING_DETAIL_OUTPUT_DIR, RETOUCH_INPUT_DIR,
    RETOUCH_OUTPUT_DIR,
};
use crate::session::{ReferenceItem, ResultItem, Session, SessionStatus, SessionType, SwapState};
use crate::worker::run_bounded;

use super::context::PipelineContext;
use super::error::PipelineError;
use super::pending::{next_index, pending, remove_result, upsert_result};
use super::status::{BatchReport, SwapStatus};
use super::unit::{run_unit, UnitRequest};
use super::upload::{store_upload, UploadFile};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapFlavor {
    Retouch,
    ClothingDetail,
}

impl SwapFlavor {
    pub fn session_type(self) -> SessionType {
        match self {
            SwapFlavor::Retouch => SessionType::Retouch,
            SwapFlavor::ClothingDetail => SessionType::ClothingDetail,
        }
    }

    pub fn from_session_type(session_type: SessionType) -> Option<Self> {
        match session_type {
            SessionType::Retouch => Some(SwapFlavor::Retouch),
            SessionType::ClothingDetail => Some(SwapFlavor::ClothingDetail),
            SessionType::Detail => None,
        }
    }

    fn input_dir(self) -> &'static str {
        match self {
            SwapFlavor::Retouch => RETOUCH_INPUT_DIR,
            SwapFlavor::ClothingDetail => CLOTHING_DETAIL_INPUT_DIR,
        }
    }

    fn output_dir(self) -> &'static str {
        match self {
            SwapFlavor::Retouch => RETOUCH_OUTPUT_DIR,
            SwapFlavor::ClothingDetail => CLOTHING_DETAIL_OUTPUT_DIR,
        }
    }

    fn subject_prefix(self) -> &'static str {
        match self {
            SwapFlavor::Retouch => "model-ref",
            SwapFlavor::ClothingDetail => "detail-ref",
        }
    }

    fn subject_noun(self) -> &'static str {
        match self {
            SwapFlavor::Retouch => "model reference",
            SwapFlavor::ClothingDetail => "detail reference",
        }
    }

    pub fn ref_path(self, role: RefRole, index: u32, ext: &str) -> PathBuf {
        let prefix = match role {
            RefRole::Subject => self.subject_prefix(),
            RefRole::Material => "clothing",
        };
        PathBuf::from(self.input_dir()).join(format!("{}-{}{}", prefix, layout::label(index), ext))
    }

    pub fn result_path(self, index: u32) -> PathBuf {
        PathBuf::from(self.output_dir()).join(format!("result-{}.jpg", layout::label(index)))
    }

    fn prompt(self, options: &PromptOptions<'_>) -> String {
        match self {
            SwapFlavor::Retouch => retouch_prompt(options),
            SwapFlavor::ClothingDetail => clothing_detail_prompt(options),
        }
    }
}

/// Which reference list an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefRole {
    /// The images being edited (model shots, detail shots).
    Subject,
    /// The clothing photos applied to every subject.
    Material,
}

impl RefRole {
    fn kind(self) -> &'static str {
        match self {
            RefRole::Subject => "subject reference",
            RefRole::Material => "material reference",
        }
    }
}

impl FromStr for RefRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "subject" | "model" | "detail" => Ok(RefRole::Subject),
            "material" | "clothing" => Ok(RefRole::Material),
            other => Err(format!("unknown reference role: {}", other)),
        }
    }
}

pub struct SwapPipeline {
    ctx: PipelineContext,
    flavor: SwapFlavor,
}

impl SwapPipeline {
    pub fn new(ctx: PipelineContext, flavor: SwapFlavor) -> Self {
        Self { ctx, flavor }
    }

    pub fn flavor(&self) -> SwapFlavor {
        self.flavor
    }

    pub fn status(&self, session: &Session) -> Result<SwapStatus, PipelineError> {
        let state = self.state(session)?;
        let dir = self.ctx.store.session_dir(&session.session_id)?;
        Ok(SwapStatus::build(session, state, &dir))
    }

    /// Appends uploaded images to the subject or material list. Indices
    /// continue from the largest one ever assigned.
    pub async fn upload(
        &self,
        session: &mut Session,
        role: RefRole,
        uploads: &[UploadFile],
    ) -> Result<SwapStatus, PipelineError> {
        if uploads.is_empty() {
            return Err(PipelineError::Validation("no files supplied".into()));
        }
        let state = self.state(session)?;
        let mut index = next_index(high_water(state, role), refs(state, role));
        let files = self.ctx.files(session)?;

        let mut added = Vec::with_capacity(uploads.len());
        for upload in uploads {
            let path = self.flavor.ref_path(role, index, &upload.extension());
            store_upload(&files, &path, upload).await?;
            added.push(ReferenceItem {
                index,
                name: upload.name.clone(),
                path,
            });
            index += 1;
        }

        let count = added.len();
        let state = self.state_mut(session)?;
        refs_mut(state, role).extend(added);
        *high_water_mut(state, role) = index;
        self.ctx.store.save(session).await?;

        tracing::info!(
            session_id = %session.session_id,
            role = role.kind(),
            count,
            "stored uploads"
        );
        self.status(session)
    }

    /// Generates a result for every subject that has none. Failed units stay
    /// pending; rerunning picks them up.
    pub async fn generate(
        &self,
        session: &mut Session,
        notes: Option<String>,
    ) -> Result<BatchReport<SwapStatus>, PipelineError> {
        let flavor = self.flavor;
        let state = self.state(session)?;

        if state.subject_refs.is_empty() {
            return Err(PipelineError::Validation(format!(
                "upload at least one {} first",
                flavor.subject_noun()
            )));
        }
        if state.material_refs.is_empty() {
            return Err(PipelineError::Validation(
                "upload at least one clothing reference first".into(),
            ));
        }
        let todo: Vec<ReferenceItem> = pending(&state.subject_refs, &state.results)
            .into_iter()
            .cloned()
            .collect();
        if todo.is_empty() {
            return Err(PipelineError::NothingPending(format!(
                "every {} already has a result",
                flavor.subject_noun()
            )));
        }

        if let Some(notes) = notes {
            self.state_mut(session)?.notes = notes;
        }
        let state = self.state(session)?;
        let materials: Vec<PathBuf> = state.material_refs.iter().map(|r| r.path.clone()).collect();
        let prompt = flavor.prompt(&PromptOptions {
            additional_notes: &state.notes,
            adjustment: None,
            material_count: materials.len(),
        });

        let files = self.ctx.files(session)?;
        let ctx = &self.ctx;
        let tasks: Vec<_> = todo
            .iter()
            .map(|subject| {
                let index = subject.index;
                let mut inputs = Vec::with_capacity(materials.len() + 1);
                inputs.push(subject.path.clone());
                inputs.extend(materials.iter().cloned());
                let request = UnitRequest {
                    prompt: prompt.clone(),
                    inputs,
                    output: flavor.result_path(index),
                };
                let files = &files;
                async move {
                    run_unit(ctx, files, request)
                        .await
                        .map(|path| ResultItem { index, path })
                }
                .instrument(tracing::info_span!("unit", index))
            })
            .collect();

        let span = tracing::info_span!(
            "batch",
            session_id = %session.session_id,
            kind = session.session_type().as_str(),
            pending = todo.len()
        );
        let outcomes = run_bounded(tasks, ctx.config.concurrency, ctx.progress.as_ref())
            .instrument(span)
            .await;

        let total = outcomes.len();
        let produced: Vec<ResultItem> = outcomes.into_iter().flatten().collect();
        let new_count = produced.len();

        let state = self.state_mut(session)?;
        for item in produced {
            upsert_result(&mut state.results, item);
        }
        if new_count > 0 {
            session.advance(SessionStatus::Generated);
        }
        self.ctx.store.save(session).await?;

        Ok(BatchReport {
            status: self.status(session)?,
            new_count,
            failed_count: total - new_count,
        })
    }

    /// Re-runs one subject unconditionally, replacing any existing result.
    pub async fn regenerate(
        &self,
        session: &mut Session,
        index: u32,
        adjustment: Option<&str>,
    ) -> Result<SwapStatus, PipelineError> {
        let flavor = self.flavor;
        let state = self.state(session)?;

        let subject = state
            .subject_refs
            .iter()
            .find(|r| r.index == index)
            .ok_or(PipelineError::UnknownIndex {
                kind: RefRole::Subject.kind(),
                index,
            })?;
        if state.material_refs.is_empty() {
            return Err(PipelineError::Validation(
                "upload at least one clothing reference first".into(),
            ));
        }

        let mut inputs = vec![subject.path.clone()];
        inputs.extend(state.material_refs.iter().map(|r| r.path.clone()));
        let request = UnitRequest {
            prompt: flavor.prompt(&PromptOptions {
                additional_notes: &state.notes,
                adjustment,
                material_count: state.material_refs.len(),
            }),
            inputs,
            output: flavor.result_path(index),
        };

        let files = self.ctx.files(session)?;
        let path = run_unit(&self.ctx, &files, request)
            .instrument(tracing::info_span!(
                "regenerate",
                session_id = %session.session_id,
                index
            ))
            .await?;

        upsert_result(&mut self.state_mut(session)?.results, ResultItem { index, path });
        session.advance(SessionStatus::Generated);
        self.ctx.store.save(session).await?;
        self.status(session)
    }

    /// Removes one reference. Deleting a subject also drops its result;
    /// files are removed best effort.
    pub async fn delete_ref(
        &self,
        session: &mut Session,
        role: RefRole,
        index: u32,
    ) -> Result<SwapStatus, PipelineError> {
        let files = self.ctx.files(session)?;
        let state = self.state_mut(session)?;

        let list = refs_mut(state, role);
        let pos = list
            .iter()
            .position(|r| r.index == index)
            .ok_or(PipelineError::UnknownIndex {
                kind: role.kind(),
                index,
            })?;
        let removed = list.remove(pos);
        let dropped_result = match role {
            RefRole::Subject => remove_result(&mut state.results, index),
            RefRole::Material => None,
        };

        self.ctx.store.save(session).await?;

        files.remove_best_effort(&removed.path).await;
        if let Some(result) = dropped_result {
            files.remove_best_effort(&result.path).await;
        }
        tracing::info!(
            session_id = %session.session_id,
            role = role.kind(),
            index,
            file = %redact_path(&removed.path),
            "deleted reference"
        );
        self.status(session)
    }

    fn state<'s>(&self, session: &'s Session) -> Result<&'s SwapState, PipelineError> {
        let expected = self.flavor.session_type();
        let actual = session.session_type();
        session
            .swap(expected)
            .ok_or(PipelineError::WrongSessionType { expected, actual })
    }

    fn state_mut<'s>(&self, session: &'s mut Session) -> Result<&'s mut SwapState, PipelineError> {
        let expected = self.flavor.session_type();
        let actual = session.session_type();
        session
            .swap_mut(expected)
            .ok_or(PipelineError::WrongSessionType { expected, actual })
    }
}

fn refs(state: &SwapState, role: RefRole) -> &[ReferenceItem] {
    match role {
        RefRole::Subject => &state.subject_refs,
        RefRole::Material => &state.material_refs,
    }
}

fn refs_mut(state: &mut SwapState, role: RefRole) -> &mut Vec<ReferenceItem> {
    match role {
        RefRole::Subject => &mut state.subject_refs,
        RefRole::Material => &mut state.material_refs,
    }
}

fn high_water(state: &SwapState, role: RefRole) -> u32 {
    match role {
        RefRole::Subject => state.next_subject_index,
        RefRole::Material => state.next_material_index,
    }
}

fn high_water_mut(state: &mut SwapState, role: RefRole) -> &mut u32 {
    match role {
        RefRole::Subject => &mut state.next_subject_index,
        RefRole::Material => &mut state.next_material_index,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_names_per_flavor() {
        assert_eq!(
            SwapFlavor::Retouch.ref_path(RefRole::Subject, 0, ".png"),
            PathBuf::from("input/retouch/model-ref-01.png")
        );
        assert_eq!(
            SwapFlavor::Retouch.ref_path(RefRole::Material, 11, ".jpg"),
            PathBuf::from("input/retouch/clothing-12.jpg")
        );
        assert_eq!(
            SwapFlavor::ClothingDetail.ref_path(RefRole::Subject, 2, ".webp"),
            PathBuf::from("input/clothing-detail/detail-ref-03.webp")
        );
        assert_eq!(
            SwapFlavor::ClothingDetail.result_path(0),
            PathBuf::from("clothing-detail/result-01.jpg")
        );
    }

    #[test]
    fn test_role_parsing() {
        assert_eq!("model".parse::<RefRole>().unwrap(), RefRole::Subject);
        assert_eq!("detail".parse::<RefRole>().unwrap(), RefRole::Subject);
        assert_eq!("clothing".parse::<RefRole>().unwrap(), RefRole::Material);
        assert!("pose".parse::<RefRole>().is_err());
    }

    #[test]
    fn test_flavor_for_session_type() {
        assert_eq!(
            SwapFlavor::from_session_type(SessionType::ClothingDetail),
            Some(SwapFlavor::ClothingDetail)
        );
        assert_eq!(SwapFlavor::from_session_type(SessionType::Detail), None);
    }
}
