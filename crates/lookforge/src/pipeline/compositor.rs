//! Step 2 of a detail session: one generated image per detail-page section,
//! then a vertical stitch of all sections into the final page.

use std::path::{Path, PathBuf};

use tracing::Instrument;

use crate::prompts::{detail_section_prompt, PromptOptions};
use crate::raster;
use crate::sanitize::redact_path;
use crate::session::layout::{section_ref_path, section_result_path, FINAL_FILE};
use crate::session::{
    DetailState, GroupResult, ResultItem, SectionRef, SectionType, Session, SessionStatus,
    SessionType,
};
use crate::worker::run_bounded;

use super::context::PipelineContext;
use super::error::PipelineError;
use super::pending::{next_index, pending, remove_result, upsert_result};
use super::status::{BatchReport, DetailStatus};
use super::unit::{run_unit, UnitRequest};
use super::upload::{store_upload, UploadFile};

/// Picks the step-1 images a section is generated from.
///
/// A showcase section takes the group at its ordinal among showcase
/// sections (ordered by index), or every group when there are fewer groups
/// than showcases. A highlight section takes the first group. Anything else
/// takes every group.
pub fn route_materials(
    section: &SectionRef,
    sections: &[SectionRef],
    upstream: &[GroupResult],
) -> Vec<PathBuf> {
    let all = || -> Vec<PathBuf> {
        upstream
            .iter()
            .flat_map(|g| [g.front.clone(), g.back.clone()])
            .collect()
    };

    match section.section_type {
        SectionType::Showcase => {
            let mut showcases: Vec<u32> = sections
                .iter()
                .filter(|s| s.section_type == SectionType::Showcase)
                .map(|s| s.index)
                .collect();
            showcases.sort_unstable();
            let ordinal = showcases
                .iter()
                .position(|&i| i == section.index)
                .unwrap_or(0);

            match upstream.get(ordinal) {
                Some(group) => vec![group.front.clone(), group.back.clone()],
                None => {
                    tracing::warn!(
                        index = section.index,
                        ordinal,
                        groups = upstream.len(),
                        "more showcase sections than garment groups, using every group"
                    );
                    all()
                }
            }
        }
        SectionType::Highlight => upstream
            .first()
            .map(|g| vec![g.front.clone(), g.back.clone()])
            .unwrap_or_default(),
        SectionType::Detail => all(),
    }
}

pub struct DetailPagePipeline {
    ctx: PipelineContext,
}

impl DetailPagePipeline {
    pub fn new(ctx: PipelineContext) -> Self {
        Self { ctx }
    }

    pub fn status(&self, session: &Session) -> Result<DetailStatus, PipelineError> {
        let state = detail(session)?;
        let dir = self.ctx.store.session_dir(&session.session_id)?;
        Ok(DetailStatus::build(session, state, &dir))
    }

    /// Stores section reference layouts, all tagged with `section_type`.
    pub async fn upload_sections(
        &self,
        session: &mut Session,
        uploads: &[UploadFile],
        section_type: SectionType,
    ) -> Result<DetailStatus, PipelineError> {
        if uploads.is_empty() {
            return Err(PipelineError::Validation("no files supplied".into()));
        }
        let state = detail(session)?;
        let mut index = next_index(state.next_section_index, &state.detail_refs);
        let files = self.ctx.files(session)?;

        let mut added = Vec::with_capacity(uploads.len());
        for upload in uploads {
            let path = section_ref_path(index, &upload.extension());
            store_upload(&files, &path, upload).await?;
            added.push(SectionRef {
                index,
                name: upload.name.clone(),
                path,
                section_type,
            });
            index += 1;
        }

        let state = detail_mut(session)?;
        state.detail_refs.extend(added);
        state.next_section_index = index;
        let stale = discard_final(session)?;
        self.ctx.store.save(session).await?;
        if let Some(stale) = stale {
            files.remove_best_effort(&stale).await;
        }
        tracing::info!(
            session_id = %session.session_id,
            count = uploads.len(),
            section_type = section_type.as_str(),
            "stored section references"
        );
        self.status(session)
    }

    /// Generates every section that has no image yet.
    pub async fn generate(
        &self,
        session: &mut Session,
    ) -> Result<BatchReport<DetailStatus>, PipelineError> {
        let state = detail(session)?;
        if state.detail_refs.is_empty() {
            return Err(PipelineError::Validation(
                "upload at least one detail-page section reference first".into(),
            ));
        }
        if state.step1_results.is_empty() {
            return Err(PipelineError::Validation(
                "generate model photos before detail-page sections".into(),
            ));
        }
        let todo: Vec<SectionRef> = pending(&state.detail_refs, &state.step2_results)
            .into_iter()
            .cloned()
            .collect();
        if todo.is_empty() {
            return Err(PipelineError::NothingPending(
                "every section already has an image".into(),
            ));
        }

        let prompt = detail_section_prompt(
            self.ctx.config.page_width,
            &PromptOptions {
                additional_notes: &state.additional_notes,
                adjustment: None,
                material_count: 0,
            },
        );
        let requests: Vec<(u32, UnitRequest)> = todo
            .iter()
            .map(|section| {
                let mut inputs = vec![section.path.clone()];
                inputs.extend(route_materials(section, &state.detail_refs, &state.step1_results));
                let request = UnitRequest {
                    prompt: prompt.clone(),
                    inputs,
                    output: section_result_path(section.index),
                };
                (section.index, request)
            })
            .collect();

        let files = self.ctx.files(session)?;
        let ctx = &self.ctx;
        let tasks: Vec<_> = requests
            .into_iter()
            .map(|(index, request)| {
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
            kind = "section",
            pending = todo.len()
        );
        let outcomes = run_bounded(tasks, ctx.config.concurrency, ctx.progress.as_ref())
            .instrument(span)
            .await;

        let total = outcomes.len();
        let produced: Vec<ResultItem> = outcomes.into_iter().flatten().collect();
        let new_count = produced.len();

        let state = detail_mut(session)?;
        for item in produced {
            upsert_result(&mut state.step2_results, item);
        }
        if new_count > 0 {
            session.advance(SessionStatus::Step2Done);
        }
        self.ctx.store.save(session).await?;

        Ok(BatchReport {
            status: self.status(session)?,
            new_count,
            failed_count: total - new_count,
        })
    }

    pub async fn regenerate(
        &self,
        session: &mut Session,
        index: u32,
        adjustment: Option<&str>,
    ) -> Result<DetailStatus, PipelineError> {
        let state = detail(session)?;
        let section = state
            .detail_refs
            .iter()
            .find(|s| s.index == index)
            .ok_or(PipelineError::UnknownIndex {
                kind: "section",
                index,
            })?;
        if state.step1_results.is_empty() {
            return Err(PipelineError::Validation(
                "generate model photos before detail-page sections".into(),
            ));
        }

        let mut inputs = vec![section.path.clone()];
        inputs.extend(route_materials(section, &state.detail_refs, &state.step1_results));
        let request = UnitRequest {
            prompt: detail_section_prompt(
                self.ctx.config.page_width,
                &PromptOptions {
                    additional_notes: &state.additional_notes,
                    adjustment,
                    material_count: 0,
                },
            ),
            inputs,
            output: section_result_path(index),
        };

        let files = self.ctx.files(session)?;
        let path = run_unit(&self.ctx, &files, request)
            .instrument(tracing::info_span!(
                "regenerate",
                session_id = %session.session_id,
                index
            ))
            .await?;

        upsert_result(&mut detail_mut(session)?.step2_results, ResultItem { index, path });
        let stale = discard_final(session)?;
        session.advance(SessionStatus::Step2Done);
        self.ctx.store.save(session).await?;
        if let Some(stale) = stale {
            files.remove_best_effort(&stale).await;
        }
        self.status(session)
    }

    /// Removes a section reference and its generated image.
    pub async fn delete_section(
        &self,
        session: &mut Session,
        index: u32,
    ) -> Result<DetailStatus, PipelineError> {
        let files = self.ctx.files(session)?;
        let state = detail_mut(session)?;

        let pos = state
            .detail_refs
            .iter()
            .position(|s| s.index == index)
            .ok_or(PipelineError::UnknownIndex {
                kind: "section",
                index,
            })?;
        let removed = state.detail_refs.remove(pos);
        let result = remove_result(&mut state.step2_results, index);
        let stale = discard_final(session)?;

        self.ctx.store.save(session).await?;

        files.remove_best_effort(&removed.path).await;
        for path in result.map(|r| r.path).into_iter().chain(stale) {
            files.remove_best_effort(&path).await;
        }
        tracing::info!(
            session_id = %session.session_id,
            index,
            file = %redact_path(&removed.path),
            "deleted section"
        );
        self.status(session)
    }

    /// Stacks every section image, in index order, into the final page.
    /// Refuses to run while any section lacks an image.
    pub async fn stitch(&self, session: &mut Session) -> Result<DetailStatus, PipelineError> {
        let state = detail(session)?;
        if state.detail_refs.is_empty() {
            return Err(PipelineError::Validation(
                "upload at least one detail-page section reference first".into(),
            ));
        }
        let mut missing: Vec<u32> = pending(&state.detail_refs, &state.step2_results)
            .into_iter()
            .map(|s| s.index)
            .collect();
        if !missing.is_empty() {
            missing.sort_unstable();
            return Err(PipelineError::IncompleteSections { missing });
        }

        let files = self.ctx.files(session)?;
        let mut results: Vec<&ResultItem> = state
            .step2_results
            .iter()
            .filter(|r| state.detail_refs.iter().any(|s| s.index == r.index))
            .collect();
        results.sort_by_key(|r| r.index);
        let inputs: Vec<PathBuf> = results.iter().map(|r| files.resolve(&r.path)).collect();
        let output = files.resolve(Path::new(FINAL_FILE));
        let width = self.ctx.config.page_width;
        let quality = self.ctx.config.jpeg_quality;

        let span = tracing::info_span!(
            "stitch",
            session_id = %session.session_id,
            sections = inputs.len()
        );
        let (w, h) = tokio::task::spawn_blocking(move || {
            let _entered = span.entered();
            raster::stitch_files(&inputs, width, quality, &output)
        })
        .await
        .map_err(|e| PipelineError::Task(e.to_string()))??;
        tracing::debug!(width = w, height = h, "final page written");

        detail_mut(session)?.final_path = Some(PathBuf::from(FINAL_FILE));
        session.advance(SessionStatus::Finished);
        self.ctx.store.save(session).await?;
        self.status(session)
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

/// Forgets the stitched page once the sections behind it change. Returns its
/// path for removal after the session is saved.
fn discard_final(session: &mut Session) -> Result<Option<PathBuf>, PipelineError> {
    let stale = detail_mut(session)?.take_final();
    if stale.is_some() {
        session.rewind(SessionStatus::Step2Done);
    }
    Ok(stale)
}
