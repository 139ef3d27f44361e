use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use serde_json::{json, Value};

use lookforge::config::{default_config_path, load_config, load_config_or_default, resolve_api_key};
use lookforge::generation::{GeminiImageClient, ImageGenerator, Unconfigured};
use lookforge::pipeline::{
    DetailPagePipeline, ModelImagePipeline, PipelineConfig, PipelineContext, RefRole,
    SessionView, SwapFlavor, SwapPipeline, UploadFile,
};
use lookforge::session::{SectionType, Session, SessionStore, SessionType, Side};
use lookforge::Config;

use crate::Commands;

pub struct App {
    ctx: PipelineContext,
}

impl App {
    /// Loads config and wires the pipelines. The API key is only required
    /// when `needs_generator` is set.
    pub fn build(config_path: Option<&Path>, needs_generator: bool) -> Result<Self> {
        let config = match config_path {
            Some(path) => load_config(path)
                .with_context(|| format!("Failed to load config from {:?}", path))?,
            None => match default_config_path() {
                Some(path) => load_config_or_default(&path)?,
                None => Config::default(),
            },
        };

        let generator: Arc<dyn ImageGenerator> = match resolve_api_key(&config) {
            Ok(key) => Arc::new(GeminiImageClient::new(&config.api, &config.generation, key)?),
            Err(e) if needs_generator => return Err(e).context("No image API key"),
            Err(e) => Arc::new(Unconfigured::new(e.to_string())),
        };

        let store = SessionStore::new(&config.sessions.dir);
        let ctx = PipelineContext::new(store, generator, PipelineConfig::from_config(&config));
        Ok(Self { ctx })
    }

    pub async fn run(&self, command: Commands) -> Result<Value> {
        let store = &self.ctx.store;
        match command {
            Commands::New { session_type } => {
                let session_type: SessionType = session_type.parse().map_err(|e: String| anyhow!(e))?;
                let session = store.create(session_type).await?;
                tracing::info!(session_id = %session.session_id, "created session");
                self.view(&session)
            }
            Commands::List { session_type } => {
                let filter = session_type
                    .map(|t| t.parse::<SessionType>().map_err(|e| anyhow!(e)))
                    .transpose()?;
                Ok(serde_json::to_value(store.list(filter).await?)?)
            }
            Commands::Show { id } => {
                let session = store.load(&id).await?;
                self.view(&session)
            }
            Commands::Delete { id } => {
                store.delete(&id).await?;
                Ok(json!({ "deleted": id }))
            }
            Commands::Upload {
                id,
                role,
                files,
                group,
                label,
                section_type,
            } => {
                let mut session = store.load(&id).await?;
                let mut uploads = Vec::with_capacity(files.len());
                for path in &files {
                    uploads.push(UploadFile::from_path(path).await?);
                }
                self.upload(&mut session, &role, &uploads, group.as_deref(), label.as_deref(), &section_type)
                    .await
            }
            Commands::Generate { id, notes } => {
                let mut session = store.load(&id).await?;
                match self.swap_for(&session) {
                    Some(swap) => Ok(serde_json::to_value(swap.generate(&mut session, notes).await?)?),
                    None => {
                        if notes.is_some() {
                            bail!("detail sessions take notes on generate-models");
                        }
                        let page = DetailPagePipeline::new(self.ctx.clone());
                        Ok(serde_json::to_value(page.generate(&mut session).await?)?)
                    }
                }
            }
            Commands::GenerateModels { id, notes } => {
                let mut session = store.load(&id).await?;
                let models = ModelImagePipeline::new(self.ctx.clone());
                Ok(serde_json::to_value(models.generate(&mut session, notes).await?)?)
            }
            Commands::Regenerate { id, index, adjust } => {
                let mut session = store.load(&id).await?;
                match self.swap_for(&session) {
                    Some(swap) => Ok(serde_json::to_value(
                        swap.regenerate(&mut session, index, adjust.as_deref()).await?,
                    )?),
                    None => {
                        let page = DetailPagePipeline::new(self.ctx.clone());
                        Ok(serde_json::to_value(
                            page.regenerate(&mut session, index, adjust.as_deref()).await?,
                        )?)
                    }
                }
            }
            Commands::RegenerateModel {
                id,
                group,
                side,
                adjust,
            } => {
                let side: Side = side.parse().map_err(|e: String| anyhow!(e))?;
                let mut session = store.load(&id).await?;
                let models = ModelImagePipeline::new(self.ctx.clone());
                Ok(serde_json::to_value(
                    models
                        .regenerate(&mut session, &group, side, adjust.as_deref())
                        .await?,
                )?)
            }
            Commands::DeleteRef { id, role, index } => {
                let mut session = store.load(&id).await?;
                match self.swap_for(&session) {
                    Some(swap) => {
                        let role: RefRole = role.parse().map_err(|e: String| anyhow!(e))?;
                        Ok(serde_json::to_value(swap.delete_ref(&mut session, role, index).await?)?)
                    }
                    None if role == "section" => {
                        let page = DetailPagePipeline::new(self.ctx.clone());
                        Ok(serde_json::to_value(page.delete_section(&mut session, index).await?)?)
                    }
                    None => bail!(
                        "detail sessions only delete sections by index; use remove-group for garments"
                    ),
                }
            }
            Commands::RemoveGroup { id, group } => {
                let mut session = store.load(&id).await?;
                let models = ModelImagePipeline::new(self.ctx.clone());
                Ok(serde_json::to_value(models.remove_group(&mut session, &group).await?)?)
            }
            Commands::Stitch { id } => {
                let mut session = store.load(&id).await?;
                let page = DetailPagePipeline::new(self.ctx.clone());
                Ok(serde_json::to_value(page.stitch(&mut session).await?)?)
            }
        }
    }

    async fn upload(
        &self,
        session: &mut Session,
        role: &str,
        uploads: &[UploadFile],
        group: Option<&str>,
        label: Option<&str>,
        section_type: &str,
    ) -> Result<Value> {
        if let Some(swap) = self.swap_for(session) {
            let role: RefRole = role.parse().map_err(|e: String| anyhow!(e))?;
            return Ok(serde_json::to_value(swap.upload(session, role, uploads).await?)?);
        }

        let models = ModelImagePipeline::new(self.ctx.clone());
        let status = match role {
            "model-front" | "model-back" => {
                let side = if role == "model-front" { Side::Front } else { Side::Back };
                models.upload_model(session, side, single(uploads)?).await?
            }
            "group-front" | "group-back" => {
                let side = if role == "group-front" { Side::Front } else { Side::Back };
                let group = group.ok_or_else(|| anyhow!("--group is required for {}", role))?;
                models
                    .upload_garment(session, group, side, single(uploads)?, label)
                    .await?
            }
            "section" => {
                let section_type = SectionType::from(section_type.to_string());
                DetailPagePipeline::new(self.ctx.clone())
                    .upload_sections(session, uploads, section_type)
                    .await?
            }
            other => bail!(
                "unknown role '{}' for a detail session (model-front, model-back, group-front, group-back, section)",
                other
            ),
        };
        Ok(serde_json::to_value(status)?)
    }

    fn swap_for(&self, session: &Session) -> Option<SwapPipeline> {
        SwapFlavor::from_session_type(session.session_type())
            .map(|flavor| SwapPipeline::new(self.ctx.clone(), flavor))
    }

    fn view(&self, session: &Session) -> Result<Value> {
        let dir = self.ctx.store.session_dir(&session.session_id)?;
        Ok(serde_json::to_value(SessionView::build(session, &dir))?)
    }
}

fn single(uploads: &[UploadFile]) -> Result<&UploadFile> {
    match uploads {
        [one] => Ok(one),
        _ => bail!("this role takes exactly one file, got {}", uploads.len()),
    }
}
