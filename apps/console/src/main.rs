use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use client_core::{score_filename, AdminClient, StaticTokenProvider};
use shared::{
    domain::{LevelId, ScoreId, StepId, StepKind},
    protocol::{CreateLevelRequest, CreateStepRequest, UpdateLevelRequest, UpdateStepRequest},
};

mod config;

#[derive(Parser, Debug)]
#[command(
    name = "curriculum-console",
    about = "Administers levels, steps and score attachments of the music curriculum"
)]
struct Args {
    /// API base URL; overrides console.toml and API_URL.
    #[arg(long)]
    api_url: Option<String>,
    /// Bearer token; overrides console.toml and ADMIN_API_TOKEN.
    #[arg(long)]
    token: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum StepKindArg {
    Song,
    Exercise,
}

impl From<StepKindArg> for StepKind {
    fn from(value: StepKindArg) -> Self {
        match value {
            StepKindArg::Song => StepKind::Song,
            StepKindArg::Exercise => StepKind::Exercise,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Lists all levels in display order.
    ListLevels,
    /// Shows one level with its steps.
    ShowLevel { level_id: String },
    CreateLevel {
        name: String,
        #[arg(long, default_value = "")]
        description: String,
    },
    UpdateLevel {
        level_id: String,
        name: String,
        #[arg(long, default_value = "")]
        description: String,
    },
    DeleteLevel { level_id: String },
    /// Moves a level to immediately precede another and persists the
    /// resulting order.
    MoveLevel { moved: String, before: String },
    CreateStep {
        level_id: String,
        name: String,
        #[arg(long, value_enum)]
        kind: StepKindArg,
        #[arg(long, default_value = "")]
        description: String,
    },
    UpdateStep {
        level_id: String,
        step_id: String,
        name: String,
        #[arg(long, value_enum)]
        kind: StepKindArg,
        #[arg(long, default_value = "")]
        description: String,
    },
    DeleteStep { level_id: String, step_id: String },
    /// Moves a step to immediately precede another within one level.
    MoveStep {
        level_id: String,
        moved: String,
        before: String,
    },
    /// Uploads a MusicXML file and attaches it to a step.
    UploadScore {
        level_id: String,
        step_id: String,
        file: PathBuf,
    },
    /// Downloads a score attachment to disk.
    DownloadScore {
        score_id: String,
        /// Step name used to derive the output filename.
        #[arg(long)]
        step_name: Option<String>,
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().init();
    let args = Args::parse();

    let settings = config::load_settings();
    let api_url = args.api_url.unwrap_or(settings.api_url);
    let token = args.token.unwrap_or(settings.api_token);
    let client = AdminClient::new(&api_url, Arc::new(StaticTokenProvider::new(token)))?;

    match args.command {
        Command::ListLevels => {
            let levels = client.list_levels().await?;
            println!("{}", serde_json::to_string_pretty(&levels)?);
        }
        Command::ShowLevel { level_id } => {
            let level = client.get_level(&LevelId::from(level_id)).await?;
            println!("{}", serde_json::to_string_pretty(&level)?);
        }
        Command::CreateLevel { name, description } => {
            let level = client
                .create_level(CreateLevelRequest { name, description })
                .await?;
            println!("created level {}", level.id);
        }
        Command::UpdateLevel {
            level_id,
            name,
            description,
        } => {
            let level = client
                .update_level(
                    &LevelId::from(level_id),
                    UpdateLevelRequest { name, description },
                )
                .await?;
            println!("updated level {}", level.id);
        }
        Command::DeleteLevel { level_id } => {
            let level_id = LevelId::from(level_id);
            client.delete_level(&level_id).await?;
            println!("deleted level {level_id}");
        }
        Command::MoveLevel { moved, before } => {
            let reorderer = client.level_reorderer();
            reorderer.replace(client.list_levels().await?).await;
            reorderer
                .reorder(&LevelId::from(moved), &LevelId::from(before))
                .await?;
            let order: Vec<String> = reorderer
                .current_order()
                .await
                .into_iter()
                .map(|id| id.0)
                .collect();
            println!("levels order: {}", order.join(", "));
        }
        Command::CreateStep {
            level_id,
            name,
            kind,
            description,
        } => {
            let step = client
                .create_step(
                    &LevelId::from(level_id),
                    CreateStepRequest {
                        kind: kind.into(),
                        name,
                        description,
                        score_id: None,
                    },
                )
                .await?;
            println!("created step {}", step.id);
        }
        Command::UpdateStep {
            level_id,
            step_id,
            name,
            kind,
            description,
        } => {
            let step = client
                .update_step(
                    &LevelId::from(level_id),
                    &StepId::from(step_id),
                    UpdateStepRequest {
                        kind: kind.into(),
                        name,
                        description,
                    },
                )
                .await?;
            println!("updated step {}", step.id);
        }
        Command::DeleteStep { level_id, step_id } => {
            let step_id = StepId::from(step_id);
            client
                .delete_step(&LevelId::from(level_id), &step_id)
                .await?;
            println!("deleted step {step_id}");
        }
        Command::MoveStep {
            level_id,
            moved,
            before,
        } => {
            let level_id = LevelId::from(level_id);
            let level = client.get_level(&level_id).await?;
            let reorderer = client.step_reorderer(&level_id);
            reorderer.replace(level.steps).await;
            reorderer
                .reorder(&StepId::from(moved), &StepId::from(before))
                .await?;
            let order: Vec<String> = reorderer
                .current_order()
                .await
                .into_iter()
                .map(|id| id.0)
                .collect();
            println!("steps order for level {level_id}: {}", order.join(", "));
        }
        Command::UploadScore {
            level_id,
            step_id,
            file,
        } => {
            let score_id = client
                .upload_score_file(&LevelId::from(level_id), &StepId::from(step_id), &file)
                .await?;
            println!("uploaded score {score_id}");
        }
        Command::DownloadScore {
            score_id,
            step_name,
            out,
        } => {
            let score_id = ScoreId::from(score_id);
            let bytes = client.download_score(&score_id).await?;
            let path = out.unwrap_or_else(|| {
                PathBuf::from(score_filename(
                    step_name.as_deref().unwrap_or(score_id.as_str()),
                ))
            });
            tokio::fs::write(&path, &bytes)
                .await
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("wrote {} bytes to {}", bytes.len(), path.display());
        }
    }

    Ok(())
}
