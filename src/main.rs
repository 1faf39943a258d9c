use anyhow::Result;
use clap::{Arg, ArgAction, Command};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

use lecture_assistant::api::ApiServer;
use lecture_assistant::document::ReportGenerator;
use lecture_assistant::jobs::JobRegistry;
use lecture_assistant::pipeline::{Pipeline, PipelineOptions, ProgressFn};
use lecture_assistant::transcription::ModelSize;
use lecture_assistant::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lecture_assistant=info,warn".into()),
        )
        .init();

    let matches = Command::new("Video Lecture Assistant")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Transcribe, analyze, and subtitle video lectures")
        .arg(
            Arg::new("video")
                .value_name("VIDEO")
                .help("Path to the video file to process")
                .required_unless_present("serve"),
        )
        .arg(
            Arg::new("output-name")
                .short('o')
                .long("output-name")
                .value_name("NAME")
                .help("Base name for generated artifacts (defaults to the video name)"),
        )
        .arg(
            Arg::new("model")
                .short('m')
                .long("model")
                .value_name("SIZE")
                .help("Whisper model size: tiny, base, small, medium, large"),
        )
        .arg(
            Arg::new("ollama-model")
                .long("ollama-model")
                .value_name("MODEL")
                .help("Ollama model for content analysis"),
        )
        .arg(
            Arg::new("output-dir")
                .long("output-dir")
                .value_name("DIR")
                .help("Output directory for artifacts"),
        )
        .arg(
            Arg::new("word")
                .long("word")
                .help("Generate the analysis report document")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("embed-subtitles")
                .long("embed-subtitles")
                .help("Mux subtitles into a copy of the video")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("no-subtitles")
                .long("no-subtitles")
                .help("Skip SRT subtitle generation")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("no-transcription-file")
                .long("no-transcription-file")
                .help("Skip writing the plain transcription text file")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("no-cleanup")
                .long("no-cleanup")
                .help("Keep temporary audio files after processing")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("summary")
                .long("summary")
                .help("Print the analysis report to the console")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("serve")
                .long("serve")
                .help("Run the asynchronous job API instead of processing one video")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("port")
                .long("port")
                .value_name("PORT")
                .help("Port for the job API"),
        )
        .get_matches();

    // Load configuration
    let mut config = Config::load().unwrap_or_else(|e| {
        warn!("Failed to load config, using defaults: {}", e);
        Config::default()
    });

    // CLI overrides
    if matches.get_flag("word") {
        config.output.generate_word_doc = true;
    }
    if matches.get_flag("embed-subtitles") {
        config.output.embed_subtitles = true;
    }
    if matches.get_flag("no-subtitles") {
        config.output.generate_subtitles = false;
    }
    if matches.get_flag("no-transcription-file") {
        config.output.save_transcription = false;
    }
    if matches.get_flag("no-cleanup") {
        config.output.cleanup_temp_files = false;
    }
    if let Some(dir) = matches.get_one::<String>("output-dir") {
        config.output.base_dir = PathBuf::from(dir);
    }
    if let Some(port) = matches.get_one::<String>("port") {
        config.server.port = port.parse()?;
    }

    config.validate()?;

    let options = PipelineOptions {
        whisper_model: matches
            .get_one::<String>("model")
            .map(|m| m.parse::<ModelSize>())
            .transpose()
            .map_err(|e| anyhow::anyhow!("{}", e))?,
        ollama_model: matches.get_one::<String>("ollama-model").cloned(),
        output_name: matches.get_one::<String>("output-name").cloned(),
        ..Default::default()
    };

    if matches.get_flag("serve") {
        return serve(config).await;
    }

    let video_path = PathBuf::from(
        matches
            .get_one::<String>("video")
            .ok_or_else(|| anyhow::anyhow!("no video file provided"))?,
    );

    process_one(config, video_path, options, matches.get_flag("summary")).await
}

/// Synchronous single-video mode.
async fn process_one(
    config: Config,
    video_path: PathBuf,
    options: PipelineOptions,
    print_summary: bool,
) -> Result<()> {
    let workdir = config.output.base_dir.clone();
    let pipeline = Pipeline::new(config);

    let progress: ProgressFn = Arc::new(|percent, stage| {
        info!("📊 Progress: {}% ({})", percent, stage);
    });

    let start = std::time::Instant::now();
    match pipeline
        .process(&video_path, &workdir, &options, progress)
        .await
    {
        Ok(outcome) => {
            info!(
                "🎉 Processing completed in {:.1}s",
                start.elapsed().as_secs_f64()
            );
            for diagnostic in &outcome.diagnostics {
                warn!(
                    "⚠️ Stage {} degraded: {}",
                    diagnostic.stage, diagnostic.message
                );
            }
            if print_summary && !outcome.analysis.is_placeholder() {
                println!("{}", ReportGenerator::new().render(&outcome.analysis));
            }
            Ok(())
        }
        Err(e) => {
            error!("❌ Processing failed: {}", e);
            std::process::exit(1);
        }
    }
}

/// Asynchronous job-API mode.
async fn serve(config: Config) -> Result<()> {
    let port = config.server.port;
    let pipeline = Arc::new(Pipeline::new(config));
    let registry = Arc::new(JobRegistry::new(pipeline));
    ApiServer::new(registry, port).start().await
}
