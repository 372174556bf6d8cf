use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use loadconfig::{CheckpointPolicy, LabelSection, LayoutSection, LoadConfig, Rgba, TaskSection};
use loader::{Loader, RenderSurface, SoftwareSurface};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use crate::bindings::{apply_scene, loader_options, map_color};
use crate::cli::RunArgs;
use crate::paths::AppPaths;

const DEFAULT_SURFACE: (u32, u32) = (1280, 720);
const LABEL_INSET: f32 = 24.0;

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub config: Option<PathBuf>,
    pub surface: [u32; 2],
    pub policy: CheckpointPolicy,
    pub cycles: u32,
    pub tasks: Vec<TaskReport>,
    pub frames_presented: u64,
    pub frames_skipped: u64,
    pub host_frames: u64,
    pub final_angle: f32,
    pub exported: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskReport {
    pub label: String,
    pub cycle: u32,
    pub elapsed_ms: u64,
}

pub fn run(args: RunArgs) -> Result<()> {
    let paths = AppPaths::discover()?;
    let print_summary = args.summary;
    let summary = execute(&args, &paths)?;
    if print_summary {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    }
    Ok(())
}

pub fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Resolves the configuration: an explicit path must load, the default file
/// is used when present, otherwise built-in defaults apply.
pub fn load_config(
    explicit: Option<&Path>,
    paths: &AppPaths,
) -> Result<(LoadConfig, Option<PathBuf>)> {
    if let Some(path) = explicit {
        let config = LoadConfig::from_path(path)
            .with_context(|| format!("failed to load config {}", path.display()))?;
        return Ok((config, Some(path.to_path_buf())));
    }
    let default = paths.config_file();
    if default.is_file() {
        let config = LoadConfig::from_path(&default)
            .with_context(|| format!("failed to load config {}", default.display()))?;
        return Ok((config, Some(default)));
    }
    tracing::debug!(path = %default.display(), "no config file found; using defaults");
    Ok((LoadConfig::default(), None))
}

/// Folds command-line overrides into the loaded configuration.
pub fn apply_overrides(config: &mut LoadConfig, args: &RunArgs) {
    if let Some((width, height)) = args.size {
        config.layout = Some(LayoutSection { width, height });
    }
    if let Some(fps) = args.fps {
        config.loader.fps = fps.max(0.0);
    }
    if let Some(policy) = args.policy {
        config.loader.checkpoint_policy = policy;
    }
    if let Some(path) = &args.background {
        config.background = Some(loadconfig::BackgroundSection {
            path: path.clone(),
            crop: None,
        });
    }
    if let Some(text) = &args.label {
        match config.label.as_mut() {
            Some(label) => label.text = text.clone(),
            None => {
                config.label = Some(LabelSection {
                    text: text.clone(),
                    font: None,
                    position: [LABEL_INSET, LABEL_INSET],
                    size: 24,
                    fill: Rgba::WHITE,
                    outline: Rgba::BLACK,
                    outline_thickness: 0.0,
                });
            }
        }
    }
    if !args.tasks.is_empty() {
        config.tasks = args
            .tasks
            .iter()
            .map(|task| TaskSection {
                label: task.label.clone(),
                duration: task.duration,
                pause: None,
            })
            .collect();
    }
}

fn default_tasks() -> Vec<TaskSection> {
    vec![TaskSection {
        label: "heavy_task".into(),
        duration: Duration::from_secs(3),
        pause: Some(Duration::from_secs(1)),
    }]
}

pub fn execute(args: &RunArgs, paths: &AppPaths) -> Result<RunSummary> {
    let (mut config, source) = load_config(args.config.as_deref(), paths)?;
    apply_overrides(&mut config, args);
    config.validate().context("invalid configuration after overrides")?;

    let (width, height) = config
        .layout
        .map(|layout| (layout.width, layout.height))
        .unwrap_or(DEFAULT_SURFACE);
    let tasks = if config.tasks.is_empty() {
        default_tasks()
    } else {
        config.tasks.clone()
    };
    let clear_color = map_color(config.loader.clear_color);

    tracing::info!(
        width,
        height,
        fps = config.loader.fps,
        policy = ?config.loader.checkpoint_policy,
        tasks = tasks.len(),
        cycles = args.cycles,
        "starting loading-screen demo"
    );

    let loader = Loader::new(SoftwareSurface::new(width, height), loader_options(&config))
        .context("failed to start loader")?;
    apply_scene(&loader, &config);
    let handle = loader.handle();

    let mut reports = Vec::with_capacity(tasks.len() * args.cycles as usize);
    let mut host_frames = 0u64;
    for cycle in 0..args.cycles {
        for task in &tasks {
            let started = Instant::now();
            handle.run_checkpointed(&task.label, || thread::sleep(task.duration));
            let elapsed = started.elapsed();
            tracing::info!(
                task = %task.label,
                cycle,
                elapsed_ms = elapsed.as_millis() as u64,
                "task finished"
            );
            reports.push(TaskReport {
                label: task.label.clone(),
                cycle,
                elapsed_ms: elapsed.as_millis() as u64,
            });

            {
                let mut lease = loader
                    .claim_surface()
                    .context("surface still owned by the loader after task")?;
                lease.clear(clear_color);
                lease.present().context("host failed to present")?;
                host_frames += 1;
            }
            if let Some(pause) = task.pause {
                thread::sleep(pause);
            }
        }
    }

    let stats = loader.stats();
    let final_angle = loader.scene_snapshot().spinner_angle;
    let surface = loader.shutdown().context("failed to stop loader")?;
    tracing::info!(
        presented = stats.presented,
        skipped = stats.skipped,
        host_frames,
        "loading-screen demo finished"
    );

    let exported = match &args.export {
        Some(path) => {
            surface
                .save(path)
                .with_context(|| format!("failed to export frame to {}", path.display()))?;
            tracing::info!(path = %path.display(), "exported final frame");
            Some(path.clone())
        }
        None => None,
    };

    Ok(RunSummary {
        config: source,
        surface: [width, height],
        policy: config.loader.checkpoint_policy,
        cycles: args.cycles,
        tasks: reports,
        frames_presented: stats.presented,
        frames_skipped: stats.skipped,
        host_frames,
        final_angle,
        exported,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use clap::Parser;
    use std::fs;
    use tempfile::TempDir;

    fn args(extra: &[&str]) -> RunArgs {
        let mut argv = vec!["loadscreen"];
        argv.extend_from_slice(extra);
        Cli::try_parse_from(argv).unwrap().run
    }

    fn paths_in(dir: &TempDir) -> AppPaths {
        AppPaths::with_config_dir(dir.path().to_path_buf())
    }

    #[test]
    fn missing_default_file_uses_builtin_config() {
        let dir = TempDir::new().unwrap();
        let (config, source) = load_config(None, &paths_in(&dir)).unwrap();
        assert!(source.is_none());
        assert_eq!(config.version, 1);
    }

    #[test]
    fn explicit_config_must_exist() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(load_config(Some(&missing), &paths_in(&dir)).is_err());
    }

    #[test]
    fn default_file_is_discovered() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("loadscreen.toml"),
            "version = 1\n[loader]\nfps = 30\n",
        )
        .unwrap();
        let (config, source) = load_config(None, &paths_in(&dir)).unwrap();
        assert_eq!(source, Some(dir.path().join("loadscreen.toml")));
        assert_eq!(config.loader.fps, 30.0);
    }

    #[test]
    fn overrides_replace_config_values() {
        let mut config = LoadConfig::default();
        apply_overrides(
            &mut config,
            &args(&[
                "--size",
                "320x200",
                "--fps",
                "12",
                "--policy",
                "unconditional",
                "--label",
                "Working",
                "--task",
                "a=10ms",
            ]),
        );
        assert_eq!(
            config.layout,
            Some(LayoutSection {
                width: 320,
                height: 200
            })
        );
        assert_eq!(config.loader.fps, 12.0);
        assert_eq!(
            config.loader.checkpoint_policy,
            CheckpointPolicy::Unconditional
        );
        assert_eq!(config.label.as_ref().map(|l| l.text.as_str()), Some("Working"));
        assert_eq!(config.tasks.len(), 1);
        assert_eq!(config.tasks[0].duration, Duration::from_millis(10));
    }

    #[test]
    fn short_run_animates_and_exports() {
        let dir = TempDir::new().unwrap();
        let export = dir.path().join("frame.png");
        let run_args = args(&[
            "--size",
            "96x64",
            "--fps",
            "200",
            "--task",
            "first=60ms",
            "--task",
            "second=60ms",
            "--cycles",
            "2",
            "--export",
            export.to_str().unwrap(),
        ]);

        let summary = execute(&run_args, &paths_in(&dir)).unwrap();
        assert_eq!(summary.surface, [96, 64]);
        assert_eq!(summary.tasks.len(), 4);
        assert_eq!(summary.host_frames, 4);
        assert!(summary.frames_presented >= 1);
        assert!(summary.tasks.iter().all(|task| task.elapsed_ms >= 60));
        assert_eq!(summary.exported.as_deref(), Some(export.as_path()));

        let frame = image::open(&export).unwrap().to_rgba8();
        assert_eq!(frame.dimensions(), (96, 64));
        assert_eq!(frame.get_pixel(0, 0).0, [0, 0, 0, 255]);

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["policy"], "counted");
    }
}
