mod bindings;
mod cli;
mod paths;
mod run;

use std::path::PathBuf;

use anyhow::Result;
use cli::Command;
use paths::AppPaths;

fn main() -> Result<()> {
    let cli = cli::parse();
    run::initialise_tracing();

    match cli.command {
        Some(Command::Check { path }) => run_check(path),
        Some(Command::Where) => run_where(),
        None => run::run(cli.run),
    }
}

fn run_check(path: Option<PathBuf>) -> Result<()> {
    let paths = AppPaths::discover()?;
    let (config, source) = run::load_config(path.as_deref(), &paths)?;
    match source {
        Some(source) => println!("{}: ok", source.display()),
        None => println!(
            "no config at {}; built-in defaults are valid",
            paths.config_file().display()
        ),
    }
    println!(
        "  spinner: {} segments, radius {}, {} deg/s",
        config.spinner.segments, config.spinner.radius, config.spinner.speed
    );
    println!(
        "  loader: {} fps, {:?} checkpoints",
        config.loader.fps, config.loader.checkpoint_policy
    );
    println!("  tasks: {}", config.tasks.len());
    Ok(())
}

fn run_where() -> Result<()> {
    let paths = AppPaths::discover()?;
    println!("config dir : {}", paths.config_dir().display());
    println!("config file: {}", paths.config_file().display());
    println!("override   : ${}", paths::ENV_CONFIG_DIR);
    Ok(())
}
