use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use line_stager::{
    AsyncStager, Config, GitCli, GitFileStatus, LineRef, LineSelection, Outcome, Stager,
    format_model, parse_file_refs,
};
use std::io;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "line-stager")]
#[command(about = "Stage and unstage individual diff lines")]
#[command(version)]
struct Cli {
    /// Repository to operate on
    #[arg(short = 'C', long, global = true, default_value = ".")]
    repo: PathBuf,

    /// Extra config file, applied after the user and repository configs
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List staged and unstaged files
    Status,
    /// Show diffs with line numbers usable in file:refs
    Diff {
        /// Files to show; every changed file when omitted
        files: Vec<String>,
        /// Show HEAD → index instead of index → worktree
        #[arg(long)]
        staged: bool,
    },
    /// Stage specific lines by reference (e.g., file.nix:10..15,-20)
    Stage {
        /// File and line references (e.g., "flake.nix:137" or "flake.nix:10..15")
        #[arg(required = true)]
        file_refs: Vec<String>,
    },
    /// Unstage specific lines by reference, numbered as in `diff --staged`
    Unstage {
        #[arg(required = true)]
        file_refs: Vec<String>,
    },
    /// Generate shell completions
    Completions { shell: Shell },
    /// Generate a man page
    Man,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .init();

    match cli.command {
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "line-stager", &mut io::stdout());
            return Ok(());
        }
        Commands::Man => {
            clap_mangen::Man::new(Cli::command()).render(&mut io::stdout())?;
            return Ok(());
        }
        _ => {}
    }

    let config = Config::load(&cli.repo, cli.config.as_deref())?;
    let stager = AsyncStager::new(Stager::new(GitCli::new(&cli.repo, &config)));

    match cli.command {
        Commands::Status => {
            let status = stager.status().await?;
            if status.is_clean() {
                println!("nothing to commit, working tree clean");
            }
            print_section("Staged", &status.staged);
            print_section("Unstaged", &status.unstaged);
        }
        Commands::Diff { files, staged } => {
            let files = if files.is_empty() {
                let status = stager.status().await?;
                let rows = if staged { status.staged } else { status.unstaged };
                rows.into_iter().map(|row| row.path).collect()
            } else {
                files
            };

            let mut first = true;
            for file in files {
                let model = stager.diff_model(&file, staged).await?;
                if model.is_empty() {
                    continue;
                }
                if !first {
                    println!();
                }
                first = false;
                print!("{}", format_model(&model));
            }
        }
        Commands::Stage { file_refs } => move_lines(&stager, &file_refs, false).await?,
        Commands::Unstage { file_refs } => move_lines(&stager, &file_refs, true).await?,
        Commands::Completions { .. } | Commands::Man => {}
    }

    Ok(())
}

fn print_section(title: &str, rows: &[GitFileStatus]) {
    if rows.is_empty() {
        return;
    }
    println!("{title}:");
    for row in rows {
        println!("  {} ({})", row.path, row.flags);
    }
}

/// Stage (or unstage) every `file:refs` argument, one patch per file.
///
/// References to the same file are merged first: every patch shifts the
/// line numbers of the next diff, so they must all resolve against one read.
async fn move_lines(
    stager: &AsyncStager<GitCli>,
    file_refs: &[String],
    staged: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut grouped: Vec<(String, Vec<LineRef>)> = Vec::new();
    for arg in file_refs {
        let parsed = parse_file_refs(arg)?;
        match grouped.iter_mut().find(|(file, _)| *file == parsed.file) {
            Some((_, refs)) => refs.extend(parsed.refs),
            None => grouped.push((parsed.file, parsed.refs)),
        }
    }

    for (file, refs) in grouped {
        let model = stager.diff_model(&file, staged).await?;
        let selection = LineSelection::from_refs(&model, &refs)?;
        let count = selection.len();

        let outcome = if staged {
            stager.unstage_lines(model, selection).await?
        } else {
            stager.stage_lines(model, selection).await?
        };

        let verb = if staged { "Unstaged" } else { "Staged" };
        match outcome {
            Outcome::Applied { .. } => info!("{verb} {count} line(s) in {file}"),
            Outcome::NoChanges => info!("No changes selected in {file}"),
        }
    }

    Ok(())
}
