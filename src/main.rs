use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use rulefix::config::{load_from_path, read_project_version};
use rulefix::{
    suggest_similar, ErrorKind, FailurePolicy, PatchEngine, PatchResult, RunPlan, Runner,
    Summary, WorkspaceGuard, WriteMode,
};
use similar::{ChangeTag, TextDiff};
use std::env;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Parser)]
#[command(name = "rulefix")]
#[command(about = "Apply ordered regex fix rules to source files in place", long_about = None)]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply fix plans to a project
    Apply {
        /// Project root (defaults to RULEFIX_ROOT, then the current directory)
        #[arg(short, long)]
        root: Option<PathBuf>,

        /// Specific plan file to apply (otherwise applies all in fixes/)
        #[arg(short, long)]
        plan: Option<PathBuf>,

        /// Dry run - compute changes without modifying files
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Show unified diff of changes
        #[arg(short, long)]
        diff: bool,

        /// Keep applying after a failed file instead of stopping
        #[arg(short, long)]
        keep_going: bool,
    },

    /// Report which files the plans would still change, without writing
    Check {
        /// Project root (defaults to RULEFIX_ROOT, then the current directory)
        #[arg(short, long)]
        root: Option<PathBuf>,

        /// Specific plan file to check (otherwise checks all in fixes/)
        #[arg(short, long)]
        plan: Option<PathBuf>,
    },

    /// List plans, their target files and rules
    List {
        /// Project root (defaults to RULEFIX_ROOT, then the current directory)
        #[arg(short, long)]
        root: Option<PathBuf>,

        /// Specific plan file to list (otherwise lists all in fixes/)
        #[arg(short, long)]
        plan: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Apply {
            root,
            plan,
            dry_run,
            diff,
            keep_going,
        } => cmd_apply(root, plan, dry_run, diff, keep_going),

        Commands::Check { root, plan } => cmd_check(root, plan),

        Commands::List { root, plan } => cmd_list(root, plan),
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

/// Resolve the project root.
///
/// Priority order:
/// 1. Explicit --root flag
/// 2. RULEFIX_ROOT environment variable
/// 3. Current directory
fn resolve_root(cli_root: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(path) = cli_root {
        return path
            .canonicalize()
            .with_context(|| format!("project root does not exist: {}", path.display()));
    }

    if let Ok(env_root) = env::var("RULEFIX_ROOT") {
        let path = PathBuf::from(&env_root);
        if path.exists() {
            return Ok(path.canonicalize()?);
        }
        eprintln!(
            "{}",
            format!("Warning: RULEFIX_ROOT is set but path doesn't exist: {}", env_root).yellow()
        );
    }

    Ok(env::current_dir()?.canonicalize()?)
}

/// Discover all .toml plan files in a fixes/ directory.
///
/// Discovery order:
/// 1. `<root>/fixes` (plans kept alongside the project they patch).
/// 2. `./fixes` relative to the current working directory.
fn discover_plan_files(root: &Path) -> Result<Vec<PathBuf>> {
    let cwd_fixes_dir = env::current_dir().ok().map(|cwd| cwd.join("fixes"));
    let candidate_dirs = std::iter::once(root.join("fixes")).chain(cwd_fixes_dir);

    for fixes_dir in candidate_dirs {
        if !fixes_dir.is_dir() {
            continue;
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(&fixes_dir).max_depth(1) {
            let entry = entry?;
            if entry.file_type().is_file()
                && entry.path().extension().and_then(|s| s.to_str()) == Some("toml")
            {
                files.push(entry.path().to_path_buf());
            }
        }

        files.sort();

        if !files.is_empty() {
            return Ok(files);
        }
    }

    anyhow::bail!(
        "No .toml plan files found in either {}/fixes or ./fixes",
        root.display()
    )
}

/// Load every plan up front so a broken rule aborts before any file is touched.
fn load_plans(root: &Path, plan: Option<PathBuf>) -> Result<Vec<(PathBuf, RunPlan)>> {
    let files = match plan {
        Some(path) => vec![path],
        None => discover_plan_files(root)?,
    };

    files
        .into_iter()
        .map(|file| -> Result<(PathBuf, RunPlan)> {
            let plan = load_from_path(&file)?;
            Ok((file, plan))
        })
        .collect()
}

/// Drop plans whose version range excludes the project, with a notice.
fn gate_plans(root: &Path, plans: Vec<(PathBuf, RunPlan)>) -> Result<Vec<(PathBuf, RunPlan)>> {
    let mut project_version: Option<String> = None;
    let mut runnable = Vec::with_capacity(plans.len());

    for (file, plan) in plans {
        if plan.version_range().is_none() {
            runnable.push((file, plan));
            continue;
        }

        let version = match &project_version {
            Some(version) => version.clone(),
            None => {
                let version = read_project_version(root)?;
                println!("Version: {}", version);
                project_version = Some(version.clone());
                version
            }
        };

        if plan.applies_to(&version)? {
            runnable.push((file, plan));
        } else {
            println!(
                "{} {}: Skipped (version {} does not satisfy {})",
                "⊘".cyan(),
                plan.name(),
                version,
                plan.version_range().unwrap_or_default()
            );
        }
    }

    Ok(runnable)
}

fn build_engine(root: &Path, mode: WriteMode, show_diff: bool) -> Result<PatchEngine> {
    let guard = WorkspaceGuard::new(root)?;
    Ok(PatchEngine::new(root)
        .with_guard(guard)
        .mode(mode)
        .capture_diff(show_diff))
}

/// Show unified diff between original and modified content
fn display_diff(file: &Path, original: &str, modified: &str) {
    println!(
        "\n{}",
        format!("--- {} (original)", file.display()).dimmed()
    );
    println!("{}", format!("+++ {} (patched)", file.display()).dimmed());

    let diff = TextDiff::from_lines(original, modified);

    for change in diff.iter_all_changes() {
        let sign = match change.tag() {
            ChangeTag::Delete => format!("-{}", change).red(),
            ChangeTag::Insert => format!("+{}", change).green(),
            ChangeTag::Equal => format!(" {}", change).normal(),
        };
        print!("{}", sign);
    }
}

fn report_failure(result: &PatchResult) {
    eprintln!("{} {}", "✗".red(), result);

    let Some(error) = &result.error else {
        return;
    };
    if error.kind() == ErrorKind::FileNotFound {
        if let Some(suggestion) = error.path().and_then(suggest_similar) {
            eprintln!("  Did you mean {}?", suggestion.display());
        }
    }
}

fn report_applied(result: &PatchResult, dry_run: bool, show_diff: bool) {
    if !result.succeeded {
        report_failure(result);
        return;
    }

    let note = if result.changed {
        format!("({} match(es))", result.matches).dimmed()
    } else {
        "(no changes)".dimmed()
    };
    if dry_run {
        println!("{} Would fix: {} {}", "✓".green(), result.path.display(), note);
    } else {
        println!("{} {} {}", "✓".green(), result, note);
    }

    if show_diff && result.changed {
        if let Some(change) = &result.diff {
            display_diff(&result.path, &change.original, &change.patched);
        }
    }
}

fn print_summary(summary: &Summary) {
    println!();
    println!("{} {}", "Summary:".bold(), summary);
    println!("  {} fixed", format!("{}", summary.succeeded()).green());
    println!("  {} changed", format!("{}", summary.changed()).green());
    println!("  {} failed", format!("{}", summary.failed()).red());
    println!("  {} skipped", format!("{}", summary.skipped.len()).cyan());
}

fn cmd_apply(
    root: Option<PathBuf>,
    plan: Option<PathBuf>,
    dry_run: bool,
    show_diff: bool,
    keep_going: bool,
) -> Result<()> {
    let root = resolve_root(root)?;
    println!("Root: {}", root.display());

    let plans = gate_plans(&root, load_plans(&root, plan)?)?;

    let mode = if dry_run {
        WriteMode::DryRun
    } else {
        WriteMode::Write
    };
    let policy = if keep_going {
        FailurePolicy::ContinueOnError
    } else {
        FailurePolicy::FailFast
    };
    let runner = Runner::new(build_engine(&root, mode, show_diff)?).policy(policy);

    if dry_run {
        println!("{}", "[DRY RUN - no files will be written]".cyan());
    }
    println!();

    let mut total = Summary::default();
    let mut plans = plans.into_iter();

    for (file, plan) in plans.by_ref() {
        println!(
            "Applying {} ({} file(s), {} rule(s)) from {}...",
            plan.name().bold(),
            plan.len(),
            plan.rule_count(),
            file.display()
        );

        let summary = runner.run_with(&plan, |result| report_applied(result, dry_run, show_diff));
        let stop = !summary.is_success() && policy == FailurePolicy::FailFast;
        total.merge(summary);
        println!();

        if stop {
            break;
        }
    }

    // Plans never reached after a fail-fast stop
    for (_, plan) in plans {
        total
            .skipped
            .extend(plan.iter().map(|fix| fix.target().to_path_buf()));
    }

    print_summary(&total);

    if !total.is_success() {
        std::process::exit(1);
    }

    Ok(())
}

fn cmd_check(root: Option<PathBuf>, plan: Option<PathBuf>) -> Result<()> {
    let root = resolve_root(root)?;
    let plans = gate_plans(&root, load_plans(&root, plan)?)?;
    let runner = Runner::new(build_engine(&root, WriteMode::DryRun, false)?)
        .policy(FailurePolicy::ContinueOnError);

    println!("{}", "Fix Status Report".bold());
    println!("Root: {}", root.display());
    println!();

    let mut total = Summary::default();

    for (_, plan) in &plans {
        println!("{}", plan.name().bold());
        let summary = runner.run_with(plan, |result| {
            if !result.succeeded {
                report_failure(result);
            } else if result.changed {
                println!(
                    "{} {}: would change ({} match(es))",
                    "⊙".yellow(),
                    result.path.display(),
                    result.matches
                );
            } else {
                println!("{} {}: clean", "✓".green(), result.path.display());
            }
        });
        total.merge(summary);
        println!();
    }

    let pending = total.changed();
    let failed = total.failed();
    let clean = total.succeeded() - pending;

    println!("{}", "Summary:".bold());
    println!("  {} clean", format!("{}", clean).green());
    println!("  {} would change", format!("{}", pending).yellow());
    println!("  {} failed", format!("{}", failed).red());

    if pending > 0 || failed > 0 {
        std::process::exit(1);
    }

    Ok(())
}

fn cmd_list(root: Option<PathBuf>, plan: Option<PathBuf>) -> Result<()> {
    let root = resolve_root(root)?;

    for (file, plan) in load_plans(&root, plan)? {
        println!("{} ({})", plan.name().bold(), file.display());
        if let Some(description) = plan.description() {
            println!("  {}", description.dimmed());
        }
        if let Some(range) = plan.version_range() {
            println!("  versions: {}", range);
        }

        for fix in &plan {
            println!("  {}", fix.target().display());
            for rule in fix.rules() {
                println!("    - {} [{}]", rule, rule.flags());
            }
        }
        println!();
    }

    Ok(())
}
