//! Keeps a local copy of your courses on the BITS CMS.
//!
//! # Usage
//!
//! ```bash
//! coursesync -a        # add course codes to the list
//! coursesync           # sync every listed course into ~/Academics
//! coursesync -l        # show what has been downloaded so far
//! ```

use std::{io::Stdout, path::PathBuf, process::ExitCode, time::Duration};

use anyhow::{Context, Result};
use clap::{ArgGroup, Parser, ValueEnum};
use coursesync::{
    CourseList, SyncReport, Synchronizer,
    config::{Config, DEFAULT_PORTAL},
    course::CodePrompt,
    download_log::scan_logs,
};
use tokio::io::{BufReader, Stdin};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "coursesync",
    version,
    about = "Synchronize your course files from the BITS CMS"
)]
#[command(group(
    ArgGroup::new("action").args(["add_courses", "delete_courses", "reset", "sync", "view_logs"])
))]
struct Cli {
    /// Add courses to your course list
    #[arg(short = 'a', long)]
    add_courses: bool,

    /// Remove courses from your course list
    #[arg(short = 'd', long)]
    delete_courses: bool,

    /// Delete your course list and start a new one (e.g. at the start of a semester)
    #[arg(short = 'r', long)]
    reset: bool,

    /// Sync your machine with the CMS server (default)
    #[arg(short = 'S', long)]
    sync: bool,

    /// View what has been downloaded for each course
    #[arg(short = 'l', long)]
    view_logs: bool,

    /// Output verbosity: quiet, verbose or debug
    #[arg(short = 'v', long, value_enum, default_value_t = Verbosity::Q)]
    verbosity: Verbosity,

    /// Directory holding the course list and one folder per course [default: ~/Academics]
    #[arg(long)]
    root: Option<PathBuf>,

    /// Base URL of the CMS portal
    #[arg(long, default_value = DEFAULT_PORTAL)]
    portal: String,

    /// Connect timeout and longest pause between received bytes, in seconds
    #[arg(long, default_value_t = 60)]
    timeout: u64,

    /// Print results as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum Verbosity {
    Q,
    V,
    D,
}

impl Verbosity {
    fn level(self) -> &'static str {
        match self {
            Self::Q => "warn",
            Self::V => "info",
            Self::D => "debug",
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Action {
    Sync,
    AddCourses,
    DeleteCourses,
    Reset,
    ViewLogs,
}

impl Cli {
    fn action(&self) -> Action {
        if self.sync {
            Action::Sync
        } else if self.add_courses {
            Action::AddCourses
        } else if self.delete_courses {
            Action::DeleteCourses
        } else if self.reset {
            Action::Reset
        } else if self.view_logs {
            Action::ViewLogs
        } else {
            Action::Sync
        }
    }

    fn config(&self) -> Result<Config> {
        let config = match &self.root {
            Some(root) => Config::new(root, &self.portal)?,
            None => {
                let home = Config::from_home()?;
                Config::new(home.root_dir, &self.portal)?
            }
        };
        Ok(config.with_timeout(Duration::from_secs(self.timeout)))
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                EnvFilter::new(format!("warn,coursesync={}", cli.verbosity.level()))
            }),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = cli.config()?;
    let courses = config.courses();

    match cli.action() {
        Action::Sync => {
            if !courses.exists() {
                println!("Course list does not exist: {}", courses.path().display());
                add_courses(&courses).await?;
                return Ok(ExitCode::FAILURE);
            }
            let report = Synchronizer::new(config)?
                .run()
                .await
                .context("sync aborted")?;
            print_report(&report, cli.json)?;
        }
        Action::AddCourses => add_courses(&courses).await?,
        Action::DeleteCourses => delete_courses(&courses).await?,
        Action::Reset => {
            courses.reset().await?;
            println!("Removed {}", courses.path().display());
        }
        Action::ViewLogs => view_logs(&config, cli.json).await?,
    }

    Ok(ExitCode::SUCCESS)
}

fn stdin_prompt(prompt: &str) -> CodePrompt<BufReader<Stdin>, Stdout> {
    CodePrompt::new(BufReader::new(tokio::io::stdin()), std::io::stdout(), prompt)
}

async fn add_courses(courses: &CourseList) -> Result<()> {
    println!("Enter course codes, one per line, in this format: BITS C312");
    println!("Leave the line empty to finish.\n");
    let added = courses.add_from(&mut stdin_prompt("Enter Course Code: ")).await?;
    println!("Added {} course(s) to {}", added.len(), courses.path().display());
    Ok(())
}

async fn delete_courses(courses: &CourseList) -> Result<()> {
    for code in courses.load().await? {
        println!("  {code}");
    }
    println!("\nEnter the course codes to remove, one per line.");
    let codes = stdin_prompt("Remove Course Code: ").collect().await?;
    let removed = courses.remove(&codes).await?;
    println!("Removed {removed} course(s)");
    Ok(())
}

async fn view_logs(config: &Config, json: bool) -> Result<()> {
    let logged = scan_logs(&config.root_dir).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&logged)?);
        return Ok(());
    }
    if logged.is_empty() {
        println!("Nothing downloaded yet under {}", config.root_dir.display());
    }
    for dir in &logged {
        println!("{} ({} file(s))", dir.name, dir.identities.len());
        for id in &dir.identities {
            println!("  {id}");
        }
    }
    Ok(())
}

fn print_report(report: &SyncReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }
    for course in &report.courses {
        println!("Course Code: {}", course.code);
        println!("Course name: {}", course.name);
        for filename in &course.downloaded {
            println!("  {filename}");
        }
    }
    for failure in &report.failed {
        println!("{}: {}", failure.code, failure.error);
    }
    println!(
        "\nComplete! Downloaded {} new file(s), {} already present.",
        report.downloaded(),
        report.skipped()
    );
    Ok(())
}
