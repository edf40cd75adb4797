use std::fmt;
use std::io::BufRead;
use std::path::PathBuf;

use lexi_core::analytics::MAX_TREND_DAYS;
use lexi_core::evaluation::AnswerInput;
use lexi_core::model::{AnswerMode, Exercise, LessonId, SessionStatus, UserId};
use lexi_core::session::AnswerOutcome;
use services::{Clock, DEFAULT_TREND_DAYS, EngineServices, SessionError};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;

use config::{DEFAULT_DB_URL, DEFAULT_USER_ID, FileConfig};

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    UnknownCommand(String),
    InvalidLessonId { raw: String },
    InvalidDays { raw: String },
    InvalidDbUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::UnknownCommand(cmd) => write!(f, "unknown subcommand: {cmd}"),
            ArgsError::InvalidLessonId { raw } => write!(f, "invalid --lesson value: {raw}"),
            ArgsError::InvalidDays { raw } => write!(f, "invalid --days value: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  lexi <command> [options]");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  practice --lesson <id>    Run a lesson session on stdin/stdout");
    eprintln!("  schedule [--by-category]  Recompute and print the review schedule");
    eprintln!("  weak-areas                Print weak categories");
    eprintln!("  report [--days <n>]       Print the analytics report (1-{MAX_TREND_DAYS} days, default 7)");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db <sqlite_url>         SQLite URL (default: {DEFAULT_DB_URL})");
    eprintln!("  --user <id>               Learner id (default: {DEFAULT_USER_ID})");
    eprintln!("  --config <path>           TOML config file");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  LEXI_DB_URL, LEXI_USER_ID, LEXI_CONFIG, LEXI_LOG (or RUST_LOG)");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Practice,
    Schedule,
    WeakAreas,
    Report,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "practice" => Some(Self::Practice),
            "schedule" => Some(Self::Schedule),
            "weak-areas" => Some(Self::WeakAreas),
            "report" => Some(Self::Report),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
struct Args {
    db_url: Option<String>,
    user_id: Option<String>,
    config: Option<PathBuf>,
    lesson: Option<LessonId>,
    days: Option<u32>,
    by_category: bool,
}

impl Args {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut parsed = Self {
            db_url: std::env::var("LEXI_DB_URL").ok(),
            user_id: std::env::var("LEXI_USER_ID").ok(),
            config: std::env::var("LEXI_CONFIG").ok().map(PathBuf::from),
            ..Self::default()
        };

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    parsed.db_url = Some(value);
                }
                "--user" => parsed.user_id = Some(require_value(args, "--user")?),
                "--config" => parsed.config = Some(PathBuf::from(require_value(args, "--config")?)),
                "--lesson" => {
                    let value = require_value(args, "--lesson")?;
                    let id = value
                        .parse::<LessonId>()
                        .map_err(|_| ArgsError::InvalidLessonId { raw: value.clone() })?;
                    parsed.lesson = Some(id);
                }
                "--days" => {
                    let value = require_value(args, "--days")?;
                    let days = value
                        .parse::<u32>()
                        .ok()
                        .filter(|d| (1..=MAX_TREND_DAYS).contains(d))
                        .ok_or_else(|| ArgsError::InvalidDays { raw: value.clone() })?;
                    parsed.days = Some(days);
                }
                "--by-category" => parsed.by_category = true,
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }
        Ok(parsed)
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("LEXI_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw.contains(":memory:") || raw.starts_with("sqlite://") {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = std::path::Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url.contains(":memory:") {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = std::path::Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }
    Ok(())
}

/// Map a typed line onto the input kind the exercise expects.
fn read_answer(exercise: &Exercise, line: &str) -> AnswerInput {
    match exercise.kind().answer_mode() {
        AnswerMode::Choice => {
            let picked = line
                .parse::<usize>()
                .ok()
                .and_then(|n| n.checked_sub(1))
                .and_then(|i| exercise.options().and_then(|opts| opts.get(i)));
            AnswerInput::choice(picked.map_or(line, String::as_str))
        }
        AnswerMode::Text => AnswerInput::text(line),
        AnswerMode::Spoken => match line.to_ascii_lowercase().as_str() {
            "y" | "yes" => AnswerInput::Judgement(true),
            "n" | "no" => AnswerInput::Judgement(false),
            _ => AnswerInput::text(line),
        },
    }
}

async fn practice(
    services: &EngineServices,
    user: &UserId,
    lesson: LessonId,
) -> Result<(), Box<dyn std::error::Error>> {
    let session_loop = services.session_loop();
    let mut session = session_loop.start_lesson(user, lesson).await?;
    let mut lines = std::io::stdin().lock().lines();

    while let Some(exercise) = session.current_exercise().cloned() {
        let progress = session.progress();
        println!();
        println!(
            "[{}/{}] lives: {}",
            progress.answered + 1,
            progress.total,
            progress.lives_remaining
        );
        println!("{}", exercise.prompt());
        if let Some(options) = exercise.options() {
            for (i, option) in options.iter().enumerate() {
                println!("  {}. {option}", i + 1);
            }
        }
        if let Some(hint) = exercise.hint() {
            println!("  hint: {hint}");
        }

        let Some(line) = lines.next().transpose()? else {
            info!(session = %session.engine().id(), "input closed; session abandoned");
            return Ok(());
        };
        let step = match session_loop
            .submit_answer(&mut session, &read_answer(&exercise, line.trim()))
            .await
        {
            Ok(step) => step,
            Err(SessionError::Engine(err)) => {
                println!("{err}");
                continue;
            }
            Err(err) => return Err(err.into()),
        };

        if let AnswerOutcome::Judged {
            correct,
            expected,
            explanation,
            ..
        } = &step.outcome
        {
            if *correct {
                println!("correct!");
            } else {
                println!("not quite, the answer is: {expected}");
            }
            if let Some(explanation) = explanation {
                println!("{explanation}");
            }
        }
        if !session.is_over() {
            session_loop.acknowledge(&mut session).await?;
        }
    }

    let finished = session_loop.finalize(&mut session).await?;
    println!();
    match finished.outcome.status {
        SessionStatus::Complete => println!(
            "lesson complete: +{} xp, +{} gems",
            finished.outcome.rewards.xp, finished.outcome.rewards.gems
        ),
        _ => println!("out of lives, try again"),
    }
    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv = std::env::args().skip(1);
    let cmd = match argv.next() {
        None => {
            print_usage();
            return Ok(());
        }
        Some(first) if first == "--help" || first == "-h" => {
            print_usage();
            return Ok(());
        }
        Some(first) => Command::from_arg(&first).ok_or(ArgsError::UnknownCommand(first)),
    }
    .and_then(|cmd| Args::parse(&mut argv).map(|args| (cmd, args)))
    .map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;
    let (cmd, args) = cmd;

    let file = FileConfig::load(args.config.as_deref())?;
    let db_url = normalize_sqlite_url(
        args.db_url
            .or(file.database_url)
            .unwrap_or_else(|| DEFAULT_DB_URL.to_string()),
    );
    let user = UserId::new(
        args.user_id
            .or(file.user_id)
            .unwrap_or_else(|| DEFAULT_USER_ID.to_string()),
    )?;

    // Open + migrate SQLite at startup. Keep this in the binary glue so core/services stay pure.
    prepare_sqlite_file(&db_url)?;
    let services = EngineServices::new_sqlite(&db_url, Clock::default(), file.engine).await?;
    info!(db = %db_url, user = %user, "storage ready");

    match cmd {
        Command::Practice => {
            let lesson = args.lesson.ok_or(ArgsError::MissingValue { flag: "--lesson" })?;
            practice(&services, &user, lesson).await
        }
        Command::Schedule => {
            let schedule = services.schedule();
            let body = if args.by_category {
                serde_json::to_string_pretty(&schedule.by_category(&user).await?)?
            } else {
                serde_json::to_string_pretty(&schedule.refresh(&user).await?)?
            };
            println!("{body}");
            Ok(())
        }
        Command::WeakAreas => {
            let areas = services.analytics().weak_areas(&user).await?;
            println!("{}", serde_json::to_string_pretty(&areas)?);
            Ok(())
        }
        Command::Report => {
            let days = args.days.unwrap_or(DEFAULT_TREND_DAYS);
            let report = services.analytics().report(&user, days).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() {
    init_tracing();
    if let Err(err) = run().await {
        // At this layer (binary glue), printing once is fine.
        eprintln!("{err}");
        std::process::exit(2);
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
