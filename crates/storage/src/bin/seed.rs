use std::fmt;

use lexi_core::model::{
    CategoryId, Exercise, ExerciseId, Lesson, LessonId, Word, WordCategory, WordId,
};
use storage::repository::Storage;

#[derive(Debug, Clone)]
struct Args {
    db_url: String,
    lesson_id: LessonId,
    lesson_title: String,
    words: u32,
}

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidLessonId { raw: String },
    InvalidDbUrl { raw: String },
    InvalidWords { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidLessonId { raw } => write!(f, "invalid --lesson-id value: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidWords { raw } => write!(f, "invalid --words value: {raw}"),
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

impl Args {
    fn parse() -> Result<Self, ArgsError> {
        let mut db_url =
            std::env::var("LEXI_DB_URL").unwrap_or_else(|_| "sqlite:lexi.sqlite3?mode=rwc".into());
        let mut lesson_id = std::env::var("LEXI_LESSON_ID")
            .ok()
            .and_then(|value| value.parse::<u64>().ok())
            .map_or_else(|| LessonId::new(1), LessonId::new);
        let mut lesson_title =
            std::env::var("LEXI_LESSON_TITLE").unwrap_or_else(|_| "Greetings".into());
        let mut words = std::env::var("LEXI_WORDS")
            .ok()
            .and_then(|value| value.parse::<u32>().ok())
            .unwrap_or(5);

        let mut args = std::env::args().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = value;
                }
                "--lesson-id" => {
                    let value = require_value(&mut args, "--lesson-id")?;
                    let parsed: u64 = value
                        .parse()
                        .map_err(|_| ArgsError::InvalidLessonId { raw: value.clone() })?;
                    lesson_id = LessonId::new(parsed);
                }
                "--lesson-title" => {
                    lesson_title = require_value(&mut args, "--lesson-title")?;
                }
                "--words" => {
                    let value = require_value(&mut args, "--words")?;
                    words = value
                        .parse::<u32>()
                        .map_err(|_| ArgsError::InvalidWords { raw: value.clone() })?;
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self {
            db_url,
            lesson_id,
            lesson_title,
            words,
        })
    }
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p storage --bin seed -- [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db <sqlite_url>         SQLite URL (default: sqlite:lexi.sqlite3?mode=rwc)");
    eprintln!("  --lesson-id <id>          Lesson id to upsert (default: 1)");
    eprintln!("  --lesson-title <title>    Lesson title (default: Greetings)");
    eprintln!("  --words <n>               Number of sample words to upsert (default: 5)");
    eprintln!("  -h, --help                Show this help");
    eprintln!();
    eprintln!("Environment (same as flags):");
    eprintln!("  LEXI_DB_URL, LEXI_LESSON_ID, LEXI_LESSON_TITLE, LEXI_WORDS");
}

const SAMPLES: [(&str, &str, &str); 5] = [
    ("hallo", "hello", "___, wie geht's?"),
    ("danke", "thank you", "___ für die Hilfe."),
    ("bitte", "please", "Einen Kaffee, ___."),
    ("tschuess", "bye", "___, bis morgen!"),
    ("morgen", "tomorrow", "Bis ___!"),
];

struct SeedContent {
    categories: Vec<WordCategory>,
    words: Vec<Word>,
    lesson: Lesson,
}

fn build_content(args: &Args) -> Result<SeedContent, lexi_core::Error> {
    let basics = CategoryId::new("basics")?;
    let greetings = CategoryId::new("greetings")?;
    let categories = vec![
        WordCategory::new(basics.clone(), "Basics", 1)?,
        WordCategory::new(greetings.clone(), "Greetings", 1)?,
    ];

    let translations: Vec<&str> = SAMPLES.iter().map(|(_, t, _)| *t).collect();
    let mut words = Vec::new();
    let mut exercises = Vec::new();
    let mut next_exercise = 1_u64;
    for i in 0..args.words {
        let (text, translation, sentence) = SAMPLES[(i as usize) % SAMPLES.len()];
        let word_id = WordId::new(text)?;
        let categories = if i % 2 == 0 {
            vec![basics.clone(), greetings.clone()]
        } else {
            vec![basics.clone()]
        };
        words.push(Word::new(word_id.clone(), text, categories)?);

        exercises.push(Exercise::word_matching(
            ExerciseId::new(next_exercise),
            word_id.clone(),
            text,
            translation,
            &translations,
        )?);
        exercises.push(Exercise::fill_in_blanks(
            ExerciseId::new(next_exercise + 1),
            word_id,
            sentence,
            text,
            Some(translation),
        )?);
        next_exercise += 2;
    }

    let lesson = Lesson::new(args.lesson_id, args.lesson_title.clone(), exercises)?;
    Ok(SeedContent {
        categories,
        words,
        lesson,
    })
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse().map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let content = build_content(&args)?;
    let storage = Storage::sqlite(&args.db_url).await?;
    for category in &content.categories {
        storage.words.upsert_category(category).await?;
    }
    for word in &content.words {
        storage.words.upsert_word(word).await?;
    }
    storage.lessons.upsert_lesson(&content.lesson).await?;

    println!(
        "Seeded lesson {} ({}) with {} words into {}",
        args.lesson_id.value(),
        args.lesson_title,
        content.words.len(),
        args.db_url
    );

    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
