use std::fmt;

use chrono::{DateTime, Utc};
use storage::repository::Storage;
use vocab_core::model::{MasteryRecord, Student, StudentId, Word, WordId};

#[derive(Debug, Clone)]
struct Args {
    db_url: String,
    student_id: StudentId,
    student_name: String,
    word_set: String,
    words: u32,
    now: Option<DateTime<Utc>>,
}

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidStudentId { raw: String },
    InvalidWords { raw: String },
    InvalidDbUrl { raw: String },
    InvalidNow { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidStudentId { raw } => write!(f, "invalid --student-id value: {raw}"),
            ArgsError::InvalidWords { raw } => write!(f, "invalid --words value: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidNow { raw } => {
                write!(f, "invalid --now value (expected RFC3339): {raw}")
            }
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
            std::env::var("VOCAB_DB_URL").unwrap_or_else(|_| "sqlite:dev.sqlite3".into());
        let mut student_id = std::env::var("VOCAB_STUDENT_ID")
            .ok()
            .and_then(|value| value.parse::<u64>().ok())
            .map_or_else(|| StudentId::new(1), StudentId::new);
        let mut student_name =
            std::env::var("VOCAB_STUDENT_NAME").unwrap_or_else(|_| "Demo Student".into());
        let mut word_set = std::env::var("VOCAB_WORD_SET").unwrap_or_else(|_| "starter".into());
        let mut words = std::env::var("VOCAB_WORDS")
            .ok()
            .and_then(|value| value.parse::<u32>().ok())
            .unwrap_or(20);
        let mut now: Option<DateTime<Utc>> = None;

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
                "--student-id" => {
                    let value = require_value(&mut args, "--student-id")?;
                    let parsed: u64 = value
                        .parse()
                        .map_err(|_| ArgsError::InvalidStudentId { raw: value.clone() })?;
                    student_id = StudentId::new(parsed);
                }
                "--student-name" => {
                    let value = require_value(&mut args, "--student-name")?;
                    student_name = value;
                }
                "--word-set" => {
                    let value = require_value(&mut args, "--word-set")?;
                    word_set = value;
                }
                "--words" => {
                    let value = require_value(&mut args, "--words")?;
                    words = value
                        .parse::<u32>()
                        .map_err(|_| ArgsError::InvalidWords { raw: value.clone() })?;
                }
                "--now" => {
                    let value = require_value(&mut args, "--now")?;
                    let parsed = DateTime::parse_from_rfc3339(&value)
                        .map_err(|_| ArgsError::InvalidNow { raw: value.clone() })?
                        .with_timezone(&Utc);
                    now = Some(parsed);
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
            student_id,
            student_name,
            word_set,
            words,
            now,
        })
    }
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p storage --bin seed -- [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db <sqlite_url>         SQLite URL (default: sqlite:dev.sqlite3)");
    eprintln!("  --student-id <id>         Student id to upsert (default: 1)");
    eprintln!("  --student-name <name>     Student name (default: Demo Student)");
    eprintln!("  --word-set <name>         Word set to seed into (default: starter)");
    eprintln!("  --words <n>               Number of sample words to upsert and assign (default: 20)");
    eprintln!("  --now <rfc3339>           Fixed current time for deterministic seeding");
    eprintln!("  -h, --help                Show this help");
    eprintln!();
    eprintln!("Environment (same as flags):");
    eprintln!(
        "  VOCAB_DB_URL, VOCAB_STUDENT_ID, VOCAB_STUDENT_NAME, VOCAB_WORD_SET, VOCAB_WORDS"
    );
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse().map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let storage = Storage::sqlite(&args.db_url).await?;
    let now = args.now.unwrap_or_else(Utc::now);

    let student = Student::new(args.student_id, args.student_name.clone(), now);
    storage.students.upsert_student(&student).await?;

    let samples = [
        ("apple", "苹果"),
        ("book", "书"),
        ("cat", "猫"),
        ("door", "门"),
        ("egg", "鸡蛋"),
        ("fish", "鱼"),
        ("green", "绿色"),
        ("house", "房子"),
        ("ice", "冰"),
        ("jump", "跳"),
    ];
    for i in 0..args.words {
        let (english, chinese) = samples[(i as usize) % samples.len()];
        let word_id = WordId::new(u64::from(i + 1));
        let word = Word::new(word_id, args.word_set.clone(), english, chinese, now);
        storage.words.upsert_word(&word).await?;
        storage
            .mastery
            .assign_word(&MasteryRecord::assigned(student.id, word_id, now))
            .await?;
    }

    println!(
        "Seeded student {} with {} words in set '{}' into {}",
        student.id.value(),
        args.words,
        args.word_set,
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
