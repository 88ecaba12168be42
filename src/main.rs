use clap::Parser;
use colored::Colorize;
use eigakuizu::libkuizu::db::{self, SqliteStore};
use eigakuizu::libkuizu::keikoku::AlertCoordinator;
use eigakuizu::libkuizu::shinkou::{ChannelLane, QuizConfig, QuizFlow};
use eigakuizu::libkuizu::shitsumon::MovieQuestionFactory;
use eigakuizu::libkuizu::toukei::{KeyValueStore, MemoryStore, StatisticService};
use eigakuizu::Error;
use env_logger::Env;
use log::{debug, info};
use rusqlite::Connection;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::Duration;

mod cli;

use crate::cli::{read_choice, Choice, CliAlertPresenter, CliView};

#[derive(Parser, Debug)]
#[command(name = "映画クイズ (Eigakuizu!)")]
#[command(version, about, long_about = None)]
struct Args {
    #[arg(short, long, value_name = "FILE", default_value = "moviequiz.db")]
    db: PathBuf,
    #[arg(short, long, default_value = "10", value_parser = clap::value_parser!(u32).range(1..))]
    questions: u32,
    #[arg(short, long, value_name = "MS", default_value = "1000")]
    reveal_delay: u64,
    /// Keep statistics in memory only
    #[arg(long)]
    ephemeral: bool,
    #[arg(short, long, default_value = "error")]
    log_level: String,
}

fn main() -> Result<(), Error> {
    let args = Args::parse();
    env_logger::Builder::from_env(Env::default().default_filter_or(&args.log_level)).init();

    let conn = Rc::new(db::create_or_open(&args.db)?);
    debug!("[DB] Database Connection Successful!");

    let storage: Box<dyn KeyValueStore> = if args.ephemeral {
        info!("[Setup] Statistics will not be saved.");
        Box::new(MemoryStore::default())
    } else {
        Box::new(SqliteStore::new(conn.clone()))
    };
    let config = QuizConfig {
        questions_amount: args.questions,
        reveal_delay: Duration::from_millis(args.reveal_delay),
    };
    println!(
        "{}",
        format!(
            "==========> 映画クイズ ({} questions) <==========",
            config.questions_amount
        )
        .cyan()
    );

    let (lane, events) = ChannelLane::new();
    let supply = MovieQuestionFactory::new(conn.clone(), lane.clone());
    let mut flow = QuizFlow::new(
        config,
        supply,
        CliView::new(),
        lane.clone(),
        StatisticService::new(storage),
    );
    let mut alerts = AlertCoordinator::new(CliAlertPresenter);

    flow.start();
    while let Ok(event) = events.recv() {
        flow.handle(event);

        if let Some(alert) = flow.view_mut().take_pending_alert() {
            if !alerts.request_alert(alert, &lane) {
                break;
            }
            continue;
        }
        if flow.view_mut().take_answer_prompt() {
            match read_choice() {
                Choice::Answer(answer) => flow.on_answer(answer),
                Choice::Quit | Choice::Unknown => break,
            }
        }
    }
    println!("{}", "Bye!".cyan());

    drop(flow);
    finish(conn)
}

fn finish(conn: Rc<Connection>) -> Result<(), Error> {
    match Rc::try_unwrap(conn) {
        Ok(conn) => db::close_db(conn),
        Err(_) => Ok(()),
    }
}
