use colored::Colorize;
use env_logger::Env;
use log::{error, info};
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use eigakuizu::libkuizu::db;
use eigakuizu::libkuizu::db::Movie;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

#[derive(Parser, Debug)]
#[command(name = "入出力者 (Nyūshutsuryokusha)")]
#[command(version, about = "Imports and exports movie lists for 映画クイズ", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,

    #[arg(short, long, default_value = "info")]
    log_level: String,
    #[arg(short, long, value_name = "FILE", default_value = "moviequiz.db")]
    db: PathBuf,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Commands {
    /// Adds the movies of a JSON file to the database
    Import { json: PathBuf },
    /// Writes every movie in the database to a JSON file
    Export { json: PathBuf },
    /// Removes one movie by its id
    Delete { id: i32 },
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct MoviesJson {
    movies: Vec<MovieJson>,
}
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct MovieJson {
    title: String,
    rating: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    poster: Option<PathBuf>,
}

fn main() {
    let args = Args::parse();
    env_logger::Builder::from_env(Env::default().default_filter_or(&args.log_level)).init();

    info!("{}", format!("Database at {:?}", args.db).cyan());
    let db = match db::create_or_open(&args.db) {
        Ok(d) => d,
        Err(e) => {
            error!("{}{}", "Unable to open Database: ".red(), e);
            std::process::exit(1);
        }
    };

    let outcome = match &args.command {
        Commands::Import { json } => import(&db, json),
        Commands::Export { json } => export(&db, json),
        Commands::Delete { id } => delete(&db, *id),
    };
    let closed = db::close_db(db);

    if let Err(e) = outcome.and(closed) {
        error!("{}", format!("{}!", e).red());
        std::process::exit(1);
    }
}

fn read_movies(json_file: &Path) -> eigakuizu::Result<MoviesJson> {
    let json = std::fs::read_to_string(json_file)?;
    Ok(serde_json::from_str(json.as_str())?)
}

fn import(db: &Connection, json_file: &Path) -> eigakuizu::Result<usize> {
    let content = read_movies(json_file)?;
    info!(
        "{}",
        format!("Importing data... ({} Movies)", content.movies.len()).blue()
    );

    // poster paths in the file are relative to the file itself
    let base = json_file.parent().unwrap_or(Path::new(""));
    let mut imported = 0;
    for movie in &content.movies {
        if !validate_movie(movie) {
            error!(
                "{}",
                format!("├ ✘ Movie: {:?} (Missing `title` or rating out of 0-10)", movie)
                    .red()
                    .strikethrough()
            );
            continue;
        }
        if Movie::exists(db, &movie.title)? {
            info!("{}", format!("├ ~ Movie: {} (already present)", movie.title).yellow());
            continue;
        }
        Movie::add(
            db,
            &Movie {
                id: None,
                title: movie.title.clone(),
                rating: movie.rating,
                poster: movie
                    .poster
                    .as_ref()
                    .map(|p| base.join(p))
                    .unwrap_or_default(),
            },
        )?;
        imported += 1;
        info!("{}", format!("├ Movie: {} ({})", movie.title, movie.rating).green());
    }
    info!("{}", format!("└ Imported {} Movies", imported).blue());
    Ok(imported)
}

fn export(db: &Connection, json_file: &Path) -> eigakuizu::Result<usize> {
    let movies = Movie::get_all(db)?;
    let content = MoviesJson {
        movies: movies
            .into_iter()
            .map(|m| MovieJson {
                title: m.title,
                rating: m.rating,
                poster: (!m.poster.as_os_str().is_empty()).then_some(m.poster),
            })
            .collect(),
    };
    std::fs::write(json_file, serde_json::to_string_pretty(&content)?)?;
    info!(
        "{}",
        format!("Exported {} Movies to {:?}", content.movies.len(), json_file).blue()
    );
    Ok(content.movies.len())
}

fn delete(db: &Connection, id: i32) -> eigakuizu::Result<usize> {
    match Movie::get_by_id(db, id)? {
        Some(movie) => {
            Movie::delete(db, id)?;
            info!("{}", format!("✘ Movie: {} ({})", movie.title, id).yellow());
            Ok(1)
        }
        None => {
            info!("{}", format!("No Movie with id {}", id).yellow());
            Ok(0)
        }
    }
}

fn validate_movie(movie: &MovieJson) -> bool {
    !movie.title.trim().is_empty() && (0.0..=10.0).contains(&movie.rating)
}
