//! 映画クイズ (Eigakuizu!)
//!
//! Movie poster quiz: yes/no questions about movie ratings, ten per round,
//! with lifetime statistics kept in SQLite.

use std::io;
use thiserror::Error;

pub mod libkuizu;

#[derive(Debug, Error)]
pub enum Error {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("cannot read file: {0}")]
    Io(#[from] io::Error),
    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("no movies!")]
    NoMovies,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
