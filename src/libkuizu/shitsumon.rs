use crate::libkuizu::db::Movie;
use crate::libkuizu::shinkou::{Lane, LaneEvent};
use crate::{Error, Result};
use log::{debug, warn};
use rand::rng;
use rand::seq::IndexedRandom;
use rand::Rng;
use rusqlite::Connection;
use std::ops::RangeInclusive;
use std::rc::Rc;
use std::time::Instant;

/// Rating thresholds questions are asked about.
pub const RATING_THRESHOLDS: RangeInclusive<u8> = 5..=8;

#[derive(Debug, Clone, PartialEq)]
pub struct Question {
    pub image: Vec<u8>,
    pub text: String,
    pub correct_answer: bool,
}

/// Produces questions. Results are delivered through the lane as
/// `DataReady`/`DataFailed` and `QuestionReceived`.
pub trait QuestionSupply {
    fn load_data(&mut self);
    fn request_next_question(&mut self);
}

pub fn question_for(movie: &Movie, image: Vec<u8>, threshold: u8) -> Question {
    Question {
        image,
        text: format!("Is this movie's rating greater than {threshold}?"),
        correct_answer: movie.rating > threshold as f32,
    }
}

pub struct MovieQuestionFactory<L: Lane> {
    conn: Rc<Connection>,
    lane: L,
    movies: Vec<Movie>,
}

impl<L: Lane> MovieQuestionFactory<L> {
    pub fn new(conn: Rc<Connection>, lane: L) -> Self {
        Self {
            conn,
            lane,
            movies: Vec::new(),
        }
    }

    fn fetch_movies(&self) -> Result<Vec<Movie>> {
        let now = Instant::now();
        let movies = Movie::get_all(&self.conn)?;
        debug!(
            "[Supply] Loaded {} movies in {} ms.",
            movies.len(),
            now.elapsed().as_millis()
        );
        if movies.is_empty() {
            return Err(Error::NoMovies);
        }
        Ok(movies)
    }
}

impl<L: Lane> QuestionSupply for MovieQuestionFactory<L> {
    fn load_data(&mut self) {
        match self.fetch_movies() {
            Ok(movies) => {
                self.movies = movies;
                self.lane.post(LaneEvent::DataReady);
            }
            Err(Error::NoMovies) => {
                warn!("[Supply] No movies found.");
                self.lane.post(LaneEvent::DataFailed(
                    "No movies found. Import some with nyuushutsuryokusha first!".to_string(),
                ));
            }
            Err(err) => {
                warn!("[Supply] Cannot load movies: {}", err);
                self.lane.post(LaneEvent::DataFailed(err.to_string()));
            }
        }
    }

    fn request_next_question(&mut self) {
        let mut rng = rng();
        let Some(movie) = self.movies.choose(&mut rng) else {
            warn!("[Supply] Question requested before any movie was loaded.");
            self.lane.post(LaneEvent::QuestionReceived(None));
            return;
        };
        let image = match std::fs::read(&movie.poster) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!("[Supply] Failed to load poster {:?}: {}", movie.poster, err);
                Vec::new()
            }
        };
        let threshold = rng.random_range(RATING_THRESHOLDS);
        debug!("[Supply] Asking about '{}' > {}", movie.title, threshold);
        self.lane.post(LaneEvent::QuestionReceived(Some(question_for(
            movie, image, threshold,
        ))));
    }
}
