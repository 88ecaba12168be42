use crate::Result;
use chrono::{DateTime, Local, TimeZone};
use log::{debug, info};
use std::collections::HashMap;

/// Keys of the persisted statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Correct,
    BestGameCorrect,
    BestGameTotal,
    BestGameDate,
    GamesCount,
    CorrectAnswers,
    TotalAnswers,
}

impl Key {
    pub fn as_str(&self) -> &'static str {
        match self {
            Key::Correct => "correct",
            Key::BestGameCorrect => "bestGameCorrect",
            Key::BestGameTotal => "bestGameTotal",
            Key::BestGameDate => "bestGameDate",
            Key::GamesCount => "gamesCount",
            Key::CorrectAnswers => "correctAnswers",
            Key::TotalAnswers => "totalAnswers",
        }
    }
}

/// Integer key-value persistence. Writes must be durable when they return.
pub trait KeyValueStore {
    fn integer(&self, key: Key) -> Result<Option<i64>>;
    fn set_integer(&mut self, key: Key, value: i64) -> Result<()>;

    /// Writes all of `values` or none of them. The default only holds for
    /// stores whose single writes cannot fail.
    fn set_integers(&mut self, values: &[(Key, i64)]) -> Result<()> {
        for (key, value) in values {
            self.set_integer(*key, *value)?;
        }
        Ok(())
    }
}

/// Store that forgets everything when dropped.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: HashMap<Key, i64>,
}

impl KeyValueStore for MemoryStore {
    fn integer(&self, key: Key) -> Result<Option<i64>> {
        Ok(self.values.get(&key).copied())
    }

    fn set_integer(&mut self, key: Key, value: i64) -> Result<()> {
        self.values.insert(key, value);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GameResult {
    pub correct: u32,
    pub total: u32,
    pub date: DateTime<Local>,
}

impl GameResult {
    pub fn new(correct: u32, total: u32, date: DateTime<Local>) -> Self {
        debug_assert!(correct <= total);
        Self {
            correct,
            total,
            date,
        }
    }

    /// Only a strictly higher correct count wins; ties keep the old record.
    pub fn is_better_than(&self, other: &GameResult) -> bool {
        self.correct > other.correct
    }

    pub fn date_time_string(&self) -> String {
        self.date.format("%d.%m.%y %H:%M").to_string()
    }
}

pub struct StatisticService {
    storage: Box<dyn KeyValueStore>,
}

impl StatisticService {
    pub fn new(storage: Box<dyn KeyValueStore>) -> Self {
        Self { storage }
    }

    fn count(&self, key: Key) -> Result<u32> {
        Ok(self.storage.integer(key)?.unwrap_or(0).max(0) as u32)
    }

    pub fn games_count(&self) -> Result<u32> {
        self.count(Key::GamesCount)
    }

    pub fn correct_answers(&self) -> Result<u32> {
        self.count(Key::CorrectAnswers)
    }

    pub fn total_answers(&self) -> Result<u32> {
        self.count(Key::TotalAnswers)
    }

    pub fn best_game(&self) -> Result<GameResult> {
        let correct = self.count(Key::BestGameCorrect)?;
        let total = self.count(Key::BestGameTotal)?;
        let date = self
            .storage
            .integer(Key::BestGameDate)?
            .and_then(|secs| Local.timestamp_opt(secs, 0).single())
            .unwrap_or_else(Local::now);
        Ok(GameResult {
            correct,
            total,
            date,
        })
    }

    /// Accuracy over every answer ever given, in percent.
    pub fn total_accuracy(&self) -> Result<f64> {
        let total = self.total_answers()?;
        if self.games_count()? == 0 || total == 0 {
            return Ok(0.0);
        }
        Ok(100.0 * self.correct_answers()? as f64 / total as f64)
    }

    pub fn store(&mut self, game: &GameResult) -> Result<()> {
        let correct = self.correct_answers()? + game.correct;
        let total = self.total_answers()? + game.total;
        let games = self.games_count()? + 1;
        let mut values = vec![
            (Key::CorrectAnswers, correct as i64),
            (Key::TotalAnswers, total as i64),
            (Key::GamesCount, games as i64),
            (Key::Correct, game.correct as i64),
        ];
        let new_best = game.is_better_than(&self.best_game()?);
        if new_best {
            values.extend([
                (Key::BestGameCorrect, game.correct as i64),
                (Key::BestGameTotal, game.total as i64),
                (Key::BestGameDate, game.date.timestamp()),
            ]);
        }
        self.storage.set_integers(&values)?;

        debug!(
            "[Stats] Stored game {}/{} (games: {}, answers: {}/{})",
            game.correct, game.total, games, correct, total
        );
        if new_best {
            info!("[Stats] New best game: {}/{}", game.correct, game.total);
        }
        Ok(())
    }
}
