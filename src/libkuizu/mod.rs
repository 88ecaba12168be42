pub mod db;
pub mod keikoku;
pub mod shinkou;
pub mod shitsumon;
pub mod toukei;
