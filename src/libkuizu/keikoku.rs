use crate::libkuizu::shinkou::{Lane, LaneEvent, ResultViewModel};
use log::debug;

/// Why an alert was raised; decides what restarting means.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertReason {
    ErrorWithData,
    EndGame,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AlertModel {
    pub title: String,
    pub message: String,
    pub button_text: String,
    pub reason: AlertReason,
}

impl AlertModel {
    pub fn data_error(message: &str) -> Self {
        Self {
            title: "Error".to_string(),
            message: message.to_string(),
            button_text: "Try again".to_string(),
            reason: AlertReason::ErrorWithData,
        }
    }

    pub fn round_over(result: &ResultViewModel) -> Self {
        Self {
            title: result.title.clone(),
            message: result.text.clone(),
            button_text: result.button_text.clone(),
            reason: AlertReason::EndGame,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dismissal {
    Acknowledged,
    Quit,
}

/// Renders an alert and blocks until the user dismisses it.
pub trait AlertPresenter {
    fn present(&mut self, model: &AlertModel) -> Dismissal;
}

pub struct AlertCoordinator<P: AlertPresenter> {
    presenter: P,
}

impl<P: AlertPresenter> AlertCoordinator<P> {
    pub fn new(presenter: P) -> Self {
        Self { presenter }
    }

    /// Shows `model` and reports its reason back through `lane` once the
    /// user acknowledges it. Returns `false` if the user asked to quit.
    pub fn request_alert<L: Lane>(&mut self, model: AlertModel, lane: &L) -> bool {
        debug!("[Alert] Presenting '{}' ({:?})", model.title, model.reason);
        match self.presenter.present(&model) {
            Dismissal::Acknowledged => {
                lane.post(LaneEvent::AlertDismissed(model.reason));
                true
            }
            Dismissal::Quit => {
                debug!("[Alert] Dismissed with quit");
                false
            }
        }
    }
}
