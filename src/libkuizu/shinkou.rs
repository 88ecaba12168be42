//! Quiz flow: question sequencing, scoring, round completion and restart.
//!
//! Everything the controller reacts to arrives through a [`Lane`], drained
//! on a single thread. The answer reveal delay is a `Resume` event posted
//! with a [`ResumeToken`]; restarting invalidates any token still in flight.

use crate::libkuizu::keikoku::{AlertModel, AlertReason};
use crate::libkuizu::shitsumon::{Question, QuestionSupply};
use crate::libkuizu::toukei::{GameResult, StatisticService};
use crate::Result;
use chrono::Local;
use log::{debug, error, info};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::thread;
use std::time::Duration;

pub const QUESTIONS_AMOUNT: u32 = 10;
pub const ANSWER_REVEAL_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuizConfig {
    pub questions_amount: u32,
    pub reveal_delay: Duration,
}

impl Default for QuizConfig {
    fn default() -> Self {
        Self {
            questions_amount: QUESTIONS_AMOUNT,
            reveal_delay: ANSWER_REVEAL_DELAY,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StepViewModel {
    pub image: Vec<u8>,
    pub question: String,
    pub question_number: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResultViewModel {
    pub title: String,
    pub text: String,
    pub button_text: String,
}

pub trait QuizView {
    fn show_step(&mut self, step: &StepViewModel);
    fn show_result(&mut self, result: &ResultViewModel);
    fn show_error(&mut self, alert: &AlertModel);
    fn set_input_enabled(&mut self, enabled: bool);
    fn set_busy(&mut self, busy: bool);
    fn highlight_correctness(&mut self, is_correct: bool);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResumeToken {
    epoch: u64,
    sequence: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LaneEvent {
    DataReady,
    DataFailed(String),
    QuestionReceived(Option<Question>),
    Present(StepViewModel),
    Resume(ResumeToken),
    AlertDismissed(AlertReason),
}

/// The UI-update lane. Events posted here are handled one at a time, in order.
pub trait Lane {
    fn post(&self, event: LaneEvent);
    fn post_after(&self, delay: Duration, event: LaneEvent);
}

#[derive(Clone)]
pub struct ChannelLane {
    tx: Sender<LaneEvent>,
}

impl ChannelLane {
    pub fn new() -> (Self, Receiver<LaneEvent>) {
        let (tx, rx) = channel();
        (Self { tx }, rx)
    }
}

impl Lane for ChannelLane {
    fn post(&self, event: LaneEvent) {
        if self.tx.send(event).is_err() {
            debug!("[Flow] Lane closed, dropping event");
        }
    }

    fn post_after(&self, delay: Duration, event: LaneEvent) {
        let tx = self.tx.clone();
        thread::spawn(move || {
            thread::sleep(delay);
            // receiver may be gone if the app quit meanwhile
            let _ = tx.send(event);
        });
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowState {
    AwaitingData,
    AwaitingQuestion,
    PresentingQuestion,
    RevealingAnswer,
    RoundComplete,
    DataError,
}

pub struct QuizFlow<Q: QuestionSupply, V: QuizView, L: Lane> {
    config: QuizConfig,
    question_index: u32,
    correct_answers: u32,
    current_question: Option<Question>,
    state: FlowState,
    epoch: u64,
    sequence: u64,
    pending_resume: Option<ResumeToken>,
    supply: Q,
    view: V,
    lane: L,
    statistics: StatisticService,
}

impl<Q: QuestionSupply, V: QuizView, L: Lane> QuizFlow<Q, V, L> {
    pub fn new(
        config: QuizConfig,
        supply: Q,
        view: V,
        lane: L,
        statistics: StatisticService,
    ) -> Self {
        Self {
            config,
            question_index: 0,
            correct_answers: 0,
            current_question: None,
            state: FlowState::AwaitingData,
            epoch: 0,
            sequence: 0,
            pending_resume: None,
            supply,
            view,
            lane,
            statistics,
        }
    }

    pub fn state(&self) -> FlowState {
        self.state
    }

    pub fn question_index(&self) -> u32 {
        self.question_index
    }

    pub fn correct_answers(&self) -> u32 {
        self.correct_answers
    }

    pub fn current_question(&self) -> Option<&Question> {
        self.current_question.as_ref()
    }

    pub fn view(&self) -> &V {
        &self.view
    }

    pub fn view_mut(&mut self) -> &mut V {
        &mut self.view
    }

    pub fn statistics(&self) -> &StatisticService {
        &self.statistics
    }

    pub fn is_last_question(&self) -> bool {
        self.question_index + 1 == self.config.questions_amount
    }

    pub fn convert(&self, question: &Question) -> StepViewModel {
        StepViewModel {
            image: question.image.clone(),
            question: question.text.clone(),
            question_number: format!(
                "{}/{}",
                self.question_index + 1,
                self.config.questions_amount
            ),
        }
    }

    pub fn handle(&mut self, event: LaneEvent) {
        match event {
            LaneEvent::DataReady => self.on_data_ready(),
            LaneEvent::DataFailed(message) => self.on_data_failed(&message),
            LaneEvent::QuestionReceived(question) => self.on_question_received(question),
            LaneEvent::Present(step) => self.present(&step),
            LaneEvent::Resume(token) => self.resume(token),
            LaneEvent::AlertDismissed(reason) => self.restart(reason),
        }
    }

    pub fn start(&mut self) {
        info!("[Flow] Starting");
        self.state = FlowState::AwaitingData;
        self.view.set_busy(true);
        self.supply.load_data();
    }

    pub fn on_data_ready(&mut self) {
        debug!("[Flow] Data ready");
        self.view.set_busy(false);
        self.state = FlowState::AwaitingQuestion;
        self.supply.request_next_question();
    }

    pub fn on_data_failed(&mut self, message: &str) {
        error!("[Flow] Failed to load data: {}", message);
        self.view.set_busy(false);
        self.state = FlowState::DataError;
        self.view.show_error(&AlertModel::data_error(message));
    }

    pub fn on_question_received(&mut self, question: Option<Question>) {
        let Some(question) = question else {
            debug!("[Flow] Empty question delivery dropped");
            return;
        };
        let step = self.convert(&question);
        self.current_question = Some(question);
        self.lane.post(LaneEvent::Present(step));
    }

    pub fn present(&mut self, step: &StepViewModel) {
        debug!("[Flow] Presenting question {}", step.question_number);
        self.state = FlowState::PresentingQuestion;
        self.view.set_busy(false);
        self.view.show_step(step);
    }

    pub fn on_answer(&mut self, given_answer: bool) {
        let Some(question) = self.current_question.take() else {
            debug!("[Flow] Answer without a current question dropped");
            return;
        };
        let is_correct = given_answer == question.correct_answer;
        if is_correct {
            self.correct_answers += 1;
        }
        debug!(
            "[Flow] Answer {} to question {}: {}",
            given_answer,
            self.question_index + 1,
            if is_correct { "correct" } else { "incorrect" }
        );

        self.state = FlowState::RevealingAnswer;
        self.view.highlight_correctness(is_correct);
        self.view.set_input_enabled(false);
        self.view.set_busy(true);

        self.sequence += 1;
        let token = ResumeToken {
            epoch: self.epoch,
            sequence: self.sequence,
        };
        self.pending_resume = Some(token);
        self.lane
            .post_after(self.config.reveal_delay, LaneEvent::Resume(token));
    }

    pub fn resume(&mut self, token: ResumeToken) {
        if self.pending_resume != Some(token) {
            debug!("[Flow] Stale resume {:?} ignored", token);
            return;
        }
        self.pending_resume = None;
        self.view.set_input_enabled(true);
        self.advance_or_finish();
    }

    pub fn advance_or_finish(&mut self) {
        if !self.is_last_question() {
            self.question_index += 1;
            self.state = FlowState::AwaitingQuestion;
            self.supply.request_next_question();
            return;
        }

        let game = GameResult::new(
            self.correct_answers,
            self.config.questions_amount,
            Local::now(),
        );
        info!("[Flow] Round over: {}/{}", game.correct, game.total);
        self.view.set_busy(false);
        match self.round_summary(&game) {
            Ok(result) => {
                self.state = FlowState::RoundComplete;
                self.view.show_result(&result);
            }
            Err(err) => {
                error!("[Flow] Cannot record round statistics: {}", err);
                self.state = FlowState::DataError;
                self.view
                    .show_error(&AlertModel::data_error(&err.to_string()));
            }
        }
    }

    fn round_summary(&mut self, game: &GameResult) -> Result<ResultViewModel> {
        self.statistics.store(game)?;
        let best = self.statistics.best_game()?;
        let text = format!(
            "Your result: {}/{}\n\
            Quizzes played: {}\n\
            Record: {}/{} ({})\n\
            Average accuracy: {:.2}%",
            game.correct,
            game.total,
            self.statistics.games_count()?,
            best.correct,
            best.total,
            best.date_time_string(),
            self.statistics.total_accuracy()?
        );
        Ok(ResultViewModel {
            title: "Round over!".to_string(),
            text,
            button_text: "Play again".to_string(),
        })
    }

    pub fn restart(&mut self, reason: AlertReason) {
        info!("[Flow] Restarting due to {:?}", reason);
        self.question_index = 0;
        self.correct_answers = 0;
        self.current_question = None;
        self.epoch += 1;
        self.pending_resume = None;
        self.view.set_busy(true);
        match reason {
            AlertReason::EndGame => {
                self.state = FlowState::AwaitingQuestion;
                self.supply.request_next_question();
            }
            AlertReason::ErrorWithData => {
                self.state = FlowState::AwaitingData;
                self.supply.load_data();
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::libkuizu::toukei::{Key, KeyValueStore, MemoryStore};
    use crate::Error;
    use std::cell::RefCell;
    use std::io;
    use std::rc::Rc;

    /// Lane that only records what was posted; tests pump it by hand.
    #[derive(Clone, Default)]
    pub(crate) struct RecordingLane {
        events: Rc<RefCell<Vec<(Option<Duration>, LaneEvent)>>>,
    }

    impl RecordingLane {
        pub(crate) fn take(&self) -> Vec<(Option<Duration>, LaneEvent)> {
            self.events.borrow_mut().drain(..).collect()
        }
    }

    impl Lane for RecordingLane {
        fn post(&self, event: LaneEvent) {
            self.events.borrow_mut().push((None, event));
        }

        fn post_after(&self, delay: Duration, event: LaneEvent) {
            self.events.borrow_mut().push((Some(delay), event));
        }
    }

    #[derive(Default)]
    struct CountingSupply {
        loads: u32,
        requests: u32,
    }

    impl QuestionSupply for CountingSupply {
        fn load_data(&mut self) {
            self.loads += 1;
        }

        fn request_next_question(&mut self) {
            self.requests += 1;
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    enum ViewCall {
        Step(String),
        Result(ResultViewModel),
        Error(AlertModel),
        InputEnabled(bool),
        Busy(bool),
        Highlight(bool),
    }

    #[derive(Default)]
    struct RecordingView {
        calls: Vec<ViewCall>,
    }

    impl RecordingView {
        fn results(&self) -> Vec<&ResultViewModel> {
            self.calls
                .iter()
                .filter_map(|c| match c {
                    ViewCall::Result(r) => Some(r),
                    _ => None,
                })
                .collect()
        }

        fn steps(&self) -> Vec<&str> {
            self.calls
                .iter()
                .filter_map(|c| match c {
                    ViewCall::Step(label) => Some(label.as_str()),
                    _ => None,
                })
                .collect()
        }
    }

    impl QuizView for RecordingView {
        fn show_step(&mut self, step: &StepViewModel) {
            self.calls.push(ViewCall::Step(step.question_number.clone()));
        }

        fn show_result(&mut self, result: &ResultViewModel) {
            self.calls.push(ViewCall::Result(result.clone()));
        }

        fn show_error(&mut self, alert: &AlertModel) {
            self.calls.push(ViewCall::Error(alert.clone()));
        }

        fn set_input_enabled(&mut self, enabled: bool) {
            self.calls.push(ViewCall::InputEnabled(enabled));
        }

        fn set_busy(&mut self, busy: bool) {
            self.calls.push(ViewCall::Busy(busy));
        }

        fn highlight_correctness(&mut self, is_correct: bool) {
            self.calls.push(ViewCall::Highlight(is_correct));
        }
    }

    /// Reads as empty, refuses every write.
    struct ReadOnlyStore;

    impl KeyValueStore for ReadOnlyStore {
        fn integer(&self, _key: Key) -> Result<Option<i64>> {
            Ok(None)
        }

        fn set_integer(&mut self, _key: Key, _value: i64) -> Result<()> {
            Err(Error::Io(io::Error::other("read-only")))
        }
    }

    type TestFlow = QuizFlow<CountingSupply, RecordingView, RecordingLane>;

    fn flow_with(storage: Box<dyn KeyValueStore>) -> (TestFlow, RecordingLane) {
        let lane = RecordingLane::default();
        let flow = QuizFlow::new(
            QuizConfig::default(),
            CountingSupply::default(),
            RecordingView::default(),
            lane.clone(),
            StatisticService::new(storage),
        );
        (flow, lane)
    }

    fn flow() -> (TestFlow, RecordingLane) {
        flow_with(Box::new(MemoryStore::default()))
    }

    fn question(correct_answer: bool) -> Question {
        Question {
            image: Vec::new(),
            text: "QuestionText".to_string(),
            correct_answer,
        }
    }

    /// Handles everything posted so far, including delayed events.
    fn pump(flow: &mut TestFlow, lane: &RecordingLane) {
        loop {
            let events = lane.take();
            if events.is_empty() {
                break;
            }
            for (_, event) in events {
                flow.handle(event);
            }
        }
    }

    fn play_question(flow: &mut TestFlow, lane: &RecordingLane, answer_correctly: bool) {
        flow.handle(LaneEvent::QuestionReceived(Some(question(true))));
        pump(flow, lane);
        flow.on_answer(answer_correctly);
        pump(flow, lane);
    }

    #[test]
    fn convert_first_question() {
        let (flow, _) = flow();
        let step = flow.convert(&question(true));
        assert!(step.image.is_empty());
        assert_eq!(step.question, "QuestionText");
        assert_eq!(step.question_number, "1/10");
    }

    #[test]
    fn labels_follow_question_index() {
        let (mut flow, lane) = flow();
        flow.start();
        flow.handle(LaneEvent::DataReady);
        for _ in 0..QUESTIONS_AMOUNT {
            play_question(&mut flow, &lane, true);
        }
        let expected: Vec<String> = (1..=QUESTIONS_AMOUNT).map(|i| format!("{i}/10")).collect();
        assert_eq!(flow.view().steps(), expected);
    }

    #[test]
    fn start_loads_then_requests_first_question() {
        let (mut flow, _) = flow();
        flow.start();
        assert_eq!(flow.state(), FlowState::AwaitingData);
        assert_eq!(flow.supply.loads, 1);
        assert_eq!(flow.supply.requests, 0);

        flow.handle(LaneEvent::DataReady);
        assert_eq!(flow.state(), FlowState::AwaitingQuestion);
        assert_eq!(flow.supply.requests, 1);
        assert_eq!(flow.view().calls, vec![ViewCall::Busy(true), ViewCall::Busy(false)]);
    }

    #[test]
    fn question_is_presented_through_the_lane() {
        let (mut flow, lane) = flow();
        flow.on_question_received(Some(question(true)));
        assert!(flow.view().steps().is_empty());
        assert!(flow.current_question().is_some());

        let events = lane.take();
        assert!(matches!(events.as_slice(), [(None, LaneEvent::Present(_))]));
        for (_, event) in events {
            flow.handle(event);
        }
        assert_eq!(flow.state(), FlowState::PresentingQuestion);
        assert_eq!(flow.view().steps(), vec!["1/10"]);
    }

    #[test]
    fn empty_delivery_changes_nothing() {
        let (mut flow, lane) = flow();
        flow.handle(LaneEvent::QuestionReceived(None));
        assert!(lane.take().is_empty());
        assert!(flow.current_question().is_none());
        assert_eq!((flow.question_index(), flow.correct_answers()), (0, 0));

        flow.on_question_received(Some(question(false)));
        pump(&mut flow, &lane);
        flow.on_question_received(None);
        assert_eq!(flow.current_question(), Some(&question(false)));
        assert_eq!((flow.question_index(), flow.correct_answers()), (0, 0));
    }

    #[test]
    fn answer_scores_and_schedules_resume() {
        let (mut flow, lane) = flow();
        flow.on_question_received(Some(question(true)));
        pump(&mut flow, &lane);

        flow.on_answer(true);
        assert_eq!(flow.correct_answers(), 1);
        assert_eq!(flow.state(), FlowState::RevealingAnswer);
        assert!(flow.current_question().is_none());
        assert!(flow.view().calls.ends_with(&[
            ViewCall::Highlight(true),
            ViewCall::InputEnabled(false),
            ViewCall::Busy(true),
        ]));

        let events = lane.take();
        assert!(matches!(
            events.as_slice(),
            [(Some(ANSWER_REVEAL_DELAY), LaneEvent::Resume(_))]
        ));
        for (_, event) in events {
            flow.handle(event);
        }
        assert_eq!(flow.question_index(), 1);
        assert_eq!(flow.supply.requests, 1);
        assert!(flow.view().calls.contains(&ViewCall::InputEnabled(true)));
    }

    #[test]
    fn wrong_answer_is_not_counted() {
        let (mut flow, lane) = flow();
        flow.on_question_received(Some(question(true)));
        pump(&mut flow, &lane);
        flow.on_answer(false);
        assert_eq!(flow.correct_answers(), 0);
        assert!(flow.view().calls.contains(&ViewCall::Highlight(false)));
    }

    #[test]
    fn answer_without_question_is_dropped() {
        let (mut flow, lane) = flow();
        flow.on_answer(true);
        assert!(lane.take().is_empty());
        assert!(flow.view().calls.is_empty());
        assert_eq!(flow.correct_answers(), 0);
    }

    #[test]
    fn second_answer_during_reveal_is_dropped() {
        let (mut flow, lane) = flow();
        flow.on_question_received(Some(question(true)));
        pump(&mut flow, &lane);
        flow.on_answer(true);
        flow.on_answer(true);
        assert_eq!(flow.correct_answers(), 1);
        assert_eq!(lane.take().len(), 1);
    }

    #[test]
    fn full_round_reports_result_once() {
        let (mut flow, lane) = flow();
        flow.start();
        flow.handle(LaneEvent::DataReady);
        for i in 0..QUESTIONS_AMOUNT {
            play_question(&mut flow, &lane, i < 7);
        }

        assert_eq!(flow.state(), FlowState::RoundComplete);
        let results = flow.view().results();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].title, "Round over!");
        assert_eq!(results[0].button_text, "Play again");
        assert!(results[0].text.starts_with("Your result: 7/10\nQuizzes played: 1\nRecord: 7/10 ("));
        assert!(results[0].text.ends_with("Average accuracy: 70.00%"));

        let stats = flow.statistics();
        assert_eq!(stats.games_count().unwrap(), 1);
        assert_eq!(stats.correct_answers().unwrap(), 7);
        assert_eq!(stats.total_answers().unwrap(), QUESTIONS_AMOUNT);
        // first question came from DataReady, nine more from advancing
        assert_eq!(flow.supply.requests, QUESTIONS_AMOUNT);
    }

    #[test]
    fn restart_after_round_requests_without_reloading() {
        let (mut flow, lane) = flow();
        flow.start();
        flow.handle(LaneEvent::DataReady);
        for _ in 0..QUESTIONS_AMOUNT {
            play_question(&mut flow, &lane, true);
        }
        let requests = flow.supply.requests;

        flow.handle(LaneEvent::AlertDismissed(AlertReason::EndGame));
        assert_eq!((flow.question_index(), flow.correct_answers()), (0, 0));
        assert_eq!(flow.state(), FlowState::AwaitingQuestion);
        assert_eq!(flow.supply.loads, 1);
        assert_eq!(flow.supply.requests, requests + 1);
    }

    #[test]
    fn data_failure_shows_error_and_restart_reloads() {
        let (mut flow, _) = flow();
        flow.start();
        flow.handle(LaneEvent::DataFailed("offline".to_string()));
        assert_eq!(flow.state(), FlowState::DataError);
        assert!(flow
            .view()
            .calls
            .contains(&ViewCall::Error(AlertModel::data_error("offline"))));

        flow.handle(LaneEvent::AlertDismissed(AlertReason::ErrorWithData));
        assert_eq!(flow.state(), FlowState::AwaitingData);
        assert_eq!(flow.supply.loads, 2);
        assert_eq!(flow.supply.requests, 0);
    }

    #[test]
    fn unsaved_round_shows_error_and_reloads() {
        let (mut flow, lane) = flow_with(Box::new(ReadOnlyStore));
        flow.start();
        flow.handle(LaneEvent::DataReady);
        for _ in 0..QUESTIONS_AMOUNT {
            play_question(&mut flow, &lane, true);
        }

        assert_eq!(flow.state(), FlowState::DataError);
        assert!(flow.view().results().is_empty());
        assert!(flow.view().calls.iter().any(|c| matches!(
            c,
            ViewCall::Error(AlertModel {
                reason: AlertReason::ErrorWithData,
                ..
            })
        )));

        flow.handle(LaneEvent::AlertDismissed(AlertReason::ErrorWithData));
        assert_eq!(flow.state(), FlowState::AwaitingData);
        assert_eq!(flow.supply.loads, 2);
        assert_eq!((flow.question_index(), flow.correct_answers()), (0, 0));
    }

    #[test]
    fn restart_cancels_pending_resume() {
        let (mut flow, lane) = flow();
        flow.on_question_received(Some(question(true)));
        pump(&mut flow, &lane);
        flow.on_answer(true);
        let stale = lane.take();

        flow.restart(AlertReason::EndGame);
        assert_eq!(flow.supply.requests, 1);
        for (_, event) in stale {
            flow.handle(event);
        }
        assert_eq!(flow.question_index(), 0);
        assert_eq!(flow.supply.requests, 1);
        assert!(!flow.view().calls.contains(&ViewCall::InputEnabled(true)));
    }

    #[test]
    fn shorter_rounds_follow_config() {
        let lane = RecordingLane::default();
        let config = QuizConfig {
            questions_amount: 2,
            reveal_delay: Duration::from_millis(10),
        };
        let mut flow = QuizFlow::new(
            config,
            CountingSupply::default(),
            RecordingView::default(),
            lane.clone(),
            StatisticService::new(Box::new(MemoryStore::default())),
        );
        play_question(&mut flow, &lane, true);
        assert!(flow.view().results().is_empty());
        play_question(&mut flow, &lane, false);
        assert_eq!(flow.view().steps(), vec!["1/2", "2/2"]);
        assert!(flow.view().results()[0].text.starts_with("Your result: 1/2"));
    }
}
