use colored::Colorize;
use eigakuizu::libkuizu::keikoku::{AlertModel, AlertPresenter, Dismissal};
use eigakuizu::libkuizu::shinkou::{QuizView, ResultViewModel, StepViewModel};
use log::debug;
use std::cell::Cell;
use std::io::{self, Read, Write};
use text_io::try_read;

#[derive(Debug, PartialEq)]
pub enum Choice {
    Answer(bool),
    Quit,
    Unknown,
}

impl Choice {
    pub fn from_str(input: &str) -> Choice {
        match input.trim().to_lowercase().as_str() {
            "y" | "yes" => Choice::Answer(true),
            "n" | "no" => Choice::Answer(false),
            "q" => Choice::Quit,
            _ => Choice::Unknown,
        }
    }

    /// A closed input quits.
    pub fn from_line(line: Option<&str>) -> Choice {
        line.map_or(Choice::Quit, Choice::from_str)
    }
}

/// One line from `bytes`, or `None` if the input ended before any byte.
fn line_from<I: Iterator<Item = u8>>(bytes: I) -> Option<String> {
    let seen = Cell::new(false);
    let mut input = bytes.inspect(|_| seen.set(true));
    let line: Result<String, _> = try_read!("{}\n", input);
    if !seen.get() {
        return None;
    }
    line.ok()
}

fn read_line() -> Option<String> {
    let _ = io::stdout().flush();
    let line = line_from(io::stdin().lock().bytes().map_while(Result::ok));
    if line.is_none() {
        debug!("stdin closed");
    }
    line
}

fn dismissal_from(line: Option<&str>) -> Dismissal {
    match Choice::from_line(line) {
        Choice::Quit => Dismissal::Quit,
        _ => Dismissal::Acknowledged,
    }
}

pub fn read_choice() -> Choice {
    loop {
        print!("{} ", "Answer (y/n, q to quit):".cyan());
        let choice = Choice::from_line(read_line().as_deref());
        debug!("choice: {:?}", choice);
        if choice != Choice::Unknown {
            return choice;
        }
        println!("{}", "Please answer with y or n.".bright_red());
    }
}

fn describe_poster(image: &[u8]) -> String {
    if image.is_empty() {
        return "[no poster]".to_string();
    }
    cfg_if::cfg_if! {
        if #[cfg(feature = "posterinfo")] {
            match image::load_from_memory(image) {
                Ok(poster) => format!("[poster {}x{}]", poster.width(), poster.height()),
                Err(err) => {
                    debug!("cannot decode poster: {}", err);
                    format!("[poster, {} bytes]", image.len())
                }
            }
        } else {
            format!("[poster, {} bytes]", image.len())
        }
    }
}

#[derive(Default)]
pub struct CliView {
    input_enabled: bool,
    busy: bool,
    awaiting_answer: bool,
    pending_alert: Option<AlertModel>,
}

impl CliView {
    pub fn new() -> Self {
        Self {
            input_enabled: true,
            ..Default::default()
        }
    }

    /// True once per shown question, while input is enabled.
    pub fn take_answer_prompt(&mut self) -> bool {
        let prompt = self.awaiting_answer && self.input_enabled;
        if prompt {
            self.awaiting_answer = false;
        }
        prompt
    }

    pub fn take_pending_alert(&mut self) -> Option<AlertModel> {
        self.pending_alert.take()
    }
}

impl QuizView for CliView {
    fn show_step(&mut self, step: &StepViewModel) {
        let leading = format!("{}. ", step.question_number);
        println!(
            "\n{}{} {}",
            leading.cyan(),
            describe_poster(&step.image).dimmed(),
            step.question.black().bold().on_white()
        );
        self.awaiting_answer = true;
    }

    fn show_result(&mut self, result: &ResultViewModel) {
        self.awaiting_answer = false;
        self.pending_alert = Some(AlertModel::round_over(result));
    }

    fn show_error(&mut self, alert: &AlertModel) {
        self.awaiting_answer = false;
        self.pending_alert = Some(alert.clone());
    }

    fn set_input_enabled(&mut self, enabled: bool) {
        self.input_enabled = enabled;
    }

    fn set_busy(&mut self, busy: bool) {
        if busy && !self.busy {
            println!("{}", "Loading...".dimmed());
        }
        self.busy = busy;
    }

    fn highlight_correctness(&mut self, is_correct: bool) {
        if is_correct {
            println!("{}", "Correct!".bright_green());
        } else {
            println!("{}", "Incorrect!".bright_red());
        }
    }
}

pub struct CliAlertPresenter;

impl AlertPresenter for CliAlertPresenter {
    fn present(&mut self, model: &AlertModel) -> Dismissal {
        println!(
            "\n{}",
            format!("==========> {} <==========", model.title)
                .yellow()
                .bold()
        );
        println!("{}", model.message);
        print!(
            "{} ",
            format!("[Enter] {}, q to quit:", model.button_text).cyan()
        );
        dismissal_from(read_line().as_deref())
    }
}
