use anyhow::Result;
use futures::StreamExt;
use owo_colors::{AnsiColors, OwoColorize};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::Notify;

use crate::client::RelayClient;
use crate::config::{AnalyzeConfig, ConsoleConfig};
use crate::history::{History, HistoryEntry};
use crate::interpret::analyze;
use crate::speech::{CommandRecognizer, Dictation, Recognizer, append_transcript};
use crate::types::SentimentResult;

const HELP: &str = "\
Commands:
  name <value>   set the display name
  text <value>   replace the text to analyze
  mic            dictate text (appends to the current text)
  analyze        analyze the current text
  history        list past analyses
  delete <n>     remove history entry n
  clear          remove all history entries
  help           show this message
  quit           leave the console";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Name(String),
    Text(String),
    Mic,
    Analyze,
    History,
    Delete(usize),
    Clear,
    Help,
    Quit,
    Unknown(String),
}

impl ConsoleCommand {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };

        match word.to_lowercase().as_str() {
            "name" => Self::Name(rest.to_string()),
            "text" => Self::Text(rest.to_string()),
            "mic" => Self::Mic,
            "analyze" | "go" => Self::Analyze,
            "history" | "ls" => Self::History,
            "delete" | "rm" => match rest.parse() {
                Ok(n) => Self::Delete(n),
                Err(_) => Self::Unknown(line.to_string()),
            },
            "clear" => Self::Clear,
            "help" | "?" => Self::Help,
            "quit" | "exit" => Self::Quit,
            _ => Self::Unknown(line.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Submission {
    MissingInput,
    Failed,
    Cancelled,
    Analyzed(SentimentResult),
}

/// Percentage with one decimal when the score is a probability, `—` otherwise.
pub fn format_score(score: f64) -> String {
    if score.is_finite() && (0.0..=1.0).contains(&score) {
        format!("{:.1}%", score * 100.0)
    } else {
        "—".to_string()
    }
}

pub fn sentiment_color(sentiment: &str) -> AnsiColors {
    match sentiment.to_lowercase().as_str() {
        "positive" => AnsiColors::Green,
        "negative" => AnsiColors::Red,
        "neutral" => AnsiColors::Yellow,
        _ => AnsiColors::BrightBlack,
    }
}

pub fn render_result(result: &SentimentResult) -> String {
    let label = result.label.to_string().to_uppercase();
    format!(
        "Result: {} {}",
        label.color(sentiment_color(result.label.as_str())).bold(),
        format!("({} confidence)", format_score(result.score)).bright_black()
    )
}

pub fn render_entry(number: usize, entry: &HistoryEntry) -> String {
    let name = if entry.name.is_empty() {
        "Unknown"
    } else {
        entry.name.as_str()
    };
    format!(
        "{}. {}: \"{}\" {} {}",
        number,
        name.bold(),
        entry.preview(),
        format!("{} ({})", entry.sentiment.to_uppercase(), format_score(entry.score))
            .color(sentiment_color(&entry.sentiment)),
        entry.created.format("%H:%M:%S").bright_black()
    )
}

/// Mutable state of one console session: the form fields and the history.
pub struct Session {
    client: RelayClient,
    recognizer: Option<Arc<dyn Recognizer>>,
    interrupt: Arc<Notify>,
    pub name: String,
    pub draft: String,
    pub history: History,
}

impl Session {
    pub fn new(client: RelayClient, recognizer: Option<Arc<dyn Recognizer>>) -> Self {
        Self {
            client,
            recognizer,
            interrupt: Arc::new(Notify::new()),
            name: String::new(),
            draft: String::new(),
            history: History::new(),
        }
    }

    /// Handle that cancels whatever the session is currently waiting on.
    pub fn interrupter(&self) -> Arc<Notify> {
        self.interrupt.clone()
    }

    /// Analyzes the draft; on success records it and resets the form.
    pub async fn submit(&mut self) -> Submission {
        let name = self.name.trim().to_string();
        let text = self.draft.trim().to_string();
        if name.is_empty() || text.is_empty() {
            return Submission::MissingInput;
        }

        let reply = tokio::select! {
            biased;
            _ = self.interrupt.notified() => return Submission::Cancelled,
            reply = self.client.analyze(&text) => reply,
        };
        let raw = match reply {
            Ok(raw) => raw,
            Err(e) => {
                tracing::error!(error = %e, "Analysis request failed");
                return Submission::Failed;
            }
        };

        let result = analyze(&raw);
        tracing::debug!(label = %result.label, score = result.score, "Interpreted prediction");

        let entry = HistoryEntry::new(&name, &text, &result);
        tracing::debug!(id = %entry.id, "History entry added");
        self.history.add(entry);

        self.name.clear();
        self.draft.clear();
        Submission::Analyzed(result)
    }

    /// Runs one dictation activation; an interrupt stops it early.
    pub async fn dictate(&mut self) -> Option<String> {
        let recognizer = self.recognizer.clone()?;
        let dictation = Dictation::start(recognizer);
        let mut transcripts = Box::pin(dictation.transcripts());

        let transcript = tokio::select! {
            t = transcripts.next() => t,
            _ = self.interrupt.notified() => {
                dictation.stop();
                None
            }
        };

        if let Some(t) = &transcript {
            self.draft = append_transcript(&self.draft, t);
        }
        transcript
    }

    fn print_history(&self) {
        if self.history.is_empty() {
            println!("No history yet.");
            return;
        }
        for (number, entry) in self.history.list() {
            println!("{}", render_entry(number, entry));
        }
    }

    /// Applies one command; returns false when the session should end.
    pub async fn handle(&mut self, command: ConsoleCommand) -> bool {
        match command {
            ConsoleCommand::Name(name) => self.name = name,
            ConsoleCommand::Text(text) => self.draft = text,
            ConsoleCommand::Mic => {
                if self.recognizer.is_none() {
                    println!("Dictation is not configured (set --transcribe-cmd).");
                } else {
                    println!("{}", "Listening...".cyan());
                    match self.dictate().await {
                        Some(_) => println!("Text: {}", self.draft),
                        None => println!("Nothing heard."),
                    }
                }
            }
            ConsoleCommand::Analyze => {
                if !self.name.trim().is_empty() && !self.draft.trim().is_empty() {
                    println!("{}", "Sending to inference API...".cyan());
                }
                match self.submit().await {
                    Submission::MissingInput => println!("Please enter both a name and some text."),
                    Submission::Failed => println!("{}", "Analysis failed.".red()),
                    Submission::Cancelled => println!("Analysis cancelled."),
                    Submission::Analyzed(result) => {
                        println!("{}", render_result(&result));
                        self.print_history();
                    }
                }
            }
            ConsoleCommand::History => self.print_history(),
            ConsoleCommand::Delete(number) => match self.history.remove(number) {
                Some(_) => self.print_history(),
                None => println!(
                    "No history entry {number} ({} entries).",
                    self.history.len()
                ),
            },
            ConsoleCommand::Clear => {
                let removed = self.history.clear();
                println!("Cleared {removed} entries.");
            }
            ConsoleCommand::Help => println!("{HELP}"),
            ConsoleCommand::Quit => return false,
            ConsoleCommand::Unknown(line) if line.is_empty() => {}
            ConsoleCommand::Unknown(line) => println!("Unknown command: {line} (try `help`)"),
        }
        true
    }
}

pub async fn run_console(config: ConsoleConfig) -> Result<()> {
    let recognizer = config
        .transcribe_cmd
        .map(|cmd| Arc::new(CommandRecognizer::new(cmd)) as Arc<dyn Recognizer>);
    let mut session = Session::new(RelayClient::new(&config.relay.relay_url), recognizer);

    // One signal listener for the whole session; every wait point selects on it.
    let interrupt = session.interrupter();
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            interrupt.notify_one();
        }
    });

    println!("{HELP}");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    run_session(&mut session, &mut lines).await
}

/// Reads commands until `quit`, end of input, or an interrupt at the prompt.
async fn run_session<R>(session: &mut Session, lines: &mut tokio::io::Lines<R>) -> Result<()>
where
    R: tokio::io::AsyncBufRead + Unpin,
{
    let interrupt = session.interrupter();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = interrupt.notified() => {
                tracing::debug!("Interrupted at prompt");
                break;
            }
        };
        let Some(line) = line else { break };
        if !session.handle(ConsoleCommand::parse(&line)).await {
            break;
        }
    }
    Ok(())
}

pub async fn run_once(config: AnalyzeConfig) -> Result<()> {
    let mut session = Session::new(RelayClient::new(&config.relay.relay_url), None);
    session.name = config.name;
    session.draft = config.text;

    match session.submit().await {
        Submission::Analyzed(result) => {
            println!("{}", render_result(&result));
            Ok(())
        }
        Submission::MissingInput => anyhow::bail!("Please enter both a name and some text."),
        Submission::Failed => anyhow::bail!("Analysis failed."),
        Submission::Cancelled => anyhow::bail!("Analysis cancelled."),
    }
}
