//! Interactive prompt: paste product URLs, get records.

use crate::output;
use crate::scrape_cmd::SaveTarget;
use anyhow::Result;
use prodscrape::ScrapeConfig;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

const HELP: &str = "Paste a product page URL to scrape it. Commands: help, exit.";

/// What a line of input asks for.
#[derive(Debug, PartialEq, Eq)]
pub enum PromptAction<'a> {
    Skip,
    Help,
    Exit,
    Scrape(&'a str),
}

pub fn parse_line(line: &str) -> PromptAction<'_> {
    match line.trim() {
        "" => PromptAction::Skip,
        "help" | "/help" | "?" => PromptAction::Help,
        "exit" | "quit" | "/exit" | "/quit" => PromptAction::Exit,
        url => PromptAction::Scrape(url),
    }
}

pub async fn run(config: &ScrapeConfig, target: &SaveTarget) -> Result<()> {
    let mut editor = DefaultEditor::new()?;
    println!("prodscrape interactive mode. {HELP}");

    loop {
        let line = match editor.readline("url> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        };

        match parse_line(&line) {
            PromptAction::Skip => {}
            PromptAction::Help => println!("{HELP}"),
            PromptAction::Exit => break,
            PromptAction::Scrape(url) => {
                let _ = editor.add_history_entry(url);
                scrape_and_report(config, url, target).await;
            }
        }
    }
    Ok(())
}

async fn scrape_and_report(config: &ScrapeConfig, url: &str, target: &SaveTarget) {
    let spinner = output::spinner(format!("Scraping {url}"));
    let result = prodscrape::scrape_once(config, url).await;
    spinner.finish_and_clear();

    match result {
        Ok(record) => {
            println!("{}", output::summary(&record));
            match target.save(&record) {
                Ok(Some(path)) => println!("Saved to {}", path.display()),
                Ok(None) => {}
                Err(e) => println!("[!!] {e:#}"),
            }
        }
        Err(e) => println!("[!!] {} failed: {e}", e.stage()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_line() {
        assert_eq!(parse_line("   "), PromptAction::Skip);
        assert_eq!(parse_line("help"), PromptAction::Help);
        assert_eq!(parse_line(" exit "), PromptAction::Exit);
        assert_eq!(
            parse_line(" https://www.amazon.in/dp/B0TEST\n"),
            PromptAction::Scrape("https://www.amazon.in/dp/B0TEST")
        );
    }
}
