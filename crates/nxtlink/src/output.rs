use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct MessageRecord {
    sequence: usize,
    size: usize,
    hex: String,
    text: Option<String>,
    timestamp: String,
}

/// Print one received payload. `sequence` counts from 1 within a run.
pub fn print_message(payload: &[u8], sequence: usize, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let record = MessageRecord {
                sequence,
                size: payload.len(),
                hex: hex_string(payload),
                text: printable_text(payload),
                timestamp: now_unix_seconds(),
            };
            println!(
                "{}",
                serde_json::to_string(&record).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["#", "SIZE", "HEX", "TEXT"])
                .add_row(vec![
                    sequence.to_string(),
                    payload.len().to_string(),
                    hex_string(payload),
                    printable_text(payload).unwrap_or_default(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "message {} ({} bytes): {}",
                sequence,
                payload.len(),
                printable_text(payload).unwrap_or_else(|| hex_string(payload))
            );
        }
        OutputFormat::Raw => {
            print_raw(payload);
        }
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

pub fn hex_string(data: &[u8]) -> String {
    data.iter()
        .map(|byte| format!("{byte:02x}"))
        .collect::<Vec<_>>()
        .join(" ")
}

fn printable_text(payload: &[u8]) -> Option<String> {
    match std::str::from_utf8(payload) {
        Ok(text) if !text.chars().any(char::is_control) => Some(text.to_string()),
        _ => None,
    }
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
