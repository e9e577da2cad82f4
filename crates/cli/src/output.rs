//! Event rendering

use crate::describe;
use anyhow::Result;
use fslog_core::{Batch, Event};
use std::io::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// One line per event with flag names
    #[default]
    Human,
    /// One JSON object per line
    Json,
}

/// Writes events and counts them against an optional limit
#[derive(Debug, Clone)]
pub struct Printer {
    format: OutputFormat,
    color: bool,
    limit: Option<usize>,
    printed: usize,
}

impl Printer {
    pub fn new(format: OutputFormat, color: bool) -> Self {
        Self {
            format,
            color,
            limit: None,
            printed: 0,
        }
    }

    /// Stop after `limit` events
    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    pub fn printed(&self) -> usize {
        self.printed
    }

    fn exhausted(&self) -> bool {
        self.limit.is_some_and(|limit| self.printed >= limit)
    }

    /// Write a batch; returns false once the limit has been reached
    pub fn write_batch(&mut self, batch: &Batch, out: &mut impl Write) -> Result<bool> {
        for event in batch {
            if self.exhausted() {
                break;
            }
            writeln!(out, "{}", self.render(event)?)?;
            self.printed += 1;
        }
        out.flush()?;
        Ok(!self.exhausted())
    }

    pub fn render(&self, event: &Event) -> Result<String> {
        match self.format {
            OutputFormat::Json => Ok(serde_json::to_string(event)?),
            OutputFormat::Human => Ok(self.render_human(event)),
        }
    }

    fn render_human(&self, event: &Event) -> String {
        let target = match (&event.path, event.ident) {
            (Some(path), _) => path.display().to_string(),
            (None, Some(ident)) => format!("fd {}", ident),
            (None, None) => "<stream>".to_string(),
        };
        let mut line = match event.id {
            Some(id) => format!("#{} {} {}", id, target, describe::flag_list(event.flags, self.color)),
            None => format!("{} {}", target, describe::flag_list(event.flags, self.color)),
        };
        if event.needs_rescan() {
            line.push_str(" (rescan advised)");
        }
        line
    }
}
