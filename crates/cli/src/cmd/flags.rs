//! Print the event flag vocabulary

use anyhow::Result;
use fslog_cli::describe;
use fslog_core::EventFlags;
use owo_colors::OwoColorize;

pub fn run(json: bool) -> Result<()> {
    let vocabulary = describe::vocabulary();

    if json {
        let entries: Vec<_> = vocabulary
            .iter()
            .map(|(name, flag, text)| {
                serde_json::json!({
                    "name": name,
                    "bit": flag.bits(),
                    "stream_level": flag.intersects(EventFlags::STREAM_LEVEL),
                    "description": text,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    println!("{}", "Stream-level".bold());
    for (name, flag, text) in vocabulary.iter().filter(|(_, f, _)| f.intersects(EventFlags::STREAM_LEVEL)) {
        let marker = if flag.is_data_loss() { "!" } else { " " };
        println!("  {} {:<22} {}", marker.red(), name.yellow(), text);
    }
    println!();
    println!("{}", "Per-entry".bold());
    for (name, _, text) in vocabulary.iter().filter(|(_, f, _)| !f.intersects(EventFlags::STREAM_LEVEL)) {
        println!("    {:<22} {}", name.green(), text);
    }
    Ok(())
}
