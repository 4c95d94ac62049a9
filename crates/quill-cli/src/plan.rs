//! Plan command implementation.
//!
//! Shows the order in which cells would be sent to the engine, without
//! starting one.

use std::path::Path;

use quill_core::{
    CellId, ControllerConfig, EngineTransport, Error, EvaluationController, Worksheet,
};

use crate::outline;

/// Transport that is never connected, so queued cells stay queued.
struct DryRun;

impl EngineTransport for DryRun {
    fn send_command(&mut self, _command: &str) -> quill_core::Result<()> {
        Err(Error::NotConnected)
    }

    fn interrupt(&mut self) -> quill_core::Result<()> {
        Err(Error::NotConnected)
    }

    fn is_connected(&self) -> bool {
        false
    }
}

/// Execute the plan command.
///
/// `above` is the 1-based position of a top-level cell; only cells before it
/// are planned.
pub fn execute(worksheet_path: &Path, above: Option<usize>) -> anyhow::Result<()> {
    let mut sheet = outline::load(worksheet_path)?;
    let order = plan(&mut sheet, above)?;

    match above {
        Some(position) => println!(
            "Evaluation order above cell {} ({} cells):",
            position,
            order.len()
        ),
        None => println!("Evaluation order ({} cells):", order.len()),
    }

    for (n, id) in order.iter().enumerate() {
        let input = sheet.get(*id).map(|c| c.input()).unwrap_or_default();
        println!("{:>4}. {:<10} {}", n + 1, id.to_string(), first_line(input));
    }
    Ok(())
}

/// Queue the worksheet the way evaluate-all (or evaluate-above) would.
fn plan(sheet: &mut Worksheet, above: Option<usize>) -> anyhow::Result<Vec<CellId>> {
    let mut controller = EvaluationController::new(DryRun, ControllerConfig::default());
    controller.start();

    match above {
        Some(position) => {
            let anchor = position
                .checked_sub(1)
                .and_then(|i| sheet.top_level().get(i).copied())
                .ok_or_else(|| {
                    anyhow::anyhow!(
                        "no top-level cell at position {} (worksheet has {})",
                        position,
                        sheet.top_level().len()
                    )
                })?;
            controller.evaluate_above(sheet, anchor)?;
        }
        None => {
            controller.evaluate_all(sheet);
        }
    }

    Ok(controller.queue().iter().collect())
}

fn first_line(input: &str) -> &str {
    input.lines().next().unwrap_or_default()
}
