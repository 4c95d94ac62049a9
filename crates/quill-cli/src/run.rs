//! Run command implementation.
//!
//! Evaluates a whole worksheet against the engine, printing each cell as it
//! finishes and answering engine questions from stdin.

use std::collections::HashMap;
use std::path::Path;
use std::time::Instant;

use quill_core::{CellId, EngineStatus, EvaluationOutcome, Worksheet};
use quill_engine::{SessionHandle, SessionMessage, SessionRequest, WorksheetSession};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use crate::config::QuillConfig;
use crate::outline;

/// Options of the run command.
pub struct RunOptions<'a> {
    pub worksheet: &'a Path,
    pub engine: Option<&'a str>,
    pub engine_args: &'a [String],
    pub config: Option<&'a Path>,
}

/// Why the run loop stopped.
enum Stop {
    Drained,
    Disconnected,
    Interrupted,
}

/// Execute the run command.
pub async fn execute(options: RunOptions<'_>) -> anyhow::Result<()> {
    let start = Instant::now();

    let config = QuillConfig::load(options.config)?;
    let mut engine_config = config.engine;
    if let Some(program) = options.engine {
        engine_config.program = program.to_string();
    }
    if !options.engine_args.is_empty() {
        engine_config.args = options.engine_args.to_vec();
    }

    let sheet = outline::load(options.worksheet)?;
    let inputs: HashMap<CellId, String> = sheet
        .document_order()
        .into_iter()
        .filter_map(|id| sheet.get(id))
        .filter(|cell| cell.is_input_cell())
        .map(|cell| (cell.id(), cell.input().to_string()))
        .collect();

    println!(
        "Running {} ({} input cells) with {}",
        options.worksheet.display(),
        inputs.len(),
        engine_config.program
    );

    let (session, handle) = WorksheetSession::new(sheet, engine_config, config.controller)?;
    let mut messages = handle.subscribe();
    let task = tokio::spawn(session.run());

    handle.send(SessionRequest::EvaluateAll).await?;
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();

    let stop = loop {
        tokio::select! {
            msg = messages.recv() => match msg {
                Ok(SessionMessage::CellFinished { cell_id, outcome, output }) => {
                    print_cell(cell_id, outcome, inputs.get(&cell_id), output.as_deref());
                }
                Ok(SessionMessage::Question { cell_id, prompt }) => {
                    if !answer_question(&handle, &mut stdin, cell_id, &prompt).await? {
                        break Stop::Interrupted;
                    }
                }
                Ok(SessionMessage::Drained) => break Stop::Drained,
                Ok(SessionMessage::StatusChanged { change })
                    if change.new == EngineStatus::Disconnected =>
                {
                    break Stop::Disconnected;
                }
                Ok(SessionMessage::RequestFailed { message }) => {
                    warn!("{}", message);
                }
                Ok(other) => debug!("{:?}", other),
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Missed {} session messages", skipped);
                }
                Err(RecvError::Closed) => break Stop::Disconnected,
            },
            _ = tokio::signal::ctrl_c() => {
                handle.send(SessionRequest::Interrupt).await?;
                break Stop::Interrupted;
            }
        }
    };

    handle.send(SessionRequest::Shutdown).await?;
    let sheet = task.await??;

    let summary = Summary::collect(&sheet);
    println!("\n{}", "─".repeat(50));
    println!(
        "{} succeeded, {} failed, {} interrupted, {} not evaluated in {:.2}s",
        summary.succeeded,
        summary.failed,
        summary.interrupted,
        summary.not_evaluated,
        start.elapsed().as_secs_f64()
    );

    match stop {
        Stop::Drained if summary.failed == 0 => Ok(()),
        Stop::Drained => anyhow::bail!("{} cells failed", summary.failed),
        Stop::Disconnected => anyhow::bail!("Lost connection to the engine"),
        Stop::Interrupted => anyhow::bail!("Evaluation interrupted"),
    }
}

/// Forward one line of stdin as the answer. Returns `false` when stdin is
/// exhausted and the cell was interrupted instead.
async fn answer_question(
    handle: &SessionHandle,
    stdin: &mut Lines<BufReader<Stdin>>,
    cell_id: CellId,
    prompt: &str,
) -> anyhow::Result<bool> {
    println!("{} asks: {}", cell_id, prompt);
    match stdin.next_line().await? {
        Some(answer) => {
            handle.send(SessionRequest::Answer(answer)).await?;
            Ok(true)
        }
        None => {
            warn!("No answer on stdin, interrupting {}", cell_id);
            handle.send(SessionRequest::Interrupt).await?;
            Ok(false)
        }
    }
}

fn print_cell(
    cell_id: CellId,
    outcome: EvaluationOutcome,
    input: Option<&String>,
    output: Option<&str>,
) {
    let input = input.map(String::as_str).unwrap_or_default();
    println!("[{}] {} ({})", cell_id, input.lines().next().unwrap_or_default(), outcome);
    for line in output.unwrap_or_default().lines() {
        println!("    {}", line);
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
struct Summary {
    succeeded: usize,
    failed: usize,
    interrupted: usize,
    not_evaluated: usize,
}

impl Summary {
    fn collect(sheet: &Worksheet) -> Self {
        let mut summary = Self::default();
        for id in sheet.document_order() {
            let Some(cell) = sheet.get(id).filter(|c| c.is_input_cell()) else {
                continue;
            };
            match cell.outcome() {
                EvaluationOutcome::Succeeded => summary.succeeded += 1,
                EvaluationOutcome::Failed => summary.failed += 1,
                EvaluationOutcome::Interrupted => summary.interrupted += 1,
                EvaluationOutcome::NotEvaluated | EvaluationOutcome::Evaluating => {
                    summary.not_evaluated += 1
                }
            }
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_core::CellKind;

    #[test]
    fn test_summary_counts_input_cells_only() {
        let mut sheet = Worksheet::new();
        sheet.push(CellKind::Title, "T");
        sheet.push(CellKind::Input, "a");
        sheet.push(CellKind::Text, "prose");

        let summary = Summary::collect(&sheet);
        assert_eq!(
            summary,
            Summary {
                not_evaluated: 1,
                ..Summary::default()
            }
        );
    }
}
