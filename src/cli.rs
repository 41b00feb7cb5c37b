//! Interactive command-line front end.
//!
//! A numbered-menu loop over the session core: ask a question, toggle
//! display settings, rerun the bulk-loader commands, exit. Each turn runs
//! to completion before the next prompt; all state lives in the
//! [`Session`].

use crate::llm::client::ChatBackend;
use crate::llm::generation::GenerationPlan;
use crate::render::format_rows_table;
use crate::session::{Session, SummaryOutcome, TurnHooks, TurnOutcome};
use std::io::Write;
use tracing::warn;

/// Read one trimmed line from stdin, displaying `text` as the prompt.
/// Returns `None` on EOF or a read error.
fn prompt(text: &str) -> Option<String> {
    print!("{}", text);
    std::io::stdout().flush().ok();

    let mut line = String::new();
    match std::io::stdin().read_line(&mut line) {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(line.trim().to_string()),
    }
}

/// Hooks wiring the session's mid-turn touch points to the terminal.
struct CliHooks {
    show_sql: bool,
}

impl TurnHooks for CliHooks {
    fn on_plan(&mut self, plan: &GenerationPlan) {
        if self.show_sql {
            println!("\nSQL to run:");
            println!("{}", plan.sql);
        }
    }

    fn confirm_modification(&mut self, sql: &str) -> bool {
        println!("\nThis is a data modification operation:");
        println!("{}", sql);
        // EOF cancels: anything but an explicit "yes" declines
        prompt("Do you want to execute this modification? (yes/no): ")
            .is_some_and(|answer| answer.eq_ignore_ascii_case("yes"))
    }
}

/// Run the interactive loop until the user selects Exit.
pub async fn run<B: ChatBackend + Sync>(session: &mut Session<B>, reset_commands: &[String]) {
    loop {
        println!("1. Ask a question");
        println!("2. Configure settings");
        println!("3. Reset databases to original state");
        println!("4. Exit");

        let Some(choice) = prompt("Choose an option: ") else {
            break;
        };

        match choice.as_str() {
            "1" => ask_question(session).await,
            "2" => configure_settings(session),
            "3" => reset_databases(session, reset_commands).await,
            "4" => break,
            _ => println!("Invalid choice."),
        }
    }
}

async fn ask_question<B: ChatBackend + Sync>(session: &mut Session<B>) {
    let Some(question) = prompt("Ask your question: ") else {
        return;
    };
    if question.is_empty() {
        return;
    }

    let mut hooks = CliHooks {
        show_sql: session.settings.show_sql,
    };
    let outcome = session.run_turn(&question, &mut hooks).await;
    let settings = session.settings;

    match outcome {
        TurnOutcome::NotUnderstood { reason } => {
            println!("Failed to understand the query! ({})", reason);
        }
        TurnOutcome::Canceled { .. } => {
            println!("Modification canceled!");
        }
        TurnOutcome::Failed {
            message,
            schema_refreshed,
            ..
        } => {
            println!("A SQL error occurred: {}", message);
            if schema_refreshed {
                println!("Schema cache refreshed after structural change.");
            }
        }
        TurnOutcome::Answered {
            rows,
            summary,
            schema_refreshed,
            ..
        } => {
            if schema_refreshed {
                println!("Schema cache refreshed after structural change.");
            }
            if rows.is_empty() {
                println!("The query executed successfully, but returned no rows.");
            } else if settings.show_raw && !settings.summary_only {
                println!("\nRaw Query Results:");
                println!("{}", format_rows_table(&rows));
            }

            match summary {
                SummaryOutcome::Ready(text) => {
                    println!("\nSummary:");
                    println!("{}\n", text);
                }
                SummaryOutcome::Unavailable(reason) => {
                    // Degrade to raw rows so the user still sees the data
                    println!("\n{}", reason);
                    if !rows.is_empty() && !(settings.show_raw && !settings.summary_only) {
                        println!("\nRaw Query Results:");
                        println!("{}", format_rows_table(&rows));
                    }
                }
            }
        }
    }
}

fn configure_settings<B: ChatBackend>(session: &mut Session<B>) {
    loop {
        let settings = &session.settings;
        println!("\nChatDB Settings");
        println!("1. Toggle show_sql      (currently: {})", settings.show_sql);
        println!("2. Toggle show_raw      (currently: {})", settings.show_raw);
        println!(
            "3. Toggle summary_only  (currently: {})",
            settings.summary_only
        );
        println!("4. Back to main\n");

        let Some(choice) = prompt("Select an option: ") else {
            return;
        };

        match choice.as_str() {
            "1" => session.settings.show_sql = !session.settings.show_sql,
            "2" => session.settings.show_raw = !session.settings.show_raw,
            "3" => session.settings.summary_only = !session.settings.summary_only,
            "4" => return,
            _ => println!("Invalid choice."),
        }
    }
}

/// Rerun the configured bulk-loader commands, one by one.
async fn reset_databases<B: ChatBackend>(_session: &mut Session<B>, reset_commands: &[String]) {
    if reset_commands.is_empty() {
        println!("No reset commands configured (see --reset-command).");
        return;
    }

    println!("\nResetting all datasets to original state...\n");
    for command in reset_commands {
        match tokio::process::Command::new("sh")
            .arg("-c")
            .arg(command)
            .status()
            .await
        {
            Ok(status) if status.success() => {
                println!("{} ran successfully.", command);
            }
            Ok(status) => {
                warn!(command = %command, status = %status, "Reset command failed");
                println!("Failed to run {}: exited with {}", command, status);
            }
            Err(e) => {
                warn!(command = %command, error = %e, "Reset command failed to start");
                println!("Failed to run {}: {}", command, e);
            }
        }
    }
}
