//! Live runner status

use anyhow::Result;
use colored::Colorize;

use crate::client::{ApiClient, StatusResponse};
use crate::output::{color_phase, print_info, print_warning, OutputFormat};

/// Show the current phase of a live runner.
pub async fn show_status(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let result: Result<StatusResponse> = client.get("status").await;

    match result {
        Ok(status) => match format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(&status)?);
            }
            OutputFormat::Table => {
                println!("{}", "Runner Status".bold());
                println!("{}", "=".repeat(40));
                println!("Scenario: {}", status.scenario.cyan());
                println!("Phase:    {}", color_phase(status.phase.as_str()));
            }
        },
        Err(_) => {
            print_warning("Could not reach the runner status endpoint");
            print_info("Is a bench-runner currently executing an experiment?");
            print_info("The API URL can be set with --api-url or GBENCH_API_URL.");
        }
    }

    Ok(())
}
