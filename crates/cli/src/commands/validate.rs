//! `flowsmith validate` checks a workflow JSON file.

use flowsmith_agent::{NodeRegistry, SemanticReviewer, ValidationResult, ValidatorAgent};
use flowsmith_config::AppConfig;
use flowsmith_core::agent::{AgentConfig, AgentRole};
use flowsmith_memory::InMemorySharedMemory;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub async fn run(
    config: &AppConfig,
    file: &Path,
    json: bool,
    no_review: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let content = std::fs::read_to_string(file)
        .map_err(|e| format!("Failed to read {}: {e}", file.display()))?;
    let workflow: serde_json::Value = serde_json::from_str(&content)
        .map_err(|e| format!("{} is not valid JSON: {e}", file.display()))?;

    let mut validator = ValidatorAgent::new(
        AgentConfig::new("validator-agent", "Validator Agent", AgentRole::Validation)
            .with_timeout_ms(config.agents.validator_timeout_ms),
        Arc::new(NodeRegistry::builtin()),
        Arc::new(InMemorySharedMemory::new()),
    );
    if !no_review {
        let provider = flowsmith_providers::build_provider(&config.provider);
        validator = validator.with_reviewer(
            SemanticReviewer::new(
                provider,
                config.provider.model.clone(),
                Duration::from_millis(config.agents.semantic_review_timeout_ms),
            )
            .with_temperature(config.provider.temperature),
        );
    }

    let result = validator
        .validate(&workflow, &CancellationToken::new())
        .await;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_result(file, &result);
    }

    if result.valid {
        Ok(())
    } else {
        Err(format!("{} failed validation", file.display()).into())
    }
}

fn print_result(file: &Path, result: &ValidationResult) {
    let verdict = if result.valid { "valid" } else { "INVALID" };
    println!("{}: {verdict}\n", file.display());
    println!(
        "  Nodes: {}  Connections: {}  Triggers: {}  Actions: {}  Orphans: {}  Complexity: {}",
        result.node_count,
        result.connection_count,
        result.statistics.trigger_count,
        result.statistics.action_count,
        result.statistics.orphaned_nodes,
        result.statistics.complexity
    );

    if !result.errors.is_empty() {
        println!("\n  Errors:");
        for error in &result.errors {
            println!("    [{}] {}", error.severity, error.message);
        }
    }

    if !result.warnings.is_empty() {
        println!("\n  Warnings:");
        for warning in &result.warnings {
            println!("    {}", warning.message);
            if let Some(suggestion) = &warning.suggestion {
                println!("      -> {suggestion}");
            }
        }
    }
}
