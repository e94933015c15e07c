//! `flowsmith run` drives the pipeline for one goal.

use flowsmith_agent::{Orchestrator, PipelineResult};
use flowsmith_config::AppConfig;
use flowsmith_core::event::EventBus;
use flowsmith_core::platform::AutomationPlatform;
use flowsmith_providers::RestPlatformClient;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info};

pub async fn run(
    config: &AppConfig,
    goal: &str,
    deploy: bool,
    json: bool,
    no_graph: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let provider = flowsmith_providers::build_provider(&config.provider);
    let graph = if no_graph {
        None
    } else {
        super::build_graph(config)
    };

    let events = Arc::new(EventBus::default());
    let mut rx = events.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(envelope) => debug!(
                    event = envelope.event.event_type(),
                    source = %envelope.source,
                    "Pipeline event"
                ),
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
    });

    let orchestrator = Orchestrator::from_config(config, provider, graph, events).await?;
    let result = orchestrator.execute_pipeline(goal, None).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_summary(&result);
    }

    if !result.success {
        return Err(format!("Pipeline failed: {}", result.errors.join("; ")).into());
    }

    if deploy {
        let workflow = result
            .workflow
            .as_ref()
            .ok_or("Pipeline succeeded without a workflow")?;
        let platform = RestPlatformClient::from_config(&config.platform);
        let id = platform.create_workflow(workflow).await?;
        info!(id = %id, "Workflow deployed");
        if !json {
            println!("\n  Deployed as workflow {id} on {}", config.platform.base_url);
        }
    }

    Ok(())
}

fn print_summary(result: &PipelineResult) {
    let verdict = if result.success { "succeeded" } else { "failed" };
    println!("Pipeline {verdict} (run {})\n", result.run_id);

    if let Some(pattern) = &result.pattern {
        println!(
            "  Pattern:    {} ({:.0}% confidence)",
            pattern.pattern_name,
            pattern.confidence * 100.0
        );
    }

    if let Some(insights) = &result.graph_insights {
        let related: Vec<&str> = insights.nodes.iter().map(|n| n.id.as_str()).collect();
        println!("  Related:    {}", related.join(", "));
    }

    if let Some(workflow) = &result.workflow {
        println!("  Workflow:   {}", workflow.name);
        for node in &workflow.nodes {
            println!("    - {} [{}]", node.name, node.node_type);
        }
    }

    if let Some(validation) = &result.validation_result {
        println!(
            "  Validation: {} ({} errors, {} warnings, {} complexity)",
            if validation.valid { "valid" } else { "invalid" },
            validation.errors.len(),
            validation.warnings.len(),
            validation.statistics.complexity
        );
        for warning in &validation.warnings {
            println!("    ! {}", warning.message);
        }
    }

    for error in &result.errors {
        println!("  Error:      {error}");
    }

    let stats = &result.execution_stats;
    println!(
        "\n  Timing (ms): discovery {:.1}, graph {:.1}, generation {:.1}, validation {:.1}, total {:.1}",
        stats.pattern_discovery_time,
        stats.graph_query_time,
        stats.workflow_generation_time,
        stats.validation_time,
        stats.total_time
    );
}
