//! `flowsmith patterns` lists the pattern library or ranks it for a goal.

use flowsmith_agent::pattern::{load_patterns_file, merge_patterns};
use flowsmith_agent::{PatternAgent, builtin_patterns, extract_keywords};
use flowsmith_config::AppConfig;
use flowsmith_core::agent::{AgentConfig, AgentRole};
use flowsmith_memory::InMemorySharedMemory;
use std::sync::Arc;

pub async fn run(config: &AppConfig, goal: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    let mut patterns = builtin_patterns();
    if let Some(path) = &config.patterns.extra_file {
        patterns = merge_patterns(patterns, load_patterns_file(path)?);
    }

    let Some(goal) = goal else {
        println!("{} patterns\n", patterns.len());
        for pattern in &patterns {
            println!("  {:<22} {} ({})", pattern.id, pattern.name, pattern.complexity);
            println!("  {:<22} {}", "", pattern.description);
        }
        return Ok(());
    };

    let agent = PatternAgent::new(
        AgentConfig::new("pattern-agent", "Pattern Agent", AgentRole::PatternDiscovery),
        patterns,
        Arc::new(InMemorySharedMemory::new()),
    );

    println!("Keywords: {}\n", extract_keywords(goal).join(", "));
    let matches = agent.keyword_matches(goal);
    if matches.is_empty() {
        println!("  No pattern matched.");
    }
    for m in &matches {
        println!(
            "  {:>4.0}%  {:<22} matched: {}",
            m.confidence * 100.0,
            m.pattern_id,
            m.matched_keywords.join(", ")
        );
    }

    Ok(())
}
