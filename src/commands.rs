//! Handlers for the question-answering, agent, and cache commands.

use anyhow::{bail, Result};

use crate::config::Config;
use crate::services::Services;

/// `quarry ask <question>`
pub async fn run_ask(
    config: &Config,
    question: &str,
    no_cache: bool,
    vector_only: bool,
    top_k: Option<usize>,
) -> Result<()> {
    let services = Services::from_config(config).await?;
    let use_hybrid = if vector_only { Some(false) } else { None };
    let opts = services.answer_options(top_k, use_hybrid, no_cache);

    let answer = services.answerer.ask(question, opts).await?;
    println!("{}", answer.answer);
    if answer.cached {
        println!();
        println!("(cached)");
    }
    Ok(())
}

/// `quarry agent <question>`
pub async fn run_agent(
    config: &Config,
    question: &str,
    max_iterations: Option<usize>,
) -> Result<()> {
    let services = Services::from_config(config).await?;
    let result = services.agent.run(question, max_iterations).await;

    for (i, step) in result.steps.iter().enumerate() {
        println!("Step {}: {}({})", i + 1, step.tool_name, step.tool_input);
        for line in step.observation.lines() {
            println!("    {}", line);
        }
    }
    if !result.steps.is_empty() {
        println!();
    }
    println!("{}", result.answer);
    if !result.success {
        bail!(
            "agent stopped: {}",
            result.error.as_deref().unwrap_or("unknown error")
        );
    }
    Ok(())
}

/// `quarry tools`
pub async fn run_tools(config: &Config) -> Result<()> {
    let services = Services::from_config(config).await?;
    let tools = services.tools.list_tools();
    println!("{} tools:", tools.len());
    for tool in tools {
        println!("  {:<18} {}", tool.name, tool.description);
    }
    Ok(())
}

/// `quarry cache stats`
pub async fn run_cache_stats(config: &Config) -> Result<()> {
    let services = Services::from_config(config).await?;
    let stats = services.cache.stats().await;
    println!("enabled: {}", stats.enabled);
    println!("entries: {}", stats.entries);
    if let Some(err) = stats.error {
        println!("error:   {}", err);
    }
    Ok(())
}

/// `quarry cache clear`
pub async fn run_cache_clear(config: &Config) -> Result<()> {
    let services = Services::from_config(config).await?;
    let count = services.cache.clear().await;
    println!("Removed {} cached answers.", count);
    Ok(())
}

/// `quarry cache delete <question>`. Without `--context` the key is
/// rebuilt from a fresh retrieval using the configured defaults.
pub async fn run_cache_delete(
    config: &Config,
    question: &str,
    context: Option<String>,
) -> Result<()> {
    let services = Services::from_config(config).await?;
    let context = match context {
        Some(c) => c,
        None => {
            let opts = services.answer_options(None, None, true);
            services
                .retriever
                .retrieve_context(question, opts.top_k, opts.use_hybrid)
                .await?
        }
    };

    if services.cache.delete(question, &context).await {
        println!("Deleted cached answer.");
    } else {
        println!("No cached answer for that question.");
    }
    Ok(())
}
