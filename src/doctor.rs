//! Diagnostics (`coursebot doctor`) and API key bootstrap (`coursebot setup-key`).
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};

use crate::config::{API_KEY_PLACEHOLDER, Config};
use crate::rag::RagSystem;

/// Question used by the live query check.
pub const PROBE_QUERY: &str = "What is computer use?";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckResult {
    pub name: &'static str,
    pub passed: bool,
}

pub fn check_api_key(config: &Config, out: &mut impl Write) -> Result<bool> {
    writeln!(out, "=== API Key ===")?;
    if !config.api_key_configured() {
        writeln!(out, "FAIL: API key not configured properly")?;
        writeln!(out, "Set ANTHROPIC_API_KEY in .env (run `coursebot setup-key`)")?;
        return Ok(false);
    }
    let prefix: String = config.anthropic_api_key.chars().take(8).collect();
    writeln!(out, "OK: API key is configured")?;
    writeln!(out, "Key starts with: {prefix}...")?;
    Ok(true)
}

pub async fn check_vector_store(rag: &RagSystem, out: &mut impl Write) -> Result<bool> {
    writeln!(out, "\n=== Vector Store ===")?;
    match rag.get_course_analytics().await {
        Ok(analytics) => {
            writeln!(out, "Total courses: {}", analytics.total_courses)?;
            for title in &analytics.course_titles {
                writeln!(out, "  - {title}")?;
            }
            if analytics.total_courses == 0 {
                writeln!(out, "FAIL: No courses loaded in vector store")?;
                Ok(false)
            } else {
                writeln!(out, "OK: Vector store has course data")?;
                Ok(true)
            }
        }
        Err(e) => {
            writeln!(out, "FAIL: Vector store error: {e}")?;
            Ok(false)
        }
    }
}

/// Run [`PROBE_QUERY`] end to end. Fails when the answer reports a query failure.
pub async fn check_query(rag: &RagSystem, out: &mut impl Write) -> Result<bool> {
    writeln!(out, "\n=== Live Query ===")?;
    let (answer, sources) = rag.query(PROBE_QUERY, None).await;
    writeln!(out, "Response: {answer}")?;
    for source in &sources {
        match &source.link {
            Some(link) => writeln!(out, "Source: {} ({link})", source.text)?,
            None => writeln!(out, "Source: {}", source.text)?,
        }
    }

    if answer.to_lowercase().contains("query failed") {
        writeln!(out, "FAIL: Found 'query failed' error")?;
        Ok(false)
    } else {
        writeln!(out, "OK: Query executed successfully")?;
        Ok(true)
    }
}

/// Run every check and print a summary. The live query only runs when
/// `live_query` is set, since it spends API credits.
pub async fn run(
    config: &Config,
    rag: &RagSystem,
    live_query: bool,
    out: &mut impl Write,
) -> Result<Vec<CheckResult>> {
    writeln!(out, "coursebot diagnostics")?;
    writeln!(out, "{}", "=".repeat(40))?;

    let mut results = vec![
        CheckResult {
            name: "API Key",
            passed: check_api_key(config, out)?,
        },
        CheckResult {
            name: "Vector Store",
            passed: check_vector_store(rag, out).await?,
        },
    ];
    if live_query {
        results.push(CheckResult {
            name: "Live Query",
            passed: check_query(rag, out).await?,
        });
    }

    writeln!(out, "\n=== Summary ===")?;
    for result in &results {
        let status = if result.passed { "PASS" } else { "FAIL" };
        writeln!(out, "{}: {status}", result.name)?;
    }

    let failed: Vec<&str> = results
        .iter()
        .filter(|r| !r.passed)
        .map(|r| r.name)
        .collect();
    if failed.is_empty() {
        writeln!(out, "\nAll checks passed")?;
    } else {
        writeln!(out, "\nFailed checks: {}", failed.join(", "))?;
    }

    Ok(results)
}

/// Create `env_path` with a placeholder key when it does not exist, then
/// print setup instructions. Returns whether the file was created.
pub fn setup_key(env_path: &Path, out: &mut impl Write) -> Result<bool> {
    writeln!(out, "API key setup")?;
    writeln!(out, "{}", "=".repeat(40))?;

    let created = if env_path.exists() {
        false
    } else {
        std::fs::write(
            env_path,
            format!(
                "# Add your Anthropic API key below\nANTHROPIC_API_KEY={API_KEY_PLACEHOLDER}\n"
            ),
        )
        .with_context(|| format!("failed to write {}", env_path.display()))?;
        writeln!(out, "Created {}", env_path.display())?;
        true
    };

    writeln!(out, "\nTo configure the assistant:")?;
    writeln!(
        out,
        "1. Get an Anthropic API key from: https://console.anthropic.com/"
    )?;
    writeln!(
        out,
        "2. Edit {} and replace '{API_KEY_PLACEHOLDER}' with your key",
        env_path.display()
    )?;
    writeln!(out, "3. Restart coursebot")?;
    writeln!(out, "\nExample: ANTHROPIC_API_KEY=sk-ant-api03-...")?;

    Ok(created)
}
