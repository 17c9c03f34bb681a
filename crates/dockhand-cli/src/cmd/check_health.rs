use anyhow::{bail, Context};
use serde::Deserialize;

use crate::output::print_json;

#[derive(Debug, Deserialize)]
struct Health {
    status: String,
    timestamp: String,
    uptime: u64,
    version: String,
    system: System,
    services: Services,
}

#[derive(Debug, Deserialize)]
struct System {
    platform: String,
    arch: String,
}

#[derive(Debug, Deserialize)]
struct Services {
    docker: Docker,
}

#[derive(Debug, Deserialize)]
struct Docker {
    status: String,
    containers: Option<usize>,
    error: Option<String>,
}

/// Query a running `serve` instance. Fails unless it answers 200 with JSON
/// and reports `healthy`.
pub fn run(port: u16, json: bool) -> anyhow::Result<()> {
    let url = format!("http://localhost:{port}/health");
    if !json {
        println!("Checking health at {url}...");
    }

    let body = super::block_on(fetch(&url))??;
    let health: Health =
        serde_json::from_value(body.clone()).context("parsing health check response")?;

    if json {
        print_json(&body)?;
    } else {
        println!();
        println!("Health Status: {}", health.status.to_uppercase());
        println!("Timestamp: {}", health.timestamp);
        println!("Uptime: {}", format_duration(health.uptime));
        println!("Version: {}", health.version);
        println!();
        println!("Docker: {}", health.services.docker.status);
        if let Some(n) = health.services.docker.containers {
            println!("Docker Containers: {n}");
        }
        if let Some(e) = &health.services.docker.error {
            println!("Docker Error: {e}");
        }
        println!();
        println!("System:");
        println!("Platform: {} {}", health.system.platform, health.system.arch);
    }

    if health.status != "healthy" {
        bail!("service is {}", health.status);
    }
    Ok(())
}

async fn fetch(url: &str) -> anyhow::Result<serde_json::Value> {
    let res = reqwest::get(url).await.with_context(|| {
        format!("health check request to {url} failed; is `dockhand serve` running?")
    })?;

    let status = res.status();
    if status != reqwest::StatusCode::OK {
        bail!("request failed with status {status}");
    }
    let content_type = res
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    if !content_type.starts_with("application/json") {
        bail!("invalid content-type: expected application/json, got '{content_type}'");
    }
    Ok(res.json().await?)
}

fn format_duration(secs: u64) -> String {
    match secs {
        0..=59 => format!("{secs} seconds"),
        60..=3599 => format!("{} minutes, {} seconds", secs / 60, secs % 60),
        _ => format!("{} hours, {} minutes", secs / 3600, (secs % 3600) / 60),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations_read_like_the_largest_units() {
        assert_eq!(format_duration(42), "42 seconds");
        assert_eq!(format_duration(61), "1 minutes, 1 seconds");
        assert_eq!(format_duration(7322), "2 hours, 2 minutes");
    }
}
