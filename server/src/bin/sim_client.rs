use std::time::Duration;

use anyhow::{anyhow, bail, Context};
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Debug, Clone)]
struct SimConfig {
    http_base: String,
    email: Option<String>,
    password: Option<String>,
    signup: bool,
    timeout_ms: u64,
    occasion: Option<String>,
    purpose: Option<String>,
    keep_outfit: bool,
}

#[derive(Debug, Serialize)]
struct AuthRequest<'a> {
    action: &'a str,
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct AuthResponse {
    token: String,
}

#[derive(Debug, Deserialize)]
struct ItemSummary {
    #[serde(rename = "_id")]
    id: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    image_url: String,
}

#[derive(Debug, Deserialize)]
struct OutfitSummary {
    #[serde(rename = "_id")]
    id: String,
    name: String,
    items: Vec<Value>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = parse_args()?;

    println!("[sim-client] starting smoke run");
    println!("[sim-client] HTTP base: {}", cfg.http_base);

    let client = Client::builder()
        .timeout(Duration::from_millis(cfg.timeout_ms))
        .build()
        .context("failed to build HTTP client")?;

    check_health(&client, &cfg).await?;
    let token = authenticate(&client, &cfg).await?;

    let items = list_items(&client, &cfg, &token).await?;
    if items.len() >= 2 {
        round_trip_outfit(&client, &cfg, &token, &items[..2]).await?;
    } else {
        println!("[sim-client] fewer than two items, skipping outfit round trip");
    }

    if let (Some(occasion), Some(purpose)) = (&cfg.occasion, &cfg.purpose) {
        generate_outfit(&client, &cfg, &token, occasion, purpose).await?;
    }

    println!("[sim-client] smoke run finished successfully");
    Ok(())
}

fn url(cfg: &SimConfig, path: &str) -> String {
    format!("{}{}", cfg.http_base.trim_end_matches('/'), path)
}

async fn expect_ok(response: Response, what: &str) -> anyhow::Result<Response> {
    if response.status() != StatusCode::OK {
        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<no body>".to_string());
        bail!("{} failed with status {}: {}", what, status, body);
    }
    Ok(response)
}

async fn check_health(client: &Client, cfg: &SimConfig) -> anyhow::Result<()> {
    let health_url = url(cfg, "/health");
    println!("[sim-client] GET {}", health_url);

    let response = client
        .get(health_url)
        .send()
        .await
        .context("network error calling /health")?;
    let body: Value = expect_ok(response, "/health")
        .await?
        .json()
        .await
        .context("failed to decode /health response")?;

    println!(
        "[sim-client] health OK: storage={}",
        body["storage"].as_str().unwrap_or("?")
    );
    Ok(())
}

async fn authenticate(client: &Client, cfg: &SimConfig) -> anyhow::Result<String> {
    let email = cfg
        .email
        .as_deref()
        .ok_or_else(|| anyhow!("--email is required"))?;
    let password = cfg
        .password
        .as_deref()
        .ok_or_else(|| anyhow!("--password is required"))?;
    let action = if cfg.signup { "signup" } else { "login" };

    let auth_url = url(cfg, "/auth");
    println!("[sim-client] POST {} ({})", auth_url, action);

    let response = client
        .post(auth_url)
        .json(&AuthRequest {
            action,
            email,
            password,
        })
        .send()
        .await
        .context("network error calling /auth")?;

    let auth: AuthResponse = expect_ok(response, "/auth")
        .await?
        .json()
        .await
        .context("failed to decode /auth response")?;

    println!("[sim-client] {} OK for {}", action, email);
    Ok(auth.token)
}

async fn list_items(client: &Client, cfg: &SimConfig, token: &str) -> anyhow::Result<Vec<ItemSummary>> {
    let items_url = url(cfg, "/wardrobe");
    println!("[sim-client] GET {}", items_url);

    let response = client
        .get(items_url)
        .bearer_auth(token)
        .send()
        .await
        .context("network error calling /wardrobe")?;
    let items: Vec<ItemSummary> = expect_ok(response, "/wardrobe")
        .await?
        .json()
        .await
        .context("failed to decode /wardrobe response")?;

    println!("[sim-client] wardrobe holds {} items", items.len());
    for item in items.iter().take(3) {
        println!(
            "[sim-client] - {} ({}) id={}",
            item.title.as_deref().unwrap_or("<untitled>"),
            item.category.as_deref().unwrap_or("-"),
            item.id
        );
    }
    Ok(items)
}

async fn round_trip_outfit(
    client: &Client,
    cfg: &SimConfig,
    token: &str,
    items: &[ItemSummary],
) -> anyhow::Result<()> {
    let snapshots: Vec<Value> = items
        .iter()
        .map(|item| {
            json!({
                "_id": item.id,
                "title": item.title.clone().unwrap_or_default(),
                "category": item.category.clone().unwrap_or_default(),
                "image_url": item.image_url,
            })
        })
        .collect();

    let outfits_url = url(cfg, "/outfits");
    println!("[sim-client] POST {}", outfits_url);
    let response = client
        .post(&outfits_url)
        .bearer_auth(token)
        .json(&json!({ "name": "sim-client outfit", "items": snapshots }))
        .send()
        .await
        .context("network error calling POST /outfits")?;
    let outfit: OutfitSummary = expect_ok(response, "POST /outfits")
        .await?
        .json()
        .await
        .context("failed to decode POST /outfits response")?;

    println!(
        "[sim-client] outfit '{}' saved with {} items (id={})",
        outfit.name,
        outfit.items.len(),
        outfit.id
    );

    if cfg.keep_outfit {
        return Ok(());
    }

    let delete_url = format!("{}/{}", outfits_url, outfit.id);
    println!("[sim-client] DELETE {}", delete_url);
    let response = client
        .delete(delete_url)
        .bearer_auth(token)
        .send()
        .await
        .context("network error calling DELETE /outfits/{id}")?;
    expect_ok(response, "DELETE /outfits/{id}").await?;

    println!("[sim-client] outfit removed");
    Ok(())
}

async fn generate_outfit(
    client: &Client,
    cfg: &SimConfig,
    token: &str,
    occasion: &str,
    purpose: &str,
) -> anyhow::Result<()> {
    let generate_url = url(cfg, "/outfits/generate");
    println!("[sim-client] POST {}", generate_url);

    let response = client
        .post(generate_url)
        .bearer_auth(token)
        .json(&json!({ "occasion": occasion, "purpose": purpose }))
        .send()
        .await
        .context("network error calling /outfits/generate")?;
    let outfit: Value = expect_ok(response, "/outfits/generate")
        .await?
        .json()
        .await
        .context("failed to decode /outfits/generate response")?;

    println!(
        "[sim-client] generated outfit: top={} bottom={}",
        outfit["top"]["title"].as_str().unwrap_or("?"),
        outfit["bottom"]["title"].as_str().unwrap_or("?")
    );
    Ok(())
}

fn parse_args() -> anyhow::Result<SimConfig> {
    let mut cfg = SimConfig {
        http_base: "http://127.0.0.1:8080".to_string(),
        email: None,
        password: None,
        signup: false,
        timeout_ms: 30_000,
        occasion: None,
        purpose: None,
        keep_outfit: false,
    };

    let mut args = std::env::args().skip(1).peekable();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--http-base" => cfg.http_base = next_arg_value(&mut args, &arg)?,
            "--email" => cfg.email = Some(next_arg_value(&mut args, &arg)?),
            "--password" => cfg.password = Some(next_arg_value(&mut args, &arg)?),
            "--signup" => cfg.signup = true,
            "--occasion" => cfg.occasion = Some(next_arg_value(&mut args, &arg)?),
            "--purpose" => cfg.purpose = Some(next_arg_value(&mut args, &arg)?),
            "--keep-outfit" => cfg.keep_outfit = true,
            "--timeout-ms" => {
                let value = next_arg_value(&mut args, &arg)?;
                cfg.timeout_ms = value
                    .parse::<u64>()
                    .with_context(|| format!("invalid --timeout-ms: {}", value))?;
            }
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            other => {
                bail!("unknown argument: {}\nUse --help to list the options.", other);
            }
        }
    }

    if cfg.email.is_none() || cfg.password.is_none() {
        bail!("--email and --password are required");
    }

    if cfg.occasion.is_some() != cfg.purpose.is_some() {
        bail!("--occasion and --purpose must be given together");
    }

    Ok(cfg)
}

fn next_arg_value<I>(args: &mut std::iter::Peekable<I>, flag: &str) -> anyhow::Result<String>
where
    I: Iterator<Item = String>,
{
    args.next()
        .ok_or_else(|| anyhow!("missing value for {}", flag))
}

fn print_help() {
    println!(
        "sim-client - smoke test for a running wardrobe server\n\n\
Usage:\n\
  cargo run --manifest-path server/Cargo.toml --bin sim-client -- [options]\n\n\
Options:\n\
  --http-base <url>        Server base URL (default: http://127.0.0.1:8080)\n\
  --email <email>          Account email\n\
  --password <pass>        Account password\n\
  --signup                 Create the account instead of logging in\n\
  --occasion <name>        Also call /outfits/generate (needs --purpose)\n\
  --purpose <name>         Purpose for /outfits/generate\n\
  --keep-outfit            Do not delete the outfit created by the run\n\
  --timeout-ms <ms>        HTTP timeout (default: 30000)\n\
  --help                   Show this help\n"
    );
}
