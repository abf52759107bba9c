// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! httpjar CLI - Browser-like HTTP client
//!
//! Example usage and demonstration of the httpjar library.

use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context};
use httpjar::{HttpClient, ProxyConfig, RequestOptions, Response};

/// Flags shared by every request command
#[derive(Debug, Default)]
struct Flags {
    proxy: Option<String>,
    no_deflate: bool,
    cookies: Option<PathBuf>,
}

impl Flags {
    /// Split `args` into positional arguments and flags
    fn parse(args: &[String]) -> anyhow::Result<(Vec<String>, Flags)> {
        let mut flags = Flags::default();
        let mut positional = Vec::new();
        let mut iter = args.iter();

        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--proxy" => {
                    flags.proxy = Some(iter.next().context("--proxy needs an address")?.clone())
                }
                "--no-deflate" => flags.no_deflate = true,
                "--cookies" => {
                    flags.cookies = Some(iter.next().context("--cookies needs a file path")?.into())
                }
                flag if flag.starts_with("--") => bail!("Unknown option: {}", flag),
                _ => positional.push(arg.clone()),
            }
        }

        Ok((positional, flags))
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging
    let filter = tracing_subscriber::EnvFilter::from_default_env();
    let filter = match "httpjar=info".parse() {
        Ok(directive) => filter.add_directive(directive),
        Err(_) => filter,
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        print_usage();
        return ExitCode::from(1);
    }

    let result = match args[1].as_str() {
        "get" | "post" | "json" => run(&args[1], &args[2..]).await,
        "--help" | "-h" | "help" => {
            print_usage();
            return ExitCode::SUCCESS;
        }
        "--version" | "-v" | "version" => {
            println!("httpjar {}", httpjar::VERSION);
            return ExitCode::SUCCESS;
        }
        cmd => {
            eprintln!("Unknown command: {}", cmd);
            print_usage();
            return ExitCode::from(1);
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(1)
        }
    }
}

fn print_usage() {
    println!(
        r#"httpjar - Browser-like HTTP client with a persistent cookie jar

USAGE:
    httpjar <COMMAND> [OPTIONS]

COMMANDS:
    get <url>           Fetch a URL
    post <url> <body>   POST a form-encoded body
    json <url> <json>   POST a JSON document
    help                Show this help message
    version             Show version information

OPTIONS:
    --proxy <addr>      Route the request through a proxy (host:port, user:pass@host:port)
    --no-deflate        Do not send Accept-Encoding
    --cookies <file>    Load the cookie jar from <file> and save it back afterwards

ENVIRONMENT:
    RUST_LOG            Log filter, e.g. RUST_LOG=httpjar=debug

EXAMPLES:
    httpjar get https://example.com
    httpjar post https://example.com/login "user=a&pass=b" --cookies jar.json
    httpjar json https://example.com/api '{{"id": 1}}' --proxy 10.0.0.1:3128
"#
    );
}

/// Parse a proxy argument, splitting off `user:pass@` credentials
fn parse_proxy(arg: &str) -> ProxyConfig {
    let (scheme, rest) = match arg.split_once("://") {
        Some((scheme, rest)) => (Some(scheme), rest),
        None => (None, arg),
    };
    let (credentials, host) = match rest.rsplit_once('@') {
        Some((credentials, host)) => (Some(credentials), host),
        None => (None, rest),
    };
    let address = match scheme {
        Some(scheme) => format!("{}://{}", scheme, host),
        None => host.to_string(),
    };

    let proxy = ProxyConfig::new(address);
    match credentials {
        Some(credentials) => proxy.credentials(credentials),
        None => proxy,
    }
}

async fn run(command: &str, args: &[String]) -> anyhow::Result<()> {
    let (positional, flags) = Flags::parse(args)?;
    let Some(url) = positional.first() else {
        bail!("Usage: httpjar {} <url>", command);
    };

    let client = HttpClient::new();
    if let Some(proxy) = &flags.proxy {
        client.set_proxy(Some(parse_proxy(proxy)));
    }
    if let Some(path) = &flags.cookies {
        if path.exists() {
            client
                .cookie_jar()
                .load(path)
                .with_context(|| format!("loading cookies from {}", path.display()))?;
        }
    }

    let options = RequestOptions::new().no_deflate(flags.no_deflate);

    println!("{} {}", command.to_uppercase(), url);
    let response = match command {
        "get" => client.get(url, options).await?,
        "post" => {
            let body = positional.get(1).cloned().unwrap_or_default();
            client.post(url, body, options).await?
        }
        _ => {
            let Some(raw) = positional.get(1) else {
                bail!("Usage: httpjar json <url> <json>");
            };
            let document: serde_json::Value =
                serde_json::from_str(raw).context("body is not valid JSON")?;
            client.json(url, &document, options).await?
        }
    };

    print_response(&response);

    if let Some(path) = &flags.cookies {
        client
            .cookie_jar()
            .save(path)
            .with_context(|| format!("saving cookies to {}", path.display()))?;
    }

    Ok(())
}

fn print_response(response: &Response) {
    println!("\n=== Response ===");
    println!("Status: {}", response.status);
    println!("URL: {}", response.url);
    println!("Content-Type: {:?}", response.content_type);
    println!("Proxy: {}", response.proxy.as_deref().unwrap_or("(none)"));
    println!("Size: {} bytes", response.body_len());

    if !response.headers.is_empty() {
        println!("\n=== Headers ({}) ===", response.headers.len());
        for line in &response.headers {
            println!("  {}", line);
        }
    }

    println!("\n=== Body ===");
    println!("{}", response.text_lossy());
}
