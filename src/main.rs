use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use rustab::config::{self, RunConfig};
use rustab::{logging, HyperTransport, Report};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Number of requests
    #[arg(short = 'n', default_value_t = 10)]
    requests: u64,

    /// Number of multiple requests to perform at a time
    #[arg(short = 'c', default_value_t = 1)]
    concurrency: usize,

    /// Url to send requests to
    #[arg(short = 'u')]
    url: Option<String>,

    /// Show ongoing request results
    #[arg(short = 'v')]
    verbose: bool,

    /// Custom headers name:value;name2:value2
    #[arg(short = 'H')]
    headers: Option<String>,

    /// File of cookies, one per line: name=value; path=/; domain=example.com
    #[arg(short = 'F')]
    cookie_file: Option<PathBuf>,

    /// Basic authentication credentials, username:password
    #[arg(short = 'A')]
    auth: Option<String>,

    /// Content type of the request
    #[arg(short = 'T', default_value = config::DEFAULT_CONTENT_TYPE)]
    content_type: String,

    /// Timeout for each request in seconds
    #[arg(long)]
    timeout: Option<u64>,
}

fn usage(hint: &str) -> ! {
    println!("{}\n", hint);
    let mut command = Args::command();
    // best effort, we exit right after
    drop(command.print_help());
    println!();
    process::exit(1);
}

fn build_config(args: &Args, url: &str) -> Result<RunConfig> {
    let mut config = RunConfig::new(url, args.requests, args.concurrency)?;
    config.timeout = args.timeout.map(Duration::from_secs);
    config.template.content_type = config::parse_content_type(&args.content_type)?;

    if let Some(headers) = args.headers.as_deref().filter(|line| !line.is_empty()) {
        config.template.headers = config::parse_headers(headers)?;
    }
    if let Some(path) = &args.cookie_file {
        config.template.cookies = config::parse_cookie_file(path)?;
    }
    if let Some(auth) = args.auth.as_deref().filter(|auth| !auth.is_empty()) {
        config.template.credentials = config::parse_basic_auth(auth);
    }

    Ok(config)
}

fn main() -> Result<()> {
    if std::env::args_os().len() <= 1 {
        usage("Hey there, you need to pass some options for this to work");
    }

    let args = Args::parse();
    logging::init_logging(args.verbose);

    let Some(url) = args.url.as_deref() else {
        usage("You need to pass an url to test, -u");
    };

    let config = match build_config(&args, url) {
        Ok(config) => Arc::new(config),
        Err(err) => usage(&format!("{:#}", err)),
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(num_cpus::get())
        .enable_all()
        .build()
        .context("Failed to start the async runtime")?;

    println!(
        "Benchmarking {} ({} requests, concurrency {})",
        config.url, config.total_requests, config.concurrency
    );

    let snapshot = runtime.block_on(async {
        let transport = HyperTransport::new();
        rustab::run(Arc::clone(&config), transport).await
    })?;
    println!("Tasks completed\n");

    print!("{}", Report::from_snapshot(&snapshot, &config));
    Ok(())
}
