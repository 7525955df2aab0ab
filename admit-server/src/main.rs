use std::process;
use std::sync::Arc;

use admit::transport::{ServerConfig, serve};
use admit::{ConcurrencyLimiter, LimiterConfig, PolicyKind};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const USAGE: &str = "\
Usage: admit-server [options]

Options:
  --host <host>              Bind address [default: 0.0.0.0]
  --port <port>              Bind port [default: 5000]
  --policy <queue|stack>     Waiting discipline [env: ADMIT_POLICY, default: queue]
  --max-concurrent <n>       Requests served at once [env: ADMIT_MAX_CONCURRENT_REQUESTS, default: 1]
  --queue-limit <n>          Requests allowed to wait [env: ADMIT_REQUEST_QUEUE_LIMIT, default: 5000]
  --rejection-status <code>  Status for rejected requests [env: ADMIT_REJECTION_STATUS, default: 503]";

#[derive(Debug, Default, PartialEq, Eq)]
struct Args {
    host: Option<String>,
    port: Option<u16>,
    policy: Option<PolicyKind>,
    max_concurrent: Option<usize>,
    queue_limit: Option<usize>,
    rejection_status: Option<u16>,
}

fn main() {
    let args: Vec<String> = std::env::args().collect();

    let args = match parse_args(&args) {
        Ok(v) => v,
        Err(msg) => {
            if !msg.is_empty() {
                eprintln!("error: {msg}");
                eprintln!();
            }
            eprintln!("{USAGE}");
            process::exit(2);
        }
    };

    init_tracing();

    let result = tokio::runtime::Runtime::new()
        .map_err(anyhow::Error::from)
        .and_then(|runtime| runtime.block_on(run(args)));

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        process::exit(1);
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let mut config = LimiterConfig::from_env()?;
    apply_overrides(&mut config, &args);

    let limiter = Arc::new(ConcurrencyLimiter::new(&config)?);

    let mut server = ServerConfig::default();
    if let Some(host) = args.host {
        server.host = host;
    }
    if let Some(port) = args.port {
        server.port = port;
    }

    info!("admit-server {}", env!("CARGO_PKG_VERSION"));
    serve(server, limiter).await
}

fn apply_overrides(config: &mut LimiterConfig, args: &Args) {
    if let Some(kind) = args.policy {
        config.kind = kind;
    }
    if let Some(n) = args.max_concurrent {
        config.policy.max_concurrent_requests = n;
    }
    if let Some(n) = args.queue_limit {
        config.policy.request_queue_limit = n;
    }
    if let Some(status) = args.rejection_status {
        config.rejection_status = status;
    }
}

/// Initialize tracing with ADMIT_LOG and LOG_FORMAT support.
fn init_tracing() {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = match std::env::var("ADMIT_LOG").as_deref() {
            Ok("trace") => "trace",
            Ok("debug") => "debug",
            Ok("warn") | Ok("warning") => "warn",
            Ok("error") => "error",
            _ => "info",
        };
        EnvFilter::new(format!("admit={level},admit_server={level}"))
    };

    let use_json = std::env::var("LOG_FORMAT").as_deref() == Ok("json");

    if use_json {
        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr));
        let _ = subscriber.try_init();
    } else {
        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr));
        let _ = subscriber.try_init();
    }
}

fn parse_args(args: &[String]) -> Result<Args, String> {
    let mut parsed = Args::default();

    let mut i = 1; // skip argv[0]
    while i < args.len() {
        let flag = args[i].as_str();
        match flag {
            "--help" | "-h" => return Err(String::new()),
            "--host" | "--port" | "--policy" | "--max-concurrent" | "--queue-limit"
            | "--rejection-status" => {
                i += 1;
                let value = args
                    .get(i)
                    .ok_or_else(|| format!("{flag} requires a value"))?;
                match flag {
                    "--host" => parsed.host = Some(value.clone()),
                    "--port" => parsed.port = Some(parse_value(flag, value)?),
                    "--policy" => parsed.policy = Some(value.parse()?),
                    "--max-concurrent" => parsed.max_concurrent = Some(parse_value(flag, value)?),
                    "--queue-limit" => parsed.queue_limit = Some(parse_value(flag, value)?),
                    _ => parsed.rejection_status = Some(parse_value(flag, value)?),
                }
            }
            arg => return Err(format!("unexpected argument: {arg}")),
        }
        i += 1;
    }

    Ok(parsed)
}

fn parse_value<T>(flag: &str, value: &str) -> Result<T, String>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e| format!("invalid value '{value}' for {flag}: {e}"))
}
