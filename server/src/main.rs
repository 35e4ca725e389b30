use clap::Parser;
use log::info;
use server::config::{ServerConfig, SessionConfig};
use server::game::Rules;
use server::network::Server;
use std::time::Duration;

/// Command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port to listen on
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// Milliseconds between simulation ticks
    #[arg(short, long, default_value = "16")]
    tick_ms: u64,

    /// Seconds a session waits for an opponent before closing (0 waits forever)
    #[arg(long, default_value = "120")]
    idle_timeout_secs: u64,

    /// Maximum number of concurrent sessions
    #[arg(long, default_value = "64")]
    max_sessions: usize,

    /// Paddle centre bound, paddles stay within [-max, max]
    #[arg(long, default_value_t = shared::MAX_PADDLE_Y, value_parser = parse_paddle_bound)]
    max_paddle_y: f32,

    /// Messages a client may fall behind before it is disconnected
    #[arg(long, default_value = "64")]
    outbound_buffer: usize,
}

fn parse_paddle_bound(value: &str) -> Result<f32, String> {
    let bound: f32 = value.parse().map_err(|e| format!("{}", e))?;
    if bound.is_finite() {
        Ok(bound)
    } else {
        Err(format!("paddle bound must be a finite number, got {}", value))
    }
}

impl Args {
    fn into_config(self) -> ServerConfig {
        let idle_timeout = (self.idle_timeout_secs > 0)
            .then(|| Duration::from_secs(self.idle_timeout_secs));

        ServerConfig {
            addr: format!("{}:{}", self.host, self.port),
            max_sessions: self.max_sessions,
            outbound_buffer: self.outbound_buffer,
            session: SessionConfig {
                tick_interval: Duration::from_millis(self.tick_ms.max(1)),
                idle_timeout,
                rules: Rules {
                    max_paddle_y: self.max_paddle_y.abs(),
                    ..Rules::default()
                },
                ..SessionConfig::default()
            },
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let config = Args::parse().into_config();
    info!(
        "Starting server on {} ({} ms ticks, up to {} sessions)",
        config.addr,
        config.session.tick_interval.as_millis(),
        config.max_sessions
    );

    let server = Server::bind(config).await?;

    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("Failed to listen for Ctrl+C: {}", e);
                std::future::pending::<()>().await;
            }
            info!("Received Ctrl+C, shutting down gracefully...");
        })
        .await;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_defaults() {
        let config = Args::try_parse_from(["server"]).unwrap().into_config();
        let defaults = ServerConfig::default();

        assert_eq!(config.addr, defaults.addr);
        assert_eq!(config.max_sessions, defaults.max_sessions);
        assert_eq!(config.outbound_buffer, defaults.outbound_buffer);
        assert_eq!(config.session.tick_interval, Duration::from_millis(16));
        assert_eq!(config.session.idle_timeout, Some(Duration::from_secs(120)));
        assert_eq!(config.session.rules, Rules::default());
    }

    #[test]
    fn test_edge_values_are_normalized() {
        let config = Args::try_parse_from([
            "server",
            "--idle-timeout-secs",
            "0",
            "--tick-ms",
            "0",
            "--max-paddle-y=-1",
            "--port",
            "9000",
        ])
        .unwrap()
        .into_config();

        assert_eq!(config.addr, "127.0.0.1:9000");
        assert_eq!(config.session.idle_timeout, None);
        assert_eq!(config.session.tick_interval, Duration::from_millis(1));
        assert_approx_eq!(config.session.rules.max_paddle_y, 1.0, 1e-6);
    }

    #[test]
    fn test_non_finite_paddle_bound_is_rejected() {
        for value in ["NaN", "inf", "-inf", "tall"] {
            let arg = format!("--max-paddle-y={}", value);
            assert!(
                Args::try_parse_from(["server", arg.as_str()]).is_err(),
                "accepted {}",
                value
            );
        }
    }
}
