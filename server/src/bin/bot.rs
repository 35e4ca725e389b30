//! Headless client that joins a session and plays by tracking the ball.

use clap::Parser;
use futures_util::{SinkExt, StreamExt};
use log::{debug, info, warn};
use shared::{ClientMessage, Direction, ServerMessage, PADDLE_STEP};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// WebSocket URL of the session server
    #[arg(short = 's', long, default_value = "ws://127.0.0.1:8080")]
    server: String,

    /// Probability of skipping a decision on any given state update
    #[arg(short = 'm', long, default_value = "0.0")]
    miss_chance: f64,
}

/// Picks the move that brings the paddle closer to the ball.
fn steer(paddle_y: f32, ball_y: f32) -> Option<Direction> {
    let gap = ball_y - paddle_y;
    if gap.abs() < PADDLE_STEP {
        None
    } else if gap > 0.0 {
        Some(Direction::Up)
    } else {
        Some(Direction::Down)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();
    let miss_chance = args.miss_chance.clamp(0.0, 1.0);

    info!("Connecting to {}", args.server);
    let (ws, _) = connect_async(args.server.as_str()).await?;
    let (mut write, mut read) = ws.split();

    let mut player = None;
    let mut last_score = (0, 0);

    while let Some(frame) = read.next().await {
        let text = match frame? {
            Message::Text(text) => text,
            Message::Close(reason) => {
                info!("Server closed the connection: {:?}", reason);
                break;
            }
            _ => continue,
        };

        let message: ServerMessage = match serde_json::from_str(&text) {
            Ok(message) => message,
            Err(e) => {
                warn!("Unexpected message {:?}: {}", text, e);
                continue;
            }
        };

        match message {
            ServerMessage::Welcome { player: number } => {
                info!("Seated as player {}", number);
                player = Some(number);
            }
            ServerMessage::State {
                paddle1,
                paddle2,
                ball,
            } => {
                let Some(number) = player else { continue };

                if (paddle1.score, paddle2.score) != last_score {
                    last_score = (paddle1.score, paddle2.score);
                    info!("Score {} - {}", last_score.0, last_score.1);
                }

                if rand::random::<f64>() < miss_chance {
                    continue;
                }

                let own = if number == 1 { paddle1 } else { paddle2 };
                if let Some(direction) = steer(own.y, ball.y) {
                    debug!("Moving {:?} (paddle {:.2}, ball {:.2})", direction, own.y, ball.y);
                    let command = serde_json::to_string(&ClientMessage::Move { direction })?;
                    write.send(Message::Text(command)).await?;
                }
            }
        }
    }

    info!("Bot finished");
    Ok(())
}
