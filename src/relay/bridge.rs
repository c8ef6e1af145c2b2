//! Relay Bridge
//!
//! Outbound websocket client connecting the dashboard process to the bot
//! relay. The bridge holds exactly one connection, re-issues its guild join
//! on every (re)connect, and re-delivers received events into the local
//! room registry. Events that arrive for any other guild, or while the
//! bridge is disconnected, are dropped.

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};
use tracing::{debug, info, warn};

use crate::error::{CoreError, Result};
use crate::relay::backoff::Backoff;
use crate::relay::rooms::RoomRegistry;
use crate::relay::wire::Frame;

// == Bridge ==
/// Handle to the running bridge task.
#[derive(Debug)]
pub struct Bridge {
    handle: JoinHandle<()>,
}

impl Bridge {
    /// Spawns the bridge loop. It reconnects forever with exponential
    /// backoff; a successful connect resets the backoff.
    pub fn spawn(
        url: String,
        target_guild: String,
        rooms: Arc<RoomRegistry>,
        mut backoff: Backoff,
    ) -> Self {
        let handle = tokio::spawn(async move {
            loop {
                match connect_async(url.as_str()).await {
                    Ok((stream, _response)) => {
                        backoff.reset();
                        info!(%url, "bridge connected to bot relay");
                        if let Err(session_error) =
                            run_session(stream, &target_guild, &rooms).await
                        {
                            warn!(%session_error, "bridge session ended");
                        }
                    }
                    Err(connect_error) => {
                        warn!(%url, %connect_error, "bridge connect failed");
                    }
                }

                let delay = backoff.next();
                info!(delay_ms = delay.as_millis() as u64, "bridge reconnecting");
                tokio::time::sleep(delay).await;
            }
        });

        Self { handle }
    }

    pub fn stop(&self) {
        self.handle.abort();
    }
}

impl Drop for Bridge {
    fn drop(&mut self) {
        self.stop();
    }
}

// == Session ==
/// One connected session: join the target guild room on the remote end,
/// then forward every event for that guild into the local registry until
/// the socket drops.
async fn run_session(
    stream: tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >,
    target_guild: &str,
    rooms: &Arc<RoomRegistry>,
) -> Result<()> {
    let (mut sink, mut source) = stream.split();

    let join = Frame::JoinGuild {
        guild_id: target_guild.to_string(),
    };
    sink.send(WsMessage::Text(join.encode()?))
        .await
        .map_err(|e| CoreError::Relay(format!("join send failed: {e}")))?;

    while let Some(message) = source.next().await {
        let message = message.map_err(|e| CoreError::Relay(format!("socket read failed: {e}")))?;

        match message {
            WsMessage::Text(text) => match Frame::decode(&text) {
                Ok(Frame::Joined { guild_id }) => {
                    info!(%guild_id, "bridge join acknowledged");
                }
                Ok(Frame::RealtimeEvent { event }) => {
                    if event.guild_id == target_guild {
                        rooms.deliver(target_guild, &Frame::RealtimeEvent { event });
                    } else {
                        // The bot relay should only send our guild; drop
                        // anything else rather than leak it into the room.
                        debug!(guild_id = %event.guild_id, "dropping event for foreign guild");
                    }
                }
                Ok(Frame::Disconnect) => {
                    info!("bot relay requested disconnect");
                    return Ok(());
                }
                Ok(frame) => {
                    debug!(?frame, "ignoring unexpected frame");
                }
                Err(decode_error) => {
                    warn!(%decode_error, "dropping malformed frame");
                }
            },
            WsMessage::Close(_) => {
                return Err(CoreError::Relay("bot relay closed the connection".to_string()));
            }
            _ => {}
        }
    }

    Err(CoreError::Relay("bot relay stream ended".to_string()))
}
