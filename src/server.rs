use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::EnvFilter;

use crate::codec::FrameCodec;
use crate::commands::executable::Executable;
use crate::commands::Command;
use crate::config::Config;
use crate::connection::Connection;
use crate::frame::Frame;
use crate::store::Store;
use crate::Error;

pub async fn run(config: Config) -> Result<(), Error> {
    init_tracing(&config.log_level);

    let listener = TcpListener::bind((config.host.as_str(), config.port)).await?;
    let store = Store::new();

    serve(listener, store, config.max_frame_size).await
}

/// Sets up the global `fmt` subscriber. `RUST_LOG` takes precedence over `level`. Calling it more
/// than once is harmless.
pub fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|e| debug!("Failed to initialize global tracing: {}", e));
}

/// Accepts connections on `listener` forever, one task per connection, all sharing `store`.
pub async fn serve(
    listener: TcpListener,
    store: Store,
    max_frame_size: usize,
) -> Result<(), Error> {
    info!("Server listening on {}", listener.local_addr()?);

    loop {
        let (socket, client_address) = listener.accept().await?;
        let store = store.clone();
        let conn = Connection::with_codec(socket, FrameCodec::new(max_frame_size));
        info!(connection_id = %conn.id, "Accepted connection from {:?}", client_address);

        tokio::spawn(async move {
            if let Err(e) = handle_connection(conn, store).await {
                error!("Connection error: {}", e);
            }
        });
    }
}

/// Serves requests from a single client until it disconnects.
///
/// Requests that decode but cannot be executed (unknown command, bad arguments) are answered with
/// an error reply and the session goes on. Malformed framing ends the session without a reply.
#[instrument(name = "connection", skip(conn, store), fields(connection_id = %conn.id))]
pub async fn handle_connection<S>(mut conn: Connection<S>, store: Store) -> Result<(), Error>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    loop {
        let frame = match conn.read_frame().await {
            Ok(Some(Frame::NullArray)) | Ok(None) => break,
            Ok(Some(frame)) => frame,
            Err(e) => {
                warn!("Closing connection on malformed input: {}", e);
                return Err(e.into());
            }
        };
        debug!("Received frame from client: {}", frame);

        let res = match Command::try_from(frame) {
            Ok(cmd) => cmd.exec(store.clone())?,
            Err(e) if e.is_fatal() => {
                warn!("Closing connection on malformed request: {}", e);
                return Err(e.into());
            }
            Err(e) => {
                info!("Rejecting request: {}", e);
                Frame::from(e)
            }
        };
        debug!("Sending response to client: {}", res);

        conn.write_frame(res).await?;
    }

    info!("Connection closed");
    Ok(())
}
