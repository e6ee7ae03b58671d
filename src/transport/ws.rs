use crate::error::{Error, Result};
use crate::protocol::models::ModelDefinition;
use tokio::net::TcpStream;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use url::Url;

/// Client socket produced by [`connect`].
pub type SignalingSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Rewrite `http`/`https` to `ws`/`wss`; `ws`/`wss` pass through untouched.
///
/// # Errors
/// Returns an error for any other scheme.
#[allow(clippy::result_large_err)]
pub fn to_ws_scheme(url: &Url) -> Result<Url> {
    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => return Err(Error::InvalidBaseUrl(format!("unsupported scheme `{other}` in {url}"))),
    };
    let mut ws_url = url.clone();
    if ws_url.scheme() != scheme {
        ws_url
            .set_scheme(scheme)
            .map_err(|()| Error::InvalidBaseUrl(url.to_string()))?;
    }
    Ok(ws_url)
}

/// Build `<ws(s)>://<host>/<model path>?api_key=<key>&model=<name>` from a base URL.
///
/// # Errors
/// Returns an error if the base URL cannot carry a path or uses an unsupported scheme.
#[allow(clippy::result_large_err)]
pub fn signaling_url(base_url: &Url, api_key: &str, model: &ModelDefinition) -> Result<Url> {
    let mut url = to_ws_scheme(base_url)?;
    if url.cannot_be_a_base() || url.host_str().is_none() {
        return Err(Error::InvalidBaseUrl(base_url.to_string()));
    }

    let path = format!(
        "{}/{}",
        url.path().trim_end_matches('/'),
        model.url_path.trim_start_matches('/')
    );
    url.set_path(&path);
    url.set_query(None);
    url.query_pairs_mut()
        .append_pair("api_key", api_key)
        .append_pair("model", &model.name);
    Ok(url)
}

/// Establish a WebSocket connection to the signaling endpoint.
///
/// # Errors
/// Returns an error if the URL scheme is unsupported or the handshake fails.
pub async fn connect(url: &Url) -> Result<SignalingSocket> {
    let url = to_ws_scheme(url)?;
    let (ws_stream, _) = connect_async(url.as_str()).await?;

    tracing::info!(host = url.host_str().unwrap_or_default(), path = url.path(), "Connected to signaling server");

    Ok(ws_stream)
}
