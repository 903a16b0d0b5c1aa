//! Loopback listener that catches the authorization redirect during first-time login.
//!
//! The listener answers every GET with a short HTML page and keeps accepting until a
//! request carries `code` or `error`. [`CallbackServer::receive_redirect`] consumes the
//! server, so the socket is released on every exit path.

// std
use std::{
	io,
	net::{Ipv4Addr, SocketAddr, SocketAddrV4},
};
// crates.io
use tokio::{
	io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader},
	net::{TcpListener, TcpStream},
	time,
};
// self
use crate::{_prelude::*, error::ConfigError, provider::AuthorizationSession};

/// Port used by [`CallbackConfig::local`] when the application registered the default
/// redirect URI.
pub const DEFAULT_CALLBACK_PORT: u16 = 8080;

const REQUEST_HEAD_LIMIT: u64 = 16 * 1024;
const READ_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5);
const SUCCESS_PAGE: &str = "<html><body><h1>Authentication status: complete.</h1>\
	<p>You can close this window.</p></body></html>";
const FAILURE_PAGE: &str = "<html><body><h1>Authentication status: failed.</h1>\
	<p>Return to the application for details.</p></body></html>";
const WAITING_PAGE: &str =
	"<html><body><h1>Authentication status: waiting for authorization.</h1></body></html>";

/// Callback listener failures.
#[derive(Debug, ThisError)]
pub enum CallbackError {
	/// Listener could not bind the configured address.
	#[error("Callback listener could not bind {addr}.")]
	Bind {
		/// Address that was requested.
		addr: SocketAddr,
		/// Underlying socket error.
		#[source]
		source: io::Error,
	},
	/// Accepting a connection failed.
	#[error("Callback listener failed to accept a connection.")]
	Io {
		/// Underlying socket error.
		#[source]
		source: io::Error,
	},
	/// The user rejected the authorization request.
	#[error("The user denied access to the application.")]
	AccessDenied,
	/// The authorization server reported an error other than `access_denied`.
	#[error("Authorization server returned an error: {error}.")]
	Provider {
		/// Error code from the redirect query.
		error: String,
	},
	/// The redirect carried neither a code nor an error.
	#[error("Authorization redirect is missing the code parameter.")]
	MissingCode,
	/// The redirect `state` differs from the one sent with the authorize URL.
	#[error("Authorization redirect state does not match the session.")]
	StateMismatch,
}
impl CallbackError {
	/// Maps the `error` query parameter of a redirect.
	pub fn from_provider(error: &str) -> Self {
		match error {
			"access_denied" => Self::AccessDenied,
			other => Self::Provider { error: other.to_owned() },
		}
	}
}

/// Where the listener binds and which redirect URI the browser is sent to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallbackConfig {
	/// Socket address to listen on.
	pub bind: SocketAddr,
	/// Redirect URI registered for the application.
	pub redirect_uri: Url,
}
impl CallbackConfig {
	/// Creates a configuration from explicit values.
	pub fn new(bind: SocketAddr, redirect_uri: Url) -> Self {
		Self { bind, redirect_uri }
	}

	/// Listens on `127.0.0.1:{port}` with `http://localhost:{port}` as the redirect URI.
	pub fn local(port: u16) -> Result<Self, ConfigError> {
		let redirect_uri = Url::parse(&format!("http://localhost:{port}"))
			.map_err(|source| ConfigError::InvalidRedirect { source })?;

		Ok(Self::new(SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, port)), redirect_uri))
	}

	/// Derives a loopback bind address from the port of `redirect_uri`.
	pub fn for_redirect(redirect_uri: Url) -> Self {
		let port = redirect_uri.port_or_known_default().unwrap_or(DEFAULT_CALLBACK_PORT);

		Self::new(SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, port)), redirect_uri)
	}
}

/// Bound callback listener.
#[derive(Debug)]
pub struct CallbackServer {
	listener: TcpListener,
	config: CallbackConfig,
}
impl CallbackServer {
	/// Binds the configured address.
	pub async fn bind(config: CallbackConfig) -> Result<Self, CallbackError> {
		let listener = TcpListener::bind(config.bind)
			.await
			.map_err(|source| CallbackError::Bind { addr: config.bind, source })?;

		Ok(Self { listener, config })
	}

	/// Address actually bound, useful when the configured port was `0`.
	pub fn local_addr(&self) -> Result<SocketAddr, CallbackError> {
		self.listener.local_addr().map_err(|source| CallbackError::Io { source })
	}

	/// Returns the configuration the server was bound with.
	pub fn config(&self) -> &CallbackConfig {
		&self.config
	}

	/// Waits for the redirect and returns its full URL.
	///
	/// Requests without `code` or `error` (favicon lookups, preconnects) are answered
	/// and skipped.
	pub async fn receive_redirect(self) -> Result<Url, CallbackError> {
		loop {
			let (stream, peer) =
				self.listener.accept().await.map_err(|source| CallbackError::Io { source })?;

			match self.serve(stream).await {
				Ok(Some(redirect)) => return Ok(redirect),
				Ok(None) => continue,
				Err(e) => {
					#[cfg(feature = "tracing")]
					tracing::debug!(peer = %peer, error = %e, "Dropped callback connection.");
					#[cfg(not(feature = "tracing"))]
					let _ = (peer, e);
				},
			}
		}
	}

	/// Waits for the redirect and extracts the code, validating `state` against `session`.
	pub async fn receive_code(self, session: &AuthorizationSession) -> Result<String, CallbackError> {
		let redirect = self.receive_redirect().await?;

		session.parse_redirect(&redirect)
	}

	async fn serve(&self, mut stream: TcpStream) -> io::Result<Option<Url>> {
		let (read, mut write) = stream.split();
		let mut reader = BufReader::new(read.take(REQUEST_HEAD_LIMIT));
		let mut request_line = String::new();

		time::timeout(READ_TIMEOUT, reader.read_line(&mut request_line))
			.await
			.map_err(|_| io::Error::from(io::ErrorKind::TimedOut))??;

		// Drain headers so the client sees a complete exchange.
		loop {
			let mut header = String::new();
			let bytes = time::timeout(READ_TIMEOUT, reader.read_line(&mut header))
				.await
				.map_err(|_| io::Error::from(io::ErrorKind::TimedOut))??;

			if bytes == 0 || header.trim().is_empty() {
				break;
			}
		}

		let redirect = self.redirect_from_request_line(&request_line);
		let page = match &redirect {
			Some(url) if url.query_pairs().any(|(key, _)| key == "error") => FAILURE_PAGE,
			Some(_) => SUCCESS_PAGE,
			None => WAITING_PAGE,
		};
		let response = format!(
			"HTTP/1.1 200 OK\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{page}",
			page.len()
		);

		write.write_all(response.as_bytes()).await?;
		write.flush().await?;

		Ok(redirect)
	}

	fn redirect_from_request_line(&self, request_line: &str) -> Option<Url> {
		let mut parts = request_line.split_whitespace();

		if parts.next() != Some("GET") {
			return None;
		}

		let redirect = self.config.redirect_uri.join(parts.next()?).ok()?;
		let answered = redirect.query_pairs().any(|(key, _)| key == "code" || key == "error");

		answered.then_some(redirect)
	}
}

/// Returns `presupplied` untouched, or runs a one-shot callback server until the redirect
/// arrives.
///
/// The caller is responsible for sending the user to `session.authorize_url` once the
/// listener is bound; `on_ready` is invoked with that URL right after binding.
pub async fn obtain_authorization_code<F>(
	config: CallbackConfig,
	session: &AuthorizationSession,
	presupplied: Option<String>,
	on_ready: F,
) -> Result<String, CallbackError>
where
	F: FnOnce(&Url),
{
	if let Some(code) = presupplied.filter(|code| !code.is_empty()) {
		return Ok(code);
	}

	let server = CallbackServer::bind(config).await?;

	on_ready(&session.authorize_url);

	server.receive_code(session).await
}
