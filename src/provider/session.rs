//! Authorization-code handshake: authorize URL, `state`, and PKCE material.

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::{Rng, distr::Alphanumeric};
use sha2::{Digest, Sha256};
// self
use crate::{_prelude::*, auth::ScopeSet, callback::CallbackError, service::ServiceDescriptor};

const STATE_LEN: usize = 32;
const PKCE_VERIFIER_LEN: usize = 64;

/// Supported PKCE challenge methods surfaced via [`AuthorizationSession`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PkceCodeChallengeMethod {
	/// SHA-256 based PKCE (RFC 7636 S256).
	S256,
}
impl PkceCodeChallengeMethod {
	/// Returns the RFC 7636 identifier for the challenge method.
	pub fn as_str(self) -> &'static str {
		match self {
			PkceCodeChallengeMethod::S256 => "S256",
		}
	}
}

/// Authorization parameters that round-trip through the user's browser.
#[derive(Clone)]
pub struct AuthorizationSession {
	/// Requested scopes.
	pub scope: ScopeSet,
	/// Opaque state value that must come back on the redirect.
	pub state: String,
	/// Redirect URI registered for the application.
	pub redirect_uri: Url,
	/// Authorize URL the user should open.
	pub authorize_url: Url,
	pkce: PkcePair,
}
impl AuthorizationSession {
	/// Starts a session for `client_id`; set `show_dialog` to force the consent screen
	/// even when the user already approved the application.
	pub fn start(
		descriptor: &ServiceDescriptor,
		client_id: &str,
		redirect_uri: Url,
		scope: ScopeSet,
		show_dialog: bool,
	) -> Self {
		let state = random_string(STATE_LEN);
		let pkce = PkcePair::generate();
		let mut authorize_url = descriptor.endpoints.authorization.clone();

		{
			let mut pairs = authorize_url.query_pairs_mut();

			pairs.append_pair("client_id", client_id);
			pairs.append_pair("response_type", "code");
			pairs.append_pair("redirect_uri", redirect_uri.as_str());

			if !scope.is_empty() {
				pairs.append_pair("scope", &scope.normalized());
			}

			pairs.append_pair("state", &state);
			pairs.append_pair("code_challenge", &pkce.challenge);
			pairs.append_pair("code_challenge_method", pkce.method.as_str());

			if show_dialog {
				pairs.append_pair("show_dialog", "true");
			}
		}

		Self { scope, state, redirect_uri, authorize_url, pkce }
	}

	/// PKCE code challenge derived from the secret verifier.
	pub fn code_challenge(&self) -> &str {
		&self.pkce.challenge
	}

	/// PKCE challenge method (currently always `S256`).
	pub fn code_challenge_method(&self) -> PkceCodeChallengeMethod {
		self.pkce.method
	}

	/// Validates the returned `state` parameter after the authorization redirect.
	pub fn validate_state(&self, returned_state: &str) -> Result<(), CallbackError> {
		if returned_state == self.state { Ok(()) } else { Err(CallbackError::StateMismatch) }
	}

	/// Extracts the authorization code from the URL the browser was redirected to.
	pub fn parse_redirect(&self, redirect: &Url) -> Result<String, CallbackError> {
		let query = redirect.query_pairs().collect::<BTreeMap<_, _>>();

		if let Some(error) = query.get("error") {
			return Err(CallbackError::from_provider(error));
		}

		self.validate_state(query.get("state").map_or("", |state| &**state))?;

		query
			.get("code")
			.filter(|code| !code.is_empty())
			.map(|code| code.clone().into_owned())
			.ok_or(CallbackError::MissingCode)
	}

	pub(crate) fn pkce_verifier(&self) -> &str {
		&self.pkce.verifier
	}
}
impl Debug for AuthorizationSession {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AuthorizationSession")
			.field("scope", &self.scope)
			.field("state", &self.state)
			.field("redirect_uri", &self.redirect_uri)
			.field("authorize_url", &self.authorize_url)
			.field("code_challenge", &self.pkce.challenge)
			.field("code_challenge_method", &self.pkce.method)
			.finish()
	}
}

#[derive(Clone)]
struct PkcePair {
	verifier: String,
	challenge: String,
	method: PkceCodeChallengeMethod,
}
impl PkcePair {
	fn generate() -> Self {
		let verifier = random_string(PKCE_VERIFIER_LEN);
		let challenge = compute_pkce_challenge(&verifier);

		Self { verifier, challenge, method: PkceCodeChallengeMethod::S256 }
	}
}

fn random_string(len: usize) -> String {
	rand::rng().sample_iter(Alphanumeric).take(len).map(char::from).collect()
}

fn compute_pkce_challenge(verifier: &str) -> String {
	URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn session() -> AuthorizationSession {
		let descriptor = ServiceDescriptor::spotify().expect("Production descriptor should build.");

		AuthorizationSession::start(
			&descriptor,
			"client-id",
			Url::parse("http://localhost:8080").expect("Redirect fixture should parse."),
			ScopeSet::new(["user-read-private", "playlist-modify-public"])
				.expect("Scope fixture should be valid."),
			true,
		)
	}

	#[test]
	fn authorize_url_carries_all_parameters() {
		let session = session();
		let query = session.authorize_url.query_pairs().into_owned().collect::<BTreeMap<_, _>>();

		assert_eq!(session.authorize_url.path(), "/authorize");
		assert_eq!(query["client_id"], "client-id");
		assert_eq!(query["response_type"], "code");
		assert_eq!(query["redirect_uri"], "http://localhost:8080/");
		assert_eq!(query["scope"], "playlist-modify-public user-read-private");
		assert_eq!(query["state"], session.state);
		assert_eq!(query["code_challenge"], session.code_challenge());
		assert_eq!(query["code_challenge_method"], "S256");
		assert_eq!(query["show_dialog"], "true");
		assert_eq!(session.state.len(), STATE_LEN);
	}

	#[test]
	fn challenge_matches_rfc_7636_vector() {
		assert_eq!(
			compute_pkce_challenge("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk"),
			"E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
		);
	}

	#[test]
	fn redirect_parsing_checks_state_and_errors() {
		let session = session();
		let ok = Url::parse(&format!("http://localhost:8080/?code=abc&state={}", session.state))
			.expect("Redirect fixture should parse.");

		assert_eq!(session.parse_redirect(&ok).expect("Matching state should pass."), "abc");

		let forged = Url::parse("http://localhost:8080/?code=abc&state=forged")
			.expect("Redirect fixture should parse.");

		assert!(matches!(session.parse_redirect(&forged), Err(CallbackError::StateMismatch)));

		let denied = Url::parse("http://localhost:8080/?error=access_denied&state=x")
			.expect("Redirect fixture should parse.");

		assert!(matches!(session.parse_redirect(&denied), Err(CallbackError::AccessDenied)));

		let empty = Url::parse(&format!("http://localhost:8080/?state={}", session.state))
			.expect("Redirect fixture should parse.");

		assert!(matches!(session.parse_redirect(&empty), Err(CallbackError::MissingCode)));
	}
}
