// std
use std::net::IpAddr;
// self
use crate::{
	_prelude::*,
	catalog::DEFAULT_URI_SCHEME,
	service::{ServiceDescriptor, ServiceEndpoints},
};

/// Errors raised while constructing or validating descriptors.
#[derive(Debug, PartialEq, Eq, ThisError)]
pub enum DescriptorError {
	/// Authorize endpoint is required.
	#[error("Missing authorization endpoint.")]
	MissingAuthorizationEndpoint,
	/// Token endpoint is required.
	#[error("Missing token endpoint.")]
	MissingTokenEndpoint,
	/// API base is required.
	#[error("Missing API base URL.")]
	MissingApiBase,
	/// Endpoints must use HTTPS unless they point at a loopback host.
	#[error("The {endpoint} endpoint must use HTTPS: {url}.")]
	InsecureEndpoint {
		/// Which endpoint failed validation.
		endpoint: &'static str,
		/// Endpoint URL that failed validation.
		url: String,
	},
	/// An endpoint string could not be parsed.
	#[error("The {endpoint} endpoint is not a valid URL: {url}.")]
	UnparsableEndpoint {
		/// Which endpoint failed parsing.
		endpoint: &'static str,
		/// Offending text.
		url: String,
	},
	/// URI scheme must be a non-empty token without `:`.
	#[error("URI scheme `{0}` is invalid.")]
	InvalidUriScheme(String),
}

/// Builder for [`ServiceDescriptor`] values.
#[derive(Debug)]
pub struct ServiceDescriptorBuilder {
	/// Authorize endpoint.
	pub authorization_endpoint: Option<Url>,
	/// Token endpoint.
	pub token_endpoint: Option<Url>,
	/// API base URL.
	pub api_base: Option<Url>,
	/// URI scheme for catalog references.
	pub uri_scheme: String,
}
impl ServiceDescriptorBuilder {
	/// Creates a builder with no endpoints and the default URI scheme.
	pub fn new() -> Self {
		Self {
			authorization_endpoint: None,
			token_endpoint: None,
			api_base: None,
			uri_scheme: DEFAULT_URI_SCHEME.into(),
		}
	}

	/// Sets the authorize endpoint.
	pub fn authorization_endpoint(mut self, url: Url) -> Self {
		self.authorization_endpoint = Some(url);

		self
	}

	/// Parses and sets the authorize endpoint.
	pub fn authorization_endpoint_str(self, url: &str) -> Result<Self, DescriptorError> {
		Ok(self.authorization_endpoint(parse_endpoint("authorization", url)?))
	}

	/// Sets the token endpoint.
	pub fn token_endpoint(mut self, url: Url) -> Self {
		self.token_endpoint = Some(url);

		self
	}

	/// Parses and sets the token endpoint.
	pub fn token_endpoint_str(self, url: &str) -> Result<Self, DescriptorError> {
		Ok(self.token_endpoint(parse_endpoint("token", url)?))
	}

	/// Sets the API base URL.
	pub fn api_base(mut self, url: Url) -> Self {
		self.api_base = Some(url);

		self
	}

	/// Parses and sets the API base URL.
	pub fn api_base_str(self, url: &str) -> Result<Self, DescriptorError> {
		Ok(self.api_base(parse_endpoint("api", url)?))
	}

	/// Overrides the URI scheme.
	pub fn uri_scheme(mut self, scheme: impl Into<String>) -> Self {
		self.uri_scheme = scheme.into();

		self
	}

	/// Consumes the builder and validates the resulting descriptor.
	pub fn build(self) -> Result<ServiceDescriptor, DescriptorError> {
		let authorization =
			self.authorization_endpoint.ok_or(DescriptorError::MissingAuthorizationEndpoint)?;
		let token = self.token_endpoint.ok_or(DescriptorError::MissingTokenEndpoint)?;
		let mut api_base = self.api_base.ok_or(DescriptorError::MissingApiBase)?;

		if !api_base.path().ends_with('/') {
			let path = format!("{}/", api_base.path());

			api_base.set_path(&path);
		}

		let descriptor = ServiceDescriptor {
			endpoints: ServiceEndpoints { authorization, token, api_base },
			uri_scheme: self.uri_scheme,
		};

		descriptor.validate()?;

		Ok(descriptor)
	}
}
impl Default for ServiceDescriptorBuilder {
	fn default() -> Self {
		Self::new()
	}
}

impl ServiceDescriptor {
	fn validate(&self) -> Result<(), DescriptorError> {
		validate_endpoint("authorization", &self.endpoints.authorization)?;
		validate_endpoint("token", &self.endpoints.token)?;
		validate_endpoint("api", &self.endpoints.api_base)?;

		if self.uri_scheme.is_empty()
			|| self.uri_scheme.contains(':')
			|| self.uri_scheme.chars().any(char::is_whitespace)
		{
			return Err(DescriptorError::InvalidUriScheme(self.uri_scheme.clone()));
		}

		Ok(())
	}
}

fn parse_endpoint(name: &'static str, url: &str) -> Result<Url, DescriptorError> {
	Url::parse(url)
		.map_err(|_| DescriptorError::UnparsableEndpoint { endpoint: name, url: url.to_owned() })
}

fn validate_endpoint(name: &'static str, url: &Url) -> Result<(), DescriptorError> {
	match url.scheme() {
		"https" => Ok(()),
		"http" if is_loopback(url) => Ok(()),
		_ => Err(DescriptorError::InsecureEndpoint { endpoint: name, url: url.to_string() }),
	}
}

fn is_loopback(url: &Url) -> bool {
	match url.host_str() {
		Some("localhost") => true,
		Some(host) => host
			.trim_start_matches('[')
			.trim_end_matches(']')
			.parse::<IpAddr>()
			.is_ok_and(|ip| ip.is_loopback()),
		None => false,
	}
}
