//! The upstream HTTP client: graph endpoint, REST surface, conditional
//! revalidation, and response-shaping helpers.

use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::{Method, StatusCode};
use serde_json::{json, Value};
use tandem_cache::{EntityCache, Scope};
use tandem_core::{Error, ErrorKind};
use tandem_ratelimit::RateLimitTracker;
use tandem_telemetry::{Action, ActionEvent, CacheEvent, CacheOutcome, NoopEmitter, RequestEvent, TelemetryEmitter};

use crate::model::{Accept, Credential, FileEntry, GraphQlEnvelope, GraphQlRequest, Revalidated};
use crate::retry::with_retry;
use crate::validate;

const API_VERSION: &str = "2025-01-01";
const GRAPH_URL: &str = "https://api.github.com/graphql";
const REST_BASE: &str = "https://api.github.com";
const PATCH_TRUNCATE_BYTES: usize = 128 * 1024;
const BINARY_MARKER: &str = "Binary files";
const TRUNCATION_SENTINEL: &str = "\n... (truncated)\n";

/// A thin wrapper around `reqwest::Client` that applies this workspace's
/// header, retry, and rate-limit conventions uniformly.
pub struct UpstreamClient {
	http: reqwest::Client,
	tracker: RateLimitTracker,
	emitter: Arc<dyn TelemetryEmitter>,
}

impl UpstreamClient {
	pub fn new(tracker: RateLimitTracker) -> Result<Self, Error> {
		Self::with_emitter(tracker, Arc::new(NoopEmitter))
	}

	pub fn with_emitter(tracker: RateLimitTracker, emitter: Arc<dyn TelemetryEmitter>) -> Result<Self, Error> {
		let http = reqwest::Client::builder()
			.timeout(Duration::from_secs(30))
			.build()
			.map_err(|e| Error::network(e.to_string()))?;
		Ok(Self { http, tracker, emitter })
	}

	pub fn rate_limit_tracker(&self) -> &RateLimitTracker {
		&self.tracker
	}

	/// Executes a single GraphQL query against the fixed graph endpoint.
	pub async fn graphql(&self, credential: &Credential, query: &str, variables: Value) -> Result<Value, Error> {
		with_retry(|_| None, || self.graphql_once(credential, query, &variables)).await
	}

	async fn graphql_once(&self, credential: &Credential, query: &str, variables: &Value) -> Result<Value, Error> {
		let started = Instant::now();
		let body = GraphQlRequest {
			query: query.to_string(),
			variables: variables.clone(),
		};
		let response = self
			.http
			.post(GRAPH_URL)
			.bearer_auth(&credential.token)
			.header("X-GitHub-Api-Version", API_VERSION)
			.header("Accept", Accept::Json.header_value())
			.json(&body)
			.send()
			.await
			.map_err(|e| Error::network(e.to_string()))?;

		self.observe_rate_limit(response.headers());
		let rate_remaining = Some(self.tracker.snapshot().remaining);
		let status = response.status();
		if !status.is_success() {
			self.emit_request("POST", "/graphql", status.as_u16(), started.elapsed(), CacheOutcome::Miss, rate_remaining);
			return Err(self.map_error_status(status, response.headers()));
		}
		let envelope: GraphQlEnvelope = response.json().await.map_err(|e| Error::network(e.to_string()))?;
		if !envelope.errors.is_empty() {
			let message = envelope.errors.into_iter().map(|e| e.message).collect::<Vec<_>>().join("; ");
			self.emit_request("POST", "/graphql", 200, started.elapsed(), CacheOutcome::Miss, rate_remaining);
			return Err(Error::new(ErrorKind::GraphQl, 200, message));
		}
		self.emit_request("POST", "/graphql", 200, started.elapsed(), CacheOutcome::Miss, rate_remaining);
		envelope.data.ok_or_else(|| Error::new(ErrorKind::GraphQl, 200, "graph response carried no data"))
	}

	/// Performs a conditionally-revalidated `GET`, honoring a previously
	/// stored entity-tag via `If-None-Match` (spec §8 invariant 3).
	pub async fn get_conditional(&self, credential: &Credential, path: &str, query: &[(&str, &str)], etag: Option<&str>) -> Result<Revalidated<Value>, Error> {
		with_retry(
			|err| self.retry_after_of(err),
			|| self.get_conditional_once(credential, path, query, etag),
		)
		.await
	}

	async fn get_conditional_once(&self, credential: &Credential, path: &str, query: &[(&str, &str)], etag: Option<&str>) -> Result<Revalidated<Value>, Error> {
		let started = Instant::now();
		let url = format!("{REST_BASE}{path}");
		let mut request = self
			.http
			.request(Method::GET, &url)
			.bearer_auth(&credential.token)
			.header("X-GitHub-Api-Version", API_VERSION)
			.header("Accept", Accept::Json.header_value())
			.query(query);
		if let Some(tag) = etag {
			request = request.header("If-None-Match", tag);
		}
		let response = request.send().await.map_err(|e| Error::network(e.to_string()))?;
		self.observe_rate_limit(response.headers());
		let rate_remaining = Some(self.tracker.snapshot().remaining);

		if response.status() == StatusCode::NOT_MODIFIED {
			self.emit_request("GET", path, 304, started.elapsed(), CacheOutcome::Hit, rate_remaining);
			self.emit_cache("GET", path, CacheOutcome::Hit);
			return Ok(Revalidated::NotModified);
		}
		let status = response.status();
		if !status.is_success() {
			self.emit_request("GET", path, status.as_u16(), started.elapsed(), CacheOutcome::Miss, rate_remaining);
			return Err(self.map_error_status(status, response.headers()));
		}
		let etag = response.headers().get("etag").and_then(|v| v.to_str().ok()).map(String::from);
		let body: Value = response.json().await.map_err(|e| Error::network(e.to_string()))?;
		self.emit_request("GET", path, status.as_u16(), started.elapsed(), CacheOutcome::Miss, rate_remaining);
		self.emit_cache("GET", path, CacheOutcome::Miss);
		Ok(Revalidated::Modified { body, etag })
	}

	fn emit_request(&self, method: &'static str, path: &str, status: u16, duration: Duration, cache: CacheOutcome, rate_remaining: Option<u32>) {
		self.emitter.emit_request(RequestEvent {
			method,
			endpoint: path.to_string(),
			status,
			duration,
			cache,
			rate_remaining,
		});
	}

	/// Reports whether a conditionally-revalidated read was served from the
	/// caller's cached entity-tag (`Hit`, a 304) or required a fresh body
	/// (`Miss`), independent of the request-duration telemetry above.
	fn emit_cache(&self, method: &'static str, path: &str, cache: CacheOutcome) {
		self.emitter.emit_cache(CacheEvent {
			method,
			endpoint: path.to_string(),
			cache,
		});
	}

	/// Fetches a single page of a list endpoint, returning the page body and
	/// the next page's query parameters if a `rel="next"` Link header is
	/// present.
	pub async fn list_page(&self, credential: &Credential, path: &str, query: &[(&str, &str)]) -> Result<(Value, Option<String>), Error> {
		with_retry(
			|err| self.retry_after_of(err),
			|| self.list_page_once(credential, path, query),
		)
		.await
	}

	async fn list_page_once(&self, credential: &Credential, path: &str, query: &[(&str, &str)]) -> Result<(Value, Option<String>), Error> {
		let started = Instant::now();
		let url = format!("{REST_BASE}{path}");
		let response = self
			.http
			.get(&url)
			.bearer_auth(&credential.token)
			.header("X-GitHub-Api-Version", API_VERSION)
			.header("Accept", Accept::Json.header_value())
			.query(query)
			.send()
			.await
			.map_err(|e| Error::network(e.to_string()))?;
		self.observe_rate_limit(response.headers());
		let rate_remaining = Some(self.tracker.snapshot().remaining);
		let status = response.status();
		if !status.is_success() {
			self.emit_request("GET", path, status.as_u16(), started.elapsed(), CacheOutcome::Miss, rate_remaining);
			return Err(self.map_error_status(status, response.headers()));
		}
		let next = response.headers().get("link").and_then(|v| v.to_str().ok()).and_then(parse_next_link);
		let body: Value = response.json().await.map_err(|e| Error::network(e.to_string()))?;
		self.emit_request("GET", path, status.as_u16(), started.elapsed(), CacheOutcome::Miss, rate_remaining);
		Ok((body, next))
	}

	/// Fetches a diff/patch body and shapes it into a [`FileEntry`], applying
	/// the 128 KiB truncation rule and binary-file detection.
	pub async fn fetch_patch(&self, credential: &Credential, path: &str, file_path: &str, added: u32, removed: u32, status: &str) -> Result<FileEntry, Error> {
		let raw = with_retry(
			|err| self.retry_after_of(err),
			|| self.fetch_raw_diff_once(credential, path),
		)
		.await?;
		Ok(shape_patch(file_path, added, removed, status, &raw))
	}

	async fn fetch_raw_diff_once(&self, credential: &Credential, path: &str) -> Result<String, Error> {
		let url = format!("{REST_BASE}{path}");
		let response = self
			.http
			.get(&url)
			.bearer_auth(&credential.token)
			.header("X-GitHub-Api-Version", API_VERSION)
			.header("Accept", Accept::Diff.header_value())
			.send()
			.await
			.map_err(|e| Error::network(e.to_string()))?;
		self.observe_rate_limit(response.headers());
		let status = response.status();
		if !status.is_success() {
			return Err(self.map_error_status(status, response.headers()));
		}
		response.text().await.map_err(|e| Error::network(e.to_string()))
	}

	/// Issues a single, never-retried mutating call and reports it through
	/// the Action telemetry family (spec §4.C, §4.J, §8 invariant 5).
	async fn mutate(
		&self,
		action: Action,
		credential: &Credential,
		method: Method,
		scope: &Scope,
		resource: &'static str,
		number: Option<u64>,
		path: &str,
		body: Value,
		cache: &EntityCache,
	) -> Result<Value, Error> {
		let started = Instant::now();
		let url = format!("{REST_BASE}{path}");
		let result = self.mutate_once(credential, method.clone(), &url, &body).await;
		let rate_remaining = Some(self.tracker.snapshot().remaining);
		if result.is_ok() {
			match number {
				Some(number) => cache.invalidate_mutation(scope, resource, number),
				None => cache.invalidate_list_scope(scope),
			}
		}
		let (status, error_kind) = match &result {
			Ok(_) => (200, None),
			Err(e) => (e.status, Some(e.kind)),
		};
		self.emitter.emit_action(ActionEvent {
			action,
			method: method_name(&method),
			endpoint: path.to_string(),
			status,
			duration: started.elapsed(),
			success: result.is_ok(),
			rate_remaining,
			error_kind,
		});
		result
	}

	async fn mutate_once(&self, credential: &Credential, method: Method, url: &str, body: &Value) -> Result<Value, Error> {
		let response = self
			.http
			.request(method, url)
			.bearer_auth(&credential.token)
			.header("X-GitHub-Api-Version", API_VERSION)
			.header("Accept", Accept::Json.header_value())
			.json(body)
			.send()
			.await
			.map_err(|e| Error::network(e.to_string()))?;
		self.observe_rate_limit(response.headers());
		let status = response.status();
		if !status.is_success() {
			return Err(self.map_error_status(status, response.headers()));
		}
		if status == StatusCode::NO_CONTENT {
			return Ok(Value::Null);
		}
		response.json().await.map_err(|e| Error::network(e.to_string()))
	}

	/// Creates a resource (issue, pull request, …) under `scope`. No
	/// existing detail key to invalidate; only the resource's list scope.
	pub async fn create(
		&self,
		credential: &Credential,
		scope: &Scope,
		resource: &'static str,
		path: &str,
		title: &str,
		body_text: &str,
		cache: &EntityCache,
	) -> Result<Value, Error> {
		validate::validate_path_segment("owner", &scope.owner)?;
		validate::validate_path_segment("repo", &scope.repo)?;
		validate::validate_title(title)?;
		let body = json!({ "title": title, "body": body_text });
		self.mutate(Action::Create, credential, Method::POST, scope, resource, None, path, body, cache).await
	}

	/// Updates a numbered resource's fields (title, body, state, …).
	pub async fn update(
		&self,
		credential: &Credential,
		scope: &Scope,
		resource: &'static str,
		number: u64,
		path: &str,
		fields: Value,
		cache: &EntityCache,
	) -> Result<Value, Error> {
		validate::validate_path_segment("owner", &scope.owner)?;
		validate::validate_path_segment("repo", &scope.repo)?;
		self.mutate(Action::Update, credential, Method::PATCH, scope, resource, Some(number), path, fields, cache)
			.await
	}

	/// Merges a pull request at `head_sha`.
	pub async fn merge(
		&self,
		credential: &Credential,
		scope: &Scope,
		resource: &'static str,
		number: u64,
		path: &str,
		head_sha: &str,
		cache: &EntityCache,
	) -> Result<Value, Error> {
		validate::validate_path_segment("owner", &scope.owner)?;
		validate::validate_path_segment("repo", &scope.repo)?;
		validate::validate_sha(head_sha)?;
		let body = json!({ "sha": head_sha });
		self.mutate(Action::Merge, credential, Method::PUT, scope, resource, Some(number), path, body, cache)
			.await
	}

	/// Updates a pull request's branch from its base, optionally asserting
	/// the expected current head.
	pub async fn update_branch(
		&self,
		credential: &Credential,
		scope: &Scope,
		resource: &'static str,
		number: u64,
		path: &str,
		expected_head_sha: Option<&str>,
		cache: &EntityCache,
	) -> Result<Value, Error> {
		validate::validate_path_segment("owner", &scope.owner)?;
		validate::validate_path_segment("repo", &scope.repo)?;
		if let Some(sha) = expected_head_sha {
			validate::validate_sha(sha)?;
		}
		let body = match expected_head_sha {
			Some(sha) => json!({ "expected_head_sha": sha }),
			None => Value::Object(Default::default()),
		};
		self.mutate(Action::UpdateBranch, credential, Method::PUT, scope, resource, Some(number), path, body, cache)
			.await
	}

	/// Creates a repository label.
	pub async fn create_label(
		&self,
		credential: &Credential,
		scope: &Scope,
		path: &str,
		name: &str,
		color: &str,
		cache: &EntityCache,
	) -> Result<Value, Error> {
		validate::validate_path_segment("owner", &scope.owner)?;
		validate::validate_path_segment("repo", &scope.repo)?;
		validate::validate_label_name(name)?;
		validate::validate_label_color(color)?;
		let body = json!({ "name": name, "color": color });
		self.mutate(Action::LabelCreate, credential, Method::POST, scope, "labels", None, path, body, cache)
			.await
	}

	/// Creates a review comment anchored to a commit and diff position.
	pub async fn create_inline_comment(
		&self,
		credential: &Credential,
		scope: &Scope,
		resource: &'static str,
		number: u64,
		path: &str,
		commit_sha: &str,
		body_text: &str,
		cache: &EntityCache,
	) -> Result<Value, Error> {
		validate::validate_path_segment("owner", &scope.owner)?;
		validate::validate_path_segment("repo", &scope.repo)?;
		validate::validate_sha(commit_sha)?;
		validate::validate_title(body_text)?;
		let body = json!({ "commit_id": commit_sha, "body": body_text });
		self.mutate(
			Action::InlineCommentCreate,
			credential,
			Method::POST,
			scope,
			resource,
			Some(number),
			path,
			body,
			cache,
		)
		.await
	}

	fn observe_rate_limit(&self, headers: &reqwest::header::HeaderMap) {
		let get = |name: &str| headers.get(name).and_then(|v| v.to_str().ok()).unwrap_or("").to_string();
		let remaining = get("x-ratelimit-remaining");
		let limit = get("x-ratelimit-limit");
		let reset = get("x-ratelimit-reset");
		if !remaining.is_empty() && !limit.is_empty() && !reset.is_empty() {
			self.tracker.observe_headers(&remaining, &limit, &reset);
		}
	}

	/// Extracts the Retry-After delay a prior failed attempt carried, for
	/// [`with_retry`] to honor (spec §4.C, §8 boundary "Retry-After greater
	/// than 5 s disables retry for that attempt" is enforced by
	/// `with_retry`'s total-wait budget, not here).
	fn retry_after_of(&self, err: &Error) -> Option<Duration> {
		if err.kind != ErrorKind::RateLimit {
			return None;
		}
		err.retry_after
	}

	/// Maps a non-2xx response to the workspace error taxonomy, appending a
	/// scope hint to a 403's message when the response indicates a missing
	/// OAuth scope rather than a rate limit (spec §4.C permission hinting).
	fn map_error_status(&self, status: StatusCode, headers: &reqwest::header::HeaderMap) -> Error {
		let retry_after = headers
			.get("retry-after")
			.and_then(|v| v.to_str().ok())
			.and_then(tandem_ratelimit::parse_retry_after);
		let secondary_rate_limit = retry_after.is_some()
			|| headers
				.get("x-ratelimit-remaining")
				.and_then(|v| v.to_str().ok())
				.and_then(|v| v.parse::<u32>().ok())
				.is_some_and(|v| v == 0);
		let status_code = status.as_u16();
		if status_code == 403 && !secondary_rate_limit {
			if let Some(scopes) = headers.get("x-accepted-oauth-scopes").and_then(|v| v.to_str().ok()) {
				return Error::from_status(status_code, false, format!("missing required scope(s): {scopes}"));
			}
		}
		Error::from_status(status_code, secondary_rate_limit, status.canonical_reason().unwrap_or("upstream error"))
			.with_retry_after(retry_after)
	}
}

/// The static method name telemetry reports, rather than re-deriving it
/// from `reqwest::Method` at every call site.
fn method_name(method: &Method) -> &'static str {
	if *method == Method::GET {
		"GET"
	} else if *method == Method::POST {
		"POST"
	} else if *method == Method::PATCH {
		"PATCH"
	} else if *method == Method::PUT {
		"PUT"
	} else if *method == Method::DELETE {
		"DELETE"
	} else {
		"OTHER"
	}
}

/// Truncates an overlong patch at a line boundary and detects binary-file
/// markers (spec §8 boundary behavior).
fn shape_patch(path: &str, added: u32, removed: u32, status: &str, raw: &str) -> FileEntry {
	if raw.contains(BINARY_MARKER) {
		return FileEntry {
			path: path.to_string(),
			added,
			removed,
			status: status.to_string(),
			patch: None,
			truncated: false,
			binary: true,
		};
	}
	if raw.len() <= PATCH_TRUNCATE_BYTES {
		return FileEntry {
			path: path.to_string(),
			added,
			removed,
			status: status.to_string(),
			patch: Some(raw.to_string()),
			truncated: false,
			binary: false,
		};
	}
	let mut cut = PATCH_TRUNCATE_BYTES;
	while cut > 0 && !raw.is_char_boundary(cut) {
		cut -= 1;
	}
	let boundary = raw[..cut].rfind('\n').map(|i| i + 1).unwrap_or(cut);
	let mut truncated = raw[..boundary].to_string();
	truncated.push_str(TRUNCATION_SENTINEL);
	FileEntry {
		path: path.to_string(),
		added,
		removed,
		status: status.to_string(),
		patch: Some(truncated),
		truncated: true,
		binary: false,
	}
}

/// Parses the `rel="next"` URL out of a standard Link header.
fn parse_next_link(header: &str) -> Option<String> {
	header.split(',').find_map(|part| {
		let part = part.trim();
		if !part.contains("rel=\"next\"") {
			return None;
		}
		let start = part.find('<')? + 1;
		let end = part.find('>')?;
		Some(part[start..end].to_string())
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use tandem_core::ErrorKind;

	fn client() -> UpstreamClient {
		UpstreamClient::new(RateLimitTracker::new()).unwrap()
	}

	fn credential() -> Credential {
		Credential { token: "t".into() }
	}

	#[tokio::test]
	async fn create_rejects_invalid_owner_before_any_http_call() {
		let scope = Scope::new("../etc", "orch");
		let cache = EntityCache::new(Duration::from_secs(30));
		let err = client()
			.create(&credential(), &scope, "issues", "/repos/x/y/issues", "title", "body", &cache)
			.await
			.unwrap_err();
		assert_eq!(err.kind, ErrorKind::Validation);
	}

	#[tokio::test]
	async fn merge_rejects_malformed_sha_before_any_http_call() {
		let scope = Scope::new("acme", "orch");
		let cache = EntityCache::new(Duration::from_secs(30));
		let err = client()
			.merge(&credential(), &scope, "pulls", 1, "/repos/acme/orch/pulls/1/merge", "not-a-sha", &cache)
			.await
			.unwrap_err();
		assert_eq!(err.kind, ErrorKind::Validation);
	}

	#[tokio::test]
	async fn create_label_rejects_invalid_color_before_any_http_call() {
		let scope = Scope::new("acme", "orch");
		let cache = EntityCache::new(Duration::from_secs(30));
		let err = client()
			.create_label(&credential(), &scope, "/repos/acme/orch/labels", "bug", "notacolor", &cache)
			.await
			.unwrap_err();
		assert_eq!(err.kind, ErrorKind::Validation);
	}

	#[test]
	fn shapes_small_patch_unmodified() {
		let entry = shape_patch("a.rs", 1, 0, "modified", "+ fn main() {}\n");
		assert!(!entry.truncated);
		assert!(!entry.binary);
		assert_eq!(entry.patch.unwrap(), "+ fn main() {}\n");
	}

	#[test]
	fn truncates_overlong_patch_at_line_boundary() {
		let line = "+ x\n".repeat(1 + (PATCH_TRUNCATE_BYTES / 4));
		let entry = shape_patch("big.rs", 9999, 0, "added", &line);
		assert!(entry.truncated);
		let patch = entry.patch.unwrap();
		assert!(patch.ends_with(TRUNCATION_SENTINEL));
		assert!(patch.len() <= PATCH_TRUNCATE_BYTES + TRUNCATION_SENTINEL.len());
	}

	#[test]
	fn detects_binary_marker_with_no_patch_text() {
		let entry = shape_patch("img.png", 0, 0, "modified", "Binary files a/img.png and b/img.png differ\n");
		assert!(entry.binary);
		assert!(entry.patch.is_none());
	}

	#[test]
	fn parses_next_link_header() {
		let header = r#"<https://api.github.com/repos/a/b/pulls?page=2>; rel="next", <https://api.github.com/repos/a/b/pulls?page=5>; rel="last""#;
		assert_eq!(parse_next_link(header), Some("https://api.github.com/repos/a/b/pulls?page=2".to_string()));
	}

	#[test]
	fn parses_next_link_returns_none_without_next_rel() {
		let header = r#"<https://api.github.com/repos/a/b/pulls?page=5>; rel="last""#;
		assert_eq!(parse_next_link(header), None);
	}
}
