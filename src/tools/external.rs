//! Generic HTTP-backed tool.
//!
//! Every third-party integration is the same [`ExternalTool`] driven by a
//! different [`ExternalToolSpec`]: where to send the request, how to
//! authenticate, how tool parameters map onto the request, and which part of
//! the response to hand back.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, Url};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Map, Value};

use crate::tools::tool::{Tool, ToolError, ToolOutput};

/// Maximum response body size (5 MB).
const MAX_RESPONSE_SIZE: usize = 5 * 1024 * 1024;

/// Characters of an error body quoted back in `ExternalService` errors.
const ERROR_BODY_PREVIEW: usize = 200;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Extra parameter check run before the request is built.
pub type ParamValidator = fn(&Map<String, Value>) -> Result<(), ToolError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

/// How the credential is attached to the request.
#[derive(Debug)]
pub enum Auth {
    None,
    /// Credential sent as a query parameter (`?apiKey=...`).
    QueryParam { name: String, key: SecretString },
    /// `Authorization: Bearer <key>`.
    Bearer(SecretString),
    /// Credential sent in a custom header.
    Header { name: String, key: SecretString },
}

/// How tool parameters become the request.
#[derive(Debug, Clone)]
pub enum ParamStyle {
    /// Each parameter becomes a query pair. `renames` maps tool parameter
    /// names onto the API's names; unlisted parameters keep their name.
    Query { renames: Vec<(String, String)> },
    /// The parameter object is the JSON body.
    JsonBody,
    /// `{"tool": <name>, "params": {...}}` posted to a relay endpoint.
    RelayEnvelope,
}

impl ParamStyle {
    pub fn query() -> Self {
        ParamStyle::Query {
            renames: Vec::new(),
        }
    }

    pub fn query_renamed(renames: &[(&str, &str)]) -> Self {
        ParamStyle::Query {
            renames: renames
                .iter()
                .map(|(from, to)| (from.to_string(), to.to_string()))
                .collect(),
        }
    }
}

/// Which part of a JSON response is returned to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseMapper {
    Raw,
    /// RFC 6901 pointer into the response, e.g. `/articles`.
    Pointer(String),
}

/// Declarative description of one HTTP integration.
#[derive(Debug)]
pub struct ExternalToolSpec {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
    pub method: HttpMethod,
    pub endpoint: String,
    /// Parameters appended to the endpoint path, in order.
    pub path_params: Vec<String>,
    pub auth: Auth,
    pub static_query: Vec<(String, String)>,
    pub params: ParamStyle,
    pub response: ResponseMapper,
    pub timeout: Duration,
    pub validator: Option<ParamValidator>,
}

impl ExternalToolSpec {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        method: HttpMethod,
        endpoint: impl Into<String>,
    ) -> Self {
        let params = match method {
            HttpMethod::Get => ParamStyle::query(),
            HttpMethod::Post => ParamStyle::JsonBody,
        };
        Self {
            name: name.into(),
            description: description.into(),
            input_schema: serde_json::json!({"type": "object", "properties": {}}),
            method,
            endpoint: endpoint.into(),
            path_params: Vec::new(),
            auth: Auth::None,
            static_query: Vec::new(),
            params,
            response: ResponseMapper::Raw,
            timeout: DEFAULT_TIMEOUT,
            validator: None,
        }
    }

    pub fn get(
        name: impl Into<String>,
        description: impl Into<String>,
        endpoint: impl Into<String>,
    ) -> Self {
        Self::new(name, description, HttpMethod::Get, endpoint)
    }

    pub fn post(
        name: impl Into<String>,
        description: impl Into<String>,
        endpoint: impl Into<String>,
    ) -> Self {
        Self::new(name, description, HttpMethod::Post, endpoint)
    }

    pub fn with_schema(mut self, schema: Value) -> Self {
        self.input_schema = schema;
        self
    }

    pub fn with_auth(mut self, auth: Auth) -> Self {
        self.auth = auth;
        self
    }

    pub fn with_path_param(mut self, name: impl Into<String>) -> Self {
        self.path_params.push(name.into());
        self
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.static_query.push((key.into(), value.into()));
        self
    }

    pub fn with_params(mut self, style: ParamStyle) -> Self {
        self.params = style;
        self
    }

    pub fn with_response(mut self, mapper: ResponseMapper) -> Self {
        self.response = mapper;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_validator(mut self, validator: ParamValidator) -> Self {
        self.validator = Some(validator);
        self
    }
}

/// A prepared request: final URL (without credentials) and optional body.
#[derive(Debug, PartialEq)]
struct RequestPlan {
    url: Url,
    body: Option<Value>,
}

/// [`Tool`] implementation shared by every catalog integration.
pub struct ExternalTool {
    spec: ExternalToolSpec,
    client: Client,
}

impl ExternalTool {
    pub fn new(spec: ExternalToolSpec, client: Client) -> Self {
        Self { spec, client }
    }

    pub fn spec(&self) -> &ExternalToolSpec {
        &self.spec
    }

    fn plan(&self, params: &Value) -> Result<RequestPlan, ToolError> {
        let mut remaining = match params {
            Value::Object(map) => map.clone(),
            Value::Null => Map::new(),
            _ => {
                return Err(ToolError::InvalidParameters(
                    "parameters must be a JSON object".to_string(),
                ));
            }
        };

        if let Some(required) = self.spec.input_schema.get("required").and_then(|r| r.as_array()) {
            for key in required.iter().filter_map(|k| k.as_str()) {
                if remaining.get(key).is_none_or(Value::is_null) {
                    return Err(ToolError::InvalidParameters(format!(
                        "missing '{}' parameter",
                        key
                    )));
                }
            }
        }

        if let Some(validate) = self.spec.validator {
            validate(&remaining)?;
        }

        let mut url = Url::parse(&self.spec.endpoint).map_err(|e| {
            ToolError::ExecutionFailed(format!("invalid endpoint '{}': {}", self.spec.endpoint, e))
        })?;

        if !self.spec.path_params.is_empty() {
            let mut segments = Vec::with_capacity(self.spec.path_params.len());
            for key in &self.spec.path_params {
                let value = remaining.remove(key).ok_or_else(|| {
                    ToolError::InvalidParameters(format!("missing '{}' parameter", key))
                })?;
                segments.push(scalar_to_string(&value));
            }
            let mut path = url.path_segments_mut().map_err(|_| {
                ToolError::ExecutionFailed(format!(
                    "endpoint '{}' cannot take path parameters",
                    self.spec.endpoint
                ))
            })?;
            path.pop_if_empty();
            for segment in &segments {
                path.push(segment);
            }
        }

        if !self.spec.static_query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (k, v) in &self.spec.static_query {
                pairs.append_pair(k, v);
            }
        }

        let body = match &self.spec.params {
            ParamStyle::Query { renames } => {
                if !remaining.is_empty() {
                    let mut pairs = url.query_pairs_mut();
                    for (key, value) in &remaining {
                        if value.is_null() {
                            continue;
                        }
                        let api_key = renames
                            .iter()
                            .find(|(from, _)| from == key)
                            .map(|(_, to)| to.as_str())
                            .unwrap_or(key);
                        pairs.append_pair(api_key, &scalar_to_string(value));
                    }
                }
                None
            }
            ParamStyle::JsonBody => Some(Value::Object(remaining)),
            ParamStyle::RelayEnvelope => Some(serde_json::json!({
                "tool": self.spec.name,
                "params": Value::Object(remaining),
            })),
        };

        Ok(RequestPlan { url, body })
    }

    fn map_response(&self, body: &[u8]) -> Result<Value, ToolError> {
        let parsed: Value = match serde_json::from_slice(body) {
            Ok(v) => v,
            // Plain-text APIs are returned verbatim.
            Err(_) => return Ok(Value::String(String::from_utf8_lossy(body).into_owned())),
        };
        match &self.spec.response {
            ResponseMapper::Raw => Ok(parsed),
            ResponseMapper::Pointer(pointer) => parsed.pointer(pointer).cloned().ok_or_else(|| {
                ToolError::ExternalService(format!(
                    "{} response has no field at '{}'",
                    self.spec.name, pointer
                ))
            }),
        }
    }
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(scalar_to_string)
            .collect::<Vec<_>>()
            .join(","),
        other => other.to_string(),
    }
}

async fn read_capped(response: reqwest::Response) -> Result<Vec<u8>, ToolError> {
    if let Some(len) = response.content_length()
        && len as usize > MAX_RESPONSE_SIZE
    {
        tracing::warn!(
            content_length = len,
            max = MAX_RESPONSE_SIZE,
            "Rejected HTTP response: Content-Length exceeds limit"
        );
        return Err(ToolError::ExecutionFailed(format!(
            "Response Content-Length ({} bytes) exceeds maximum allowed size ({} bytes)",
            len, MAX_RESPONSE_SIZE
        )));
    }

    let mut body = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = StreamExt::next(&mut stream).await {
        let chunk = chunk.map_err(|e| {
            ToolError::ExternalService(format!("failed to read response body: {}", e))
        })?;
        if body.len() + chunk.len() > MAX_RESPONSE_SIZE {
            return Err(ToolError::ExecutionFailed(format!(
                "Response body exceeds maximum allowed size ({} bytes)",
                MAX_RESPONSE_SIZE
            )));
        }
        body.extend_from_slice(&chunk);
    }
    Ok(body)
}

#[async_trait]
impl Tool for ExternalTool {
    fn name(&self) -> &str {
        &self.spec.name
    }

    fn description(&self) -> &str {
        &self.spec.description
    }

    fn parameters_schema(&self) -> Value {
        self.spec.input_schema.clone()
    }

    async fn execute(&self, params: Value) -> Result<ToolOutput, ToolError> {
        let start = Instant::now();
        let RequestPlan { mut url, body } = self.plan(&params)?;

        tracing::debug!(
            tool_name = %self.spec.name,
            host = url.host_str().unwrap_or_default(),
            path = url.path(),
            "Calling external API"
        );

        if let Auth::QueryParam { name, key } = &self.spec.auth {
            url.query_pairs_mut().append_pair(name, key.expose_secret());
        }

        let mut request = match self.spec.method {
            HttpMethod::Get => self.client.get(url),
            HttpMethod::Post => self.client.post(url),
        };
        request = request.timeout(self.spec.timeout);
        match &self.spec.auth {
            Auth::Bearer(key) => request = request.bearer_auth(key.expose_secret()),
            Auth::Header { name, key } => {
                request = request.header(name.as_str(), key.expose_secret())
            }
            Auth::None | Auth::QueryParam { .. } => {}
        }
        if let Some(body) = &body {
            request = request.json(body);
        }

        let timeout = self.spec.timeout;
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ToolError::Timeout(timeout)
            } else {
                // Strip the URL so query-string credentials never surface.
                ToolError::ExternalService(e.without_url().to_string())
            }
        })?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .map(Duration::from_secs);
            return Err(ToolError::RateLimited(retry_after));
        }

        let bytes = read_capped(response).await?;
        if !status.is_success() {
            let preview: String = String::from_utf8_lossy(&bytes)
                .chars()
                .take(ERROR_BODY_PREVIEW)
                .collect();
            tracing::warn!(
                tool_name = %self.spec.name,
                status = status.as_u16(),
                "External API returned an error status"
            );
            return Err(ToolError::ExternalService(format!(
                "{} returned HTTP {}: {}",
                self.spec.name,
                status.as_u16(),
                preview
            )));
        }

        let result = self.map_response(&bytes)?;
        let mut output = ToolOutput::success(result, start.elapsed());
        if matches!(self.spec.response, ResponseMapper::Pointer(_)) {
            output = output.with_raw(String::from_utf8_lossy(&bytes).into_owned());
        }
        Ok(output)
    }
}
