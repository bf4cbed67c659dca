//! Browser sessions over the WebDriver wire protocol
//!
//! Only the handful of commands a run needs are implemented: create a
//! session, navigate, look up an element by CSS selector, read its text and
//! delete the session. Both W3C and legacy JSON wire envelopes are accepted
//! since Selenium 3 hubs answer in either depending on the driver.

use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::error::{RunError, RunResult};

/// W3C element reference key
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

/// Where and how to open a browser session
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub browser_name: String,
    pub hostname: String,
    pub port: u16,
    pub path: String,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            browser_name: "chrome".to_string(),
            hostname: "localhost".to_string(),
            port: 4444,
            path: "/wd/hub".to_string(),
        }
    }
}

impl SessionOptions {
    pub fn hub_url(&self) -> String {
        format!(
            "http://{}:{}/{}",
            self.hostname,
            self.port,
            self.path.trim_matches('/')
        )
    }
}

/// Opens browser sessions against an automation server.
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn open(&self, options: &SessionOptions) -> RunResult<Box<dyn BrowserSession>>;
}

/// A live browser session.
#[async_trait]
pub trait BrowserSession: Send + Sync {
    async fn navigate(&self, url: &str) -> RunResult<()>;

    /// `textContent` of the first element matching `selector`, or `None` when
    /// nothing matches yet.
    async fn text_content(&self, selector: &str) -> RunResult<Option<String>>;

    /// Rendered text of the first element matching `selector`.
    async fn text(&self, selector: &str) -> RunResult<String>;

    async fn close(&self) -> RunResult<()>;
}

/// Launcher for sessions on a Selenium hub
#[derive(Clone, Default)]
pub struct WebDriverLauncher {
    http: reqwest::Client,
}

impl WebDriverLauncher {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BrowserLauncher for WebDriverLauncher {
    async fn open(&self, options: &SessionOptions) -> RunResult<Box<dyn BrowserSession>> {
        let hub = options.hub_url();
        let body = json!({
            "capabilities": { "alwaysMatch": { "browserName": options.browser_name } },
            "desiredCapabilities": { "browserName": options.browser_name },
        });

        let url = format!("{}/session", hub);
        let response = send(&self.http, Method::POST, &url, Some(body), "new session").await?;
        let session_id = response
            .session_id()
            .ok_or_else(|| RunError::Session("Hub response did not contain a session id".to_string()))?;

        debug!("Opened {} session {}", options.browser_name, session_id);
        Ok(Box::new(WebDriverSession {
            http: self.http.clone(),
            base: format!("{}/session/{}", hub, session_id),
        }))
    }
}

/// A session created by [`WebDriverLauncher`]
pub struct WebDriverSession {
    http: reqwest::Client,
    base: String,
}

impl WebDriverSession {
    async fn command(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        name: &str,
    ) -> RunResult<WireResponse> {
        send(&self.http, method, &format!("{}{}", self.base, path), body, name).await
    }

    async fn find_element(&self, selector: &str) -> RunResult<Option<String>> {
        let body = json!({ "using": "css selector", "value": selector });
        match self.command(Method::POST, "/element", Some(body), "find element").await {
            Ok(response) => Ok(element_id(&response.value)),
            Err(e) if is_missing_element(&e) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl BrowserSession for WebDriverSession {
    async fn navigate(&self, url: &str) -> RunResult<()> {
        self.command(Method::POST, "/url", Some(json!({ "url": url })), "navigate")
            .await?;
        Ok(())
    }

    async fn text_content(&self, selector: &str) -> RunResult<Option<String>> {
        let Some(element) = self.find_element(selector).await? else {
            return Ok(None);
        };

        let path = format!("/element/{}/attribute/textContent", element);
        match self.command(Method::GET, &path, None, "get attribute").await {
            Ok(response) => Ok(Some(response.value.as_str().unwrap_or_default().to_string())),
            // The page re-rendered between lookup and read; the next poll retries.
            Err(e) if is_missing_element(&e) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn text(&self, selector: &str) -> RunResult<String> {
        let element = self.find_element(selector).await?.ok_or_else(|| RunError::WebDriver {
            command: "find element".to_string(),
            error: "no such element".to_string(),
            message: format!("No element matches {}", selector),
        })?;

        let response = self
            .command(Method::GET, &format!("/element/{}/text", element), None, "get text")
            .await?;
        Ok(response.value.as_str().unwrap_or_default().to_string())
    }

    async fn close(&self) -> RunResult<()> {
        self.command(Method::DELETE, "", None, "delete session").await?;
        Ok(())
    }
}

/// Response envelope shared by the W3C and legacy protocols
#[derive(Debug, Deserialize)]
pub struct WireResponse {
    #[serde(default)]
    pub value: Value,

    #[serde(rename = "sessionId", default)]
    pub legacy_session_id: Option<String>,

    #[serde(default)]
    pub status: Option<i64>,
}

impl WireResponse {
    fn session_id(&self) -> Option<String> {
        self.value
            .get("sessionId")
            .and_then(Value::as_str)
            .map(String::from)
            .or_else(|| self.legacy_session_id.clone())
    }
}

async fn send(
    http: &reqwest::Client,
    method: Method,
    url: &str,
    body: Option<Value>,
    name: &str,
) -> RunResult<WireResponse> {
    debug!("WebDriver {} {} ({})", method, url, name);
    let mut request = http.request(method, url);
    if let Some(body) = body {
        request = request.json(&body);
    }

    let response = request
        .send()
        .await
        .map_err(|e| RunError::Session(format!("{} failed: {}", name, e)))?;
    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| RunError::Session(format!("{} failed: {}", name, e)))?;

    parse_response(name, status.is_success(), &text)
}

/// Decode a wire response, turning protocol-level errors into `RunError`s.
pub fn parse_response(command: &str, http_ok: bool, body: &str) -> RunResult<WireResponse> {
    let response: WireResponse = match serde_json::from_str(body) {
        Ok(response) => response,
        Err(_) if http_ok && body.trim().is_empty() => WireResponse {
            value: Value::Null,
            legacy_session_id: None,
            status: None,
        },
        Err(e) => {
            return Err(RunError::Session(format!(
                "{} returned an unreadable response: {}",
                command, e
            )))
        }
    };

    let message = response
        .value
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    if let Some(error) = response.value.get("error").and_then(Value::as_str) {
        return Err(RunError::WebDriver {
            command: command.to_string(),
            error: error.to_string(),
            message,
        });
    }

    if let Some(status) = response.status.filter(|s| *s != 0) {
        return Err(RunError::WebDriver {
            command: command.to_string(),
            error: legacy_error_name(status).to_string(),
            message,
        });
    }

    if !http_ok {
        return Err(RunError::WebDriver {
            command: command.to_string(),
            error: "unknown error".to_string(),
            message,
        });
    }

    Ok(response)
}

fn legacy_error_name(status: i64) -> &'static str {
    match status {
        6 => "invalid session id",
        7 => "no such element",
        10 => "stale element reference",
        21 => "timeout",
        _ => "unknown error",
    }
}

fn element_id(value: &Value) -> Option<String> {
    value
        .get(ELEMENT_KEY)
        .or_else(|| value.get("ELEMENT"))
        .and_then(Value::as_str)
        .map(String::from)
}

fn is_missing_element(err: &RunError) -> bool {
    matches!(
        err,
        RunError::WebDriver { error, .. }
            if error == "no such element" || error == "stale element reference"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hub_url() {
        assert_eq!(SessionOptions::default().hub_url(), "http://localhost:4444/wd/hub");
    }

    #[test]
    fn test_w3c_session_id() {
        let body = r#"{"value": {"sessionId": "abc123", "capabilities": {"browserName": "chrome"}}}"#;
        let response = parse_response("new session", true, body).unwrap();
        assert_eq!(response.session_id().as_deref(), Some("abc123"));
    }

    #[test]
    fn test_legacy_session_id() {
        let body = r#"{"sessionId": "legacy-1", "status": 0, "value": {"browserName": "chrome"}}"#;
        let response = parse_response("new session", true, body).unwrap();
        assert_eq!(response.session_id().as_deref(), Some("legacy-1"));
    }

    #[test]
    fn test_w3c_error_is_reported() {
        let body = r#"{"value": {"error": "no such element", "message": "Unable to locate element"}}"#;
        let err = parse_response("find element", false, body).unwrap_err();
        assert!(is_missing_element(&err));
        assert!(err.to_string().contains("Unable to locate element"));
    }

    #[test]
    fn test_legacy_status_error() {
        let body = r#"{"sessionId": "s", "status": 7, "value": {"message": "no element"}}"#;
        let err = parse_response("find element", true, body).unwrap_err();
        assert!(is_missing_element(&err));
    }

    #[test]
    fn test_http_failure_without_error_field() {
        let err = parse_response("navigate", false, r#"{"value": null}"#).unwrap_err();
        assert!(matches!(err, RunError::WebDriver { .. }));
        assert!(!is_missing_element(&err));
    }

    #[test]
    fn test_empty_success_body() {
        let response = parse_response("delete session", true, "").unwrap();
        assert!(response.value.is_null());
    }

    #[test]
    fn test_element_id_both_protocols() {
        let w3c = json!({ "element-6066-11e4-a52e-4f735466cecf": "e1" });
        let legacy = json!({ "ELEMENT": "e2" });
        assert_eq!(element_id(&w3c).as_deref(), Some("e1"));
        assert_eq!(element_id(&legacy).as_deref(), Some("e2"));
        assert_eq!(element_id(&json!({})), None);
    }
}
