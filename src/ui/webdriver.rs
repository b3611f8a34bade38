//! W3C WebDriver client (chromedriver, geckodriver, safaridriver) over
//! blocking HTTP.

use anyhow::{Context, Result, anyhow, bail};
use log::{debug, info};
use reqwest::blocking::{Client, Response};
use serde_json::{Value, json};
use std::thread;
use std::time::{Duration, Instant};

use crate::config::{BrowserConfig, Locator};
use crate::ui::{ElementHandle, Lookup, SessionFactory, Snapshot, UiSurface};

/// Key under which W3C drivers return element references.
const ELEMENT_KEY: &str = "element-6066-11e4-a52f-4d7a5f10c6ac";

pub struct WebDriverFactory {
    config: BrowserConfig,
    http: Client,
}

impl WebDriverFactory {
    pub fn new(config: BrowserConfig) -> Self {
        Self {
            config,
            http: Client::new(),
        }
    }

    fn capabilities(&self) -> Value {
        let mut always = json!({ "browserName": self.config.browser_name });
        if self.config.headless {
            match self.config.browser_name.as_str() {
                "chrome" | "chromium" => {
                    always["goog:chromeOptions"] = json!({ "args": ["--headless=new", "--disable-gpu"] });
                }
                "firefox" => {
                    always["moz:firefoxOptions"] = json!({ "args": ["-headless"] });
                }
                // safaridriver has no headless mode
                _ => {}
            }
        }
        json!({ "capabilities": { "alwaysMatch": always } })
    }
}

impl SessionFactory for WebDriverFactory {
    type Surface = WebDriverSession;

    fn open(&self) -> Result<WebDriverSession> {
        let base = self.config.webdriver_url.trim_end_matches('/').to_string();
        let resp = self
            .http
            .post(format!("{base}/session"))
            .json(&self.capabilities())
            .send()
            .with_context(|| format!("WebDriver not reachable at {base}"))?;
        let value = unwrap_value(resp)?;
        let session_id = value
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow!("new session reply has no sessionId: {value}"))?
            .to_string();

        info!("started {} session {session_id}", self.config.browser_name);
        Ok(WebDriverSession {
            http: self.http.clone(),
            base: format!("{base}/session/{session_id}"),
            poll_interval: self.config.poll_interval(),
            closed: false,
        })
    }
}

pub struct WebDriverSession {
    http: Client,
    /// `<driver>/session/<id>`
    base: String,
    poll_interval: Duration,
    closed: bool,
}

/// Outcome of a WebDriver command that failed on the driver side.
#[derive(Debug)]
struct DriverReply {
    error: String,
    message: String,
}

fn strategy(locator: &Locator) -> Value {
    match locator {
        Locator::Css(s) => json!({ "using": "css selector", "value": s }),
        Locator::Xpath(s) => json!({ "using": "xpath", "value": s }),
    }
}

fn element_id(value: &Value) -> Option<ElementHandle> {
    value
        .get(ELEMENT_KEY)
        .and_then(Value::as_str)
        .map(|id| ElementHandle(id.to_string()))
}

fn split_reply(resp: Response) -> Result<std::result::Result<Value, DriverReply>> {
    let status = resp.status();
    let body: Value = resp.json().context("WebDriver reply is not JSON")?;
    let value = body.get("value").cloned().unwrap_or(Value::Null);
    if status.is_success() {
        return Ok(Ok(value));
    }
    let error = value
        .get("error")
        .and_then(Value::as_str)
        .unwrap_or("unknown error")
        .to_string();
    let message = value
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    Ok(Err(DriverReply { error, message }))
}

fn unwrap_value(resp: Response) -> Result<Value> {
    match split_reply(resp)? {
        Ok(v) => Ok(v),
        Err(r) => bail!("WebDriver {}: {}", r.error, r.message),
    }
}

impl WebDriverSession {
    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base, path)
    }

    fn post(&self, path: &str, body: Value) -> Result<Value> {
        unwrap_value(self.http.post(self.url(path)).json(&body).send()?)
    }

    fn get(&self, path: &str) -> Result<Value> {
        unwrap_value(self.http.get(self.url(path)).send()?)
    }
}

impl UiSurface for WebDriverSession {
    fn navigate(&mut self, url: &str) -> Result<()> {
        debug!("navigate {url}");
        self.post("url", json!({ "url": url }))?;
        Ok(())
    }

    fn find(
        &mut self,
        locator: &Locator,
        within: Option<&ElementHandle>,
    ) -> Result<Lookup<ElementHandle>> {
        let path = match within {
            Some(parent) => format!("element/{}/element", parent.0),
            None => "element".to_string(),
        };
        let resp = self
            .http
            .post(self.url(&path))
            .json(&strategy(locator))
            .send()?;
        match split_reply(resp)? {
            Ok(value) => element_id(&value)
                .map(Lookup::Found)
                .ok_or_else(|| anyhow!("find reply has no element reference: {value}")),
            Err(r) if r.error == "no such element" => Ok(Lookup::NotFound),
            Err(r) => bail!("WebDriver {}: {}", r.error, r.message),
        }
    }

    fn wait_for(&mut self, locator: &Locator, timeout: Duration) -> Result<Lookup<ElementHandle>> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Lookup::Found(el) = self.find(locator, None)? {
                return Ok(Lookup::Found(el));
            }
            if Instant::now() >= deadline {
                debug!("gave up on {locator} after {timeout:?}");
                return Ok(Lookup::TimedOut);
            }
            thread::sleep(self.poll_interval);
        }
    }

    fn click(&mut self, element: &ElementHandle) -> Result<()> {
        self.post(&format!("element/{}/click", element.0), json!({}))?;
        Ok(())
    }

    fn type_text(&mut self, element: &ElementHandle, text: &str) -> Result<()> {
        self.post(
            &format!("element/{}/value", element.0),
            json!({ "text": text }),
        )?;
        Ok(())
    }

    fn read_attribute(&mut self, element: &ElementHandle, name: &str) -> Result<Option<String>> {
        let v = self.get(&format!("element/{}/attribute/{name}", element.0))?;
        Ok(v.as_str().map(str::to_string))
    }

    fn read_text(&mut self, element: &ElementHandle) -> Result<String> {
        let v = self.get(&format!("element/{}/text", element.0))?;
        Ok(v.as_str().unwrap_or_default().to_string())
    }

    fn current_snapshot(&mut self) -> Result<Snapshot> {
        let v = self.get("source")?;
        let html = v
            .as_str()
            .ok_or_else(|| anyhow!("page source is not a string"))?;
        Ok(Snapshot::new(html))
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        unwrap_value(self.http.delete(&self.base).send()?)?;
        info!("browser session closed");
        Ok(())
    }
}
