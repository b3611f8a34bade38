//! Scripted stand-ins for the browser and the mailbox.

use anyhow::{Result, anyhow};
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet, VecDeque};
use std::io::Read;
use std::rc::Rc;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tiny_http::{Header, Response, Server};

use crate::config::{Config, Locator, Role, SelectorConfig};
use crate::domain::email::{MessageBody, MessageId, MessageSummary};
use crate::mail::MailService;
use crate::ui::{ElementHandle, Lookup, SessionFactory, Snapshot, UiSurface};

// ── Mailbox ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub enum MailboxReply {
    Empty,
    Messages(Vec<MessageSummary>),
    Fail(String),
}

impl MailboxReply {
    pub fn message(id: &str, snippet: &str) -> Self {
        MailboxReply::Messages(vec![MessageSummary {
            id: MessageId(id.to_string()),
            snippet: snippet.to_string(),
        }])
    }
}

/// Answers `list_unread` from a script; once the script runs out every
/// query comes back empty.
#[derive(Default)]
pub struct FakeMailbox {
    replies: RefCell<VecDeque<MailboxReply>>,
    bodies: HashMap<String, String>,
    list_calls: Cell<usize>,
    recipients: RefCell<Vec<String>>,
    consumed: RefCell<Vec<String>>,
    fail_mark: bool,
}

impl FakeMailbox {
    pub fn new(replies: Vec<MailboxReply>) -> Self {
        Self {
            replies: RefCell::new(replies.into()),
            ..Self::default()
        }
    }

    pub fn with_body(mut self, id: &str, body: &str) -> Self {
        self.bodies.insert(id.to_string(), body.to_string());
        self
    }

    pub fn failing_mark_consumed(mut self) -> Self {
        self.fail_mark = true;
        self
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.get()
    }

    pub fn recipients(&self) -> Vec<String> {
        self.recipients.borrow().clone()
    }

    pub fn consumed(&self) -> Vec<String> {
        self.consumed.borrow().clone()
    }
}

impl MailService for FakeMailbox {
    fn list_unread(&self, recipient: &str) -> Result<Vec<MessageSummary>> {
        self.list_calls.set(self.list_calls.get() + 1);
        self.recipients.borrow_mut().push(recipient.to_string());
        match self.replies.borrow_mut().pop_front() {
            None | Some(MailboxReply::Empty) => Ok(vec![]),
            Some(MailboxReply::Messages(m)) => Ok(m),
            Some(MailboxReply::Fail(e)) => Err(anyhow!(e)),
        }
    }

    fn get_message(&self, id: &MessageId) -> Result<MessageBody> {
        let body = self.bodies.get(&id.0).cloned().unwrap_or_default();
        Ok(MessageBody {
            id: id.clone(),
            body,
        })
    }

    fn mark_consumed(&self, id: &MessageId) -> Result<()> {
        if self.fail_mark {
            return Err(anyhow!("403 insufficient scope"));
        }
        let mut consumed = self.consumed.borrow_mut();
        if !consumed.contains(&id.0) {
            consumed.push(id.0.clone());
        }
        Ok(())
    }
}

// ── Browser ────────────────────────────────────────────────────────────────

#[derive(Default)]
struct FakeUiState {
    present: HashSet<Locator>,
    texts: HashMap<Locator, String>,
    attributes: HashMap<(Locator, String), String>,
    handles: HashMap<String, Locator>,
    page_before: String,
    page_after: String,
    toggle: Option<Locator>,
    toggled: bool,
    navigations: Vec<String>,
    clicks: Vec<Locator>,
    typed: Vec<(Locator, String)>,
    snapshots: usize,
    opened: usize,
    close_calls: usize,
}

/// In-memory page. Clones share state, so a test can keep one clone as a
/// probe while the workflow owns another.
#[derive(Clone, Default)]
pub struct FakeUi {
    state: Rc<RefCell<FakeUiState>>,
}

impl FakeUi {
    pub fn new() -> Self {
        Self::default()
    }

    /// A site where every step of the login and pricing flow works and the
    /// signed-in identity is `account`.
    pub fn happy_path(selectors: &SelectorConfig, account: &str) -> Self {
        let ui = Self::new();
        for role in [
            Role::EmailInput,
            Role::ContinueButton,
            Role::CodeInput,
            Role::LoginButton,
            Role::AuthenticatedMarker,
            Role::PricingEntry,
            Role::TierContainer,
        ] {
            ui.add(selectors.locator(role));
        }
        ui.with_identity(selectors, account)
            .with_toggle(selectors.locator(Role::CycleToggle))
    }

    fn add(&self, locator: Locator) {
        self.state.borrow_mut().present.insert(locator);
    }

    pub fn without(self, locator: &Locator) -> Self {
        self.state.borrow_mut().present.remove(locator);
        self
    }

    pub fn with_identity(self, selectors: &SelectorConfig, account: &str) -> Self {
        let probe = selectors.locator(Role::IdentityProbe);
        self.add(probe.clone());
        self.state.borrow_mut().attributes.insert(
            (probe.clone(), "data-account-email".to_string()),
            account.to_string(),
        );
        self.state
            .borrow_mut()
            .texts
            .insert(probe, format!(" {account} "));
        self
    }

    pub fn with_toggle(self, locator: Locator) -> Self {
        self.add(locator.clone());
        self.state.borrow_mut().toggle = Some(locator);
        self
    }

    /// Page source before and after the cycle toggle is clicked.
    pub fn with_pages(self, before: impl Into<String>, after: impl Into<String>) -> Self {
        {
            let mut st = self.state.borrow_mut();
            st.page_before = before.into();
            st.page_after = after.into();
        }
        self
    }

    pub fn navigations(&self) -> Vec<String> {
        self.state.borrow().navigations.clone()
    }

    pub fn clicks(&self) -> Vec<Locator> {
        self.state.borrow().clicks.clone()
    }

    pub fn typed(&self) -> Vec<(Locator, String)> {
        self.state.borrow().typed.clone()
    }

    pub fn snapshots(&self) -> usize {
        self.state.borrow().snapshots
    }

    pub fn opened(&self) -> usize {
        self.state.borrow().opened
    }

    pub fn close_calls(&self) -> usize {
        self.state.borrow().close_calls
    }

    fn locator_of(&self, el: &ElementHandle) -> Result<Locator> {
        self.state
            .borrow()
            .handles
            .get(&el.0)
            .cloned()
            .ok_or_else(|| anyhow!("stale element reference {}", el.0))
    }
}

impl UiSurface for FakeUi {
    fn navigate(&mut self, url: &str) -> Result<()> {
        self.state.borrow_mut().navigations.push(url.to_string());
        Ok(())
    }

    fn find(
        &mut self,
        locator: &Locator,
        _within: Option<&ElementHandle>,
    ) -> Result<Lookup<ElementHandle>> {
        let mut st = self.state.borrow_mut();
        if !st.present.contains(locator) {
            return Ok(Lookup::NotFound);
        }
        let id = locator.to_string();
        st.handles.insert(id.clone(), locator.clone());
        Ok(Lookup::Found(ElementHandle(id)))
    }

    fn wait_for(&mut self, locator: &Locator, _timeout: Duration) -> Result<Lookup<ElementHandle>> {
        match self.find(locator, None)? {
            Lookup::Found(el) => Ok(Lookup::Found(el)),
            _ => Ok(Lookup::TimedOut),
        }
    }

    fn click(&mut self, element: &ElementHandle) -> Result<()> {
        let locator = self.locator_of(element)?;
        let mut st = self.state.borrow_mut();
        if st.toggle.as_ref() == Some(&locator) {
            st.toggled = true;
        }
        st.clicks.push(locator);
        Ok(())
    }

    fn type_text(&mut self, element: &ElementHandle, text: &str) -> Result<()> {
        let locator = self.locator_of(element)?;
        self.state
            .borrow_mut()
            .typed
            .push((locator, text.to_string()));
        Ok(())
    }

    fn read_attribute(&mut self, element: &ElementHandle, name: &str) -> Result<Option<String>> {
        let locator = self.locator_of(element)?;
        Ok(self
            .state
            .borrow()
            .attributes
            .get(&(locator, name.to_string()))
            .cloned())
    }

    fn read_text(&mut self, element: &ElementHandle) -> Result<String> {
        let locator = self.locator_of(element)?;
        Ok(self
            .state
            .borrow()
            .texts
            .get(&locator)
            .cloned()
            .unwrap_or_default())
    }

    fn current_snapshot(&mut self) -> Result<Snapshot> {
        let mut st = self.state.borrow_mut();
        st.snapshots += 1;
        let html = if st.toggled {
            st.page_after.clone()
        } else {
            st.page_before.clone()
        };
        Ok(Snapshot::new(html))
    }

    fn close(&mut self) -> Result<()> {
        self.state.borrow_mut().close_calls += 1;
        Ok(())
    }
}

impl SessionFactory for FakeUi {
    type Surface = FakeUi;

    fn open(&self) -> Result<FakeUi> {
        self.state.borrow_mut().opened += 1;
        Ok(self.clone())
    }
}

// ── HTTP ───────────────────────────────────────────────────────────────────

/// One request as seen by [`StubHttp`].
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    /// Path and query, e.g. `/messages?q=..`.
    pub url: String,
    pub body: String,
    pub authorization: Option<String>,
}

impl Recorded {
    pub fn query(&self, key: &str) -> Option<String> {
        url::Url::parse(&format!("http://stub{}", self.url))
            .ok()?
            .query_pairs()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.into_owned())
    }

    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).unwrap_or(serde_json::Value::Null)
    }
}

/// Loopback HTTP server answering every request through `handler`
/// (status, JSON body) and keeping a log of what it was sent.
pub struct StubHttp {
    server: Arc<Server>,
    log: Arc<Mutex<Vec<Recorded>>>,
    worker: Option<JoinHandle<()>>,
}

impl StubHttp {
    pub fn start<H>(handler: H) -> Self
    where
        H: Fn(&Recorded) -> (u16, String) + Send + 'static,
    {
        let server = Arc::new(Server::http("127.0.0.1:0").expect("bind loopback"));
        let log = Arc::new(Mutex::new(Vec::new()));
        let (srv, seen) = (Arc::clone(&server), Arc::clone(&log));
        let worker = thread::spawn(move || {
            while let Ok(mut req) = srv.recv() {
                let mut body = String::new();
                let _ = req.as_reader().read_to_string(&mut body);
                let rec = Recorded {
                    method: req.method().to_string(),
                    url: req.url().to_string(),
                    body,
                    authorization: req
                        .headers()
                        .iter()
                        .find(|h| h.field.equiv("Authorization"))
                        .map(|h| h.value.as_str().to_string()),
                };
                let (status, reply) = handler(&rec);
                seen.lock().unwrap().push(rec);
                let json = Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..])
                    .expect("static header");
                let _ = req.respond(
                    Response::from_string(reply)
                        .with_status_code(status)
                        .with_header(json),
                );
            }
        });
        Self {
            server,
            log,
            worker: Some(worker),
        }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.server.server_addr())
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.log.lock().unwrap().clone()
    }
}

impl Drop for StubHttp {
    fn drop(&mut self) {
        self.server.unblock();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

// ── Markup ─────────────────────────────────────────────────────────────────

pub fn tier_html(name: Option<&str>, price: Option<&str>) -> String {
    let mut out = String::from(r#"<div class="WebSubscriptionTierPlans_tierOption__w24oz">"#);
    if let Some(n) = name {
        out.push_str(&format!(
            r#"<div class="WebSubscriptionTierPlans_title___ChXj">{n}</div>"#
        ));
    }
    if let Some(p) = price {
        out.push_str(&format!(
            r#"<div class="WebSubscriptionTierPlans_tierPrice__TOXPR">{p}</div>"#
        ));
    }
    out.push_str("</div>");
    out
}

/// A full page whose paywall container holds `tiers`.
pub fn paywall_html(title: &str, features: &[&str], tiers: &[String]) -> String {
    let items: String = features
        .iter()
        .map(|f| format!(r#"<li class="WebSubscriptionPaywall_itemText__Kbotl">{f}</li>"#))
        .collect();
    format!(
        r#"<html><body><div class="WebSubscriptionPaywall_tierContainer__s_5Zw">
<div class="WebSubscriptionPaywall_title__hZ9zT">{title}</div>
<ul>{items}</ul>
{}
</div></body></html>"#,
        tiers.concat()
    )
}

/// Default configuration with every wait and sleep set to zero.
pub fn instant_config() -> Config {
    let mut cfg = Config::default();
    cfg.timeouts.element_secs = 0;
    cfg.timeouts.auth_secs = 0;
    cfg.timeouts.render_secs = 0;
    cfg.browser.poll_interval_ms = 0;
    cfg.mail.interval_secs = 0;
    cfg
}
