use anyhow::{Result, anyhow, bail};
use log::{info, warn};
use oauth2::basic::BasicClient;
use oauth2::reqwest::http_client;
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, PkceCodeChallenge, RedirectUrl,
    RefreshToken, Scope, TokenResponse, TokenUrl,
};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::{Duration, Instant};
use tiny_http::{Response, Server};
use url::Url;

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const CALLBACK_WAIT: Duration = Duration::from_secs(120);

/// Result of a token exchange. Lives only as long as the run.
pub struct Grant {
    pub access_token: String,
    pub refresh_token: Option<String>,
}

/// Google OAuth client for one mailbox scope.
pub struct GoogleOAuth {
    client: BasicClient,
    redirect: Url,
    scope: String,
}

impl GoogleOAuth {
    pub fn new(
        client_id: &str,
        client_secret: Option<&str>,
        redirect_uri: &str,
        scope: &str,
    ) -> Result<Self> {
        let redirect = Url::parse(redirect_uri)
            .map_err(|e| anyhow!("Invalid redirect_uri '{redirect_uri}': {e}"))?;
        let client = BasicClient::new(
            ClientId::new(client_id.to_string()),
            client_secret.map(|s| ClientSecret::new(s.to_string())),
            AuthUrl::new(GOOGLE_AUTH_URL.to_string())?,
            Some(TokenUrl::new(GOOGLE_TOKEN_URL.to_string())?),
        )
        .set_redirect_uri(RedirectUrl::new(redirect_uri.to_string())?);

        Ok(Self {
            client,
            redirect,
            scope: scope.to_string(),
        })
    }

    pub fn refresh(&self, refresh_token: &str) -> Result<Grant> {
        let token = self
            .client
            .exchange_refresh_token(&RefreshToken::new(refresh_token.to_string()))
            .request(http_client)
            .map_err(|e| anyhow!("refresh token exchange failed: {e}"))?;
        Ok(Grant {
            access_token: token.access_token().secret().to_string(),
            refresh_token: token.refresh_token().map(|r| r.secret().to_string()),
        })
    }

    /// Authorization code + PKCE. Opens the system browser and waits for the
    /// redirect on the loopback address named by the redirect URI.
    pub fn authorize_interactively(&self) -> Result<Grant> {
        let bind_addr = loopback_addr(&self.redirect)?;
        // listen before the user can possibly be redirected
        let server = Server::http(bind_addr)
            .map_err(|e| anyhow!("Failed to bind OAuth callback server on {bind_addr}: {e:?}"))?;

        let (challenge, verifier) = PkceCodeChallenge::new_random_sha256();
        let (auth_url, csrf) = self
            .client
            .authorize_url(CsrfToken::new_random)
            .add_scope(Scope::new(self.scope.clone()))
            .set_pkce_challenge(challenge)
            .url();

        println!("Open this URL in your browser:\n{auth_url}");
        if let Err(e) = open::that(auth_url.as_str()) {
            warn!("could not open browser automatically: {e}");
        }

        let code = self.wait_for_code(&server, csrf.secret())?;
        let token = self
            .client
            .exchange_code(AuthorizationCode::new(code))
            .set_pkce_verifier(verifier)
            .request(http_client)
            .map_err(|e| anyhow!("Token exchange failed: {e}"))?;
        info!("mailbox authorized");

        Ok(Grant {
            access_token: token.access_token().secret().to_string(),
            refresh_token: token.refresh_token().map(|r| r.secret().to_string()),
        })
    }

    fn wait_for_code(&self, server: &Server, state: &str) -> Result<String> {
        let wait_until = Instant::now() + CALLBACK_WAIT;
        while Instant::now() < wait_until {
            let Ok(Some(request)) = server.recv_timeout(Duration::from_millis(500)) else {
                continue;
            };
            match callback_code(&self.redirect, request.url(), state) {
                Ok(code) => {
                    let _ = request.respond(Response::from_string(
                        "Authorization received. You can close this tab.",
                    ));
                    return Ok(code);
                }
                Err(e) => {
                    warn!("ignoring OAuth callback: {e}");
                    let _ = request.respond(Response::from_string(format!("{e}")));
                }
            }
        }
        bail!("No authorization code received within {CALLBACK_WAIT:?}")
    }
}

/// Where to listen for the redirect: loopback for `localhost`, otherwise the
/// literal IP in the URI.
fn loopback_addr(redirect: &Url) -> Result<SocketAddr> {
    let host = redirect
        .host_str()
        .ok_or_else(|| anyhow!("redirect_uri missing host: {redirect}"))?;
    let port = redirect
        .port_or_known_default()
        .ok_or_else(|| anyhow!("redirect_uri missing/unknown port: {redirect}"))?;
    let ip: IpAddr = match host {
        "localhost" => IpAddr::V4(Ipv4Addr::LOCALHOST),
        other => other
            .parse()
            .map_err(|_| anyhow!("redirect_uri host must be localhost or an IP: {other}"))?,
    };
    Ok(SocketAddr::new(ip, port))
}

/// Pull the authorization code out of a callback request path
/// (`/callback?code=..&state=..`), checking the CSRF state.
fn callback_code(redirect: &Url, request_path: &str, expected_state: &str) -> Result<String> {
    let full = redirect.join(request_path)?;
    let mut code = None;
    let mut state = None;
    for (k, v) in full.query_pairs() {
        match k.as_ref() {
            "code" => code = Some(v.into_owned()),
            "state" => state = Some(v.into_owned()),
            "error" => bail!("authorization denied: {v}"),
            _ => {}
        }
    }
    if state.as_deref() != Some(expected_state) {
        bail!("state mismatch in redirect");
    }
    code.ok_or_else(|| anyhow!("No code found in redirect"))
}
