//! Client for the DSpace 6 REST API.
//!
//! | Method | Path                                      | Used for                   |
//! |--------|-------------------------------------------|----------------------------|
//! | POST   | `/login`                                  | Create a session           |
//! | GET    | `/status`                                 | Validate a session         |
//! | GET    | `/items/{id}?expand=bitstreams,metadata`  | Inspect an item            |
//! | DELETE | `/bitstreams/{id}`                        | Remove a bitstream         |
//! | POST   | `/items/{id}/bitstreams?name=&bundleName=`| Upload a file              |
//!
//! Authentication is a single `JSESSIONID` cookie, valid for the whole run.

pub mod types;

use reqwest::header::{ACCEPT, COOKIE, SET_COOKIE};
use reqwest::{RequestBuilder, StatusCode};
use tracing::debug;
use uuid::Uuid;

use crate::config::user_agent;
use crate::error::{RestError, RestResult};
use types::{Item, Status};

/// Name of the session cookie
const SESSION_COOKIE: &str = "JSESSIONID";

/// An authenticated session token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session(String);

impl Session {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn token(&self) -> &str {
        &self.0
    }

    fn cookie(&self) -> String {
        format!("{}={}", SESSION_COOKIE, self.0)
    }
}

/// Find the session token in `Set-Cookie` header values.
pub fn session_from_set_cookie<'a>(values: impl IntoIterator<Item = &'a str>) -> Option<Session> {
    values.into_iter().find_map(|value| {
        let pair = value.split(';').next()?.trim();
        let (name, token) = pair.split_once('=')?;
        (name.trim() == SESSION_COOKIE && !token.is_empty()).then(|| Session::new(token.trim()))
    })
}

/// Parameters for a bitstream upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitstreamUpload {
    pub name: String,
    pub bundle_name: String,
    pub description: Option<String>,
}

impl BitstreamUpload {
    fn query(&self) -> Vec<(&'static str, &str)> {
        let mut params = vec![
            ("name", self.name.as_str()),
            ("bundleName", self.bundle_name.as_str()),
        ];
        if let Some(description) = &self.description {
            params.push(("description", description.as_str()));
        }
        params
    }
}

/// Answer to an item inspection.
#[derive(Debug, Clone)]
pub enum ItemLookup {
    Found(Item),
    /// The server answered with a non-success status.
    Unavailable(u16),
}

/// Client for one DSpace REST API
#[derive(Debug, Clone)]
pub struct RestClient {
    http: reqwest::Client,
    base_url: String,
    session: Option<Session>,
}

impl RestClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .user_agent(user_agent())
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            session: None,
        }
    }

    /// Attach a session to every following request.
    pub fn set_session(&mut self, session: Session) {
        self.session = Some(session);
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authenticated(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.session {
            Some(session) => request.header(COOKIE, session.cookie()),
            None => request,
        }
    }

    async fn send(&self, url: &str, request: RequestBuilder) -> RestResult<reqwest::Response> {
        self.authenticated(request)
            .send()
            .await
            .map_err(|source| RestError::Connect {
                url: url.to_string(),
                source,
            })
    }

    /// Log in with an email and password.
    pub async fn login(&self, email: &str, password: &str) -> RestResult<Session> {
        let url = self.endpoint("/login");
        let request = self.http.post(&url).form(&[("email", email), ("password", password)]);
        let response = self.send(&url, request).await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(RestError::LoginFailed(status.as_u16()));
        }

        let cookies = response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok());

        let session = session_from_set_cookie(cookies)
            .ok_or(RestError::MissingSessionCookie(status.as_u16()))?;
        debug!("Logged in using JSESSIONID: {}", session.token());
        Ok(session)
    }

    /// Whether `session` is still authenticated.
    ///
    /// A non-success status or `authenticated: false` both read as invalid.
    pub async fn check_session(&self, session: &Session) -> RestResult<bool> {
        let url = self.endpoint("/status");
        let request = self
            .http
            .get(&url)
            .header(ACCEPT, "application/json")
            .header(COOKIE, session.cookie());
        let response = self.send(&url, request).await?;

        if response.status() != StatusCode::OK {
            debug!("Error checking session status (HTTP {})", response.status().as_u16());
            return Ok(false);
        }

        let status: Status = response
            .json()
            .await
            .map_err(|source| RestError::Decode { url, source })?;

        if status.authenticated {
            debug!("Session valid: {}", session.token());
        } else {
            debug!("Session expired: {}", session.token());
        }
        Ok(status.authenticated)
    }

    /// Fetch an item with its bitstreams and metadata.
    pub async fn get_item(&self, item_id: &Uuid) -> RestResult<ItemLookup> {
        let url = self.endpoint(&format!("/items/{}", item_id));
        let request = self
            .http
            .get(&url)
            .header(ACCEPT, "application/json")
            .query(&[("expand", "bitstreams,metadata")]);
        let response = self.send(&url, request).await?;

        if response.status() != StatusCode::OK {
            return Ok(ItemLookup::Unavailable(response.status().as_u16()));
        }

        let item = response
            .json()
            .await
            .map_err(|source| RestError::Decode { url, source })?;
        Ok(ItemLookup::Found(item))
    }

    /// Delete a bitstream, returning whether the server accepted it.
    pub async fn delete_bitstream(&self, bitstream_id: &Uuid) -> RestResult<bool> {
        let url = self.endpoint(&format!("/bitstreams/{}", bitstream_id));
        let request = self.http.delete(&url);
        let response = self.send(&url, request).await?;
        Ok(response.status() == StatusCode::OK)
    }

    /// Upload `body` as a new bitstream of an item.
    ///
    /// Returns the response status; `200` means the bitstream was created.
    pub async fn upload_bitstream(
        &self,
        item_id: &Uuid,
        upload: &BitstreamUpload,
        body: Vec<u8>,
    ) -> RestResult<u16> {
        let url = self.endpoint(&format!("/items/{}/bitstreams", item_id));
        let request = self.http.post(&url).query(&upload.query()).body(body);
        let response = self.send(&url, request).await?;
        Ok(response.status().as_u16())
    }
}
