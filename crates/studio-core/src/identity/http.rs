//! Blocking client for a hosted auth admin API.
//!
//! Endpoints used, relative to `base_url`:
//! ```text
//! POST   /admin/users          create (email, password, user_metadata)
//! GET    /admin/users          list (paged), filtered client-side by email
//! DELETE /admin/users/{id}     delete
//! ```
//! Transport failures, timeouts and 5xx responses surface as
//! `ExternalServiceUnavailable`; every request is bounded by the client
//! timeout.

use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::error::{Result, StudioError};
use crate::model::normalize_email;

use super::{IdentityDeletion, IdentityMetadata, IdentityRecord, IdentityService};

const LIST_PAGE_SIZE: u32 = 1000;

#[derive(Debug, Deserialize)]
struct RemoteUser {
    id: Uuid,
    #[serde(default)]
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UserList {
    #[serde(default)]
    users: Vec<RemoteUser>,
}

fn transport_err(e: reqwest::Error) -> StudioError {
    if e.is_timeout() {
        StudioError::ExternalServiceUnavailable(format!("request timed out: {e}"))
    } else if e.is_decode() {
        StudioError::Identity(format!("unexpected response body: {e}"))
    } else {
        StudioError::ExternalServiceUnavailable(e.to_string())
    }
}

fn status_err(resp: Response) -> StudioError {
    let status = resp.status();
    let body = resp.text().unwrap_or_default();
    if status.is_server_error() {
        StudioError::ExternalServiceUnavailable(format!("{status}: {body}"))
    } else {
        StudioError::Identity(format!("{status}: {body}"))
    }
}

/// The admin API reports a duplicate email with 422 (or 409 on some
/// deployments) and an "already registered" style message.
fn is_duplicate(status: StatusCode, body: &str) -> bool {
    let body = body.to_lowercase();
    matches!(status, StatusCode::UNPROCESSABLE_ENTITY | StatusCode::CONFLICT)
        && (body.contains("already") || body.contains("exists"))
}

pub struct HttpIdentity {
    client: Client,
    base_url: String,
    api_key: String,
    page_size: u32,
}

impl HttpIdentity {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StudioError::Identity(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            page_size: LIST_PAGE_SIZE,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authed(&self, req: RequestBuilder) -> RequestBuilder {
        req.header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }
}

impl IdentityService for HttpIdentity {
    fn create_identity(
        &self,
        email: &str,
        credential: &str,
        metadata: &IdentityMetadata,
    ) -> Result<IdentityRecord> {
        let email = normalize_email(email);
        let body = json!({
            "email": email,
            "password": credential,
            "email_confirm": true,
            "user_metadata": metadata,
        });
        let resp = self
            .authed(self.client.post(self.url("/admin/users")))
            .json(&body)
            .send()
            .map_err(transport_err)?;

        let status = resp.status();
        if status.is_success() {
            let user: RemoteUser = resp.json().map_err(transport_err)?;
            return Ok(IdentityRecord {
                id: user.id,
                email,
                already_existed: false,
            });
        }
        if status.is_server_error() {
            return Err(status_err(resp));
        }

        let text = resp.text().unwrap_or_default();
        if is_duplicate(status, &text) {
            return match self.find_identity_by_email(&email)? {
                Some(existing) => Ok(existing),
                None => Err(StudioError::Identity(format!(
                    "identity service reported '{email}' as registered but it could not be fetched"
                ))),
            };
        }
        Err(StudioError::Identity(format!("{status}: {text}")))
    }

    fn find_identity_by_email(&self, email: &str) -> Result<Option<IdentityRecord>> {
        let email = normalize_email(email);
        // Pages are 1-based; a short page is the last one.
        for page in 1u32.. {
            let resp = self
                .authed(self.client.get(self.url("/admin/users")))
                .query(&[("page", page), ("per_page", self.page_size)])
                .send()
                .map_err(transport_err)?;
            if !resp.status().is_success() {
                return Err(status_err(resp));
            }
            let list: UserList = resp.json().map_err(transport_err)?;
            let fetched = list.users.len();
            let found = list
                .users
                .into_iter()
                .find(|u| u.email.as_deref().map(normalize_email).as_deref() == Some(email.as_str()));
            if let Some(u) = found {
                return Ok(Some(IdentityRecord {
                    id: u.id,
                    email,
                    already_existed: true,
                }));
            }
            if fetched < self.page_size as usize {
                break;
            }
        }
        Ok(None)
    }

    fn delete_identity(&self, id: Uuid) -> Result<IdentityDeletion> {
        let resp = self
            .authed(self.client.delete(self.url(&format!("/admin/users/{id}"))))
            .send()
            .map_err(transport_err)?;
        match resp.status() {
            s if s.is_success() => Ok(IdentityDeletion::Deleted),
            StatusCode::NOT_FOUND => Ok(IdentityDeletion::AlreadyAbsent),
            _ => Err(status_err(resp)),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    const USER_ID: &str = "6f1c1e0e-8d0a-4c57-9a53-0d6c0c3b1a11";

    fn client(server: &Server) -> HttpIdentity {
        HttpIdentity::new(server.url(), "service-key", Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn create_returns_new_identity() {
        let mut server = Server::new();
        let mock = server
            .mock("POST", "/admin/users")
            .match_header("apikey", "service-key")
            .match_header("authorization", "Bearer service-key")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(format!(r#"{{"id":"{USER_ID}","email":"a@x.com"}}"#))
            .create();

        let rec = client(&server)
            .create_identity("A@x.com", "Tmp-Pass-1", &IdentityMetadata::client("Ann"))
            .unwrap();
        mock.assert();
        assert_eq!(rec.id.to_string(), USER_ID);
        assert!(!rec.already_existed);
    }

    #[test]
    fn duplicate_email_resolves_existing_identity() {
        let mut server = Server::new();
        server
            .mock("POST", "/admin/users")
            .with_status(422)
            .with_body(r#"{"msg":"A user with this email address has already been registered"}"#)
            .create();
        server
            .mock("GET", "/admin/users")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(format!(
                r#"{{"users":[{{"id":"{}","email":"b@x.com"}},{{"id":"{USER_ID}","email":"A@X.com"}}]}}"#,
                Uuid::new_v4()
            ))
            .create();

        let rec = client(&server)
            .create_identity("a@x.com", "pw", &IdentityMetadata::client("Ann"))
            .unwrap();
        assert!(rec.already_existed);
        assert_eq!(rec.id.to_string(), USER_ID);
    }

    #[test]
    fn duplicate_lookup_walks_every_page() {
        let mut server = Server::new();
        server
            .mock("POST", "/admin/users")
            .with_status(422)
            .with_body(r#"{"msg":"A user with this email address has already been registered"}"#)
            .create();
        let page = |n: &str| {
            Matcher::AllOf(vec![
                Matcher::UrlEncoded("page".into(), n.into()),
                Matcher::UrlEncoded("per_page".into(), "2".into()),
            ])
        };
        let first = server
            .mock("GET", "/admin/users")
            .match_query(page("1"))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(format!(
                r#"{{"users":[{{"id":"{}","email":"b@x.com"}},{{"id":"{}","email":"c@x.com"}}]}}"#,
                Uuid::new_v4(),
                Uuid::new_v4()
            ))
            .create();
        let second = server
            .mock("GET", "/admin/users")
            .match_query(page("2"))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(format!(r#"{{"users":[{{"id":"{USER_ID}","email":"a@x.com"}}]}}"#))
            .create();

        let mut ids = client(&server);
        ids.page_size = 2;
        let rec = ids
            .create_identity("a@x.com", "pw", &IdentityMetadata::client("Ann"))
            .unwrap();
        first.assert();
        second.assert();
        assert!(rec.already_existed);
        assert_eq!(rec.id.to_string(), USER_ID);
    }

    #[test]
    fn lookup_stops_at_short_page() {
        let mut server = Server::new();
        let list = server
            .mock("GET", "/admin/users")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"users":[]}"#)
            .expect(1)
            .create();

        assert!(client(&server).find_identity_by_email("a@x.com").unwrap().is_none());
        list.assert();
    }

    #[test]
    fn server_error_is_unavailable() {
        let mut server = Server::new();
        server
            .mock("POST", "/admin/users")
            .with_status(503)
            .with_body("upstream down")
            .create();

        let err = client(&server)
            .create_identity("a@x.com", "pw", &IdentityMetadata::client("Ann"))
            .unwrap_err();
        assert!(matches!(err, StudioError::ExternalServiceUnavailable(_)), "{err}");
    }

    #[test]
    fn client_error_is_identity_error() {
        let mut server = Server::new();
        server
            .mock("POST", "/admin/users")
            .with_status(400)
            .with_body(r#"{"msg":"password too weak"}"#)
            .create();

        let err = client(&server)
            .create_identity("a@x.com", "pw", &IdentityMetadata::client("Ann"))
            .unwrap_err();
        assert!(matches!(err, StudioError::Identity(_)), "{err}");
    }

    #[test]
    fn delete_tolerates_not_found() {
        let mut server = Server::new();
        server
            .mock("DELETE", format!("/admin/users/{USER_ID}").as_str())
            .with_status(404)
            .create();

        let id = Uuid::parse_str(USER_ID).unwrap();
        assert_eq!(
            client(&server).delete_identity(id).unwrap(),
            IdentityDeletion::AlreadyAbsent
        );
    }

    #[test]
    fn unreachable_host_is_unavailable() {
        // Port 9 (discard) on localhost is reliably closed in test sandboxes.
        let ids = HttpIdentity::new("http://127.0.0.1:9", "k", Duration::from_millis(500)).unwrap();
        let err = ids.find_identity_by_email("a@x.com").unwrap_err();
        assert!(matches!(err, StudioError::ExternalServiceUnavailable(_)), "{err}");
    }
}
