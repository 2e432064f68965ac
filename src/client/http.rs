//! HTTP client for the task tracker API.
//!
//! Authenticated calls go through the [`RenewalCoordinator`], so an expired
//! access token is renewed and the call replayed without the caller noticing.

use std::time::Duration;

use reqwest::{Method, Response, StatusCode};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use url::Url;

use super::coordinator::{DEFAULT_RENEWAL_DEADLINE, RenewalCoordinator, Renewer};
use super::error::ClientError;
use super::types::{AccessToken, AuthSession, TaskEnvelope, TaskPage, TaskRecord, UserEnvelope, UserProfile};

#[derive(Deserialize)]
struct SuccessBody<T> {
    data: T,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

/// Turn a response into its `data` payload or a typed error.
async fn read_data<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    let response = check_status(response).await?;
    let body: SuccessBody<T> = response.json().await?;
    Ok(body.data)
}

async fn check_status(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = match response.json::<ErrorBody>().await {
        Ok(body) => body.message,
        Err(_) => status
            .canonical_reason()
            .unwrap_or("Request failed")
            .to_string(),
    };

    if status == StatusCode::UNAUTHORIZED {
        Err(ClientError::Unauthorized { message })
    } else {
        Err(ClientError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

/// Renews by POSTing to the refresh endpoint. The refresh cookie is sent by
/// the shared cookie jar; application code never sees it.
pub struct HttpRenewer {
    http: reqwest::Client,
    refresh_url: Url,
}

impl Renewer for HttpRenewer {
    async fn renew(&self) -> Result<String, ClientError> {
        let response = self
            .http
            .post(self.refresh_url.clone())
            .send()
            .await?;
        let token: AccessToken = read_data(response).await?;
        Ok(token.access_token)
    }
}

#[derive(Serialize)]
struct Credentials<'a> {
    email: &'a str,
    password: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
}

/// Fields for a new task.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskInput {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<crate::db::TaskStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<crate::db::TaskPriority>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
}

#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base: Url,
    coordinator: RenewalCoordinator<HttpRenewer>,
}

impl ApiClient {
    /// `base_url` is the API root, e.g. `http://localhost:3000/api/v1`.
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        Self::with_renewal_deadline(base_url, DEFAULT_RENEWAL_DEADLINE)
    }

    pub fn with_renewal_deadline(base_url: &str, deadline: Duration) -> Result<Self, ClientError> {
        let mut base = Url::parse(base_url)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let http = reqwest::Client::builder().cookie_store(true).build()?;
        let renewer = HttpRenewer {
            http: http.clone(),
            refresh_url: base.join("auth/refresh")?,
        };

        Ok(Self {
            http,
            base,
            coordinator: RenewalCoordinator::with_deadline(renewer, deadline),
        })
    }

    pub fn coordinator(&self) -> &RenewalCoordinator<HttpRenewer> {
        &self.coordinator
    }

    fn url(&self, path: &str) -> Result<Url, ClientError> {
        Ok(self.base.join(path)?)
    }

    /// One authenticated request with an explicit token.
    async fn send_with_token<B: Serialize + ?Sized>(
        &self,
        method: Method,
        url: Url,
        body: Option<&B>,
        token: Option<String>,
    ) -> Result<Response, ClientError> {
        let mut request = self.http.request(method, url);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }
        check_status(request.send().await?).await
    }

    /// An authenticated request routed through the renewal coordinator.
    async fn authed<B: Serialize + ?Sized>(
        &self,
        method: Method,
        url: Url,
        body: Option<&B>,
    ) -> Result<Response, ClientError> {
        self.coordinator
            .execute(|token| self.send_with_token(method.clone(), url.clone(), body, token))
            .await
    }

    async fn start_session(&self, path: &str, credentials: &Credentials<'_>) -> Result<AuthSession, ClientError> {
        let response = self
            .http
            .post(self.url(path)?)
            .json(credentials)
            .send()
            .await?;
        let session: AuthSession = read_data(response).await?;
        self.coordinator.sign_in(session.access_token.clone());
        Ok(session)
    }

    pub async fn register(
        &self,
        email: &str,
        password: &str,
        name: Option<&str>,
    ) -> Result<AuthSession, ClientError> {
        self.start_session(
            "auth/register",
            &Credentials {
                email,
                password,
                name,
            },
        )
        .await
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<AuthSession, ClientError> {
        self.start_session(
            "auth/login",
            &Credentials {
                email,
                password,
                name: None,
            },
        )
        .await
    }

    /// Log out on the server (clears the refresh cookie) and forget the
    /// access token locally, even if the server call fails.
    pub async fn logout(&self) -> Result<(), ClientError> {
        let result = self
            .authed::<()>(Method::POST, self.url("auth/logout")?, None)
            .await;
        self.coordinator.sign_out();
        result.map(|_| ())
    }

    /// Force a renewal now.
    pub async fn refresh(&self) -> Result<String, ClientError> {
        self.coordinator.renew().await
    }

    pub async fn me(&self) -> Result<UserProfile, ClientError> {
        let response = self
            .authed::<()>(Method::GET, self.url("auth/me")?, None)
            .await?;
        let data: UserEnvelope = response_data(response).await?;
        Ok(data.user)
    }

    /// List tasks. `query` holds raw query pairs such as `("status", "done")`.
    pub async fn list_tasks(&self, query: &[(&str, &str)]) -> Result<TaskPage, ClientError> {
        let mut url = self.url("tasks")?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        let response = self.authed::<()>(Method::GET, url, None).await?;
        response_data(response).await
    }

    pub async fn create_task(&self, input: &TaskInput) -> Result<TaskRecord, ClientError> {
        let response = self
            .authed(Method::POST, self.url("tasks")?, Some(input))
            .await?;
        let data: TaskEnvelope = response_data(response).await?;
        Ok(data.task)
    }

    pub async fn get_task(&self, id: &str) -> Result<TaskRecord, ClientError> {
        let response = self
            .authed::<()>(Method::GET, self.url(&format!("tasks/{}", id))?, None)
            .await?;
        let data: TaskEnvelope = response_data(response).await?;
        Ok(data.task)
    }

    /// Partially update a task. `patch` is sent as-is.
    pub async fn update_task(
        &self,
        id: &str,
        patch: &serde_json::Value,
    ) -> Result<TaskRecord, ClientError> {
        let response = self
            .authed(Method::PATCH, self.url(&format!("tasks/{}", id))?, Some(patch))
            .await?;
        let data: TaskEnvelope = response_data(response).await?;
        Ok(data.task)
    }

    pub async fn delete_task(&self, id: &str) -> Result<(), ClientError> {
        self.authed::<()>(Method::DELETE, self.url(&format!("tasks/{}", id))?, None)
            .await?;
        Ok(())
    }
}

/// Decode the `data` payload of an already status-checked response.
async fn response_data<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    let body: SuccessBody<T> = response.json().await?;
    Ok(body.data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_gets_trailing_slash() {
        let client = ApiClient::new("http://localhost:3000/api/v1").unwrap();
        assert_eq!(
            client.url("auth/login").unwrap().as_str(),
            "http://localhost:3000/api/v1/auth/login"
        );

        let client = ApiClient::new("http://localhost:3000/api/v1/").unwrap();
        assert_eq!(
            client.url("tasks").unwrap().as_str(),
            "http://localhost:3000/api/v1/tasks"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(matches!(
            ApiClient::new("not a url"),
            Err(ClientError::InvalidUrl(_))
        ));
    }
}
