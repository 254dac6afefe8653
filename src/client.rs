//! HTTP client for the school payment backend

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client as HttpClient, Method, RequestBuilder};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{CashierError, Result};
use crate::interceptor::{
    InterceptorHandle, InterceptorRegistry, ResponseContext, SESSION_INTERCEPTOR,
    SessionInterceptor,
};
use crate::notice::Notifier;
use crate::session::SessionContext;
use crate::types::*;

/// Default backend URL
pub const DEFAULT_BASE_URL: &str = "http://localhost:5000/api";

/// Value of `source` on every transaction created from this client.
pub const TRANSACTION_SOURCE: &str = "cashier";

/// Configuration options for the client
#[derive(Debug, Clone, Default)]
pub struct ClientOptions {
    /// Backend URL including any API prefix (default: "http://localhost:5000/api")
    pub base_url: Option<String>,
    /// Per-request timeout (default: 30 seconds)
    pub timeout: Option<Duration>,
}

/// Typed client for the backend REST API.
///
/// Authenticated calls read the token from the [`SessionContext`] and race the
/// request against the end of that session: if the session is cleared while a
/// request is in flight, the request is dropped and the call returns
/// [`CashierError::SessionEnded`].
pub struct CashierClient {
    base_url: String,
    http: HttpClient,
    session: Arc<SessionContext>,
    interceptors: Arc<InterceptorRegistry>,
}

impl CashierClient {
    pub fn new(session: Arc<SessionContext>, options: ClientOptions) -> Result<Self> {
        let base_url = options
            .base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        url::Url::parse(&base_url)
            .map_err(|e| CashierError::config(format!("invalid base URL {}: {}", base_url, e)))?;

        let http = HttpClient::builder()
            .user_agent(concat!("cashier/", env!("CARGO_PKG_VERSION")))
            .timeout(options.timeout.unwrap_or(Duration::from_secs(30)))
            .build()
            .map_err(|e| CashierError::network(e.to_string()))?;

        Ok(Self {
            base_url,
            http,
            session,
            interceptors: InterceptorRegistry::new(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn session(&self) -> &Arc<SessionContext> {
        &self.session
    }

    pub fn interceptors(&self) -> &Arc<InterceptorRegistry> {
        &self.interceptors
    }

    /// Install the 401 logout interceptor. Keep the handle for as long as it
    /// should stay active.
    pub fn install_session_interceptor(&self, notifier: Arc<dyn Notifier>) -> InterceptorHandle {
        self.interceptors.register(
            SESSION_INTERCEPTOR,
            Arc::new(SessionInterceptor::new(self.session.clone(), notifier)),
        )
    }

    // ==================== Auth ====================

    /// Log in and store token and role. The role is stored lowercased.
    pub async fn login(&self, username: &str, password: &str) -> Result<Staff> {
        #[derive(Serialize)]
        struct LoginRequest<'a> {
            username: &'a str,
            password: &'a str,
        }

        let request = self
            .http
            .post(self.url("/staff/auth/login"))
            .json(&LoginRequest { username, password });

        let response = request.send().await?;
        let response: LoginResponse = self
            .handle_response(response, "POST", "/staff/auth/login", false)
            .await?;

        let role = response.staff.role.to_lowercase();
        self.session.establish(&response.token, &role);

        Ok(Staff {
            role,
            ..response.staff
        })
    }

    // ==================== Students & payments ====================

    pub async fn students(&self) -> Result<Vec<Student>> {
        let r: StudentsResponse = self.get_authed("/admin/students").await?;
        Ok(r.students)
    }

    /// Payments of one student that can still take money (completed ones removed).
    pub async fn student_payments(&self, student_id: &str) -> Result<Vec<Payment>> {
        let path = format!("/payments/student/{}", encode_segment(student_id));
        let r: PaymentsResponse = self.get_authed(&path).await?;
        Ok(r.payments
            .into_iter()
            .filter(|p| p.status != PaymentStatus::Completed)
            .collect())
    }

    pub async fn payments(&self) -> Result<Vec<Payment>> {
        let r: PaymentsResponse = self.get_authed("/payments").await?;
        Ok(r.payments)
    }

    pub async fn payment(&self, payment_id: &str) -> Result<Payment> {
        let path = format!("/payments/{}", encode_segment(payment_id));
        let r: PaymentResponse = self.get_authed(&path).await?;
        Ok(r.payment)
    }

    // ==================== Transactions ====================

    pub async fn create_transaction(&self, body: &NewTransaction) -> Result<CreatedTransaction> {
        self.send_authed(Method::POST, "/transactions", Some(body))
            .await
    }

    pub async fn transactions(&self) -> Result<Vec<Transaction>> {
        let r: TransactionsResponse = self.get_authed("/transactions").await?;
        Ok(r.transactions)
    }

    pub async fn transaction_status(&self, transaction_id: &str) -> Result<StatusReport> {
        let path = format!("/transactions/{}/status", encode_segment(transaction_id));
        self.get_authed(&path).await
    }

    pub async fn summary(&self) -> Result<DashboardSummary> {
        let r: SummaryResponse = self.get_authed("/transactions/summary").await?;
        Ok(r.summary)
    }

    pub async fn recent_transactions(&self, limit: usize) -> Result<Vec<Transaction>> {
        let path = format!("/transactions/recent?limit={}", limit);
        let r: TransactionsResponse = self.get_authed(&path).await?;
        Ok(r.transactions)
    }

    // ==================== Internal Helpers ====================

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_authed<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.send_authed::<T, ()>(Method::GET, path, None).await
    }

    async fn send_authed<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<T> {
        let token = self.session.token().ok_or(CashierError::NoSession)?;

        let mut request: RequestBuilder = self
            .http
            .request(method.clone(), self.url(path))
            .bearer_auth(&token);
        if let Some(body) = body {
            request = request.json(body);
        }

        let call = async {
            let response = request.send().await?;
            self.handle_response(response, method.as_str(), path, true)
                .await
        };

        tokio::select! {
            result = call => result,
            _ = self.session.ended_for(&token) => {
                tracing::info!(method = %method, path, "Request dropped, session ended");
                Err(CashierError::SessionEnded)
            }
        }
    }

    async fn handle_response<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
        method: &str,
        path: &str,
        authenticated: bool,
    ) -> Result<T> {
        let status = response.status().as_u16();
        let bytes = response.bytes().await?;

        if !(200..300).contains(&status) {
            self.interceptors.dispatch(&ResponseContext {
                method,
                path,
                status,
                authenticated,
            });

            if status == 401 && authenticated {
                return Err(CashierError::Unauthorized);
            }

            let message = serde_json::from_slice::<Envelope>(&bytes)
                .ok()
                .and_then(|e| e.message);
            tracing::debug!(method, path, status, ?message, "Backend returned an error");
            return Err(CashierError::backend(Some(status), message));
        }

        let envelope: Envelope = serde_json::from_slice(&bytes)
            .map_err(|e| CashierError::network(format!("invalid response body: {}", e)))?;
        if !envelope.success {
            return Err(CashierError::backend(Some(status), envelope.message));
        }

        serde_json::from_slice(&bytes)
            .map_err(|e| CashierError::network(format!("unexpected response shape: {}", e)))
    }
}

/// Percent-encode an id for use as a single path segment.
fn encode_segment(segment: &str) -> String {
    url::form_urlencoded::byte_serialize(segment.as_bytes()).collect()
}

impl std::fmt::Debug for CashierClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CashierClient")
            .field("base_url", &self.base_url)
            .field("session", &self.session)
            .field("interceptors", &self.interceptors.len())
            .finish()
    }
}
