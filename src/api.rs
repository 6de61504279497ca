//! Remote data gateway: the trait the ledger store talks to, and its HTTP
//! implementation against the backend REST API.

use crate::error::{classify_status, ApiError};
use crate::models::{
    Account, AccountPatch, Category, CategoryPatch, EntryKind, NewAccount, NewCategory,
    NewTransaction, SummarySnapshot, Transaction, TransactionPatch,
};
use crate::scope::ViewScope;
use crate::session::{SessionStore, TOKEN_KEY};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use std::sync::Arc;

// One connection pool per process; each gateway clones the handle.
static CLIENT: Lazy<reqwest::Client> = Lazy::new(|| {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(30))
        .build()
        .expect("reqwest client")
});

/// Everything the ledger store needs from the backend. Implemented over HTTP
/// in production and by an in-memory fake in tests.
#[async_trait]
pub trait LedgerGateway: Send + Sync {
    async fn categories(&self, kind: Option<EntryKind>) -> Result<Vec<Category>, ApiError>;
    async fn create_category(&self, payload: &NewCategory) -> Result<Category, ApiError>;
    async fn update_category(&self, id: &str, patch: &CategoryPatch) -> Result<Category, ApiError>;
    async fn delete_category(&self, id: &str) -> Result<(), ApiError>;

    async fn transactions(
        &self,
        scope: &ViewScope,
        year: i32,
        month: u32,
    ) -> Result<Vec<Transaction>, ApiError>;
    async fn create_transaction(
        &self,
        scope: &ViewScope,
        payload: &NewTransaction,
    ) -> Result<Transaction, ApiError>;
    async fn update_transaction(
        &self,
        id: &str,
        patch: &TransactionPatch,
    ) -> Result<Transaction, ApiError>;
    async fn delete_transaction(&self, id: &str) -> Result<(), ApiError>;

    async fn summary(
        &self,
        scope: &ViewScope,
        year: i32,
        month: u32,
    ) -> Result<SummarySnapshot, ApiError>;

    async fn accounts(&self) -> Result<Vec<Account>, ApiError>;
    async fn create_account(
        &self,
        scope: &ViewScope,
        payload: &NewAccount,
    ) -> Result<Account, ApiError>;
    async fn update_account(&self, id: &str, patch: &AccountPatch) -> Result<Account, ApiError>;
}

// Shared handles work anywhere a gateway is expected, e.g. a test keeping its
// own reference to a fake while the store owns another.
#[async_trait]
impl<G: LedgerGateway + ?Sized> LedgerGateway for Arc<G> {
    async fn categories(&self, kind: Option<EntryKind>) -> Result<Vec<Category>, ApiError> {
        (**self).categories(kind).await
    }

    async fn create_category(&self, payload: &NewCategory) -> Result<Category, ApiError> {
        (**self).create_category(payload).await
    }

    async fn update_category(&self, id: &str, patch: &CategoryPatch) -> Result<Category, ApiError> {
        (**self).update_category(id, patch).await
    }

    async fn delete_category(&self, id: &str) -> Result<(), ApiError> {
        (**self).delete_category(id).await
    }

    async fn transactions(
        &self,
        scope: &ViewScope,
        year: i32,
        month: u32,
    ) -> Result<Vec<Transaction>, ApiError> {
        (**self).transactions(scope, year, month).await
    }

    async fn create_transaction(
        &self,
        scope: &ViewScope,
        payload: &NewTransaction,
    ) -> Result<Transaction, ApiError> {
        (**self).create_transaction(scope, payload).await
    }

    async fn update_transaction(
        &self,
        id: &str,
        patch: &TransactionPatch,
    ) -> Result<Transaction, ApiError> {
        (**self).update_transaction(id, patch).await
    }

    async fn delete_transaction(&self, id: &str) -> Result<(), ApiError> {
        (**self).delete_transaction(id).await
    }

    async fn summary(
        &self,
        scope: &ViewScope,
        year: i32,
        month: u32,
    ) -> Result<SummarySnapshot, ApiError> {
        (**self).summary(scope, year, month).await
    }

    async fn accounts(&self) -> Result<Vec<Account>, ApiError> {
        (**self).accounts().await
    }

    async fn create_account(
        &self,
        scope: &ViewScope,
        payload: &NewAccount,
    ) -> Result<Account, ApiError> {
        (**self).create_account(scope, payload).await
    }

    async fn update_account(&self, id: &str, patch: &AccountPatch) -> Result<Account, ApiError> {
        (**self).update_account(id, patch).await
    }
}

/// HTTP gateway. Attaches the bearer token from session storage on every
/// request and translates the active scope into a `group_id` parameter.
pub struct HttpGateway {
    client: reqwest::Client,
    base_url: String,
    session: Arc<dyn SessionStore>,
}

impl HttpGateway {
    pub fn new(base_url: impl Into<String>, session: Arc<dyn SessionStore>) -> Self {
        Self {
            client: CLIENT.clone(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            session,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn bearer(&self) -> Result<String, ApiError> {
        self.session
            .get(TOKEN_KEY)
            .map_err(|e| ApiError::Network(e.to_string()))?
            .ok_or(ApiError::AuthExpired)
    }

    /// Send a request and return the successful response body; non-2xx is
    /// classified into the error taxonomy with the body text preserved.
    async fn send(&self, req: reqwest::RequestBuilder) -> Result<String, ApiError> {
        let token = self.bearer()?;
        let resp = req.bearer_auth(token).send().await?;
        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(classify_status(status.as_u16(), &body));
        }
        Ok(body)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        req: reqwest::RequestBuilder,
    ) -> Result<T, ApiError> {
        let body = self.send(req).await?;
        serde_json::from_str(&body).map_err(|e| ApiError::Network(format!("invalid response body: {}", e)))
    }

    fn month_query(scope: &ViewScope, year: i32, month: u32) -> Vec<(String, String)> {
        let mut q = vec![
            ("year".to_string(), year.to_string()),
            ("month".to_string(), month.to_string()),
        ];
        if let Some(group_id) = scope.group_id() {
            q.push(("group_id".to_string(), group_id.to_string()));
        }
        q
    }

    /// Serialize a payload and merge in the scope's group id where the
    /// endpoint expects one in the body.
    fn scoped_body<T: serde::Serialize>(scope: &ViewScope, payload: &T) -> Result<serde_json::Value, ApiError> {
        let mut body = serde_json::to_value(payload)
            .map_err(|e| ApiError::Network(format!("invalid request body: {}", e)))?;
        if let (Some(group_id), Some(obj)) = (scope.group_id(), body.as_object_mut()) {
            obj.insert("group_id".to_string(), serde_json::json!(group_id));
        }
        Ok(body)
    }
}

#[async_trait]
impl LedgerGateway for HttpGateway {
    async fn categories(&self, kind: Option<EntryKind>) -> Result<Vec<Category>, ApiError> {
        let mut req = self.client.get(self.url("/categories"));
        if let Some(kind) = kind {
            req = req.query(&[("type", kind.as_str())]);
        }
        self.get_json(req).await
    }

    async fn create_category(&self, payload: &NewCategory) -> Result<Category, ApiError> {
        self.get_json(self.client.post(self.url("/categories")).json(payload)).await
    }

    async fn update_category(&self, id: &str, patch: &CategoryPatch) -> Result<Category, ApiError> {
        let url = self.url(&format!("/categories/{}", id));
        self.get_json(self.client.patch(url).json(patch)).await
    }

    async fn delete_category(&self, id: &str) -> Result<(), ApiError> {
        let url = self.url(&format!("/categories/{}", id));
        self.send(self.client.delete(url)).await?;
        Ok(())
    }

    async fn transactions(
        &self,
        scope: &ViewScope,
        year: i32,
        month: u32,
    ) -> Result<Vec<Transaction>, ApiError> {
        let req = self
            .client
            .get(self.url("/transactions"))
            .query(&Self::month_query(scope, year, month));
        self.get_json(req).await
    }

    async fn create_transaction(
        &self,
        scope: &ViewScope,
        payload: &NewTransaction,
    ) -> Result<Transaction, ApiError> {
        let body = Self::scoped_body(scope, payload)?;
        self.get_json(self.client.post(self.url("/transactions")).json(&body)).await
    }

    async fn update_transaction(
        &self,
        id: &str,
        patch: &TransactionPatch,
    ) -> Result<Transaction, ApiError> {
        let url = self.url(&format!("/transactions/{}", id));
        self.get_json(self.client.patch(url).json(patch)).await
    }

    async fn delete_transaction(&self, id: &str) -> Result<(), ApiError> {
        let url = self.url(&format!("/transactions/{}", id));
        self.send(self.client.delete(url)).await?;
        Ok(())
    }

    async fn summary(
        &self,
        scope: &ViewScope,
        year: i32,
        month: u32,
    ) -> Result<SummarySnapshot, ApiError> {
        let req = self
            .client
            .get(self.url("/transactions/summary"))
            .query(&Self::month_query(scope, year, month));
        self.get_json(req).await
    }

    async fn accounts(&self) -> Result<Vec<Account>, ApiError> {
        self.get_json(self.client.get(self.url("/accounts"))).await
    }

    async fn create_account(
        &self,
        scope: &ViewScope,
        payload: &NewAccount,
    ) -> Result<Account, ApiError> {
        let body = Self::scoped_body(scope, payload)?;
        self.get_json(self.client.post(self.url("/accounts")).json(&body)).await
    }

    async fn update_account(&self, id: &str, patch: &AccountPatch) -> Result<Account, ApiError> {
        let url = self.url(&format!("/accounts/{}", id));
        self.get_json(self.client.patch(url).json(patch)).await
    }
}
