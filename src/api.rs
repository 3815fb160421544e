//! HTTP API client for the AmbuConnect backend.
//!
//! The realtime channel only pushes server-to-client; everything the client
//! creates or mutates (facilities, users, transport requests, chat messages)
//! goes through this request/response path. The backend is expected to echo
//! a created message back over the realtime channel to all subscribers.

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::ApiError;
use crate::models::{
    ApiResponse, CreateDemandeTransport, CreateEtablissement, CreateMessage, CreateUtilisateur,
    DemandeTransport, Etablissement, EtablissementStats, FiltresDemandes, Message,
    UpdateDemandeStatut, UpdateEtablissement, Utilisateur,
};

/// HTTP client for the AmbuConnect REST API.
///
/// Cloning is cheap; the underlying connection pool is shared. The bearer
/// token is supplied by the embedding application's session context, this
/// client does not manage its lifecycle.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            base_url: String::new(),
            token: None,
        }
    }

    /// Set the base URL for API requests
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the bearer token attached to every request
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Base URL this client targets (also the source of the realtime URL).
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        if self.base_url.is_empty() {
            if path.starts_with('/') {
                path.to_string()
            } else {
                format!("/{path}")
            }
        } else {
            let base = self.base_url.trim_end_matches('/');
            let path = path.trim_start_matches('/');
            format!("{base}/{path}")
        }
    }

    fn authorize(&self, rb: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => rb.bearer_auth(token),
            None => rb,
        }
    }

    /// Make a GET request and decode the JSON response
    pub async fn get_json<TRes: DeserializeOwned>(&self, path: &str) -> Result<TRes, ApiError> {
        let url = self.url(path);
        let rb = self.authorize(self.client.get(&url));

        let resp = rb
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        let status = resp.status().as_u16();
        let is_success = resp.status().is_success();
        let text = resp
            .text()
            .await
            .map_err(|e| ApiError::Network(format!("failed to read body: {e}")))?;

        if !is_success {
            return Err(ApiError::Http { status, body: text });
        }

        serde_json::from_str(&text).map_err(|e| ApiError::Deserialize(e.to_string()))
    }

    /// Make a POST request with a JSON body and decode the JSON response
    pub async fn post_json<TReq: Serialize, TRes: DeserializeOwned>(
        &self,
        path: &str,
        body: &TReq,
    ) -> Result<TRes, ApiError> {
        self.send_json(reqwest::Method::POST, path, Some(body)).await
    }

    /// Make a PUT request with a JSON body and decode the JSON response
    pub async fn put_json<TReq: Serialize, TRes: DeserializeOwned>(
        &self,
        path: &str,
        body: &TReq,
    ) -> Result<TRes, ApiError> {
        self.send_json(reqwest::Method::PUT, path, Some(body)).await
    }

    /// Make a PUT request with no body and decode the JSON response
    pub async fn put_empty<TRes: DeserializeOwned>(&self, path: &str) -> Result<TRes, ApiError> {
        self.send_json::<(), TRes>(reqwest::Method::PUT, path, None)
            .await
    }

    /// Make a DELETE request, ignoring any response body
    pub async fn delete(&self, path: &str) -> Result<(), ApiError> {
        let url = self.url(path);
        let rb = self.authorize(self.client.delete(&url));

        let resp = rb
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        let status = resp.status().as_u16();
        let is_success = resp.status().is_success();
        let text = resp
            .text()
            .await
            .map_err(|e| ApiError::Network(format!("failed to read body: {e}")))?;

        if !is_success {
            return Err(ApiError::Http { status, body: text });
        }

        Ok(())
    }

    async fn send_json<TReq: Serialize, TRes: DeserializeOwned>(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<&TReq>,
    ) -> Result<TRes, ApiError> {
        let url = self.url(path);
        let mut rb = self.authorize(self.client.request(method, &url));

        if let Some(body) = body {
            let body_bytes =
                serde_json::to_vec(body).map_err(|e| ApiError::Deserialize(e.to_string()))?;
            rb = rb.body(body_bytes).header("Content-Type", "application/json");
        }

        let resp = rb
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        let status = resp.status().as_u16();
        let is_success = resp.status().is_success();
        let text = resp
            .text()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        if !is_success {
            return Err(ApiError::Http { status, body: text });
        }

        if text.is_empty() {
            serde_json::from_str("null").map_err(|e| ApiError::Deserialize(e.to_string()))
        } else {
            serde_json::from_str(&text).map_err(|e| ApiError::Deserialize(e.to_string()))
        }
    }

    // --- Etablissements ---

    pub async fn create_etablissement(
        &self,
        data: &CreateEtablissement,
    ) -> Result<ApiResponse<Etablissement>, ApiError> {
        self.post_json("/etablissements", data).await
    }

    pub async fn get_etablissements(&self) -> Result<ApiResponse<Vec<Etablissement>>, ApiError> {
        self.get_json("/etablissements").await
    }

    pub async fn get_etablissement(
        &self,
        id: &str,
    ) -> Result<ApiResponse<Etablissement>, ApiError> {
        self.get_json(&format!("/etablissements/{id}")).await
    }

    pub async fn update_etablissement(
        &self,
        id: &str,
        data: &UpdateEtablissement,
    ) -> Result<ApiResponse<Etablissement>, ApiError> {
        self.put_json(&format!("/etablissements/{id}"), data).await
    }

    pub async fn delete_etablissement(&self, id: &str) -> Result<(), ApiError> {
        self.delete(&format!("/etablissements/{id}")).await
    }

    pub async fn activer_etablissement(
        &self,
        id: &str,
    ) -> Result<ApiResponse<Etablissement>, ApiError> {
        self.put_empty(&format!("/etablissements/{id}/activer")).await
    }

    pub async fn desactiver_etablissement(
        &self,
        id: &str,
    ) -> Result<ApiResponse<Etablissement>, ApiError> {
        self.put_empty(&format!("/etablissements/{id}/desactiver"))
            .await
    }

    pub async fn search_etablissements(
        &self,
        query: &str,
    ) -> Result<ApiResponse<Vec<Etablissement>>, ApiError> {
        self.get_json(&format!(
            "/etablissements/search?q={}",
            urlencoding::encode(query)
        ))
        .await
    }

    pub async fn get_stats(
        &self,
        id: &str,
        debut: &chrono::DateTime<chrono::Utc>,
        fin: &chrono::DateTime<chrono::Utc>,
    ) -> Result<ApiResponse<EtablissementStats>, ApiError> {
        self.get_json(&format!(
            "/etablissements/{id}/stats?debut={}&fin={}",
            urlencoding::encode(&debut.to_rfc3339()),
            urlencoding::encode(&fin.to_rfc3339()),
        ))
        .await
    }

    // --- Utilisateurs ---

    pub async fn get_utilisateurs(
        &self,
        etablissement_id: &str,
    ) -> Result<ApiResponse<Vec<Utilisateur>>, ApiError> {
        self.get_json(&format!("/etablissements/{etablissement_id}/utilisateurs"))
            .await
    }

    pub async fn create_utilisateur(
        &self,
        etablissement_id: &str,
        data: &CreateUtilisateur,
    ) -> Result<ApiResponse<Utilisateur>, ApiError> {
        self.post_json(
            &format!("/etablissements/{etablissement_id}/utilisateurs"),
            data,
        )
        .await
    }

    pub async fn delete_utilisateur(
        &self,
        etablissement_id: &str,
        user_id: &str,
    ) -> Result<(), ApiError> {
        self.delete(&format!(
            "/etablissements/{etablissement_id}/utilisateurs/{user_id}"
        ))
        .await
    }

    // --- Demandes de transport ---

    pub async fn get_demandes(
        &self,
        etablissement_id: &str,
        filtres: &FiltresDemandes,
    ) -> Result<ApiResponse<Vec<DemandeTransport>>, ApiError> {
        let mut query = Vec::new();
        if let Some(statut) = &filtres.statut {
            // Enum wire names are plain identifiers, no escaping needed
            let value = serde_json::to_string(statut)
                .map_err(|e| ApiError::Deserialize(e.to_string()))?;
            query.push(format!("statut={}", value.trim_matches('"')));
        }
        if let Some(debut) = &filtres.debut {
            query.push(format!("debut={}", urlencoding::encode(&debut.to_rfc3339())));
        }
        if let Some(fin) = &filtres.fin {
            query.push(format!("fin={}", urlencoding::encode(&fin.to_rfc3339())));
        }

        let path = if query.is_empty() {
            format!("/etablissements/{etablissement_id}/demandes")
        } else {
            format!(
                "/etablissements/{etablissement_id}/demandes?{}",
                query.join("&")
            )
        };
        self.get_json(&path).await
    }

    pub async fn create_demande(
        &self,
        etablissement_id: &str,
        data: &CreateDemandeTransport,
    ) -> Result<ApiResponse<DemandeTransport>, ApiError> {
        self.post_json(&format!("/etablissements/{etablissement_id}/demandes"), data)
            .await
    }

    pub async fn update_demande_statut(
        &self,
        etablissement_id: &str,
        demande_id: &str,
        data: &UpdateDemandeStatut,
    ) -> Result<ApiResponse<DemandeTransport>, ApiError> {
        self.put_json(
            &format!("/etablissements/{etablissement_id}/demandes/{demande_id}/statut"),
            data,
        )
        .await
    }

    // --- Messages ---

    /// Create a chat message under a facility. The persisted message (with
    /// server-assigned id and timestamp) comes back in the response; the
    /// backend also rebroadcasts it over the realtime channel.
    pub async fn create_message(
        &self,
        etablissement_id: &str,
        data: &CreateMessage,
    ) -> Result<ApiResponse<Message>, ApiError> {
        self.post_json(&format!("/etablissements/{etablissement_id}/messages"), data)
            .await
    }
}

impl Default for ApiClient {
    fn default() -> Self {
        Self::new()
    }
}
