use crate::core::{Transport, TransportResponse};
use crate::domain::model::{Credentials, Endpoint};
use crate::domain::ports::{
    FindDocumentsQuery, GetDocumentsQuery, RetrieveRequest, SubmissionRequest,
};
use crate::utils::error::{Result, XdsError};
use async_trait::async_trait;
use reqwest::{Client, Identity};
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;

/// JSON envelope understood by XDS gateways that front the SOAP registry and repository.
#[derive(Serialize)]
#[serde(tag = "transaction")]
enum Envelope<'a, 'b> {
    FindDocuments(&'a FindDocumentsQuery),
    GetDocuments(&'a GetDocumentsQuery),
    RetrieveDocumentSet(&'a RetrieveRequest),
    ProvideAndRegisterDocumentSet(&'a SubmissionRequest<'b>),
}

impl Envelope<'_, '_> {
    fn name(&self) -> &'static str {
        match self {
            Envelope::FindDocuments(_) => "FindDocuments",
            Envelope::GetDocuments(_) => "GetDocuments",
            Envelope::RetrieveDocumentSet(_) => "RetrieveDocumentSet",
            Envelope::ProvideAndRegisterDocumentSet(_) => "ProvideAndRegisterDocumentSet",
        }
    }
}

/// `Transport` over HTTP(S) with JSON bodies.
///
/// Endpoints that carry credentials get a client with a TLS client identity loaded from a
/// PEM keystore (certificate chain plus unencrypted private key). Each keystore is loaded once
/// and its client reused for later calls.
#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
    client: Client,
    identity_clients: Arc<Mutex<HashMap<PathBuf, Client>>>,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self::default()
    }

    async fn client_for(&self, endpoint: &Endpoint) -> Result<Client> {
        match endpoint.credentials() {
            Some(credentials) => self.cached_client(credentials, identity_client).await,
            None => Ok(self.client.clone()),
        }
    }

    async fn cached_client<F>(&self, credentials: &Credentials, build: F) -> Result<Client>
    where
        F: FnOnce(&Credentials) -> Result<Client>,
    {
        let mut clients = self.identity_clients.lock().await;
        if let Some(client) = clients.get(credentials.keystore_path()) {
            return Ok(client.clone());
        }

        let client = build(credentials)?;
        tracing::debug!(
            "Loaded client identity from {}",
            credentials.keystore_path().display()
        );
        clients.insert(credentials.keystore_path().to_path_buf(), client.clone());
        Ok(client)
    }

    async fn exchange(
        &self,
        endpoint: &Endpoint,
        envelope: &Envelope<'_, '_>,
    ) -> Result<TransportResponse> {
        let client = self.client_for(endpoint).await?;

        tracing::debug!("POST {} to {}", envelope.name(), endpoint.uri());
        let response = client
            .post(endpoint.uri().clone())
            .json(envelope)
            .send()
            .await?;

        let status = response.status();
        tracing::debug!("{} response status: {}", envelope.name(), status);

        if !status.is_success() {
            return Err(XdsError::unavailable(format!(
                "{} answered HTTP {}",
                endpoint.uri(),
                status
            )));
        }

        Ok(response.json::<TransportResponse>().await?)
    }
}

fn identity_client(credentials: &Credentials) -> Result<Client> {
    if !credentials.keystore_type().eq_ignore_ascii_case("PEM") {
        return Err(XdsError::config(format!(
            "keystore type '{}' is not supported, convert the keystore to PEM",
            credentials.keystore_type()
        )));
    }

    let pem = std::fs::read(credentials.keystore_path()).map_err(|e| {
        XdsError::config(format!(
            "cannot read keystore '{}': {}",
            credentials.keystore_path().display(),
            e
        ))
    })?;
    let identity = Identity::from_pem(&pem)
        .map_err(|e| XdsError::config(format!("invalid keystore: {}", e)))?;

    Ok(Client::builder().identity(identity).build()?)
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send_find_documents_query(
        &self,
        endpoint: &Endpoint,
        query: &FindDocumentsQuery,
    ) -> Result<TransportResponse> {
        self.exchange(endpoint, &Envelope::FindDocuments(query)).await
    }

    async fn send_get_documents_query(
        &self,
        endpoint: &Endpoint,
        query: &GetDocumentsQuery,
    ) -> Result<TransportResponse> {
        self.exchange(endpoint, &Envelope::GetDocuments(query)).await
    }

    async fn send_retrieve_request(
        &self,
        endpoint: &Endpoint,
        request: &RetrieveRequest,
    ) -> Result<TransportResponse> {
        self.exchange(endpoint, &Envelope::RetrieveDocumentSet(request))
            .await
    }

    async fn send_submission(
        &self,
        endpoint: &Endpoint,
        request: &SubmissionRequest<'_>,
    ) -> Result<TransportResponse> {
        self.exchange(endpoint, &Envelope::ProvideAndRegisterDocumentSet(request))
            .await
    }
}
