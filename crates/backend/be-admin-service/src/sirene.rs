//! Lookup of French businesses in the national SIRENE registry.
//!
//! The registry uses OAuth2 client credentials. Access tokens are cached in
//! a [`TokenCache`]; the lock is held across a refresh so that concurrent
//! searches share one token request.

use std::future::Future;
use std::time::{Duration, Instant};

use axum::http::StatusCode;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use url::Url;

pub const DEFAULT_TOKEN_URL: &str = "https://api.insee.fr/token";
pub const DEFAULT_API_URL: &str = "https://api.insee.fr/entreprises/sirene/V3";
pub const DEFAULT_LIMIT: u32 = 10;
pub const MAX_LIMIT: u32 = 20;

const REFRESH_MARGIN: Duration = Duration::from_secs(30);
const MIN_TOKEN_LIFETIME_SECS: u64 = 60;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Business registry is not configured: set INSEE_CLIENT_ID and INSEE_CLIENT_SECRET")]
    NotConfigured,

    #[error("Provide siret, q, or name with postalCode/city")]
    EmptyQuery,

    #[error("A SIRET is 14 digits")]
    InvalidSiret,

    #[error("Registry answered {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("Registry request failed: {0}")]
    Http(#[from] reqwest::Error),
}

impl RegistryError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            RegistryError::NotConfigured => StatusCode::SERVICE_UNAVAILABLE,
            RegistryError::EmptyQuery | RegistryError::InvalidSiret => StatusCode::BAD_REQUEST,
            RegistryError::Upstream { .. } | RegistryError::Http(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: SecretString,
}

#[derive(Debug, Clone)]
pub struct RegistryConfig {
    pub credentials: Option<Credentials>,
    pub token_url: String,
    pub api_url: String,
}

impl RegistryConfig {
    /// Missing credentials are not an error here: searches answer 503.
    pub fn from_env() -> Self {
        let non_empty = |name: &str| {
            std::env::var(name)
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let credentials = match (non_empty("INSEE_CLIENT_ID"), non_empty("INSEE_CLIENT_SECRET")) {
            (Some(client_id), Some(secret)) => Some(Credentials {
                client_id,
                client_secret: SecretString::from(secret),
            }),
            _ => None,
        };

        Self {
            credentials,
            token_url: non_empty("INSEE_TOKEN_URL").unwrap_or_else(|| DEFAULT_TOKEN_URL.into()),
            api_url: non_empty("INSEE_API_URL").unwrap_or_else(|| DEFAULT_API_URL.into()),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct IssuedToken {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: u64,
}

struct CachedToken {
    token: String,
    expires_at: Instant,
}

#[derive(Default)]
pub struct TokenCache {
    slot: Mutex<Option<CachedToken>>,
}

impl TokenCache {
    pub async fn get_or_refresh<F, Fut>(&self, fetch: F) -> Result<String, RegistryError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<IssuedToken, RegistryError>>,
    {
        self.get_or_refresh_at(Instant::now(), fetch).await
    }

    async fn get_or_refresh_at<F, Fut>(&self, now: Instant, fetch: F) -> Result<String, RegistryError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<IssuedToken, RegistryError>>,
    {
        let mut slot = self.slot.lock().await;
        if let Some(cached) = slot.as_ref()
            && cached.expires_at > now + REFRESH_MARGIN
        {
            return Ok(cached.token.clone());
        }

        let issued = fetch().await?;
        let lifetime = Duration::from_secs(issued.expires_in.max(MIN_TOKEN_LIFETIME_SECS));
        *slot = Some(CachedToken {
            token: issued.access_token.clone(),
            expires_at: now + lifetime,
        });
        tracing::debug!(lifetime_secs = lifetime.as_secs(), "Registry token refreshed");
        Ok(issued.access_token)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchParams {
    pub siret: Option<String>,
    pub q: Option<String>,
    pub name: Option<String>,
    #[serde(alias = "postalCode")]
    pub postal_code: Option<String>,
    pub city: Option<String>,
    pub limit: Option<u32>,
}

impl SearchParams {
    pub fn limit(&self) -> u32 {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }
}

fn trimmed(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn escape(value: &str) -> String {
    value.replace('"', "\\\"")
}

/// Registry query syntax for the given filters. A raw `q` wins over the
/// structured fields; `None` when nothing was given.
pub fn build_query(params: &SearchParams) -> Option<String> {
    if let Some(q) = trimmed(&params.q) {
        return Some(q.to_string());
    }

    let mut parts = Vec::new();
    if let Some(name) = trimmed(&params.name) {
        let name = escape(name);
        parts.push(format!(
            "(denominationUniteLegale:\"{name}\" OR denominationUsuelleEtablissement:\"{name}\" OR enseigne1Etablissement:\"{name}\")"
        ));
    }
    if let Some(postal_code) = trimmed(&params.postal_code) {
        parts.push(format!("codePostalEtablissement:{postal_code}"));
    }
    if let Some(city) = trimmed(&params.city) {
        parts.push(format!("libelleCommuneEtablissement:\"{}\"", escape(city)));
    }

    (!parts.is_empty()).then(|| parts.join(" AND "))
}

/// Intra-community VAT number derived from a nine-digit SIREN.
pub fn vat_number(siren: &str) -> Option<String> {
    let siren: String = siren.chars().filter(|c| !c.is_whitespace()).collect();
    if siren.len() != 9 || !siren.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let n: u64 = siren.parse().ok()?;
    let key = (12 + 3 * (n % 97)) % 97;
    Some(format!("FR{key:02}{siren}"))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct UniteLegale {
    siren: Option<String>,
    denomination_unite_legale: Option<String>,
    denomination_usuelle1_unite_legale: Option<String>,
    nom_unite_legale: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct Adresse {
    numero_voie_etablissement: Option<String>,
    indice_repetition_etablissement: Option<String>,
    type_voie_etablissement: Option<String>,
    libelle_voie_etablissement: Option<String>,
    code_postal_etablissement: Option<String>,
    libelle_commune_etablissement: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct Etablissement {
    siret: Option<String>,
    unite_legale: UniteLegale,
    adresse_etablissement: Adresse,
    denomination_usuelle_etablissement: Option<String>,
    enseigne1_etablissement: Option<String>,
    etat_administratif_etablissement: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SearchResponse {
    etablissements: Vec<Etablissement>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LookupResponse {
    etablissement: Option<Etablissement>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BusinessRecord {
    pub siret: Option<String>,
    pub siren: Option<String>,
    pub legal_name: Option<String>,
    pub address: Option<String>,
    pub postal_code: Option<String>,
    pub city: Option<String>,
    pub vat_number: Option<String>,
    pub active: Option<String>,
}

impl From<Etablissement> for BusinessRecord {
    fn from(et: Etablissement) -> Self {
        let siren = et
            .unite_legale
            .siren
            .clone()
            .or_else(|| et.siret.as_ref().and_then(|s| s.get(..9)).map(str::to_string));

        let unite = et.unite_legale;
        let legal_name = unite
            .denomination_unite_legale
            .or(unite.denomination_usuelle1_unite_legale)
            .or(unite.nom_unite_legale)
            .or(et.denomination_usuelle_etablissement)
            .or(et.enseigne1_etablissement);

        let addr = et.adresse_etablissement;
        let street = [
            addr.numero_voie_etablissement,
            addr.indice_repetition_etablissement,
            addr.type_voie_etablissement,
            addr.libelle_voie_etablissement,
        ]
        .into_iter()
        .flatten()
        .filter(|part| !part.trim().is_empty())
        .collect::<Vec<_>>()
        .join(" ");

        BusinessRecord {
            vat_number: siren.as_deref().and_then(vat_number),
            siret: et.siret,
            siren,
            legal_name,
            address: (!street.is_empty()).then_some(street),
            postal_code: addr.code_postal_etablissement,
            city: addr.libelle_commune_etablissement,
            active: et.etat_administratif_etablissement,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResults {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    pub results: Vec<BusinessRecord>,
}

pub struct RegistryClient {
    http: reqwest::Client,
    config: RegistryConfig,
    tokens: TokenCache,
}

impl RegistryClient {
    pub fn new(config: RegistryConfig) -> Result<Self, RegistryError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            config,
            tokens: TokenCache::default(),
        })
    }

    pub fn is_configured(&self) -> bool {
        self.config.credentials.is_some()
    }

    async fn access_token(&self) -> Result<String, RegistryError> {
        let credentials = self
            .config
            .credentials
            .as_ref()
            .ok_or(RegistryError::NotConfigured)?;

        let http = &self.http;
        let token_url = self.config.token_url.as_str();
        self.tokens
            .get_or_refresh(move || async move {
                let response = http
                    .post(token_url)
                    .basic_auth(
                        &credentials.client_id,
                        Some(credentials.client_secret.expose_secret()),
                    )
                    .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .header(ACCEPT, "application/json")
                    .body("grant_type=client_credentials")
                    .send()
                    .await?;
                let issued: IssuedToken = ensure_success(response).await?.json().await?;
                Ok::<_, RegistryError>(issued)
            })
            .await
    }

    pub async fn search(&self, params: &SearchParams) -> Result<SearchResults, RegistryError> {
        if !self.is_configured() {
            return Err(RegistryError::NotConfigured);
        }

        if let Some(siret) = trimmed(&params.siret) {
            if siret.len() != 14 || !siret.chars().all(|c| c.is_ascii_digit()) {
                return Err(RegistryError::InvalidSiret);
            }
            let token = self.access_token().await?;
            let response = self
                .http
                .get(format!("{}/siret/{siret}", self.config.api_url))
                .bearer_auth(token)
                .header(ACCEPT, "application/json")
                .send()
                .await?;
            let body: LookupResponse = ensure_success(response).await?.json().await?;
            return Ok(SearchResults {
                query: None,
                results: body.etablissement.map(BusinessRecord::from).into_iter().collect(),
            });
        }

        let query = build_query(params).ok_or(RegistryError::EmptyQuery)?;
        let mut url = Url::parse(&format!("{}/siret", self.config.api_url)).map_err(|e| {
            RegistryError::Upstream {
                status: 0,
                body: format!("invalid registry URL: {e}"),
            }
        })?;
        url.query_pairs_mut()
            .append_pair("q", &query)
            .append_pair("nombre", &params.limit().to_string());

        let token = self.access_token().await?;
        let response = self
            .http
            .get(url)
            .bearer_auth(token)
            .header(ACCEPT, "application/json")
            .send()
            .await?;
        let body: SearchResponse = ensure_success(response).await?.json().await?;

        tracing::debug!(%query, results = body.etablissements.len(), "Registry search done");

        Ok(SearchResults {
            query: Some(query),
            results: body.etablissements.into_iter().map(BusinessRecord::from).collect(),
        })
    }
}

async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, RegistryError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(RegistryError::Upstream {
        status: status.as_u16(),
        body: body.chars().take(500).collect(),
    })
}
