use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::Url;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

use super::conversion::resource_type;
use super::resources::{bundle_resources, normalize_observation, normalize_patient};
use super::{FhirError, ObservationRecord, PatientRecord};
use crate::config::FhirConfig;

const FHIR_JSON: &str = "application/fhir+json";

/// Read-only source of patient and vital-sign data
#[async_trait]
pub trait FhirSource: Send + Sync {
    /// `GET Patient?name={name}&_count=N`
    async fn search_patients(&self, name: &str) -> Result<Vec<PatientRecord>, FhirError>;

    /// `GET Patient/{id}`
    async fn fetch_patient(&self, id: &str) -> Result<PatientRecord, FhirError>;

    /// `GET Observation?patient={id}&category=vital-signs&_sort=-date&_count=N`,
    /// newest first
    async fn fetch_vital_signs(&self, patient_id: &str)
        -> Result<Vec<ObservationRecord>, FhirError>;
}

/// FHIR R4 REST client
#[derive(Debug, Clone)]
pub struct FhirClient {
    http_client: reqwest::Client,
    base_url: Url,
    search_count: u32,
    observation_count: u32,
}

impl FhirClient {
    pub fn new(config: &FhirConfig) -> Result<Self, FhirError> {
        let cleaned = config.base_url.trim().trim_end_matches('/');
        let base_url = Url::parse(cleaned)
            .map_err(|e| FhirError::Url(format!("'{}': {}", cleaned, e)))?;

        if !matches!(base_url.scheme(), "http" | "https") || base_url.cannot_be_a_base() {
            return Err(FhirError::Url(format!(
                "'{}' must be an http or https base URL",
                cleaned
            )));
        }

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        info!("Using FHIR server at {}", base_url);

        Ok(FhirClient {
            http_client,
            base_url,
            search_count: config.search_count,
            observation_count: config.observation_count,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, FhirError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| FhirError::Url(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json(&self, url: Url, query: &[(&str, String)]) -> Result<Value, FhirError> {
        debug!("GET {} {:?}", url, query);

        let response = self
            .http_client
            .get(url)
            .query(query)
            .header(ACCEPT, FHIR_JSON)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FhirError::Status {
                status: status.as_u16(),
                url: response.url().to_string(),
            });
        }

        // Decode via bytes so a malformed body surfaces as a JSON error
        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

#[async_trait]
impl FhirSource for FhirClient {
    async fn search_patients(&self, name: &str) -> Result<Vec<PatientRecord>, FhirError> {
        let url = self.endpoint(&["Patient"])?;
        let bundle = self
            .get_json(
                url,
                &[
                    ("name", name.to_string()),
                    ("_count", self.search_count.to_string()),
                ],
            )
            .await?;

        expect_type(&bundle, "Bundle")?;
        Ok(bundle_resources(&bundle, "Patient")
            .map(normalize_patient)
            .collect())
    }

    async fn fetch_patient(&self, id: &str) -> Result<PatientRecord, FhirError> {
        let url = self.endpoint(&["Patient", id])?;
        let resource = self.get_json(url, &[]).await?;

        expect_type(&resource, "Patient")?;
        Ok(normalize_patient(&resource))
    }

    async fn fetch_vital_signs(
        &self,
        patient_id: &str,
    ) -> Result<Vec<ObservationRecord>, FhirError> {
        let url = self.endpoint(&["Observation"])?;
        let bundle = self
            .get_json(
                url,
                &[
                    ("patient", patient_id.to_string()),
                    ("category", "vital-signs".to_string()),
                    ("_sort", "-date".to_string()),
                    ("_count", self.observation_count.to_string()),
                ],
            )
            .await?;

        expect_type(&bundle, "Bundle")?;
        Ok(bundle_resources(&bundle, "Observation")
            .map(normalize_observation)
            .collect())
    }
}

fn expect_type(resource: &Value, expected: &str) -> Result<(), FhirError> {
    match resource_type(resource) {
        Some(found) if found == expected => Ok(()),
        found => Err(FhirError::UnexpectedResource {
            expected: expected.to_string(),
            received: found.unwrap_or("nothing").to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fhir::ObservationValue;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::{Arc, Mutex};
    use warp::http::{Response, StatusCode};
    use warp::Filter;

    /// Path, raw query and Accept header of each request the server saw
    type Seen = Arc<Mutex<Vec<(String, String, Option<String>)>>>;

    fn canned(path: &str) -> (StatusCode, String) {
        match path {
            "/fhir/Patient" => (
                StatusCode::OK,
                json!({
                    "resourceType": "Bundle",
                    "entry": [{"resource": {
                        "resourceType": "Patient",
                        "id": "p1",
                        "name": [{"given": ["Ada"], "family": "Lovelace"}]
                    }}]
                })
                .to_string(),
            ),
            "/fhir/Patient/p1" => (
                StatusCode::OK,
                json!({"resourceType": "Patient", "id": "p1"}).to_string(),
            ),
            "/fhir/Patient/down" => (StatusCode::SERVICE_UNAVAILABLE, "unavailable".to_string()),
            "/fhir/Patient/garbled" => (StatusCode::OK, "<html>not json</html>".to_string()),
            "/fhir/Observation" => (
                StatusCode::OK,
                json!({
                    "resourceType": "Bundle",
                    "entry": [{"resource": {
                        "resourceType": "Observation",
                        "code": {"coding": [{"code": "8867-4"}]},
                        "valueQuantity": {"value": 88, "unit": "/min"}
                    }}]
                })
                .to_string(),
            ),
            _ => (StatusCode::NOT_FOUND, String::new()),
        }
    }

    /// Serve canned FHIR responses on an ephemeral port; returns the base URL
    fn serve_fhir(seen: Seen) -> String {
        let routes = warp::path::full()
            .and(warp::query::raw().or(warp::any().map(String::new)).unify())
            .and(warp::header::optional::<String>("accept"))
            .map(move |path: warp::path::FullPath, query: String, accept: Option<String>| {
                seen.lock().unwrap().push((path.as_str().to_string(), query, accept));
                let (status, body) = canned(path.as_str());
                Response::builder().status(status).body(body).unwrap()
            });

        let (addr, server) = warp::serve(routes).bind_ephemeral(([127, 0, 0, 1], 0));
        tokio::spawn(server);
        format!("http://{}/fhir", addr)
    }

    fn local_client() -> (FhirClient, Seen) {
        let seen: Seen = Arc::new(Mutex::new(Vec::new()));
        let client = FhirClient::new(&config(&serve_fhir(Arc::clone(&seen)))).unwrap();
        (client, seen)
    }

    fn config(base_url: &str) -> FhirConfig {
        FhirConfig {
            base_url: base_url.to_string(),
            ..FhirConfig::default()
        }
    }

    #[test]
    fn test_client_creation() {
        let client = FhirClient::new(&config(" https://hapi.fhir.org/baseR4/ ")).unwrap();
        assert_eq!(client.base_url().as_str(), "https://hapi.fhir.org/baseR4");
        assert!(FhirClient::new(&config("not-a-url")).is_err());
        assert!(FhirClient::new(&config("ftp://example.org/fhir")).is_err());
    }

    #[test]
    fn test_endpoint_escapes_segments() {
        let client = FhirClient::new(&config("https://example.org/fhir/")).unwrap();

        let url = client.endpoint(&["Patient"]).unwrap();
        assert_eq!(url.as_str(), "https://example.org/fhir/Patient");

        let url = client.endpoint(&["Patient", "a/b c"]).unwrap();
        assert_eq!(url.as_str(), "https://example.org/fhir/Patient/a%2Fb%20c");
    }

    #[test]
    fn test_expect_type() {
        assert!(expect_type(&json!({"resourceType": "Bundle"}), "Bundle").is_ok());

        let err = expect_type(&json!({"resourceType": "OperationOutcome"}), "Patient").unwrap_err();
        assert!(matches!(err, FhirError::UnexpectedResource { .. }));
        assert_eq!(err.to_string(), "Expected Patient resource, received OperationOutcome");

        assert!(expect_type(&json!([]), "Patient").is_err());
    }

    #[tokio::test]
    async fn test_search_request_shape() {
        let (client, seen) = local_client();

        let patients = client.search_patients("Ada").await.unwrap();
        assert_eq!(patients.len(), 1);
        assert_eq!(patients[0].id, "p1");

        let seen = seen.lock().unwrap().clone();
        assert_eq!(
            seen,
            vec![(
                "/fhir/Patient".to_string(),
                "name=Ada&_count=10".to_string(),
                Some(FHIR_JSON.to_string()),
            )]
        );
    }

    #[tokio::test]
    async fn test_vital_signs_request_shape() {
        let (client, seen) = local_client();

        let patient = client.fetch_patient("p1").await.unwrap();
        assert_eq!(patient.id, "p1");
        let observations = client.fetch_vital_signs("p1").await.unwrap();
        assert_eq!(observations.len(), 1);
        assert_eq!(observations[0].code, "8867-4");
        assert!(matches!(
            observations[0].value,
            ObservationValue::Scalar { value, .. } if value == 88.0
        ));

        let seen = seen.lock().unwrap().clone();
        assert_eq!(seen[0].0, "/fhir/Patient/p1");
        assert_eq!(seen[0].1, "");
        assert_eq!(seen[1].0, "/fhir/Observation");
        assert_eq!(seen[1].1, "patient=p1&category=vital-signs&_sort=-date&_count=50");
        assert!(seen.iter().all(|(_, _, accept)| accept.as_deref() == Some(FHIR_JSON)));
    }

    #[tokio::test]
    async fn test_error_responses() {
        let (client, _seen) = local_client();

        let err = client.fetch_patient("down").await.unwrap_err();
        assert!(matches!(err, FhirError::Status { status: 503, .. }), "{:?}", err);

        let err = client.fetch_patient("garbled").await.unwrap_err();
        assert!(matches!(err, FhirError::Json(_)), "{:?}", err);

        let err = client.fetch_patient("nobody").await.unwrap_err();
        assert!(matches!(err, FhirError::Status { status: 404, .. }), "{:?}", err);
    }
}
