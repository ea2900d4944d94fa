use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use warp::http::StatusCode;
use warp::reply::{self, Json, WithStatus};
use warp::Filter;

use crate::aggregator::{Aggregator, LoadOutcome};
use crate::api::view::{DashboardView, PatientView};

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    pub status: String,
    pub message: String,
    pub data: Option<serde_json::Value>,
}

impl ApiResponse {
    fn success(message: impl Into<String>, data: serde_json::Value) -> Self {
        ApiResponse {
            status: "success".to_string(),
            message: message.into(),
            data: Some(data),
        }
    }

    fn error(message: impl Into<String>) -> Self {
        ApiResponse {
            status: "error".to_string(),
            message: message.into(),
            data: None,
        }
    }
}

fn respond(response: &ApiResponse, status: StatusCode) -> WithStatus<Json> {
    reply::with_status(reply::json(response), status)
}

pub struct RestApi {
    aggregator: Arc<Aggregator>,
}

impl RestApi {
    pub fn new(aggregator: Arc<Aggregator>) -> Self {
        RestApi { aggregator }
    }

    pub fn routes(
        &self,
    ) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
        let cors = warp::cors()
            .allow_any_origin()
            .allow_methods(vec!["GET", "POST"]);

        health()
            .or(self.get_dashboard())
            .or(self.search_patients())
            .or(self.load_patient())
            .with(cors)
    }

    fn get_dashboard(
        &self,
    ) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
        let aggregator = Arc::clone(&self.aggregator);

        warp::path!("api" / "dashboard")
            .and(warp::get())
            .and_then(move || {
                let aggregator = Arc::clone(&aggregator);
                async move {
                    let state = aggregator.state().await;
                    let view = DashboardView::from_state(&state, Utc::now().date_naive());
                    Ok::<Json, Infallible>(reply::json(&view))
                }
            })
    }

    fn search_patients(
        &self,
    ) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
        let aggregator = Arc::clone(&self.aggregator);

        warp::path!("api" / "patients")
            .and(warp::get())
            .and(warp::query::<SearchParams>())
            .and_then(move |params: SearchParams| {
                let aggregator = Arc::clone(&aggregator);
                async move {
                    let name = params.name.trim();
                    if name.is_empty() {
                        let response = ApiResponse::error("Query parameter 'name' is empty");
                        return Ok::<_, Infallible>(respond(&response, StatusCode::BAD_REQUEST));
                    }

                    match aggregator.search_patients(name).await {
                        Ok(patients) => {
                            let today = Utc::now().date_naive();
                            let views: Vec<PatientView> = patients
                                .iter()
                                .map(|patient| PatientView::new(patient, today))
                                .collect();
                            let response = ApiResponse::success(
                                format!("{} patients found", views.len()),
                                serde_json::json!(views),
                            );
                            Ok(respond(&response, StatusCode::OK))
                        }
                        Err(e) => {
                            let response =
                                ApiResponse::error(format!("FHIR server unavailable: {}", e));
                            Ok(respond(&response, StatusCode::BAD_GATEWAY))
                        }
                    }
                }
            })
    }

    fn load_patient(
        &self,
    ) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
        let aggregator = Arc::clone(&self.aggregator);

        warp::path!("api" / "patients" / String / "load")
            .and(warp::post())
            .and_then(move |patient_id: String| {
                let aggregator = Arc::clone(&aggregator);
                async move {
                    let reply = match aggregator.load_patient(&patient_id).await {
                        Ok(LoadOutcome::Applied { revision, channels }) => {
                            let response = ApiResponse::success(
                                format!("Patient {} loaded", patient_id),
                                serde_json::json!({ "revision": revision, "channels": channels }),
                            );
                            respond(&response, StatusCode::OK)
                        }
                        Ok(LoadOutcome::Stale) => {
                            let response = ApiResponse::error(format!(
                                "Load of patient {} was superseded by a newer request",
                                patient_id
                            ));
                            respond(&response, StatusCode::CONFLICT)
                        }
                        Err(e) => {
                            let response = ApiResponse::error(format!(
                                "Could not load patient {}: {}",
                                patient_id, e
                            ));
                            respond(&response, StatusCode::BAD_GATEWAY)
                        }
                    };
                    Ok::<_, Infallible>(reply)
                }
            })
    }
}

fn health() -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::path!("api" / "health")
        .and(warp::get())
        .map(|| reply::json(&serde_json::json!({ "status": "ok" })))
}
