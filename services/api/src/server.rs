use crate::cli::ServeArgs;
use crate::infra::AppState;
use crate::routes::with_survey_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use surveyor::config::AppConfig;
use surveyor::error::AppError;
use surveyor::surveys::{InMemorySubmissionStore, InMemorySurveyStore, SurveyService};
use surveyor::telemetry;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let surveys = Arc::new(InMemorySurveyStore::default());
    let submissions = Arc::new(InMemorySubmissionStore::default());
    let survey_service = Arc::new(SurveyService::new(surveys, submissions, config.engine));

    let app = with_survey_routes(survey_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        submit_retries = config.engine.submit_retry_limit,
        "survey engine ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
