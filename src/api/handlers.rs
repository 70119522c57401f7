use crate::api::responses::{
    ErrorResponse, ForecastResponse, HealthResponse, HealthStatus, LoginResponse,
    MessageResponse, UserResponse,
};
use crate::error::AppError;
use crate::forecast::{ForecastResult, forecast_station, forecast_station_at};
use crate::ridership::Sample;
use crate::state::AppState;
use crate::stations::{Station, StationId};
use crate::users::accounts::{
    AccountError, Registration, ResendOutcome, UserUpdate, VerificationOutcome,
};
use crate::users::flows::{login_account, register_account, reset_account_password, update_account};
use crate::users::{User, UserId};
use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::{error, warn};

const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

type SharedState = Arc<RwLock<AppState>>;

pub enum ApiResponse<T> {
    Success { status: StatusCode, body: T },
    NoContent,
    Error {
        status: StatusCode,
        body: ErrorResponse,
    },
}

impl<T> ApiResponse<T> {
    fn ok(body: T) -> Self {
        ApiResponse::Success {
            status: StatusCode::OK,
            body,
        }
    }

    fn error(status: StatusCode, message: impl Into<String>) -> Self {
        ApiResponse::Error {
            status,
            body: ErrorResponse::new(message),
        }
    }

    fn internal_error(context: &str) -> Self {
        error!(context, "Internal error while handling request");
        Self::error(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR_MESSAGE)
    }

    fn rejected(status: StatusCode, reason: String) -> Self {
        warn!(%status, reason = %reason, "Rejected malformed request");
        Self::error(status, reason)
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        match self {
            ApiResponse::Success { status, body } => (status, Json(body)).into_response(),
            ApiResponse::NoContent => StatusCode::NO_CONTENT.into_response(),
            ApiResponse::Error { status, body } => (status, Json(body)).into_response(),
        }
    }
}

impl<T> From<AppError> for ApiResponse<T> {
    fn from(err: AppError) -> Self {
        match err {
            AppError::StationNotFound(id) => {
                Self::error(StatusCode::NOT_FOUND, format!("Station not found: {id}"))
            }
            AppError::StateLock => Self::internal_error("state lock poisoned"),
        }
    }
}

impl<T> From<AccountError> for ApiResponse<T> {
    fn from(err: AccountError) -> Self {
        let status = match &err {
            AccountError::EmailTaken => StatusCode::CONFLICT,
            AccountError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AccountError::EmailNotVerified { .. } => StatusCode::FORBIDDEN,
            AccountError::UserNotFound | AccountError::AccountNotFound => StatusCode::NOT_FOUND,
            AccountError::VerificationCodeExpired
            | AccountError::InvalidVerificationCode
            | AccountError::MissingParameters
            | AccountError::InvalidResetCode
            | AccountError::ResetCodeExpired => StatusCode::BAD_REQUEST,
            AccountError::VerificationEmailFailed(source)
            | AccountError::ResetEmailFailed(source) => {
                error!(error = %source, "Mail delivery failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AccountError::Password(source) => {
                error!(error = %source, "Password hashing failed");
                return Self::error(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR_MESSAGE);
            }
            AccountError::ExpiryOutOfRange => {
                return Self::internal_error("code expiry out of range");
            }
            AccountError::State(_) => {
                return Self::internal_error("state lock poisoned");
            }
        };
        let mut body = ErrorResponse::new(err.to_string());
        if let AccountError::EmailNotVerified { email } = err {
            body.email_not_verified = Some(true);
            body.email = Some(email);
        }
        ApiResponse::Error { status, body }
    }
}

impl<T> From<QueryRejection> for ApiResponse<T> {
    fn from(rejection: QueryRejection) -> Self {
        Self::rejected(rejection.status(), rejection.body_text())
    }
}

impl<T> From<PathRejection> for ApiResponse<T> {
    fn from(rejection: PathRejection) -> Self {
        Self::rejected(rejection.status(), rejection.body_text())
    }
}

impl<T> From<JsonRejection> for ApiResponse<T> {
    fn from(rejection: JsonRejection) -> Self {
        Self::rejected(rejection.status(), rejection.body_text())
    }
}

fn format_timestamp(timestamp: OffsetDateTime) -> Result<String, time::error::Format> {
    timestamp.format(&Rfc3339)
}

fn read_state(state: &SharedState) -> Result<std::sync::RwLockReadGuard<'_, AppState>, AppError> {
    state.read().map_err(|_| AppError::StateLock)
}

fn write_state(
    state: &SharedState,
) -> Result<std::sync::RwLockWriteGuard<'_, AppState>, AppError> {
    state.write().map_err(|_| AppError::StateLock)
}

// Forecast

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictQuery {
    pub station_id: StationId,
    pub minutes_ahead: Option<u32>,
}

pub async fn get_predict(
    State(state): State<SharedState>,
    query: Result<Query<PredictQuery>, QueryRejection>,
) -> impl IntoResponse {
    match query {
        Ok(Query(query)) => build_predict_response(state, query, None),
        Err(rejection) => rejection.into(),
    }
}

fn build_predict_response(
    state: SharedState,
    query: PredictQuery,
    now: Option<OffsetDateTime>,
) -> ApiResponse<ForecastResponse> {
    let result = match now {
        Some(now) => forecast_station_at(&state, query.station_id, query.minutes_ahead, now),
        None => forecast_station(&state, query.station_id, query.minutes_ahead),
    };
    match result {
        Ok(result) => match map_forecast(result) {
            Ok(body) => ApiResponse::ok(body),
            Err(_) => ApiResponse::internal_error("timestamp formatting failure"),
        },
        Err(err) => err.into(),
    }
}

fn map_forecast(result: ForecastResult) -> Result<ForecastResponse, time::error::Format> {
    Ok(ForecastResponse {
        station_id: result.station_id,
        predicted_ridership: result.predicted_ridership,
        congestion_level: result.congestion_level,
        confidence: result.confidence,
        minutes_ahead: result.minutes_ahead,
        timestamp: format_timestamp(result.timestamp)?,
    })
}

// Stations

pub async fn get_stations(State(state): State<SharedState>) -> impl IntoResponse {
    build_stations_response(state)
}

fn build_stations_response(state: SharedState) -> ApiResponse<Vec<Station>> {
    match read_state(&state) {
        Ok(guard) => ApiResponse::ok(guard.stations().all().to_vec()),
        Err(err) => err.into(),
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct RidershipQuery {
    pub year: Option<String>,
    pub month: Option<String>,
}

pub async fn get_station_ridership(
    State(state): State<SharedState>,
    path: Result<Path<StationId>, PathRejection>,
    query: Result<Query<RidershipQuery>, QueryRejection>,
) -> impl IntoResponse {
    let station_id = match path {
        Ok(Path(station_id)) => station_id,
        Err(rejection) => return ApiResponse::<Vec<Sample>>::from(rejection),
    };
    match query {
        Ok(Query(query)) => build_station_ridership_response(state, station_id, query),
        Err(rejection) => rejection.into(),
    }
}

fn build_station_ridership_response(
    state: SharedState,
    station_id: StationId,
    query: RidershipQuery,
) -> ApiResponse<Vec<Sample>> {
    let guard = match read_state(&state) {
        Ok(guard) => guard,
        Err(err) => return err.into(),
    };
    if guard.stations().get(station_id).is_none() {
        return AppError::StationNotFound(station_id).into();
    }

    let store = guard.ridership();
    let mut samples = match query.year.as_deref() {
        Some(year) => store.samples_for_station_and_year(station_id, year),
        None => match query.month.as_deref() {
            Some(month) => store.samples_for_station_and_month(station_id, month),
            None => store.samples_for_station(station_id),
        },
    };
    drop(guard);

    if query.year.is_some()
        && let Some(month) = query.month.as_deref()
    {
        samples.retain(|s| s.month == month);
    }
    ApiResponse::ok(samples)
}

// Health

pub async fn get_health(State(state): State<SharedState>) -> impl IntoResponse {
    build_health_response(state, OffsetDateTime::now_utc())
}

fn build_health_response(state: SharedState, now: OffsetDateTime) -> ApiResponse<HealthResponse> {
    let (stations, samples) = match read_state(&state) {
        Ok(guard) => (guard.stations().len(), guard.ridership().len()),
        Err(err) => return err.into(),
    };

    let timestamp = match format_timestamp(now) {
        Ok(formatted) => formatted,
        Err(_) => return ApiResponse::internal_error("timestamp formatting failure"),
    };

    let status = if stations > 0 && samples > 0 {
        HealthStatus::Ok
    } else {
        HealthStatus::Degraded
    };

    ApiResponse::ok(HealthResponse {
        status,
        stations,
        samples,
        timestamp,
    })
}

// Users

fn map_user(user: &User) -> Result<UserResponse, time::error::Format> {
    Ok(UserResponse {
        user_id: user.user_id,
        email: user.email.clone(),
        first_name: user.first_name.clone(),
        last_name: user.last_name.clone(),
        email_verified: user.email_verified,
        subscription_tier: user.subscription_tier,
        notification_preferences: user.notification_preferences,
        created_at: format_timestamp(user.created_at)?,
    })
}

fn user_response(user: &User) -> ApiResponse<UserResponse> {
    match map_user(user) {
        Ok(body) => ApiResponse::ok(body),
        Err(_) => ApiResponse::internal_error("timestamp formatting failure"),
    }
}

pub async fn get_users(State(state): State<SharedState>) -> impl IntoResponse {
    build_users_response(state)
}

fn build_users_response(state: SharedState) -> ApiResponse<Vec<UserResponse>> {
    let users = match read_state(&state) {
        Ok(guard) => guard.accounts().users().all(),
        Err(err) => return err.into(),
    };
    match users.iter().map(map_user).collect::<Result<Vec<_>, _>>() {
        Ok(body) => ApiResponse::ok(body),
        Err(_) => ApiResponse::internal_error("timestamp formatting failure"),
    }
}

pub async fn get_user(
    State(state): State<SharedState>,
    path: Result<Path<UserId>, PathRejection>,
) -> impl IntoResponse {
    match path {
        Ok(Path(user_id)) => build_user_response(state, user_id),
        Err(rejection) => rejection.into(),
    }
}

fn build_user_response(state: SharedState, user_id: UserId) -> ApiResponse<UserResponse> {
    let guard = match read_state(&state) {
        Ok(guard) => guard,
        Err(err) => return err.into(),
    };
    match guard.accounts().get(user_id) {
        Ok(user) => user_response(user),
        Err(err) => err.into(),
    }
}

pub async fn put_user(
    State(state): State<SharedState>,
    path: Result<Path<UserId>, PathRejection>,
    body: Result<Json<UserUpdate>, JsonRejection>,
) -> impl IntoResponse {
    let user_id = match path {
        Ok(Path(user_id)) => user_id,
        Err(rejection) => return ApiResponse::<UserResponse>::from(rejection),
    };
    match body {
        Ok(Json(update)) => build_update_user_response(state, user_id, update).await,
        Err(rejection) => rejection.into(),
    }
}

async fn build_update_user_response(
    state: SharedState,
    user_id: UserId,
    update: UserUpdate,
) -> ApiResponse<UserResponse> {
    match update_account(&state, user_id, update).await {
        Ok(user) => user_response(&user),
        Err(err) => err.into(),
    }
}

pub async fn delete_user(
    State(state): State<SharedState>,
    path: Result<Path<UserId>, PathRejection>,
) -> impl IntoResponse {
    match path {
        Ok(Path(user_id)) => build_delete_user_response(state, user_id),
        Err(rejection) => rejection.into(),
    }
}

fn build_delete_user_response(state: SharedState, user_id: UserId) -> ApiResponse<()> {
    match write_state(&state) {
        Ok(mut guard) => {
            guard.accounts_mut().delete(user_id);
            ApiResponse::NoContent
        }
        Err(err) => err.into(),
    }
}

pub async fn post_register(
    State(state): State<SharedState>,
    body: Result<Json<Registration>, JsonRejection>,
) -> impl IntoResponse {
    match body {
        Ok(Json(registration)) => {
            build_register_response(state, registration, OffsetDateTime::now_utc()).await
        }
        Err(rejection) => rejection.into(),
    }
}

async fn build_register_response(
    state: SharedState,
    registration: Registration,
    now: OffsetDateTime,
) -> ApiResponse<MessageResponse> {
    match register_account(&state, registration, now).await {
        Ok(user) => ApiResponse::ok(MessageResponse {
            email: Some(user.email),
            ..MessageResponse::new(
                "Registration successful! Check your email for verification code.",
            )
        }),
        Err(err) => err.into(),
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

pub async fn post_login(
    State(state): State<SharedState>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> impl IntoResponse {
    match body {
        Ok(Json(request)) => build_login_response(state, request).await,
        Err(rejection) => rejection.into(),
    }
}

async fn build_login_response(
    state: SharedState,
    request: LoginRequest,
) -> ApiResponse<LoginResponse> {
    let user = match login_account(&state, &request.email, &request.password).await {
        Ok(user) => user,
        Err(err) => return err.into(),
    };

    match map_user(&user) {
        Ok(user) => ApiResponse::ok(LoginResponse {
            message: "Login successful".to_string(),
            user,
        }),
        Err(_) => ApiResponse::internal_error("timestamp formatting failure"),
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct VerifyRequest {
    pub email: String,
    pub code: String,
}

pub async fn post_verify(
    State(state): State<SharedState>,
    body: Result<Json<VerifyRequest>, JsonRejection>,
) -> impl IntoResponse {
    match body {
        Ok(Json(request)) => build_verify_response(state, request, OffsetDateTime::now_utc()),
        Err(rejection) => rejection.into(),
    }
}

fn build_verify_response(
    state: SharedState,
    request: VerifyRequest,
    now: OffsetDateTime,
) -> ApiResponse<MessageResponse> {
    let mut guard = match write_state(&state) {
        Ok(guard) => guard,
        Err(err) => return err.into(),
    };
    match guard
        .accounts_mut()
        .verify_email(&request.email, &request.code, now)
    {
        Ok(VerificationOutcome::Verified) => ApiResponse::ok(MessageResponse {
            verified: Some(true),
            ..MessageResponse::new("Email verified successfully!")
        }),
        Ok(VerificationOutcome::AlreadyVerified) => {
            ApiResponse::ok(MessageResponse::new("Email already verified"))
        }
        Err(err) => err.into(),
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct EmailRequest {
    pub email: String,
}

pub async fn post_resend_verification(
    State(state): State<SharedState>,
    body: Result<Json<EmailRequest>, JsonRejection>,
) -> impl IntoResponse {
    match body {
        Ok(Json(request)) => build_resend_response(state, request, OffsetDateTime::now_utc()),
        Err(rejection) => rejection.into(),
    }
}

fn build_resend_response(
    state: SharedState,
    request: EmailRequest,
    now: OffsetDateTime,
) -> ApiResponse<MessageResponse> {
    let mut guard = match write_state(&state) {
        Ok(guard) => guard,
        Err(err) => return err.into(),
    };
    match guard
        .accounts_mut()
        .resend_verification(&request.email, now)
    {
        Ok(ResendOutcome::Sent) => {
            ApiResponse::ok(MessageResponse::new("Verification code resent successfully!"))
        }
        Ok(ResendOutcome::AlreadyVerified) => {
            ApiResponse::ok(MessageResponse::new("Email already verified"))
        }
        Err(err) => err.into(),
    }
}

pub async fn post_forgot_password(
    State(state): State<SharedState>,
    body: Result<Json<EmailRequest>, JsonRejection>,
) -> impl IntoResponse {
    match body {
        Ok(Json(request)) => {
            build_forgot_password_response(state, request, OffsetDateTime::now_utc())
        }
        Err(rejection) => rejection.into(),
    }
}

fn build_forgot_password_response(
    state: SharedState,
    request: EmailRequest,
    now: OffsetDateTime,
) -> ApiResponse<MessageResponse> {
    let mut guard = match write_state(&state) {
        Ok(guard) => guard,
        Err(err) => return err.into(),
    };
    match guard.accounts_mut().forgot_password(&request.email, now) {
        Ok(email) => ApiResponse::ok(MessageResponse {
            email: Some(email),
            ..MessageResponse::new("Password reset code sent to your email!")
        }),
        Err(err) => err.into(),
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub email: Option<String>,
    pub token: Option<String>,
    pub new_password: Option<String>,
}

pub async fn post_reset_password(
    State(state): State<SharedState>,
    body: Result<Json<ResetPasswordRequest>, JsonRejection>,
) -> impl IntoResponse {
    match body {
        Ok(Json(request)) => {
            build_reset_password_response(state, request, OffsetDateTime::now_utc()).await
        }
        Err(rejection) => rejection.into(),
    }
}

async fn build_reset_password_response(
    state: SharedState,
    request: ResetPasswordRequest,
    now: OffsetDateTime,
) -> ApiResponse<MessageResponse> {
    let result = reset_account_password(
        &state,
        request.email.as_deref(),
        request.token.as_deref(),
        request.new_password.as_deref(),
        now,
    )
    .await;
    match result {
        Ok(()) => ApiResponse::ok(MessageResponse::new("Password reset successfully!")),
        Err(err) => err.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AuthSettings, ForecastSettings};
    use crate::forecast::Forecaster;
    use crate::forecast::jitter::FixedJitter;
    use crate::mailer::mock::RecordingMailer;
    use crate::users::accounts::AccountService;
    use axum::http::Uri;
    use axum::http::header::CONTENT_TYPE;
    use time::macros::datetime;

    const NOW: OffsetDateTime = datetime!(2024-03-04 08:10 UTC);

    fn test_state() -> (SharedState, Arc<RecordingMailer>) {
        let mailer = Arc::new(RecordingMailer::new());
        let accounts = AccountService::new(
            mailer.clone(),
            AuthSettings {
                bcrypt_cost: 4,
                ..AuthSettings::default()
            },
        );
        let forecaster = Forecaster::new(ForecastSettings::default(), Box::new(FixedJitter(1.0)));
        let mut app_state = AppState::new(forecaster, accounts);
        app_state.stations_mut().preload();
        for (hour, riders) in [(5, 100), (6, 100), (7, 100), (8, 100)] {
            app_state.ridership_mut().insert(Sample {
                station_id: 1,
                year: "2020".to_string(),
                month: "January".to_string(),
                time: Some(format!("{hour:02}:00-{:02}:00", hour + 1)),
                entry_count: Some(riders),
                exit_count: Some(0),
            });
        }
        (Arc::new(RwLock::new(app_state)), mailer)
    }

    fn poisoned_state() -> SharedState {
        let (state, _mailer) = test_state();
        let state_for_thread = Arc::clone(&state);
        let _ = std::thread::spawn(move || {
            let _guard = state_for_thread.write().expect("lock for poison");
            panic!("poison lock");
        })
        .join();
        state
    }

    fn registration(email: &str) -> Registration {
        Registration {
            email: email.to_string(),
            password: "pa55word".to_string(),
            first_name: "Ana".to_string(),
            last_name: "Reyes".to_string(),
        }
    }

    fn expect_error<T>(response: ApiResponse<T>) -> (StatusCode, ErrorResponse) {
        match response {
            ApiResponse::Error { status, body } => (status, body),
            ApiResponse::Success { status, .. } => panic!("expected error, got {status}"),
            ApiResponse::NoContent => panic!("expected error, got no content"),
        }
    }

    fn expect_ok<T>(response: ApiResponse<T>) -> T {
        match response {
            ApiResponse::Success { status, body } => {
                assert_eq!(status, StatusCode::OK);
                body
            }
            ApiResponse::Error { status, body } => {
                panic!("expected success, got {status}: {}", body.error)
            }
            ApiResponse::NoContent => panic!("expected success, got no content"),
        }
    }

    #[test]
    fn predict_returns_forecast_with_default_lookahead() {
        let (state, _mailer) = test_state();
        let query = PredictQuery {
            station_id: 1,
            minutes_ahead: None,
        };

        let body = expect_ok(build_predict_response(state, query, Some(NOW)));

        assert_eq!(body.station_id, 1);
        assert_eq!(body.minutes_ahead, 15);
        assert_eq!(body.congestion_level, crate::forecast::CongestionLevel::Light);
        assert_eq!(body.timestamp, "2024-03-04T08:25:00Z");
    }

    #[test]
    fn predict_for_station_without_history_is_unknown() {
        let (state, _mailer) = test_state();
        let query = PredictQuery {
            station_id: 7,
            minutes_ahead: Some(30),
        };

        let body = expect_ok(build_predict_response(state, query, Some(NOW)));

        assert_eq!(body.predicted_ridership, 0);
        assert_eq!(body.congestion_level, crate::forecast::CongestionLevel::Unknown);
        assert_eq!(body.confidence, 0.0);
        assert_eq!(body.minutes_ahead, 30);
        assert_eq!(body.timestamp, "2024-03-04T08:10:00Z");
    }

    #[test]
    fn predict_returns_internal_error_when_lock_poisoned() {
        let query = PredictQuery {
            station_id: 1,
            minutes_ahead: None,
        };

        let (status, body) = expect_error(build_predict_response(poisoned_state(), query, None));

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.error, "Internal server error");
    }

    #[test]
    fn predict_query_accepts_camel_case_parameters() -> Result<(), Box<dyn std::error::Error>> {
        let uri: Uri = "/api/predict?stationId=3&minutesAhead=45".parse()?;

        let Query(query) = Query::<PredictQuery>::try_from_uri(&uri)?;

        assert_eq!(query.station_id, 3);
        assert_eq!(query.minutes_ahead, Some(45));
        Ok(())
    }

    #[test]
    fn malformed_predict_query_gets_json_error_body() -> Result<(), Box<dyn std::error::Error>> {
        for raw in [
            "/api/predict",
            "/api/predict?stationId=abc",
            "/api/predict?stationId=1&minutesAhead=-5",
        ] {
            let uri: Uri = raw.parse()?;
            let Err(rejection) = Query::<PredictQuery>::try_from_uri(&uri) else {
                panic!("{raw} should be rejected");
            };

            let (status, body) = expect_error(ApiResponse::<ForecastResponse>::from(rejection));
            assert_eq!(status, StatusCode::BAD_REQUEST, "{raw}");
            assert!(!body.error.is_empty(), "{raw}");
        }

        let uri: Uri = "/api/predict?stationId=abc".parse()?;
        let Err(rejection) = Query::<PredictQuery>::try_from_uri(&uri) else {
            panic!("non-numeric station id should be rejected");
        };
        let response = ApiResponse::<ForecastResponse>::from(rejection).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            response.headers().get(CONTENT_TYPE).map(|v| v.as_bytes()),
            Some(&b"application/json"[..])
        );
        Ok(())
    }

    #[test]
    fn stations_are_listed_in_line_order() {
        let (state, _mailer) = test_state();

        let stations = expect_ok(build_stations_response(state));

        assert_eq!(stations.len(), 13);
        assert_eq!(stations[0].name, "North Ave");
    }

    #[test]
    fn station_ridership_filters_and_rejects_unknown_station() {
        let (state, _mailer) = test_state();

        let all = expect_ok(build_station_ridership_response(
            Arc::clone(&state),
            1,
            RidershipQuery::default(),
        ));
        assert_eq!(all.len(), 4);

        let february = expect_ok(build_station_ridership_response(
            Arc::clone(&state),
            1,
            RidershipQuery {
                year: Some("2020".to_string()),
                month: Some("February".to_string()),
            },
        ));
        assert!(february.is_empty());

        let (status, _) = expect_error(build_station_ridership_response(
            state,
            99,
            RidershipQuery::default(),
        ));
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn health_is_degraded_without_ridership() {
        let (state, _mailer) = test_state();
        let body = expect_ok(build_health_response(state, NOW));
        assert_eq!(body.status, HealthStatus::Ok);
        assert_eq!(body.samples, 4);

        let empty = Arc::new(RwLock::new(AppState::default()));
        let body = expect_ok(build_health_response(empty, NOW));
        assert_eq!(body.status, HealthStatus::Degraded);
        assert_eq!(body.timestamp, "2024-03-04T08:10:00Z");
    }

    #[tokio::test]
    async fn register_then_duplicate_conflicts() {
        let (state, mailer) = test_state();

        let body = expect_ok(
            build_register_response(Arc::clone(&state), registration("ana@example.com"), NOW)
                .await,
        );
        assert_eq!(body.email.as_deref(), Some("ana@example.com"));
        assert_eq!(mailer.sent().len(), 1);

        let (status, body) = expect_error(
            build_register_response(state, registration("ana@example.com"), NOW).await,
        );
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body.error, "Email already registered");
    }

    #[tokio::test]
    async fn register_with_poisoned_lock_is_internal_error() {
        let (status, body) = expect_error(
            build_register_response(poisoned_state(), registration("ana@example.com"), NOW).await,
        );

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.error, "Internal server error");
    }

    #[tokio::test]
    async fn login_before_verification_is_forbidden() {
        let (state, _mailer) = test_state();
        expect_ok(
            build_register_response(Arc::clone(&state), registration("ana@example.com"), NOW)
                .await,
        );

        let (status, body) = expect_error(
            build_login_response(
                state,
                LoginRequest {
                    email: "ana@example.com".to_string(),
                    password: "pa55word".to_string(),
                },
            )
            .await,
        );

        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body.email_not_verified, Some(true));
        assert_eq!(body.email.as_deref(), Some("ana@example.com"));
    }

    #[tokio::test]
    async fn verify_then_login_succeeds() {
        let (state, _mailer) = test_state();
        expect_ok(
            build_register_response(Arc::clone(&state), registration("ana@example.com"), NOW)
                .await,
        );
        let code = state
            .read()
            .expect("state readable")
            .accounts()
            .users()
            .find_by_email("ana@example.com")
            .and_then(|u| u.verification_code.clone())
            .expect("code issued");

        let body = expect_ok(build_verify_response(
            Arc::clone(&state),
            VerifyRequest {
                email: "ana@example.com".to_string(),
                code,
            },
            NOW,
        ));
        assert_eq!(body.verified, Some(true));

        let body = expect_ok(
            build_login_response(
                state,
                LoginRequest {
                    email: "ana@example.com".to_string(),
                    password: "pa55word".to_string(),
                },
            )
            .await,
        );
        assert_eq!(body.message, "Login successful");
        assert!(body.user.email_verified);
    }

    #[tokio::test]
    async fn login_with_unknown_email_is_unauthorized() {
        let (state, _mailer) = test_state();

        let (status, body) =
            expect_error(build_login_response(state, LoginRequest::default()).await);

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body.error, "Invalid email or password");
    }

    #[tokio::test]
    async fn resend_mail_failure_is_internal_error() {
        let (state, mailer) = test_state();
        expect_ok(
            build_register_response(Arc::clone(&state), registration("ana@example.com"), NOW)
                .await,
        );
        mailer.set_failing(true);

        let (status, body) = expect_error(build_resend_response(
            state,
            EmailRequest {
                email: "ana@example.com".to_string(),
            },
            NOW,
        ));

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.error, "Failed to send email. Please try again later.");
    }

    #[test]
    fn forgot_password_for_unknown_email_is_not_found() {
        let (state, _mailer) = test_state();

        let (status, body) = expect_error(build_forgot_password_response(
            state,
            EmailRequest {
                email: "ghost@example.com".to_string(),
            },
            NOW,
        ));

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body.error, "No account found with that email address");
    }

    #[tokio::test]
    async fn reset_password_without_parameters_is_bad_request() {
        let (state, _mailer) = test_state();

        let (status, body) = expect_error(
            build_reset_password_response(state, ResetPasswordRequest::default(), NOW).await,
        );

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.error, "Missing required parameters");
    }

    #[test]
    fn unrepresentable_expiry_maps_to_internal_error() {
        let (status, body) = expect_error(ApiResponse::<MessageResponse>::from(
            AccountError::ExpiryOutOfRange,
        ));

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.error, "Internal server error");
    }

    #[tokio::test]
    async fn user_crud_round_trip() {
        let (state, _mailer) = test_state();
        expect_ok(
            build_register_response(Arc::clone(&state), registration("ana@example.com"), NOW)
                .await,
        );

        let users = expect_ok(build_users_response(Arc::clone(&state)));
        assert_eq!(users.len(), 1);
        let user_id = users[0].user_id;
        assert_eq!(users[0].created_at, "2024-03-04T08:10:00Z");

        let updated = expect_ok(
            build_update_user_response(
                Arc::clone(&state),
                user_id,
                UserUpdate {
                    first_name: "Ana Marie".to_string(),
                    last_name: "Reyes".to_string(),
                    ..UserUpdate::default()
                },
            )
            .await,
        );
        assert_eq!(updated.first_name, "Ana Marie");

        assert!(matches!(
            build_delete_user_response(Arc::clone(&state), user_id),
            ApiResponse::NoContent
        ));
        let (status, _) = expect_error(build_user_response(state, user_id));
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
