use crate::forecast::CongestionLevel;
use crate::stations::StationId;
use crate::users::{SubscriptionTier, UserId};
use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ForecastResponse {
    pub station_id: StationId,
    pub predicted_ridership: u64,
    pub congestion_level: CongestionLevel,
    pub confidence: f64,
    pub minutes_ahead: u32,
    pub timestamp: String,
}

#[derive(Debug, Serialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Ok,
    Degraded,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub stations: usize,
    pub samples: usize,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub user_id: UserId,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub email_verified: bool,
    pub subscription_tier: SubscriptionTier,
    pub notification_preferences: bool,
    pub created_at: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub message: String,
    pub user: UserResponse,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verified: Option<bool>,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_not_verified: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn forecast_response_uses_client_field_names() {
        let response = ForecastResponse {
            station_id: 4,
            predicted_ridership: 7671,
            congestion_level: CongestionLevel::VeryHeavy,
            confidence: 0.6,
            minutes_ahead: 15,
            timestamp: "2024-03-04T08:25:00Z".to_string(),
        };

        let value = serde_json::to_value(response).expect("serialize forecast response");
        assert_eq!(
            value,
            json!({
                "stationId": 4,
                "predictedRidership": 7671,
                "congestionLevel": "Very Heavy",
                "confidence": 0.6,
                "minutesAhead": 15,
                "timestamp": "2024-03-04T08:25:00Z"
            })
        );
    }

    #[test]
    fn error_response_omits_unset_fields() {
        let value = serde_json::to_value(ErrorResponse::new("User not found"))
            .expect("serialize error response");
        assert_eq!(value, json!({ "error": "User not found" }));
    }

    #[test]
    fn unverified_login_error_carries_flag_and_email() {
        let response = ErrorResponse {
            error: "Please verify your email before logging in".to_string(),
            email_not_verified: Some(true),
            email: Some("ana@example.com".to_string()),
        };

        let value = serde_json::to_value(response).expect("serialize error response");
        assert_eq!(value["emailNotVerified"], json!(true));
        assert_eq!(value["email"], json!("ana@example.com"));
    }

    #[test]
    fn user_response_never_has_password_field() {
        let response = UserResponse {
            user_id: 1,
            email: "ana@example.com".to_string(),
            first_name: "Ana".to_string(),
            last_name: "Reyes".to_string(),
            email_verified: true,
            subscription_tier: SubscriptionTier::Free,
            notification_preferences: true,
            created_at: "2024-05-01T09:00:00Z".to_string(),
        };

        let value = serde_json::to_value(response).expect("serialize user response");
        assert_eq!(value["subscriptionTier"], json!("FREE"));
        assert!(value.get("passwordHash").is_none());
    }
}
