// Security audit log records and the closed set of event kinds

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use crate::schema::security_logs;

/// Integer primary key of the users table
pub type UserId = i32;

/// Value stored when the caller did not supply an IP address or user agent
pub const UNKNOWN_CLIENT_FIELD: &str = "unknown";

/// Details key holding the event name exactly as the caller passed it
pub const ORIGINAL_EVENT_TYPE_KEY: &str = "originalEventType";

/// Every event kind a security log row may carry.
///
/// `Null` is the sentinel used for names that are neither a kind nor a
/// legacy alias.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SecurityEventKind {
    // Auth
    SignupInitiated,
    AccountVerification,
    FailedLoginAttempt,
    SuccessfulLogin,
    LoginOtpSent,
    FailedLoginOtp,
    PasswordResetRequested,
    PasswordResetCompleted,
    ProfileCompleted,
    // User
    ProfileUpdate,
    MfaEnabled,
    MfaDisabled,
    // Asset
    AssetCreated,
    AssetUpdated,
    AssetDeleted,
    AssetTransfer,
    // Account
    AccountCreated,
    AccountUpdated,
    AccountDeleted,
    // Transaction
    TransactionInitiated,
    TransactionCompleted,
    TransactionFailed,
    // Loan
    LoanApplication,
    LoanApproved,
    LoanRejected,
    LoanRepaid,
    // Investment
    InvestmentCreated,
    InvestmentUpdated,
    InvestmentClosed,
    // Other
    SuspiciousActivity,
    Null,
}

/// How a free-form event name was turned into a kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// The name is a kind
    Exact,
    /// The name is a legacy alias for a kind
    Aliased,
    /// The name is unknown and was forced to `Null`
    Unrecognized,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedEvent {
    pub kind: SecurityEventKind,
    pub resolution: Resolution,
}

impl SecurityEventKind {
    pub const ALL: [SecurityEventKind; 31] = [
        Self::SignupInitiated,
        Self::AccountVerification,
        Self::FailedLoginAttempt,
        Self::SuccessfulLogin,
        Self::LoginOtpSent,
        Self::FailedLoginOtp,
        Self::PasswordResetRequested,
        Self::PasswordResetCompleted,
        Self::ProfileCompleted,
        Self::ProfileUpdate,
        Self::MfaEnabled,
        Self::MfaDisabled,
        Self::AssetCreated,
        Self::AssetUpdated,
        Self::AssetDeleted,
        Self::AssetTransfer,
        Self::AccountCreated,
        Self::AccountUpdated,
        Self::AccountDeleted,
        Self::TransactionInitiated,
        Self::TransactionCompleted,
        Self::TransactionFailed,
        Self::LoanApplication,
        Self::LoanApproved,
        Self::LoanRejected,
        Self::LoanRepaid,
        Self::InvestmentCreated,
        Self::InvestmentUpdated,
        Self::InvestmentClosed,
        Self::SuspiciousActivity,
        Self::Null,
    ];

    /// Name stored in the `event_type` column
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SignupInitiated => "SIGNUP_INITIATED",
            Self::AccountVerification => "ACCOUNT_VERIFICATION",
            Self::FailedLoginAttempt => "FAILED_LOGIN_ATTEMPT",
            Self::SuccessfulLogin => "SUCCESSFUL_LOGIN",
            Self::LoginOtpSent => "LOGIN_OTP_SENT",
            Self::FailedLoginOtp => "FAILED_LOGIN_OTP",
            Self::PasswordResetRequested => "PASSWORD_RESET_REQUESTED",
            Self::PasswordResetCompleted => "PASSWORD_RESET_COMPLETED",
            Self::ProfileCompleted => "PROFILE_COMPLETED",
            Self::ProfileUpdate => "PROFILE_UPDATE",
            Self::MfaEnabled => "MFA_ENABLED",
            Self::MfaDisabled => "MFA_DISABLED",
            Self::AssetCreated => "ASSET_CREATED",
            Self::AssetUpdated => "ASSET_UPDATED",
            Self::AssetDeleted => "ASSET_DELETED",
            Self::AssetTransfer => "ASSET_TRANSFER",
            Self::AccountCreated => "ACCOUNT_CREATED",
            Self::AccountUpdated => "ACCOUNT_UPDATED",
            Self::AccountDeleted => "ACCOUNT_DELETED",
            Self::TransactionInitiated => "TRANSACTION_INITIATED",
            Self::TransactionCompleted => "TRANSACTION_COMPLETED",
            Self::TransactionFailed => "TRANSACTION_FAILED",
            Self::LoanApplication => "LOAN_APPLICATION",
            Self::LoanApproved => "LOAN_APPROVED",
            Self::LoanRejected => "LOAN_REJECTED",
            Self::LoanRepaid => "LOAN_REPAID",
            Self::InvestmentCreated => "INVESTMENT_CREATED",
            Self::InvestmentUpdated => "INVESTMENT_UPDATED",
            Self::InvestmentClosed => "INVESTMENT_CLOSED",
            Self::SuspiciousActivity => "SUSPICIOUS_ACTIVITY",
            Self::Null => "NULL",
        }
    }

    /// Exact, case-sensitive lookup of a kind by its stored name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|kind| kind.as_str() == name)
    }

    /// Names emitted by older callers that map onto a current kind
    pub fn from_legacy_alias(name: &str) -> Option<Self> {
        match name {
            "UNAUTHENTICATED_ACCESS" => Some(Self::SuspiciousActivity),
            "EXPIRED_TOKEN_ATTEMPT" | "INVALID_TOKEN_ATTEMPT" => Some(Self::FailedLoginAttempt),
            _ => None,
        }
    }

    /// Map any event name onto a kind. Aliases win over the kind table and
    /// anything unknown becomes `Null`.
    pub fn resolve(name: &str) -> ResolvedEvent {
        if let Some(kind) = Self::from_legacy_alias(name) {
            return ResolvedEvent {
                kind,
                resolution: Resolution::Aliased,
            };
        }

        match Self::from_name(name) {
            Some(kind) => ResolvedEvent {
                kind,
                resolution: Resolution::Exact,
            },
            None => ResolvedEvent {
                kind: Self::Null,
                resolution: Resolution::Unrecognized,
            },
        }
    }
}

impl fmt::Display for SecurityEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown security event kind: {0}")]
pub struct UnknownEventKind(pub String);

impl FromStr for SecurityEventKind {
    type Err = UnknownEventKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| UnknownEventKind(s.to_string()))
    }
}

/// Row written to `security_logs`
#[derive(Debug, Clone, PartialEq, Insertable, Serialize)]
#[diesel(table_name = security_logs)]
pub struct NewSecurityLog {
    pub event_type: String,
    pub details: Value,
    pub ip_address: String,
    pub user_agent: String,
    pub user_id: Option<UserId>,
    pub created_at: DateTime<Utc>,
}

impl NewSecurityLog {
    pub fn new(
        kind: SecurityEventKind,
        original_event_type: &str,
        details: Map<String, Value>,
        ip_address: Option<String>,
        user_agent: Option<String>,
        user_id: Option<UserId>,
    ) -> Self {
        let mut details = details;
        details.insert(
            ORIGINAL_EVENT_TYPE_KEY.to_string(),
            Value::String(original_event_type.to_string()),
        );

        Self {
            event_type: kind.as_str().to_string(),
            details: Value::Object(details),
            ip_address: ip_address.unwrap_or_else(|| UNKNOWN_CLIENT_FIELD.to_string()),
            user_agent: user_agent.unwrap_or_else(|| UNKNOWN_CLIENT_FIELD.to_string()),
            user_id,
            created_at: Utc::now(),
        }
    }

    /// Kind stored in this row
    pub fn kind(&self) -> Option<SecurityEventKind> {
        SecurityEventKind::from_name(&self.event_type)
    }

    /// Whether the row is linked to a user
    pub fn is_associated(&self) -> bool {
        self.user_id.is_some()
    }
}
