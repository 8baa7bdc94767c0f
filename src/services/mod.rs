// Services for the auth backend

pub mod security_logger;

pub use security_logger::{
    DieselSecurityLogStore, FallbackRecord, LogOutcome, SecurityEvent, SecurityLogSession,
    SecurityLogStore, SecurityLogger, StoreError,
};
