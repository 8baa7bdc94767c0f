pub mod security_log;

pub use security_log::{
    NewSecurityLog, Resolution, ResolvedEvent, SecurityEventKind, UnknownEventKind, UserId,
    ORIGINAL_EVENT_TYPE_KEY, UNKNOWN_CLIENT_FIELD,
};
