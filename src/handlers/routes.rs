// Route table for the authentication flows
// Each entry lists the stages that must run, in order, before the action

use axum::{
    middleware::from_fn_with_state,
    routing::{on, MethodFilter, MethodRouter},
    Router,
};

use crate::{
    app::AppState,
    handlers::auth,
    middleware::{auth_middleware, otp_rate_limit, validate_signup_input},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

impl HttpMethod {
    fn filter(self) -> MethodFilter {
        match self {
            HttpMethod::Get => MethodFilter::GET,
            HttpMethod::Post => MethodFilter::POST,
        }
    }
}

/// Middleware that can sit in front of an action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    ValidateSignupInput,
    OtpRateLimit,
    Authenticate,
}

/// Controller action terminating a route
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    InitiateSignup,
    VerifySignup,
    InitiateLogin,
    VerifyLogin,
    CompleteProfile,
    VerifyToken,
    RequestPasswordReset,
    ResetPassword,
}

#[derive(Debug, Clone, Copy)]
pub struct RouteSpec {
    pub method: HttpMethod,
    pub path: &'static str,
    /// Executed first to last before `action`
    pub stages: &'static [Stage],
    pub action: Action,
}

pub static AUTH_ROUTES: &[RouteSpec] = &[
    RouteSpec {
        method: HttpMethod::Post,
        path: "/signup",
        stages: &[Stage::ValidateSignupInput],
        action: Action::InitiateSignup,
    },
    RouteSpec {
        method: HttpMethod::Post,
        path: "/verify",
        stages: &[Stage::OtpRateLimit],
        action: Action::VerifySignup,
    },
    RouteSpec {
        method: HttpMethod::Post,
        path: "/login",
        stages: &[],
        action: Action::InitiateLogin,
    },
    RouteSpec {
        method: HttpMethod::Post,
        path: "/verify-login",
        stages: &[Stage::OtpRateLimit],
        action: Action::VerifyLogin,
    },
    RouteSpec {
        method: HttpMethod::Post,
        path: "/profile",
        stages: &[Stage::Authenticate],
        action: Action::CompleteProfile,
    },
    RouteSpec {
        method: HttpMethod::Get,
        path: "/verify-token",
        stages: &[],
        action: Action::VerifyToken,
    },
    // Password reset
    RouteSpec {
        method: HttpMethod::Post,
        path: "/forgot-password",
        stages: &[],
        action: Action::RequestPasswordReset,
    },
    RouteSpec {
        method: HttpMethod::Post,
        path: "/reset-password",
        stages: &[Stage::OtpRateLimit],
        action: Action::ResetPassword,
    },
];

impl Stage {
    fn wrap(self, router: MethodRouter<AppState>, state: &AppState) -> MethodRouter<AppState> {
        match self {
            Stage::ValidateSignupInput => {
                router.route_layer(from_fn_with_state(state.clone(), validate_signup_input))
            },
            Stage::OtpRateLimit => {
                router.route_layer(from_fn_with_state(state.clone(), otp_rate_limit))
            },
            Stage::Authenticate => {
                router.route_layer(from_fn_with_state(state.clone(), auth_middleware))
            },
        }
    }
}

impl RouteSpec {
    fn method_router(&self, state: &AppState) -> MethodRouter<AppState> {
        let filter = self.method.filter();
        let action: MethodRouter<AppState> = match self.action {
            Action::InitiateSignup => on(filter, auth::initiate_signup),
            Action::VerifySignup => on(filter, auth::verify_signup),
            Action::InitiateLogin => on(filter, auth::initiate_login),
            Action::VerifyLogin => on(filter, auth::verify_login),
            Action::CompleteProfile => on(filter, auth::complete_profile),
            Action::VerifyToken => on(filter, auth::verify_token),
            Action::RequestPasswordReset => on(filter, auth::request_password_reset),
            Action::ResetPassword => on(filter, auth::reset_password),
        };

        // The last layer added runs first, so wrap from the innermost stage out
        self.stages
            .iter()
            .rev()
            .fold(action, |router, stage| stage.wrap(router, state))
    }
}

/// Authentication routes built from `AUTH_ROUTES`
pub fn auth_routes(state: &AppState) -> Router<AppState> {
    AUTH_ROUTES.iter().fold(Router::new(), |router, route| {
        router.route(route.path, route.method_router(state))
    })
}
