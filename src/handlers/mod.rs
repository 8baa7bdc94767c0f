// Authentication route table and the handlers behind it

pub mod auth;
pub mod routes;

pub use auth::{AuthController, AuthRequest, SignupInput, UnavailableController};
pub use routes::{auth_routes, Action, HttpMethod, RouteSpec, Stage, AUTH_ROUTES};
