//! Route paths served by the router.

pub const GET_HEALTH: &str = "/health";

pub const POST_AUTH_REGISTER: &str = "/auth/register";
pub const POST_AUTH_LOGIN: &str = "/auth/login";
pub const POST_AUTH_REFRESH: &str = "/auth/refresh";
pub const POST_AUTH_LOGOUT: &str = "/auth/logout";
pub const GET_AUTH_ME: &str = "/auth/me";
pub const POST_AUTH_STATE: &str = "/auth/state";
/// `{provider}` is a registered OAuth provider name (`github`, `google`).
pub const GET_AUTH_PROVIDER_CALLBACK: &str = "/auth/{provider}/callback";

pub const POST_UPLOADS_START: &str = "/uploads/start";
pub const GET_UPLOADS_ID_STATUS: &str = "/uploads/{upload_id}/status";
pub const GET_FILES: &str = "/files";
