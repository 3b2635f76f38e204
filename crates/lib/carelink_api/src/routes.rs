//! Route paths.

pub const POST_USER_LOGIN: &str = "/user/login";
pub const POST_USER_REGISTER: &str = "/user/register";
pub const POST_USER_TOKEN_REFRESH: &str = "/user/token/refresh";
pub const GET_USER_ME: &str = "/user/me";
pub const POST_USER_CHANGE_PASSWORD: &str = "/user/changePassword";
pub const POST_USER_SEND_MAIL_RESET_PASSWORD: &str = "/user/send-mail-reset-password";
pub const POST_USER_RESET_PASSWORD: &str = "/user/reset-password";
pub const GET_USERS: &str = "/user";
pub const DELETE_USER_ID: &str = "/user/{id}";
pub const GET_WS_NOTIFICATIONS: &str = "/ws/notifications/";
