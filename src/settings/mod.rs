pub mod client_config;

pub use client_config::{
    random_hex, ClientConfig, API_URL_BASE, AUTH_URL_TOKEN, AUTH_URL_USER, DEFAULT_SCOPE,
    REDIRECT_URI_MOBILE,
};
