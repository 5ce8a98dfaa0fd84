use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub chat: ChatConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub environment: String,
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub issuer: String,
}

#[derive(Debug, Clone)]
pub struct ChatConfig {
    pub default_page_size: usize,
    pub max_page_size: usize,
}

impl Config {
    pub fn load() -> Self {
        dotenvy::dotenv().ok();

        Config {
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env::var("SERVER_PORT")
                    .ok()
                    .and_then(|p| p.parse().ok())
                    .unwrap_or(8080),
                environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
            },
            auth: AuthConfig {
                jwt_secret: env::var("JWT_SECRET")
                    .unwrap_or_else(|_| "super-secret-jwt-key-change-in-production".to_string()),
                issuer: env::var("JWT_ISSUER").unwrap_or_else(|_| "meetup-chat".to_string()),
            },
            chat: ChatConfig {
                default_page_size: env::var("CHAT_DEFAULT_PAGE_SIZE")
                    .ok()
                    .and_then(|p| p.parse().ok())
                    .unwrap_or(50),
                max_page_size: env::var("CHAT_MAX_PAGE_SIZE")
                    .ok()
                    .and_then(|p| p.parse().ok())
                    .unwrap_or(100),
            },
        }
    }
}
