pub mod auth;
pub mod client_config;
pub mod form;
pub mod joke;
pub mod json_error;
pub mod profile;

pub use self::auth::{AuthEvent, PasswordCredentials, Session, SignUpOutcome, User};
pub use self::client_config::{
    AppConfig, BackendConfig, ConfigError, FeedConfig, LogConfig, ProfileLookup,
};
pub use self::form::{FormError, LoginForm, OtpForm, RegisterForm, RegisterRequest};
pub use self::joke::{Joke, JokeRow, NewJoke};
pub use self::json_error::ErrorResponse;
pub use self::profile::{NewProfile, Profile};
