//! HTTP clients for the remote generation services and the default prompt
//! wording.

pub mod gender_api_client;
pub mod http;
pub mod image_api_client;
pub mod prompt;
pub mod transition_api_client;

pub use gender_api_client::GenderApiClient;
pub use image_api_client::ImageApiClient;
pub use prompt::DefaultPromptBuilder;
pub use transition_api_client::TransitionApiClient;
