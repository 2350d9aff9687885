use serde::Deserialize;
use utoipa::IntoParams;
use validator::Validate;

#[derive(Debug, Clone, Default, Deserialize, IntoParams, Validate)]
#[into_params(parameter_in = Query)]
pub struct DownloadQuery {
    /// Code to download verbatim. When absent the caller's last generated
    /// block is used.
    #[validate(length(max = 262144))]
    pub code: Option<String>,
    /// Attachment name; reduced to its base name.
    #[validate(length(min = 1, max = 255))]
    pub filename: Option<String>,
    #[validate(length(min = 1, max = 128))]
    pub user_id: Option<String>,
}
