use utoipa::OpenApi;

use crate::routes::{auth, chat, download, health, history, suggest};

#[derive(OpenApi)]
#[openapi(info(
    title = "codemate-server",
    description = "Coding assistant API: chat turns, stored history, suggestions and code download",
    version = "0.1.0"
))]
pub struct ApiDoc;

pub fn get_docs() -> utoipa::openapi::OpenApi {
    let mut root = ApiDoc::openapi();
    root.merge(health::HealthApi::openapi());
    root.merge(chat::ChatApi::openapi());
    root.merge(history::HistoryApi::openapi());
    root.merge(suggest::SuggestApi::openapi());
    root.merge(download::DownloadApi::openapi());
    root.merge(auth::AuthApi::openapi());
    root
}

#[cfg(not(feature = "swagger-ui"))]
pub async fn openapi_json() -> axum::Json<utoipa::openapi::OpenApi> {
    axum::Json(get_docs())
}
