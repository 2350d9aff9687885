//! Code download as a file attachment.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use codemate_core::analyzer::infer_language;
use codemate_core::{CodeBlock, Role};
use utoipa::OpenApi;

use crate::error::ServerError;
use crate::extract::{Caller, ValidatedQuery};
use crate::schemas::download::DownloadQuery;
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(paths(download_code))]
pub struct DownloadApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/download/code", get(download_code))
}

/// Sends code as `application/octet-stream`: the `code` parameter when
/// given, else the caller's last generated block.
#[utoipa::path(
    get,
    path = "/download/code",
    tag = "download",
    params(DownloadQuery),
    responses(
        (status = 200, description = "Code attachment", content_type = "application/octet-stream"),
        (status = 404, description = "Nothing to download"),
    )
)]
pub async fn download_code(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    ValidatedQuery(query): ValidatedQuery<DownloadQuery>,
) -> Result<Response, ServerError> {
    let user_id = caller.user_id(query.user_id.as_deref());

    let block = match query.code.filter(|code| !code.trim().is_empty()) {
        Some(code) => Some(CodeBlock {
            language: infer_language(&code).to_owned(),
            code,
        }),
        None => match state.recent_code.get(&caller.code_key(user_id)) {
            Some(block) => Some(block),
            None => stored_code(&state, user_id).await?,
        },
    };
    let Some(block) = block else {
        return Err(ServerError::NotFound("no code available for download".into()));
    };

    let filename = attachment_name(query.filename.as_deref(), &block.language);
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/octet-stream")
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{filename}\""),
        )
        .body(Body::from(block.code))
        .map_err(|e| ServerError::Internal(format!("failed to build download response: {e}")))
}

/// Last code block of the user's stored assistant messages.
async fn stored_code(
    state: &AppState,
    user_id: Option<&str>,
) -> Result<Option<CodeBlock>, ServerError> {
    let (Some(user_id), Some(store)) = (user_id, &state.conversations) else {
        return Ok(None);
    };
    let history = store.read(user_id).await?;
    Ok(history
        .into_iter()
        .rev()
        .filter(|message| message.role == Role::Assistant)
        .find_map(|message| message.code_blocks.into_iter().last()))
}

fn extension_for(language: &str) -> &'static str {
    match language {
        "python" | "py" | "python3" => "py",
        "javascript" | "js" | "jsx" => "js",
        "typescript" | "ts" | "tsx" => "ts",
        "rust" | "rs" => "rs",
        "bash" | "sh" | "shell" | "zsh" => "sh",
        "sql" => "sql",
        "java" => "java",
        "go" | "golang" => "go",
        "c++" | "cpp" => "cpp",
        "c" => "c",
        "html" => "html",
        "css" => "css",
        "json" => "json",
        "yaml" | "yml" => "yaml",
        _ => "txt",
    }
}

/// Base name of `requested` with unsafe characters replaced; falls back to
/// `code.<ext>` and appends the extension when the name has none.
fn attachment_name(requested: Option<&str>, language: &str) -> String {
    let ext = extension_for(language);
    let base = requested
        .and_then(|name| name.rsplit(['/', '\\']).next())
        .unwrap_or("")
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect::<String>();
    let base = base.trim_start_matches('.');
    if base.is_empty() {
        format!("code.{ext}")
    } else if base.contains('.') {
        base.to_owned()
    } else {
        format!("{base}.{ext}")
    }
}
