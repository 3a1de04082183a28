use crate::routes::{events, health, tasks};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(info(
    title = "taskboard-server",
    description = "Background task lifecycle tracking API",
    version = "0.1.0",
))]
pub struct ApiDoc;

pub fn get_docs() -> utoipa::openapi::OpenApi {
    let mut root = ApiDoc::openapi();
    root.merge(health::HealthApi::openapi());
    root.merge(events::EventsApi::openapi());
    root.merge(tasks::TasksApi::openapi());
    root
}
