//! Resource routes. Paths are parameterized on the resource segment so the
//! handlers resolve the registered resource at request time; /export must be
//! declared alongside /:id and wins on the static match.

use crate::handlers::entity::{create, delete as delete_handler, export, list, show, update};
use crate::state::AppState;
use axum::{routing::get, Router};

pub fn entity_routes(state: AppState) -> Router {
    Router::new()
        .route("/:path_segment", get(list).post(create))
        .route("/:path_segment/export", get(export))
        .route(
            "/:path_segment/:id",
            get(show).put(update).patch(update).delete(delete_handler),
        )
        .with_state(state)
}
