pub mod routes;

pub use routes::{create_router, image_routes, AppState, ImageEndpoint};
