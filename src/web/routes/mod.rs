pub mod health_routes;
pub mod predict_routes;
