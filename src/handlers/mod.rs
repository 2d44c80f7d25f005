// handlers/mod.rs - route handlers and the route table
//
// Every route requires a bearer token except /health. Registration order is
// the match order.

pub mod aggregate;
pub mod health;
pub mod oral;
pub mod params;
pub mod students;
pub mod submission;
pub mod users;

use axum::http::Method;

use crate::routing::RouteTable;

pub fn routes() -> RouteTable {
    RouteTable::new()
        // Public
        .public(Method::GET, "/health", health::Health)
        // Users
        .route(Method::GET, "/users/me", users::Me)
        .route(Method::GET, "/users/students", users::Students)
        // Essay submissions
        .route(Method::GET, "/submission/list", submission::List)
        .route(Method::GET, "/submission/class-summary", submission::ClassSummary)
        .route(Method::GET, "/submission/classno-summary", submission::ClassnoSummary)
        // Oral practice
        .route(Method::GET, "/oral/list", oral::List)
        .route(Method::GET, "/students/oral", oral::List)
        .route(Method::GET, "/oral/homeworks", oral::Homeworks)
        .route(Method::GET, "/oral/class-summary", oral::ClassSummary)
        .route(Method::GET, "/oral/classno-summary", oral::ClassnoSummary)
        .route(Method::POST, "/oral/update", oral::Update)
        // Per-student uploads
        .route(Method::GET, "/student-homeworks", students::Homeworks)
        .route(Method::GET, "/student/essays", students::Essays)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_health_is_public() {
        let table = routes();
        let public: Vec<&str> = table
            .routes()
            .iter()
            .filter(|r| !r.requires_auth)
            .map(|r| r.pattern.as_str())
            .collect();
        assert_eq!(public, vec!["/health"]);
    }

    #[test]
    fn test_no_route_is_shadowed() {
        let table = routes();
        for route in table.routes() {
            let (found, _) = table.find(&route.method, route.pattern.as_str()).unwrap();
            assert_eq!(found.pattern.as_str(), route.pattern.as_str());
        }
    }
}
