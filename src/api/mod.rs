mod auth;
mod boards;
mod dashboard;
mod mills;
mod partners;
mod reports;
mod users;

use axum::{
    routing::{get, post},
    Router,
};

use crate::events::{ChangeEvent, EventHub};
use crate::lifecycle::Transition;
use crate::live::LiveStore;
use crate::AppState;

/// Build the API router
pub fn router() -> Router<AppState> {
    Router::new()
        // Session routes
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/me", get(auth::me))
        // Board routes
        .route("/boards", get(boards::list_boards).post(boards::create_board))
        .route("/boards/substitutes", get(boards::list_substitutes))
        .route(
            "/boards/{id}",
            get(boards::get_board)
                .patch(boards::update_board)
                .delete(boards::delete_board),
        )
        .route("/boards/{id}/send-for-service", post(boards::send_for_service))
        .route("/boards/{id}/start-repair", post(boards::start_repair))
        .route("/boards/{id}/complete-repair", post(boards::complete_repair))
        .route("/boards/{id}/inward", post(boards::process_inward))
        // Master data
        .route("/mills", get(mills::list_mills).post(mills::create_mill))
        .route(
            "/mills/{id}",
            get(mills::get_mill)
                .patch(mills::update_mill)
                .delete(mills::delete_mill),
        )
        .route("/partners", get(partners::list_partners).post(partners::create_partner))
        .route(
            "/partners/{id}",
            get(partners::get_partner)
                .patch(partners::update_partner)
                .delete(partners::delete_partner),
        )
        // User management
        .route("/users", get(users::list_users).post(users::create_user))
        .route(
            "/users/{id}",
            get(users::get_user)
                .patch(users::update_user)
                .delete(users::delete_user),
        )
        // Aggregates and exports
        .route("/dashboard", get(dashboard::get_dashboard))
        .route("/service/queue", get(dashboard::service_queue))
        .route("/reports", get(reports::get_report))
        .route("/reports/export.xlsx", get(reports::export_workbook))
        .route("/reports/boards.xlsx", get(reports::export_boards))
        .route("/reports/sheets/{sheet}", get(reports::export_sheet))
        .route("/backup", get(reports::backup))
}

/// Write committed boards through to the live store and announce them
async fn publish_transition(live: &LiveStore, events: &EventHub, transition: &Transition) {
    for board in transition.records() {
        live.put_board(board.clone()).await;
        events.publish(ChangeEvent::BoardUpserted(board.clone()));
    }
}
