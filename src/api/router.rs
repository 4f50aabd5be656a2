//! HTTP router.
//!
//! Routes live under `/api/`, grouped by role prefix. Each prefix group sits
//! behind a role gate; services still authorize every call on their own.
//!
//! Middleware stack on protected routes (outermost → innermost):
//! 1. Extension(ApiContext) → 2. Auth validator → 3. Audit logger → 4. Role gate

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::{delete, get, patch, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;

use crate::api::endpoints;
use crate::api::middleware;
use crate::api::types::ApiContext;
use crate::config::StorageConfig;
use crate::core_state::CoreState;
use crate::files::MAX_UPLOAD_BYTES;
use crate::models::enums::Role;

const ADMIN: &[Role] = &[Role::Admin];
const MANAGEMENT: &[Role] = &[Role::Admin, Role::Coordinator];
const CARE_STAFF: &[Role] = &[Role::Nurse, Role::Carer];
const RESIDENT: &[Role] = &[Role::Resident];
const FAMILY: &[Role] = &[Role::Family];

/// Room for multipart framing around the largest accepted file.
const UPLOAD_BODY_LIMIT: usize = MAX_UPLOAD_BYTES + 64 * 1024;

/// Build the application router.
///
/// Middleware uses `Extension<ApiContext>` (injected as the outermost layer).
/// Endpoint handlers use `State<ApiContext>` (provided via `with_state`).
pub fn api_router(core: Arc<CoreState>) -> Router {
    let media_dir = match &core.config.storage {
        StorageConfig::Local { dir, .. } => Some(dir.clone()),
        StorageConfig::Http { .. } => None,
    };
    let ctx = ApiContext::new(core);

    let mut router = Router::new().nest("/api", build_api(ctx));
    if let Some(dir) = media_dir {
        router = router.nest_service("/media", ServeDir::new(dir));
    }
    router.layer(CorsLayer::permissive())
}

fn build_api(ctx: ApiContext) -> Router {
    use endpoints::{analytics, auth, care, comms, files, health, reports, residents, shifts, users};

    let public = Router::new()
        .route("/health", get(health::check))
        .route("/auth/login", post(auth::login))
        .route("/auth/set-password", post(auth::set_password))
        .route("/auth/register-family", post(auth::register_family))
        .with_state(ctx.clone());

    let account = Router::new()
        .route("/me", get(auth::me).patch(auth::update_me))
        .route(
            "/me/picture",
            post(auth::upload_picture).layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .route("/change-password", post(auth::change_password));

    let admin = Router::new()
        .route("/users", get(users::list).post(users::create))
        .route("/users/:id", get(users::detail).patch(users::update).delete(users::remove))
        .route("/users/:id/activate", post(users::activate))
        .route("/users/:id/deactivate", post(users::deactivate))
        .route("/residents", post(residents::create))
        .route("/residents/:id", patch(residents::update).delete(residents::remove))
        .route(
            "/residents/:id/photo",
            post(residents::upload_photo).layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .route("/families", get(residents::list_families))
        .route("/families/:id/approve", post(residents::approve_family))
        .route("/families/:id/reject", post(residents::reject_family))
        .route("/care-forms", post(care::create_form))
        .route("/care-forms/:id", patch(care::update_form).delete(care::delete_form))
        .route("/incidents/:id", delete(reports::delete_incident))
        .route("/feedback/:id", delete(reports::delete_feedback))
        .route("/analytics/dashboard", get(analytics::dashboard))
        .route("/analytics/recent-activity", get(analytics::recent_activity))
        .route("/analytics/signups", get(analytics::signups))
        .route("/analytics/incidents", get(analytics::incident_summary))
        .route_layer(from_fn_with_state(ADMIN, middleware::auth::require_roles));

    let coordinator = Router::new()
        .route("/shifts", get(shifts::list).post(shifts::create))
        .route("/shifts/:id", get(shifts::detail).patch(shifts::update).delete(shifts::remove))
        .route("/shifts/:id/missed", post(shifts::mark_missed))
        .route("/shifts/:id/notes", get(shifts::shift_notes))
        .route("/notes/:id/flag", post(shifts::flag_note))
        .route("/tasks", get(shifts::list_tasks).post(shifts::create_task))
        .route("/tasks/:id", get(shifts::task_detail).delete(shifts::delete_task))
        .route("/care-plans", post(care::create_plan))
        .route("/care-plans/:id", patch(care::update_plan).delete(care::delete_plan))
        .route("/incidents/:id", patch(reports::update_incident))
        .route("/feedback", get(reports::list_feedback))
        .route("/feedback/:id", get(reports::feedback_detail))
        .route("/feedback/:id/respond", post(reports::respond_to_feedback))
        .route("/visits", get(comms::list_visits))
        .route("/visits/:id/decide", post(comms::decide_visit))
        .route("/note-categories", post(care::create_category))
        .route(
            "/note-categories/:id",
            patch(care::update_category).delete(care::delete_category),
        )
        .route_layer(from_fn_with_state(MANAGEMENT, middleware::auth::require_roles));

    let staff = Router::new()
        .route("/shifts/assigned", get(shifts::assigned))
        .route("/shifts/completed", get(shifts::completed))
        .route("/shifts/:id", get(shifts::detail))
        .route("/shifts/:id/start", post(shifts::start))
        .route("/shifts/:id/complete", post(shifts::complete))
        .route("/shifts/:id/notes", get(shifts::shift_notes))
        .route("/notes", post(shifts::create_note))
        .route("/notes/:id", patch(shifts::update_note).delete(shifts::delete_note))
        .route("/tasks", get(shifts::list_tasks))
        .route("/tasks/:id", get(shifts::task_detail).patch(shifts::update_task))
        .route_layer(from_fn_with_state(CARE_STAFF, middleware::auth::require_roles));

    let resident = Router::new()
        .route("/me", get(residents::own_record))
        .route("/feedback", get(reports::list_feedback).post(reports::submit_feedback))
        .route("/feedback/:id", get(reports::feedback_detail))
        .route_layer(from_fn_with_state(RESIDENT, middleware::auth::require_roles));

    let family = Router::new()
        .route("/link", get(residents::own_family))
        .route("/resident", get(residents::linked_resident))
        .route("/visits", get(comms::list_visits).post(comms::request_visit))
        .route("/visits/:id", delete(comms::cancel_visit))
        .route_layer(from_fn_with_state(FAMILY, middleware::auth::require_roles));

    let shared = Router::new()
        .route("/contacts", get(users::contacts))
        .route("/messages", post(comms::send_message))
        .route("/messages/conversations", get(comms::conversations))
        .route("/messages/unread", get(comms::unread_messages))
        .route("/messages/with/:user_id", get(comms::thread))
        .route("/messages/with/:user_id/read", post(comms::read_thread))
        .route("/messages/:id/read", post(comms::read_message))
        .route("/notifications", get(comms::list_notifications))
        .route("/notifications/unread", get(comms::unread_notifications))
        .route("/notifications/read-all", post(comms::read_all_notifications))
        .route("/notifications/:id", delete(comms::delete_notification))
        .route("/notifications/:id/read", post(comms::read_notification))
        .route(
            "/files",
            get(files::list)
                .post(files::upload)
                .layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .route("/files/:id", get(files::detail).patch(files::update).delete(files::remove))
        .route("/residents", get(residents::list))
        .route("/residents/:id", get(residents::detail))
        .route("/residents/:id/notes", get(shifts::resident_notes))
        .route("/care-plans", get(care::list_plans))
        .route("/care-plans/:id", get(care::plan_detail))
        .route("/care-forms", get(care::list_forms))
        .route("/care-forms/:id", get(care::form_detail))
        .route("/care-forms/:id/answers", post(care::submit_answers))
        .route("/health-records", get(care::list_health_records).post(care::create_health_record))
        .route(
            "/health-records/:id",
            get(care::health_record_detail)
                .patch(care::update_health_record)
                .delete(care::delete_health_record),
        )
        .route("/incidents", get(reports::list_incidents).post(reports::report_incident))
        .route("/incidents/:id", get(reports::incident_detail))
        .route("/note-categories", get(care::list_categories));

    // Layers are applied from bottom (innermost) to top (outermost).
    // Extension must be outermost so middleware can extract ApiContext.
    let protected = Router::new()
        .nest("/auth", account)
        .nest("/admin", admin)
        .nest("/coordinator", coordinator)
        .nest("/staff", staff)
        .nest("/resident", resident)
        .nest("/family", family)
        .nest("/shared", shared)
        .with_state(ctx.clone())
        .layer(from_fn(middleware::audit::log_access))
        .layer(from_fn(middleware::auth::require_auth))
        .layer(axum::Extension(ctx));

    public.merge(protected)
}
