use actix_web::{test, web, App};
use serde_json::Value;

use crate::support::rooms::fast_rules;
use crate::support::websocket::test_state;

#[actix_web::test]
async fn health_reports_both_backends() {
    let state = test_state(&["cat"], fast_rules());
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state))
            .configure(sketch_backend::routes::configure),
    )
    .await;

    let resp = test::call_service(&app, test::TestRequest::get().uri("/health").to_request()).await;
    assert!(resp.status().is_success());

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["store"]["backend"], "memory");
    assert_eq!(body["store"]["status"], "ok");
    assert_eq!(body["words"]["backend"], "memory");
    assert!(body["time"].as_str().is_some());
}
